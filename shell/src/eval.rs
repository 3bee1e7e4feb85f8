use std::{ffi,io};
use std::ffi::CString;
use std::os::fd::{AsRawFd,OwnedFd};

use nix::errno::Errno;
use nix::unistd::{self,Pid};
use thiserror::Error;

use crate::builtin::{self,Builtin,BuiltinError};
use crate::global;
use crate::job;
use crate::signal;
use crate::stage::{self,Pipeline,Stage};
use crate::types::Command;
use crate::wiring::{self,StageIo};

#[derive(Error, Debug)]
pub enum ExecError {
	#[error("cannot create pipe: {0}")]
	Pipe(#[source] nix::Error),
	#[error("cannot fork: {0}")]
	Fork(#[source] nix::Error),
	#[error("{path}: {source}")]
	InputRedirect {
		path: String,
		#[source]
		source: io::Error,
	},
	#[error("nul byte in argument: {0}")]
	Nul(#[from] ffi::NulError),
	#[error(transparent)]
	Builtin(#[from] BuiltinError),
}

#[derive(Debug, PartialEq, Eq)]
pub enum EvalResult {
	Done(u8),
	Background(Pid),
	/// `exit` ran; the shell should hang up its children and terminate.
	Exit(i32),
}

fn exec_stage(argv: &[CString], io: StageIo) -> ! {
	signal::reset_in_child();
	if io.install().is_err() {
		unsafe { libc::_exit(1) }
	}
	let e = match unistd::execvp(&argv[0], argv) {
		Ok(never) => match never {},
		Err(e) => e,
	};
	wiring::report(&[b"lsh: ", argv[0].as_bytes(), b": ", e.desc().as_bytes(), b"\n"]);
	let status = if e == Errno::ENOENT { 127 } else { 126 };
	unsafe { libc::_exit(status) }
}

fn spawn(job_builder: &mut job::JobBuilder, argv: &[String], io: StageIo) -> Result<(), ExecError> {
	let argv: Vec<CString> = argv.iter().map(|a| CString::new(a.as_bytes())).collect::<Result<_, _>>()?;
	match job_builder.push_fork().map_err(ExecError::Fork)? {
		unistd::ForkResult::Parent { child } => {
			log::debug!("spawned {:?} as {} in group {:?}", argv[0], child, job_builder.gid());
			// The child has its own copies now.
			drop(io);
			Ok(())
		},
		unistd::ForkResult::Child => exec_stage(&argv, io),
	}
}

/// Starts every stage left to right. Returns `Some(code)` if `exit` was reached.
fn spawn_stages(state: &global::State, pipeline: &Pipeline, job_builder: &mut job::JobBuilder) -> Result<Option<i32>, ExecError> {
	let n = pipeline.stages.len();
	let mut stdin: Option<OwnedFd> = match pipeline.input {
		Some(path) => {
			let fd = wiring::open_input(path)
				.map_err(|source| ExecError::InputRedirect { path: path.to_string(), source })?;
			Some(fd)
		},
		None => None,
	};

	for (i, stage) in pipeline.stages.iter().enumerate() {
		let is_last = i + 1 == n;
		let (next_stdin, stdout) = if is_last {
			(None, None)
		} else {
			let (r, w) = wiring::pipe().map_err(ExecError::Pipe)?;
			(Some(r), Some(w))
		};

		match *stage {
			Stage::Builtin { kind, args } => {
				// Nothing is forked: the write end closes unused, so the next
				// stage reads end-of-file.
				drop(stdin.take());
				drop(stdout);
				log::debug!("running {} in the shell", stage.name());
				match kind {
					Builtin::Cd => { builtin::change_directory(args)?; },
					Builtin::Exit => return Ok(Some(builtin::exit_code(args, state.last_status)?)),
				}
			},
			Stage::External { argv } => {
				let output_path = match pipeline.output {
					Some(path) if is_last => Some(CString::new(path)?),
					_ => None,
				};
				let io = StageIo {
					stdin: stdin.take(),
					stdout,
					output_path,
					stray: next_stdin.as_ref().map(AsRawFd::as_raw_fd),
				};
				spawn(job_builder, argv, io)?;
			},
		}
		stdin = next_stdin;
	}
	Ok(None)
}

/// Runs one parsed command line. Foreground pipelines are waited for;
/// background ones are left to the SIGCHLD handler.
pub fn eval(state: &mut global::State, command: &Command) -> Result<EvalResult, ExecError> {
	let pipeline = stage::normalize(command);
	if pipeline.stages.is_empty() {
		return Ok(EvalResult::Done(0));
	}

	// Held until the pipeline is waited for or handed to the background.
	let _block = job::ChildSignalBlock::new();
	let mut job_builder = job::JobBuilder::new(pipeline.stages.len());
	let exit = match spawn_stages(state, &pipeline, &mut job_builder) {
		Ok(exit) => exit,
		Err(e) => {
			if let Some(gid) = job_builder.gid() {
				log::warn!("pipeline aborted, group {} keeps running", gid);
			}
			return Err(e);
		},
	};
	if let Some(code) = exit {
		return Ok(EvalResult::Exit(code));
	}

	let mut job = match job_builder.build() {
		Some(job) => job,
		None => {
			state.last_status = 0;
			return Ok(EvalResult::Done(0));
		},
	};
	if pipeline.is_background {
		log::debug!("group {} running in background", job.gid);
		return Ok(EvalResult::Background(job.gid));
	}
	let code = state.job_control.wait(&mut job);
	state.last_status = code;
	Ok(EvalResult::Done(code))
}
