use std::{fs,io};
use std::io::IsTerminal;
use std::os::fd::AsFd;
use std::sync::atomic::{AtomicI32,Ordering};

use nix::errno::Errno;
use nix::sys::signal::{self,SigSet,SigmaskHow,Signal};
use nix::sys::wait::{self,WaitStatus};
use nix::unistd::{self,Pid};

use crate::wiring;

trait WaitStatusExt {
	fn code(self) -> Option<u8>;
}

impl WaitStatusExt for WaitStatus {
	fn code(self) -> Option<u8> {
		match self {
			WaitStatus::Exited(_, code) => Some(code as u8),
			WaitStatus::Signaled(_, sig, _) => Some(128u8.wrapping_add(sig as i32 as u8)),
			_ => None,
		}
	}
}

/// Process group currently waited upon in the foreground. Zero means none.
/// Written by the shell around a foreground wait, read from signal handlers.
#[derive(Debug)]
pub struct ForegroundGroup {
	gid: AtomicI32,
}

impl ForegroundGroup {
	pub const fn new() -> ForegroundGroup {
		ForegroundGroup { gid: AtomicI32::new(0) }
	}

	pub fn set(&self, gid: Pid) {
		self.gid.store(gid.as_raw(), Ordering::SeqCst);
	}

	pub fn clear(&self) {
		self.gid.store(0, Ordering::SeqCst);
	}

	pub fn get(&self) -> Option<Pid> {
		match self.gid.load(Ordering::SeqCst) {
			0 => None,
			gid => Some(Pid::from_raw(gid)),
		}
	}
}

pub static FOREGROUND: ForegroundGroup = ForegroundGroup::new();

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Process {
	pub pid: Pid,
	/// `None` until waited for, or forever if the SIGCHLD handler reaped it first.
	pub status: Option<WaitStatus>,
}

#[derive(Debug)]
pub struct Job {
	pub gid: Pid,
	pub processes: Vec<Process>,
}

impl Job {
	/// Exit code of the rightmost process, 0 when unknown.
	pub fn code(&self) -> u8 {
		self.processes.last().and_then(|pr| pr.status).and_then(WaitStatusExt::code).unwrap_or(0)
	}
}

#[derive(Debug)]
pub struct JobBuilder {
	gid: Option<Pid>,
	processes: Vec<Process>,
}

impl JobBuilder {
	pub fn new(size_hint: usize) -> JobBuilder {
		JobBuilder { gid: None, processes: Vec::with_capacity(size_hint) }
	}

	pub fn gid(&self) -> Option<Pid> {
		self.gid
	}

	/// Forks and places the new process in the job's group. The first
	/// process forked becomes the group leader. Both sides call setpgid so
	/// the membership holds whichever of them runs first.
	pub fn push_fork(&mut self) -> nix::Result<unistd::ForkResult> {
		let r = unsafe { unistd::fork() }?;
		match r {
			unistd::ForkResult::Parent { child } => {
				let gid = *self.gid.get_or_insert(child);
				if let Err(e) = unistd::setpgid(child, gid) {
					// EACCES: the child already exec'd, after joining on its own.
					if e != Errno::EACCES {
						log::debug!("setpgid({}, {}) failed: {}", child, gid, e);
					}
				}
				self.processes.push(Process { pid: child, status: None });
			},
			unistd::ForkResult::Child => {
				let gid = self.gid.unwrap_or(Pid::from_raw(0));
				// Never run in the shell's own group: SIGINT and the terminal
				// follow the job's group.
				if let Err(e) = unistd::setpgid(Pid::from_raw(0), gid) {
					wiring::report(&[b"lsh: cannot join process group: ", e.desc().as_bytes(), b"\n"]);
					unsafe { libc::_exit(1) }
				}
			},
		}
		Ok(r)
	}

	pub fn build(self) -> Option<Job> {
		let gid = self.gid?;
		Some(Job { gid, processes: self.processes })
	}
}

/// Holds SIGCHLD back from the calling thread until dropped. While a
/// pipeline is being forked and waited for, the relay must not reap its
/// members: a reaped leader takes the process group with it, and later
/// stages could no longer join.
pub struct ChildSignalBlock {
	saved: Option<SigSet>,
}

impl ChildSignalBlock {
	pub fn new() -> ChildSignalBlock {
		let mut chld = SigSet::empty();
		chld.add(Signal::SIGCHLD);
		let mut saved = SigSet::empty();
		match signal::pthread_sigmask(SigmaskHow::SIG_BLOCK, Some(&chld), Some(&mut saved)) {
			Ok(()) => ChildSignalBlock { saved: Some(saved) },
			Err(e) => {
				log::warn!("cannot block SIGCHLD: {}", e);
				ChildSignalBlock { saved: None }
			},
		}
	}
}

impl Drop for ChildSignalBlock {
	fn drop(&mut self) {
		if let Some(saved) = self.saved.take() {
			let _ = signal::pthread_sigmask(SigmaskHow::SIG_SETMASK, Some(&saved), None);
		}
	}
}

/// Gives the terminal to a foreground group for as long as it lives.
struct TerminalLease {
	shell: Pid,
}

impl TerminalLease {
	fn acquire(gid: Pid) -> Option<TerminalLease> {
		let stdin = io::stdin();
		if !stdin.is_terminal() {
			return None;
		}
		let shell = unistd::getpgrp();
		match unistd::tcsetpgrp(stdin.as_fd(), gid) {
			Ok(()) => Some(TerminalLease { shell }),
			Err(e) => {
				log::debug!("tcsetpgrp({}) failed: {}", gid, e);
				None
			},
		}
	}
}

impl Drop for TerminalLease {
	fn drop(&mut self) {
		let _ = unistd::tcsetpgrp(io::stdin().as_fd(), self.shell);
	}
}

#[derive(Debug)]
pub struct JobControl {
	foreground: &'static ForegroundGroup,
}

impl Default for JobControl {
	fn default() -> JobControl {
		JobControl::new()
	}
}

impl JobControl {
	pub fn new() -> JobControl {
		JobControl { foreground: &FOREGROUND }
	}

	/// Blocks until every process of `job` has terminated and returns the
	/// exit code of the last one.
	/// The caller holds a `ChildSignalBlock` so the relay cannot reap the
	/// statuses collected here.
	pub fn wait(&self, job: &mut Job) -> u8 {
		let lease = TerminalLease::acquire(job.gid);
		self.foreground.set(job.gid);
		log::debug!("waiting for job {} ({} processes)", job.gid, job.processes.len());
		for pr in job.processes.iter_mut() {
			pr.status = wait_for(pr.pid);
		}
		self.foreground.clear();
		drop(lease);
		job.code()
	}
}

fn wait_for(pid: Pid) -> Option<WaitStatus> {
	loop {
		match wait::waitpid(pid, None) {
			Ok(status @ WaitStatus::Exited(..)) | Ok(status @ WaitStatus::Signaled(..)) => return Some(status),
			Ok(_) => continue,
			Err(Errno::EINTR) => continue,
			// Already reaped by the SIGCHLD handler.
			Err(Errno::ECHILD) => return None,
			Err(e) => {
				log::warn!("waitpid({}) failed: {}", pid, e);
				return None;
			},
		}
	}
}

/// Returns `(state, ppid)` from the contents of `/proc/<pid>/stat`.
fn parse_stat(stat: &str) -> Option<(char, i32)> {
	let rest = &stat[stat.rfind(')')? + 1 ..];
	let mut fields = rest.split_whitespace();
	let state = fields.next()?.chars().next()?;
	let ppid = fields.next()?.parse().ok()?;
	Some((state, ppid))
}

/// Live processes whose parent is this shell.
pub fn direct_children() -> io::Result<Vec<Pid>> {
	let me = unistd::getpid().as_raw();
	let mut children: Vec<i32> = vec![];
	for entry in fs::read_dir("/proc")? {
		let entry = match entry {
			Ok(entry) => entry,
			Err(_) => continue,
		};
		let pid: i32 = match entry.file_name().to_str().and_then(|s| s.parse().ok()) {
			Some(pid) => pid,
			None => continue,
		};
		// The process may be gone by now.
		let stat = match fs::read_to_string(entry.path().join("stat")) {
			Ok(stat) => stat,
			Err(_) => continue,
		};
		match parse_stat(&stat) {
			Some((state, ppid)) if ppid == me && state != 'Z' && state != 'X' => children.push(pid),
			_ => {},
		}
	}
	children.sort_unstable();
	Ok(children.into_iter().map(Pid::from_raw).collect())
}

/// Sends SIGHUP once to every live direct child. Returns the processes signalled.
pub fn hangup_children() -> Vec<Pid> {
	let children = match direct_children() {
		Ok(children) => children,
		Err(e) => {
			log::warn!("cannot list child processes: {}", e);
			return vec![];
		},
	};
	children.into_iter().filter(|&pid| match signal::kill(pid, Signal::SIGHUP) {
		Ok(()) => {
			log::debug!("sent SIGHUP to {}", pid);
			true
		},
		Err(e) => {
			log::debug!("kill({}, SIGHUP) failed: {}", pid, e);
			false
		},
	}).collect()
}
