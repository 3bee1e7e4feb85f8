use std::ffi::CString;
use std::{fs,io};
use std::os::fd::{AsRawFd,IntoRawFd,FromRawFd,OwnedFd,RawFd};

use nix::errno::Errno;
use nix::fcntl::{self,FcntlArg,FdFlag,OFlag};
use nix::sys::stat::Mode;
use nix::unistd;

/// Opens the pipeline's input file. Runs in the shell, before any fork.
pub fn open_input(path: &str) -> io::Result<OwnedFd> {
	let file = fs::File::open(path)?;
	Ok(OwnedFd::from(file))
}

/// Returns `(read, write)`. Both ends are close-on-exec, so only the copies
/// a child explicitly moves onto fd 0 or 1 survive its exec.
pub fn pipe() -> nix::Result<(OwnedFd, OwnedFd)> {
	unistd::pipe2(OFlag::O_CLOEXEC)
}

/// Writes a diagnostic to stderr without allocating. Safe to call in a
/// forked child.
pub fn report(parts: &[&[u8]]) {
	for part in parts {
		unsafe {
			libc::write(libc::STDERR_FILENO, part.as_ptr() as *const libc::c_void, part.len());
		}
	}
}

/// The descriptors one stage starts with. `None` means inherited from the shell.
#[derive(Debug, Default)]
pub struct StageIo {
	pub stdin: Option<OwnedFd>,
	pub stdout: Option<OwnedFd>,
	pub output_path: Option<CString>,
	/// Open in the shell at fork time but meant for the next stage.
	pub stray: Option<RawFd>,
}

impl StageIo {
	/// Moves the descriptors onto fd 0 and 1 and closes the originals.
	/// Only for use in the forked child: it allocates nothing and reports
	/// its own failures.
	pub fn install(self) -> Result<(), Errno> {
		let StageIo { stdin, stdout, output_path, stray } = self;
		if let Some(fd) = stray {
			let _ = unistd::close(fd);
		}
		if let Some(fd) = stdin {
			move_to(fd, libc::STDIN_FILENO).map_err(|e| fail(b"stdin", e))?;
		}
		let stdout = match (stdout, output_path) {
			(Some(fd), _) => Some(fd),
			(None, Some(path)) => Some(open_output(&path).map_err(|e| fail(path.as_bytes(), e))?),
			(None, None) => None,
		};
		if let Some(fd) = stdout {
			move_to(fd, libc::STDOUT_FILENO).map_err(|e| fail(b"stdout", e))?;
		}
		Ok(())
	}
}

fn open_output(path: &CString) -> nix::Result<OwnedFd> {
	let flags = OFlag::O_WRONLY | OFlag::O_CREAT | OFlag::O_TRUNC | OFlag::O_CLOEXEC;
	let fd = fcntl::open(path.as_c_str(), flags, Mode::from_bits_truncate(0o644))?;
	Ok(unsafe { OwnedFd::from_raw_fd(fd) })
}

fn move_to(fd: OwnedFd, target: RawFd) -> nix::Result<()> {
	if fd.as_raw_fd() == target {
		let raw = fd.into_raw_fd();
		fcntl::fcntl(raw, FcntlArg::F_SETFD(FdFlag::empty()))?;
		return Ok(());
	}
	unistd::dup2(fd.as_raw_fd(), target)?;
	Ok(())
}

fn fail(what: &[u8], e: Errno) -> Errno {
	report(&[b"lsh: ", what, b": ", e.desc().as_bytes(), b"\n"]);
	e
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::{Read,Write};

	#[test]
	fn pipe_carries_bytes_and_ends_at_eof() {
		let (r, w) = pipe().unwrap();
		let mut writer = fs::File::from(w);
		writer.write_all(b"through the pipe").unwrap();
		drop(writer);
		let mut buf = String::new();
		fs::File::from(r).read_to_string(&mut buf).unwrap();
		assert_eq!(buf, "through the pipe");
	}

	#[test]
	fn pipe_ends_are_close_on_exec() {
		let (r, w) = pipe().unwrap();
		for fd in [&r, &w] {
			let flags = fcntl::fcntl(fd.as_raw_fd(), FcntlArg::F_GETFD).unwrap();
			assert!(FdFlag::from_bits_truncate(flags).contains(FdFlag::FD_CLOEXEC));
		}
	}

	#[test]
	fn open_input_reports_missing_file() {
		let dir = tempfile::tempdir().unwrap();
		let missing = dir.path().join("nope");
		let err = open_input(missing.to_str().unwrap()).unwrap_err();
		assert_eq!(err.kind(), io::ErrorKind::NotFound);
	}

	#[test]
	fn open_input_reads_file() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		file.write_all(b"abc").unwrap();
		let fd = open_input(file.path().to_str().unwrap()).unwrap();
		let mut buf = String::new();
		fs::File::from(fd).read_to_string(&mut buf).unwrap();
		assert_eq!(buf, "abc");
	}
}
