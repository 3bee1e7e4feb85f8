use nix::errno::Errno;
use nix::sys::signal::{self,SaFlags,SigAction,SigHandler,SigSet,SigmaskHow,Signal};
use nix::sys::wait::{self,WaitPidFlag,WaitStatus};
use nix::unistd::Pid;

use crate::job::FOREGROUND;

// Handlers below may only do async-signal-safe work: no allocation, no
// locks, no logging. Both preserve errno for the code they interrupted.

struct SavedErrno(libc::c_int);

impl SavedErrno {
	fn save() -> SavedErrno {
		SavedErrno(unsafe { *libc::__errno_location() })
	}
}

impl Drop for SavedErrno {
	fn drop(&mut self) {
		unsafe { *libc::__errno_location() = self.0 };
	}
}

extern "C" fn on_sigchld(_: libc::c_int) {
	let _errno = SavedErrno::save();
	loop {
		match wait::waitpid(Pid::from_raw(-1), Some(WaitPidFlag::WNOHANG)) {
			Ok(WaitStatus::StillAlive) => break,
			Ok(_) => {},
			Err(Errno::EINTR) => {},
			// ECHILD: the foreground wait got there first, or nothing is left.
			Err(_) => break,
		}
	}
}

extern "C" fn on_sigint(_: libc::c_int) {
	let _errno = SavedErrno::save();
	if let Some(gid) = FOREGROUND.get() {
		let _ = signal::killpg(gid, Signal::SIGINT);
	}
}

/// Installs the child reaper and the interrupt relay. SIGTTOU is ignored so
/// the shell can take the terminal back from a finished foreground job.
pub fn install() -> nix::Result<()> {
	let chld = SigAction::new(SigHandler::Handler(on_sigchld),
		SaFlags::SA_RESTART | SaFlags::SA_NOCLDSTOP, SigSet::empty());
	let int = SigAction::new(SigHandler::Handler(on_sigint), SaFlags::SA_RESTART, SigSet::empty());
	let ign = SigAction::new(SigHandler::SigIgn, SaFlags::empty(), SigSet::empty());
	unsafe {
		signal::sigaction(Signal::SIGCHLD, &chld)?;
		signal::sigaction(Signal::SIGINT, &int)?;
		signal::sigaction(Signal::SIGTTOU, &ign)?;
	}
	log::debug!("signal relay installed");
	Ok(())
}

/// Restores default dispositions and an empty mask in a forked child.
/// Ignored signals would otherwise stay ignored across exec; that includes
/// SIGPIPE, which the Rust runtime ignores at startup.
pub fn reset_in_child() {
	let dfl = SigAction::new(SigHandler::SigDfl, SaFlags::empty(), SigSet::empty());
	for sig in [Signal::SIGCHLD, Signal::SIGINT, Signal::SIGTTOU, Signal::SIGPIPE] {
		let _ = unsafe { signal::sigaction(sig, &dfl) };
	}
	let _ = signal::sigprocmask(SigmaskHow::SIG_SETMASK, Some(&SigSet::empty()), None);
}
