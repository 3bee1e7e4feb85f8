use crate::job;

pub struct State {
	pub job_control: job::JobControl,
	/// Exit code of the last foreground pipeline.
	pub last_status: u8,
}

impl State {
	pub fn new() -> State {
		State { job_control: job::JobControl::new(), last_status: 0 }
	}
}

impl Default for State {
	fn default() -> State {
		State::new()
	}
}
