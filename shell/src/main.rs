use std::io;
use std::io::{BufRead,IsTerminal,Write};
use std::process;

use lsh::{eval,global,job,parser,signal};

const PROMPT: &[u8] = b"lsh> ";

fn quit(code: i32) -> ! {
	let signalled = job::hangup_children();
	log::debug!("sent SIGHUP to {} children", signalled.len());
	process::exit(code)
}

fn main() {
	env_logger::init();
	if let Err(e) = signal::install() {
		eprintln!("lsh: cannot install signal handlers: {}", e);
		process::exit(1);
	}

	let mut state = global::State::new();
	let interactive = io::stdin().is_terminal();
	let mut stdout = io::stdout();
	let stdin = io::stdin();
	let mut stdin_locked = stdin.lock();
	loop {
		if interactive {
			let _ = stdout.write_all(PROMPT);
			let _ = stdout.flush();
		}
		let mut line: Vec<u8> = vec![];
		match stdin_locked.read_until(b'\n', &mut line) {
			Ok(0) => break,
			Ok(_) => {},
			Err(e) => {
				eprintln!("lsh: {}", e);
				break;
			},
		}
		let line = line.trim_ascii();
		if line.is_empty() {
			continue;
		}

		let command = match parser::parse(line) {
			Ok(command) => command,
			Err(e) => {
				eprintln!("lsh: parse error: {}", e);
				continue;
			},
		};
		log::debug!("parsed\n{}", command);
		match eval::eval(&mut state, &command) {
			Ok(eval::EvalResult::Exit(code)) => quit(code),
			Ok(eval::EvalResult::Background(gid)) => log::debug!("[{}] started", gid),
			Ok(eval::EvalResult::Done(code)) => log::debug!("exit status {}", code),
			Err(e) => eprintln!("lsh: {}", e),
		}
	}
	if interactive {
		println!();
	}
	quit(state.last_status as i32)
}
