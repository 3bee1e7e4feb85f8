use std::fs;
use std::io::Write;
use std::process::{Command,Output,Stdio};

fn lsh(script: &str) -> Output {
	let mut child = Command::new(env!("CARGO_BIN_EXE_lsh"))
		.stdin(Stdio::piped())
		.stdout(Stdio::piped())
		.stderr(Stdio::piped())
		.spawn()
		.unwrap();
	child.stdin.take().unwrap().write_all(script.as_bytes()).unwrap();
	child.wait_with_output().unwrap()
}

#[test]
fn runs_lines_until_exit() {
	let dir = tempfile::tempdir().unwrap();
	let out = dir.path().join("out");
	let output = lsh(&format!("seq 4 | wc -l > {}\n\n   \nexit 5\necho unreachable\n", out.display()));
	assert_eq!(output.status.code(), Some(5));
	assert_eq!(fs::read_to_string(&out).unwrap().trim(), "4");
	assert!(!String::from_utf8_lossy(&output.stdout).contains("unreachable"));
}

#[test]
fn errors_are_reported_and_the_shell_continues() {
	let dir = tempfile::tempdir().unwrap();
	let out = dir.path().join("out");
	let script = format!("ls | | wc\ncd {}\ncat < {}\necho after > {}\n",
		dir.path().join("missing").display(), dir.path().join("nope").display(), out.display());
	let output = lsh(&script);
	let stderr = String::from_utf8_lossy(&output.stderr);
	assert!(stderr.contains("parse error: empty command"), "{}", stderr);
	assert!(stderr.contains("cd: "), "{}", stderr);
	assert!(stderr.contains("nope"), "{}", stderr);
	assert_eq!(fs::read_to_string(&out).unwrap(), "after\n");
	assert_eq!(output.status.code(), Some(0));
}

#[test]
fn end_of_input_exits_with_last_status() {
	let output = lsh("true\nfalse\n");
	assert_eq!(output.status.code(), Some(1));
}

#[test]
fn pipeline_output_reaches_the_shells_stdout() {
	let output = lsh("echo one two | wc -w\n");
	assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "2");
}
