use std::{env,io};
use std::path::{Path,PathBuf};

use thiserror::Error;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Builtin { Cd, Exit }

#[derive(Error, Debug)]
pub enum BuiltinError {
	#[error("cd: HOME not set")]
	NoHome,
	#[error("cd: {}: {source}", .path.display())]
	ChangeDirectory {
		path: PathBuf,
		#[source]
		source: io::Error,
	},
	#[error("exit: {0}: numeric argument required")]
	BadExitCode(String),
}

pub fn match_builtin(name: &str) -> Option<Builtin> {
	match name {
		"cd" => Some(Builtin::Cd),
		"exit" => Some(Builtin::Exit),
		_ => None,
	}
}

/// Resolves the directory `cd` should move to. `args` excludes the program name.
pub fn cd_target(args: &[String], home: Option<&Path>) -> Result<PathBuf, BuiltinError> {
	let arg = match args.first() {
		Some(arg) => arg,
		None => return home.map(Path::to_path_buf).ok_or(BuiltinError::NoHome),
	};
	if arg == "~" {
		return home.map(Path::to_path_buf).ok_or(BuiltinError::NoHome);
	}
	if let Some(rest) = arg.strip_prefix("~/") {
		let home = home.ok_or(BuiltinError::NoHome)?;
		return Ok(home.join(rest));
	}
	Ok(PathBuf::from(arg))
}

pub fn change_directory(args: &[String]) -> Result<PathBuf, BuiltinError> {
	let home = dirs::home_dir();
	let target = cd_target(args, home.as_deref())?;
	env::set_current_dir(&target)
		.map_err(|source| BuiltinError::ChangeDirectory { path: target.clone(), source })?;
	log::debug!("cd: now in {}", target.display());
	Ok(target)
}

/// Exit status requested by `exit`, falling back to `last_status`.
pub fn exit_code(args: &[String], last_status: u8) -> Result<i32, BuiltinError> {
	match args.first() {
		None => Ok(last_status as i32),
		Some(arg) => arg.parse::<i32>()
			.map(|code| code & 0xff)
			.map_err(|_| BuiltinError::BadExitCode(arg.clone())),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn args(v: &[&str]) -> Vec<String> {
		v.iter().map(|s| s.to_string()).collect()
	}

	#[test]
	fn recognizes_only_cd_and_exit() {
		assert_eq!(match_builtin("cd"), Some(Builtin::Cd));
		assert_eq!(match_builtin("exit"), Some(Builtin::Exit));
		assert_eq!(match_builtin("ls"), None);
		assert_eq!(match_builtin("echo"), None);
	}

	#[test]
	fn cd_target_defaults_to_home() {
		let home = Path::new("/home/alice");
		assert_eq!(cd_target(&[], Some(home)).unwrap(), PathBuf::from("/home/alice"));
		assert_eq!(cd_target(&args(&["~"]), Some(home)).unwrap(), PathBuf::from("/home/alice"));
	}

	#[test]
	fn cd_target_expands_leading_tilde() {
		let home = Path::new("/home/alice");
		assert_eq!(cd_target(&args(&["~/src/lsh"]), Some(home)).unwrap(), PathBuf::from("/home/alice/src/lsh"));
		assert_eq!(cd_target(&args(&["/tmp/~x"]), Some(home)).unwrap(), PathBuf::from("/tmp/~x"));
		assert_eq!(cd_target(&args(&["rel", "ignored"]), Some(home)).unwrap(), PathBuf::from("rel"));
	}

	#[test]
	fn cd_target_without_home() {
		assert!(matches!(cd_target(&[], None), Err(BuiltinError::NoHome)));
		assert!(matches!(cd_target(&args(&["~/x"]), None), Err(BuiltinError::NoHome)));
		assert_eq!(cd_target(&args(&["/"]), None).unwrap(), PathBuf::from("/"));
	}

	#[test]
	fn exit_code_parsing() {
		assert_eq!(exit_code(&[], 3).unwrap(), 3);
		assert_eq!(exit_code(&args(&["7"]), 0).unwrap(), 7);
		assert_eq!(exit_code(&args(&["256"]), 0).unwrap(), 0);
		assert!(matches!(exit_code(&args(&["x"]), 0), Err(BuiltinError::BadExitCode(_))));
	}
}
