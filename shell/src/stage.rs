use crate::builtin::{self, Builtin};
use crate::types::Command;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Stage<'a> {
	External { argv: &'a [String] },
	Builtin { kind: Builtin, args: &'a [String] },
}

impl<'a> Stage<'a> {
	fn classify(argv: &'a [String]) -> Option<Stage<'a>> {
		let name = argv.first()?;
		Some(match builtin::match_builtin(name) {
			Some(kind) => Stage::Builtin { kind, args: &argv[1..] },
			None => Stage::External { argv },
		})
	}

	pub fn name(&self) -> &'a str {
		match *self {
			Stage::External { argv } => &argv[0],
			Stage::Builtin { kind: Builtin::Cd, .. } => "cd",
			Stage::Builtin { kind: Builtin::Exit, .. } => "exit",
		}
	}
}

/// A command line in execution order.
#[derive(Debug)]
pub struct Pipeline<'a> {
	pub stages: Vec<Stage<'a>>,
	pub input: Option<&'a str>,
	pub output: Option<&'a str>,
	pub is_background: bool,
}

pub fn normalize(command: &Command) -> Pipeline {
	let mut stages: Vec<Stage> = command.iter().filter_map(|p| Stage::classify(&p.argv)).collect();
	stages.reverse();
	Pipeline {
		stages,
		input: command.stdin.as_deref(),
		output: command.stdout.as_deref(),
		is_background: command.is_background,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::parser;
	use crate::types::Program;

	#[test]
	fn restores_typed_order() {
		let command = parser::parse(b"cat < a | sort | uniq > b &").unwrap();
		let pipeline = normalize(&command);
		let names: Vec<&str> = pipeline.stages.iter().map(Stage::name).collect();
		assert_eq!(names, vec!["cat", "sort", "uniq"]);
		assert_eq!(pipeline.input, Some("a"));
		assert_eq!(pipeline.output, Some("b"));
		assert!(pipeline.is_background);
	}

	#[test]
	fn tags_builtins() {
		let command = parser::parse(b"cd /tmp | wc -c").unwrap();
		let pipeline = normalize(&command);
		match pipeline.stages[0] {
			Stage::Builtin { kind: Builtin::Cd, args } => assert_eq!(args, &["/tmp".to_string()][..]),
			ref other => panic!("unexpected stage {:?}", other),
		}
		match pipeline.stages[1] {
			Stage::External { argv } => assert_eq!(argv.len(), 2),
			ref other => panic!("unexpected stage {:?}", other),
		}
	}

	#[test]
	fn empty_command_has_no_stages() {
		let command = Command { programs: None, stdin: None, stdout: None, is_background: false };
		assert!(normalize(&command).stages.is_empty());

		let blank = Command {
			programs: Some(Box::new(Program { argv: vec![], next: None })),
			stdin: None, stdout: None, is_background: false,
		};
		assert!(normalize(&blank).stages.is_empty());
	}
}
