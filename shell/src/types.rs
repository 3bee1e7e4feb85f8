use std::fmt;

/// One program of a command line. The list is linked from the last program
/// typed back to the first one.
#[derive(Debug, PartialEq, Eq)]
pub struct Program {
	pub argv: Vec<String>,
	pub next: Option<Box<Program>>,
}

#[derive(Debug, PartialEq, Eq)]
pub struct Command {
	pub programs: Option<Box<Program>>,
	pub stdin: Option<String>,
	pub stdout: Option<String>,
	pub is_background: bool,
}

impl Command {
	pub fn iter(&self) -> Programs {
		Programs { cur: self.programs.as_deref() }
	}
}

/// Walks the programs in parser order (last typed first).
pub struct Programs<'a> {
	cur: Option<&'a Program>,
}

impl<'a> Iterator for Programs<'a> {
	type Item = &'a Program;

	fn next(&mut self) -> Option<&'a Program> {
		let p = self.cur?;
		self.cur = p.next.as_deref();
		Some(p)
	}
}

impl fmt::Display for Command {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		writeln!(f, "------------------------------")?;
		writeln!(f, "Parse OK")?;
		writeln!(f, "stdin:      {}", self.stdin.as_deref().unwrap_or("<none>"))?;
		writeln!(f, "stdout:     {}", self.stdout.as_deref().unwrap_or("<none>"))?;
		writeln!(f, "background: {}", self.is_background)?;
		writeln!(f, "Pgms:")?;
		let programs: Vec<&Program> = self.iter().collect();
		for p in programs.iter().rev() {
			write!(f, "            * [ ")?;
			for arg in &p.argv {
				write!(f, "{} ", arg)?;
			}
			writeln!(f, "]")?;
		}
		write!(f, "------------------------------")
	}
}
