use thiserror::Error;

use crate::types::*;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParseError {
	#[error("empty command")]
	EmptyCommand,
	#[error("missing target after '{0}'")]
	EmptyRedirect(char),
	#[error("more than one '{0}' redirection")]
	DuplicateRedirect(char),
	#[error("append redirection is not supported")]
	AppendUnsupported,
	#[error("character after '&': '{0}'")]
	TrailingAfterBackground(char),
	#[error("word is not valid UTF-8")]
	InvalidUtf8,
}

type ParseResult<T> = Result<T, ParseError>;

struct Parser<'a> {
	line: &'a [u8],
	i: usize,
}

impl<'a> Parser<'a> {
	fn proceed_while<F>(&mut self, f: F) where F: Fn(u8) -> bool {
		while let Some(c) = self.line.get(self.i) {
			if !f(*c) { break; }
			self.i += 1;
		}
	}

	fn is_whitespace(c: u8) -> bool {
		matches!(c, b' ' | b'\t' | b'\n' | b'\r')
	}

	fn is_letter(c: u8) -> bool {
		match c {
			b'>' | b'<' | b'&' | b'|' => false,
			_ => !Parser::is_whitespace(c),
		}
	}

	fn skip_whitespaces(&mut self) {
		self.proceed_while(Parser::is_whitespace);
	}

	fn read_word(&mut self) -> ParseResult<Option<String>> {
		let orig = self.i;
		self.proceed_while(Parser::is_letter);
		if orig == self.i {
			return Ok(None);
		}
		match std::str::from_utf8(&self.line[orig .. self.i]) {
			Ok(word) => Ok(Some(word.to_string())),
			Err(_) => Err(ParseError::InvalidUtf8),
		}
	}

	fn parse_redirect(&mut self, command: &mut Command) -> ParseResult<bool> {
		let c = match self.line.get(self.i) {
			Some(&b'<') => '<',
			Some(&b'>') => '>',
			_ => return Ok(false),
		};
		self.i += 1;
		if c == '>' && self.line.get(self.i) == Some(&b'>') {
			return Err(ParseError::AppendUnsupported);
		}

		self.skip_whitespaces();
		let target = self.read_word()?.ok_or(ParseError::EmptyRedirect(c))?;
		let slot = if c == '<' { &mut command.stdin } else { &mut command.stdout };
		if slot.is_some() {
			return Err(ParseError::DuplicateRedirect(c));
		}
		*slot = Some(target);
		Ok(true)
	}

	fn parse_program(&mut self, command: &mut Command) -> ParseResult<Vec<String>> {
		let mut argv: Vec<String> = vec![];
		loop {
			self.skip_whitespaces();
			if self.parse_redirect(command)? {
				continue;
			}
			match self.read_word()? {
				Some(word) => argv.push(word),
				None => break,
			}
		}
		if argv.is_empty() {
			return Err(ParseError::EmptyCommand);
		}
		Ok(argv)
	}

	fn parse_command(&mut self) -> ParseResult<Command> {
		let mut command = Command { programs: None, stdin: None, stdout: None, is_background: false };

		loop {
			let argv = self.parse_program(&mut command)?;
			let next = command.programs.take();
			command.programs = Some(Box::new(Program { argv, next }));
			match self.line.get(self.i) {
				Some(&b'|') => { self.i += 1; },
				Some(&b'&') => {
					self.i += 1;
					command.is_background = true;
					self.skip_whitespaces();
					if let Some(&c) = self.line.get(self.i) {
						return Err(ParseError::TrailingAfterBackground(c as char));
					}
					break;
				},
				_ => { break; },
			}
		}
		Ok(command)
	}
}

pub fn parse(line: &[u8]) -> ParseResult<Command> {
	let mut parser = Parser { line, i: 0 };
	parser.parse_command()
}
