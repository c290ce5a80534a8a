//! Lexical Analyzer
//!
//! Call the `lexer::tokenize` function with the input source code as `&str`
use std::iter::Peekable;
use std::str::Chars;

use thiserror::Error;

use crate::ast::Span;

#[derive(Clone, Debug, PartialEq)]
pub enum Token {
	Keyword(Reserved),

	Identifier(String),
	IntConstant(i32),
	DoubleConstant(f64),
	StringConstant(String),

	// Brackets
	LeftParenthesis,
	RightParenthesis,
	LeftBrace,
	RightBrace,
	LeftSquare,
	RightSquare,
	Semicolon,

	// Operators
	// Arithmetic
	Plus,
	Minus,
	Star,
	Slash,
	Percent,
	PlusPlus,
	MinusMinus,
	// Comparison
	EqualEqual,
	BangEqual,
	Greater,
	Less,
	GreaterEqual,
	LessEqual,
	// Logical
	Bang,
	AmpAmp,
	PipePipe,
	// Assignment
	Equal,
	// Other
	Dot,
	Colon,
	Comma,

	Eof,
}

/// Tuple struct of `Token` and the span it was read from
#[derive(Clone, Debug, PartialEq)]
pub struct Symbol(pub Token, pub Span);
impl Symbol {
	pub fn token(&self) -> &Token {
		&self.0
	}
	pub fn span(&self) -> Span {
		self.1
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reserved {
	Void,
	Int,
	Double,
	Bool,
	String,
	Class,
	Interface,
	Null,
	This,
	Extends,
	Implements,
	For,
	While,
	If,
	Else,
	Return,
	Break,
	New,
	NewArray,
	Print,
	ReadInteger,
	ReadLine,
	True,
	False,
	Switch,
	Case,
	Default,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LexError {
	#[error("line {line}: unrecognized char '{char}'")]
	UnexpectedChar { char: char, line: usize },
	#[error("line {0}: unterminated string constant")]
	UnterminatedString(usize),
	#[error("line {0}: unterminated comment")]
	UnterminatedComment(usize),
	#[error("line {line}: integer constant {text} does not fit in 32 bits")]
	IntegerOverflow { text: String, line: usize },
}

pub fn tokenize(input_stream: &str) -> Result<Vec<Symbol>, LexError> {
	let mut symbol = Vec::new();
	let is_identifier_symbol = |char: char| char.is_ascii_alphanumeric() || char == '_';
	let mut stream_iter = input_stream.chars().peekable();
	let mut line_number = 1;
	let mut column = 0;
	while let Some(current) = stream_iter.next() {
		column += 1;
		if current == '\n' {
			line_number += 1;
			column = 0;
			continue;
		}
		if current.is_whitespace() {
			continue;
		}
		// Handle line comments
		if current == '/' && stream_iter.peek().is_some_and(|x| *x == '/') {
			while stream_iter.next_if(|x| *x != '\n').is_some() {}
			continue;
		}
		if current == '/' && stream_iter.next_if(|x| *x == '*').is_some() {
			column += 1;
			let start_line = line_number;
			loop {
				match stream_iter.next() {
					Some('*') if stream_iter.peek() == Some(&'/') => {
						stream_iter.next();
						column += 2;
						break;
					}
					Some('\n') => {
						line_number += 1;
						column = 0;
					}
					Some(_) => column += 1,
					None => return Err(LexError::UnterminatedComment(start_line)),
				}
			}
			continue;
		}
		let start_column = column;
		let mut length = 1;
		let follows = |stream_iter: &mut Peekable<Chars>, c: char| stream_iter.next_if(|&i| i == c).is_some();
		let matched_token = match current {
			char if char.is_ascii_digit() => {
				let mut const_buffer = char.to_string();
				if char == '0' && stream_iter.next_if(|&i| i == 'x' || i == 'X').is_some() {
					const_buffer.clear();
					while let Some(char) = stream_iter.next_if(|i| i.is_ascii_hexdigit()) {
						const_buffer.push(char);
					}
					length = const_buffer.len() + 2;
					let value = u32::from_str_radix(&const_buffer, 16).map_err(|_| {
						LexError::IntegerOverflow {
							text: format!("0x{const_buffer}"),
							line: line_number,
						}
					})?;
					Token::IntConstant(value as i32)
				} else {
					while let Some(char) = stream_iter.next_if(|i| i.is_ascii_digit()) {
						const_buffer.push(char);
					}
					let is_double = stream_iter.next_if(|&i| i == '.').is_some();
					if is_double {
						const_buffer.push('.');
						while let Some(char) = stream_iter.next_if(|i| i.is_ascii_digit()) {
							const_buffer.push(char);
						}
						if let Some(e) = stream_iter.next_if(|&i| i == 'e' || i == 'E') {
							const_buffer.push(e);
							if let Some(sign) = stream_iter.next_if(|&i| i == '+' || i == '-') {
								const_buffer.push(sign);
							}
							while let Some(char) = stream_iter.next_if(|i| i.is_ascii_digit()) {
								const_buffer.push(char);
							}
						}
					}
					length = const_buffer.len();
					if is_double {
						Token::DoubleConstant(const_buffer.parse().unwrap_or(0.0))
					} else {
						Token::IntConstant(const_buffer.parse().map_err(|_| {
							LexError::IntegerOverflow {
								text: const_buffer.clone(),
								line: line_number,
							}
						})?)
					}
				}
			}
			char if is_identifier_symbol(char) => {
				let mut ident_buffer = char.to_string();
				while let Some(char) = stream_iter.next_if(|&i| is_identifier_symbol(i)) {
					ident_buffer.push(char);
				}
				length = ident_buffer.len();
				keywords(&ident_buffer).unwrap_or(Token::Identifier(ident_buffer))
			}
			'\"' => {
				let mut literal_buffer = String::new();
				while let Some(char) = stream_iter.next_if(|&i| i != '\"' && i != '\n') {
					literal_buffer.push(char);
				}
				if stream_iter.next_if(|&i| i == '\"').is_none() {
					return Err(LexError::UnterminatedString(line_number));
				}
				length = literal_buffer.chars().count() + 2;
				Token::StringConstant(literal_buffer)
			}
			'+' if follows(&mut stream_iter, '+') => Token::PlusPlus,
			'-' if follows(&mut stream_iter, '-') => Token::MinusMinus,
			'=' if follows(&mut stream_iter, '=') => Token::EqualEqual,
			'!' if follows(&mut stream_iter, '=') => Token::BangEqual,
			'<' if follows(&mut stream_iter, '=') => Token::LessEqual,
			'>' if follows(&mut stream_iter, '=') => Token::GreaterEqual,
			'&' if follows(&mut stream_iter, '&') => Token::AmpAmp,
			'|' if follows(&mut stream_iter, '|') => Token::PipePipe,
			'+' => Token::Plus,
			'-' => Token::Minus,
			'=' => Token::Equal,
			'!' => Token::Bang,
			'<' => Token::Less,
			'>' => Token::Greater,
			'*' => Token::Star,
			'/' => Token::Slash,
			'%' => Token::Percent,
			'.' => Token::Dot,
			':' => Token::Colon,
			',' => Token::Comma,
			';' => Token::Semicolon,
			'(' => Token::LeftParenthesis,
			')' => Token::RightParenthesis,
			'{' => Token::LeftBrace,
			'}' => Token::RightBrace,
			'[' => Token::LeftSquare,
			']' => Token::RightSquare,
			x => {
				return Err(LexError::UnexpectedChar {
					char: x,
					line: line_number,
				})
			}
		};
		if matches!(
			matched_token,
			Token::PlusPlus
				| Token::MinusMinus
				| Token::EqualEqual
				| Token::BangEqual
				| Token::LessEqual
				| Token::GreaterEqual
				| Token::AmpAmp
				| Token::PipePipe
		) {
			length = 2;
		}
		column = start_column + length - 1;
		symbol.push(Symbol(
			matched_token,
			Span::new(line_number, start_column, length),
		));
	}
	symbol.push(Symbol(Token::Eof, Span::new(line_number, column + 1, 1)));
	Ok(symbol)
}

fn keywords(id: &str) -> Option<Token> {
	use Reserved::*;
	let reserved = match id {
		"void" => Void,
		"int" => Int,
		"double" => Double,
		"bool" => Bool,
		"string" => String,
		"class" => Class,
		"interface" => Interface,
		"null" => Null,
		"this" => This,
		"extends" => Extends,
		"implements" => Implements,
		"for" => For,
		"while" => While,
		"if" => If,
		"else" => Else,
		"return" => Return,
		"break" => Break,
		"new" => New,
		"NewArray" => NewArray,
		"Print" => Print,
		"ReadInteger" => ReadInteger,
		"ReadLine" => ReadLine,
		"true" => True,
		"false" => False,
		"switch" => Switch,
		"case" => Case,
		"default" => Default,
		_ => return None,
	};
	Some(Token::Keyword(reserved))
}

#[cfg(test)]
mod test {
	use super::*;

	fn tokens(source: &str) -> Vec<Token> {
		tokenize(source)
			.unwrap()
			.into_iter()
			.map(|Symbol(token, _)| token)
			.collect()
	}

	#[test]
	fn comments() {
		assert_eq!(tokens(""), vec![Token::Eof]);
		assert_eq!(tokens("//"), vec![Token::Eof]);
		assert_eq!(
			tokens(
				r"
				/*
					Some text
				*/
				"
			),
			vec![Token::Eof]
		);
		assert_eq!(
			tokenize("/* never closed"),
			Err(LexError::UnterminatedComment(1))
		);
	}

	#[test]
	fn program() {
		use Reserved::*;
		use Token::*;
		assert_eq!(
			tokens(
				r#"
class A extends B {
	int[] xs;
	void f() { xs[0]++; Print("hi", 0x1F, 1.5); }
}
"#
			),
			vec![
				Keyword(Class),
				Identifier("A".into()),
				Keyword(Extends),
				Identifier("B".into()),
				LeftBrace,
				Keyword(Int),
				LeftSquare,
				RightSquare,
				Identifier("xs".into()),
				Semicolon,
				Keyword(Void),
				Identifier("f".into()),
				LeftParenthesis,
				RightParenthesis,
				LeftBrace,
				Identifier("xs".into()),
				LeftSquare,
				IntConstant(0),
				RightSquare,
				PlusPlus,
				Semicolon,
				Keyword(Print),
				LeftParenthesis,
				StringConstant("hi".into()),
				Comma,
				IntConstant(31),
				Comma,
				DoubleConstant(1.5),
				RightParenthesis,
				Semicolon,
				RightBrace,
				RightBrace,
				Eof,
			]
		);
	}

	#[test]
	fn spans() {
		let symbols = tokenize("int x;\n  x = 10;").unwrap();
		assert_eq!(symbols[0].span(), Span::new(1, 1, 3));
		assert_eq!(symbols[1].span(), Span::new(1, 5, 1));
		assert_eq!(symbols[3].span(), Span::new(2, 3, 1));
		assert_eq!(symbols[5].span(), Span::new(2, 7, 2));
	}

	#[test]
	fn operators() {
		use Token::*;
		assert_eq!(
			tokens("<= >= == != && || ! < > = -- -"),
			vec![
				LessEqual,
				GreaterEqual,
				EqualEqual,
				BangEqual,
				AmpAmp,
				PipePipe,
				Bang,
				Less,
				Greater,
				Equal,
				MinusMinus,
				Minus,
				Eof
			]
		);
		assert_eq!(
			tokenize("a & b"),
			Err(LexError::UnexpectedChar { char: '&', line: 1 })
		);
	}
}
