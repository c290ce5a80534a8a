//! Diagnostics
//!
//! Semantic errors are accumulated in a [`Reporter`] rather than returned,
//! the checker keeps going after each one.
use std::fmt;

use thiserror::Error;

use crate::ast::Span;
use crate::types::Type;

/// What an unresolved identifier was expected to name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
	LookingForType,
	LookingForClass,
	LookingForInterface,
	LookingForVariable,
	LookingForFunction,
}
impl fmt::Display for Reason {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Reason::LookingForType => "type",
			Reason::LookingForClass => "class",
			Reason::LookingForInterface => "interface",
			Reason::LookingForVariable => "variable",
			Reason::LookingForFunction => "function",
		})
	}
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ErrorKind {
	#[error("No declaration found for {reason} '{name}'")]
	IdentifierNotDeclared { name: String, reason: Reason },
	#[error("Declaration of '{name}' here conflicts with declaration on line {previous_line}")]
	DeclConflict { name: String, previous_line: usize },
	#[error("Method '{0}' must match inherited type signature")]
	OverrideMismatch(String),
	#[error("Class '{class}' does not implement entire interface '{interface}'")]
	InterfaceNotImplemented { class: String, interface: String },
	#[error("Class '{0}' inherits from itself")]
	InheritanceCycle(String),
	#[error("Incompatible operand: {op} {operand}")]
	IncompatibleOperand { op: String, operand: Type },
	#[error("Incompatible operands: {lhs} {op} {rhs}")]
	IncompatibleOperands { op: String, lhs: Type, rhs: Type },
	#[error("Test expression must have boolean type")]
	TestNotBoolean,
	#[error("Switch expression must have integer type")]
	SwitchTestNotInteger,
	#[error("[] can only be applied to arrays")]
	BracketsOnNonArray,
	#[error("Array subscript must be an integer")]
	SubscriptNotInteger,
	#[error("{base} has no such field '{field}'")]
	FieldNotFoundInBase { field: String, base: Type },
	#[error("{base} field '{field}' only accessible within class scope")]
	InaccessibleField { field: String, base: Type },
	#[error("Function '{function}' expects {expected} arguments but {given} given")]
	NumArgsMismatch {
		function: String,
		expected: usize,
		given: usize,
	},
	#[error("Incompatible argument {position}: {given} given, {expected} expected")]
	ArgMismatch {
		position: usize,
		given: Type,
		expected: Type,
	},
	#[error("Incompatible return: {given} given, {expected} expected")]
	ReturnMismatch { given: Type, expected: Type },
	#[error("break is only allowed inside a loop")]
	BreakOutsideLoop,
	#[error("Incompatible argument {position}: {given} given, int/bool/string expected")]
	PrintArgMismatch { position: usize, given: Type },
	#[error("'this' is only valid within class scope")]
	ThisOutsideClassScope,
	#[error("Size for NewArray must be an integer")]
	NewArraySizeNotInteger,
	#[error("Linker: function 'main' not defined")]
	NoMainFound,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
	pub kind: ErrorKind,
	pub span: Span,
}
impl fmt::Display for Diagnostic {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if self.span.first_line == 0 {
			write!(f, "*** Error.\n*** {}", self.kind)
		} else {
			write!(
				f,
				"*** Error line {}.\n*** {}",
				self.span.first_line, self.kind
			)
		}
	}
}

#[derive(Debug, Default)]
pub struct Reporter {
	diagnostics: Vec<Diagnostic>,
}
impl Reporter {
	pub fn report(&mut self, span: Span, kind: ErrorKind) {
		log::debug!("line {}: {kind}", span.first_line);
		self.diagnostics.push(Diagnostic { kind, span });
	}
	pub fn count(&self) -> usize {
		self.diagnostics.len()
	}
	pub fn into_diagnostics(self) -> Vec<Diagnostic> {
		self.diagnostics
	}
}

/// Everything that stops a compilation from producing code
#[derive(Error, Debug)]
pub enum CompileError {
	#[error(transparent)]
	Lex(#[from] crate::lexer::LexError),
	#[error(transparent)]
	Parse(#[from] crate::parser::ParseError),
	#[error("{} error(s) generated", .0.len())]
	Semantic(Vec<Diagnostic>),
}
