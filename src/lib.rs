//! Decaf compiler
//!
//! Source text goes through `lexer`, `parser` and the semantic checker in
//! `analyzer`. Programs without diagnostics are lowered to three address code
//! by `tac_gen`, then register allocated and emitted as MIPS by `mips_gen`.
pub mod analyzer;
pub mod ast;
pub mod errors;
pub mod lexer;
pub mod liveness;
pub mod mips_gen;
pub mod parser;
pub mod regalloc;
pub mod scope;
pub mod tac;
pub mod tac_gen;
pub mod types;

use ast::Ast;
use errors::{CompileError, Diagnostic};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
	/// Print the TAC listing instead of assembly
	pub debug_tac: bool,
	/// Allocatable registers, clamped to `1..=mips_gen::REGISTERS.len()`
	pub registers: usize,
}

impl Default for Options {
	fn default() -> Self {
		Self {
			debug_tac: false,
			registers: mips_gen::REGISTERS.len(),
		}
	}
}

/// Runs the semantic checker, annotating `ast` in place
pub fn check(ast: &mut Ast) -> Vec<Diagnostic> {
	analyzer::analyze(ast)
}

pub fn compile(source: &str, options: &Options) -> Result<String, CompileError> {
	let tokens = lexer::tokenize(source)?;
	let mut ast = parser::parse(tokens)?;
	let diagnostics = check(&mut ast);
	if !diagnostics.is_empty() {
		log::debug!("code generation skipped");
		return Err(CompileError::Semantic(diagnostics));
	}
	let program = tac_gen::generate(&ast);
	if options.debug_tac {
		return Ok(program.listing());
	}
	Ok(mips_gen::emit(&program, options.registers.max(1)))
}
