//! Symbol table
//!
//! One [`Scope`] per lexical construct, chained implicitly through the AST's
//! parent links.
use std::collections::HashMap;

use crate::ast::{Ast, DeclId};
use crate::errors::ErrorKind;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scope {
	table: HashMap<String, DeclId>,
}

impl Scope {
	pub fn find(&self, name: &str) -> Option<DeclId> {
		self.table.get(name).copied()
	}

	pub fn remove(&mut self, name: &str) -> Option<DeclId> {
		self.table.remove(name)
	}

	pub fn len(&self) -> usize {
		self.table.len()
	}

	pub fn is_empty(&self) -> bool {
		self.table.is_empty()
	}

	pub fn declarations(&self) -> impl Iterator<Item = DeclId> + '_ {
		self.table.values().copied()
	}

	/// Merges every entry of `other` that is not already present. Ancestor
	/// scopes are copied first, so the nearest ancestor wins.
	pub fn copy(&mut self, other: &Scope) {
		for (name, decl) in &other.table {
			self.table.entry(name.clone()).or_insert(*decl);
		}
	}

	/// Enters `decl` under its name.
	///
	/// A clash is only legal when a method replaces a signature-equivalent
	/// method copied in from a different class or interface. Any other clash
	/// with an inherited member is an override mismatch, a clash within one
	/// body is a conflict; both leave the scope untouched.
	pub fn declare(&mut self, decl: DeclId, ast: &Ast) -> Result<(), ErrorKind> {
		let name = ast[decl].name();
		let Some(previous) = self.find(name) else {
			self.table.insert(name.to_string(), decl);
			return Ok(());
		};
		let conflict = || ErrorKind::DeclConflict {
			name: name.to_string(),
			previous_line: ast[previous].id.span.first_line,
		};
		match (ast.member_owner(previous), ast.member_owner(decl)) {
			(Some(old_owner), Some(new_owner)) if old_owner != new_owner => {
				if !(ast[previous].is_function() && ast[decl].is_function())
					|| !ast.signatures_equivalent(previous, decl)
				{
					return Err(ErrorKind::OverrideMismatch(name.to_string()));
				}
				log::trace!("{} overrides {}.{name}", ast[decl].name(), ast[old_owner].name());
				self.table.insert(name.to_string(), decl);
				Ok(())
			}
			(Some(_), Some(_)) | (None, None) => Err(conflict()),
			_ => {
				self.table.insert(name.to_string(), decl);
				Ok(())
			}
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::{lexer::tokenize, parser::parse};

	fn members(ast: &Ast, class: usize) -> Vec<DeclId> {
		ast[ast.program[class]].members().to_vec()
	}

	#[test]
	fn duplicate_locals_conflict() {
		let ast = parse(tokenize("int a; int a; void a() {}").unwrap()).unwrap();
		let mut scope = Scope::default();
		assert_eq!(scope.declare(ast.program[0], &ast), Ok(()));
		assert!(matches!(
			scope.declare(ast.program[1], &ast),
			Err(ErrorKind::DeclConflict { .. })
		));
		assert!(matches!(
			scope.declare(ast.program[2], &ast),
			Err(ErrorKind::DeclConflict { .. })
		));
		assert_eq!(scope.find("a"), Some(ast.program[0]));
		assert_eq!(scope.len(), 1);
	}

	#[test]
	fn override_replaces_inherited() {
		let ast = parse(
			tokenize(
				r"
				class B { int x; int f(int a) {} void g() {} }
				class C extends B { int f(int b) {} int g() {} int x; }
				",
			)
			.unwrap(),
		)
		.unwrap();
		let base = members(&ast, 0);
		let derived = members(&ast, 1);
		let mut inherited = Scope::default();
		for decl in &base {
			inherited.declare(*decl, &ast).unwrap();
		}
		let mut scope = Scope::default();
		scope.copy(&inherited);
		assert_eq!(scope, inherited);

		assert_eq!(scope.declare(derived[0], &ast), Ok(()));
		assert_eq!(scope.find("f"), Some(derived[0]));
		assert_eq!(
			scope.declare(derived[1], &ast),
			Err(ErrorKind::OverrideMismatch("g".into()))
		);
		assert_eq!(scope.find("g"), Some(base[2]));
		assert_eq!(
			scope.declare(derived[2], &ast),
			Err(ErrorKind::OverrideMismatch("x".into()))
		);
		assert_eq!(scope.find("x"), Some(base[0]));
	}

	#[test]
	fn copy_keeps_existing_entries() {
		let ast = parse(tokenize("int a; int b; class C { int a; }").unwrap()).unwrap();
		let mut first = Scope::default();
		first.declare(ast.program[0], &ast).unwrap();
		let mut second = Scope::default();
		second.declare(members(&ast, 2)[0], &ast).unwrap();
		second.declare(ast.program[1], &ast).unwrap();
		first.copy(&second);
		assert_eq!(first.find("a"), Some(ast.program[0]));
		assert_eq!(first.find("b"), Some(ast.program[1]));
		assert_eq!(first.remove("b"), Some(ast.program[1]));
		assert_eq!(first.len(), 1);
	}
}
