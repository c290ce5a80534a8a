//! Type model
//!
//! Primitive and named types compare by name, arrays compare element-wise.
//! Subtyping between named types is answered from a [`Hierarchy`] built
//! once per program, so an assignability query never walks a class chain.
use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::ast::{Ast, DeclId, DeclKind, TypeId, TypeKind};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
	Int,
	Double,
	Bool,
	String,
	Void,
	Null,
	/// Result of anything already diagnosed, compatible with every type
	Error,
	/// A class or interface, by name
	Named(String),
	Array(Box<Type>),
}

impl Type {
	pub fn is_equivalent_to(&self, other: &Type) -> bool {
		match (self, other) {
			(Type::Array(elem), Type::Array(other_elem)) => elem.is_equivalent_to(other_elem),
			(Type::Named(name), Type::Named(other_name)) => name == other_name,
			(Type::Array(_), _) | (_, Type::Array(_)) => false,
			(Type::Named(_), _) | (_, Type::Named(_)) => false,
			(primitive, other_primitive) => primitive == other_primitive,
		}
	}

	pub fn is_error(&self) -> bool {
		matches!(self, Type::Error)
	}

	pub fn is_numeric(&self) -> bool {
		matches!(self, Type::Int | Type::Double)
	}

	pub fn is_object(&self) -> bool {
		matches!(self, Type::Named(_))
	}

	/// Whether a value of `self` may be stored where `target` is expected
	pub fn is_assignable_to(&self, target: &Type, hierarchy: &Hierarchy) -> bool {
		match (self, target) {
			(Type::Error, _) | (_, Type::Error) => true,
			(Type::Null, Type::Named(_)) => true,
			(Type::Named(sub), Type::Named(sup)) => hierarchy.is_subtype(sub, sup),
			_ => self.is_equivalent_to(target),
		}
	}

	/// Assignable in either direction
	pub fn is_compatible_with(&self, other: &Type, hierarchy: &Hierarchy) -> bool {
		self.is_assignable_to(other, hierarchy) || other.is_assignable_to(self, hierarchy)
	}
}

impl fmt::Display for Type {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Type::Int => f.write_str("int"),
			Type::Double => f.write_str("double"),
			Type::Bool => f.write_str("bool"),
			Type::String => f.write_str("string"),
			Type::Void => f.write_str("void"),
			Type::Null => f.write_str("null"),
			Type::Error => f.write_str("error"),
			Type::Named(name) => f.write_str(name),
			Type::Array(elem) => write!(f, "{elem}[]"),
		}
	}
}

/// Ancestor-name sets of every class and interface in a program.
///
/// A class's set holds its own name, the names along its superclass chain
/// and every interface implemented anywhere on that chain.
#[derive(Debug, Clone, Default)]
pub struct Hierarchy {
	ancestors: HashMap<String, HashSet<String>>,
}

impl Hierarchy {
	/// Expects class headers to be resolved already: `extends` and
	/// `implements` only name existing classes and interfaces. A cyclic chain
	/// stops at the first repeated class.
	pub fn build(ast: &Ast) -> Self {
		let mut ancestors = HashMap::new();
		for &decl in &ast.program {
			let name = ast[decl].name().to_string();
			let set = match &ast[decl].kind {
				DeclKind::Class { .. } => class_ancestors(ast, decl),
				DeclKind::Interface { .. } => HashSet::from([name.clone()]),
				_ => continue,
			};
			ancestors.entry(name).or_insert(set);
		}
		Self { ancestors }
	}

	pub fn is_subtype(&self, sub: &str, sup: &str) -> bool {
		sub == sup || self.ancestors.get(sub).is_some_and(|set| set.contains(sup))
	}

	pub fn ancestors(&self, name: &str) -> Option<&HashSet<String>> {
		self.ancestors.get(name)
	}
}

fn class_ancestors(ast: &Ast, class: DeclId) -> HashSet<String> {
	let mut names = HashSet::new();
	let mut visited = HashSet::new();
	let mut current = Some(class);
	while let Some(decl) = current {
		if !visited.insert(decl) {
			break;
		}
		names.insert(ast[decl].name().to_string());
		current = None;
		if let DeclKind::Class {
			extends,
			implements,
			..
		} = &ast[decl].kind
		{
			for interface in implements {
				if let Some(name) = named_type(ast, *interface) {
					names.insert(name.to_string());
				}
			}
			current = extends
				.and_then(|ty| named_type(ast, ty))
				.and_then(|name| ast.find_type_decl(name))
				.filter(|&d| ast[d].is_class());
		}
	}
	names
}

fn named_type(ast: &Ast, ty: TypeId) -> Option<&str> {
	match &ast[ty].kind {
		TypeKind::Named(id) => Some(&id.name),
		_ => None,
	}
}
