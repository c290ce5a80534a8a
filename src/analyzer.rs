//! Semantic Analyzer
//!
//! Takes a mutable reference to `ast::Ast`, annotates it with scopes, types
//! and resolved declarations, and returns every diagnostic found. Code
//! generation expects the annotations and must only run when the returned
//! list is empty.
use std::collections::HashSet;

use crate::ast::{
	Ast, DeclId, DeclKind, ExprId, ExprKind, Identifier, NodeRef, Operator, Resolution, Span,
	StmtId, StmtKind, TypeId, TypeKind,
};
use crate::errors::{Diagnostic, ErrorKind, Reason, Reporter};
use crate::scope::Scope;
use crate::types::{Hierarchy, Type};

pub fn analyze(ast: &mut Ast) -> Vec<Diagnostic> {
	let mut checker = Checker::new(ast);
	checker.declare_program();
	checker.check_program();
	checker.reporter.into_diagnostics()
}

struct Checker<'a> {
	ast: &'a mut Ast,
	reporter: Reporter,
	hierarchy: Hierarchy,
	/// Classes whose scope is under construction
	building: HashSet<DeclId>,
}

impl<'a> Checker<'a> {
	fn new(ast: &'a mut Ast) -> Self {
		Self {
			ast,
			reporter: Reporter::default(),
			hierarchy: Hierarchy::default(),
			building: HashSet::new(),
		}
	}

	fn report(&mut self, span: Span, kind: ErrorKind) {
		self.reporter.report(span, kind);
	}

	/// Only the authoritative pass over a node may report
	fn emit(&mut self, force: bool, span: Span, kind: ErrorKind) {
		if force {
			self.report(span, kind);
		}
	}

	/// Global scope, class headers, the subtype hierarchy and every class and
	/// interface scope
	fn declare_program(&mut self) {
		let program = self.ast.program.clone();
		let mut global = Scope::default();
		for &decl in &program {
			if let Err(kind) = global.declare(decl, self.ast) {
				let span = self.ast[decl].id.span;
				self.report(span, kind);
			}
		}
		self.ast.global_scope = global;

		for &decl in &program {
			if self.ast[decl].is_class() {
				self.resolve_header(decl);
			}
		}
		self.break_cycles(&program);
		self.hierarchy = Hierarchy::build(self.ast);

		for &decl in &program {
			self.build_scope(decl);
		}
	}

	fn check_program(&mut self) {
		let program = self.ast.program.clone();
		log::debug!("checking {} top level declarations", program.len());
		for &decl in &program {
			self.check_decl(decl);
		}
		let has_main = program.iter().any(|&decl| {
			self.ast[decl].name() == "main"
				&& matches!(&self.ast[decl].kind, DeclKind::Function { formals, .. } if formals.is_empty())
		});
		if !has_main {
			self.report(Span::default(), ErrorKind::NoMainFound);
		}
		log::debug!("check finished with {} error(s)", self.reporter.count());
	}

	fn resolve_header(&mut self, class: DeclId) {
		let DeclKind::Class {
			extends,
			implements,
			..
		} = &self.ast[class].kind
		else {
			return;
		};
		let (extends, implements) = (*extends, implements.clone());
		if let Some(ty) = extends {
			if self.resolve_named(ty, Reason::LookingForClass).is_none() {
				if let DeclKind::Class { extends, .. } = &mut self.ast[class].kind {
					*extends = None;
				}
			}
		}
		let kept: Vec<TypeId> = implements
			.into_iter()
			.filter(|&ty| self.resolve_named(ty, Reason::LookingForInterface).is_some())
			.collect();
		if let DeclKind::Class { implements, .. } = &mut self.ast[class].kind {
			*implements = kept;
		}
	}

	/// Resolves a class header reference, reporting when it names nothing of
	/// the wanted kind
	fn resolve_named(&mut self, ty: TypeId, reason: Reason) -> Option<DeclId> {
		let TypeKind::Named(id) = &self.ast[ty].kind else {
			return None;
		};
		let id = id.clone();
		let found = self.ast.find_type_decl(&id.name).filter(|&decl| match reason {
			Reason::LookingForClass => self.ast[decl].is_class(),
			_ => self.ast[decl].is_interface(),
		});
		match found {
			Some(decl) => self.ast[ty].resolution = Resolution::Resolved(decl),
			None => {
				self.ast[ty].resolution = Resolution::Reported;
				self.report(
					id.span,
					ErrorKind::IdentifierNotDeclared {
						name: id.name,
						reason,
					},
				);
			}
		}
		found
	}

	/// Cuts the `extends` link of every class whose superclass chain leads
	/// back to itself
	fn break_cycles(&mut self, program: &[DeclId]) {
		for &class in program {
			let mut seen = HashSet::new();
			let mut current = self.ast.superclass(class);
			while let Some(ancestor) = current {
				if ancestor == class {
					let name = self.ast[class].name().to_string();
					let span = match &self.ast[class].kind {
						DeclKind::Class {
							extends: Some(ty), ..
						} => self.ast[*ty].span,
						_ => self.ast[class].id.span,
					};
					self.report(span, ErrorKind::InheritanceCycle(name));
					if let DeclKind::Class { extends, .. } = &mut self.ast[class].kind {
						*extends = None;
					}
					break;
				}
				if !seen.insert(ancestor) {
					break;
				}
				current = self.ast.superclass(ancestor);
			}
		}
	}

	/// Builds the member scope of a class or interface, after the scopes it
	/// inherits from
	fn build_scope(&mut self, decl: DeclId) {
		let is_type = self.ast[decl].is_class() || self.ast[decl].is_interface();
		if !is_type || self.ast[decl].scope.is_some() || !self.building.insert(decl) {
			return;
		}
		let mut scope = Scope::default();
		match self.ast[decl].kind.clone() {
			DeclKind::Class {
				implements,
				members,
				..
			} => {
				if let Some(parent) = self.ast.superclass(decl) {
					self.build_scope(parent);
					if let Some(inherited) = &self.ast[parent].scope {
						scope.copy(inherited);
					}
				}
				let interfaces: Vec<DeclId> = implements
					.iter()
					.filter_map(|&ty| match self.ast[ty].resolution {
						Resolution::Resolved(decl) => Some(decl),
						_ => None,
					})
					.collect();
				for &interface in &interfaces {
					self.build_scope(interface);
					if let Some(required) = &self.ast[interface].scope {
						scope.copy(required);
					}
				}
				self.declare_all(&mut scope, &members);
				for &interface in &interfaces {
					if !self.implements_all(&scope, interface) {
						let span = self.ast[decl].id.span;
						let kind = ErrorKind::InterfaceNotImplemented {
							class: self.ast[decl].name().to_string(),
							interface: self.ast[interface].name().to_string(),
						};
						self.report(span, kind);
					}
				}
			}
			DeclKind::Interface { members } => self.declare_all(&mut scope, &members),
			_ => {}
		}
		log::trace!(
			"scope of {} holds {} names",
			self.ast[decl].name(),
			scope.len()
		);
		self.ast[decl].scope = Some(scope);
		self.building.remove(&decl);
	}

	fn declare_all(&mut self, scope: &mut Scope, decls: &[DeclId]) {
		for &decl in decls {
			if let Err(kind) = scope.declare(decl, self.ast) {
				let span = self.ast[decl].id.span;
				self.report(span, kind);
			}
		}
	}

	/// Every prototype of `interface` is provided by a class method with an
	/// equivalent signature
	fn implements_all(&self, scope: &Scope, interface: DeclId) -> bool {
		self.ast[interface].members().iter().all(|&required| {
			scope
				.find(self.ast[required].name())
				.is_some_and(|provided| {
					self.ast
						.member_owner(provided)
						.is_some_and(|owner| self.ast[owner].is_class())
						&& self.ast.signatures_equivalent(provided, required)
				})
		})
	}

	fn check_decl(&mut self, decl: DeclId) {
		match self.ast[decl].kind.clone() {
			DeclKind::Variable { ty } => self.check_type(ty, true),
			DeclKind::Class { members, .. } | DeclKind::Interface { members } => {
				for member in members {
					self.check_decl(member);
				}
			}
			DeclKind::Function {
				return_type,
				formals,
				body,
			} => {
				self.check_type(return_type, true);
				let mut scope = Scope::default();
				self.declare_all(&mut scope, &formals);
				for &formal in &formals {
					self.check_decl(formal);
				}
				self.ast[decl].scope = Some(scope);
				if let Some(body) = body {
					self.check_stmt(body);
				}
			}
		}
	}

	/// Resolves the class names a type node mentions.
	///
	/// A failed lookup is reported only when `force` is set, and each node is
	/// reported at most once.
	fn check_type(&mut self, ty: TypeId, force: bool) {
		match &self.ast[ty].kind {
			TypeKind::Array(elem) => {
				let elem = *elem;
				self.check_type(elem, force);
			}
			TypeKind::Named(id) => {
				match self.ast[ty].resolution {
					Resolution::Resolved(_) | Resolution::Reported => return,
					Resolution::Silent if !force => return,
					_ => {}
				}
				let id = id.clone();
				self.ast[ty].resolution = match self.ast.find_type_decl(&id.name) {
					Some(decl) => Resolution::Resolved(decl),
					None if force => {
						self.report(
							id.span,
							ErrorKind::IdentifierNotDeclared {
								name: id.name,
								reason: Reason::LookingForType,
							},
						);
						Resolution::Reported
					}
					None => Resolution::Silent,
				};
			}
			_ => {}
		}
	}

	/// Semantic type of an already checked type node, `Error` if any class
	/// name in it failed to resolve
	fn type_of(&self, ty: TypeId) -> Type {
		match &self.ast[ty].kind {
			TypeKind::Named(id) => match self.ast[ty].resolution {
				Resolution::Resolved(_) => Type::Named(id.name.clone()),
				_ => Type::Error,
			},
			TypeKind::Array(elem) => match self.type_of(*elem) {
				Type::Error => Type::Error,
				elem => Type::Array(Box::new(elem)),
			},
			_ => self.ast.syntax_type(ty),
		}
	}

	/// Type of a variable, or return type of a function
	fn declared_type(&mut self, decl: DeclId) -> Type {
		match self.ast.declared_type_node(decl) {
			Some(ty) => {
				self.check_type(ty, false);
				self.type_of(ty)
			}
			None => Type::Error,
		}
	}

	fn check_stmt(&mut self, stmt: StmtId) {
		match self.ast[stmt].kind.clone() {
			StmtKind::Block { decls, stmts } => {
				let mut scope = Scope::default();
				self.declare_all(&mut scope, &decls);
				for &decl in &decls {
					self.check_decl(decl);
				}
				self.ast[stmt].scope = Some(scope);
				for stmt in stmts {
					self.check_stmt(stmt);
				}
			}
			StmtKind::If {
				test,
				then_body,
				else_body,
			} => {
				self.check_test(test);
				self.check_stmt(then_body);
				if let Some(else_body) = else_body {
					self.check_stmt(else_body);
				}
			}
			StmtKind::While { test, body } => {
				self.check_test(test);
				self.check_stmt(body);
			}
			StmtKind::For {
				init,
				test,
				step,
				body,
			} => {
				self.expr_type(init, true);
				self.check_test(test);
				self.expr_type(step, true);
				self.check_stmt(body);
			}
			StmtKind::Switch { test, cases } => {
				let ty = self.expr_type(test, true);
				if !matches!(ty, Type::Int | Type::Error) {
					let span = self.ast[test].span;
					self.report(span, ErrorKind::SwitchTestNotInteger);
				}
				for case in cases {
					self.check_stmt(case);
				}
			}
			StmtKind::Case { body, .. } => {
				self.ast[stmt].scope = Some(Scope::default());
				for stmt in body {
					self.check_stmt(stmt);
				}
			}
			StmtKind::Break => {
				if !self.inside_breakable(stmt) {
					let span = self.ast[stmt].span;
					self.report(span, ErrorKind::BreakOutsideLoop);
				}
			}
			StmtKind::Return(value) => {
				let given = self.expr_type(value, true);
				let expected = match self.ast.enclosing_function(NodeRef::Stmt(stmt)) {
					Some(function) => self.declared_type(function),
					None => Type::Error,
				};
				if !given.is_assignable_to(&expected, &self.hierarchy) {
					let span = match self.ast[value].kind {
						ExprKind::Empty => self.ast[stmt].span,
						_ => self.ast[value].span,
					};
					self.report(span, ErrorKind::ReturnMismatch { given, expected });
				}
			}
			StmtKind::Print(args) => {
				for (index, arg) in args.into_iter().enumerate() {
					let given = self.expr_type(arg, true);
					if !matches!(given, Type::Int | Type::Bool | Type::String | Type::Error) {
						let span = self.ast[arg].span;
						self.report(
							span,
							ErrorKind::PrintArgMismatch {
								position: index + 1,
								given,
							},
						);
					}
				}
			}
			StmtKind::Expr(expr) => {
				self.expr_type(expr, true);
			}
		}
	}

	fn check_test(&mut self, test: ExprId) {
		let ty = self.expr_type(test, true);
		if !matches!(ty, Type::Bool | Type::Error) {
			let span = self.ast[test].span;
			self.report(span, ErrorKind::TestNotBoolean);
		}
	}

	fn inside_breakable(&self, stmt: StmtId) -> bool {
		self.ast
			.ancestors(NodeRef::Stmt(stmt))
			.skip(1)
			.take_while(|node| !matches!(node, NodeRef::Decl(_)))
			.any(|node| matches!(node, NodeRef::Stmt(id) if self.ast[id].is_breakable()))
	}

	/// Type of `expr`, computed once and cached on the node.
	///
	/// An unforced query returns the cached type when there is one and never
	/// reports or rewrites the tree. A forced query recomputes, reports what
	/// it finds and records resolved targets; the statement walk forces each
	/// node exactly once.
	fn expr_type(&mut self, expr: ExprId, force: bool) -> Type {
		if !force {
			if let Some(ty) = &self.ast[expr].ty {
				return ty.clone();
			}
		}
		let ty = self.compute_type(expr, force);
		self.ast[expr].ty = Some(ty.clone());
		ty
	}

	fn compute_type(&mut self, expr: ExprId, force: bool) -> Type {
		let span = self.ast[expr].span;
		match self.ast[expr].kind.clone() {
			ExprKind::IntConstant(_) | ExprKind::ReadInteger => Type::Int,
			ExprKind::DoubleConstant(_) => Type::Double,
			ExprKind::BoolConstant(_) => Type::Bool,
			ExprKind::StringConstant(_) | ExprKind::ReadLine => Type::String,
			ExprKind::NullConstant => Type::Null,
			ExprKind::Empty => Type::Void,
			ExprKind::Arithmetic { op, left, right } => {
				let operand = self.numeric_operands(force, span, op, left, right);
				if operand.is_error() {
					Type::Error
				} else {
					operand
				}
			}
			ExprKind::Relational { op, left, right } => {
				self.numeric_operands(force, span, op, Some(left), right);
				Type::Bool
			}
			ExprKind::Equality { op, left, right } => {
				let lhs = self.expr_type(left, force);
				let rhs = self.expr_type(right, force);
				if !lhs.is_compatible_with(&rhs, &self.hierarchy) {
					let kind = ErrorKind::IncompatibleOperands {
						op: op.to_string(),
						lhs,
						rhs,
					};
					self.emit(force, span, kind);
				}
				Type::Bool
			}
			ExprKind::Logical { op, left, right } => {
				let lhs = left.map(|left| self.expr_type(left, force));
				let rhs = self.expr_type(right, force);
				let boolean = |ty: &Type| matches!(ty, Type::Bool | Type::Error);
				match lhs {
					None if !boolean(&rhs) => {
						let kind = ErrorKind::IncompatibleOperand {
							op: op.to_string(),
							operand: rhs,
						};
						self.emit(force, span, kind);
					}
					Some(lhs) if !(boolean(&lhs) && boolean(&rhs)) => {
						let kind = ErrorKind::IncompatibleOperands {
							op: op.to_string(),
							lhs,
							rhs,
						};
						self.emit(force, span, kind);
					}
					_ => {}
				}
				Type::Bool
			}
			ExprKind::Assign { left, right } => {
				let lhs = self.expr_type(left, force);
				let rhs = self.expr_type(right, force);
				if rhs.is_assignable_to(&lhs, &self.hierarchy) {
					lhs
				} else {
					let kind = ErrorKind::IncompatibleOperands {
						op: Operator::Assign.to_string(),
						lhs,
						rhs,
					};
					self.emit(force, span, kind);
					Type::Error
				}
			}
			ExprKind::Postfix { op, operand } => match self.expr_type(operand, force) {
				Type::Int => Type::Int,
				Type::Error => Type::Error,
				operand => {
					let kind = ErrorKind::IncompatibleOperand {
						op: op.to_string(),
						operand,
					};
					self.emit(force, span, kind);
					Type::Error
				}
			},
			ExprKind::This => match self.ast.enclosing_class(NodeRef::Expr(expr)) {
				Some(class) => Type::Named(self.ast[class].name().to_string()),
				None => {
					self.emit(force, span, ErrorKind::ThisOutsideClassScope);
					Type::Error
				}
			},
			ExprKind::ArrayAccess { base, subscript } => {
				let base_type = self.expr_type(base, force);
				let subscript_type = self.expr_type(subscript, force);
				let elem = match base_type {
					Type::Array(elem) => *elem,
					Type::Error => Type::Error,
					_ => {
						let base_span = self.ast[base].span;
						self.emit(force, base_span, ErrorKind::BracketsOnNonArray);
						Type::Error
					}
				};
				if !matches!(subscript_type, Type::Int | Type::Error) {
					let subscript_span = self.ast[subscript].span;
					self.emit(force, subscript_span, ErrorKind::SubscriptNotInteger);
				}
				elem
			}
			ExprKind::FieldAccess { base, field } => {
				let Some(base) = base else {
					let found = self
						.ast
						.find_decl(NodeRef::Expr(expr), &field.name)
						.filter(|&decl| self.ast[decl].is_variable());
					let Some(variable) = found else {
						let kind = ErrorKind::IdentifierNotDeclared {
							name: field.name,
							reason: Reason::LookingForVariable,
						};
						self.emit(force, field.span, kind);
						return Type::Error;
					};
					if force {
						self.ast[expr].target = Some(variable);
						if self
							.ast
							.member_owner(variable)
							.is_some_and(|owner| self.ast[owner].is_class())
						{
							self.attach_this(expr);
						}
					}
					return self.declared_type(variable);
				};
				let base_type = self.expr_type(base, force);
				let Type::Named(class) = &base_type else {
					if !base_type.is_error() {
						let kind = ErrorKind::FieldNotFoundInBase {
							field: field.name,
							base: base_type,
						};
						self.emit(force, field.span, kind);
					}
					return Type::Error;
				};
				let Some(variable) = self
					.member(class, &field.name)
					.filter(|&decl| self.ast[decl].is_variable())
				else {
					let kind = ErrorKind::FieldNotFoundInBase {
						field: field.name,
						base: base_type,
					};
					self.emit(force, field.span, kind);
					return Type::Error;
				};
				if !self.field_accessible(expr, &base_type) {
					let kind = ErrorKind::InaccessibleField {
						field: field.name,
						base: base_type,
					};
					self.emit(force, field.span, kind);
				}
				if force {
					self.ast[expr].target = Some(variable);
				}
				self.declared_type(variable)
			}
			ExprKind::Call {
				base,
				field,
				actuals,
			} => self.call_type(expr, force, base, field, actuals),
			ExprKind::New(ty) => {
				let TypeKind::Named(id) = self.ast[ty].kind.clone() else {
					return Type::Error;
				};
				match self
					.ast
					.find_type_decl(&id.name)
					.filter(|&decl| self.ast[decl].is_class())
				{
					Some(class) => {
						self.ast[ty].resolution = Resolution::Resolved(class);
						Type::Named(id.name)
					}
					None => {
						if force {
							self.ast[ty].resolution = Resolution::Reported;
						}
						let kind = ErrorKind::IdentifierNotDeclared {
							name: id.name,
							reason: Reason::LookingForClass,
						};
						self.emit(force, id.span, kind);
						Type::Error
					}
				}
			}
			ExprKind::NewArray { size, elem } => {
				let size_type = self.expr_type(size, force);
				if !matches!(size_type, Type::Int | Type::Error) {
					let size_span = self.ast[size].span;
					self.emit(force, size_span, ErrorKind::NewArraySizeNotInteger);
				}
				self.check_type(elem, force);
				match self.type_of(elem) {
					Type::Error => Type::Error,
					elem => Type::Array(Box::new(elem)),
				}
			}
		}
	}

	/// Checks the operands of an arithmetic or relational operator and returns
	/// their common type, `Error` when they have none
	fn numeric_operands(
		&mut self,
		force: bool,
		span: Span,
		op: Operator,
		left: Option<ExprId>,
		right: ExprId,
	) -> Type {
		let lhs = left.map(|left| self.expr_type(left, force));
		let rhs = self.expr_type(right, force);
		match lhs {
			None if rhs.is_error() || rhs.is_numeric() => rhs,
			None => {
				let kind = ErrorKind::IncompatibleOperand {
					op: op.to_string(),
					operand: rhs,
				};
				self.emit(force, span, kind);
				Type::Error
			}
			Some(lhs) if lhs.is_error() || rhs.is_error() => Type::Error,
			Some(lhs) if lhs.is_numeric() && lhs.is_equivalent_to(&rhs) => lhs,
			Some(lhs) => {
				let kind = ErrorKind::IncompatibleOperands {
					op: op.to_string(),
					lhs,
					rhs,
				};
				self.emit(force, span, kind);
				Type::Error
			}
		}
	}

	fn call_type(
		&mut self,
		expr: ExprId,
		force: bool,
		base: Option<ExprId>,
		field: Identifier,
		actuals: Vec<ExprId>,
	) -> Type {
		let callee = match base {
			Some(base) => {
				let base_type = self.expr_type(base, force);
				let found = match &base_type {
					Type::Array(_) if field.name == "length" => {
						if !actuals.is_empty() {
							let kind = ErrorKind::NumArgsMismatch {
								function: field.name.clone(),
								expected: 0,
								given: actuals.len(),
							};
							self.emit(force, field.span, kind);
						}
						self.check_actuals(&actuals, force);
						return Type::Int;
					}
					Type::Named(class) => self
						.member(class, &field.name)
						.filter(|&decl| self.ast[decl].is_function()),
					_ => None,
				};
				match found {
					Some(function) => function,
					None => {
						if !base_type.is_error() {
							let kind = ErrorKind::FieldNotFoundInBase {
								field: field.name,
								base: base_type,
							};
							self.emit(force, field.span, kind);
						}
						self.check_actuals(&actuals, force);
						return Type::Error;
					}
				}
			}
			None => {
				let found = self
					.ast
					.find_decl(NodeRef::Expr(expr), &field.name)
					.filter(|&decl| self.ast[decl].is_function());
				let Some(function) = found else {
					let kind = ErrorKind::IdentifierNotDeclared {
						name: field.name,
						reason: Reason::LookingForFunction,
					};
					self.emit(force, field.span, kind);
					self.check_actuals(&actuals, force);
					return Type::Error;
				};
				if force && self.ast.is_method(function) {
					self.attach_this(expr);
				}
				function
			}
		};
		if force {
			self.ast[expr].target = Some(callee);
		}

		let formals = self.ast.formals(callee).to_vec();
		if formals.len() != actuals.len() {
			let kind = ErrorKind::NumArgsMismatch {
				function: field.name.clone(),
				expected: formals.len(),
				given: actuals.len(),
			};
			self.emit(force, field.span, kind);
		}
		for (index, &actual) in actuals.iter().enumerate() {
			let given = self.expr_type(actual, force);
			let Some(&formal) = formals.get(index) else {
				continue;
			};
			let expected = self.declared_type(formal);
			if !given.is_assignable_to(&expected, &self.hierarchy) {
				let span = self.ast[actual].span;
				let kind = ErrorKind::ArgMismatch {
					position: index + 1,
					given,
					expected,
				};
				self.emit(force, span, kind);
			}
		}
		self.declared_type(callee)
	}

	fn check_actuals(&mut self, actuals: &[ExprId], force: bool) {
		for &actual in actuals {
			self.expr_type(actual, force);
		}
	}

	/// Member `name` of class or interface `type_name`, inherited ones included
	fn member(&self, type_name: &str, name: &str) -> Option<DeclId> {
		let decl = self.ast.find_type_decl(type_name)?;
		self.ast[decl].scope.as_ref()?.find(name)
	}

	/// Fields are only reachable from code inside a class related to the base
	fn field_accessible(&self, expr: ExprId, base_type: &Type) -> bool {
		self.ast
			.enclosing_class(NodeRef::Expr(expr))
			.is_some_and(|class| {
				Type::Named(self.ast[class].name().to_string())
					.is_compatible_with(base_type, &self.hierarchy)
			})
	}

	/// Gives a bare field access or method call an explicit `this` base
	fn attach_this(&mut self, expr: ExprId) {
		let Some(class) = self.ast.enclosing_class(NodeRef::Expr(expr)) else {
			return;
		};
		let span = self.ast[expr].span;
		let this = self.ast.add_expr(ExprKind::This, span);
		self.ast[this].parent = NodeRef::Expr(expr);
		self.ast[this].ty = Some(Type::Named(self.ast[class].name().to_string()));
		match &mut self.ast[expr].kind {
			ExprKind::FieldAccess { base, .. } | ExprKind::Call { base, .. } => *base = Some(this),
			_ => {}
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::{lexer::tokenize, parser::parse};

	fn parse_str(source: &str) -> Ast {
		parse(tokenize(source).unwrap()).unwrap()
	}

	fn diagnostics(source: &str) -> Vec<ErrorKind> {
		let mut ast = parse_str(source);
		analyze(&mut ast).into_iter().map(|d| d.kind).collect()
	}

	fn find_expr(ast: &Ast, pred: impl Fn(&ExprKind) -> bool) -> ExprId {
		ast.exprs
			.iter()
			.position(|e| pred(&e.kind))
			.map(ExprId)
			.unwrap()
	}

	#[test]
	fn class_members_and_return_type() {
		let mut ast = parse_str("class A { int x; int f(int y) { return y + x; } } void main() {}");
		assert_eq!(analyze(&mut ast), vec![]);
		let class = ast.program[0];
		let scope = ast[class].scope.as_ref().unwrap();
		assert!(scope.find("x").is_some());
		assert!(scope.find("f").is_some());
		let sum = find_expr(&ast, |k| matches!(k, ExprKind::Arithmetic { .. }));
		assert_eq!(ast[sum].ty, Some(Type::Int));
		let x = find_expr(&ast, |k| matches!(k, ExprKind::FieldAccess { field, .. } if field.name == "x"));
		let ExprKind::FieldAccess { base: Some(this), .. } = ast[x].kind else {
			panic!("implicit this was not attached");
		};
		assert!(matches!(ast[this].kind, ExprKind::This));
		assert_eq!(ast[this].parent, NodeRef::Expr(x));
		assert_eq!(ast[x].target, scope.find("x"));
	}

	#[test]
	fn subclass_argument() {
		assert_eq!(
			diagnostics(
				r"
				class A {} class B extends A {}
				void f(A a) {}
				void main() { f(new B()); f(new(B)); }
				"
			),
			vec![]
		);
	}

	#[test]
	fn undeclared_function() {
		assert_eq!(
			diagnostics("void main() { int x; x = g() + 1; x = g().y; }"),
			vec![
				ErrorKind::IdentifierNotDeclared {
					name: "g".into(),
					reason: Reason::LookingForFunction,
				},
				ErrorKind::IdentifierNotDeclared {
					name: "g".into(),
					reason: Reason::LookingForFunction,
				},
			]
		);
	}

	#[test]
	fn arity_mismatch_still_checks_arguments() {
		assert_eq!(
			diagnostics("void f(int a) {} void main() { f(1, 2, 3); f(true, 2); }"),
			vec![
				ErrorKind::NumArgsMismatch {
					function: "f".into(),
					expected: 1,
					given: 3,
				},
				ErrorKind::NumArgsMismatch {
					function: "f".into(),
					expected: 1,
					given: 2,
				},
				ErrorKind::ArgMismatch {
					position: 1,
					given: Type::Bool,
					expected: Type::Int,
				},
			]
		);
		assert_eq!(
			diagnostics("void f(int a, bool b) {} void main() { f(true, 1); }"),
			vec![
				ErrorKind::ArgMismatch {
					position: 1,
					given: Type::Bool,
					expected: Type::Int,
				},
				ErrorKind::ArgMismatch {
					position: 2,
					given: Type::Int,
					expected: Type::Bool,
				},
			]
		);
	}

	#[test]
	fn override_and_duplicate_members() {
		let errors = diagnostics(
			r"
			class B { int x; void f() {} }
			class C extends B { int y; int y; void f() {} }
			void main() {}
			",
		);
		assert_eq!(errors.len(), 1);
		assert!(matches!(&errors[0], ErrorKind::DeclConflict { name, .. } if name == "y"));
		assert_eq!(
			diagnostics("class B { int x; } class C extends B { int x; } void main() {}"),
			vec![ErrorKind::OverrideMismatch("x".into())]
		);
		assert_eq!(
			diagnostics("class B { int f; } class C extends B { void f() {} } void main() {}"),
			vec![ErrorKind::OverrideMismatch("f".into())]
		);
	}

	#[test]
	fn interface_obligations() {
		assert_eq!(
			diagnostics("interface I { int m(); } class A implements I { void m() {} } void main() {}"),
			vec![
				ErrorKind::OverrideMismatch("m".into()),
				ErrorKind::InterfaceNotImplemented {
					class: "A".into(),
					interface: "I".into(),
				},
			]
		);
		assert_eq!(
			diagnostics(
				r"
				interface I { int m(); }
				class A { int m() { return 1; } }
				class B extends A implements I {}
				void main() { I i; i = new B(); }
				"
			),
			vec![]
		);
		assert_eq!(
			diagnostics("class A implements Missing {} void main() {}"),
			vec![ErrorKind::IdentifierNotDeclared {
				name: "Missing".into(),
				reason: Reason::LookingForInterface,
			}]
		);
	}

	#[test]
	fn error_type_suppresses_cascades() {
		assert_eq!(
			diagnostics("void main() { Print(y + 1 * 2, -y, y[0]); }"),
			vec![
				ErrorKind::IdentifierNotDeclared {
					name: "y".into(),
					reason: Reason::LookingForVariable,
				};
				3
			]
		);
		assert_eq!(
			diagnostics("void main() { Foo a; a = a; a.m(); }"),
			vec![ErrorKind::IdentifierNotDeclared {
				name: "Foo".into(),
				reason: Reason::LookingForType,
			}]
		);
	}

	#[test]
	fn operator_rules() {
		assert_eq!(
			diagnostics(
				r#"
				void main() {
					int i; double d; bool b;
					i = i + d;
					b = !i;
					b = i < 2;
					b = "a" == "b";
					i++;
					d++;
				}
				"#
			),
			vec![
				ErrorKind::IncompatibleOperands {
					op: "+".into(),
					lhs: Type::Int,
					rhs: Type::Double,
				},
				ErrorKind::IncompatibleOperand {
					op: "!".into(),
					operand: Type::Int,
				},
				ErrorKind::IncompatibleOperand {
					op: "++".into(),
					operand: Type::Double,
				},
			]
		);
	}

	#[test]
	fn null_compatibility() {
		assert_eq!(
			diagnostics(
				r"
				class A {}
				void main() {
					int[] a; A o;
					a = null; o = null;
					if (a == null) {}
					if (o != null) {}
				}
				"
			),
			vec![
				ErrorKind::IncompatibleOperands {
					op: "=".into(),
					lhs: Type::Array(Box::new(Type::Int)),
					rhs: Type::Null,
				},
				ErrorKind::IncompatibleOperands {
					op: "==".into(),
					lhs: Type::Array(Box::new(Type::Int)),
					rhs: Type::Null,
				},
			]
		);
	}

	#[test]
	fn return_rules() {
		assert_eq!(
			diagnostics(
				"void f() { return null; } int g() { return; } void h() { return; } int k() { return 1; } void main() {}"
			),
			vec![
				ErrorKind::ReturnMismatch {
					given: Type::Null,
					expected: Type::Void,
				},
				ErrorKind::ReturnMismatch {
					given: Type::Void,
					expected: Type::Int,
				},
			]
		);
	}

	#[test]
	fn statement_rules() {
		assert_eq!(
			diagnostics(
				r#"
				void main() {
					int a;
					break;
					while (true) { break; }
					switch (a) { case 1: break; default: a = 2; }
					switch ("s") { }
					if (1) {}
					for (; a; ) {}
					a[0] = 1;
					Print(1.5, this);
				}
				"#
			),
			vec![
				ErrorKind::BreakOutsideLoop,
				ErrorKind::SwitchTestNotInteger,
				ErrorKind::TestNotBoolean,
				ErrorKind::TestNotBoolean,
				ErrorKind::BracketsOnNonArray,
				ErrorKind::PrintArgMismatch {
					position: 1,
					given: Type::Double,
				},
				ErrorKind::ThisOutsideClassScope,
			]
		);
	}

	#[test]
	fn arrays() {
		assert_eq!(
			diagnostics(
				r"
				void main() {
					int[] a;
					a = NewArray(true, int);
					a[true] = a.length();
					a.length(1);
					a = NewArray(2, Missing);
				}
				"
			),
			vec![
				ErrorKind::NewArraySizeNotInteger,
				ErrorKind::SubscriptNotInteger,
				ErrorKind::NumArgsMismatch {
					function: "length".into(),
					expected: 0,
					given: 1,
				},
				ErrorKind::IdentifierNotDeclared {
					name: "Missing".into(),
					reason: Reason::LookingForType,
				},
			]
		);
	}

	#[test]
	fn field_access() {
		assert!(matches!(
			diagnostics("class A { int x; } void main() { A a; a.x = 1; }")[..],
			[ErrorKind::InaccessibleField { .. }]
		));
		assert_eq!(
			diagnostics(
				"class A { int x; void f(A other) { other.x = 1; other.y = 2; other.g(); } } void main() {}"
			),
			vec![
				ErrorKind::FieldNotFoundInBase {
					field: "y".into(),
					base: Type::Named("A".into()),
				},
				ErrorKind::FieldNotFoundInBase {
					field: "g".into(),
					base: Type::Named("A".into()),
				},
			]
		);
		assert!(matches!(
			diagnostics("void main() { new Missing(); }")[..],
			[ErrorKind::IdentifierNotDeclared {
				reason: Reason::LookingForClass,
				..
			}]
		));
	}

	#[test]
	fn inheritance_cycle() {
		assert_eq!(
			diagnostics("class A extends B {} class B extends A {} void main() {}"),
			vec![ErrorKind::InheritanceCycle("A".into())]
		);
	}

	#[test]
	fn missing_main() {
		assert_eq!(diagnostics("int x;"), vec![ErrorKind::NoMainFound]);
		assert_eq!(
			diagnostics("void main(int argc) {}"),
			vec![ErrorKind::NoMainFound]
		);
	}

	#[test]
	fn memoized_queries_are_idempotent() {
		let mut ast = parse_str(
			r"
			class A { int x; int f() { return x * 2; } }
			void main() { A a; int[] b; a = new A(); b[a.f()] = undeclared; }
			",
		);
		let reported = analyze(&mut ast).len();
		assert_eq!(reported, 1);
		let mut checker = Checker::new(&mut ast);
		checker.hierarchy = Hierarchy::build(checker.ast);
		for index in 0..checker.ast.exprs.len() {
			let first = checker.expr_type(ExprId(index), false);
			let second = checker.expr_type(ExprId(index), false);
			assert_eq!(first, second);
		}
		assert_eq!(checker.reporter.count(), 0);
	}

	#[test]
	fn unforced_query_leaves_tree_alone() {
		let mut ast = parse_str("class A { int x; void f() { x = 1; } } void main() {}");
		let x = find_expr(&ast, |k| matches!(k, ExprKind::FieldAccess { .. }));
		let mut checker = Checker::new(&mut ast);
		checker.declare_program();
		let errors = checker.reporter.count();

		assert_eq!(checker.expr_type(x, false), Type::Int);
		assert_eq!(checker.expr_type(x, false), Type::Int);
		assert!(matches!(
			checker.ast[x].kind,
			ExprKind::FieldAccess { base: None, .. }
		));
		assert_eq!(checker.ast[x].target, None);

		assert_eq!(checker.expr_type(x, true), Type::Int);
		assert!(matches!(
			checker.ast[x].kind,
			ExprKind::FieldAccess { base: Some(_), .. }
		));
		assert_eq!(checker.reporter.count(), errors);
	}
}
