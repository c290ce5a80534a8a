//! Abstract Syntax Tree
//!
//! Nodes live in per-kind arenas owned by [`Ast`] and refer to each other by
//! index. Every node records its syntactic parent, so ancestor queries
//! (enclosing class, loop, function) are an upward index chase. The checker
//! writes its annotations (scopes, expression types, resolved declarations)
//! straight into the nodes; code generation only reads them.
use std::fmt;
use std::ops::{Index, IndexMut};

use crate::scope::Scope;
use crate::types::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Span {
	pub first_line: usize,
	pub first_column: usize,
	pub last_line: usize,
	pub last_column: usize,
}
impl Span {
	pub fn new(line: usize, column: usize, length: usize) -> Self {
		Self {
			first_line: line,
			first_column: column,
			last_line: line,
			last_column: column + length.saturating_sub(1),
		}
	}
	pub fn join(self, other: Span) -> Span {
		Span {
			first_line: self.first_line,
			first_column: self.first_column,
			last_line: other.last_line,
			last_column: other.last_column,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identifier {
	pub name: String,
	pub span: Span,
}
impl Identifier {
	pub fn new(name: impl Into<String>, span: Span) -> Self {
		Self {
			name: name.into(),
			span,
		}
	}
}
impl fmt::Display for Identifier {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.name)
	}
}

macro_rules! node_id {
	($name:ident) => {
		#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
		pub struct $name(pub usize);
	};
}
node_id!(DeclId);
node_id!(StmtId);
node_id!(ExprId);
node_id!(TypeId);

/// Non-owning link to any node, used for parent pointers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeRef {
	Program,
	Decl(DeclId),
	Stmt(StmtId),
	Expr(ExprId),
	Type(TypeId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
	Add,
	Sub,
	Mul,
	Div,
	Mod,
	Less,
	LessEqual,
	Greater,
	GreaterEqual,
	Equal,
	NotEqual,
	And,
	Or,
	Not,
	Assign,
	Increment,
	Decrement,
}
impl fmt::Display for Operator {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Operator::Add => "+",
			Operator::Sub => "-",
			Operator::Mul => "*",
			Operator::Div => "/",
			Operator::Mod => "%",
			Operator::Less => "<",
			Operator::LessEqual => "<=",
			Operator::Greater => ">",
			Operator::GreaterEqual => ">=",
			Operator::Equal => "==",
			Operator::NotEqual => "!=",
			Operator::And => "&&",
			Operator::Or => "||",
			Operator::Not => "!",
			Operator::Assign => "=",
			Operator::Increment => "++",
			Operator::Decrement => "--",
		})
	}
}

/// How far resolution of a named type has progressed.
///
/// A quiet lookup that fails moves to `Silent`; only a forced check reports
/// and moves to `Reported`, after which the node is never looked up again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Resolution {
	#[default]
	Pending,
	Silent,
	Reported,
	Resolved(DeclId),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeKind {
	Int,
	Double,
	Bool,
	String,
	Void,
	Named(Identifier),
	Array(TypeId),
}

#[derive(Debug, Clone)]
pub struct TypeNode {
	pub kind: TypeKind,
	pub span: Span,
	pub parent: NodeRef,
	pub resolution: Resolution,
}

#[derive(Debug, Clone)]
pub enum DeclKind {
	Variable {
		ty: TypeId,
	},
	Class {
		extends: Option<TypeId>,
		implements: Vec<TypeId>,
		members: Vec<DeclId>,
	},
	Interface {
		members: Vec<DeclId>,
	},
	Function {
		return_type: TypeId,
		formals: Vec<DeclId>,
		body: Option<StmtId>,
	},
}

#[derive(Debug, Clone)]
pub struct Decl {
	pub id: Identifier,
	pub kind: DeclKind,
	pub parent: NodeRef,
	/// Member scope of a class or interface, formals of a function
	pub scope: Option<Scope>,
}
impl Decl {
	pub fn name(&self) -> &str {
		&self.id.name
	}
	pub fn is_variable(&self) -> bool {
		matches!(self.kind, DeclKind::Variable { .. })
	}
	pub fn is_class(&self) -> bool {
		matches!(self.kind, DeclKind::Class { .. })
	}
	pub fn is_interface(&self) -> bool {
		matches!(self.kind, DeclKind::Interface { .. })
	}
	pub fn is_function(&self) -> bool {
		matches!(self.kind, DeclKind::Function { .. })
	}
	pub fn members(&self) -> &[DeclId] {
		match &self.kind {
			DeclKind::Class { members, .. } | DeclKind::Interface { members } => members,
			_ => &[],
		}
	}
}

#[derive(Debug, Clone)]
pub enum StmtKind {
	Block {
		decls: Vec<DeclId>,
		stmts: Vec<StmtId>,
	},
	If {
		test: ExprId,
		then_body: StmtId,
		else_body: Option<StmtId>,
	},
	While {
		test: ExprId,
		body: StmtId,
	},
	For {
		init: ExprId,
		test: ExprId,
		step: ExprId,
		body: StmtId,
	},
	Switch {
		test: ExprId,
		cases: Vec<StmtId>,
	},
	/// A switch arm, `value` is `None` for `default`
	Case {
		value: Option<i32>,
		body: Vec<StmtId>,
	},
	Break,
	Return(ExprId),
	Print(Vec<ExprId>),
	Expr(ExprId),
}

#[derive(Debug, Clone)]
pub struct Stmt {
	pub kind: StmtKind,
	pub span: Span,
	pub parent: NodeRef,
	pub scope: Option<Scope>,
}
impl Stmt {
	/// Constructs a `break` may leave
	pub fn is_breakable(&self) -> bool {
		matches!(
			self.kind,
			StmtKind::While { .. } | StmtKind::For { .. } | StmtKind::Switch { .. }
		)
	}
}

#[derive(Debug, Clone)]
pub enum ExprKind {
	IntConstant(i32),
	DoubleConstant(f64),
	BoolConstant(bool),
	StringConstant(String),
	NullConstant,
	/// Placeholder for an omitted expression (`return;`, `for (;;)`)
	Empty,
	/// `left` is `None` for unary minus
	Arithmetic {
		op: Operator,
		left: Option<ExprId>,
		right: ExprId,
	},
	Relational {
		op: Operator,
		left: ExprId,
		right: ExprId,
	},
	Equality {
		op: Operator,
		left: ExprId,
		right: ExprId,
	},
	/// `left` is `None` for `!`
	Logical {
		op: Operator,
		left: Option<ExprId>,
		right: ExprId,
	},
	Assign {
		left: ExprId,
		right: ExprId,
	},
	Postfix {
		op: Operator,
		operand: ExprId,
	},
	This,
	ArrayAccess {
		base: ExprId,
		subscript: ExprId,
	},
	/// Used for both `base.field` and a bare `field`; the checker attaches an
	/// implicit `this` base once it knows the name is an instance field
	FieldAccess {
		base: Option<ExprId>,
		field: Identifier,
	},
	Call {
		base: Option<ExprId>,
		field: Identifier,
		actuals: Vec<ExprId>,
	},
	New(TypeId),
	NewArray {
		size: ExprId,
		elem: TypeId,
	},
	ReadInteger,
	ReadLine,
}

#[derive(Debug, Clone)]
pub struct Expr {
	pub kind: ExprKind,
	pub span: Span,
	pub parent: NodeRef,
	/// Cached result of type inference
	pub ty: Option<Type>,
	/// Declaration a bare name, field access or call resolved to
	pub target: Option<DeclId>,
}

#[derive(Debug, Clone, Default)]
pub struct Ast {
	pub decls: Vec<Decl>,
	pub stmts: Vec<Stmt>,
	pub exprs: Vec<Expr>,
	pub types: Vec<TypeNode>,
	/// Top level declarations in source order
	pub program: Vec<DeclId>,
	pub global_scope: Scope,
}

impl Index<DeclId> for Ast {
	type Output = Decl;
	fn index(&self, id: DeclId) -> &Decl {
		&self.decls[id.0]
	}
}
impl IndexMut<DeclId> for Ast {
	fn index_mut(&mut self, id: DeclId) -> &mut Decl {
		&mut self.decls[id.0]
	}
}
impl Index<StmtId> for Ast {
	type Output = Stmt;
	fn index(&self, id: StmtId) -> &Stmt {
		&self.stmts[id.0]
	}
}
impl IndexMut<StmtId> for Ast {
	fn index_mut(&mut self, id: StmtId) -> &mut Stmt {
		&mut self.stmts[id.0]
	}
}
impl Index<ExprId> for Ast {
	type Output = Expr;
	fn index(&self, id: ExprId) -> &Expr {
		&self.exprs[id.0]
	}
}
impl IndexMut<ExprId> for Ast {
	fn index_mut(&mut self, id: ExprId) -> &mut Expr {
		&mut self.exprs[id.0]
	}
}
impl Index<TypeId> for Ast {
	type Output = TypeNode;
	fn index(&self, id: TypeId) -> &TypeNode {
		&self.types[id.0]
	}
}
impl IndexMut<TypeId> for Ast {
	fn index_mut(&mut self, id: TypeId) -> &mut TypeNode {
		&mut self.types[id.0]
	}
}

impl Ast {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn add_type(&mut self, kind: TypeKind, span: Span) -> TypeId {
		let id = TypeId(self.types.len());
		if let TypeKind::Array(elem) = &kind {
			self[*elem].parent = NodeRef::Type(id);
		}
		self.types.push(TypeNode {
			kind,
			span,
			parent: NodeRef::Program,
			resolution: Resolution::Pending,
		});
		id
	}

	pub fn add_decl(&mut self, id: Identifier, kind: DeclKind) -> DeclId {
		let decl_id = DeclId(self.decls.len());
		let node = NodeRef::Decl(decl_id);
		match &kind {
			DeclKind::Variable { ty } => self.types[ty.0].parent = node,
			DeclKind::Class {
				extends,
				implements,
				members,
			} => {
				for ty in extends.iter().chain(implements) {
					self.types[ty.0].parent = node;
				}
				for member in members {
					self.decls[member.0].parent = node;
				}
			}
			DeclKind::Interface { members } => {
				for member in members {
					self.decls[member.0].parent = node;
				}
			}
			DeclKind::Function {
				return_type,
				formals,
				body,
			} => {
				self.types[return_type.0].parent = node;
				for formal in formals {
					self.decls[formal.0].parent = node;
				}
				if let Some(body) = body {
					self.stmts[body.0].parent = node;
				}
			}
		}
		self.decls.push(Decl {
			id,
			kind,
			parent: NodeRef::Program,
			scope: None,
		});
		decl_id
	}

	pub fn add_stmt(&mut self, kind: StmtKind, span: Span) -> StmtId {
		let id = StmtId(self.stmts.len());
		let node = NodeRef::Stmt(id);
		let mut exprs = Vec::new();
		let mut stmts = Vec::new();
		match &kind {
			StmtKind::Block { decls, stmts: body } => {
				for decl in decls {
					self.decls[decl.0].parent = node;
				}
				stmts.extend(body.iter().copied());
			}
			StmtKind::If {
				test,
				then_body,
				else_body,
			} => {
				exprs.push(*test);
				stmts.push(*then_body);
				stmts.extend(else_body.iter().copied());
			}
			StmtKind::While { test, body } => {
				exprs.push(*test);
				stmts.push(*body);
			}
			StmtKind::For {
				init,
				test,
				step,
				body,
			} => {
				exprs.extend([*init, *test, *step]);
				stmts.push(*body);
			}
			StmtKind::Switch { test, cases } => {
				exprs.push(*test);
				stmts.extend(cases.iter().copied());
			}
			StmtKind::Case { body, .. } => stmts.extend(body.iter().copied()),
			StmtKind::Break => {}
			StmtKind::Return(expr) | StmtKind::Expr(expr) => exprs.push(*expr),
			StmtKind::Print(args) => exprs.extend(args.iter().copied()),
		}
		for expr in exprs {
			self[expr].parent = node;
		}
		for stmt in stmts {
			self[stmt].parent = node;
		}
		self.stmts.push(Stmt {
			kind,
			span,
			parent: NodeRef::Program,
			scope: None,
		});
		id
	}

	pub fn add_expr(&mut self, kind: ExprKind, span: Span) -> ExprId {
		let id = ExprId(self.exprs.len());
		let node = NodeRef::Expr(id);
		let mut children = Vec::new();
		match &kind {
			ExprKind::Arithmetic { left, right, .. } | ExprKind::Logical { left, right, .. } => {
				children.extend(left.iter().copied());
				children.push(*right);
			}
			ExprKind::Relational { left, right, .. }
			| ExprKind::Equality { left, right, .. }
			| ExprKind::Assign { left, right } => children.extend([*left, *right]),
			ExprKind::Postfix { operand, .. } => children.push(*operand),
			ExprKind::ArrayAccess { base, subscript } => children.extend([*base, *subscript]),
			ExprKind::FieldAccess { base, .. } => children.extend(base.iter().copied()),
			ExprKind::Call { base, actuals, .. } => {
				children.extend(base.iter().copied());
				children.extend(actuals.iter().copied());
			}
			ExprKind::New(ty) => self[*ty].parent = node,
			ExprKind::NewArray { size, elem } => {
				children.push(*size);
				self[*elem].parent = node;
			}
			_ => {}
		}
		for child in children {
			self[child].parent = node;
		}
		self.exprs.push(Expr {
			kind,
			span,
			parent: NodeRef::Program,
			ty: None,
			target: None,
		});
		id
	}

	/// Registers `decls` as the program's top level declarations
	pub fn set_program(&mut self, decls: Vec<DeclId>) {
		for decl in &decls {
			self[*decl].parent = NodeRef::Program;
		}
		self.program = decls;
	}

	pub fn parent(&self, node: NodeRef) -> Option<NodeRef> {
		match node {
			NodeRef::Program => None,
			NodeRef::Decl(id) => Some(self[id].parent),
			NodeRef::Stmt(id) => Some(self[id].parent),
			NodeRef::Expr(id) => Some(self[id].parent),
			NodeRef::Type(id) => Some(self[id].parent),
		}
	}

	/// `node` itself followed by each of its ancestors, ending at the program
	pub fn ancestors(&self, node: NodeRef) -> impl Iterator<Item = NodeRef> + '_ {
		std::iter::successors(Some(node), move |&n| self.parent(n))
	}

	pub fn scope_of(&self, node: NodeRef) -> Option<&Scope> {
		match node {
			NodeRef::Program => Some(&self.global_scope),
			NodeRef::Decl(id) => self[id].scope.as_ref(),
			NodeRef::Stmt(id) => self[id].scope.as_ref(),
			NodeRef::Expr(_) | NodeRef::Type(_) => None,
		}
	}

	/// Looks `name` up in the innermost scope around `from`, moving outwards
	pub fn find_decl(&self, from: NodeRef, name: &str) -> Option<DeclId> {
		self.ancestors(from)
			.filter_map(|node| self.scope_of(node))
			.find_map(|scope| scope.find(name))
	}

	pub fn enclosing_class(&self, from: NodeRef) -> Option<DeclId> {
		self.ancestors(from).find_map(|node| match node {
			NodeRef::Decl(id) if self[id].is_class() => Some(id),
			_ => None,
		})
	}

	pub fn enclosing_function(&self, from: NodeRef) -> Option<DeclId> {
		self.ancestors(from).find_map(|node| match node {
			NodeRef::Decl(id) if self[id].is_function() => Some(id),
			_ => None,
		})
	}

	/// The class or interface whose body declares `decl`
	pub fn member_owner(&self, decl: DeclId) -> Option<DeclId> {
		match self[decl].parent {
			NodeRef::Decl(owner) if self[owner].is_class() || self[owner].is_interface() => {
				Some(owner)
			}
			_ => None,
		}
	}

	pub fn is_method(&self, decl: DeclId) -> bool {
		self[decl].is_function() && self.member_owner(decl).is_some()
	}

	pub fn formals(&self, function: DeclId) -> &[DeclId] {
		match &self[function].kind {
			DeclKind::Function { formals, .. } => formals,
			_ => &[],
		}
	}

	/// Semantic type spelled by a type node, without resolving class names
	pub fn syntax_type(&self, ty: TypeId) -> Type {
		match &self[ty].kind {
			TypeKind::Int => Type::Int,
			TypeKind::Double => Type::Double,
			TypeKind::Bool => Type::Bool,
			TypeKind::String => Type::String,
			TypeKind::Void => Type::Void,
			TypeKind::Named(id) => Type::Named(id.name.clone()),
			TypeKind::Array(elem) => Type::Array(Box::new(self.syntax_type(*elem))),
		}
	}

	/// Declared type of a variable, or return type of a function
	pub fn declared_type_node(&self, decl: DeclId) -> Option<TypeId> {
		match &self[decl].kind {
			DeclKind::Variable { ty } => Some(*ty),
			DeclKind::Function { return_type, .. } => Some(*return_type),
			_ => None,
		}
	}

	/// Identical return type and formal types, compared by name
	pub fn signatures_equivalent(&self, a: DeclId, b: DeclId) -> bool {
		match (&self[a].kind, &self[b].kind) {
			(
				DeclKind::Function {
					return_type: ra,
					formals: fa,
					..
				},
				DeclKind::Function {
					return_type: rb,
					formals: fb,
					..
				},
			) => {
				self.syntax_type(*ra).is_equivalent_to(&self.syntax_type(*rb))
					&& fa.len() == fb.len()
					&& fa.iter().zip(fb).all(|(x, y)| {
						match (self.declared_type_node(*x), self.declared_type_node(*y)) {
							(Some(x), Some(y)) => {
								self.syntax_type(x).is_equivalent_to(&self.syntax_type(y))
							}
							_ => false,
						}
					})
			}
			_ => false,
		}
	}

	/// Resolved superclass of `class`, set by the checker
	pub fn superclass(&self, class: DeclId) -> Option<DeclId> {
		match &self[class].kind {
			DeclKind::Class {
				extends: Some(ty), ..
			} => match self[*ty].resolution {
				Resolution::Resolved(decl) => Some(decl),
				_ => None,
			},
			_ => None,
		}
	}

	/// Top level class or interface declaration called `name`
	pub fn find_type_decl(&self, name: &str) -> Option<DeclId> {
		self.global_scope
			.find(name)
			.filter(|&d| self[d].is_class() || self[d].is_interface())
	}
}
