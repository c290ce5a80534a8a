//! Three Address Code Generation
//!
//! Walks a checked `ast::Ast` and lowers it into a `tac::Program`.
use std::collections::HashMap;

use crate::ast::{Ast, DeclId, DeclKind, ExprId, ExprKind, Operator, Resolution, StmtId, StmtKind};
use crate::tac::{BuiltIn, Instruction, LocationId, OpCode, Program, Segment};
use crate::types::{Hierarchy, Type};

pub const VAR_SIZE: i32 = 4;
pub const OFFSET_TO_FIRST_LOCAL: i32 = -8;
pub const OFFSET_TO_FIRST_PARAM: i32 = 4;
pub const OFFSET_TO_FIRST_GLOBAL: i32 = 0;

// `\\n` stays an escape sequence in the emitted `.asciiz` string
const SUBSCRIPT_ERROR: &str = "Decaf runtime error: Array subscript out of bounds\\n";
const ARRAY_SIZE_ERROR: &str = "Decaf runtime error: Array size is <= 0\\n";

/// Assumes the program is semantically sound, should only be ran after
/// `analyzer::analyze` returns no diagnostics
pub fn generate(ast: &Ast) -> Program {
	let mut generator = TACGen::new(ast);
	generator.generate_program();
	log::debug!(
		"generated {} instructions over {} locations",
		generator.program.code.len(),
		generator.program.locations.len()
	);
	generator.program
}

struct TACGen<'a> {
	ast: &'a Ast,
	hierarchy: Hierarchy,
	program: Program,
	/// Body of the function being generated
	code: Vec<Instruction>,
	variables: HashMap<DeclId, LocationId>,
	this: Option<LocationId>,
	local_offset: i32,
	global_offset: i32,
	temp_count: usize,
	label_count: usize,
	break_labels: Vec<String>,
	field_offsets: HashMap<DeclId, i32>,
	instance_sizes: HashMap<DeclId, i32>,
	/// Method declarations of each class by slot
	vtables: HashMap<DeclId, Vec<DeclId>>,
}

impl<'a> TACGen<'a> {
	fn new(ast: &'a Ast) -> Self {
		Self {
			ast,
			hierarchy: Hierarchy::build(ast),
			program: Program::default(),
			code: Vec::new(),
			variables: HashMap::new(),
			this: None,
			local_offset: OFFSET_TO_FIRST_LOCAL,
			global_offset: OFFSET_TO_FIRST_GLOBAL,
			temp_count: 0,
			label_count: 0,
			break_labels: Vec::new(),
			field_offsets: HashMap::new(),
			instance_sizes: HashMap::new(),
			vtables: HashMap::new(),
		}
	}

	fn generate_program(&mut self) {
		let ast = self.ast;
		for &decl in &ast.program {
			if self.ast[decl].is_variable() {
				let location = self.program.add_location(
					self.ast[decl].name(),
					Segment::GpRelative,
					self.global_offset,
				);
				self.global_offset += VAR_SIZE;
				self.variables.insert(decl, location);
			}
		}
		for &decl in &ast.program {
			if ast[decl].is_class() {
				self.layout_class(decl);
			}
		}
		for &decl in &ast.program {
			match &ast[decl].kind {
				DeclKind::Function { .. } => self.function(decl),
				DeclKind::Class { members, .. } => {
					for &member in members {
						if self.ast[member].is_function() {
							self.function(member);
						}
					}
					let methods = self.vtables[&decl]
						.iter()
						.map(|&method| self.function_label(method))
						.collect();
					self.program.code.push(Instruction::VTable {
						label: self.ast[decl].name().to_string(),
						methods,
					});
				}
				_ => {}
			}
		}
	}

	/// Assigns field offsets and vtable slots, ancestors first. Inherited
	/// fields and methods keep their slots, an override takes over the slot of
	/// the method it replaces.
	fn layout_class(&mut self, class: DeclId) {
		if self.vtables.contains_key(&class) {
			return;
		}
		let (mut vtable, mut size) = match self.ast.superclass(class) {
			Some(parent) => {
				self.layout_class(parent);
				(self.vtables[&parent].clone(), self.instance_sizes[&parent])
			}
			None => (Vec::new(), VAR_SIZE),
		};
		for &member in self.ast[class].members() {
			if self.ast[member].is_variable() {
				self.field_offsets.insert(member, size);
				size += VAR_SIZE;
				continue;
			}
			let name = self.ast[member].name();
			match vtable.iter().position(|&m| self.ast[m].name() == name) {
				Some(slot) => vtable[slot] = member,
				None => vtable.push(member),
			}
		}
		log::trace!(
			"class {}: {size} bytes, {} methods",
			self.ast[class].name(),
			vtable.len()
		);
		self.instance_sizes.insert(class, size);
		self.vtables.insert(class, vtable);
	}

	fn function_label(&self, function: DeclId) -> String {
		let name = self.ast[function].name();
		match self.ast.member_owner(function) {
			Some(owner) => format!("_{}.{name}", self.ast[owner].name()),
			None if name == "main" => name.to_string(),
			None => format!("_{name}"),
		}
	}

	fn function(&mut self, function: DeclId) {
		let DeclKind::Function {
			formals,
			body: Some(body),
			..
		} = &self.ast[function].kind
		else {
			return;
		};
		self.local_offset = OFFSET_TO_FIRST_LOCAL;
		self.this = None;
		let mut param_offset = OFFSET_TO_FIRST_PARAM;
		if self.ast.is_method(function) {
			self.this = Some(
				self.program
					.add_location("this", Segment::FpRelative, param_offset),
			);
			param_offset += VAR_SIZE;
		}
		for &formal in formals {
			let location =
				self.program
					.add_location(self.ast[formal].name(), Segment::FpRelative, param_offset);
			self.variables.insert(formal, location);
			param_offset += VAR_SIZE;
		}

		self.stmt(*body);
		let body = std::mem::take(&mut self.code);
		let frame_size = OFFSET_TO_FIRST_LOCAL - self.local_offset;
		let label = self.function_label(function);
		self.program.code.push(Instruction::Label(label));
		self.program
			.code
			.push(Instruction::BeginFunc { frame_size });
		self.program.code.extend(body);
		self.program.code.push(Instruction::EndFunc);
	}

	fn emit(&mut self, instruction: Instruction) {
		self.code.push(instruction);
	}

	fn local(&mut self, name: String) -> LocationId {
		let location = self
			.program
			.add_location(name, Segment::FpRelative, self.local_offset);
		self.local_offset -= VAR_SIZE;
		location
	}

	fn temp(&mut self) -> LocationId {
		self.temp_count += 1;
		self.local(format!("_tmp{}", self.temp_count - 1))
	}

	fn label(&mut self) -> String {
		self.label_count += 1;
		format!("_L{}", self.label_count - 1)
	}

	fn constant(&mut self, value: i32) -> LocationId {
		let dst = self.temp();
		self.emit(Instruction::LoadConstant { dst, value });
		dst
	}

	fn binary(&mut self, code: OpCode, op1: LocationId, op2: LocationId) -> LocationId {
		let dst = self.temp();
		self.emit(Instruction::BinaryOp { code, dst, op1, op2 });
		dst
	}

	fn load(&mut self, src: LocationId, offset: i32) -> LocationId {
		let dst = self.temp();
		self.emit(Instruction::Load { dst, src, offset });
		dst
	}

	/// Pushes `args` right to left, calls and pops them again
	fn builtin(&mut self, builtin: BuiltIn, args: &[LocationId]) -> Option<LocationId> {
		for &arg in args.iter().rev() {
			self.emit(Instruction::PushParam(arg));
		}
		let dst = builtin.has_return().then(|| self.temp());
		self.emit(Instruction::LCall {
			label: builtin.label().to_string(),
			dst,
		});
		if builtin.num_args() > 0 {
			self.emit(Instruction::PopParams(VAR_SIZE * builtin.num_args() as i32));
		}
		dst
	}

	fn builtin_value(&mut self, builtin: BuiltIn, args: &[LocationId]) -> LocationId {
		match self.builtin(builtin, args) {
			Some(value) => value,
			None => self.constant(0),
		}
	}

	/// Prints `message` and halts when `failed` is non-zero
	fn runtime_check(&mut self, failed: LocationId, message: &str) {
		let passed = self.label();
		self.emit(Instruction::IfZ {
			test: failed,
			label: passed.clone(),
		});
		let text = self.temp();
		self.emit(Instruction::LoadStringConstant {
			dst: text,
			value: message.to_string(),
		});
		self.builtin(BuiltIn::PrintString, &[text]);
		self.builtin(BuiltIn::Halt, &[]);
		self.emit(Instruction::Label(passed));
	}

	fn stmt(&mut self, stmt: StmtId) {
		match &self.ast[stmt].kind {
			StmtKind::Block { decls, stmts } => {
				for &decl in decls {
					let location = self.local(self.ast[decl].name().to_string());
					self.variables.insert(decl, location);
				}
				for &stmt in stmts {
					self.stmt(stmt);
				}
			}
			StmtKind::If {
				test,
				then_body,
				else_body,
			} => {
				let test = self.value(*test);
				let else_label = self.label();
				self.emit(Instruction::IfZ {
					test,
					label: else_label.clone(),
				});
				self.stmt(*then_body);
				match else_body {
					Some(else_body) => {
						let end = self.label();
						self.emit(Instruction::Goto(end.clone()));
						self.emit(Instruction::Label(else_label));
						self.stmt(*else_body);
						self.emit(Instruction::Label(end));
					}
					None => self.emit(Instruction::Label(else_label)),
				}
			}
			StmtKind::While { test, body } => {
				let top = self.label();
				let end = self.label();
				self.emit(Instruction::Label(top.clone()));
				let test = self.value(*test);
				self.emit(Instruction::IfZ {
					test,
					label: end.clone(),
				});
				self.break_labels.push(end.clone());
				self.stmt(*body);
				self.break_labels.pop();
				self.emit(Instruction::Goto(top));
				self.emit(Instruction::Label(end));
			}
			StmtKind::For {
				init,
				test,
				step,
				body,
			} => {
				self.effect(*init);
				let top = self.label();
				let end = self.label();
				self.emit(Instruction::Label(top.clone()));
				let test = self.value(*test);
				self.emit(Instruction::IfZ {
					test,
					label: end.clone(),
				});
				self.break_labels.push(end.clone());
				self.stmt(*body);
				self.break_labels.pop();
				self.effect(*step);
				self.emit(Instruction::Goto(top));
				self.emit(Instruction::Label(end));
			}
			StmtKind::Switch { test, cases } => self.switch(*test, cases),
			StmtKind::Case { body, .. } => {
				for &stmt in body {
					self.stmt(stmt);
				}
			}
			StmtKind::Break => {
				if let Some(label) = self.break_labels.last() {
					self.emit(Instruction::Goto(label.clone()));
				}
			}
			StmtKind::Return(value) => {
				let value = match self.ast[*value].kind {
					ExprKind::Empty => None,
					_ => Some(self.value(*value)),
				};
				self.emit(Instruction::Return(value));
			}
			StmtKind::Print(args) => {
				for &arg in args {
					let builtin = match self.ast[arg].ty {
						Some(Type::String) => BuiltIn::PrintString,
						Some(Type::Bool) => BuiltIn::PrintBool,
						_ => BuiltIn::PrintInt,
					};
					let value = self.value(arg);
					self.builtin(builtin, &[value]);
				}
			}
			StmtKind::Expr(expr) => self.effect(*expr),
		}
	}

	/// Tests every case value in order, then jumps to `default` or past the
	/// switch. Arms end with a jump to the end, so there is no fallthrough.
	fn switch(&mut self, test: ExprId, cases: &[StmtId]) {
		let test = self.value(test);
		let end = self.label();
		let zero = self.constant(0);
		let mut arms = Vec::new();
		let mut default = None;
		for &case in cases {
			let label = self.label();
			match self.ast[case].kind {
				StmtKind::Case {
					value: Some(value), ..
				} => {
					let value = self.constant(value);
					let equal = self.binary(OpCode::Eq, test, value);
					let differ = self.binary(OpCode::Eq, equal, zero);
					self.emit(Instruction::IfZ {
						test: differ,
						label: label.clone(),
					});
				}
				_ => default = Some(label.clone()),
			}
			arms.push((case, label));
		}
		self.emit(Instruction::Goto(default.unwrap_or_else(|| end.clone())));
		self.break_labels.push(end.clone());
		for (case, label) in arms {
			self.emit(Instruction::Label(label));
			self.stmt(case);
			self.emit(Instruction::Goto(end.clone()));
		}
		self.break_labels.pop();
		self.emit(Instruction::Label(end));
	}

	/// Evaluates an expression statement, discarding its value
	fn effect(&mut self, expr: ExprId) {
		match self.ast[expr].kind {
			ExprKind::Empty => {}
			ExprKind::Call { .. } => {
				self.call(expr);
			}
			_ => {
				self.value(expr);
			}
		}
	}

	/// Storage an assignable expression denotes, a reference location for
	/// array elements and fields
	fn place(&mut self, expr: ExprId) -> LocationId {
		match &self.ast[expr].kind {
			ExprKind::FieldAccess { base: None, .. } => self.variable(expr),
			ExprKind::FieldAccess {
				base: Some(base), ..
			} => {
				let base = self.value(*base);
				let offset = self
					.ast[expr]
					.target
					.and_then(|field| self.field_offsets.get(&field).copied())
					.unwrap_or(0);
				self.program.add_reference(base, offset)
			}
			ExprKind::ArrayAccess { base, subscript } => {
				let base = self.value(*base);
				let index = self.value(*subscript);
				let zero = self.constant(0);
				let negative = self.binary(OpCode::Less, index, zero);
				let length = self.load(base, -VAR_SIZE);
				let below = self.binary(OpCode::Less, index, length);
				let above = self.binary(OpCode::Eq, below, zero);
				let failed = self.binary(OpCode::Or, negative, above);
				self.runtime_check(failed, SUBSCRIPT_ERROR);
				let size = self.constant(VAR_SIZE);
				let offset = self.binary(OpCode::Mul, index, size);
				let address = self.binary(OpCode::Add, base, offset);
				self.program.add_reference(address, 0)
			}
			_ => self.value(expr),
		}
	}

	fn variable(&mut self, expr: ExprId) -> LocationId {
		match self.ast[expr]
			.target
			.and_then(|decl| self.variables.get(&decl).copied())
		{
			Some(location) => location,
			None => {
				log::warn!("no storage for {:?}", self.ast[expr].kind);
				self.constant(0)
			}
		}
	}

	/// Value held by `location`, loading through references
	fn read(&mut self, location: LocationId) -> LocationId {
		match self.program[location].reference {
			Some(reference) => self.load(reference.base, reference.offset),
			None => location,
		}
	}

	fn write(&mut self, location: LocationId, src: LocationId) {
		match self.program[location].reference {
			Some(reference) => self.emit(Instruction::Store {
				dst: reference.base,
				src,
				offset: reference.offset,
			}),
			None => self.emit(Instruction::Assign { dst: location, src }),
		}
	}

	fn value(&mut self, expr: ExprId) -> LocationId {
		match &self.ast[expr].kind {
			ExprKind::IntConstant(value) => self.constant(*value),
			// No floating point support, doubles are truncated
			ExprKind::DoubleConstant(value) => self.constant(*value as i32),
			ExprKind::BoolConstant(value) => self.constant(*value as i32),
			ExprKind::StringConstant(value) => {
				let dst = self.temp();
				self.emit(Instruction::LoadStringConstant {
					dst,
					value: value.clone(),
				});
				dst
			}
			ExprKind::NullConstant | ExprKind::Empty => self.constant(0),
			ExprKind::Arithmetic { op, left, right } => {
				let lhs = match left {
					Some(left) => self.value(*left),
					None => self.constant(0),
				};
				let rhs = self.value(*right);
				let code = match op {
					Operator::Add => OpCode::Add,
					Operator::Sub => OpCode::Sub,
					Operator::Mul => OpCode::Mul,
					Operator::Div => OpCode::Div,
					_ => OpCode::Mod,
				};
				self.binary(code, lhs, rhs)
			}
			ExprKind::Relational { op, left, right } => {
				let lhs = self.value(*left);
				let rhs = self.value(*right);
				match op {
					Operator::Less => self.binary(OpCode::Less, lhs, rhs),
					Operator::Greater => self.binary(OpCode::Less, rhs, lhs),
					Operator::LessEqual => {
						let less = self.binary(OpCode::Less, lhs, rhs);
						let equal = self.binary(OpCode::Eq, lhs, rhs);
						self.binary(OpCode::Or, less, equal)
					}
					_ => {
						let greater = self.binary(OpCode::Less, rhs, lhs);
						let equal = self.binary(OpCode::Eq, lhs, rhs);
						self.binary(OpCode::Or, greater, equal)
					}
				}
			}
			ExprKind::Equality { op, left, right } => {
				let lhs = self.value(*left);
				let rhs = self.value(*right);
				let equal = match self.ast[*left].ty {
					Some(Type::String) => self.builtin_value(BuiltIn::StringEqual, &[lhs, rhs]),
					_ => self.binary(OpCode::Eq, lhs, rhs),
				};
				match op {
					Operator::NotEqual => {
						let zero = self.constant(0);
						self.binary(OpCode::Eq, equal, zero)
					}
					_ => equal,
				}
			}
			ExprKind::Logical { op, left, right } => {
				let lhs = left.map(|left| self.value(left));
				let rhs = self.value(*right);
				match (op, lhs) {
					(Operator::And, Some(lhs)) => self.binary(OpCode::And, lhs, rhs),
					(Operator::Or, Some(lhs)) => self.binary(OpCode::Or, lhs, rhs),
					_ => {
						let zero = self.constant(0);
						self.binary(OpCode::Eq, rhs, zero)
					}
				}
			}
			ExprKind::Assign { left, right } => {
				let value = self.value(*right);
				let place = self.place(*left);
				self.write(place, value);
				value
			}
			ExprKind::Postfix { op, operand } => {
				let place = self.place(*operand);
				let current = self.read(place);
				let result = self.temp();
				self.emit(Instruction::Assign {
					dst: result,
					src: current,
				});
				let one = self.constant(1);
				let code = match op {
					Operator::Decrement => OpCode::Sub,
					_ => OpCode::Add,
				};
				let updated = self.binary(code, current, one);
				self.write(place, updated);
				result
			}
			ExprKind::This => match self.this {
				Some(this) => this,
				None => self.constant(0),
			},
			ExprKind::FieldAccess { .. } | ExprKind::ArrayAccess { .. } => {
				let place = self.place(expr);
				self.read(place)
			}
			ExprKind::Call { .. } => match self.call(expr) {
				Some(value) => value,
				None => self.constant(0),
			},
			ExprKind::New(ty) => {
				let class = match self.ast[*ty].resolution {
					Resolution::Resolved(class) => class,
					_ => return self.constant(0),
				};
				let size = self.instance_sizes.get(&class).copied().unwrap_or(VAR_SIZE);
				let size = self.constant(size);
				let object = self.builtin_value(BuiltIn::Alloc, &[size]);
				let vtable = self.temp();
				self.emit(Instruction::LoadLabel {
					dst: vtable,
					label: self.ast[class].name().to_string(),
				});
				self.emit(Instruction::Store {
					dst: object,
					src: vtable,
					offset: 0,
				});
				object
			}
			ExprKind::NewArray { size, .. } => {
				let count = self.value(*size);
				let one = self.constant(1);
				let failed = self.binary(OpCode::Less, count, one);
				self.runtime_check(failed, ARRAY_SIZE_ERROR);
				let slots = self.binary(OpCode::Add, count, one);
				let word = self.constant(VAR_SIZE);
				let bytes = self.binary(OpCode::Mul, slots, word);
				let memory = self.builtin_value(BuiltIn::Alloc, &[bytes]);
				self.emit(Instruction::Store {
					dst: memory,
					src: count,
					offset: 0,
				});
				self.binary(OpCode::Add, memory, word)
			}
			ExprKind::ReadInteger => self.builtin_value(BuiltIn::ReadInteger, &[]),
			ExprKind::ReadLine => self.builtin_value(BuiltIn::ReadLine, &[]),
		}
	}

	fn call(&mut self, expr: ExprId) -> Option<LocationId> {
		let ExprKind::Call {
			base,
			field,
			actuals,
		} = &self.ast[expr].kind
		else {
			return None;
		};
		if let Some(base) = base {
			if matches!(self.ast[*base].ty, Some(Type::Array(_))) && field.name == "length" {
				let array = self.value(*base);
				return Some(self.load(array, -VAR_SIZE));
			}
		}
		let callee = self.ast[expr].target?;
		let has_return = !matches!(
			self.ast.declared_type_node(callee).map(|ty| self.ast.syntax_type(ty)),
			Some(Type::Void)
		);
		let receiver = match base {
			Some(base) if self.ast.is_method(callee) => Some((self.value(*base), *base)),
			_ => None,
		};
		let args: Vec<LocationId> = actuals.iter().map(|&actual| self.value(actual)).collect();
		let mut pushed = args.len() as i32;

		let dst = match receiver {
			Some((object, base)) => {
				let vtable = self.load(object, 0);
				let addr = self.method_address(vtable, base, callee);
				for &arg in args.iter().rev() {
					self.emit(Instruction::PushParam(arg));
				}
				self.emit(Instruction::PushParam(object));
				pushed += 1;
				let dst = has_return.then(|| self.temp());
				self.emit(Instruction::ACall { addr, dst });
				dst
			}
			None => {
				for &arg in args.iter().rev() {
					self.emit(Instruction::PushParam(arg));
				}
				let dst = has_return.then(|| self.temp());
				self.emit(Instruction::LCall {
					label: self.function_label(callee),
					dst,
				});
				dst
			}
		};
		if pushed > 0 {
			self.emit(Instruction::PopParams(pushed * VAR_SIZE));
		}
		dst
	}

	/// Address of `method` for the object whose vtable is in `vtable`.
	///
	/// Class receivers use the method's slot directly. An interface receiver
	/// does too when every implementing class agrees on the slot, otherwise the
	/// vtable label is compared against each implementing class in turn.
	fn method_address(&mut self, vtable: LocationId, base: ExprId, method: DeclId) -> LocationId {
		let name = self.ast[method].name().to_string();
		let static_type = match &self.ast[base].ty {
			Some(Type::Named(name)) => self.ast.find_type_decl(name),
			_ => None,
		};
		let candidates: Vec<(DeclId, usize)> = match static_type {
			Some(class) if self.ast[class].is_class() => {
				self.slot(class, &name).map(|slot| (class, slot)).into_iter().collect()
			}
			Some(interface) => {
				let interface_name = self.ast[interface].name();
				self.ast
					.program
					.iter()
					.copied()
					.filter(|&class| {
						self.ast[class].is_class()
							&& self
								.hierarchy
								.ancestors(self.ast[class].name())
								.is_some_and(|set| set.contains(interface_name))
					})
					.filter_map(|class| self.slot(class, &name).map(|slot| (class, slot)))
					.collect()
			}
			None => Vec::new(),
		};
		let uniform = candidates.windows(2).all(|pair| pair[0].1 == pair[1].1);
		if uniform {
			let slot = candidates.first().map_or(0, |&(_, slot)| slot);
			return self.load(vtable, slot as i32 * VAR_SIZE);
		}

		let addr = self.temp();
		let end = self.label();
		let last = candidates.len() - 1;
		for (index, &(class, slot)) in candidates.iter().enumerate() {
			if index == last {
				self.emit(Instruction::Load {
					dst: addr,
					src: vtable,
					offset: slot as i32 * VAR_SIZE,
				});
				break;
			}
			let label = self.temp();
			self.emit(Instruction::LoadLabel {
				dst: label,
				label: self.ast[class].name().to_string(),
			});
			let same = self.binary(OpCode::Eq, vtable, label);
			let next = self.label();
			self.emit(Instruction::IfZ {
				test: same,
				label: next.clone(),
			});
			self.emit(Instruction::Load {
				dst: addr,
				src: vtable,
				offset: slot as i32 * VAR_SIZE,
			});
			self.emit(Instruction::Goto(end.clone()));
			self.emit(Instruction::Label(next));
		}
		self.emit(Instruction::Label(end));
		addr
	}

	fn slot(&self, class: DeclId, method: &str) -> Option<usize> {
		self.vtables
			.get(&class)?
			.iter()
			.position(|&m| self.ast[m].name() == method)
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::{analyzer::analyze, lexer::tokenize, parser::parse};

	fn compile(source: &str) -> Program {
		let mut ast = parse(tokenize(source).unwrap()).unwrap();
		assert_eq!(analyze(&mut ast), vec![]);
		generate(&ast)
	}

	fn vtable<'p>(program: &'p Program, class: &str) -> &'p [String] {
		program
			.code
			.iter()
			.find_map(|instruction| match instruction {
				Instruction::VTable { label, methods } if label == class => Some(methods.as_slice()),
				_ => None,
			})
			.unwrap()
	}

	fn listing(source: &str) -> String {
		compile(source).listing()
	}

	#[test]
	fn assignments() {
		assert_eq!(
			listing("void main() { int x; x = 5; Print(x); }"),
			"\
main:
	BeginFunc 8 ;
	_tmp0 = 5 ;
	x = _tmp0 ;
	PushParam x ;
	LCall _PrintInt ;
	PopParams 4 ;
	EndFunc ;
"
		);
	}

	#[test]
	fn frame_and_parameters() {
		let program = compile("int add(int a, int b) { return a + b; } void main() { Print(add(1, 2)); }");
		let location = |name: &str| {
			program
				.locations
				.iter()
				.find(|l| l.name == name)
				.unwrap()
				.clone()
		};
		assert_eq!(location("a").offset, OFFSET_TO_FIRST_PARAM);
		assert_eq!(location("b").offset, OFFSET_TO_FIRST_PARAM + VAR_SIZE);
		assert_eq!(location("_tmp0").offset, OFFSET_TO_FIRST_LOCAL);
		assert_eq!(program.code[1], Instruction::BeginFunc { frame_size: 4 });
		assert!(program.listing().contains(
			"\tPushParam _tmp2 ;\n\tPushParam _tmp1 ;\n\t_tmp3 = LCall _add ;\n\tPopParams 8 ;\n"
		));
	}

	#[test]
	fn globals_are_gp_relative() {
		let program = compile("int g; int h; void main() { g = 1; h = g; }");
		let globals: Vec<_> = program
			.locations
			.iter()
			.filter(|l| l.segment == Segment::GpRelative)
			.map(|l| (l.name.as_str(), l.offset))
			.collect();
		assert_eq!(globals, vec![("g", 0), ("h", 4)]);
	}

	#[test]
	fn override_keeps_slot() {
		let program = compile(
			r"
			class B { void m() {} void n() {} }
			class D extends B { void k() {} void n() {} }
			void main() {}
			",
		);
		assert_eq!(vtable(&program, "B"), ["_B.m", "_B.n"]);
		assert_eq!(vtable(&program, "D"), ["_B.m", "_D.n", "_D.k"]);
	}

	#[test]
	fn fields_keep_inherited_offsets() {
		let program = compile(
			r"
			class B { int x; int y; }
			class D extends B { int z; void set() { z = x; } }
			void main() { D d; d = new D(); }
			",
		);
		let text = program.listing();
		assert!(text.contains("_tmp0 = *(this + 4) ;"));
		assert!(text.contains("*(this + 12) = _tmp0 ;"));
		assert!(text.contains("_tmp1 = 16 ;\n\tPushParam _tmp1 ;\n\t_tmp2 = LCall _Alloc ;"));
		assert!(text.contains("_tmp3 = D ;\n\t*(_tmp2) = _tmp3 ;"));
	}

	#[test]
	fn dynamic_dispatch() {
		let text = listing(
			r"
			class A { int f(int v) { return v; } }
			void main() { A a; a = new A(); Print(a.f(3)); }
			",
		);
		assert!(text.contains("ACall"));
		assert!(text.contains("PopParams 8 ;"));
		assert!(text.contains("= *(a) ;"));
	}

	#[test]
	fn interface_dispatch_by_label() {
		let text = listing(
			r"
			interface I { void m(); }
			class A implements I { void m() {} }
			class B implements I { void x() {} void m() {} }
			void main() { I i; i = new B(); i.m(); }
			",
		);
		assert!(text.contains(" = A ;"));
		assert!(text.contains("= *(_tmp"));
		let program = compile(
			r"
			interface I { void m(); }
			class A implements I { void m() {} }
			void main() { I i; i = new A(); i.m(); }
			",
		);
		assert_eq!(program.listing().matches(" = A ;").count(), 1);
	}

	#[test]
	fn bounds_checked_subscript() {
		let text = listing("void main() { int[] arr; arr = NewArray(5, int); arr[10] = 3; }");
		assert!(text.contains("Array size is <= 0"));
		assert!(text.contains("Array subscript out of bounds"));
		assert!(text.contains("LCall _Halt ;"));
		assert!(text.contains(" + -4) ;"));
	}

	#[test]
	fn relational_synthesis() {
		let text = listing("void main() { bool b; b = 1 <= 2; b = 1 > 2; b = \"a\" != \"b\"; }");
		assert!(text.contains("_tmp2 = _tmp0 < _tmp1 ;\n\t_tmp3 = _tmp0 == _tmp1 ;\n\t_tmp4 = _tmp2 || _tmp3 ;"));
		assert!(text.contains("_tmp7 = _tmp6 < _tmp5 ;"));
		assert!(text.contains("LCall _StringEqual ;"));
	}

	#[test]
	fn loops_and_breaks() {
		let text = listing(
			r"
			void main() {
				int i;
				for (i = 0; i < 3; i++) { if (i == 1) break; }
				while (true) break;
				switch (i) { case 1: Print(1); default: Print(2); }
			}
			",
		);
		let gotos = text.matches("Goto _L1 ;").count();
		assert!(gotos >= 2);
		assert!(text.contains("_L0:"));
	}
}
