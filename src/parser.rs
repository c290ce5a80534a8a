//! Grammar:
/*
	<Program>		-> <Decl>+
	<Decl>			-> <Variable> ;
					|  <FunctionDecl>
					|  class Ident [extends Ident] [implements Ident {, Ident}] { <Field>* }
					|  interface Ident { <Prototype>* }
	<Variable>		-> <Type> Ident
	<Type>			-> int | double | bool | string | Ident | <Type> []
	<FunctionDecl>	-> (<Type> | void) Ident ( <Formals> ) <StmtBlock>
	<Prototype>		-> (<Type> | void) Ident ( <Formals> ) ;
	<Field>			-> <Variable> ; | <FunctionDecl>
	<StmtBlock>		-> { <Variable>;* <Stmt>* }
	<Stmt>			-> [<Expr>] ;
					|  if ( <Expr> ) <Stmt> [else <Stmt>]
					|  while ( <Expr> ) <Stmt>
					|  for ( [<Expr>] ; <Expr> ; [<Expr>] ) <Stmt>
					|  switch ( <Expr> ) { {case IntConst : <Stmt>*}* [default : <Stmt>*] }
					|  return [<Expr>] ;
					|  break ;
					|  Print ( <Expr> {, <Expr>} ) ;
					|  <StmtBlock>
	<Expr>			-> <LValue> = <Expr> | new Ident [()] | new ( Ident ) | ... by precedence, loosest first:
					   ||  &&  == !=  < <= > >=  + -  * / %  unary - !  postfix ++ --
*/
use std::iter::Peekable;
use std::vec::IntoIter;

use thiserror::Error;

use crate::ast::{
	Ast, DeclId, DeclKind, ExprId, ExprKind, Identifier, Operator, Span, StmtId, StmtKind,
	TypeId, TypeKind,
};
use crate::lexer::{Reserved, Symbol, Token};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
	#[error("line {}: syntax error, unexpected {found:?}, expecting {expected}", .span.first_line)]
	Unexpected {
		found: Token,
		expected: &'static str,
		span: Span,
	},
	#[error("line {}: left hand side of assignment is not assignable", .0.first_line)]
	NotAssignable(Span),
}

type ParseResult<T> = Result<T, ParseError>;

static EOF: Token = Token::Eof;

pub fn parse(tokens: Vec<Symbol>) -> ParseResult<Ast> {
	let mut parser = Parser {
		tokens: tokens.into_iter().peekable(),
		ast: Ast::new(),
		last_span: Span::default(),
	};
	let mut program = Vec::new();
	while !parser.at(&Token::Eof) && parser.tokens.peek().is_some() {
		program.push(parser.declaration()?);
	}
	if program.is_empty() {
		return Err(parser.unexpected("declaration"));
	}
	parser.ast.set_program(program);
	log::trace!(
		"parsed {} declarations, {} statements, {} expressions",
		parser.ast.decls.len(),
		parser.ast.stmts.len(),
		parser.ast.exprs.len()
	);
	Ok(parser.ast)
}

struct Parser {
	tokens: Peekable<IntoIter<Symbol>>,
	ast: Ast,
	last_span: Span,
}

impl Parser {
	fn peek(&mut self) -> &Token {
		self.tokens.peek().map_or(&EOF, Symbol::token)
	}
	fn peek_span(&mut self) -> Span {
		self.tokens.peek().map_or(self.last_span, Symbol::span)
	}
	fn at(&mut self, token: &Token) -> bool {
		self.peek() == token
	}
	fn bump(&mut self) -> Symbol {
		let symbol = self
			.tokens
			.next()
			.unwrap_or(Symbol(Token::Eof, self.last_span));
		self.last_span = symbol.span();
		symbol
	}
	#[inline]
	fn next_eq(&mut self, needle: Token) -> bool {
		if self.at(&needle) {
			self.bump();
			true
		} else {
			false
		}
	}
	fn unexpected(&mut self, expected: &'static str) -> ParseError {
		ParseError::Unexpected {
			found: self.peek().clone(),
			expected,
			span: self.peek_span(),
		}
	}
	fn expect(&mut self, needle: Token, expected: &'static str) -> ParseResult<Span> {
		if self.next_eq(needle) {
			Ok(self.last_span)
		} else {
			Err(self.unexpected(expected))
		}
	}
	fn keyword(&mut self, keyword: Reserved) -> bool {
		self.next_eq(Token::Keyword(keyword))
	}
	fn identifier(&mut self) -> ParseResult<Identifier> {
		match self.peek() {
			Token::Identifier(_) => match self.bump() {
				Symbol(Token::Identifier(name), span) => Ok(Identifier::new(name, span)),
				_ => unreachable!(),
			},
			_ => Err(self.unexpected("identifier")),
		}
	}

	fn declaration(&mut self) -> ParseResult<DeclId> {
		if self.keyword(Reserved::Class) {
			self.class()
		} else if self.keyword(Reserved::Interface) {
			self.interface()
		} else {
			self.field()
		}
	}

	/// Variable or function declaration, both may appear at top level and in
	/// class bodies
	fn field(&mut self) -> ParseResult<DeclId> {
		let return_type = self.return_type()?;
		let id = self.identifier()?;
		if self.next_eq(Token::LeftParenthesis) {
			let formals = self.formals()?;
			let body = self.block()?;
			return Ok(self.ast.add_decl(
				id,
				DeclKind::Function {
					return_type,
					formals,
					body: Some(body),
				},
			));
		}
		if matches!(self.ast[return_type].kind, TypeKind::Void) {
			return Err(self.unexpected("'('"));
		}
		self.expect(Token::Semicolon, "';'")?;
		Ok(self.ast.add_decl(id, DeclKind::Variable { ty: return_type }))
	}

	fn class(&mut self) -> ParseResult<DeclId> {
		let id = self.identifier()?;
		let mut extends = None;
		if self.keyword(Reserved::Extends) {
			extends = Some(self.named_type()?);
		}
		let mut implements = Vec::new();
		if self.keyword(Reserved::Implements) {
			implements.push(self.named_type()?);
			while self.next_eq(Token::Comma) {
				implements.push(self.named_type()?);
			}
		}
		self.expect(Token::LeftBrace, "'{'")?;
		let mut members = Vec::new();
		while !self.next_eq(Token::RightBrace) {
			members.push(self.field()?);
		}
		Ok(self.ast.add_decl(
			id,
			DeclKind::Class {
				extends,
				implements,
				members,
			},
		))
	}

	fn interface(&mut self) -> ParseResult<DeclId> {
		let id = self.identifier()?;
		self.expect(Token::LeftBrace, "'{'")?;
		let mut members = Vec::new();
		while !self.next_eq(Token::RightBrace) {
			let return_type = self.return_type()?;
			let id = self.identifier()?;
			self.expect(Token::LeftParenthesis, "'('")?;
			let formals = self.formals()?;
			self.expect(Token::Semicolon, "';'")?;
			members.push(self.ast.add_decl(
				id,
				DeclKind::Function {
					return_type,
					formals,
					body: None,
				},
			));
		}
		Ok(self.ast.add_decl(id, DeclKind::Interface { members }))
	}

	/// Parameter list after the opening parenthesis, consumes the closing one
	fn formals(&mut self) -> ParseResult<Vec<DeclId>> {
		let mut formals = Vec::new();
		if self.next_eq(Token::RightParenthesis) {
			return Ok(formals);
		}
		loop {
			formals.push(self.variable()?);
			if self.next_eq(Token::RightParenthesis) {
				return Ok(formals);
			}
			self.expect(Token::Comma, "',' or ')'")?;
		}
	}

	fn variable(&mut self) -> ParseResult<DeclId> {
		let ty = self.value_type()?;
		let id = self.identifier()?;
		Ok(self.ast.add_decl(id, DeclKind::Variable { ty }))
	}

	fn return_type(&mut self) -> ParseResult<TypeId> {
		if self.keyword(Reserved::Void) {
			return Ok(self.ast.add_type(TypeKind::Void, self.last_span));
		}
		self.value_type()
	}

	fn named_type(&mut self) -> ParseResult<TypeId> {
		let id = self.identifier()?;
		let span = id.span;
		Ok(self.ast.add_type(TypeKind::Named(id), span))
	}

	fn value_type(&mut self) -> ParseResult<TypeId> {
		let base = match self.peek() {
			Token::Keyword(Reserved::Int) => TypeKind::Int,
			Token::Keyword(Reserved::Double) => TypeKind::Double,
			Token::Keyword(Reserved::Bool) => TypeKind::Bool,
			Token::Keyword(Reserved::String) => TypeKind::String,
			Token::Identifier(_) => {
				let ty = self.named_type()?;
				return self.array_suffix(ty);
			}
			_ => return Err(self.unexpected("type")),
		};
		let span = self.bump().span();
		let ty = self.ast.add_type(base, span);
		self.array_suffix(ty)
	}

	fn array_suffix(&mut self, mut ty: TypeId) -> ParseResult<TypeId> {
		while self.next_eq(Token::LeftSquare) {
			let end = self.expect(Token::RightSquare, "']'")?;
			let span = self.ast[ty].span.join(end);
			ty = self.ast.add_type(TypeKind::Array(ty), span);
		}
		Ok(ty)
	}

	/// Whether the upcoming tokens start a local variable declaration
	fn at_variable(&mut self) -> bool {
		match self.peek() {
			Token::Keyword(
				Reserved::Int | Reserved::Double | Reserved::Bool | Reserved::String,
			) => true,
			Token::Identifier(_) => {
				let mut lookahead = self.tokens.clone();
				lookahead.next();
				match lookahead.next().map(|s| s.0) {
					Some(Token::Identifier(_)) => true,
					Some(Token::LeftSquare) => {
						matches!(lookahead.next().map(|s| s.0), Some(Token::RightSquare))
					}
					_ => false,
				}
			}
			_ => false,
		}
	}

	fn block(&mut self) -> ParseResult<StmtId> {
		let start = self.expect(Token::LeftBrace, "'{'")?;
		let mut decls = Vec::new();
		while self.at_variable() {
			decls.push(self.variable()?);
			self.expect(Token::Semicolon, "';'")?;
		}
		let mut stmts = Vec::new();
		while !self.next_eq(Token::RightBrace) {
			stmts.push(self.statement()?);
		}
		let span = start.join(self.last_span);
		Ok(self.ast.add_stmt(StmtKind::Block { decls, stmts }, span))
	}

	fn statement(&mut self) -> ParseResult<StmtId> {
		let start = self.peek_span();
		let kind = match self.peek() {
			Token::LeftBrace => return self.block(),
			Token::Keyword(Reserved::If) => {
				self.bump();
				let test = self.condition()?;
				let then_body = self.statement()?;
				let else_body = if self.keyword(Reserved::Else) {
					Some(self.statement()?)
				} else {
					None
				};
				StmtKind::If {
					test,
					then_body,
					else_body,
				}
			}
			Token::Keyword(Reserved::While) => {
				self.bump();
				let test = self.condition()?;
				let body = self.statement()?;
				StmtKind::While { test, body }
			}
			Token::Keyword(Reserved::For) => {
				self.bump();
				self.expect(Token::LeftParenthesis, "'('")?;
				let init = self.optional_expression(Token::Semicolon)?;
				self.expect(Token::Semicolon, "';'")?;
				let test = self.expression()?;
				self.expect(Token::Semicolon, "';'")?;
				let step = self.optional_expression(Token::RightParenthesis)?;
				self.expect(Token::RightParenthesis, "')'")?;
				let body = self.statement()?;
				StmtKind::For {
					init,
					test,
					step,
					body,
				}
			}
			Token::Keyword(Reserved::Switch) => {
				self.bump();
				self.switch()?
			}
			Token::Keyword(Reserved::Return) => {
				self.bump();
				let value = self.optional_expression(Token::Semicolon)?;
				self.expect(Token::Semicolon, "';'")?;
				StmtKind::Return(value)
			}
			Token::Keyword(Reserved::Break) => {
				self.bump();
				self.expect(Token::Semicolon, "';'")?;
				StmtKind::Break
			}
			Token::Keyword(Reserved::Print) => {
				self.bump();
				self.expect(Token::LeftParenthesis, "'('")?;
				let args = self.actuals()?;
				if args.is_empty() {
					return Err(self.unexpected("expression"));
				}
				self.expect(Token::Semicolon, "';'")?;
				StmtKind::Print(args)
			}
			_ => {
				let expr = self.optional_expression(Token::Semicolon)?;
				self.expect(Token::Semicolon, "';'")?;
				StmtKind::Expr(expr)
			}
		};
		let span = start.join(self.last_span);
		Ok(self.ast.add_stmt(kind, span))
	}

	fn condition(&mut self) -> ParseResult<ExprId> {
		self.expect(Token::LeftParenthesis, "'('")?;
		let test = self.expression()?;
		self.expect(Token::RightParenthesis, "')'")?;
		Ok(test)
	}

	fn switch(&mut self) -> ParseResult<StmtKind> {
		let test = self.condition()?;
		self.expect(Token::LeftBrace, "'{'")?;
		let mut cases = Vec::new();
		let mut seen_default = false;
		while !self.next_eq(Token::RightBrace) {
			let start = self.peek_span();
			let value = if !seen_default && self.keyword(Reserved::Case) {
				let negative = self.next_eq(Token::Minus);
				match self.bump() {
					Symbol(Token::IntConstant(value), _) => {
						Some(if negative { value.wrapping_neg() } else { value })
					}
					Symbol(found, span) => {
						return Err(ParseError::Unexpected {
							found,
							expected: "integer constant",
							span,
						})
					}
				}
			} else if !seen_default && self.keyword(Reserved::Default) {
				seen_default = true;
				None
			} else {
				return Err(self.unexpected("'case', 'default' or '}'"));
			};
			self.expect(Token::Colon, "':'")?;
			let mut body = Vec::new();
			while !matches!(
				self.peek(),
				Token::Keyword(Reserved::Case | Reserved::Default) | Token::RightBrace | Token::Eof
			) {
				body.push(self.statement()?);
			}
			let span = start.join(self.last_span);
			cases.push(self.ast.add_stmt(StmtKind::Case { value, body }, span));
		}
		Ok(StmtKind::Switch { test, cases })
	}

	/// Arguments after the opening parenthesis, consumes the closing one
	fn actuals(&mut self) -> ParseResult<Vec<ExprId>> {
		let mut actuals = Vec::new();
		if self.next_eq(Token::RightParenthesis) {
			return Ok(actuals);
		}
		loop {
			actuals.push(self.expression()?);
			if self.next_eq(Token::RightParenthesis) {
				return Ok(actuals);
			}
			self.expect(Token::Comma, "',' or ')'")?;
		}
	}

	/// An expression, or `Empty` when `end` follows immediately
	fn optional_expression(&mut self, end: Token) -> ParseResult<ExprId> {
		if self.at(&end) {
			let span = self.peek_span();
			return Ok(self.ast.add_expr(ExprKind::Empty, span));
		}
		self.expression()
	}

	fn expression(&mut self) -> ParseResult<ExprId> {
		let left = self.logical_or()?;
		if !self.next_eq(Token::Equal) {
			return Ok(left);
		}
		if !matches!(
			self.ast[left].kind,
			ExprKind::FieldAccess { .. } | ExprKind::ArrayAccess { .. }
		) {
			return Err(ParseError::NotAssignable(self.ast[left].span));
		}
		let right = self.expression()?;
		let span = self.ast[left].span.join(self.ast[right].span);
		Ok(self.ast.add_expr(ExprKind::Assign { left, right }, span))
	}

	fn logical_or(&mut self) -> ParseResult<ExprId> {
		let mut left = self.logical_and()?;
		while self.next_eq(Token::PipePipe) {
			let right = self.logical_and()?;
			left = self.binary(Operator::Or, left, right);
		}
		Ok(left)
	}

	fn logical_and(&mut self) -> ParseResult<ExprId> {
		let mut left = self.equality()?;
		while self.next_eq(Token::AmpAmp) {
			let right = self.equality()?;
			left = self.binary(Operator::And, left, right);
		}
		Ok(left)
	}

	fn equality(&mut self) -> ParseResult<ExprId> {
		let mut left = self.relational()?;
		loop {
			let op = match self.peek() {
				Token::EqualEqual => Operator::Equal,
				Token::BangEqual => Operator::NotEqual,
				_ => return Ok(left),
			};
			self.bump();
			let right = self.relational()?;
			left = self.binary(op, left, right);
		}
	}

	fn relational(&mut self) -> ParseResult<ExprId> {
		let left = self.additive()?;
		let op = match self.peek() {
			Token::Less => Operator::Less,
			Token::LessEqual => Operator::LessEqual,
			Token::Greater => Operator::Greater,
			Token::GreaterEqual => Operator::GreaterEqual,
			_ => return Ok(left),
		};
		self.bump();
		let right = self.additive()?;
		Ok(self.binary(op, left, right))
	}

	fn additive(&mut self) -> ParseResult<ExprId> {
		let mut left = self.multiplicative()?;
		loop {
			let op = match self.peek() {
				Token::Plus => Operator::Add,
				Token::Minus => Operator::Sub,
				_ => return Ok(left),
			};
			self.bump();
			let right = self.multiplicative()?;
			left = self.binary(op, left, right);
		}
	}

	fn multiplicative(&mut self) -> ParseResult<ExprId> {
		let mut left = self.unary()?;
		loop {
			let op = match self.peek() {
				Token::Star => Operator::Mul,
				Token::Slash => Operator::Div,
				Token::Percent => Operator::Mod,
				_ => return Ok(left),
			};
			self.bump();
			let right = self.unary()?;
			left = self.binary(op, left, right);
		}
	}

	fn binary(&mut self, op: Operator, left: ExprId, right: ExprId) -> ExprId {
		let span = self.ast[left].span.join(self.ast[right].span);
		let kind = match op {
			Operator::Add | Operator::Sub | Operator::Mul | Operator::Div | Operator::Mod => {
				ExprKind::Arithmetic {
					op,
					left: Some(left),
					right,
				}
			}
			Operator::Equal | Operator::NotEqual => ExprKind::Equality { op, left, right },
			Operator::And | Operator::Or => ExprKind::Logical {
				op,
				left: Some(left),
				right,
			},
			_ => ExprKind::Relational { op, left, right },
		};
		self.ast.add_expr(kind, span)
	}

	fn unary(&mut self) -> ParseResult<ExprId> {
		let start = self.peek_span();
		if self.next_eq(Token::Minus) {
			let right = self.unary()?;
			let span = start.join(self.ast[right].span);
			return Ok(self.ast.add_expr(
				ExprKind::Arithmetic {
					op: Operator::Sub,
					left: None,
					right,
				},
				span,
			));
		}
		if self.next_eq(Token::Bang) {
			let right = self.unary()?;
			let span = start.join(self.ast[right].span);
			return Ok(self.ast.add_expr(
				ExprKind::Logical {
					op: Operator::Not,
					left: None,
					right,
				},
				span,
			));
		}
		self.postfix()
	}

	fn postfix(&mut self) -> ParseResult<ExprId> {
		let mut expr = self.primary()?;
		loop {
			if self.next_eq(Token::Dot) {
				let field = self.identifier()?;
				expr = self.access(Some(expr), field)?;
			} else if self.next_eq(Token::LeftSquare) {
				let subscript = self.expression()?;
				let end = self.expect(Token::RightSquare, "']'")?;
				let span = self.ast[expr].span.join(end);
				expr = self.ast.add_expr(
					ExprKind::ArrayAccess {
						base: expr,
						subscript,
					},
					span,
				);
			} else if matches!(self.peek(), Token::PlusPlus | Token::MinusMinus) {
				let op = match self.bump().0 {
					Token::PlusPlus => Operator::Increment,
					_ => Operator::Decrement,
				};
				if !matches!(
					self.ast[expr].kind,
					ExprKind::FieldAccess { .. } | ExprKind::ArrayAccess { .. }
				) {
					return Err(ParseError::NotAssignable(self.ast[expr].span));
				}
				let span = self.ast[expr].span.join(self.last_span);
				return Ok(self.ast.add_expr(ExprKind::Postfix { op, operand: expr }, span));
			} else {
				return Ok(expr);
			}
		}
	}

	/// `field` or `field(actuals)`, optionally qualified by `base`
	fn access(&mut self, base: Option<ExprId>, field: Identifier) -> ParseResult<ExprId> {
		let start = base.map_or(field.span, |b| self.ast[b].span);
		if self.next_eq(Token::LeftParenthesis) {
			let actuals = self.actuals()?;
			let span = start.join(self.last_span);
			return Ok(self.ast.add_expr(
				ExprKind::Call {
					base,
					field,
					actuals,
				},
				span,
			));
		}
		let span = start.join(field.span);
		Ok(self.ast.add_expr(ExprKind::FieldAccess { base, field }, span))
	}

	fn primary(&mut self) -> ParseResult<ExprId> {
		let start = self.peek_span();
		let kind = match self.peek().clone() {
			Token::IntConstant(value) => ExprKind::IntConstant(value),
			Token::DoubleConstant(value) => ExprKind::DoubleConstant(value),
			Token::StringConstant(value) => ExprKind::StringConstant(value),
			Token::Keyword(Reserved::True) => ExprKind::BoolConstant(true),
			Token::Keyword(Reserved::False) => ExprKind::BoolConstant(false),
			Token::Keyword(Reserved::Null) => ExprKind::NullConstant,
			Token::Keyword(Reserved::This) => ExprKind::This,
			Token::Identifier(_) => {
				let field = self.identifier()?;
				return self.access(None, field);
			}
			Token::LeftParenthesis => {
				self.bump();
				let expr = self.expression()?;
				self.expect(Token::RightParenthesis, "')'")?;
				return Ok(expr);
			}
			Token::Keyword(Reserved::ReadInteger) | Token::Keyword(Reserved::ReadLine) => {
				let kind = match self.bump().0 {
					Token::Keyword(Reserved::ReadInteger) => ExprKind::ReadInteger,
					_ => ExprKind::ReadLine,
				};
				self.expect(Token::LeftParenthesis, "'('")?;
				self.expect(Token::RightParenthesis, "')'")?;
				let span = start.join(self.last_span);
				return Ok(self.ast.add_expr(kind, span));
			}
			Token::Keyword(Reserved::New) => {
				self.bump();
				let parenthesized = self.next_eq(Token::LeftParenthesis);
				let ty = self.named_type()?;
				if parenthesized || self.next_eq(Token::LeftParenthesis) {
					self.expect(Token::RightParenthesis, "')'")?;
				}
				let span = start.join(self.last_span);
				return Ok(self.ast.add_expr(ExprKind::New(ty), span));
			}
			Token::Keyword(Reserved::NewArray) => {
				self.bump();
				self.expect(Token::LeftParenthesis, "'('")?;
				let size = self.expression()?;
				self.expect(Token::Comma, "','")?;
				let elem = self.value_type()?;
				self.expect(Token::RightParenthesis, "')'")?;
				let span = start.join(self.last_span);
				return Ok(self.ast.add_expr(ExprKind::NewArray { size, elem }, span));
			}
			_ => return Err(self.unexpected("expression")),
		};
		self.bump();
		Ok(self.ast.add_expr(kind, start))
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::ast::NodeRef;
	use crate::lexer::tokenize;

	fn parse_str(source: &str) -> ParseResult<Ast> {
		parse(tokenize(source).unwrap())
	}

	#[test]
	fn declarations() {
		let ast = parse_str(
			r"
			int[][] grid;
			interface Shape { double area(); void scale(int by); }
			class Square extends Base implements Shape, Named {
				int side;
				double area() { return side * side; }
			}
			void main() {}
			",
		)
		.unwrap();
		assert_eq!(ast.program.len(), 4);
		let grid = ast.program[0];
		assert_eq!(ast[grid].name(), "grid");
		let DeclKind::Variable { ty } = ast[grid].kind else {
			panic!("expected a variable");
		};
		assert_eq!(ast.syntax_type(ty).to_string(), "int[][]");

		let shape = &ast[ast.program[1]];
		assert!(shape.is_interface());
		assert_eq!(shape.members().len(), 2);

		let DeclKind::Class {
			extends,
			implements,
			members,
		} = &ast[ast.program[2]].kind
		else {
			panic!("expected a class");
		};
		assert!(extends.is_some());
		assert_eq!(implements.len(), 2);
		assert_eq!(members.len(), 2);
		assert_eq!(ast[members[1]].parent, NodeRef::Decl(ast.program[2]));
	}

	#[test]
	fn precedence() {
		let ast = parse_str("void main() { x = 1 + 2 * 3 < 4 || !b && c == d; }").unwrap();
		let root = ast
			.exprs
			.iter()
			.position(|e| matches!(e.kind, ExprKind::Assign { .. }))
			.map(ExprId)
			.unwrap();
		let ExprKind::Assign { right, .. } = ast[root].kind else {
			unreachable!()
		};
		let ExprKind::Logical {
			op: Operator::Or,
			left: Some(left),
			right: and,
		} = ast[right].kind
		else {
			panic!("expected || at the root, got {:?}", ast[right].kind);
		};
		assert!(matches!(
			ast[left].kind,
			ExprKind::Relational {
				op: Operator::Less,
				..
			}
		));
		assert!(matches!(
			ast[and].kind,
			ExprKind::Logical {
				op: Operator::And,
				..
			}
		));
	}

	#[test]
	fn block_declarations_before_statements() {
		let ast = parse_str("void f() { int a; Foo[] b; Foo c; a = 1; b[0] = c; }").unwrap();
		let block = ast
			.stmts
			.iter()
			.find(|s| matches!(s.kind, StmtKind::Block { .. }))
			.unwrap();
		let StmtKind::Block { decls, stmts } = &block.kind else {
			unreachable!()
		};
		assert_eq!(decls.len(), 3);
		assert_eq!(stmts.len(), 2);
	}

	#[test]
	fn statements() {
		let ast = parse_str(
			r#"
			void main() {
				int i;
				for (i = 0; i < 10; i++) {
					if (i == 5) break; else Print(i, "\n");
				}
				while (true) { return; }
				switch (i) { case 1: Print(1); case -2: default: i = NewArray(3, int).length(); }
				a.b.c(1, new(Foo), ReadInteger());
			}
			"#,
		)
		.unwrap();
		let count = |pred: fn(&StmtKind) -> bool| ast.stmts.iter().filter(|s| pred(&s.kind)).count();
		assert_eq!(count(|k| matches!(k, StmtKind::For { .. })), 1);
		assert_eq!(count(|k| matches!(k, StmtKind::Break)), 1);
		assert_eq!(count(|k| matches!(k, StmtKind::Case { value: Some(-2), .. })), 1);
		assert_eq!(count(|k| matches!(k, StmtKind::Case { value: None, .. })), 1);
		assert!(ast
			.exprs
			.iter()
			.any(|e| matches!(&e.kind, ExprKind::Call { base: Some(_), field, actuals } if field.name == "c" && actuals.len() == 3)));
	}

	#[test]
	fn errors() {
		assert!(matches!(
			parse_str("void main() { 1 = 2; }"),
			Err(ParseError::NotAssignable(_))
		));
		assert!(matches!(
			parse_str("void x;"),
			Err(ParseError::Unexpected { .. })
		));
		assert!(matches!(
			parse_str("int f( { }"),
			Err(ParseError::Unexpected { .. })
		));
		assert!(parse_str("").is_err());
	}
}
