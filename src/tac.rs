//! Three Address Code
//!
//! A program is one flat instruction stream. Functions are delimited by
//! `BeginFunc`/`EndFunc`, operands are indices into the program's location
//! table so a variable or temporary is the same `LocationId` at every use.
use std::fmt::{self, Write};
use std::ops::Index;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocationId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
	FpRelative,
	GpRelative,
}

/// `*(base + offset)`, the address of an array element or object field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reference {
	pub base: LocationId,
	pub offset: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
	pub name: String,
	pub segment: Segment,
	pub offset: i32,
	pub reference: Option<Reference>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCode {
	Add,
	Sub,
	Mul,
	Div,
	Mod,
	Eq,
	Less,
	And,
	Or,
}
impl fmt::Display for OpCode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			OpCode::Add => "+",
			OpCode::Sub => "-",
			OpCode::Mul => "*",
			OpCode::Div => "/",
			OpCode::Mod => "%",
			OpCode::Eq => "==",
			OpCode::Less => "<",
			OpCode::And => "&&",
			OpCode::Or => "||",
		})
	}
}

/// Functions provided by the runtime library
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltIn {
	Alloc,
	ReadLine,
	ReadInteger,
	StringEqual,
	PrintInt,
	PrintString,
	PrintBool,
	Halt,
}
impl BuiltIn {
	pub fn label(self) -> &'static str {
		match self {
			BuiltIn::Alloc => "_Alloc",
			BuiltIn::ReadLine => "_ReadLine",
			BuiltIn::ReadInteger => "_ReadInteger",
			BuiltIn::StringEqual => "_StringEqual",
			BuiltIn::PrintInt => "_PrintInt",
			BuiltIn::PrintString => "_PrintString",
			BuiltIn::PrintBool => "_PrintBool",
			BuiltIn::Halt => "_Halt",
		}
	}
	pub fn num_args(self) -> usize {
		match self {
			BuiltIn::ReadLine | BuiltIn::ReadInteger | BuiltIn::Halt => 0,
			BuiltIn::StringEqual => 2,
			_ => 1,
		}
	}
	pub fn has_return(self) -> bool {
		matches!(
			self,
			BuiltIn::Alloc | BuiltIn::ReadLine | BuiltIn::ReadInteger | BuiltIn::StringEqual
		)
	}
}

#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
	LoadConstant {
		dst: LocationId,
		value: i32,
	},
	LoadStringConstant {
		dst: LocationId,
		value: String,
	},
	LoadLabel {
		dst: LocationId,
		label: String,
	},
	Assign {
		dst: LocationId,
		src: LocationId,
	},
	/// `dst = *(src + offset)`
	Load {
		dst: LocationId,
		src: LocationId,
		offset: i32,
	},
	/// `*(dst + offset) = src`
	Store {
		dst: LocationId,
		src: LocationId,
		offset: i32,
	},
	BinaryOp {
		code: OpCode,
		dst: LocationId,
		op1: LocationId,
		op2: LocationId,
	},
	Label(String),
	Goto(String),
	IfZ {
		test: LocationId,
		label: String,
	},
	/// Frame size in bytes for locals and temporaries
	BeginFunc {
		frame_size: i32,
	},
	EndFunc,
	Return(Option<LocationId>),
	PushParam(LocationId),
	/// Bytes of parameters to pop
	PopParams(i32),
	LCall {
		label: String,
		dst: Option<LocationId>,
	},
	ACall {
		addr: LocationId,
		dst: Option<LocationId>,
	},
	VTable {
		label: String,
		methods: Vec<String>,
	},
}

impl Instruction {
	/// Locations read
	pub fn gen(&self) -> Vec<LocationId> {
		use Instruction::*;
		match self {
			Assign { src, .. } | Load { src, .. } => vec![*src],
			Store { dst, src, .. } => vec![*dst, *src],
			BinaryOp { op1, op2, .. } => vec![*op1, *op2],
			IfZ { test, .. } => vec![*test],
			Return(Some(value)) | PushParam(value) => vec![*value],
			ACall { addr, .. } => vec![*addr],
			_ => Vec::new(),
		}
	}

	/// Locations written
	pub fn kill(&self) -> Vec<LocationId> {
		use Instruction::*;
		match self {
			LoadConstant { dst, .. }
			| LoadStringConstant { dst, .. }
			| LoadLabel { dst, .. }
			| Assign { dst, .. }
			| Load { dst, .. }
			| BinaryOp { dst, .. } => vec![*dst],
			LCall { dst: Some(dst), .. } | ACall { dst: Some(dst), .. } => vec![*dst],
			_ => Vec::new(),
		}
	}

	pub fn is_call(&self) -> bool {
		matches!(self, Instruction::LCall { .. } | Instruction::ACall { .. })
	}
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Program {
	pub locations: Vec<Location>,
	pub code: Vec<Instruction>,
}

impl Index<LocationId> for Program {
	type Output = Location;
	fn index(&self, id: LocationId) -> &Location {
		&self.locations[id.0]
	}
}

impl Program {
	pub fn add_location(
		&mut self,
		name: impl Into<String>,
		segment: Segment,
		offset: i32,
	) -> LocationId {
		let id = LocationId(self.locations.len());
		self.locations.push(Location {
			name: name.into(),
			segment,
			offset,
			reference: None,
		});
		id
	}

	pub fn add_reference(&mut self, base: LocationId, offset: i32) -> LocationId {
		let id = LocationId(self.locations.len());
		let base_location = &self[base];
		self.locations.push(Location {
			name: format!("*({} + {offset})", base_location.name),
			segment: base_location.segment,
			offset: base_location.offset,
			reference: Some(Reference { base, offset }),
		});
		id
	}

	/// `instruction` in the textual TAC form, without indentation
	pub fn display(&self, instruction: &Instruction) -> String {
		use Instruction::*;
		let name = |id: &LocationId| self[*id].name.as_str();
		match instruction {
			LoadConstant { dst, value } => format!("{} = {value} ;", name(dst)),
			LoadStringConstant { dst, value } => format!("{} = \"{value}\" ;", name(dst)),
			LoadLabel { dst, label } => format!("{} = {label} ;", name(dst)),
			Assign { dst, src } => format!("{} = {} ;", name(dst), name(src)),
			Load { dst, src, offset: 0 } => format!("{} = *({}) ;", name(dst), name(src)),
			Load { dst, src, offset } => {
				format!("{} = *({} + {offset}) ;", name(dst), name(src))
			}
			Store { dst, src, offset: 0 } => format!("*({}) = {} ;", name(dst), name(src)),
			Store { dst, src, offset } => {
				format!("*({} + {offset}) = {} ;", name(dst), name(src))
			}
			BinaryOp {
				code,
				dst,
				op1,
				op2,
			} => format!("{} = {} {code} {} ;", name(dst), name(op1), name(op2)),
			Label(label) => format!("{label}:"),
			Goto(label) => format!("Goto {label} ;"),
			IfZ { test, label } => format!("IfZ {} Goto {label} ;", name(test)),
			BeginFunc { frame_size } => format!("BeginFunc {frame_size} ;"),
			EndFunc => "EndFunc ;".to_string(),
			Return(Some(value)) => format!("Return {} ;", name(value)),
			Return(None) => "Return ;".to_string(),
			PushParam(value) => format!("PushParam {} ;", name(value)),
			PopParams(bytes) => format!("PopParams {bytes} ;"),
			LCall {
				label,
				dst: Some(dst),
			} => format!("{} = LCall {label} ;", name(dst)),
			LCall { label, dst: None } => format!("LCall {label} ;"),
			ACall {
				addr,
				dst: Some(dst),
			} => format!("{} = ACall {} ;", name(dst), name(addr)),
			ACall { addr, dst: None } => format!("ACall {} ;", name(addr)),
			VTable { label, methods } => {
				let mut text = format!("VTable {label} =\n");
				for method in methods {
					let _ = writeln!(text, "\t{method},");
				}
				text.push(';');
				text
			}
		}
	}

	/// The whole program, labels flush left and everything else indented
	pub fn listing(&self) -> String {
		let mut text = String::new();
		for instruction in &self.code {
			if !matches!(instruction, Instruction::Label(_)) {
				text.push('\t');
			}
			text.push_str(&self.display(instruction));
			text.push('\n');
		}
		text
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn gen_and_kill() {
		let mut program = Program::default();
		let a = program.add_location("a", Segment::FpRelative, -8);
		let b = program.add_location("b", Segment::FpRelative, -12);
		let c = program.add_location("c", Segment::GpRelative, 0);

		let op = Instruction::BinaryOp {
			code: OpCode::Add,
			dst: a,
			op1: b,
			op2: c,
		};
		assert_eq!(op.gen(), vec![b, c]);
		assert_eq!(op.kill(), vec![a]);

		let store = Instruction::Store {
			dst: a,
			src: b,
			offset: 4,
		};
		assert_eq!(store.gen(), vec![a, b]);
		assert!(store.kill().is_empty());

		let call = Instruction::ACall {
			addr: b,
			dst: Some(a),
		};
		assert_eq!(call.gen(), vec![b]);
		assert_eq!(call.kill(), vec![a]);
		assert!(call.is_call());

		assert!(Instruction::Goto("_L0".into()).gen().is_empty());
		assert_eq!(
			Instruction::IfZ {
				test: c,
				label: "_L0".into()
			}
			.gen(),
			vec![c]
		);
	}

	#[test]
	fn listing() {
		let mut program = Program::default();
		let t = program.add_location("_tmp0", Segment::FpRelative, -8);
		let field = program.add_reference(t, 4);
		assert_eq!(program[field].name, "*(_tmp0 + 4)");
		program.code = vec![
			Instruction::Label("main".into()),
			Instruction::BeginFunc { frame_size: 4 },
			Instruction::LoadConstant { dst: t, value: 7 },
			Instruction::PushParam(t),
			Instruction::LCall {
				label: BuiltIn::PrintInt.label().into(),
				dst: None,
			},
			Instruction::PopParams(4),
			Instruction::EndFunc,
		];
		assert_eq!(
			program.listing(),
			"main:\n\tBeginFunc 4 ;\n\t_tmp0 = 7 ;\n\tPushParam _tmp0 ;\n\tLCall _PrintInt ;\n\tPopParams 4 ;\n\tEndFunc ;\n"
		);
	}

	#[test]
	fn builtins() {
		assert_eq!(BuiltIn::StringEqual.num_args(), 2);
		assert!(BuiltIn::Alloc.has_return());
		assert!(!BuiltIn::PrintBool.has_return());
		assert_eq!(BuiltIn::Halt.num_args(), 0);
	}
}
