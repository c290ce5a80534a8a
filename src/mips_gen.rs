//! MIPS backend
//!
//! Lowers a `tac::Program` to SPIM assembly using the register assignment of
//! `regalloc`. Locations without a register live in their frame or global
//! slot and pass through the scratch registers `$t0`-`$t2`.
use std::fmt::Write;

use crate::liveness::{self, FunctionLiveness};
use crate::regalloc::{self, Allocation};
use crate::tac::{Instruction, LocationId, OpCode, Program, Segment};

/// Registers handed out by the allocator, in colour order
pub const REGISTERS: [&str; 15] = [
	"$t3", "$t4", "$t5", "$t6", "$t7", "$t8", "$t9", "$s0", "$s1", "$s2", "$s3", "$s4", "$s5",
	"$s6", "$s7",
];

const PRELUDE: &str = r"	.text
	.align 2
	.globl main
";

/// Builtins called through `LCall`, arguments are read from the stack
const RUNTIME: &str = r#"
_PrintInt:
	lw $a0, 4($sp)
	li $v0, 1
	syscall
	jr $ra
_PrintString:
	lw $a0, 4($sp)
	li $v0, 4
	syscall
	jr $ra
_PrintBool:
	lw $t1, 4($sp)
	la $a0, _PrintBool.true
	bnez $t1, _PrintBool.1
	la $a0, _PrintBool.false
_PrintBool.1:
	li $v0, 4
	syscall
	jr $ra
_Alloc:
	lw $a0, 4($sp)
	li $v0, 9
	syscall
	jr $ra
_StringEqual:
	lw $t0, 4($sp)
	lw $t1, 8($sp)
	li $v0, 1
_StringEqual.1:
	lb $t2, 0($t0)
	lb $t3, 0($t1)
	bne $t2, $t3, _StringEqual.2
	beqz $t2, _StringEqual.3
	addiu $t0, $t0, 1
	addiu $t1, $t1, 1
	b _StringEqual.1
_StringEqual.2:
	li $v0, 0
_StringEqual.3:
	jr $ra
_ReadInteger:
	li $v0, 5
	syscall
	jr $ra
_ReadLine:
	li $a0, 128
	li $v0, 9
	syscall
	move $t0, $v0
	move $a0, $v0
	li $a1, 128
	li $v0, 8
	syscall
	move $v0, $t0
_ReadLine.1:
	lb $t1, 0($t0)
	beqz $t1, _ReadLine.3
	li $t2, 10
	bne $t1, $t2, _ReadLine.2
	sb $zero, 0($t0)
	jr $ra
_ReadLine.2:
	addiu $t0, $t0, 1
	b _ReadLine.1
_ReadLine.3:
	jr $ra
_Halt:
	li $v0, 10
	syscall
"#;

const DATA: &str = r#"
	.data
	.align 2
_PrintBool.true:
	.asciiz "true"
_PrintBool.false:
	.asciiz "false"
"#;

/// Register state of the function being lowered
struct Frame {
	liveness: FunctionLiveness,
	allocation: Allocation,
}

pub fn emit(program: &Program, registers: usize) -> String {
	let registers = registers.clamp(1, REGISTERS.len());
	let mut emitter = Emitter {
		program,
		asm: Vec::new(),
		data: String::new(),
		string_count: 0,
	};
	let mut res = PRELUDE.to_string();
	let mut functions = liveness::analyze(program).into_iter();
	let mut frame: Option<Frame> = None;

	for (index, instruction) in program.code.iter().enumerate() {
		match instruction {
			Instruction::Label(label) => {
				res += format!("{label}:\n").as_str();
				continue;
			}
			Instruction::VTable { label, methods } => {
				let _ = writeln!(emitter.data, "{label}:");
				for method in methods {
					let _ = writeln!(emitter.data, "\t.word {method}");
				}
				continue;
			}
			Instruction::BeginFunc { .. } => {
				frame = functions.next().map(|liveness| {
					let allocation = regalloc::allocate(program, &liveness, registers);
					Frame {
						liveness,
						allocation,
					}
				});
			}
			_ => {}
		}
		let Some(current) = &frame else {
			log::warn!("instruction {index} is outside of any function");
			continue;
		};
		if log::log_enabled!(log::Level::Debug) {
			emitter
				.asm
				.push(format!("# {index}: {}", program.display(instruction)));
		}
		emitter.lower(current, index, instruction);
		res.extend(emitter.asm.drain(..).map(|line| format!("\t{line}\n")));
		if matches!(instruction, Instruction::EndFunc) {
			frame = None;
		}
	}

	res += RUNTIME;
	res += DATA;
	res += emitter.data.as_str();
	res
}

struct Emitter<'a> {
	program: &'a Program,
	/// Lines of the instruction being lowered
	asm: Vec<String>,
	/// Contents of the `.data` section
	data: String,
	string_count: usize,
}

impl<'a> Emitter<'a> {
	fn home(&self, location: LocationId) -> String {
		let location = &self.program[location];
		match location.segment {
			Segment::FpRelative => format!("{}($fp)", location.offset),
			Segment::GpRelative => format!("{}($gp)", location.offset),
		}
	}

	/// Register holding the value of `location`, loading it into `scratch`
	/// when it has none
	fn source(&mut self, frame: &Frame, location: LocationId, scratch: &'static str) -> &'static str {
		match frame.allocation.register(location) {
			Some(register) => REGISTERS[register],
			None => {
				self.asm.push(format!("lw {scratch}, {}", self.home(location)));
				scratch
			}
		}
	}

	/// Register to compute `location` into
	fn target(&self, frame: &Frame, location: LocationId, scratch: &'static str) -> &'static str {
		frame
			.allocation
			.register(location)
			.map_or(scratch, |register| REGISTERS[register])
	}

	/// Writes a value computed into `register` back to memory unless
	/// `location` lives in it
	fn commit(&mut self, frame: &Frame, location: LocationId, register: &str) {
		if frame.allocation.register(location).is_none() {
			self.asm.push(format!("sw {register}, {}", self.home(location)));
		}
	}

	/// Coloured locations that survive the call at `index`
	fn live_across(&self, frame: &Frame, index: usize, instruction: &Instruction) -> Vec<LocationId> {
		let kill = instruction.kill();
		frame
			.liveness
			.live_out
			.get(&index)
			.into_iter()
			.flatten()
			.copied()
			.filter(|location| !kill.contains(location))
			.filter(|&location| frame.allocation.register(location).is_some())
			.collect()
	}

	fn call(&mut self, frame: &Frame, index: usize, instruction: &Instruction, jump: String) {
		let saved = self.live_across(frame, index, instruction);
		for &location in &saved {
			let register = self.target(frame, location, "$t0");
			self.asm.push(format!("sw {register}, {}", self.home(location)));
		}
		self.asm.push(jump);
		for &location in &saved {
			let register = self.target(frame, location, "$t0");
			self.asm.push(format!("lw {register}, {}", self.home(location)));
		}
	}

	fn epilogue(&mut self) {
		self.asm.extend(
			["move $sp, $fp", "lw $ra, -4($fp)", "lw $fp, 0($fp)", "jr $ra"].map(String::from),
		);
	}

	fn lower(&mut self, frame: &Frame, index: usize, instruction: &Instruction) {
		match instruction {
			Instruction::LoadConstant { dst, value } => {
				let register = self.target(frame, *dst, "$t0");
				self.asm.push(format!("li {register}, {value}"));
				self.commit(frame, *dst, register);
			}
			Instruction::LoadStringConstant { dst, value } => {
				let label = format!("_string.{}", self.string_count);
				self.string_count += 1;
				// Escapes are left for the assembler to interpret
				let _ = writeln!(self.data, "{label}:\n\t.asciiz \"{value}\"");
				let register = self.target(frame, *dst, "$t0");
				self.asm.push(format!("la {register}, {label}"));
				self.commit(frame, *dst, register);
			}
			Instruction::LoadLabel { dst, label } => {
				let register = self.target(frame, *dst, "$t0");
				self.asm.push(format!("la {register}, {label}"));
				self.commit(frame, *dst, register);
			}
			Instruction::Assign { dst, src } => {
				let src = self.source(frame, *src, "$t1");
				let register = self.target(frame, *dst, "$t0");
				if register != src {
					self.asm.push(format!("move {register}, {src}"));
				}
				self.commit(frame, *dst, register);
			}
			Instruction::Load { dst, src, offset } => {
				let src = self.source(frame, *src, "$t1");
				let register = self.target(frame, *dst, "$t0");
				self.asm.push(format!("lw {register}, {offset}({src})"));
				self.commit(frame, *dst, register);
			}
			Instruction::Store { dst, src, offset } => {
				let base = self.source(frame, *dst, "$t0");
				let value = self.source(frame, *src, "$t1");
				self.asm.push(format!("sw {value}, {offset}({base})"));
			}
			Instruction::BinaryOp {
				code,
				dst,
				op1,
				op2,
			} => {
				let lhs = self.source(frame, *op1, "$t0");
				let rhs = self.source(frame, *op2, "$t1");
				let register = self.target(frame, *dst, "$t2");
				let mnemonic = match code {
					OpCode::Add => "add",
					OpCode::Sub => "sub",
					OpCode::Mul => "mul",
					OpCode::Div => "div",
					OpCode::Mod => "rem",
					OpCode::Eq => "seq",
					OpCode::Less => "slt",
					OpCode::And => "and",
					OpCode::Or => "or",
				};
				self.asm.push(format!("{mnemonic} {register}, {lhs}, {rhs}"));
				self.commit(frame, *dst, register);
			}
			Instruction::Goto(label) => self.asm.push(format!("b {label}")),
			Instruction::IfZ { test, label } => {
				let test = self.source(frame, *test, "$t0");
				self.asm.push(format!("beqz {test}, {label}"));
			}
			Instruction::BeginFunc { frame_size } => {
				self.asm.extend(
					[
						"subu $sp, $sp, 8",
						"sw $fp, 8($sp)",
						"sw $ra, 4($sp)",
						"addiu $fp, $sp, 8",
					]
					.map(String::from),
				);
				self.asm.push(format!("subu $sp, $sp, {frame_size}"));
				// Only parameters live on entry, a dead one may share a register
				for &location in frame.liveness.live_in.get(&index).into_iter().flatten() {
					let parameter = &self.program[location];
					if parameter.segment == Segment::FpRelative && parameter.offset > 0 {
						if let Some(register) = frame.allocation.register(location) {
							let home = self.home(location);
							self.asm.push(format!("lw {}, {home}", REGISTERS[register]));
						}
					}
				}
			}
			Instruction::Return(value) => {
				if let Some(value) = value {
					let value = self.source(frame, *value, "$t0");
					self.asm.push(format!("move $v0, {value}"));
				}
				self.epilogue();
			}
			Instruction::EndFunc => self.epilogue(),
			Instruction::PushParam(value) => {
				let value = self.source(frame, *value, "$t0");
				self.asm.push("subu $sp, $sp, 4".to_string());
				self.asm.push(format!("sw {value}, 4($sp)"));
			}
			Instruction::PopParams(bytes) => self.asm.push(format!("add $sp, $sp, {bytes}")),
			Instruction::LCall { label, dst } => {
				self.call(frame, index, instruction, format!("jal {label}"));
				if let Some(dst) = dst {
					let register = self.target(frame, *dst, "$t0");
					self.asm.push(format!("move {register}, $v0"));
					self.commit(frame, *dst, register);
				}
			}
			Instruction::ACall { addr, dst } => {
				let addr = self.source(frame, *addr, "$t1");
				self.call(frame, index, instruction, format!("jalr {addr}"));
				if let Some(dst) = dst {
					let register = self.target(frame, *dst, "$t0");
					self.asm.push(format!("move {register}, $v0"));
					self.commit(frame, *dst, register);
				}
			}
			Instruction::Label(_) | Instruction::VTable { .. } => {}
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::{analyzer::analyze, lexer::tokenize, parser::parse, tac_gen::generate};

	fn assemble(source: &str, registers: usize) -> String {
		let mut ast = parse(tokenize(source).unwrap()).unwrap();
		assert_eq!(analyze(&mut ast), vec![]);
		emit(&generate(&ast), registers)
	}

	#[test]
	fn function_frame() {
		let asm = assemble("void main() { Print(1); }", 15);
		assert!(asm.starts_with(PRELUDE));
		assert!(asm.contains(
			"main:\n\tsubu $sp, $sp, 8\n\tsw $fp, 8($sp)\n\tsw $ra, 4($sp)\n\taddiu $fp, $sp, 8\n\tsubu $sp, $sp, 4\n"
		));
		assert!(asm.contains("\tli $t3, 1\n\tsubu $sp, $sp, 4\n\tsw $t3, 4($sp)\n\tjal _PrintInt\n"));
		assert!(asm.contains("\tmove $sp, $fp\n\tlw $ra, -4($fp)\n\tlw $fp, 0($fp)\n\tjr $ra\n"));
		assert!(asm.contains("_PrintInt:\n"));
	}

	#[test]
	fn spilled_locations_use_scratch_registers() {
		let source = "void main() { int a; int b; a = 1; b = 2; Print(a + b); }";
		let asm = assemble(source, 1);
		assert!(asm.contains("lw $t0, "));
		assert!(asm.contains("sw $t0, "));
		let colourful = assemble(source, 15);
		assert!(!colourful.contains("lw $t0, -"));
	}

	#[test]
	fn globals_live_in_memory() {
		let asm = assemble("int g; void main() { g = 3; Print(g); }", 15);
		assert!(asm.contains("($gp)"));
	}

	#[test]
	fn parameters_loaded_at_entry() {
		let asm = assemble(
			"int id(int x) { return x; } void main() { Print(id(4)); }",
			15,
		);
		assert!(asm.contains("_id:\n\tsubu $sp, $sp, 8\n"));
		assert!(asm.contains("lw $t3, 4($fp)\n"));
		assert!(asm.contains("move $v0, $t3\n"));
	}

	/// Lines of the function labelled `label`, up to the next function
	fn body<'a>(asm: &'a str, label: &str) -> &'a str {
		let start = asm.find(&format!("{label}:\n")).unwrap();
		let rest = &asm[start..];
		let end = rest.find("\tjr $ra\n").unwrap();
		&rest[..end]
	}

	#[test]
	fn dead_parameters_not_loaded() {
		let asm = assemble(
			"int f(int y, int x) { Print(y); x = 5; return x; } void main() { Print(f(1, 2)); }",
			15,
		);
		let f = body(&asm, "_f");
		assert!(!f.contains(", 8($fp)\n"));
		let load = f.lines().find(|line| line.ends_with(", 4($fp)")).unwrap();
		let register = load.trim().trim_start_matches("lw ").trim_end_matches(", 4($fp)");
		let push = f.find(&format!("sw {register}, 4($sp)")).unwrap();
		assert!(f.find(load).unwrap() < push);
	}

	#[test]
	fn unused_receiver_not_loaded() {
		let asm = assemble(
			r"
			class A { void m(int a) { Print(a); } }
			void main() { A a; a = new A(); a.m(3); }
			",
			15,
		);
		let m = body(&asm, "_A.m");
		assert!(!m.contains(", 4($fp)\n"));
		assert!(m.contains(", 8($fp)\n"));
	}

	#[test]
	fn values_saved_across_calls() {
		let asm = assemble(
			"int f() { return 1; } void main() { int a; a = 5; f(); Print(a); }",
			15,
		);
		let call = asm.find("jal _f").unwrap();
		let before = &asm[..call];
		let after = &asm[call..];
		let save = before.rfind("\tsw $t").unwrap();
		assert!(before[save..].contains("($fp)"));
		assert!(after.starts_with("jal _f\n\tlw $t"));
	}

	#[test]
	fn vtables_and_strings_in_data() {
		let asm = assemble(
			r#"
			class A { void m() { Print("hi"); } }
			void main() { A a; a = new A(); a.m(); }
			"#,
			15,
		);
		let data = asm.find("\t.data").unwrap();
		assert!(asm[data..].contains("A:\n\t.word _A.m\n"));
		assert!(asm[data..].contains("_string.0:\n\t.asciiz \"hi\"\n"));
		assert!(asm.contains("jalr "));
		assert!(asm.contains("_A.m:\n"));
	}
}
