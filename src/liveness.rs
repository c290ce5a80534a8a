//! Liveness Analysis
//!
//! Builds a control flow graph over each function's instructions and solves
//! the backward dataflow equations
//!
//! ```text
//! OUT[i] = union of IN[s] for every successor s
//! IN[i]  = GEN[i] + (OUT[i] - KILL[i])
//! ```
//!
//! until no set changes. Nodes are instruction indices into `Program::code`.
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::tac::{Instruction, LocationId, Program};

pub type LiveSet = BTreeSet<LocationId>;

/// Liveness facts for the instructions between one `BeginFunc`/`EndFunc` pair
#[derive(Debug, Clone, Default)]
pub struct FunctionLiveness {
	/// Index of the function's `BeginFunc`
	pub begin: usize,
	/// Index of the function's `EndFunc`
	pub end: usize,
	pub successors: BTreeMap<usize, Vec<usize>>,
	pub live_in: BTreeMap<usize, LiveSet>,
	pub live_out: BTreeMap<usize, LiveSet>,
	pub interference: InterferenceGraph,
}

/// Undirected graph over locations, an edge means both are live at once
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InterferenceGraph {
	pub edges: BTreeMap<LocationId, BTreeSet<LocationId>>,
}

impl InterferenceGraph {
	pub fn add_node(&mut self, node: LocationId) {
		self.edges.entry(node).or_default();
	}

	pub fn add_edge(&mut self, a: LocationId, b: LocationId) {
		if a == b {
			return;
		}
		self.edges.entry(a).or_default().insert(b);
		self.edges.entry(b).or_default().insert(a);
	}

	pub fn interferes(&self, a: LocationId, b: LocationId) -> bool {
		self.edges.get(&a).is_some_and(|set| set.contains(&b))
	}

	pub fn neighbours(&self, node: LocationId) -> impl Iterator<Item = LocationId> + '_ {
		self.edges.get(&node).into_iter().flatten().copied()
	}

	pub fn degree(&self, node: LocationId) -> usize {
		self.edges.get(&node).map_or(0, BTreeSet::len)
	}
}

pub fn analyze(program: &Program) -> Vec<FunctionLiveness> {
	let mut functions = Vec::new();
	let mut begin = None;
	for (index, instruction) in program.code.iter().enumerate() {
		match instruction {
			Instruction::BeginFunc { .. } => begin = Some(index),
			Instruction::EndFunc => {
				if let Some(begin) = begin.take() {
					functions.push(analyze_function(program, begin, index));
				}
			}
			_ => {}
		}
	}
	functions
}

pub fn analyze_function(program: &Program, begin: usize, end: usize) -> FunctionLiveness {
	let code = &program.code;
	let labels: HashMap<&str, usize> = (begin..=end)
		.filter_map(|index| match &code[index] {
			Instruction::Label(label) => Some((label.as_str(), index)),
			_ => None,
		})
		.collect();

	let mut successors = BTreeMap::new();
	for index in begin..=end {
		let next = (index < end).then_some(index + 1);
		let jump = |label: &str| labels.get(label).copied();
		let targets: Vec<usize> = match &code[index] {
			Instruction::Goto(label) => jump(label).into_iter().collect(),
			Instruction::IfZ { label, .. } => jump(label).into_iter().chain(next).collect(),
			Instruction::Return(_) | Instruction::EndFunc => Vec::new(),
			_ => next.into_iter().collect(),
		};
		successors.insert(index, targets);
	}

	let mut live_in: BTreeMap<usize, LiveSet> = (begin..=end).map(|i| (i, LiveSet::new())).collect();
	let mut live_out = live_in.clone();
	let mut changed = true;
	let mut rounds = 0;
	while changed {
		changed = false;
		rounds += 1;
		for index in (begin..=end).rev() {
			let out: LiveSet = successors[&index]
				.iter()
				.flat_map(|successor| live_in[successor].iter().copied())
				.collect();
			let kill = code[index].kill();
			let mut input: LiveSet = out.iter().copied().filter(|l| !kill.contains(l)).collect();
			input.extend(code[index].gen());
			if input != live_in[&index] || out != live_out[&index] {
				changed = true;
				live_in.insert(index, input);
				live_out.insert(index, out);
			}
		}
	}
	log::trace!("liveness of {begin}..={end} settled after {rounds} rounds");

	let mut interference = InterferenceGraph::default();
	for index in begin..=end {
		let instruction = &code[index];
		for &location in live_in[&index].iter().chain(&live_out[&index]) {
			interference.add_node(location);
		}
		for &location in instruction.kill().iter().chain(&instruction.gen()) {
			interference.add_node(location);
		}
		let live: Vec<LocationId> = live_in[&index].iter().copied().collect();
		for (position, &a) in live.iter().enumerate() {
			for &b in &live[position + 1..] {
				interference.add_edge(a, b);
			}
		}
		for killed in instruction.kill() {
			for &out in &live_out[&index] {
				interference.add_edge(killed, out);
			}
		}
	}

	FunctionLiveness {
		begin,
		end,
		successors,
		live_in,
		live_out,
		interference,
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::tac::{OpCode, Segment};

	fn locations(program: &mut Program, names: &[&str]) -> Vec<LocationId> {
		names
			.iter()
			.enumerate()
			.map(|(i, name)| program.add_location(*name, Segment::FpRelative, -8 - 4 * i as i32))
			.collect()
	}

	#[test]
	fn straight_line() {
		let mut program = Program::default();
		let [a, b, c] = locations(&mut program, &["a", "b", "c"])[..] else {
			unreachable!()
		};
		program.code = vec![
			Instruction::BeginFunc { frame_size: 12 },
			Instruction::LoadConstant { dst: a, value: 1 },
			Instruction::LoadConstant { dst: b, value: 2 },
			Instruction::BinaryOp {
				code: OpCode::Add,
				dst: c,
				op1: a,
				op2: b,
			},
			Instruction::Return(Some(c)),
			Instruction::EndFunc,
		];
		let liveness = &analyze(&program)[0];
		assert_eq!(liveness.successors[&1], vec![2]);
		assert!(liveness.successors[&4].is_empty());
		assert_eq!(liveness.live_in[&3], LiveSet::from([a, b]));
		assert_eq!(liveness.live_out[&3], LiveSet::from([c]));
		assert_eq!(liveness.live_in[&1], LiveSet::new());
		assert!(liveness.interference.interferes(a, b));
		assert!(!liveness.interference.interferes(a, c));
		assert!(!liveness.interference.interferes(b, c));
	}

	#[test]
	fn loop_keeps_values_live() {
		let mut program = Program::default();
		let [i, one, test] = locations(&mut program, &["i", "one", "test"])[..] else {
			unreachable!()
		};
		program.code = vec![
			Instruction::BeginFunc { frame_size: 12 },
			Instruction::LoadConstant { dst: one, value: 1 },
			Instruction::Label("_L0".into()),
			Instruction::IfZ {
				test: i,
				label: "_L1".into(),
			},
			Instruction::BinaryOp {
				code: OpCode::Sub,
				dst: i,
				op1: i,
				op2: one,
			},
			Instruction::Goto("_L0".into()),
			Instruction::Label("_L1".into()),
			Instruction::LoadConstant { dst: test, value: 0 },
			Instruction::EndFunc,
		];
		let liveness = &analyze(&program)[0];
		assert_eq!(liveness.successors[&3], vec![6, 4]);
		assert_eq!(liveness.successors[&5], vec![2]);
		assert!(liveness.successors[&8].is_empty());
		assert!(liveness.live_out[&4].contains(&one));
		assert!(liveness.live_in[&2].contains(&i));
		assert!(liveness.live_out[&6].is_empty());
		assert!(liveness.interference.interferes(i, one));
		assert!(!liveness.interference.interferes(test, one));
		assert!(liveness.interference.edges.contains_key(&test));
	}

	#[test]
	fn functions_are_separate() {
		let mut program = Program::default();
		let [a] = locations(&mut program, &["a"])[..] else {
			unreachable!()
		};
		program.code = vec![
			Instruction::Label("_f".into()),
			Instruction::BeginFunc { frame_size: 4 },
			Instruction::Return(Some(a)),
			Instruction::EndFunc,
			Instruction::Label("main".into()),
			Instruction::BeginFunc { frame_size: 0 },
			Instruction::EndFunc,
		];
		let functions = analyze(&program);
		assert_eq!(functions.len(), 2);
		assert_eq!((functions[0].begin, functions[0].end), (1, 3));
		assert_eq!((functions[1].begin, functions[1].end), (5, 6));
		assert_eq!(functions[0].live_in[&1], LiveSet::from([a]));
		assert!(functions[1].interference.edges.is_empty());
	}
}
