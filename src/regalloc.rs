//! Register Allocation
//!
//! Colours a function's interference graph with `k` registers. Nodes of
//! degree below `k` are removed first; when none is left the node with the
//! most neighbours is removed as a spill candidate. Nodes are then coloured in
//! reverse removal order, and a candidate that still finds a free colour keeps
//! it. Whatever cannot be coloured lives in its stack slot.
use std::collections::{BTreeMap, BTreeSet};

use crate::liveness::{FunctionLiveness, InterferenceGraph};
use crate::tac::{LocationId, Program, Segment};

/// Where a location lives for the duration of its function
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Home {
	Register(usize),
	Spilled,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Allocation {
	pub homes: BTreeMap<LocationId, Home>,
}

impl Allocation {
	/// Register index assigned to `location`, `None` for spilled or global ones
	pub fn register(&self, location: LocationId) -> Option<usize> {
		match self.homes.get(&location) {
			Some(Home::Register(register)) => Some(*register),
			_ => None,
		}
	}

	pub fn spilled(&self) -> impl Iterator<Item = LocationId> + '_ {
		self.homes
			.iter()
			.filter(|(_, home)| **home == Home::Spilled)
			.map(|(location, _)| *location)
	}
}

/// Frame locations can be kept in registers; globals and `*(base + offset)`
/// references always go through memory
pub fn is_candidate(program: &Program, location: LocationId) -> bool {
	let location = &program[location];
	location.segment == Segment::FpRelative && location.reference.is_none()
}

pub fn allocate(program: &Program, liveness: &FunctionLiveness, registers: usize) -> Allocation {
	let mut graph = InterferenceGraph::default();
	for (&node, neighbours) in &liveness.interference.edges {
		if !is_candidate(program, node) {
			continue;
		}
		graph.add_node(node);
		for &neighbour in neighbours {
			if is_candidate(program, neighbour) {
				graph.add_edge(node, neighbour);
			}
		}
	}
	colour(&graph, registers)
}

pub fn colour(graph: &InterferenceGraph, registers: usize) -> Allocation {
	let mut remaining: BTreeSet<LocationId> = graph.edges.keys().copied().collect();
	let mut stack = Vec::with_capacity(remaining.len());
	while !remaining.is_empty() {
		let degree = |node: &LocationId| {
			graph
				.neighbours(*node)
				.filter(|n| remaining.contains(n))
				.count()
		};
		let node = match remaining.iter().find(|node| degree(*node) < registers) {
			Some(&node) => node,
			None => {
				let mut spill = None;
				let mut most = 0;
				for node in &remaining {
					let d = degree(node);
					if spill.is_none() || d > most {
						spill = Some(*node);
						most = d;
					}
				}
				match spill {
					Some(node) => {
						log::trace!("{node:?} is a spill candidate, degree {most}");
						node
					}
					None => break,
				}
			}
		};
		remaining.remove(&node);
		stack.push(node);
	}

	let mut allocation = Allocation::default();
	while let Some(node) = stack.pop() {
		let taken: BTreeSet<usize> = graph
			.neighbours(node)
			.filter_map(|n| allocation.register(n))
			.collect();
		let home = match (0..registers).find(|r| !taken.contains(r)) {
			Some(register) => Home::Register(register),
			None => Home::Spilled,
		};
		allocation.homes.insert(node, home);
	}
	log::debug!(
		"coloured {} locations, {} spilled",
		allocation.homes.len(),
		allocation.spilled().count()
	);
	allocation
}

#[cfg(test)]
mod test {
	use super::*;

	fn graph(nodes: usize, edges: &[(usize, usize)]) -> InterferenceGraph {
		let mut graph = InterferenceGraph::default();
		for node in 0..nodes {
			graph.add_node(LocationId(node));
		}
		for &(a, b) in edges {
			graph.add_edge(LocationId(a), LocationId(b));
		}
		graph
	}

	fn assert_valid(graph: &InterferenceGraph, allocation: &Allocation) {
		for (&node, neighbours) in &graph.edges {
			for &neighbour in neighbours {
				if let (Some(a), Some(b)) = (allocation.register(node), allocation.register(neighbour)) {
					assert_ne!(a, b, "{node:?} and {neighbour:?} share a register");
				}
			}
		}
	}

	#[test]
	fn colours_without_spilling() {
		let graph = graph(4, &[(0, 1), (1, 2), (2, 3), (3, 0)]);
		let allocation = colour(&graph, 2);
		assert_eq!(allocation.homes.len(), 4);
		assert_eq!(allocation.spilled().count(), 0);
		assert_valid(&graph, &allocation);
	}

	#[test]
	fn spills_when_registers_run_out() {
		let clique = [(0, 1), (0, 2), (0, 3), (1, 2), (1, 3), (2, 3)];
		let graph = graph(4, &clique);
		let allocation = colour(&graph, 3);
		assert_eq!(allocation.spilled().count(), 1);
		assert_valid(&graph, &allocation);
	}

	#[test]
	fn single_register() {
		let graph = graph(3, &[(0, 1)]);
		let allocation = colour(&graph, 1);
		assert_eq!(allocation.register(LocationId(2)), Some(0));
		assert_eq!(allocation.spilled().count(), 1);
		assert_valid(&graph, &allocation);
	}

	#[test]
	fn only_frame_locations_are_candidates() {
		use crate::liveness::analyze;
		use crate::tac::Instruction;

		let mut program = Program::default();
		let local = program.add_location("a", Segment::FpRelative, -8);
		let global = program.add_location("g", Segment::GpRelative, 0);
		let field = program.add_reference(local, 4);
		program.code = vec![
			Instruction::BeginFunc { frame_size: 4 },
			Instruction::Load {
				dst: local,
				src: global,
				offset: 0,
			},
			Instruction::Store {
				dst: local,
				src: global,
				offset: 4,
			},
			Instruction::EndFunc,
		];
		let liveness = &analyze(&program)[0];
		let allocation = allocate(&program, liveness, 4);
		assert_eq!(allocation.register(local), Some(0));
		assert!(!allocation.homes.contains_key(&global));
		assert!(!allocation.homes.contains_key(&field));
	}
}
