//! Predecessor graph over the nodes of a method body
//!
//! Node `i + 1` is the `i`-th node of the instruction stream and node [`ENTRY`] is a synthetic
//! entry node preceding the first one.

use crate::jvm::{Insn, MethodBody, SynLabel};
use crate::{Error, Result};
use log::trace;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Identifier of the synthetic entry node
pub const ENTRY: usize = 0;

pub struct InstructionGraph {
    predecessors: Vec<BTreeSet<usize>>,
    dead: Vec<bool>,
}

impl InstructionGraph {
    pub fn new(node_count: usize) -> InstructionGraph {
        InstructionGraph {
            predecessors: vec![BTreeSet::new(); node_count],
            dead: vec![false; node_count],
        }
    }

    pub fn node_count(&self) -> usize {
        self.predecessors.len()
    }

    pub fn add_predecessor(&mut self, node: usize, predecessor: usize) {
        self.predecessors[node].insert(predecessor);
    }

    pub fn predecessors(&self, node: usize) -> &BTreeSet<usize> {
        &self.predecessors[node]
    }

    pub fn has_multiple_predecessors(&self, node: usize) -> bool {
        self.predecessors[node].len() > 1
    }

    pub fn single_predecessor(&self, node: usize) -> Result<usize> {
        let predecessors = &self.predecessors[node];
        match predecessors.iter().next() {
            Some(predecessor) if predecessors.len() == 1 => Ok(*predecessor),
            _ => Err(Error::NoSinglePredecessor(node)),
        }
    }

    pub fn is_dead(&self, node: usize) -> bool {
        self.dead[node]
    }

    fn successors(&self) -> Vec<Vec<usize>> {
        let mut successors = vec![vec![]; self.node_count()];
        for (node, predecessors) in self.predecessors.iter().enumerate() {
            for predecessor in predecessors {
                successors[*predecessor].push(node);
            }
        }
        successors
    }

    /// Mark every node not reachable from the entry as dead and forget its edges
    ///
    /// Returns the dead nodes, in ascending order.
    pub fn remove_unreachable(&mut self) -> Vec<usize> {
        let successors = self.successors();
        let mut reachable = vec![false; self.node_count()];
        let mut worklist = vec![ENTRY];
        reachable[ENTRY] = true;
        while let Some(node) = worklist.pop() {
            for successor in &successors[node] {
                if !reachable[*successor] {
                    reachable[*successor] = true;
                    worklist.push(*successor);
                }
            }
        }

        let mut dead_nodes = vec![];
        for (node, is_reachable) in reachable.into_iter().enumerate() {
            if !is_reachable {
                self.dead[node] = true;
                self.predecessors[node].clear();
                dead_nodes.push(node);
            }
        }
        if !dead_nodes.is_empty() {
            let dead = &self.dead;
            for predecessors in &mut self.predecessors {
                predecessors.retain(|predecessor| !dead[*predecessor]);
            }
        }
        dead_nodes
    }

    /// Nodes of the set with at least one predecessor outside of the set
    pub fn find_start_nodes(&self, nodes: &BTreeSet<usize>) -> BTreeSet<usize> {
        nodes
            .iter()
            .copied()
            .filter(|node| {
                let predecessors = &self.predecessors[*node];
                predecessors.is_empty()
                    || !predecessors.iter().all(|pred| nodes.contains(pred))
            })
            .collect()
    }

    /// Order the reachable nodes so that every node comes after all of its predecessors, except
    /// for predecessors along back edges
    pub fn top_sort(&self) -> Vec<usize> {
        let successors = self.successors();
        let sorter = TopSorter::new(&successors, ENTRY);
        let order = sorter.sort(&successors, ENTRY);
        trace!("Traversal order {:?}", order);
        order
    }
}

/// Depth first start and end times, from which back edges are identified
struct TopSorter {
    start_time: Vec<usize>,
    end_time: Vec<usize>,
}

impl TopSorter {
    fn new(successors: &[Vec<usize>], start: usize) -> TopSorter {
        let mut start_time = vec![0; successors.len()];
        let mut end_time = vec![0; successors.len()];
        let mut visited = vec![false; successors.len()];
        let mut time = 0;

        // (node, is_forward)
        let mut unprocessed = vec![(start, true)];
        while let Some((node, is_forward)) = unprocessed.pop() {
            if !is_forward {
                end_time[node] = time;
                time += 1;
                continue;
            }
            if visited[node] {
                continue;
            }
            visited[node] = true;
            start_time[node] = time;
            time += 1;
            unprocessed.push((node, false));
            for successor in &successors[node] {
                if !visited[*successor] {
                    unprocessed.push((*successor, true));
                }
            }
        }

        TopSorter {
            start_time,
            end_time,
        }
    }

    fn is_back_edge(&self, from: usize, to: usize) -> bool {
        from == to
            || (self.start_time[from] > self.start_time[to]
                && self.end_time[from] < self.end_time[to])
    }

    fn sort(&self, successors: &[Vec<usize>], start: usize) -> Vec<usize> {
        let mut in_degree = vec![0usize; successors.len()];
        for (node, node_successors) in successors.iter().enumerate() {
            for successor in node_successors {
                if !self.is_back_edge(node, *successor) {
                    in_degree[*successor] += 1;
                }
            }
        }

        let mut result = vec![];
        let mut unprocessed = vec![start];
        while let Some(node) = unprocessed.pop() {
            result.push(node);
            for successor in &successors[node] {
                if self.is_back_edge(node, *successor) {
                    continue;
                }
                in_degree[*successor] -= 1;
                if in_degree[*successor] == 0 {
                    unprocessed.push(*successor);
                }
            }
        }
        result
    }
}

/// Instruction graph of a method body, along with the node positions of its labels
pub struct MethodGraph {
    pub graph: InstructionGraph,

    /// Node id of every label placed on a live node
    pub labels: HashMap<SynLabel, usize>,

    /// Handler node id to the indices of the exception table entries it handles
    pub handlers: BTreeMap<usize, Vec<usize>>,
}

impl MethodGraph {
    pub fn node_id(&self, label: SynLabel) -> Result<usize> {
        self.labels
            .get(&label)
            .copied()
            .ok_or_else(|| Error::UnresolvedLabel(format!("{:?}", label)))
    }

    pub fn build(body: &MethodBody) -> Result<MethodGraph> {
        let node_count = body.nodes.len() + 1;
        let mut graph = InstructionGraph::new(node_count);

        let mut labels = HashMap::new();
        for (index, node) in body.nodes.iter().enumerate() {
            if let Insn::Label(label) = node {
                labels.insert(*label, index + 1);
            }
        }
        let resolve = |label: SynLabel| {
            labels
                .get(&label)
                .copied()
                .ok_or_else(|| Error::UnresolvedLabel(format!("{:?}", label)))
        };

        if !body.nodes.is_empty() {
            graph.add_predecessor(1, ENTRY);
        }
        for (index, node) in body.nodes.iter().enumerate() {
            let id = index + 1;
            let next = if id + 1 < node_count { Some(id + 1) } else { None };
            match node {
                Insn::Branch(branch) if !branch.is_terminate() => {
                    for target in branch.jump_targets() {
                        graph.add_predecessor(resolve(target)?, id);
                    }
                    if let (true, Some(next)) = (branch.falls_through(), next) {
                        graph.add_predecessor(next, id);
                    }
                }
                Insn::Branch(_) => (),
                _ => {
                    if let Some(next) = next {
                        graph.add_predecessor(next, id);
                    }
                }
            }
        }

        let mut handlers: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (entry_index, try_catch) in body.try_catch.iter().enumerate() {
            let start = resolve(try_catch.start)?;
            let end = resolve(try_catch.end)?;
            let handler = resolve(try_catch.handler)?;
            let entries = handlers.entry(handler).or_default();
            if start == handler {
                continue;
            }
            entries.push(entry_index);

            for node in start..end {
                graph.add_predecessor(handler, node);
            }
            let outside: Vec<usize> = graph
                .predecessors(start)
                .iter()
                .copied()
                .filter(|pred| !(start..=end).contains(pred))
                .collect();
            for pred in outside {
                graph.add_predecessor(handler, pred);
            }
        }

        let dead = graph.remove_unreachable();
        for node in dead {
            if let Some(Insn::Label(label)) = node.checked_sub(1).and_then(|i| body.nodes.get(i)) {
                labels.remove(label);
            }
        }

        Ok(MethodGraph {
            graph,
            labels,
            handlers,
        })
    }
}
