use super::{InstGraph, InstRef};
use petgraph::algo::dominators::{self, Dominators};
use petgraph::graph::{DiGraph, NodeIndex};

/// Dominator tree of an instruction graph
///
/// Catch instructions are entered from every instruction they cover, so an instruction inside a
/// handler is only dominated by what dominates the whole protected range.
pub struct InstDominators {
    dominators: Option<Dominators<NodeIndex>>,
}

impl InstDominators {
    pub fn new(graph: &InstGraph) -> InstDominators {
        let mut flow: DiGraph<InstRef, ()> = DiGraph::with_capacity(graph.len(), graph.len());
        for inst in graph.instructions().refs() {
            flow.add_node(inst);
        }
        for inst in graph.instructions().refs() {
            for successor in graph.all_successors(inst) {
                flow.add_edge(NodeIndex::new(inst.0), NodeIndex::new(successor.0), ());
            }
        }

        let dominators = graph
            .entry()
            .map(|entry| dominators::simple_fast(&flow, NodeIndex::new(entry.0)));
        InstDominators { dominators }
    }

    /// Dominators of an instruction, starting with itself and ending at the entry
    ///
    /// Empty for unreachable instructions.
    pub fn dominators(&self, inst: InstRef) -> Vec<InstRef> {
        self.dominators
            .as_ref()
            .and_then(|dominators| dominators.dominators(NodeIndex::new(inst.0)))
            .map(|iter| iter.map(|node| InstRef(node.index())).collect())
            .unwrap_or_default()
    }

    /// Closest strict dominator (`None` for the entry and for unreachable instructions)
    pub fn immediate_dominator(&self, inst: InstRef) -> Option<InstRef> {
        self.dominators
            .as_ref()?
            .immediate_dominator(NodeIndex::new(inst.0))
            .map(|node| InstRef(node.index()))
    }

    /// Does every path from the entry to `inst` go through `dominator`?
    pub fn is_dominated_by(&self, inst: InstRef, dominator: InstRef) -> bool {
        let mut current = Some(inst);
        while let Some(candidate) = current {
            if candidate == dominator {
                return self.is_reachable(inst);
            }
            current = self.immediate_dominator(candidate);
        }
        false
    }

    pub fn is_reachable(&self, inst: InstRef) -> bool {
        !self.dominators(inst).is_empty()
    }
}

impl InstGraph {
    pub fn dominators(&self) -> InstDominators {
        InstDominators::new(self)
    }
}
