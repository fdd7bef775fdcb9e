use super::{BlockGraph, ClassHierarchy, ExceptionResolver, InstList, InstRef, Location};
use crate::ir::{Inst, TypeName};
use crate::Result;
use log::trace;
use std::collections::{BTreeMap, HashSet};

/// Control-flow graph over the instructions of one method
///
/// Normal edges come from fallthrough and jumps. Exceptional edges connect every instruction
/// to the catch instructions whose ranges cover it (its _catchers_), and in the other direction
/// a catch instruction to the instructions it covers (its _throwers_).
pub struct InstGraph {
    list: InstList,
    successors: Vec<Vec<InstRef>>,
    predecessors: Vec<Vec<InstRef>>,
    catchers: Vec<Vec<InstRef>>,

    /// Exception types each instruction may raise that no catcher handles
    exception_exits: Vec<Vec<TypeName>>,
    throw_exits: BTreeMap<TypeName, Vec<InstRef>>,
}

impl InstGraph {
    /// Lower a finished raw instruction list and build its graph
    pub fn build(raw: Vec<Inst>, hierarchy: &dyn ClassHierarchy) -> Result<InstGraph> {
        Ok(InstGraph::new(InstList::new(raw)?, hierarchy))
    }

    pub fn new(list: InstList, hierarchy: &dyn ClassHierarchy) -> InstGraph {
        let len = list.len();

        let mut successors: Vec<Vec<InstRef>> = Vec::with_capacity(len);
        for (inst_ref, inst) in list.iter() {
            let targets = if inst.is_terminating() {
                vec![]
            } else if inst.is_branching() {
                list.jump_targets(inst_ref)
            } else if inst_ref.0 + 1 < len {
                vec![InstRef(inst_ref.0 + 1)]
            } else {
                vec![]
            };
            successors.push(dedup_refs(targets));
        }

        let mut predecessors: Vec<Vec<InstRef>> = vec![vec![]; len];
        for (source, targets) in successors.iter().enumerate() {
            for target in targets {
                predecessors[target.0].push(InstRef(source));
            }
        }

        let mut catchers: Vec<Vec<InstRef>> = vec![vec![]; len];
        for catch in list.refs() {
            for thrower in list.covered_by(catch) {
                catchers[thrower.0].push(catch);
            }
        }

        // Exceptions escaping the method
        let resolver = ExceptionResolver::new(hierarchy);
        let mut exception_exits: Vec<Vec<TypeName>> = Vec::with_capacity(len);
        let mut throw_exits: BTreeMap<TypeName, Vec<InstRef>> = BTreeMap::new();
        for (inst_ref, inst) in list.iter() {
            let uncaught: Vec<TypeName> = resolver
                .exceptions(inst)
                .into_iter()
                .filter(|raised| {
                    !catchers[inst_ref.0].iter().any(|catch| match list.inst(*catch) {
                        Inst::Catch(catch) => {
                            hierarchy.is_subclass(raised, &catch.throwable.type_name())
                        }
                        _ => false,
                    })
                })
                .collect();
            for raised in &uncaught {
                throw_exits
                    .entry(raised.clone())
                    .or_insert_with(Vec::new)
                    .push(inst_ref);
            }
            exception_exits.push(uncaught);
        }

        trace!(
            "Built instruction graph with {} instructions and {} escaping exception types",
            len,
            throw_exits.len()
        );

        InstGraph {
            list,
            successors,
            predecessors,
            catchers,
            exception_exits,
            throw_exits,
        }
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    pub fn instructions(&self) -> &InstList {
        &self.list
    }

    /// First instruction (`None` only for an empty method)
    pub fn entry(&self) -> Option<InstRef> {
        if self.list.is_empty() {
            None
        } else {
            Some(InstRef(0))
        }
    }

    /// Returns and throws
    pub fn exits(&self) -> Vec<InstRef> {
        self.list
            .iter()
            .filter(|(_, inst)| inst.is_terminating())
            .map(|(inst_ref, _)| inst_ref)
            .collect()
    }

    /// Find the reference of an instruction borrowed from this graph
    pub fn index(&self, inst: &Inst) -> Option<InstRef> {
        self.list
            .instructions()
            .iter()
            .position(|candidate| std::ptr::eq(candidate, inst))
            .map(InstRef)
    }

    pub fn inst(&self, inst: InstRef) -> &Inst {
        self.list.inst(inst)
    }

    pub fn location(&self, inst: InstRef) -> Location {
        self.list.location(inst)
    }

    /// Physically previous instruction
    pub fn previous(&self, inst: InstRef) -> Option<InstRef> {
        inst.0.checked_sub(1).map(InstRef)
    }

    /// Physically next instruction
    pub fn next(&self, inst: InstRef) -> Option<InstRef> {
        if inst.0 + 1 < self.list.len() {
            Some(InstRef(inst.0 + 1))
        } else {
            None
        }
    }

    pub fn successors(&self, inst: InstRef) -> &[InstRef] {
        &self.successors[inst.0]
    }

    pub fn predecessors(&self, inst: InstRef) -> &[InstRef] {
        &self.predecessors[inst.0]
    }

    /// Instructions covered by a catch instruction (empty for other instructions)
    pub fn throwers(&self, inst: InstRef) -> &[InstRef] {
        self.list.covered_by(inst)
    }

    /// Catch instructions whose ranges cover this instruction
    pub fn catchers(&self, inst: InstRef) -> &[InstRef] {
        &self.catchers[inst.0]
    }

    /// Exception types this instruction may raise which escape the method
    pub fn exception_exits(&self, inst: InstRef) -> &[TypeName] {
        &self.exception_exits[inst.0]
    }

    /// Escaping exception types, and the instructions that raise them
    pub fn throw_exits(&self) -> &BTreeMap<TypeName, Vec<InstRef>> {
        &self.throw_exits
    }

    /// Normal predecessors, plus throwers for catch instructions
    pub fn all_predecessors(&self, inst: InstRef) -> Vec<InstRef> {
        let mut all = self.predecessors(inst).to_vec();
        all.extend_from_slice(self.throwers(inst));
        dedup_refs(all)
    }

    /// Normal successors, plus catchers
    pub fn all_successors(&self, inst: InstRef) -> Vec<InstRef> {
        let mut all = self.successors(inst).to_vec();
        all.extend_from_slice(self.catchers(inst));
        dedup_refs(all)
    }

    pub fn block_graph(&self) -> BlockGraph<'_> {
        BlockGraph::new(self)
    }
}

pub(super) fn dedup_refs(mut refs: Vec<InstRef>) -> Vec<InstRef> {
    let mut seen: HashSet<InstRef> = HashSet::new();
    refs.retain(|inst| seen.insert(*inst));
    refs
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::cfg::SimpleHierarchy;
    use crate::ir::{
        BinaryExpr, BinaryOp, CatchEntry, CatchInst, Constant, IfInst, LabelRef, LocalVar, Value,
    };

    fn register(index: usize, type_name: TypeName) -> Value {
        Value::from(LocalVar::generated(index, type_name))
    }

    /// ```text
    /// #0
    /// %0 = 10 / arg
    /// if (%0 > 0) goto #1 else goto #1
    /// #1
    /// return %0
    /// #2
    /// #3
    /// catch %1 (java.lang.ArithmeticException) for #0..#2
    /// throw %1
    /// ```
    fn guarded_division() -> Vec<Inst> {
        let quotient = register(0, TypeName::INT);
        let caught = register(1, TypeName::ARITHMETIC_EXCEPTION);
        vec![
            Inst::Label(LabelRef(0)),
            Inst::assign(
                quotient.clone(),
                BinaryExpr {
                    op: BinaryOp::Div,
                    type_name: TypeName::INT,
                    lhv: Value::from(Constant::Int(10)),
                    rhv: register(5, TypeName::INT),
                },
            ),
            Inst::If(IfInst {
                condition: BinaryExpr {
                    op: BinaryOp::Gt,
                    type_name: TypeName::BOOLEAN,
                    lhv: quotient.clone(),
                    rhv: Value::from(Constant::Int(0)),
                },
                true_branch: LabelRef(1),
                false_branch: LabelRef(1),
            }),
            Inst::Label(LabelRef(1)),
            Inst::Return(Some(quotient)),
            Inst::Label(LabelRef(2)),
            Inst::Label(LabelRef(3)),
            Inst::Catch(CatchInst {
                throwable: caught.clone(),
                handler: LabelRef(3),
                entries: vec![CatchEntry {
                    accepted_throwable: TypeName::ARITHMETIC_EXCEPTION,
                    start_inclusive: LabelRef(0),
                    end_exclusive: LabelRef(2),
                }],
            }),
            Inst::Throw(caught),
        ]
    }

    #[test]
    fn edges() {
        let hierarchy = SimpleHierarchy::new();
        let graph = InstGraph::build(guarded_division(), &hierarchy).unwrap();

        assert_eq!(graph.len(), 5);
        assert_eq!(graph.entry(), Some(InstRef(0)));
        assert_eq!(graph.exits(), vec![InstRef(2), InstRef(4)]);
        assert_eq!(graph.successors(InstRef(0)), &[InstRef(1)]);
        assert_eq!(graph.successors(InstRef(1)), &[InstRef(2)]);
        assert!(graph.successors(InstRef(2)).is_empty());
        assert_eq!(graph.predecessors(InstRef(2)), &[InstRef(1)]);
        assert!(graph.predecessors(InstRef(3)).is_empty());
        assert_eq!(graph.previous(InstRef(0)), None);
        assert_eq!(graph.next(InstRef(4)), None);

        // The catch range ends at #2, which resolves to the instruction after the return
        assert_eq!(
            graph.throwers(InstRef(3)),
            &[InstRef(0), InstRef(1), InstRef(2)]
        );
        assert_eq!(graph.catchers(InstRef(0)), &[InstRef(3)]);
        assert!(graph.catchers(InstRef(4)).is_empty());
        assert_eq!(
            graph.all_predecessors(InstRef(3)),
            vec![InstRef(0), InstRef(1), InstRef(2)]
        );

        let ret = graph.inst(InstRef(2));
        assert_eq!(graph.index(ret), Some(InstRef(2)));
    }

    #[test]
    fn escaping_exceptions() {
        let hierarchy = SimpleHierarchy::new();
        let graph = InstGraph::build(guarded_division(), &hierarchy).unwrap();

        // The division is caught, the rethrow is not
        assert!(graph.exception_exits(InstRef(0)).is_empty());
        assert_eq!(
            graph.exception_exits(InstRef(4)),
            &[
                TypeName::ARITHMETIC_EXCEPTION,
                TypeName::NULL_POINTER_EXCEPTION
            ]
        );
        assert_eq!(
            graph
                .throw_exits()
                .get(&TypeName::ARITHMETIC_EXCEPTION)
                .cloned(),
            Some(vec![InstRef(4)])
        );
        assert_eq!(graph.throw_exits().len(), 2);
    }
}
