use super::{InstGraph, InstRef};
use std::collections::{BTreeMap, BTreeSet};

/// Natural loop
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Loop {
    /// Instruction dominating every instruction of the loop
    pub head: InstRef,

    /// Body of the loop: the head first, then the rest in instruction order
    pub instructions: Vec<InstRef>,

    /// Last instruction of the body jumping back to the head
    pub back_jump: InstRef,

    /// Instructions of the body with a successor outside the body
    pub exits: Vec<InstRef>,
}

impl Loop {
    pub fn contains(&self, inst: InstRef) -> bool {
        self.instructions.contains(&inst)
    }
}

impl InstGraph {
    /// Natural loops, ordered by head
    ///
    /// Every edge `u -> h` where `h` dominates `u` is a back edge. Its loop is `h` together with
    /// everything that reaches `u` without passing through `h`. Back edges sharing a head form
    /// one loop.
    pub fn loops(&self) -> Vec<Loop> {
        let dominators = self.dominators();

        let mut bodies: BTreeMap<InstRef, (BTreeSet<InstRef>, InstRef)> = BTreeMap::new();
        for inst in self.instructions().refs() {
            for head in self.all_successors(inst) {
                if !dominators.is_dominated_by(inst, head) {
                    continue;
                }

                let mut body: BTreeSet<InstRef> = BTreeSet::new();
                body.insert(head);
                let mut to_visit: Vec<InstRef> = vec![inst];
                while let Some(next) = to_visit.pop() {
                    if body.insert(next) {
                        to_visit.extend(self.all_predecessors(next));
                    }
                }

                let (existing, back_jump) = bodies
                    .entry(head)
                    .or_insert_with(|| (BTreeSet::new(), inst));
                existing.extend(body);
                *back_jump = (*back_jump).max(inst);
            }
        }

        bodies
            .into_iter()
            .map(|(head, (body, back_jump))| {
                let instructions: Vec<InstRef> = std::iter::once(head)
                    .chain(body.iter().copied().filter(|inst| *inst != head))
                    .collect();
                let exits: Vec<InstRef> = instructions
                    .iter()
                    .copied()
                    .filter(|inst| {
                        self.all_successors(*inst)
                            .iter()
                            .any(|successor| !body.contains(successor))
                    })
                    .collect();
                Loop {
                    head,
                    instructions,
                    back_jump,
                    exits,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::cfg::SimpleHierarchy;
    use crate::ir::{
        BinaryExpr, BinaryOp, Constant, IfInst, Inst, LabelRef, LocalVar, TypeName, Value,
    };

    fn counter() -> Value {
        Value::from(LocalVar::generated(0, TypeName::INT))
    }

    fn increment() -> Inst {
        Inst::assign(
            counter(),
            BinaryExpr {
                op: BinaryOp::Add,
                type_name: TypeName::INT,
                lhv: counter(),
                rhv: Value::from(Constant::Int(1)),
            },
        )
    }

    fn while_less(bound: i32, body: usize, exit: usize) -> Inst {
        Inst::If(IfInst {
            condition: BinaryExpr {
                op: BinaryOp::Lt,
                type_name: TypeName::BOOLEAN,
                lhv: counter(),
                rhv: Value::from(Constant::Int(bound)),
            },
            true_branch: LabelRef(body),
            false_branch: LabelRef(exit),
        })
    }

    #[test]
    fn nested_loops() {
        // 0: %0 = 0
        // 1: if (%0 < 10) goto 2 else goto 6     (outer head)
        // 2: if (%0 < 5) goto 3 else goto 5      (inner head)
        // 3: %0 = %0 + 1
        // 4: goto 2
        // 5: goto 1
        // 6: return
        let raw = vec![
            Inst::assign(counter(), Value::from(Constant::Int(0))),
            Inst::Label(LabelRef(1)),
            while_less(10, 2, 6),
            Inst::Label(LabelRef(2)),
            while_less(5, 3, 5),
            Inst::Label(LabelRef(3)),
            increment(),
            Inst::Goto(LabelRef(2)),
            Inst::Label(LabelRef(5)),
            Inst::Goto(LabelRef(1)),
            Inst::Label(LabelRef(6)),
            Inst::Return(None),
        ];
        let hierarchy = SimpleHierarchy::new();
        let graph = InstGraph::build(raw, &hierarchy).unwrap();
        let loops = graph.loops();

        assert_eq!(
            loops,
            vec![
                Loop {
                    head: InstRef(1),
                    instructions: vec![InstRef(1), InstRef(2), InstRef(3), InstRef(4), InstRef(5)],
                    back_jump: InstRef(5),
                    exits: vec![InstRef(1)],
                },
                Loop {
                    head: InstRef(2),
                    instructions: vec![InstRef(2), InstRef(3), InstRef(4)],
                    back_jump: InstRef(4),
                    exits: vec![InstRef(2)],
                },
            ]
        );
        assert!(loops[0].contains(InstRef(3)));
        assert!(!loops[1].contains(InstRef(5)));
    }

    #[test]
    fn straight_line_has_no_loops() {
        let raw = vec![increment(), increment(), Inst::Return(None)];
        let hierarchy = SimpleHierarchy::new();
        let graph = InstGraph::build(raw, &hierarchy).unwrap();
        assert!(graph.loops().is_empty());
    }
}
