use super::{InstGraph, InstRef};
use crate::ir::Inst;
use std::fmt;

/// Index of a block in a [`BlockGraph`]
#[derive(Copy, Clone, Hash, Eq, PartialEq, PartialOrd, Ord)]
pub struct BlockRef(pub usize);

impl fmt::Debug for BlockRef {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "bb{}", self.0)
    }
}

impl fmt::Display for BlockRef {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "bb{}", self.0)
    }
}

/// Maximal run of instructions with one entry point and a single set of catchers
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub struct BasicBlock {
    /// First instruction
    pub start: InstRef,

    /// Last instruction (inclusive)
    pub end: InstRef,
}

impl BasicBlock {
    pub fn len(&self) -> usize {
        self.end.0 - self.start.0 + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn contains(&self, inst: InstRef) -> bool {
        self.start <= inst && inst <= self.end
    }

    pub fn refs(&self) -> impl Iterator<Item = InstRef> {
        (self.start.0..=self.end.0).map(InstRef)
    }
}

/// Basic blocks of an instruction graph
///
/// A block starts at the first instruction, at any instruction with more than one predecessor,
/// after any branch or terminator, at catch instructions, and wherever the set of catchers
/// changes. Every instruction of a block therefore shares the same catchers.
pub struct BlockGraph<'g> {
    graph: &'g InstGraph,
    blocks: Vec<BasicBlock>,

    /// Block containing each instruction
    block_of: Vec<BlockRef>,
    successors: Vec<Vec<BlockRef>>,
    predecessors: Vec<Vec<BlockRef>>,
    catchers: Vec<Vec<BlockRef>>,
    throwers: Vec<Vec<BlockRef>>,
}

impl<'g> BlockGraph<'g> {
    pub fn new(graph: &'g InstGraph) -> BlockGraph<'g> {
        let mut blocks: Vec<BasicBlock> = vec![];
        let mut block_of: Vec<BlockRef> = Vec::with_capacity(graph.len());

        for (inst_ref, inst) in graph.instructions().iter() {
            let starts_block = match graph.previous(inst_ref) {
                None => true,
                Some(previous) => {
                    let previous_inst = graph.inst(previous);
                    previous_inst.is_branching()
                        || previous_inst.is_terminating()
                        || matches!(inst, Inst::Catch(_))
                        || graph.predecessors(inst_ref).len() > 1
                        || graph.catchers(inst_ref) != graph.catchers(previous)
                }
            };
            match blocks.last_mut() {
                Some(block) if !starts_block => block.end = inst_ref,
                _ => blocks.push(BasicBlock {
                    start: inst_ref,
                    end: inst_ref,
                }),
            }
            block_of.push(BlockRef(blocks.len() - 1));
        }

        let to_blocks = |insts: &[InstRef]| -> Vec<BlockRef> {
            let mut refs: Vec<BlockRef> = vec![];
            for inst in insts {
                let block = block_of[inst.0];
                if !refs.contains(&block) {
                    refs.push(block);
                }
            }
            refs
        };

        let successors: Vec<Vec<BlockRef>> = blocks
            .iter()
            .map(|block| to_blocks(graph.successors(block.end)))
            .collect();
        let predecessors: Vec<Vec<BlockRef>> = blocks
            .iter()
            .map(|block| to_blocks(graph.predecessors(block.start)))
            .collect();
        let catchers: Vec<Vec<BlockRef>> = blocks
            .iter()
            .map(|block| to_blocks(graph.catchers(block.start)))
            .collect();

        let mut throwers: Vec<Vec<BlockRef>> = vec![vec![]; blocks.len()];
        for (block, block_catchers) in catchers.iter().enumerate() {
            for catcher in block_catchers {
                throwers[catcher.0].push(BlockRef(block));
            }
        }

        BlockGraph {
            graph,
            blocks,
            block_of,
            successors,
            predecessors,
            catchers,
            throwers,
        }
    }

    pub fn inst_graph(&self) -> &'g InstGraph {
        self.graph
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn blocks(&self) -> &[BasicBlock] {
        &self.blocks
    }

    pub fn refs(&self) -> impl Iterator<Item = BlockRef> {
        (0..self.blocks.len()).map(BlockRef)
    }

    pub fn block(&self, block: BlockRef) -> &BasicBlock {
        &self.blocks[block.0]
    }

    /// Instructions of a block, in order
    pub fn instructions(&self, block: BlockRef) -> &'g [Inst] {
        let BasicBlock { start, end } = self.blocks[block.0];
        &self.graph.instructions().instructions()[start.0..=end.0]
    }

    pub fn block_of(&self, inst: InstRef) -> BlockRef {
        self.block_of[inst.0]
    }

    pub fn entry(&self) -> Option<BlockRef> {
        if self.blocks.is_empty() {
            None
        } else {
            Some(BlockRef(0))
        }
    }

    /// Blocks without successors
    pub fn exits(&self) -> Vec<BlockRef> {
        self.refs()
            .filter(|block| self.successors[block.0].is_empty())
            .collect()
    }

    pub fn successors(&self, block: BlockRef) -> &[BlockRef] {
        &self.successors[block.0]
    }

    pub fn predecessors(&self, block: BlockRef) -> &[BlockRef] {
        &self.predecessors[block.0]
    }

    /// Handler blocks for exceptions raised in this block
    pub fn catchers(&self, block: BlockRef) -> &[BlockRef] {
        &self.catchers[block.0]
    }

    /// Blocks whose exceptions this handler block catches
    pub fn throwers(&self, block: BlockRef) -> &[BlockRef] {
        &self.throwers[block.0]
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::cfg::SimpleHierarchy;
    use crate::ir::{
        BinaryExpr, BinaryOp, CatchEntry, CatchInst, Constant, IfInst, LabelRef, LocalVar,
        TypeName, Value,
    };

    fn register(index: usize) -> Value {
        Value::from(LocalVar::generated(index, TypeName::INT))
    }

    fn constant(value: i32) -> Value {
        Value::from(Constant::Int(value))
    }

    #[test]
    fn diamond() {
        // 0: %0 = 1
        // 1: if (%0 > 0) goto 3 else goto 2
        // 2: %0 = 2
        // 3: %1 = %0       (join)
        // 4: %1 = %1 + 1
        // 5: return %1
        let raw = vec![
            Inst::assign(register(0), constant(1)),
            Inst::If(IfInst {
                condition: BinaryExpr {
                    op: BinaryOp::Gt,
                    type_name: TypeName::BOOLEAN,
                    lhv: register(0),
                    rhv: constant(0),
                },
                true_branch: LabelRef(1),
                false_branch: LabelRef(0),
            }),
            Inst::Label(LabelRef(0)),
            Inst::assign(register(0), constant(2)),
            Inst::Label(LabelRef(1)),
            Inst::assign(register(1), register(0)),
            Inst::assign(
                register(1),
                BinaryExpr {
                    op: BinaryOp::Add,
                    type_name: TypeName::INT,
                    lhv: register(1),
                    rhv: constant(1),
                },
            ),
            Inst::Return(Some(register(1))),
        ];
        let hierarchy = SimpleHierarchy::new();
        let graph = InstGraph::build(raw, &hierarchy).unwrap();
        let blocks = graph.block_graph();

        assert_eq!(
            blocks.blocks(),
            &[
                BasicBlock {
                    start: InstRef(0),
                    end: InstRef(1)
                },
                BasicBlock {
                    start: InstRef(2),
                    end: InstRef(2)
                },
                BasicBlock {
                    start: InstRef(3),
                    end: InstRef(5)
                },
            ]
        );
        assert_eq!(blocks.successors(BlockRef(0)), &[BlockRef(2), BlockRef(1)]);
        assert_eq!(blocks.successors(BlockRef(1)), &[BlockRef(2)]);
        assert_eq!(blocks.predecessors(BlockRef(2)), &[BlockRef(0), BlockRef(1)]);
        assert_eq!(blocks.exits(), vec![BlockRef(2)]);
        assert_eq!(blocks.instructions(BlockRef(2)).len(), 3);
        assert_eq!(blocks.block_of(InstRef(4)), BlockRef(2));
    }

    #[test]
    fn catcher_changes_split_blocks() {
        // 0: %0 = 1
        // 1: %1 = %0 / 0   (covered)
        // 2: return %1     (covered)
        // 3: catch %2
        // 4: return 0
        let throwable = Value::from(LocalVar::generated(2, TypeName::ARITHMETIC_EXCEPTION));
        let raw = vec![
            Inst::assign(register(0), constant(1)),
            Inst::Label(LabelRef(0)),
            Inst::assign(
                register(1),
                BinaryExpr {
                    op: BinaryOp::Div,
                    type_name: TypeName::INT,
                    lhv: register(0),
                    rhv: constant(0),
                },
            ),
            Inst::Return(Some(register(1))),
            Inst::Label(LabelRef(1)),
            Inst::Label(LabelRef(2)),
            Inst::Catch(CatchInst {
                throwable,
                handler: LabelRef(2),
                entries: vec![CatchEntry {
                    accepted_throwable: TypeName::ARITHMETIC_EXCEPTION,
                    start_inclusive: LabelRef(0),
                    end_exclusive: LabelRef(1),
                }],
            }),
            Inst::Return(Some(constant(0))),
        ];
        let hierarchy = SimpleHierarchy::new();
        let graph = InstGraph::build(raw, &hierarchy).unwrap();
        let blocks = graph.block_graph();

        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks.block(BlockRef(0)).len(), 1);
        assert_eq!(
            blocks.block(BlockRef(1)),
            &BasicBlock {
                start: InstRef(1),
                end: InstRef(2)
            }
        );
        assert_eq!(blocks.catchers(BlockRef(1)), &[BlockRef(2)]);
        assert_eq!(blocks.throwers(BlockRef(2)), &[BlockRef(1)]);
        assert!(blocks.catchers(BlockRef(0)).is_empty());
        assert_eq!(blocks.successors(BlockRef(0)), &[BlockRef(1)]);
        assert_eq!(blocks.exits(), vec![BlockRef(1), BlockRef(2)]);

        for block in blocks.refs() {
            let catchers = graph.catchers(blocks.block(block).start);
            assert!(blocks
                .block(block)
                .refs()
                .all(|inst| graph.catchers(inst) == catchers));
        }
    }
}
