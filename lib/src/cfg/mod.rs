//! Control-flow graphs over finished raw instruction lists
//!
//! An [`InstList`] strips labels and line numbers out of the raw list and resolves every jump to
//! an instruction index. [`InstGraph`] adds normal and exceptional edges on top of that, and
//! [`BlockGraph`] groups the instructions into basic blocks. Exception edges need to know which
//! exceptions each instruction can raise, and whether a handler accepts them, which is what
//! [`ClassHierarchy`] answers.

mod block;
mod dominators;
mod dot;
mod exceptions;
mod graph;
mod hierarchy;
mod inst_list;
mod loops;

pub use block::*;
pub use dominators::*;
pub use exceptions::*;
pub use graph::InstGraph;
pub use hierarchy::*;
pub use inst_list::*;
pub use loops::*;
