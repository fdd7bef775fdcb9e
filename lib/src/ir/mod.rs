//! Raw three-address intermediate representation
//!
//! Instructions are flat: every operand of an expression is a [`Value`], and the only
//! instructions that transfer control are gotos, conditional branches, switches, returns, and
//! throws. Jump targets are symbolic [`LabelRef`]s which are bound by [`Inst::Label`] markers in
//! the instruction list.

mod display;
mod expr;
mod inst;
mod types;
pub mod visit;

pub use expr::*;
pub use inst::*;
pub use types::*;
