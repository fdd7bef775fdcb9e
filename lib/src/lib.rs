//! Lift JVM method bodies into a raw three-address IR, then build control flow graphs over it
//!
//! The pipeline has three stages:
//!
//!   - [`jvm`] describes the input: instruction streams with inlined labels, line numbers, and
//!     stack map frames (as produced by a class file reader, or parsed from a text listing)
//!   - [`builder`] simulates the operand stack and locals of a method, producing a flat list of
//!     [`ir::Inst`] with symbolic registers, which [`simplify`] then cleans up
//!   - [`cfg`] turns the flat list into instruction and basic block graphs, including
//!     exceptional edges

mod errors;
mod util;

pub mod builder;
pub mod cfg;
pub mod ir;
pub mod jvm;
pub mod simplify;

pub use errors::*;
