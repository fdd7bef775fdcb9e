//! JVM method bodies, as they come out of a class file reader
//!
//! A [`MethodBody`] is an instruction stream (with labels, line numbers, and stack map frames
//! inlined as nodes), an exception table, a local variable debug table, and some metadata about
//! the method. Class names and descriptors follow the formats of the
//! [JVM specification](https://docs.oracle.com/javase/specs/jvms/se16/html/jvms-4.html#jvms-4.3).

mod access_flags;
mod bytecode;
mod descriptors;
mod method;
mod names;
pub mod text;

pub use access_flags::*;
pub use bytecode::*;
pub use descriptors::*;
pub use method::*;
pub use names::*;
