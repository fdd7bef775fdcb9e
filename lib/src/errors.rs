use thiserror::Error;

/// Result type for IR construction and analysis
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// A branch or table entry refers to a label that is never placed (or only placed on
    /// unreachable code)
    #[error("Unresolvable label {0}")]
    UnresolvedLabel(String),

    #[error("No single predecessor for node {0}")]
    NoSinglePredecessor(usize),

    /// A node was simulated before one of its forward predecessors (indicates a bug)
    #[error("Incorrect frame processing order at node {0}")]
    FrameOutOfOrder(usize),

    #[error("Pop from empty stack at node {0}")]
    EmptyStack(usize),

    #[error("Local variable {slot} is undefined at node {node}")]
    MissingLocal { node: usize, slot: usize },

    #[error("Bad descriptor '{descriptor}': {source}")]
    BadDescriptor {
        descriptor: String,
        source: std::io::Error,
    },

    #[error("Parse error on line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Instruction {0} is not valid here")]
    InvalidInstruction(String),

    #[error("Incorrect stack types at node {node}: {types}")]
    IncompatibleStackTypes { node: usize, types: String },

    #[error("Cannot determine type of null-typed local {slot} at node {node}")]
    UntypedNull { node: usize, slot: usize },

    #[error("Class not found: {0}")]
    ClassNotFound(String),

    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Broad classes of failure, which callers use to decide between skipping one method and giving
/// up altogether
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum ErrorCategory {
    /// The input is not well-formed bytecode
    Malformed,

    /// Frames disagree in a way the verifier would have rejected
    TypeInconsistency,

    /// A lookup into the class hierarchy failed
    NotFound,

    Io,
}

impl Error {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::UnresolvedLabel(_)
            | Error::NoSinglePredecessor(_)
            | Error::FrameOutOfOrder(_)
            | Error::EmptyStack(_)
            | Error::MissingLocal { .. }
            | Error::BadDescriptor { .. }
            | Error::Parse { .. }
            | Error::InvalidInstruction(_) => ErrorCategory::Malformed,
            Error::IncompatibleStackTypes { .. } | Error::UntypedNull { .. } => {
                ErrorCategory::TypeInconsistency
            }
            Error::ClassNotFound(_) | Error::MethodNotFound(_) => ErrorCategory::NotFound,
            Error::Io(_) => ErrorCategory::Io,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.category() == ErrorCategory::NotFound
    }

    pub fn bad_descriptor(descriptor: impl Into<String>, source: std::io::Error) -> Error {
        Error::BadDescriptor {
            descriptor: descriptor.into(),
            source,
        }
    }
}
