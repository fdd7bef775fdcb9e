use super::*;

/// Metadata about the method whose body is being lifted
#[derive(Clone, Debug)]
pub struct MethodInfo {
    /// Class declaring the method
    pub owner: BinaryName,
    pub name: UnqualifiedName,
    pub descriptor: MethodDescriptor<BinaryName>,
    pub access_flags: MethodAccessFlags,

    /// Names from the `MethodParameters` attribute (one entry per descriptor parameter)
    pub parameter_names: Vec<Option<UnqualifiedName>>,
}

impl MethodInfo {
    pub fn is_static(&self) -> bool {
        self.access_flags.is_static()
    }
}

/// Entry of the exception table
///
/// The protected range is `[start, end)` and `catch_type` is `None` for `finally` blocks
#[derive(Clone, Debug)]
pub struct TryCatch {
    pub start: SynLabel,
    pub end: SynLabel,
    pub handler: SynLabel,
    pub catch_type: Option<BinaryName>,
}

/// Entry of the `LocalVariableTable` debug attribute
///
/// The variable is live on `[start, end)` in slot `index`
#[derive(Clone, Debug)]
pub struct LocalVariable {
    pub name: UnqualifiedName,
    pub descriptor: FieldType<BinaryName>,
    pub start: SynLabel,
    pub end: SynLabel,
    pub index: u16,
}

/// Everything the lifter needs to know about one method
#[derive(Clone, Debug)]
pub struct MethodBody {
    pub info: MethodInfo,
    pub nodes: Vec<Insn>,
    pub try_catch: Vec<TryCatch>,
    pub local_variables: Vec<LocalVariable>,
}

impl MethodBody {
    /// Index of the node where a label is placed
    pub fn label_position(&self, label: SynLabel) -> Option<usize> {
        self.nodes
            .iter()
            .position(|node| matches!(node, Insn::Label(placed) if *placed == label))
    }
}
