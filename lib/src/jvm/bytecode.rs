//! This module contains the AST of the JVM bytecode that gets lifted into the IR. The
//! representation is slightly different from the usual presentation to make it more convenient to
//! analyze. For instance:
//!
//!   - The "wide" instruction doesn't show up at all, but instead gets merged into the
//!     instructions it is allowed to modify
//!
//!   - Some instructions (like the branches) get abstracted into one instruction with a field.
//!     This helps with repetitive pattern matches.
//!
//!   - Operands that would be constant pool indices in a class file are stored resolved (names,
//!     descriptors, handles)
//!
//!   - Labels, line numbers, and stack map frames are nodes of the instruction stream, so that the
//!     stream can be walked with a single index
//!
//!   - `jsr`/`ret` are omitted. They are rejected by the verifier since class file version 51.

use super::*;
use std::fmt;
use std::ops::Not;

/// Opaque label
#[derive(Copy, Clone, Hash, Eq, PartialEq, PartialOrd, Ord)]
pub struct SynLabel(pub usize);

impl fmt::Debug for SynLabel {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_fmt(format_args!("l{}", self.0))
    }
}

/// One node of a method body instruction stream
#[derive(Clone, Debug)]
pub enum Insn {
    /// Jump target marker
    Label(SynLabel),

    /// Source line of the instructions following `start`
    LineNumber { line: u32, start: SynLabel },

    /// Verifier supplied stack map frame
    Frame(FrameNode),

    /// Instruction that always falls through to the next node
    Simple(Instruction),

    /// Instruction that may jump, return, or throw
    Branch(BranchInstruction<SynLabel>),
}

impl Insn {
    /// Does control never fall through to the next node after this one?
    pub fn is_terminate(&self) -> bool {
        matches!(self, Insn::Branch(branch) if branch.is_terminate())
    }

    /// Jumps, switches, and `athrow`
    pub fn is_branching(&self) -> bool {
        match self {
            Insn::Branch(branch) => {
                !branch.is_terminate() || matches!(branch, BranchInstruction::AThrow)
            }
            _ => false,
        }
    }
}

/// Non-branching JVM bytecode instruction
#[derive(Clone, Debug)]
pub enum Instruction {
    Nop,
    AConstNull,
    IConstM1,
    IConst0,
    IConst1,
    IConst2,
    IConst3,
    IConst4,
    IConst5,
    LConst0,
    LConst1,
    FConst0,
    FConst1,
    FConst2,
    DConst0,
    DConst1,
    BiPush(i8),
    SiPush(i16),
    Ldc(LdcConstant), // covers `ldc`, `ldc_w`, and `ldc2_w`
    ILoad(u16),       // covers `iload`, `iload{0,3}`, and `wide iload`
    LLoad(u16),
    FLoad(u16),
    DLoad(u16),
    ALoad(u16),
    IALoad,
    LALoad,
    FALoad,
    DALoad,
    AALoad,
    BALoad,
    CALoad,
    SALoad,
    IStore(u16), // covers `istore`, `istore{0,3}`, and `wide istore`
    LStore(u16),
    FStore(u16),
    DStore(u16),
    AStore(u16),
    IAStore,
    LAStore,
    FAStore,
    DAStore,
    AAStore,
    BAStore,
    CAStore,
    SAStore,
    Pop,
    Pop2,
    Dup,
    DupX1,
    DupX2,
    Dup2,
    Dup2X1,
    Dup2X2,
    Swap,
    IAdd,
    LAdd,
    FAdd,
    DAdd,
    ISub,
    LSub,
    FSub,
    DSub,
    IMul,
    LMul,
    FMul,
    DMul,
    IDiv,
    LDiv,
    FDiv,
    DDiv,
    IRem,
    LRem,
    FRem,
    DRem,
    INeg,
    LNeg,
    FNeg,
    DNeg,
    ISh(ShiftType), // covers `ishr`, `ishl`, and `iushr`
    LSh(ShiftType), // covers `lshr`, `lshl`, and `lushr`
    IAnd,
    LAnd,
    IOr,
    LOr,
    IXor,
    LXor,
    IInc(u16, i16), // covers `iinc` and `wide iinc`
    I2L,
    I2F,
    I2D,
    L2I,
    L2F,
    L2D,
    F2I,
    F2L,
    F2D,
    D2I,
    D2L,
    D2F,
    I2B,
    I2C,
    I2S,
    LCmp,
    FCmp(CompareMode), // covers `fcmpl` and `fcmpg`
    DCmp(CompareMode), // covers `dcmpl` and `dcmpg`
    GetStatic(FieldRef),
    PutStatic(FieldRef),
    GetField(FieldRef),
    PutField(FieldRef),
    Invoke(InvokeType, MethodRef),
    InvokeDynamic(IndyCall),
    New(BinaryName),
    NewArray(BaseType),
    ANewArray(RefType<BinaryName>),
    MultiANewArray(RefType<BinaryName>, u8),
    ArrayLength,
    CheckCast(RefType<BinaryName>),
    InstanceOf(RefType<BinaryName>),
    MonitorEnter,
    MonitorExit,
}

/// Branching JVM bytecode instruction
///
/// Conditional branches only carry their jump target: when the condition fails, control falls
/// through to the next node of the stream.
#[derive(Clone, Debug)]
pub enum BranchInstruction<Lbl> {
    If(OrdComparison, Lbl), // covers `ifeq`, `ifne`, `iflt`, `ifge`, `ifgt`, `ifle`
    IfICmp(OrdComparison, Lbl), // covers `if_icmpeq`, `if_icmpne`, `if_icmplt`, ... `if_icmple`
    IfACmp(EqComparison, Lbl), // covers `if_acmpeq`, `if_acmpne`
    IfNull(EqComparison, Lbl), // covers `ifnull`, `ifnonnull`
    Goto(Lbl),                 // covers `goto` and `goto_w`
    TableSwitch {
        /// Jump target if the argument is less than `low` or greater than
        /// `low + targets.len()`
        default: Lbl,

        /// Value associated with the first jump target
        low: i32,

        /// Jump targets
        targets: Vec<Lbl>,
    },
    LookupSwitch {
        /// Jump target if there is no corresponding key
        default: Lbl,

        /// Jump targets (sorted so that the keys are ascending)
        targets: Vec<(i32, Lbl)>,
    },
    IReturn,
    LReturn,
    FReturn,
    DReturn,
    AReturn,
    Return,
    AThrow,
}

impl<Lbl: Copy> BranchInstruction<Lbl> {
    /// Returns and `athrow`
    pub fn is_terminate(&self) -> bool {
        matches!(
            self,
            BranchInstruction::IReturn
                | BranchInstruction::LReturn
                | BranchInstruction::FReturn
                | BranchInstruction::DReturn
                | BranchInstruction::AReturn
                | BranchInstruction::Return
                | BranchInstruction::AThrow
        )
    }

    /// Can the instruction fall through to the next node?
    pub fn falls_through(&self) -> bool {
        matches!(
            self,
            BranchInstruction::If(..)
                | BranchInstruction::IfICmp(..)
                | BranchInstruction::IfACmp(..)
                | BranchInstruction::IfNull(..)
        )
    }

    /// Explicit jump targets (the default target of switches comes first)
    pub fn jump_targets(&self) -> Vec<Lbl> {
        match self {
            BranchInstruction::If(_, lbl)
            | BranchInstruction::IfICmp(_, lbl)
            | BranchInstruction::IfACmp(_, lbl)
            | BranchInstruction::IfNull(_, lbl)
            | BranchInstruction::Goto(lbl) => vec![*lbl],
            BranchInstruction::TableSwitch {
                default, targets, ..
            } => std::iter::once(*default)
                .chain(targets.iter().copied())
                .collect(),
            BranchInstruction::LookupSwitch { default, targets } => std::iter::once(*default)
                .chain(targets.iter().map(|(_, lbl)| *lbl))
                .collect(),
            _ => vec![],
        }
    }
}

/// Possible bit shifts
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum ShiftType {
    Left,
    LogicalRight,
    ArithmeticRight,
}

/// Comparison modes for floating point
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum CompareMode {
    /// -1 on NaN
    L,

    /// 1 on NaN
    G,
}

/// Binary comparison operators available for `int` branches
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum OrdComparison {
    EQ,
    GE,
    GT,
    LE,
    LT,
    NE,
}

impl Not for OrdComparison {
    type Output = Self;

    fn not(self) -> Self::Output {
        match self {
            OrdComparison::EQ => OrdComparison::NE,
            OrdComparison::GE => OrdComparison::LT,
            OrdComparison::GT => OrdComparison::LE,
            OrdComparison::LE => OrdComparison::GT,
            OrdComparison::LT => OrdComparison::GE,
            OrdComparison::NE => OrdComparison::EQ,
        }
    }
}

/// Equality/inequality comparison operators
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum EqComparison {
    EQ,
    NE,
}

impl Not for EqComparison {
    type Output = Self;

    fn not(self) -> Self::Output {
        match self {
            EqComparison::EQ => EqComparison::NE,
            EqComparison::NE => EqComparison::EQ,
        }
    }
}

/// Type of method to invoke
///
/// Note: `InvokeDynamic` is kept separate because it does not refer to a method.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum InvokeType {
    Virtual,
    Special,
    Static,
    Interface,
}

/// Field operand of `getfield`, `putfield`, `getstatic`, and `putstatic`
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FieldRef {
    pub owner: BinaryName,
    pub name: UnqualifiedName,
    pub descriptor: FieldType<BinaryName>,
}

/// Method operand of the `invoke*` instructions
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MethodRef {
    /// Arrays show up as owners of `clone` and the other `Object` methods
    pub owner: RefType<BinaryName>,
    pub name: UnqualifiedName,
    pub descriptor: MethodDescriptor<BinaryName>,
    pub is_interface: bool,
}

/// Kinds of method handles
///
/// See <https://docs.oracle.com/javase/specs/jvms/se16/html/jvms-4.html#jvms-4.4.8>
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum HandleKind {
    GetField,
    GetStatic,
    PutField,
    PutStatic,
    InvokeVirtual,
    InvokeStatic,
    InvokeSpecial,
    NewInvokeSpecial,
    InvokeInterface,
}

impl HandleKind {
    pub fn is_field(&self) -> bool {
        matches!(
            self,
            HandleKind::GetField
                | HandleKind::GetStatic
                | HandleKind::PutField
                | HandleKind::PutStatic
        )
    }
}

/// Member referenced by a method handle
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum HandleDescriptor {
    Field(FieldType<BinaryName>),
    Method(MethodDescriptor<BinaryName>),
}

/// Method handle constant
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Handle {
    pub kind: HandleKind,
    pub owner: BinaryName,
    pub name: UnqualifiedName,
    pub descriptor: HandleDescriptor,
    pub is_interface: bool,
}

/// Loadable constants (operands of `ldc` and bootstrap method arguments)
#[derive(Clone, Debug, PartialEq)]
pub enum LdcConstant {
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    String(String),
    Class(RefType<BinaryName>),
    MethodType(MethodDescriptor<BinaryName>),
    MethodHandle(Handle),
    Dynamic(Box<ConstantDynamic>),
}

/// Constant computed by a bootstrap method
#[derive(Clone, Debug, PartialEq)]
pub struct ConstantDynamic {
    pub name: UnqualifiedName,
    pub descriptor: FieldType<BinaryName>,
    pub bootstrap: Handle,
    pub bootstrap_args: Vec<LdcConstant>,
}

/// Operand of `invokedynamic`
#[derive(Clone, Debug, PartialEq)]
pub struct IndyCall {
    pub name: UnqualifiedName,
    pub descriptor: MethodDescriptor<BinaryName>,
    pub bootstrap: Handle,
    pub bootstrap_args: Vec<LdcConstant>,
}

/// Stack map frame kinds
///
/// See <https://docs.oracle.com/javase/specs/jvms/se16/html/jvms-4.html#jvms-4.7.4>
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum FrameKind {
    /// Uncompressed frame
    New,
    Full,
    Append,
    Chop,
    Same,
    Same1,
}

/// These types are from [this hierarchy][0]
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se7/html/jvms-4.html#jvms-4.10.1.2
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum VerificationType {
    Top,
    Integer,
    Float,
    Double,
    Long,
    Null,

    /// In the constructor, the `this` parameter starts with this type then turns into an object
    /// type after `<init>` is called
    UninitializedThis,

    /// Object type
    Object(RefType<BinaryName>),

    /// State of an object after `new` has been called but `<init>` has not been called. The
    /// label marks the `new` instruction.
    Uninitialized(SynLabel),
}

impl VerificationType {
    /// Is this type is a reference type?
    pub fn is_reference(&self) -> bool {
        match self {
            VerificationType::Top
            | VerificationType::Integer
            | VerificationType::Float
            | VerificationType::Double
            | VerificationType::Long => false,

            VerificationType::Null
            | VerificationType::UninitializedThis
            | VerificationType::Object(_)
            | VerificationType::Uninitialized(_) => true,
        }
    }
}

/// Stack map frame node
///
/// For `Full`/`New` frames, `locals` lists every local (`long` and `double` appear once) and
/// `stack` every stack entry. `Append` carries the added locals, `Chop` the number of removed
/// locals in `chopped`, and `Same1` its single stack entry.
#[derive(Clone, Debug)]
pub struct FrameNode {
    pub kind: FrameKind,
    pub locals: Vec<VerificationType>,
    pub stack: Vec<VerificationType>,
    pub chopped: usize,
}
