use super::*;
use std::fmt;

/// Symbolic jump target
#[derive(Copy, Clone, Hash, Eq, PartialEq, PartialOrd, Ord)]
pub struct LabelRef(pub usize);

impl fmt::Debug for LabelRef {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_fmt(format_args!("#{}", self.0))
    }
}

impl fmt::Display for LabelRef {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_fmt(format_args!("#{}", self.0))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AssignInst {
    pub lhv: Value,
    pub rhv: Expr,
}

/// One protected range handled by a catch instruction
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CatchEntry {
    pub accepted_throwable: TypeName,
    pub start_inclusive: LabelRef,
    pub end_exclusive: LabelRef,
}

/// Start of an exception handler: binds the caught exception to `throwable`
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CatchInst {
    pub throwable: Value,
    pub handler: LabelRef,
    pub entries: Vec<CatchEntry>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct IfInst {
    pub condition: BinaryExpr,
    pub true_branch: LabelRef,
    pub false_branch: LabelRef,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SwitchInst {
    pub key: Value,

    /// Case values, in the order of the original table
    pub branches: Vec<(Value, LabelRef)>,
    pub default: LabelRef,
}

/// Raw three-address instruction
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Inst {
    Assign(AssignInst),
    EnterMonitor(Value),
    ExitMonitor(Value),
    Call(CallExpr),
    Label(LabelRef),
    LineNumber { line: u32, start: LabelRef },
    Return(Option<Value>),
    Throw(Value),
    Catch(CatchInst),
    Goto(LabelRef),
    If(IfInst),
    Switch(SwitchInst),
}

impl Inst {
    pub fn assign(lhv: impl Into<Value>, rhv: impl Into<Expr>) -> Inst {
        Inst::Assign(AssignInst {
            lhv: lhv.into(),
            rhv: rhv.into(),
        })
    }

    /// Jumps, conditional branches, and switches
    pub fn is_branching(&self) -> bool {
        matches!(self, Inst::Goto(_) | Inst::If(_) | Inst::Switch(_))
    }

    /// Returns and throws
    pub fn is_terminating(&self) -> bool {
        matches!(self, Inst::Return(_) | Inst::Throw(_))
    }

    /// Labels and line numbers, which do not execute
    pub fn is_marker(&self) -> bool {
        matches!(self, Inst::Label(_) | Inst::LineNumber { .. })
    }

    pub fn as_assign(&self) -> Option<&AssignInst> {
        match self {
            Inst::Assign(assign) => Some(assign),
            _ => None,
        }
    }

    pub fn as_label(&self) -> Option<LabelRef> {
        match self {
            Inst::Label(label) => Some(*label),
            _ => None,
        }
    }

    /// Labels this instruction may jump to
    pub fn successors(&self) -> Vec<LabelRef> {
        match self {
            Inst::Goto(target) => vec![*target],
            Inst::If(inst) => vec![inst.true_branch, inst.false_branch],
            Inst::Switch(inst) => inst
                .branches
                .iter()
                .map(|(_, label)| *label)
                .chain(std::iter::once(inst.default))
                .collect(),
            _ => vec![],
        }
    }

    /// Top-level operands of the instruction
    pub fn operands(&self) -> Vec<Operand<'_>> {
        match self {
            Inst::Assign(assign) => vec![Operand::Value(&assign.lhv), Operand::Expr(&assign.rhv)],
            Inst::EnterMonitor(monitor) | Inst::ExitMonitor(monitor) => {
                vec![Operand::Value(monitor)]
            }
            Inst::Call(call) => call.operands().into_iter().map(Operand::Value).collect(),
            Inst::Label(_) | Inst::LineNumber { .. } | Inst::Goto(_) => vec![],
            Inst::Return(value) => value.iter().map(Operand::Value).collect(),
            Inst::Throw(throwable) => vec![Operand::Value(throwable)],
            Inst::Catch(catch) => vec![Operand::Value(&catch.throwable)],
            Inst::If(inst) => vec![Operand::Value(&inst.condition.lhv), Operand::Value(&inst.condition.rhv)],
            Inst::Switch(inst) => std::iter::once(&inst.key)
                .chain(inst.branches.iter().map(|(value, _)| value))
                .map(Operand::Value)
                .collect(),
        }
    }
}

/// Operand of an instruction
#[derive(Copy, Clone, Debug)]
pub enum Operand<'a> {
    Value(&'a Value),
    Expr(&'a Expr),
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn instruction_kinds() {
        let goto = Inst::Goto(LabelRef(1));
        let ret = Inst::Return(None);
        let throw = Inst::Throw(Value::Constant(Constant::Null));
        let label = Inst::Label(LabelRef(0));

        assert!(goto.is_branching() && !goto.is_terminating());
        assert!(ret.is_terminating() && !ret.is_branching());
        assert!(throw.is_terminating() && !throw.is_branching());
        assert!(label.is_marker());
        assert_eq!(goto.successors(), vec![LabelRef(1)]);
    }

    #[test]
    fn switch_successors() {
        let switch = Inst::Switch(SwitchInst {
            key: Value::Constant(Constant::Int(0)),
            branches: vec![
                (Value::Constant(Constant::Int(1)), LabelRef(3)),
                (Value::Constant(Constant::Int(2)), LabelRef(4)),
            ],
            default: LabelRef(5),
        });
        assert_eq!(
            switch.successors(),
            vec![LabelRef(3), LabelRef(4), LabelRef(5)]
        );
        assert_eq!(switch.operands().len(), 3);
    }
}
