use super::*;
use std::fmt;

struct Joined<'a, T>(&'a [T]);

impl<'a, T: fmt::Display> fmt::Display for Joined<'a, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, item) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", item)?;
        }
        Ok(())
    }
}

impl fmt::Display for LocalVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl fmt::Display for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Bool(b) => write!(f, "{}", b),
            Constant::Byte(b) => write!(f, "{}", b),
            Constant::Char(c) => match char::from_u32(*c as u32) {
                Some(c) => write!(f, "{:?}", c),
                None => write!(f, "'\\u{:04x}'", c),
            },
            Constant::Short(s) => write!(f, "{}", s),
            Constant::Int(i) => write!(f, "{}", i),
            Constant::Long(l) => write!(f, "{}", l),
            Constant::Float(x) => write!(f, "{:?}", x),
            Constant::Double(x) => write!(f, "{:?}", x),
            Constant::Null => f.write_str("null"),
            Constant::String(s) => write!(f, "{:?}", s),
            Constant::Class(t) => write!(f, "{}.class", t),
            Constant::Method(m) => write!(
                f,
                "{}::{}({}):{}",
                m.owner,
                m.name,
                Joined(&m.argument_types),
                m.return_type
            ),
            Constant::MethodType {
                argument_types,
                return_type,
            } => write!(f, "({}):{}", Joined(argument_types), return_type),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::This(_) => f.write_str("this"),
            Value::Argument(arg) => arg.fmt(f),
            Value::Local(local) => local.fmt(f),
            Value::Constant(constant) => constant.fmt(f),
            Value::Field(field) => match &field.instance {
                Some(instance) => write!(f, "{}.{}", instance, field.name),
                None => write!(f, "{}.{}", field.owner, field.name),
            },
            Value::ArrayAccess(access) => write!(f, "{}[{}]", access.array, access.index),
        }
    }
}

impl fmt::Display for BinaryExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.lhv, self.op.symbol(), self.rhv)
    }
}

impl fmt::Display for BsmHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.owner, self.name)
    }
}

impl fmt::Display for BsmArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BsmArg::Constant(constant) => constant.fmt(f),
            BsmArg::Type(t) => write!(f, "{}.class", t),
            BsmArg::MethodType {
                argument_types,
                return_type,
            } => write!(f, "({}):{}", Joined(argument_types), return_type),
            BsmArg::Handle(handle) => handle.fmt(f),
        }
    }
}

impl fmt::Display for CallExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallExpr::Method(call) => match &call.instance {
                Some(instance) => write!(f, "{}.{}({})", instance, call.name, Joined(&call.args)),
                None => write!(f, "{}.{}({})", call.owner, call.name, Joined(&call.args)),
            },
            CallExpr::Dynamic(call) => write!(
                f,
                "invokedynamic {}[{}]({}) via {}",
                call.name,
                Joined(&call.bsm_args),
                Joined(&call.args),
                call.bsm
            ),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Binary(binary) => binary.fmt(f),
            Expr::Neg { operand, .. } => write!(f, "-{}", operand),
            Expr::Length { array } => write!(f, "{}.length", array),
            Expr::Cast { type_name, operand } => write!(f, "({}) {}", type_name, operand),
            Expr::InstanceOf { operand, target } => write!(f, "{} instanceof {}", operand, target),
            Expr::New(type_name) => write!(f, "new {}", type_name),
            Expr::NewArray {
                type_name,
                dimensions,
            } => {
                let total = type_name.as_str().matches("[]").count();
                let base = type_name.as_str().trim_end_matches("[]");
                write!(f, "new {}", base)?;
                for dimension in dimensions {
                    write!(f, "[{}]", dimension)?;
                }
                for _ in dimensions.len()..total {
                    f.write_str("[]")?;
                }
                Ok(())
            }
            Expr::Call(call) => call.fmt(f),
            Expr::Value(value) => value.fmt(f),
        }
    }
}

impl fmt::Display for Inst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Inst::Assign(assign) => write!(f, "{} = {}", assign.lhv, assign.rhv),
            Inst::EnterMonitor(monitor) => write!(f, "enter monitor {}", monitor),
            Inst::ExitMonitor(monitor) => write!(f, "exit monitor {}", monitor),
            Inst::Call(call) => call.fmt(f),
            Inst::Label(label) => write!(f, "label {}:", label),
            Inst::LineNumber { line, .. } => write!(f, "line number {}:", line),
            Inst::Return(None) => f.write_str("return"),
            Inst::Return(Some(value)) => write!(f, "return {}", value),
            Inst::Throw(throwable) => write!(f, "throw {}", throwable),
            Inst::Catch(catch) => write!(
                f,
                "catch ({}: {})",
                catch.throwable,
                catch.throwable.type_name()
            ),
            Inst::Goto(target) => write!(f, "goto {}", target),
            Inst::If(inst) => write!(
                f,
                "if ({}) goto {} else {}",
                inst.condition, inst.true_branch, inst.false_branch
            ),
            Inst::Switch(inst) => {
                write!(f, "switch ({}) {{ ", inst.key)?;
                for (value, label) in &inst.branches {
                    write!(f, "{} -> {} ", value, label)?;
                }
                write!(f, "else -> {} }}", inst.default)
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn local(index: usize, type_name: TypeName) -> Value {
        Value::from(LocalVar::generated(index, type_name))
    }

    #[test]
    fn render_expressions() {
        let add = Expr::Binary(BinaryExpr {
            op: BinaryOp::Add,
            type_name: TypeName::INT,
            lhv: local(0, TypeName::INT),
            rhv: Value::Constant(Constant::Int(1)),
        });
        assert_eq!(add.to_string(), "%0 + 1");

        let array = Expr::NewArray {
            type_name: TypeName::new("int[][][]"),
            dimensions: vec![local(1, TypeName::INT), local(2, TypeName::INT)],
        };
        assert_eq!(array.to_string(), "new int[%1][%2][]");

        let cast = Expr::Cast {
            type_name: TypeName::STRING,
            operand: local(3, TypeName::OBJECT),
        };
        assert_eq!(cast.to_string(), "(java.lang.String) %3");
        assert_eq!(Constant::Float(1.0).to_string(), "1.0");
        assert_eq!(Constant::String(String::from("hi")).to_string(), "\"hi\"");
    }

    #[test]
    fn render_instructions() {
        let branch = Inst::If(IfInst {
            condition: BinaryExpr {
                op: BinaryOp::Eq,
                type_name: TypeName::BOOLEAN,
                lhv: local(0, TypeName::INT),
                rhv: Value::Constant(Constant::Int(0)),
            },
            true_branch: LabelRef(1),
            false_branch: LabelRef(2),
        });
        assert_eq!(branch.to_string(), "if (%0 == 0) goto #1 else #2");
        assert_eq!(Inst::Label(LabelRef(4)).to_string(), "label #4:");
        assert_eq!(Inst::Return(None).to_string(), "return");

        let switch = Inst::Switch(SwitchInst {
            key: local(0, TypeName::INT),
            branches: vec![(Value::Constant(Constant::Int(1)), LabelRef(1))],
            default: LabelRef(2),
        });
        assert_eq!(switch.to_string(), "switch (%0) { 1 -> #1 else -> #2 }");
    }
}
