use super::ClassHierarchy;
use crate::ir::{BinaryOp, CallExpr, Expr, Inst, TypeName, Value};
use log::debug;

/// Computes the exception types each instruction may raise
///
/// The answer is conservative: any call may raise `RuntimeException` or `Error` on top of its
/// declared exceptions, and a call whose target cannot be found may raise any `Throwable`.
pub struct ExceptionResolver<'h> {
    hierarchy: &'h dyn ClassHierarchy,
}

impl<'h> ExceptionResolver<'h> {
    pub fn new(hierarchy: &'h dyn ClassHierarchy) -> ExceptionResolver<'h> {
        ExceptionResolver { hierarchy }
    }

    /// Exception types the instruction may raise, without duplicates
    pub fn exceptions(&self, inst: &Inst) -> Vec<TypeName> {
        let mut raised = match inst {
            Inst::Assign(assign) => {
                let mut raised = value_exceptions(&assign.lhv);
                raised.extend(self.expr_exceptions(&assign.rhv));
                raised
            }
            Inst::ExitMonitor(_) => vec![TypeName::NULL_POINTER_EXCEPTION],
            Inst::Call(call) => self.call_exceptions(call),
            Inst::Throw(throwable) => vec![
                throwable.type_name(),
                TypeName::NULL_POINTER_EXCEPTION,
            ],
            Inst::EnterMonitor(_)
            | Inst::Label(_)
            | Inst::LineNumber { .. }
            | Inst::Return(_)
            | Inst::Catch(_)
            | Inst::Goto(_)
            | Inst::If(_)
            | Inst::Switch(_) => vec![],
        };
        dedup_in_order(&mut raised);
        raised
    }

    fn expr_exceptions(&self, expr: &Expr) -> Vec<TypeName> {
        match expr {
            Expr::Binary(binary) if matches!(binary.op, BinaryOp::Div | BinaryOp::Rem) => {
                vec![TypeName::ARITHMETIC_EXCEPTION]
            }
            Expr::Length { .. } => vec![TypeName::NULL_POINTER_EXCEPTION],
            Expr::Cast { type_name, .. } if !type_name.is_primitive() => {
                vec![TypeName::CLASS_CAST_EXCEPTION]
            }
            Expr::New(_) => vec![TypeName::ERROR],
            Expr::NewArray { .. } => vec![TypeName::NEGATIVE_ARRAY_SIZE_EXCEPTION],
            Expr::Call(call) => self.call_exceptions(call),
            Expr::Value(value) => value_exceptions(value),
            Expr::Binary(_)
            | Expr::Neg { .. }
            | Expr::Cast { .. }
            | Expr::InstanceOf { .. } => vec![],
        }
    }

    fn call_exceptions(&self, call: &CallExpr) -> Vec<TypeName> {
        match call {
            CallExpr::Dynamic(call) if call.is_lambda() => {
                vec![TypeName::RUNTIME_EXCEPTION, TypeName::ERROR]
            }
            CallExpr::Dynamic(_) => vec![TypeName::THROWABLE],
            CallExpr::Method(call) => {
                let declared = self.hierarchy.method_exceptions(
                    &call.owner,
                    &call.name,
                    &call.argument_types,
                );
                match declared {
                    Ok(declared) => {
                        let mut raised = vec![TypeName::RUNTIME_EXCEPTION, TypeName::ERROR];
                        raised.extend(declared);
                        raised
                    }
                    Err(err) if err.is_not_found() => {
                        debug!("{}, assuming any throwable", err);
                        vec![TypeName::THROWABLE]
                    }
                    Err(err) => {
                        debug!("Failed to resolve exceptions ({}), assuming any throwable", err);
                        vec![TypeName::THROWABLE]
                    }
                }
            }
        }
    }
}

fn value_exceptions(value: &Value) -> Vec<TypeName> {
    match value {
        Value::Field(_) => vec![TypeName::NULL_POINTER_EXCEPTION],
        Value::ArrayAccess(_) => vec![
            TypeName::NULL_POINTER_EXCEPTION,
            TypeName::INDEX_OUT_OF_BOUNDS_EXCEPTION,
        ],
        _ => vec![],
    }
}

fn dedup_in_order(types: &mut Vec<TypeName>) {
    let mut seen = std::collections::HashSet::new();
    types.retain(|type_name| seen.insert(type_name.clone()));
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::cfg::SimpleHierarchy;
    use crate::ir::{
        ArrayAccess, BinaryExpr, CallKind, Constant, FieldRef, LocalVar, MethodCall,
    };

    fn local(index: usize, type_name: TypeName) -> Value {
        Value::from(LocalVar::generated(index, type_name))
    }

    fn call(owner: &str, name: &str) -> CallExpr {
        CallExpr::Method(MethodCall {
            kind: CallKind::Static,
            owner: TypeName::new(owner),
            name: String::from(name),
            argument_types: vec![],
            return_type: TypeName::VOID,
            instance: None,
            args: vec![],
            is_interface: false,
        })
    }

    #[test]
    fn arithmetic_and_arrays() {
        let hierarchy = SimpleHierarchy::new();
        let resolver = ExceptionResolver::new(&hierarchy);

        let division = Inst::assign(
            local(0, TypeName::INT),
            BinaryExpr {
                op: BinaryOp::Div,
                type_name: TypeName::INT,
                lhv: local(1, TypeName::INT),
                rhv: Value::from(Constant::Int(2)),
            },
        );
        assert_eq!(
            resolver.exceptions(&division),
            vec![TypeName::ARITHMETIC_EXCEPTION]
        );

        let store = Inst::assign(
            Value::ArrayAccess(Box::new(ArrayAccess {
                array: local(1, TypeName::new("int[]")),
                index: Value::from(Constant::Int(0)),
                type_name: TypeName::INT,
            })),
            Expr::Length {
                array: local(2, TypeName::new("int[]")),
            },
        );
        assert_eq!(
            resolver.exceptions(&store),
            vec![
                TypeName::NULL_POINTER_EXCEPTION,
                TypeName::INDEX_OUT_OF_BOUNDS_EXCEPTION
            ]
        );

        let primitive_cast = Inst::assign(
            local(0, TypeName::LONG),
            Expr::Cast {
                type_name: TypeName::LONG,
                operand: local(1, TypeName::INT),
            },
        );
        assert!(resolver.exceptions(&primitive_cast).is_empty());
    }

    #[test]
    fn fields_and_throws() {
        let hierarchy = SimpleHierarchy::new();
        let resolver = ExceptionResolver::new(&hierarchy);

        let read = Inst::assign(
            local(0, TypeName::INT),
            Value::Field(Box::new(FieldRef {
                instance: Some(Value::This(TypeName::new("com.acme.Counter"))),
                owner: TypeName::new("com.acme.Counter"),
                name: String::from("count"),
                type_name: TypeName::INT,
            })),
        );
        assert_eq!(
            resolver.exceptions(&read),
            vec![TypeName::NULL_POINTER_EXCEPTION]
        );

        let rethrow = Inst::Throw(local(3, TypeName::NULL_POINTER_EXCEPTION));
        assert_eq!(
            resolver.exceptions(&rethrow),
            vec![TypeName::NULL_POINTER_EXCEPTION]
        );
        assert!(resolver.exceptions(&Inst::Return(None)).is_empty());
    }

    #[test]
    fn calls_use_declared_exceptions() {
        let mut hierarchy = SimpleHierarchy::new();
        let io = TypeName::new("java.io.IOException");
        hierarchy.add_method(TypeName::new("com.acme.Files"), "sync", vec![], vec![io.clone()]);
        let resolver = ExceptionResolver::new(&hierarchy);

        assert_eq!(
            resolver.exceptions(&Inst::Call(call("com.acme.Files", "sync"))),
            vec![TypeName::RUNTIME_EXCEPTION, TypeName::ERROR, io]
        );
        assert_eq!(
            resolver.exceptions(&Inst::Call(call("com.acme.Files", "missing"))),
            vec![TypeName::THROWABLE]
        );
    }
}
