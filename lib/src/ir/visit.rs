//! Traversals over the raw IR
//!
//! [`Visitor`] walks instructions read-only, [`Mapper`] rebuilds them. Both come with default
//! methods that recurse into every operand, so an implementation only overrides the cases it
//! cares about and lets everything else fall through to the `walk_*` functions.

use super::*;
use std::collections::HashMap;

pub trait Visitor<'a> {
    fn visit_inst(&mut self, inst: &'a Inst) {
        walk_inst(self, inst)
    }

    fn visit_expr(&mut self, expr: &'a Expr) {
        walk_expr(self, expr)
    }

    fn visit_value(&mut self, value: &'a Value) {
        walk_value(self, value)
    }
}

pub fn walk_inst<'a, V: Visitor<'a> + ?Sized>(visitor: &mut V, inst: &'a Inst) {
    for operand in inst.operands() {
        match operand {
            Operand::Value(value) => visitor.visit_value(value),
            Operand::Expr(expr) => visitor.visit_expr(expr),
        }
    }
}

pub fn walk_expr<'a, V: Visitor<'a> + ?Sized>(visitor: &mut V, expr: &'a Expr) {
    match expr {
        Expr::Value(value) => visitor.visit_value(value),
        other => {
            for operand in other.operands() {
                visitor.visit_value(operand);
            }
        }
    }
}

pub fn walk_value<'a, V: Visitor<'a> + ?Sized>(visitor: &mut V, value: &'a Value) {
    for operand in value.operands() {
        visitor.visit_value(operand);
    }
}

/// Every value occurring in an instruction, outermost first
pub fn values_of(inst: &Inst) -> Vec<&Value> {
    struct Collector<'a>(Vec<&'a Value>);

    impl<'a> Visitor<'a> for Collector<'a> {
        fn visit_value(&mut self, value: &'a Value) {
            self.0.push(value);
            walk_value(self, value);
        }
    }

    let mut collector = Collector(vec![]);
    collector.visit_inst(inst);
    collector.0
}

/// Every value occurring in an expression (including the expression itself if it is a value)
pub fn values_of_expr(expr: &Expr) -> Vec<&Value> {
    struct Collector<'a>(Vec<&'a Value>);

    impl<'a> Visitor<'a> for Collector<'a> {
        fn visit_value(&mut self, value: &'a Value) {
            self.0.push(value);
            walk_value(self, value);
        }
    }

    let mut collector = Collector(vec![]);
    collector.visit_expr(expr);
    collector.0
}

pub trait Mapper {
    fn map_inst(&mut self, inst: &Inst) -> Inst {
        walk_map_inst(self, inst)
    }

    fn map_expr(&mut self, expr: &Expr) -> Expr {
        walk_map_expr(self, expr)
    }

    fn map_value(&mut self, value: &Value) -> Value {
        walk_map_value(self, value)
    }
}

pub fn walk_map_inst<M: Mapper + ?Sized>(mapper: &mut M, inst: &Inst) -> Inst {
    match inst {
        Inst::Assign(assign) => Inst::Assign(AssignInst {
            lhv: mapper.map_value(&assign.lhv),
            rhv: mapper.map_expr(&assign.rhv),
        }),
        Inst::EnterMonitor(monitor) => Inst::EnterMonitor(mapper.map_value(monitor)),
        Inst::ExitMonitor(monitor) => Inst::ExitMonitor(mapper.map_value(monitor)),
        Inst::Call(call) => Inst::Call(map_call(mapper, call)),
        Inst::Label(_) | Inst::LineNumber { .. } | Inst::Goto(_) => inst.clone(),
        Inst::Return(value) => Inst::Return(value.as_ref().map(|value| mapper.map_value(value))),
        Inst::Throw(throwable) => Inst::Throw(mapper.map_value(throwable)),
        Inst::Catch(catch) => Inst::Catch(CatchInst {
            throwable: mapper.map_value(&catch.throwable),
            handler: catch.handler,
            entries: catch.entries.clone(),
        }),
        Inst::If(inst) => Inst::If(IfInst {
            condition: map_binary(mapper, &inst.condition),
            true_branch: inst.true_branch,
            false_branch: inst.false_branch,
        }),
        Inst::Switch(inst) => Inst::Switch(SwitchInst {
            key: mapper.map_value(&inst.key),
            branches: inst
                .branches
                .iter()
                .map(|(value, label)| (mapper.map_value(value), *label))
                .collect(),
            default: inst.default,
        }),
    }
}

/// Rebuild a binary expression, keeping its own type
fn map_binary<M: Mapper + ?Sized>(mapper: &mut M, binary: &BinaryExpr) -> BinaryExpr {
    BinaryExpr {
        op: binary.op,
        type_name: binary.type_name.clone(),
        lhv: mapper.map_value(&binary.lhv),
        rhv: mapper.map_value(&binary.rhv),
    }
}

fn map_values<M: Mapper + ?Sized>(mapper: &mut M, values: &[Value]) -> Vec<Value> {
    values.iter().map(|value| mapper.map_value(value)).collect()
}

fn map_call<M: Mapper + ?Sized>(mapper: &mut M, call: &CallExpr) -> CallExpr {
    match call {
        CallExpr::Method(call) => CallExpr::Method(MethodCall {
            instance: call.instance.as_ref().map(|value| mapper.map_value(value)),
            args: map_values(mapper, &call.args),
            ..call.clone()
        }),
        CallExpr::Dynamic(call) => CallExpr::Dynamic(DynamicCall {
            args: map_values(mapper, &call.args),
            ..call.clone()
        }),
    }
}

pub fn walk_map_expr<M: Mapper + ?Sized>(mapper: &mut M, expr: &Expr) -> Expr {
    match expr {
        Expr::Binary(binary) => Expr::Binary(map_binary(mapper, binary)),
        Expr::Neg { type_name, operand } => Expr::Neg {
            type_name: type_name.clone(),
            operand: mapper.map_value(operand),
        },
        Expr::Length { array } => Expr::Length {
            array: mapper.map_value(array),
        },
        Expr::Cast { type_name, operand } => Expr::Cast {
            type_name: type_name.clone(),
            operand: mapper.map_value(operand),
        },
        Expr::InstanceOf { operand, target } => Expr::InstanceOf {
            operand: mapper.map_value(operand),
            target: target.clone(),
        },
        Expr::New(type_name) => Expr::New(type_name.clone()),
        Expr::NewArray {
            type_name,
            dimensions,
        } => Expr::NewArray {
            type_name: type_name.clone(),
            dimensions: map_values(mapper, dimensions),
        },
        Expr::Call(call) => Expr::Call(map_call(mapper, call)),
        Expr::Value(value) => Expr::Value(mapper.map_value(value)),
    }
}

pub fn walk_map_value<M: Mapper + ?Sized>(mapper: &mut M, value: &Value) -> Value {
    match value {
        Value::Field(field) => Value::Field(Box::new(FieldRef {
            instance: field.instance.as_ref().map(|value| mapper.map_value(value)),
            ..(**field).clone()
        })),
        Value::ArrayAccess(access) => Value::ArrayAccess(Box::new(ArrayAccess {
            array: mapper.map_value(&access.array),
            index: mapper.map_value(&access.index),
            type_name: access.type_name.clone(),
        })),
        _ => value.clone(),
    }
}

/// Substitutes values
///
/// A value found in the mapping is replaced wholesale (the replacement is not mapped again);
/// otherwise the mapper recurses into its operands.
#[derive(Debug, Default)]
pub struct ExprMapper {
    mapping: HashMap<Value, Value>,
}

impl ExprMapper {
    pub fn new(mapping: HashMap<Value, Value>) -> ExprMapper {
        ExprMapper { mapping }
    }

    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }

    pub fn map_all(&mut self, insts: &[Inst]) -> Vec<Inst> {
        insts.iter().map(|inst| self.map_inst(inst)).collect()
    }
}

impl Mapper for ExprMapper {
    fn map_value(&mut self, value: &Value) -> Value {
        match self.mapping.get(value) {
            Some(replacement) => replacement.clone(),
            None => walk_map_value(self, value),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn reg(index: usize) -> Value {
        Value::from(LocalVar::generated(index, TypeName::INT))
    }

    #[test]
    fn collects_nested_values() {
        let array = Value::from(LocalVar::generated(0, TypeName::new("int[]")));
        let inst = Inst::assign(
            Value::ArrayAccess(Box::new(ArrayAccess {
                array: array.clone(),
                index: reg(1),
                type_name: TypeName::INT,
            })),
            Expr::Binary(BinaryExpr {
                op: BinaryOp::Add,
                type_name: TypeName::INT,
                lhv: reg(2),
                rhv: Value::Constant(Constant::Int(1)),
            }),
        );
        let values = values_of(&inst);
        assert_eq!(values.len(), 5);
        assert!(values.contains(&&array));
        assert!(values.contains(&&reg(2)));
    }

    #[test]
    fn mapper_replaces_everywhere() {
        let mut mapping = HashMap::new();
        mapping.insert(reg(1), reg(7));
        let mut mapper = ExprMapper::new(mapping);

        let inst = Inst::If(IfInst {
            condition: BinaryExpr {
                op: BinaryOp::Lt,
                type_name: TypeName::BOOLEAN,
                lhv: reg(1),
                rhv: reg(2),
            },
            true_branch: LabelRef(0),
            false_branch: LabelRef(1),
        });
        match mapper.map_inst(&inst) {
            Inst::If(mapped) => {
                assert_eq!(mapped.condition.lhv, reg(7));
                assert_eq!(mapped.condition.rhv, reg(2));
                assert_eq!(mapped.condition.type_name, TypeName::BOOLEAN);
            }
            other => panic!("Expected if, got {:?}", other),
        }
    }

    #[test]
    fn mapper_does_not_remap_replacements() {
        let mut mapping = HashMap::new();
        mapping.insert(reg(1), reg(2));
        mapping.insert(reg(2), reg(3));
        let mut mapper = ExprMapper::new(mapping);
        let mapped = mapper.map_inst(&Inst::assign(reg(2), reg(1)));
        assert_eq!(mapped, Inst::assign(reg(3), reg(2)));
    }
}
