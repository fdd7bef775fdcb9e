mod common;

use common::*;
use jvm2ir::cfg::{InstGraph, InstRef, SimpleHierarchy};
use jvm2ir::ir::visit::values_of;
use jvm2ir::ir::{CallExpr, Constant, Expr, Inst, TypeName, Value};

fn int(value: i32) -> Expr {
    Expr::Value(Value::from(Constant::Int(value)))
}

fn local_copy_source(expr: &Expr) -> Value {
    match expr {
        Expr::Value(value @ Value::Local(_)) => value.clone(),
        other => panic!("Expected a register copy, found {:?}", other),
    }
}

#[test]
fn if_else_merges_into_one_register() {
    let insts = lift_raw(SIGN);
    let merged = returned_value(&insts);
    assert!(matches!(merged, Value::Local(_)));

    // one copy into the merge register per branch, each right before the jump to the join
    let copies: Vec<usize> = insts
        .iter()
        .enumerate()
        .filter(|(_, inst)| matches!(inst, Inst::Assign(assign) if assign.lhv == merged))
        .map(|(index, _)| index)
        .collect();
    assert_eq!(copies.len(), 2);
    let join = match &insts[copies[0] + 1] {
        Inst::Goto(join) => *join,
        other => panic!("Expected a goto after the copy, found {}", other),
    };
    assert_eq!(insts[copies[1] + 1], Inst::Goto(join));

    let branch_registers: Vec<Value> = copies
        .iter()
        .map(|index| local_copy_source(&insts[*index].as_assign().unwrap().rhv))
        .collect();
    assert_ne!(branch_registers[0], branch_registers[1]);
    assert_eq!(assigned_to(&insts, &branch_registers[0]), vec![&int(1)]);
    assert_eq!(assigned_to(&insts, &branch_registers[1]), vec![&int(2)]);

    // nothing past the join refers to the registers of the branches
    let join_at = label_position(&insts, join);
    for inst in &insts[join_at..] {
        for value in values_of(inst) {
            assert!(!branch_registers.contains(value), "{} leaks past the join", value);
        }
    }
}

#[test]
fn if_else_merge_survives_simplification() {
    let insts = lift(SIGN);
    let merged = returned_value(&insts);
    assert!(matches!(merged, Value::Local(_)));
    assert_eq!(assigned_to(&insts, &merged), vec![&int(1), &int(2)]);
}

#[test]
fn loop_register_is_copied_at_back_edge() {
    let insts = lift_raw(HAND_OFF);
    let carried = returned_value(&insts);
    assert!(matches!(carried, Value::Local(_)));

    let (back_jump, head) = insts
        .iter()
        .enumerate()
        .find_map(|(index, inst)| match inst {
            Inst::Goto(target) if label_position(&insts, *target) < index => {
                Some((index, label_position(&insts, *target)))
            }
            _ => None,
        })
        .expect("loop has a back edge");

    // the header holds a merge register, initialized before entering the loop
    assert!(insts[..head]
        .iter()
        .filter_map(Inst::as_assign)
        .any(|assign| assign.lhv == carried));
    assert!(!assigned_to(&insts, &carried).contains(&&int(0)));

    // the body never assigns it, only the copy right before the back jump does
    let copy = insts[back_jump - 1].as_assign().expect("copy before back jump");
    assert_eq!(copy.lhv, carried);
    assert_ne!(local_copy_source(&copy.rhv), carried);
    let body_assignments = insts[head..back_jump]
        .iter()
        .filter_map(Inst::as_assign)
        .filter(|assign| assign.lhv == carried)
        .count();
    assert_eq!(body_assignments, 1);
}

#[test]
fn empty_rethrow_handler_keeps_its_body() {
    for insts in [lift(RETHROW), lift_raw(RETHROW)] {
        let catch_at = insts
            .iter()
            .position(|inst| matches!(inst, Inst::Catch(_)))
            .expect("handler");
        let catch = match &insts[catch_at] {
            Inst::Catch(catch) => catch.clone(),
            _ => unreachable!(),
        };
        assert_eq!(catch.entries.len(), 1);
        assert_eq!(
            catch.entries[0].accepted_throwable,
            TypeName::new("java.lang.IllegalStateException")
        );

        let thrown = match insts.last() {
            Some(Inst::Throw(thrown)) => thrown.clone(),
            other => panic!("Expected the handler to rethrow, found {:?}", other),
        };
        assert!(insts.len() > catch_at + 1);
        if insts.len() == catch_at + 2 {
            assert_eq!(thrown, catch.throwable);
        }

        let hierarchy = SimpleHierarchy::new();
        let graph = InstGraph::build(insts, &hierarchy).unwrap();
        let call = graph
            .instructions()
            .iter()
            .find(|(_, inst)| matches!(inst, Inst::Call(_)))
            .map(|(inst_ref, _)| inst_ref)
            .expect("call");
        let catch_ref = graph
            .instructions()
            .iter()
            .find(|(_, inst)| matches!(inst, Inst::Catch(_)))
            .map(|(inst_ref, _)| inst_ref)
            .expect("catch");
        assert_eq!(graph.catchers(call), &[catch_ref]);
        assert_eq!(graph.throwers(catch_ref), &[call]);

        let blocks = graph.block_graph();
        let handler = blocks.block_of(catch_ref);
        assert_eq!(blocks.block(handler).start, catch_ref);
        assert!(blocks.block(handler).len() >= 2);
        assert!(matches!(
            blocks.instructions(handler).last(),
            Some(Inst::Throw(_))
        ));
    }
}

/// Indices of the arguments passed to the only call of a method
fn call_arguments(listing: &str) -> Vec<usize> {
    let insts = lift(listing);
    let call = insts
        .iter()
        .find_map(|inst| match inst {
            Inst::Call(CallExpr::Method(call)) => Some(call.clone()),
            _ => None,
        })
        .expect("call");
    call.args
        .iter()
        .map(|arg| match arg {
            Value::Argument(argument) => argument.index,
            other => panic!("Expected an argument, found {}", other),
        })
        .collect()
}

#[test]
fn dup2_x2_forms() {
    // four category 1 values
    let form1 = r#"
method static com/acme/T.f(IIII)V
  iload 0
  iload 1
  iload 2
  iload 3
  dup2_x2
  invokestatic com/acme/T.sink(IIIIII)V
  return
end
"#;
    assert_eq!(call_arguments(form1), vec![2, 3, 0, 1, 2, 3]);

    // category 2 on top of two category 1 values
    let form2 = r#"
method static com/acme/T.f(IIJ)V
  iload 0
  iload 1
  lload 2
  dup2_x2
  invokestatic com/acme/T.sink(JIIJ)V
  return
end
"#;
    assert_eq!(call_arguments(form2), vec![2, 0, 1, 2]);

    // two category 1 values on top of a category 2 value
    let form3 = r#"
method static com/acme/T.f(JII)V
  lload 0
  iload 2
  iload 3
  dup2_x2
  invokestatic com/acme/T.sink(IIJII)V
  return
end
"#;
    assert_eq!(call_arguments(form3), vec![1, 2, 0, 1, 2]);

    // two category 2 values
    let form4 = r#"
method static com/acme/T.f(JJ)V
  lload 0
  lload 2
  dup2_x2
  invokestatic com/acme/T.sink(JJJ)V
  return
end
"#;
    assert_eq!(call_arguments(form4), vec![1, 0, 1]);
}

#[test]
fn switch_key_is_hoisted_before_merge_copy() {
    let insts = lift_raw(SPIN);
    let (switch_at, switch) = insts
        .iter()
        .enumerate()
        .find_map(|(index, inst)| match inst {
            Inst::Switch(switch) => Some((index, switch.clone())),
            _ => None,
        })
        .expect("switch");

    let copy = insts[switch_at - 1].as_assign().expect("merge copy");
    let save = insts[switch_at - 2].as_assign().expect("saved key");
    assert_ne!(copy.lhv, switch.key);
    assert!(matches!(copy.rhv, Expr::Value(Value::Local(_))));

    // the switch reads the loop register as it was before the copy
    assert_eq!(save.lhv, switch.key);
    assert_eq!(save.rhv, Expr::Value(copy.lhv.clone()));
    assert_eq!(assigned_to(&insts, &switch.key).len(), 1);

    assert_eq!(switch.branches.len(), 1);
    assert_eq!(switch.branches[0].0, Value::from(Constant::Int(0)));
    assert!(label_position(&insts, switch.branches[0].1) < switch_at);
    assert!(label_position(&insts, switch.default) > switch_at);
}

#[test]
fn guarded_division_is_caught() {
    let insts = lift(GUARDED);
    assert!(matches!(insts[0], Inst::Label(_)));
    assert!(matches!(insts[1], Inst::LineNumber { line: 3, .. }));

    let hierarchy = SimpleHierarchy::new();
    let graph = InstGraph::build(insts, &hierarchy).unwrap();
    let division = InstRef(0);
    assert!(matches!(graph.inst(division), Inst::Assign(_)));
    assert_eq!(graph.location(division).line_number, Some(3));
    assert_eq!(graph.catchers(division).len(), 1);
    assert!(graph.exception_exits(division).is_empty());
    assert!(!graph
        .throw_exits()
        .contains_key(&TypeName::ARITHMETIC_EXCEPTION));
}

#[test]
fn saved_call_result_survives_simplification() {
    for insts in [lift(TWICE), lift_raw(TWICE)] {
        let sum = insts
            .iter()
            .filter_map(Inst::as_assign)
            .find_map(|assign| match &assign.rhv {
                Expr::Binary(sum) => Some(sum.clone()),
                _ => None,
            })
            .expect("addition");

        // the saved first result and the second result are different values
        assert_ne!(sum.lhv, sum.rhv, "{:#?}", insts);
        let saved = assigned_to(&insts, &sum.lhv);
        assert_eq!(saved.len(), 1);
        assert_ne!(local_copy_source(saved[0]), sum.lhv);
    }
}

#[test]
fn narrow_stack_values_join_as_int() {
    let insts = lift_raw(PICK);
    let joined = returned_value(&insts);
    assert!(matches!(joined, Value::Local(_)));
    assert_eq!(joined.type_name(), TypeName::INT);

    let sources: Vec<TypeName> = assigned_to(&insts, &joined)
        .into_iter()
        .map(|expr| local_copy_source(expr).type_name())
        .collect();
    assert_eq!(sources, vec![TypeName::BYTE, TypeName::CHAR]);

    assert!(matches!(lift(PICK).last(), Some(Inst::Return(Some(_)))));
}

#[test]
fn narrow_locals_join_as_int() {
    for insts in [lift(NARROW), lift_raw(NARROW)] {
        let joined = returned_value(&insts);
        assert_eq!(joined.type_name(), TypeName::INT);
    }
}

/// Copies of one register into another
fn register_copies(insts: &[Inst]) -> usize {
    insts
        .iter()
        .filter_map(Inst::as_assign)
        .filter(|assign| matches!(assign.rhv, Expr::Value(Value::Local(_))))
        .count()
}

#[test]
fn chopped_local_is_not_merged() {
    let chopped = lift_raw(SCOPED);
    let kept = lift_raw(&SCOPED.replace("frame chop 1", "frame same"));

    // keeping the local in scope costs one copy on each of the two edges into `out`
    assert_eq!(register_copies(&chopped) + 2, register_copies(&kept));
    assert!(matches!(returned_value(&chopped), Value::Argument(_)));

    // the merge at `keep` is unaffected by the chop
    let merged = chopped
        .iter()
        .filter_map(Inst::as_assign)
        .filter(|assign| assign.lhv.type_name() == TypeName::OBJECT)
        .filter(|assign| matches!(assign.rhv, Expr::Value(Value::Local(_))))
        .count();
    assert!(merged >= 2);
}
