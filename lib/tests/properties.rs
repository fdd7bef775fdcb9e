mod common;

use common::*;
use jvm2ir::builder::{self, RawInstListBuilder, Settings};
use jvm2ir::cfg::{InstGraph, InstList, SimpleHierarchy};
use jvm2ir::ir::{Argument, Inst, TypeName, Value};
use jvm2ir::jvm::text;
use jvm2ir::simplify::Simplifier;
use jvm2ir::{Error, ErrorCategory};

fn both_ways(listing: &str) -> [Vec<Inst>; 2] {
    [lift(listing), lift_raw(listing)]
}

#[test]
fn labels_are_placed_exactly_once() {
    for listing in FIXTURES {
        for insts in both_ways(listing) {
            for inst in &insts {
                for label in referenced_labels(inst) {
                    let placed = insts
                        .iter()
                        .filter(|other| **other == Inst::Label(label))
                        .count();
                    assert_eq!(placed, 1, "{} in {:#?}", label, insts);
                }
            }
        }
    }
}

#[test]
fn branch_targets_resolve() {
    for listing in FIXTURES {
        for insts in both_ways(listing) {
            let list = InstList::new(insts).unwrap();
            for inst_ref in list.refs() {
                let inst = list.inst(inst_ref);
                assert!(!inst.is_marker());
                for label in inst.successors() {
                    let target = list.label_target(label).unwrap();
                    assert!(target.0 < list.len());
                    assert!(list.jump_targets(inst_ref).contains(&target));
                }
            }
        }
    }
}

#[test]
fn blocks_share_one_catcher_set() {
    let hierarchy = SimpleHierarchy::new();
    for listing in FIXTURES {
        for insts in both_ways(listing) {
            let graph = InstGraph::build(insts, &hierarchy).unwrap();
            let blocks = graph.block_graph();
            for block in blocks.refs() {
                let mut members = blocks.block(block).refs();
                let first = members.next().expect("blocks are never empty");
                for member in members {
                    assert_eq!(
                        graph.catchers(member),
                        graph.catchers(first),
                        "{} in {}",
                        member,
                        block
                    );
                }
            }
        }
    }
}

#[test]
fn simplifier_is_idempotent() {
    for listing in FIXTURES {
        let once = lift(listing);
        let mut simplifier = Simplifier::new();
        let twice = simplifier.simplify(once.clone());
        assert_eq!(once, twice);
        assert_eq!(simplifier.rounds(), 1);
    }
}

#[test]
fn construction_is_deterministic() {
    for listing in FIXTURES {
        assert_eq!(lift(listing), lift(listing));
        assert_eq!(lift_raw(listing), lift_raw(listing));

        let body = text::parse_method(listing).unwrap();
        let first = RawInstListBuilder::new(&body, Settings::new()).unwrap().build().unwrap();
        let second = builder::build(&body, Settings::new()).unwrap();
        assert_eq!(first, second);
    }
}

#[test]
fn dead_code_leaves_no_labels_behind() {
    let insts = lift(EARLY);
    let argument = Value::Argument(Argument::new(0, None, TypeName::INT));
    assert_eq!(insts, vec![Inst::Return(Some(argument))]);
}

#[test]
fn dead_range_end_gets_a_label() {
    for insts in both_ways(GUARDED) {
        let catch = insts
            .iter()
            .find_map(|inst| match inst {
                Inst::Catch(catch) => Some(catch.clone()),
                _ => None,
            })
            .expect("handler");
        let entry = &catch.entries[0];
        assert_eq!(entry.accepted_throwable, TypeName::ARITHMETIC_EXCEPTION);

        let start = label_position(&insts, entry.start_inclusive);
        let end = label_position(&insts, entry.end_exclusive);
        let handler = label_position(&insts, catch.handler);
        assert!(start < end);
        assert!(end < handler);
        assert!(insts[start..end]
            .iter()
            .any(|inst| matches!(inst, Inst::Return(_))));
    }
}

#[test]
fn names_come_from_the_debug_table() {
    let insts = lift(NESTED);
    let named: Vec<&str> = insts
        .iter()
        .filter_map(Inst::as_assign)
        .filter_map(|assign| match &assign.lhv {
            Value::Local(local) if local.is_named() => Some(local.name.as_str()),
            _ => None,
        })
        .collect();
    assert!(named.contains(&"total"));
    assert!(named.contains(&"i"));

    let unnamed = lift_with(
        NESTED,
        Settings {
            keep_local_variable_names: false,
            ..Settings::new()
        },
    );
    assert!(unnamed.iter().filter_map(Inst::as_assign).all(|assign| match &assign.lhv {
        Value::Local(local) => !local.is_named(),
        _ => true,
    }));
}

#[test]
fn stack_underflow_is_malformed() {
    let body = text::parse_method("method static com/acme/T.bad()V\n  pop\n  return\nend\n").unwrap();
    let err = builder::build(&body, Settings::new()).unwrap_err();
    assert!(matches!(err, Error::EmptyStack(_)));
    assert_eq!(err.category(), ErrorCategory::Malformed);
}

#[test]
fn undefined_jump_target_is_rejected() {
    let listing = r#"
method static com/acme/T.lost()V
  goto nowhere
end
"#;
    let outcome = text::parse_method(listing).and_then(|body| builder::build(&body, Settings::new()));
    assert!(outcome.is_err());
}
