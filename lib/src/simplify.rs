//! Cleanup of freshly built instruction lists
//!
//! Frame merging and stores into local slots introduce plenty of register-to-register copies.
//! The simplifier removes the ones which are redundant, running its passes until nothing
//! changes anymore (so simplifying an already simplified list is a no-op).

use crate::ir::visit::{values_of, values_of_expr, walk_map_value, ExprMapper, Mapper};
use crate::ir::{Constant, Expr, Inst, LocalVar, TypeName, Value};
use log::trace;
use std::collections::{HashMap, HashSet};

/// Instruction indices using each variable
type Uses = HashMap<Value, Vec<usize>>;

#[derive(Debug, Default)]
pub struct Simplifier {
    rounds: usize,
}

impl Simplifier {
    pub fn new() -> Simplifier {
        Simplifier::default()
    }

    /// Number of rounds the last call to `simplify` needed to reach a fixed point
    pub fn rounds(&self) -> usize {
        self.rounds
    }

    pub fn simplify(&mut self, insts: Vec<Inst>) -> Vec<Inst> {
        self.rounds = 0;
        let mut insts = insts;
        loop {
            self.rounds += 1;
            let simplified = simplify_round(insts.clone());
            trace!(
                "Simplifier round {}: {} -> {} instructions",
                self.rounds,
                insts.len(),
                simplified.len()
            );
            if simplified == insts {
                return simplified;
            }
            insts = simplified;
        }
    }
}

fn simplify_round(insts: Vec<Inst>) -> Vec<Inst> {
    let mut insts = clean_repeated_assignments(insts);

    loop {
        let uses = compute_uses(&insts);
        let before = insts.len();
        insts.retain(|inst| !is_dead_assignment(inst, &uses));
        if insts.len() == before {
            break;
        }
    }

    loop {
        let before = insts.clone();
        let (replacements, mapping) = copy_chains(&insts);
        if replacements.is_empty() {
            break;
        }
        let mut mapper = ExprMapper::new(mapping);
        insts = insts
            .into_iter()
            .filter(|inst| !is_mutual_copy(inst, &replacements))
            .map(|inst| mapper.map_inst(&inst))
            .filter(|inst| !is_self_assignment(inst))
            .collect();
        if insts == before {
            break;
        }
    }

    loop {
        let uses = compute_uses(&insts);
        let (replacements, replaced) = compute_replacements(&insts, &uses);
        if replacements.is_empty() {
            break;
        }
        let mut mapper = ExprMapper::new(replacements);
        insts = insts
            .iter()
            .enumerate()
            .filter(|(index, _)| !replaced.contains(index))
            .map(|(_, inst)| mapper.map_inst(inst))
            .collect();
    }

    insts.retain(|inst| !is_self_assignment(inst));
    normalize_types(insts)
}

/// `this`, arguments, and registers
fn is_variable(value: &Value) -> bool {
    matches!(value, Value::This(_) | Value::Argument(_) | Value::Local(_))
}

/// Variables read by an instruction
///
/// The target of an assignment is not a read (but the operands of a field or array target are),
/// and binding the exception in a catch instruction is not a read either.
fn used_values(inst: &Inst) -> Vec<&Value> {
    let values = match inst {
        Inst::Assign(assign) => {
            let mut values = vec![];
            if assign.lhv.is_complex() {
                values.extend(nested_values(&assign.lhv));
            }
            values.extend(values_of_expr(&assign.rhv));
            values
        }
        Inst::Catch(_) => vec![],
        _ => values_of(inst),
    };
    values.into_iter().filter(|value| is_variable(value)).collect()
}

fn nested_values(value: &Value) -> Vec<&Value> {
    value
        .operands()
        .into_iter()
        .flat_map(|operand| std::iter::once(operand).chain(nested_values(operand)))
        .collect()
}

fn compute_uses(insts: &[Inst]) -> Uses {
    let mut uses: Uses = HashMap::new();
    for (index, inst) in insts.iter().enumerate() {
        for value in used_values(inst) {
            let users = uses.entry(value.clone()).or_default();
            if users.last() != Some(&index) {
                users.push(index);
            }
        }
    }
    uses
}

fn is_self_assignment(inst: &Inst) -> bool {
    matches!(inst, Inst::Assign(assign) if assign.rhv.as_value() == Some(&assign.lhv))
}

/// Copy of a value (not a computation) into a variable nobody reads
fn is_dead_assignment(inst: &Inst, uses: &Uses) -> bool {
    match inst {
        Inst::Assign(assign) => {
            assign.lhv.is_simple()
                && matches!(assign.rhv, Expr::Value(_))
                && !uses.contains_key(&assign.lhv)
        }
        _ => false,
    }
}

/// Drop copies whose target already holds the same value since the last label
fn clean_repeated_assignments(insts: Vec<Inst>) -> Vec<Inst> {
    let mut equalities: HashMap<Value, Value> = HashMap::new();
    let mut cleaned = Vec::with_capacity(insts.len());
    for inst in insts {
        match &inst {
            Inst::Assign(assign) => {
                let lhv = &assign.lhv;
                equalities.retain(|_, value| value != lhv);
                match assign.rhv.as_value() {
                    Some(rhv) if lhv.is_simple() && rhv.is_simple() => {
                        if equalities.get(lhv) != Some(rhv) {
                            equalities.insert(lhv.clone(), rhv.clone());
                            cleaned.push(inst);
                        }
                    }
                    _ => {
                        equalities.remove(lhv);
                        cleaned.push(inst);
                    }
                }
            }
            Inst::Label(_) => {
                equalities.clear();
                cleaned.push(inst);
            }
            _ => cleaned.push(inst),
        }
    }
    cleaned
}

/// Registers only ever defined by copying one register, itself defined by at most one
/// instruction, can be replaced by that register
///
/// Definitions are counted per instruction: two identical computations still produce two
/// different values. Returns the raw `to -> from` pairs and the mapping to apply: a named target
/// keeps its name and takes the type of its source, and both registers are mapped to the result.
fn copy_chains(insts: &[Inst]) -> (HashMap<Value, Value>, HashMap<Value, Value>) {
    let mut definitions: Vec<(&LocalVar, Vec<&Expr>)> = vec![];
    for inst in insts {
        if let Inst::Assign(assign) = inst {
            if let Value::Local(local) = &assign.lhv {
                match definitions.iter_mut().find(|(target, _)| *target == local) {
                    Some((_, exprs)) => exprs.push(&assign.rhv),
                    None => definitions.push((local, vec![&assign.rhv])),
                }
            }
        }
    }

    let mut replacements = HashMap::new();
    let mut mapping = HashMap::new();
    for (to, froms) in &definitions {
        let from = match froms.split_first() {
            Some((first, rest)) if rest.iter().all(|expr| expr == first) => {
                match first.as_local() {
                    Some(from) => from,
                    None => continue,
                }
            }
            _ => continue,
        };
        let from_definitions = definitions
            .iter()
            .find(|(target, _)| *target == from)
            .map(|(_, exprs)| exprs.len());
        if matches!(from_definitions, Some(count) if count != 1) {
            continue;
        }

        replacements.insert(Value::from((*to).clone()), Value::from(from.clone()));
        if to.is_named() {
            let actual = Value::from(to.with_type(from.type_name.clone()));
            mapping.insert(Value::from((*to).clone()), actual.clone());
            mapping.insert(Value::from(from.clone()), actual);
        } else {
            mapping.insert(Value::from((*to).clone()), Value::from(from.clone()));
        }
    }
    (replacements, mapping)
}

/// `a = b` where `b = a` is also a recorded replacement
fn is_mutual_copy(inst: &Inst, replacements: &HashMap<Value, Value>) -> bool {
    match inst {
        Inst::Assign(assign) => match assign.rhv.as_value() {
            Some(rhv) if assign.lhv.is_simple() && rhv.is_simple() => {
                replacements.get(&assign.lhv) == Some(rhv)
                    && replacements.get(rhv) == Some(&assign.lhv)
            }
            _ => false,
        },
        _ => false,
    }
}

/// Find copies `a = r` where `r` is a register read only by that copy, so that `r` can be
/// renamed to `a` and the copy removed
///
/// The renaming is refused when `a` is read before the copy, or when `a` already holds a value
/// read after its first definition and `r` is not defined right before the copy.
fn compute_replacements(insts: &[Inst], uses: &Uses) -> (HashMap<Value, Value>, HashSet<usize>) {
    let mut replacements = HashMap::new();
    let mut reserved = HashSet::new();
    let mut replaced = HashSet::new();

    let mut first_assignment: HashMap<&Value, usize> = HashMap::new();
    for (index, inst) in insts.iter().enumerate() {
        if let Inst::Assign(assign) = inst {
            first_assignment.entry(&assign.lhv).or_insert(index);
        }
    }

    for (index, inst) in insts.iter().enumerate() {
        let (lhv, rhv) = match inst {
            Inst::Assign(assign) if assign.lhv.is_simple() => match &assign.rhv {
                Expr::Value(rhv @ Value::Local(_)) => (&assign.lhv, rhv),
                _ => continue,
            },
            _ => continue,
        };
        if reserved.contains(rhv) {
            continue;
        }
        match uses.get(rhv).map(Vec::as_slice) {
            Some([single]) if *single == index => (),
            _ => continue,
        }

        let lhv_usage = uses.get(lhv).and_then(|users| users.iter().min().copied());
        if matches!(lhv_usage, Some(usage) if usage < index) {
            continue;
        }

        let lhv_assignment = first_assignment.get(lhv).copied();
        let rhv_assignment = first_assignment.get(rhv).copied();
        let not_assigned_before = match (lhv_usage, lhv_assignment, rhv_assignment) {
            (Some(usage), Some(lhv_assignment), Some(rhv_assignment)) => {
                lhv_assignment >= usage || rhv_assignment + 1 == index
            }
            _ => true,
        };

        if not_assigned_before {
            replacements.insert(rhv.clone(), lhv.clone());
            reserved.insert(lhv.clone());
            replaced.insert(index);
        }
    }
    (replacements, replaced)
}

/// Registers assigned values of several types get the type they were declared with at their
/// first definition, everywhere
fn normalize_types(insts: Vec<Inst>) -> Vec<Inst> {
    let mut types: HashMap<usize, (TypeName, HashSet<TypeName>)> = HashMap::new();
    for inst in &insts {
        if let Inst::Assign(assign) = inst {
            if let Value::Local(local) = &assign.lhv {
                if assign.rhv.as_value() == Some(&Value::Constant(Constant::Null)) {
                    continue;
                }
                types
                    .entry(local.index)
                    .or_insert_with(|| (local.type_name.clone(), HashSet::new()))
                    .1
                    .insert(assign.rhv.type_name());
            }
        }
    }

    let declared: HashMap<usize, TypeName> = types
        .into_iter()
        .filter(|(_, (_, assigned))| assigned.len() > 1)
        .map(|(index, (declared, _))| (index, declared))
        .collect();
    if declared.is_empty() {
        return insts;
    }

    let mut retyper = Retyper { declared: &declared };
    insts.iter().map(|inst| retyper.map_inst(inst)).collect()
}

struct Retyper<'d> {
    declared: &'d HashMap<usize, TypeName>,
}

impl<'d> Mapper for Retyper<'d> {
    fn map_value(&mut self, value: &Value) -> Value {
        match value {
            Value::Local(local) => match self.declared.get(&local.index) {
                Some(type_name) => Value::Local(local.with_type(type_name.clone())),
                None => value.clone(),
            },
            _ => walk_map_value(self, value),
        }
    }
}
