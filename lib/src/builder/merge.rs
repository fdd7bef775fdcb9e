//! Join points: merging predecessor frames, then satisfying the merge registers with copies on
//! every incoming edge and making fall-through edges into joins explicit

use super::{Frame, FrameTypes, RawInstListBuilder, ENTRY};
use crate::ir::visit::{ExprMapper, Mapper};
use crate::ir::{CatchEntry, CatchInst, Inst, LabelRef, SwitchInst, TypeName, Value};
use crate::jvm::{Insn, SynLabel, TryCatch};
use crate::{Error, Result};
use log::{trace, warn};
use std::collections::{BTreeSet, HashMap};

/// Registers introduced when merging frames at a node, keyed by local slot or stack index
#[derive(Clone, Debug)]
pub(super) struct LaterAssignments {
    pub node: usize,
    pub assignments: Vec<(usize, Value)>,
}

/// Copy `assign_to = current` that has to happen at the end of predecessor `node`
#[derive(Clone, Debug)]
struct LaterAssignment {
    node: usize,
    assign_to: Value,
    current: Value,
}

fn value_depends_on(value: &Value, target: &Value) -> bool {
    value == target
        || value
            .operands()
            .into_iter()
            .any(|operand| value_depends_on(operand, target))
}

impl<'a> RawInstListBuilder<'a> {
    /// Label nodes start handlers and are where control flow joins
    pub(super) fn build_label_node(&mut self, node: usize, label: SynLabel) -> Result<Frame> {
        let label_ref = self.label_ref(label)?;
        self.add_inst(node, Inst::Label(label_ref));

        let handled: Vec<usize> = self.graph.handlers.get(&node).cloned().unwrap_or_default();
        let is_handler = !handled.is_empty();

        let mut throwable = None;
        if is_handler {
            let body = self.body;
            let try_catches: Vec<&TryCatch> =
                handled.iter().map(|index| &body.try_catch[*index]).collect();

            let mut catch_types = try_catches.iter().map(|try_catch| &try_catch.catch_type);
            let common_type = match catch_types.next() {
                Some(Some(first)) if catch_types.all(|other| other.as_ref() == Some(first)) => {
                    TypeName::from_binary_name(first)
                }
                _ => TypeName::THROWABLE,
            };

            let register = Value::from(self.fresh_register(common_type));
            let entries = try_catches
                .into_iter()
                .map(|try_catch| self.build_catch_entry(try_catch))
                .collect::<Result<Vec<_>>>()?;
            self.add_inst(
                node,
                Inst::Catch(CatchInst {
                    throwable: register.clone(),
                    handler: label_ref,
                    entries,
                }),
            );
            throwable = Some(register);
        }

        let predecessors: Vec<usize> = self
            .graph
            .graph
            .predecessors(node)
            .iter()
            .copied()
            .collect();
        let single_frame = match predecessors.as_slice() {
            [predecessor] => self.frames[*predecessor].clone(),
            _ => None,
        };
        let mut frame = match single_frame {
            Some(frame) => frame,
            None => self.merge_frames(node, &predecessors, is_handler)?,
        };

        if let Some(throwable) = throwable {
            frame.stack.clear();
            frame.stack.push(throwable);
        }
        Ok(frame)
    }

    fn build_catch_entry(&mut self, try_catch: &TryCatch) -> Result<CatchEntry> {
        let accepted_throwable = try_catch
            .catch_type
            .as_ref()
            .map(TypeName::from_binary_name)
            .unwrap_or(TypeName::THROWABLE);
        Ok(CatchEntry {
            accepted_throwable,
            start_inclusive: self.catch_range_label(try_catch.start)?,
            end_exclusive: self.catch_range_label(try_catch.end)?,
        })
    }

    /// Label for a catch range bound, placing a fresh one if the bound was pruned as dead
    fn catch_range_label(&mut self, label: SynLabel) -> Result<LabelRef> {
        if let Some(label_ref) = self.labels.get(&label) {
            return Ok(*label_ref);
        }
        let node = self
            .label_nodes
            .get(&label)
            .copied()
            .ok_or_else(|| Error::UnresolvedLabel(format!("{:?}", label)))?;
        let fresh = self.fresh_label();
        warn!(
            "Catch range bound {:?} is unreachable, placing {} at node {}",
            label, fresh, node
        );
        self.add_inst(node, Inst::Label(fresh));
        self.labels.insert(label, fresh);
        Ok(fresh)
    }

    /// Frame at a join point
    ///
    /// Slots and stack entries holding the same value in every predecessor keep it. Everything
    /// else gets a fresh register, recorded so that copies into it can be inserted into the
    /// predecessors once all of them have been simulated.
    fn merge_frames(&mut self, node: usize, predecessors: &[usize], ignore_stack: bool) -> Result<Frame> {
        let frames: Vec<Option<Frame>> = predecessors
            .iter()
            .map(|predecessor| self.frames[*predecessor].clone())
            .collect();
        let present: Vec<&Frame> = frames.iter().flatten().collect();
        if present.is_empty() {
            return Err(Error::FrameOutOfOrder(node));
        }
        let all_present = present.len() == frames.len();
        trace!(
            "Merging {} frames at node {} ({} missing)",
            present.len(),
            node,
            frames.len() - present.len()
        );

        let local_count = present.iter().map(|frame| frame.local_count()).min().unwrap_or(0);
        let stack_size = if ignore_stack {
            0
        } else {
            present.iter().map(|frame| frame.stack.len()).min().unwrap_or(0)
        };

        let mut stack_assignments = vec![];
        let mut stack = Vec::with_capacity(stack_size);
        for index in 0..stack_size {
            let type_name = present
                .iter()
                .map(|frame| frame.stack[index].type_name())
                .reduce(|lub, next| lub.lub(&next))
                .unwrap_or(TypeName::TOP);
            if type_name == TypeName::TOP {
                let types: Vec<String> = present
                    .iter()
                    .map(|frame| frame.stack[index].type_name().as_str().to_owned())
                    .collect();
                return Err(Error::IncompatibleStackTypes {
                    node,
                    types: format!("[{}]", types.join(", ")),
                });
            }

            let same = if all_present {
                same_value(present.iter().map(|frame| &frame.stack[index]))
            } else {
                None
            };
            let value = match same {
                Some(value) => value,
                None => {
                    let register = Value::from(self.fresh_register(type_name));
                    stack_assignments.push((index, register.clone()));
                    register
                }
            };
            stack.push(value);
        }

        let declared = self.following_frame(node).cloned();
        let mut local_assignments = vec![];
        let mut locals = Vec::with_capacity(local_count);
        for slot in 0..local_count {
            if matches!(&declared, Some(types) if !types.declares(slot)) {
                locals.push(None);
                continue;
            }
            let type_name = match self.merged_local_type(&present, slot, node) {
                Some(type_name) if type_name != TypeName::TOP => type_name,
                _ => {
                    locals.push(None);
                    continue;
                }
            };

            let same = if all_present {
                same_value(present.iter().filter_map(|frame| frame.find_local(slot)))
            } else {
                None
            };
            let value = match same {
                Some(value) => value,
                None => {
                    if type_name == TypeName::NULL && declared.is_none() {
                        return Err(Error::UntypedNull { node, slot });
                    }
                    let register = Value::from(self.fresh_register(type_name));
                    local_assignments.push((slot, register.clone()));
                    register
                }
            };
            locals.push(Some(value));
        }

        if !stack_assignments.is_empty() {
            self.stack_merges.push(LaterAssignments {
                node,
                assignments: stack_assignments,
            });
        }
        if !local_assignments.is_empty() {
            self.local_merges.push(LaterAssignments {
                node,
                assignments: local_assignments,
            });
        }

        let mut frame = Frame { locals, stack };
        frame.trim_locals();
        Ok(frame)
    }

    /// Type of a merged local, `None` if some predecessor does not define it
    ///
    /// When the predecessors agree on something other than `TOP`, the debug table type wins.
    fn merged_local_type(&self, frames: &[&Frame], slot: usize, node: usize) -> Option<TypeName> {
        let mut merged: Option<TypeName> = None;
        for frame in frames {
            let type_name = frame.find_local(slot)?.type_name();
            merged = Some(match merged {
                None => type_name,
                Some(lub) => lub.lub(&type_name),
            });
        }
        if merged.as_ref() == Some(&TypeName::TOP) {
            return merged;
        }
        match self.debug_local_covering(slot, node) {
            Some(local) => Some(local.type_name.clone()),
            None => merged,
        }
    }

    /// Types declared by the stack map frame right after the node, if there is one
    fn following_frame(&self, node: usize) -> Option<&FrameTypes> {
        let next = self.body.nodes[node..]
            .iter()
            .position(|insn| !matches!(insn, Insn::LineNumber { .. }))?;
        self.declared_frames.get(&(node + next + 1))
    }

    /// Insert the copies into merge registers at the end of every predecessor of the joins
    pub(super) fn build_required_assignments(&mut self) -> Result<()> {
        let local_merges = std::mem::take(&mut self.local_merges);
        for merge in &local_merges {
            for (slot, assign_to) in &merge.assignments {
                let assignments = self.later_assignments(merge.node, assign_to, |frame| {
                    frame.find_local(*slot).cloned()
                })?;
                self.insert_later_assignments(assignments);
            }
        }
        self.local_merges = local_merges;

        let stack_merges = std::mem::take(&mut self.stack_merges);
        for merge in &stack_merges {
            for (index, assign_to) in &merge.assignments {
                let assignments = self.later_assignments(merge.node, assign_to, |frame| {
                    frame.stack.get(*index).cloned()
                })?;
                self.insert_later_assignments(assignments);
            }
        }
        self.stack_merges = stack_merges;
        Ok(())
    }

    fn later_assignments(
        &self,
        node: usize,
        assign_to: &Value,
        current_value: impl Fn(&Frame) -> Option<Value>,
    ) -> Result<Vec<LaterAssignment>> {
        let mut assignments = vec![];
        for predecessor in self.graph.graph.predecessors(node) {
            let frame = self.frames[*predecessor]
                .as_ref()
                .ok_or(Error::FrameOutOfOrder(*predecessor))?;
            match current_value(frame) {
                Some(current) if current != *assign_to => assignments.push(LaterAssignment {
                    node: *predecessor,
                    assign_to: assign_to.clone(),
                    current,
                }),
                _ => (),
            }
        }
        Ok(assignments)
    }

    /// Copies of the same value into the same register from several predecessors only need to
    /// happen where the value enters that group of nodes
    fn insert_later_assignments(&mut self, assignments: Vec<LaterAssignment>) {
        let mut groups: Vec<(Value, Vec<LaterAssignment>)> = vec![];
        for assignment in assignments {
            match groups
                .iter_mut()
                .find(|(current, _)| *current == assignment.current)
            {
                Some((_, group)) => group.push(assignment),
                None => groups.push((assignment.current.clone(), vec![assignment])),
            }
        }

        for (current, group) in groups {
            if let [assignment] = group.as_slice() {
                self.insert_value_assignment(assignment.node, &assignment.assign_to, &current);
                continue;
            }

            let group_nodes: BTreeSet<usize> = group.iter().map(|assignment| assignment.node).collect();
            let start_nodes = self.graph.graph.find_start_nodes(&group_nodes);
            for assignment in &group {
                let defines_current = self.inst_lists[assignment.node]
                    .iter()
                    .flatten()
                    .any(|inst| matches!(inst, Inst::Assign(assign) if assign.lhv == current));
                if start_nodes.contains(&assignment.node) || defines_current {
                    self.insert_value_assignment(assignment.node, &assignment.assign_to, &current);
                }
            }
        }
    }

    /// Insert `assign_to = current` at the end of a node, before any jump out of it
    ///
    /// If the jump condition reads `assign_to`, the old value is saved in a fresh register first.
    fn insert_value_assignment(&mut self, node: usize, assign_to: &Value, current: &Value) {
        trace!("Copying {} into {} at node {}", current, assign_to, node);
        let assignment = self.create_raw_assign(assign_to.clone(), current.clone());
        let body = self.body;
        let insn = if node == ENTRY {
            None
        } else {
            body.nodes.get(node - 1)
        };

        match insn {
            Some(insn) if insn.is_terminate() => {
                let list = self.inst_list(node);
                let index = list.len().saturating_sub(1);
                list.insert(index, assignment);
            }
            Some(insn) if insn.is_branching() => {
                let list = self.inst_list(node);
                let branch_index = match list.iter().position(Inst::is_branching) {
                    Some(index) => index,
                    None => {
                        list.push(assignment);
                        return;
                    }
                };
                list.insert(branch_index, assignment);

                match list[branch_index + 1].clone() {
                    Inst::Switch(switch) if value_depends_on(&switch.key, assign_to) => {
                        let fresh = Value::from(self.fresh_register(switch.key.type_name()));
                        let save = self.create_raw_assign(fresh.clone(), switch.key.clone());
                        let list = self.inst_list(node);
                        list.insert(0, save);
                        list[branch_index + 2] = Inst::Switch(SwitchInst {
                            key: fresh,
                            ..switch
                        });
                    }
                    Inst::If(branch)
                        if value_depends_on(&branch.condition.lhv, assign_to)
                            || value_depends_on(&branch.condition.rhv, assign_to) =>
                    {
                        let fresh = Value::from(self.fresh_register(assign_to.type_name()));
                        let save = self.create_raw_assign(fresh.clone(), assign_to.clone());
                        let mut mapper = ExprMapper::new(HashMap::from([(assign_to.clone(), fresh)]));
                        let branch = mapper.map_inst(&Inst::If(branch));

                        let list = self.inst_list(node);
                        list.insert(0, save);
                        list[branch_index + 2] = branch;
                    }
                    _ => (),
                }
            }
            _ => self.add_inst(node, assignment),
        }
    }

    /// Make fall-through edges into join points explicit
    pub(super) fn build_required_gotos(&mut self) -> Result<()> {
        let body = self.body;
        for node in 0..self.inst_lists.len() {
            if self.inst_lists[node].is_none()
                || self.graph.handlers.contains_key(&node)
                || !self.graph.graph.has_multiple_predecessors(node)
            {
                continue;
            }

            let predecessors: Vec<usize> = self.graph.graph.predecessors(node).iter().copied().collect();
            let mut target = None;
            for predecessor in predecessors {
                let is_branching = predecessor != ENTRY && body.nodes[predecessor - 1].is_branching();
                if is_branching {
                    continue;
                }

                let label = match target {
                    Some(label) => label,
                    None => {
                        let label = match &body.nodes[node - 1] {
                            Insn::Label(label) => self.label_ref(*label)?,
                            _ => {
                                let label = self.fresh_label();
                                self.inst_list(node).insert(0, Inst::Label(label));
                                label
                            }
                        };
                        target = Some(label);
                        label
                    }
                };
                self.add_inst(predecessor, Inst::Goto(label));
            }
        }
        Ok(())
    }
}

/// The value every entry agrees on, if any
fn same_value<'v>(mut values: impl Iterator<Item = &'v Value>) -> Option<Value> {
    let first = values.next()?;
    if values.all(|value| value == first) {
        Some(first.clone())
    } else {
        None
    }
}
