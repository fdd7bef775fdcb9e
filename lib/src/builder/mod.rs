//! Lift a JVM method body into a flat list of raw IR instructions
//!
//! Construction happens in a few passes over the nodes of the method body:
//!
//!   1. build a predecessor graph over the nodes and drop the unreachable ones
//!   2. visit nodes in an order where every node comes after its forward predecessors,
//!      symbolically executing each one against the frame left by its predecessor (or a merge of
//!      the frames of its predecessors at join points)
//!   3. satisfy the merge registers introduced at join points with copies on every incoming edge
//!      (loop back edges are only known at this point)
//!   4. make every control flow edge between nodes explicit with a `goto`
//!
//! The instruction lists of the nodes are then concatenated in stream order, re-typed using
//! the stack map frames seen along the way, and optionally simplified.

mod frame;
mod graph;
mod merge;
mod simulate;

pub use frame::{Frame, FrameBuilder, FrameTypes, StackShuffle};
pub use graph::{InstructionGraph, MethodGraph, ENTRY};

use crate::ir::visit::{walk_map_value, ExprMapper, Mapper};
use crate::ir::{Argument, Expr, Inst, LabelRef, LocalVar, LocalVarKind, TypeName, Value};
use crate::jvm::{Insn, MethodBody, Name, SynLabel};
use crate::simplify::Simplifier;
use crate::util::Width;
use crate::{Error, Result};
use log::debug;
use merge::LaterAssignments;
use std::collections::HashMap;

/// Knobs for IR construction
#[derive(Clone, Debug)]
pub struct Settings {
    /// Name registers after the local variable debug table entries they are stored to
    pub keep_local_variable_names: bool,

    /// Run the simplifier on the constructed list
    pub simplify: bool,

    /// Make sure the list starts with a line number (possibly preceded by a label)
    pub normalize_first_line_number: bool,
}

impl Settings {
    pub fn new() -> Settings {
        Settings {
            keep_local_variable_names: true,
            simplify: true,
            normalize_first_line_number: true,
        }
    }
}

impl Default for Settings {
    fn default() -> Settings {
        Settings::new()
    }
}

/// Local variable debug table entry, with its range resolved to node ids
#[derive(Clone, Debug)]
struct DebugLocal {
    slot: usize,
    name: String,
    type_name: TypeName,
    start: usize,
    end: usize,
}

/// Single-use builder of the raw instruction list of one method
pub struct RawInstListBuilder<'a> {
    body: &'a MethodBody,
    settings: Settings,

    /// Predecessor graph, live labels, and exception handlers
    graph: MethodGraph,

    /// Frame after each node (`None` until the node is simulated, or if it is dead)
    frames: Vec<Option<Frame>>,

    /// Instructions produced by each node
    inst_lists: Vec<Option<Vec<Inst>>>,

    /// IR label of every live label
    labels: HashMap<SynLabel, LabelRef>,

    /// Node id of every placed label, dead or alive
    label_nodes: HashMap<SynLabel, usize>,

    /// Node id of the first label of the method
    first_label: Option<usize>,

    debug_locals: Vec<DebugLocal>,

    /// Registers to re-type, found through stack map frames
    local_type_refinement: HashMap<Value, Value>,

    /// Types declared by every stack map frame node, with incremental frames expanded
    declared_frames: HashMap<usize, FrameTypes>,

    local_merges: Vec<LaterAssignments>,
    stack_merges: Vec<LaterAssignments>,

    /// Union-find over registers linked by copies
    register_parent: HashMap<usize, usize>,
    register_named: HashMap<usize, bool>,

    /// Debug table names attached to registers
    register_to_local_name: HashMap<usize, String>,

    /// Number of slots taken by `this` and the arguments
    arg_counter: usize,

    next_label: usize,
    next_register: usize,
}

impl<'a> RawInstListBuilder<'a> {
    pub fn new(body: &'a MethodBody, settings: Settings) -> Result<RawInstListBuilder<'a>> {
        let graph = MethodGraph::build(body)?;
        let node_count = graph.graph.node_count();

        let mut label_nodes = HashMap::new();
        let mut first_label = None;
        let mut labels = HashMap::new();
        let mut next_label = 0;
        for (index, node) in body.nodes.iter().enumerate() {
            if let Insn::Label(label) = node {
                let id = index + 1;
                label_nodes.insert(*label, id);
                first_label.get_or_insert(id);
                if graph.labels.contains_key(label) {
                    labels.insert(*label, LabelRef(next_label));
                    next_label += 1;
                }
            }
        }

        let resolve = |label: SynLabel| {
            label_nodes
                .get(&label)
                .copied()
                .ok_or_else(|| Error::UnresolvedLabel(format!("{:?}", label)))
        };
        let debug_locals = body
            .local_variables
            .iter()
            .map(|local| {
                Ok(DebugLocal {
                    slot: local.index as usize,
                    name: local.name.as_str().to_owned(),
                    type_name: TypeName::from(&local.descriptor),
                    start: resolve(local.start)?,
                    end: resolve(local.end)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(RawInstListBuilder {
            body,
            settings,
            graph,
            frames: vec![None; node_count],
            inst_lists: vec![None; node_count],
            labels,
            label_nodes,
            first_label,
            debug_locals,
            local_type_refinement: HashMap::new(),
            declared_frames: HashMap::new(),
            local_merges: vec![],
            stack_merges: vec![],
            register_parent: HashMap::new(),
            register_named: HashMap::new(),
            register_to_local_name: HashMap::new(),
            arg_counter: 0,
            next_label,
            next_register: 0,
        })
    }

    /// Build the instruction list
    pub fn build(mut self) -> Result<Vec<Inst>> {
        debug!(
            "Building {}.{} ({} nodes)",
            self.body.info.owner.as_str(),
            self.body.info.name.as_str(),
            self.body.nodes.len()
        );

        self.build_instructions()?;
        self.mark_original_assigns();
        self.build_required_assignments()?;
        self.build_required_gotos()?;
        self.fill_register_names();

        let mut insts: Vec<Inst> = self
            .inst_lists
            .iter_mut()
            .filter_map(Option::take)
            .flatten()
            .collect();
        if self.settings.normalize_first_line_number {
            self.ensure_first_inst_is_line_number(&mut insts);
        }

        let refinement = std::mem::take(&mut self.local_type_refinement);
        let insts = ExprMapper::new(refinement).map_all(&insts);

        let insts = if self.settings.simplify {
            Simplifier::new().simplify(insts)
        } else {
            insts
        };
        debug!(
            "Built {}.{} ({} instructions)",
            self.body.info.owner.as_str(),
            self.body.info.name.as_str(),
            insts.len()
        );
        Ok(insts)
    }

    fn build_instructions(&mut self) -> Result<()> {
        let body = self.body;
        self.declare_frames()?;
        for node in self.graph.graph.top_sort() {
            let frame = if node == ENTRY {
                self.initial_frame()
            } else {
                match &body.nodes[node - 1] {
                    Insn::Label(label) => self.build_label_node(node, *label)?,
                    Insn::Frame(_) => self.build_frame_node(node)?,
                    insn => self.build_simple_node(node, insn)?,
                }
            };
            self.frames[node] = Some(frame);
        }
        Ok(())
    }

    fn initial_frame(&mut self) -> Frame {
        let body = self.body;
        let info = &body.info;
        let mut frame = Frame::default();

        self.arg_counter = 0;
        let mut static_inc = 0;
        if !info.is_static() {
            frame.put_local(0, Value::This(TypeName::from_binary_name(&info.owner)));
            self.arg_counter = 1;
            static_inc = 1;
        }

        let mut variables: Vec<&DebugLocal> = self.debug_locals.iter().collect();
        variables.sort_by_key(|local| local.slot);

        for (index, parameter) in info.descriptor.parameters.iter().enumerate() {
            let name = match variables.get(index + static_inc) {
                Some(variable) => Some(variable.name.clone()),
                None => info
                    .parameter_names
                    .get(index)
                    .and_then(Option::as_ref)
                    .map(|name| name.as_str().to_owned()),
            };
            frame.put_local(
                self.arg_counter,
                Value::Argument(Argument::new(index, name, TypeName::from(parameter))),
            );
            self.arg_counter += parameter.width();
        }
        debug_assert_eq!(
            self.arg_counter,
            info.descriptor.parameter_length(!info.is_static())
        );
        frame
    }

    fn predecessor_frame(&self, node: usize) -> Result<Frame> {
        let predecessor = self.graph.graph.single_predecessor(node)?;
        self.frames[predecessor]
            .clone()
            .ok_or(Error::FrameOutOfOrder(node))
    }

    fn label_ref(&self, label: SynLabel) -> Result<LabelRef> {
        self.labels
            .get(&label)
            .copied()
            .ok_or_else(|| Error::UnresolvedLabel(format!("{:?}", label)))
    }

    fn fresh_label(&mut self) -> LabelRef {
        let label = LabelRef(self.next_label);
        self.next_label += 1;
        label
    }

    fn fresh_register(&mut self, type_name: TypeName) -> LocalVar {
        let register = LocalVar::generated(self.next_register, type_name);
        self.next_register += 1;
        register
    }

    fn inst_list(&mut self, node: usize) -> &mut Vec<Inst> {
        self.inst_lists[node].get_or_insert_with(Vec::new)
    }

    fn add_inst(&mut self, node: usize, inst: Inst) {
        self.inst_list(node).push(inst);
    }

    /// Debug table entry for a slot whose live range covers a node
    fn debug_local_covering(&self, slot: usize, node: usize) -> Option<&DebugLocal> {
        self.debug_locals
            .iter()
            .find(|local| local.slot == slot && local.start <= node && node <= local.end)
    }

    fn root_register(&self, register: usize) -> usize {
        let mut current = register;
        while let Some(parent) = self.register_parent.get(&current) {
            current = *parent;
        }
        current
    }

    /// Record that two registers hold the same variable
    ///
    /// Two named groups are never united. Otherwise the group of `first` becomes the root if
    /// `first` is named or its group already carries a debug table name.
    fn unite_registers(&mut self, first: &LocalVar, second: &LocalVar) {
        self.register_named.insert(first.index, first.is_named());
        self.register_named.insert(second.index, second.is_named());

        let first_root = self.root_register(first.index);
        let second_root = self.root_register(second.index);
        let is_named = |root: usize| self.register_named.get(&root).copied().unwrap_or(false);
        if first_root == second_root || (is_named(first_root) && is_named(second_root)) {
            return;
        }

        if first.is_named() || self.register_to_local_name.contains_key(&first_root) {
            self.register_parent.insert(second_root, first_root);
        } else {
            self.register_parent.insert(first_root, second_root);
        }
    }

    fn create_raw_assign(&mut self, lhv: Value, rhv: impl Into<Expr>) -> Inst {
        let rhv = rhv.into();
        if let (Value::Local(left), Some(right)) = (&lhv, rhv.as_local()) {
            if left.kind != LocalVarKind::Original && left.kind != LocalVarKind::NamedLocal {
                self.unite_registers(left, right);
            }
        }
        Inst::assign(lhv, rhv)
    }

    fn change_assigns(&mut self, mut change: impl FnMut(&mut LocalVar)) {
        for list in self.inst_lists.iter_mut().flatten() {
            for inst in list.iter_mut() {
                if let Inst::Assign(assign) = inst {
                    if let Value::Local(local) = &mut assign.lhv {
                        change(local);
                    }
                }
            }
        }
    }

    fn mark_original_assigns(&mut self) {
        self.change_assigns(|local| local.kind = LocalVarKind::Original);
    }

    /// Give unnamed registers the debug table name of the group they belong to
    fn fill_register_names(&mut self) {
        let names: HashMap<usize, String> = (0..self.next_register)
            .filter_map(|index| {
                self.register_to_local_name
                    .get(&self.root_register(index))
                    .map(|name| (index, name.clone()))
            })
            .collect();
        if names.is_empty() {
            return;
        }

        let mut namer = RegisterNamer { names: &names };
        for list in self.inst_lists.iter_mut().flatten() {
            for inst in list.iter_mut() {
                *inst = namer.map_inst(inst);
            }
        }
    }

    fn ensure_first_inst_is_line_number(&mut self, insts: &mut Vec<Inst>) {
        let first = match insts
            .iter()
            .position(|inst| matches!(inst, Inst::LineNumber { .. }))
        {
            Some(first) => first,
            None => return,
        };
        if first == 0 || (first == 1 && matches!(insts[0], Inst::Label(_))) {
            return;
        }

        if let Inst::LineNumber { line, .. } = insts[first] {
            let label = self.fresh_label();
            insts.splice(
                0..0,
                vec![Inst::Label(label), Inst::LineNumber { line, start: label }],
            );
        }
    }
}

/// Renames every occurrence of unnamed registers which have a name
struct RegisterNamer<'n> {
    names: &'n HashMap<usize, String>,
}

impl<'n> Mapper for RegisterNamer<'n> {
    fn map_value(&mut self, value: &Value) -> Value {
        match value {
            Value::Local(local) if !local.is_named() => match self.names.get(&local.index) {
                Some(name) => Value::Local(LocalVar {
                    name: name.clone(),
                    ..local.clone()
                }),
                None => value.clone(),
            },
            _ => walk_map_value(self, value),
        }
    }
}

/// Build (and possibly simplify) the raw instruction list of a method body
pub fn build(body: &MethodBody, settings: Settings) -> Result<Vec<Inst>> {
    RawInstListBuilder::new(body, settings)?.build()
}
