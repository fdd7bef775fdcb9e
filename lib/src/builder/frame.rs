//! Symbolic frames: which value each local slot and operand stack entry holds

use crate::ir::{TypeName, Value};
use crate::{Error, Result};
use std::collections::HashMap;

/// Locals and operand stack at one point of the method
///
/// Locals are indexed by JVM slot. The second slot of a `long` or `double` is `None`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Frame {
    pub locals: Vec<Option<Value>>,
    pub stack: Vec<Value>,
}

impl Frame {
    pub fn put_local(&mut self, slot: usize, value: Value) {
        if self.locals.len() <= slot {
            self.locals.resize(slot + 1, None);
        }
        self.locals[slot] = Some(value);
    }

    pub fn find_local(&self, slot: usize) -> Option<&Value> {
        self.locals.get(slot).and_then(Option::as_ref)
    }

    pub fn has_local(&self, slot: usize) -> bool {
        self.find_local(slot).is_some()
    }

    /// Number of local slots tracked
    pub fn local_count(&self) -> usize {
        self.locals.len()
    }

    pub fn used_in_stack(&self, value: &Value) -> bool {
        self.stack.iter().any(|entry| entry == value)
    }

    /// Does a slot other than `slot` hold the value?
    pub fn used_in_locals(&self, value: &Value, slot: usize) -> bool {
        self.locals
            .iter()
            .enumerate()
            .any(|(i, local)| i != slot && local.as_ref() == Some(value))
    }

    pub fn trim_locals(&mut self) {
        while matches!(self.locals.last(), Some(None)) {
            self.locals.pop();
        }
    }
}

/// Stack manipulation instructions, which move values around without creating new ones
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StackShuffle {
    Pop,
    Pop2,
    Dup,
    DupX1,
    DupX2,
    Dup2,
    Dup2X1,
    Dup2X2,
    Swap,
}

/// Frame being updated by the simulation of one node
pub struct FrameBuilder {
    node: usize,
    pub frame: Frame,
}

impl FrameBuilder {
    pub fn new(node: usize, frame: Frame) -> FrameBuilder {
        FrameBuilder { node, frame }
    }

    pub fn push(&mut self, value: impl Into<Value>) {
        self.frame.stack.push(value.into());
    }

    pub fn pop(&mut self) -> Result<Value> {
        self.frame.stack.pop().ok_or(Error::EmptyStack(self.node))
    }

    /// Pop `count` values, returning them in the order they were pushed
    pub fn pop_many(&mut self, count: usize) -> Result<Vec<Value>> {
        let mut values = Vec::with_capacity(count);
        for _ in 0..count {
            values.push(self.pop()?);
        }
        values.reverse();
        Ok(values)
    }

    pub fn peek(&self) -> Result<Value> {
        self.frame
            .stack
            .last()
            .cloned()
            .ok_or(Error::EmptyStack(self.node))
    }

    pub fn local(&self, slot: usize) -> Result<Value> {
        self.frame
            .find_local(slot)
            .cloned()
            .ok_or(Error::MissingLocal {
                node: self.node,
                slot,
            })
    }

    fn push_all(&mut self, values: &[&Value]) {
        for value in values {
            self.frame.stack.push((*value).clone());
        }
    }

    /// Apply a stack shuffle
    ///
    /// The category 2 forms look at the width of the values involved: a `long` or `double`
    /// takes the place of two category 1 values.
    pub fn shuffle(&mut self, shuffle: StackShuffle) -> Result<()> {
        match shuffle {
            StackShuffle::Pop => {
                self.pop()?;
            }
            StackShuffle::Pop2 => {
                let top = self.pop()?;
                if !top.type_name().is_dword() {
                    self.pop()?;
                }
            }
            StackShuffle::Dup => {
                let top = self.peek()?;
                self.push(top);
            }
            StackShuffle::DupX1 => {
                let top = self.pop()?;
                let prev = self.pop()?;
                self.push_all(&[&top, &prev, &top]);
            }
            StackShuffle::DupX2 => {
                let v1 = self.pop()?;
                let v2 = self.pop()?;
                if v2.type_name().is_dword() {
                    self.push_all(&[&v1, &v2, &v1]);
                } else {
                    let v3 = self.pop()?;
                    self.push_all(&[&v1, &v3, &v2, &v1]);
                }
            }
            StackShuffle::Dup2 => {
                let top = self.pop()?;
                if top.type_name().is_dword() {
                    self.push_all(&[&top, &top]);
                } else {
                    let bottom = self.pop()?;
                    self.push_all(&[&bottom, &top, &bottom, &top]);
                }
            }
            StackShuffle::Dup2X1 => {
                let v1 = self.pop()?;
                if v1.type_name().is_dword() {
                    let v2 = self.pop()?;
                    self.push_all(&[&v1, &v2, &v1]);
                } else {
                    let v2 = self.pop()?;
                    let v3 = self.pop()?;
                    self.push_all(&[&v2, &v1, &v3, &v2, &v1]);
                }
            }
            StackShuffle::Dup2X2 => {
                let v1 = self.pop()?;
                if v1.type_name().is_dword() {
                    let v2 = self.pop()?;
                    if v2.type_name().is_dword() {
                        // form 4
                        self.push_all(&[&v1, &v2, &v1]);
                    } else {
                        // form 2
                        let v3 = self.pop()?;
                        self.push_all(&[&v1, &v3, &v2, &v1]);
                    }
                } else {
                    let v2 = self.pop()?;
                    let v3 = self.pop()?;
                    if v3.type_name().is_dword() {
                        // form 3
                        self.push_all(&[&v2, &v1, &v3, &v2, &v1]);
                    } else {
                        // form 1
                        let v4 = self.pop()?;
                        self.push_all(&[&v2, &v1, &v4, &v3, &v2, &v1]);
                    }
                }
            }
            StackShuffle::Swap => {
                let top = self.pop()?;
                let bottom = self.pop()?;
                self.push_all(&[&top, &bottom]);
            }
        }
        Ok(())
    }

    pub fn finish(self) -> Frame {
        self.frame
    }
}

/// Types declared by a full stack map frame
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameTypes {
    pub locals: Vec<Option<TypeName>>,
    pub stack: Vec<TypeName>,
}

impl FrameTypes {
    /// Spread types listed one per local over the slots they occupy
    pub fn from_listed(listed: Vec<TypeName>, stack: Vec<TypeName>) -> FrameTypes {
        let mut locals = vec![];
        for type_name in listed {
            let is_dword = type_name.is_dword();
            locals.push(Some(type_name));
            if is_dword {
                locals.push(None);
            }
        }
        while matches!(locals.last(), Some(None)) {
            locals.pop();
        }
        FrameTypes { locals, stack }
    }

    /// Does the frame give the slot a type other than `TOP`?
    pub fn declares(&self, slot: usize) -> bool {
        matches!(self.locals.get(slot), Some(Some(type_name)) if *type_name != TypeName::TOP)
    }

    /// `int` in a stack map frame stands for every int-like type, so it refines nothing
    fn refines(value: &Value, declared: &TypeName) -> bool {
        let is_widening = *declared == TypeName::INT
            && matches!(value, Value::Local(local) if local.type_name.is_int_like());
        matches!(value, Value::Local(local) if local.type_name != *declared)
            && !is_widening
            && *declared != TypeName::TOP
            && *declared != TypeName::NULL
            && *declared != TypeName::UNINIT_THIS
    }

    fn refine_value(
        value: &Value,
        declared: &TypeName,
        refinements: &mut HashMap<Value, Value>,
    ) -> Value {
        match value {
            Value::Local(local) if Self::refines(value, declared) => {
                let refined = Value::Local(local.with_type(declared.clone()));
                refinements.insert(value.clone(), refined.clone());
                refined
            }
            _ => value.clone(),
        }
    }

    /// Re-type the registers of a frame using the declared types
    ///
    /// Slots and stack entries not covered by the declared types are dropped. Every register
    /// that changes type is recorded in `refinements`.
    pub fn refine(&self, frame: &Frame, refinements: &mut HashMap<Value, Value>) -> Frame {
        let locals = self
            .locals
            .iter()
            .enumerate()
            .map(|(slot, declared)| {
                let declared = declared.as_ref().filter(|t| **t != TypeName::TOP)?;
                let value = frame.find_local(slot)?;
                Some(Self::refine_value(value, declared, refinements))
            })
            .collect();
        let stack = frame
            .stack
            .iter()
            .zip(self.stack.iter())
            .map(|(value, declared)| Self::refine_value(value, declared, refinements))
            .collect();

        let mut refined = Frame { locals, stack };
        refined.trim_locals();
        refined
    }
}
