use crate::ir::{Inst, LabelRef};
use crate::{Error, Result};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Index of an instruction in an [`InstList`]
#[derive(Copy, Clone, Hash, Eq, PartialEq, PartialOrd, Ord)]
pub struct InstRef(pub usize);

impl fmt::Debug for InstRef {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "i{}", self.0)
    }
}

impl fmt::Display for InstRef {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "i{}", self.0)
    }
}

/// Where an instruction sits in the method
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub struct Location {
    pub index: usize,

    /// Source line of the closest preceding line-number marker
    pub line_number: Option<u32>,
}

/// Raw instructions with markers stripped out
///
/// Labels resolve to the first real instruction following them. Catch ranges can end after the
/// last instruction, so a label may also resolve to `len()` (but never as a jump target).
pub struct InstList {
    insts: Vec<Inst>,
    locations: Vec<Location>,
    labels: HashMap<LabelRef, usize>,

    /// Instructions covered by the ranges of each catch instruction
    throwers: HashMap<usize, Vec<InstRef>>,
}

impl InstList {
    pub fn new(raw: Vec<Inst>) -> Result<InstList> {
        let mut insts: Vec<Inst> = Vec::with_capacity(raw.len());
        let mut locations: Vec<Location> = Vec::with_capacity(raw.len());
        let mut labels: HashMap<LabelRef, usize> = HashMap::new();
        let mut line_number: Option<u32> = None;

        for inst in raw {
            match inst {
                Inst::Label(label) => {
                    labels.insert(label, insts.len());
                }
                Inst::LineNumber { line, .. } => line_number = Some(line),
                inst => {
                    locations.push(Location {
                        index: insts.len(),
                        line_number,
                    });
                    insts.push(inst);
                }
            }
        }

        let mut list = InstList {
            insts,
            locations,
            labels,
            throwers: HashMap::new(),
        };

        // Every jump has to land on a real instruction
        for inst in &list.insts {
            for label in inst.successors() {
                list.label_target(label)?;
            }
        }

        for (index, inst) in list.insts.iter().enumerate() {
            if let Inst::Catch(catch) = inst {
                let mut seen: HashSet<usize> = HashSet::new();
                let mut throwers: Vec<InstRef> = vec![];
                for entry in &catch.entries {
                    let start = list.label_position(entry.start_inclusive)?;
                    let end = list.label_position(entry.end_exclusive)?;
                    for covered in start..end {
                        if covered != index && seen.insert(covered) {
                            throwers.push(InstRef(covered));
                        }
                    }
                }
                list.throwers.insert(index, throwers);
            }
        }

        Ok(list)
    }

    pub fn len(&self) -> usize {
        self.insts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.insts.is_empty()
    }

    pub fn inst(&self, inst: InstRef) -> &Inst {
        &self.insts[inst.0]
    }

    pub fn location(&self, inst: InstRef) -> Location {
        self.locations[inst.0]
    }

    pub fn instructions(&self) -> &[Inst] {
        &self.insts
    }

    pub fn refs(&self) -> impl Iterator<Item = InstRef> {
        (0..self.insts.len()).map(InstRef)
    }

    pub fn iter(&self) -> impl Iterator<Item = (InstRef, &Inst)> {
        self.insts
            .iter()
            .enumerate()
            .map(|(index, inst)| (InstRef(index), inst))
    }

    fn label_position(&self, label: LabelRef) -> Result<usize> {
        self.labels
            .get(&label)
            .copied()
            .ok_or_else(|| Error::UnresolvedLabel(label.to_string()))
    }

    /// Instruction a jump to this label lands on
    pub fn label_target(&self, label: LabelRef) -> Result<InstRef> {
        let position = self.label_position(label)?;
        if position < self.insts.len() {
            Ok(InstRef(position))
        } else {
            Err(Error::UnresolvedLabel(label.to_string()))
        }
    }

    /// Resolved targets of a branching instruction (empty for everything else)
    pub fn jump_targets(&self, inst: InstRef) -> Vec<InstRef> {
        self.insts[inst.0]
            .successors()
            .into_iter()
            .filter_map(|label| self.label_target(label).ok())
            .collect()
    }

    /// Instructions physically inside the ranges handled by a catch instruction
    pub fn covered_by(&self, catch: InstRef) -> &[InstRef] {
        self.throwers
            .get(&catch.0)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

impl fmt::Display for InstList {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (inst, location) in self.insts.iter().zip(&self.locations) {
            match location.line_number {
                Some(line) => writeln!(formatter, "{:>4} [{}] {}", location.index, line, inst)?,
                None => writeln!(formatter, "{:>4} {}", location.index, inst)?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ir::{CatchEntry, CatchInst, Constant, LocalVar, TypeName, Value};

    fn register(index: usize) -> Value {
        Value::from(LocalVar::generated(index, TypeName::INT))
    }

    #[test]
    fn labels_resolve_to_following_instruction() {
        let list = InstList::new(vec![
            Inst::Label(LabelRef(0)),
            Inst::LineNumber {
                line: 7,
                start: LabelRef(0),
            },
            Inst::assign(register(0), Value::from(Constant::Int(1))),
            Inst::Label(LabelRef(1)),
            Inst::Label(LabelRef(2)),
            Inst::Goto(LabelRef(1)),
        ])
        .unwrap();

        assert_eq!(list.len(), 2);
        assert_eq!(list.label_target(LabelRef(0)).unwrap(), InstRef(0));
        assert_eq!(list.label_target(LabelRef(1)).unwrap(), InstRef(1));
        assert_eq!(list.label_target(LabelRef(2)).unwrap(), InstRef(1));
        assert_eq!(list.jump_targets(InstRef(1)), vec![InstRef(1)]);
        assert_eq!(
            list.location(InstRef(1)),
            Location {
                index: 1,
                line_number: Some(7)
            }
        );
    }

    #[test]
    fn dangling_jump_is_rejected() {
        let missing = InstList::new(vec![Inst::Goto(LabelRef(4))]);
        assert!(matches!(missing, Err(Error::UnresolvedLabel(_))));

        // A label placed after the last instruction is not a valid jump target
        let past_end = InstList::new(vec![
            Inst::Goto(LabelRef(0)),
            Inst::Label(LabelRef(0)),
        ]);
        assert!(matches!(past_end, Err(Error::UnresolvedLabel(_))));
    }

    #[test]
    fn catch_coverage() {
        let throwable = Value::from(LocalVar::generated(5, TypeName::THROWABLE));
        let list = InstList::new(vec![
            Inst::Label(LabelRef(0)),
            Inst::assign(register(0), Value::from(Constant::Int(1))),
            Inst::assign(register(1), Value::from(Constant::Int(2))),
            Inst::Label(LabelRef(1)),
            Inst::Return(None),
            Inst::Label(LabelRef(2)),
            Inst::Catch(CatchInst {
                throwable: throwable.clone(),
                handler: LabelRef(2),
                entries: vec![
                    CatchEntry {
                        accepted_throwable: TypeName::THROWABLE,
                        start_inclusive: LabelRef(0),
                        end_exclusive: LabelRef(1),
                    },
                    CatchEntry {
                        accepted_throwable: TypeName::THROWABLE,
                        start_inclusive: LabelRef(0),
                        end_exclusive: LabelRef(3),
                    },
                ],
            }),
            Inst::Throw(throwable),
            Inst::Label(LabelRef(3)),
        ])
        .unwrap();

        assert_eq!(list.len(), 5);
        assert_eq!(
            list.covered_by(InstRef(3)),
            &[InstRef(0), InstRef(1), InstRef(2), InstRef(4)]
        );
        assert!(list.covered_by(InstRef(0)).is_empty());
    }
}
