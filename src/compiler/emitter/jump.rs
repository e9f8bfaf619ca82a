//! The runtime side of union conversion.
//!
//! Which member of a union is live cannot be known from the declarations, so
//! the descriptor table only records a jump table slot for each union.  A
//! program that converts values registers one [`UnionConverter`] per slot;
//! the registry is built from the slots the emitter reported so that every
//! index matches the table.

use super::{EmitError, EmitResult, JumpSlot};
use crate::err;

/// Decides which member of a union a value holds.
pub trait UnionConverter {
    /// Returns the index of the active member for the union bytes in `value`,
    /// or `None` if no member applies.
    fn active_member(&self, value: &[u8]) -> Option<usize>;
}

impl<F> UnionConverter for F
where
    F: Fn(&[u8]) -> Option<usize>,
{
    fn active_member(&self, value: &[u8]) -> Option<usize> {
        self(value)
    }
}

pub struct ConverterRegistry {
    slots: Vec<(String, Option<Box<dyn UnionConverter>>)>,
}

impl ConverterRegistry {
    pub fn new(slots: &[JumpSlot]) -> ConverterRegistry {
        let mut ordered: Vec<&JumpSlot> = slots.iter().collect();
        ordered.sort_by_key(|s| s.index);
        ConverterRegistry {
            slots: ordered.into_iter().map(|s| (s.union.clone(), None)).collect(),
        }
    }

    pub fn register(&mut self, index: u32, converter: Box<dyn UnionConverter>) -> EmitResult<()> {
        match self.slots.get_mut(index as usize) {
            Some(slot) => {
                slot.1 = Some(converter);
                Ok(())
            }
            None => err!(0, EmitError::UnknownJumpSlot(index)),
        }
    }

    /// Registers a converter by the name of the union it serves.
    pub fn register_union(&mut self, union: &str, converter: Box<dyn UnionConverter>) -> EmitResult<()> {
        match self.slots.iter().position(|(name, _)| name == union) {
            Some(index) => self.register(index as u32, converter),
            None => err!(0, EmitError::UnknownUnion(union.into())),
        }
    }

    pub fn get(&self, index: u32) -> Option<&dyn UnionConverter> {
        self.slots
            .get(index as usize)
            .and_then(|(_, c)| c.as_deref())
    }

    /// Names of the unions that still have no converter.
    pub fn unresolved(&self) -> Vec<&str> {
        self.slots
            .iter()
            .filter(|(_, c)| c.is_none())
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
