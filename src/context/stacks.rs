//! Slots and nesting stacks
//!
//! A [`Slot`] holds the one entity currently being built at a given level
//! (part, staff, voice, measure). It is overwritten rather than stacked,
//! since the source never nests two of them.
//!
//! A [`NestingStack`] holds scopes that do nest, like tuplets inside tuplets
//! or part groups inside part groups. New members go to the top; closing the
//! top either nests it in the scope below or hands it back to the caller when
//! it was the outermost one.

use crate::errors::Result;
use crate::msr::part_group::PartGroup;
use crate::msr::tuplet::Tuplet;

// ============================================================================
// SLOT
// ============================================================================

/// Single-entity holder with fatal errors on missing contents
#[derive(Debug, Clone)]
pub struct Slot<T> {
    what: &'static str,
    value: Option<T>,
}

impl<T> Slot<T> {
    pub fn new(what: &'static str) -> Self {
        Self { what, value: None }
    }

    /// Store `value`, returning what was there before
    pub fn set(&mut self, value: T) -> Option<T> {
        self.value.replace(value)
    }

    pub fn is_set(&self) -> bool {
        self.value.is_some()
    }

    pub fn get(&self, input_line: u32) -> Result<&T> {
        match &self.value {
            Some(value) => Ok(value),
            None => Err(internal_error!(input_line, "no current {}", self.what)),
        }
    }

    pub fn get_mut(&mut self, input_line: u32) -> Result<&mut T> {
        match &mut self.value {
            Some(value) => Ok(value),
            None => Err(internal_error!(input_line, "no current {}", self.what)),
        }
    }

    /// Remove the contents; an empty slot is a structural error
    pub fn take(&mut self, input_line: u32) -> Result<T> {
        match self.value.take() {
            Some(value) => Ok(value),
            None => Err(internal_error!(input_line, "no current {} to close", self.what)),
        }
    }

    pub fn as_ref(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn as_mut(&mut self) -> Option<&mut T> {
        self.value.as_mut()
    }

    pub fn clear(&mut self) -> Option<T> {
        self.value.take()
    }
}

// ============================================================================
// NESTING STACK
// ============================================================================

/// Scopes that can contain scopes of their own kind
pub trait Nest {
    /// Name used in messages
    const KIND: &'static str;

    /// Append a closed inner scope to this one
    fn nest(&mut self, inner: Self);
}

impl Nest for Tuplet {
    const KIND: &'static str = "tuplet";

    fn nest(&mut self, inner: Self) {
        self.add_tuplet(inner);
    }
}

impl Nest for PartGroup {
    const KIND: &'static str = "part group";

    fn nest(&mut self, inner: Self) {
        self.append_sub_group(inner);
    }
}

/// LIFO of open scopes
#[derive(Debug, Clone)]
pub struct NestingStack<T> {
    items: Vec<T>,
}

impl<T> Default for NestingStack<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T: Nest> NestingStack<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, item: T) {
        log::trace!("opening {} at depth {}", T::KIND, self.items.len() + 1);
        self.items.push(item);
    }

    pub fn depth(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn top(&self) -> Option<&T> {
        self.items.last()
    }

    pub fn top_mut(&mut self) -> Option<&mut T> {
        self.items.last_mut()
    }

    /// Innermost open scope, or a structural error
    pub fn require_top(&mut self, input_line: u32) -> Result<&mut T> {
        match self.items.last_mut() {
            Some(top) => Ok(top),
            None => Err(internal_error!(input_line, "no open {}", T::KIND)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    /// Close the innermost scope.
    ///
    /// Returns `Some` only for the outermost scope, which the caller appends
    /// where it belongs; inner scopes are nested in the new top.
    pub fn close(&mut self, input_line: u32) -> Result<Option<T>> {
        let Some(closed) = self.items.pop() else {
            return Err(internal_error!(
                input_line,
                "{} end without a matching start",
                T::KIND
            ));
        };

        match self.items.last_mut() {
            Some(enclosing) => {
                enclosing.nest(closed);
                Ok(None)
            }
            None => Ok(Some(closed)),
        }
    }

    /// Close every open scope, returning the outermost one
    pub fn close_all(&mut self, input_line: u32) -> Result<Option<T>> {
        let mut outermost = None;
        while !self.items.is_empty() {
            outermost = self.close(input_line)?;
        }
        Ok(outermost)
    }

    /// Drop the scopes opened above `depth`
    pub fn truncate(&mut self, depth: usize) {
        if self.items.len() > depth {
            log::debug!(
                "discarding {} open {} scope(s)",
                self.items.len() - depth,
                T::KIND
            );
            self.items.truncate(depth);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::msr::basics::Pitch;
    use crate::msr::note::{Note, NoteContent};
    use crate::msr::Rational;

    fn eighth(ordinal: u32) -> Note {
        Note::new(
            ordinal,
            NoteContent::Pitched(Pitch::new(0, 0, 4).unwrap()),
            Rational::new(1, 12),
            ordinal,
        )
    }

    #[test]
    fn test_tuplet_stack_nests_and_empties() {
        let mut stack: NestingStack<Tuplet> = NestingStack::new();
        stack.push(Tuplet::new(1, 3, 2, 1));
        stack.require_top(1).unwrap().add_note(eighth(1));
        stack.push(Tuplet::new(2, 3, 2, 2));
        stack.require_top(2).unwrap().add_note(eighth(2));

        assert!(stack.close(3).unwrap().is_none(), "inner tuplet nests");
        assert_eq!(stack.depth(), 1);

        let outer = stack.close(4).unwrap().expect("outermost tuplet is returned");
        assert_eq!(outer.elements.len(), 2);
        assert!(stack.is_empty(), "stack must be empty after the outermost end");
    }

    #[test]
    fn test_close_on_empty_stack_is_fatal() {
        let mut stack: NestingStack<Tuplet> = NestingStack::new();
        let err = stack.close(42).unwrap_err();
        assert!(err.is_internal());
        assert_eq!(err.line(), Some(42));
    }

    #[test]
    fn test_part_groups_nest() {
        let mut stack: NestingStack<PartGroup> = NestingStack::new();
        stack.push(PartGroup::implicit(1));
        stack.push(PartGroup::new(1, 1, 2));
        assert!(stack.close(3).unwrap().is_none());
        let implicit = stack.close_all(4).unwrap().unwrap();
        assert_eq!(implicit.elements.len(), 1);
    }

    #[test]
    fn test_slot() {
        let mut slot: Slot<u32> = Slot::new("measure");
        assert!(slot.get(5).is_err());
        slot.set(3);
        *slot.get_mut(6).unwrap() += 1;
        assert_eq!(slot.take(7).unwrap(), 4);
        assert!(slot.take(8).unwrap_err().is_internal());
    }
}
