//! [`Cursor`]: a detached, fail-fast position within a [`BigList`].
//!
//! A cursor sits between two elements. It does not borrow the list; every
//! call takes the list explicitly so the cursor can mutate it through
//! [`remove`](Cursor::remove), [`set`](Cursor::set) and
//! [`insert`](Cursor::insert). Any structural change made to the list by
//! other means invalidates the cursor, and its next call fails with
//! [`ListError::ConcurrentModification`].

use stowage_core::Record;

use crate::error::ListError;
use crate::list::{BigList, NEXT, PREV};

/// Bidirectional position within a [`BigList`].
#[derive(Clone, Debug)]
pub struct Cursor {
    next: Option<usize>,
    next_index: usize,
    last_returned: Option<usize>,
    expected: u64,
}

const LOST: ListError = ListError::IllegalState("cursor lost its position");

impl Cursor {
    pub(crate) fn new(next: Option<usize>, next_index: usize, expected: u64) -> Self {
        Self {
            next,
            next_index,
            last_returned: None,
            expected,
        }
    }

    fn check<R: Record>(&self, list: &BigList<R>) -> Result<(), ListError> {
        if list.mod_count != self.expected {
            return Err(ListError::ConcurrentModification);
        }
        Ok(())
    }

    /// Whether [`next`](Self::next) would return an element.
    pub fn has_next<R: Record>(&self, list: &BigList<R>) -> bool {
        self.next_index < list.len()
    }

    /// Whether [`previous`](Self::previous) would return an element.
    pub fn has_previous(&self) -> bool {
        self.next_index > 0
    }

    /// Position of the element [`next`](Self::next) would return.
    pub fn next_index(&self) -> usize {
        self.next_index
    }

    /// Position of the element [`previous`](Self::previous) would return.
    pub fn previous_index(&self) -> Option<usize> {
        self.next_index.checked_sub(1)
    }

    /// Step forward, returning the element passed over. `Ok(None)` at the
    /// end.
    pub fn next<R: Record>(&mut self, list: &BigList<R>) -> Result<Option<R>, ListError> {
        self.check(list)?;
        if !self.has_next(list) {
            return Ok(None);
        }
        let slot = self.next.ok_or(LOST)?;
        let value = list.read(slot)?;
        self.next = list.link(slot, NEXT)?;
        self.last_returned = Some(slot);
        self.next_index += 1;
        Ok(Some(value))
    }

    /// Step backward, returning the element passed over. `Ok(None)` at
    /// the start.
    pub fn previous<R: Record>(&mut self, list: &BigList<R>) -> Result<Option<R>, ListError> {
        self.check(list)?;
        if !self.has_previous() {
            return Ok(None);
        }
        let slot = match self.next {
            Some(next) => list.link(next, PREV)?,
            None => list.last_slot(),
        }
        .ok_or(LOST)?;
        let value = list.read(slot)?;
        self.next = Some(slot);
        self.last_returned = Some(slot);
        self.next_index -= 1;
        Ok(Some(value))
    }

    /// Remove the element last returned by `next` or `previous`.
    pub fn remove<R: Record>(&mut self, list: &mut BigList<R>) -> Result<R, ListError> {
        self.check(list)?;
        let last = self
            .last_returned
            .ok_or(ListError::IllegalState("no current element to remove"))?;
        let after = list.link(last, NEXT)?;
        let value = list.unlink(last)?;
        if self.next == Some(last) {
            self.next = after;
        } else {
            self.next_index -= 1;
        }
        self.last_returned = None;
        self.expected = list.mod_count;
        Ok(value)
    }

    /// Replace the element last returned by `next` or `previous`.
    pub fn set<R: Record>(&mut self, list: &mut BigList<R>, value: &R) -> Result<(), ListError> {
        self.check(list)?;
        let last = self
            .last_returned
            .ok_or(ListError::IllegalState("no current element to replace"))?;
        list.overwrite(last, value)
    }

    /// Insert `value` before the cursor. A following `next` is unaffected;
    /// a following `previous` returns the new element.
    pub fn insert<R: Record>(&mut self, list: &mut BigList<R>, value: &R) -> Result<(), ListError> {
        self.check(list)?;
        self.last_returned = None;
        match self.next {
            Some(next) => list.link_before(value, next)?,
            None => list.link_at_end(value)?,
        }
        self.next_index += 1;
        self.expected = list.mod_count;
        Ok(())
    }
}
