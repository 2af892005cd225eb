//! Borrowing iteration over a [`BigList`].

use std::iter::FusedIterator;

use stowage_core::Record;

use crate::error::ListError;
use crate::list::BigList;

/// Iterator over the elements of a [`BigList`], in either direction.
///
/// Each element is decoded on demand. A decode failure is yielded once and
/// ends the iteration.
pub struct Iter<'a, R: Record> {
    list: &'a BigList<R>,
    at: Option<usize>,
    link: usize,
    remaining: usize,
}

impl<'a, R: Record> Iter<'a, R> {
    pub(crate) fn new(list: &'a BigList<R>, start: Option<usize>, link: usize) -> Self {
        Self {
            list,
            at: start,
            link,
            remaining: list.len(),
        }
    }

    fn step(&mut self) -> Result<R, ListError> {
        let slot = self
            .at
            .ok_or(ListError::IllegalState("list shorter than its length"))?;
        self.at = self.list.link(slot, self.link)?;
        self.list.read(slot)
    }
}

impl<R: Record> Iterator for Iter<'_, R> {
    type Item = Result<R, ListError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let item = self.step();
        self.remaining = if item.is_ok() { self.remaining - 1 } else { 0 };
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining))
    }
}

impl<R: Record> FusedIterator for Iter<'_, R> {}

impl<'a, R: Record> IntoIterator for &'a BigList<R> {
    type Item = Result<R, ListError>;
    type IntoIter = Iter<'a, R>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
