//! [`BigList`]: a doubly-linked list threaded through store slots.
//!
//! Each slot carries two `i32` links in its metadata bytes:
//!
//! ```text
//! [status][next: i32][prev: i32][payload...]
//!  0       1          5          9
//! ```
//!
//! `-1` means "none". Released slots are chained through `next` in
//! ascending index order, rooted at `first_free`. Slots at or above the
//! high-water mark have never been handed out and are not on the chain.

use stowage_core::{Record, SizeType, StoreConfig, Value};
use stowage_store::Store;
use tracing::debug;

use crate::cursor::Cursor;
use crate::error::ListError;
use crate::iter::Iter;

/// Metadata bytes reserved per slot for the two links.
pub const METADATA_BYTES: usize = 8;

/// Slot offset of the forward link.
pub(crate) const NEXT: usize = 1;

/// Slot offset of the backward link.
pub(crate) const PREV: usize = 5;

const NONE: i32 = -1;

/// An ordered, double-ended sequence of `R` stored in a byte arena.
///
/// Capacity is fixed by the [`StoreConfig`]. Positional access walks the
/// links from whichever end is nearer, so it is `O(len)`; operations at
/// either end are `O(1)` apart from slot release, which keeps the free
/// chain sorted.
pub struct BigList<R: Record> {
    store: Store<R>,
    first: Option<usize>,
    last: Option<usize>,
    len: usize,
    first_free: Option<usize>,
    high_water: usize,
    pub(crate) mod_count: u64,
}

impl<R: Record> BigList<R> {
    /// Create an empty list backed by a new store.
    pub fn new(config: &StoreConfig) -> Result<Self, ListError> {
        if config.size_type == SizeType::Elements && config.size > i32::MAX as u64 {
            return Err(ListError::CapacityTooLarge {
                capacity: usize::try_from(config.size).unwrap_or(usize::MAX),
            });
        }
        let store = Store::new(config, METADATA_BYTES)?;
        let capacity = store.capacity();
        if capacity > i32::MAX as usize {
            return Err(ListError::CapacityTooLarge { capacity });
        }
        debug!(capacity, node_size = store.node_size(), "list created");
        Ok(Self {
            store,
            first: None,
            last: None,
            len: 0,
            first_free: None,
            high_water: 0,
            mod_count: 0,
        })
    }

    /// Create a list holding `items` in order.
    pub fn from_items<'a, I>(config: &StoreConfig, items: I) -> Result<Self, ListError>
    where
        R: 'a,
        I: IntoIterator<Item = &'a R>,
    {
        let mut list = Self::new(config)?;
        list.extend(items)?;
        Ok(list)
    }

    // ── Links and slots ─────────────────────────────────────────────

    pub(crate) fn link(&self, slot: usize, which: usize) -> Result<Option<usize>, ListError> {
        let raw = self.store.get_scalar::<i32>(slot, which)?;
        Ok(usize::try_from(raw).ok())
    }

    fn set_link(&mut self, slot: usize, which: usize, to: Option<usize>) -> Result<(), ListError> {
        let raw = to.map_or(NONE, |t| t as i32);
        Ok(self.store.put_scalar(slot, which, raw)?)
    }

    /// Follow a link that must exist.
    pub(crate) fn follow(&self, slot: usize, which: usize) -> Result<usize, ListError> {
        self.link(slot, which)?.ok_or(ListError::BrokenLink { slot })
    }

    pub(crate) fn read(&self, slot: usize) -> Result<R, ListError> {
        let mut value = Value::Null;
        self.store.raw().get_value_into(slot, &mut value)?;
        Ok(R::from_value(value)?)
    }

    /// Write `value` into a free slot and take it off the free chain. The
    /// write happens first so a failed write consumes nothing.
    fn acquire(&mut self, value: &R) -> Result<usize, ListError> {
        let slot = match self.first_free {
            Some(slot) => slot,
            None if self.high_water < self.capacity() => self.high_water,
            None => {
                return Err(ListError::Full {
                    capacity: self.capacity(),
                })
            }
        };
        self.store.set(slot, Some(value))?;
        if self.first_free == Some(slot) {
            self.first_free = self.link(slot, NEXT)?;
        } else {
            self.high_water += 1;
        }
        Ok(slot)
    }

    /// Clear `slot` and insert it into the free chain in index order.
    fn release(&mut self, slot: usize) -> Result<(), ListError> {
        self.store.set(slot, None)?;
        self.set_link(slot, PREV, None)?;
        match self.first_free {
            Some(head) if head < slot => {
                let mut at = head;
                while let Some(next) = self.link(at, NEXT)?.filter(|&n| n < slot) {
                    at = next;
                }
                let after = self.link(at, NEXT)?;
                self.set_link(slot, NEXT, after)?;
                self.set_link(at, NEXT, Some(slot))?;
            }
            head => {
                self.set_link(slot, NEXT, head)?;
                self.first_free = Some(slot);
            }
        }
        Ok(())
    }

    /// Slot of the element at `index`, walking from the nearer end.
    fn node(&self, index: usize) -> Result<usize, ListError> {
        if index < self.len / 2 {
            let mut slot = self.first.ok_or(ListError::Empty)?;
            for _ in 0..index {
                slot = self.follow(slot, NEXT)?;
            }
            Ok(slot)
        } else {
            let mut slot = self.last.ok_or(ListError::Empty)?;
            for _ in index + 1..self.len {
                slot = self.follow(slot, PREV)?;
            }
            Ok(slot)
        }
    }

    fn check_element_index(&self, index: usize) -> Result<(), ListError> {
        if index >= self.len {
            return Err(ListError::IndexOutOfBounds {
                index,
                len: self.len,
            });
        }
        Ok(())
    }

    fn check_position_index(&self, index: usize) -> Result<(), ListError> {
        if index > self.len {
            return Err(ListError::IndexOutOfBounds {
                index,
                len: self.len,
            });
        }
        Ok(())
    }

    fn check_room(&self, extra: usize) -> Result<(), ListError> {
        if self.len + extra > self.capacity() {
            return Err(ListError::Full {
                capacity: self.capacity(),
            });
        }
        Ok(())
    }

    // ── Linking ─────────────────────────────────────────────────────

    fn link_first(&mut self, value: &R) -> Result<(), ListError> {
        self.check_room(1)?;
        let slot = self.acquire(value)?;
        let old = self.first;
        self.set_link(slot, NEXT, old)?;
        self.set_link(slot, PREV, None)?;
        match old {
            Some(f) => self.set_link(f, PREV, Some(slot))?,
            None => self.last = Some(slot),
        }
        self.first = Some(slot);
        self.len += 1;
        self.mod_count += 1;
        Ok(())
    }

    fn link_last(&mut self, value: &R) -> Result<(), ListError> {
        self.check_room(1)?;
        let slot = self.acquire(value)?;
        let old = self.last;
        self.set_link(slot, NEXT, None)?;
        self.set_link(slot, PREV, old)?;
        match old {
            Some(l) => self.set_link(l, NEXT, Some(slot))?,
            None => self.first = Some(slot),
        }
        self.last = Some(slot);
        self.len += 1;
        self.mod_count += 1;
        Ok(())
    }

    /// Insert `value` in front of the element in slot `succ`.
    pub(crate) fn link_before(&mut self, value: &R, succ: usize) -> Result<(), ListError> {
        self.check_room(1)?;
        let slot = self.acquire(value)?;
        let pred = self.link(succ, PREV)?;
        self.set_link(slot, NEXT, Some(succ))?;
        self.set_link(slot, PREV, pred)?;
        self.set_link(succ, PREV, Some(slot))?;
        match pred {
            Some(p) => self.set_link(p, NEXT, Some(slot))?,
            None => self.first = Some(slot),
        }
        self.len += 1;
        self.mod_count += 1;
        Ok(())
    }

    pub(crate) fn link_at_end(&mut self, value: &R) -> Result<(), ListError> {
        self.link_last(value)
    }

    /// Detach the element in `slot` and return it.
    pub(crate) fn unlink(&mut self, slot: usize) -> Result<R, ListError> {
        let value = self.read(slot)?;
        let next = self.link(slot, NEXT)?;
        let prev = self.link(slot, PREV)?;
        match prev {
            Some(p) => self.set_link(p, NEXT, next)?,
            None => self.first = next,
        }
        match next {
            Some(n) => self.set_link(n, PREV, prev)?,
            None => self.last = prev,
        }
        self.release(slot)?;
        self.len -= 1;
        self.mod_count += 1;
        Ok(value)
    }

    // ── Size ────────────────────────────────────────────────────────

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the list has no elements.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Maximum number of elements.
    pub fn capacity(&self) -> usize {
        self.store.capacity()
    }

    /// Whether every slot is in use.
    pub fn is_full(&self) -> bool {
        self.len >= self.capacity()
    }

    // ── Insertion ───────────────────────────────────────────────────

    /// Append `value`. Fails with [`ListError::Full`] at capacity.
    pub fn push_back(&mut self, value: &R) -> Result<(), ListError> {
        self.link_last(value)
    }

    /// Prepend `value`. Fails with [`ListError::Full`] at capacity.
    pub fn push_front(&mut self, value: &R) -> Result<(), ListError> {
        self.link_first(value)
    }

    /// Insert `value` so that it ends up at position `index`.
    pub fn insert(&mut self, index: usize, value: &R) -> Result<(), ListError> {
        self.check_position_index(index)?;
        if index == self.len {
            self.link_last(value)
        } else {
            let succ = self.node(index)?;
            self.link_before(value, succ)
        }
    }

    /// Insert every item, in order, starting at position `index`. Returns
    /// `false` if there was nothing to insert.
    ///
    /// Capacity is checked for the whole batch up front. If a write fails
    /// part way, the slots taken so far are released and the list is left
    /// as it was.
    pub fn insert_all<'a, I>(&mut self, index: usize, items: I) -> Result<bool, ListError>
    where
        R: 'a,
        I: IntoIterator<Item = &'a R>,
    {
        self.check_position_index(index)?;
        let items: Vec<&R> = items.into_iter().collect();
        if items.is_empty() {
            return Ok(false);
        }
        self.check_room(items.len())?;

        let (pred, succ) = if index == self.len {
            (self.last, None)
        } else {
            let succ = self.node(index)?;
            (self.link(succ, PREV)?, Some(succ))
        };

        let mut batch = Vec::with_capacity(items.len());
        for item in items {
            match self.acquire(item) {
                Ok(slot) => batch.push(slot),
                Err(err) => {
                    for slot in batch {
                        self.release(slot)?;
                    }
                    return Err(err);
                }
            }
        }
        for pair in batch.windows(2) {
            self.set_link(pair[0], NEXT, Some(pair[1]))?;
            self.set_link(pair[1], PREV, Some(pair[0]))?;
        }

        let (head, tail) = match (batch.first(), batch.last()) {
            (Some(&h), Some(&t)) => (h, t),
            _ => return Ok(false),
        };
        self.set_link(head, PREV, pred)?;
        self.set_link(tail, NEXT, succ)?;
        match pred {
            Some(p) => self.set_link(p, NEXT, Some(head))?,
            None => self.first = Some(head),
        }
        match succ {
            Some(s) => self.set_link(s, PREV, Some(tail))?,
            None => self.last = Some(tail),
        }
        self.len += batch.len();
        self.mod_count += 1;
        Ok(true)
    }

    /// Append every item in order.
    pub fn extend<'a, I>(&mut self, items: I) -> Result<bool, ListError>
    where
        R: 'a,
        I: IntoIterator<Item = &'a R>,
    {
        self.insert_all(self.len, items)
    }

    /// Append unless full. Returns whether the value was added.
    pub fn offer(&mut self, value: &R) -> Result<bool, ListError> {
        self.offer_back(value)
    }

    /// Prepend unless full. Returns whether the value was added.
    pub fn offer_front(&mut self, value: &R) -> Result<bool, ListError> {
        if self.is_full() {
            return Ok(false);
        }
        self.link_first(value)?;
        Ok(true)
    }

    /// Append unless full. Returns whether the value was added.
    pub fn offer_back(&mut self, value: &R) -> Result<bool, ListError> {
        if self.is_full() {
            return Ok(false);
        }
        self.link_last(value)?;
        Ok(true)
    }

    /// Stack push: same as [`push_front`](Self::push_front).
    pub fn push(&mut self, value: &R) -> Result<(), ListError> {
        self.link_first(value)
    }

    // ── Removal ─────────────────────────────────────────────────────

    /// Remove and return the element at `index`.
    pub fn remove(&mut self, index: usize) -> Result<R, ListError> {
        self.check_element_index(index)?;
        let slot = self.node(index)?;
        self.unlink(slot)
    }

    /// Remove and return the first element; [`ListError::Empty`] if none.
    pub fn remove_first(&mut self) -> Result<R, ListError> {
        let slot = self.first.ok_or(ListError::Empty)?;
        self.unlink(slot)
    }

    /// Remove and return the last element; [`ListError::Empty`] if none.
    pub fn remove_last(&mut self) -> Result<R, ListError> {
        let slot = self.last.ok_or(ListError::Empty)?;
        self.unlink(slot)
    }

    /// Remove and return the first element, if any.
    pub fn pop_front(&mut self) -> Result<Option<R>, ListError> {
        match self.first {
            Some(slot) => self.unlink(slot).map(Some),
            None => Ok(None),
        }
    }

    /// Remove and return the last element, if any.
    pub fn pop_back(&mut self) -> Result<Option<R>, ListError> {
        match self.last {
            Some(slot) => self.unlink(slot).map(Some),
            None => Ok(None),
        }
    }

    /// Queue poll: same as [`pop_front`](Self::pop_front).
    pub fn poll(&mut self) -> Result<Option<R>, ListError> {
        self.pop_front()
    }

    /// Stack pop: same as [`remove_first`](Self::remove_first).
    pub fn pop(&mut self) -> Result<R, ListError> {
        self.remove_first()
    }

    // ── Access ──────────────────────────────────────────────────────

    /// The element at `index`.
    pub fn get(&self, index: usize) -> Result<R, ListError> {
        self.check_element_index(index)?;
        self.read(self.node(index)?)
    }

    /// Replace the element at `index`, returning the old one.
    pub fn set(&mut self, index: usize, value: &R) -> Result<R, ListError> {
        self.check_element_index(index)?;
        let slot = self.node(index)?;
        let old = self.read(slot)?;
        self.store.set(slot, Some(value))?;
        Ok(old)
    }

    pub(crate) fn overwrite(&mut self, slot: usize, value: &R) -> Result<(), ListError> {
        Ok(self.store.set(slot, Some(value))?)
    }

    /// The first element; [`ListError::Empty`] if none.
    pub fn first(&self) -> Result<R, ListError> {
        self.read(self.first.ok_or(ListError::Empty)?)
    }

    /// The last element; [`ListError::Empty`] if none.
    pub fn last(&self) -> Result<R, ListError> {
        self.read(self.last.ok_or(ListError::Empty)?)
    }

    /// Queue head: same as [`first`](Self::first).
    pub fn element(&self) -> Result<R, ListError> {
        self.first()
    }

    /// The first element, if any.
    pub fn peek_front(&self) -> Result<Option<R>, ListError> {
        self.first.map(|slot| self.read(slot)).transpose()
    }

    /// The last element, if any.
    pub fn peek_back(&self) -> Result<Option<R>, ListError> {
        self.last.map(|slot| self.read(slot)).transpose()
    }

    /// Queue peek: same as [`peek_front`](Self::peek_front).
    pub fn peek(&self) -> Result<Option<R>, ListError> {
        self.peek_front()
    }

    /// All elements, first to last.
    pub fn to_vec(&self) -> Result<Vec<R>, ListError> {
        self.iter().collect()
    }

    // ── Iteration ───────────────────────────────────────────────────

    /// Iterate first to last.
    pub fn iter(&self) -> Iter<'_, R> {
        Iter::new(self, self.first, NEXT)
    }

    /// Iterate last to first.
    pub fn iter_rev(&self) -> Iter<'_, R> {
        Iter::new(self, self.last, PREV)
    }

    /// A cursor positioned before the element at `index`.
    pub fn cursor(&self, index: usize) -> Result<Cursor, ListError> {
        self.check_position_index(index)?;
        let next = if index == self.len {
            None
        } else {
            Some(self.node(index)?)
        };
        Ok(Cursor::new(next, index, self.mod_count))
    }

    /// A cursor positioned before the first element.
    pub fn cursor_front(&self) -> Cursor {
        Cursor::new(self.first, 0, self.mod_count)
    }

    /// A cursor positioned after the last element.
    pub fn cursor_back(&self) -> Cursor {
        Cursor::new(None, self.len, self.mod_count)
    }

    pub(crate) fn last_slot(&self) -> Option<usize> {
        self.last
    }

    // ── Search ──────────────────────────────────────────────────────

    /// Position and slot of the first (or last) element equal to `needle`.
    ///
    /// The needle is converted once; every slot is decoded into the same
    /// scratch value.
    fn find(&self, needle: &R, forward: bool) -> Result<Option<(usize, usize)>, ListError> {
        let needle = needle.to_value();
        let mut scratch = Value::Null;
        let (mut at, which) = if forward {
            (self.first, NEXT)
        } else {
            (self.last, PREV)
        };
        let mut index = if forward { 0 } else { self.len };
        while let Some(slot) = at {
            if !forward {
                index = index
                    .checked_sub(1)
                    .ok_or(ListError::BrokenLink { slot })?;
            }
            if !self.store.raw().get_value_into(slot, &mut scratch)? {
                scratch = Value::Null;
            }
            if scratch == needle {
                return Ok(Some((index, slot)));
            }
            if forward {
                index += 1;
            }
            at = self.link(slot, which)?;
        }
        Ok(None)
    }

    /// Whether any element equals `needle`.
    pub fn contains(&self, needle: &R) -> Result<bool, ListError> {
        Ok(self.find(needle, true)?.is_some())
    }

    /// Position of the first element equal to `needle`.
    pub fn index_of(&self, needle: &R) -> Result<Option<usize>, ListError> {
        Ok(self.find(needle, true)?.map(|(index, _)| index))
    }

    /// Position of the last element equal to `needle`.
    pub fn last_index_of(&self, needle: &R) -> Result<Option<usize>, ListError> {
        Ok(self.find(needle, false)?.map(|(index, _)| index))
    }

    /// Remove the first element equal to `needle`. Returns whether one was
    /// found.
    pub fn remove_item(&mut self, needle: &R) -> Result<bool, ListError> {
        match self.find(needle, true)? {
            Some((_, slot)) => self.unlink(slot).map(|_| true),
            None => Ok(false),
        }
    }

    /// Remove the last element equal to `needle`. Returns whether one was
    /// found.
    pub fn remove_last_occurrence(&mut self, needle: &R) -> Result<bool, ListError> {
        match self.find(needle, false)? {
            Some((_, slot)) => self.unlink(slot).map(|_| true),
            None => Ok(false),
        }
    }

    // ── Lifecycle ───────────────────────────────────────────────────

    /// Remove every element and reset the store.
    pub fn clear(&mut self) -> Result<(), ListError> {
        self.store.clear()?;
        self.first = None;
        self.last = None;
        self.len = 0;
        self.first_free = None;
        self.high_water = 0;
        self.mod_count += 1;
        debug!(capacity = self.capacity(), "list cleared");
        Ok(())
    }

    /// Release the underlying store now.
    pub fn destroy(self) {
        self.store.destroy();
    }

    /// The store holding the elements.
    pub fn store(&self) -> &Store<R> {
        &self.store
    }
}

impl<R: Record> std::fmt::Debug for BigList<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BigList")
            .field("len", &self.len)
            .field("capacity", &self.capacity())
            .field("first", &self.first)
            .field("last", &self.last)
            .field("first_free", &self.first_free)
            .field("high_water", &self.high_water)
            .finish()
    }
}
