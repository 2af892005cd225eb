//! Free-list allocation over the dynamic segment of a [`ByteArena`].
//!
//! The segment `[base, base + len)` is carved into blocks:
//!
//! ```text
//! block:  [u64 size][payload: size bytes]
//! free:   [u64 size][u64 next free block][...zero...]
//! ```
//!
//! `size` excludes the header. Free blocks form a singly linked list
//! ordered by address and terminated by a zero `next`. Allocation is
//! first-fit from the head and splits oversized blocks; deallocation
//! inserts in address order and merges with adjacent free neighbours, so
//! freeing every block restores one block spanning the whole segment.
//!
//! The allocator holds only the segment bounds and the list head; block
//! metadata lives inside the arena. Every block address is a multiple of
//! [`ALIGN`] from `base`, and `base` is never zero, so `0` is free to mean
//! "no block" both here and in pointer fields that reference blocks.

use tracing::debug;

use crate::arena::ByteArena;
use crate::error::ArenaError;

/// Size of a block header in bytes.
pub const HEADER: usize = 8;

/// Block sizes are multiples of this.
pub const ALIGN: usize = 8;

/// Smallest payload a block can have: room for the `next` pointer.
pub const MIN_PAYLOAD: usize = 8;

/// A snapshot of one free block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FreeBlock {
    /// Block address (start of its header).
    pub address: usize,
    /// Payload size, excluding the header.
    pub size: usize,
}

/// First-fit, coalescing free-list allocator.
#[derive(Clone, Debug)]
pub struct DynamicAllocator {
    base: usize,
    len: usize,
    /// Address of the first free block; 0 when the list is empty.
    head: usize,
}

impl DynamicAllocator {
    /// Take over `[base, base + len)` of `arena` as one free block.
    ///
    /// A segment too short to hold a single block yields an allocator
    /// with an empty free list, on which every allocation fails.
    pub fn new(arena: &mut ByteArena, base: usize, len: usize) -> Result<Self, ArenaError> {
        let in_bounds = base
            .checked_add(len)
            .is_some_and(|end| end <= arena.len());
        if base == 0 || !in_bounds {
            return Err(ArenaError::InvalidSegment { base, len });
        }
        let mut alloc = Self { base, len, head: 0 };
        alloc.reset(arena)?;
        Ok(alloc)
    }

    /// Segment start.
    pub fn base(&self) -> usize {
        self.base
    }

    /// Segment length in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the segment has zero bytes.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Largest payload a fresh segment can hand out.
    pub fn initial_block_size(&self) -> usize {
        let payload = self.len.saturating_sub(HEADER) & !(ALIGN - 1);
        if payload >= MIN_PAYLOAD {
            payload
        } else {
            0
        }
    }

    /// Restore the single spanning free block. Payload bytes are left as
    /// they are; callers that need them zeroed zero the arena first.
    pub fn reset(&mut self, arena: &mut ByteArena) -> Result<(), ArenaError> {
        let size = self.initial_block_size();
        if size == 0 {
            self.head = 0;
            return Ok(());
        }
        arena.put(self.base, size as u64)?;
        arena.put(self.base + HEADER, 0u64)?;
        self.head = self.base;
        Ok(())
    }

    /// Start of the payload of the block at `address`.
    pub fn payload(address: usize) -> usize {
        address + HEADER
    }

    /// Payload size a request for `size` bytes is rounded up to.
    pub fn rounded_size(size: usize) -> Option<usize> {
        let size = size.max(MIN_PAYLOAD);
        size.checked_add(ALIGN - 1).map(|s| s & !(ALIGN - 1))
    }

    /// Payload size of the block at `address`.
    pub fn block_size(&self, arena: &ByteArena, address: usize) -> Result<usize, ArenaError> {
        self.check_address(address)?;
        let size = arena.get::<u64>(address)? as usize;
        let fits = address
            .checked_add(HEADER)
            .and_then(|a| a.checked_add(size))
            .is_some_and(|end| end <= self.base + self.len);
        if size < MIN_PAYLOAD || !fits {
            return Err(ArenaError::InvalidBlock { address });
        }
        Ok(size)
    }

    fn check_address(&self, address: usize) -> Result<(), ArenaError> {
        let inside = address >= self.base
            && address
                .checked_add(HEADER + MIN_PAYLOAD)
                .is_some_and(|end| end <= self.base + self.len);
        if !inside || (address - self.base) % ALIGN != 0 {
            return Err(ArenaError::InvalidBlock { address });
        }
        Ok(())
    }

    fn next_of(arena: &ByteArena, address: usize) -> Result<usize, ArenaError> {
        Ok(arena.get::<u64>(address + HEADER)? as usize)
    }

    fn set_next(&mut self, arena: &mut ByteArena, prev: usize, next: usize) -> Result<(), ArenaError> {
        if prev == 0 {
            self.head = next;
            Ok(())
        } else {
            arena.put(prev + HEADER, next as u64)
        }
    }

    /// Allocate a block with at least `size` payload bytes and return its
    /// address. The first [`MIN_PAYLOAD`] payload bytes are zeroed.
    ///
    /// Fails with [`ArenaError::OutOfDynamicMemory`] without modifying
    /// anything when no free block is large enough.
    pub fn allocate(&mut self, arena: &mut ByteArena, size: usize) -> Result<usize, ArenaError> {
        let need = Self::rounded_size(size).ok_or(ArenaError::OutOfDynamicMemory {
            requested: size,
            largest_free: 0,
        })?;
        let mut prev = 0;
        let mut cur = self.head;
        let mut largest_free = 0;
        while cur != 0 {
            let block = arena.get::<u64>(cur)? as usize;
            let next = Self::next_of(arena, cur)?;
            if block >= need {
                let replacement = match block.checked_sub(need + HEADER) {
                    Some(rest) if rest > HEADER => {
                        let split = cur + HEADER + need;
                        arena.put(split, rest as u64)?;
                        arena.put(split + HEADER, next as u64)?;
                        arena.put(cur, need as u64)?;
                        split
                    }
                    _ => next,
                };
                self.set_next(arena, prev, replacement)?;
                arena.put(cur + HEADER, 0u64)?;
                return Ok(cur);
            }
            largest_free = largest_free.max(block);
            prev = cur;
            cur = next;
        }
        debug!(requested = size, largest_free, "dynamic segment exhausted");
        Err(ArenaError::OutOfDynamicMemory {
            requested: size,
            largest_free,
        })
    }

    /// Return the block at `address` to the free list, merging it with
    /// address-adjacent free neighbours. The block is zero-filled.
    ///
    /// Rejects addresses that are outside the segment, misaligned, or
    /// already free.
    pub fn deallocate(&mut self, arena: &mut ByteArena, address: usize) -> Result<(), ArenaError> {
        let mut size = self.block_size(arena, address)?;

        let mut prev = 0;
        let mut cur = self.head;
        while cur != 0 && cur < address {
            prev = cur;
            cur = Self::next_of(arena, cur)?;
        }
        if cur == address {
            return Err(ArenaError::InvalidBlock { address });
        }
        let prev_size = if prev == 0 {
            0
        } else {
            arena.get::<u64>(prev)? as usize
        };
        let overlaps_prev = prev != 0 && prev + HEADER + prev_size > address;
        let overlaps_next = cur != 0 && address + HEADER + size > cur;
        if overlaps_prev || overlaps_next {
            return Err(ArenaError::InvalidBlock { address });
        }

        arena.fill(address, HEADER + size, 0)?;

        let mut next = cur;
        if cur != 0 && address + HEADER + size == cur {
            let cur_size = arena.get::<u64>(cur)? as usize;
            next = Self::next_of(arena, cur)?;
            arena.fill(cur, 2 * HEADER, 0)?;
            size += HEADER + cur_size;
        }

        if prev != 0 && prev + HEADER + prev_size == address {
            arena.fill(address, 2 * HEADER, 0)?;
            arena.put(prev, (prev_size + HEADER + size) as u64)?;
            arena.put(prev + HEADER, next as u64)?;
        } else {
            arena.put(address, size as u64)?;
            arena.put(address + HEADER, next as u64)?;
            self.set_next(arena, prev, address)?;
        }
        Ok(())
    }

    /// Free blocks in address order.
    pub fn free_blocks(&self, arena: &ByteArena) -> Result<Vec<FreeBlock>, ArenaError> {
        let mut blocks = Vec::new();
        let mut cur = self.head;
        while cur != 0 {
            blocks.push(FreeBlock {
                address: cur,
                size: arena.get::<u64>(cur)? as usize,
            });
            cur = Self::next_of(arena, cur)?;
        }
        Ok(blocks)
    }

    /// Total free payload bytes.
    pub fn free_bytes(&self, arena: &ByteArena) -> Result<usize, ArenaError> {
        Ok(self.free_blocks(arena)?.iter().map(|b| b.size).sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stowage_core::MemoryLocation;

    const BASE: usize = 64;

    fn setup(segment: usize) -> (ByteArena, DynamicAllocator) {
        let mut arena = ByteArena::new(BASE + segment, MemoryLocation::ByteArray).unwrap();
        let alloc = DynamicAllocator::new(&mut arena, BASE, segment).unwrap();
        (arena, alloc)
    }

    #[test]
    fn rounding() {
        assert_eq!(DynamicAllocator::rounded_size(0), Some(8));
        assert_eq!(DynamicAllocator::rounded_size(9), Some(16));
        assert_eq!(DynamicAllocator::rounded_size(16), Some(16));
        assert_eq!(DynamicAllocator::rounded_size(usize::MAX), None);
    }

    #[test]
    fn fresh_segment_is_one_block() {
        let (arena, alloc) = setup(256);
        assert_eq!(
            alloc.free_blocks(&arena).unwrap(),
            vec![FreeBlock {
                address: BASE,
                size: 248
            }]
        );
    }

    #[test]
    fn rejects_zero_base_and_overrun() {
        let mut arena = ByteArena::new(128, MemoryLocation::ByteArray).unwrap();
        assert!(matches!(
            DynamicAllocator::new(&mut arena, 0, 64),
            Err(ArenaError::InvalidSegment { .. })
        ));
        assert!(matches!(
            DynamicAllocator::new(&mut arena, 64, 65),
            Err(ArenaError::InvalidSegment { .. })
        ));
    }

    #[test]
    fn tiny_segment_has_no_blocks() {
        let (mut arena, mut alloc) = setup(12);
        assert!(alloc.free_blocks(&arena).unwrap().is_empty());
        assert!(matches!(
            alloc.allocate(&mut arena, 1),
            Err(ArenaError::OutOfDynamicMemory { .. })
        ));
    }

    #[test]
    fn allocate_splits_and_rounds() {
        let (mut arena, mut alloc) = setup(256);
        let a = alloc.allocate(&mut arena, 5).unwrap();
        assert_eq!(a, BASE);
        assert_eq!(alloc.block_size(&arena, a).unwrap(), 8);
        let b = alloc.allocate(&mut arena, 20).unwrap();
        assert_eq!(b, BASE + 16);
        assert_eq!(alloc.block_size(&arena, b).unwrap(), 24);
        assert_eq!(
            alloc.free_blocks(&arena).unwrap(),
            vec![FreeBlock {
                address: BASE + 48,
                size: 200
            }]
        );
    }

    #[test]
    fn small_remainder_is_not_split() {
        // 248-byte block; request 232 leaves 8 bytes after the new header,
        // which is not more than one header, so the block is consumed whole.
        let (mut arena, mut alloc) = setup(256);
        let a = alloc.allocate(&mut arena, 232).unwrap();
        assert_eq!(alloc.block_size(&arena, a).unwrap(), 248);
        assert!(alloc.free_blocks(&arena).unwrap().is_empty());
    }

    #[test]
    fn exhaustion_is_recoverable() {
        let (mut arena, mut alloc) = setup(64);
        let before = alloc.free_blocks(&arena).unwrap();
        let err = alloc.allocate(&mut arena, 100).unwrap_err();
        assert_eq!(
            err,
            ArenaError::OutOfDynamicMemory {
                requested: 100,
                largest_free: 56
            }
        );
        assert_eq!(alloc.free_blocks(&arena).unwrap(), before);
        assert!(alloc.allocate(&mut arena, 56).is_ok());
    }

    #[test]
    fn free_coalesces_both_sides() {
        let (mut arena, mut alloc) = setup(256);
        let a = alloc.allocate(&mut arena, 8).unwrap();
        let b = alloc.allocate(&mut arena, 8).unwrap();
        let c = alloc.allocate(&mut arena, 8).unwrap();
        let _d = alloc.allocate(&mut arena, 8).unwrap();
        alloc.deallocate(&mut arena, a).unwrap();
        alloc.deallocate(&mut arena, c).unwrap();
        assert_eq!(alloc.free_blocks(&arena).unwrap().len(), 3);
        alloc.deallocate(&mut arena, b).unwrap();
        let blocks = alloc.free_blocks(&arena).unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0], FreeBlock { address: a, size: 40 });
    }

    #[test]
    fn free_all_restores_single_block() {
        let (mut arena, mut alloc) = setup(512);
        let blocks: Vec<usize> = (1..=10)
            .map(|i| alloc.allocate(&mut arena, i * 3).unwrap())
            .collect();
        for &addr in blocks.iter().rev().step_by(2) {
            alloc.deallocate(&mut arena, addr).unwrap();
        }
        for &addr in blocks.iter().step_by(2) {
            alloc.deallocate(&mut arena, addr).unwrap();
        }
        assert_eq!(
            alloc.free_blocks(&arena).unwrap(),
            vec![FreeBlock {
                address: BASE,
                size: 504
            }]
        );
    }

    #[test]
    fn freed_block_becomes_head_when_lowest() {
        let (mut arena, mut alloc) = setup(256);
        let a = alloc.allocate(&mut arena, 8).unwrap();
        let _b = alloc.allocate(&mut arena, 8).unwrap();
        alloc.deallocate(&mut arena, a).unwrap();
        assert_eq!(alloc.free_blocks(&arena).unwrap()[0].address, a);
        assert_eq!(alloc.allocate(&mut arena, 8).unwrap(), a);
    }

    #[test]
    fn double_free_and_bad_address_rejected() {
        let (mut arena, mut alloc) = setup(256);
        let a = alloc.allocate(&mut arena, 8).unwrap();
        let _b = alloc.allocate(&mut arena, 8).unwrap();
        alloc.deallocate(&mut arena, a).unwrap();
        assert_eq!(
            alloc.deallocate(&mut arena, a),
            Err(ArenaError::InvalidBlock { address: a })
        );
        assert!(alloc.deallocate(&mut arena, BASE + 3).is_err());
        assert!(alloc.deallocate(&mut arena, 8).is_err());
    }

    #[test]
    fn deallocate_zero_fills() {
        let (mut arena, mut alloc) = setup(256);
        let a = alloc.allocate(&mut arena, 16).unwrap();
        let _b = alloc.allocate(&mut arena, 8).unwrap();
        arena.fill(DynamicAllocator::payload(a), 16, 0xff).unwrap();
        alloc.deallocate(&mut arena, a).unwrap();
        // The first payload word now holds the next-free pointer.
        let rest = arena.slice(DynamicAllocator::payload(a) + 8, 8).unwrap();
        assert!(rest.iter().all(|&b| b == 0));
    }

    #[cfg(not(miri))]
    mod proptests {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone)]
        enum Op {
            Alloc(usize),
            Free(usize),
        }

        fn op() -> impl Strategy<Value = Op> {
            prop_oneof![(1usize..120).prop_map(Op::Alloc), any::<usize>().prop_map(Op::Free)]
        }

        proptest! {
            #[test]
            fn live_blocks_never_overlap(ops in prop::collection::vec(op(), 1..200)) {
                let (mut arena, mut alloc) = setup(2048);
                let mut live: Vec<(usize, usize)> = Vec::new();
                for op in ops {
                    match op {
                        Op::Alloc(n) => {
                            if let Ok(addr) = alloc.allocate(&mut arena, n) {
                                let size = alloc.block_size(&arena, addr).unwrap();
                                prop_assert!(size >= n);
                                for &(a, s) in &live {
                                    let disjoint = addr + HEADER + size <= a || a + HEADER + s <= addr;
                                    prop_assert!(disjoint);
                                }
                                live.push((addr, size));
                            }
                        }
                        Op::Free(pick) => {
                            if !live.is_empty() {
                                let (addr, _) = live.swap_remove(pick % live.len());
                                alloc.deallocate(&mut arena, addr).unwrap();
                            }
                        }
                    }
                    let used: usize = live.iter().map(|&(_, s)| s + HEADER).sum();
                    let free: usize = alloc
                        .free_blocks(&arena)
                        .unwrap()
                        .iter()
                        .map(|b| b.size + HEADER)
                        .sum();
                    prop_assert_eq!(used + free, 2048);
                }
                for (addr, _) in live {
                    alloc.deallocate(&mut arena, addr).unwrap();
                }
                prop_assert_eq!(
                    alloc.free_blocks(&arena).unwrap(),
                    vec![FreeBlock { address: BASE, size: 2040 }]
                );
            }

            #[test]
            fn free_list_stays_sorted_and_uncoalesced(ops in prop::collection::vec(op(), 1..120)) {
                let (mut arena, mut alloc) = setup(1024);
                let mut live = Vec::new();
                for op in ops {
                    match op {
                        Op::Alloc(n) => {
                            if let Ok(addr) = alloc.allocate(&mut arena, n) {
                                live.push(addr);
                            }
                        }
                        Op::Free(pick) => {
                            if !live.is_empty() {
                                let addr = live.swap_remove(pick % live.len());
                                alloc.deallocate(&mut arena, addr).unwrap();
                            }
                        }
                    }
                    let blocks = alloc.free_blocks(&arena).unwrap();
                    for pair in blocks.windows(2) {
                        prop_assert!(pair[0].address + HEADER + pair[0].size < pair[1].address);
                    }
                }
            }
        }
    }
}
