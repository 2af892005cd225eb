//! Raw zero-initialised allocations backing native arenas.
//!
//! The only `unsafe` in the workspace. Every block is allocated with
//! `alloc_zeroed`, exposed solely as a byte slice of its exact length,
//! and freed exactly once by `Drop`.

#![allow(unsafe_code)]

use std::alloc::{self, Layout};
use std::ptr::NonNull;
use std::slice;

/// Alignment of native blocks. Scalar access is unaligned, so this only
/// keeps the allocator on its fast path.
const BLOCK_ALIGN: usize = 16;

/// An owned, zero-initialised byte allocation.
pub(crate) struct NativeBlock {
    ptr: NonNull<u8>,
    len: usize,
}

// SAFETY: `NativeBlock` uniquely owns its allocation, like `Box<[u8]>`.
unsafe impl Send for NativeBlock {}

impl NativeBlock {
    /// Allocate `len` zeroed bytes, or `None` if the allocator refuses.
    pub(crate) fn zeroed(len: usize) -> Option<Self> {
        if len == 0 {
            return Some(Self {
                ptr: NonNull::dangling(),
                len: 0,
            });
        }
        let layout = Layout::from_size_align(len, BLOCK_ALIGN).ok()?;
        // SAFETY: `layout` has non-zero size (checked above).
        let ptr = unsafe { alloc::alloc_zeroed(layout) };
        NonNull::new(ptr).map(|ptr| Self { ptr, len })
    }

    pub(crate) fn as_slice(&self) -> &[u8] {
        // SAFETY: `ptr` is valid for `len` initialised bytes (zeroed at
        // allocation, only written through `as_mut_slice`), or dangling
        // with `len == 0`. The borrow ties the slice to `self`.
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: as in `as_slice`; `&mut self` guarantees exclusivity.
        unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl Drop for NativeBlock {
    fn drop(&mut self) {
        if self.len == 0 {
            return;
        }
        if let Ok(layout) = Layout::from_size_align(self.len, BLOCK_ALIGN) {
            // SAFETY: `ptr` came from `alloc_zeroed` with this exact layout
            // and is freed only here.
            unsafe { alloc::dealloc(self.ptr.as_ptr(), layout) };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zeroed_and_writable() {
        let mut block = NativeBlock::zeroed(4096).unwrap();
        assert!(block.as_slice().iter().all(|&b| b == 0));
        block.as_mut_slice()[4095] = 9;
        assert_eq!(block.as_slice()[4095], 9);
        assert_eq!(block.as_slice().len(), 4096);
    }

    #[test]
    fn empty_block() {
        let block = NativeBlock::zeroed(0).unwrap();
        assert!(block.as_slice().is_empty());
    }

    #[test]
    fn absurd_size_is_refused() {
        assert!(NativeBlock::zeroed(usize::MAX).is_none());
    }
}
