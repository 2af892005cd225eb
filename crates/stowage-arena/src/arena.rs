//! The [`ByteArena`]: a single-owner, zero-initialised byte region.
//!
//! All access is bounds-checked and returns [`ArenaError::OutOfBounds`]
//! instead of touching memory outside the region. The arena is released
//! when it is dropped or explicitly via [`ByteArena::release`]; both paths
//! free the memory exactly once.

use stowage_core::MemoryLocation;
use tracing::debug;

use crate::error::ArenaError;
use crate::raw::NativeBlock;
use crate::scalar::Scalar;

enum Backing {
    Native(NativeBlock),
    Array(Vec<u8>),
}

/// A contiguous, zero-initialised byte region.
pub struct ByteArena {
    backing: Backing,
}

impl ByteArena {
    /// Allocate `len` zeroed bytes on the given medium.
    pub fn new(len: usize, location: MemoryLocation) -> Result<Self, ArenaError> {
        let backing = match location {
            MemoryLocation::Native => NativeBlock::zeroed(len)
                .map(Backing::Native)
                .ok_or(ArenaError::AllocationFailed { bytes: len })?,
            MemoryLocation::ByteArray => {
                let mut data = Vec::new();
                data.try_reserve_exact(len)
                    .map_err(|_| ArenaError::AllocationFailed { bytes: len })?;
                data.resize(len, 0);
                Backing::Array(data)
            }
        };
        debug!(bytes = len, ?location, "byte arena allocated");
        Ok(Self { backing })
    }

    /// Backing medium.
    pub fn location(&self) -> MemoryLocation {
        match self.backing {
            Backing::Native(_) => MemoryLocation::Native,
            Backing::Array(_) => MemoryLocation::ByteArray,
        }
    }

    /// Size in bytes.
    pub fn len(&self) -> usize {
        self.bytes().len()
    }

    /// Whether the arena has zero bytes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The whole region.
    pub fn bytes(&self) -> &[u8] {
        match &self.backing {
            Backing::Native(block) => block.as_slice(),
            Backing::Array(data) => data,
        }
    }

    /// The whole region, mutably.
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        match &mut self.backing {
            Backing::Native(block) => block.as_mut_slice(),
            Backing::Array(data) => data,
        }
    }

    fn range(&self, offset: usize, len: usize) -> Result<std::ops::Range<usize>, ArenaError> {
        let size = self.len();
        match offset.checked_add(len) {
            Some(end) if end <= size => Ok(offset..end),
            _ => Err(ArenaError::OutOfBounds { offset, len, size }),
        }
    }

    /// Borrow `len` bytes at `offset`.
    pub fn slice(&self, offset: usize, len: usize) -> Result<&[u8], ArenaError> {
        let range = self.range(offset, len)?;
        Ok(&self.bytes()[range])
    }

    /// Mutably borrow `len` bytes at `offset`.
    pub fn slice_mut(&mut self, offset: usize, len: usize) -> Result<&mut [u8], ArenaError> {
        let range = self.range(offset, len)?;
        Ok(&mut self.bytes_mut()[range])
    }

    /// Read a scalar at `offset`.
    pub fn get<T: Scalar>(&self, offset: usize) -> Result<T, ArenaError> {
        self.slice(offset, T::WIDTH).map(T::read)
    }

    /// Write a scalar at `offset`.
    pub fn put<T: Scalar>(&mut self, offset: usize, value: T) -> Result<(), ArenaError> {
        value.write(self.slice_mut(offset, T::WIDTH)?);
        Ok(())
    }

    /// Set `len` bytes at `offset` to `byte`.
    pub fn fill(&mut self, offset: usize, len: usize, byte: u8) -> Result<(), ArenaError> {
        self.slice_mut(offset, len)?.fill(byte);
        Ok(())
    }

    /// Zero the whole region.
    pub fn zero(&mut self) {
        self.bytes_mut().fill(0);
    }

    /// Release the memory now. Equivalent to dropping the arena; taking
    /// `self` by value makes a second release impossible.
    pub fn release(self) {
        debug!(bytes = self.len(), "byte arena released");
        drop(self);
    }
}

impl std::fmt::Debug for ByteArena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ByteArena")
            .field("location", &self.location())
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn both(len: usize) -> [ByteArena; 2] {
        [
            ByteArena::new(len, MemoryLocation::Native).unwrap(),
            ByteArena::new(len, MemoryLocation::ByteArray).unwrap(),
        ]
    }

    #[test]
    fn starts_zeroed() {
        for arena in both(256) {
            assert_eq!(arena.len(), 256);
            assert!(arena.bytes().iter().all(|&b| b == 0));
        }
    }

    #[test]
    fn reports_location() {
        let [native, array] = both(8);
        assert_eq!(native.location(), MemoryLocation::Native);
        assert_eq!(array.location(), MemoryLocation::ByteArray);
    }

    #[test]
    fn scalar_get_put() {
        for mut arena in both(32) {
            arena.put(3, 0xdead_beef_u32).unwrap();
            assert_eq!(arena.get::<u32>(3).unwrap(), 0xdead_beef);
            arena.put(24, -7i64).unwrap();
            assert_eq!(arena.get::<i64>(24).unwrap(), -7);
            assert_eq!(arena.get::<u8>(3).unwrap(), 0xef);
        }
    }

    #[test]
    fn out_of_bounds_is_error() {
        for mut arena in both(16) {
            assert_eq!(
                arena.get::<u64>(9),
                Err(ArenaError::OutOfBounds {
                    offset: 9,
                    len: 8,
                    size: 16
                })
            );
            assert!(arena.put(16, 1u8).is_err());
            assert!(arena.slice(usize::MAX, 2).is_err());
            assert!(arena.get::<u64>(8).is_ok());
        }
    }

    #[test]
    fn fill_and_zero() {
        for mut arena in both(10) {
            arena.fill(2, 5, 0xaa).unwrap();
            assert_eq!(arena.slice(0, 10).unwrap(), &[0, 0, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0, 0, 0]);
            arena.zero();
            assert!(arena.bytes().iter().all(|&b| b == 0));
            assert!(arena.fill(8, 3, 1).is_err());
        }
    }

    #[test]
    fn release_consumes() {
        for arena in both(64) {
            arena.release();
        }
    }

    #[test]
    fn empty_arena() {
        for arena in both(0) {
            assert!(arena.is_empty());
            assert!(arena.get::<u8>(0).is_err());
        }
    }
}
