//! [`RawStore`]: the untyped slot store.

use std::sync::Arc;

use stowage_arena::{ByteArena, DynamicAllocator, FreeBlock, Scalar};
use stowage_core::{ConfigError, MemoryLocation, StoreConfig, Value};
use stowage_layout::Layout;
use tracing::{debug, warn};

use crate::codec::{self, Decoder, Encoder};
use crate::error::StoreError;
use crate::sizing::Sizing;
use crate::status::{self, NULL};

/// Width of the status byte at the start of every slot.
pub const STATUS_WIDTH: usize = 1;

/// A fixed-capacity array of slots holding values of one layout.
///
/// Every slot is `[status][metadata][payload]`. Slots start out absent;
/// reading one that was never written yields `None`.
pub struct RawStore {
    layout: Arc<Layout>,
    arena: ByteArena,
    alloc: DynamicAllocator,
    sizing: Sizing,
    metadata_bytes: usize,
    scratch: Vec<u8>,
}

impl RawStore {
    /// Allocate a store for `layout`, reserving `metadata_bytes` per slot
    /// between the status byte and the payload.
    pub fn new(
        layout: Arc<Layout>,
        config: &StoreConfig,
        metadata_bytes: usize,
    ) -> Result<Self, StoreError> {
        let node_size = STATUS_WIDTH
            .checked_add(metadata_bytes)
            .and_then(|n| n.checked_add(layout.length()))
            .ok_or(ConfigError::SizeOverflow {
                capacity: config.size,
                node_size: usize::MAX,
            })?;
        let sizing = Sizing::compute(config, node_size)?;
        let mut arena = ByteArena::new(sizing.total(), config.location)?;
        let alloc = DynamicAllocator::new(&mut arena, sizing.static_size, sizing.dynamic_size)?;
        let mut store = Self {
            scratch: Vec::with_capacity(layout.length()),
            layout,
            arena,
            alloc,
            sizing,
            metadata_bytes,
        };
        store.mark_all_absent()?;
        debug!(
            layout = store.layout.name(),
            capacity = sizing.capacity,
            node_size,
            static_size = sizing.static_size,
            dynamic_size = sizing.dynamic_size,
            "store created"
        );
        Ok(store)
    }

    fn mark_all_absent(&mut self) -> Result<(), StoreError> {
        for index in 0..self.sizing.capacity {
            self.arena.put(index * self.sizing.node_size, NULL)?;
        }
        Ok(())
    }

    fn slot(&self, index: usize) -> Result<usize, StoreError> {
        if index >= self.sizing.capacity {
            return Err(StoreError::IndexOutOfBounds {
                index,
                capacity: self.sizing.capacity,
            });
        }
        Ok(index * self.sizing.node_size)
    }

    fn payload_start(&self) -> usize {
        STATUS_WIDTH + self.metadata_bytes
    }

    // ── Values ──────────────────────────────────────────────────────

    /// Whether the slot at `index` is absent.
    pub fn is_null(&self, index: usize) -> Result<bool, StoreError> {
        let slot = self.slot(index)?;
        Ok(self.arena.get::<u8>(slot)? & NULL != 0)
    }

    /// Store `value` at `index`; [`Value::Null`] makes the slot absent.
    ///
    /// The write is all or nothing: on error the slot and the dynamic
    /// segment are as they were before the call. The one exception is a
    /// replaced block that the allocator refuses to take back, which only
    /// happens on a corrupted arena: the new value is then committed and
    /// [`StoreError::Corrupt`] is returned.
    pub fn set_value(&mut self, index: usize, value: &Value) -> Result<(), StoreError> {
        if value.is_null() {
            return self.set_null(index);
        }
        let slot = self.slot(index)?;
        let payload = slot + self.payload_start();
        let old = codec::live_blocks(&self.arena, &self.layout, payload)?;

        let mut scratch = std::mem::take(&mut self.scratch);
        scratch.resize(self.layout.length(), 0);
        let mut encoder = Encoder::new(&mut self.arena, &mut self.alloc, payload);
        let retained = match encoder.encode(&self.layout, value, &mut scratch) {
            Ok(()) => encoder.commit(),
            Err(err) => {
                encoder.rollback();
                Err(err)
            }
        };
        let outcome = retained.and_then(|retained| -> Result<(), StoreError> {
            self.arena
                .slice_mut(payload, scratch.len())?
                .copy_from_slice(&scratch);
            let status = self.arena.get::<u8>(slot)?;
            self.arena.put(slot, status & !NULL)?;
            let mut leaked = false;
            for &block in old.iter().filter(|b| !retained.contains(b)) {
                if let Err(err) = self.alloc.deallocate(&mut self.arena, block) {
                    warn!(index, block, %err, "replaced dynamic block not released");
                    leaked = true;
                }
            }
            if leaked {
                return Err(StoreError::Corrupt {
                    offset: payload,
                    reason: "replaced dynamic block could not be released",
                });
            }
            Ok(())
        });
        self.scratch = scratch;
        outcome
    }

    /// Make the slot at `index` absent, releasing its dynamic blocks.
    /// Metadata and application flags are kept.
    pub fn set_null(&mut self, index: usize) -> Result<(), StoreError> {
        let slot = self.slot(index)?;
        let payload = slot + self.payload_start();
        for block in codec::live_blocks(&self.arena, &self.layout, payload)? {
            self.alloc.deallocate(&mut self.arena, block)?;
        }
        self.arena.fill(payload, self.layout.length(), 0)?;
        let status = self.arena.get::<u8>(slot)?;
        self.arena.put(slot, status | NULL)?;
        Ok(())
    }

    /// Read the value at `index`, `None` if absent.
    pub fn get_value(&self, index: usize) -> Result<Option<Value>, StoreError> {
        let mut value = Value::Null;
        Ok(self.get_value_into(index, &mut value)?.then_some(value))
    }

    /// Decode the value at `index` into `into`, reusing its buffers.
    /// Returns `false`, leaving `into` alone, if the slot is absent.
    pub fn get_value_into(&self, index: usize, into: &mut Value) -> Result<bool, StoreError> {
        if self.is_null(index)? {
            return Ok(false);
        }
        let payload = self.slot(index)? + self.payload_start();
        Decoder::new(&self.arena, &self.alloc, payload).decode(&self.layout, into)?;
        Ok(true)
    }

    // ── Raw access ──────────────────────────────────────────────────

    fn raw_offset(&self, index: usize, offset: usize, width: usize) -> Result<usize, StoreError> {
        let slot = self.slot(index)?;
        match offset.checked_add(width) {
            Some(end) if end <= self.sizing.node_size => Ok(slot + offset),
            _ => Err(StoreError::OffsetOutOfBounds {
                offset,
                width,
                node_size: self.sizing.node_size,
            }),
        }
    }

    /// Read a scalar at `offset` bytes from the start of slot `index`.
    pub fn get_scalar<T: Scalar>(&self, index: usize, offset: usize) -> Result<T, StoreError> {
        let at = self.raw_offset(index, offset, T::WIDTH)?;
        Ok(self.arena.get(at)?)
    }

    /// Write a scalar at `offset` bytes from the start of slot `index`.
    /// The status byte at offset 0 cannot be written this way.
    pub fn put_scalar<T: Scalar>(
        &mut self,
        index: usize,
        offset: usize,
        value: T,
    ) -> Result<(), StoreError> {
        if offset == 0 {
            return Err(StoreError::IllegalAccess("raw write to the status byte"));
        }
        let at = self.raw_offset(index, offset, T::WIDTH)?;
        Ok(self.arena.put(at, value)?)
    }

    // ── Flags ───────────────────────────────────────────────────────

    /// Whether every bit of `mask` is set in the status byte of `index`.
    pub fn check_flag(&self, index: usize, mask: u8) -> Result<bool, StoreError> {
        status::check_mask(mask)?;
        let slot = self.slot(index)?;
        Ok(self.arena.get::<u8>(slot)? & mask == mask)
    }

    /// Set the bits of `mask` in the status byte of `index`.
    pub fn set_flag(&mut self, index: usize, mask: u8) -> Result<(), StoreError> {
        status::check_mask(mask)?;
        let slot = self.slot(index)?;
        let status = self.arena.get::<u8>(slot)?;
        Ok(self.arena.put(slot, status | mask)?)
    }

    /// Clear the bits of `mask` in the status byte of `index`.
    pub fn unset_flag(&mut self, index: usize, mask: u8) -> Result<(), StoreError> {
        status::check_mask(mask)?;
        let slot = self.slot(index)?;
        let status = self.arena.get::<u8>(slot)?;
        Ok(self.arena.put(slot, status & !mask)?)
    }

    // ── Lifecycle ───────────────────────────────────────────────────

    /// Drop every value: zero the arena, mark all slots absent and return
    /// the dynamic segment to a single free block.
    pub fn clear(&mut self) -> Result<(), StoreError> {
        self.arena.zero();
        self.mark_all_absent()?;
        self.alloc.reset(&mut self.arena)?;
        debug!(layout = self.layout.name(), "store cleared");
        Ok(())
    }

    /// Release the arena now.
    pub fn destroy(self) {
        debug!(layout = self.layout.name(), "store destroyed");
        self.arena.release();
    }

    // ── Diagnostics ─────────────────────────────────────────────────

    /// Number of slots.
    pub fn capacity(&self) -> usize {
        self.sizing.capacity
    }

    /// Bytes per slot.
    pub fn node_size(&self) -> usize {
        self.sizing.node_size
    }

    /// Metadata bytes per slot.
    pub fn metadata_bytes(&self) -> usize {
        self.metadata_bytes
    }

    /// Offset of the payload within a slot.
    pub fn payload_offset(&self) -> usize {
        self.payload_start()
    }

    /// Size of the slot segment.
    pub fn static_size(&self) -> usize {
        self.sizing.static_size
    }

    /// Size of the dynamic segment.
    pub fn dynamic_size(&self) -> usize {
        self.sizing.dynamic_size
    }

    /// Total arena size.
    pub fn memory_bytes(&self) -> usize {
        self.arena.len()
    }

    /// Backing medium of the arena.
    pub fn location(&self) -> MemoryLocation {
        self.arena.location()
    }

    /// Layout of the stored values.
    pub fn layout(&self) -> &Arc<Layout> {
        &self.layout
    }

    /// Free blocks of the dynamic segment, in address order.
    pub fn dynamic_free_blocks(&self) -> Result<Vec<FreeBlock>, StoreError> {
        Ok(self.alloc.free_blocks(&self.arena)?)
    }

    /// Free payload bytes in the dynamic segment.
    pub fn dynamic_free_bytes(&self) -> Result<usize, StoreError> {
        Ok(self.alloc.free_bytes(&self.arena)?)
    }
}

impl std::fmt::Debug for RawStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawStore")
            .field("layout", &self.layout.name())
            .field("capacity", &self.sizing.capacity)
            .field("node_size", &self.sizing.node_size)
            .field("arena", &self.arena)
            .finish()
    }
}
