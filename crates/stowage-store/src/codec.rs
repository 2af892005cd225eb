//! Encoding [`Value`]s into slot payloads and decoding them back.
//!
//! Encoding goes into a zeroed scratch buffer the size of the layout, so a
//! failed write never touches the slot. Dynamic strings are the only part
//! that reaches outside the buffer: fresh blocks are allocated and filled
//! immediately and released again on [`Encoder::rollback`], while blocks
//! reused in place are only rewritten on [`Encoder::commit`].

use smallvec::SmallVec;
use stowage_arena::{ArenaError, ByteArena, DynamicAllocator, Scalar};
use stowage_core::{Primitive, Value, ValueError};
use stowage_layout::layout::{ABSENT_LENGTH, COUNT_WIDTH, NULL_FLAG};
use stowage_layout::{ElementLayout, ElementShape, FieldKind, FieldLayout, Layout, LayoutShape};
use tracing::{trace, warn};

use crate::error::StoreError;

fn put<T: Scalar>(out: &mut [u8], at: usize, value: T) {
    value.write(&mut out[at..at + T::WIDTH]);
}

fn expected(field: &FieldLayout) -> String {
    match &field.kind {
        FieldKind::Primitive(p) => format!("{p} for field '{}'", field.name),
        kind => format!("{} for field '{}'", kind.name(), field.name),
    }
}

fn put_primitive(
    primitive: Primitive,
    value: &Value,
    out: &mut [u8],
    at: usize,
) -> Result<(), StoreError> {
    match (primitive, value) {
        (Primitive::Bool, Value::Bool(v)) => put(out, at, *v),
        (Primitive::I8, Value::I8(v)) => put(out, at, *v),
        (Primitive::U8, Value::U8(v)) => put(out, at, *v),
        (Primitive::I16, Value::I16(v)) => put(out, at, *v),
        (Primitive::U16, Value::U16(v)) => put(out, at, *v),
        (Primitive::I32, Value::I32(v)) => put(out, at, *v),
        (Primitive::U32, Value::U32(v)) => put(out, at, *v),
        (Primitive::F32, Value::F32(v)) => put(out, at, *v),
        (Primitive::Char, Value::Char(v)) => put(out, at, u32::from(*v)),
        (Primitive::I64, Value::I64(v)) => put(out, at, *v),
        (Primitive::U64, Value::U64(v)) => put(out, at, *v),
        (Primitive::F64, Value::F64(v)) => put(out, at, *v),
        _ => return Err(ValueError::mismatch(primitive.name(), value).into()),
    }
    Ok(())
}

/// Write `text` as UTF-16 into a fixed string of `capacity` code units,
/// truncating at a character boundary.
fn put_fixed_string(text: &str, capacity: u32, out: &mut [u8], at: usize) {
    let capacity = capacity as usize;
    let first = at + COUNT_WIDTH;
    let mut units = 0;
    let mut buf = [0u16; 2];
    for ch in text.chars() {
        let encoded = ch.encode_utf16(&mut buf);
        if units + encoded.len() > capacity {
            trace!(capacity, "fixed string truncated");
            break;
        }
        for &unit in encoded.iter() {
            put(out, first + units * 2, unit);
            units += 1;
        }
    }
    put(out, at, units as i32);
}

/// Fill the payload of a text block: `[u32 len][utf-8 bytes][zero...]`.
fn write_text(
    arena: &mut ByteArena,
    block: usize,
    size: usize,
    text: &str,
) -> Result<(), ArenaError> {
    let payload = arena.slice_mut(DynamicAllocator::payload(block), size)?;
    let (len, rest) = payload.split_at_mut(COUNT_WIDTH);
    (text.len() as u32).write(len);
    rest[..text.len()].copy_from_slice(text.as_bytes());
    rest[text.len()..].fill(0);
    Ok(())
}

struct Reuse<'v> {
    block: usize,
    size: usize,
    text: &'v str,
}

/// One in-flight write of a value into a slot.
pub(crate) struct Encoder<'a, 'v> {
    arena: &'a mut ByteArena,
    alloc: &'a mut DynamicAllocator,
    /// Arena offset of the payload currently stored in the target slot.
    current: usize,
    fresh: SmallVec<[usize; 4]>,
    reused: SmallVec<[Reuse<'v>; 4]>,
}

impl<'a, 'v> Encoder<'a, 'v> {
    pub(crate) fn new(
        arena: &'a mut ByteArena,
        alloc: &'a mut DynamicAllocator,
        current: usize,
    ) -> Self {
        Self {
            arena,
            alloc,
            current,
            fresh: SmallVec::new(),
            reused: SmallVec::new(),
        }
    }

    /// Encode `value` into `out`, which must be `layout.length()` bytes.
    pub(crate) fn encode(
        &mut self,
        layout: &Layout,
        value: &'v Value,
        out: &mut [u8],
    ) -> Result<(), StoreError> {
        out.fill(0);
        self.root(layout, value, out, 0)
    }

    /// Apply deferred in-place rewrites. Returns the blocks of the old
    /// payload that the new payload still references.
    pub(crate) fn commit(self) -> Result<SmallVec<[usize; 4]>, StoreError> {
        let mut retained = SmallVec::new();
        for reuse in &self.reused {
            write_text(self.arena, reuse.block, reuse.size, reuse.text)?;
            retained.push(reuse.block);
        }
        Ok(retained)
    }

    /// Release every block allocated by this write.
    pub(crate) fn rollback(self) {
        for block in self.fresh {
            if let Err(err) = self.alloc.deallocate(self.arena, block) {
                warn!(block, %err, "failed to release block of aborted write");
            }
        }
    }

    fn root(
        &mut self,
        layout: &Layout,
        value: &'v Value,
        out: &mut [u8],
        at: usize,
    ) -> Result<(), StoreError> {
        match layout.shape() {
            LayoutShape::Scalar(p) => put_primitive(p, value, out, at),
            LayoutShape::Boxed(_) | LayoutShape::Text => {
                for field in layout.fields() {
                    self.field(field, value, out, at)?;
                }
                Ok(())
            }
            LayoutShape::Record => {
                let Value::Record(items) = value else {
                    return Err(ValueError::mismatch(layout.name(), value).into());
                };
                if items.len() != layout.field_count() {
                    return Err(ValueError::FieldCount {
                        record: layout.name().to_string(),
                        expected: layout.field_count(),
                        found: items.len(),
                    }
                    .into());
                }
                for field in layout.fields() {
                    self.field(field, &items[field.value_index], out, at)?;
                }
                Ok(())
            }
        }
    }

    fn field(
        &mut self,
        field: &FieldLayout,
        value: &'v Value,
        out: &mut [u8],
        base: usize,
    ) -> Result<(), StoreError> {
        let flag = base + field.offset;
        let at = flag + NULL_FLAG;
        if value.is_null() {
            if !field.nullable {
                return Err(ValueError::mismatch(expected(field), value).into());
            }
            out[flag] = 1;
            if let FieldKind::FixedString { .. } = field.kind {
                put(out, at, ABSENT_LENGTH);
            }
            return Ok(());
        }
        match &field.kind {
            FieldKind::Primitive(p) => put_primitive(*p, value, out, at),
            FieldKind::FixedString { capacity } => {
                let Value::Str(text) = value else {
                    return Err(ValueError::mismatch(expected(field), value).into());
                };
                put_fixed_string(text, *capacity, out, at);
                Ok(())
            }
            FieldKind::FixedArray { capacity, element }
            | FieldKind::FixedCollection {
                capacity, element, ..
            } => {
                let Value::Seq(items) = value else {
                    return Err(ValueError::mismatch(expected(field), value).into());
                };
                let count = items.len().min(*capacity as usize);
                if count < items.len() {
                    trace!(
                        field = %field.name,
                        len = items.len(),
                        capacity = *capacity,
                        "sequence truncated"
                    );
                }
                put(out, at, count as i32);
                let first = at + COUNT_WIDTH;
                for (i, item) in items[..count].iter().enumerate() {
                    self.element(element, item, out, first + i * element.width)?;
                }
                Ok(())
            }
            FieldKind::DynamicString => {
                let Value::Str(text) = value else {
                    return Err(ValueError::mismatch(expected(field), value).into());
                };
                self.dynamic_string(text, out, at)
            }
            FieldKind::Record(inner) => self.root(inner, value, out, at),
        }
    }

    fn element(
        &mut self,
        element: &ElementLayout,
        value: &'v Value,
        out: &mut [u8],
        at: usize,
    ) -> Result<(), StoreError> {
        if value.is_null() {
            if !element.nullable {
                return Err(ValueError::mismatch("non-null element", value).into());
            }
            out[at] = 1;
            return Ok(());
        }
        let at = at + element.payload_offset();
        match &element.shape {
            ElementShape::Primitive(p) => put_primitive(*p, value, out, at),
            ElementShape::DynamicString => {
                let Value::Str(text) = value else {
                    return Err(ValueError::mismatch("String", value).into());
                };
                self.dynamic_string(text, out, at)
            }
            ElementShape::Record(inner) => self.root(inner, value, out, at),
        }
    }

    fn dynamic_string(
        &mut self,
        text: &'v str,
        out: &mut [u8],
        at: usize,
    ) -> Result<(), StoreError> {
        let need = COUNT_WIDTH + text.len();
        if u32::try_from(text.len()).is_err() {
            return Err(ArenaError::OutOfDynamicMemory {
                requested: need,
                largest_free: 0,
            }
            .into());
        }
        let old = self.arena.get::<u64>(self.current + at)? as usize;
        let old_size = match old {
            0 => None,
            block => Some(self.alloc.block_size(self.arena, block)?),
        };
        let block = if old_size.is_some() && old_size == DynamicAllocator::rounded_size(need) {
            let size = old_size.unwrap_or_default();
            self.reused.push(Reuse { block: old, size, text });
            old
        } else {
            let block = self.alloc.allocate(self.arena, need)?;
            self.fresh.push(block);
            let size = self.alloc.block_size(self.arena, block)?;
            write_text(self.arena, block, size, text)?;
            block
        };
        put(out, at, block as u64);
        Ok(())
    }
}

/// Reads values back out of a slot payload.
pub(crate) struct Decoder<'a> {
    arena: &'a ByteArena,
    alloc: &'a DynamicAllocator,
    /// Arena offset of the payload being decoded.
    origin: usize,
}

impl<'a> Decoder<'a> {
    pub(crate) fn new(arena: &'a ByteArena, alloc: &'a DynamicAllocator, origin: usize) -> Self {
        Self {
            arena,
            alloc,
            origin,
        }
    }

    /// Decode the payload into `into`, reusing its buffers where the
    /// shapes line up.
    pub(crate) fn decode(&self, layout: &Layout, into: &mut Value) -> Result<(), StoreError> {
        self.root(layout, 0, into)
    }

    fn get<T: Scalar>(&self, at: usize) -> Result<T, StoreError> {
        Ok(self.arena.get::<T>(self.origin + at)?)
    }

    fn corrupt(&self, at: usize, reason: &'static str) -> StoreError {
        StoreError::Corrupt {
            offset: self.origin + at,
            reason,
        }
    }

    fn root(&self, layout: &Layout, at: usize, into: &mut Value) -> Result<(), StoreError> {
        match layout.shape() {
            LayoutShape::Scalar(p) => *into = self.primitive(p, at)?,
            LayoutShape::Boxed(_) | LayoutShape::Text => {
                for field in layout.fields() {
                    self.field(field, at, into)?;
                }
            }
            LayoutShape::Record => {
                let mut items = into.take_items();
                items.truncate(layout.field_count());
                items.resize(layout.field_count(), Value::Null);
                for field in layout.fields() {
                    self.field(field, at, &mut items[field.value_index])?;
                }
                *into = Value::Record(items);
            }
        }
        Ok(())
    }

    fn field(&self, field: &FieldLayout, base: usize, into: &mut Value) -> Result<(), StoreError> {
        let flag = base + field.offset;
        let at = flag + NULL_FLAG;
        if self.get::<u8>(flag)? != 0 {
            *into = Value::Null;
            return Ok(());
        }
        match &field.kind {
            FieldKind::Primitive(p) => *into = self.primitive(*p, at)?,
            FieldKind::FixedString { capacity } => self.fixed_string(*capacity, at, into)?,
            FieldKind::FixedArray { capacity, element }
            | FieldKind::FixedCollection {
                capacity, element, ..
            } => self.sequence(*capacity, element, at, into)?,
            FieldKind::DynamicString => self.dynamic_string(at, into)?,
            FieldKind::Record(inner) => self.root(inner, at, into)?,
        }
        Ok(())
    }

    fn element(&self, element: &ElementLayout, at: usize, into: &mut Value) -> Result<(), StoreError> {
        if element.nullable && self.get::<u8>(at)? != 0 {
            *into = Value::Null;
            return Ok(());
        }
        let at = at + element.payload_offset();
        match &element.shape {
            ElementShape::Primitive(p) => *into = self.primitive(*p, at)?,
            ElementShape::DynamicString => self.dynamic_string(at, into)?,
            ElementShape::Record(inner) => self.root(inner, at, into)?,
        }
        Ok(())
    }

    fn primitive(&self, primitive: Primitive, at: usize) -> Result<Value, StoreError> {
        Ok(match primitive {
            Primitive::Bool => Value::Bool(self.get(at)?),
            Primitive::I8 => Value::I8(self.get(at)?),
            Primitive::U8 => Value::U8(self.get(at)?),
            Primitive::I16 => Value::I16(self.get(at)?),
            Primitive::U16 => Value::U16(self.get(at)?),
            Primitive::I32 => Value::I32(self.get(at)?),
            Primitive::U32 => Value::U32(self.get(at)?),
            Primitive::F32 => Value::F32(self.get(at)?),
            Primitive::Char => {
                let code = self.get::<u32>(at)?;
                Value::Char(char::from_u32(code).ok_or(ValueError::InvalidChar(code))?)
            }
            Primitive::I64 => Value::I64(self.get(at)?),
            Primitive::U64 => Value::U64(self.get(at)?),
            Primitive::F64 => Value::F64(self.get(at)?),
        })
    }

    fn fixed_string(&self, capacity: u32, at: usize, into: &mut Value) -> Result<(), StoreError> {
        let len = self.get::<i32>(at)?;
        if len == ABSENT_LENGTH {
            *into = Value::Null;
            return Ok(());
        }
        let units = u32::try_from(len)
            .ok()
            .filter(|&n| n <= capacity)
            .ok_or_else(|| self.corrupt(at, "fixed string length out of range"))?;
        let bytes = self
            .arena
            .slice(self.origin + at + COUNT_WIDTH, units as usize * 2)?;
        let mut text = into.take_string();
        for ch in char::decode_utf16(bytes.chunks_exact(2).map(u16::read)) {
            text.push(ch.map_err(|_| self.corrupt(at, "invalid utf-16"))?);
        }
        *into = Value::Str(text);
        Ok(())
    }

    fn sequence(
        &self,
        capacity: u32,
        element: &ElementLayout,
        at: usize,
        into: &mut Value,
    ) -> Result<(), StoreError> {
        let count = self.get::<i32>(at)?;
        let count = u32::try_from(count)
            .ok()
            .filter(|&n| n <= capacity)
            .ok_or_else(|| self.corrupt(at, "sequence count out of range"))? as usize;
        let mut items = into.take_items();
        items.truncate(count);
        items.resize(count, Value::Null);
        let first = at + COUNT_WIDTH;
        for (i, item) in items.iter_mut().enumerate() {
            self.element(element, first + i * element.width, item)?;
        }
        *into = Value::Seq(items);
        Ok(())
    }

    fn dynamic_string(&self, at: usize, into: &mut Value) -> Result<(), StoreError> {
        let block = self.get::<u64>(at)? as usize;
        if block == 0 {
            return Err(self.corrupt(at, "missing dynamic block"));
        }
        let size = self
            .alloc
            .block_size(self.arena, block)
            .map_err(|_| self.corrupt(at, "dangling dynamic block"))?;
        let payload = DynamicAllocator::payload(block);
        let len = self.arena.get::<u32>(payload)? as usize;
        if COUNT_WIDTH + len > size {
            return Err(self.corrupt(at, "text longer than its block"));
        }
        let bytes = self.arena.slice(payload + COUNT_WIDTH, len)?;
        let text = std::str::from_utf8(bytes).map_err(|_| StoreError::Corrupt {
            offset: payload,
            reason: "invalid utf-8",
        })?;
        let mut buf = into.take_string();
        buf.push_str(text);
        *into = Value::Str(buf);
        Ok(())
    }
}

/// Addresses of the dynamic blocks referenced by the payload at arena
/// offset `payload`.
pub(crate) fn live_blocks(
    arena: &ByteArena,
    layout: &Layout,
    payload: usize,
) -> Result<SmallVec<[usize; 4]>, StoreError> {
    let mut blocks = SmallVec::new();
    for &offset in layout.dynamic_offsets() {
        let block = arena.get::<u64>(payload + offset)? as usize;
        if block != 0 {
            blocks.push(block);
        }
    }
    Ok(blocks)
}
