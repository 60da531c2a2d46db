//! # Fixed record layout
//!
//! Writes `Value` records into a linear scratch buffer using the exact
//! 32-byte layout the boundary transports share, and reads them back.
//!
//! ## Layout (little-endian)
//!
//! | offset | size | field                              |
//! |--------|------|------------------------------------|
//! | 0      | 4    | tag (i32)                          |
//! | 4      | 4    | padding                            |
//! | 8      | 16   | payload union                      |
//! | 24     | 4    | type-hint offset (u32, 0 = none)   |
//! | 28     | 4    | trailing padding                   |
//!
//! Strings are NUL-terminated UTF-8 elsewhere in the same buffer,
//! referenced by offset. Offset 0 is reserved and always means "absent".
//!
//! ## Invariants
//!
//! - **Panic safety**: every read is bounds-checked and returns `Result`;
//!   hostile offsets or tags never panic.
//! - **Truncation over failure**: a string that does not fit the remaining
//!   capacity is cut on a UTF-8 boundary and flagged, matching the
//!   transport's warning-not-crash overflow contract.

use crate::types::Error;
use crate::types::Result;
use crate::types::Tag;
use crate::value::Value;

/// Size of one value record on the wire.
pub const VALUE_RECORD_SIZE: usize = 32;

const PAYLOAD: usize = 8;
const HINT: usize = 24;

/// Wire hint marking the color interpretation of a Vector4.
const COLOR_HINT: &str = "color";

/// A fixed-capacity bump allocator holding records and their strings.
///
/// Byte 0 is reserved so that no allocation can land at offset 0.
pub struct WireBuffer {
    buf: Vec<u8>,
    capacity: usize,
}

impl WireBuffer {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity >= VALUE_RECORD_SIZE, "capacity too small for one record");
        let mut buf = Vec::with_capacity(capacity);
        buf.push(0);
        Self { buf, capacity }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.len() <= 1
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn remaining(&self) -> usize {
        self.capacity - self.buf.len()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Discards everything written so far. Offsets handed out before a
    /// reset are dead; callers must copy what they need first.
    pub fn reset(&mut self) {
        self.buf.truncate(1);
    }

    /// Reserves `size` zeroed bytes aligned to 4 and returns their offset.
    pub fn alloc(&mut self, size: usize) -> Result<u32> {
        let pad = (4 - self.buf.len() % 4) % 4;
        if self.buf.len() + pad + size > self.capacity {
            return Err(Error::BufferFull);
        }
        self.buf.resize(self.buf.len() + pad, 0);
        let offset = self.buf.len() as u32;
        self.buf.resize(self.buf.len() + size, 0);
        Ok(offset)
    }

    /// Appends a NUL-terminated string, truncating on a UTF-8 boundary if
    /// the remaining capacity cannot hold it whole. Returns the offset and
    /// whether truncation happened.
    pub fn alloc_cstr(&mut self, s: &str) -> Result<(u32, bool)> {
        self.alloc_cstr_reserving(s, 0)
    }

    /// Like [`alloc_cstr`](Self::alloc_cstr), but keeps `reserve` bytes of
    /// capacity untouched for records that still have to be written after
    /// the string.
    pub fn alloc_cstr_reserving(&mut self, s: &str, reserve: usize) -> Result<(u32, bool)> {
        let room = self.remaining().saturating_sub(reserve);
        if room == 0 {
            return Err(Error::BufferFull);
        }
        let offset = self.buf.len() as u32;
        let fit = room - 1;
        let (bytes, truncated) = if s.len() <= fit {
            (s.as_bytes(), false)
        } else {
            // Back off to the nearest char boundary that fits.
            let mut end = fit;
            while end > 0 && !s.is_char_boundary(end) {
                end -= 1;
            }
            (&s.as_bytes()[..end], true)
        };
        self.buf.extend_from_slice(bytes);
        self.buf.push(0);
        Ok((offset, truncated))
    }

    /// Allocates the variable-size string payloads of a value (string/json
    /// body, handle or color hint). Returns `(payload_str, hint_str,
    /// truncated)` offsets for [`put_value_record`](Self::put_value_record).
    ///
    /// Strings must land before the record that references them, which is
    /// why this is split from the record write.
    pub fn alloc_value_strings(&mut self, value: &Value, reserve: usize) -> Result<(u32, u32, bool)> {
        let mut payload_str = 0u32;
        let mut hint_str = 0u32;
        let mut truncated = false;
        match value {
            Value::Str(s) | Value::Json(s) => {
                let (off, cut) = self.alloc_cstr_reserving(s, reserve)?;
                payload_str = off;
                truncated = cut;
            }
            Value::Handle { hint: Some(hint), .. } => {
                let (off, cut) = self.alloc_cstr_reserving(hint, reserve)?;
                hint_str = off;
                truncated = cut;
            }
            Value::Vector4 { color: true, .. } => {
                let (off, cut) = self.alloc_cstr_reserving(COLOR_HINT, reserve)?;
                hint_str = off;
                truncated = cut;
            }
            _ => {}
        }
        Ok((payload_str, hint_str, truncated))
    }

    /// Fills an already-allocated 32-byte region with a value record.
    /// String offsets come from [`alloc_value_strings`](Self::alloc_value_strings).
    pub fn put_value_record(&mut self, record: usize, value: &Value, payload_str: u32, hint_str: u32) {
        self.put_i32(record, value.tag() as i32);
        match value {
            Value::Null => {}
            Value::Bool(b) => self.put_i32(record + PAYLOAD, *b as i32),
            Value::Int32(v) => self.put_i32(record + PAYLOAD, *v),
            Value::Int64(v) => self.put_i64(record + PAYLOAD, *v),
            Value::Float32(v) => self.put_f32(record + PAYLOAD, *v),
            Value::Double(v) => self.put_f64(record + PAYLOAD, *v),
            Value::Str(_) | Value::Json(_) => self.put_u32(record + PAYLOAD, payload_str),
            Value::Handle { handle, .. } => {
                self.put_u32(record + PAYLOAD, *handle);
                self.put_u32(record + HINT, hint_str);
            }
            Value::Vector3([x, y, z]) => {
                self.put_f32(record + PAYLOAD, *x);
                self.put_f32(record + PAYLOAD + 4, *y);
                self.put_f32(record + PAYLOAD + 8, *z);
            }
            Value::Vector4 { xyzw: [x, y, z, w], .. } => {
                self.put_f32(record + PAYLOAD, *x);
                self.put_f32(record + PAYLOAD + 4, *y);
                self.put_f32(record + PAYLOAD + 8, *z);
                self.put_f32(record + PAYLOAD + 12, *w);
                self.put_u32(record + HINT, hint_str);
            }
            Value::Array { len } => self.put_i32(record + PAYLOAD, *len),
        }
    }

    /// Encodes one value as a 32-byte record (strings land first, then the
    /// record referencing them). Returns the record offset and whether any
    /// string payload was truncated.
    pub fn write_value(&mut self, value: &Value) -> Result<(u32, bool)> {
        // Leave room (plus alignment slack) for the record itself so a long
        // string truncates instead of starving it.
        let (payload_str, hint_str, truncated) =
            self.alloc_value_strings(value, VALUE_RECORD_SIZE + 3)?;
        let record = self.alloc(VALUE_RECORD_SIZE)? as usize;
        self.put_value_record(record, value, payload_str, hint_str);
        Ok((record as u32, truncated))
    }

    /// Writes a contiguous run of value records (an argument list). Returns
    /// the offset of the first record, or 0 for an empty list.
    pub fn write_values(&mut self, values: &[Value]) -> Result<(u32, bool)> {
        if values.is_empty() {
            return Ok((0, false));
        }
        // Strings for every record go first so the records themselves stay
        // contiguous.
        let reserve = VALUE_RECORD_SIZE * values.len() + 3;
        let mut any_truncated = false;
        let mut prepared = Vec::with_capacity(values.len());
        for value in values {
            let (payload_str, hint_str, cut) = self.alloc_value_strings(value, reserve)?;
            any_truncated |= cut;
            prepared.push((payload_str, hint_str));
        }

        let first = self.alloc(VALUE_RECORD_SIZE * values.len())? as usize;
        for (i, (value, (payload_str, hint_str))) in values.iter().zip(prepared).enumerate() {
            self.put_value_record(first + i * VALUE_RECORD_SIZE, value, payload_str, hint_str);
        }

        Ok((first as u32, any_truncated))
    }

    pub fn put_i32(&mut self, offset: usize, v: i32) {
        self.buf[offset..offset + 4].copy_from_slice(&v.to_le_bytes());
    }

    pub fn put_u32(&mut self, offset: usize, v: u32) {
        self.buf[offset..offset + 4].copy_from_slice(&v.to_le_bytes());
    }

    pub fn put_i64(&mut self, offset: usize, v: i64) {
        self.buf[offset..offset + 8].copy_from_slice(&v.to_le_bytes());
    }

    pub fn put_f32(&mut self, offset: usize, v: f32) {
        self.buf[offset..offset + 4].copy_from_slice(&v.to_le_bytes());
    }

    pub fn put_f64(&mut self, offset: usize, v: f64) {
        self.buf[offset..offset + 8].copy_from_slice(&v.to_le_bytes());
    }
}

/// Bounds-checked reads over a wire buffer snapshot.
#[derive(Clone, Copy)]
pub struct WireReader<'a> {
    buf: &'a [u8],
}

impl<'a> WireReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    fn need(&self, offset: usize, n: usize) -> Result<&'a [u8]> {
        if offset + n > self.buf.len() {
            return Err(Error::OutOfBounds);
        }
        Ok(&self.buf[offset..offset + n])
    }

    pub fn get_i32(&self, offset: usize) -> Result<i32> {
        let b = self.need(offset, 4)?;
        Ok(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn get_u32(&self, offset: usize) -> Result<u32> {
        let b = self.need(offset, 4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn get_i64(&self, offset: usize) -> Result<i64> {
        let b = self.need(offset, 8)?;
        Ok(i64::from_le_bytes(b.try_into().map_err(|_| Error::OutOfBounds)?))
    }

    pub fn get_f32(&self, offset: usize) -> Result<f32> {
        Ok(f32::from_bits(self.get_u32(offset)?))
    }

    pub fn get_f64(&self, offset: usize) -> Result<f64> {
        Ok(f64::from_bits(self.get_i64(offset)? as u64))
    }

    /// Reads a NUL-terminated UTF-8 string at the given offset.
    pub fn get_cstr(&self, offset: u32) -> Result<&'a str> {
        let start = offset as usize;
        if start >= self.buf.len() {
            return Err(Error::OutOfBounds);
        }
        let rest = &self.buf[start..];
        let end = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or(Error::UnterminatedString)?;
        std::str::from_utf8(&rest[..end]).map_err(|_| Error::InvalidUtf8)
    }

    fn hint(&self, record: usize) -> Result<Option<String>> {
        let off = self.get_u32(record + HINT)?;
        if off == 0 {
            return Ok(None);
        }
        Ok(Some(self.get_cstr(off)?.to_owned()))
    }

    /// Decodes one 32-byte record back into a `Value`, switching strictly
    /// on the tag.
    pub fn read_value(&self, offset: u32) -> Result<Value> {
        let record = offset as usize;
        self.need(record, VALUE_RECORD_SIZE)?;
        let raw_tag = self.get_i32(record)?;
        let tag = Tag::from_i32(raw_tag).ok_or(Error::InvalidTag(raw_tag))?;
        let value = match tag {
            Tag::Null => Value::Null,
            Tag::Bool => Value::Bool(self.get_i32(record + PAYLOAD)? != 0),
            Tag::Int32 => Value::Int32(self.get_i32(record + PAYLOAD)?),
            Tag::Int64 => Value::Int64(self.get_i64(record + PAYLOAD)?),
            Tag::Float32 => Value::Float32(self.get_f32(record + PAYLOAD)?),
            Tag::Double => Value::Double(self.get_f64(record + PAYLOAD)?),
            Tag::String => {
                Value::Str(self.get_cstr(self.get_u32(record + PAYLOAD)?)?.to_owned())
            }
            Tag::JsonBlob => {
                Value::Json(self.get_cstr(self.get_u32(record + PAYLOAD)?)?.to_owned())
            }
            Tag::Handle => Value::Handle {
                handle: self.get_u32(record + PAYLOAD)?,
                hint: self.hint(record)?,
            },
            Tag::Vector3 => Value::Vector3([
                self.get_f32(record + PAYLOAD)?,
                self.get_f32(record + PAYLOAD + 4)?,
                self.get_f32(record + PAYLOAD + 8)?,
            ]),
            Tag::Vector4 => {
                let xyzw = [
                    self.get_f32(record + PAYLOAD)?,
                    self.get_f32(record + PAYLOAD + 4)?,
                    self.get_f32(record + PAYLOAD + 8)?,
                    self.get_f32(record + PAYLOAD + 12)?,
                ];
                let color = self.hint(record)?.as_deref() == Some(COLOR_HINT);
                Value::Vector4 { xyzw, color }
            }
            Tag::Array => Value::Array { len: self.get_i32(record + PAYLOAD)? },
        };
        Ok(value)
    }

    /// Reads `count` contiguous records starting at the given offset.
    pub fn read_values(&self, offset: u32, count: usize) -> Result<Vec<Value>> {
        let mut values = Vec::with_capacity(count);
        for i in 0..count {
            values.push(self.read_value(offset + (i * VALUE_RECORD_SIZE) as u32)?);
        }
        Ok(values)
    }
}
