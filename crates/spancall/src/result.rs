//! # Call results
//!
//! The host's answer to a call request: a return value, a status code, and
//! an optional error message. The message string's ownership travels with
//! the record; a reader copies it out of the scratch buffer before the
//! buffer is reused.
//!
//! ## Wire layout (40 bytes, little-endian)
//!
//! | offset | size | field                              |
//! |--------|------|------------------------------------|
//! | 0      | 32   | return value (spanwire record)     |
//! | 32     | 4    | error code (i32, 0 = success)      |
//! | 36     | 4    | error-message offset (u32)         |

use spanwire::Value;
use spanwire::WireBuffer;
use spanwire::WireReader;

use crate::error::CallError;
use crate::error::ErrorCode;
use crate::error::Result;

/// Size of one result record on the wire.
pub const RESULT_RECORD_SIZE: usize = 40;

/// A decoded call result.
#[derive(Debug, Clone, PartialEq)]
pub struct CallResult {
    pub value: Value,
    pub code: ErrorCode,
    pub message: Option<String>,
}

impl CallResult {
    pub fn ok(value: Value) -> Self {
        Self { value, code: ErrorCode::Ok, message: None }
    }

    pub fn error(err: CallError) -> Self {
        Self {
            value: Value::Null,
            code: err.code,
            message: Some(err.message),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.code == ErrorCode::Ok
    }

    /// Encodes this result into the scratch buffer and returns the offset
    /// of its 40-byte record. The result value's record sits inline at the
    /// start of it.
    ///
    /// Returns `(offset, truncated)`; truncation of an oversized payload is
    /// reported, not treated as failure.
    pub fn write_into(&self, buf: &mut WireBuffer) -> Result<(u32, bool)> {
        let reserve = RESULT_RECORD_SIZE + 3;
        let (payload_str, hint_str, mut truncated) =
            buf.alloc_value_strings(&self.value, reserve)?;

        let mut message = 0u32;
        if let Some(msg) = &self.message {
            let (off, cut) = buf.alloc_cstr_reserving(msg, reserve)?;
            message = off;
            truncated |= cut;
        }

        let record = buf.alloc(RESULT_RECORD_SIZE)? as usize;
        buf.put_value_record(record, &self.value, payload_str, hint_str);
        buf.put_i32(record + 32, self.code as i32);
        buf.put_u32(record + 36, message);
        Ok((record as u32, truncated))
    }

    /// Decodes a result record. An unknown error code is preserved as
    /// HostException so a newer host cannot wedge an older reader.
    pub fn read_from(reader: &WireReader<'_>, offset: u32) -> Result<Self> {
        let record = offset as usize;
        let value = reader.read_value(offset)?;
        let code = ErrorCode::from_i32(reader.get_i32(record + 32)?)
            .unwrap_or(ErrorCode::HostException);
        let message_off = reader.get_u32(record + 36)?;
        let message = if message_off == 0 {
            None
        } else {
            Some(reader.get_cstr(message_off)?.to_owned())
        };
        Ok(Self { value, code, message })
    }
}

impl From<CallError> for CallResult {
    fn from(err: CallError) -> Self {
        Self::error(err)
    }
}
