//! # Call requests
//!
//! A request names a host type and member, says how to call it, and carries
//! the argument values. Requests are constructed fresh per call and never
//! retained past the call they describe.
//!
//! ## Wire layout (28 bytes, little-endian)
//!
//! | offset | size | field                         |
//! |--------|------|-------------------------------|
//! | 0      | 4    | type-name offset (u32)        |
//! | 4      | 4    | member-name offset (u32)      |
//! | 8      | 4    | call kind (i32)               |
//! | 12     | 4    | is-static (i32)               |
//! | 16     | 4    | target handle (i32, 0 = none) |
//! | 20     | 4    | arg count (i32)               |
//! | 24     | 4    | args offset (u32)             |

use spanwire::Value;
use spanwire::WireBuffer;
use spanwire::WireReader;

use crate::error::Error;
use crate::error::Result;
use crate::kind::CallKind;

/// Size of one request record on the wire.
pub const REQUEST_RECORD_SIZE: usize = 28;

/// A decoded call request.
#[derive(Debug, Clone, PartialEq)]
pub struct CallRequest {
    pub type_name: String,
    pub member_name: String,
    pub kind: CallKind,
    pub is_static: bool,
    /// Handle of the receiver; 0 for static calls, constructions, and
    /// queries.
    pub target: u32,
    pub args: Vec<Value>,
}

impl CallRequest {
    /// A static call or pure query on a type.
    pub fn on_type(type_name: impl Into<String>, member_name: impl Into<String>, kind: CallKind, args: Vec<Value>) -> Self {
        Self {
            type_name: type_name.into(),
            member_name: member_name.into(),
            kind,
            is_static: true,
            target: 0,
            args,
        }
    }

    /// An instance call against a registered handle.
    pub fn on_target(type_name: impl Into<String>, member_name: impl Into<String>, kind: CallKind, target: u32, args: Vec<Value>) -> Self {
        Self {
            type_name: type_name.into(),
            member_name: member_name.into(),
            kind,
            is_static: false,
            target,
            args,
        }
    }

    /// Encodes this request into the scratch buffer and returns the offset
    /// of its 28-byte record.
    pub fn write_into(&self, buf: &mut WireBuffer) -> Result<u32> {
        let (type_name, _) = buf.alloc_cstr(&self.type_name)?;
        let (member_name, _) = buf.alloc_cstr(&self.member_name)?;
        let (args, _) = buf.write_values(&self.args)?;

        let record = buf.alloc(REQUEST_RECORD_SIZE)? as usize;
        buf.put_u32(record, type_name);
        buf.put_u32(record + 4, member_name);
        buf.put_i32(record + 8, self.kind as i32);
        buf.put_i32(record + 12, self.is_static as i32);
        buf.put_i32(record + 16, self.target as i32);
        buf.put_i32(record + 20, self.args.len() as i32);
        buf.put_u32(record + 24, args);
        Ok(record as u32)
    }

    /// Decodes a request record. Every field is validated; malformed input
    /// is an error, never a panic.
    pub fn read_from(reader: &WireReader<'_>, offset: u32) -> Result<Self> {
        let record = offset as usize;
        let type_name = reader.get_cstr(reader.get_u32(record)?)?.to_owned();
        let member_name = reader.get_cstr(reader.get_u32(record + 4)?)?.to_owned();

        let raw_kind = reader.get_i32(record + 8)?;
        let kind = CallKind::from_i32(raw_kind).ok_or(Error::InvalidKind(raw_kind))?;
        let is_static = reader.get_i32(record + 12)? != 0;
        let target = reader.get_i32(record + 16)? as u32;

        let arg_count = reader.get_i32(record + 20)?;
        if arg_count < 0 {
            return Err(Error::BadArgCount(arg_count));
        }
        let args = if arg_count == 0 {
            Vec::new()
        } else {
            reader.read_values(reader.get_u32(record + 24)?, arg_count as usize)?
        };

        Ok(Self { type_name, member_name, kind, is_static, target, args })
    }
}
