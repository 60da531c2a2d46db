//! # Spanwire
//!
//! The value protocol of the interop bridge: a closed tagged union with a
//! fixed 32-byte wire record, plus the linear scratch buffer the
//! out-of-process transport writes those records into.
//!
//! ## Philosophy
//!
//! - **The tag is the truth**: payload interpretation depends on the tag and
//!   nothing else. Readers switch on it, never guess.
//! - **Flat by construction**: a `Value` serializes to a fixed-layout record
//!   that can be copied across a process boundary without per-field
//!   marshaling on the transport side.
//! - **Encode never fails**: classification of a dynamic native value always
//!   produces *some* `Value`, falling back to JSON and finally to `Null`.

pub mod types;
pub mod value;
pub mod classify;
pub mod raw;

pub use types::Error;
pub use types::Result;
pub use types::Tag;

pub use value::Value;

pub use classify::decode;
pub use classify::encode;
pub use classify::HANDLE_KEY;
pub use classify::TYPE_HINT_KEY;

pub use raw::WireBuffer;
pub use raw::WireReader;
pub use raw::VALUE_RECORD_SIZE;

#[cfg(test)]
mod tests;
