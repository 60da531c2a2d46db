//! Core types for the spanwire record format.

/// Numeric value tags as they appear on the wire.
///
/// These numbers are load-bearing: guest-side bootstrap code switches on
/// them, so they must never be renumbered.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    Null = 0,
    Bool = 1,
    Int32 = 2,
    Double = 3,
    String = 4,
    Handle = 5,
    Int64 = 6,
    Float32 = 7,
    Array = 8,
    JsonBlob = 9,
    Vector3 = 10,
    Vector4 = 11,
}

impl Tag {
    pub const fn from_i32(v: i32) -> Option<Self> {
        match v {
            0 => Some(Tag::Null),
            1 => Some(Tag::Bool),
            2 => Some(Tag::Int32),
            3 => Some(Tag::Double),
            4 => Some(Tag::String),
            5 => Some(Tag::Handle),
            6 => Some(Tag::Int64),
            7 => Some(Tag::Float32),
            8 => Some(Tag::Array),
            9 => Some(Tag::JsonBlob),
            10 => Some(Tag::Vector3),
            11 => Some(Tag::Vector4),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A record carried a tag value outside the closed union.
    InvalidTag(i32),
    /// A read reached past the end of the buffer.
    OutOfBounds,
    /// A string region was not valid UTF-8.
    InvalidUtf8,
    /// A string offset pointed at a region with no NUL terminator.
    UnterminatedString,
    /// The scratch buffer has no room left for a new allocation.
    BufferFull,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidTag(t) => write!(f, "invalid value tag: {}", t),
            Self::OutOfBounds => write!(f, "read past end of wire buffer"),
            Self::InvalidUtf8 => write!(f, "string region is not valid UTF-8"),
            Self::UnterminatedString => write!(f, "string region has no NUL terminator"),
            Self::BufferFull => write!(f, "wire buffer capacity exhausted"),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;
