//! # Error taxonomy
//!
//! Two distinct failure families live here, mirroring the split between
//! protocol failures and remote-side failures:
//!
//! - [`Error`] — this crate failed to encode or decode a record (malformed
//!   wire data, exhausted buffer). The transport surfaces these.
//! - [`CallError`] — the *call itself* failed on the host side. These are
//!   ordinary results: they travel back to the guest as a [`CallResult`]
//!   with a stable numeric code, never as a fault.
//!
//! [`CallResult`]: crate::result::CallResult

use spanwire::Error as WireError;

/// Wire-level failures while encoding or decoding call records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The underlying spanwire read or write failed.
    Wire(WireError),
    /// A request carried a call-kind tag outside the closed set.
    InvalidKind(i32),
    /// A request declared a negative argument count.
    BadArgCount(i32),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Wire(e) => write!(f, "wire error: {}", e),
            Self::InvalidKind(k) => write!(f, "invalid call kind: {}", k),
            Self::BadArgCount(n) => write!(f, "bad argument count: {}", n),
        }
    }
}

impl std::error::Error for Error {}

impl From<WireError> for Error {
    fn from(e: WireError) -> Self {
        Self::Wire(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Stable numeric error codes carried in a call result.
///
/// `Ok` is zero; everything else is a distinct non-zero family the guest
/// bootstrap switches on.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Ok = 0,
    TypeNotFound = 1,
    MemberNotFound = 2,
    AmbiguousMember = 3,
    ArgumentCoercionFailed = 4,
    InvalidHandle = 5,
    /// An arbitrary host-side failure during the call, wrapped with call
    /// context in the message.
    HostException = 6,
    /// Output exceeded the transport scratch buffer; the payload is a
    /// best-effort truncation, not a hard failure.
    BufferOverflow = 7,
    /// An uncaught exception inside guest code.
    GuestException = 8,
}

impl ErrorCode {
    pub const fn from_i32(v: i32) -> Option<Self> {
        match v {
            0 => Some(ErrorCode::Ok),
            1 => Some(ErrorCode::TypeNotFound),
            2 => Some(ErrorCode::MemberNotFound),
            3 => Some(ErrorCode::AmbiguousMember),
            4 => Some(ErrorCode::ArgumentCoercionFailed),
            5 => Some(ErrorCode::InvalidHandle),
            6 => Some(ErrorCode::HostException),
            7 => Some(ErrorCode::BufferOverflow),
            8 => Some(ErrorCode::GuestException),
            _ => None,
        }
    }
}

/// A host-side call failure: code plus human-readable context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallError {
    pub code: ErrorCode,
    pub message: String,
}

impl CallError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }
}

impl std::fmt::Display for CallError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl std::error::Error for CallError {}
