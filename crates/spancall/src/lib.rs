//! # Spancall
//!
//! The call protocol layered on spanwire: call kinds, request and result
//! records with their fixed wire layouts, and the bridge error taxonomy
//! with stable numeric codes.
//!
//! ## Invariants
//!
//! - **No fault crosses the boundary**: every failure mode in this crate is
//!   representable as a `CallResult` with a non-zero code and a message.
//! - **Forward-stable numbering**: call-kind tags and error codes are part
//!   of the wire contract and never renumbered.

pub mod error;
pub mod kind;
pub mod request;
pub mod result;

pub use error::CallError;
pub use error::Error;
pub use error::ErrorCode;
pub use error::Result;

pub use kind::CallKind;

pub use request::CallRequest;
pub use request::REQUEST_RECORD_SIZE;

pub use result::CallResult;
pub use result::RESULT_RECORD_SIZE;
