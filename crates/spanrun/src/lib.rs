//! # Runtime bridge between a host and an embedded scripting guest
//!
//! The guest holds handles; the host holds objects. Everything the guest
//! can do to the host funnels through one dispatcher working against an
//! explicitly registered type catalog, with a fast path for repeated calls
//! and a zero-allocation lane for hot scalar bindings. Host async work
//! re-enters the guest only through the once-per-tick drain.
//!
//! ## Architecture
//!
//! - [`handles`] — the per-context table mapping opaque handles to host
//!   objects.
//! - [`catalog`] — typed descriptors for every callable surface.
//! - [`dispatch`] — request in, result out, stable error codes.
//! - [`fastpath`] — memoized member resolution.
//! - [`zeroalloc`] — scalar bindings with allocation-free invocation.
//! - [`bridge`] — the completion queue between host schedulers and the
//!   guest thread.
//! - [`guest`] / [`context`] — the engine abstraction and the registry of
//!   live contexts.
//! - [`transport`] / [`linear`] — the in-process and linear-buffer
//!   boundaries.

pub mod bridge;
pub mod catalog;
pub mod context;
pub mod dispatch;
pub mod fastpath;
pub mod guest;
pub mod handles;
pub mod linear;
pub mod mock_guest;
pub mod transport;
pub mod zeroalloc;

#[cfg(test)]
mod tests;
