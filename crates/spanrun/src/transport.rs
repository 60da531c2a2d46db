//! # Boundary Abstraction
//!
//! The surface the guest runtime talks through. Two implementations exist:
//! [`DirectBoundary`] calls straight into the dispatcher for an in-process
//! guest, and [`LinearBoundary`] marshals everything through a fixed linear
//! buffer, modeling a guest on the far side of a memory boundary.
//!
//! ## Philosophy
//!
//! - **One semantics, two encodings**: both boundaries delegate to the same
//!   dispatcher and the same wire writer, so the same input produces the
//!   same result bytes either way. The test suite holds them to that.
//! - **Infallible surface**: `invoke` returns a `CallResult` even when the
//!   machinery below it fails; the guest never sees a panic or a poisoned
//!   lock.
//!
//! [`LinearBoundary`]: crate::linear::LinearBoundary

use std::sync::Arc;

use spancall::CallRequest;
use spancall::CallResult;
use tracing::info;

use crate::dispatch::Dispatcher;
use crate::handles::Handle;
use crate::zeroalloc;
use crate::zeroalloc::BindingId;
use crate::zeroalloc::Slot;
use crate::zeroalloc::ZeroAlloc;

/// What the guest runtime can do to the host.
pub trait Boundary: Send + Sync {
    /// Dispatches one call and returns its result.
    fn invoke(&self, request: &CallRequest) -> CallResult;

    /// Forgets a handle. Idempotent.
    fn release_handle(&self, handle: Handle);

    /// Invokes a pre-registered zero-allocation binding.
    fn za_invoke(&self, id: BindingId, args: &[Slot]) -> zeroalloc::Result<Slot>;

    /// Forwards a guest-side log line into host logging.
    fn log(&self, message: &str);
}

/// The in-process boundary: no marshalling at all.
pub struct DirectBoundary {
    dispatcher: Dispatcher,
    zeroalloc: Arc<ZeroAlloc>,
}

impl DirectBoundary {
    pub fn new(dispatcher: Dispatcher, zeroalloc: Arc<ZeroAlloc>) -> Self {
        Self { dispatcher, zeroalloc }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }
}

impl Boundary for DirectBoundary {
    fn invoke(&self, request: &CallRequest) -> CallResult {
        self.dispatcher.dispatch(request)
    }

    fn release_handle(&self, handle: Handle) {
        self.dispatcher.handles().release(handle);
    }

    fn za_invoke(&self, id: BindingId, args: &[Slot]) -> zeroalloc::Result<Slot> {
        self.zeroalloc.invoke(id, args)
    }

    fn log(&self, message: &str) {
        info!(target: "guest", "{}", message);
    }
}
