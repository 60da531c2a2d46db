//! # Linear-Buffer Boundary
//!
//! Models a guest on the far side of a memory boundary: every request and
//! result crosses a single fixed-capacity scratch buffer as flat records,
//! exactly as they would through shared or copied linear memory.
//!
//! The buffer is reset at the start of each round trip; offsets handed to
//! the guest are only valid until the next one. Output that exceeds the
//! scratch region is truncated and counted, never a crash.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use spancall::CallError;
use spancall::CallRequest;
use spancall::CallResult;
use spancall::ErrorCode;
use spanwire::WireBuffer;
use spanwire::WireReader;
use tracing::info;
use tracing::warn;

use crate::dispatch::Dispatcher;
use crate::handles::Handle;
use crate::transport::Boundary;
use crate::zeroalloc;
use crate::zeroalloc::BindingId;
use crate::zeroalloc::Slot;
use crate::zeroalloc::ZeroAlloc;

pub struct LinearBoundary {
    dispatcher: Dispatcher,
    zeroalloc: Arc<ZeroAlloc>,
    buf: Mutex<WireBuffer>,
    overflows: AtomicU64,
}

impl LinearBoundary {
    pub fn new(dispatcher: Dispatcher, zeroalloc: Arc<ZeroAlloc>, capacity: usize) -> Self {
        Self {
            dispatcher,
            zeroalloc,
            buf: Mutex::new(WireBuffer::new(capacity)),
            overflows: AtomicU64::new(0),
        }
    }

    /// Times the scratch region overflowed and a payload was truncated.
    pub fn overflow_count(&self) -> u64 {
        self.overflows.load(Ordering::Relaxed)
    }

    /// Resets the scratch buffer and writes a request into it, as the
    /// guest side of the boundary would. Returns the request offset.
    pub fn write_request(&self, request: &CallRequest) -> spancall::Result<u32> {
        let mut buf = self.buf.lock().unwrap_or_else(|e| e.into_inner());
        buf.reset();
        request.write_into(&mut buf)
    }

    /// The host side of the boundary: reads the request record, dispatches
    /// it, and writes the result record after it. Returns the result
    /// offset.
    pub fn pump(&self, request_offset: u32) -> spancall::Result<u32> {
        let mut buf = self.buf.lock().unwrap_or_else(|e| e.into_inner());

        let result = match {
            let reader = WireReader::new(buf.bytes());
            CallRequest::read_from(&reader, request_offset)
        } {
            Ok(request) => self.dispatcher.dispatch(&request),
            Err(err) => {
                warn!(offset = request_offset, error = %err, "malformed request record");
                CallResult::error(CallError::new(
                    ErrorCode::HostException,
                    format!("malformed request record: {}", err),
                ))
            }
        };

        self.write_result(&mut buf, &result)
    }

    /// Reads a result record back out, as the guest side would.
    pub fn read_result(&self, offset: u32) -> spancall::Result<CallResult> {
        let buf = self.buf.lock().unwrap_or_else(|e| e.into_inner());
        let reader = WireReader::new(buf.bytes());
        CallResult::read_from(&reader, offset)
    }

    /// A full round trip; what [`Boundary::invoke`] does under the hood.
    pub fn round_trip(&self, request: &CallRequest) -> spancall::Result<CallResult> {
        let request_offset = self.write_request(request)?;
        let result_offset = self.pump(request_offset)?;
        self.read_result(result_offset)
    }

    fn write_result(&self, buf: &mut WireBuffer, result: &CallResult) -> spancall::Result<u32> {
        match result.write_into(buf) {
            Ok((offset, truncated)) => {
                if truncated {
                    self.overflows.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        capacity = buf.capacity(),
                        "result payload truncated to fit the scratch buffer"
                    );
                }
                Ok(offset)
            }
            Err(_) => {
                // Not even the record fit. Start over with a bare overflow
                // error, which needs only its own record plus the message.
                self.overflows.fetch_add(1, Ordering::Relaxed);
                warn!(
                    capacity = buf.capacity(),
                    "scratch buffer exhausted, replacing result with overflow error"
                );
                buf.reset();
                let overflow = CallResult::error(CallError::new(
                    ErrorCode::BufferOverflow,
                    "scratch buffer exhausted",
                ));
                let (offset, _) = overflow.write_into(buf)?;
                Ok(offset)
            }
        }
    }
}

impl Boundary for LinearBoundary {
    fn invoke(&self, request: &CallRequest) -> CallResult {
        match self.round_trip(request) {
            Ok(result) => result,
            Err(err) => CallResult::error(CallError::new(
                ErrorCode::BufferOverflow,
                format!("boundary transfer failed: {}", err),
            )),
        }
    }

    fn release_handle(&self, handle: Handle) {
        self.dispatcher.handles().release(handle);
    }

    fn za_invoke(&self, id: BindingId, args: &[Slot]) -> zeroalloc::Result<Slot> {
        // Slots are already flat; they cross the boundary as-is.
        self.zeroalloc.invoke(id, args)
    }

    fn log(&self, message: &str) {
        info!(target: "guest", "{}", message);
    }
}
