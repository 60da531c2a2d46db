//! # Handle Table
//!
//! Host objects never cross the boundary; a small opaque handle does. The
//! table maps non-zero `u32` handles to `Arc<dyn HostObject>` and back.
//!
//! ## Invariants
//!
//! - **Identity, not equality**: registering the same `Arc` twice returns
//!   the same handle. Two structurally equal but distinct objects get
//!   distinct handles.
//! - **Handles are never recycled**: the counter only moves forward, so a
//!   stale handle held by the guest can only miss, never alias a newer
//!   object.
//! - **Release is forgetting, not destroying**: dropping a table entry lets
//!   the `Arc` refcount decide the object's lifetime. Double release is a
//!   no-op.

use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::AtomicU32;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use dashmap::DashMap;

/// A host-side object the guest may hold a handle to.
pub trait HostObject: Send + Sync + 'static {
    /// The catalog type name this object dispatches under.
    fn type_name(&self) -> &str;

    /// Downcast support for host callables that need the concrete type.
    fn as_any(&self) -> &dyn Any;
}

/// Strong type for guest-visible object handles. Zero is never issued and
/// means "no handle" on the wire.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq)]
pub struct Handle(pub u32);

impl std::fmt::Display for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "handle-{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub enum Error {
    /// The handle was never issued, or was released.
    InvalidHandle(Handle),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidHandle(h) => write!(f, "invalid handle: {}", h),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;

/// The handle table for one guest context.
///
/// All mutation happens on the guest thread; lookups may come from host
/// callables running inline during a dispatch. DashMap keeps both cheap.
pub struct HandleTable {
    entries: DashMap<u32, Arc<dyn HostObject>>,
    // Keyed by the object's thin pointer, for identity-preserving dedup.
    index: DashMap<usize, u32>,
    next: AtomicU32,
    peak: AtomicUsize,
}

impl HandleTable {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            index: DashMap::new(),
            next: AtomicU32::new(1),
            peak: AtomicUsize::new(0),
        }
    }

    fn identity(obj: &Arc<dyn HostObject>) -> usize {
        Arc::as_ptr(obj) as *const () as usize
    }

    /// Registers an object and returns its handle. Registering an object
    /// already in the table returns the existing handle.
    pub fn register(&self, obj: Arc<dyn HostObject>) -> Handle {
        let key = Self::identity(&obj);
        let handle = *self.index.entry(key).or_insert_with(|| {
            let id = self.next.fetch_add(1, Ordering::Relaxed);
            self.entries.insert(id, obj);
            id
        });
        self.peak.fetch_max(self.entries.len(), Ordering::Relaxed);
        Handle(handle)
    }

    /// Looks up a live handle.
    pub fn resolve(&self, handle: Handle) -> Result<Arc<dyn HostObject>> {
        self.entries
            .get(&handle.0)
            .map(|entry| entry.value().clone())
            .ok_or(Error::InvalidHandle(handle))
    }

    /// Forgets a handle. Idempotent; the object itself is untouched.
    pub fn release(&self, handle: Handle) {
        if let Some((_, obj)) = self.entries.remove(&handle.0) {
            self.index.remove(&Self::identity(&obj));
        }
    }

    /// Bulk-invalidates every handle, for context teardown and reload.
    pub fn clear_all(&self) {
        self.entries.clear();
        self.index.clear();
    }

    /// Number of live handles.
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    /// High-water mark of live handles since the last [`reset_peak`].
    ///
    /// [`reset_peak`]: HandleTable::reset_peak
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::Relaxed)
    }

    pub fn reset_peak(&self) {
        self.peak.store(self.entries.len(), Ordering::Relaxed);
    }
}

impl Default for HandleTable {
    fn default() -> Self {
        Self::new()
    }
}
