//! # Context Registry
//!
//! Central registry for the bridge lifecycle. Each guest context pairs a
//! guest engine with its own handle table and async bridge; the host type
//! catalog, fast-path registry, and zero-allocation bindings are shared
//! across contexts.
//!
//! Uses DashMap for concurrent access without global locking; contexts are
//! created and torn down while others keep running.

use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use dashmap::DashMap;
use tracing::info;

use crate::bridge::AsyncBridge;
use crate::bridge::DeferredResolver;
use crate::catalog::Catalog;
use crate::dispatch::Dispatcher;
use crate::fastpath::FastPath;
use crate::guest::GuestEngine;
use crate::handles::HandleTable;
use crate::zeroalloc::ZeroAlloc;

/// Strong type for context identifiers.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq)]
pub struct ContextId(pub u64);

impl std::fmt::Display for ContextId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "context-{}", self.0)
    }
}

#[derive(Debug)]
pub enum Error {
    ContextNotFound(ContextId),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::ContextNotFound(id) => write!(f, "context not found: {}", id),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;

/// One guest context: an engine plus the per-context bridge state.
pub struct BridgeContext {
    pub id: ContextId,
    pub engine: Arc<dyn GuestEngine>,
    pub handles: Arc<HandleTable>,
    pub bridge: Arc<AsyncBridge>,
}

/// What one tick of the pump accomplished.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct PumpStats {
    /// Guest-internal jobs (microtasks) executed.
    pub jobs: usize,
    /// Async completions delivered to the guest.
    pub completions: usize,
}

/// The central runtime for managing guest contexts.
///
/// Provides concurrent registration and lookup for contexts, and owns the
/// registries every context dispatches against.
pub struct BridgeRuntime {
    catalog: Arc<Catalog>,
    fastpath: Arc<FastPath>,
    zeroalloc: Arc<ZeroAlloc>,
    contexts: DashMap<ContextId, Arc<BridgeContext>>,
    next_context_id: AtomicU64,
}

impl BridgeRuntime {
    pub fn new() -> Self {
        Self {
            catalog: Arc::new(Catalog::new()),
            fastpath: Arc::new(FastPath::new()),
            zeroalloc: Arc::new(ZeroAlloc::new()),
            contexts: DashMap::new(),
            next_context_id: AtomicU64::new(1),
        }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn fastpath(&self) -> &Arc<FastPath> {
        &self.fastpath
    }

    pub fn zeroalloc(&self) -> &Arc<ZeroAlloc> {
        &self.zeroalloc
    }

    /// Creates a context around a guest engine and returns its unique ID.
    pub fn create_context(&self, engine: Arc<dyn GuestEngine>) -> ContextId {
        let id = ContextId(self.next_context_id.fetch_add(1, Ordering::Relaxed));
        let context = Arc::new(BridgeContext {
            id,
            engine,
            handles: Arc::new(HandleTable::new()),
            bridge: Arc::new(AsyncBridge::new()),
        });
        self.contexts.insert(id, context);
        info!(%id, "context created");
        id
    }

    /// Retrieves a context by ID.
    pub fn get_context(&self, id: ContextId) -> Result<Arc<BridgeContext>> {
        self.contexts
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or(Error::ContextNotFound(id))
    }

    /// Tears a context down: every handle it issued is invalidated and the
    /// engine is dropped with it. In-flight async completions for this
    /// context land in a closed queue and disappear.
    pub fn destroy_context(&self, id: ContextId) -> Result<()> {
        let (_, context) = self
            .contexts
            .remove(&id)
            .ok_or(Error::ContextNotFound(id))?;
        context.handles.clear_all();
        info!(%id, "context destroyed");
        Ok(())
    }

    /// Builds a dispatcher bound to one context's handle table.
    pub fn dispatcher(&self, id: ContextId) -> Result<Dispatcher> {
        let context = self.get_context(id)?;
        Ok(Dispatcher::new(
            self.catalog.clone(),
            context.handles.clone(),
            self.fastpath.clone(),
        ))
    }

    /// One tick of the per-frame pump: run the guest's internal job queue,
    /// then deliver async completions.
    pub fn pump(&self, id: ContextId, resolver: &mut dyn DeferredResolver) -> Result<PumpStats> {
        let context = self.get_context(id)?;
        let jobs = context.engine.run_pending_jobs();
        let completions = context.bridge.drain(resolver);
        Ok(PumpStats { jobs, completions })
    }

    pub fn context_count(&self) -> usize {
        self.contexts.len()
    }
}

impl Default for BridgeRuntime {
    fn default() -> Self {
        Self::new()
    }
}
