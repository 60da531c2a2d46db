//! # Fast-Path Registry
//!
//! Memoizes the outcome of member resolution so the steady-state cost of a
//! repeated call is one map lookup instead of a full name/kind/overload
//! search.
//!
//! ## Invariants
//!
//! - **Earned, never speculative**: an entry is installed only after the
//!   dispatcher has resolved the member unambiguously for a concrete call
//!   shape, and for constructors and methods only when every argument
//!   matched the winning overload exactly. Narrowing matches depend on the
//!   argument's value, not just its tag, so they are never memoized.
//! - **The shape is the argument tags, not the arity**: resolution depends
//!   on what the arguments *are*, so the key carries their type tags. An
//!   `Add(Double, Double)` entry can never be handed to an
//!   `Add(Int32, Int32)` call.
//! - **First install wins**: concurrent duplicate installs return the
//!   existing entry. An installed entry is never overwritten.
//! - **Transparent**: with the registry disabled every call takes the slow
//!   path and produces the identical result. The toggle exists so the test
//!   suite can prove that.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use dashmap::DashMap;
use spancall::CallKind;
use spanwire::Tag;

use crate::catalog::CtorOverload;
use crate::catalog::HostFn;
use crate::catalog::Overload;

/// What a resolved member entry actually invokes.
#[derive(Clone)]
pub enum FastTarget {
    Ctor(Arc<CtorOverload>),
    Method(Arc<Overload>),
    Getter(HostFn),
    Setter(HostFn),
}

pub struct FastEntry {
    pub target: FastTarget,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq)]
struct FastKey {
    type_name: String,
    member: String,
    kind: CallKind,
    is_static: bool,
    shape: Vec<Tag>,
}

pub struct FastPath {
    entries: DashMap<FastKey, Arc<FastEntry>>,
    enabled: AtomicBool,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl FastPath {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            enabled: AtomicBool::new(true),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Looks up a memoized resolution. A disabled registry always misses
    /// and records nothing.
    pub fn lookup(
        &self,
        type_name: &str,
        member: &str,
        kind: CallKind,
        is_static: bool,
        shape: &[Tag],
    ) -> Option<Arc<FastEntry>> {
        if !self.is_enabled() {
            return None;
        }
        let key = FastKey {
            type_name: type_name.to_string(),
            member: member.to_string(),
            kind,
            is_static,
            shape: shape.to_vec(),
        };
        match self.entries.get(&key) {
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.value().clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Installs a proven resolution. Returns the entry that is actually in
    /// the registry, which is the first one installed for this key.
    pub fn install(
        &self,
        type_name: &str,
        member: &str,
        kind: CallKind,
        is_static: bool,
        shape: &[Tag],
        entry: FastEntry,
    ) -> Arc<FastEntry> {
        if !self.is_enabled() {
            return Arc::new(entry);
        }
        let key = FastKey {
            type_name: type_name.to_string(),
            member: member.to_string(),
            kind,
            is_static,
            shape: shape.to_vec(),
        };
        self.entries
            .entry(key)
            .or_insert_with(|| Arc::new(entry))
            .value()
            .clone()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Drops every entry, for catalog changes and reload.
    pub fn clear(&self) {
        self.entries.clear();
    }
}

impl Default for FastPath {
    fn default() -> Self {
        Self::new()
    }
}
