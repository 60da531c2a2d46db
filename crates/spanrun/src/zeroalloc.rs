//! # Zero-Allocation Binding Layer
//!
//! For hot scalar calls the dispatcher's decode/resolve/encode pipeline is
//! pure overhead. A binding pre-resolves everything at registration time;
//! invocation is a map read, an `Arc` refcount bump, and a direct call.
//!
//! ## Invariants
//!
//! - **Invoke never allocates**: every argument and return travels as a
//!   [`Slot`], a `u64` holding the scalar's bits. Registration may allocate
//!   freely; invocation must not.
//! - **Fixed arities only**: one specialization per arity 0 through 8,
//!   generated by macro. There is no variadic fallback to quietly fall off
//!   the fast path.
//! - **Scalars only**: strings, vectors, and JSON are dispatcher territory.
//!   Bindings over them are rejected at registration, not at call time.

use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use dashmap::DashMap;

#[derive(Debug, Clone)]
pub enum Error {
    /// No binding registered under this id.
    UnknownBinding(BindingId),
    /// The call supplied the wrong number of slots.
    ArityMismatch { id: BindingId, expected: usize, got: usize },
    /// `Unit` is only meaningful as a return kind.
    UnitParameter,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::UnknownBinding(id) => write!(f, "unknown binding: {}", id),
            Error::ArityMismatch { id, expected, got } => {
                write!(f, "{} takes {} slot(s), got {}", id, expected, got)
            }
            Error::UnitParameter => write!(f, "unit is not a parameter kind"),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;

/// Strong type for binding identifiers.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq)]
pub struct BindingId(pub u64);

impl std::fmt::Display for BindingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "binding-{}", self.0)
    }
}

/// The scalar kinds a binding may declare.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SlotKind {
    /// Return kind only: the callee produces nothing and the slot is zero.
    Unit,
    Bool,
    I32,
    I64,
    F32,
    F64,
    Handle,
}

/// One scalar crossing the boundary: the value's bits in a `u64`.
///
/// Floats travel via `to_bits`, zero-extended for `f32`. The kind is not
/// stored; both sides agree on it through the binding's declared signature.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Slot(pub u64);

impl Slot {
    pub const UNIT: Slot = Slot(0);

    pub fn from_bool(v: bool) -> Self {
        Slot(u64::from(v))
    }

    pub fn from_i32(v: i32) -> Self {
        Slot(v as u32 as u64)
    }

    pub fn from_i64(v: i64) -> Self {
        Slot(v as u64)
    }

    pub fn from_f32(v: f32) -> Self {
        Slot(u64::from(v.to_bits()))
    }

    pub fn from_f64(v: f64) -> Self {
        Slot(v.to_bits())
    }

    pub fn from_handle(v: u32) -> Self {
        Slot(u64::from(v))
    }

    pub fn as_bool(self) -> bool {
        self.0 != 0
    }

    pub fn as_i32(self) -> i32 {
        self.0 as u32 as i32
    }

    pub fn as_i64(self) -> i64 {
        self.0 as i64
    }

    pub fn as_f32(self) -> f32 {
        f32::from_bits(self.0 as u32)
    }

    pub fn as_f64(self) -> f64 {
        f64::from_bits(self.0)
    }

    pub fn as_handle(self) -> u32 {
        self.0 as u32
    }
}

/// The stored callable, one variant per arity.
enum BoundFn {
    A0(Arc<dyn Fn() -> Slot + Send + Sync>),
    A1(Arc<dyn Fn(Slot) -> Slot + Send + Sync>),
    A2(Arc<dyn Fn(Slot, Slot) -> Slot + Send + Sync>),
    A3(Arc<dyn Fn(Slot, Slot, Slot) -> Slot + Send + Sync>),
    A4(Arc<dyn Fn(Slot, Slot, Slot, Slot) -> Slot + Send + Sync>),
    A5(Arc<dyn Fn(Slot, Slot, Slot, Slot, Slot) -> Slot + Send + Sync>),
    A6(Arc<dyn Fn(Slot, Slot, Slot, Slot, Slot, Slot) -> Slot + Send + Sync>),
    A7(Arc<dyn Fn(Slot, Slot, Slot, Slot, Slot, Slot, Slot) -> Slot + Send + Sync>),
    A8(Arc<dyn Fn(Slot, Slot, Slot, Slot, Slot, Slot, Slot, Slot) -> Slot + Send + Sync>),
}

impl BoundFn {
    fn arity(&self) -> usize {
        match self {
            BoundFn::A0(_) => 0,
            BoundFn::A1(_) => 1,
            BoundFn::A2(_) => 2,
            BoundFn::A3(_) => 3,
            BoundFn::A4(_) => 4,
            BoundFn::A5(_) => 5,
            BoundFn::A6(_) => 6,
            BoundFn::A7(_) => 7,
            BoundFn::A8(_) => 8,
        }
    }
}

struct Binding {
    func: BoundFn,
    params: Vec<SlotKind>,
    ret: SlotKind,
}

/// Defines one `bindN` registration method.
/// Arguments: method name, arity, BoundFn variant, argument names.
macro_rules! bind_arity {
    ($name:ident, $n:literal, $var:ident, $($arg:ident),*) => {
        pub fn $name(
            &self,
            params: [SlotKind; $n],
            ret: SlotKind,
            f: impl Fn($($crate::zeroalloc::slot_ty!($arg)),*) -> Slot + Send + Sync + 'static,
        ) -> Result<BindingId> {
            if params.contains(&SlotKind::Unit) {
                return Err(Error::UnitParameter);
            }
            Ok(self.insert(Binding {
                func: BoundFn::$var(Arc::new(f)),
                params: params.to_vec(),
                ret,
            }))
        }
    };
}

// Helper so the macro above can expand `Slot` once per argument name.
macro_rules! slot_ty {
    ($arg:ident) => {
        Slot
    };
}
pub(crate) use slot_ty;

/// The process-wide registry of zero-allocation bindings.
pub struct ZeroAlloc {
    bindings: DashMap<u64, Arc<Binding>>,
    next: AtomicU64,
}

impl ZeroAlloc {
    pub fn new() -> Self {
        Self {
            bindings: DashMap::new(),
            next: AtomicU64::new(1),
        }
    }

    fn insert(&self, binding: Binding) -> BindingId {
        let id = self.next.fetch_add(1, Ordering::Relaxed);
        self.bindings.insert(id, Arc::new(binding));
        BindingId(id)
    }

    bind_arity!(bind0, 0, A0,);
    bind_arity!(bind1, 1, A1, a);
    bind_arity!(bind2, 2, A2, a, b);
    bind_arity!(bind3, 3, A3, a, b, c);
    bind_arity!(bind4, 4, A4, a, b, c, d);
    bind_arity!(bind5, 5, A5, a, b, c, d, e);
    bind_arity!(bind6, 6, A6, a, b, c, d, e, g);
    bind_arity!(bind7, 7, A7, a, b, c, d, e, g, h);
    bind_arity!(bind8, 8, A8, a, b, c, d, e, g, h, i);

    /// Invokes a binding. Performs no allocation: one map read, one `Arc`
    /// clone, one call.
    pub fn invoke(&self, id: BindingId, args: &[Slot]) -> Result<Slot> {
        let binding = {
            let entry = self
                .bindings
                .get(&id.0)
                .ok_or(Error::UnknownBinding(id))?;
            entry.value().clone()
        };

        let expected = binding.func.arity();
        if args.len() != expected {
            return Err(Error::ArityMismatch { id, expected, got: args.len() });
        }

        Ok(match &binding.func {
            BoundFn::A0(f) => f(),
            BoundFn::A1(f) => f(args[0]),
            BoundFn::A2(f) => f(args[0], args[1]),
            BoundFn::A3(f) => f(args[0], args[1], args[2]),
            BoundFn::A4(f) => f(args[0], args[1], args[2], args[3]),
            BoundFn::A5(f) => f(args[0], args[1], args[2], args[3], args[4]),
            BoundFn::A6(f) => f(args[0], args[1], args[2], args[3], args[4], args[5]),
            BoundFn::A7(f) => {
                f(args[0], args[1], args[2], args[3], args[4], args[5], args[6])
            }
            BoundFn::A8(f) => f(
                args[0], args[1], args[2], args[3], args[4], args[5], args[6], args[7],
            ),
        })
    }

    /// The declared signature of a binding, for diagnostics.
    pub fn signature(&self, id: BindingId) -> Option<(Vec<SlotKind>, SlotKind)> {
        self.bindings
            .get(&id.0)
            .map(|entry| (entry.params.clone(), entry.ret))
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

impl Default for ZeroAlloc {
    fn default() -> Self {
        Self::new()
    }
}
