//! # Invocation Dispatcher
//!
//! Turns a [`CallRequest`] into a [`CallResult`]: resolve the type, resolve
//! the member, pick an overload, execute, encode. Every failure mode has a
//! stable error code; nothing escapes as a panic.
//!
//! ## Overload resolution
//!
//! Each argument is ranked against the declared parameter: exact (0),
//! widening (1), narrowing (2); an incompatible pair disqualifies the
//! overload. Overloads are ordered by worst rank first, then rank sum. A
//! tie at the top is a hard `AmbiguousMember` error rather than an
//! arbitrary pick.
//!
//! Widening: Int32 into Int64/Float32/Double, Int64 into Double, Float32
//! into Double. Narrowing: Double into Float32, Int64 into Int32 when in
//! range, Double into Int32 when exactly integral.

use std::panic::AssertUnwindSafe;
use std::panic::catch_unwind;
use std::sync::Arc;

use spancall::CallError;
use spancall::CallKind;
use spancall::CallRequest;
use spancall::CallResult;
use spancall::ErrorCode;
use spanwire::Tag;
use spanwire::Value;
use tracing::trace;
use tracing::warn;

use crate::catalog::Accessor;
use crate::catalog::Catalog;
use crate::catalog::InvokeCx;
use crate::catalog::ParamType;
use crate::catalog::TypeDescriptor;
use crate::fastpath::FastEntry;
use crate::fastpath::FastPath;
use crate::fastpath::FastTarget;
use crate::handles::Handle;
use crate::handles::HandleTable;
use crate::handles::HostObject;

const EXACT: u8 = 0;
const WIDEN: u8 = 1;
const NARROW: u8 = 2;

/// Ranks one argument against one declared parameter. `None` disqualifies.
fn rank(arg: &Value, param: ParamType) -> Option<u8> {
    match (param, arg) {
        (ParamType::Any, _) => Some(EXACT),

        (ParamType::Bool, Value::Bool(_)) => Some(EXACT),

        (ParamType::Int32, Value::Int32(_)) => Some(EXACT),
        (ParamType::Int32, Value::Int64(v)) => {
            i32::try_from(*v).ok().map(|_| NARROW)
        }
        (ParamType::Int32, Value::Double(d)) => {
            let as_i32 = *d as i32;
            (f64::from(as_i32) == *d).then_some(NARROW)
        }

        (ParamType::Int64, Value::Int64(_)) => Some(EXACT),
        (ParamType::Int64, Value::Int32(_)) => Some(WIDEN),

        (ParamType::Float32, Value::Float32(_)) => Some(EXACT),
        (ParamType::Float32, Value::Int32(_)) => Some(WIDEN),
        (ParamType::Float32, Value::Double(_)) => Some(NARROW),

        (ParamType::Double, Value::Double(_)) => Some(EXACT),
        (ParamType::Double, Value::Int32(_)) => Some(WIDEN),
        (ParamType::Double, Value::Int64(_)) => Some(WIDEN),
        (ParamType::Double, Value::Float32(_)) => Some(WIDEN),

        (ParamType::Str, Value::Str(_)) => Some(EXACT),
        (ParamType::Str, Value::Null) => Some(WIDEN),

        (ParamType::Handle, Value::Handle { .. }) => Some(EXACT),
        (ParamType::Handle, Value::Null) => Some(WIDEN),

        (ParamType::Json, Value::Json(_)) => Some(EXACT),
        (ParamType::Json, Value::Null) => Some(WIDEN),

        (ParamType::Vector3, Value::Vector3(_)) => Some(EXACT),
        (ParamType::Vector4, Value::Vector4 { .. }) => Some(EXACT),

        _ => None,
    }
}

/// Converts a ranked argument into the parameter's representation.
fn coerce(arg: &Value, param: ParamType) -> Value {
    match (param, arg) {
        (ParamType::Int32, Value::Int64(v)) => Value::Int32(*v as i32),
        (ParamType::Int32, Value::Double(d)) => Value::Int32(*d as i32),
        (ParamType::Int64, Value::Int32(v)) => Value::Int64(i64::from(*v)),
        (ParamType::Float32, Value::Int32(v)) => Value::Float32(*v as f32),
        (ParamType::Float32, Value::Double(d)) => Value::Float32(*d as f32),
        (ParamType::Double, Value::Int32(v)) => Value::Double(f64::from(*v)),
        (ParamType::Double, Value::Int64(v)) => Value::Double(*v as f64),
        (ParamType::Double, Value::Float32(v)) => Value::Double(f64::from(*v)),
        _ => arg.clone(),
    }
}

/// Scores a full signature: `(worst rank, rank sum)`, lower is better.
fn score(params: &[ParamType], args: &[Value]) -> Option<(u8, u32)> {
    if params.len() != args.len() {
        return None;
    }
    let mut worst = EXACT;
    let mut sum = 0u32;
    for (arg, param) in args.iter().zip(params) {
        let r = rank(arg, *param)?;
        worst = worst.max(r);
        sum += u32::from(r);
    }
    Some((worst, sum))
}

/// Picks the best-scoring candidate. `Ok(None)` means no candidate was
/// viable; a tie at the best score is `AmbiguousMember`.
fn select<'a, T>(
    candidates: impl Iterator<Item = (&'a [ParamType], T)>,
    args: &[Value],
    context: &str,
) -> std::result::Result<Option<T>, CallError> {
    let mut best: Option<((u8, u32), T)> = None;
    let mut tied = false;

    for (params, item) in candidates {
        let Some(s) = score(params, args) else { continue };
        match &best {
            Some((b, _)) if s > *b => {}
            Some((b, _)) if s == *b => tied = true,
            _ => {
                best = Some((s, item));
                tied = false;
            }
        }
    }

    match best {
        Some(_) if tied => Err(CallError::new(
            ErrorCode::AmbiguousMember,
            format!("ambiguous call to {} for {} argument(s)", context, args.len()),
        )),
        Some((_, item)) => Ok(Some(item)),
        None => Ok(None),
    }
}

fn shape(args: &[Value]) -> Vec<Tag> {
    args.iter().map(Value::tag).collect()
}

fn coerce_all(params: &[ParamType], args: &[Value]) -> Vec<Value> {
    args.iter()
        .zip(params)
        .map(|(arg, param)| coerce(arg, *param))
        .collect()
}

/// Runs a host callable, absorbing both `Err` and panics into a
/// `HostException` carrying the call context.
fn absorb<T>(
    context: &str,
    f: impl FnOnce() -> anyhow::Result<T>,
) -> std::result::Result<T, CallError> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => {
            warn!(call = context, error = %err, "host callable failed");
            Err(CallError::new(
                ErrorCode::HostException,
                format!("{}: {}", context, err),
            ))
        }
        Err(panic) => {
            let msg = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".to_string());
            warn!(call = context, panic = %msg, "host callable panicked");
            Err(CallError::new(
                ErrorCode::HostException,
                format!("{}: panicked: {}", context, msg),
            ))
        }
    }
}

/// The dispatcher for one guest context. Cheap to construct; all state
/// lives in the shared registries it references.
pub struct Dispatcher {
    catalog: Arc<Catalog>,
    handles: Arc<HandleTable>,
    fastpath: Arc<FastPath>,
}

impl Dispatcher {
    pub fn new(catalog: Arc<Catalog>, handles: Arc<HandleTable>, fastpath: Arc<FastPath>) -> Self {
        Self { catalog, handles, fastpath }
    }

    pub fn handles(&self) -> &HandleTable {
        &self.handles
    }

    /// Dispatches one call. Infallible by construction: every internal
    /// failure becomes a `CallResult` with a non-zero code.
    pub fn dispatch(&self, req: &CallRequest) -> CallResult {
        match self.dispatch_inner(req) {
            Ok(value) => CallResult::ok(value),
            Err(err) => {
                warn!(
                    type_name = %req.type_name,
                    member = %req.member_name,
                    kind = %req.kind,
                    args = req.args.len(),
                    code = ?err.code,
                    message = %err.message,
                    "dispatch failed"
                );
                CallResult::error(err)
            }
        }
    }

    fn dispatch_inner(&self, req: &CallRequest) -> std::result::Result<Value, CallError> {
        // Boolean queries never fail; absence is an answer.
        match req.kind {
            CallKind::TypeExists => {
                return Ok(Value::Bool(self.catalog.contains(&req.type_name)));
            }
            CallKind::IsEnumType => {
                let is_enum = self
                    .catalog
                    .lookup(&req.type_name)
                    .is_some_and(|t| t.is_enum);
                return Ok(Value::Bool(is_enum));
            }
            _ => {}
        }

        if let Some(entry) = self.fastpath.lookup(
            &req.type_name,
            &req.member_name,
            req.kind,
            req.is_static,
            &shape(&req.args),
        ) {
            return self.run_fast(req, &entry);
        }

        let descriptor = self.catalog.lookup(&req.type_name).ok_or_else(|| {
            CallError::new(
                ErrorCode::TypeNotFound,
                format!("type '{}' is not registered", req.type_name),
            )
        })?;

        match req.kind {
            CallKind::Construct => self.construct(req, &descriptor),
            CallKind::Method => self.method(req, &descriptor),
            CallKind::GetProp => self.get_accessor(req, &descriptor.properties, "property"),
            CallKind::SetProp => self.set_accessor(req, &descriptor.properties, "property"),
            CallKind::GetField => self.get_accessor(req, &descriptor.fields, "field"),
            CallKind::SetField => self.set_accessor(req, &descriptor.fields, "field"),
            CallKind::TypeExists | CallKind::IsEnumType => unreachable!("handled above"),
        }
    }

    /// Executes a memoized resolution. Entries are keyed by argument tags
    /// and installed only for exact matches, so a hit is guaranteed to be
    /// the overload the full search would pick for this call.
    fn run_fast(
        &self,
        req: &CallRequest,
        entry: &FastEntry,
    ) -> std::result::Result<Value, CallError> {
        let cx = InvokeCx { handles: &self.handles };
        let context = format!("{}.{}", req.type_name, req.member_name);

        match &entry.target {
            FastTarget::Ctor(ctor) => {
                let coerced = coerce_all(&ctor.params, &req.args);
                let obj = absorb(&context, || (ctor.func)(&cx, &coerced))?;
                Ok(cx.handle_value(obj))
            }
            FastTarget::Method(overload) => {
                let receiver = self.receiver(req)?;
                let coerced = coerce_all(&overload.params, &req.args);
                absorb(&context, || (overload.func)(&cx, receiver.as_ref(), &coerced))
            }
            FastTarget::Getter(getter) => {
                let receiver = self.receiver(req)?;
                absorb(&context, || getter(&cx, receiver.as_ref(), &[]))
            }
            FastTarget::Setter(setter) => {
                let receiver = self.receiver(req)?;
                absorb(&context, || setter(&cx, receiver.as_ref(), &req.args))?;
                Ok(Value::Null)
            }
        }
    }

    /// Resolves the receiver for an instance call; static calls have none.
    fn receiver(
        &self,
        req: &CallRequest,
    ) -> std::result::Result<Option<Arc<dyn HostObject>>, CallError> {
        if req.is_static || req.target == 0 {
            return Ok(None);
        }
        self.handles
            .resolve(Handle(req.target))
            .map(Some)
            .map_err(|e| CallError::new(ErrorCode::InvalidHandle, e.to_string()))
    }

    fn construct(
        &self,
        req: &CallRequest,
        descriptor: &Arc<TypeDescriptor>,
    ) -> std::result::Result<Value, CallError> {
        let context = format!("new {}", descriptor.name);
        let candidates = descriptor
            .constructors
            .iter()
            .map(|c| (c.params.as_slice(), c));

        let ctor = select(candidates, &req.args, &context)?.ok_or_else(|| {
            CallError::new(
                ErrorCode::ArgumentCoercionFailed,
                format!("no constructor of '{}' accepts {} argument(s)", descriptor.name, req.args.len()),
            )
        })?;

        let cx = InvokeCx { handles: &self.handles };
        let coerced = coerce_all(&ctor.params, &req.args);
        let obj = absorb(&context, || (ctor.func)(&cx, &coerced))?;
        let value = cx.handle_value(obj);

        if score(&ctor.params, &req.args) == Some((EXACT, 0)) {
            self.install(req, FastTarget::Ctor(ctor.clone()));
        }
        Ok(value)
    }

    fn method(
        &self,
        req: &CallRequest,
        descriptor: &Arc<TypeDescriptor>,
    ) -> std::result::Result<Value, CallError> {
        let method = descriptor.methods.get(&req.member_name).ok_or_else(|| {
            CallError::new(
                ErrorCode::MemberNotFound,
                format!("no method '{}' on '{}'", req.member_name, descriptor.name),
            )
        })?;
        if method.is_static != req.is_static {
            return Err(CallError::new(
                ErrorCode::MemberNotFound,
                format!(
                    "method '{}' on '{}' is {}",
                    req.member_name,
                    descriptor.name,
                    if method.is_static { "static" } else { "an instance method" },
                ),
            ));
        }

        let context = format!("{}.{}", descriptor.name, req.member_name);
        let candidates = method.overloads.iter().map(|o| (o.params.as_slice(), o));
        let overload = select(candidates, &req.args, &context)?.ok_or_else(|| {
            CallError::new(
                ErrorCode::ArgumentCoercionFailed,
                format!("no overload of {} accepts these {} argument(s)", context, req.args.len()),
            )
        })?;

        let receiver = self.receiver(req)?;
        let cx = InvokeCx { handles: &self.handles };
        let coerced = coerce_all(&overload.params, &req.args);
        let value = absorb(&context, || (overload.func)(&cx, receiver.as_ref(), &coerced))?;

        if score(&overload.params, &req.args) == Some((EXACT, 0)) {
            self.install(req, FastTarget::Method(overload.clone()));
        }
        Ok(value)
    }

    fn get_accessor(
        &self,
        req: &CallRequest,
        members: &std::collections::HashMap<String, Accessor>,
        what: &str,
    ) -> std::result::Result<Value, CallError> {
        let accessor = members.get(&req.member_name).ok_or_else(|| {
            CallError::new(
                ErrorCode::MemberNotFound,
                format!("no {} '{}' on '{}'", what, req.member_name, req.type_name),
            )
        })?;
        let getter = accessor.getter.as_ref().ok_or_else(|| {
            CallError::new(
                ErrorCode::MemberNotFound,
                format!("{} '{}' on '{}' is write-only", what, req.member_name, req.type_name),
            )
        })?;

        let context = format!("{}.{}", req.type_name, req.member_name);
        let receiver = self.receiver(req)?;
        let cx = InvokeCx { handles: &self.handles };
        let value = absorb(&context, || getter(&cx, receiver.as_ref(), &[]))?;

        self.install(req, FastTarget::Getter(getter.clone()));
        Ok(value)
    }

    fn set_accessor(
        &self,
        req: &CallRequest,
        members: &std::collections::HashMap<String, Accessor>,
        what: &str,
    ) -> std::result::Result<Value, CallError> {
        if req.args.len() != 1 {
            return Err(CallError::new(
                ErrorCode::ArgumentCoercionFailed,
                format!("setting a {} takes exactly one value", what),
            ));
        }
        let accessor = members.get(&req.member_name).ok_or_else(|| {
            CallError::new(
                ErrorCode::MemberNotFound,
                format!("no {} '{}' on '{}'", what, req.member_name, req.type_name),
            )
        })?;
        let setter = accessor.setter.as_ref().ok_or_else(|| {
            CallError::new(
                ErrorCode::MemberNotFound,
                format!("{} '{}' on '{}' is read-only", what, req.member_name, req.type_name),
            )
        })?;

        let context = format!("{}.{}", req.type_name, req.member_name);
        let receiver = self.receiver(req)?;
        let cx = InvokeCx { handles: &self.handles };
        absorb(&context, || setter(&cx, receiver.as_ref(), &req.args))?;

        self.install(req, FastTarget::Setter(setter.clone()));
        Ok(Value::Null)
    }

    fn install(&self, req: &CallRequest, target: FastTarget) {
        trace!(
            type_name = %req.type_name,
            member = %req.member_name,
            kind = %req.kind,
            "fast-path install"
        );
        self.fastpath.install(
            &req.type_name,
            &req.member_name,
            req.kind,
            req.is_static,
            &shape(&req.args),
            FastEntry { target },
        );
    }
}
