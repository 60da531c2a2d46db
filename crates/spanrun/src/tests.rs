//! Tests for the runtime bridge with a scripted mock guest.

use std::sync::Arc;
use std::sync::atomic::AtomicI64;
use std::sync::atomic::Ordering;

use spancall::CallKind;
use spancall::CallRequest;
use spancall::ErrorCode;
use spanwire::Value;

use crate::bridge::AsyncBridge;
use crate::bridge::DeferredResolver;
use crate::bridge::TaskId;
use crate::catalog::Catalog;
use crate::catalog::ParamType;
use crate::catalog::TypeBuilder;
use crate::catalog::host_fn;
use crate::context::BridgeRuntime;
use crate::dispatch::Dispatcher;
use crate::fastpath::FastPath;
use crate::guest::EvalMode;
use crate::guest::GuestEngine;
use crate::handles::Handle;
use crate::handles::HandleTable;
use crate::handles::HostObject;
use crate::mock_guest::MockGuest;
use crate::zeroalloc::Error as ZaError;
use crate::zeroalloc::Slot;
use crate::zeroalloc::SlotKind;
use crate::zeroalloc::ZeroAlloc;

/// A small host object the catalog fixtures dispatch against.
struct Counter {
    value: AtomicI64,
    seed: AtomicI64,
}

impl Counter {
    fn new(start: i64) -> Self {
        Self { value: AtomicI64::new(start), seed: AtomicI64::new(0) }
    }
}

impl HostObject for Counter {
    fn type_name(&self) -> &str {
        "Game.Counter"
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

fn counter_of(obj: &Arc<dyn HostObject>) -> &Counter {
    obj.as_any().downcast_ref::<Counter>().expect("not a Counter")
}

/// Registers the Game.Counter fixture type.
fn fixture_catalog() -> Arc<Catalog> {
    let catalog = Catalog::new();

    let builder = TypeBuilder::new("Game.Counter")
        .ctor(vec![], |_, _| Ok(Arc::new(Counter::new(0)) as Arc<dyn HostObject>))
        .ctor(vec![ParamType::Int32], |_, args| {
            let Value::Int32(start) = args[0] else { anyhow::bail!("expected i32") };
            Ok(Arc::new(Counter::new(i64::from(start))) as Arc<dyn HostObject>)
        })
        .static_method("Add", vec![ParamType::Int32, ParamType::Int32], |_, _, args| {
            let (Value::Int32(a), Value::Int32(b)) = (&args[0], &args[1]) else {
                anyhow::bail!("expected i32 args");
            };
            Ok(Value::Int32(a + b))
        })
        .static_method("Add", vec![ParamType::Double, ParamType::Double], |_, _, args| {
            let (Value::Double(a), Value::Double(b)) = (&args[0], &args[1]) else {
                anyhow::bail!("expected f64 args");
            };
            Ok(Value::Double(a + b))
        })
        .method("Increment", vec![ParamType::Int32], |_, recv, args| {
            let Value::Int32(by) = args[0] else { anyhow::bail!("expected i32") };
            let counter = counter_of(recv.expect("instance method"));
            let value = counter.value.fetch_add(i64::from(by), Ordering::Relaxed);
            Ok(Value::Int64(value + i64::from(by)))
        })
        .static_method("Explode", vec![], |_, _, _| panic!("counter exploded"))
        .static_method("Version", vec![], |_, _, _| Ok(Value::Str("1.2.0".into())))
        .property(
            "Value",
            Some(host_fn(|_, recv, _| {
                let counter = counter_of(recv.expect("instance property"));
                Ok(Value::Int64(counter.value.load(Ordering::Relaxed)))
            })),
            Some(host_fn(|_, recv, args| {
                let counter = counter_of(recv.expect("instance property"));
                let next = match &args[0] {
                    Value::Int64(v) => *v,
                    Value::Int32(v) => i64::from(*v),
                    other => anyhow::bail!("cannot assign {} to Value", other.shape()),
                };
                counter.value.store(next, Ordering::Relaxed);
                Ok(Value::Null)
            })),
        )
        .field(
            "Seed",
            Some(host_fn(|_, recv, _| {
                let counter = counter_of(recv.expect("instance field"));
                Ok(Value::Int64(counter.seed.load(Ordering::Relaxed)))
            })),
            Some(host_fn(|_, recv, args| {
                let counter = counter_of(recv.expect("instance field"));
                let Value::Int64(next) = args[0] else {
                    anyhow::bail!("cannot assign {} to Seed", args[0].shape());
                };
                counter.seed.store(next, Ordering::Relaxed);
                Ok(Value::Null)
            })),
        )
        .field(
            "Epoch",
            Some(host_fn(|_, _, _| Ok(Value::Int64(2020)))),
            None,
        )
        .field(
            "Scratch",
            None,
            Some(host_fn(|_, recv, args| {
                let counter = counter_of(recv.expect("instance field"));
                let Value::Int64(next) = args[0] else {
                    anyhow::bail!("cannot assign {} to Scratch", args[0].shape());
                };
                counter.seed.store(next, Ordering::Relaxed);
                Ok(Value::Null)
            })),
        );
    catalog.register(builder).expect("fixture registration");

    let colors = TypeBuilder::new("Game.Color").enum_type();
    catalog.register(colors).expect("enum registration");

    Arc::new(catalog)
}

fn fixture_dispatcher() -> Dispatcher {
    Dispatcher::new(fixture_catalog(), Arc::new(HandleTable::new()), Arc::new(FastPath::new()))
}

fn construct_counter(dispatcher: &Dispatcher, start: i32) -> u32 {
    let req = CallRequest::on_type(
        "Game.Counter",
        "",
        CallKind::Construct,
        vec![Value::Int32(start)],
    );
    let result = dispatcher.dispatch(&req);
    assert!(result.is_ok(), "construct failed: {:?}", result.message);
    match result.value {
        Value::Handle { handle, .. } => handle,
        other => panic!("expected handle, got {:?}", other),
    }
}

// ==== HANDLE TABLE ====

#[test]
fn test_handles_are_identity_deduplicated() {
    let table = HandleTable::new();
    let a: Arc<dyn HostObject> = Arc::new(Counter::new(0));
    let b: Arc<dyn HostObject> = Arc::new(Counter::new(0));

    let ha = table.register(a.clone());
    let ha_again = table.register(a.clone());
    let hb = table.register(b);

    assert_eq!(ha, ha_again);
    assert_ne!(ha, hb);
    assert_eq!(table.count(), 2);
}

#[test]
fn test_release_is_idempotent_and_forgets_only_the_handle() {
    let table = HandleTable::new();
    let obj: Arc<dyn HostObject> = Arc::new(Counter::new(7));
    let handle = table.register(obj.clone());

    table.release(handle);
    table.release(handle);

    assert!(table.resolve(handle).is_err());
    assert_eq!(table.count(), 0);
    // The object itself outlives the table entry.
    assert_eq!(counter_of(&obj).value.load(Ordering::Relaxed), 7);
}

#[test]
fn test_released_object_gets_a_fresh_handle_on_reregister() {
    let table = HandleTable::new();
    let obj: Arc<dyn HostObject> = Arc::new(Counter::new(0));

    let first = table.register(obj.clone());
    table.release(first);
    let second = table.register(obj);

    assert_ne!(first, second, "handles are never recycled");
    assert!(table.resolve(first).is_err());
    assert!(table.resolve(second).is_ok());
}

#[test]
fn test_clear_all_and_peak_tracking() {
    let table = HandleTable::new();
    for i in 0..5 {
        table.register(Arc::new(Counter::new(i)) as Arc<dyn HostObject>);
    }
    assert_eq!(table.count(), 5);
    assert_eq!(table.peak(), 5);

    table.clear_all();
    assert_eq!(table.count(), 0);
    assert_eq!(table.peak(), 5, "peak survives clear");

    table.reset_peak();
    assert_eq!(table.peak(), 0);
}

// ==== CATALOG ====

#[test]
fn test_catalog_rejects_duplicate_accessors() {
    let catalog = Catalog::new();
    let builder = TypeBuilder::new("Dup")
        .field("X", None, None)
        .field("X", None, None);
    assert!(catalog.register(builder).is_err());
}

#[test]
fn test_catalog_rejects_property_field_collision() {
    let catalog = Catalog::new();
    let builder = TypeBuilder::new("Dup")
        .property("X", None, None)
        .field("X", None, None);
    assert!(catalog.register(builder).is_err());
}

// ==== DISPATCH ====

#[test]
fn test_construct_returns_hinted_handle() {
    let dispatcher = fixture_dispatcher();
    let req = CallRequest::on_type("Game.Counter", "", CallKind::Construct, vec![]);
    let result = dispatcher.dispatch(&req);

    assert!(result.is_ok());
    match result.value {
        Value::Handle { handle, hint } => {
            assert_ne!(handle, 0);
            assert_eq!(hint.as_deref(), Some("Game.Counter"));
        }
        other => panic!("expected handle, got {:?}", other),
    }
}

#[test]
fn test_overload_prefers_exact_integer_match() {
    let dispatcher = fixture_dispatcher();
    let req = CallRequest::on_type(
        "Game.Counter",
        "Add",
        CallKind::Method,
        vec![Value::Int32(2), Value::Int32(3)],
    );
    let result = dispatcher.dispatch(&req);
    assert_eq!(result.value, Value::Int32(5), "integer overload should win");
}

#[test]
fn test_overload_widens_into_floating_signature() {
    let dispatcher = fixture_dispatcher();
    let req = CallRequest::on_type(
        "Game.Counter",
        "Add",
        CallKind::Method,
        vec![Value::Double(2.5), Value::Int32(3)],
    );
    let result = dispatcher.dispatch(&req);
    assert_eq!(result.value, Value::Double(5.5), "floating overload should win");
}

#[test]
fn test_ambiguous_overload_is_an_error_not_a_pick() {
    let catalog = Catalog::new();
    let builder = TypeBuilder::new("Amb")
        .static_method("F", vec![ParamType::Int64], |_, _, _| Ok(Value::Null))
        .static_method("F", vec![ParamType::Float32], |_, _, _| Ok(Value::Null));
    catalog.register(builder).unwrap();

    let dispatcher = Dispatcher::new(
        Arc::new(catalog),
        Arc::new(HandleTable::new()),
        Arc::new(FastPath::new()),
    );
    // Int32 widens equally into Int64 and Float32.
    let req = CallRequest::on_type("Amb", "F", CallKind::Method, vec![Value::Int32(1)]);
    let result = dispatcher.dispatch(&req);
    assert_eq!(result.code, ErrorCode::AmbiguousMember);
}

#[test]
fn test_missing_member_is_member_not_found() {
    let dispatcher = fixture_dispatcher();
    let req = CallRequest::on_type("Game.Counter", "Frobnicate", CallKind::Method, vec![]);
    let result = dispatcher.dispatch(&req);

    assert!(!result.is_ok());
    assert_eq!(result.code, ErrorCode::MemberNotFound);
    assert!(result.message.is_some());
}

#[test]
fn test_missing_type_is_type_not_found() {
    let dispatcher = fixture_dispatcher();
    let req = CallRequest::on_type("No.Such.Type", "M", CallKind::Method, vec![]);
    assert_eq!(dispatcher.dispatch(&req).code, ErrorCode::TypeNotFound);
}

#[test]
fn test_instance_call_through_handle_and_invalid_after_release() {
    let dispatcher = fixture_dispatcher();
    let handle = construct_counter(&dispatcher, 10);

    let req = CallRequest::on_target(
        "Game.Counter",
        "Increment",
        CallKind::Method,
        handle,
        vec![Value::Int32(5)],
    );
    assert_eq!(dispatcher.dispatch(&req).value, Value::Int64(15));

    dispatcher.handles().release(Handle(handle));
    let result = dispatcher.dispatch(&req);
    assert_eq!(result.code, ErrorCode::InvalidHandle);
}

#[test]
fn test_property_set_then_get_round_trips() {
    let dispatcher = fixture_dispatcher();
    let handle = construct_counter(&dispatcher, 0);

    let set = CallRequest::on_target(
        "Game.Counter",
        "Value",
        CallKind::SetProp,
        handle,
        vec![Value::Int64(99)],
    );
    assert!(dispatcher.dispatch(&set).is_ok());

    let get = CallRequest::on_target("Game.Counter", "Value", CallKind::GetProp, handle, vec![]);
    assert_eq!(dispatcher.dispatch(&get).value, Value::Int64(99));
}

#[test]
fn test_field_set_then_get_round_trips() {
    let dispatcher = fixture_dispatcher();
    let handle = construct_counter(&dispatcher, 0);

    let set = CallRequest::on_target(
        "Game.Counter",
        "Seed",
        CallKind::SetField,
        handle,
        vec![Value::Int64(-41)],
    );
    assert!(dispatcher.dispatch(&set).is_ok());

    let get = CallRequest::on_target("Game.Counter", "Seed", CallKind::GetField, handle, vec![]);
    assert_eq!(dispatcher.dispatch(&get).value, Value::Int64(-41));
}

#[test]
fn test_read_only_field_rejects_assignment() {
    let dispatcher = fixture_dispatcher();
    let handle = construct_counter(&dispatcher, 0);

    let get = CallRequest::on_target("Game.Counter", "Epoch", CallKind::GetField, handle, vec![]);
    assert_eq!(dispatcher.dispatch(&get).value, Value::Int64(2020));

    let set = CallRequest::on_target(
        "Game.Counter",
        "Epoch",
        CallKind::SetField,
        handle,
        vec![Value::Int64(1999)],
    );
    let result = dispatcher.dispatch(&set);
    assert_eq!(result.code, ErrorCode::MemberNotFound);
    assert!(result.message.unwrap().contains("read-only"));
}

#[test]
fn test_write_only_field_rejects_read() {
    let dispatcher = fixture_dispatcher();
    let handle = construct_counter(&dispatcher, 0);

    let set = CallRequest::on_target(
        "Game.Counter",
        "Scratch",
        CallKind::SetField,
        handle,
        vec![Value::Int64(8)],
    );
    assert!(dispatcher.dispatch(&set).is_ok());

    let get = CallRequest::on_target("Game.Counter", "Scratch", CallKind::GetField, handle, vec![]);
    let result = dispatcher.dispatch(&get);
    assert_eq!(result.code, ErrorCode::MemberNotFound);
    assert!(result.message.unwrap().contains("write-only"));
}

#[test]
fn test_type_queries_never_fail() {
    let dispatcher = fixture_dispatcher();

    let exists = CallRequest::on_type("Game.Counter", "", CallKind::TypeExists, vec![]);
    assert_eq!(dispatcher.dispatch(&exists).value, Value::Bool(true));

    let missing = CallRequest::on_type("No.Such.Type", "", CallKind::TypeExists, vec![]);
    let result = dispatcher.dispatch(&missing);
    assert!(result.is_ok(), "absence is an answer, not an error");
    assert_eq!(result.value, Value::Bool(false));

    let is_enum = CallRequest::on_type("Game.Color", "", CallKind::IsEnumType, vec![]);
    assert_eq!(dispatcher.dispatch(&is_enum).value, Value::Bool(true));

    let not_enum = CallRequest::on_type("Game.Counter", "", CallKind::IsEnumType, vec![]);
    assert_eq!(dispatcher.dispatch(&not_enum).value, Value::Bool(false));
}

#[test]
fn test_host_panic_becomes_host_exception() {
    let dispatcher = fixture_dispatcher();
    let req = CallRequest::on_type("Game.Counter", "Explode", CallKind::Method, vec![]);
    let result = dispatcher.dispatch(&req);

    assert_eq!(result.code, ErrorCode::HostException);
    assert!(result.message.unwrap().contains("counter exploded"));
}

#[test]
fn test_static_method_does_not_need_a_target() {
    let dispatcher = fixture_dispatcher();
    let req = CallRequest::on_type("Game.Counter", "Version", CallKind::Method, vec![]);
    assert_eq!(dispatcher.dispatch(&req).value, Value::Str("1.2.0".into()));
}

// ==== FAST PATH ====

#[test]
fn test_fastpath_transparency() {
    // The same sequence of calls, registry on vs. off, must produce the
    // same results member for member.
    let run = |enabled: bool| {
        let fastpath = Arc::new(FastPath::new());
        fastpath.set_enabled(enabled);
        let dispatcher =
            Dispatcher::new(fixture_catalog(), Arc::new(HandleTable::new()), fastpath.clone());

        let mut outcomes = Vec::new();
        let handle = construct_counter(&dispatcher, 3);
        for _ in 0..3 {
            let req = CallRequest::on_target(
                "Game.Counter",
                "Increment",
                CallKind::Method,
                handle,
                vec![Value::Int32(2)],
            );
            outcomes.push(dispatcher.dispatch(&req));
            let get = CallRequest::on_target(
                "Game.Counter",
                "Value",
                CallKind::GetProp,
                handle,
                vec![],
            );
            outcomes.push(dispatcher.dispatch(&get));
        }
        (outcomes, fastpath)
    };

    let (with, fast_on) = run(true);
    let (without, fast_off) = run(false);
    assert_eq!(with, without);

    assert!(fast_on.hits() > 0, "repeat calls should hit the registry");
    assert_eq!(fast_off.hits(), 0);
    assert!(fast_off.is_empty(), "disabled registry installs nothing");
}

#[test]
fn test_fastpath_primed_entry_cannot_redirect_overload_selection() {
    // Priming one overload must not let a later call with different
    // argument tags ride the memoized entry. Registry on and off must
    // pick the same overloads.
    let run = |enabled: bool| {
        let fastpath = Arc::new(FastPath::new());
        fastpath.set_enabled(enabled);
        let dispatcher =
            Dispatcher::new(fixture_catalog(), Arc::new(HandleTable::new()), fastpath);

        let dbl = CallRequest::on_type(
            "Game.Counter",
            "Add",
            CallKind::Method,
            vec![Value::Double(2.0), Value::Double(3.0)],
        );
        let int = CallRequest::on_type(
            "Game.Counter",
            "Add",
            CallKind::Method,
            vec![Value::Int32(2), Value::Int32(3)],
        );
        (dispatcher.dispatch(&dbl).value, dispatcher.dispatch(&int).value)
    };

    let with = run(true);
    let without = run(false);
    assert_eq!(with, (Value::Double(5.0), Value::Int32(5)), "exact overload must win");
    assert_eq!(with, without);
}

#[test]
fn test_fastpath_miss_falls_back_when_tags_change() {
    let dispatcher = fixture_dispatcher();

    // Prime the registry with the integer overload, then call with
    // doubles under the same arity. The tag-keyed registry misses and
    // the full search picks the floating overload.
    let int_req = CallRequest::on_type(
        "Game.Counter",
        "Add",
        CallKind::Method,
        vec![Value::Int32(1), Value::Int32(2)],
    );
    assert_eq!(dispatcher.dispatch(&int_req).value, Value::Int32(3));

    let dbl_req = CallRequest::on_type(
        "Game.Counter",
        "Add",
        CallKind::Method,
        vec![Value::Double(1.5), Value::Double(2.0)],
    );
    assert_eq!(dispatcher.dispatch(&dbl_req).value, Value::Double(3.5));
}

// ==== ZERO-ALLOC BINDINGS ====

#[test]
fn test_slot_bit_reinterpretation_round_trips() {
    assert_eq!(Slot::from_i32(-7).as_i32(), -7);
    assert_eq!(Slot::from_i64(i64::MIN).as_i64(), i64::MIN);
    assert_eq!(Slot::from_f32(1.5).as_f32(), 1.5);
    assert_eq!(Slot::from_f64(-0.0).as_f64().to_bits(), (-0.0f64).to_bits());
    assert!(Slot::from_f64(f64::NAN).as_f64().is_nan());
    assert!(Slot::from_bool(true).as_bool());
    assert_eq!(Slot::from_handle(41).as_handle(), 41);
}

#[test]
fn test_bind_and_invoke_scalar_functions() {
    let za = ZeroAlloc::new();

    let add = za
        .bind2([SlotKind::I32, SlotKind::I32], SlotKind::I32, |a, b| {
            Slot::from_i32(a.as_i32() + b.as_i32())
        })
        .unwrap();
    let answer = za.invoke(add, &[Slot::from_i32(40), Slot::from_i32(2)]).unwrap();
    assert_eq!(answer.as_i32(), 42);

    let zero = za.bind0([], SlotKind::F64, || Slot::from_f64(0.5)).unwrap();
    assert_eq!(za.invoke(zero, &[]).unwrap().as_f64(), 0.5);

    let sum8 = za
        .bind8(
            [SlotKind::I32; 8],
            SlotKind::I32,
            |a, b, c, d, e, f, g, h| {
                Slot::from_i32(
                    a.as_i32() + b.as_i32() + c.as_i32() + d.as_i32()
                        + e.as_i32() + f.as_i32() + g.as_i32() + h.as_i32(),
                )
            },
        )
        .unwrap();
    let slots: Vec<Slot> = (1..=8).map(Slot::from_i32).collect();
    assert_eq!(za.invoke(sum8, &slots).unwrap().as_i32(), 36);
}

#[test]
fn test_zeroalloc_rejects_bad_shapes() {
    let za = ZeroAlloc::new();

    let err = za.bind1([SlotKind::Unit], SlotKind::I32, |a| a);
    assert!(matches!(err, Err(ZaError::UnitParameter)));

    let id = za.bind1([SlotKind::I32], SlotKind::I32, |a| a).unwrap();
    let err = za.invoke(id, &[]);
    assert!(matches!(err, Err(ZaError::ArityMismatch { expected: 1, got: 0, .. })));

    let err = za.invoke(crate::zeroalloc::BindingId(9999), &[]);
    assert!(matches!(err, Err(ZaError::UnknownBinding(_))));
}

// ==== ASYNC BRIDGE ====

#[derive(Default)]
struct RecordingResolver {
    resolved: Vec<(TaskId, Value)>,
    rejected: Vec<(TaskId, String)>,
}

impl DeferredResolver for RecordingResolver {
    fn resolve(&mut self, task: TaskId, value: Value) {
        self.resolved.push((task, value));
    }

    fn reject(&mut self, task: TaskId, message: &str) {
        self.rejected.push((task, message.to_string()));
    }
}

/// Drains until at least `want` completions arrive or a deadline passes.
async fn drain_until(bridge: &AsyncBridge, resolver: &mut RecordingResolver, want: usize) {
    for _ in 0..1000 {
        let have = resolver.resolved.len() + resolver.rejected.len();
        if have >= want {
            return;
        }
        bridge.drain(resolver);
        tokio::time::sleep(std::time::Duration::from_millis(1)).await;
    }
    panic!("completions never arrived");
}

#[tokio::test]
async fn test_completion_is_delivered_only_by_drain() {
    let bridge = AsyncBridge::new();
    let mut resolver = RecordingResolver::default();

    let (tx, rx) = tokio::sync::oneshot::channel::<()>();
    let task = bridge.register_task(async move {
        let _ = rx.await;
        Ok(Value::Int32(123))
    });

    // Not completed yet; drain must deliver nothing and must not block.
    assert_eq!(bridge.drain(&mut resolver), 0);
    assert_eq!(bridge.in_flight(), 1);

    tx.send(()).unwrap();
    drain_until(&bridge, &mut resolver, 1).await;

    assert_eq!(resolver.resolved, vec![(task, Value::Int32(123))]);
    assert_eq!(bridge.in_flight(), 0);
}

#[tokio::test]
async fn test_completions_deliver_in_completion_order_not_registration_order() {
    let bridge = AsyncBridge::new();
    let mut resolver = RecordingResolver::default();

    // Registered first, finishes last.
    let (release, gate) = tokio::sync::oneshot::channel::<()>();
    let slow = bridge.register_task(async move {
        let _ = gate.await;
        Ok(Value::Str("slow".into()))
    });
    let quick = bridge.register_task(async { Ok(Value::Str("quick".into())) });

    // The first drain after the quick task finishes delivers it alone;
    // the slow task is still gated.
    drain_until(&bridge, &mut resolver, 1).await;
    assert_eq!(resolver.resolved, vec![(quick, Value::Str("quick".into()))]);
    assert_eq!(bridge.in_flight(), 1);

    release.send(()).unwrap();
    drain_until(&bridge, &mut resolver, 2).await;
    assert_eq!(
        resolver.resolved,
        vec![
            (quick, Value::Str("quick".into())),
            (slow, Value::Str("slow".into())),
        ]
    );
    assert_eq!(bridge.in_flight(), 0);
}

#[tokio::test]
async fn test_failed_task_rejects_the_deferred() {
    let bridge = AsyncBridge::new();
    let mut resolver = RecordingResolver::default();

    let task = bridge.register_task(async { Err("load failed".to_string()) });
    drain_until(&bridge, &mut resolver, 1).await;

    assert!(resolver.resolved.is_empty());
    assert_eq!(resolver.rejected, vec![(task, "load failed".to_string())]);
}

#[tokio::test]
async fn test_synchronous_completion_waits_for_the_next_drain() {
    let bridge = AsyncBridge::new();
    let mut resolver = RecordingResolver::default();

    let task = bridge.reserve_task();
    bridge.complete(task, Ok(Value::Str("now".into())));

    assert_eq!(bridge.drain(&mut resolver), 1);
    assert_eq!(resolver.resolved, vec![(task, Value::Str("now".into()))]);
}

// ==== CONTEXT REGISTRY ====

#[test]
fn test_context_lifecycle_invalidates_handles() {
    let runtime = BridgeRuntime::new();
    let ctx = runtime.create_context(Arc::new(MockGuest::new()));
    assert_eq!(runtime.context_count(), 1);

    let context = runtime.get_context(ctx).unwrap();
    let handle = context.handles.register(Arc::new(Counter::new(1)) as Arc<dyn HostObject>);
    assert!(context.handles.resolve(handle).is_ok());

    runtime.destroy_context(ctx).unwrap();
    assert!(runtime.get_context(ctx).is_err());
    assert!(context.handles.resolve(handle).is_err(), "teardown invalidates handles");
    assert!(runtime.destroy_context(ctx).is_err());
}

#[test]
fn test_pump_runs_jobs_then_drains() {
    let runtime = BridgeRuntime::new();
    let guest = Arc::new(MockGuest::new());
    guest.set_pending_jobs(4);
    let ctx = runtime.create_context(guest.clone());

    let context = runtime.get_context(ctx).unwrap();
    let task = context.bridge.reserve_task();
    context.bridge.complete(task, Ok(Value::Null));

    let mut resolver = RecordingResolver::default();
    let stats = runtime.pump(ctx, &mut resolver).unwrap();
    assert_eq!(stats.jobs, 4);
    assert_eq!(stats.completions, 1);

    // Jobs were consumed; a second pump finds nothing.
    let stats = runtime.pump(ctx, &mut resolver).unwrap();
    assert_eq!(stats.jobs, 0);
    assert_eq!(stats.completions, 0);
}

// ==== GUEST ENGINE ====

#[test]
fn test_mock_guest_scripts_eval_and_records_callbacks() {
    let guest = MockGuest::new();
    guest.push_eval(Ok("3".into()));
    guest.push_eval(Err(crate::guest::GuestError::Script("boom".into())));

    assert_eq!(guest.eval("1+2", "test.js", EvalMode::Global).unwrap(), "3");
    assert!(guest.eval("throw 1", "test.js", EvalMode::Global).is_err());
    assert_eq!(guest.eval_log().len(), 2);

    guest.invoke_callback(5, &[Value::Int32(1)]).unwrap();
    assert_eq!(guest.callback_log(), vec![(5, vec![Value::Int32(1)])]);

    guest.run_gc();
    assert_eq!(guest.gc_runs(), 1);
}
