#![allow(unused_crate_dependencies)]

//! Integration tests for the worklet runtime.
//!
//! These drive the public handle the way a host does: register bodies, run
//! descriptors, sync refs and feed the flush-loop guard.

use std::sync::Arc;

use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use rstest::rstest;
use serde_json::json;
use worklet_runtime::flush_guard::{FlushLoopGuard, GuardConfig, ManualDefer};
use worklet_runtime::primitives::{CallableHandle, CallableId, CapturedValue, ElementPtr, ExecutionId, RefHandle, RefId, WorkletDescriptor, WorkletId};
use worklet_runtime::{
	ElementHandle, EventReturnResult, ExecutionRefCounts, RunOptions, RunOutput, RuntimeError, SharedValue, Value, WorkletConfig, WorkletKind,
	WorkletRuntime,
};

fn init_tracing() {
	let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn runtime() -> WorkletRuntime {
	init_tracing();
	let mut config = WorkletConfig::default();
	config.runtime.strict_refs = true;
	config.guard.enabled = false;
	WorkletRuntime::builder().config(config).init()
}

fn traced_runtime() -> (WorkletRuntime, FlushLoopGuard, ManualDefer) {
	init_tracing();
	let defer = ManualDefer::new();
	let guard = FlushLoopGuard::new(GuardConfig::diagnostic(), Arc::new(defer.clone()));
	let rt = WorkletRuntime::builder().guard(guard.clone()).init();
	(rt, guard, defer)
}

fn descriptor(id: &str) -> CapturedValue {
	CapturedValue::worklet(WorkletDescriptor::new(id))
}

fn returned(output: Option<RunOutput>) -> Value {
	output.expect("invocation ran").into_return_value()
}

/// Registers a body that appends its first argument to the returned log.
fn recorder(rt: &WorkletRuntime, id: &str) -> Arc<Mutex<Vec<Value>>> {
	let log = Arc::new(Mutex::new(Vec::new()));
	let sink = Arc::clone(&log);
	rt.register(WorkletKind::MainThread, id, move |_, args| {
		sink.lock().push(args.first().cloned().unwrap_or_default());
		Ok(Value::Undefined)
	})
	.unwrap();
	log
}

#[test]
fn last_registration_wins() {
	let rt = runtime();
	rt.register(WorkletKind::MainThread, "h", |_, _| Ok(Value::from("first"))).unwrap();
	let interned = CapturedValue::Worklet(rt.intern(WorkletDescriptor::new("h")));

	assert_eq!(returned(rt.run(&interned, &[], RunOptions::default()).unwrap()), Value::from("first"));

	rt.register(WorkletKind::Ui, "h", |_, _| Ok(Value::from("second"))).unwrap();
	assert_eq!(returned(rt.run(&interned, &[], RunOptions::default()).unwrap()), Value::from("second"));
	assert_eq!(returned(rt.run(&descriptor("h"), &[], RunOptions::default()).unwrap()), Value::from("second"));
}

#[rstest]
#[case::scalar(CapturedValue::from(3))]
#[case::plain_map(CapturedValue::map([("a", 1)]))]
#[case::callable(CapturedValue::Callable(CallableHandle::new(CallableId(1))))]
#[case::element(CapturedValue::Element(ElementPtr(1)))]
fn malformed_descriptors_are_ignored(#[case] bad: CapturedValue) {
	let rt = runtime();
	assert_eq!(rt.run(&bad, &[], RunOptions::default()), Ok(None));
}

#[test]
fn unregistered_descriptor_is_fatal() {
	let rt = runtime();
	let err = rt.run(&descriptor("nope"), &[], RunOptions::default()).unwrap_err();
	assert_eq!(err, RuntimeError::UnregisteredWorklet(WorkletId::new("nope")));
}

#[test]
fn delayed_invocations_replay_once_in_order() {
	let rt = runtime();
	let pending = CapturedValue::Pending(WorkletId::new("H"));
	for v in ["v1", "v2", "v3"] {
		assert_eq!(rt.run(&pending, &[CapturedValue::from(v)], RunOptions::default()), Ok(None));
	}
	assert_eq!(rt.delayed(&WorkletId::new("H")), 3);

	let log = recorder(&rt, "H");
	assert_eq!(*log.lock(), vec![Value::from("v1"), Value::from("v2"), Value::from("v3")]);
	assert_eq!(rt.delayed(&WorkletId::new("H")), 0);

	rt.register(WorkletKind::MainThread, "H", |_, _| Ok(Value::Null)).unwrap();
	assert_eq!(log.lock().len(), 3);
}

#[test]
fn failed_replay_keeps_the_rest_queued() {
	let rt = runtime();
	let pending = CapturedValue::Pending(WorkletId::new("H"));
	for v in ["ok", "boom", "later"] {
		rt.run(&pending, &[CapturedValue::from(v)], RunOptions::default()).unwrap();
	}

	let seen = Arc::new(Mutex::new(Vec::new()));
	let sink = Arc::clone(&seen);
	let err = rt
		.register(WorkletKind::MainThread, "H", move |_, args| {
			let arg = args[0].as_str().unwrap_or_default().to_owned();
			sink.lock().push(arg.clone());
			if arg == "boom" { Err(RuntimeError::failed("boom")) } else { Ok(Value::Null) }
		})
		.unwrap_err();

	assert_eq!(err, RuntimeError::failed("boom"));
	assert_eq!(*seen.lock(), vec!["ok", "boom"]);
	assert_eq!(rt.delayed(&WorkletId::new("H")), 1);
}

fn event_on(element: u64) -> CapturedValue {
	CapturedValue::map([("currentTarget", CapturedValue::Element(ElementPtr(element)))])
}

#[test]
fn run_delayed_replays_events_for_one_element() {
	let rt = runtime();
	let seen = Arc::new(Mutex::new(Vec::new()));
	let sink = Arc::clone(&seen);
	rt.register(WorkletKind::MainThread, "1", move |this, args| {
		let wv = this.captured("wv").and_then(Value::as_live_ref).map(|wv| wv.get());
		sink.lock().push((wv, args[1].clone()));
		Ok(Value::Undefined)
	})
	.unwrap();

	let pending = CapturedValue::Pending(WorkletId::new("1"));
	for (element, arg) in [(1, 1), (1, 2), (2, 3)] {
		rt.run(&pending, &[event_on(element), CapturedValue::from(arg)], RunOptions::event()).unwrap();
	}
	assert_eq!(rt.delayed(&WorkletId::new("1")), 3);

	rt.apply_init_patch([(RefId(178), CapturedValue::from(333), None)]).unwrap();
	let full = Arc::new(WorkletDescriptor::new("1").capture("wv", RefHandle::new(RefId(178))));
	assert_eq!(rt.run_delayed(&full, ElementPtr(1)), Ok(2));

	let expected = vec![
		(Some(Value::Number(333.0)), Value::Number(1.0)),
		(Some(Value::Number(333.0)), Value::Number(2.0)),
	];
	assert_eq!(*seen.lock(), expected);
	assert_eq!(rt.delayed(&WorkletId::new("1")), 1);

	assert_eq!(rt.run_delayed(&full, ElementPtr(2)), Ok(1));
	assert_eq!(rt.delayed(&WorkletId::new("1")), 0);

	let unknown = Arc::new(WorkletDescriptor::new("other"));
	assert_eq!(
		rt.run_delayed(&unknown, ElementPtr(1)),
		Err(RuntimeError::UnregisteredWorklet(WorkletId::new("other")))
	);
}

#[test]
fn run_delayed_skips_cleared_events() {
	let rt = runtime();
	let log = recorder(&rt, "1");
	rt.run(&CapturedValue::Pending(WorkletId::new("1")), &[event_on(1)], RunOptions::event()).unwrap();
	rt.clear_delayed();

	assert_eq!(rt.run_delayed(&Arc::new(WorkletDescriptor::new("1")), ElementPtr(1)), Ok(0));
	assert!(log.lock().is_empty());
}

#[test]
fn clear_delayed_discards_without_replay() {
	let rt = runtime();
	rt.run(&CapturedValue::Pending(WorkletId::new("H")), &[], RunOptions::default()).unwrap();
	assert_eq!(rt.clear_delayed(), 1);

	let log = recorder(&rt, "H");
	assert!(log.lock().is_empty());
}

#[rstest]
#[case::stop(true, false, 1)]
#[case::immediate(false, true, 2)]
#[case::both(true, true, 3)]
fn event_runs_report_propagation_bits(#[case] stop: bool, #[case] immediate: bool, #[case] expected: u32) {
	let rt = runtime();
	rt.register(WorkletKind::MainThread, "tap", move |_, args| {
		let event = args[0].as_event().ok_or_else(|| RuntimeError::failed("not an event"))?;
		if stop {
			event.stop_propagation();
		}
		if immediate {
			event.stop_immediate_propagation();
			event.stop_immediate_propagation();
		}
		Ok(Value::from(event.event_type().unwrap_or_default()))
	})
	.unwrap();

	let event = CapturedValue::map([("type", CapturedValue::from("tap")), ("target", CapturedValue::Element(ElementPtr(4)))]);
	let output = rt.run(&descriptor("tap"), &[event], RunOptions::event()).unwrap().unwrap();

	assert_eq!(
		output,
		RunOutput::Event {
			return_value: Value::from("tap"),
			event_return_result: EventReturnResult::from_bits_truncate(expected),
		}
	);
	assert_eq!(output.event_return_result().map(|bits| bits.bits()), Some(expected));
}

#[test]
fn direct_runs_return_the_raw_value() {
	let rt = runtime();
	rt.register(WorkletKind::MainThread, "id", |_, args| Ok(args[0].clone())).unwrap();
	let event = CapturedValue::map([("type", "tap")]);

	let output = rt.run(&descriptor("id"), &[event], RunOptions::default()).unwrap().unwrap();
	assert_eq!(output.event_return_result(), None);
	assert_eq!(output.return_value().get("type"), Some(&Value::from("tap")));
}

#[test]
fn refs_keep_identity_across_invocations() {
	let rt = runtime();
	rt.register(WorkletKind::MainThread, "count", |this, _| {
		let counter = this.captured("counter").and_then(Value::as_live_ref).ok_or_else(|| RuntimeError::failed("no ref"))?;
		let next = counter.get().as_f64().unwrap_or(0.0) + 1.0;
		counter.set(next);
		Ok(Value::Number(next))
	})
	.unwrap();

	let ctx = CapturedValue::worklet(WorkletDescriptor::new("count").capture("counter", RefHandle::new(RefId(1)).with_initial(0)));
	for expected in [1.0, 2.0, 3.0] {
		assert_eq!(returned(rt.run(&ctx, &[], RunOptions::default()).unwrap()), Value::Number(expected));
	}

	let live = rt.get_or_create_ref(&RefHandle::new(RefId(1))).unwrap();
	assert_eq!(live.get(), Value::Number(3.0));
	assert!(live.ptr_eq(&rt.get_or_create_ref(&RefHandle::new(RefId(1))).unwrap()));
}

#[test]
fn init_patch_round_trip() {
	let rt = runtime();
	let existing = rt.get_or_create_ref(&RefHandle::new(RefId(5)).with_initial(1)).unwrap();

	rt.apply_init_patch([(RefId(5), CapturedValue::from(333), None)]).unwrap();
	let live = rt.get_or_create_ref(&RefHandle::new(RefId(5))).unwrap();

	assert_eq!(live.get(), Value::Number(333.0));
	assert!(live.ptr_eq(&existing));
}

#[test]
fn releasing_unknown_refs_is_a_no_op() {
	let rt = runtime();
	rt.release_ref(RefId(404));
	rt.release_ref(RefId(-404));
	assert!(rt.lookup_ref(RefId(404)).is_none());
}

#[test]
fn elements_attach_and_detach() {
	let rt = runtime();
	let handle = RefHandle::new(RefId(8));
	let live = rt.attach_element(&handle, Some(ElementPtr(12))).unwrap();
	assert_eq!(live.get().as_element(), Some(ElementHandle::new(ElementPtr(12))));

	rt.attach_element(&handle, None).unwrap();
	assert_eq!(live.get(), Value::Null);
}

fn nested(levels: usize) -> CapturedValue {
	let mut value = CapturedValue::list([0]);
	for _ in 1..levels {
		value = CapturedValue::list([value]);
	}
	value
}

#[test]
fn transform_depth_limit() {
	let rt = runtime();
	assert!(rt.transform(&nested(999), false).is_ok());

	let err = rt.transform(&nested(1000), false).unwrap_err();
	assert_eq!(err, RuntimeError::DepthExceeded { limit: 1000 });
	assert!(err.to_string().contains("1000"));
}

#[test]
fn interned_descriptors_are_memoized() {
	let rt = runtime();
	rt.register(WorkletKind::MainThread, "w", |_, _| Ok(Value::Null)).unwrap();

	let interned = CapturedValue::Worklet(rt.intern(WorkletDescriptor::new("w").capture("x", 1)));
	let first = rt.transform(&interned, true).unwrap();
	let second = rt.transform(&interned, true).unwrap();
	assert_eq!(first, second);

	let loose = descriptor("w");
	assert_ne!(rt.transform(&loose, true).unwrap(), rt.transform(&loose, true).unwrap());
	assert_ne!(rt.transform(&interned, false).unwrap(), first);

	let CapturedValue::Worklet(interned) = interned else { unreachable!() };
	let key = interned.key.unwrap();
	assert!(rt.forget(key).is_some());
	assert_ne!(rt.transform(&CapturedValue::Worklet(interned), true).unwrap(), first);
}

#[test]
fn callables_are_owned_by_the_execution() {
	init_tracing();
	let counts = Arc::new(ExecutionRefCounts::new());
	let rt = WorkletRuntime::builder().lifecycle(counts.clone()).init();
	rt.register(WorkletKind::MainThread, "cb", |this, args| {
		let captured = this.captured("cb").and_then(Value::as_callable).copied();
		let passed = args[0].as_callable().copied();
		Ok(Value::List(vec![
			captured.and_then(|h| h.execution_id).map_or(Value::Null, |id| Value::Number(id.0 as f64)),
			passed.and_then(|h| h.execution_id).map_or(Value::Null, |id| Value::Number(id.0 as f64)),
		]))
	})
	.unwrap();

	let callable = CallableHandle::new(CallableId(3));
	let ctx = CapturedValue::worklet(WorkletDescriptor::new("cb").capture("cb", callable).with_execution_id(ExecutionId(21)));
	let out = returned(rt.run(&ctx, &[callable.into()], RunOptions::default()).unwrap());

	assert_eq!(out, Value::List(vec![Value::Number(21.0), Value::Null]));
	assert_eq!(counts.count(ExecutionId(21)), 1);
	assert_eq!(counts.release_execution(ExecutionId(21)).len(), 1);
}

#[test]
fn runs_feed_the_flush_trace() {
	let (rt, guard, _defer) = traced_runtime();
	rt.register(WorkletKind::MainThread, "h", |this, _| {
		Ok(this.captured("r").and_then(Value::as_live_ref).map(|r| r.get()).unwrap_or_default())
	})
	.unwrap();

	let ctx = CapturedValue::worklet(WorkletDescriptor::new("h").capture("r", RefHandle::new(RefId(1))));
	let tap = CapturedValue::map([("type", "tap")]);
	rt.run(&ctx, &[tap], RunOptions::event()).unwrap();

	assert_eq!(guard.trace_text(), "ref:get 1 <- event:tap <- invoke h");
}

#[test]
fn flush_loop_trips_with_runtime_trace() {
	let (rt, guard, defer) = traced_runtime();
	rt.register(WorkletKind::MainThread, "h", |_, _| Ok(Value::Null)).unwrap();

	let mut tripped = None;
	for _ in 0..300 {
		rt.run(&descriptor("h"), &[], RunOptions::default()).unwrap();
		guard.mark(worklet_runtime::flush_guard::marker::RENDER);
		tripped = guard.on_flush_cycle().or(tripped);
	}
	let error = tripped.expect("guard tripped");
	assert_eq!(error.cycles, 257);
	assert!(error.trace.starts_with("render <- invoke h <- render"), "{}", error.trace);

	assert!(Arc::ptr_eq(&error, &guard.on_flush_cycle().unwrap()));
	guard.reset();
	assert!(guard.on_flush_cycle().is_none());
	assert_eq!(defer.pending(), 2);
}

#[test]
fn first_screen_values_move_to_persistent_refs() {
	let rt = runtime();
	// Bootstrap pass wrote to first-screen ref -1 but never touched -2.
	rt.get_or_create_ref(&RefHandle::new(RefId(-1)).with_initial(0)).unwrap().set(42);

	let first_screen = CapturedValue::worklet(
		WorkletDescriptor::new("h")
			.needing_hydration()
			.capture("touched", RefHandle::new(RefId(-1)))
			.capture("nested", CapturedValue::map([("untouched", RefHandle::new(RefId(-2)).with_initial(7))])),
	);
	let ctx = CapturedValue::worklet(
		WorkletDescriptor::new("h")
			.capture("touched", RefHandle::new(RefId(1)).with_initial(0))
			.capture("nested", CapturedValue::map([("untouched", RefHandle::new(RefId(2)).with_initial(5))])),
	);
	rt.hydrate_first_screen(&ctx, &first_screen).unwrap();

	assert_eq!(rt.lookup_ref(RefId(1)).unwrap().get(), Value::Number(42.0));
	assert!(rt.lookup_ref(RefId(2)).is_none());

	rt.clear_first_screen();
	assert!(rt.lookup_ref(RefId(-1)).is_none());
}

#[test]
fn first_screen_hydration_keeps_attached_elements() {
	let rt = runtime();
	rt.get_or_create_ref(&RefHandle::new(RefId(-1))).unwrap().set(1);
	rt.attach_element(&RefHandle::new(RefId(1)), Some(ElementPtr(9))).unwrap();

	let ctx = CapturedValue::worklet(WorkletDescriptor::new("h").capture("r", RefHandle::new(RefId(1))));
	let first_screen = CapturedValue::worklet(WorkletDescriptor::new("h").needing_hydration().capture("r", RefHandle::new(RefId(-1))));
	rt.hydrate_first_screen(&ctx, &first_screen).unwrap();
	assert_eq!(rt.lookup_ref(RefId(1)).unwrap().get().as_element(), Some(ElementHandle::new(ElementPtr(9))));
}

#[test]
fn unflagged_bootstrap_descriptors_are_not_hydrated() {
	let rt = runtime();
	rt.get_or_create_ref(&RefHandle::new(RefId(-1))).unwrap().set(42);

	let ctx = CapturedValue::worklet(WorkletDescriptor::new("h").capture("r", RefHandle::new(RefId(1)).with_initial(0)));
	let first_screen = CapturedValue::worklet(WorkletDescriptor::new("h").capture("r", RefHandle::new(RefId(-1))));
	rt.hydrate_first_screen(&ctx, &first_screen).unwrap();
	assert!(rt.lookup_ref(RefId(1)).is_none());

	let wire = json!({ "_wkltId": "h", "_needsHydration": true, "r": { "_wvid": -1 } });
	rt.hydrate_first_screen(&ctx, &CapturedValue::from_json(wire).unwrap()).unwrap();
	assert_eq!(rt.lookup_ref(RefId(1)).unwrap().get(), Value::Number(42.0));
}

#[test]
fn wire_descriptors_run() {
	let rt = runtime();
	rt.register(WorkletKind::MainThread, "sum", |this, args| {
		let base = this.captured("base").and_then(Value::as_f64).unwrap_or(0.0);
		Ok(Value::Number(args.iter().filter_map(Value::as_f64).sum::<f64>() + base))
	})
	.unwrap();

	let out = rt.run_json(json!({ "_wkltId": "sum", "base": 10 }), vec![json!(1), json!(2)], RunOptions::default()).unwrap();
	assert_eq!(returned(out), Value::Number(13.0));

	assert_eq!(rt.run_json(json!("not a worklet"), vec![], RunOptions::default()), Ok(None));
	assert_eq!(rt.run_json(json!({ "_lepusWorkletHash": "later" }), vec![json!(1)], RunOptions::default()), Ok(None));
	assert_eq!(rt.delayed(&WorkletId::new("later")), 1);
}

#[test]
fn hash_marked_descriptors_are_delayed_even_with_an_id() {
	let rt = runtime();
	let bootstrap = json!({ "_wkltId": "h", "_lepusWorkletHash": "h" });
	assert_eq!(rt.run_json(bootstrap.clone(), vec![json!(1)], RunOptions::default()), Ok(None));
	assert_eq!(rt.delayed(&WorkletId::new("h")), 1);

	let log = recorder(&rt, "h");
	assert_eq!(*log.lock(), vec![Value::Number(1.0)]);

	assert_eq!(rt.run_json(bootstrap, vec![json!(2)], RunOptions::default()), Ok(None));
	assert_eq!(log.lock().len(), 1);
	assert_eq!(rt.delayed(&WorkletId::new("h")), 1);
}

#[test]
fn bodies_may_reenter_the_runtime() {
	let rt = runtime();
	rt.register(WorkletKind::MainThread, "inner", |_, args| Ok(args[0].clone())).unwrap();

	let handle = rt.clone();
	rt.register(WorkletKind::MainThread, "outer", move |this, _| {
		handle.register(WorkletKind::Ui, "late", |_, _| Ok(Value::Null))?;
		let inner = CapturedValue::worklet(WorkletDescriptor::new("inner"));
		let out = handle.run(&inner, &[CapturedValue::from("nested")], RunOptions::default())?;
		assert!(this.captured("self").is_none());
		Ok(out.map(RunOutput::into_return_value).unwrap_or_default())
	})
	.unwrap();

	assert_eq!(returned(rt.run(&descriptor("outer"), &[], RunOptions::default()).unwrap()), Value::from("nested"));
	assert!(rt.is_registered(&WorkletId::new("late")));
	rt.teardown();
}

#[test]
fn runtimes_are_independent() {
	let a = runtime();
	let b = runtime();
	a.register(WorkletKind::MainThread, "h", |_, _| Ok(Value::Null)).unwrap();
	a.get_or_create_ref(&RefHandle::new(RefId(1))).unwrap();

	assert!(!b.is_registered(&WorkletId::new("h")));
	assert!(b.lookup_ref(RefId(1)).is_none());
}

#[test]
fn teardown_drops_everything() {
	let rt = runtime();
	rt.register(WorkletKind::MainThread, "h", |_, _| Ok(Value::Null)).unwrap();
	rt.get_or_create_ref(&RefHandle::new(RefId(1))).unwrap();
	rt.run(&CapturedValue::Pending(WorkletId::new("p")), &[], RunOptions::default()).unwrap();

	rt.teardown();
	assert!(!rt.is_registered(&WorkletId::new("h")));
	assert!(rt.lookup_ref(RefId(1)).is_none());
	assert_eq!(rt.delayed(&WorkletId::new("p")), 0);
}

struct Spring {
	value: Mutex<Value>,
}

impl SharedValue for Spring {
	fn current(&self) -> Value {
		self.value.lock().clone()
	}

	fn set_current(&self, value: Value) {
		*self.value.lock() = value;
	}

	fn as_any(&self) -> &dyn std::any::Any {
		self
	}
}

#[test]
fn hydration_types_registered_before_and_after_init() {
	init_tracing();
	let rt = WorkletRuntime::builder()
		.hydration_type("spring", |initial, _| Some(Arc::new(Spring { value: Mutex::new(initial) }) as Arc<dyn SharedValue>))
		.strict_refs(true)
		.init();
	rt.register_hydration_type("never", |_, _| None);

	let spring = rt.get_or_create_ref(&RefHandle::new(RefId(1)).with_initial(0.5).with_type("spring")).unwrap();
	assert!(spring.cell().as_any().is::<Spring>());
	assert_eq!(spring.get(), Value::Number(0.5));

	let err = rt.get_or_create_ref(&RefHandle::new(RefId(2)).with_type("never")).unwrap_err();
	assert_eq!(err, RuntimeError::UninitializedRef(RefId(2)));
}

#[test]
fn configuration_loads_from_toml() {
	let config = WorkletConfig::from_toml("[runtime]\nstrict_refs = false\n[guard]\nenabled = true\nflush_limit = 2\n").unwrap();
	let rt = WorkletRuntime::builder().config(config).defer(Arc::new(ManualDefer::new())).init();

	assert!(!rt.config().strict_refs);
	let guard = rt.guard().expect("guard enabled");
	assert!(guard.on_flush_cycle().is_none());
	assert!(guard.on_flush_cycle().is_none());
	assert!(guard.on_flush_cycle().is_some());
}
