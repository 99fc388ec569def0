//! Propagation control for event-sourced invocations.

use std::fmt;
use std::sync::Arc;

use bitflags::bitflags;
use parking_lot::Mutex;

use crate::value::{Value, ValueMap};

bitflags! {
	/// Propagation-control methods a worklet body called on its event.
	#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
	pub struct EventReturnResult: u32 {
		const PROPAGATION_STOPPED = 1 << 0;
		const IMMEDIATE_PROPAGATION_STOPPED = 1 << 1;
	}
}

/// What triggered an invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RunSource {
	#[default]
	Direct,
	/// Native event dispatch. Enables propagation control.
	Event,
}

/// Per-invocation options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
	pub source: RunSource,
}

impl RunOptions {
	pub const fn event() -> Self {
		Self { source: RunSource::Event }
	}
}

/// Event-return bits shared between the dispatcher and the event argument.
#[derive(Debug, Clone, Default)]
pub struct EventContext {
	result: Arc<Mutex<EventReturnResult>>,
}

impl EventContext {
	pub fn result(&self) -> EventReturnResult {
		*self.result.lock()
	}

	fn insert(&self, flag: EventReturnResult) {
		self.result.lock().insert(flag);
	}
}

/// Event object passed to a worklet body with propagation control attached.
#[derive(Clone)]
pub struct EventArg {
	fields: ValueMap,
	ctx: EventContext,
}

impl EventArg {
	pub fn new(fields: ValueMap, ctx: EventContext) -> Self {
		Self { fields, ctx }
	}

	pub fn get(&self, field: &str) -> Option<&Value> {
		self.fields.get(field)
	}

	pub fn fields(&self) -> &ValueMap {
		&self.fields
	}

	/// The `type` field, when it is a string.
	pub fn event_type(&self) -> Option<&str> {
		self.get("type").and_then(Value::as_str)
	}

	pub fn stop_propagation(&self) {
		self.ctx.insert(EventReturnResult::PROPAGATION_STOPPED);
	}

	pub fn stop_immediate_propagation(&self) {
		self.ctx.insert(EventReturnResult::IMMEDIATE_PROPAGATION_STOPPED);
	}

	pub fn context(&self) -> &EventContext {
		&self.ctx
	}
}

impl PartialEq for EventArg {
	fn eq(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.ctx.result, &other.ctx.result) && self.fields == other.fields
	}
}

impl fmt::Debug for EventArg {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("EventArg")
			.field("fields", &self.fields)
			.field("result", &self.ctx.result())
			.finish()
	}
}

const EVENT_FIELDS: [&str; 3] = ["target", "currentTarget", "type"];

fn is_event_shaped(map: &ValueMap) -> bool {
	EVENT_FIELDS.iter().any(|field| map.contains_key(*field))
}

/// Attaches propagation control to the first event-shaped argument.
///
/// Only event-sourced invocations are augmented. Returns the shared context
/// when an argument was converted.
pub fn augment(mut args: Vec<Value>, options: RunOptions) -> (Vec<Value>, Option<EventContext>) {
	if options.source != RunSource::Event {
		return (args, None);
	}
	let Some(index) = args.iter().position(|arg| matches!(arg, Value::Map(map) if is_event_shaped(map))) else {
		return (args, None);
	};
	let Value::Map(fields) = std::mem::take(&mut args[index]) else {
		return (args, None);
	};

	let ctx = EventContext::default();
	args[index] = Value::Event(EventArg::new(fields, ctx.clone()));
	(args, Some(ctx))
}
