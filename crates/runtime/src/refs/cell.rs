use std::any::Any;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use worklet_flush_guard::{FlushLoopGuard, marker};
use worklet_primitives::RefId;

use crate::value::Value;

/// Storage behind a live ref.
///
/// Host extensions implement this for custom hydration types (animated
/// values and the like) and register a constructor under a type tag.
pub trait SharedValue: Send + Sync + 'static {
	fn current(&self) -> Value;

	fn set_current(&self, value: Value);

	/// Downcast support for host types.
	fn as_any(&self) -> &dyn Any;
}

/// Default ref storage: a cell holding one value.
#[derive(Debug, Default)]
pub struct PlainCell {
	value: Mutex<Value>,
}

impl PlainCell {
	pub fn new(value: Value) -> Self {
		Self { value: Mutex::new(value) }
	}
}

impl SharedValue for PlainCell {
	fn current(&self) -> Value {
		self.value.lock().clone()
	}

	fn set_current(&self, value: Value) {
		*self.value.lock() = value;
	}

	fn as_any(&self) -> &dyn Any {
		self
	}
}

/// Hydrated ref.
///
/// Clones share the same cell; equality is cell identity.
#[derive(Clone)]
pub struct LiveRef {
	id: RefId,
	cell: Arc<dyn SharedValue>,
	guard: Option<FlushLoopGuard>,
}

impl LiveRef {
	pub(crate) fn new(id: RefId, cell: Arc<dyn SharedValue>, guard: Option<FlushLoopGuard>) -> Self {
		Self { id, cell, guard }
	}

	pub fn id(&self) -> RefId {
		self.id
	}

	/// Reads the current value.
	pub fn get(&self) -> Value {
		if let Some(guard) = &self.guard {
			guard.mark_with(|| marker::ref_get(self.id));
		}
		self.cell.current()
	}

	/// Replaces the current value. Every alias observes the change.
	pub fn set(&self, value: impl Into<Value>) {
		self.cell.set_current(value.into());
	}

	/// Backing storage, for downcasting to a host type.
	pub fn cell(&self) -> &Arc<dyn SharedValue> {
		&self.cell
	}

	/// True when both handles share one cell.
	pub fn ptr_eq(&self, other: &Self) -> bool {
		std::ptr::addr_eq(Arc::as_ptr(&self.cell), Arc::as_ptr(&other.cell))
	}
}

impl PartialEq for LiveRef {
	fn eq(&self, other: &Self) -> bool {
		self.ptr_eq(other)
	}
}

impl fmt::Debug for LiveRef {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("LiveRef").field("id", &self.id).finish_non_exhaustive()
	}
}
