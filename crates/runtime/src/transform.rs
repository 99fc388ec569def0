//! Hydration of transport values into live values.
//!
//! The walk is depth-first and post-order: children are hydrated before their
//! parent is classified, so a bound worklet always sees a fully live closure.
//! Nesting is capped at [`MAX_DEPTH`]; a deeper graph is treated as a cycle
//! or an upstream construction bug and fails the whole transform.

use std::sync::Arc;

use parking_lot::RwLock;
use worklet_primitives::{CallableHandle, CapturedValue, ExecutionId, MAX_DEPTH, WorkletDescriptor};

use crate::error::{Result, RuntimeError};
use crate::lifecycle::CallableLifecycle;
use crate::refs::{RefRegistry, RefSeed};
use crate::value::{ElementHandle, Value, ValueMap};
use crate::worklet::{BoundWorklet, WorkletTable};

/// One transform pass.
pub(crate) struct Transformer<'a> {
	implementations: &'a RwLock<WorkletTable>,
	refs: &'a RefRegistry,
	lifecycle: Option<&'a dyn CallableLifecycle>,
	/// Execution id of the enclosing top-level descriptor, if any.
	execution_id: Option<ExecutionId>,
}

impl<'a> Transformer<'a> {
	pub fn new(implementations: &'a RwLock<WorkletTable>, refs: &'a RefRegistry, lifecycle: Option<&'a dyn CallableLifecycle>) -> Self {
		Self {
			implementations,
			refs,
			lifecycle,
			execution_id: None,
		}
	}

	/// Stamps callables met during this pass with `execution_id`.
	pub fn owned_by(mut self, execution_id: Option<ExecutionId>) -> Self {
		self.execution_id = execution_id;
		self
	}

	/// Binds a top-level descriptor. The descriptor itself is the first level.
	pub fn descriptor(&self, descriptor: &Arc<WorkletDescriptor>) -> Result<BoundWorklet> {
		self.bind(descriptor, 0)
	}

	/// Hydrates an argument list. The list itself is the first level.
	pub fn args(&self, args: &[CapturedValue]) -> Result<Vec<Value>> {
		let depth = descend(0)?;
		args.iter().map(|arg| self.value(arg, depth)).collect()
	}

	/// Hydrates a single value rooted at level zero.
	pub fn root(&self, value: &CapturedValue) -> Result<Value> {
		self.value(value, 0)
	}

	fn value(&self, value: &CapturedValue, depth: usize) -> Result<Value> {
		match value {
			CapturedValue::Leaf(scalar) => Ok(scalar.clone().into()),
			CapturedValue::Element(ptr) => Ok(Value::Element(ElementHandle::new(*ptr))),
			CapturedValue::List(items) => {
				let depth = descend(depth)?;
				items.iter().map(|item| self.value(item, depth)).collect::<Result<Vec<_>>>().map(Value::List)
			}
			CapturedValue::Map(map) => {
				let depth = descend(depth)?;
				map.iter()
					.map(|(key, item)| Ok((key.clone(), self.value(item, depth)?)))
					.collect::<Result<ValueMap>>()
					.map(Value::Map)
			}
			CapturedValue::Ref(handle) => {
				let depth = descend(depth)?;
				let initial = self.value(&handle.initial_value, depth)?;
				self.refs
					.get_or_create(RefSeed {
						id: handle.id,
						initial,
						type_tag: handle.type_tag.clone(),
					})
					.map(Value::Ref)
			}
			CapturedValue::Worklet(descriptor) => self.bind(descriptor, depth).map(Value::Worklet),
			CapturedValue::Pending(hash) => Ok(Value::PendingWorklet(hash.clone())),
			CapturedValue::Callable(handle) => Ok(Value::Callable(self.stamp(*handle))),
		}
	}

	fn bind(&self, descriptor: &Arc<WorkletDescriptor>, depth: usize) -> Result<BoundWorklet> {
		let depth = descend(depth)?;
		let closure = descriptor
			.captured
			.iter()
			.map(|(name, item)| Ok((name.clone(), self.value(item, depth)?)))
			.collect::<Result<ValueMap>>()?;

		let registered = self
			.implementations
			.read()
			.get(&descriptor.id)
			.cloned()
			.ok_or_else(|| RuntimeError::UnregisteredWorklet(descriptor.id.clone()))?;

		tracing::trace!(id = %descriptor.id, captured = closure.len(), "worklet bound");
		Ok(BoundWorklet::new(&registered, closure, Arc::clone(descriptor)))
	}

	fn stamp(&self, handle: CallableHandle) -> CallableHandle {
		let Some(execution_id) = self.execution_id else {
			return handle;
		};
		let stamped = handle.stamped(execution_id);
		if let Some(lifecycle) = self.lifecycle {
			lifecycle.add_ref(execution_id, &stamped);
		}
		stamped
	}
}

/// Enters one nesting level. Reaching [`MAX_DEPTH`] is fatal.
pub(crate) fn descend(depth: usize) -> Result<usize> {
	let depth = depth + 1;
	if depth >= MAX_DEPTH {
		return Err(RuntimeError::DepthExceeded { limit: MAX_DEPTH });
	}
	Ok(depth)
}
