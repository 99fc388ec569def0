//! Invocation path: validation, memoized binding, event augmentation and
//! delayed replay.

use std::collections::VecDeque;
use std::sync::Arc;

use worklet_flush_guard::marker;
use worklet_primitives::{CapturedValue, DescriptorKey, ElementPtr, WorkletDescriptor, WorkletId};

use crate::delay::DelayedInvocation;
use crate::error::{Result, RuntimeError};
use crate::event::{self, EventReturnResult, RunOptions};
use crate::runtime::Inner;
use crate::transform::Transformer;
use crate::value::Value;
use crate::worklet::BoundWorklet;

/// Result of a dispatched invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutput {
	/// Raw return value of a direct invocation.
	Value(Value),
	/// Event-sourced invocation whose argument received propagation control.
	Event {
		return_value: Value,
		event_return_result: EventReturnResult,
	},
}

impl RunOutput {
	pub fn return_value(&self) -> &Value {
		match self {
			Self::Value(value) | Self::Event { return_value: value, .. } => value,
		}
	}

	pub fn into_return_value(self) -> Value {
		match self {
			Self::Value(value) | Self::Event { return_value: value, .. } => value,
		}
	}

	/// Propagation bits, for event-sourced invocations.
	pub fn event_return_result(&self) -> Option<EventReturnResult> {
		match self {
			Self::Value(_) => None,
			Self::Event { event_return_result, .. } => Some(*event_return_result),
		}
	}
}

impl Inner {
	pub(crate) fn transformer(&self) -> Transformer<'_> {
		Transformer::new(&self.implementations, &self.refs, self.lifecycle.as_deref())
	}

	pub(crate) fn mark_with(&self, marker: impl FnOnce() -> String) {
		if let Some(guard) = &self.guard {
			guard.mark_with(marker);
		}
	}

	pub(crate) fn run(&self, descriptor: &CapturedValue, args: &[CapturedValue], options: RunOptions) -> Result<Option<RunOutput>> {
		match descriptor {
			CapturedValue::Worklet(descriptor) => self.run_worklet(descriptor, args, options).map(Some),
			CapturedValue::Pending(hash) => {
				let seq = self.delay.lock().enqueue(hash.clone(), args.to_vec(), options);
				tracing::debug!(%hash, seq, "invocation delayed until registration");
				Ok(None)
			}
			other => {
				tracing::warn!(value = %other, kind = other.kind(), "Worklet: Invalid worklet object");
				Ok(None)
			}
		}
	}

	pub(crate) fn run_worklet(&self, descriptor: &Arc<WorkletDescriptor>, args: &[CapturedValue], options: RunOptions) -> Result<RunOutput> {
		self.mark_with(|| marker::invoke(&descriptor.id));

		let bound = self.bind_top_level(descriptor)?;
		let args = self.transformer().args(args)?;
		let (args, event_ctx) = event::augment(args, options);

		if event_ctx.is_some()
			&& let Some(kind) = args.iter().find_map(Value::as_event).and_then(|event| event.event_type())
		{
			self.mark_with(|| marker::event(kind));
		}

		let return_value = bound.call(&args)?;
		Ok(match event_ctx {
			Some(ctx) => RunOutput::Event {
				return_value,
				event_return_result: ctx.result(),
			},
			None => RunOutput::Value(return_value),
		})
	}

	/// Binds a top-level descriptor, reusing the memoized binding for interned
	/// descriptors.
	pub(crate) fn bind_top_level(&self, descriptor: &Arc<WorkletDescriptor>) -> Result<BoundWorklet> {
		let transformer = self.transformer().owned_by(descriptor.execution_id);
		let Some(key) = self.interned_key(descriptor) else {
			return transformer.descriptor(descriptor);
		};

		if let Some(bound) = self.memo.lock().get(&key) {
			return Ok(bound.clone());
		}
		let bound = transformer.descriptor(descriptor)?;
		self.memo.lock().insert(key, bound.clone());
		Ok(bound)
	}

	/// Arena key of `descriptor`, when it is the interned instance.
	fn interned_key(&self, descriptor: &Arc<WorkletDescriptor>) -> Option<DescriptorKey> {
		let key = descriptor.key?;
		let arena = self.arena.lock();
		let interned = arena.get(key.0)?;
		Arc::ptr_eq(interned, descriptor).then_some(key)
	}

	/// Replays every invocation queued for `descriptor.id`, oldest first.
	pub(crate) fn drain_delayed(&self, descriptor: &Arc<WorkletDescriptor>) -> Result<usize> {
		let pending = self.delay.lock().take(&descriptor.id);
		self.replay(descriptor, pending)
	}

	/// Replays the events queued for `descriptor.id` whose `currentTarget` is
	/// `element`, with the full descriptor. Events for other elements stay
	/// queued.
	pub(crate) fn run_delayed(&self, descriptor: &Arc<WorkletDescriptor>, element: ElementPtr) -> Result<usize> {
		if !self.implementations.read().contains(&descriptor.id) {
			return Err(RuntimeError::UnregisteredWorklet(descriptor.id.clone()));
		}
		let pending = self.delay.lock().take_matching(&descriptor.id, |entry| entry.targets(element));
		self.replay(descriptor, pending)
	}

	/// Entries have already left the queue. When one fails, the rest go back
	/// and the error is returned.
	fn replay(&self, descriptor: &Arc<WorkletDescriptor>, pending: VecDeque<DelayedInvocation>) -> Result<usize> {
		let mut pending = pending.into_iter();
		let mut replayed = 0;

		while let Some(entry) = pending.next() {
			if let Err(error) = self.run_worklet(descriptor, &entry.args, entry.options) {
				let remaining = pending.len();
				self.delay.lock().requeue(descriptor.id.clone(), pending);
				tracing::debug!(id = %descriptor.id, replayed, remaining, %error, "delayed replay aborted");
				return Err(error);
			}
			replayed += 1;
		}

		if replayed > 0 {
			tracing::debug!(id = %descriptor.id, replayed, "delayed invocations replayed");
		}
		Ok(replayed)
	}

	pub(crate) fn delayed_len(&self, hash: &WorkletId) -> usize {
		self.delay.lock().len(hash)
	}
}
