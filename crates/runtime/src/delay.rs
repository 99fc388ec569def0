//! Invocations held back until their implementation is registered.

use std::collections::VecDeque;

use rustc_hash::FxHashMap;
use worklet_primitives::{CapturedValue, ElementPtr, WorkletId};

use crate::event::RunOptions;

/// One held-back invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct DelayedInvocation {
	pub seq: u64,
	pub args: Vec<CapturedValue>,
	pub options: RunOptions,
}

impl DelayedInvocation {
	/// True when the first argument is an event whose `currentTarget` is
	/// `element`.
	pub fn targets(&self, element: ElementPtr) -> bool {
		matches!(
			self.args.first(),
			Some(CapturedValue::Map(event)) if event.get("currentTarget") == Some(&CapturedValue::Element(element))
		)
	}
}

/// Per-hash FIFO of held-back invocations.
#[derive(Debug, Default)]
pub struct DelayQueue {
	seq_next: u64,
	pending: FxHashMap<WorkletId, VecDeque<DelayedInvocation>>,
}

impl DelayQueue {
	/// Appends one invocation for `hash` and returns its sequence number.
	pub fn enqueue(&mut self, hash: WorkletId, args: Vec<CapturedValue>, options: RunOptions) -> u64 {
		let seq = self.seq_next;
		self.seq_next = self.seq_next.wrapping_add(1);
		self.pending.entry(hash).or_default().push_back(DelayedInvocation { seq, args, options });
		seq
	}

	/// Removes and returns every invocation queued for `hash`, oldest first.
	pub fn take(&mut self, hash: &WorkletId) -> VecDeque<DelayedInvocation> {
		self.pending.remove(hash).unwrap_or_default()
	}

	/// Removes and returns the invocations for `hash` accepted by `filter`,
	/// oldest first. The rest stay queued in order.
	pub fn take_matching(&mut self, hash: &WorkletId, filter: impl Fn(&DelayedInvocation) -> bool) -> VecDeque<DelayedInvocation> {
		let Some(queue) = self.pending.get_mut(hash) else {
			return VecDeque::new();
		};
		let (taken, kept): (VecDeque<_>, VecDeque<_>) = queue.drain(..).partition(|entry| filter(entry));
		*queue = kept;
		if queue.is_empty() {
			self.pending.remove(hash);
		}
		taken
	}

	/// Puts taken invocations back, merged with whatever is queued by arrival
	/// order.
	pub fn requeue(&mut self, hash: WorkletId, entries: impl IntoIterator<Item = DelayedInvocation>) {
		let queue = self.pending.entry(hash).or_default();
		queue.extend(entries);
		queue.make_contiguous().sort_by_key(|entry| entry.seq);
		if queue.is_empty() {
			self.pending.retain(|_, queue| !queue.is_empty());
		}
	}

	/// Number of invocations queued for `hash`.
	pub fn len(&self, hash: &WorkletId) -> usize {
		self.pending.get(hash).map_or(0, VecDeque::len)
	}

	/// Number of invocations queued across every hash.
	pub fn total(&self) -> usize {
		self.pending.values().map(VecDeque::len).sum()
	}

	pub fn is_empty(&self) -> bool {
		self.pending.is_empty()
	}

	/// Discards everything without replay. Returns how many were dropped.
	pub fn clear_all(&mut self) -> usize {
		let dropped = self.total();
		self.pending.clear();
		dropped
	}
}
