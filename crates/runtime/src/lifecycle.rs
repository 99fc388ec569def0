//! Ownership tracking for logic-context callables handed to worklets.

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use worklet_primitives::{CallableHandle, ExecutionId};

/// Receives every callable handle the transformer stamps with an execution id.
pub trait CallableLifecycle: Send + Sync {
	fn add_ref(&self, execution_id: ExecutionId, handle: &CallableHandle);
}

/// Counts callable handles per execution so the host can release them when
/// the owning execution ends.
#[derive(Debug, Default)]
pub struct ExecutionRefCounts {
	owners: Mutex<FxHashMap<ExecutionId, Vec<CallableHandle>>>,
}

impl ExecutionRefCounts {
	pub fn new() -> Self {
		Self::default()
	}

	/// Handles currently held by `execution_id`.
	pub fn count(&self, execution_id: ExecutionId) -> usize {
		self.owners.lock().get(&execution_id).map_or(0, Vec::len)
	}

	/// Forgets every handle owned by `execution_id` and returns them.
	pub fn release_execution(&self, execution_id: ExecutionId) -> Vec<CallableHandle> {
		let released = self.owners.lock().remove(&execution_id).unwrap_or_default();
		tracing::debug!(%execution_id, released = released.len(), "execution callables released");
		released
	}

	/// Number of executions holding at least one handle.
	pub fn executions(&self) -> usize {
		self.owners.lock().len()
	}
}

impl CallableLifecycle for ExecutionRefCounts {
	fn add_ref(&self, execution_id: ExecutionId, handle: &CallableHandle) {
		self.owners.lock().entry(execution_id).or_default().push(*handle);
	}
}
