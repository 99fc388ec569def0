use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

/// Unit of work run on a later macrotask boundary.
pub type DeferredTask = Box<dyn FnOnce() + Send + 'static>;

/// Schedules work to run after the current synchronous call stack unwinds.
pub trait Defer: Send + Sync {
	fn defer(&self, task: DeferredTask);
}

/// Defers onto the ambient tokio runtime.
///
/// Outside a runtime the task runs on a short-lived named thread instead, so
/// it never executes inline on the caller's stack.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioDefer;

impl Defer for TokioDefer {
	fn defer(&self, task: DeferredTask) {
		match tokio::runtime::Handle::try_current() {
			Ok(handle) => {
				handle.spawn(async move { task() });
			}
			Err(_) => {
				if let Err(error) = std::thread::Builder::new().name("flush-guard-deferred".into()).spawn(task) {
					tracing::warn!(%error, "failed to spawn deferred flush guard task");
				}
			}
		}
	}
}

/// Host-pumped defer queue.
///
/// Tasks run only when the host calls [`ManualDefer::run_pending`], which
/// makes it suitable for embedders with their own event loop and for tests.
#[derive(Default, Clone)]
pub struct ManualDefer {
	queue: Arc<Mutex<VecDeque<DeferredTask>>>,
}

impl ManualDefer {
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns the number of queued tasks.
	pub fn pending(&self) -> usize {
		self.queue.lock().len()
	}

	/// Runs the oldest queued task. Returns false when the queue was empty.
	pub fn run_next(&self) -> bool {
		// Lock released before running so tasks may defer more work.
		let task = self.queue.lock().pop_front();
		match task {
			Some(task) => {
				task();
				true
			}
			None => false,
		}
	}

	/// Runs the tasks queued at call time and returns how many ran.
	///
	/// Tasks deferred while draining wait for the next call.
	pub fn run_pending(&self) -> usize {
		let queued = self.pending();
		let mut ran = 0;
		while ran < queued && self.run_next() {
			ran += 1;
		}
		ran
	}
}

impl std::fmt::Debug for ManualDefer {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ManualDefer").field("pending", &self.pending()).finish()
	}
}

impl Defer for ManualDefer {
	fn defer(&self, task: DeferredTask) {
		self.queue.lock().push_back(task);
	}
}
