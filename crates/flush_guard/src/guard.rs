use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde::Deserialize;

use crate::defer::Defer;
use crate::trace::MarkerTrace;

/// Flush cycles allowed in one window before the guard trips.
pub const DEFAULT_FLUSH_LIMIT: usize = 256;

/// Markers retained by the trace ring buffer.
pub const DEFAULT_TRACE_CAPACITY: usize = 256;

/// Guard settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GuardConfig {
	/// Diagnostic mode. A disabled guard records nothing and never trips.
	pub enabled: bool,
	pub flush_limit: usize,
	pub trace_capacity: usize,
}

impl Default for GuardConfig {
	fn default() -> Self {
		Self {
			enabled: cfg!(debug_assertions),
			flush_limit: DEFAULT_FLUSH_LIMIT,
			trace_capacity: DEFAULT_TRACE_CAPACITY,
		}
	}
}

impl GuardConfig {
	/// Enabled guard with default limits.
	pub fn diagnostic() -> Self {
		Self {
			enabled: true,
			..Self::default()
		}
	}
}

/// Raised when the UI context flushes too often without yielding.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("flush loop detected: render executed {cycles} times without yielding (limit={limit}). Trace: {trace}")]
pub struct FlushLoopError {
	pub cycles: usize,
	pub limit: usize,
	/// Compressed marker trace, most recent first.
	pub trace: String,
}

/// Observable state of the guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardPhase {
	Idle,
	Counting,
	Tripped,
}

type RaiseFn = dyn Fn(Arc<FlushLoopError>) + Send + Sync;

struct GuardState {
	trace: MarkerTrace,
	cycles: usize,
	reset_scheduled: bool,
	tripped: Option<Arc<FlushLoopError>>,
	/// Bumped by explicit resets so stale window resets are ignored.
	window: u64,
}

/// Counts render flushes per window and trips on runaway loops.
///
/// Cloning yields another handle to the same guard.
#[derive(Clone)]
pub struct FlushLoopGuard {
	config: GuardConfig,
	state: Arc<Mutex<GuardState>>,
	defer: Arc<dyn Defer>,
	raise: Arc<RaiseFn>,
}

impl std::fmt::Debug for FlushLoopGuard {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("FlushLoopGuard")
			.field("config", &self.config)
			.field("phase", &self.phase())
			.finish_non_exhaustive()
	}
}

impl FlushLoopGuard {
	/// Creates a guard that schedules window resets and reports through `defer`.
	pub fn new(config: GuardConfig, defer: Arc<dyn Defer>) -> Self {
		Self {
			config,
			state: Arc::new(Mutex::new(GuardState {
				trace: MarkerTrace::new(config.trace_capacity),
				cycles: 0,
				reset_scheduled: false,
				tripped: None,
				window: 0,
			})),
			defer,
			raise: Arc::new(raise_unhandled),
		}
	}

	/// Replaces the hook that raises reported errors on the deferred task.
	pub fn with_raise(mut self, raise: impl Fn(Arc<FlushLoopError>) + Send + Sync + 'static) -> Self {
		self.raise = Arc::new(raise);
		self
	}

	pub fn config(&self) -> GuardConfig {
		self.config
	}

	pub fn is_enabled(&self) -> bool {
		self.config.enabled
	}

	pub fn phase(&self) -> GuardPhase {
		let state = self.state.lock();
		if state.tripped.is_some() {
			GuardPhase::Tripped
		} else if state.cycles > 0 || state.reset_scheduled {
			GuardPhase::Counting
		} else {
			GuardPhase::Idle
		}
	}

	/// Records one UI-context action.
	pub fn mark(&self, marker: impl Into<String>) {
		if self.config.enabled {
			self.state.lock().trace.push(marker.into());
		}
	}

	/// Records a marker built lazily, skipping the allocation when disabled.
	pub fn mark_with(&self, marker: impl FnOnce() -> String) {
		if self.config.enabled {
			self.state.lock().trace.push(marker());
		}
	}

	/// Returns the current trace rendering, most recent first.
	pub fn trace_text(&self) -> String {
		self.state.lock().trace.compress()
	}

	/// Feeds one render flush into the guard.
	///
	/// Returns the trip error once the window exceeds the limit. After
	/// tripping, every call returns the same error instance until
	/// [`Self::reset`].
	pub fn on_flush_cycle(&self) -> Option<Arc<FlushLoopError>> {
		if !self.config.enabled {
			return None;
		}

		let mut state = self.state.lock();
		if let Some(error) = &state.tripped {
			return Some(Arc::clone(error));
		}

		let schedule = (!state.reset_scheduled).then(|| {
			state.reset_scheduled = true;
			state.window
		});

		state.cycles += 1;
		let tripped = (state.cycles > self.config.flush_limit).then(|| {
			let error = Arc::new(FlushLoopError {
				cycles: state.cycles,
				limit: self.config.flush_limit,
				trace: state.trace.compress(),
			});
			state.tripped = Some(Arc::clone(&error));
			error
		});
		drop(state);

		if let Some(window) = schedule {
			let weak = Arc::downgrade(&self.state);
			self.defer.defer(Box::new(move || end_window(&weak, window)));
		}

		if let Some(error) = &tripped {
			tracing::error!(cycles = error.cycles, limit = error.limit, "flush loop guard tripped");
		}
		tripped
	}

	/// Raises `error` on a later macrotask instead of the current stack.
	pub fn report(&self, error: Arc<FlushLoopError>) {
		let raise = Arc::clone(&self.raise);
		self.defer.defer(Box::new(move || raise(error)));
	}

	/// Returns the guard to idle, discarding the trace and any trip.
	pub fn reset(&self) {
		let mut state = self.state.lock();
		state.trace.clear();
		state.cycles = 0;
		state.reset_scheduled = false;
		state.tripped = None;
		state.window = state.window.wrapping_add(1);
		tracing::debug!("flush loop guard reset");
	}
}

fn end_window(state: &Weak<Mutex<GuardState>>, window: u64) {
	let Some(state) = state.upgrade() else {
		return;
	};
	let mut state = state.lock();
	if state.window == window {
		state.cycles = 0;
		state.reset_scheduled = false;
	}
}

fn raise_unhandled(error: Arc<FlushLoopError>) {
	tracing::error!(%error, "unhandled flush loop error");
	panic!("{error}");
}
