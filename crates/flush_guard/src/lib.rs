#![cfg_attr(test, allow(unused_crate_dependencies))]

//! Flush-loop guard for the UI context.
//!
//! A worklet body that triggers another synchronous render flush before
//! yielding can starve the UI context forever. The host's flush loop feeds
//! every cycle into [`FlushLoopGuard::on_flush_cycle`]; once a window exceeds
//! the limit the guard trips and hands back a diagnostic error carrying a
//! compressed trace of recent UI-context actions.

mod defer;
mod guard;
pub mod marker;
mod trace;

pub use defer::{Defer, DeferredTask, ManualDefer, TokioDefer};
pub use guard::{DEFAULT_FLUSH_LIMIT, DEFAULT_TRACE_CAPACITY, FlushLoopError, FlushLoopGuard, GuardConfig, GuardPhase};
pub use trace::{MarkerTrace, compress_markers};
