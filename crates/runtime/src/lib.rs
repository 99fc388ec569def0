#![cfg_attr(test, allow(unused_crate_dependencies))]

//! Worklet runtime for the UI context.
//!
//! Worklets are small units of logic authored in the logic context and run
//! synchronously inside the UI context. The logic context ships a descriptor
//! (implementation id plus captured closure) across the boundary; this crate
//! hydrates it into live values, binds it to the registered implementation
//! and invokes it.
//!
//! * [`WorkletRuntime`] is the entry point: build one with
//!   [`WorkletRuntime::builder`], then `register` bodies and `run`
//!   descriptors.
//! * Refs hydrate lazily into [`LiveRef`] cells that keep their identity
//!   across invocations until the logic context releases them.
//! * Descriptors whose implementation is not registered yet are held back
//!   and replayed in arrival order once it is.
//! * An optional [`FlushLoopGuard`](worklet_flush_guard::FlushLoopGuard)
//!   records what the UI context was doing when a render loop runs away.

pub mod config;
mod delay;
mod dispatch;
pub mod error;
pub mod event;
mod hydrate;
pub mod lifecycle;
pub mod refs;
mod runtime;
mod transform;
pub mod value;
pub mod worklet;

pub use config::{RuntimeConfig, WorkletConfig};
pub use delay::{DelayQueue, DelayedInvocation};
pub use dispatch::RunOutput;
pub use error::{ConfigError, Result, RuntimeError};
pub use event::{EventArg, EventContext, EventReturnResult, RunOptions, RunSource};
pub use lifecycle::{CallableLifecycle, ExecutionRefCounts};
pub use refs::{HydrationTypes, LiveRef, PlainCell, RefRegistry, RefSeed, SharedValue};
pub use runtime::{RuntimeBuilder, WorkletRuntime};
pub use value::{ElementHandle, Value, ValueMap};
pub use worklet::{BoundWorklet, WorkletFn, WorkletKind};
pub use worklet_flush_guard as flush_guard;
pub use worklet_primitives as primitives;
