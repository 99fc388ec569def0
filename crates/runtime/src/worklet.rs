//! Worklet implementations and their bound form.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use worklet_primitives::{WorkletDescriptor, WorkletId};

use crate::error::{Result, RuntimeError};
use crate::value::{Value, ValueMap};

/// Which registration entry point installed an implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkletKind {
	MainThread,
	Ui,
}

impl WorkletKind {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::MainThread => "main-thread",
			Self::Ui => "ui",
		}
	}
}

impl fmt::Display for WorkletKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for WorkletKind {
	type Err = RuntimeError;

	fn from_str(s: &str) -> Result<Self> {
		match s {
			"main-thread" => Ok(Self::MainThread),
			"ui" => Ok(Self::Ui),
			other => Err(RuntimeError::UnknownWorkletKind(other.to_owned())),
		}
	}
}

/// Body of a worklet.
///
/// `this` exposes the hydrated closure the body was bound to.
pub trait WorkletFn: Send + Sync + 'static {
	fn call(&self, this: &BoundWorklet, args: &[Value]) -> Result<Value>;
}

impl<F> WorkletFn for F
where
	F: Fn(&BoundWorklet, &[Value]) -> Result<Value> + Send + Sync + 'static,
{
	fn call(&self, this: &BoundWorklet, args: &[Value]) -> Result<Value> {
		self(this, args)
	}
}

/// Implementation stored under a worklet id.
#[derive(Clone)]
pub(crate) struct Registered {
	pub kind: WorkletKind,
	pub implementation: Arc<dyn WorkletFn>,
}

/// Registered implementations keyed by worklet id.
#[derive(Default)]
pub(crate) struct WorkletTable {
	entries: FxHashMap<WorkletId, Registered>,
}

impl WorkletTable {
	/// Stores `implementation` under `id`. Returns true when it replaced an
	/// earlier registration.
	pub fn insert(&mut self, id: WorkletId, kind: WorkletKind, implementation: Arc<dyn WorkletFn>) -> bool {
		self.entries.insert(id, Registered { kind, implementation }).is_some()
	}

	pub fn get(&self, id: &WorkletId) -> Option<&Registered> {
		self.entries.get(id)
	}

	pub fn contains(&self, id: &WorkletId) -> bool {
		self.entries.contains_key(id)
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn clear(&mut self) {
		self.entries.clear();
	}
}

/// Implementation bound to a hydrated copy of its descriptor's closure.
///
/// The closure is a fresh transformed copy; the descriptor it came from is
/// kept as [`BoundWorklet::source`] for introspection.
#[derive(Clone)]
pub struct BoundWorklet {
	id: WorkletId,
	kind: WorkletKind,
	implementation: Arc<dyn WorkletFn>,
	closure: Arc<ValueMap>,
	source: Arc<WorkletDescriptor>,
}

impl BoundWorklet {
	pub(crate) fn new(registered: &Registered, closure: ValueMap, source: Arc<WorkletDescriptor>) -> Self {
		Self {
			id: source.id.clone(),
			kind: registered.kind,
			implementation: Arc::clone(&registered.implementation),
			closure: Arc::new(closure),
			source,
		}
	}

	pub fn id(&self) -> &WorkletId {
		&self.id
	}

	pub fn kind(&self) -> WorkletKind {
		self.kind
	}

	/// Captured value by name.
	pub fn captured(&self, name: &str) -> Option<&Value> {
		self.closure.get(name)
	}

	pub fn closure(&self) -> &ValueMap {
		&self.closure
	}

	/// Descriptor this worklet was bound from.
	pub fn source(&self) -> &Arc<WorkletDescriptor> {
		&self.source
	}

	/// Invokes the body with `args`.
	pub fn call(&self, args: &[Value]) -> Result<Value> {
		self.implementation.call(self, args)
	}

	/// True when both handles share the same closure copy.
	pub fn ptr_eq(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.closure, &other.closure)
	}
}

impl PartialEq for BoundWorklet {
	fn eq(&self, other: &Self) -> bool {
		self.ptr_eq(other)
	}
}

impl fmt::Debug for BoundWorklet {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("BoundWorklet")
			.field("id", &self.id)
			.field("kind", &self.kind)
			.field("captured", &self.closure.keys().collect::<Vec<_>>())
			.finish_non_exhaustive()
	}
}
