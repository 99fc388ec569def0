use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use super::SharedValue;
use crate::value::Value;

/// Type tag assumed when a ref handle carries none.
pub const DEFAULT_TYPE_TAG: &str = "main-thread";

/// Builds the live storage for a ref from its initial value and type tag.
///
/// Returning `None` declines hydration.
pub type Constructor = Arc<dyn Fn(Value, &str) -> Option<Arc<dyn SharedValue>> + Send + Sync>;

/// Registry of hydration constructors keyed by type tag.
///
/// Clones share the same table, so types registered through any handle are
/// visible to every runtime built from it.
#[derive(Clone, Default)]
pub struct HydrationTypes {
	table: Arc<RwLock<FxHashMap<String, Constructor>>>,
}

impl HydrationTypes {
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers `constructor` under `tag`, replacing any earlier one.
	pub fn register<F>(&self, tag: impl Into<String>, constructor: F)
	where
		F: Fn(Value, &str) -> Option<Arc<dyn SharedValue>> + Send + Sync + 'static,
	{
		let tag = tag.into();
		tracing::debug!(%tag, "hydration type registered");
		self.table.write().insert(tag, Arc::new(constructor));
	}

	pub fn get(&self, tag: &str) -> Option<Constructor> {
		self.table.read().get(tag).cloned()
	}

	pub fn contains(&self, tag: &str) -> bool {
		self.table.read().contains_key(tag)
	}

	pub fn len(&self) -> usize {
		self.table.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.table.read().is_empty()
	}
}

impl std::fmt::Debug for HydrationTypes {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let table = self.table.read();
		f.debug_set().entries(table.keys()).finish()
	}
}
