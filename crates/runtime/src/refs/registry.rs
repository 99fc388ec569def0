use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use worklet_flush_guard::FlushLoopGuard;
use worklet_primitives::{ElementPtr, RefId};

use super::{DEFAULT_TYPE_TAG, HydrationTypes, LiveRef, PlainCell, SharedValue};
use crate::error::{Result, RuntimeError};
use crate::value::{ElementHandle, Value};

/// Live-side description of a ref to look up or hydrate.
#[derive(Debug, Clone, PartialEq)]
pub struct RefSeed {
	pub id: RefId,
	/// Value stored by a freshly hydrated cell.
	pub initial: Value,
	pub type_tag: Option<String>,
}

impl RefSeed {
	pub fn new(id: RefId, initial: impl Into<Value>) -> Self {
		Self {
			id,
			initial: initial.into(),
			type_tag: None,
		}
	}

	pub fn with_type(mut self, type_tag: impl Into<String>) -> Self {
		self.type_tag = Some(type_tag.into());
		self
	}
}

#[derive(Default)]
struct Partitions {
	persistent: FxHashMap<RefId, LiveRef>,
	first_screen: FxHashMap<RefId, LiveRef>,
}

impl Partitions {
	fn of(&self, id: RefId) -> &FxHashMap<RefId, LiveRef> {
		if id.is_first_screen() { &self.first_screen } else { &self.persistent }
	}

	fn of_mut(&mut self, id: RefId) -> &mut FxHashMap<RefId, LiveRef> {
		if id.is_first_screen() {
			&mut self.first_screen
		} else {
			&mut self.persistent
		}
	}
}

/// Maps ref ids to their live cells.
///
/// Negative ids live in the first-screen partition, which is dropped in bulk
/// once bootstrap hydration completes. Cells are only removed by explicit
/// release; there is no reachability scan.
pub struct RefRegistry {
	maps: Mutex<Partitions>,
	types: HydrationTypes,
	strict: bool,
	guard: Option<FlushLoopGuard>,
}

impl RefRegistry {
	pub fn new(types: HydrationTypes, strict: bool, guard: Option<FlushLoopGuard>) -> Self {
		Self {
			maps: Mutex::new(Partitions::default()),
			types,
			strict,
			guard,
		}
	}

	pub fn types(&self) -> &HydrationTypes {
		&self.types
	}

	/// Returns the live cell for `seed.id`, hydrating it on first sight.
	///
	/// Repeated calls with the same id return the same cell; the initial value
	/// of later seeds is ignored.
	pub fn get_or_create(&self, seed: RefSeed) -> Result<LiveRef> {
		if let Some(live) = self.lookup(seed.id) {
			return Ok(live);
		}
		let live = self.hydrate(seed)?;
		Ok(self.insert(live))
	}

	/// Syncs ref values from the logic context.
	///
	/// Existing cells are updated in place so observers attached to them keep
	/// working; missing ones are hydrated.
	pub fn apply_init_patch(&self, entries: impl IntoIterator<Item = RefSeed>) -> Result<()> {
		for seed in entries {
			match self.lookup(seed.id) {
				Some(live) => live.set(seed.initial),
				None => {
					let live = self.hydrate(seed)?;
					self.insert(live);
				}
			}
		}
		Ok(())
	}

	/// Points the ref at its backing element, or at `null` when detached.
	pub fn attach_element(&self, seed: RefSeed, element: Option<ElementPtr>) -> Result<LiveRef> {
		let live = self.get_or_create(seed)?;
		live.set(element.map(ElementHandle::new));
		Ok(live)
	}

	/// Drops the ref from both partitions. Absent ids are ignored.
	pub fn release(&self, id: RefId) {
		let mut maps = self.maps.lock();
		let removed = maps.persistent.remove(&id).is_some() | maps.first_screen.remove(&id).is_some();
		drop(maps);
		tracing::debug!(%id, removed, "ref released");
	}

	/// Drops every first-screen ref.
	pub fn clear_first_screen(&self) {
		let cleared = std::mem::take(&mut self.maps.lock().first_screen).len();
		tracing::debug!(cleared, "first-screen refs cleared");
	}

	/// Drops every ref in both partitions.
	pub fn clear(&self) {
		let mut maps = self.maps.lock();
		maps.persistent.clear();
		maps.first_screen.clear();
	}

	/// Existing cell for `id`, from whichever partition its sign selects.
	pub fn lookup(&self, id: RefId) -> Option<LiveRef> {
		self.maps.lock().of(id).get(&id).cloned()
	}

	/// Existing first-screen cell for `id`.
	pub fn first_screen(&self, id: RefId) -> Option<LiveRef> {
		self.maps.lock().first_screen.get(&id).cloned()
	}

	/// Existing persistent cell for `id`.
	pub fn persistent(&self, id: RefId) -> Option<LiveRef> {
		self.maps.lock().persistent.get(&id).cloned()
	}

	/// Number of live refs across both partitions.
	pub fn len(&self) -> usize {
		let maps = self.maps.lock();
		maps.persistent.len() + maps.first_screen.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	fn insert(&self, live: LiveRef) -> LiveRef {
		self.maps.lock().of_mut(live.id()).entry(live.id()).or_insert(live).clone()
	}

	/// Builds a cell without touching the maps. Constructors are host code and
	/// run with no lock held.
	fn hydrate(&self, seed: RefSeed) -> Result<LiveRef> {
		let RefSeed { id, initial, type_tag } = seed;
		let tag = type_tag.as_deref().unwrap_or(DEFAULT_TYPE_TAG);

		let cell: Arc<dyn SharedValue> = match self.types.get(tag) {
			None => Arc::new(PlainCell::new(initial)),
			Some(constructor) => match constructor(initial.clone(), tag) {
				Some(cell) => cell,
				None if self.strict => return Err(RuntimeError::UninitializedRef(id)),
				None => {
					tracing::warn!(%id, tag, "hydration constructor declined; using a plain cell");
					Arc::new(PlainCell::new(initial))
				}
			},
		};
		Ok(LiveRef::new(id, cell, self.guard.clone()))
	}
}

impl std::fmt::Debug for RefRegistry {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let maps = self.maps.lock();
		f.debug_struct("RefRegistry")
			.field("persistent", &maps.persistent.len())
			.field("first_screen", &maps.first_screen.len())
			.field("strict", &self.strict)
			.finish_non_exhaustive()
	}
}
