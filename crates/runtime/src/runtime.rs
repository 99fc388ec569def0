//! Runtime handle and builder.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use slab::Slab;
use worklet_flush_guard::{Defer, FlushLoopGuard, TokioDefer};
use worklet_primitives::{CapturedValue, DescriptorKey, ElementPtr, RefHandle, RefId, WorkletDescriptor, WorkletId};

use crate::config::{RuntimeConfig, WorkletConfig};
use crate::delay::DelayQueue;
use crate::dispatch::RunOutput;
use crate::error::Result;
use crate::event::RunOptions;
use crate::lifecycle::CallableLifecycle;
use crate::refs::{HydrationTypes, LiveRef, RefRegistry, RefSeed, SharedValue};
use crate::value::Value;
use crate::worklet::{BoundWorklet, WorkletKind, WorkletTable};

/// State shared by every clone of a [`WorkletRuntime`].
///
/// Locks guard map operations only and are never held across a worklet
/// body, so bodies may re-enter the runtime.
pub(crate) struct Inner {
	pub config: RuntimeConfig,
	pub implementations: RwLock<WorkletTable>,
	pub refs: RefRegistry,
	pub arena: Mutex<Slab<Arc<WorkletDescriptor>>>,
	pub memo: Mutex<FxHashMap<DescriptorKey, BoundWorklet>>,
	pub delay: Mutex<DelayQueue>,
	pub lifecycle: Option<Arc<dyn CallableLifecycle>>,
	pub guard: Option<FlushLoopGuard>,
}

/// Stages configuration and hydration types before the runtime starts.
pub struct RuntimeBuilder {
	config: WorkletConfig,
	types: HydrationTypes,
	defer: Option<Arc<dyn Defer>>,
	guard: Option<FlushLoopGuard>,
	lifecycle: Option<Arc<dyn CallableLifecycle>>,
}

impl Default for RuntimeBuilder {
	fn default() -> Self {
		Self::new()
	}
}

impl RuntimeBuilder {
	pub fn new() -> Self {
		Self {
			config: WorkletConfig::default(),
			types: HydrationTypes::new(),
			defer: None,
			guard: None,
			lifecycle: None,
		}
	}

	pub fn config(mut self, config: WorkletConfig) -> Self {
		self.config = config;
		self
	}

	/// Shorthand for toggling strict ref hydration.
	pub fn strict_refs(mut self, strict: bool) -> Self {
		self.config.runtime.strict_refs = strict;
		self
	}

	/// Registers a hydration type ahead of init.
	pub fn hydration_type<F>(self, tag: impl Into<String>, constructor: F) -> Self
	where
		F: Fn(Value, &str) -> Option<Arc<dyn SharedValue>> + Send + Sync + 'static,
	{
		self.types.register(tag, constructor);
		self
	}

	/// Uses an existing hydration-type table, including types registered on
	/// it before or after init.
	pub fn hydration_types(mut self, types: HydrationTypes) -> Self {
		self.types = types;
		self
	}

	/// Scheduler for the flush-loop guard's deferred work. Defaults to
	/// [`TokioDefer`].
	pub fn defer(mut self, defer: Arc<dyn Defer>) -> Self {
		self.defer = Some(defer);
		self
	}

	/// Shares a guard with the host's flush loop instead of building one from
	/// the configuration.
	pub fn guard(mut self, guard: FlushLoopGuard) -> Self {
		self.guard = Some(guard);
		self
	}

	pub fn lifecycle(mut self, lifecycle: Arc<dyn CallableLifecycle>) -> Self {
		self.lifecycle = Some(lifecycle);
		self
	}

	/// Starts the runtime.
	pub fn init(self) -> WorkletRuntime {
		let Self {
			config,
			types,
			defer,
			guard,
			lifecycle,
		} = self;

		let guard = guard.or_else(|| {
			config
				.guard
				.enabled
				.then(|| FlushLoopGuard::new(config.guard, defer.unwrap_or_else(|| Arc::new(TokioDefer))))
		});

		tracing::debug!(
			strict_refs = config.runtime.strict_refs,
			guard = guard.is_some(),
			hydration_types = types.len(),
			"worklet runtime initialized"
		);

		WorkletRuntime {
			inner: Arc::new(Inner {
				config: config.runtime,
				implementations: RwLock::new(WorkletTable::default()),
				refs: RefRegistry::new(types, config.runtime.strict_refs, guard.clone()),
				arena: Mutex::new(Slab::new()),
				memo: Mutex::new(FxHashMap::default()),
				delay: Mutex::new(DelayQueue::default()),
				lifecycle,
				guard,
			}),
		}
	}
}

/// Handle to one worklet runtime.
///
/// Clones refer to the same runtime; separately initialized runtimes share
/// nothing.
#[derive(Clone)]
pub struct WorkletRuntime {
	inner: Arc<Inner>,
}

impl std::fmt::Debug for WorkletRuntime {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("WorkletRuntime")
			.field("config", &self.inner.config)
			.field("registered", &self.inner.implementations.read().len())
			.field("refs", &self.inner.refs)
			.finish_non_exhaustive()
	}
}

impl WorkletRuntime {
	pub fn builder() -> RuntimeBuilder {
		RuntimeBuilder::new()
	}

	/// Runtime with default configuration.
	pub fn init() -> Self {
		RuntimeBuilder::new().init()
	}

	pub fn config(&self) -> RuntimeConfig {
		self.inner.config
	}

	/// Flush-loop guard fed by this runtime's markers, if enabled.
	pub fn guard(&self) -> Option<&FlushLoopGuard> {
		self.inner.guard.as_ref()
	}

	/// Stores `body` under `id`, replacing any earlier implementation.
	///
	/// Memoized bindings are dropped so later runs bind the new body; bound
	/// worklets already handed out keep the body they were bound with.
	/// Invocations delayed for `id` are then replayed in arrival order, and
	/// the number replayed is returned.
	pub fn register<F>(&self, kind: WorkletKind, id: impl Into<WorkletId>, body: F) -> Result<usize>
	where
		F: Fn(&BoundWorklet, &[Value]) -> Result<Value> + Send + Sync + 'static,
	{
		let id = id.into();
		let replaced = self.inner.implementations.write().insert(id.clone(), kind, Arc::new(body));
		self.inner.memo.lock().clear();
		tracing::debug!(%id, %kind, replaced, "worklet registered");

		self.inner.drain_delayed(&Arc::new(WorkletDescriptor::new(id)))
	}

	pub fn is_registered(&self, id: &WorkletId) -> bool {
		self.inner.implementations.read().contains(id)
	}

	/// Invokes `descriptor` with `args`.
	///
	/// Returns `Ok(None)` for malformed descriptors (logged) and for pending
	/// ones (queued until their implementation is registered).
	pub fn run(&self, descriptor: &CapturedValue, args: &[CapturedValue], options: RunOptions) -> Result<Option<RunOutput>> {
		self.inner.run(descriptor, args, options)
	}

	/// Classifies wire values and runs them.
	pub fn run_json(&self, descriptor: serde_json::Value, args: Vec<serde_json::Value>, options: RunOptions) -> Result<Option<RunOutput>> {
		let descriptor = CapturedValue::from_json(descriptor)?;
		let args = args.into_iter().map(CapturedValue::from_json).collect::<std::result::Result<Vec<_>, _>>()?;
		self.run(&descriptor, &args, options)
	}

	/// Hydrates `root`. Top-level descriptors go through the memoized binding
	/// path; anything else is transformed afresh.
	pub fn transform(&self, root: &CapturedValue, top_level: bool) -> Result<Value> {
		match root {
			CapturedValue::Worklet(descriptor) if top_level => self.inner.bind_top_level(descriptor).map(Value::Worklet),
			other => self.inner.transformer().root(other),
		}
	}

	/// Gives `descriptor` a stable arena key so its binding is memoized.
	pub fn intern(&self, mut descriptor: WorkletDescriptor) -> Arc<WorkletDescriptor> {
		let mut arena = self.inner.arena.lock();
		let entry = arena.vacant_entry();
		descriptor.key = Some(DescriptorKey(entry.key()));
		let descriptor = Arc::new(descriptor);
		entry.insert(Arc::clone(&descriptor));
		descriptor
	}

	/// Drops an interned descriptor and its memoized binding.
	pub fn forget(&self, key: DescriptorKey) -> Option<Arc<WorkletDescriptor>> {
		let removed = self.inner.arena.lock().try_remove(key.0);
		self.inner.memo.lock().remove(&key);
		removed
	}

	/// Registers a hydration type. Affects refs hydrated afterwards.
	pub fn register_hydration_type<F>(&self, tag: impl Into<String>, constructor: F)
	where
		F: Fn(Value, &str) -> Option<Arc<dyn SharedValue>> + Send + Sync + 'static,
	{
		self.inner.refs.types().register(tag, constructor);
	}

	pub fn get_or_create_ref(&self, handle: &RefHandle) -> Result<LiveRef> {
		let seed = self.seed(handle)?;
		self.inner.refs.get_or_create(seed)
	}

	/// Existing live ref for `id`, without hydrating.
	pub fn lookup_ref(&self, id: RefId) -> Option<LiveRef> {
		self.inner.refs.lookup(id)
	}

	/// Bulk ref sync from the logic context: `(id, value, type_tag)` entries.
	pub fn apply_init_patch<I>(&self, entries: I) -> Result<()>
	where
		I: IntoIterator<Item = (RefId, CapturedValue, Option<String>)>,
	{
		let transformer = self.inner.transformer();
		let seeds = entries
			.into_iter()
			.map(|(id, value, type_tag)| {
				Ok(RefSeed {
					id,
					initial: transformer.root(&value)?,
					type_tag,
				})
			})
			.collect::<Result<Vec<_>>>()?;
		self.inner.refs.apply_init_patch(seeds)
	}

	pub fn attach_element(&self, handle: &RefHandle, element: Option<ElementPtr>) -> Result<LiveRef> {
		let seed = self.seed(handle)?;
		self.inner.refs.attach_element(seed, element)
	}

	/// Handles the logic context's release signal for `id`.
	pub fn release_ref(&self, id: RefId) {
		self.inner.refs.release(id);
	}

	pub fn clear_first_screen(&self) {
		self.inner.refs.clear_first_screen();
	}

	/// Copies values written to first-screen refs during bootstrap into the
	/// persistent refs that replace them.
	pub fn hydrate_first_screen(&self, ctx: &CapturedValue, first_screen_ctx: &CapturedValue) -> Result<()> {
		self.inner.hydrate_first_screen(ctx, first_screen_ctx)
	}

	/// Replays events delayed for `descriptor.id` that target `element`,
	/// against the full descriptor, closure included.
	pub fn run_delayed(&self, descriptor: &Arc<WorkletDescriptor>, element: ElementPtr) -> Result<usize> {
		self.inner.run_delayed(descriptor, element)
	}

	/// Number of invocations waiting for `hash`.
	pub fn delayed(&self, hash: &WorkletId) -> usize {
		self.inner.delayed_len(hash)
	}

	/// Discards every delayed invocation without replay.
	pub fn clear_delayed(&self) -> usize {
		let dropped = self.inner.delay.lock().clear_all();
		tracing::debug!(dropped, "delayed invocations cleared");
		dropped
	}

	/// Drops implementations, bindings, refs and delayed invocations.
	pub fn teardown(&self) {
		self.inner.implementations.write().clear();
		self.inner.memo.lock().clear();
		self.inner.arena.lock().clear();
		self.inner.refs.clear();
		let dropped = self.inner.delay.lock().clear_all();
		if let Some(guard) = &self.inner.guard {
			guard.reset();
		}
		tracing::debug!(dropped, "worklet runtime torn down");
	}

	fn seed(&self, handle: &RefHandle) -> Result<RefSeed> {
		Ok(RefSeed {
			id: handle.id,
			initial: self.inner.transformer().root(&handle.initial_value)?,
			type_tag: handle.type_tag.clone(),
		})
	}
}
