use std::sync::Arc;

use indexmap::IndexMap;

use crate::ids::{CallableId, DescriptorKey, ExecutionId, RefId, WorkletId};

/// Insertion-ordered mapping of captured names to transport values.
pub type CapturedMap = IndexMap<String, CapturedValue>;

/// Terminal transport value.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
	Null,
	Bool(bool),
	Number(f64),
	String(String),
}

/// Raw reference to an element in the UI context's live tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementPtr(pub u64);

/// Transport form of a worklet ref.
#[derive(Debug, Clone, PartialEq)]
pub struct RefHandle {
	pub id: RefId,
	/// Value used when the ref is hydrated for the first time.
	pub initial_value: Box<CapturedValue>,
	/// Hydration type; `None` selects the plain cell.
	pub type_tag: Option<String>,
}

impl RefHandle {
	/// Creates a handle with a `null` initial value and no type tag.
	pub fn new(id: RefId) -> Self {
		Self {
			id,
			initial_value: Box::new(CapturedValue::Leaf(Scalar::Null)),
			type_tag: None,
		}
	}

	/// Sets the initial value.
	pub fn with_initial(mut self, value: impl Into<CapturedValue>) -> Self {
		self.initial_value = Box::new(value.into());
		self
	}

	/// Sets the hydration type tag.
	pub fn with_type(mut self, type_tag: impl Into<String>) -> Self {
		self.type_tag = Some(type_tag.into());
		self
	}
}

/// Handle to a callable that lives in the logic context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallableHandle {
	pub fn_id: CallableId,
	/// Execution that owns this handle, stamped by the transformer.
	pub execution_id: Option<ExecutionId>,
}

impl CallableHandle {
	pub const fn new(fn_id: CallableId) -> Self {
		Self { fn_id, execution_id: None }
	}

	/// Returns a copy owned by `execution_id`.
	pub const fn stamped(self, execution_id: ExecutionId) -> Self {
		Self {
			fn_id: self.fn_id,
			execution_id: Some(execution_id),
		}
	}
}

/// Worklet descriptor as produced by the logic context.
///
/// Descriptors are immutable once built. The UI context derives transformed
/// copies and never edits the original.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkletDescriptor {
	pub id: WorkletId,
	pub captured: CapturedMap,
	pub execution_id: Option<ExecutionId>,
	/// Set on bootstrap descriptors whose refs were written before the logic
	/// context took over.
	pub needs_hydration: bool,
	/// Arena key assigned when the descriptor is interned by a runtime.
	pub key: Option<DescriptorKey>,
}

impl WorkletDescriptor {
	/// Creates a descriptor with an empty closure.
	pub fn new(id: impl Into<WorkletId>) -> Self {
		Self {
			id: id.into(),
			captured: CapturedMap::new(),
			execution_id: None,
			needs_hydration: false,
			key: None,
		}
	}

	/// Adds one captured value.
	pub fn capture(mut self, name: impl Into<String>, value: impl Into<CapturedValue>) -> Self {
		self.captured.insert(name.into(), value.into());
		self
	}

	/// Sets the owning execution id.
	pub fn with_execution_id(mut self, execution_id: ExecutionId) -> Self {
		self.execution_id = Some(execution_id);
		self
	}

	/// Marks a bootstrap descriptor as carrying first-screen ref values.
	pub fn needing_hydration(mut self) -> Self {
		self.needs_hydration = true;
		self
	}

	/// Returns a copy carrying an arena key.
	pub fn keyed(&self, key: DescriptorKey) -> Self {
		Self {
			key: Some(key),
			..self.clone()
		}
	}
}

/// Transport value: the closed set of shapes that may cross the boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum CapturedValue {
	Leaf(Scalar),
	List(Vec<CapturedValue>),
	Map(CapturedMap),
	Ref(RefHandle),
	Worklet(Arc<WorkletDescriptor>),
	/// Descriptor whose implementation is not registered on the UI side yet.
	Pending(WorkletId),
	Callable(CallableHandle),
	Element(ElementPtr),
}

impl CapturedValue {
	pub const NULL: Self = Self::Leaf(Scalar::Null);

	/// Wraps a descriptor.
	pub fn worklet(descriptor: WorkletDescriptor) -> Self {
		Self::Worklet(Arc::new(descriptor))
	}

	/// Builds a map value from name/value pairs.
	pub fn map<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
	where
		K: Into<String>,
		V: Into<CapturedValue>,
	{
		Self::Map(entries.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
	}

	/// Builds a list value.
	pub fn list<V: Into<CapturedValue>>(items: impl IntoIterator<Item = V>) -> Self {
		Self::List(items.into_iter().map(Into::into).collect())
	}

	/// Returns true for shapes that may be dispatched by `run`.
	pub fn is_invocable(&self) -> bool {
		matches!(self, Self::Worklet(_) | Self::Pending(_))
	}

	/// Short name of the variant for diagnostics.
	pub const fn kind(&self) -> &'static str {
		match self {
			Self::Leaf(_) => "leaf",
			Self::List(_) => "list",
			Self::Map(_) => "map",
			Self::Ref(_) => "ref",
			Self::Worklet(_) => "worklet",
			Self::Pending(_) => "pending",
			Self::Callable(_) => "callable",
			Self::Element(_) => "element",
		}
	}
}

impl From<Scalar> for CapturedValue {
	fn from(value: Scalar) -> Self {
		Self::Leaf(value)
	}
}

impl From<bool> for CapturedValue {
	fn from(value: bool) -> Self {
		Self::Leaf(Scalar::Bool(value))
	}
}

impl From<f64> for CapturedValue {
	fn from(value: f64) -> Self {
		Self::Leaf(Scalar::Number(value))
	}
}

impl From<i64> for CapturedValue {
	fn from(value: i64) -> Self {
		Self::Leaf(Scalar::Number(value as f64))
	}
}

impl From<i32> for CapturedValue {
	fn from(value: i32) -> Self {
		Self::Leaf(Scalar::Number(f64::from(value)))
	}
}

impl From<&str> for CapturedValue {
	fn from(value: &str) -> Self {
		Self::Leaf(Scalar::String(value.to_owned()))
	}
}

impl From<String> for CapturedValue {
	fn from(value: String) -> Self {
		Self::Leaf(Scalar::String(value))
	}
}

impl From<RefHandle> for CapturedValue {
	fn from(value: RefHandle) -> Self {
		Self::Ref(value)
	}
}

impl From<WorkletDescriptor> for CapturedValue {
	fn from(value: WorkletDescriptor) -> Self {
		Self::worklet(value)
	}
}

impl From<CallableHandle> for CapturedValue {
	fn from(value: CallableHandle) -> Self {
		Self::Callable(value)
	}
}

impl From<ElementPtr> for CapturedValue {
	fn from(value: ElementPtr) -> Self {
		Self::Element(value)
	}
}
