//! Live values handed to worklet bodies.

use indexmap::IndexMap;
use worklet_primitives::{CallableHandle, ElementPtr, Scalar, WorkletId};

use crate::event::EventArg;
use crate::refs::LiveRef;
use crate::worklet::BoundWorklet;

/// Insertion-ordered map of live values.
pub type ValueMap = IndexMap<String, Value>;

/// Live handle to an element of the UI tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementHandle {
	ptr: ElementPtr,
}

impl ElementHandle {
	pub const fn new(ptr: ElementPtr) -> Self {
		Self { ptr }
	}

	pub const fn ptr(self) -> ElementPtr {
		self.ptr
	}
}

/// Hydrated value.
///
/// Refs, bound worklets and event arguments compare by identity; every other
/// variant compares structurally.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
	#[default]
	Undefined,
	Null,
	Bool(bool),
	Number(f64),
	String(String),
	List(Vec<Value>),
	Map(ValueMap),
	Ref(LiveRef),
	Worklet(BoundWorklet),
	/// Nested descriptor whose implementation was not registered yet.
	PendingWorklet(WorkletId),
	Callable(CallableHandle),
	Element(ElementHandle),
	Event(EventArg),
}

impl Value {
	pub fn is_undefined(&self) -> bool {
		matches!(self, Self::Undefined)
	}

	pub fn is_null(&self) -> bool {
		matches!(self, Self::Null)
	}

	pub fn as_bool(&self) -> Option<bool> {
		match self {
			Self::Bool(b) => Some(*b),
			_ => None,
		}
	}

	pub fn as_f64(&self) -> Option<f64> {
		match self {
			Self::Number(n) => Some(*n),
			_ => None,
		}
	}

	pub fn as_str(&self) -> Option<&str> {
		match self {
			Self::String(s) => Some(s),
			_ => None,
		}
	}

	pub fn as_list(&self) -> Option<&[Value]> {
		match self {
			Self::List(items) => Some(items),
			_ => None,
		}
	}

	pub fn as_map(&self) -> Option<&ValueMap> {
		match self {
			Self::Map(map) => Some(map),
			_ => None,
		}
	}

	pub fn as_live_ref(&self) -> Option<&LiveRef> {
		match self {
			Self::Ref(live) => Some(live),
			_ => None,
		}
	}

	pub fn as_worklet(&self) -> Option<&BoundWorklet> {
		match self {
			Self::Worklet(bound) => Some(bound),
			_ => None,
		}
	}

	pub fn as_callable(&self) -> Option<&CallableHandle> {
		match self {
			Self::Callable(handle) => Some(handle),
			_ => None,
		}
	}

	pub fn as_element(&self) -> Option<ElementHandle> {
		match self {
			Self::Element(element) => Some(*element),
			_ => None,
		}
	}

	pub fn as_event(&self) -> Option<&EventArg> {
		match self {
			Self::Event(event) => Some(event),
			_ => None,
		}
	}

	/// Field lookup on maps and event arguments.
	pub fn get(&self, key: &str) -> Option<&Value> {
		match self {
			Self::Map(map) => map.get(key),
			Self::Event(event) => event.get(key),
			_ => None,
		}
	}
}

impl From<Scalar> for Value {
	fn from(value: Scalar) -> Self {
		match value {
			Scalar::Null => Self::Null,
			Scalar::Bool(b) => Self::Bool(b),
			Scalar::Number(n) => Self::Number(n),
			Scalar::String(s) => Self::String(s),
		}
	}
}

impl From<bool> for Value {
	fn from(value: bool) -> Self {
		Self::Bool(value)
	}
}

impl From<f64> for Value {
	fn from(value: f64) -> Self {
		Self::Number(value)
	}
}

impl From<i32> for Value {
	fn from(value: i32) -> Self {
		Self::Number(f64::from(value))
	}
}

impl From<&str> for Value {
	fn from(value: &str) -> Self {
		Self::String(value.to_owned())
	}
}

impl From<String> for Value {
	fn from(value: String) -> Self {
		Self::String(value)
	}
}

impl From<Vec<Value>> for Value {
	fn from(value: Vec<Value>) -> Self {
		Self::List(value)
	}
}

impl From<ValueMap> for Value {
	fn from(value: ValueMap) -> Self {
		Self::Map(value)
	}
}

impl From<LiveRef> for Value {
	fn from(value: LiveRef) -> Self {
		Self::Ref(value)
	}
}

impl From<ElementHandle> for Value {
	fn from(value: ElementHandle) -> Self {
		Self::Element(value)
	}
}

impl<T: Into<Value>> From<Option<T>> for Value {
	fn from(value: Option<T>) -> Self {
		value.map_or(Self::Null, Into::into)
	}
}
