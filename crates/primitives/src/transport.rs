use std::fmt;

use serde_json::{Map, Number, Value as Json};

use crate::captured::{CallableHandle, CapturedMap, CapturedValue, ElementPtr, RefHandle, Scalar, WorkletDescriptor};
use crate::ids::{CallableId, ExecutionId, RefId, WorkletId};

/// Maximum nesting depth of a value graph. Reaching it is fatal.
pub const MAX_DEPTH: usize = 1000;

/// Marker keys used by the logic context's wire shape.
pub mod markers {
	pub const ELEMENT_PTR: &str = "elementRefptr";
	pub const REF_ID: &str = "_wvid";
	pub const REF_INITIAL: &str = "_initValue";
	pub const REF_TYPE: &str = "_type";
	pub const WORKLET_ID: &str = "_wkltId";
	pub const EXECUTION_ID: &str = "_execId";
	pub const PENDING_HASH: &str = "_lepusWorkletHash";
	pub const NEEDS_HYDRATION: &str = "_needsHydration";
	pub const CALLABLE_ID: &str = "_jsFnId";
}

/// Errors raised while classifying wire values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
	#[error("Depth of value exceeds limit of {limit}.")]
	DepthExceeded { limit: usize },

	#[error("invalid `{marker}` field: expected {expected}")]
	InvalidField { marker: &'static str, expected: &'static str },
}

impl CapturedValue {
	/// Classifies a wire value into the transport enum.
	pub fn from_json(value: Json) -> Result<Self, TransportError> {
		classify(value, 0)
	}

	/// Renders the value back into its wire shape.
	pub fn to_json(&self) -> Json {
		match self {
			Self::Leaf(scalar) => scalar_to_json(scalar),
			Self::List(items) => Json::Array(items.iter().map(Self::to_json).collect()),
			Self::Map(map) => Json::Object(map_to_json(map)),
			Self::Ref(handle) => {
				let mut obj = Map::new();
				obj.insert(markers::REF_ID.into(), Json::from(handle.id.0));
				obj.insert(markers::REF_INITIAL.into(), handle.initial_value.to_json());
				if let Some(tag) = &handle.type_tag {
					obj.insert(markers::REF_TYPE.into(), Json::String(tag.clone()));
				}
				Json::Object(obj)
			}
			Self::Worklet(desc) => {
				let mut obj = Map::new();
				obj.insert(markers::WORKLET_ID.into(), Json::String(desc.id.to_string()));
				if let Some(exec) = desc.execution_id {
					obj.insert(markers::EXECUTION_ID.into(), Json::from(exec.0));
				}
				if desc.needs_hydration {
					obj.insert(markers::NEEDS_HYDRATION.into(), Json::Bool(true));
				}
				obj.extend(map_to_json(&desc.captured));
				Json::Object(obj)
			}
			Self::Pending(hash) => {
				let mut obj = Map::new();
				obj.insert(markers::PENDING_HASH.into(), Json::String(hash.to_string()));
				Json::Object(obj)
			}
			Self::Callable(handle) => {
				let mut obj = Map::new();
				obj.insert(markers::CALLABLE_ID.into(), Json::from(handle.fn_id.0));
				if let Some(exec) = handle.execution_id {
					obj.insert(markers::EXECUTION_ID.into(), Json::from(exec.0));
				}
				Json::Object(obj)
			}
			Self::Element(ptr) => {
				let mut obj = Map::new();
				obj.insert(markers::ELEMENT_PTR.into(), Json::from(ptr.0));
				Json::Object(obj)
			}
		}
	}
}

impl fmt::Display for CapturedValue {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.to_json())
	}
}

fn classify(value: Json, depth: usize) -> Result<CapturedValue, TransportError> {
	let obj = match value {
		Json::Null => return Ok(CapturedValue::Leaf(Scalar::Null)),
		Json::Bool(b) => return Ok(CapturedValue::Leaf(Scalar::Bool(b))),
		Json::Number(n) => return Ok(CapturedValue::Leaf(Scalar::Number(n.as_f64().unwrap_or(f64::NAN)))),
		Json::String(s) => return Ok(CapturedValue::Leaf(Scalar::String(s))),
		Json::Array(items) => {
			let depth = descend(depth)?;
			return items.into_iter().map(|item| classify(item, depth)).collect::<Result<Vec<_>, _>>().map(CapturedValue::List);
		}
		Json::Object(obj) => obj,
	};
	let depth = descend(depth)?;

	if let Some(ptr) = obj.get(markers::ELEMENT_PTR) {
		let ptr = ptr.as_u64().ok_or(TransportError::InvalidField {
			marker: markers::ELEMENT_PTR,
			expected: "an unsigned integer",
		})?;
		return Ok(CapturedValue::Element(ElementPtr(ptr)));
	}

	if obj.contains_key(markers::REF_ID) {
		return classify_ref(obj, depth).map(CapturedValue::Ref);
	}

	if let Some(hash) = obj.get(markers::PENDING_HASH) {
		let hash = hash.as_str().ok_or(TransportError::InvalidField {
			marker: markers::PENDING_HASH,
			expected: "a string",
		})?;
		return Ok(CapturedValue::Pending(WorkletId::new(hash)));
	}

	if obj.contains_key(markers::WORKLET_ID) {
		return classify_worklet(obj, depth).map(CapturedValue::worklet);
	}

	if let Some(fn_id) = obj.get(markers::CALLABLE_ID) {
		let fn_id = fn_id.as_u64().ok_or(TransportError::InvalidField {
			marker: markers::CALLABLE_ID,
			expected: "an unsigned integer",
		})?;
		return Ok(CapturedValue::Callable(CallableHandle {
			fn_id: CallableId(fn_id),
			execution_id: execution_id(&obj)?,
		}));
	}

	obj.into_iter()
		.map(|(k, v)| classify(v, depth).map(|v| (k, v)))
		.collect::<Result<CapturedMap, _>>()
		.map(CapturedValue::Map)
}

fn classify_ref(mut obj: Map<String, Json>, depth: usize) -> Result<RefHandle, TransportError> {
	let id = obj.get(markers::REF_ID).and_then(Json::as_i64).ok_or(TransportError::InvalidField {
		marker: markers::REF_ID,
		expected: "an integer",
	})?;
	let type_tag = match obj.remove(markers::REF_TYPE) {
		None | Some(Json::Null) => None,
		Some(Json::String(tag)) => Some(tag),
		Some(_) => {
			return Err(TransportError::InvalidField {
				marker: markers::REF_TYPE,
				expected: "a string",
			});
		}
	};
	let initial_value = match obj.remove(markers::REF_INITIAL) {
		Some(value) => classify(value, depth)?,
		None => CapturedValue::NULL,
	};
	Ok(RefHandle {
		id: RefId(id),
		initial_value: Box::new(initial_value),
		type_tag,
	})
}

fn classify_worklet(mut obj: Map<String, Json>, depth: usize) -> Result<WorkletDescriptor, TransportError> {
	let id = match obj.remove(markers::WORKLET_ID) {
		Some(Json::String(id)) => WorkletId::from(id),
		_ => {
			return Err(TransportError::InvalidField {
				marker: markers::WORKLET_ID,
				expected: "a string",
			});
		}
	};
	let execution_id = execution_id(&obj)?;
	obj.remove(markers::EXECUTION_ID);
	let needs_hydration = obj.remove(markers::NEEDS_HYDRATION).and_then(|flag| flag.as_bool()).unwrap_or(false);

	let captured = obj
		.into_iter()
		.map(|(k, v)| classify(v, depth).map(|v| (k, v)))
		.collect::<Result<CapturedMap, _>>()?;

	Ok(WorkletDescriptor {
		id,
		captured,
		execution_id,
		needs_hydration,
		key: None,
	})
}

fn execution_id(obj: &Map<String, Json>) -> Result<Option<ExecutionId>, TransportError> {
	match obj.get(markers::EXECUTION_ID) {
		None | Some(Json::Null) => Ok(None),
		Some(value) => value.as_u64().map(|id| Some(ExecutionId(id))).ok_or(TransportError::InvalidField {
			marker: markers::EXECUTION_ID,
			expected: "an unsigned integer",
		}),
	}
}

fn descend(depth: usize) -> Result<usize, TransportError> {
	let depth = depth + 1;
	if depth >= MAX_DEPTH {
		return Err(TransportError::DepthExceeded { limit: MAX_DEPTH });
	}
	Ok(depth)
}

fn scalar_to_json(scalar: &Scalar) -> Json {
	match scalar {
		Scalar::Null => Json::Null,
		Scalar::Bool(b) => Json::Bool(*b),
		Scalar::Number(n) if n.fract() == 0.0 && n.abs() < 9.007_199_254_740_992e15 => Json::from(*n as i64),
		Scalar::Number(n) => Number::from_f64(*n).map_or(Json::Null, Json::Number),
		Scalar::String(s) => Json::String(s.clone()),
	}
}

fn map_to_json(map: &CapturedMap) -> Map<String, Json> {
	map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect()
}
