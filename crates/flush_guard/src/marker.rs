//! Marker strings recorded by the runtime.

/// Recorded by the host once per render flush.
pub const RENDER: &str = "render";

/// Worklet invocation.
pub fn invoke(id: impl std::fmt::Display) -> String {
	format!("invoke {id}")
}

/// Read of a ref's current value.
pub fn ref_get(id: impl std::fmt::Display) -> String {
	format!("ref:get {id}")
}

/// Event-sourced invocation.
pub fn event(kind: &str) -> String {
	format!("event:{kind}")
}
