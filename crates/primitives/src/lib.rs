#![cfg_attr(test, allow(unused_crate_dependencies))]

//! Transport-form types shared between the logic context and the UI context.
//!
//! Values arriving from the logic context are classified exactly once, at the
//! transport boundary, into [`CapturedValue`]. Everything downstream matches on
//! that closed set of variants instead of probing marker fields.

/// Transport-form values, descriptors and handles.
pub mod captured;
/// Identifier newtypes.
pub mod ids;
/// JSON classification at the transport boundary.
pub mod transport;

pub use captured::{CallableHandle, CapturedMap, CapturedValue, ElementPtr, RefHandle, Scalar, WorkletDescriptor};
pub use ids::{CallableId, DescriptorKey, ExecutionId, RefId, WorkletId};
pub use transport::{MAX_DEPTH, TransportError, markers};
