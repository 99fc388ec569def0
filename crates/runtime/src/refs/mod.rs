//! Ref registry and type-directed hydration.

mod cell;
mod registry;
mod types;

pub use cell::{LiveRef, PlainCell, SharedValue};
pub use registry::{RefRegistry, RefSeed};
pub use types::{Constructor, DEFAULT_TYPE_TAG, HydrationTypes};
