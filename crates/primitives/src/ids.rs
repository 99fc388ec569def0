use std::fmt;
use std::sync::Arc;

/// Identifier of a registered worklet implementation.
///
/// Worklet ids are content hashes produced by the build tooling. The
/// "not-yet-registered" hash carried by pending descriptors lives in the same
/// id space: once an implementation is registered under a hash, pending calls
/// for that hash become runnable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkletId(Arc<str>);

impl WorkletId {
	/// Creates a worklet id from any string-like value.
	pub fn new(id: impl AsRef<str>) -> Self {
		Self(Arc::from(id.as_ref()))
	}

	/// Returns the id as a string slice.
	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for WorkletId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for WorkletId {
	fn from(value: &str) -> Self {
		Self::new(value)
	}
}

impl From<String> for WorkletId {
	fn from(value: String) -> Self {
		Self(Arc::from(value))
	}
}

/// Identifier of a worklet ref.
///
/// Negative ids belong to refs created during the first-screen bootstrap pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RefId(pub i64);

impl RefId {
	/// Returns true for ids allocated during first-screen bootstrap.
	pub const fn is_first_screen(self) -> bool {
		self.0 < 0
	}
}

impl fmt::Display for RefId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// Identifier of a callable living in the logic context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallableId(pub u64);

/// Identifier of one worklet execution owner, used for callable lifecycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExecutionId(pub u64);

impl fmt::Display for ExecutionId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// Stable arena index assigned to an interned worklet descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DescriptorKey(pub usize);
