//! Error types for the worklet runtime.

use std::path::PathBuf;

use thiserror::Error;
use worklet_primitives::{RefId, TransportError, WorkletId};

/// Fatal failures surfaced by registration, hydration and dispatch.
///
/// Malformed calls are not represented here: they are logged and recovered
/// locally by the dispatcher.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
	/// The value graph nests deeper than the transform allows.
	#[error("Depth of value exceeds limit of {limit}.")]
	DepthExceeded { limit: usize },

	/// A descriptor names an implementation that was never registered.
	#[error("worklet `{0}` is not registered")]
	UnregisteredWorklet(WorkletId),

	/// A hydration constructor produced no live value in strict mode.
	#[error("Worklet: ref is not initialized: {0}")]
	UninitializedRef(RefId),

	/// A worklet kind string outside `main-thread` / `ui`.
	#[error("unknown worklet kind `{0}` (expected 'main-thread' or 'ui')")]
	UnknownWorkletKind(String),

	/// Wire value could not be classified.
	#[error(transparent)]
	Transport(TransportError),

	/// Failure raised by a worklet body.
	#[error("{0}")]
	Failed(String),
}

impl RuntimeError {
	/// Builds the error a worklet body returns to abort its invocation.
	pub fn failed(message: impl Into<String>) -> Self {
		Self::Failed(message.into())
	}
}

impl From<TransportError> for RuntimeError {
	fn from(error: TransportError) -> Self {
		match error {
			TransportError::DepthExceeded { limit } => Self::DepthExceeded { limit },
			other => Self::Transport(other),
		}
	}
}

/// Result type for runtime operations.
pub type Result<T> = std::result::Result<T, RuntimeError>;

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error parsing TOML syntax or an unknown key.
	#[error("TOML parse error: {0}")]
	Toml(#[from] toml::de::Error),

	/// Error reading a configuration file.
	#[error("I/O error reading {path}: {error}")]
	Io {
		/// Path to the file that failed to read.
		path: PathBuf,
		/// The underlying I/O error.
		error: std::io::Error,
	},
}
