//! Runtime configuration.
//!
//! ```toml
//! [runtime]
//! strict_refs = true
//!
//! [guard]
//! enabled = true
//! flush_limit = 256
//! trace_capacity = 256
//! ```

use std::path::Path;

use serde::Deserialize;
use worklet_flush_guard::GuardConfig;

use crate::error::ConfigError;

/// Dispatcher and ref registry settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
	/// Treat a declined ref hydration as a fatal error instead of falling
	/// back to a plain cell.
	pub strict_refs: bool,
}

impl Default for RuntimeConfig {
	fn default() -> Self {
		Self {
			strict_refs: cfg!(debug_assertions),
		}
	}
}

/// Complete configuration: runtime plus flush-loop guard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorkletConfig {
	pub runtime: RuntimeConfig,
	pub guard: GuardConfig,
}

impl WorkletConfig {
	/// Parses configuration from TOML text. Missing keys take their defaults.
	pub fn from_toml(input: &str) -> Result<Self, ConfigError> {
		Ok(toml::from_str(input)?)
	}

	/// Reads and parses a TOML configuration file.
	pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let path = path.as_ref();
		let input = std::fs::read_to_string(path).map_err(|error| ConfigError::Io {
			path: path.to_path_buf(),
			error,
		})?;
		Self::from_toml(&input)
	}
}
