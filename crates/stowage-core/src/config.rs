//! Store configuration: sizing, backing medium and dynamic-segment share.
//!
//! [`StoreConfig`] is consumed by store construction. It can be built in
//! code or loaded from TOML:
//!
//! ```toml
//! size = 1_000_000
//! size_type = "elements"   # or "bytes"
//! location = "native"      # or "byte_array"
//! dynamic_ratio = 0.2
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// How [`StoreConfig::size`] is interpreted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeType {
    /// `size` is a slot count.
    #[default]
    Elements,
    /// `size` is a total byte budget for both segments.
    Bytes,
}

/// Backing medium of the byte arena.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryLocation {
    /// A raw, zero-initialised allocation outside any Rust collection.
    #[default]
    Native,
    /// A `Vec<u8>`.
    ByteArray,
}

/// Configuration consumed by store construction.
///
/// Validated at construction; immutable afterwards.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// Slot count or byte budget, depending on `size_type`. Default: 100.
    pub size: u64,
    /// Interpretation of `size`. Default: elements.
    pub size_type: SizeType,
    /// Backing medium. Default: native.
    pub location: MemoryLocation,
    /// Share of the total arena given to the dynamic segment, in
    /// `[0, 1)`. Default: 0.2.
    pub dynamic_ratio: f64,
}

impl StoreConfig {
    /// Default `size`.
    pub const DEFAULT_SIZE: u64 = 100;

    /// Default `dynamic_ratio`.
    pub const DEFAULT_DYNAMIC_RATIO: f64 = 0.2;

    /// Config holding `size` elements with default everything else.
    pub fn elements(size: u64) -> Self {
        Self::default().with_size(size)
    }

    /// Set `size`.
    pub fn with_size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }

    /// Set `size_type`.
    pub fn with_size_type(mut self, size_type: SizeType) -> Self {
        self.size_type = size_type;
        self
    }

    /// Set `location`.
    pub fn with_location(mut self, location: MemoryLocation) -> Self {
        self.location = location;
        self
    }

    /// Set `dynamic_ratio`.
    pub fn with_dynamic_ratio(mut self, dynamic_ratio: f64) -> Self {
        self.dynamic_ratio = dynamic_ratio;
        self
    }

    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.size == 0 {
            return Err(ConfigError::ZeroSize);
        }
        if !self.dynamic_ratio.is_finite() || !(0.0..1.0).contains(&self.dynamic_ratio) {
            return Err(ConfigError::InvalidDynamicRatio {
                ratio: self.dynamic_ratio,
            });
        }
        Ok(())
    }

    /// Parse and validate a TOML document. Missing keys take defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            size: Self::DEFAULT_SIZE,
            size_type: SizeType::default(),
            location: MemoryLocation::default(),
            dynamic_ratio: Self::DEFAULT_DYNAMIC_RATIO,
        }
    }
}
