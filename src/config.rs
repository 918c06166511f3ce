use crate::error::MapperResult;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for a [`Mapper`](crate::Mapper).
///
/// ```toml
/// eager = true
/// concurrent_lookups = false
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapperConfig {
    /// Resolve every reference field while decoding
    #[serde(default)]
    pub eager: bool,
    /// Run the per-collection lookups of one resolve call concurrently
    #[serde(default = "default_concurrent_lookups")]
    pub concurrent_lookups: bool,
}

fn default_concurrent_lookups() -> bool {
    true
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            eager: false,
            concurrent_lookups: default_concurrent_lookups(),
        }
    }
}

impl MapperConfig {
    /// Default configuration with eager reference resolution enabled
    pub fn eager() -> Self {
        Self {
            eager: true,
            ..Default::default()
        }
    }

    pub fn with_eager(mut self, eager: bool) -> Self {
        self.eager = eager;
        self
    }

    pub fn with_concurrent_lookups(mut self, concurrent: bool) -> Self {
        self.concurrent_lookups = concurrent;
        self
    }

    pub fn from_toml_str(contents: &str) -> MapperResult<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Load the configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> MapperResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }
}
