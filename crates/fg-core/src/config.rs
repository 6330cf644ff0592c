//! Engine configuration
//!
//! A [`Config`] is passed explicitly to the network engine, the matching
//! result and the orchestrator. Hosts usually build it with the setters, or
//! load it from JSON:
//!
//! ```
//! use fg_core::config::{CompatibilityTypes, Config};
//!
//! let config = Config::from_json(r#"{"compatibility": ["extension_chromium"], "resultCacheSize": 100}"#).unwrap();
//! assert_eq!(config.compatibility, CompatibilityTypes::EXTENSION_CHROMIUM);
//! assert_eq!(config.result_cache_size, 100);
//! assert!(!config.supports_replace());
//! ```

use serde::{Deserialize, Deserializer};

/// Default number of cached matching results.
pub const DEFAULT_RESULT_CACHE_SIZE: usize = 500;

/// Default number of rules indexed between two yield points.
pub const DEFAULT_CHUNK_SIZE: usize = 5000;

bitflags::bitflags! {
    /// Platforms the engine is running for.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CompatibilityTypes: u8 {
        /// Native filtering library (can rewrite response bodies)
        const CORELIBS = 1 << 0;
        const EXTENSION_CHROMIUM = 1 << 1;
        /// Firefox extension (can rewrite response bodies)
        const EXTENSION_FIREFOX = 1 << 2;

        const ALL = Self::CORELIBS.bits()
            | Self::EXTENSION_CHROMIUM.bits()
            | Self::EXTENSION_FIREFOX.bits();
    }
}

impl CompatibilityTypes {
    fn parse_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "corelibs" => Some(Self::CORELIBS),
            "extension_chromium" | "chromium" => Some(Self::EXTENSION_CHROMIUM),
            "extension_firefox" | "firefox" => Some(Self::EXTENSION_FIREFOX),
            "all" => Some(Self::ALL),
            _ => None,
        }
    }
}

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{0} must be greater than zero")]
    ZeroSize(&'static str),
}

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// Target platforms; decides which modifiers can be honoured.
    #[serde(deserialize_with = "deserialize_compatibility")]
    pub compatibility: CompatibilityTypes,
    /// Capacity of the orchestrator's result cache.
    pub result_cache_size: usize,
    /// Rules indexed between two yield points of the cooperative loaders.
    pub chunk_size: usize,
    pub verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            compatibility: CompatibilityTypes::ALL,
            result_cache_size: DEFAULT_RESULT_CACHE_SIZE,
            chunk_size: DEFAULT_CHUNK_SIZE,
            verbose: false,
        }
    }
}

impl Config {
    /// Parse a JSON config; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_json::from_str(json)?;
        if config.result_cache_size == 0 {
            return Err(ConfigError::ZeroSize("resultCacheSize"));
        }
        if config.chunk_size == 0 {
            return Err(ConfigError::ZeroSize("chunkSize"));
        }
        Ok(config)
    }

    pub fn with_compatibility(mut self, compatibility: CompatibilityTypes) -> Self {
        self.compatibility = compatibility;
        self
    }

    pub fn with_result_cache_size(mut self, size: usize) -> Self {
        self.result_cache_size = size;
        self
    }

    /// Zero is bumped to one so loading always makes progress.
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.max(1);
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// True if any of the given platforms is targeted.
    pub fn is_compatible_with(&self, platforms: CompatibilityTypes) -> bool {
        self.compatibility.intersects(platforms)
    }

    /// `$replace` needs a platform able to rewrite response bodies.
    pub fn supports_replace(&self) -> bool {
        self.is_compatible_with(CompatibilityTypes::CORELIBS | CompatibilityTypes::EXTENSION_FIREFOX)
    }
}

fn deserialize_compatibility<'de, D>(deserializer: D) -> Result<CompatibilityTypes, D::Error>
where
    D: Deserializer<'de>,
{
    let names = Vec::<String>::deserialize(deserializer)?;
    names.iter().try_fold(CompatibilityTypes::empty(), |acc, name| {
        CompatibilityTypes::parse_name(name)
            .map(|flag| acc | flag)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown platform `{name}`")))
    })
}
