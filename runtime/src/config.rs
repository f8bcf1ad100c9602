//! Worker Configuration
//!
//! The worker script served at `/sw.js` is a TOML document describing the
//! cache generation and fetch policy knobs. Bumping `generation` is the only
//! way to invalidate previously cached content.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default product prefix for cache store names.
pub const DEFAULT_PRODUCT: &str = "insta-metrics";

/// Default cache generation identifier.
pub const DEFAULT_GENERATION: &str = "v2";

/// Default upper bound for network-first document fetches.
pub const DEFAULT_NAVIGATION_TIMEOUT_MS: u64 = 10_000;

/// Configuration errors.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("worker script parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Offline cache worker configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorkerConfig {
    /// Product prefix used in cache store names.
    pub product: String,
    /// Cache generation identifier (e.g. `"v2"`).
    pub generation: String,
    /// Origin relative request URLs are resolved against.
    pub origin: String,
    /// Scope root; also the last-resort offline document.
    pub scope: String,
    /// Requests whose path contains this prefix always go to the network.
    pub api_prefix: String,
    /// Document served when a navigation fails with nothing cached.
    pub offline_document: String,
    /// Bootstrap assets stored in the static cache during install.
    pub precache: Vec<String>,
    /// Upper bound for network-first document fetches, in milliseconds.
    pub navigation_timeout_ms: u64,
    /// Request skip-waiting as soon as install finishes.
    pub skip_waiting_on_install: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            product: DEFAULT_PRODUCT.to_string(),
            generation: DEFAULT_GENERATION.to_string(),
            origin: "http://localhost".to_string(),
            scope: "/".to_string(),
            api_prefix: "/api/".to_string(),
            offline_document: "/index.html".to_string(),
            precache: Vec::new(),
            navigation_timeout_ms: DEFAULT_NAVIGATION_TIMEOUT_MS,
            skip_waiting_on_install: true,
        }
    }
}

impl WorkerConfig {
    /// Parse and validate a worker script.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: WorkerConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the invariants the fetch policy relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.product.is_empty() {
            return Err(ConfigError::Invalid {
                field: "product",
                reason: "must not be empty".to_string(),
            });
        }
        if self.generation.is_empty() {
            return Err(ConfigError::Invalid {
                field: "generation",
                reason: "must not be empty".to_string(),
            });
        }
        if !self.api_prefix.starts_with('/') {
            return Err(ConfigError::Invalid {
                field: "api_prefix",
                reason: format!("`{}` must start with '/'", self.api_prefix),
            });
        }
        if self.navigation_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "navigation_timeout_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Names of the two current cache stores.
    pub fn cache_names(&self) -> CacheNames {
        CacheNames::for_generation(&self.product, &self.generation)
    }

    /// Navigation fetch timeout.
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }
}

/// The static/runtime store name pair for one cache generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheNames {
    /// Pre-declared bootstrap assets.
    pub static_name: String,
    /// Responses captured while serving fetches.
    pub runtime_name: String,
}

impl CacheNames {
    /// Derive `<product>-<generation>` and `<product>-runtime-<generation>`.
    pub fn for_generation(product: &str, generation: &str) -> Self {
        Self {
            static_name: format!("{}-{}", product, generation),
            runtime_name: format!("{}-runtime-{}", product, generation),
        }
    }

    /// Whether `name` belongs to this generation.
    pub fn is_current(&self, name: &str) -> bool {
        name == self.static_name || name == self.runtime_name
    }

    /// Lookup order: static first, then runtime.
    pub fn lookup_order(&self) -> [&str; 2] {
        [&self.static_name, &self.runtime_name]
    }
}
