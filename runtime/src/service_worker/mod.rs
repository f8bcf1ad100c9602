//! Service Worker Module
//!
//! Offline cache worker for the Insta-Metrics PWA: lifecycle state machine,
//! fetch interception policy, cache stores and the in-process host that
//! registers, updates and hands control between worker versions.

mod cache;
mod events;
mod fetch;
mod host;
mod lifecycle;
mod registration;
mod strategy;
mod worker;

pub use cache::*;
pub use events::*;
pub use fetch::*;
pub use host::*;
pub use lifecycle::*;
pub use registration::*;
pub use strategy::*;
pub use worker::*;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// Service Worker global ID counter
static NEXT_SW_ID: AtomicU64 = AtomicU64::new(1);

/// Service Worker states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServiceWorkerState {
    /// Initial state, script parsed
    #[default]
    Parsed,
    /// Installing (install event fired)
    Installing,
    /// Installed, waiting to activate
    Installed,
    /// Activating (activate event fired)
    Activating,
    /// Active and controlling pages
    Activated,
    /// Failed or replaced
    Redundant,
}

impl ServiceWorkerState {
    /// Only an activated worker intercepts fetches.
    pub fn can_intercept_fetch(&self) -> bool {
        matches!(self, ServiceWorkerState::Activated)
    }

    /// Check if the worker is in a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, ServiceWorkerState::Redundant)
    }
}

impl fmt::Display for ServiceWorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceWorkerState::Parsed => write!(f, "parsed"),
            ServiceWorkerState::Installing => write!(f, "installing"),
            ServiceWorkerState::Installed => write!(f, "installed"),
            ServiceWorkerState::Activating => write!(f, "activating"),
            ServiceWorkerState::Activated => write!(f, "activated"),
            ServiceWorkerState::Redundant => write!(f, "redundant"),
        }
    }
}

/// Service Worker error types
#[derive(thiserror::Error, Debug)]
pub enum ServiceWorkerError {
    #[error("script fetch failed for {url}: {reason}")]
    ScriptFetchFailed { url: String, reason: String },

    #[error("script evaluation failed: {0}")]
    ScriptEvalFailed(#[from] ConfigError),

    #[error("invalid state transition: {from} -> {to}")]
    InvalidStateTransition {
        from: ServiceWorkerState,
        to: ServiceWorkerState,
    },

    #[error("no registration for scope {0}")]
    RegistrationNotFound(String),

    #[error("service worker {0} not found")]
    WorkerNotFound(ServiceWorkerId),

    #[error("security error: {0}")]
    SecurityError(String),
}

/// Service Worker ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceWorkerId(u64);

impl ServiceWorkerId {
    /// Create a new unique ID
    pub fn new() -> Self {
        Self(NEXT_SW_ID.fetch_add(1, Ordering::SeqCst))
    }
}

impl Default for ServiceWorkerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ServiceWorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Service Worker scope
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Scope(String);

impl Scope {
    /// Create a new scope
    pub fn new(path: impl Into<String>) -> Self {
        let mut path = path.into();
        if !path.ends_with('/') {
            path.push('/');
        }
        Self(path)
    }

    /// Default scope for a script: its directory.
    pub fn for_script(script_url: &str) -> Self {
        match script_url.rfind('/') {
            Some(pos) => Self::new(&script_url[..=pos]),
            None => Self::new("/"),
        }
    }

    /// Get the path
    pub fn path(&self) -> &str {
        &self.0
    }

    /// Check if a path is within this scope
    pub fn contains(&self, path: &str) -> bool {
        path.starts_with(&self.0)
    }
}

/// Service Worker script URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptUrl(String);

impl ScriptUrl {
    /// Create a new script URL
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    /// Get the URL
    pub fn url(&self) -> &str {
        &self.0
    }
}

/// Update via cache mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateViaCache {
    /// Import scripts cached, main script not
    #[default]
    Imports,
    /// All scripts cached
    All,
    /// No caching; every update check hits the server
    None,
}
