//! Service Worker Registration
//!
//! Tracks which worker versions are installing, waiting and active for a scope.

use super::{Scope, ScriptUrl, ServiceWorkerId, UpdateViaCache};

/// A service worker registration
///
/// Represents a registration between a worker script and its scope.
#[derive(Debug, Clone)]
pub struct ServiceWorkerRegistration {
    /// The scope
    scope: Scope,
    /// The script URL
    script_url: ScriptUrl,
    /// Update via cache mode
    update_via_cache: UpdateViaCache,
    /// Installing worker (if any)
    installing: Option<ServiceWorkerId>,
    /// Waiting worker (if any)
    waiting: Option<ServiceWorkerId>,
    /// Active worker (if any)
    active: Option<ServiceWorkerId>,
}

impl ServiceWorkerRegistration {
    /// Create a new registration
    pub fn new(scope: Scope, script_url: ScriptUrl, update_via_cache: UpdateViaCache) -> Self {
        Self {
            scope,
            script_url,
            update_via_cache,
            installing: None,
            waiting: None,
            active: None,
        }
    }

    /// Get the scope
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Get the script URL
    pub fn script_url(&self) -> &ScriptUrl {
        &self.script_url
    }

    /// Point the registration at a different script
    pub fn set_script_url(&mut self, script_url: ScriptUrl) {
        self.script_url = script_url;
    }

    /// Get update via cache mode
    pub fn update_via_cache(&self) -> UpdateViaCache {
        self.update_via_cache
    }

    /// Set update via cache mode
    pub fn set_update_via_cache(&mut self, mode: UpdateViaCache) {
        self.update_via_cache = mode;
    }

    /// Get installing worker
    pub fn installing(&self) -> Option<ServiceWorkerId> {
        self.installing
    }

    /// Set installing worker
    pub fn set_installing(&mut self, id: Option<ServiceWorkerId>) {
        self.installing = id;
    }

    /// Get waiting worker
    pub fn waiting(&self) -> Option<ServiceWorkerId> {
        self.waiting
    }

    /// Set waiting worker, returning the one it replaces
    pub fn set_waiting(&mut self, id: Option<ServiceWorkerId>) -> Option<ServiceWorkerId> {
        std::mem::replace(&mut self.waiting, id)
    }

    /// Get active worker
    pub fn active(&self) -> Option<ServiceWorkerId> {
        self.active
    }

    /// Set active worker, returning the one it replaces
    pub fn set_active(&mut self, id: Option<ServiceWorkerId>) -> Option<ServiceWorkerId> {
        std::mem::replace(&mut self.active, id)
    }

    /// Newest worker: installing, else waiting, else active
    pub fn newest(&self) -> Option<ServiceWorkerId> {
        self.installing.or(self.waiting).or(self.active)
    }
}

/// Registration options
#[derive(Debug, Clone, Default)]
pub struct RegistrationOptions {
    /// The scope (defaults to the script's directory)
    pub scope: Option<String>,
    /// Update via cache
    pub update_via_cache: UpdateViaCache,
}
