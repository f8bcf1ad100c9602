//! Service Worker Host
//!
//! Plays the browser's part for one origin: registration, update checks,
//! install/activate sequencing, controller hand-off and routing page
//! fetches to the controlling worker.
//!
//! A worker script is a TOML [`WorkerConfig`]; its SHA-256 is the worker's
//! version. An update check that yields the same bytes installs nothing.

use std::collections::BTreeMap;
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tokio::sync::{broadcast, Mutex};
use url::Url;

use crate::config::WorkerConfig;

use super::cache::{CacheStorage, SharedCacheStorage};
use super::events::RegistrationEvent;
use super::fetch::{
    resolve_url, FetchOutcome, Network, NetworkError, Request, RequestCache, RequestDestination,
    ResponseSource, Served,
};
use super::lifecycle::StateChange;
use super::registration::{RegistrationOptions, ServiceWorkerRegistration};
use super::worker::OfflineCacheWorker;
use super::{
    Scope, ScriptUrl, ServiceWorkerError, ServiceWorkerId, ServiceWorkerState, UpdateViaCache,
};

/// Buffered registration events per subscriber.
const EVENT_CAPACITY: usize = 64;

/// Result of an update check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateCheck {
    /// The script is byte-identical to the newest worker's.
    NoUpdate,
    /// A new worker was installed (and possibly activated).
    Installed(ServiceWorkerId),
}

struct HostState {
    registrations: BTreeMap<Scope, ServiceWorkerRegistration>,
    /// Live workers; redundant ones are dropped.
    workers: BTreeMap<ServiceWorkerId, OfflineCacheWorker>,
    /// Worker controlling the page, set by `clients.claim()` on activation.
    controller: Option<ServiceWorkerId>,
}

impl HostState {
    fn emit_state(
        events: &broadcast::Sender<RegistrationEvent>,
        worker: ServiceWorkerId,
        change: StateChange,
        controlled: bool,
    ) {
        log::debug!("[SW host] {} {} -> {}", worker, change.from, change.to);
        let _ = events.send(RegistrationEvent::StateChange {
            worker,
            from: change.from,
            to: change.to,
            controlled,
        });
    }

    /// Promote the scope's waiting worker: activate, claim clients, retire
    /// the previous active worker.
    fn activate_waiting(
        &mut self,
        scope: &Scope,
        events: &broadcast::Sender<RegistrationEvent>,
    ) -> Result<Option<ServiceWorkerId>, ServiceWorkerError> {
        let controlled = self.controller.is_some();
        let registration = self
            .registrations
            .get_mut(scope)
            .ok_or_else(|| ServiceWorkerError::RegistrationNotFound(scope.path().to_string()))?;
        let Some(id) = registration.waiting() else {
            return Ok(None);
        };
        let worker = self
            .workers
            .get_mut(&id)
            .ok_or(ServiceWorkerError::WorkerNotFound(id))?;

        let change = worker.begin_activate()?;
        Self::emit_state(events, id, change, controlled);
        let activation = worker.activate()?;
        Self::emit_state(events, id, activation.change, controlled);

        registration.set_waiting(None);
        let previous = registration.set_active(Some(id));

        self.controller = Some(id);
        log::info!("[SW host] {} now controls {}", id, scope.path());
        let _ = events.send(RegistrationEvent::ControllerChange { worker: id });

        if let Some(previous) = previous {
            self.retire(previous, controlled, events);
        }
        Ok(Some(id))
    }

    fn retire(
        &mut self,
        id: ServiceWorkerId,
        controlled: bool,
        events: &broadcast::Sender<RegistrationEvent>,
    ) {
        if let Some(mut worker) = self.workers.remove(&id) {
            match worker.make_redundant() {
                Ok(change) => Self::emit_state(events, id, change, controlled),
                Err(error) => log::warn!("[SW host] could not retire {}: {}", id, error),
            }
        }
    }

    fn scope_waiting_on(&self, worker: ServiceWorkerId) -> Option<Scope> {
        self.registrations
            .iter()
            .find(|(_, registration)| registration.waiting() == Some(worker))
            .map(|(scope, _)| scope.clone())
    }
}

/// In-process service worker host for one origin.
pub struct ServiceWorkerHost {
    origin: String,
    network: Arc<dyn Network>,
    caches: SharedCacheStorage,
    state: Mutex<HostState>,
    /// Serializes update checks so at most one worker installs at a time.
    update_lock: Mutex<()>,
    events: broadcast::Sender<RegistrationEvent>,
}

impl ServiceWorkerHost {
    /// Create a host with fresh cache storage
    pub fn new(origin: impl Into<String>, network: Arc<dyn Network>) -> Self {
        Self::with_cache_storage(origin, network, CacheStorage::new().shared())
    }

    /// Create a host over existing cache storage (e.g. surviving a restart)
    pub fn with_cache_storage(
        origin: impl Into<String>,
        network: Arc<dyn Network>,
        caches: SharedCacheStorage,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            origin: origin.into(),
            network,
            caches,
            state: Mutex::new(HostState {
                registrations: BTreeMap::new(),
                workers: BTreeMap::new(),
                controller: None,
            }),
            update_lock: Mutex::new(()),
            events,
        }
    }

    /// Cache storage shared with the workers
    pub fn caches(&self) -> SharedCacheStorage {
        self.caches.clone()
    }

    /// Subscribe to registration events.
    pub fn subscribe(&self) -> broadcast::Receiver<RegistrationEvent> {
        self.events.subscribe()
    }

    /// Register `script_url`.
    ///
    /// The script and scope may be relative or absolute, but must be on this
    /// host's origin; registrations are keyed by scope path. Registering the
    /// same script for a scope that already has a worker is a no-op. A
    /// different script URL replaces the registration's script and triggers an
    /// update check.
    pub async fn register(
        &self,
        script_url: &str,
        options: RegistrationOptions,
    ) -> Result<Scope, ServiceWorkerError> {
        let script = self.same_origin_url(script_url)?;
        let script_url = script.as_str();
        let max_scope = Scope::for_script(script.path());
        let scope = match options.scope {
            Some(scope) => Scope::new(self.same_origin_url(&scope)?.path()),
            None => max_scope.clone(),
        };
        if !max_scope.contains(scope.path()) {
            return Err(ServiceWorkerError::SecurityError(format!(
                "scope {} is outside the script's directory {}",
                scope.path(),
                max_scope.path()
            )));
        }

        {
            let mut state = self.state.lock().await;
            let has_worker = |reg: &ServiceWorkerRegistration| reg.newest().is_some();
            match state.registrations.get_mut(&scope) {
                Some(registration) if registration.script_url().url() == script_url => {
                    registration.set_update_via_cache(options.update_via_cache);
                    if has_worker(registration) {
                        log::debug!(
                            "[SW host] {} already registered for {}",
                            script_url,
                            scope.path()
                        );
                        return Ok(scope);
                    }
                }
                Some(registration) => {
                    log::info!("[SW host] {} now points at {}", scope.path(), script_url);
                    registration.set_script_url(ScriptUrl::new(script_url));
                    registration.set_update_via_cache(options.update_via_cache);
                }
                None => {
                    log::info!("[SW host] registering {} for {}", script_url, scope.path());
                    state.registrations.insert(
                        scope.clone(),
                        ServiceWorkerRegistration::new(
                            scope.clone(),
                            ScriptUrl::new(script_url),
                            options.update_via_cache,
                        ),
                    );
                }
            }
        }

        if let Err(error) = self.update(&scope).await {
            let mut state = self.state.lock().await;
            let empty = state
                .registrations
                .get(&scope)
                .map(|registration| registration.newest().is_none())
                .unwrap_or(false);
            if empty {
                state.registrations.remove(&scope);
            }
            return Err(error);
        }
        Ok(scope)
    }

    /// Check the registration's script for a new version.
    ///
    /// A changed script is installed; it activates right away when it asked
    /// to skip waiting or when nothing is active yet.
    pub async fn update(&self, scope: &Scope) -> Result<UpdateCheck, ServiceWorkerError> {
        let _serial = self.update_lock.lock().await;

        let (script_url, mode, newest_hash) = {
            let state = self.state.lock().await;
            let registration = state
                .registrations
                .get(scope)
                .ok_or_else(|| ServiceWorkerError::RegistrationNotFound(scope.path().to_string()))?;
            let newest_hash = registration
                .newest()
                .and_then(|id| state.workers.get(&id))
                .map(|worker| worker.script_hash().to_string());
            (
                registration.script_url().url().to_string(),
                registration.update_via_cache(),
                newest_hash,
            )
        };

        let script = self.fetch_script(&script_url, mode).await?;
        let hash = hex::encode(Sha256::digest(script.as_bytes()));
        if newest_hash.as_deref() == Some(hash.as_str()) {
            log::debug!("[SW host] {} unchanged", script_url);
            return Ok(UpdateCheck::NoUpdate);
        }

        let mut config = WorkerConfig::from_toml_str(&script)?;
        config.origin = self.origin.clone();
        let mut worker =
            OfflineCacheWorker::new(config, hash, self.caches.clone(), self.network.clone());
        let id = worker.id();

        {
            let mut state = self.state.lock().await;
            let controlled = state.controller.is_some();
            let registration = state
                .registrations
                .get_mut(scope)
                .ok_or_else(|| ServiceWorkerError::RegistrationNotFound(scope.path().to_string()))?;
            let change = worker.begin_install()?;
            registration.set_installing(Some(id));
            log::info!("[SW host] update found for {}: {}", scope.path(), id);
            let _ = self.events.send(RegistrationEvent::UpdateFound {
                scope: scope.clone(),
                worker: id,
            });
            HostState::emit_state(&self.events, id, change, controlled);
        }

        let installed = worker.install().await;

        let mut state = self.state.lock().await;
        let controlled = state.controller.is_some();
        if let Some(registration) = state.registrations.get_mut(scope) {
            registration.set_installing(None);
        }
        let change = match installed {
            Ok(change) => change,
            Err(error) => {
                log::error!("[SW host] install of {} failed: {}", id, error);
                if let Ok(change) = worker.make_redundant() {
                    HostState::emit_state(&self.events, id, change, controlled);
                }
                return Err(error);
            }
        };
        HostState::emit_state(&self.events, id, change, controlled);

        let skip_waiting = worker.skip_waiting_requested();
        state.workers.insert(id, worker);
        let registration = state
            .registrations
            .get_mut(scope)
            .ok_or_else(|| ServiceWorkerError::RegistrationNotFound(scope.path().to_string()))?;
        let replaced = registration.set_waiting(Some(id));
        let has_active = registration.active().is_some();
        if let Some(replaced) = replaced {
            state.retire(replaced, controlled, &self.events);
        }

        if skip_waiting || !has_active {
            state.activate_waiting(scope, &self.events)?;
        } else {
            log::info!("[SW host] {} waiting to activate", id);
        }
        Ok(UpdateCheck::Installed(id))
    }

    /// Deliver a page message to a worker.
    ///
    /// A `SKIP_WAITING` accepted by a waiting worker activates it immediately.
    pub async fn post_message(
        &self,
        worker: ServiceWorkerId,
        message: serde_json::Value,
    ) -> Result<(), ServiceWorkerError> {
        let mut state = self.state.lock().await;
        let target = state
            .workers
            .get_mut(&worker)
            .ok_or(ServiceWorkerError::WorkerNotFound(worker))?;
        if !target.on_message(&message) {
            return Ok(());
        }
        if let Some(scope) = state.scope_waiting_on(worker) {
            state.activate_waiting(&scope, &self.events)?;
        }
        Ok(())
    }

    /// Perform a page request.
    ///
    /// Controlled pages go through the active worker; uncontrolled pages and
    /// requests the worker declines hit the network directly.
    pub async fn fetch(&self, mut request: Request) -> Result<Served, NetworkError> {
        request.url = resolve_url(&self.origin, &request.url);

        // Clone the handler out so no lock is held across network awaits.
        let handler = {
            let state = self.state.lock().await;
            state
                .controller
                .and_then(|id| state.workers.get(&id))
                .filter(|worker| worker.state().can_intercept_fetch())
                .map(|worker| worker.fetch_handler())
        };

        if let Some(handler) = handler {
            match handler.handle(request.clone()).await {
                FetchOutcome::Responded(served) => return Ok(served),
                FetchOutcome::Failed(error) => return Err(error),
                FetchOutcome::Passthrough(_) => {}
            }
        }

        let response = self.network.fetch(&request).await?;
        Ok(Served::new(response, ResponseSource::Network))
    }

    /// The worker controlling the page, if any
    pub async fn controller(&self) -> Option<ServiceWorkerId> {
        self.state.lock().await.controller
    }

    /// State of a live worker; `None` once it has been retired
    pub async fn worker_state(&self, worker: ServiceWorkerId) -> Option<ServiceWorkerState> {
        self.state
            .lock()
            .await
            .workers
            .get(&worker)
            .map(|worker| worker.state())
    }

    /// Snapshot of a registration
    pub async fn registration(&self, scope: &Scope) -> Option<ServiceWorkerRegistration> {
        self.state.lock().await.registrations.get(scope).cloned()
    }

    fn same_origin_url(&self, raw: &str) -> Result<Url, ServiceWorkerError> {
        let origin = Url::parse(&self.origin).map_err(|error| {
            ServiceWorkerError::SecurityError(format!("invalid origin {}: {}", self.origin, error))
        })?;
        let url = origin.join(raw).map_err(|error| {
            ServiceWorkerError::SecurityError(format!("invalid URL {}: {}", raw, error))
        })?;
        if url.origin() != origin.origin() {
            return Err(ServiceWorkerError::SecurityError(format!(
                "{} is not on origin {}",
                url, self.origin
            )));
        }
        Ok(url)
    }

    async fn fetch_script(
        &self,
        script_url: &str,
        mode: UpdateViaCache,
    ) -> Result<String, ServiceWorkerError> {
        let url = resolve_url(&self.origin, script_url);
        let cache = match mode {
            UpdateViaCache::All => RequestCache::Default,
            UpdateViaCache::Imports | UpdateViaCache::None => RequestCache::NoCache,
        };
        let request = Request::new(url.clone())
            .with_destination(RequestDestination::Worker)
            .with_cache(cache);

        let response = self.network.fetch(&request).await.map_err(|error| {
            ServiceWorkerError::ScriptFetchFailed {
                url: url.clone(),
                reason: error.to_string(),
            }
        })?;
        if response.status != 200 {
            return Err(ServiceWorkerError::ScriptFetchFailed {
                url,
                reason: format!("HTTP {}", response.status),
            });
        }
        String::from_utf8(response.body).map_err(|_| ServiceWorkerError::ScriptFetchFailed {
            url,
            reason: "script is not valid UTF-8".to_string(),
        })
    }
}
