//! Offline Cache Worker
//!
//! Install, activate, fetch and message handlers for one worker version.
//!
//! Fetch routing (see [`classify_and_route`]):
//!
//! | request                      | strategy                                   |
//! |------------------------------|--------------------------------------------|
//! | non-GET                      | pass through                               |
//! | path contains the API prefix | pass through                               |
//! | document / `/` / `*.html`    | network-first, cache then offline document |
//! | anything else                | cache-first, background revalidation       |

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time;

use crate::config::{CacheNames, WorkerConfig};

use super::cache::SharedCacheStorage;
use super::events::ClientMessage;
use super::fetch::{
    resolve_url, FetchOutcome, Network, NetworkError, Request, Response, ResponseSource,
    ResponseType, Served,
};
use super::lifecycle::{Lifecycle, StateChange};
use super::strategy::{classify_and_route, Strategy};
use super::{ServiceWorkerError, ServiceWorkerId, ServiceWorkerState};

/// Fetch policy of one worker version.
///
/// Cheap to clone; clones share the cache storage and the network.
#[derive(Clone)]
pub struct OfflineFetchHandler {
    config: Arc<WorkerConfig>,
    names: CacheNames,
    caches: SharedCacheStorage,
    network: Arc<dyn Network>,
}

impl OfflineFetchHandler {
    /// Create a handler for `config`'s cache generation
    pub fn new(
        config: Arc<WorkerConfig>,
        caches: SharedCacheStorage,
        network: Arc<dyn Network>,
    ) -> Self {
        let names = config.cache_names();
        Self {
            config,
            names,
            caches,
            network,
        }
    }

    /// Worker configuration
    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Answer an intercepted request.
    pub async fn handle(&self, mut request: Request) -> FetchOutcome {
        request.url = resolve_url(&self.config.origin, &request.url);

        match classify_and_route(&request, &self.config) {
            Strategy::Passthrough(reason) => {
                log::trace!("[SW] passing through {} ({:?})", request.url, reason);
                FetchOutcome::Passthrough(reason)
            }
            Strategy::NetworkFirst => self.network_first(request).await,
            Strategy::CacheFirst => self.cache_first(request).await,
        }
    }

    async fn network_first(&self, request: Request) -> FetchOutcome {
        let timeout = self.config.navigation_timeout();
        let fetched = match time::timeout(timeout, self.network.fetch(&request)).await {
            Ok(result) => result,
            Err(_) => Err(NetworkError::Timeout(timeout)),
        };

        match fetched {
            Ok(response) if response.status == 200 => {
                self.store(&self.names.runtime_name, &request, &response);
                FetchOutcome::Responded(Served::new(response, ResponseSource::Network))
            }
            Ok(response) => {
                log::debug!(
                    "[SW] {} returned {}, trying cache",
                    request.url,
                    response.status
                );
                match self.cached_or_offline(&request) {
                    Some(served) => FetchOutcome::Responded(served),
                    None => FetchOutcome::Responded(Served::new(response, ResponseSource::Network)),
                }
            }
            Err(error) => {
                log::info!("[SW] {} unreachable ({}), serving cache", request.url, error);
                match self.cached_or_offline(&request) {
                    Some(served) => FetchOutcome::Responded(served),
                    None => FetchOutcome::Failed(error),
                }
            }
        }
    }

    async fn cache_first(&self, request: Request) -> FetchOutcome {
        if let Some(cached) = self.lookup(&request) {
            let mut served = Served::new(cached, ResponseSource::Cache);
            served.revalidation = Some(self.spawn_revalidation(request));
            return FetchOutcome::Responded(served);
        }

        match self.network.fetch(&request).await {
            Ok(response) => {
                if response.status == 200 && response.response_type == ResponseType::Basic {
                    self.store(&self.names.runtime_name, &request, &response);
                }
                FetchOutcome::Responded(Served::new(response, ResponseSource::Network))
            }
            Err(error) => {
                log::debug!("[SW] {} failed with nothing cached: {}", request.url, error);
                FetchOutcome::Failed(error)
            }
        }
    }

    /// Refresh the runtime entry without blocking the caller.
    ///
    /// Races the cached response already handed out; only later requests
    /// observe the refreshed content.
    fn spawn_revalidation(&self, request: Request) -> JoinHandle<()> {
        let handler = self.clone();
        tokio::spawn(async move {
            match handler.network.fetch(&request).await {
                Ok(response) if response.status == 200 => {
                    handler.store(&handler.names.runtime_name, &request, &response);
                }
                Ok(response) => {
                    log::debug!(
                        "[SW] revalidation of {} returned {}",
                        request.url,
                        response.status
                    );
                }
                Err(error) => {
                    log::debug!("[SW] revalidation of {} failed: {}", request.url, error);
                }
            }
        })
    }

    /// Exact-request match in the current stores.
    fn lookup(&self, request: &Request) -> Option<Response> {
        self.caches
            .read()
            .match_in(&self.names.lookup_order(), request)
    }

    fn cached_or_offline(&self, request: &Request) -> Option<Served> {
        if let Some(cached) = self.lookup(request) {
            return Some(Served::new(cached, ResponseSource::Cache));
        }
        self.offline_document()
            .map(|fallback| Served::new(fallback, ResponseSource::OfflineFallback))
    }

    /// Cached root document: the offline document, else the scope root.
    fn offline_document(&self) -> Option<Response> {
        [&self.config.offline_document, &self.config.scope]
            .into_iter()
            .map(|path| Request::new(resolve_url(&self.config.origin, path)))
            .find_map(|request| self.lookup(&request))
    }

    /// Best-effort write; a failed write never fails the fetch.
    fn store(&self, cache_name: &str, request: &Request, response: &Response) -> bool {
        let result = self
            .caches
            .write()
            .put(cache_name, request.clone(), response.clone());
        match result {
            Ok(()) => true,
            Err(error) => {
                log::warn!("[SW] could not cache {} in {}: {}", request.url, cache_name, error);
                false
            }
        }
    }

    /// Store the configured bootstrap assets in the static cache.
    async fn precache(&self) -> usize {
        let mut stored = 0;
        for path in &self.config.precache {
            let request = Request::new(resolve_url(&self.config.origin, path));
            match self.network.fetch(&request).await {
                Ok(response) if response.status == 200 => {
                    if self.store(&self.names.static_name, &request, &response) {
                        stored += 1;
                    }
                }
                Ok(response) => {
                    log::warn!("[SW] precache of {} returned {}", request.url, response.status);
                }
                Err(error) => {
                    log::warn!("[SW] precache of {} failed: {}", request.url, error);
                }
            }
        }
        stored
    }

    /// Delete every store that is not one of the two current names.
    fn delete_stale_caches(&self) -> Vec<String> {
        let mut caches = self.caches.write();
        let stale: Vec<String> = caches
            .keys()
            .into_iter()
            .filter(|name| !self.names.is_current(name))
            .collect();
        for name in &stale {
            log::info!("[SW] Deleting old cache: {}", name);
            caches.delete(name);
        }
        stale
    }
}

/// Outcome of the activate handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Activation {
    /// The `activating → activated` transition
    pub change: StateChange,
    /// Stale stores removed during activation
    pub deleted_caches: Vec<String>,
}

/// One version of the offline cache worker.
pub struct OfflineCacheWorker {
    id: ServiceWorkerId,
    script_hash: String,
    lifecycle: Lifecycle,
    handler: OfflineFetchHandler,
}

impl OfflineCacheWorker {
    /// Create a worker from an evaluated script
    pub fn new(
        config: WorkerConfig,
        script_hash: impl Into<String>,
        caches: SharedCacheStorage,
        network: Arc<dyn Network>,
    ) -> Self {
        Self {
            id: ServiceWorkerId::new(),
            script_hash: script_hash.into(),
            lifecycle: Lifecycle::new(),
            handler: OfflineFetchHandler::new(Arc::new(config), caches, network),
        }
    }

    /// Get the worker ID
    pub fn id(&self) -> ServiceWorkerId {
        self.id
    }

    /// SHA-256 of the script this worker was built from (hex)
    pub fn script_hash(&self) -> &str {
        &self.script_hash
    }

    /// Get current state
    pub fn state(&self) -> ServiceWorkerState {
        self.lifecycle.state()
    }

    /// Whether the worker asked to skip waiting
    pub fn skip_waiting_requested(&self) -> bool {
        self.lifecycle.skip_waiting_requested()
    }

    /// A handle for serving fetches outside the host lock
    pub fn fetch_handler(&self) -> OfflineFetchHandler {
        self.handler.clone()
    }

    /// `parsed → installing`
    pub fn begin_install(&mut self) -> Result<StateChange, ServiceWorkerError> {
        self.lifecycle.begin_install()
    }

    /// Install handler: precache, then `installing → installed`.
    ///
    /// Skip-waiting is requested eagerly when configured, so activation does
    /// not wait for older versions to release their pages.
    pub async fn install(&mut self) -> Result<StateChange, ServiceWorkerError> {
        if self.state() != ServiceWorkerState::Installing {
            return Err(ServiceWorkerError::InvalidStateTransition {
                from: self.state(),
                to: ServiceWorkerState::Installed,
            });
        }

        log::info!(
            "[SW] Installing {} ({})",
            self.id,
            self.handler.config().generation
        );
        let stored = self.handler.precache().await;
        if stored > 0 {
            log::debug!("[SW] precached {} assets", stored);
        }

        let change = self.lifecycle.finish_install()?;
        if self.handler.config().skip_waiting_on_install {
            self.lifecycle.skip_waiting();
        }
        Ok(change)
    }

    /// `installed → activating`
    pub fn begin_activate(&mut self) -> Result<StateChange, ServiceWorkerError> {
        self.lifecycle.begin_activate()
    }

    /// Activate handler: drop stale stores, then `activating → activated`.
    pub fn activate(&mut self) -> Result<Activation, ServiceWorkerError> {
        if self.state() != ServiceWorkerState::Activating {
            return Err(ServiceWorkerError::InvalidStateTransition {
                from: self.state(),
                to: ServiceWorkerState::Activated,
            });
        }

        log::info!("[SW] Activating {}", self.id);
        let deleted_caches = self.handler.delete_stale_caches();
        let change = self.lifecycle.finish_activate()?;
        Ok(Activation {
            change,
            deleted_caches,
        })
    }

    /// Any live state → `redundant`
    pub fn make_redundant(&mut self) -> Result<StateChange, ServiceWorkerError> {
        self.lifecycle.make_redundant()
    }

    /// Message handler.
    ///
    /// Returns `true` when the message lets a waiting worker activate now.
    /// Unrecognized messages are ignored.
    pub fn on_message(&mut self, message: &serde_json::Value) -> bool {
        match ClientMessage::from_value(message) {
            Some(ClientMessage::SkipWaiting) => {
                log::info!("[SW] {} received SKIP_WAITING", self.id);
                self.lifecycle.skip_waiting()
            }
            None => {
                log::debug!("[SW] ignoring unrecognized message: {}", message);
                false
            }
        }
    }

    /// Fetch handler
    pub async fn on_fetch(&self, request: Request) -> FetchOutcome {
        self.handler.handle(request).await
    }
}
