//! Update Coordinator
//!
//! Registers the offline worker on page start, polls for new versions and
//! hands control to a freshly installed version: post `SKIP_WAITING`, then
//! reload the page after a short delay.
//!
//! Only updates trigger the hand-off. A first install (no controller when it
//! finished installing) just makes the content available offline.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use insta_metrics_runtime::{
    ClientMessage, RegistrationEvent, RegistrationOptions, Scope, ServiceWorkerId,
    ServiceWorkerState, UpdateCheck, UpdateViaCache,
};

use super::sw_bridge::WorkerPlatform;
use super::PwaError;

/// Coordinator settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CoordinatorConfig {
    /// Worker script to register.
    pub script_url: String,
    /// Registration scope.
    pub scope: String,
    /// HTTP cache policy for update checks.
    pub update_via_cache: UpdateViaCache,
    /// Seconds between update checks.
    pub poll_interval_secs: u64,
    /// Delay between `SKIP_WAITING` and the reload, in milliseconds.
    pub reload_delay_ms: u64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            script_url: "/sw.js".to_string(),
            scope: "/".to_string(),
            update_via_cache: UpdateViaCache::None,
            poll_interval_secs: 60,
            reload_delay_ms: 1000,
        }
    }
}

impl CoordinatorConfig {
    /// Parse from TOML; missing keys take their defaults.
    pub fn from_toml_str(source: &str) -> Result<Self, PwaError> {
        let config: CoordinatorConfig = toml::from_str(source)?;
        if config.poll_interval_secs == 0 {
            return Err(PwaError::InvalidConfig {
                field: "poll_interval_secs",
                reason: "must be greater than zero".to_string(),
            });
        }
        if config.script_url.is_empty() {
            return Err(PwaError::InvalidConfig {
                field: "script_url",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(config)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn reload_delay(&self) -> Duration {
        Duration::from_millis(self.reload_delay_ms)
    }
}

/// The page's `window.location`.
pub trait PageHost: Send + Sync {
    /// Full page reload.
    fn reload(&self);
}

/// Page-side worker registration and update hand-off.
pub struct UpdateCoordinator {
    platform: Arc<dyn WorkerPlatform>,
    page: Arc<dyn PageHost>,
    config: CoordinatorConfig,
}

impl UpdateCoordinator {
    pub fn new(
        platform: Arc<dyn WorkerPlatform>,
        page: Arc<dyn PageHost>,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            platform,
            page,
            config,
        }
    }

    /// Register the worker and start polling.
    ///
    /// Returns `None` when service workers are unsupported or registration
    /// fails; the page keeps working online. Must be called inside a tokio
    /// runtime.
    pub async fn start(self) -> Option<CoordinatorHandle> {
        if !self.platform.is_supported() {
            log::info!("[PWA] service workers unsupported; offline mode disabled");
            return None;
        }

        // Subscribe first so the install triggered by registration is seen.
        let events = self.platform.subscribe();
        let options = RegistrationOptions {
            scope: Some(self.config.scope.clone()),
            update_via_cache: self.config.update_via_cache,
        };
        let scope = match self.platform.register(&self.config.script_url, options).await {
            Ok(scope) => {
                log::info!("[PWA] service worker registered for {}", scope.path());
                scope
            }
            Err(error) => {
                log::error!("[PWA] service worker registration failed: {}", error);
                return None;
            }
        };

        let (shutdown, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(self.run(scope.clone(), events, shutdown_rx));
        Some(CoordinatorHandle {
            scope,
            shutdown,
            task,
        })
    }

    async fn run(
        self,
        scope: Scope,
        mut events: broadcast::Receiver<RegistrationEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let period = self.config.poll_interval();
        let mut poll = time::interval_at(Instant::now() + period, period);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut installing: Option<ServiceWorkerId> = None;

        loop {
            tokio::select! {
                _ = poll.tick() => self.check_for_update(&scope).await,
                event = events.recv() => match event {
                    Ok(event) => self.on_event(&scope, event, &mut installing).await,
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        // The installing worker's events may be among those lost.
                        log::warn!("[PWA] missed {} registration events; re-checking", missed);
                        installing = None;
                        self.check_for_update(&scope).await;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        log::debug!("[PWA] coordinator for {} stopped", scope.path());
    }

    async fn check_for_update(&self, scope: &Scope) {
        match self.platform.update(scope).await {
            Ok(UpdateCheck::NoUpdate) => log::trace!("[PWA] no update"),
            Ok(UpdateCheck::Installed(worker)) => {
                log::debug!("[PWA] update check installed {}", worker)
            }
            Err(error) => log::warn!("[PWA] update check failed: {}", error),
        }
    }

    async fn on_event(
        &self,
        scope: &Scope,
        event: RegistrationEvent,
        installing: &mut Option<ServiceWorkerId>,
    ) {
        match event {
            RegistrationEvent::UpdateFound {
                scope: found,
                worker,
            } if &found == scope => {
                log::info!("[PWA] update found: {}", worker);
                *installing = Some(worker);
            }
            RegistrationEvent::StateChange {
                worker,
                to: ServiceWorkerState::Installed,
                controlled,
                ..
            } if *installing == Some(worker) => {
                *installing = None;
                if controlled {
                    log::info!("[PWA] new version {} installed; taking over", worker);
                    self.take_over(worker).await;
                } else {
                    log::info!("[PWA] content cached for offline use");
                }
            }
            RegistrationEvent::StateChange {
                worker,
                to: ServiceWorkerState::Redundant,
                ..
            } if *installing == Some(worker) => {
                log::warn!("[PWA] {} failed to install", worker);
                *installing = None;
            }
            _ => {}
        }
    }

    /// Post `SKIP_WAITING` to `worker`, then reload after the configured delay.
    async fn take_over(&self, worker: ServiceWorkerId) {
        if let Err(error) = self
            .platform
            .post_message(worker, ClientMessage::SkipWaiting.to_value())
            .await
        {
            log::warn!("[PWA] could not message {}: {}", worker, error);
        }

        let page = self.page.clone();
        let delay = self.config.reload_delay();
        tokio::spawn(async move {
            time::sleep(delay).await;
            log::info!("[PWA] reloading to pick up the new version");
            page.reload();
        });
    }
}

/// Running coordinator. Dropping the handle also stops polling.
pub struct CoordinatorHandle {
    scope: Scope,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl CoordinatorHandle {
    /// Registration scope
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Stop polling and wait for the background task to finish.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(error) = self.task.await {
            log::warn!("[PWA] coordinator task ended abnormally: {}", error);
        }
    }
}
