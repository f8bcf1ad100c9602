//! Scenario harness
//!
//! One "page" with its worker host and update coordinator.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use insta_metrics_browser::{
    CoordinatorConfig, CoordinatorHandle, PageHost, UpdateCoordinator, WorkerPlatform,
};
use insta_metrics_runtime::{
    NetworkError, RegistrationEvent, RegistrationOptions, Request, Scope, Served,
    ServiceWorkerError, ServiceWorkerHost, ServiceWorkerId, UpdateCheck,
};
use spin::Mutex;
use tokio::sync::broadcast;

use crate::fixtures::{SimulatedOrigin, ORIGIN};

/// Counts reloads.
#[derive(Default)]
pub struct RecordingPage {
    reloads: AtomicUsize,
}

impl RecordingPage {
    pub fn reloads(&self) -> usize {
        self.reloads.load(Ordering::SeqCst)
    }
}

impl PageHost for RecordingPage {
    fn reload(&self) {
        log::info!("[E2E] page reload");
        self.reloads.fetch_add(1, Ordering::SeqCst);
    }
}

/// Forwards to the host and records posted messages.
pub struct RecordingPlatform {
    host: Arc<ServiceWorkerHost>,
    messages: Mutex<Vec<(ServiceWorkerId, serde_json::Value)>>,
}

impl RecordingPlatform {
    pub fn new(host: Arc<ServiceWorkerHost>) -> Self {
        Self {
            host,
            messages: Mutex::new(Vec::new()),
        }
    }

    /// Messages posted so far
    pub fn messages(&self) -> Vec<(ServiceWorkerId, serde_json::Value)> {
        self.messages.lock().clone()
    }
}

#[async_trait]
impl WorkerPlatform for RecordingPlatform {
    fn is_supported(&self) -> bool {
        true
    }

    fn subscribe(&self) -> broadcast::Receiver<RegistrationEvent> {
        self.host.subscribe()
    }

    async fn register(
        &self,
        script_url: &str,
        options: RegistrationOptions,
    ) -> Result<Scope, ServiceWorkerError> {
        self.host.register(script_url, options).await
    }

    async fn update(&self, scope: &Scope) -> Result<UpdateCheck, ServiceWorkerError> {
        self.host.update(scope).await
    }

    async fn post_message(
        &self,
        worker: ServiceWorkerId,
        message: serde_json::Value,
    ) -> Result<(), ServiceWorkerError> {
        self.messages.lock().push((worker, message.clone()));
        self.host.post_message(worker, message).await
    }
}

/// A loaded page.
pub struct PwaHarness {
    pub origin: Arc<SimulatedOrigin>,
    pub host: Arc<ServiceWorkerHost>,
    pub page: Arc<RecordingPage>,
    pub platform: Arc<RecordingPlatform>,
    handle: Option<CoordinatorHandle>,
}

impl PwaHarness {
    /// Load the page: create the host and start the coordinator.
    pub async fn load(origin: Arc<SimulatedOrigin>) -> Self {
        Self::load_with(origin, CoordinatorConfig::default()).await
    }

    pub async fn load_with(origin: Arc<SimulatedOrigin>, config: CoordinatorConfig) -> Self {
        let host = Arc::new(ServiceWorkerHost::new(ORIGIN, origin.clone()));
        let platform = Arc::new(RecordingPlatform::new(host.clone()));
        let page = Arc::new(RecordingPage::default());
        let handle = UpdateCoordinator::new(platform.clone(), page.clone(), config)
            .start()
            .await;
        Self {
            origin,
            host,
            page,
            platform,
            handle,
        }
    }

    /// Whether the coordinator is running
    pub fn is_coordinating(&self) -> bool {
        self.handle.is_some()
    }

    /// Top-level navigation
    pub async fn navigate(&self, path: &str) -> Result<Served, NetworkError> {
        self.host.fetch(Request::navigate(path)).await
    }

    /// Subresource request
    pub async fn get(&self, path: &str) -> Result<Served, NetworkError> {
        self.host.fetch(Request::new(path)).await
    }

    /// Stop the coordinator
    pub async fn close(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.stop().await;
        }
    }
}
