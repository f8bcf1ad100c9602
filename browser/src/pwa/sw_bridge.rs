//! Service Worker Bridge
//!
//! What the page needs from the platform's service worker container:
//! registration, update checks, messaging and registration events.

use async_trait::async_trait;
use tokio::sync::broadcast;

use insta_metrics_runtime::{
    RegistrationEvent, RegistrationOptions, Scope, ServiceWorkerError, ServiceWorkerHost,
    ServiceWorkerId, UpdateCheck,
};

/// `navigator.serviceWorker`, as seen from a page.
#[async_trait]
pub trait WorkerPlatform: Send + Sync {
    /// Whether service workers are available at all.
    fn is_supported(&self) -> bool;

    /// Registration events (`updatefound`, `statechange`, `controllerchange`).
    fn subscribe(&self) -> broadcast::Receiver<RegistrationEvent>;

    /// Register a worker script.
    async fn register(
        &self,
        script_url: &str,
        options: RegistrationOptions,
    ) -> Result<Scope, ServiceWorkerError>;

    /// `registration.update()`
    async fn update(&self, scope: &Scope) -> Result<UpdateCheck, ServiceWorkerError>;

    /// `worker.postMessage()`
    async fn post_message(
        &self,
        worker: ServiceWorkerId,
        message: serde_json::Value,
    ) -> Result<(), ServiceWorkerError>;
}

#[async_trait]
impl WorkerPlatform for ServiceWorkerHost {
    fn is_supported(&self) -> bool {
        true
    }

    fn subscribe(&self) -> broadcast::Receiver<RegistrationEvent> {
        ServiceWorkerHost::subscribe(self)
    }

    async fn register(
        &self,
        script_url: &str,
        options: RegistrationOptions,
    ) -> Result<Scope, ServiceWorkerError> {
        ServiceWorkerHost::register(self, script_url, options).await
    }

    async fn update(&self, scope: &Scope) -> Result<UpdateCheck, ServiceWorkerError> {
        ServiceWorkerHost::update(self, scope).await
    }

    async fn post_message(
        &self,
        worker: ServiceWorkerId,
        message: serde_json::Value,
    ) -> Result<(), ServiceWorkerError> {
        ServiceWorkerHost::post_message(self, worker, message).await
    }
}
