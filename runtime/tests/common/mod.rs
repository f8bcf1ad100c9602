//! Shared network double for the property tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use insta_metrics_runtime::service_worker::CacheStorage;
use insta_metrics_runtime::{
    Network, NetworkError, OfflineCacheWorker, Request, Response, WorkerConfig,
};
use tokio::sync::Notify;

pub const ORIGIN: &str = "http://localhost";
pub const SCRIPT_URL: &str = "http://localhost/sw.js";

/// Scripted origin server.
#[derive(Default)]
pub struct StubNetwork {
    routes: Mutex<BTreeMap<String, Response>>,
    requests: Mutex<Vec<Request>>,
    offline: AtomicBool,
    hang: AtomicBool,
    gate: Mutex<Option<Arc<Notify>>>,
}

impl StubNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn route(&self, url: &str, response: Response) {
        self.routes.lock().unwrap().insert(url.to_string(), response);
    }

    pub fn serve_script(&self, generation: &str) {
        self.route(
            SCRIPT_URL,
            Response::basic(200, format!("generation = \"{}\"\n", generation)),
        );
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Never answer (until switched back).
    pub fn set_hang(&self, hang: bool) {
        self.hang.store(hang, Ordering::SeqCst);
    }

    /// Hold every fetch until the returned `Notify` is signalled.
    pub fn gate(&self) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(notify.clone());
        notify
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self, url: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.url == url)
            .count()
    }
}

#[async_trait]
impl Network for StubNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, NetworkError> {
        self.requests.lock().unwrap().push(request.clone());

        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.hang.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err(NetworkError::Offline);
        }
        Ok(self
            .routes
            .lock()
            .unwrap()
            .get(&request.url)
            .cloned()
            .unwrap_or_else(|| Response::basic(404, "not found")))
    }
}

/// An activated worker over fresh storage.
pub async fn active_worker(
    config: WorkerConfig,
    network: Arc<StubNetwork>,
) -> (OfflineCacheWorker, insta_metrics_runtime::service_worker::SharedCacheStorage) {
    let caches = CacheStorage::new().shared();
    let mut worker = OfflineCacheWorker::new(config, "test", caches.clone(), network);
    worker.begin_install().unwrap();
    worker.install().await.unwrap();
    worker.begin_activate().unwrap();
    worker.activate().unwrap();
    (worker, caches)
}

/// Single-threaded runtime for driving async code inside `proptest!`.
pub fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}
