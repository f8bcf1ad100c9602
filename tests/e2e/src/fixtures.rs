//! Test fixtures
//!
//! A scripted origin serving the Insta-Metrics app shell and worker script.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use insta_metrics_runtime::{Network, NetworkError, Request, Response};
use spin::{Mutex, RwLock};

/// Origin every scenario runs against
pub const ORIGIN: &str = "http://localhost";

/// Worker script for a cache generation
pub fn worker_script(generation: &str) -> String {
    format!(
        "generation = \"{generation}\"\nprecache = [\"/index.html\", \"/manifest.json\"]\n"
    )
}

/// App shell document
pub fn index_html(build: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>Insta-Metrics</title>
    <link rel="manifest" href="/manifest.json">
</head>
<body>
    <div id="root" data-build="{build}"></div>
    <script src="/assets/app.js"></script>
</body>
</html>"#
    )
}

/// In-process origin server.
pub struct SimulatedOrigin {
    files: RwLock<BTreeMap<String, Response>>,
    online: AtomicBool,
    log: Mutex<Vec<Request>>,
}

impl SimulatedOrigin {
    /// Origin serving build `1` of the app with worker generation `v1`
    pub fn new() -> Arc<Self> {
        let origin = Self {
            files: RwLock::new(BTreeMap::new()),
            online: AtomicBool::new(true),
            log: Mutex::new(Vec::new()),
        };
        origin.publish("/", index_html("1"));
        origin.publish("/index.html", index_html("1"));
        origin.publish("/manifest.json", r#"{"name":"Insta-Metrics","display":"standalone"}"#);
        origin.publish("/assets/app.js", "console.log('build 1')");
        origin.publish("/api/metrics", r#"{"followers":1200}"#);
        origin.publish_worker("v1");
        Arc::new(origin)
    }

    /// Serve `body` at `path`
    pub fn publish(&self, path: &str, body: impl Into<Vec<u8>>) {
        self.files
            .write()
            .insert(format!("{ORIGIN}{path}"), Response::basic(200, body));
    }

    /// Deploy a new worker script
    pub fn publish_worker(&self, generation: &str) {
        self.publish("/sw.js", worker_script(generation));
    }

    pub fn go_offline(&self) {
        self.online.store(false, Ordering::SeqCst);
    }

    pub fn go_online(&self) {
        self.online.store(true, Ordering::SeqCst);
    }

    /// Requests that reached the origin for `path`
    pub fn hits(&self, path: &str) -> usize {
        let url = format!("{ORIGIN}{path}");
        self.log.lock().iter().filter(|r| r.url == url).count()
    }
}

#[async_trait]
impl Network for SimulatedOrigin {
    async fn fetch(&self, request: &Request) -> Result<Response, NetworkError> {
        if !self.online.load(Ordering::SeqCst) {
            return Err(NetworkError::Offline);
        }
        self.log.lock().push(request.clone());
        Ok(self
            .files
            .read()
            .get(&request.url)
            .cloned()
            .unwrap_or_else(|| Response::basic(404, "not found")))
    }
}
