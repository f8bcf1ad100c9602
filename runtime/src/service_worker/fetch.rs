//! Fetch Model
//!
//! Request/response types seen by the worker's fetch handler, and the
//! `Network` seam the worker uses to reach the origin server.

use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use url::Url;

use super::strategy::PassthroughReason;

/// HTTP request method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestMethod {
    #[default]
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
}

impl RequestMethod {
    /// Convert to string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
        }
    }
}

/// Request destination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestDestination {
    /// Unknown (fetch/XHR)
    #[default]
    Empty,
    /// Top-level navigation
    Document,
    Image,
    Script,
    Style,
    Worker,
}

/// Request cache mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestCache {
    /// Default HTTP cache behavior
    #[default]
    Default,
    /// Revalidate with the server before using the HTTP cache
    NoCache,
}

/// Fetch request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Request URL
    pub url: String,
    /// HTTP method
    pub method: RequestMethod,
    /// Request body (if any)
    pub body: Option<Vec<u8>>,
    /// Request destination
    pub destination: RequestDestination,
    /// Cache mode
    pub cache: RequestCache,
}

impl Request {
    /// Create a new GET request
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: RequestMethod::Get,
            body: None,
            destination: RequestDestination::Empty,
            cache: RequestCache::Default,
        }
    }

    /// Create a top-level navigation request
    pub fn navigate(url: impl Into<String>) -> Self {
        Self::new(url).with_destination(RequestDestination::Document)
    }

    /// Set the method
    pub fn with_method(mut self, method: RequestMethod) -> Self {
        self.method = method;
        self
    }

    /// Set the destination
    pub fn with_destination(mut self, destination: RequestDestination) -> Self {
        self.destination = destination;
        self
    }

    /// Set the cache mode
    pub fn with_cache(mut self, cache: RequestCache) -> Self {
        self.cache = cache;
        self
    }

    /// Set the body
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Path component of the URL, without query or fragment.
    pub fn path(&self) -> String {
        match Url::parse(&self.url) {
            Ok(url) => url.path().to_string(),
            Err(_) => {
                let end = self.url.find(['?', '#']).unwrap_or(self.url.len());
                self.url[..end].to_string()
            }
        }
    }
}

/// Resolve `raw` against `origin`, yielding an absolute URL.
///
/// Unparseable input is returned unchanged so it still keys the cache
/// consistently.
pub fn resolve_url(origin: &str, raw: &str) -> String {
    if let Ok(url) = Url::parse(raw) {
        return url.to_string();
    }
    match Url::parse(origin).and_then(|base| base.join(raw)) {
        Ok(url) => url.to_string(),
        Err(_) => raw.to_string(),
    }
}

/// Response type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseType {
    /// Same-origin response
    Basic,
    #[default]
    Default,
    /// Cross-origin no-cors response
    Opaque,
}

/// Fetch response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Response type
    pub response_type: ResponseType,
    /// Status code
    pub status: u16,
    /// Response body
    pub body: Vec<u8>,
}

impl Response {
    /// Create a new response
    pub fn new(status: u16) -> Self {
        Self {
            response_type: ResponseType::Default,
            status,
            body: Vec::new(),
        }
    }

    /// Create a same-origin response with a body
    pub fn basic(status: u16, body: impl Into<Vec<u8>>) -> Self {
        let mut response = Self::new(status);
        response.response_type = ResponseType::Basic;
        response.body = body.into();
        response
    }

    /// Set the response type
    pub fn with_type(mut self, response_type: ResponseType) -> Self {
        self.response_type = response_type;
        self
    }

    /// Body as UTF-8 text, if it is valid UTF-8
    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }
}

/// Network errors.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    #[error("network unavailable")]
    Offline,

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("fetch failed: {0}")]
    Failed(String),
}

/// Access to the origin server.
#[async_trait]
pub trait Network: Send + Sync {
    /// Perform the request against the network.
    async fn fetch(&self, request: &Request) -> Result<Response, NetworkError>;
}

/// Where a served response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    /// Live network response
    Network,
    /// Stored copy of the exact request
    Cache,
    /// Cached root document served in place of a failed navigation
    OfflineFallback,
}

/// A response produced by the worker.
#[derive(Debug)]
pub struct Served {
    /// The response handed to the page
    pub response: Response,
    /// Where it came from
    pub source: ResponseSource,
    /// Background revalidation racing this response, if one was started
    pub revalidation: Option<JoinHandle<()>>,
}

impl Served {
    pub(crate) fn new(response: Response, source: ResponseSource) -> Self {
        Self {
            response,
            source,
            revalidation: None,
        }
    }
}

/// Result of dispatching a fetch event to the worker.
#[derive(Debug)]
pub enum FetchOutcome {
    /// Not intercepted; the platform performs the request itself.
    Passthrough(PassthroughReason),
    /// The worker responded.
    Responded(Served),
    /// Intercepted, but neither network nor cache could answer.
    Failed(NetworkError),
}

impl FetchOutcome {
    /// The served response, if any.
    pub fn served(&self) -> Option<&Served> {
        match self {
            FetchOutcome::Responded(served) => Some(served),
            _ => None,
        }
    }
}
