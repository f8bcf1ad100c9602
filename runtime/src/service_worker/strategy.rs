//! Request Routing
//!
//! Pure classification of an intercepted request into a caching strategy.
//! Nothing here touches caches or the network.

use crate::config::WorkerConfig;

use super::fetch::{Request, RequestDestination, RequestMethod};

/// How the worker answers a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Leave the request to the platform; no cache involvement.
    Passthrough(PassthroughReason),
    /// Live fetch first, cached copy (then the offline document) on failure.
    NetworkFirst,
    /// Cached copy first with background revalidation; network on miss.
    CacheFirst,
}

/// Why a request is not intercepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassthroughReason {
    /// Only GET requests are cached.
    NonGetMethod,
    /// API responses are per-session and must stay fresh.
    ApiRequest,
}

/// Route an intercepted request.
///
/// Order matters: the method check wins over everything, then the API
/// prefix, then document detection.
pub fn classify_and_route(request: &Request, config: &WorkerConfig) -> Strategy {
    if request.method != RequestMethod::Get {
        return Strategy::Passthrough(PassthroughReason::NonGetMethod);
    }

    let path = request.path();
    if path.contains(config.api_prefix.as_str()) {
        return Strategy::Passthrough(PassthroughReason::ApiRequest);
    }

    if is_navigable_document(request, &path) {
        Strategy::NetworkFirst
    } else {
        Strategy::CacheFirst
    }
}

/// Document requests: navigations, the root path and `.html` pages.
pub fn is_navigable_document(request: &Request, path: &str) -> bool {
    request.destination == RequestDestination::Document || path == "/" || path.ends_with(".html")
}
