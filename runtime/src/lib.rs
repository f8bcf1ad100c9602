//! Insta-Metrics Service Worker Runtime
//!
//! This crate provides the worker side of the Insta-Metrics PWA: the offline
//! cache policy that intercepts page requests, the worker lifecycle state
//! machine, and an in-process host that plays the browser's role of
//! installing, activating and routing requests to workers.
//!
//! # Architecture
//!
//! - `config`: Worker configuration (generation identifier, cache names, policy knobs)
//! - `service_worker::fetch`: Request/response model + the `Network` seam
//! - `service_worker::cache`: Named cache stores keyed by request identity
//! - `service_worker::strategy`: Pure request classification (`classify_and_route`)
//! - `service_worker::lifecycle`: Worker lifecycle state machine
//! - `service_worker::worker`: Install/activate/fetch/message handlers
//! - `service_worker::host`: Registration, update checks, controller hand-off

pub mod config;
pub mod service_worker;

pub use config::{CacheNames, ConfigError, WorkerConfig};
pub use service_worker::{
    classify_and_route, ClientMessage, FetchOutcome, Network, NetworkError, OfflineCacheWorker,
    RegistrationEvent, RegistrationOptions, Request, Response, ResponseSource, Scope, Served,
    ServiceWorkerError, ServiceWorkerHost, ServiceWorkerId, ServiceWorkerState, Strategy,
    UpdateCheck, UpdateViaCache,
};
