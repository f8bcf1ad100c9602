//! Service Worker Events
//!
//! The page → worker message protocol and the registration events the host
//! broadcasts to pages.

use serde::{Deserialize, Serialize};

use super::{Scope, ServiceWorkerId, ServiceWorkerState};

/// Messages a page may post to a worker.
///
/// Wire shape: `{ "type": "SKIP_WAITING" }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
    /// Activate now instead of waiting for controlled pages to close.
    SkipWaiting,
}

impl ClientMessage {
    /// Decode a posted message. Unrecognized shapes yield `None`.
    pub fn from_value(value: &serde_json::Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }

    /// Encode for `post_message`.
    pub fn to_value(&self) -> serde_json::Value {
        match self {
            ClientMessage::SkipWaiting => serde_json::json!({ "type": "SKIP_WAITING" }),
        }
    }
}

/// Events observed by pages through their registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationEvent {
    /// A new worker started installing for `scope`.
    UpdateFound {
        scope: Scope,
        worker: ServiceWorkerId,
    },
    /// A worker changed lifecycle state.
    StateChange {
        worker: ServiceWorkerId,
        from: ServiceWorkerState,
        to: ServiceWorkerState,
        /// Whether the page had a controller when the change happened.
        controlled: bool,
    },
    /// The page's controller changed (after `clients.claim()`).
    ControllerChange { worker: ServiceWorkerId },
}
