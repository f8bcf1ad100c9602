//! Insta-Metrics End-to-End Testing
//!
//! Runs the whole PWA protocol in-process: a simulated origin server, the
//! service worker host, and the page-side update coordinator, so offline
//! and update scenarios can be driven without a browser.

pub mod fixtures;
pub mod harness;

pub use fixtures::{worker_script, SimulatedOrigin, ORIGIN};
pub use harness::{PwaHarness, RecordingPage, RecordingPlatform};
