//! Insta-Metrics Browser Side
//!
//! The page half of the PWA:
//! - Worker registration and periodic update checks (`pwa::coordinator`)
//! - Worker hand-off negotiation (`SKIP_WAITING` + delayed reload)
//! - Install prompt capture and install detection (`pwa::install`)
//!
//! The platform is reached through the `WorkerPlatform` and `PageHost`
//! traits so the coordinator runs against the in-process
//! `ServiceWorkerHost` from `insta-metrics-runtime`.

pub mod pwa;

pub use pwa::{
    can_install, is_installed, BeforeInstallPromptEvent, CoordinatorConfig, CoordinatorHandle,
    DisplayMode, InstallAffordance, InstallChoice, InstallEnvironment, InstallOutcome,
    InstallPrompter, PageHost, PwaError, UpdateCoordinator, WorkerPlatform,
};
