//! Progressive Web App (PWA) Support
//!
//! Page-side PWA features: service worker registration and update hand-off,
//! plus the install prompt flow.

pub mod coordinator;
pub mod install;
pub mod sw_bridge;

pub use coordinator::*;
pub use install::*;
pub use sw_bridge::*;

/// PWA error types
#[derive(thiserror::Error, Debug)]
pub enum PwaError {
    #[error("coordinator config parse error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("invalid `{field}`: {reason}")]
    InvalidConfig { field: &'static str, reason: String },

    #[error("install prompt already used")]
    PromptAlreadyUsed,

    #[error("install prompt failed: {0}")]
    PromptFailed(String),
}

/// Display mode the page is running in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayMode {
    /// Fullscreen mode
    Fullscreen,
    /// Standalone mode (app-like)
    Standalone,
    /// Minimal UI
    MinimalUi,
    /// Browser tab
    #[default]
    Browser,
}

impl DisplayMode {
    /// Parse a `display-mode` media keyword; unknown keywords mean a browser tab
    pub fn from_keyword(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "fullscreen" => Self::Fullscreen,
            "standalone" => Self::Standalone,
            "minimal-ui" => Self::MinimalUi,
            _ => Self::Browser,
        }
    }

    /// Whether the page runs outside a normal browser tab
    pub fn is_app_window(&self) -> bool {
        !matches!(self, Self::Browser)
    }
}
