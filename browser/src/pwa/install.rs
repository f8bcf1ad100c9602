//! PWA Installation
//!
//! Captures the platform's install prompt so the application can offer its
//! own "install" button, and answers "can / is this app installed".

use std::sync::Arc;

use async_trait::async_trait;

use super::{DisplayMode, PwaError};

/// Shows the platform install dialog.
#[async_trait]
pub trait InstallPrompter: Send + Sync {
    /// Show the dialog and wait for the user's answer.
    async fn prompt(&self) -> Result<InstallChoice, PwaError>;
}

/// Install choice
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallChoice {
    /// Outcome
    pub outcome: InstallOutcome,
    /// Platform
    pub platform: String,
}

/// Install outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    /// Accepted
    Accepted,
    /// Dismissed
    Dismissed,
}

/// Installation prompt
pub struct BeforeInstallPromptEvent {
    /// Platforms
    platforms: Vec<String>,
    /// User choice, once prompted
    user_choice: Option<InstallChoice>,
    /// Default prevented
    default_prevented: bool,
    prompter: Arc<dyn InstallPrompter>,
}

impl BeforeInstallPromptEvent {
    /// Create new event
    pub fn new(platforms: Vec<String>, prompter: Arc<dyn InstallPrompter>) -> Self {
        Self {
            platforms,
            user_choice: None,
            default_prevented: false,
            prompter,
        }
    }

    /// Get platforms
    pub fn platforms(&self) -> &[String] {
        &self.platforms
    }

    /// Suppress the platform's own install UI
    pub fn prevent_default(&mut self) {
        self.default_prevented = true;
    }

    /// Check if default prevented
    pub fn is_default_prevented(&self) -> bool {
        self.default_prevented
    }

    /// Show the install dialog. An event can be prompted only once.
    pub async fn prompt(&mut self) -> Result<InstallChoice, PwaError> {
        if self.user_choice.is_some() {
            return Err(PwaError::PromptAlreadyUsed);
        }
        let choice = self.prompter.prompt().await?;
        self.user_choice = Some(choice.clone());
        Ok(choice)
    }

    /// Get user choice
    pub fn user_choice(&self) -> Option<&InstallChoice> {
        self.user_choice.as_ref()
    }
}

/// The application's own install button.
#[derive(Default)]
pub struct InstallAffordance {
    deferred: Option<BeforeInstallPromptEvent>,
    installed: bool,
}

impl InstallAffordance {
    pub fn new() -> Self {
        Self::default()
    }

    /// `beforeinstallprompt`: suppress the default UI and keep the event.
    pub fn on_before_install_prompt(&mut self, mut event: BeforeInstallPromptEvent) {
        event.prevent_default();
        log::info!(
            "[PWA] install prompt available for {}",
            event.platforms().join(", ")
        );
        self.deferred = Some(event);
    }

    /// Whether `prompt_install` has a prompt to show
    pub fn is_available(&self) -> bool {
        self.deferred.is_some()
    }

    /// Show the retained prompt; `true` only if the user accepted.
    ///
    /// The prompt is consumed whatever the outcome.
    pub async fn prompt_install(&mut self) -> bool {
        let Some(mut event) = self.deferred.take() else {
            log::debug!("[PWA] no install prompt available");
            return false;
        };

        match event.prompt().await {
            Ok(choice) => {
                log::info!(
                    "[PWA] install prompt {:?} on {}",
                    choice.outcome,
                    choice.platform
                );
                choice.outcome == InstallOutcome::Accepted
            }
            Err(error) => {
                log::error!("[PWA] install prompt failed: {}", error);
                false
            }
        }
    }

    /// `appinstalled`
    pub fn on_app_installed(&mut self) {
        log::info!("[PWA] app installed");
        self.deferred = None;
        self.installed = true;
    }

    /// Whether `appinstalled` fired during this page's lifetime
    pub fn app_installed(&self) -> bool {
        self.installed
    }
}

/// What the page can observe about its environment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InstallEnvironment {
    /// `'serviceWorker' in navigator`
    pub service_worker_supported: bool,
    /// `'BeforeInstallPromptEvent' in window`
    pub install_prompt_supported: bool,
    /// Current `display-mode`
    pub display_mode: DisplayMode,
    /// iOS `navigator.standalone`
    pub navigator_standalone: bool,
}

/// Whether the app can be offered for installation here.
pub fn can_install(env: &InstallEnvironment) -> bool {
    env.service_worker_supported && env.install_prompt_supported
}

/// Whether the page is already running as an installed app.
pub fn is_installed(env: &InstallEnvironment) -> bool {
    env.display_mode.is_app_window() || env.navigator_standalone
}
