//! E2E Test: PWA Install Prompt
//!
//! The page captures the install prompt, offers it once from its own UI and
//! detects when it runs as an installed app.

use std::sync::Arc;

use async_trait::async_trait;
use insta_metrics_browser::pwa::{
    BeforeInstallPromptEvent, InstallChoice, InstallOutcome, InstallPrompter,
};
use insta_metrics_browser::{
    can_install, is_installed, DisplayMode, InstallAffordance, InstallEnvironment, PwaError,
};
use insta_metrics_e2e_tests::{PwaHarness, SimulatedOrigin};

struct UserAccepts;

#[async_trait]
impl InstallPrompter for UserAccepts {
    async fn prompt(&self) -> Result<InstallChoice, PwaError> {
        Ok(InstallChoice {
            outcome: InstallOutcome::Accepted,
            platform: "web".to_string(),
        })
    }
}

#[tokio::test]
async fn test_install_flow() {
    let page = PwaHarness::load(SimulatedOrigin::new()).await;
    let browser_tab = InstallEnvironment {
        service_worker_supported: page.is_coordinating(),
        install_prompt_supported: true,
        ..Default::default()
    };
    assert!(can_install(&browser_tab));
    assert!(!is_installed(&browser_tab));

    let mut affordance = InstallAffordance::new();
    assert!(!affordance.prompt_install().await);

    affordance.on_before_install_prompt(BeforeInstallPromptEvent::new(
        vec!["web".to_string()],
        Arc::new(UserAccepts),
    ));
    assert!(affordance.prompt_install().await);
    affordance.on_app_installed();
    assert!(affordance.app_installed());
    assert!(!affordance.prompt_install().await);

    let app_window = InstallEnvironment {
        display_mode: DisplayMode::from_keyword("standalone"),
        ..browser_tab
    };
    assert!(is_installed(&app_window));
    page.close().await;
}
