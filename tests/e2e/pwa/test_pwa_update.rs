//! E2E Test: PWA Update Hand-off
//!
//! Property 8: a new worker generation discovered while a controller is
//! active causes exactly one `SKIP_WAITING` message and one reload after the
//! delay; a first install causes neither.

use std::time::Duration;

use insta_metrics_e2e_tests::fixtures::index_html;
use insta_metrics_e2e_tests::{PwaHarness, SimulatedOrigin};
use insta_metrics_runtime::{ResponseSource, ServiceWorkerState};
use tokio::time::sleep;

#[tokio::test(start_paused = true)]
async fn test_first_install_does_not_reload() {
    let page = PwaHarness::load(SimulatedOrigin::new()).await;
    assert!(page.host.controller().await.is_some());

    sleep(Duration::from_secs(150)).await;
    assert!(page.platform.messages().is_empty());
    assert_eq!(page.page.reloads(), 0);
    page.close().await;
}

#[tokio::test(start_paused = true)]
async fn test_new_generation_is_taken_over_once() {
    let origin = SimulatedOrigin::new();
    let page = PwaHarness::load(origin.clone()).await;
    let first = page.host.controller().await.unwrap();
    page.navigate("/").await.unwrap();

    origin.publish_worker("v2");
    origin.publish("/", index_html("2"));

    // The poll at 60 s installs v2; the reload follows one second later.
    sleep(Duration::from_millis(60_500)).await;
    let messages = page.platform.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].1, serde_json::json!({ "type": "SKIP_WAITING" }));
    assert_eq!(page.page.reloads(), 0);

    sleep(Duration::from_secs(1)).await;
    assert_eq!(page.page.reloads(), 1);

    let controller = page.host.controller().await.unwrap();
    assert_ne!(controller, first);
    assert_eq!(controller, messages[0].0);
    let names = page.host.caches().read().keys();
    assert!(names.iter().all(|name| name.ends_with("-v2")));

    // Later polls find nothing new.
    sleep(Duration::from_secs(180)).await;
    assert_eq!(page.platform.messages().len(), 1);
    assert_eq!(page.page.reloads(), 1);

    let served = page.navigate("/").await.unwrap();
    assert_eq!(served.source, ResponseSource::Network);
    assert_eq!(served.response.text(), Some(index_html("2").as_str()));
    page.close().await;
}

#[tokio::test(start_paused = true)]
async fn test_waiting_worker_activates_on_skip_waiting() {
    let origin = SimulatedOrigin::new();
    let page = PwaHarness::load(origin.clone()).await;
    let first = page.host.controller().await.unwrap();

    origin.publish("/sw.js", "generation = \"v2\"\nskip_waiting_on_install = false\n");
    sleep(Duration::from_millis(60_500)).await;

    let messages = page.platform.messages();
    assert_eq!(messages.len(), 1);
    let updated = messages[0].0;
    assert_eq!(page.host.controller().await, Some(updated));
    assert_ne!(updated, first);
    assert_eq!(
        page.host.worker_state(updated).await,
        Some(ServiceWorkerState::Activated)
    );

    sleep(Duration::from_secs(1)).await;
    assert_eq!(page.page.reloads(), 1);
    page.close().await;
}

#[tokio::test(start_paused = true)]
async fn test_poll_failure_keeps_polling() {
    let origin = SimulatedOrigin::new();
    let page = PwaHarness::load(origin.clone()).await;

    origin.go_offline();
    sleep(Duration::from_secs(61)).await;
    origin.go_online();
    origin.publish_worker("v2");

    sleep(Duration::from_millis(59_500)).await;
    assert_eq!(page.platform.messages().len(), 1);
    sleep(Duration::from_secs(1)).await;
    assert_eq!(page.page.reloads(), 1);
    page.close().await;
}
