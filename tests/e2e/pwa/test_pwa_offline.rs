//! E2E Test: PWA Offline Capability
//!
//! Property 7: the first load seeds the runtime store with `/`; a later
//! offline navigation to `/` returns the seeded document.
//!
//! Also covers the offline document fallback for deep links and the
//! online-only treatment of API calls.

use insta_metrics_e2e_tests::fixtures::index_html;
use insta_metrics_e2e_tests::{PwaHarness, SimulatedOrigin};
use insta_metrics_runtime::{NetworkError, ResponseSource};

#[tokio::test]
async fn test_first_load_then_offline_navigation() {
    let origin = SimulatedOrigin::new();
    let page = PwaHarness::load(origin.clone()).await;
    assert!(page.is_coordinating());
    assert!(page.host.controller().await.is_some());

    let served = page.navigate("/").await.unwrap();
    assert_eq!(served.source, ResponseSource::Network);
    assert!(page
        .host
        .caches()
        .read()
        .get("insta-metrics-runtime-v1")
        .is_some_and(|cache| !cache.is_empty()));

    origin.go_offline();
    let served = page.navigate("/").await.unwrap();
    assert_eq!(served.source, ResponseSource::Cache);
    assert_eq!(served.response.text(), Some(index_html("1").as_str()));
    page.close().await;
}

#[tokio::test]
async fn test_offline_assets_come_from_cache() {
    let origin = SimulatedOrigin::new();
    let page = PwaHarness::load(origin.clone()).await;
    page.get("/assets/app.js").await.unwrap();

    origin.go_offline();
    let served = page.get("/assets/app.js").await.unwrap();
    assert_eq!(served.source, ResponseSource::Cache);
    assert_eq!(served.response.text(), Some("console.log('build 1')"));
    page.close().await;
}

#[tokio::test]
async fn test_offline_deep_link_gets_app_shell() {
    let origin = SimulatedOrigin::new();
    let page = PwaHarness::load(origin.clone()).await;

    origin.go_offline();
    let served = page.navigate("/reports/weekly").await.unwrap();
    assert_eq!(served.source, ResponseSource::OfflineFallback);
    assert_eq!(served.response.text(), Some(index_html("1").as_str()));
    page.close().await;
}

#[tokio::test]
async fn test_api_is_online_only() {
    let origin = SimulatedOrigin::new();
    let page = PwaHarness::load(origin.clone()).await;

    for _ in 0..2 {
        let served = page.get("/api/metrics").await.unwrap();
        assert_eq!(served.source, ResponseSource::Network);
    }
    assert_eq!(origin.hits("/api/metrics"), 2);

    origin.go_offline();
    assert_eq!(
        page.get("/api/metrics").await.unwrap_err(),
        NetworkError::Offline
    );
    page.close().await;
}

#[tokio::test]
async fn test_offline_first_visit_keeps_page_online_only() {
    let origin = SimulatedOrigin::new();
    origin.go_offline();
    let page = PwaHarness::load(origin.clone()).await;
    assert!(!page.is_coordinating());
    assert!(page.host.controller().await.is_none());

    origin.go_online();
    let served = page.navigate("/").await.unwrap();
    assert_eq!(served.source, ResponseSource::Network);
    assert!(page.host.caches().read().keys().is_empty());
}
