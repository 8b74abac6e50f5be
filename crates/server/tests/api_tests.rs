//! In-process API tests over the mocked engine.

mod common;

use axum::http::StatusCode;
use common::{fixtures, TestFixture};
use fetchlane_core::{
    AcquisitionRecord, BacklogStore, Config, MediaItem, OrchestratorConfig, Protocol,
};

const HASH: &str = "c12fe1c06bba254a9dc9f519b335aa7c1367a88a";

/// Seed a live pack for "Show" season 1 covering `episodes`, one backlog
/// item per episode. Returns the pack's transfer ID.
async fn seed_pack(fixture: &TestFixture, episodes: &[u32]) -> String {
    let transfer_id = fixture.remote.add_transfer(HASH).await;
    for ep in episodes {
        let item = MediaItem::episode(format!("e{}", ep), "Show", 1, *ep);
        fixture.store.save_item(&item).unwrap();

        let mut record = AcquisitionRecord::new(&item, "Show.S01.1080p", 10, Protocol::Torrent)
            .with_hash(HASH);
        record.mark_submitted(transfer_id.clone());
        record.mark_pack(episodes.iter().copied());
        fixture.store.save_acquisition(&record).unwrap();
    }
    transfer_id
}

#[tokio::test]
async fn test_health() {
    let fixture = TestFixture::new();

    let response = fixture.get("/api/v1/health").await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["status"], "ok");
}

#[tokio::test]
async fn test_config_is_sanitized() {
    let mut config = Config::default();
    config.remote_cache.api_key = "super-secret".to_string();
    let fixture = TestFixture::with_config(config);

    let response = fixture.get("/api/v1/config").await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["remote_cache"]["api_key_configured"], true);
    assert_eq!(response.body["server"]["port"], 8080);
    assert!(!response.text.contains("super-secret"));
}

#[tokio::test]
async fn test_status_before_any_run() {
    let fixture = TestFixture::new();

    let response = fixture.get("/api/v1/orchestrator/status").await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["running"], false);
    assert_eq!(response.body["in_flight"], 0);
    assert!(response.body["last_report"].is_null());
}

#[tokio::test]
async fn test_manual_run_acquires_and_reports() {
    let fixture = TestFixture::new();
    fixture
        .store
        .save_item(&MediaItem::movie("m1", "Dune", Some(2021)))
        .unwrap();
    fixture
        .provider
        .set_results(vec![fixtures::torrent(
            "Dune.2021.2160p.WEB-DL",
            8_000_000_000,
            HASH,
        )])
        .await;
    fixture
        .remote
        .set_cached(HASH, fixtures::movie_files("Dune.2021.2160p.WEB-DL"))
        .await;

    let response = fixture.post("/api/v1/orchestrator/run?wait=true").await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["total"], 1);
    assert_eq!(response.body["acquired"], 1);

    let item = fixture.store.get_item("m1").unwrap();
    assert!(item.acquired);

    let status = fixture.get("/api/v1/orchestrator/status").await;
    assert_eq!(status.body["last_report"]["acquired"], 1);
}

#[tokio::test]
async fn test_manual_run_without_wait_is_accepted() {
    let fixture = TestFixture::new();

    let response = fixture.post("/api/v1/orchestrator/run").await;

    assert_status!(response, StatusCode::ACCEPTED);
    assert_eq!(response.body["already_running"], false);
}

#[tokio::test]
async fn test_manual_run_after_shutdown_is_unavailable() {
    let fixture = TestFixture::with_config(Config {
        orchestrator: OrchestratorConfig {
            max_concurrent_items: 1,
            ..Default::default()
        },
        ..Default::default()
    });
    fixture
        .store
        .save_item(&MediaItem::movie("m1", "Dune", Some(2021)))
        .unwrap();
    fixture.shutdown.cancel();

    let response = fixture.post("/api/v1/orchestrator/run?wait=true").await;

    assert_status!(response, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(fixture.remote.submit_count(), 0);
}

#[tokio::test]
async fn test_unknown_pack_is_not_found() {
    let fixture = TestFixture::new();

    let response = fixture.get("/api/v1/packs/Show/1").await;
    assert_status!(response, StatusCode::NOT_FOUND);

    let response = fixture.post("/api/v1/packs/Show/1/consumed/1").await;
    assert_status!(response, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_pack_consumption_releases_when_complete() {
    let fixture = TestFixture::new();
    let transfer_id = seed_pack(&fixture, &[1, 2]).await;

    let response = fixture.get("/api/v1/packs/Show/1").await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["total_episodes"], 2);
    assert_eq!(response.body["complete"], false);

    let response = fixture.post("/api/v1/packs/Show/1/consumed/1").await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["complete"], false);
    assert_eq!(fixture.remote.live_transfers().await, vec![transfer_id.clone()]);

    let response = fixture.post("/api/v1/packs/Show/1/consumed/2").await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["complete"], true);
    assert_eq!(fixture.remote.deleted().await, vec![transfer_id]);

    // Released packs are no longer live.
    let response = fixture.get("/api/v1/packs/Show/1").await;
    assert_status!(response, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_pack_path_matches_normalized_show() {
    let fixture = TestFixture::new();
    seed_pack(&fixture, &[1]).await;

    let response = fixture.get("/api/v1/packs/show/1").await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["known_episodes"], serde_json::json!([1]));
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let fixture = TestFixture::new();
    fixture.get("/api/v1/health").await;

    let response = fixture.get("/metrics").await;

    assert_status!(response, StatusCode::OK);
    assert!(response.text.contains("fetchlane_http_requests_total"));
    assert!(response.text.contains("fetchlane_orchestrator_running"));
}
