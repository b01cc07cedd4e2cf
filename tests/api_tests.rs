mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::Utc;
use metrics_exporter_prometheus::PrometheusBuilder;
use tower::ServiceExt;

use wagerd::api::router::create_router;
use wagerd::assets::AssetRegistry;
use wagerd::config::AppConfig;
use wagerd::ingestion::pipeline::process_raw_batch;
use wagerd::models::{addr_key, SchemaVersion};
use wagerd::AppState;

use common::{
    addr, build_wager_at, coord, live_wager, setup_test_db, test_normalizer_config, FixedReader,
};

async fn build_test_app() -> (axum::Router, sqlx::SqlitePool) {
    let pool = setup_test_db().await;

    // A handle that is not installed globally, so parallel tests never fight
    // over the process-wide recorder.
    let metrics_handle = PrometheusBuilder::new().build_recorder().handle();

    let config = AppConfig {
        database_url: "sqlite::memory:".into(),
        host: "127.0.0.1".into(),
        port: 0,
        rpc_url: None,
        factory_v1_address: None,
        factory_v2_address: None,
        poll_interval_secs: 12,
        poll_block_chunk: 500,
        judging_window_secs: 7 * 24 * 60 * 60,
        deadline_read_attempts: 3,
        deadline_read_base_delay_ms: 250,
        parked_retry_interval_secs: 30,
        identity_api_url: None,
    };

    let state = AppState {
        db: pool.clone(),
        config,
        registry: Arc::new(AssetRegistry::from_env()),
        identity: None,
        metrics_handle,
    };

    let router = create_router(state);
    (router, pool)
}

/// Project a pending and an active wager into the store and return their keys.
async fn seed_two_wagers(pool: &sqlx::SqlitePool) -> (String, String) {
    let config = test_normalizer_config();
    let reader = FixedReader(Utc::now());

    let pending = live_wager(SchemaVersion::V1, 0x0a);
    let mut active = live_wager(SchemaVersion::V1, 0x0b);
    active.accept(addr(0x22), active.created_at + 60).unwrap();

    let batch = vec![
        pending.created_event(coord("0xaaa", 0)),
        active.created_event(coord("0xbbb", 0)),
        active.accepted_event(coord("0xbbb", 1)).unwrap(),
    ];
    process_raw_batch(batch, pool, &reader, &config).await.unwrap();

    (addr_key(pending.address), addr_key(active.address))
}

#[tokio::test]
async fn test_health_check() {
    let (app, _pool) = build_test_app().await;

    let resp = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);

    let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "healthy");
}

#[tokio::test]
async fn test_list_wagers_empty() {
    let (app, _pool) = build_test_app().await;

    let resp = app
        .oneshot(Request::builder().uri("/api/wagers").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);

    let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["success"], true);
    assert_eq!(json["data"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_list_wagers_enriched_view() {
    let (app, pool) = build_test_app().await;
    seed_two_wagers(&pool).await;

    let resp = app
        .oneshot(Request::builder().uri("/api/wagers").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);

    let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["success"], true);

    let wagers = json["data"].as_array().unwrap();
    assert_eq!(wagers.len(), 2);

    let w = &wagers[0];
    // base-unit amounts travel as strings, never JSON numbers
    assert!(w["maker_stake"].is_string());
    assert_eq!(w["maker_stake"], "1500000");
    assert_eq!(w["maker_stake_display"], "1.500000");
    assert_eq!(w["asset"]["symbol"], "USDC");
    assert_eq!(w["asset"]["decimals"], 6);
    assert_eq!(w["schema_version"], "v1");
}

#[tokio::test]
async fn test_list_wagers_phase_filter() {
    let (app, pool) = build_test_app().await;
    let (_pending, active_key) = seed_two_wagers(&pool).await;

    let resp = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/wagers?phase=active")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    let wagers = json["data"].as_array().unwrap();
    assert_eq!(wagers.len(), 1);
    assert_eq!(wagers[0]["address"], active_key.as_str());
    assert_eq!(wagers[0]["phase"], "active");

    // unknown phase values are rejected, not silently ignored
    let resp = app
        .oneshot(
            Request::builder()
                .uri("/api/wagers?phase=limbo")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_phase_filter_scans_past_the_limit_window() {
    let (app, pool) = build_test_app().await;
    let config = test_normalizer_config();
    let reader = FixedReader(Utc::now());

    // an older active wager buried behind a newer pending one
    let now = Utc::now().timestamp() as u64;
    let mut active = build_wager_at(
        SchemaVersion::V1,
        0x0c,
        now + 86_400,
        now + 30 * 86_400,
        now - 7_200,
    );
    active.accept(addr(0x22), active.created_at + 60).unwrap();
    let pending = live_wager(SchemaVersion::V1, 0x0d);

    let batch = vec![
        active.created_event(coord("0xaaa", 0)),
        active.accepted_event(coord("0xaaa", 1)).unwrap(),
        pending.created_event(coord("0xbbb", 0)),
    ];
    process_raw_batch(batch, &pool, &reader, &config).await.unwrap();

    // limit=1 alone would fetch only the newest (pending) row; the filter
    // must keep scanning instead of returning an empty page
    let resp = app
        .oneshot(
            Request::builder()
                .uri("/api/wagers?phase=active&limit=1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    let wagers = json["data"].as_array().unwrap();
    assert_eq!(wagers.len(), 1);
    assert_eq!(wagers[0]["address"], addr_key(active.address).as_str());
    assert_eq!(wagers[0]["phase"], "active");
}

#[tokio::test]
async fn test_wager_detail() {
    let (app, pool) = build_test_app().await;
    let (pending_key, _active) = seed_two_wagers(&pool).await;

    let resp = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/api/wagers/{pending_key}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["address"], pending_key.as_str());
    assert_eq!(json["data"]["phase"], "pending");
    // no identity directory configured: addresses stand alone
    assert!(json["data"]["maker"]["display_name"].is_null());

    let resp = app
        .oneshot(
            Request::builder()
                .uri("/api/wagers/0x00000000000000000000000000000000000000ff")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let (app, _pool) = build_test_app().await;

    let resp = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);

    let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let _text = String::from_utf8(body.to_vec()).unwrap();
    // Endpoint returns valid text; metric names may or may not appear depending
    // on global recorder state in tests (only one recorder per process).
}
