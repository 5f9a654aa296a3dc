use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{Duration, Utc};
use color_relay::broadcaster::Broadcaster;
use color_relay::domain::{StoredPoint, ViewerEvent};
use color_relay::error::StorageError;
use color_relay::handlers::AppState;
use color_relay::server::router;
use color_relay::storage::{MemoryStore, ReadingStore};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

/// store that rejects everything, as an unreachable influx would
struct FailingStore;

#[async_trait]
impl ReadingStore for FailingStore {
    async fn write(&self, _color: &str) -> Result<(), StorageError> {
        Err(StorageError::Rejected { status: 401, body: "token=secret invalid".into() })
    }

    async fn query_recent(&self, _: u32, _: usize) -> Result<Vec<StoredPoint>, StorageError> {
        Err(StorageError::MalformedResponse("boom".into()))
    }

    fn backend(&self) -> &'static str {
        "failing"
    }
}

/// store that answers like a grouped flux query: one capped table per series,
/// tables in series order rather than time order
struct SplitTableStore {
    tables: Vec<Vec<StoredPoint>>,
}

impl SplitTableStore {
    fn two_tables_of_ten() -> Self {
        let now = Utc::now();
        let table = |t: i64| {
            (0..10)
                .map(|i| StoredPoint {
                    value: format!("t{}-{}", t, i),
                    time: now - Duration::seconds(200 - t * 100 - i),
                })
                .collect()
        };
        Self { tables: vec![table(0), table(1)] }
    }
}

#[async_trait]
impl ReadingStore for SplitTableStore {
    async fn write(&self, _color: &str) -> Result<(), StorageError> {
        Ok(())
    }

    async fn query_recent(&self, _: u32, limit: usize) -> Result<Vec<StoredPoint>, StorageError> {
        Ok(self.tables.iter().flat_map(|t| t.iter().take(limit).cloned()).collect())
    }

    fn backend(&self) -> &'static str {
        "split"
    }
}

fn app_with(store: Arc<dyn ReadingStore>) -> (Router, Broadcaster) {
    let broadcaster = Broadcaster::new(8);
    let state = AppState::new(store, broadcaster.clone());
    (router(state), broadcaster)
}

fn post_cor(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/cor")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn valid_reading_is_stored_and_broadcast() {
    let store = Arc::new(MemoryStore::new(64));
    let (app, broadcaster) = app_with(store.clone());
    let mut viewer = broadcaster.subscribe();

    let (status, body) =
        send(&app, post_cor(r#"{"cor": "red", "r": 255, "g": 0, "b": 0, "clear": 100}"#)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "ok", "cor": "red" }));
    assert_eq!(store.len(), 1);

    let ViewerEvent::UpdateData(reading) = viewer.recv().await.unwrap();
    assert_eq!(reading.cor, "red");
    assert_eq!(reading.r, Some(255.0));
    assert_eq!(reading.clear, Some(100.0));
}

#[tokio::test]
async fn reading_without_viewers_still_succeeds() {
    let store = Arc::new(MemoryStore::new(64));
    let (app, broadcaster) = app_with(store.clone());

    let (status, _) = send(&app, post_cor(r#"{"cor": "azul"}"#)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(store.len(), 1);
    assert_eq!(broadcaster.viewer_count(), 0);
}

#[tokio::test]
async fn missing_color_has_no_side_effects() {
    let store = Arc::new(MemoryStore::new(64));
    let (app, broadcaster) = app_with(store.clone());
    let mut viewer = broadcaster.subscribe();

    for body in [r#"{"r": 10}"#, r#"{"cor": ""}"#] {
        let (status, reply) = send(&app, post_cor(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(reply["error"], "Campo 'cor' ausente");
    }

    assert!(store.is_empty());
    // nothing queued for the viewer
    assert!(tokio::time::timeout(std::time::Duration::from_millis(50), viewer.recv())
        .await
        .is_err());
}

#[tokio::test]
async fn non_json_body_is_bad_request() {
    let (app, _) = app_with(Arc::new(MemoryStore::new(64)));

    let (status, reply) = send(&app, post_cor("not json at all")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(reply["error"], "JSON esperado");
}

#[tokio::test]
async fn storage_failure_is_a_clean_500() {
    let (app, broadcaster) = app_with(Arc::new(FailingStore));
    let mut viewer = broadcaster.subscribe();

    let (status, reply) = send(&app, post_cor(r#"{"cor": "red"}"#)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(reply, json!({ "error": "storage unavailable" }));
    // nothing was persisted, so nothing goes out
    assert!(tokio::time::timeout(std::time::Duration::from_millis(50), viewer.recv())
        .await
        .is_err());

    let (status, reply) = send(&app, get("/dados")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(reply["error"], "storage unavailable");
}

#[tokio::test]
async fn dados_is_empty_without_readings() {
    let (app, _) = app_with(Arc::new(MemoryStore::new(64)));

    let (status, body) = send(&app, get("/dados")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn dados_returns_reading_posted_just_before() {
    let (app, _) = app_with(Arc::new(MemoryStore::new(64)));

    send(&app, post_cor(r#"{"cor": "red", "r": 255, "g": 0, "b": 0, "clear": 100}"#)).await;
    let (status, body) = send(&app, get("/dados")).await;

    assert_eq!(status, StatusCode::OK);
    let entries = body.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["cor"], "red");

    let hora = entries[0]["hora"].as_str().unwrap();
    let when = chrono::DateTime::parse_from_rfc3339(hora).unwrap();
    assert!(Utc::now().signed_duration_since(when) < Duration::minutes(1));
}

#[tokio::test]
async fn dados_caps_at_ten_in_store_order() {
    let store = Arc::new(MemoryStore::new(64));
    for i in 0..14 {
        store.insert(StoredPoint {
            value: format!("c{:02}", i),
            time: Utc::now() - Duration::seconds(100 - i),
        });
    }
    let (app, _) = app_with(store);

    let (_, body) = send(&app, get("/dados")).await;

    let colors: Vec<&str> =
        body.as_array().unwrap().iter().map(|e| e["cor"].as_str().unwrap()).collect();
    let expected: Vec<String> = (4..14).map(|i| format!("c{:02}", i)).collect();
    assert_eq!(colors, expected);
}

#[tokio::test]
async fn dados_keeps_the_newest_across_tables() {
    let (app, _) = app_with(Arc::new(SplitTableStore::two_tables_of_ten()));

    let (status, body) = send(&app, get("/dados")).await;

    assert_eq!(status, StatusCode::OK);
    let colors: Vec<&str> =
        body.as_array().unwrap().iter().map(|e| e["cor"].as_str().unwrap()).collect();
    let expected: Vec<String> = (0..10).map(|i| format!("t1-{}", i)).collect();
    assert_eq!(colors, expected);
}

#[tokio::test]
async fn color_with_line_break_is_stored() {
    let store = Arc::new(MemoryStore::new(64));
    let (app, _) = app_with(store.clone());

    let (status, body) = send(&app, post_cor(r#"{"cor": "red\nblue"}"#)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cor"], "red\nblue");
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn health_reports_viewers_and_backend() {
    let (app, broadcaster) = app_with(Arc::new(MemoryStore::new(64)));
    let _viewer = broadcaster.subscribe();

    let (status, body) = send(&app, get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "ok", "viewers": 1, "storage": "memory" }));
}
