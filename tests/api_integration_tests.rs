//! Integration Tests for the dashboard client
//!
//! Runs an axum mock backend on an ephemeral port and drives the real
//! `HttpTransport` through `DashboardApi` end to end.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use dashboard_sync::cache::Filters;
use dashboard_sync::models::NewFeature;
use dashboard_sync::{
    Config, DashboardApi, FetchError, HttpTransport, QueryCache, QueryState, QueryStatus,
    Subscription, SyncError,
};
use serde_json::{json, Value};

const WAIT: Duration = Duration::from_secs(5);

// == Mock Backend ==

struct Backend {
    features: Mutex<Vec<Value>>,
    unread: Mutex<BTreeSet<String>>,
    feature_list_hits: AtomicUsize,
}

impl Backend {
    fn seeded() -> Self {
        Self {
            features: Mutex::new(vec![
                feature_json("f1", "Dark mode"),
                feature_json("f2", "Export to CSV"),
            ]),
            unread: Mutex::new(["n1", "n2"].iter().map(|id| id.to_string()).collect()),
            feature_list_hits: AtomicUsize::new(0),
        }
    }
}

type Shared = Arc<Backend>;

fn feature_json(id: &str, name: &str) -> Value {
    json!({"id": id, "name": name, "enabled": true, "updatedAt": "2026-01-01T00:00:00Z"})
}

fn page(items: Vec<Value>) -> Value {
    let total = items.len();
    json!({"items": items, "total": total, "page": 1, "limit": 20, "hasMore": false})
}

async fn list_features(
    State(backend): State<Shared>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    backend.feature_list_hits.fetch_add(1, Ordering::SeqCst);
    let search = params.get("search").map(|s| s.to_lowercase());
    let items = backend
        .features
        .lock()
        .unwrap()
        .iter()
        .filter(|f| match &search {
            Some(term) => f["name"].as_str().unwrap().to_lowercase().contains(term),
            None => true,
        })
        .cloned()
        .collect();
    Json(page(items))
}

async fn create_feature(State(backend): State<Shared>, Json(body): Json<Value>) -> Json<Value> {
    let mut features = backend.features.lock().unwrap();
    let id = format!("f{}", features.len() + 1);
    let created = feature_json(&id, body["name"].as_str().unwrap_or_default());
    features.push(created.clone());
    Json(created)
}

async fn list_notifications(State(backend): State<Shared>) -> Json<Value> {
    let unread = backend.unread.lock().unwrap();
    let items = ["n1", "n2"]
        .iter()
        .map(|id| {
            json!({
                "id": id,
                "title": format!("Notification {id}"),
                "read": !unread.contains(*id),
                "createdAt": "2026-01-01T00:00:00Z"
            })
        })
        .collect();
    let mut body = page(items);
    body["unreadCount"] = json!(unread.len());
    Json(body)
}

async fn unread_count(State(backend): State<Shared>) -> Json<Value> {
    Json(json!({"unreadCount": backend.unread.lock().unwrap().len()}))
}

async fn mark_read(
    State(backend): State<Shared>,
    Path(id): Path<String>,
) -> (StatusCode, Json<Value>) {
    if !["n1", "n2"].contains(&id.as_str()) {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "Notification not found"})),
        );
    }
    backend.unread.lock().unwrap().remove(&id);
    (StatusCode::OK, Json(json!({"success": true})))
}

async fn mark_all_read(State(backend): State<Shared>) -> StatusCode {
    backend.unread.lock().unwrap().clear();
    StatusCode::NO_CONTENT
}

async fn panels_offline() -> (StatusCode, Json<Value>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"error": "panel store offline"})),
    )
}

// == Helper Functions ==

async fn spawn_backend() -> (String, Shared) {
    let backend = Arc::new(Backend::seeded());
    let app = Router::new()
        .route("/api/features", get(list_features).post(create_feature))
        .route("/api/notifications", get(list_notifications))
        .route("/api/notifications/unread-count", get(unread_count))
        .route("/api/notifications/read-all", post(mark_all_read))
        .route("/api/notifications/:id/read", post(mark_read))
        .route("/api/panels", get(panels_offline))
        .with_state(backend.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), backend)
}

fn client(base_url: &str) -> DashboardApi {
    let config = Config {
        api_base_url: base_url.to_string(),
        ..Config::default()
    };
    let transport = HttpTransport::from_config(&config).unwrap();
    DashboardApi::new(Arc::new(transport), QueryCache::from_config(&config), &config)
}

async fn settled<T: Send + Sync + 'static>(sub: &mut Subscription<T>) -> QueryState<T> {
    tokio::time::timeout(
        WAIT,
        sub.wait_until(|s| !s.is_fetching && s.status != QueryStatus::Stale),
    )
    .await
    .expect("query did not settle in time")
    .expect("entry dropped")
}

// == Query Tests ==

#[tokio::test]
async fn test_feature_list_with_search_filter() {
    let (base_url, _backend) = spawn_backend().await;
    let api = client(&base_url);

    let mut sub = api.features(&Filters::new().with("search", "dark"));
    let state = settled(&mut sub).await;

    assert_eq!(state.status, QueryStatus::Fresh);
    let page = state.data.unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].name, "Dark mode");
}

#[tokio::test]
async fn test_concurrent_views_share_one_request() {
    let (base_url, backend) = spawn_backend().await;
    let api = client(&base_url);

    let mut first = api.features(&Filters::new());
    let mut second = api.features(&Filters::new());
    settled(&mut first).await;
    settled(&mut second).await;

    assert_eq!(backend.feature_list_hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_error_body_is_recorded_on_entry() {
    let (base_url, _backend) = spawn_backend().await;
    let api = client(&base_url);

    let mut sub = api.panels(&Filters::new());
    let state = settled(&mut sub).await;

    assert_eq!(state.status, QueryStatus::Error);
    assert!(state.data.is_none());
    assert_eq!(
        state.error,
        Some(FetchError::Http {
            status: 500,
            message: "panel store offline".to_string(),
        })
    );
}

#[tokio::test]
async fn test_unreachable_backend_is_network_failure() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let api = client(&format!("http://{addr}"));

    let mut sub = api.unread_count();
    let state = settled(&mut sub).await;

    assert_eq!(state.status, QueryStatus::Error);
    assert!(matches!(state.error, Some(FetchError::Network(_))));
}

// == Mutation Tests ==

#[tokio::test]
async fn test_mark_read_refetches_unread_count() {
    let (base_url, _backend) = spawn_backend().await;
    let api = client(&base_url);

    let mut count = api.unread_count();
    assert_eq!(settled(&mut count).await.data.unwrap().unread_count, 2);

    let ack = api.mark_notification_read("n1").await.unwrap();
    assert!(ack.success);

    let state = settled(&mut count).await;
    assert_eq!(state.status, QueryStatus::Fresh);
    assert_eq!(state.data.unwrap().unread_count, 1);
}

#[tokio::test]
async fn test_failed_mutation_does_not_invalidate() {
    let (base_url, _backend) = spawn_backend().await;
    let api = client(&base_url);

    let mut count = api.unread_count();
    settled(&mut count).await;

    let err = api.mark_notification_read("missing").await.unwrap_err();
    match err {
        SyncError::Mutation(FetchError::Http { status, message }) => {
            assert_eq!(status, 404);
            assert_eq!(message, "Notification not found");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(count.state().status, QueryStatus::Fresh);
    assert_eq!(api.cache().stats().invalidations, 0);
}

#[tokio::test]
async fn test_mark_all_read_with_empty_response() {
    let (base_url, _backend) = spawn_backend().await;
    let api = client(&base_url);

    let mut list = api.notifications(&Filters::new());
    assert_eq!(settled(&mut list).await.data.unwrap().unread_count, 2);

    let ack = api.mark_all_notifications_read().await.unwrap();
    assert!(ack.success);

    let state = settled(&mut list).await;
    let page = state.data.unwrap();
    assert_eq!(page.unread_count, 0);
    assert!(page.page.items.iter().all(|n| n.read));
}

#[tokio::test]
async fn test_create_feature_refreshes_visible_list() {
    let (base_url, backend) = spawn_backend().await;
    let api = client(&base_url);

    let mut list = api.features(&Filters::new());
    assert_eq!(settled(&mut list).await.data.unwrap().total, 2);

    let created = api
        .create_feature(&NewFeature {
            name: "Audit log".to_string(),
            description: None,
            category: None,
            enabled: true,
        })
        .await
        .unwrap();
    assert_eq!(created.id, "f3");

    let state = settled(&mut list).await;
    assert_eq!(state.data.unwrap().total, 3);
    assert_eq!(backend.feature_list_hits.load(Ordering::SeqCst), 2);
}
