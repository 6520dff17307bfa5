//! HTTP transport and REST client against an in-process axum server

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query};
use axum::http::StatusCode;
use axum::response::sse::{Event, Sse};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::stream::{self, Stream};
use futures::StreamExt;
use serde_json::{json, Value};
use tokio::time::timeout;

use beads_live::live::SseFrame;
use beads_live::{
    ApiClient, Filter, HttpTransport, LiveConfig, LiveError, LiveUpdater, QueryCache, QueryKey,
    ServerEvent, Transport,
};
use beads_live::api::ReleaseChecker;
use beads_live::types::{BeadType, Stats, Status};

static STATS_HITS: AtomicUsize = AtomicUsize::new(0);

fn bead_json(id: &str, title: &str) -> Value {
    json!({
        "id": id,
        "title": title,
        "status": "open",
        "priority": 1,
        "issue_type": "task",
        "created_at": "2026-01-05T10:00:00Z",
        "updated_at": "2026-01-06T10:00:00Z"
    })
}

async fn events() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = async_stream::stream! {
        yield Ok(Event::default()
            .event("init")
            .data(r#"{"type":"init","data":{"stats":{"total":4}}}"#));
        yield Ok(Event::default().comment("keep-alive"));
        yield Ok(Event::default()
            .event("reload")
            .data(r#"{"stats":{"total":5,"byStatus":{"open":5}}}"#));
        yield Ok(Event::default().event("heartbeat").data("{}"));
    };
    Sse::new(stream)
}

async fn silent_events() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    Sse::new(stream::pending::<Result<Event, Infallible>>())
}

async fn stats() -> Json<Value> {
    STATS_HITS.fetch_add(1, Ordering::SeqCst);
    Json(json!({
        "total": 3,
        "byStatus": {"open": 2, "closed": 1},
        "blocked": 1,
        "ready": 1,
        "stale": 0,
        "velocity": {"created_7d": 3, "closed_7d": 1}
    }))
}

/// Echoes the received filter back through the first bead
async fn beads(Query(params): Query<HashMap<String, String>>) -> Json<Value> {
    let mut bead = bead_json("bd-1", params.get("status").map(String::as_str).unwrap_or(""));
    bead["description"] = json!(params.get("limit").cloned().unwrap_or_default());
    bead["assignee"] = json!(params.get("type").cloned().unwrap_or_default());
    Json(json!({"beads": [bead], "total": params.len(), "hasMore": params.contains_key("offset")}))
}

async fn bead(Path(id): Path<String>) -> impl IntoResponse {
    if id == "bd-1" {
        let detail = json!({
            "bead": bead_json("bd-1", "Epic"),
            "children": [bead_json("bd-1.1", "Child")],
        });
        (StatusCode::OK, Json(detail))
    } else {
        (StatusCode::NOT_FOUND, Json(json!({"error": "bead not found"})))
    }
}

async fn epics() -> Json<Value> {
    Json(json!({
        "epics": [
            {"id": "bd-1", "title": "Epic", "status": "open", "totalChildren": 4, "closedChildren": 1}
        ]
    }))
}

async fn agent_mode(Json(body): Json<Value>) -> Json<Value> {
    Json(json!({"agentMode": body["enabled"]}))
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "beadsFile": ".beads/issues.jsonl",
        "totalBeads": 3,
        "version": "v1.2.0"
    }))
}

async fn spawn_server() -> String {
    let app = Router::new()
        .route("/api/events", get(events))
        .route("/silent/api/events", get(silent_events))
        .route(
            "/broken/api/events",
            get(|| async { StatusCode::SERVICE_UNAVAILABLE }),
        )
        .route("/api/stats", get(stats))
        .route("/api/beads", get(beads))
        .route("/api/beads/:id", get(bead))
        .route("/api/epics", get(epics))
        .route("/api/agent-mode", post(agent_mode))
        .route("/api/health", get(health))
        .route(
            "/tags",
            get(|| async { Json(json!([{"name": "v1.3.0"}, {"name": "v1.2.0"}])) }),
        )
        .route("/missing/tags", get(|| async { StatusCode::NOT_FOUND }));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn test_transport_decodes_server_frames() {
    let base = spawn_server().await;
    let transport = HttpTransport::new(&LiveConfig::new(&base)).unwrap();
    assert!(transport.url().as_str().ends_with("/api/events"));

    let frames = match transport.connect().await {
        Ok(frames) => frames,
        Err(e) => panic!("connect failed: {}", e),
    };
    let frames: Vec<SseFrame> = timeout(Duration::from_secs(5), frames.collect::<Vec<_>>())
        .await
        .unwrap()
        .into_iter()
        .collect::<Result<_, _>>()
        .unwrap();

    let names: Vec<&str> = frames.iter().map(|f| f.event.as_str()).collect();
    assert_eq!(names, vec!["init", "reload", "heartbeat"]);

    match ServerEvent::decode(&frames[0]).unwrap() {
        Some(ServerEvent::Init { stats }) => assert_eq!(stats.total, 4),
        other => panic!("unexpected event: {:?}", other),
    }
    match ServerEvent::decode(&frames[1]).unwrap() {
        Some(ServerEvent::Reload { stats }) => assert_eq!(stats.status_count("open"), 5),
        other => panic!("unexpected event: {:?}", other),
    }
}

#[tokio::test]
async fn test_transport_rejects_error_status() {
    let base = spawn_server().await;
    let transport = HttpTransport::new(&LiveConfig::new(format!("{}/broken", base))).unwrap();

    match transport.connect().await {
        Err(LiveError::Status(503)) => {}
        Err(e) => panic!("unexpected error: {}", e),
        Ok(_) => panic!("connect should fail"),
    }
}

#[tokio::test]
async fn test_transport_times_out_silent_stream() {
    let base = spawn_server().await;
    let config =
        LiveConfig::new(format!("{}/silent", base)).with_idle_timeout(Duration::from_millis(200));
    let transport = HttpTransport::new(&config).unwrap();

    let mut frames = match transport.connect().await {
        Ok(frames) => frames,
        Err(e) => panic!("connect failed: {}", e),
    };
    let first = timeout(Duration::from_secs(5), frames.next()).await.unwrap();
    assert!(matches!(first, Some(Err(LiveError::IdleTimeout(_)))));
}

#[tokio::test]
async fn test_live_updater_over_http() {
    let base = spawn_server().await;
    let config = LiveConfig::new(&base)
        .with_reconnect_delay(Duration::from_millis(1000))
        .with_debounce_window(Duration::from_millis(300));
    let cache = Arc::new(QueryCache::new());
    let transport = Arc::new(HttpTransport::new(&config).unwrap());

    let handle = LiveUpdater::spawn(config, transport, cache.clone()).unwrap();
    let mut state = handle.subscribe();

    let snapshot = timeout(
        Duration::from_secs(5),
        state.wait_for(|s| s.stats.as_ref().is_some_and(|s| s.total == 5)),
    )
    .await
    .unwrap()
    .unwrap()
    .clone();
    assert_eq!(snapshot.stats.unwrap().status_count("open"), 5);

    timeout(Duration::from_secs(5), async {
        while cache.invalidation_count() == 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    handle.stop().await;
    assert!(!handle.state().connected);
}

#[tokio::test]
async fn test_api_client_endpoints() {
    let base = spawn_server().await;
    let api = ApiClient::new(&base).unwrap();

    let filter = Filter::new()
        .with_status(Status::from("open"))
        .with_status(Status::from("in_progress"))
        .with_type(BeadType::from("bug"))
        .page(10, 20);
    let page = api.beads(&filter).await.unwrap();
    assert_eq!(page.beads[0].title, "open,in_progress");
    assert_eq!(page.beads[0].description.as_deref(), Some("10"));
    assert_eq!(page.beads[0].assignee.as_deref(), Some("bug"));
    assert_eq!(page.total, 4);
    assert!(page.has_more);

    let detail = api.bead("bd-1").await.unwrap();
    assert_eq!(detail.bead.id, "bd-1");
    assert_eq!(detail.children.len(), 1);

    match api.bead("bd-404").await {
        Err(LiveError::Api { status, message }) => {
            assert_eq!(status, 404);
            assert_eq!(message, "bead not found");
        }
        other => panic!("unexpected result: {:?}", other),
    }

    let epics = api.epics().await.unwrap();
    assert_eq!(epics.len(), 1);
    assert_eq!(epics[0].completion(), 0.25);

    assert!(api.set_agent_mode(true).await.unwrap());
    assert!(!api.set_agent_mode(false).await.unwrap());

    let health = api.health().await.unwrap();
    assert_eq!(health.status, "ok");
    assert_eq!(health.total_beads, 3);
}

#[tokio::test]
async fn test_cache_serves_until_invalidated() {
    use beads_live::CacheInvalidator;

    let base = spawn_server().await;
    let api = ApiClient::new(&base).unwrap();
    let cache = QueryCache::new();
    let before = STATS_HITS.load(Ordering::SeqCst);

    let first: Stats = cache.get_or_fetch(QueryKey::Stats, || api.stats()).await.unwrap();
    let second: Stats = cache.get_or_fetch(QueryKey::Stats, || api.stats()).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first.velocity.map(|v| v.created_7d), Some(3));
    assert_eq!(STATS_HITS.load(Ordering::SeqCst) - before, 1);

    cache.invalidate_all();
    assert!(!cache.is_fresh(&QueryKey::Stats));
    assert_eq!(cache.peek::<Stats>(&QueryKey::Stats).map(|c| c.fresh), Some(false));

    cache.get_or_fetch(QueryKey::Stats, || api.stats()).await.unwrap();
    assert_eq!(STATS_HITS.load(Ordering::SeqCst) - before, 2);
    assert!(cache.is_fresh(&QueryKey::Stats));
}

#[tokio::test]
async fn test_update_check_against_tags() {
    let base = spawn_server().await;
    let api = ApiClient::new(&base).unwrap();

    let checker = ReleaseChecker::with_tags_url(&format!("{}/tags", base)).unwrap();
    assert_eq!(checker.latest_tag().await.unwrap().as_deref(), Some("v1.3.0"));

    let info = checker.check(&api).await.unwrap();
    assert_eq!(info.current.as_deref(), Some("v1.2.0"));
    assert_eq!(info.latest.as_deref(), Some("v1.3.0"));
    assert!(info.update_available);

    // a failing tag lookup skips the comparison instead of failing the check
    let checker = ReleaseChecker::with_tags_url(&format!("{}/missing/tags", base)).unwrap();
    let info = checker.check(&api).await.unwrap();
    assert_eq!(info.current.as_deref(), Some("v1.2.0"));
    assert_eq!(info.latest, None);
    assert!(!info.update_available);
}
