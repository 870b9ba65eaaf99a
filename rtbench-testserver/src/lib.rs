use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::time::{Duration, sleep};

pub const PATH_HEALTH_CHECK: &str = "/api/health-check";
pub const PATH_STATIC: &str = "/api/static";
pub const PATH_SLOW: &str = "/api/slow";
pub const PATH_ERROR: &str = "/api/error";
pub const PATH_SLEEP: &str = "/api/sleep";
pub const PATH_ECHO: &str = "/api/echo";
/// Answers 200 with an empty body.
pub const PATH_EMPTY: &str = "/api/empty";

/// Fixed delay of the slow endpoint.
pub const SLOW_DELAY: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Default)]
pub struct TestServerStats {
    requests_total: Arc<AtomicU64>,
    health_checks: Arc<AtomicU64>,
}

impl TestServerStats {
    fn inc_requests_total(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
    }

    fn inc_health_checks(&self) {
        self.health_checks.fetch_add(1, Ordering::Relaxed);
    }

    /// Requests served, excluding health checks.
    pub fn requests_total(&self) -> u64 {
        self.requests_total.load(Ordering::Relaxed)
    }

    pub fn health_checks(&self) -> u64 {
        self.health_checks.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Serialize)]
struct StaticPayload {
    runtime: &'static str,
    items: [u32; 8],
}

async fn handle_health_check(State(stats): State<TestServerStats>) -> StatusCode {
    stats.inc_health_checks();
    StatusCode::NO_CONTENT
}

async fn handle_static(State(stats): State<TestServerStats>) -> Json<StaticPayload> {
    stats.inc_requests_total();
    Json(StaticPayload {
        runtime: "testserver",
        items: [1, 2, 3, 4, 5, 6, 7, 8],
    })
}

async fn handle_slow(State(stats): State<TestServerStats>) -> &'static str {
    stats.inc_requests_total();
    sleep(SLOW_DELAY).await;
    "slow"
}

async fn handle_error(State(stats): State<TestServerStats>) -> (StatusCode, &'static str) {
    stats.inc_requests_total();
    (StatusCode::INTERNAL_SERVER_ERROR, "error")
}

async fn handle_sleep(
    State(stats): State<TestServerStats>,
    Query(query): Query<HashMap<String, String>>,
) -> (StatusCode, &'static str) {
    stats.inc_requests_total();

    let Some(ms) = query.get("ms").and_then(|v| v.parse::<u64>().ok()) else {
        return (StatusCode::BAD_REQUEST, "ms required");
    };
    sleep(Duration::from_millis(ms)).await;
    (StatusCode::OK, "slept")
}

async fn handle_empty(State(stats): State<TestServerStats>) -> StatusCode {
    stats.inc_requests_total();
    StatusCode::OK
}

async fn handle_echo(State(stats): State<TestServerStats>, body: Bytes) -> Bytes {
    stats.inc_requests_total();
    body
}

pub fn router(stats: TestServerStats) -> Router {
    Router::new()
        .route(PATH_HEALTH_CHECK, get(handle_health_check))
        .route(PATH_STATIC, get(handle_static))
        .route(PATH_SLOW, get(handle_slow))
        .route(PATH_ERROR, get(handle_error))
        .route(PATH_SLEEP, get(handle_sleep))
        .route(PATH_ECHO, post(handle_echo))
        .route(PATH_EMPTY, get(handle_empty))
        .with_state(stats)
}

/// HTTP server on an ephemeral local port that stands in for a runtime under test.
pub struct TestServer {
    addr: SocketAddr,
    base_url: String,
    stats: TestServerStats,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl TestServer {
    pub async fn start() -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let stats = TestServerStats::default();
        let app = router(stats.clone());

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });
            let _ = serve.await;
        });

        Ok(Self {
            addr,
            base_url: format!("http://{addr}"),
            stats,
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub fn stats(&self) -> &TestServerStats {
        &self.stats
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if self.shutdown_tx.is_some()
            && let Some(task) = self.task.take()
        {
            task.abort();
        }
    }
}
