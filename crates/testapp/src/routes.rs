//! HTTP routes of the sample application

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;
use webcompat_harness::{target::normalize_root_path, TestModel};

use crate::areas::{self, AreaRegistrationContext};

/// Application settings, usually from the command line.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Deployed application directory; unmatched paths are served from it
    pub path: PathBuf,

    pub port: u16,

    /// Route prefix for the health endpoint
    pub root_path: String,

    /// Health checks answered with 503 before reporting ready
    pub warmup_requests: usize,
}

#[derive(Clone)]
pub struct AppState {
    warmup_remaining: Arc<AtomicUsize>,
}

impl AppState {
    pub fn new(warmup_requests: usize) -> Self {
        Self {
            warmup_remaining: Arc::new(AtomicUsize::new(warmup_requests)),
        }
    }

    /// Consume one warm-up request; true while still warming up.
    fn warming_up(&self) -> bool {
        self.warmup_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

pub fn router(config: &AppConfig) -> Router {
    let ping_path = format!("{}/ping", normalize_root_path(&config.root_path));
    info!("Health endpoint at {}", ping_path);

    let mut app = Router::new()
        .route(&ping_path, get(ping))
        .route("/Home/Ping", get(|| async { StatusCode::OK }))
        .route("/Test/Ping", get(test_ping))
        .route("/Test/Pong", post(test_pong));

    for area in areas::registered() {
        let mut context = AreaRegistrationContext::new(area.area_name());
        area.register_area(&mut context);
        app = app.merge(context.into_router());
    }

    app.fallback_service(ServeDir::new(&config.path))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState::new(config.warmup_requests))
}

async fn ping(State(state): State<AppState>) -> (StatusCode, &'static str) {
    if state.warming_up() {
        (StatusCode::SERVICE_UNAVAILABLE, "warming up")
    } else {
        (StatusCode::OK, "")
    }
}

async fn test_ping() -> Json<TestModel> {
    Json(TestModel::new("Get Ping"))
}

/// Any body is accepted, including none.
async fn test_pong(_body: Bytes) -> Json<TestModel> {
    Json(TestModel::new("Post Pong"))
}
