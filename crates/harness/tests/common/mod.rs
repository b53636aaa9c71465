//! Shared helpers for harness integration tests

#![allow(dead_code)]

use std::net::TcpListener as StdTcpListener;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use parking_lot::Mutex;
use tokio::task::JoinHandle;

use webcompat_harness::{HarnessError, HarnessResult, Launcher, ProbeConfig, ProcessHandle, TestModel};

/// Probe settings that keep failing tests fast.
pub fn fast_probe(max_attempts: u32) -> ProbeConfig {
    ProbeConfig {
        max_attempts,
        interval: Duration::from_millis(20),
        request_timeout: Duration::from_millis(500),
    }
}

/// Port with nothing listening on it.
pub fn find_free_port() -> u16 {
    StdTcpListener::bind("127.0.0.1:0")
        .expect("Failed to bind to find free port")
        .local_addr()
        .expect("Failed to get local addr")
        .port()
}

struct StubState {
    pings: AtomicUsize,
    fail_first: usize,
}

/// In-process stand-in for a hosted application.
///
/// `{root}/ping` answers 503 for the first `fail_first` requests and 200
/// afterwards. Every response closes its connection so stopping the stub
/// makes further requests fail at the transport level.
pub struct StubServer {
    pub port: u16,
    state: Arc<StubState>,
    handle: JoinHandle<()>,
}

impl StubServer {
    pub async fn spawn(root: &str, fail_first: usize) -> Self {
        let state = Arc::new(StubState {
            pings: AtomicUsize::new(0),
            fail_first,
        });

        let app = Router::new()
            .route(&format!("{}/ping", root), get(ping))
            .route("/Test/Ping", get(|| async { close(Json(TestModel::new("Get Ping"))) }))
            .route("/Test/Pong", post(|| async { close(Json(TestModel::new("Post Pong"))) }))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { port, state, handle }
    }

    pub fn pings(&self) -> usize {
        self.state.pings.load(Ordering::SeqCst)
    }

    pub fn shutdown(&self) {
        self.handle.abort();
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn close(resp: impl IntoResponse) -> impl IntoResponse {
    ([(header::CONNECTION, "close")], resp)
}

async fn ping(State(state): State<Arc<StubState>>) -> impl IntoResponse {
    let n = state.pings.fetch_add(1, Ordering::SeqCst);
    if n < state.fail_first {
        close((StatusCode::SERVICE_UNAVAILABLE, "warming up".to_string()))
    } else {
        close((StatusCode::OK, String::new()))
    }
}

/// Launcher that spawns nothing and records every call into a shared log.
pub struct FakeLauncher {
    name: String,
    log: Arc<Mutex<Vec<String>>>,
    starts: AtomicUsize,
    stops: AtomicUsize,
    fail_start: bool,
    panic_on_stop: bool,
}

impl FakeLauncher {
    pub fn new(name: &str, log: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            name: name.to_string(),
            log,
            starts: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
            fail_start: false,
            panic_on_stop: false,
        }
    }

    pub fn failing_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    pub fn panicking_stop(mut self) -> Self {
        self.panic_on_stop = true;
        self
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Launcher for FakeLauncher {
    async fn start(&self, _path: &Path, _port: u16) -> HarnessResult<ProcessHandle> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        self.log.lock().push(format!("start {}", self.name));
        if self.fail_start {
            return Err(HarnessError::Startup(format!("{} cannot start", self.name)));
        }
        Ok(ProcessHandle::external(None))
    }

    async fn stop(&self, _path: &Path, _port: u16) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.log.lock().push(format!("stop {}", self.name));
        if self.panic_on_stop {
            panic!("{} refused to stop", self.name);
        }
    }
}
