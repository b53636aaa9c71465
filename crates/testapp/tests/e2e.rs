//! End-to-end: real application processes driven by the harness fixture

#![cfg(unix)]

use std::net::TcpListener;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use webcompat_harness::{
    catalogue, run_cases, CompatClient, Fixture, FrameworkTarget, HarnessError, HostKind,
    ProbeConfig, ProcessLauncher, TestModel,
};

fn find_free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .expect("Failed to bind to find free port")
        .local_addr()
        .expect("Failed to get local addr")
        .port()
}

fn testapp_host(root: &str, warmup: usize) -> HostKind {
    HostKind::Command {
        program: PathBuf::from(env!("CARGO_BIN_EXE_webcompat-testapp")),
        args: vec![
            "--path".into(),
            "{path}".into(),
            "--port".into(),
            "{port}".into(),
            "--root".into(),
            root.into(),
            "--warmup-requests".into(),
            warmup.to_string(),
        ],
    }
}

fn probe() -> ProbeConfig {
    ProbeConfig {
        max_attempts: 15,
        interval: Duration::from_millis(200),
        request_timeout: Duration::from_secs(2),
    }
}

async fn port_closed(port: u16) -> bool {
    for _ in 0..50 {
        if tokio::net::TcpStream::connect(("127.0.0.1", port)).await.is_err() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    false
}

#[tokio::test]
async fn legacy_and_modern_targets_pass_the_catalogue() {
    let legacy_dir = tempfile::TempDir::new().unwrap();
    let modern_dir = tempfile::TempDir::new().unwrap();

    let legacy = FrameworkTarget::new(
        "Asp.Net",
        testapp_host("/AspNetTest", 0),
        legacy_dir.path(),
        find_free_port(),
        "/AspNetTest",
    );
    let modern = FrameworkTarget::new(
        "Asp.Net.Core",
        testapp_host("", 2),
        modern_dir.path(),
        find_free_port(),
        "",
    );
    let ports = [legacy.port, modern.port];

    let mut fixture = Fixture::builder()
        .probe(probe())
        .target(legacy.clone(), Arc::new(ProcessLauncher::new(legacy.host.clone())))
        .target(modern.clone(), Arc::new(ProcessLauncher::new(modern.host.clone())))
        .start()
        .await
        .unwrap();

    assert!(fixture.all_ready());
    assert_eq!(fixture.status()[1].launches, 1, "warm-up fits in one probe loop");

    let client = CompatClient::new().unwrap();
    let report = run_cases(&fixture, &client, &catalogue()).await;
    assert_eq!(report.total, 4);
    assert!(report.success(), "{:?}", report.results);

    let body = reqwest::get(format!("http://localhost:{}/Test/Ping", legacy.port))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, r#"{"Name":"Get Ping","Age":1,"Description":null}"#);

    let hello: TestModel = reqwest::get(format!(
        "http://localhost:{}/TestArea/AreaTest/Hello",
        modern.port
    ))
    .await
    .unwrap()
    .json()
    .await
    .unwrap();
    assert_eq!(hello, TestModel::new("AreaTest.Hello"));

    fixture.shutdown().await;
    for port in ports {
        assert!(port_closed(port).await, "port {} still accepting connections", port);
    }
}

#[tokio::test]
async fn missing_deploy_path_aborts_startup() {
    let target = FrameworkTarget::new(
        "Asp.Net",
        testapp_host("", 0),
        "/nonexistent/webcompat/deploy",
        find_free_port(),
        "",
    );

    let result = Fixture::builder()
        .probe(probe())
        .target(target.clone(), Arc::new(ProcessLauncher::new(target.host.clone())))
        .start()
        .await;

    assert!(matches!(result, Err(HarnessError::Startup(_))));
}
