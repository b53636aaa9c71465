mod common;

use std::time::{Duration, Instant};

use common::{fast_probe, find_free_port, StubServer};
use webcompat_harness::{HarnessError, HealthProber, ProbeConfig, ProbeOutcome};

#[tokio::test]
async fn succeeds_on_attempt_k_without_further_attempts() {
    let stub = StubServer::spawn("/AspNetTest", 2).await;
    let prober = HealthProber::new(fast_probe(15)).unwrap();

    let url = format!("http://localhost:{}/AspNetTest/ping", stub.port);
    assert!(prober.wait_for_ready(&url).await.unwrap());
    assert_eq!(stub.pings(), 3);
}

#[tokio::test]
async fn exhausted_with_error_responses_is_not_ready() {
    let stub = StubServer::spawn("", usize::MAX).await;
    let prober = HealthProber::new(fast_probe(4)).unwrap();

    let url = format!("http://localhost:{}/ping", stub.port);
    assert!(!prober.wait_for_ready(&url).await.unwrap());
    assert_eq!(stub.pings(), 4);
}

#[tokio::test]
async fn never_reachable_returns_transport_error() {
    let prober = HealthProber::new(fast_probe(3)).unwrap();
    let url = format!("http://127.0.0.1:{}/ping", find_free_port());

    match prober.wait_for_ready(&url).await {
        Err(HarnessError::Probe { url: failed, .. }) => assert_eq!(failed, url),
        other => panic!("expected probe error, got {:?}", other),
    }
}

#[tokio::test]
async fn transport_error_after_a_response_is_not_ready() {
    let stub = StubServer::spawn("", usize::MAX).await;
    let prober = HealthProber::new(ProbeConfig {
        max_attempts: 8,
        interval: Duration::from_millis(50),
        request_timeout: Duration::from_millis(500),
    })
    .unwrap();
    let url = format!("http://127.0.0.1:{}/ping", stub.port);

    let task = tokio::spawn({
        let prober = prober.clone();
        let url = url.clone();
        async move { prober.wait_for_ready(&url).await }
    });

    while stub.pings() == 0 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    stub.shutdown();

    // The last attempt fails to connect, but an earlier one got a 503
    assert!(!task.await.unwrap().unwrap());
}

#[tokio::test]
async fn probe_loop_is_bounded() {
    let config = fast_probe(5);
    let prober = HealthProber::new(config).unwrap();
    let url = format!("http://127.0.0.1:{}/ping", find_free_port());

    let start = Instant::now();
    let _ = prober.wait_for_ready(&url).await;
    assert!(start.elapsed() <= config.worst_case());
}

#[tokio::test]
async fn probe_once_reports_rejection_body() {
    let stub = StubServer::spawn("", 1).await;
    let prober = HealthProber::new(fast_probe(1)).unwrap();
    let url = format!("http://127.0.0.1:{}/ping", stub.port);

    match prober.probe_once(&url).await {
        ProbeOutcome::Rejected { status, body } => {
            assert_eq!(status.as_u16(), 503);
            assert_eq!(body, "warming up");
        }
        other => panic!("expected rejection, got {:?}", other),
    }
    assert!(matches!(prober.probe_once(&url).await, ProbeOutcome::Ready));
}
