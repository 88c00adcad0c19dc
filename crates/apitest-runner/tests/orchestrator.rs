//! Orchestrator behavior against fake and real transports.

use async_trait::async_trait;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use axum::Router;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use apitest_core::{
    Assertion, AuthConfig, Authenticator, Headers, HttpMethod, HttpResponse, HttpTransport,
    OutboundRequest, ReqwestTransport, RunStatus, Service, TestCase, TestStatus, TransportError,
};
use apitest_runner::{CancellationToken, ExecutionOptions, Orchestrator};

/// Sleeps for the number of milliseconds in the last path segment and
/// records how many requests were in flight at once.
#[derive(Default)]
struct FakeTransport {
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: AtomicUsize,
    cancel_on_call: Option<(usize, CancellationToken)>,
}

impl FakeTransport {
    fn cancelling_on(call: usize, token: CancellationToken) -> Self {
        Self {
            cancel_on_call: Some((call, token)),
            ..Default::default()
        }
    }
}

#[async_trait]
impl HttpTransport for FakeTransport {
    async fn send(&self, request: OutboundRequest) -> Result<HttpResponse, TransportError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((at, token)) = &self.cancel_on_call {
            if call == *at {
                token.cancel();
            }
        }

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let last = request.url.rsplit('/').next().unwrap_or_default();
        if last == "panic" {
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            panic!("transport exploded");
        }
        let delay = Duration::from_millis(last.parse().unwrap_or(10));
        tokio::time::sleep(delay).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(HttpResponse::new(200, Headers::new(), b"{\"ok\":true}".to_vec(), delay))
    }
}

fn orchestrator(transport: Arc<dyn HttpTransport>) -> Orchestrator {
    Orchestrator::new(transport, Authenticator::new(reqwest::Client::new()))
}

fn options(concurrency_limit: usize, timeout: Duration) -> ExecutionOptions {
    ExecutionOptions {
        concurrency_limit,
        timeout_per_case: timeout,
        ..Default::default()
    }
}

fn case(service: &Service, path: &str) -> TestCase {
    TestCase::new(service.id, HttpMethod::GET, path).with_assertion(Assertion::status_code(200))
}

#[tokio::test]
async fn test_concurrency_bound_and_input_order() {
    let transport = Arc::new(FakeTransport::default());
    let service = Service::new("fake", "http://fake.test");
    let cases: Vec<TestCase> = (0..12)
        .map(|i| case(&service, &format!("/delay/{}", 60 - i * 4)))
        .collect();

    let run = orchestrator(transport.clone())
        .execute(
            &[service],
            &cases,
            &options(3, Duration::from_secs(5)),
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.results.len(), 12);
    assert_eq!(run.passed, 12);
    let ids: Vec<_> = run.results.iter().map(|r| r.test_case_id).collect();
    let expected: Vec<_> = cases.iter().map(|c| c.id).collect();
    assert_eq!(ids, expected);

    let max = transport.max_in_flight.load(Ordering::SeqCst);
    assert!(max <= 3, "saw {} requests in flight", max);
    assert!(max >= 2);
}

#[tokio::test]
async fn test_timeout_yields_error_and_run_completes() {
    let transport = Arc::new(FakeTransport::default());
    let service = Service::new("fake", "http://fake.test");
    let cases = vec![case(&service, "/hang/10000"), case(&service, "/fast/5")];

    let start = Instant::now();
    let run = orchestrator(transport)
        .execute(
            &[service],
            &cases,
            &options(2, Duration::from_millis(100)),
            &CancellationToken::new(),
        )
        .await;

    assert!(start.elapsed() < Duration::from_secs(5));
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.results[0].status, TestStatus::Error);
    assert!(run.results[0].assertion_results.is_empty());
    let message = run.results[0].error_message.as_deref().unwrap_or_default();
    assert!(message.contains("timed out"), "{}", message);
    assert!(run.results[0].request_snapshot.is_some());
    assert_eq!(run.results[1].status, TestStatus::Passed);
}

#[tokio::test]
async fn test_per_case_timeout_overrides_default() {
    let transport = Arc::new(FakeTransport::default());
    let service = Service::new("fake", "http://fake.test");
    let cases = vec![case(&service, "/slow/300").with_timeout(2)];

    let run = orchestrator(transport)
        .execute(
            &[service],
            &cases,
            &options(1, Duration::from_millis(50)),
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(run.results[0].status, TestStatus::Passed);
}

#[tokio::test]
async fn test_cancellation_stops_dispatch() {
    let cancel = CancellationToken::new();
    let concurrency = 2;
    let dispatched_at_cancel = 3;
    let transport = Arc::new(FakeTransport::cancelling_on(dispatched_at_cancel, cancel.clone()));
    let service = Service::new("fake", "http://fake.test");
    let cases: Vec<TestCase> = (0..20).map(|_| case(&service, "/delay/30")).collect();

    let run = orchestrator(transport)
        .execute(
            &[service],
            &cases,
            &options(concurrency, Duration::from_secs(5)),
            &cancel,
        )
        .await;

    assert_eq!(run.status, RunStatus::Cancelled);
    assert!(run.results.len() >= dispatched_at_cancel);
    assert!(run.results.len() <= dispatched_at_cancel + concurrency);
    assert_eq!(run.skipped, 20 - run.results.len());
    assert!(run.results.iter().all(|r| r.status == TestStatus::Passed));
}

#[tokio::test]
async fn test_cancel_after_last_dispatch_marks_run_cancelled() {
    let cancel = CancellationToken::new();
    let transport = Arc::new(FakeTransport::cancelling_on(2, cancel.clone()));
    let service = Service::new("fake", "http://fake.test");
    let cases = vec![case(&service, "/a/20"), case(&service, "/b/20")];

    let run = orchestrator(transport)
        .execute(&[service], &cases, &options(2, Duration::from_secs(5)), &cancel)
        .await;

    assert_eq!(run.status, RunStatus::Cancelled);
    assert_eq!(run.results.len(), 2);
    assert_eq!(run.skipped, 0);
    assert!(run.results.iter().all(|r| r.status == TestStatus::Passed));
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let cancel = CancellationToken::new();
    cancel.cancel();
    let service = Service::new("fake", "http://fake.test");
    let cases = vec![case(&service, "/a/1")];

    let run = orchestrator(Arc::new(FakeTransport::default()))
        .execute(&[service], &cases, &options(1, Duration::from_secs(1)), &cancel)
        .await;

    assert_eq!(run.status, RunStatus::Cancelled);
    assert!(run.results.is_empty());
    assert_eq!(run.skipped, 1);
}

#[tokio::test]
async fn test_invalid_options_fail_run() {
    let service = Service::new("fake", "http://fake.test");
    let cases = vec![case(&service, "/a/1")];
    let orchestrator = orchestrator(Arc::new(FakeTransport::default()));

    let run = orchestrator
        .execute(
            &[service.clone()],
            &cases,
            &options(0, Duration::from_secs(1)),
            &CancellationToken::new(),
        )
        .await;
    assert_eq!(run.status, RunStatus::Failed);
    assert!(run.error_message.is_some());

    let run = orchestrator
        .execute(&[service], &cases, &options(1, Duration::ZERO), &CancellationToken::new())
        .await;
    assert_eq!(run.status, RunStatus::Failed);
}

#[tokio::test]
async fn test_auth_error_does_not_abort_run() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let closed = listener.local_addr().unwrap();
    drop(listener);

    let oauth = Service::new("oauth", "http://fake.test").with_auth(AuthConfig::OAuth2 {
        client_id: "client".to_string(),
        client_secret: "secret".to_string(),
        token_url: format!("http://{}/token", closed),
        scope: None,
        extra: Default::default(),
    });
    let plain = Service::new("plain", "http://fake.test");
    let cases = vec![case(&oauth, "/a/1"), case(&plain, "/b/1")];

    let run = orchestrator(Arc::new(FakeTransport::default()))
        .execute(
            &[oauth, plain],
            &cases,
            &options(2, Duration::from_secs(5)),
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.results[0].status, TestStatus::Error);
    assert!(run.results[0]
        .error_message
        .as_deref()
        .unwrap_or_default()
        .contains("token"));
    assert_eq!(run.results[1].status, TestStatus::Passed);
    assert_eq!(run.failed, 1);
    assert_eq!(run.errored, 1);
}

#[tokio::test]
async fn test_unknown_service_and_panicking_case_are_errors() {
    let service = Service::new("fake", "http://fake.test");
    let orphan = TestCase::new(uuid::Uuid::new_v4(), HttpMethod::GET, "/x/1");
    let cases = vec![orphan, case(&service, "/boom/panic"), case(&service, "/ok/1")];

    let run = orchestrator(Arc::new(FakeTransport::default()))
        .execute(
            &[service],
            &cases,
            &options(1, Duration::from_secs(5)),
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.results.len(), 3);
    assert_eq!(run.results[0].status, TestStatus::Error);
    assert!(run.results[0].error_message.as_deref().unwrap_or_default().contains("not found"));
    assert_eq!(run.results[1].status, TestStatus::Error);
    assert_eq!(run.results[1].test_case_id, cases[1].id);
    assert_eq!(run.results[2].status, TestStatus::Passed);
}

async fn ping(headers: HeaderMap) -> (StatusCode, &'static str) {
    match headers.get("authorization").and_then(|v| v.to_str().ok()) {
        Some("Bearer s3cret") => (StatusCode::OK, "{\"pong\":true}"),
        _ => (StatusCode::UNAUTHORIZED, "{}"),
    }
}

#[tokio::test]
async fn test_end_to_end_bearer() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, Router::new().route("/ping", get(ping)))
            .await
            .unwrap();
    });

    let service = Service::new("ping", format!("http://{}", addr)).with_auth(AuthConfig::Bearer {
        token: "s3cret".to_string(),
    });
    let cases = vec![case(&service, "/ping")];

    let transport = ReqwestTransport::new(true, "apitest-test").unwrap();
    let orchestrator = Orchestrator::new(
        Arc::new(transport.clone()),
        Authenticator::new(transport.client().clone()),
    );

    let run = orchestrator
        .execute(
            &[service],
            &cases,
            &options(1, Duration::from_secs(5)),
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(run.status, RunStatus::Completed);
    let result = &run.results[0];
    assert_eq!(result.status, TestStatus::Passed);
    assert_eq!(result.assertion_results.len(), 1);
    assert!(result.assertion_results[0].passed);

    let request = result.request_snapshot.as_ref().unwrap();
    assert!(!request.headers.get("Authorization").unwrap_or_default().contains("s3cret"));
    let response = result.response_snapshot.as_ref().unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.body, "{\"pong\":true}");
    assert!(run.all_passed());
}
