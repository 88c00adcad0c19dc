//! Execution orchestrator.
//!
//! Runs a batch of test cases through a bounded pool of tasks and collects
//! the results into a [`TestRun`] in input order.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use uuid::Uuid;

use apitest_core::http::build_request;
use apitest_core::model::ResponseSnapshot;
use apitest_core::{
    AssertionEvaluator, Authenticator, HttpResponse, HttpTransport, RequestDecoration,
    ReqwestTransport, RunStatus, Service, TestCase, TestResult, TestRun, TransportError,
};

use crate::config::RunnerConfig;

/// Per-run execution settings.
#[derive(Debug, Clone)]
pub struct ExecutionOptions {
    /// Maximum number of cases in flight at once.
    pub concurrency_limit: usize,

    /// Timeout for cases that do not set their own.
    pub timeout_per_case: Duration,

    /// Response body bytes kept in each result.
    pub max_body_snapshot_bytes: usize,

    pub run_name: Option<String>,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self::from(&RunnerConfig::default())
    }
}

impl From<&RunnerConfig> for ExecutionOptions {
    fn from(config: &RunnerConfig) -> Self {
        Self {
            concurrency_limit: config.max_concurrent_tests,
            timeout_per_case: config.request_timeout(),
            max_body_snapshot_bytes: config.max_body_snapshot_bytes,
            run_name: None,
        }
    }
}

/// Cooperative cancellation flag shared between a run and its caller.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop dispatching new cases. In-flight cases run to completion.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Executes a single case: auth, request, assertions.
struct CaseExecutor {
    transport: Arc<dyn HttpTransport>,
    authenticator: Authenticator,
    evaluator: AssertionEvaluator,
    max_body_snapshot_bytes: usize,
}

impl CaseExecutor {
    async fn run(
        &self,
        case: TestCase,
        service: Option<Arc<Service>>,
        timeout: Duration,
        permit: OwnedSemaphorePermit,
    ) -> TestResult {
        let start = Instant::now();
        tracing::debug!(test_case_id = %case.id, name = %case.label(), "Dispatching test case");

        let Some(service) = service else {
            return TestResult::error(
                &case,
                format!("Service {} not found", case.service_id),
                elapsed_ms(start),
            );
        };

        let decoration = match &service.auth_config {
            Some(auth) => match self.authenticator.resolve(auth, Utc::now()).await {
                Ok(decoration) => decoration,
                Err(e) => {
                    tracing::warn!(test_case_id = %case.id, error = %e, "Authentication failed");
                    return TestResult::error(&case, e.to_string(), elapsed_ms(start));
                }
            },
            None => RequestDecoration::default(),
        };

        let prepared = match build_request(&service, &case, &decoration, timeout) {
            Ok(prepared) => prepared,
            Err(e) => return TestResult::error(&case, e.to_string(), elapsed_ms(start)),
        };

        let outcome = tokio::time::timeout(timeout, self.transport.send(prepared.request)).await;
        drop(permit);

        let elapsed = elapsed_ms(start);
        let response = match outcome {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                tracing::debug!(test_case_id = %case.id, error = %e, "Request failed");
                return TestResult::error(&case, e.to_string(), elapsed)
                    .with_request(prepared.snapshot);
            }
            Err(_) => {
                let e = TransportError::Timeout(timeout);
                tracing::debug!(test_case_id = %case.id, error = %e, "Request timed out");
                return TestResult::error(&case, e.to_string(), elapsed)
                    .with_request(prepared.snapshot);
            }
        };

        let assertion_results = self.evaluator.evaluate(&case.assertions, &response);
        let result = TestResult::evaluated(&case, assertion_results, elapsed)
            .with_request(prepared.snapshot)
            .with_response(response_snapshot(&response, self.max_body_snapshot_bytes));

        tracing::debug!(
            test_case_id = %case.id,
            status = %result.status,
            elapsed_ms = elapsed,
            "Test case finished"
        );
        result
    }
}

/// Drives test runs.
///
/// Cloning is cheap; clones share the transport and the token cache.
#[derive(Clone)]
pub struct Orchestrator {
    transport: Arc<dyn HttpTransport>,
    authenticator: Authenticator,
}

impl Orchestrator {
    pub fn new(transport: Arc<dyn HttpTransport>, authenticator: Authenticator) -> Self {
        Self {
            transport,
            authenticator,
        }
    }

    /// Build an orchestrator with a reqwest transport configured from `config`.
    pub fn from_config(config: &RunnerConfig) -> Result<Self, TransportError> {
        let transport = ReqwestTransport::new(config.follow_redirects, &config.user_agent)?;
        let authenticator = Authenticator::new(transport.client().clone())
            .with_safety_margin(config.oauth2_safety_margin_secs)
            .with_token_timeout(config.request_timeout());
        Ok(Self::new(Arc::new(transport), authenticator))
    }

    pub fn authenticator(&self) -> &Authenticator {
        &self.authenticator
    }

    /// Execute `test_cases` against `services`.
    ///
    /// Always returns a run report. Per-case failures are recorded in the
    /// results; the run itself fails only when `options` make progress
    /// impossible. Once `cancel` is set no further cases are dispatched.
    pub async fn execute(
        &self,
        services: &[Service],
        test_cases: &[TestCase],
        options: &ExecutionOptions,
        cancel: &CancellationToken,
    ) -> TestRun {
        let mut run = TestRun::new(options.run_name.clone(), test_cases.len());
        run.start();

        if options.concurrency_limit == 0 {
            run.fail("Concurrency limit must be at least 1");
            tracing::error!(run_id = %run.id, "Run failed: concurrency limit is zero");
            return run;
        }
        if options.timeout_per_case.is_zero() {
            run.fail("Per-case timeout must be greater than zero");
            tracing::error!(run_id = %run.id, "Run failed: timeout is zero");
            return run;
        }

        tracing::info!(
            run_id = %run.id,
            total = test_cases.len(),
            concurrency = options.concurrency_limit,
            "Starting test run"
        );

        let services: HashMap<Uuid, Arc<Service>> = services
            .iter()
            .map(|s| (s.id, Arc::new(s.clone())))
            .collect();

        let executor = Arc::new(CaseExecutor {
            transport: Arc::clone(&self.transport),
            authenticator: self.authenticator.clone(),
            evaluator: AssertionEvaluator::new(),
            max_body_snapshot_bytes: options.max_body_snapshot_bytes,
        });
        let semaphore = Arc::new(Semaphore::new(options.concurrency_limit));

        // Cases are dispatched strictly in input order, so the handles form a
        // prefix of `test_cases` and joining them in order keeps result order.
        let mut handles = Vec::with_capacity(test_cases.len());

        for case in test_cases {
            if cancel.is_cancelled() {
                break;
            }

            let permit = match Arc::clone(&semaphore).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };

            // A slot may have taken a while to free up.
            if cancel.is_cancelled() {
                break;
            }

            let case = case.clone();
            let service = services.get(&case.service_id).cloned();
            let timeout = case
                .timeout_seconds
                .map(Duration::from_secs)
                .unwrap_or(options.timeout_per_case);
            let executor = Arc::clone(&executor);

            handles.push(tokio::spawn(async move {
                executor.run(case, service, timeout, permit).await
            }));
        }

        let mut results = Vec::with_capacity(handles.len());
        for (handle, case) in handles.into_iter().zip(test_cases) {
            match handle.await {
                Ok(result) => results.push(result),
                Err(e) => {
                    tracing::error!(test_case_id = %case.id, error = %e, "Test case task failed");
                    results.push(TestResult::error(case, format!("Test case task failed: {}", e), 0));
                }
            }
        }

        // A cancel that lands after the last dispatch still marks the run.
        let status = if cancel.is_cancelled() {
            RunStatus::Cancelled
        } else {
            RunStatus::Completed
        };
        run.finish(status, results);

        tracing::info!(
            run_id = %run.id,
            status = %run.status,
            passed = run.passed,
            failed = run.failed,
            skipped = run.skipped,
            duration_ms = run.duration_ms().unwrap_or_default(),
            "Test run finished"
        );
        run
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

fn response_snapshot(response: &HttpResponse, max_bytes: usize) -> ResponseSnapshot {
    let text = response.body_text();
    let (body, body_truncated) = truncate_utf8(&text, max_bytes);
    ResponseSnapshot {
        status: response.status,
        headers: response.headers.clone(),
        body: body.to_string(),
        body_truncated,
    }
}

/// Longest prefix of `s` that fits in `max_bytes` without splitting a char.
fn truncate_utf8(s: &str, max_bytes: usize) -> (&str, bool) {
    if s.len() <= max_bytes {
        return (s, false);
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    (&s[..end], true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_utf8() {
        assert_eq!(truncate_utf8("hello", 10), ("hello", false));
        assert_eq!(truncate_utf8("hello", 3), ("hel", true));
        // 'é' is two bytes; never split it.
        assert_eq!(truncate_utf8("héllo", 2), ("h", true));
        assert_eq!(truncate_utf8("", 0), ("", false));
    }

    #[test]
    fn test_cancellation_token_shared() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_options_from_config() {
        let config = RunnerConfig {
            max_concurrent_tests: 4,
            default_request_timeout: 5,
            ..Default::default()
        };
        let options = ExecutionOptions::from(&config);
        assert_eq!(options.concurrency_limit, 4);
        assert_eq!(options.timeout_per_case, Duration::from_secs(5));
        assert_eq!(options.max_body_snapshot_bytes, 4096);
    }
}
