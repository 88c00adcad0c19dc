//! Test result and run report types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{AssertionResult, Headers, TestCase};

/// Status of a single test case execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    /// Response received and every assertion passed.
    Passed,
    /// Response received and at least one assertion failed.
    Failed,
    /// No response could be evaluated (auth, transport or timeout failure).
    Error,
}

impl TestStatus {
    pub fn is_passed(&self) -> bool {
        matches!(self, TestStatus::Passed)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, TestStatus::Error)
    }
}

impl std::fmt::Display for TestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TestStatus::Passed => write!(f, "passed"),
            TestStatus::Failed => write!(f, "failed"),
            TestStatus::Error => write!(f, "error"),
        }
    }
}

/// What was sent. Auth-derived values are redacted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestSnapshot {
    pub method: String,
    pub url: String,
    pub headers: Headers,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

/// What came back, with the body truncated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseSnapshot {
    pub status: u16,
    pub headers: Headers,
    pub body: String,
    #[serde(default)]
    pub body_truncated: bool,
}

/// Result of executing one test case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub test_case_id: Uuid,

    #[serde(default)]
    pub test_name: String,

    pub status: TestStatus,

    /// Wall time spent on the case, whatever the outcome.
    pub response_time_ms: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_snapshot: Option<RequestSnapshot>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_snapshot: Option<ResponseSnapshot>,

    /// One entry per assertion, in assertion order.
    #[serde(default)]
    pub assertion_results: Vec<AssertionResult>,

    /// Set only when status is `error`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl TestResult {
    /// Result for a case that could not be evaluated.
    pub fn error(case: &TestCase, message: impl Into<String>, elapsed_ms: u64) -> Self {
        Self {
            test_case_id: case.id,
            test_name: case.label(),
            status: TestStatus::Error,
            response_time_ms: elapsed_ms,
            request_snapshot: None,
            response_snapshot: None,
            assertion_results: Vec::new(),
            error_message: Some(message.into()),
        }
    }

    /// Result for a case whose response was evaluated.
    pub fn evaluated(
        case: &TestCase,
        assertion_results: Vec<AssertionResult>,
        elapsed_ms: u64,
    ) -> Self {
        let status = if assertion_results.iter().all(|r| r.passed) {
            TestStatus::Passed
        } else {
            TestStatus::Failed
        };

        Self {
            test_case_id: case.id,
            test_name: case.label(),
            status,
            response_time_ms: elapsed_ms,
            request_snapshot: None,
            response_snapshot: None,
            assertion_results,
            error_message: None,
        }
    }

    pub fn with_request(mut self, snapshot: RequestSnapshot) -> Self {
        self.request_snapshot = Some(snapshot);
        self
    }

    pub fn with_response(mut self, snapshot: ResponseSnapshot) -> Self {
        self.response_snapshot = Some(snapshot);
        self
    }

    pub fn is_passed(&self) -> bool {
        self.status.is_passed()
    }
}

/// Lifecycle state of a test run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Completed | RunStatus::Failed | RunStatus::Cancelled
        )
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Pending => write!(f, "pending"),
            RunStatus::Running => write!(f, "running"),
            RunStatus::Completed => write!(f, "completed"),
            RunStatus::Failed => write!(f, "failed"),
            RunStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// One execution of a batch of test cases.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestRun {
    pub id: Uuid,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    pub status: RunStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    /// Results in test case input order.
    #[serde(default)]
    pub results: Vec<TestResult>,

    /// Number of test cases requested.
    pub total: usize,
    pub passed: usize,
    /// Cases that did not pass, including errored ones.
    pub failed: usize,
    pub errored: usize,
    /// Cases never dispatched because the run was cancelled.
    pub skipped: usize,

    /// Reason for a run-level failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl TestRun {
    /// Create a pending run for `total` test cases.
    pub fn new(name: Option<String>, total: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            status: RunStatus::Pending,
            started_at: None,
            completed_at: None,
            results: Vec::new(),
            total,
            passed: 0,
            failed: 0,
            errored: 0,
            skipped: 0,
            error_message: None,
        }
    }

    /// Transition `pending -> running`.
    pub fn start(&mut self) {
        if self.status == RunStatus::Pending {
            self.status = RunStatus::Running;
            self.started_at = Some(Utc::now());
        }
    }

    /// Record results and move to a terminal status.
    pub fn finish(&mut self, status: RunStatus, results: Vec<TestResult>) {
        debug_assert!(status.is_terminal());
        self.results = results;
        self.recount();
        self.status = status;
        self.completed_at = Some(Utc::now());
    }

    /// Move to `failed` because the run could not make progress.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.error_message = Some(message.into());
        self.finish(RunStatus::Failed, Vec::new());
    }

    fn recount(&mut self) {
        self.passed = self.results.iter().filter(|r| r.is_passed()).count();
        self.errored = self
            .results
            .iter()
            .filter(|r| r.status.is_error())
            .count();
        self.failed = self.results.len() - self.passed;
        self.skipped = self.total.saturating_sub(self.results.len());
    }

    /// Duration between start and completion in milliseconds.
    pub fn duration_ms(&self) -> Option<i64> {
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds()),
            _ => None,
        }
    }

    pub fn all_passed(&self) -> bool {
        self.status == RunStatus::Completed && self.passed == self.total
    }
}
