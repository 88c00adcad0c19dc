//! Plain-text run reports.

use std::fmt::Write;

use apitest_core::{TestRun, TestStatus};

/// Render `run` as a human-readable report.
pub fn render_text(run: &TestRun) -> String {
    let mut out = String::new();

    let title = run.name.as_deref().unwrap_or("Test run");
    let _ = writeln!(out, "{} {} [{}]", title, run.id, run.status);

    for result in &run.results {
        let tag = match result.status {
            TestStatus::Passed => "PASS",
            TestStatus::Failed => "FAIL",
            TestStatus::Error => "ERROR",
        };
        let _ = writeln!(
            out,
            "  {:<5} {} ({} ms)",
            tag, result.test_name, result.response_time_ms
        );

        if let Some(message) = &result.error_message {
            let _ = writeln!(out, "        {}", message);
        }
        for assertion in result.assertion_results.iter().filter(|a| !a.passed) {
            let _ = writeln!(out, "        - {}: {}", assertion.assertion.kind(), assertion.message);
        }
    }

    if let Some(message) = &run.error_message {
        let _ = writeln!(out, "Run failed: {}", message);
    }

    let _ = write!(
        out,
        "{} total, {} passed, {} failed ({} errors), {} skipped",
        run.total, run.passed, run.failed, run.errored, run.skipped
    );
    if let Some(ms) = run.duration_ms() {
        let _ = write!(out, " in {} ms", ms);
    }
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use apitest_core::{Assertion, AssertionResult, HttpMethod, RunStatus, TestCase, TestResult};
    use uuid::Uuid;

    #[test]
    fn test_render_text() {
        let service_id = Uuid::new_v4();
        let ok = TestCase::new(service_id, HttpMethod::GET, "/ok").with_name("ok case");
        let bad = TestCase::new(service_id, HttpMethod::GET, "/bad");
        let broken = TestCase::new(service_id, HttpMethod::GET, "/down");

        let status = Assertion::status_code(200);
        let results = vec![
            TestResult::evaluated(&ok, vec![AssertionResult::pass(&status, None, "status is 200")], 12),
            TestResult::evaluated(
                &bad,
                vec![AssertionResult::fail(&status, None, "expected status 200, got 500")],
                8,
            ),
            TestResult::error(&broken, "connection refused", 3),
        ];

        let mut run = TestRun::new(Some("smoke".to_string()), 4);
        run.start();
        run.finish(RunStatus::Cancelled, results);

        let text = render_text(&run);
        assert!(text.starts_with("smoke "));
        assert!(text.contains("[cancelled]"));
        assert!(text.contains("PASS  ok case (12 ms)"));
        assert!(text.contains("FAIL  GET /bad"));
        assert!(text.contains("- status_code: expected status 200, got 500"));
        assert!(text.contains("ERROR GET /down"));
        assert!(text.contains("connection refused"));
        assert!(text.contains("4 total, 1 passed, 2 failed (1 errors), 1 skipped"));
    }
}
