//! API test runner.
//!
//! Executes suites of declarative HTTP test cases with bounded concurrency,
//! per-case timeouts and cooperative cancellation.

pub mod config;
pub mod orchestrator;
pub mod report;
pub mod suite;

pub use config::RunnerConfig;
pub use orchestrator::{CancellationToken, ExecutionOptions, Orchestrator};
pub use suite::Suite;
