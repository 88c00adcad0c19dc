//! Data model consumed and produced by the execution core.

mod assertion;
mod headers;
mod result;
mod service;
mod test_case;

pub use assertion::{Assertion, AssertionResult, Comparator, HeaderMatch};
pub use headers::Headers;
pub use result::{RequestSnapshot, ResponseSnapshot, RunStatus, TestResult, TestRun, TestStatus};
pub use service::{ApiKeyPlacement, AuthConfig, Service, TokenCacheKey};
pub use test_case::{HttpMethod, RequestBody, TestCase};
