//! API test execution core.
//!
//! This crate provides:
//! - Data model for services, test cases, assertions and run reports
//! - Authentication resolver (bearer, API key, basic, OAuth2 client credentials)
//! - Assertion evaluator and assertion generator
//! - Curl command importer
//! - HTTP transport abstraction with a reqwest implementation

pub mod assertions;
pub mod auth;
pub mod curl;
pub mod error;
pub mod http;
pub mod model;

pub use assertions::{AssertionEvaluator, AssertionGenerator, CapturedResponse, GeneratorConfig};
pub use auth::{Authenticator, RequestDecoration, TokenCache};
pub use curl::{RequestSpec, RequestType};
pub use error::{AuthError, AuthErrorReason, CoreError, ParseError, TransportError};
pub use http::{HttpResponse, HttpTransport, OutboundRequest, ReqwestTransport};
pub use model::{
    Assertion, AssertionResult, AuthConfig, Comparator, HeaderMatch, Headers, HttpMethod,
    RequestBody, RunStatus, Service, TestCase, TestResult, TestRun, TestStatus,
};
