//! Assertion kinds and their evaluation results.

use serde::{Deserialize, Serialize};

/// How a header value is compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum HeaderMatch {
    #[default]
    Exact,
    Contains,
    Regex,
}

/// Comparator applied to the value found at a JSON path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Comparator {
    /// Equal to the expected value.
    #[default]
    Eq,
    /// Not equal to the expected value.
    Ne,
    /// Numerically greater than the expected value.
    Gt,
    /// Numerically less than the expected value.
    Lt,
    /// Path is present.
    Exists,
    /// Value has the JSON type named by the expected value.
    Type,
}

impl std::fmt::Display for Comparator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Comparator::Eq => "eq",
            Comparator::Ne => "ne",
            Comparator::Gt => "gt",
            Comparator::Lt => "lt",
            Comparator::Exists => "exists",
            Comparator::Type => "type",
        };
        f.write_str(s)
    }
}

/// A single declarative check against a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Assertion {
    /// Response status equals `expected`.
    StatusCode { expected: u16 },

    /// Response header `name` matches `expected`.
    Header {
        name: String,
        expected: String,
        #[serde(default, rename = "match")]
        mode: HeaderMatch,
    },

    /// Value at `path` in the JSON body satisfies `comparator`.
    JsonPath {
        path: String,
        #[serde(default)]
        comparator: Comparator,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        expected: Option<serde_json::Value>,
    },

    /// Response arrived within `max_ms` milliseconds.
    ResponseTimeMax { max_ms: u64 },

    /// Raw body contains `substring`.
    BodyContains { substring: String },
}

impl Assertion {
    pub fn status_code(expected: u16) -> Self {
        Assertion::StatusCode { expected }
    }

    pub fn header(name: impl Into<String>, expected: impl Into<String>, mode: HeaderMatch) -> Self {
        Assertion::Header {
            name: name.into(),
            expected: expected.into(),
            mode,
        }
    }

    pub fn json_path(
        path: impl Into<String>,
        comparator: Comparator,
        expected: Option<serde_json::Value>,
    ) -> Self {
        Assertion::JsonPath {
            path: path.into(),
            comparator,
            expected,
        }
    }

    /// Kind tag as used in serialized assertions.
    pub fn kind(&self) -> &'static str {
        match self {
            Assertion::StatusCode { .. } => "status_code",
            Assertion::Header { .. } => "header",
            Assertion::JsonPath { .. } => "json_path",
            Assertion::ResponseTimeMax { .. } => "response_time_max",
            Assertion::BodyContains { .. } => "body_contains",
        }
    }

    /// Path or header name the assertion targets, if any.
    pub fn target(&self) -> Option<&str> {
        match self {
            Assertion::Header { name, .. } => Some(name),
            Assertion::JsonPath { path, .. } => Some(path),
            _ => None,
        }
    }

    /// Identity used to de-duplicate generated assertions.
    pub fn dedup_key(&self) -> (&'static str, String) {
        let target = match self {
            Assertion::Header { name, .. } => name.to_ascii_lowercase(),
            Assertion::BodyContains { substring } => substring.clone(),
            other => other.target().unwrap_or_default().to_string(),
        };
        (self.kind(), target)
    }
}

/// Outcome of one assertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssertionResult {
    /// The assertion that was evaluated.
    pub assertion: Assertion,

    pub passed: bool,

    /// Expected vs actual description.
    pub message: String,

    /// Observed value, when one was found.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual: Option<serde_json::Value>,
}

impl AssertionResult {
    pub fn pass(
        assertion: &Assertion,
        actual: Option<serde_json::Value>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            assertion: assertion.clone(),
            passed: true,
            message: message.into(),
            actual,
        }
    }

    pub fn fail(
        assertion: &Assertion,
        actual: Option<serde_json::Value>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            assertion: assertion.clone(),
            passed: false,
            message: message.into(),
            actual,
        }
    }
}
