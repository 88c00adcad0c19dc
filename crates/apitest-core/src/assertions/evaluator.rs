//! Evaluates assertions against a received response.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

use super::path::{parse_path, resolve_path};
use crate::http::HttpResponse;
use crate::model::{Assertion, AssertionResult, Comparator, HeaderMatch, Headers};

/// Stateless evaluator for the closed set of assertion kinds.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssertionEvaluator;

impl AssertionEvaluator {
    pub fn new() -> Self {
        Self
    }

    /// One result per assertion, in input order. A failing assertion never
    /// prevents the rest from being evaluated.
    pub fn evaluate(&self, assertions: &[Assertion], response: &HttpResponse) -> Vec<AssertionResult> {
        let body = LazyBody::new(response);
        assertions
            .iter()
            .map(|assertion| self.evaluate_one(assertion, response, &body))
            .collect()
    }

    fn evaluate_one(
        &self,
        assertion: &Assertion,
        response: &HttpResponse,
        body: &LazyBody<'_>,
    ) -> AssertionResult {
        match assertion {
            Assertion::StatusCode { expected } => {
                let actual = Some(Value::from(response.status));
                if response.status == *expected {
                    AssertionResult::pass(assertion, actual, format!("status is {}", expected))
                } else {
                    AssertionResult::fail(
                        assertion,
                        actual,
                        format!("expected status {}, got {}", expected, response.status),
                    )
                }
            }

            Assertion::Header {
                name,
                expected,
                mode,
            } => check_header(assertion, &response.headers, name, expected, *mode),

            Assertion::JsonPath {
                path,
                comparator,
                expected,
            } => match body.json() {
                Some(doc) => check_json_path(assertion, doc, path, *comparator, expected.as_ref()),
                None => AssertionResult::fail(assertion, None, "response not valid JSON"),
            },

            Assertion::ResponseTimeMax { max_ms } => {
                let elapsed = response.elapsed_ms();
                let actual = Some(Value::from(elapsed));
                if elapsed <= *max_ms {
                    AssertionResult::pass(
                        assertion,
                        actual,
                        format!("responded in {} ms (limit {} ms)", elapsed, max_ms),
                    )
                } else {
                    AssertionResult::fail(
                        assertion,
                        actual,
                        format!("expected response within {} ms, took {} ms", max_ms, elapsed),
                    )
                }
            }

            Assertion::BodyContains { substring } => {
                if response.body_text().contains(substring.as_str()) {
                    AssertionResult::pass(assertion, None, format!("body contains '{}'", substring))
                } else {
                    AssertionResult::fail(
                        assertion,
                        None,
                        format!("body does not contain '{}'", substring),
                    )
                }
            }
        }
    }
}

/// Response body parsed as JSON at most once, on first use.
struct LazyBody<'a> {
    response: &'a HttpResponse,
    parsed: OnceLock<Option<Value>>,
}

impl<'a> LazyBody<'a> {
    fn new(response: &'a HttpResponse) -> Self {
        Self {
            response,
            parsed: OnceLock::new(),
        }
    }

    fn json(&self) -> Option<&Value> {
        self.parsed
            .get_or_init(|| self.response.json().ok())
            .as_ref()
    }
}

fn check_header(
    assertion: &Assertion,
    headers: &Headers,
    name: &str,
    expected: &str,
    mode: HeaderMatch,
) -> AssertionResult {
    // Repeated headers pass when any of their values matches.
    let values: Vec<&str> = headers.get_all(name).collect();
    let Some(first) = values.first().copied() else {
        return AssertionResult::fail(assertion, None, "header not present");
    };

    let hit = match mode {
        HeaderMatch::Exact => values.iter().copied().find(|v| *v == expected),
        HeaderMatch::Contains => values.iter().copied().find(|v| v.contains(expected)),
        HeaderMatch::Regex => match Regex::new(expected) {
            Ok(re) => values.iter().copied().find(|v| re.is_match(v)),
            Err(e) => {
                return AssertionResult::fail(
                    assertion,
                    Some(Value::from(first)),
                    format!("invalid header pattern '{}': {}", expected, e),
                );
            }
        },
    };
    let matched = hit.is_some();
    let actual = hit.unwrap_or(first);
    let observed = Some(Value::from(actual));

    let verb = match mode {
        HeaderMatch::Exact => "equal",
        HeaderMatch::Contains => "contain",
        HeaderMatch::Regex => "match",
    };

    if matched {
        AssertionResult::pass(assertion, observed, format!("header does {} '{}'", verb, expected))
    } else {
        AssertionResult::fail(
            assertion,
            observed,
            format!("expected header to {} '{}', got '{}'", verb, expected, actual),
        )
    }
}

fn check_json_path(
    assertion: &Assertion,
    doc: &Value,
    path: &str,
    comparator: Comparator,
    expected: Option<&Value>,
) -> AssertionResult {
    let segments = match parse_path(path) {
        Ok(segments) => segments,
        Err(e) => return AssertionResult::fail(assertion, None, e.to_string()),
    };
    let found = resolve_path(doc, &segments);
    let actual = found.cloned();

    if comparator == Comparator::Exists {
        return match found {
            Some(_) => AssertionResult::pass(assertion, actual, format!("'{}' exists", path)),
            None => AssertionResult::fail(assertion, None, format!("'{}' not found", path)),
        };
    }

    let Some(value) = found else {
        return AssertionResult::fail(assertion, None, format!("'{}' not found", path));
    };
    let Some(expected) = expected else {
        return AssertionResult::fail(
            assertion,
            actual,
            format!("comparator '{}' requires an expected value", comparator),
        );
    };

    match comparator {
        Comparator::Exists => AssertionResult::pass(assertion, actual, format!("'{}' exists", path)),

        Comparator::Type => {
            let Some(type_name) = expected.as_str() else {
                return AssertionResult::fail(
                    assertion,
                    actual,
                    format!("expected type name must be a string, got {}", expected),
                );
            };
            if matches_type(value, type_name) {
                AssertionResult::pass(assertion, actual, format!("'{}' is {}", path, type_name))
            } else {
                AssertionResult::fail(
                    assertion,
                    actual,
                    format!("expected '{}' to be {}, got {}", path, type_name, json_type_name(value)),
                )
            }
        }

        Comparator::Eq | Comparator::Ne => {
            let equal = values_equal(value, expected);
            let want_equal = comparator == Comparator::Eq;
            if equal == want_equal {
                AssertionResult::pass(
                    assertion,
                    actual,
                    format!("'{}' {} {}", path, if want_equal { "==" } else { "!=" }, expected),
                )
            } else if want_equal {
                AssertionResult::fail(
                    assertion,
                    actual,
                    format!("expected '{}' == {}, got {}", path, expected, value),
                )
            } else {
                AssertionResult::fail(
                    assertion,
                    actual,
                    format!("expected '{}' != {}, but it was equal", path, expected),
                )
            }
        }

        Comparator::Gt | Comparator::Lt => {
            let (Some(lhs), Some(rhs)) = (value.as_f64(), expected.as_f64()) else {
                return AssertionResult::fail(
                    assertion,
                    actual,
                    format!(
                        "comparator '{}' needs numbers, got {} and {}",
                        comparator,
                        json_type_name(value),
                        json_type_name(expected)
                    ),
                );
            };
            let (ok, op) = if comparator == Comparator::Gt {
                (lhs > rhs, ">")
            } else {
                (lhs < rhs, "<")
            };
            if ok {
                AssertionResult::pass(assertion, actual, format!("'{}' {} {}", path, op, expected))
            } else {
                AssertionResult::fail(
                    assertion,
                    actual,
                    format!("expected '{}' {} {}, got {}", path, op, expected, value),
                )
            }
        }
    }
}

/// JSON type name as used by `type` assertions.
pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn matches_type(value: &Value, type_name: &str) -> bool {
    match type_name.to_ascii_lowercase().as_str() {
        "integer" => value.is_i64() || value.is_u64(),
        "bool" => value.is_boolean(),
        other => json_type_name(value) == other,
    }
}

/// Numbers compare by value so `1` equals `1.0`.
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        _ => a == b,
    }
}
