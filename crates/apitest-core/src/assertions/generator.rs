//! Synthesizes assertions from a sample JSON value or a captured response.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

use super::evaluator::json_type_name;
use super::path::{render_path, PathSegment};
use crate::http::HttpResponse;
use crate::model::{Assertion, Comparator, HeaderMatch, Headers, HttpMethod};

fn default_max_depth() -> usize {
    5
}

fn default_max_array_size() -> usize {
    3
}

fn default_max_assertions() -> usize {
    20
}

fn default_headroom() -> f64 {
    2.0
}

fn default_min_response_time_ms() -> u64 {
    1000
}

fn default_true() -> bool {
    true
}

/// Generator settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Deepest path (in segments) that gets a `json_path` assertion.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Only the first N array elements are traversed.
    #[serde(default = "default_max_array_size")]
    pub max_array_size: usize,

    /// Emit `exists` for null-valued fields.
    #[serde(default)]
    pub include_nulls: bool,

    #[serde(default = "default_true")]
    pub include_response_time: bool,

    #[serde(default = "default_true")]
    pub include_headers: bool,

    #[serde(default = "default_true")]
    pub include_body_structure: bool,

    /// Containers get a `type` assertion instead of `exists`.
    #[serde(default = "default_true")]
    pub include_data_types: bool,

    #[serde(default = "default_max_assertions")]
    pub max_assertions: usize,

    /// Multiple of the observed response time used as the threshold.
    #[serde(default = "default_headroom")]
    pub response_time_headroom: f64,

    /// Lower bound for the generated response time threshold.
    #[serde(default = "default_min_response_time_ms")]
    pub min_response_time_ms: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            max_array_size: default_max_array_size(),
            include_nulls: false,
            include_response_time: true,
            include_headers: true,
            include_body_structure: true,
            include_data_types: true,
            max_assertions: default_max_assertions(),
            response_time_headroom: default_headroom(),
            min_response_time_ms: default_min_response_time_ms(),
        }
    }
}

/// A previously observed response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapturedResponse {
    pub status_code: u16,
    #[serde(default)]
    pub headers: Headers,
    /// Parsed body; `None` when the body was not JSON.
    #[serde(default)]
    pub body: Option<Value>,
    pub response_time_ms: u64,
}

impl CapturedResponse {
    pub fn from_response(response: &HttpResponse) -> Self {
        Self {
            status_code: response.status,
            headers: response.headers.clone(),
            body: response.json().ok(),
            response_time_ms: response.elapsed_ms(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AssertionGenerator {
    config: GeneratorConfig,
}

impl AssertionGenerator {
    pub fn new(config: GeneratorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Assertions describing `sample`, in depth-first key order.
    pub fn generate(&self, sample: &Value) -> Vec<Assertion> {
        let mut out = Vec::new();
        self.walk(sample, &mut Vec::new(), &mut out);
        self.finish(out)
    }

    /// Status, timing, header and body assertions for a captured response.
    pub fn generate_from_response(&self, captured: &CapturedResponse) -> Vec<Assertion> {
        let mut out = vec![Assertion::status_code(captured.status_code)];

        if self.config.include_response_time {
            let scaled = (captured.response_time_ms as f64 * self.config.response_time_headroom).ceil();
            let max_ms = (scaled as u64).max(self.config.min_response_time_ms);
            out.push(Assertion::ResponseTimeMax { max_ms });
        }

        if self.config.include_body_structure {
            if let Some(body) = &captured.body {
                self.walk(body, &mut Vec::new(), &mut out);
            }
        }

        if self.config.include_headers {
            for (name, value) in captured.headers.iter() {
                out.push(Assertion::header(name, value, HeaderMatch::Exact));
            }
        }

        self.finish(out)
    }

    /// Default status expectation for a request method.
    pub fn suggest_for_method(method: HttpMethod) -> Assertion {
        let expected = match method {
            HttpMethod::POST => 201,
            HttpMethod::DELETE => 204,
            _ => 200,
        };
        Assertion::status_code(expected)
    }

    fn walk(&self, value: &Value, segments: &mut Vec<PathSegment>, out: &mut Vec<Assertion>) {
        let is_container = value.is_object() || value.is_array();

        if is_container && segments.len() >= self.config.max_depth {
            out.push(Assertion::json_path(render_path(segments), Comparator::Exists, None));
            return;
        }

        match value {
            Value::Null => {
                if self.config.include_nulls {
                    out.push(Assertion::json_path(render_path(segments), Comparator::Exists, None));
                }
            }
            Value::Bool(_) | Value::Number(_) | Value::String(_) => {
                out.push(Assertion::json_path(
                    render_path(segments),
                    Comparator::Eq,
                    Some(value.clone()),
                ));
            }
            Value::Object(map) => {
                self.container(value, segments, out);
                for (key, child) in map {
                    segments.push(PathSegment::Key(key.clone()));
                    self.walk(child, segments, out);
                    segments.pop();
                }
            }
            Value::Array(items) => {
                self.container(value, segments, out);
                for (index, child) in items.iter().take(self.config.max_array_size).enumerate() {
                    segments.push(PathSegment::Index(index));
                    self.walk(child, segments, out);
                    segments.pop();
                }
            }
        }
    }

    fn container(&self, value: &Value, segments: &[PathSegment], out: &mut Vec<Assertion>) {
        // The root container is implied by its children.
        if segments.is_empty() {
            return;
        }
        let path = render_path(segments);
        if self.config.include_data_types {
            out.push(Assertion::json_path(
                path,
                Comparator::Type,
                Some(Value::from(json_type_name(value))),
            ));
        } else {
            out.push(Assertion::json_path(path, Comparator::Exists, None));
        }
    }

    fn finish(&self, assertions: Vec<Assertion>) -> Vec<Assertion> {
        let mut seen = HashSet::new();
        let mut unique: Vec<Assertion> = assertions
            .into_iter()
            .filter(|a| seen.insert(a.dedup_key()))
            .collect();

        if unique.len() > self.config.max_assertions {
            tracing::warn!(
                generated = unique.len(),
                max_assertions = self.config.max_assertions,
                "Truncating generated assertions"
            );
            unique.truncate(self.config.max_assertions);
        }
        unique
    }
}

/// Generate assertions for `sample` with `config`.
pub fn generate(sample: &Value, config: &GeneratorConfig) -> Vec<Assertion> {
    AssertionGenerator::new(config.clone()).generate(sample)
}
