//! Declarative test cases.

use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use uuid::Uuid;

use super::{Assertion, Headers};

/// HTTP method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
#[allow(clippy::upper_case_acronyms)] // HTTP methods are conventionally uppercase
pub enum HttpMethod {
    #[default]
    GET,
    POST,
    PUT,
    PATCH,
    DELETE,
    HEAD,
    OPTIONS,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::GET => "GET",
            HttpMethod::POST => "POST",
            HttpMethod::PUT => "PUT",
            HttpMethod::PATCH => "PATCH",
            HttpMethod::DELETE => "DELETE",
            HttpMethod::HEAD => "HEAD",
            HttpMethod::OPTIONS => "OPTIONS",
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::GET),
            "POST" => Ok(HttpMethod::POST),
            "PUT" => Ok(HttpMethod::PUT),
            "PATCH" => Ok(HttpMethod::PATCH),
            "DELETE" => Ok(HttpMethod::DELETE),
            "HEAD" => Ok(HttpMethod::HEAD),
            "OPTIONS" => Ok(HttpMethod::OPTIONS),
            other => Err(other.to_string()),
        }
    }
}

impl From<HttpMethod> for Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::GET => Method::GET,
            HttpMethod::POST => Method::POST,
            HttpMethod::PUT => Method::PUT,
            HttpMethod::PATCH => Method::PATCH,
            HttpMethod::DELETE => Method::DELETE,
            HttpMethod::HEAD => Method::HEAD,
            HttpMethod::OPTIONS => Method::OPTIONS,
        }
    }
}

/// Request body: raw text or structured JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestBody {
    Text(String),
    Json(serde_json::Value),
}

impl RequestBody {
    /// Bytes sent on the wire.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            RequestBody::Text(s) => s.as_bytes().to_vec(),
            RequestBody::Json(v) => v.to_string().into_bytes(),
        }
    }

    /// Whether the body is JSON, either structured or as parseable text.
    pub fn is_json(&self) -> bool {
        match self {
            RequestBody::Json(_) => true,
            RequestBody::Text(s) => serde_json::from_str::<serde_json::Value>(s).is_ok(),
        }
    }

    pub fn to_text(&self) -> String {
        match self {
            RequestBody::Text(s) => s.clone(),
            RequestBody::Json(v) => v.to_string(),
        }
    }
}

/// One declarative HTTP request plus the assertions checked on its response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCase {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,

    /// Owning service.
    pub service_id: Uuid,

    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub method: HttpMethod,

    /// Path relative to the service base URL; may contain `{name}` placeholders.
    #[serde(default)]
    pub path: String,

    #[serde(default)]
    pub headers: Headers,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub query_params: BTreeMap<String, String>,

    /// Values substituted for `{name}` placeholders in `path`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub path_variables: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<RequestBody>,

    #[serde(default)]
    pub assertions: Vec<Assertion>,

    /// Per-case timeout; falls back to the run default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,

    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

impl TestCase {
    pub fn new(service_id: Uuid, method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            service_id,
            name: String::new(),
            description: None,
            method,
            path: path.into(),
            headers: Headers::new(),
            query_params: BTreeMap::new(),
            path_variables: BTreeMap::new(),
            body: None,
            assertions: Vec::new(),
            timeout_seconds: None,
            is_active: true,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_body(mut self, body: RequestBody) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_assertion(mut self, assertion: Assertion) -> Self {
        self.assertions.push(assertion);
        self
    }

    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = Some(seconds);
        self
    }

    /// Path with `{name}` placeholders replaced by their path variables.
    pub fn resolved_path(&self) -> String {
        let mut path = self.path.clone();
        for (name, value) in &self.path_variables {
            path = path.replace(&format!("{{{}}}", name), value);
        }
        path
    }

    /// Display label used in reports and logs.
    pub fn label(&self) -> String {
        if self.name.is_empty() {
            format!("{} {}", self.method, self.path)
        } else {
            self.name.clone()
        }
    }
}
