//! Builds outbound requests from a service, a test case and auth decorations.

use std::time::Duration;

use super::OutboundRequest;
use crate::auth::RequestDecoration;
use crate::error::TransportError;
use crate::model::{RequestSnapshot, Service, TestCase};

/// Placeholder recorded in snapshots instead of auth-derived values.
pub const REDACTED: &str = "<redacted>";

/// A request plus the redacted snapshot recorded in the test result.
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub request: OutboundRequest,
    pub snapshot: RequestSnapshot,
}

/// Merge a test case with its service and auth decoration.
///
/// Auth-derived headers and query parameters replace caller-specified ones
/// with the same name.
pub fn build_request(
    service: &Service,
    case: &TestCase,
    decoration: &RequestDecoration,
    timeout: Duration,
) -> Result<PreparedRequest, TransportError> {
    let raw_url = service.url_for(&case.resolved_path());
    let mut url = reqwest::Url::parse(&raw_url).map_err(|e| TransportError::InvalidUrl {
        url: raw_url.clone(),
        detail: e.to_string(),
    })?;
    let mut snapshot_url = url.clone();

    let case_params = case
        .query_params
        .iter()
        .filter(|(name, _)| !decoration.query.iter().any(|(auth_name, _)| auth_name == *name));

    if !case.query_params.is_empty() || !decoration.query.is_empty() {
        let mut pairs = url.query_pairs_mut();
        let mut snapshot_pairs = snapshot_url.query_pairs_mut();
        for (name, value) in case_params {
            pairs.append_pair(name, value);
            snapshot_pairs.append_pair(name, value);
        }
        for (name, value) in &decoration.query {
            pairs.append_pair(name, value);
            snapshot_pairs.append_pair(name, REDACTED);
        }
    }

    let mut headers = case.headers.clone();
    let mut snapshot_headers = case.headers.clone();
    for (name, value) in &decoration.headers {
        headers.insert(name.as_str(), value.as_str());
        snapshot_headers.insert(name.as_str(), REDACTED);
    }

    let body = case.body.as_ref();
    if let Some(body) = body {
        if body.is_json() && !headers.contains("content-type") {
            headers.insert("Content-Type", "application/json");
            snapshot_headers.insert("Content-Type", "application/json");
        }
    }

    let snapshot = RequestSnapshot {
        method: case.method.to_string(),
        url: snapshot_url.to_string(),
        headers: snapshot_headers,
        body: body.map(|b| b.to_text()),
    };

    let request = OutboundRequest {
        method: case.method,
        url: url.to_string(),
        headers,
        body: body.map(|b| b.to_bytes()),
        timeout,
    };

    Ok(PreparedRequest { request, snapshot })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{HttpMethod, RequestBody};

    fn service() -> Service {
        Service::new("api", "https://api.example.com/v1/")
    }

    #[test]
    fn test_build_request_merges_auth() {
        let service = service();
        let case = TestCase::new(service.id, HttpMethod::GET, "/users/{id}")
            .with_header("Authorization", "Bearer caller")
            .with_header("Accept", "application/json");
        let mut case = case;
        case.path_variables.insert("id".to_string(), "7".to_string());

        let decoration = RequestDecoration::header("Authorization", "Bearer auth");
        let prepared =
            build_request(&service, &case, &decoration, Duration::from_secs(30)).unwrap();

        assert_eq!(prepared.request.url, "https://api.example.com/v1/users/7");
        assert_eq!(prepared.request.headers.get("authorization"), Some("Bearer auth"));
        assert_eq!(prepared.request.headers.len(), 2);
        assert_eq!(prepared.snapshot.headers.get("Authorization"), Some(REDACTED));
        assert_eq!(prepared.snapshot.headers.get("Accept"), Some("application/json"));
    }

    #[test]
    fn test_build_request_query_params() {
        let service = service();
        let mut case = TestCase::new(service.id, HttpMethod::GET, "/search");
        case.query_params.insert("q".to_string(), "rust lang".to_string());
        case.query_params.insert("api_key".to_string(), "caller".to_string());

        let decoration = RequestDecoration::query("api_key", "secret");
        let prepared =
            build_request(&service, &case, &decoration, Duration::from_secs(30)).unwrap();

        assert_eq!(
            prepared.request.url,
            "https://api.example.com/v1/search?q=rust+lang&api_key=secret"
        );
        assert!(!prepared.snapshot.url.contains("secret"));
    }

    #[test]
    fn test_build_request_sets_json_content_type() {
        let service = service();
        let case = TestCase::new(service.id, HttpMethod::POST, "/users")
            .with_body(RequestBody::Json(serde_json::json!({"name": "a"})));

        let prepared = build_request(
            &service,
            &case,
            &RequestDecoration::default(),
            Duration::from_secs(30),
        )
        .unwrap();

        assert_eq!(
            prepared.request.headers.get("Content-Type"),
            Some("application/json")
        );
        assert_eq!(prepared.request.body, Some(br#"{"name":"a"}"#.to_vec()));
        assert_eq!(prepared.snapshot.body.as_deref(), Some(r#"{"name":"a"}"#));
    }

    #[test]
    fn test_build_request_keeps_explicit_content_type() {
        let service = service();
        let case = TestCase::new(service.id, HttpMethod::POST, "/form")
            .with_header("content-type", "text/plain")
            .with_body(RequestBody::Text("{\"a\":1}".to_string()));

        let prepared = build_request(
            &service,
            &case,
            &RequestDecoration::default(),
            Duration::from_secs(30),
        )
        .unwrap();

        assert_eq!(prepared.request.headers.get("Content-Type"), Some("text/plain"));
    }

    #[test]
    fn test_build_request_invalid_url() {
        let service = Service::new("bad", "not a url");
        let case = TestCase::new(service.id, HttpMethod::GET, "/x");
        let err = build_request(
            &service,
            &case,
            &RequestDecoration::default(),
            Duration::from_secs(1),
        )
        .unwrap_err();
        assert!(matches!(err, TransportError::InvalidUrl { .. }));
    }
}
