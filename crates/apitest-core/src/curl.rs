//! Curl command importer.
//!
//! Turns a shell `curl` invocation into a [`RequestSpec`] that can be stored
//! as a test case.

use base64::Engine;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::error::ParseError;
use crate::model::{Assertion, HeaderMatch, Headers, HttpMethod, RequestBody, TestCase};

/// Body encoding of an imported request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RequestType {
    Json,
    Form,
    Multipart,
    #[default]
    None,
}

/// Structured form of a curl command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestSpec {
    pub method: HttpMethod,
    /// URL as given, including any query string.
    pub url: String,
    pub headers: Headers,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub query_params: Vec<(String, String)>,
    pub request_type: RequestType,
    /// Recoverable problems, such as skipped malformed headers.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl RequestSpec {
    /// Build a test case for `service_id`.
    ///
    /// The case path is the URL path, made relative to `base_url` when the
    /// URL starts with it.
    pub fn into_test_case(self, service_id: Uuid, base_url: Option<&str>) -> TestCase {
        let without_query = self.url.split(['?', '#']).next().unwrap_or_default();
        let path = base_url
            .map(|base| base.trim_end_matches('/'))
            .filter(|base| !base.is_empty())
            .and_then(|base| without_query.strip_prefix(base))
            .map(str::to_string)
            .or_else(|| reqwest::Url::parse(&self.url).ok().map(|u| u.path().to_string()))
            .unwrap_or_else(|| without_query.to_string());
        let path = if path.starts_with('/') {
            path
        } else {
            format!("/{}", path)
        };

        let declares_json = self
            .headers
            .get("content-type")
            .is_some_and(|ct| ct.to_ascii_lowercase().contains("json"));

        let mut case = TestCase::new(service_id, self.method, path)
            .with_name(format!("{} {}", self.method, self.url))
            .with_assertion(Assertion::status_code(200));
        if declares_json {
            case = case.with_assertion(Assertion::header(
                "Content-Type",
                "application/json",
                HeaderMatch::Contains,
            ));
        }

        case.headers = self.headers;
        case.query_params = self.query_params.into_iter().collect();
        case.body = self.body.map(|body| match serde_json::from_str(&body) {
            Ok(value) => RequestBody::Json(value),
            Err(_) => RequestBody::Text(body),
        });
        case
    }
}

/// Recognized flags, by what they do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flag {
    Method,
    Header,
    Data,
    Form,
    User,
    Url,
    UserAgent,
    Cookie,
    Head,
    /// Accepted and ignored; takes no value.
    Ignored,
    /// Accepted and ignored; consumes a value.
    IgnoredValue,
}

impl Flag {
    fn classify(name: &str) -> Option<Flag> {
        let flag = match name {
            "-X" | "--request" => Flag::Method,
            "-H" | "--header" => Flag::Header,
            "-d" | "--data" | "--data-raw" | "--data-binary" | "--data-ascii"
            | "--data-urlencode" | "--json" => Flag::Data,
            "-F" | "--form" | "--form-string" => Flag::Form,
            "-u" | "--user" => Flag::User,
            "--url" => Flag::Url,
            "-A" | "--user-agent" => Flag::UserAgent,
            "-b" | "--cookie" => Flag::Cookie,
            "-I" | "--head" => Flag::Head,
            "-L" | "--location" | "--compressed" | "-s" | "--silent" | "-S" | "--show-error"
            | "-k" | "--insecure" | "-v" | "--verbose" | "-i" | "--include" | "-f" | "--fail"
            | "-g" | "--globoff" | "--http1.1" | "--http2" => Flag::Ignored,
            "-o" | "--output" | "-m" | "--max-time" | "--connect-timeout" | "-w"
            | "--write-out" | "--retry" | "--cacert" | "--cert" | "--key" | "-e" | "--referer"
            | "-x" | "--proxy" | "-c" | "--cookie-jar" => Flag::IgnoredValue,
            _ => return None,
        };
        Some(flag)
    }

    fn takes_value(self) -> bool {
        !matches!(self, Flag::Ignored | Flag::Head)
    }
}

/// Matches the program name case-insensitively, ignoring any directory.
fn is_curl(program: &str) -> bool {
    let name = program.rsplit(['/', '\\']).next().unwrap_or(program);
    name.eq_ignore_ascii_case("curl") || name.eq_ignore_ascii_case("curl.exe")
}

/// Parse a curl command line.
pub fn parse(command: &str) -> Result<RequestSpec, ParseError> {
    let tokens = tokenize(command)?;
    let Some((program, args)) = tokens.split_first() else {
        return Err(ParseError::Empty);
    };
    if !is_curl(program) {
        return Err(ParseError::NotCurl(program.clone()));
    }

    let mut method: Option<HttpMethod> = None;
    let mut head = false;
    let mut url: Option<String> = None;
    let mut headers = Headers::new();
    let mut data: Vec<String> = Vec::new();
    let mut has_form = false;
    let mut warnings = Vec::new();

    let mut iter = args.iter();
    while let Some(token) = iter.next() {
        if token == "--" {
            continue;
        }
        if !token.starts_with('-') || token.len() == 1 {
            match url {
                None => url = Some(token.clone()),
                Some(_) => warnings.push(format!("Ignoring extra argument '{}'", token)),
            }
            continue;
        }

        let Some((name, flag, inline)) = split_flag(token) else {
            tracing::debug!(flag = %token, "Ignoring unknown curl flag");
            continue;
        };

        let value = if flag.takes_value() {
            match inline {
                Some(v) => v,
                None => iter
                    .next()
                    .cloned()
                    .ok_or_else(|| ParseError::MissingValue(name.to_string()))?,
            }
        } else {
            String::new()
        };

        match flag {
            Flag::Method => {
                let parsed = HttpMethod::from_str(&value)
                    .map_err(|_| ParseError::UnsupportedMethod(value.clone()))?;
                method = Some(parsed);
            }
            Flag::Header => match value.split_once(':') {
                Some((key, val)) if !key.trim().is_empty() => {
                    headers.insert(key.trim(), val.trim());
                }
                _ => {
                    tracing::warn!(header = %value, "Skipping malformed curl header");
                    warnings.push(format!("Skipped malformed header '{}'", value));
                }
            },
            Flag::Data => data.push(value),
            Flag::Form => {
                has_form = true;
                data.push(value);
            }
            Flag::User => {
                let encoded = base64::engine::general_purpose::STANDARD.encode(value.as_bytes());
                headers.insert("Authorization", format!("Basic {}", encoded));
            }
            Flag::Url => url = Some(value),
            Flag::UserAgent => headers.insert("User-Agent", value),
            Flag::Cookie => headers.insert("Cookie", value),
            Flag::Head => head = true,
            Flag::Ignored | Flag::IgnoredValue => {}
        }
    }

    let url = url.ok_or(ParseError::MissingUrl)?;
    let url = if url.contains("://") {
        url
    } else {
        format!("http://{}", url)
    };
    let parsed = reqwest::Url::parse(&url).map_err(|_| ParseError::InvalidUrl(url.clone()))?;
    let query_params = parsed
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let body = if data.is_empty() {
        None
    } else {
        Some(data.join("&"))
    };

    let method = match method {
        Some(m) => m,
        None if body.is_some() => HttpMethod::POST,
        None if head => HttpMethod::HEAD,
        None => HttpMethod::GET,
    };

    let request_type = request_type(&headers, body.as_deref(), has_form);

    Ok(RequestSpec {
        method,
        url,
        headers,
        body,
        query_params,
        request_type,
        warnings,
    })
}

/// Split a flag token into its name, kind and any attached value
/// (`--data=x`, `-XPOST`).
fn split_flag(token: &str) -> Option<(&str, Flag, Option<String>)> {
    if token.starts_with("--") {
        if let Some((name, value)) = token.split_once('=') {
            let flag = Flag::classify(name)?;
            return Some((name, flag, Some(value.to_string())));
        }
        return Flag::classify(token).map(|flag| (token, flag, None));
    }

    if let Some(flag) = Flag::classify(token) {
        return Some((token, flag, None));
    }

    // Short flag with an attached value, or a bundle of switches (`-sSL`).
    let name = token.get(..2)?;
    let flag = Flag::classify(name)?;
    if flag.takes_value() {
        Some((name, flag, Some(token[2..].to_string())))
    } else {
        Some((name, Flag::Ignored, None))
    }
}

fn request_type(headers: &Headers, body: Option<&str>, has_form: bool) -> RequestType {
    let content_type = headers
        .get("content-type")
        .unwrap_or_default()
        .to_ascii_lowercase();

    if content_type.contains("application/json") {
        RequestType::Json
    } else if content_type.contains("application/x-www-form-urlencoded") {
        RequestType::Form
    } else if content_type.contains("multipart/form-data") || has_form {
        RequestType::Multipart
    } else {
        match body {
            Some(b) if serde_json::from_str::<serde_json::Value>(b).is_ok() => RequestType::Json,
            Some(_) => RequestType::Form,
            None => RequestType::None,
        }
    }
}

/// Split a command line into words, honoring shell quoting.
fn tokenize(command: &str) -> Result<Vec<String>, ParseError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut chars = command.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('\n') => {}
                Some('\r') if chars.peek() == Some(&'\n') => {
                    chars.next();
                }
                Some(next) => {
                    current.push(next);
                    in_token = true;
                }
                None => {}
            },
            '\'' => {
                in_token = true;
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(ch) => current.push(ch),
                        None => return Err(ParseError::UnterminatedQuote('\'')),
                    }
                }
            }
            '"' => {
                in_token = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some('\n') => {}
                            Some(ch @ ('"' | '\\' | '$' | '`')) => current.push(ch),
                            Some(ch) => {
                                current.push('\\');
                                current.push(ch);
                            }
                            None => return Err(ParseError::UnterminatedQuote('"')),
                        },
                        Some(ch) => current.push(ch),
                        None => return Err(ParseError::UnterminatedQuote('"')),
                    }
                }
            }
            c if c.is_whitespace() => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            c => {
                current.push(c);
                in_token = true;
            }
        }
    }

    if in_token {
        tokens.push(current);
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_post_with_headers_and_body() {
        let spec = parse(
            r#"curl -X POST https://a.test/x -H 'Content-Type: application/json' -H 'X-Foo: bar' -d '{"a":1}'"#,
        )
        .unwrap();

        assert_eq!(spec.method, HttpMethod::POST);
        assert_eq!(spec.url, "https://a.test/x");
        assert_eq!(spec.headers.get("Content-Type"), Some("application/json"));
        assert_eq!(spec.headers.get("X-Foo"), Some("bar"));
        assert_eq!(spec.body.as_deref(), Some(r#"{"a":1}"#));
        assert_eq!(spec.request_type, RequestType::Json);
    }

    #[test]
    fn test_parse_continues_after_url() {
        let spec = parse("curl https://a.test/x -H 'X-Foo: bar'").unwrap();
        assert_eq!(spec.method, HttpMethod::GET);
        assert_eq!(spec.headers.get("x-foo"), Some("bar"));
        assert_eq!(spec.request_type, RequestType::None);
    }

    #[test]
    fn test_parse_line_continuations_and_quotes() {
        let command = "curl --location \\\n  --request PUT \\\n  \"https://a.test/items/1?expand=true&v=2\" \\\n  --header \"Authorization: Bearer \\\"t\\\"\" \\\n  --data-raw 'name=a b'";
        let spec = parse(command).unwrap();

        assert_eq!(spec.method, HttpMethod::PUT);
        assert_eq!(spec.url, "https://a.test/items/1?expand=true&v=2");
        assert_eq!(spec.headers.get("Authorization"), Some("Bearer \"t\""));
        assert_eq!(spec.body.as_deref(), Some("name=a b"));
        assert_eq!(
            spec.query_params,
            vec![
                ("expand".to_string(), "true".to_string()),
                ("v".to_string(), "2".to_string())
            ]
        );
        assert_eq!(spec.request_type, RequestType::Form);
    }

    #[test]
    fn test_header_order_preserved() {
        let spec = parse("curl https://a.test -H 'B: 2' -H 'A: 1' -H 'C : 3 '").unwrap();
        let names: Vec<&str> = spec.headers.iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["B", "A", "C"]);
        assert_eq!(spec.headers.get("c"), Some("3"));
    }

    #[test]
    fn test_malformed_header_skipped() {
        let spec = parse("curl https://a.test -H 'NoColon' -H 'X-Ok: yes'").unwrap();
        assert_eq!(spec.headers.len(), 1);
        assert_eq!(spec.warnings.len(), 1);
    }

    #[test]
    fn test_multiple_data_flags_join() {
        let spec = parse("curl https://a.test/form -d a=1 --data b=2 --data-binary=c=3").unwrap();
        assert_eq!(spec.method, HttpMethod::POST);
        assert_eq!(spec.body.as_deref(), Some("a=1&b=2&c=3"));
    }

    #[test]
    fn test_explicit_method_wins_over_data() {
        let spec = parse("curl -XPATCH https://a.test/x -d '{}'").unwrap();
        assert_eq!(spec.method, HttpMethod::PATCH);
    }

    #[test]
    fn test_form_user_and_ignored_flags() {
        let spec = parse(
            "curl -sSL --compressed -k -m 10 -u user:pass -F file=@a.txt --url https://a.test/upload",
        )
        .unwrap();

        assert_eq!(spec.url, "https://a.test/upload");
        assert_eq!(spec.method, HttpMethod::POST);
        assert_eq!(spec.headers.get("Authorization"), Some("Basic dXNlcjpwYXNz"));
        assert_eq!(spec.request_type, RequestType::Multipart);
        assert_eq!(spec.body.as_deref(), Some("file=@a.txt"));
    }

    #[test]
    fn test_program_name_variants() {
        for command in [
            "CURL https://a.test/x",
            "Curl https://a.test/x",
            "/usr/bin/curl https://a.test/x",
            "./curl https://a.test/x",
            r"'C:\tools\curl.exe' https://a.test/x",
        ] {
            let spec = parse(command).unwrap();
            assert_eq!(spec.url, "https://a.test/x", "{}", command);
        }
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(parse(""), Err(ParseError::Empty));
        assert_eq!(parse("   "), Err(ParseError::Empty));
        assert_eq!(
            parse("wget https://a.test"),
            Err(ParseError::NotCurl("wget".to_string()))
        );
        assert_eq!(
            parse("/usr/bin/wget https://a.test"),
            Err(ParseError::NotCurl("/usr/bin/wget".to_string()))
        );
        assert_eq!(
            parse("curlish https://a.test"),
            Err(ParseError::NotCurl("curlish".to_string()))
        );
        assert_eq!(parse("curl -H 'X: y'"), Err(ParseError::MissingUrl));
        assert_eq!(parse("curl https://a.test -H"), Err(ParseError::MissingValue("-H".to_string())));
        assert_eq!(parse("curl 'https://a.test"), Err(ParseError::UnterminatedQuote('\'')));
        assert_eq!(
            parse("curl -X FETCH https://a.test"),
            Err(ParseError::UnsupportedMethod("FETCH".to_string()))
        );
    }

    #[test]
    fn test_scheme_defaults_to_http() {
        let spec = parse("curl localhost:8080/health").unwrap();
        assert_eq!(spec.url, "http://localhost:8080/health");
    }

    #[test]
    fn test_into_test_case() {
        let service_id = Uuid::new_v4();
        let spec = parse(
            r#"curl https://api.test/v1/users?active=true -H 'Content-Type: application/json' -d '{"name":"ada"}'"#,
        )
        .unwrap();

        let case = spec.into_test_case(service_id, Some("https://api.test/v1/"));

        assert_eq!(case.service_id, service_id);
        assert_eq!(case.method, HttpMethod::POST);
        assert_eq!(case.path, "/users");
        assert_eq!(case.query_params.get("active").map(String::as_str), Some("true"));
        assert_eq!(case.body, Some(RequestBody::Json(serde_json::json!({"name": "ada"}))));
        assert_eq!(
            case.assertions,
            vec![
                Assertion::status_code(200),
                Assertion::header("Content-Type", "application/json", HeaderMatch::Contains),
            ]
        );
    }

    #[test]
    fn test_into_test_case_without_base() {
        let spec = parse("curl https://api.test/v1/users/7").unwrap();
        let case = spec.into_test_case(Uuid::new_v4(), None);
        assert_eq!(case.path, "/v1/users/7");
        assert_eq!(case.body, None);
        assert_eq!(case.assertions, vec![Assertion::status_code(200)]);
    }
}
