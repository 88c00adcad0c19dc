//! Dot/bracket JSON paths such as `user.address[0].city`.

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("empty segment in path '{0}'")]
    EmptySegment(String),

    #[error("unclosed bracket in path '{0}'")]
    UnclosedBracket(String),

    #[error("invalid index '{index}' in path '{path}'")]
    InvalidIndex { path: String, index: String },
}

/// Parse a path. An empty path, `$` or `$.` address the document root.
///
/// Accepted forms: `a.b`, `a[0].b`, `a.0.b`, `a["dotted.key"]`, `$.a`.
pub fn parse_path(path: &str) -> Result<Vec<PathSegment>, PathError> {
    let trimmed = path.trim();
    let rest = trimmed.strip_prefix('$').unwrap_or(trimmed);
    let rest = rest.strip_prefix('.').unwrap_or(rest);

    let chars: Vec<char> = rest.chars().collect();
    let mut segments = Vec::new();
    let mut key = String::new();
    let mut after_bracket = false;
    let mut dot_pending = false;
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '.' => {
                if key.is_empty() && !after_bracket {
                    return Err(PathError::EmptySegment(path.to_string()));
                }
                if !key.is_empty() {
                    segments.push(PathSegment::Key(std::mem::take(&mut key)));
                }
                after_bracket = false;
                dot_pending = true;
                i += 1;
            }
            '[' => {
                if !key.is_empty() {
                    segments.push(PathSegment::Key(std::mem::take(&mut key)));
                } else if dot_pending {
                    return Err(PathError::EmptySegment(path.to_string()));
                }
                let (segment, next) = parse_bracket(path, &chars, i + 1)?;
                segments.push(segment);
                after_bracket = true;
                dot_pending = false;
                i = next;
            }
            c => {
                key.push(c);
                after_bracket = false;
                dot_pending = false;
                i += 1;
            }
        }
    }

    if !key.is_empty() {
        segments.push(PathSegment::Key(key));
    } else if dot_pending {
        return Err(PathError::EmptySegment(path.to_string()));
    }

    Ok(segments)
}

/// Parse the bracket body starting at `start` (just past `[`) and return the
/// segment plus the position after the closing `]`.
///
/// Quoted keys may contain `]`; a backslash escapes the next character.
fn parse_bracket(
    path: &str,
    chars: &[char],
    start: usize,
) -> Result<(PathSegment, usize), PathError> {
    let unclosed = || PathError::UnclosedBracket(path.to_string());
    let skip_ws = |mut i: usize| {
        while i < chars.len() && chars[i].is_whitespace() {
            i += 1;
        }
        i
    };

    let open = skip_ws(start);
    match chars.get(open) {
        Some(&quote) if quote == '"' || quote == '\'' => {
            let mut key = String::new();
            let mut i = open + 1;
            loop {
                match chars.get(i) {
                    None => return Err(unclosed()),
                    Some('\\') => {
                        key.push(*chars.get(i + 1).ok_or_else(unclosed)?);
                        i += 2;
                    }
                    Some(&c) if c == quote => break,
                    Some(&c) => {
                        key.push(c);
                        i += 1;
                    }
                }
            }
            let close = skip_ws(i + 1);
            if chars.get(close) != Some(&']') {
                return Err(unclosed());
            }
            Ok((PathSegment::Key(key), close + 1))
        }
        _ => {
            let close = chars[start..]
                .iter()
                .position(|c| *c == ']')
                .map(|offset| start + offset)
                .ok_or_else(unclosed)?;
            let inner: String = chars[start..close].iter().collect();
            let inner = inner.trim();
            let index = inner.parse::<usize>().map_err(|_| PathError::InvalidIndex {
                path: path.to_string(),
                index: inner.to_string(),
            })?;
            Ok((PathSegment::Index(index), close + 1))
        }
    }
}

/// Value at `segments`, if present. Numeric keys index into arrays.
pub fn resolve_path<'a>(value: &'a Value, segments: &[PathSegment]) -> Option<&'a Value> {
    let mut current = value;
    for segment in segments {
        current = match (segment, current) {
            (PathSegment::Key(k), Value::Object(map)) => map.get(k)?,
            (PathSegment::Key(k), Value::Array(items)) => items.get(k.parse::<usize>().ok()?)?,
            (PathSegment::Index(i), Value::Array(items)) => items.get(*i)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Render segments back to a path string; the root renders as `$`.
pub fn render_path(segments: &[PathSegment]) -> String {
    if segments.is_empty() {
        return "$".to_string();
    }

    let mut out = String::new();
    for segment in segments {
        match segment {
            PathSegment::Index(i) => out.push_str(&format!("[{}]", i)),
            PathSegment::Key(k) if needs_brackets(k) => {
                out.push_str("[\"");
                for c in k.chars() {
                    if matches!(c, '"' | '\\') {
                        out.push('\\');
                    }
                    out.push(c);
                }
                out.push_str("\"]");
            }
            PathSegment::Key(k) => {
                if !out.is_empty() {
                    out.push('.');
                }
                out.push_str(k);
            }
        }
    }
    out
}

fn needs_brackets(key: &str) -> bool {
    key.is_empty()
        || key.starts_with('$')
        || key.chars().any(|c| matches!(c, '.' | '[' | ']') || c.is_whitespace())
}
