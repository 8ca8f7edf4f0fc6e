//! Capture of the original request as opaque JSON documents.

use crate::messages::RawJson;
use crate::webhook::RequestValues;
use serde_json::{json, Map, Value};

/// Replacement text for redacted secrets
pub const REDACTED: &str = "<redacted>";

const AUTHORIZATION_HEADERS: &[&str] = &["authorization", "proxy-authorization"];

const SECRET_HEADERS: &[&str] = &[
    "cookie",
    "set-cookie",
    "x-api-key",
    "x-auth-token",
    "api-key",
    "apikey",
];

const SECRET_QUERY_KEYS: &[&str] = &["token", "api_key", "apikey", "secret", "password", "key"];

/// Capture a request body as JSON.
///
/// An empty body becomes `{}`, a JSON body is kept verbatim, anything else is
/// wrapped as `{"$body": "<text>"}`.
pub fn capture_body(body: &[u8]) -> RawJson {
    let text = String::from_utf8_lossy(body);
    if text.trim().is_empty() {
        return RawJson::empty_object();
    }

    match RawJson::parse(&text) {
        Ok(raw) => raw,
        Err(_) => RawJson::from_value(&json!({ "$body": text })),
    }
}

/// Capture headers as a JSON object with credentials redacted
pub fn capture_headers(headers: &RequestValues) -> RawJson {
    capture_values(headers, redact_header)
}

/// Capture query parameters as a JSON object with credentials redacted
pub fn capture_query(query: &RequestValues) -> RawJson {
    capture_values(query, redact_query_param)
}

/// Single values become strings, repeated values become arrays, empty
/// values are dropped.
fn capture_values(values: &RequestValues, redact: fn(&str, &str) -> Option<String>) -> RawJson {
    let mut object = Map::new();

    for (key, entries) in values.iter() {
        let mut kept: Vec<Value> = entries
            .iter()
            .filter(|value| !value.is_empty())
            .map(|value| Value::String(redact(key, value).unwrap_or_else(|| value.clone())))
            .collect();

        match kept.len() {
            0 => {}
            1 => {
                object.insert(key.to_string(), kept.remove(0));
            }
            _ => {
                object.insert(key.to_string(), Value::Array(kept));
            }
        }
    }

    RawJson::from_value(&Value::Object(object))
}

fn redact_header(name: &str, value: &str) -> Option<String> {
    let name = name.to_ascii_lowercase();

    if AUTHORIZATION_HEADERS.contains(&name.as_str()) {
        // Only the scheme survives redaction
        return Some(match value.split_once(' ') {
            Some((scheme, _)) if !scheme.is_empty() => format!("{} {}", scheme, REDACTED),
            _ => REDACTED.to_string(),
        });
    }

    if SECRET_HEADERS.contains(&name.as_str()) {
        return Some(REDACTED.to_string());
    }

    None
}

fn redact_query_param(name: &str, _value: &str) -> Option<String> {
    let name = name.to_ascii_lowercase();
    SECRET_QUERY_KEYS
        .contains(&name.as_str())
        .then(|| REDACTED.to_string())
}

#[cfg(test)]
#[path = "capture_tests.rs"]
mod tests;
