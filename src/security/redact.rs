//! Redaction of secrets and bulky payloads before they reach logs or the host.

use std::sync::OnceLock;

use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Map, Value};

/// Fixed-length stand-in for any secret, independent of the secret's length.
pub const MASK: &str = "********";

/// Shown in place of a secret that was never configured.
pub const NOT_SET: &str = "Not set";

/// Strings longer than this are cut down to a preview in argument summaries.
pub const PREVIEW_LENGTH: usize = 50;

const MAX_SUMMARY_DEPTH: usize = 3;

// Compared after lowercasing and dropping `_`/`-`.
const SENSITIVE_FIELDS: &[&str] = &[
    "apikey",
    "key",
    "masterkey",
    "token",
    "authtoken",
    "accesstoken",
    "secret",
    "password",
    "authorization",
];

// Bodies that are summarized by size only.
const BODY_FIELDS: &[&str] = &["documents", "messages"];

pub fn mask_secret(secret: Option<&SecretString>) -> &'static str {
    match secret {
        Some(s) if !s.expose_secret().is_empty() => MASK,
        _ => NOT_SET,
    }
}

/// First [`PREVIEW_LENGTH`] characters followed by `...`, char-boundary safe.
pub fn preview(value: &str, max: usize) -> String {
    match value.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &value[..idx]),
        None => value.to_string(),
    }
}

pub fn is_sensitive_field(name: &str) -> bool {
    let normalized: String = name
        .chars()
        .filter(|c| *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect();
    SENSITIVE_FIELDS.contains(&normalized.as_str())
}

/// Compact, log-safe rendering of an argument or request body.
///
/// Sensitive fields are masked, document and message bodies are replaced by
/// their item count, long strings are truncated and deep nesting is elided.
pub fn summarize(value: &Value) -> String {
    summarize_value(value, 0).to_string()
}

fn summarize_value(value: &Value, depth: usize) -> Value {
    match value {
        Value::String(s) => Value::String(preview(s, PREVIEW_LENGTH)),
        Value::Array(items) if depth >= MAX_SUMMARY_DEPTH => {
            Value::String(format!("[{} items]", items.len()))
        }
        Value::Array(items) => {
            Value::Array(items.iter().map(|v| summarize_value(v, depth + 1)).collect())
        }
        Value::Object(_) if depth >= MAX_SUMMARY_DEPTH => Value::String("{...}".into()),
        Value::Object(map) => Value::Object(summarize_map(map, depth)),
        other => other.clone(),
    }
}

fn summarize_map(map: &Map<String, Value>, depth: usize) -> Map<String, Value> {
    map.iter()
        .map(|(name, value)| {
            let summarized = if is_sensitive_field(name) {
                match value {
                    Value::Null => Value::Null,
                    _ => Value::String(MASK.into()),
                }
            } else if BODY_FIELDS.contains(&name.as_str()) {
                match value {
                    Value::Array(items) => Value::String(format!("[{} items]", items.len())),
                    other => Value::String(preview(&other.to_string(), PREVIEW_LENGTH)),
                }
            } else {
                summarize_value(value, depth + 1)
            };
            (name.clone(), summarized)
        })
        .collect()
}

/// Summary of a request body sent to the engine. Top-level arrays are
/// document batches or id lists and are reported by size only.
pub fn summarize_body(body: &Value) -> String {
    match body {
        Value::Array(items) => format!("[{} items]", items.len()),
        other => summarize(other),
    }
}

/// Request path for logging, with the segment naming an API key masked.
pub fn redact_path(path: &str) -> String {
    let mut after_keys = false;
    path.split('/')
        .map(|segment| {
            let shown = if after_keys && !segment.is_empty() { MASK } else { segment };
            after_keys = segment == "keys";
            shown
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn credential_url_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b([a-z][a-z0-9+.\-]*://)[^\s/@:]+(?::[^\s/@]*)?@")
            .expect("valid credential url regex")
    })
}

fn bearer_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\bbearer\s+[A-Za-z0-9._~+/=\-]+").expect("valid bearer regex")
    })
}

fn key_param_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(api[_-]?key|master[_-]?key|token|password)=[^&\s]+")
            .expect("valid key parameter regex")
    })
}

/// Scrub credentials from free-form diagnostic text.
///
/// Removes userinfo from URLs, bearer tokens, `key=value` credentials, and
/// every literal occurrence of `secret` when one is given.
pub fn redact_message(message: &str, secret: Option<&SecretString>) -> String {
    let mut text = message.to_string();
    if let Some(secret) = secret {
        let raw = secret.expose_secret().trim();
        if !raw.is_empty() {
            text = text.replace(raw, MASK);
        }
    }
    let text = credential_url_pattern().replace_all(&text, "${1}***@");
    let text = bearer_pattern().replace_all(&text, format!("Bearer {}", MASK).as_str());
    let text = key_param_pattern().replace_all(&text, format!("${{1}}={}", MASK).as_str());
    text.into_owned()
}
