//! Classification of engine and transport failures.

use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;

use crate::security::{preview, redact_message};
use crate::{Error, Result};

/// Error body returned by the engine on non-2xx responses.
#[derive(Debug, Default, Deserialize)]
struct EngineErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default, rename = "type")]
    error_type: Option<String>,
}

/// How a request failed below the HTTP layer, as reported by `reqwest`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct TransportFailure {
    pub connect: bool,
    pub timeout: bool,
    pub request: bool,
}

impl TransportFailure {
    fn of(err: &reqwest::Error) -> Self {
        Self {
            connect: err.is_connect(),
            timeout: err.is_timeout(),
            request: err.is_request(),
        }
    }

    /// A timeout raised while connecting is reported as both a connect and a
    /// timeout failure; one raised later only as a timeout.
    pub(crate) fn classify(self, message: String, connect_timeout: Duration, read_timeout: Duration) -> Error {
        match self {
            TransportFailure { connect: true, timeout: true, .. } => Error::ConnectionTimeout(connect_timeout),
            TransportFailure { timeout: true, .. } => Error::Timeout(read_timeout),
            TransportFailure { connect: true, .. } | TransportFailure { request: true, .. } => {
                Error::EngineUnavailable(message)
            }
            _ => Error::Unknown(message),
        }
    }
}

pub(crate) fn transport_error(
    err: reqwest::Error,
    connect_timeout: Duration,
    read_timeout: Duration,
) -> Error {
    let failure = TransportFailure::of(&err);
    let message = redact_message(&err.without_url().to_string(), None);
    failure.classify(message, connect_timeout, read_timeout)
}

/// Pass successful responses through, turn everything else into a typed error.
pub(crate) async fn check_response(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(classify_status(status, &body))
}

pub(crate) fn classify_status(status: StatusCode, body: &str) -> Error {
    let parsed: EngineErrorBody = serde_json::from_str(body).unwrap_or_default();
    let message = parsed
        .message
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| match body.trim() {
            "" => status
                .canonical_reason()
                .unwrap_or("no response body")
                .to_string(),
            raw => preview(raw, 200),
        });
    let message = redact_message(&message, None);
    let code = parsed.code;

    match status.as_u16() {
        401 | 403 => Error::Unauthorized { message },
        404 => Error::NotFound { message, code },
        400 | 409 | 413 | 415 | 422 => Error::BadRequest { message, code },
        408 | 429 | 502 | 503 | 504 => Error::EngineUnavailable(message),
        _ => match (code.as_deref(), parsed.error_type.as_deref()) {
            (Some(c), _) if c.ends_with("_not_found") => Error::NotFound { message, code },
            (_, Some("auth")) => Error::Unauthorized { message },
            (_, Some("invalid_request")) => Error::BadRequest { message, code },
            _ => Error::Unknown(format!("HTTP {}: {}", status.as_u16(), message)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    fn failure(connect: bool, timeout: bool, request: bool) -> TransportFailure {
        TransportFailure { connect, timeout, request }
    }

    #[test]
    fn test_transport_failure_kinds() {
        let connect = Duration::from_secs(10);
        let read = Duration::from_secs(30);
        let classify = |f: TransportFailure| f.classify("error sending request".into(), connect, read);

        let err = classify(failure(true, true, true));
        assert_eq!(err.kind(), ErrorKind::ConnectionTimeout);
        assert_eq!(err.to_string(), "Connection timed out after 10.0s");

        let err = classify(failure(false, true, true));
        assert!(matches!(err, Error::Timeout(d) if d == read));
        assert_eq!(err.kind(), ErrorKind::EngineUnavailable);

        assert_eq!(classify(failure(true, false, true)).kind(), ErrorKind::EngineUnavailable);
        assert_eq!(classify(failure(false, false, true)).kind(), ErrorKind::EngineUnavailable);
        assert_eq!(classify(failure(false, false, false)).kind(), ErrorKind::Unknown);
    }

    #[tokio::test]
    async fn test_refused_connection_is_unavailable() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = reqwest::Client::new()
            .get(format!("http://{}/health", addr))
            .send()
            .await
            .unwrap_err();
        let failure = TransportFailure::of(&err);
        assert!(failure.connect);
        assert!(!failure.timeout);

        let err = transport_error(err, Duration::from_secs(1), Duration::from_secs(1));
        assert_eq!(err.kind(), ErrorKind::EngineUnavailable);
    }

    #[test]
    fn test_classify_engine_error_body() {
        let body = r#"{"message":"Index `movies` not found.","code":"index_not_found","type":"invalid_request","link":"https://docs.meilisearch.com/errors#index_not_found"}"#;
        let err = classify_status(StatusCode::NOT_FOUND, body);
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.engine_code(), Some("index_not_found"));
        assert!(err.to_string().contains("movies"));
    }

    #[test]
    fn test_classify_status_codes() {
        let cases = [
            (StatusCode::UNAUTHORIZED, ErrorKind::Unauthorized),
            (StatusCode::FORBIDDEN, ErrorKind::Unauthorized),
            (StatusCode::BAD_REQUEST, ErrorKind::BadRequest),
            (StatusCode::CONFLICT, ErrorKind::BadRequest),
            (StatusCode::PAYLOAD_TOO_LARGE, ErrorKind::BadRequest),
            (StatusCode::SERVICE_UNAVAILABLE, ErrorKind::EngineUnavailable),
            (StatusCode::TOO_MANY_REQUESTS, ErrorKind::EngineUnavailable),
            (StatusCode::INTERNAL_SERVER_ERROR, ErrorKind::Unknown),
        ];
        for (status, kind) in cases {
            assert_eq!(classify_status(status, "").kind(), kind, "status {}", status);
        }
    }

    #[test]
    fn test_classify_falls_back_on_engine_type() {
        let body = r#"{"message":"The provided API key is invalid.","code":"invalid_api_key","type":"auth"}"#;
        let err = classify_status(StatusCode::INTERNAL_SERVER_ERROR, body);
        assert_eq!(err.kind(), ErrorKind::Unauthorized);

        let body = r#"{"message":"Task `7` not found.","code":"task_not_found","type":"invalid_request"}"#;
        let err = classify_status(StatusCode::INTERNAL_SERVER_ERROR, body);
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_classify_non_json_body() {
        let err = classify_status(StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded");
        assert_eq!(err.to_string(), "HTTP 500: upstream exploded");
    }

    #[test]
    fn test_classify_redacts_credentials() {
        let body = r#"{"message":"proxy error for http://user:pw@meili:7700 with api_key=abc123"}"#;
        let message = classify_status(StatusCode::BAD_GATEWAY, body).to_string();
        assert!(!message.contains("pw@"));
        assert!(!message.contains("abc123"));
    }
}
