//! Request core shared by the engine and chat clients.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use reqwest::Method;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use url::Url;

use super::error::{check_response, transport_error};
use super::network::{ConnectionPool, PooledClient};
use crate::security::{display_url, redact_path, summarize_body};
use crate::{Error, Result};

pub(crate) type Query<'a> = &'a [(&'static str, String)];

pub(crate) struct Transport {
    base_url: Url,
    api_key: Option<SecretString>,
    pool: Arc<ConnectionPool>,
    request_timeout: Duration,
    closed: AtomicBool,
}

impl Transport {
    pub(crate) fn new(
        base_url: Url,
        api_key: Option<SecretString>,
        pool: Arc<ConnectionPool>,
        request_timeout: Duration,
    ) -> Self {
        let api_key = api_key.filter(|k| !k.expose_secret().trim().is_empty());
        Self {
            base_url,
            api_key,
            pool,
            request_timeout,
            closed: AtomicBool::new(false),
        }
    }

    pub(crate) fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub(crate) fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    pub(crate) fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst) || self.pool.is_closed()
    }

    /// Base URL joined with percent-encoded path segments and query pairs.
    pub(crate) fn endpoint(&self, segments: &[&str], query: Query<'_>) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::Config(format!("{} cannot be a base URL", display_url(&self.base_url))))?
            .pop_if_empty()
            .extend(segments);
        if !query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(query.iter().map(|(k, v)| (*k, v.as_str())));
        }
        Ok(url)
    }

    pub(crate) async fn get(&self, op: &'static str, segments: &[&str], query: Query<'_>) -> Result<Value> {
        self.call(op, Method::GET, segments, query, None, self.request_timeout)
            .await
    }

    pub(crate) async fn post(
        &self,
        op: &'static str,
        segments: &[&str],
        query: Query<'_>,
        body: &Value,
    ) -> Result<Value> {
        self.call(op, Method::POST, segments, query, Some(body), self.request_timeout)
            .await
    }

    pub(crate) async fn put(
        &self,
        op: &'static str,
        segments: &[&str],
        query: Query<'_>,
        body: &Value,
    ) -> Result<Value> {
        self.call(op, Method::PUT, segments, query, Some(body), self.request_timeout)
            .await
    }

    pub(crate) async fn patch(&self, op: &'static str, segments: &[&str], body: &Value) -> Result<Value> {
        self.call(op, Method::PATCH, segments, &[], Some(body), self.request_timeout)
            .await
    }

    pub(crate) async fn delete(&self, op: &'static str, segments: &[&str]) -> Result<Value> {
        self.call(op, Method::DELETE, segments, &[], None, self.request_timeout)
            .await
    }

    /// One round trip returning the decoded JSON body, or `Null` when the
    /// engine answers without one.
    pub(crate) async fn call(
        &self,
        op: &'static str,
        method: Method,
        segments: &[&str],
        query: Query<'_>,
        body: Option<&Value>,
        timeout: Duration,
    ) -> Result<Value> {
        let (conn, response) = self
            .exchange(op, method, segments, query, body, timeout)
            .await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| transport_error(e, conn_timeout(&self.pool), timeout))?;
        drop(conn);

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Send a request and hand back the checked response together with the
    /// connection it holds, for callers that consume the body incrementally.
    pub(crate) async fn exchange(
        &self,
        op: &'static str,
        method: Method,
        segments: &[&str],
        query: Query<'_>,
        body: Option<&Value>,
        timeout: Duration,
    ) -> Result<(PooledClient, reqwest::Response)> {
        if self.is_closed() {
            return Err(Error::EngineUnavailable(
                "client was closed after a connection change".into(),
            ));
        }
        let url = self.endpoint(segments, query)?;

        tracing::debug!(
            op,
            method = %method,
            path = %redact_path(url.path()),
            args = %body.map(summarize_body).unwrap_or_default(),
            "Engine request"
        );

        let conn = self.pool.acquire().await?;
        let mut request = conn.request(method, url).timeout(timeout);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose_secret().trim());
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| transport_error(e, conn_timeout(&self.pool), timeout))
            .inspect_err(|e| tracing::debug!(op, error = %e, "Engine request failed"))?;
        let response = check_response(response).await?;
        Ok((conn, response))
    }
}

fn conn_timeout(pool: &ConnectionPool) -> Duration {
    pool.config().connect_timeout
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("base_url", &display_url(&self.base_url))
            .field("api_key", &crate::security::mask_secret(self.api_key.as_ref()))
            .field("request_timeout", &self.request_timeout)
            .field("closed", &self.is_closed())
            .finish()
    }
}
