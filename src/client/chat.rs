//! Chat workspaces and conversational completions.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use futures::{Stream, TryStreamExt};
use pin_project_lite::pin_project;
use reqwest::Method;
use secrecy::SecretString;
use serde_json::{Value, json};
use url::Url;

use super::network::{ConnectionPool, PooledClient};
use super::transport::Transport;
use super::types::{ChatMessage, Pagination};
use super::ClientOptions;
use crate::security::redact_message;
use crate::{Error, Result};

pub const DEFAULT_CHAT_MODEL: &str = "gpt-3.5-turbo";

/// Auxiliary client for the engine's chat routes.
#[derive(Debug)]
pub struct ChatClient {
    transport: Transport,
}

impl ChatClient {
    pub fn new(
        base_url: Url,
        api_key: Option<SecretString>,
        pool: Arc<ConnectionPool>,
        options: &ClientOptions,
    ) -> Self {
        Self {
            transport: Transport::new(base_url, api_key, pool, options.request_timeout),
        }
    }

    pub fn close(&self) {
        self.transport.close();
    }

    pub fn is_closed(&self) -> bool {
        self.transport.is_closed()
    }

    /// Run a completion and return the assistant's full reply.
    ///
    /// Streamed replies are assembled from the `choices[0].delta.content`
    /// fragments; a non-streamed reply is read from `choices[0].message.content`.
    pub async fn completion(
        &self,
        workspace: &str,
        model: &str,
        messages: &[ChatMessage],
        stream: bool,
    ) -> Result<String> {
        let workspace = require_workspace(workspace)?;
        if messages.is_empty() {
            return Err(Error::invalid_arguments("messages must not be empty"));
        }
        let body = json!({ "model": model, "messages": messages, "stream": stream });
        let timeout = self.transport.request_timeout();

        tracing::info!(workspace, model, stream, "Creating chat completion");
        let (conn, response) = self
            .transport
            .exchange(
                "chat_completion",
                Method::POST,
                &["chats", workspace, "chat", "completions"],
                &[],
                Some(&body),
                timeout,
            )
            .await?;

        if !stream {
            let reply: Value = response.json().await.map_err(|e| body_error(e, timeout))?;
            drop(conn);
            return Ok(reply
                .pointer("/choices/0/message/content")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| reply.to_string()));
        }

        let reply: String = ChatStream::new(response.bytes_stream(), conn, timeout)
            .try_collect()
            .await?;
        tracing::debug!(workspace, chars = reply.chars().count(), "Chat completion finished");
        Ok(reply)
    }

    pub async fn workspaces(&self, page: Pagination) -> Result<Value> {
        self.transport
            .get("chat_workspaces", &["chats"], &page.query_pairs())
            .await
    }

    pub async fn workspace_settings(&self, workspace: &str) -> Result<Value> {
        let workspace = require_workspace(workspace)?;
        self.transport
            .get("chat_workspace_settings", &["chats", workspace, "settings"], &[])
            .await
    }

    pub async fn update_workspace_settings(&self, workspace: &str, settings: &Value) -> Result<Value> {
        let workspace = require_workspace(workspace)?;
        if !settings.is_object() {
            return Err(Error::invalid_arguments("settings must be an object"));
        }
        self.transport
            .patch(
                "update_chat_workspace_settings",
                &["chats", workspace, "settings"],
                settings,
            )
            .await
    }
}

fn require_workspace(workspace: &str) -> Result<&str> {
    let workspace = workspace.trim();
    if workspace.is_empty() {
        return Err(Error::invalid_arguments("workspace_uid must not be empty"));
    }
    Ok(workspace)
}

fn body_error(err: reqwest::Error, timeout: Duration) -> Error {
    if err.is_timeout() {
        Error::Timeout(timeout)
    } else {
        Error::EngineUnavailable(redact_message(&err.without_url().to_string(), None))
    }
}

pin_project! {
    /// Content fragments of a streamed completion, ending at `[DONE]`.
    ///
    /// Holds its pooled connection until the stream is dropped.
    pub struct ChatStream<S> {
        #[pin]
        inner: S,
        buffer: Vec<u8>,
        pos: usize,
        done: bool,
        timeout: Duration,
        _conn: PooledClient,
    }
}

impl<S> ChatStream<S>
where
    S: Stream<Item = std::result::Result<Bytes, reqwest::Error>>,
{
    pub fn new(inner: S, conn: PooledClient, timeout: Duration) -> Self {
        Self {
            inner,
            buffer: Vec::with_capacity(4096),
            pos: 0,
            done: false,
            timeout,
            _conn: conn,
        }
    }
}

enum Line {
    Content(String),
    Done,
    Skip,
}

fn parse_line(line: &str) -> Line {
    let Some(data) = line.trim().strip_prefix("data:") else {
        return Line::Skip;
    };
    let data = data.trim();
    if data == "[DONE]" {
        return Line::Done;
    }
    match serde_json::from_str::<Value>(data) {
        Ok(chunk) => chunk
            .pointer("/choices/0/delta/content")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(|s| Line::Content(s.to_string()))
            .unwrap_or(Line::Skip),
        Err(e) => {
            tracing::debug!("Skipping malformed chat chunk: {}", e);
            Line::Skip
        }
    }
}

impl<S> Stream for ChatStream<S>
where
    S: Stream<Item = std::result::Result<Bytes, reqwest::Error>>,
{
    type Item = Result<String>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();
        if *this.done {
            return Poll::Ready(None);
        }

        loop {
            if let Some(rel) = this.buffer[*this.pos..].iter().position(|b| *b == b'\n') {
                let start = *this.pos;
                let end = start + rel;
                *this.pos = end + 1;
                let line = String::from_utf8_lossy(&this.buffer[start..end]).into_owned();

                if this.buffer.len() > 8192 && *this.pos > this.buffer.len() / 2 {
                    this.buffer.drain(..*this.pos);
                    *this.pos = 0;
                }

                match parse_line(&line) {
                    Line::Content(text) => return Poll::Ready(Some(Ok(text))),
                    Line::Done => {
                        *this.done = true;
                        return Poll::Ready(None);
                    }
                    Line::Skip => continue,
                }
            }

            match this.inner.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    this.buffer.extend_from_slice(&bytes);
                }
                Poll::Ready(Some(Err(e))) => {
                    *this.done = true;
                    return Poll::Ready(Some(Err(body_error(e, *this.timeout))));
                }
                Poll::Ready(None) => {
                    *this.done = true;
                    let rest = String::from_utf8_lossy(&this.buffer[*this.pos..]).into_owned();
                    *this.pos = this.buffer.len();
                    return match parse_line(&rest) {
                        Line::Content(text) => Poll::Ready(Some(Ok(text))),
                        _ => Poll::Ready(None),
                    };
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
