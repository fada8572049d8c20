//! Strongly constrained inputs for engine calls.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Error, Result};

const MAX_INDEX_UID_LENGTH: usize = 400;

pub const DEFAULT_OFFSET: u64 = 0;
pub const DEFAULT_LIMIT: u64 = 20;

/// A validated index identifier: non-empty, at most 400 characters of
/// `[A-Za-z0-9_-]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct IndexUid(String);

impl IndexUid {
    pub fn new(uid: impl Into<String>) -> Result<Self> {
        let uid = uid.into();
        if uid.is_empty() {
            return Err(Error::invalid_arguments("index uid must not be empty"));
        }
        if uid.chars().count() > MAX_INDEX_UID_LENGTH {
            return Err(Error::invalid_arguments(format!(
                "index uid must be at most {} characters",
                MAX_INDEX_UID_LENGTH
            )));
        }
        if !uid
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(Error::invalid_arguments(format!(
                "index uid '{}' may only contain alphanumeric characters, '-' and '_'",
                uid
            )));
        }
        Ok(Self(uid))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IndexUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for IndexUid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for IndexUid {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        Self::new(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: DEFAULT_OFFSET,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl Pagination {
    pub fn new(offset: Option<u64>, limit: Option<u64>) -> Self {
        Self {
            offset: offset.unwrap_or(DEFAULT_OFFSET),
            limit: limit.unwrap_or(DEFAULT_LIMIT),
        }
    }

    pub(crate) fn query_pairs(&self) -> [(&'static str, String); 2] {
        [
            ("offset", self.offset.to_string()),
            ("limit", self.limit.to_string()),
        ]
    }
}

/// Hybrid (keyword plus semantic) search options.
///
/// Only constructible through [`HybridOptions::new`], so a value in hand
/// always has a ratio within `[0.0, 1.0]` and a non-empty embedder.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HybridOptions {
    semantic_ratio: f64,
    embedder: String,
}

impl HybridOptions {
    pub fn new(semantic_ratio: f64, embedder: impl Into<String>) -> Result<Self> {
        if !(0.0..=1.0).contains(&semantic_ratio) {
            return Err(Error::invalid_arguments(format!(
                "semanticRatio must be between 0.0 and 1.0, got {}",
                semantic_ratio
            )));
        }
        let embedder = embedder.into();
        if embedder.trim().is_empty() {
            return Err(Error::invalid_arguments(
                "hybrid search requires a non-empty embedder",
            ));
        }
        Ok(Self {
            semantic_ratio,
            embedder,
        })
    }

    /// Parse the `hybrid` argument object sent by the host.
    pub fn from_value(value: &Value) -> Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| Error::invalid_arguments("hybrid must be an object"))?;
        let ratio = match obj.get("semanticRatio") {
            None | Some(Value::Null) => {
                return Err(Error::invalid_arguments("hybrid.semanticRatio is required"));
            }
            Some(v) => v
                .as_f64()
                .ok_or_else(|| Error::invalid_arguments("hybrid.semanticRatio must be a number"))?,
        };
        let embedder = match obj.get("embedder") {
            Some(Value::String(s)) => s.as_str(),
            None | Some(Value::Null) => {
                return Err(Error::invalid_arguments("hybrid.embedder is required"));
            }
            Some(_) => return Err(Error::invalid_arguments("hybrid.embedder must be a string")),
        };
        if let Some(unknown) = obj
            .keys()
            .find(|k| !matches!(k.as_str(), "semanticRatio" | "embedder"))
        {
            return Err(Error::invalid_arguments(format!(
                "unknown hybrid option '{}'",
                unknown
            )));
        }
        Self::new(ratio, embedder)
    }

    pub fn semantic_ratio(&self) -> f64 {
        self.semantic_ratio
    }

    pub fn embedder(&self) -> &str {
        &self.embedder
    }
}

/// Body of `POST /indexes/{uid}/search`.
#[derive(Debug, Clone, Serialize)]
pub struct SearchRequest {
    q: String,
    limit: u64,
    offset: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sort: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    hybrid: Option<HybridOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    vector: Option<Vec<f64>>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            q: query.into(),
            limit: DEFAULT_LIMIT,
            offset: DEFAULT_OFFSET,
            filter: None,
            sort: None,
            hybrid: None,
            vector: None,
        }
    }

    pub fn pagination(mut self, page: Pagination) -> Self {
        self.offset = page.offset;
        self.limit = page.limit;
        self
    }

    /// Filter expression, either a string or the engine's nested array form.
    pub fn filter(mut self, filter: Value) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn sort(mut self, sort: Vec<String>) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn hybrid(mut self, hybrid: HybridOptions) -> Self {
        self.hybrid = Some(hybrid);
        self
    }

    pub fn vector(mut self, vector: Vec<f64>) -> Self {
        self.vector = Some(vector);
        self
    }

    pub fn query(&self) -> &str {
        &self.q
    }
}

/// Filters for `GET /tasks` and `POST /tasks/cancel`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskFilter {
    pub limit: Option<u64>,
    pub from: Option<u64>,
    pub reverse: Option<bool>,
    pub uids: Vec<u64>,
    pub batch_uids: Vec<u64>,
    pub canceled_by: Vec<u64>,
    pub types: Vec<String>,
    pub statuses: Vec<String>,
    pub index_uids: Vec<String>,
    pub after_enqueued_at: Option<String>,
    pub before_enqueued_at: Option<String>,
    pub after_started_at: Option<String>,
    pub before_started_at: Option<String>,
    pub after_finished_at: Option<String>,
    pub before_finished_at: Option<String>,
}

impl TaskFilter {
    /// True when no selector narrows the task set. Pagination alone does not count.
    pub fn is_unfiltered(&self) -> bool {
        self.uids.is_empty()
            && self.batch_uids.is_empty()
            && self.canceled_by.is_empty()
            && self.types.is_empty()
            && self.statuses.is_empty()
            && self.index_uids.is_empty()
            && self.after_enqueued_at.is_none()
            && self.before_enqueued_at.is_none()
            && self.after_started_at.is_none()
            && self.before_started_at.is_none()
            && self.after_finished_at.is_none()
            && self.before_finished_at.is_none()
    }

    /// Query parameters in engine form; lists are comma-joined.
    pub(crate) fn query_pairs(&self) -> Vec<(&'static str, String)> {
        fn join<T: ToString>(items: &[T]) -> String {
            items.iter().map(ToString::to_string).collect::<Vec<_>>().join(",")
        }

        let mut pairs = Vec::new();
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }
        if let Some(from) = self.from {
            pairs.push(("from", from.to_string()));
        }
        if let Some(reverse) = self.reverse {
            pairs.push(("reverse", reverse.to_string()));
        }
        let lists = [
            ("uids", join(&self.uids)),
            ("batchUids", join(&self.batch_uids)),
            ("canceledBy", join(&self.canceled_by)),
            ("types", join(&self.types)),
            ("statuses", join(&self.statuses)),
            ("indexUids", join(&self.index_uids)),
        ];
        pairs.extend(lists.into_iter().filter(|(_, v)| !v.is_empty()));
        let dates = [
            ("afterEnqueuedAt", &self.after_enqueued_at),
            ("beforeEnqueuedAt", &self.before_enqueued_at),
            ("afterStartedAt", &self.after_started_at),
            ("beforeStartedAt", &self.before_started_at),
            ("afterFinishedAt", &self.after_finished_at),
            ("beforeFinishedAt", &self.before_finished_at),
        ];
        pairs.extend(
            dates
                .into_iter()
                .filter_map(|(name, value)| value.clone().map(|v| (name, v))),
        );
        pairs
    }
}

/// Body of `POST /keys`. `expiresAt` is always sent; `null` means no expiry.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateKeyRequest {
    pub actions: Vec<String>,
    pub indexes: Vec<String>,
    pub expires_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
}

impl CreateKeyRequest {
    pub fn new(actions: Vec<String>, indexes: Vec<String>) -> Self {
        Self {
            actions,
            indexes,
            expires_at: None,
            name: None,
            description: None,
            uid: None,
        }
    }
}

/// One turn of a chat conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }

    pub(crate) fn from_object(map: &Map<String, Value>) -> Result<Self> {
        let field = |name: &str| -> Result<String> {
            match map.get(name) {
                Some(Value::String(s)) => Ok(s.clone()),
                _ => Err(Error::invalid_arguments(format!(
                    "each message requires a string '{}'",
                    name
                ))),
            }
        };
        Ok(Self::new(field("role")?, field("content")?))
    }
}
