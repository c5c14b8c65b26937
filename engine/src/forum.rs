//! Interfaces to the forum the engine learns from and replies to.

use crate::error::{FetchError, ReplyError};
use crate::store::Document;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discussion {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
}

impl Discussion {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), title: None }
    }
}

#[async_trait]
pub trait ForumSource: Send + Sync {
    /// Recently active discussions. Paging and limits are up to the implementation.
    async fn fetch_recent_discussions(&self) -> Result<Vec<Discussion>, FetchError>;

    /// Posts of one discussion, oldest first.
    async fn fetch_posts(&self, discussion_id: &str) -> Result<Vec<Document>, FetchError>;
}

#[async_trait]
pub trait ReplySink: Send + Sync {
    /// Post `text` into the discussion. Formatting and retries belong to the sink.
    async fn emit_reply(&self, discussion_id: &str, text: &str) -> Result<(), ReplyError>;
}
