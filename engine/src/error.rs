use thiserror::Error;

/// Durable read/write failure in a [`CorpusStore`](crate::CorpusStore).
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("failed to encode or decode stored post: {0}")]
    Codec(#[from] bincode::Error),

    #[error("corrupt store: {0}")]
    Corrupt(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Failure reported by a [`ForumSource`](crate::ForumSource).
#[derive(Debug, Error)]
#[error("fetch failed: {0:#}")]
pub struct FetchError(#[source] pub anyhow::Error);

impl FetchError {
    pub fn new(err: impl Into<anyhow::Error>) -> Self {
        Self(err.into())
    }
}

/// Failure reported by a [`ReplySink`](crate::ReplySink).
#[derive(Debug, Error)]
#[error("reply failed: {0:#}")]
pub struct ReplyError(#[source] pub anyhow::Error);

impl ReplyError {
    pub fn new(err: impl Into<anyhow::Error>) -> Self {
        Self(err.into())
    }
}

/// The term index no longer mirrors the store. Fatal to the current cycle.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("index drift at position {position}: index has {indexed:?}, store has {stored:?}")]
    Drift {
        position: usize,
        indexed: Option<String>,
        stored: Option<String>,
    },

    #[error("index capacity exhausted: {0}")]
    Capacity(&'static str),

    #[error("could not read store while reconciling index: {0}")]
    Storage(#[from] StorageError),
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Index(#[from] IndexError),
}

pub type Result<T> = std::result::Result<T, EngineError>;
