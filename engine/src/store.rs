use crate::error::StorageError;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::Transactional;
use std::collections::HashMap;
use std::path::Path;
use time::format_description::well_known::Rfc3339;

/// A forum post as seen by the engine. Identity is `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub text: String,
    pub discussion_id: String,
}

impl Document {
    pub fn new(id: impl Into<String>, text: impl Into<String>, discussion_id: impl Into<String>) -> Self {
        Self { id: id.into(), text: text.into(), discussion_id: discussion_id.into() }
    }
}

/// Durable, deduplicated record of every ingested post.
///
/// `insert` must perform its duplicate check and its write atomically, and the
/// write must be durable before the document shows up in `all()`.
pub trait CorpusStore: Send + Sync {
    fn contains(&self, id: &str) -> Result<bool, StorageError>;
    /// Returns `Ok(false)` without touching anything if `doc.id` is already stored.
    fn insert(&self, doc: &Document) -> Result<bool, StorageError>;
    fn get(&self, id: &str) -> Result<Option<Document>, StorageError>;
    /// Every stored document, in insertion order.
    fn all(&self) -> Result<Vec<Document>, StorageError>;
    fn len(&self) -> Result<usize, StorageError>;

    fn is_empty(&self) -> Result<bool, StorageError> {
        Ok(self.len()? == 0)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredPost {
    text: String,
    discussion_id: String,
    ingested_at: String,
}

impl StoredPost {
    fn into_document(self, id: String) -> Document {
        Document { id, text: self.text, discussion_id: self.discussion_id }
    }
}

const POSTS_TREE: &str = "posts";
const ORDER_TREE: &str = "order";

/// sled-backed store: `posts` maps id -> post record, `order` maps a
/// big-endian sequence number -> id so iteration follows insertion order.
pub struct SledCorpusStore {
    db: sled::Db,
    posts: sled::Tree,
    order: sled::Tree,
}

impl SledCorpusStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// Store that lives only as long as the process; for tests and dry runs.
    pub fn temporary() -> Result<Self, StorageError> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: sled::Db) -> Result<Self, StorageError> {
        let posts = db.open_tree(POSTS_TREE)?;
        let order = db.open_tree(ORDER_TREE)?;
        Ok(Self { db, posts, order })
    }

    fn decode_post(id: &[u8], bytes: &[u8]) -> Result<Document, StorageError> {
        let id = String::from_utf8(id.to_vec())
            .map_err(|e| StorageError::Corrupt(format!("non-utf8 post id: {e}")))?;
        let post: StoredPost = bincode::deserialize(bytes)?;
        Ok(post.into_document(id))
    }
}

impl CorpusStore for SledCorpusStore {
    fn contains(&self, id: &str) -> Result<bool, StorageError> {
        Ok(self.posts.contains_key(id.as_bytes())?)
    }

    fn insert(&self, doc: &Document) -> Result<bool, StorageError> {
        let record = StoredPost {
            text: doc.text.clone(),
            discussion_id: doc.discussion_id.clone(),
            ingested_at: now_rfc3339(),
        };
        let bytes = bincode::serialize(&record)?;
        let seq = self.db.generate_id()?.to_be_bytes();

        let outcome = (&self.posts, &self.order).transaction(|(posts, order)| {
            if posts.get(doc.id.as_bytes())?.is_some() {
                return Ok(false);
            }
            posts.insert(doc.id.as_bytes(), bytes.as_slice())?;
            order.insert(&seq[..], doc.id.as_bytes())?;
            Ok::<_, ConflictableTransactionError<()>>(true)
        });
        let inserted = match outcome {
            Ok(inserted) => inserted,
            Err(TransactionError::Storage(e)) => return Err(e.into()),
            Err(TransactionError::Abort(())) => {
                return Err(StorageError::Unavailable("insert transaction aborted".into()))
            }
        };
        if inserted {
            self.db.flush()?;
        }
        Ok(inserted)
    }

    fn get(&self, id: &str) -> Result<Option<Document>, StorageError> {
        match self.posts.get(id.as_bytes())? {
            Some(bytes) => Ok(Some(Self::decode_post(id.as_bytes(), &bytes)?)),
            None => Ok(None),
        }
    }

    fn all(&self) -> Result<Vec<Document>, StorageError> {
        let mut docs = Vec::with_capacity(self.order.len());
        for entry in self.order.iter() {
            let (_seq, id) = entry?;
            let bytes = self.posts.get(&id)?.ok_or_else(|| {
                StorageError::Corrupt(format!(
                    "order entry {} has no post record",
                    String::from_utf8_lossy(&id)
                ))
            })?;
            docs.push(Self::decode_post(&id, &bytes)?);
        }
        Ok(docs)
    }

    fn len(&self) -> Result<usize, StorageError> {
        Ok(self.posts.len())
    }
}

/// In-memory store. Nothing survives the process.
#[derive(Default)]
pub struct MemoryCorpusStore {
    inner: RwLock<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    posts: HashMap<String, Document>,
    order: Vec<String>,
}

impl MemoryCorpusStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CorpusStore for MemoryCorpusStore {
    fn contains(&self, id: &str) -> Result<bool, StorageError> {
        Ok(self.inner.read().posts.contains_key(id))
    }

    fn insert(&self, doc: &Document) -> Result<bool, StorageError> {
        let mut inner = self.inner.write();
        if inner.posts.contains_key(&doc.id) {
            return Ok(false);
        }
        inner.posts.insert(doc.id.clone(), doc.clone());
        inner.order.push(doc.id.clone());
        Ok(true)
    }

    fn get(&self, id: &str) -> Result<Option<Document>, StorageError> {
        Ok(self.inner.read().posts.get(id).cloned())
    }

    fn all(&self) -> Result<Vec<Document>, StorageError> {
        let inner = self.inner.read();
        inner
            .order
            .iter()
            .map(|id| {
                inner
                    .posts
                    .get(id)
                    .cloned()
                    .ok_or_else(|| StorageError::Corrupt(format!("order entry {id} has no post record")))
            })
            .collect()
    }

    fn len(&self) -> Result<usize, StorageError> {
        Ok(self.inner.read().order.len())
    }
}

fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default()
}
