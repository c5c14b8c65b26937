//! Similarity retrieval over a growing corpus of forum posts.
//!
//! Posts go into a deduplicated [`CorpusStore`], each stored post is added to
//! the [`TermIndex`], and the [`RetrievalPolicy`] picks the most similar
//! earlier post as a reply candidate when it scores high enough.

pub mod corpus;
pub mod error;
pub mod forum;
pub mod index;
pub mod orchestrator;
pub mod policy;
pub mod scorer;
pub mod store;
pub mod tokenizer;

pub use corpus::{Corpus, IngestOutcome, ScoredCandidate};
pub use error::{EngineError, FetchError, IndexError, ReplyError, StorageError};
pub use forum::{Discussion, ForumSource, ReplySink};
pub use index::{DocId, DocRef, TermId, TermIndex, TermProfile};
pub use orchestrator::{CycleReport, Orchestrator, StopFlag};
pub use policy::{Decision, Rejection, RetrievalPolicy, DEFAULT_CONFIDENCE_THRESHOLD};
pub use store::{CorpusStore, Document, MemoryCorpusStore, SledCorpusStore};
