use crate::error::{IndexError, Result, StorageError};
use crate::index::{DocId, TermIndex};
use crate::scorer::{self, Ranked};
use crate::store::{CorpusStore, Document};

/// A document paired with its similarity to some query.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    pub document: Document,
    pub score: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Inserted(DocId),
    Duplicate,
}

/// The store and the term index, mutated together.
///
/// Every successful store insert is followed by exactly one
/// `TermIndex::add_document` before `ingest` returns, so the index always
/// holds one profile per stored document in store order. The index is never
/// persisted; `open` rebuilds it from the store.
pub struct Corpus<S> {
    store: S,
    index: TermIndex,
    // set when a stored document could not be indexed
    stale: bool,
}

impl<S: CorpusStore> Corpus<S> {
    pub fn open(store: S) -> Result<Self> {
        let docs = store.all()?;
        let index = TermIndex::rebuild(docs.iter().map(|d| (d.id.as_str(), d.text.as_str())))?;
        tracing::info!(num_docs = index.len(), num_terms = index.vocabulary_len(), "corpus loaded");
        Ok(Self { store, index, stale: false })
    }

    /// Store first, index second. A storage failure leaves the index alone;
    /// an index failure leaves the stored document for [`reconcile`](Self::reconcile).
    ///
    /// While the index lags behind the store, new documents are indexed by
    /// reconciling so index order keeps following store order.
    pub fn ingest(&mut self, doc: &Document) -> Result<IngestOutcome> {
        if !self.store.insert(doc)? {
            return Ok(IngestOutcome::Duplicate);
        }
        if self.stale {
            self.reconcile()?;
            let last = self.index.len().saturating_sub(1) as DocId;
            return Ok(IngestOutcome::Inserted(last));
        }
        match self.index.add_document(&doc.id, &doc.text) {
            Ok(doc_id) => Ok(IngestOutcome::Inserted(doc_id)),
            Err(err) => {
                self.stale = true;
                Err(err.into())
            }
        }
    }

    /// Bring the index back in line with the store.
    ///
    /// If the index is a strict prefix of the store the missing documents are
    /// appended and their count returned. Any other mismatch is drift that
    /// cannot be repaired in place.
    pub fn reconcile(&mut self) -> std::result::Result<usize, IndexError> {
        let stored = self.store.len()?;
        if stored == self.index.len() {
            self.stale = false;
            return Ok(0);
        }
        let docs = self.store.all()?;
        for (position, indexed) in self.index.external_ids().enumerate() {
            let stored = docs.get(position).map(|d| d.id.as_str());
            if stored != Some(indexed) {
                return Err(IndexError::Drift {
                    position,
                    indexed: Some(indexed.to_string()),
                    stored: stored.map(str::to_string),
                });
            }
        }
        let missing = &docs[self.index.len()..];
        for doc in missing {
            self.index.add_document(&doc.id, &doc.text)?;
        }
        if !missing.is_empty() {
            tracing::warn!(healed = missing.len(), "re-indexed documents missing from the term index");
        }
        self.stale = false;
        Ok(missing.len())
    }

    /// Throw the index away and rebuild it from the store.
    pub fn rebuild_index(&mut self) -> Result<()> {
        let docs = self.store.all()?;
        self.index = TermIndex::rebuild(docs.iter().map(|d| (d.id.as_str(), d.text.as_str())))?;
        self.stale = false;
        tracing::info!(num_docs = self.index.len(), "term index rebuilt");
        Ok(())
    }

    pub fn rank(&self, query: &str) -> Vec<Ranked> {
        scorer::rank(&self.index, query)
    }

    /// Every stored document with its similarity to `query`, best first.
    pub fn score(&self, query: &str) -> std::result::Result<Vec<ScoredCandidate>, StorageError> {
        self.rank(query)
            .into_iter()
            .map(|r| {
                let document = self.resolve(r.doc)?;
                Ok(ScoredCandidate { document, score: r.score })
            })
            .collect()
    }

    /// Load the stored document behind an index position.
    pub fn resolve(&self, doc: DocId) -> std::result::Result<Document, StorageError> {
        let id = self
            .index
            .external_id(doc)
            .ok_or_else(|| StorageError::Corrupt(format!("no indexed document at position {doc}")))?;
        self.store
            .get(id)?
            .ok_or_else(|| StorageError::Corrupt(format!("indexed document {id} is not in the store")))
    }

    pub fn index(&self) -> &TermIndex { &self.index }

    pub fn store(&self) -> &S { &self.store }

    pub fn len(&self) -> usize { self.index.len() }

    pub fn is_empty(&self) -> bool { self.index.is_empty() }

    /// Index a document the store never saw and mark the index stale, the
    /// state a lost store write leaves behind.
    #[cfg(test)]
    pub(crate) fn index_unstored(&mut self, id: &str) {
        self.index.add_document(id, "unstored").unwrap();
        self.stale = true;
    }
}
