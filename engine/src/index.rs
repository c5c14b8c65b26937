use crate::error::IndexError;
use crate::tokenizer::tokenize;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub type TermId = u32;
pub type DocId = u32;

/// Raw term counts for one piece of text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TermProfile {
    pub counts: HashMap<String, u32>,
}

impl TermProfile {
    pub fn from_text(text: &str) -> Self {
        let mut counts: HashMap<String, u32> = HashMap::new();
        for token in tokenize(text) {
            *counts.entry(token).or_insert(0) += 1;
        }
        Self { counts }
    }

    pub fn tf(&self, term: &str) -> u32 {
        self.counts.get(term).copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexedDoc {
    external_id: String,
    // sorted by term id so float sums over it are reproducible
    tf: Vec<(TermId, u32)>,
}

impl IndexedDoc {
    fn tf(&self, tid: TermId) -> u32 {
        match self.tf.binary_search_by_key(&tid, |(t, _)| *t) {
            Ok(pos) => self.tf[pos].1,
            Err(_) => 0,
        }
    }
}

/// Which side of a comparison a weight is computed for.
#[derive(Debug, Clone, Copy)]
pub enum DocRef<'a> {
    /// A document already in the index, by position.
    Indexed(DocId),
    /// Text that is not part of the index. It is not counted in N or df.
    Query(&'a TermProfile),
}

/// Incremental TF-IDF statistics over the whole corpus.
///
/// Per-document term counts never change once added; IDF is derived from
/// `df` and the document count at lookup time, so every add shifts the
/// weights of all earlier documents.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct TermIndex {
    dictionary: HashMap<String, TermId>,
    df: Vec<u32>,
    docs: Vec<IndexedDoc>,
    generation: u64,
}

impl TermIndex {
    pub fn new() -> Self { Self::default() }

    /// Build an index from scratch, e.g. from `CorpusStore::all()`.
    pub fn rebuild<'a, I>(documents: I) -> Result<Self, IndexError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut index = Self::new();
        for (id, text) in documents {
            index.add_document(id, text)?;
        }
        Ok(index)
    }

    /// Append a document. The only way the index is mutated.
    pub fn add_document(&mut self, external_id: &str, text: &str) -> Result<DocId, IndexError> {
        let doc_id = DocId::try_from(self.docs.len()).map_err(|_| IndexError::Capacity("document ids"))?;
        let profile = TermProfile::from_text(text);

        let new_terms = profile.counts.keys().filter(|t| !self.dictionary.contains_key(*t)).count();
        if self.dictionary.len().saturating_add(new_terms) > TermId::MAX as usize {
            return Err(IndexError::Capacity("term ids"));
        }

        let mut tf: Vec<(TermId, u32)> = Vec::with_capacity(profile.counts.len());
        for (term, count) in profile.counts {
            let next = self.dictionary.len() as TermId;
            let tid = *self.dictionary.entry(term).or_insert(next);
            if tid as usize == self.df.len() {
                self.df.push(0);
            }
            // each key is distinct, so df moves once per document
            self.df[tid as usize] += 1;
            tf.push((tid, count));
        }
        tf.sort_unstable_by_key(|(t, _)| *t);

        self.docs.push(IndexedDoc { external_id: external_id.to_string(), tf });
        self.generation += 1;
        Ok(doc_id)
    }

    pub fn len(&self) -> usize { self.docs.len() }

    pub fn is_empty(&self) -> bool { self.docs.is_empty() }

    pub fn vocabulary_len(&self) -> usize { self.dictionary.len() }

    /// Bumped on every `add_document`.
    pub fn generation(&self) -> u64 { self.generation }

    pub fn external_id(&self, doc: DocId) -> Option<&str> {
        self.docs.get(doc as usize).map(|d| d.external_id.as_str())
    }

    pub fn external_ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.docs.iter().map(|d| d.external_id.as_str())
    }

    pub fn doc_freq(&self, term: &str) -> u32 {
        self.dictionary.get(term).map(|&tid| self.df[tid as usize]).unwrap_or(0)
    }

    /// `1 + ln((1 + N) / (1 + df))`. Finite and positive for any corpus,
    /// including an empty one.
    pub fn idf(&self, term: &str) -> f32 {
        self.idf_for_df(self.doc_freq(term))
    }

    fn idf_for_df(&self, df: u32) -> f32 {
        let n = self.docs.len() as f32;
        1.0 + ((1.0 + n) / (1.0 + df as f32)).ln()
    }

    /// Raw term count of `term` in an indexed document.
    pub fn tf(&self, term: &str, doc: DocId) -> u32 {
        let Some(d) = self.docs.get(doc as usize) else { return 0 };
        self.dictionary.get(term).map(|&tid| d.tf(tid)).unwrap_or(0)
    }

    /// TF-IDF weight of `term` for an indexed document or for query text.
    pub fn weight(&self, term: &str, doc: DocRef<'_>) -> f32 {
        let tf = match doc {
            DocRef::Indexed(id) => self.tf(term, id),
            DocRef::Query(profile) => profile.tf(term),
        };
        if tf == 0 {
            return 0.0;
        }
        tf as f32 * self.idf(term)
    }

    /// Term counts of an indexed document, keyed by term text.
    pub fn profile(&self, doc: DocId) -> Option<TermProfile> {
        let d = self.docs.get(doc as usize)?;
        let mut names: HashMap<TermId, &str> = HashMap::with_capacity(d.tf.len());
        for (term, tid) in &self.dictionary {
            if d.tf(*tid) > 0 {
                names.insert(*tid, term.as_str());
            }
        }
        let counts = d
            .tf
            .iter()
            .filter_map(|(tid, c)| names.get(tid).map(|t| (t.to_string(), *c)))
            .collect();
        Some(TermProfile { counts })
    }

    pub(crate) fn doc_terms(&self, doc: DocId) -> impl Iterator<Item = (TermId, u32)> + '_ {
        self.docs
            .get(doc as usize)
            .into_iter()
            .flat_map(|d| d.tf.iter().copied())
    }

    pub(crate) fn term_id(&self, term: &str) -> Option<TermId> {
        self.dictionary.get(term).copied()
    }

    pub(crate) fn idf_by_id(&self, tid: TermId) -> f32 {
        self.idf_for_df(self.df.get(tid as usize).copied().unwrap_or(0))
    }
}
