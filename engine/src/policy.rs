use crate::corpus::{Corpus, ScoredCandidate};
use crate::error::StorageError;
use crate::store::{CorpusStore, Document};

pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.8;

/// Why the best candidate was not used as a reply.
#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    EmptyCorpus,
    /// The best match is the query document itself.
    SelfMatch { score: f32 },
    BelowThreshold { candidate_id: String, score: f32 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Reply(ScoredCandidate),
    Rejected(Rejection),
}

/// Picks the rank-1 match and decides whether it is good enough to send.
///
/// Only rank 1 is ever considered: when it is rejected there is no reply,
/// even if rank 2 would pass. The chosen post is returned as-is, whether or
/// not it was itself an answer to anything.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetrievalPolicy {
    threshold: f32,
}

impl Default for RetrievalPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIDENCE_THRESHOLD)
    }
}

impl RetrievalPolicy {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f32 { self.threshold }

    /// The acceptance rules, applied to the top candidate's id and score.
    pub fn judge(&self, query_id: &str, top: Option<(&str, f32)>) -> Result<(), Rejection> {
        let Some((candidate_id, score)) = top else {
            return Err(Rejection::EmptyCorpus);
        };
        if candidate_id == query_id {
            return Err(Rejection::SelfMatch { score });
        }
        // no shared vocabulary is never a match, whatever the threshold
        if score.is_nan() || score <= 0.0 || score < self.threshold {
            return Err(Rejection::BelowThreshold { candidate_id: candidate_id.to_string(), score });
        }
        Ok(())
    }

    pub fn evaluate<S: CorpusStore>(&self, query: &Document, corpus: &Corpus<S>) -> Result<Decision, StorageError> {
        let top = corpus.rank(&query.text).into_iter().next();
        let top_id = top.and_then(|r| corpus.index().external_id(r.doc).map(|id| (id, r.score)));
        if let Err(rejection) = self.judge(&query.id, top_id) {
            return Ok(Decision::Rejected(rejection));
        }
        // judge only passes when there is a top candidate
        let Some(best) = top else { return Ok(Decision::Rejected(Rejection::EmptyCorpus)) };
        let document = corpus.resolve(best.doc)?;
        Ok(Decision::Reply(ScoredCandidate { document, score: best.score }))
    }

    /// The reply candidate for `query`, if any.
    pub fn select<S: CorpusStore>(&self, query: &Document, corpus: &Corpus<S>) -> Result<Option<ScoredCandidate>, StorageError> {
        match self.evaluate(query, corpus)? {
            Decision::Reply(candidate) => Ok(Some(candidate)),
            Decision::Rejected(_) => Ok(None),
        }
    }
}
