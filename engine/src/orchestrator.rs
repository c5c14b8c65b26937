//! One refresh cycle: pull discussions, learn unseen posts, maybe reply.

use crate::corpus::{Corpus, IngestOutcome};
use crate::error::{EngineError, IndexError};
use crate::forum::{Discussion, ForumSource, ReplySink};
use crate::policy::{Decision, RetrievalPolicy};
use crate::store::{CorpusStore, Document};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Raised to stop a cycle after the discussion in progress.
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self { Self::default() }

    pub fn raise(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub discussions: usize,
    pub posts_seen: usize,
    pub inserted: usize,
    pub duplicates: usize,
    pub reindexed: usize,
    pub storage_failures: usize,
    pub index_failures: usize,
    pub fetch_failures: usize,
    pub replies: usize,
    pub reply_failures: usize,
    pub stopped_early: bool,
}

pub struct Orchestrator<S> {
    corpus: Corpus<S>,
    policy: RetrievalPolicy,
}

impl<S: CorpusStore> Orchestrator<S> {
    pub fn new(corpus: Corpus<S>, policy: RetrievalPolicy) -> Self {
        Self { corpus, policy }
    }

    pub fn corpus(&self) -> &Corpus<S> { &self.corpus }

    pub fn policy(&self) -> &RetrievalPolicy { &self.policy }

    /// Recovery path after a cycle failed with [`IndexError`].
    pub fn rebuild_index(&mut self) -> Result<(), EngineError> {
        self.corpus.rebuild_index()
    }

    /// Run one cycle to completion.
    ///
    /// Fetch, storage and reply failures are confined to the discussion or
    /// post they happened in. Only a store/index mismatch that cannot be
    /// repaired aborts the cycle.
    pub async fn run_cycle(
        &mut self,
        source: &dyn ForumSource,
        sink: &dyn ReplySink,
        stop: &StopFlag,
    ) -> Result<CycleReport, IndexError> {
        let mut report = CycleReport { reindexed: self.corpus.reconcile()?, ..Default::default() };

        let discussions = match source.fetch_recent_discussions().await {
            Ok(discussions) => discussions,
            Err(err) => {
                tracing::warn!(error = %err, "could not list discussions");
                report.fetch_failures += 1;
                return Ok(report);
            }
        };

        for discussion in &discussions {
            if stop.is_raised() {
                report.stopped_early = true;
                break;
            }
            report.discussions += 1;
            self.process_discussion(discussion, source, sink, &mut report).await?;
        }

        tracing::info!(
            discussions = report.discussions,
            posts_seen = report.posts_seen,
            inserted = report.inserted,
            replies = report.replies,
            fetch_failures = report.fetch_failures,
            storage_failures = report.storage_failures,
            corpus_size = self.corpus.len(),
            "cycle complete"
        );
        Ok(report)
    }

    async fn process_discussion(
        &mut self,
        discussion: &Discussion,
        source: &dyn ForumSource,
        sink: &dyn ReplySink,
        report: &mut CycleReport,
    ) -> Result<(), IndexError> {
        let posts = match source.fetch_posts(&discussion.id).await {
            Ok(posts) => posts,
            Err(err) => {
                tracing::warn!(discussion = %discussion.id, error = %err, "could not fetch posts");
                report.fetch_failures += 1;
                return Ok(());
            }
        };
        report.posts_seen += posts.len();

        for post in &posts {
            self.ingest(post, report)?;
        }

        let Some(latest) = posts.last() else {
            tracing::debug!(discussion = %discussion.id, "discussion has no posts");
            return Ok(());
        };

        let candidate = match self.policy.evaluate(latest, &self.corpus) {
            Ok(Decision::Reply(candidate)) => candidate,
            Ok(Decision::Rejected(reason)) => {
                tracing::debug!(discussion = %discussion.id, post = %latest.id, ?reason, "no reply");
                return Ok(());
            }
            Err(err) => {
                tracing::warn!(discussion = %discussion.id, error = %err, "could not load reply candidate");
                report.storage_failures += 1;
                return Ok(());
            }
        };

        tracing::info!(
            discussion = %discussion.id,
            post = %latest.id,
            candidate = %candidate.document.id,
            score = candidate.score,
            "replying"
        );
        match sink.emit_reply(&discussion.id, &candidate.document.text).await {
            Ok(()) => report.replies += 1,
            Err(err) => {
                tracing::warn!(discussion = %discussion.id, error = %err, "reply failed");
                report.reply_failures += 1;
            }
        }
        Ok(())
    }

    /// Drift is returned to abort the cycle; every other failure stays with
    /// this post.
    fn ingest(&mut self, post: &Document, report: &mut CycleReport) -> Result<(), IndexError> {
        match self.corpus.ingest(post) {
            Ok(IngestOutcome::Inserted(_)) => report.inserted += 1,
            Ok(IngestOutcome::Duplicate) => report.duplicates += 1,
            Err(EngineError::Storage(err)) => {
                tracing::warn!(post = %post.id, error = %err, "could not store post");
                report.storage_failures += 1;
            }
            Err(EngineError::Index(err @ IndexError::Drift { .. })) => {
                tracing::error!(post = %post.id, error = %err, "term index drifted from store");
                return Err(err);
            }
            Err(EngineError::Index(err)) => {
                tracing::error!(post = %post.id, error = %err, "stored post could not be indexed");
                report.index_failures += 1;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FetchError, ReplyError};
    use crate::store::MemoryCorpusStore;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    struct SingleDiscussion(Vec<Document>);

    #[async_trait]
    impl ForumSource for SingleDiscussion {
        async fn fetch_recent_discussions(&self) -> Result<Vec<Discussion>, FetchError> {
            Ok(vec![Discussion::new("d")])
        }

        async fn fetch_posts(&self, _discussion_id: &str) -> Result<Vec<Document>, FetchError> {
            Ok(self.0.clone())
        }
    }

    #[derive(Default)]
    struct CountingSink(AtomicUsize);

    #[async_trait]
    impl ReplySink for CountingSink {
        async fn emit_reply(&self, _discussion_id: &str, _text: &str) -> Result<(), ReplyError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn drifted_orchestrator() -> Orchestrator<MemoryCorpusStore> {
        let mut corpus = Corpus::open(MemoryCorpusStore::new()).unwrap();
        corpus.index_unstored("ghost-1");
        corpus.index_unstored("ghost-2");
        Orchestrator::new(corpus, RetrievalPolicy::new(0.1))
    }

    #[tokio::test]
    async fn drift_while_ingesting_aborts_before_replying() {
        let mut orch = drifted_orchestrator();
        let source = SingleDiscussion(vec![Document::new("p1", "reset my password", "d")]);
        let sink = CountingSink::default();
        let mut report = CycleReport::default();

        let err = orch
            .process_discussion(&Discussion::new("d"), &source, &sink, &mut report)
            .await
            .unwrap_err();

        assert!(matches!(err, IndexError::Drift { .. }));
        assert_eq!(report.index_failures, 0);
        assert_eq!(sink.0.load(Ordering::SeqCst), 0);

        orch.rebuild_index().unwrap();
        assert_eq!(orch.corpus().index().external_ids().collect::<Vec<_>>(), vec!["p1"]);
    }

    #[tokio::test]
    async fn drift_aborts_the_cycle() {
        let mut orch = drifted_orchestrator();
        let source = SingleDiscussion(vec![Document::new("p1", "reset my password", "d")]);
        let sink = CountingSink::default();

        let err = orch.run_cycle(&source, &sink, &StopFlag::new()).await.unwrap_err();

        assert!(matches!(err, IndexError::Drift { .. }));
        assert_eq!(sink.0.load(Ordering::SeqCst), 0);
        assert!(orch.corpus().store().is_empty().unwrap());
    }
}
