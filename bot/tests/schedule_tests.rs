use async_trait::async_trait;
use bot::run_schedule;
use engine::{
    Corpus, Discussion, Document, FetchError, ForumSource, MemoryCorpusStore, Orchestrator, ReplyError, ReplySink,
    RetrievalPolicy,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

struct CountingForum {
    listings: AtomicUsize,
}

#[async_trait]
impl ForumSource for CountingForum {
    async fn fetch_recent_discussions(&self) -> Result<Vec<Discussion>, FetchError> {
        self.listings.fetch_add(1, Ordering::SeqCst);
        Ok(vec![Discussion::new("1"), Discussion::new("2")])
    }

    async fn fetch_posts(&self, discussion_id: &str) -> Result<Vec<Document>, FetchError> {
        let text = "my theme breaks the mobile layout";
        Ok(vec![Document::new(format!("post-{discussion_id}"), text, discussion_id)])
    }
}

#[derive(Default)]
struct Collect(Mutex<Vec<String>>);

#[async_trait]
impl ReplySink for Collect {
    async fn emit_reply(&self, discussion_id: &str, _text: &str) -> Result<(), ReplyError> {
        self.0.lock().push(discussion_id.to_string());
        Ok(())
    }
}

#[tokio::test]
async fn first_cycle_runs_immediately_then_stops_on_shutdown() {
    let forum = CountingForum { listings: AtomicUsize::new(0) };
    let sink = Collect::default();
    let corpus = Corpus::open(MemoryCorpusStore::new()).unwrap();
    let mut orch = Orchestrator::new(corpus, RetrievalPolicy::default());

    run_schedule(&mut orch, &forum, &sink, Duration::from_secs(3600), tokio::time::sleep(Duration::from_millis(100)))
        .await
        .unwrap();

    assert_eq!(forum.listings.load(Ordering::SeqCst), 1);
    assert_eq!(orch.corpus().len(), 2);
    // discussion 2's post repeats discussion 1's
    assert_eq!(*sink.0.lock(), vec!["2".to_string()]);
}

#[tokio::test]
async fn short_interval_runs_cycles_sequentially() {
    let forum = CountingForum { listings: AtomicUsize::new(0) };
    let sink = Collect::default();
    let corpus = Corpus::open(MemoryCorpusStore::new()).unwrap();
    let mut orch = Orchestrator::new(corpus, RetrievalPolicy::default());

    run_schedule(&mut orch, &forum, &sink, Duration::from_millis(20), tokio::time::sleep(Duration::from_millis(150)))
        .await
        .unwrap();

    assert!(forum.listings.load(Ordering::SeqCst) >= 2);
    // later cycles see only known posts
    assert_eq!(orch.corpus().len(), 2);
    // and keep answering the newest post in discussion 2
    assert!(sink.0.lock().iter().all(|d| d == "2"));
}
