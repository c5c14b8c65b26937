use anyhow::{Context, Result};
use engine::{CorpusStore, ForumSource, Orchestrator, ReplySink, StopFlag};
use std::future::Future;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};

/// Run cycles back to back on a fixed interval until `shutdown` resolves.
///
/// The first cycle starts immediately. A cycle always runs to completion
/// before the next tick is awaited, and ticks missed while a cycle was
/// running are dropped. When `shutdown` fires mid-cycle the discussion in
/// progress is finished and the loop returns.
pub async fn run_schedule<S, F>(
    orch: &mut Orchestrator<S>,
    source: &dyn ForumSource,
    sink: &dyn ReplySink,
    every: Duration,
    shutdown: F,
) -> Result<()>
where
    S: CorpusStore,
    F: Future<Output = ()>,
{
    let stop = StopFlag::new();
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = &mut shutdown => stop.raise(),
        }
        if stop.is_raised() {
            break;
        }

        tracing::info!("checking for new content");
        let outcome = {
            let cycle = orch.run_cycle(source, sink, &stop);
            tokio::pin!(cycle);
            loop {
                tokio::select! {
                    res = &mut cycle => break res,
                    _ = &mut shutdown, if !stop.is_raised() => {
                        tracing::info!("shutdown requested, finishing current discussion");
                        stop.raise();
                    }
                }
            }
        };

        if let Err(err) = outcome {
            tracing::error!(error = %err, "cycle aborted, rebuilding term index from store");
            orch.rebuild_index().context("rebuild term index")?;
        }
        if stop.is_raised() {
            break;
        }
    }
    tracing::info!("stopped");
    Ok(())
}
