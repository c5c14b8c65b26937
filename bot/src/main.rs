use anyhow::{Context, Result};
use bot::{run_schedule, Cli, DryRunSink, FlarumClient};
use clap::Parser;
use engine::{Corpus, Orchestrator, ReplySink, RetrievalPolicy, SledCorpusStore, StopFlag};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();
    cli.validate()?;

    let store = SledCorpusStore::open(&cli.db).with_context(|| format!("open corpus at {}", cli.db.display()))?;
    let corpus = Corpus::open(store).context("load corpus")?;
    let mut orch = Orchestrator::new(corpus, RetrievalPolicy::new(cli.confidence));

    let mut client = FlarumClient::new(cli.forum_url.clone(), cli.timeout(), cli.discussion_limit, cli.signature.clone())?;
    client.login(&cli.username, &cli.password).await?;
    let sink: &dyn ReplySink = if cli.dry_run { &DryRunSink } else { &client };

    tracing::info!(
        forum = %cli.forum_url,
        confidence = cli.confidence,
        interval_secs = cli.interval_secs,
        corpus_size = orch.corpus().len(),
        dry_run = cli.dry_run,
        "starting"
    );

    if cli.once {
        let stop = StopFlag::new();
        let watcher = {
            let stop = stop.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    stop.raise();
                }
            })
        };
        let report = orch.run_cycle(&client, sink, &stop).await?;
        watcher.abort();
        tracing::info!(?report, "single cycle done");
        return Ok(());
    }

    run_schedule(&mut orch, &client, sink, cli.refresh_interval(), async {
        tokio::signal::ctrl_c().await.ok();
    })
    .await
}
