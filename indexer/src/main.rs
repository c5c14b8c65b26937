use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use engine::{Corpus, CorpusStore, Decision, Document, IngestOutcome, RetrievalPolicy, SledCorpusStore};
use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt, EnvFilter};
use walkdir::WalkDir;

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(u64),
}

impl RawId {
    fn into_string(self) -> String {
        match self {
            RawId::Text(s) => s,
            RawId::Number(n) => n.to_string(),
        }
    }
}

/// One post in a dump file. Flarum exports call the body `content`.
#[derive(Debug, Deserialize)]
struct InputPost {
    id: RawId,
    #[serde(alias = "content")]
    text: String,
    #[serde(default, alias = "discussionId")]
    discussion_id: Option<RawId>,
}

impl InputPost {
    /// Empty ids are refused: they are reserved for `query`'s unstored text.
    fn into_document(self) -> Result<Document> {
        let id = self.id.into_string();
        if id.trim().is_empty() {
            bail!("post id must not be empty");
        }
        Ok(Document {
            id,
            text: self.text,
            discussion_id: self.discussion_id.map(RawId::into_string).unwrap_or_default(),
        })
    }
}

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Seed and inspect the forum post corpus", long_about = None)]
struct Cli {
    /// Corpus database directory
    #[arg(long, global = true, default_value = "./forum_ai.db")]
    db: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import posts from JSON/JSONL files or a directory of them
    Import {
        /// Input path (file or directory)
        #[arg(long)]
        input: PathBuf,
    },
    /// Print corpus size and vocabulary statistics
    Stats,
    /// Rank stored posts against a piece of text
    Query {
        #[arg(long)]
        text: String,
        /// Number of ranked posts to print
        #[arg(long, default_value_t = 5)]
        k: usize,
        /// Confidence threshold used to show what would be selected
        #[arg(long, default_value_t = engine::DEFAULT_CONFIDENCE_THRESHOLD)]
        threshold: f32,
    },
}

#[derive(Debug, Default, PartialEq, Eq)]
struct ImportSummary {
    files: usize,
    inserted: usize,
    duplicates: usize,
}

#[derive(Serialize)]
struct Stats {
    db: String,
    num_docs: usize,
    num_terms: usize,
    generated_at: String,
}

#[derive(Serialize)]
struct QueryResponse {
    query: String,
    took_s: f64,
    total_hits: usize,
    threshold: f32,
    selected: Option<String>,
    results: Vec<QueryHit>,
}

#[derive(Serialize)]
struct QueryHit {
    id: String,
    discussion_id: String,
    score: f32,
    text: String,
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();
    let store = SledCorpusStore::open(&cli.db).with_context(|| format!("open corpus at {}", cli.db.display()))?;
    let mut corpus = Corpus::open(store).context("load corpus")?;

    match cli.command {
        Commands::Import { input } => {
            let summary = import(&mut corpus, &input)?;
            tracing::info!(files = summary.files, inserted = summary.inserted, duplicates = summary.duplicates, "import complete");
        }
        Commands::Stats => {
            let stats = Stats {
                db: cli.db.display().to_string(),
                num_docs: corpus.store().len()?,
                num_terms: corpus.index().vocabulary_len(),
                generated_at: time::OffsetDateTime::now_utc()
                    .format(&time::format_description::well_known::Rfc3339)
                    .unwrap_or_default(),
            };
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Commands::Query { text, k, threshold } => {
            let response = query(&corpus, text, k, threshold)?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
    }
    Ok(())
}

fn import<S: CorpusStore>(corpus: &mut Corpus<S>, input: &Path) -> Result<ImportSummary> {
    let mut files: Vec<PathBuf> = Vec::new();
    if input.is_dir() {
        for entry in WalkDir::new(input).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() {
                if let Some(ext) = p.extension().and_then(|s| s.to_str()) {
                    if matches!(ext, "json" | "jsonl") {
                        files.push(p.to_path_buf());
                    }
                }
            }
        }
    } else if input.is_file() {
        files.push(input.to_path_buf());
    } else {
        bail!("input {} does not exist", input.display());
    }

    let mut summary = ImportSummary::default();
    for file in files {
        let posts = if file.extension().and_then(|s| s.to_str()) == Some("jsonl") {
            read_jsonl(&file)?
        } else {
            read_json(&file)?
        };
        for post in posts {
            let doc = post.into_document().with_context(|| format!("read {}", file.display()))?;
            match corpus.ingest(&doc).with_context(|| format!("ingest from {}", file.display()))? {
                IngestOutcome::Inserted(_) => summary.inserted += 1,
                IngestOutcome::Duplicate => summary.duplicates += 1,
            }
        }
        summary.files += 1;
    }
    Ok(summary)
}

fn read_jsonl(file: &Path) -> Result<Vec<InputPost>> {
    let reader = BufReader::new(File::open(file)?);
    let mut posts = Vec::new();
    for (n, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() { continue; }
        let post = serde_json::from_str(&line).with_context(|| format!("{}:{}", file.display(), n + 1))?;
        posts.push(post);
    }
    Ok(posts)
}

fn read_json(file: &Path) -> Result<Vec<InputPost>> {
    let reader = BufReader::new(File::open(file)?);
    let json: serde_json::Value = serde_json::from_reader(reader).with_context(|| format!("parse {}", file.display()))?;
    let posts = match json {
        serde_json::Value::Array(arr) => arr
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<InputPost>, _>>()?,
        serde_json::Value::Object(_) => vec![serde_json::from_value(json)?],
        _ => vec![],
    };
    Ok(posts)
}

fn query<S: CorpusStore>(corpus: &Corpus<S>, text: String, k: usize, threshold: f32) -> Result<QueryResponse> {
    let start = std::time::Instant::now();
    let scored = corpus.score(&text)?;
    let total_hits = scored.iter().filter(|c| c.score > 0.0).count();

    // a fresh post that is not in the corpus, so self-exclusion never applies
    let unstored = Document::new("", text.clone(), "");
    let selected = match RetrievalPolicy::new(threshold).evaluate(&unstored, corpus)? {
        Decision::Reply(candidate) => Some(candidate.document.id),
        Decision::Rejected(_) => None,
    };

    let results = scored
        .into_iter()
        .take(k.max(1))
        .map(|c| QueryHit { id: c.document.id, discussion_id: c.document.discussion_id, score: c.score, text: c.document.text })
        .collect();
    Ok(QueryResponse { query: text, took_s: start.elapsed().as_secs_f64(), total_hits, threshold, selected, results })
}
