//! Faro CLI
//!
//! `faro build` indexes a document, `faro query` answers one question, and
//! `faro eval` runs a question file through every strategy and prints the
//! leaderboard.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use faro::config::EngineConfig;
use faro::index::SearchIndex;
use faro::pipeline::RagPipeline;
use faro::retrieval::Strategy;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "faro", version, about = "Advanced RAG engine with built-in evaluation")]
struct Cli {
    /// Path to a JSON config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build an index over a plain-text document
    Build {
        /// Document to index
        #[arg(long)]
        file: PathBuf,

        /// Retrieval strategy the index will serve
        #[arg(long, default_value = "auto-merging")]
        strategy: Strategy,

        /// Output path (defaults to the cache directory)
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Answer one question against a built index
    Query {
        /// Saved index (defaults to the cache directory)
        #[arg(long)]
        index: Option<PathBuf>,

        #[arg(long, default_value = "auto-merging")]
        strategy: Strategy,

        /// Results to retrieve
        #[arg(short, long, default_value_t = 6)]
        top_k: usize,

        /// The question
        question: String,
    },

    /// Evaluate every strategy over a question file and print the leaderboard
    Eval {
        /// Document to index
        #[arg(long)]
        file: PathBuf,

        /// One question per line
        #[arg(long)]
        questions: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    faro::logging::init(cli.verbose);

    let config = EngineConfig::load(cli.config.as_deref())?;

    match cli.command {
        Command::Build {
            file,
            strategy,
            out,
        } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;

            let mut pipeline = RagPipeline::new(config).await?;
            pipeline.build(&text, strategy).await?;

            let path = out.unwrap_or_else(|| SearchIndex::cache_path(&strategy.to_string()));
            pipeline.save(strategy, &path)?;
            tracing::info!(path = %path.display(), "index saved");
            println!("Index saved to {}", path.display());
        }

        Command::Query {
            index,
            strategy,
            top_k,
            question,
        } => {
            let path = index.unwrap_or_else(|| SearchIndex::cache_path(&strategy.to_string()));

            let mut pipeline = RagPipeline::new(config).await?;
            pipeline.load(strategy, &path)?;

            let response = pipeline.query(&question, strategy, top_k).await?;
            println!("{}", response.answer);
            for ctx in &response.context {
                tracing::debug!(node = %ctx.id, score = ctx.score, "context");
            }
        }

        Command::Eval { file, questions } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let questions = read_questions(&questions)?;
            tracing::info!(count = questions.len(), "loaded evaluation questions");

            let mut pipeline = RagPipeline::new(config).await?;
            for strategy in Strategy::ALL {
                pipeline.build(&text, strategy).await?;
                let completed = pipeline.evaluate(strategy, &questions, None).await?;
                tracing::info!(%strategy, completed, "strategy evaluated");
            }

            println!("{}", pipeline.leaderboard_table());
        }
    }

    Ok(())
}

/// One question per line, blanks skipped
fn read_questions(path: &std::path::Path) -> Result<Vec<String>> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    Ok(data
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}
