//! Batch CLI: collect raw mentions, build the canonical dataset, maintain it.

use anyhow::{bail, Context, Result};
use brand_sentiment_monitor::config::{self, PipelineConfig};
use brand_sentiment_monitor::ingest::{
    collect_all,
    providers::{FileCollector, NewsRssCollector, RedditCollector, TwitterCollector},
    types::MentionCollector,
};
use brand_sentiment_monitor::pipeline::{repair, Pipeline, SourceOutcome};
use brand_sentiment_monitor::{store, SentimentClassifier};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "mention-pipeline", version, about)]
struct Cli {
    /// Pipeline config (TOML or JSON). Defaults to $PIPELINE_CONFIG_PATH, then config/pipeline.{toml,json}.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the configured brand.
    #[arg(long, global = true, env = "BRAND_NAME")]
    brand: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Clean, score and merge every configured source.
    Run,
    /// Fetch raw mentions into a CSV for a later `run`.
    Collect(CollectArgs),
    /// Re-classify an existing dataset.
    Rescore {
        #[arg(long)]
        input: Option<PathBuf>,
        /// Defaults to overwriting the input.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Drop unreadable or unscored rows and re-sort by date.
    Repair {
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(Debug, Args)]
struct CollectArgs {
    /// Output CSV of raw records.
    #[arg(long)]
    out: PathBuf,
    /// Search query for news, Reddit and Twitter; defaults to the brand.
    #[arg(long)]
    query: Option<String>,
    /// Explicit RSS feed URL instead of the news search feed.
    #[arg(long)]
    feed_url: Option<String>,
    /// Parse a saved RSS document instead of fetching.
    #[arg(long, conflicts_with = "feed_url")]
    feed_file: Option<PathBuf>,
    /// Also search Reddit submissions and their top comments.
    #[arg(long)]
    reddit: bool,
    /// Also run a Twitter recent search (needs a bearer token).
    #[arg(long)]
    twitter: bool,
    #[arg(long, env = "TWITTER_BEARER_TOKEN", hide_env_values = true)]
    twitter_token: Option<String>,
    /// Extra CSV/JSON dumps to fold in, as PLATFORM=PATH.
    #[arg(long = "file", value_name = "PLATFORM=PATH")]
    files: Vec<String>,
    #[arg(long, default_value_t = 100)]
    limit: usize,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("pipeline=info,ingest=info,warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

fn load_config(cli: &Cli) -> Result<PipelineConfig> {
    let cfg = match &cli.config {
        Some(p) => config::load_from(p)?,
        None => config::load_default()?,
    };
    Ok(match &cli.brand {
        Some(b) => cfg.with_brand(b.clone()).validated()?,
        None => cfg,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    let cfg = load_config(&cli)?;

    match cli.command {
        Command::Run => run(cfg),
        Command::Collect(args) => collect(&cfg, args).await,
        Command::Rescore { input, output } => {
            let input = input.unwrap_or_else(|| cfg.output.combined_path());
            let output = output.unwrap_or_else(|| input.clone());
            rescore(cfg, &input, &output)
        }
        Command::Repair { input, output } => {
            let input = input.unwrap_or_else(|| cfg.output.combined_path());
            let output = output.unwrap_or_else(|| input.clone());
            repair_dataset(&input, &output)
        }
    }
}

fn run(cfg: PipelineConfig) -> Result<()> {
    let classifier = Arc::new(SentimentClassifier::new()?.with_negation(cfg.sentiment_negation));
    let pipeline = Pipeline::new(cfg, classifier);
    let report = pipeline.run(pipeline.configured_sources());

    for s in &report.sources {
        match &s.outcome {
            SourceOutcome::Produced(n) => println!("{:<20} {n:>6} kept of {}", s.name, s.loaded),
            SourceOutcome::Empty => println!("{:<20}      0 kept of {}", s.name, s.loaded),
            SourceOutcome::Failed(e) => println!("{:<20} failed: {e}", s.name),
        }
    }
    let sum = &report.summary;
    println!(
        "combined: {} records ({} cross-source duplicates), +{} ={} -{}, avg compound {:.4}",
        report.combined,
        report.cross_source_duplicates,
        sum.positive,
        sum.neutral,
        sum.negative,
        sum.average_compound
    );
    println!("skipped: {}", serde_json::to_string(&report.skipped())?);

    if let Some(e) = &report.combined_error {
        tracing::warn!(target: "pipeline", error = %e, "combined dataset not written");
    }
    if !report.success {
        bail!("no source produced any records");
    }
    Ok(())
}

fn parse_file_arg(arg: &str) -> Result<(String, PathBuf)> {
    let (platform, path) = arg
        .split_once('=')
        .with_context(|| format!("--file expects PLATFORM=PATH, got `{arg}`"))?;
    if platform.trim().is_empty() || path.trim().is_empty() {
        bail!("--file expects PLATFORM=PATH, got `{arg}`");
    }
    Ok((platform.trim().to_string(), PathBuf::from(path.trim())))
}

async fn collect(cfg: &PipelineConfig, args: CollectArgs) -> Result<()> {
    let query = args.query.unwrap_or_else(|| cfg.brand_name.clone());
    let news = match (args.feed_file, args.feed_url) {
        (Some(p), _) => {
            let xml = tokio::fs::read_to_string(&p)
                .await
                .with_context(|| format!("reading {}", p.display()))?;
            NewsRssCollector::from_fixture_str(&xml)
        }
        (None, Some(url)) => NewsRssCollector::from_url(url),
        (None, None) => NewsRssCollector::google_news(&query),
    };

    let mut collectors: Vec<Box<dyn MentionCollector>> =
        vec![Box::new(news.with_limit(args.limit))];
    if args.reddit {
        collectors.push(Box::new(
            RedditCollector::search(query.clone()).with_limit(args.limit),
        ));
    }
    if args.twitter {
        let Some(token) = args.twitter_token.filter(|t| !t.trim().is_empty()) else {
            bail!("--twitter needs --twitter-token or $TWITTER_BEARER_TOKEN");
        };
        collectors.push(Box::new(
            TwitterCollector::recent_search(query.clone(), token.trim()).with_limit(args.limit),
        ));
    }
    for arg in &args.files {
        let (platform, path) = parse_file_arg(arg)?;
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("file")
            .to_string();
        collectors.push(Box::new(
            FileCollector::new(name, path).with_platform(platform),
        ));
    }

    let collected = collect_all(&collectors, Duration::from_millis(cfg.courtesy_delay_ms)).await;
    if collected.records.is_empty() {
        bail!("nothing collected (failed: {:?})", collected.failed);
    }
    store::write_raw_csv(&args.out, &collected.records)?;
    println!(
        "wrote {} raw records to {} ({} collector(s) failed)",
        collected.records.len(),
        args.out.display(),
        collected.failed.len()
    );
    Ok(())
}

fn rescore(cfg: PipelineConfig, input: &Path, output: &Path) -> Result<()> {
    let (records, tally) = store::load_canonical(input)?;
    let classifier = Arc::new(SentimentClassifier::new()?.with_negation(cfg.sentiment_negation));
    let pipeline = Pipeline::new(cfg, classifier);
    let records = pipeline.rescore(records, Utc::now());
    store::write_dataset(output, &records)?;
    println!(
        "rescored {} records into {} ({} unreadable rows dropped)",
        records.len(),
        output.display(),
        tally.total()
    );
    Ok(())
}

fn repair_dataset(input: &Path, output: &Path) -> Result<()> {
    let (records, tally) = store::load_canonical(input)?;
    let (records, unscored) = repair(records);
    store::write_dataset(output, &records)?;
    println!(
        "repaired {}: kept {}, dropped {} unreadable and {} unscored",
        output.display(),
        records.len(),
        tally.total(),
        unscored
    );
    Ok(())
}
