//! txkb CLI - Command-line interface
//!
//! Usage:
//!   txkb text <file>
//!   txkb articles <dir> [--per-article-dir <dir>]
//!   txkb urls <url>...
//!   txkb combine <kb.json>...
//!   txkb export <kb.json>
//!   txkb windows <file>

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

use txkb_core::{AppConfig, Document, LoggingConfig};
use txkb_graph::{GraphExport, KbSnapshot, KnowledgeBase, KnownEntityResolver};
use txkb_pipeline::{
    CachedResolver, CorpusAggregator, CorpusReport, DocumentPipeline, HttpModelClient,
    WikipediaResolver,
};
use txkb_source::{load_article_dir, read_text_document, HttpArticleFetcher};

#[derive(Parser)]
#[command(name = "txkb")]
#[command(about = "Extract knowledge graphs from text")]
#[command(version)]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a knowledge base from one plain text file
    Text {
        file: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Build one knowledge base from every JSON article in a directory
    Articles {
        dir: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Also write one knowledge base per article here
        #[arg(long)]
        per_article_dir: Option<PathBuf>,
    },
    /// Fetch articles and build one knowledge base from them
    Urls {
        #[arg(required = true)]
        urls: Vec<String>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Merge saved knowledge bases without network lookups
    Combine {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Write a saved knowledge base as node/link graph JSON
    Export {
        input: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show how a text file is split into model windows
    Windows { file: PathBuf },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    init_tracing(&config.logging, cli.verbose);

    match cli.command {
        Commands::Text { file, output } => {
            let (pipeline, cache) = build_pipeline(&config)?;
            let document = read_text_document(&file)?;
            let kb = pipeline.process(&document).await?;
            log_cache_stats(&cache);
            finish(&kb, output.unwrap_or_else(|| default_output("kb")))?;
        }
        Commands::Articles {
            dir,
            output,
            per_article_dir,
        } => {
            let (pipeline, cache) = build_pipeline(&config)?;

            let ArticleBatch {
                documents,
                stems,
                empty,
                unreadable,
            } = ArticleBatch::load(&dir)?;
            if let Some(dir) = &per_article_dir {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("creating {}", dir.display()))?;
            }

            let mut aggregator = CorpusAggregator::new(pipeline, &config.corpus);
            let mut report = aggregator
                .process_documents_with(documents, |index, _, kb| {
                    let Some(dir) = &per_article_dir else {
                        return;
                    };
                    let path = dir.join(per_article_name(&stems, index));
                    if let Err(e) = kb.snapshot().save(&path) {
                        tracing::warn!("Failed to write {}: {}", path.display(), e);
                    }
                })
                .await;
            report.skipped += empty;
            report.failed += unreadable;

            log_cache_stats(&cache);
            print_report(&report);
            finish(
                aggregator.aggregate(),
                output.unwrap_or_else(|| default_output("kb")),
            )?;
        }
        Commands::Urls { urls, output } => {
            let (pipeline, cache) = build_pipeline(&config)?;
            let fetcher = HttpArticleFetcher::new(&config.fetch)?;

            let mut aggregator = CorpusAggregator::new(pipeline, &config.corpus);
            let report = aggregator.process_urls(Arc::new(fetcher), urls).await;

            log_cache_stats(&cache);
            print_report(&report);
            finish(
                aggregator.aggregate(),
                output.unwrap_or_else(|| default_output("kb")),
            )?;
        }
        Commands::Combine { inputs, output } => {
            let snapshots = inputs
                .iter()
                .map(KbSnapshot::load)
                .collect::<Result<Vec<_>, _>>()?;
            let resolver = Arc::new(KnownEntityResolver::from_snapshots(&snapshots));

            let mut combined = KnowledgeBase::new(resolver.clone());
            for (path, snapshot) in inputs.iter().zip(snapshots) {
                let kb = KnowledgeBase::from_snapshot(snapshot, resolver.clone())
                    .with_context(|| format!("loading {}", path.display()))?;
                let merge = combined.merge_with(&kb).await;
                tracing::info!(
                    "Merged {}: {} new, {} existing relations",
                    path.display(),
                    merge.inserted,
                    merge.merged
                );
            }
            finish(&combined, output.unwrap_or_else(|| default_output("combined_kb")))?;
        }
        Commands::Export { input, output } => {
            let snapshot = KbSnapshot::load(&input)?;
            let kb = KnowledgeBase::from_snapshot(snapshot, Arc::new(KnownEntityResolver::default()))?;

            let export = GraphExport::from_kb(&kb);
            let graph = export.to_petgraph();
            let output = output.unwrap_or_else(|| default_output("graph"));
            export.save(&output)?;
            println!(
                "Wrote {} nodes and {} links to {}",
                graph.node_count(),
                graph.edge_count(),
                output.display()
            );
        }
        Commands::Windows { file } => {
            let (pipeline, _) = build_pipeline(&config)?;
            let document = read_text_document(&file)?;
            for preview in pipeline.preview_windows(&document.text).await? {
                println!("#{} {}", preview.index, preview.span);
                println!("{}\n", preview.text);
            }
        }
    }

    Ok(())
}

/// Article records loaded from one directory
#[derive(Default)]
struct ArticleBatch {
    documents: Vec<Document>,
    /// Input file stem for each entry of `documents`
    stems: Vec<String>,
    /// Records with an empty body
    empty: usize,
    /// Records that could not be read or parsed
    unreadable: usize,
}

impl ArticleBatch {
    fn load(dir: &Path) -> anyhow::Result<Self> {
        let mut batch = Self::default();
        for (path, loaded) in load_article_dir(dir)? {
            match loaded {
                Ok(Some(document)) => {
                    batch.stems.push(file_stem(&path));
                    batch.documents.push(document);
                }
                Ok(None) => batch.empty += 1,
                Err(e) => {
                    tracing::warn!("Skipping {}: {}", path.display(), e);
                    batch.unreadable += 1;
                }
            }
        }
        Ok(batch)
    }
}

/// File config (if any), then environment overrides
fn load_config(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    let config = match path {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::default(),
    };
    let config = config.with_env_override()?;
    config.validate()?;
    Ok(config)
}

fn init_tracing(logging: &LoggingConfig, verbose: u8) {
    let level = match verbose {
        0 => logging.level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("{level},hyper=warn,reqwest=warn").into());

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if logging.json_format {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn build_pipeline(config: &AppConfig) -> anyhow::Result<(DocumentPipeline, Arc<CachedResolver>)> {
    let models = HttpModelClient::from_config(&config.model)?.into_capabilities();
    let wikipedia = WikipediaResolver::from_config(&config.resolver)?;
    let resolver = Arc::new(CachedResolver::from_config(
        Arc::new(wikipedia),
        &config.resolver,
    ));

    let pipeline = DocumentPipeline::new(
        Arc::new(models),
        resolver.clone(),
        config.extraction.clone(),
    );
    Ok((pipeline, resolver))
}

fn log_cache_stats(cache: &CachedResolver) {
    match serde_json::to_string(&cache.stats().report()) {
        Ok(report) => tracing::debug!("Resolver cache: {}", report),
        Err(e) => tracing::debug!("Resolver cache stats unavailable: {}", e),
    }
}

fn print_report(report: &CorpusReport) {
    println!(
        "Documents: {} processed, {} skipped, {} failed",
        report.processed, report.skipped, report.failed
    );
}

/// Print the knowledge base and save its snapshot
fn finish(kb: &KnowledgeBase, output: PathBuf) -> anyhow::Result<()> {
    print!("{kb}");
    kb.snapshot().save(&output)?;
    println!(
        "Saved {} entities, {} relations, {} sources to {}",
        kb.entity_count(),
        kb.relation_count(),
        kb.source_count(),
        output.display()
    );
    Ok(())
}

/// `<prefix>_<YYYYmmdd_HHMMSS>.json` in the working directory
fn default_output(prefix: &str) -> PathBuf {
    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    PathBuf::from(format!("{prefix}_{timestamp}.json"))
}

/// Per-article output file, named after the input file at `index`
fn per_article_name(stems: &[String], index: usize) -> String {
    match stems.get(index) {
        Some(stem) => format!("{stem}_kb.json"),
        None => format!("article_{index}_kb.json"),
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("article")
        .to_string()
}
