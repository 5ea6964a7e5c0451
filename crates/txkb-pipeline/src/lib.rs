//! txkb Pipeline - Text to knowledge base orchestration
//!
//! This crate ties the extraction pieces together:
//! - [`DocumentPipeline`]: tokenize, window, transduce, decode, and ingest
//!   one document into a fresh knowledge base
//! - [`CorpusAggregator`]: run document pipelines concurrently and merge
//!   their results into one aggregate knowledge base
//! - HTTP clients for the model server and Wikipedia, and a resolver cache

use std::sync::Arc;

use futures::stream::{self, Stream, StreamExt};
use serde::Serialize;

use txkb_core::{
    ArticleFetcher, CorpusConfig, Document, EntityResolver, ExtractionConfig, GenerationParams,
    KbError, ModelCapabilities, Result, SourceInfo, Span,
};
use txkb_extractor::{clipped_span_windows, RebelDecoder, TripletParser};
use txkb_graph::{AddOutcome, KnowledgeBase, MergeReport};

pub mod cache;
pub mod model;
pub mod wikipedia;

pub use cache::{CacheStats, CacheStatsReport, CachedResolver};
pub use model::HttpModelClient;
pub use wikipedia::WikipediaResolver;

// ============================================================================
// Document Pipeline
// ============================================================================

/// One window of a document, decoded back to text
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WindowPreview {
    pub index: usize,
    pub span: Span,
    pub text: String,
}

/// Extracts a knowledge base from a single document
#[derive(Clone)]
pub struct DocumentPipeline {
    models: Arc<ModelCapabilities>,
    resolver: Arc<dyn EntityResolver>,
    parser: Arc<dyn TripletParser>,
    config: ExtractionConfig,
}

impl DocumentPipeline {
    /// Create a pipeline decoding REBEL output
    pub fn new(
        models: Arc<ModelCapabilities>,
        resolver: Arc<dyn EntityResolver>,
        config: ExtractionConfig,
    ) -> Self {
        Self {
            models,
            resolver,
            parser: Arc::new(RebelDecoder),
            config,
        }
    }

    /// Set a different output parser
    pub fn with_parser(mut self, parser: Arc<dyn TripletParser>) -> Self {
        self.parser = parser;
        self
    }

    pub fn resolver(&self) -> Arc<dyn EntityResolver> {
        Arc::clone(&self.resolver)
    }

    fn check_span_length(&self) -> Result<()> {
        if self.config.span_length == 0 {
            return Err(KbError::InvalidInput(
                "span_length must be at least one token".to_string(),
            ));
        }
        Ok(())
    }

    /// Empty knowledge base sharing this pipeline's resolver
    pub fn new_kb(&self) -> KnowledgeBase {
        KnowledgeBase::new(self.resolver())
    }

    /// Run the full extraction for one document.
    ///
    /// Tokenizer and transducer failures fail the whole document; nothing
    /// is returned for it.
    pub async fn process(&self, document: &Document) -> Result<KnowledgeBase> {
        self.check_span_length()?;
        let mut kb = self.new_kb();

        let encoding = self.models.tokenizer.encode(&document.text).await?;
        let spans = clipped_span_windows(encoding.len(), self.config.span_length);
        if spans.is_empty() {
            tracing::debug!("Document {} has no tokens", document.source.id);
            return Ok(kb);
        }

        let windows: Vec<_> = spans.iter().map(|span| encoding.window(*span)).collect();
        let params = GenerationParams::from(&self.config);
        let per_window = params.num_return_sequences.max(1);

        tracing::debug!(
            "Transducing {} windows over {} tokens for {}",
            windows.len(),
            encoding.len(),
            document.source.id
        );
        let outputs = self.models.transducer.transduce(&windows, &params).await?;

        let expected = windows.len() * per_window;
        if outputs.len() != expected {
            return Err(KbError::Transducer(format!(
                "expected {expected} decodings for {} windows, got {}",
                windows.len(),
                outputs.len()
            )));
        }

        let mut counts = MergeReport::default();
        for (candidate, output) in outputs.iter().enumerate() {
            let span = spans[candidate / per_window];
            for triple in self.parser.parse(output) {
                match kb.add_relation(&triple, &[span], &document.source).await {
                    AddOutcome::Inserted => counts.inserted += 1,
                    AddOutcome::Merged => counts.merged += 1,
                    AddOutcome::Discarded => counts.discarded += 1,
                }
            }
        }

        tracing::info!(
            "Extracted {} relations from {} ({} merged, {} discarded)",
            kb.relation_count(),
            document.source.id,
            counts.merged,
            counts.discarded
        );
        Ok(kb)
    }

    /// Window boundaries for `text` with each window decoded back to text
    pub async fn preview_windows(&self, text: &str) -> Result<Vec<WindowPreview>> {
        self.check_span_length()?;
        let encoding = self.models.tokenizer.encode(text).await?;
        let spans = clipped_span_windows(encoding.len(), self.config.span_length);

        let mut previews = Vec::with_capacity(spans.len());
        for (index, span) in spans.into_iter().enumerate() {
            let window = encoding.window(span);
            let text = self.models.tokenizer.decode(&window.input_ids).await?;
            previews.push(WindowPreview { index, span, text });
        }
        Ok(previews)
    }
}

// ============================================================================
// Corpus Aggregator
// ============================================================================

/// Counts from one corpus run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CorpusReport {
    /// Documents whose knowledge base was merged
    pub processed: usize,
    /// Documents with no text
    pub skipped: usize,
    /// Documents that failed to fetch or extract
    pub failed: usize,
    /// Relation counts from merging into the aggregate
    pub merge: MergeReport,
}

impl CorpusReport {
    fn absorb(&mut self, merge: MergeReport) {
        self.merge.inserted += merge.inserted;
        self.merge.merged += merge.merged;
        self.merge.discarded += merge.discarded;
    }
}

enum DocumentOutcome {
    Processed(SourceInfo, KnowledgeBase),
    Skipped(String),
    Failed(String, KbError),
}

/// Runs document pipelines and merges their results.
///
/// Pipelines run as concurrent tasks; merges into the aggregate happen one
/// at a time, in input order.
pub struct CorpusAggregator {
    pipeline: Arc<DocumentPipeline>,
    concurrency: usize,
    aggregate: KnowledgeBase,
}

impl CorpusAggregator {
    pub fn new(pipeline: DocumentPipeline, config: &CorpusConfig) -> Self {
        let aggregate = pipeline.new_kb();
        Self {
            pipeline: Arc::new(pipeline),
            concurrency: config.concurrency.max(1),
            aggregate,
        }
    }

    pub fn aggregate(&self) -> &KnowledgeBase {
        &self.aggregate
    }

    pub fn into_aggregate(self) -> KnowledgeBase {
        self.aggregate
    }

    /// Process documents and merge each result into the aggregate
    pub async fn process_documents(
        &mut self,
        documents: impl IntoIterator<Item = Document>,
    ) -> CorpusReport {
        self.process_documents_with(documents, |_, _, _| {}).await
    }

    /// Like [`Self::process_documents`], handing every per-document
    /// knowledge base to `inspect` before it is merged, along with the
    /// document's position in `documents`
    pub async fn process_documents_with<F>(
        &mut self,
        documents: impl IntoIterator<Item = Document>,
        inspect: F,
    ) -> CorpusReport
    where
        F: FnMut(usize, &SourceInfo, &KnowledgeBase),
    {
        let pipeline = Arc::clone(&self.pipeline);
        let jobs = documents.into_iter().map(move |document| {
            let pipeline = Arc::clone(&pipeline);
            let id = document.source.id.clone();
            (id, run_document(pipeline, document))
        });
        self.drain(jobs, inspect).await
    }

    /// Clean, fetch, and process every URL
    pub async fn process_urls(
        &mut self,
        fetcher: Arc<dyn ArticleFetcher>,
        urls: impl IntoIterator<Item = String>,
    ) -> CorpusReport {
        let pipeline = Arc::clone(&self.pipeline);
        let jobs = urls.into_iter().map(move |url| {
            let pipeline = Arc::clone(&pipeline);
            let fetcher = Arc::clone(&fetcher);
            let id = url.clone();
            let job = async move {
                let cleaned = match txkb_source::clean_url(&url) {
                    Ok(cleaned) => cleaned,
                    Err(e) => return DocumentOutcome::Failed(url, e.into()),
                };
                match fetcher.fetch(&cleaned).await {
                    Ok(article) => run_document(pipeline, article.into_document()).await,
                    Err(e) => DocumentOutcome::Failed(cleaned, e),
                }
            };
            (id, job)
        });
        self.drain(jobs, |_, _, _| {}).await
    }

    async fn drain<I, Fut, F>(&mut self, jobs: I, mut inspect: F) -> CorpusReport
    where
        I: Iterator<Item = (String, Fut)>,
        Fut: std::future::Future<Output = DocumentOutcome> + Send + 'static,
        F: FnMut(usize, &SourceInfo, &KnowledgeBase),
    {
        let mut report = CorpusReport::default();
        // Outcomes arrive in input order, so the stream position is the input index
        let mut outcomes = std::pin::pin!(spawn_ordered(jobs, self.concurrency).enumerate());

        while let Some((index, outcome)) = outcomes.next().await {
            match outcome {
                DocumentOutcome::Processed(source, kb) => {
                    inspect(index, &source, &kb);
                    let merge = self.aggregate.merge_with(&kb).await;
                    report.absorb(merge);
                    report.processed += 1;
                }
                DocumentOutcome::Skipped(id) => {
                    tracing::warn!("No content for {}, skipping", id);
                    report.skipped += 1;
                }
                DocumentOutcome::Failed(id, e) => {
                    tracing::warn!("Failed to process {}: {}", id, e);
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            "Corpus run finished: {} processed, {} skipped, {} failed; aggregate has {} relations",
            report.processed,
            report.skipped,
            report.failed,
            self.aggregate.relation_count()
        );
        report
    }
}

/// Spawn each job on the runtime, keeping at most `concurrency` in flight
/// and yielding outcomes in input order
fn spawn_ordered<I, Fut>(jobs: I, concurrency: usize) -> impl Stream<Item = DocumentOutcome>
where
    I: Iterator<Item = (String, Fut)>,
    Fut: std::future::Future<Output = DocumentOutcome> + Send + 'static,
{
    stream::iter(jobs)
        .map(|(id, job)| {
            let handle = tokio::spawn(job);
            async move {
                handle.await.unwrap_or_else(|e| {
                    DocumentOutcome::Failed(id, KbError::Other(anyhow::anyhow!("task failed: {e}")))
                })
            }
        })
        .buffered(concurrency)
}

async fn run_document(pipeline: Arc<DocumentPipeline>, document: Document) -> DocumentOutcome {
    if document.text.trim().is_empty() {
        return DocumentOutcome::Skipped(document.source.id);
    }
    match pipeline.process(&document).await {
        Ok(kb) => DocumentOutcome::Processed(document.source, kb),
        Err(e) => DocumentOutcome::Failed(document.source.id, e),
    }
}
