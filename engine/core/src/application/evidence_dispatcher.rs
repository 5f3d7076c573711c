// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Evidence Dispatcher
//!
//! Routes each validated evidence item to its analysis path and returns one
//! [`EvidenceAnalysis`] per item, in request order.
//!
//! # Failure isolation
//!
//! Every item runs under its own timeout. A fetch error, reasoning error,
//! unparsable response or timeout is recorded on that item as
//! `analyzed: false` and never aborts the rest of the batch.
//!
//! # Concurrency
//!
//! Items are dispatched through `buffered(max_concurrency)`, so at most that
//! many items are in flight and results come back in index order regardless
//! of completion order. Cancellation stops new items from being dispatched;
//! only items that actually started are counted as attempted.
//!
//! # Temporary files
//!
//! Image bytes are staged in a [`tempfile::NamedTempFile`] (created on the
//! blocking pool) owned by the item future. Dropping the future (success,
//! error, timeout or cancellation) deletes the file.

use crate::application::prompt_composer::{EvidenceMode, PromptComposer, PromptMetadata};
use crate::domain::engine_config::DispatchConfig;
use crate::domain::evidence::{EvidenceItem, EvidencePayload, EvidenceType, ImageSource};
use crate::domain::evidence_fetch::{EvidenceFetcher, FetchError};
use crate::domain::evidence_store::EvidenceStore;
use crate::domain::finding::{AnalysisReport, EvidenceAnalysis, ParseError};
use crate::domain::profile::StandardsProfile;
use crate::domain::reasoning::{ImagePayload, ReasoningError, ReasoningService};
use crate::domain::retrieval::ReferenceChunk;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::NamedTempFile;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub const SENSOR_NOT_IMPLEMENTED: &str = "Sensor data analysis not yet implemented";

/// File name prefix of staged image evidence.
pub const STAGING_PREFIX: &str = "protocollm-evidence-";

#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub item_timeout: Duration,
    pub max_concurrency: usize,
    pub text_chunk_size: usize,
    pub max_image_bytes: u64,
    /// Where image bytes are staged; the system temp dir when `None`
    pub staging_dir: Option<PathBuf>,
}

impl From<&DispatchConfig> for DispatchSettings {
    fn from(config: &DispatchConfig) -> Self {
        Self {
            item_timeout: config.item_timeout,
            max_concurrency: config.max_concurrency,
            text_chunk_size: config.text_chunk_size,
            max_image_bytes: config.max_image_bytes,
            staging_dir: None,
        }
    }
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self::from(&DispatchConfig::default())
    }
}

/// Everything the analyzers need that is shared by all items of a request.
#[derive(Debug, Clone)]
pub struct DispatchContext {
    pub profile: StandardsProfile,
    pub references: Vec<ReferenceChunk>,
    pub metadata: PromptMetadata,
}

#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    /// One entry per dispatched item, in index order
    pub analyses: Vec<EvidenceAnalysis>,
    /// Items that started processing; this is what gets billed
    pub attempted: usize,
    pub cancelled: bool,
}

/// Why one item could not be analyzed.
#[derive(Debug, Error)]
enum ItemError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Reasoning service error: {0}")]
    Reasoning(#[from] ReasoningError),

    #[error("Unparsable analysis: {0}")]
    Parse(#[from] ParseError),

    #[error("Image exceeds {max} bytes ({size})")]
    ImageTooLarge { size: usize, max: u64 },

    #[error("Unsupported image content: {0}")]
    NotAnImage(String),

    #[error("Failed to stage evidence: {0}")]
    Staging(#[from] std::io::Error),

    #[error("Evidence staging task failed: {0}")]
    StagingTask(#[from] tokio::task::JoinError),

    #[error("All {0} text chunks failed: {1}")]
    AllChunksFailed(usize, String),
}

pub struct EvidenceDispatcher {
    reasoning: Arc<dyn ReasoningService>,
    fetcher: Arc<dyn EvidenceFetcher>,
    store: Option<Arc<dyn EvidenceStore>>,
    composer: Arc<PromptComposer>,
    settings: DispatchSettings,
}

impl EvidenceDispatcher {
    pub fn new(
        reasoning: Arc<dyn ReasoningService>,
        fetcher: Arc<dyn EvidenceFetcher>,
        composer: Arc<PromptComposer>,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            reasoning,
            fetcher,
            store: None,
            composer,
            settings,
        }
    }

    pub fn with_evidence_store(mut self, store: Arc<dyn EvidenceStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn settings(&self) -> &DispatchSettings {
        &self.settings
    }

    pub fn reasoning(&self) -> &Arc<dyn ReasoningService> {
        &self.reasoning
    }

    pub async fn process_batch(
        &self,
        items: Vec<EvidenceItem>,
        context: &DispatchContext,
        cancel: &CancellationToken,
    ) -> DispatchOutcome {
        let attempted = AtomicUsize::new(0);
        let concurrency = self.settings.max_concurrency.max(1);

        let results: Vec<Option<EvidenceAnalysis>> = stream::iter(items)
            .map(|item| {
                let attempted = &attempted;
                async move {
                    if cancel.is_cancelled() {
                        return None;
                    }
                    attempted.fetch_add(1, Ordering::SeqCst);
                    let index = item.index;
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            debug!(index, "Evidence item cancelled in flight");
                            None
                        }
                        analysis = self.process_item(item, context) => Some(analysis),
                    }
                }
            })
            .buffered(concurrency)
            .collect()
            .await;

        let cancelled = cancel.is_cancelled();
        DispatchOutcome {
            analyses: results.into_iter().flatten().collect(),
            attempted: attempted.load(Ordering::SeqCst),
            cancelled,
        }
    }

    /// Analyze one item under the per-item timeout.
    pub async fn process_item(&self, item: EvidenceItem, context: &DispatchContext) -> EvidenceAnalysis {
        let index = item.index;
        let evidence_type = item.evidence_type;
        let locator = item.source_locator.clone();
        let started = Instant::now();

        let result = tokio::time::timeout(self.settings.item_timeout, self.analyze(item, context)).await;
        metrics::histogram!("protocollm_evidence_item_duration_seconds", "type" => evidence_type.as_str())
            .record(started.elapsed().as_secs_f64());

        match result {
            Ok(Ok(analysis)) => analysis,
            Ok(Err(e)) => {
                warn!(index, %evidence_type, "Evidence analysis failed: {}", e);
                EvidenceAnalysis::failed(index, evidence_type, locator, e.to_string())
            }
            Err(_) => {
                warn!(index, %evidence_type, timeout = ?self.settings.item_timeout, "Evidence analysis timed out");
                EvidenceAnalysis::failed(
                    index,
                    evidence_type,
                    locator,
                    format!("Analysis timed out after {:?}", self.settings.item_timeout),
                )
            }
        }
    }

    async fn analyze(&self, item: EvidenceItem, context: &DispatchContext) -> Result<EvidenceAnalysis, ItemError> {
        let EvidenceItem {
            index,
            evidence_type,
            payload,
            source_locator,
        } = item;

        match payload {
            EvidencePayload::Image(source) => {
                self.analyze_image(index, source_locator, source, context).await
            }
            EvidencePayload::Text { content, .. } => {
                self.analyze_text(index, evidence_type, source_locator, &content, context)
                    .await
            }
            EvidencePayload::Checklist(checklist) => {
                self.analyze_text(index, evidence_type, source_locator, &checklist.render(), context)
                    .await
            }
            EvidencePayload::Sensor(_) => Ok(EvidenceAnalysis::not_implemented(
                index,
                EvidenceType::Sensor,
                SENSOR_NOT_IMPLEMENTED,
            )),
        }
    }

    async fn analyze_image(
        &self,
        index: usize,
        source_locator: Option<String>,
        source: ImageSource,
        context: &DispatchContext,
    ) -> Result<EvidenceAnalysis, ItemError> {
        let (bytes, reported_type) = match source {
            ImageSource::Url(url) => {
                let fetched = self.fetcher.fetch(&url).await?;
                (fetched.bytes, fetched.content_type)
            }
            ImageSource::Inline { data, content_type } => (data, content_type),
        };

        if bytes.len() as u64 > self.settings.max_image_bytes {
            return Err(ItemError::ImageTooLarge {
                size: bytes.len(),
                max: self.settings.max_image_bytes,
            });
        }

        let mime_type = sniff_image_type(&bytes, reported_type.as_deref())?;

        // Removed when `_staged` drops, on every exit path
        let _staged = self.stage(bytes.clone()).await?;

        let evidence_digest = self.persist(&bytes, &mime_type).await;

        let image = ImagePayload::from_bytes(&bytes, mime_type.as_str());
        let prompt = self
            .composer
            .compose(&context.profile, &context.references, &context.metadata, &EvidenceMode::Image);

        let response = self.invoke(&prompt, Some(&image)).await?;
        let report = AnalysisReport::parse(&response)?;

        let mut analysis = EvidenceAnalysis::analyzed(
            index,
            EvidenceType::Image,
            source_locator,
            report.observations,
            report.overall_assessment.and_then(|a| a.summary),
        );
        analysis.evidence_digest = evidence_digest;
        Ok(analysis)
    }

    /// Text, documents and rendered checklists. Each chunk is analyzed
    /// separately and the observations are concatenated.
    async fn analyze_text(
        &self,
        index: usize,
        evidence_type: EvidenceType,
        source_locator: Option<String>,
        content: &str,
        context: &DispatchContext,
    ) -> Result<EvidenceAnalysis, ItemError> {
        let chunks = chunk_text(content, self.settings.text_chunk_size);
        let total = chunks.len();
        let mut observations = Vec::new();
        let mut summary = None;
        let mut failures = Vec::new();

        for (i, chunk) in chunks.into_iter().enumerate() {
            let prompt = self.composer.compose(
                &context.profile,
                &context.references,
                &context.metadata,
                &EvidenceMode::Text(chunk),
            );
            let report = match self.invoke(&prompt, None).await {
                Ok(response) => AnalysisReport::parse(&response).map_err(ItemError::from),
                Err(e) => Err(e),
            };
            match report {
                Ok(report) => {
                    observations.extend(report.observations);
                    if let Some(s) = report.overall_assessment.and_then(|a| a.summary) {
                        summary = Some(s);
                    }
                }
                Err(e) => {
                    warn!(index, chunk = i, "Text chunk analysis failed: {}", e);
                    failures.push(e.to_string());
                }
            }
        }

        if failures.len() == total {
            let first = failures.into_iter().next().unwrap_or_default();
            return Err(ItemError::AllChunksFailed(total, first));
        }

        let mut analysis =
            EvidenceAnalysis::analyzed(index, evidence_type, source_locator, observations, summary);
        if !failures.is_empty() {
            analysis.note = Some(format!("{} of {} text chunks could not be analyzed", failures.len(), total));
        }
        Ok(analysis)
    }

    async fn invoke(&self, prompt: &str, image: Option<&ImagePayload>) -> Result<String, ItemError> {
        let started = Instant::now();
        let result = self.reasoning.invoke(prompt, image).await;
        metrics::histogram!("protocollm_reasoning_latency_seconds").record(started.elapsed().as_secs_f64());
        Ok(result?)
    }

    async fn stage(&self, bytes: Bytes) -> Result<NamedTempFile, ItemError> {
        let dir = self.settings.staging_dir.clone();
        let staged = tokio::task::spawn_blocking(move || -> std::io::Result<NamedTempFile> {
            let mut builder = tempfile::Builder::new();
            builder.prefix(STAGING_PREFIX);
            let mut file = match &dir {
                Some(dir) => builder.tempfile_in(dir)?,
                None => builder.tempfile()?,
            };
            file.write_all(&bytes)?;
            file.flush()?;
            Ok(file)
        })
        .await??;
        Ok(staged)
    }

    /// Best-effort audit copy. Failures are logged and otherwise ignored.
    async fn persist(&self, bytes: &[u8], content_type: &str) -> Option<String> {
        let store = self.store.as_ref()?;
        match store.put(bytes, content_type).await {
            Ok(stored) => Some(stored.digest),
            Err(e) => {
                warn!("Evidence store write failed, continuing: {}", e);
                None
            }
        }
    }
}

/// Pick the MIME type sent with an image: sniffed from content first, then
/// the reported Content-Type, then `image/jpeg`.
fn sniff_image_type(bytes: &[u8], reported: Option<&str>) -> Result<String, ItemError> {
    if let Some(kind) = infer::get(bytes) {
        let mime = kind.mime_type();
        if kind.matcher_type() != infer::MatcherType::Image {
            return Err(ItemError::NotAnImage(mime.to_string()));
        }
        return Ok(mime.to_string());
    }

    let reported = reported
        .map(|ct| ct.split(';').next().unwrap_or(ct).trim().to_ascii_lowercase())
        .filter(|ct| ct.starts_with("image/"));
    Ok(reported.unwrap_or_else(|| "image/jpeg".to_string()))
}

/// Split text into chunks of at most `max_chars` characters, breaking on
/// line boundaries and, for over-long lines, on spaces.
///
/// A single word longer than `max_chars` becomes its own oversized chunk.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let len = |s: &str| s.chars().count();
    if len(text) <= max_chars {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();

    for line in text.split('\n') {
        if len(&current) + len(line) + 1 > max_chars {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            if len(line) > max_chars {
                for word in line.split(' ') {
                    if !current.is_empty() && len(&current) + len(word) + 1 > max_chars {
                        chunks.push(std::mem::take(&mut current));
                    }
                    if !current.is_empty() {
                        current.push(' ');
                    }
                    current.push_str(word);
                }
            } else {
                current.push_str(line);
            }
        } else {
            if !current.is_empty() {
                current.push('\n');
            }
            current.push_str(line);
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
