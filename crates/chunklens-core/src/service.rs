//! The chunk / assess / align operations over a content source and a repository.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use chunklens_align::{AlignmentContext, Viewer};
use chunklens_document::{
    CaptionResolver, Chunk, ChunkPipeline, ChunkerId, EnhancementReport, Enhancer, StructureExtractor,
    resolve_image_sources,
};
use chunklens_llm::{CallCost, LlmProvider};
use chunklens_quality::{AiAssessor, Assessment, AssessmentMethod, HeuristicAssessor};
use chunklens_store::ledger::{Bucket, BucketSummary, CostRecord, CostSummary, bucketize, within};
use chunklens_store::ChunkRepository;
use futures::future::join_all;
use serde::Serialize;
use tokio::sync::OwnedMutexGuard;

use crate::config::Config;
use crate::error::ServiceError;
use crate::source::ContentSource;

/// Result of one chunking run.
#[derive(Debug, Clone, Serialize)]
pub struct ChunkRun {
    pub document_id: String,
    pub chunker_id: ChunkerId,
    pub chunks: Vec<Chunk>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enhancement: Option<EnhancementReport>,
}

/// Alignment of a stored chunk set, plus the highlighted HTML when a chunk was selected.
#[derive(Debug, Clone, Serialize)]
pub struct Alignment {
    pub context: AlignmentContext,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BatchResult {
    Chunked {
        chunks: usize,
        enhanced: usize,
        failed: usize,
    },
    Failed {
        error: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentOutcome {
    pub document_id: String,
    #[serde(flatten)]
    pub result: BatchResult,
}

type LockKey = (String, ChunkerId);

/// One async mutex per (document, chunker) so runs against the same chunk set serialize.
#[derive(Default)]
struct KeyedLocks {
    inner: Mutex<HashMap<LockKey, Arc<tokio::sync::Mutex<()>>>>,
}

impl KeyedLocks {
    async fn acquire(&self, document_id: &str, chunker: ChunkerId) -> KeyedGuard<'_> {
        let key = (document_id.to_owned(), chunker);
        let lock = {
            let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(map.entry(key.clone()).or_default())
        };
        KeyedGuard {
            locks: self,
            key,
            guard: Some(lock.lock_owned().await),
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// Held for the length of a run; the map entry goes away with its last holder.
struct KeyedGuard<'a> {
    locks: &'a KeyedLocks,
    key: LockKey,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for KeyedGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut map = self.locks.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if map.get(&self.key).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            map.remove(&self.key);
        }
    }
}

fn parse_chunker(chunker: &str) -> Result<ChunkerId, ServiceError> {
    ChunkerId::from_str(chunker).map_err(|_| ServiceError::InvalidChunker(chunker.to_owned()))
}

fn parse_method(method: &str) -> Result<AssessmentMethod, ServiceError> {
    AssessmentMethod::from_str(method).map_err(|_| ServiceError::InvalidMethod(method.to_owned()))
}

pub struct ChunkService<P, S, C> {
    pipeline: Arc<ChunkPipeline>,
    enhancer: Enhancer<P>,
    judge: AiAssessor<P>,
    heuristics: HeuristicAssessor,
    store: S,
    source: C,
    locks: KeyedLocks,
}

impl<P, S, C> std::fmt::Debug for ChunkService<P, S, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkService")
            .field("pipeline", &self.pipeline)
            .finish_non_exhaustive()
    }
}

impl<P, S, C> ChunkService<P, S, C>
where
    P: LlmProvider + Clone,
    S: ChunkRepository,
    C: ContentSource,
{
    /// # Errors
    ///
    /// Returns an error if a configured caption label cannot be compiled into a pattern.
    pub fn new(config: &Config, provider: P, store: S, source: C) -> Result<Self, ServiceError> {
        let captions = CaptionResolver::new(config.captions.labels.as_slice())?;
        let pipeline = ChunkPipeline::new(StructureExtractor::new(captions), config.chunking);
        let pricing = config.llm.pricing();
        Ok(Self {
            pipeline: Arc::new(pipeline),
            enhancer: Enhancer::new(provider.clone(), config.enhancement, pricing),
            judge: AiAssessor::new(provider, pricing, &config.quality),
            heuristics: HeuristicAssessor::new(config.quality.clone()),
            store,
            source,
            locks: KeyedLocks::default(),
        })
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Chunk a document, replacing any earlier chunk set for the same chunker.
    ///
    /// LLM-enhanced chunkers record the cost of every completed call before the chunk
    /// set is written, so spending survives a failed write.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown chunker id (before any work), a missing document,
    /// or a repository failure.
    pub async fn chunk(&self, document_id: &str, chunker: &str) -> Result<ChunkRun, ServiceError> {
        let chunker = parse_chunker(chunker)?;
        self.chunk_with(document_id, chunker).await
    }

    async fn chunk_with(&self, document_id: &str, chunker: ChunkerId) -> Result<ChunkRun, ServiceError> {
        let _guard = self.locks.acquire(document_id, chunker).await;

        let document = self.source.fetch(document_id).await?;
        let pipeline = Arc::clone(&self.pipeline);
        let created_at = Utc::now();
        let mut chunks =
            tokio::task::spawn_blocking(move || pipeline.chunk_html(&document.html, chunker, created_at))
                .await?;

        let enhancement = if chunker.is_llm_enhanced() {
            let max_tokens = self.pipeline.strategy(chunker).max_tokens();
            let report = self.enhancer.enhance(&mut chunks, max_tokens).await;
            self.record_costs(document_id, &report.costs).await?;
            Some(report)
        } else {
            None
        };

        self.store.replace_chunks(document_id, chunker, &chunks).await?;
        tracing::info!(document_id, chunker = %chunker, chunks = chunks.len(), "chunk set replaced");

        Ok(ChunkRun {
            document_id: document_id.to_owned(),
            chunker_id: chunker,
            chunks,
            enhancement,
        })
    }

    /// Chunk several documents with one chunker. Outcomes follow input order and a
    /// failure on one document does not stop the others.
    ///
    /// # Errors
    ///
    /// Returns an error only for an unknown chunker id.
    pub async fn chunk_many(
        &self,
        document_ids: &[String],
        chunker: &str,
    ) -> Result<Vec<DocumentOutcome>, ServiceError> {
        let chunker = parse_chunker(chunker)?;
        let outcomes = join_all(document_ids.iter().map(|id| async move {
            let result = match self.chunk_with(id, chunker).await {
                Ok(run) => BatchResult::Chunked {
                    chunks: run.chunks.len(),
                    enhanced: run.enhancement.as_ref().map_or(0, EnhancementReport::enhanced),
                    failed: run.enhancement.as_ref().map_or(0, EnhancementReport::failed),
                },
                Err(e) => {
                    tracing::warn!(document_id = %id, "chunking failed: {e}");
                    BatchResult::Failed {
                        error: e.to_string(),
                    }
                }
            };
            DocumentOutcome {
                document_id: id.clone(),
                result,
            }
        }))
        .await;
        Ok(outcomes)
    }

    /// Assess the stored chunk set and replace any earlier assessment for the same key.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown chunker or method (before any work), when no
    /// chunk set is stored, or on a repository failure.
    pub async fn assess(
        &self,
        document_id: &str,
        chunker: &str,
        method: &str,
    ) -> Result<Assessment, ServiceError> {
        let chunker = parse_chunker(chunker)?;
        let method = parse_method(method)?;

        let _guard = self.locks.acquire(document_id, chunker).await;

        let chunks = self.stored_chunks(document_id, chunker).await?;
        let (verdict, cost) = match method {
            AssessmentMethod::BasicHeuristics => {
                let max_tokens = self.pipeline.strategy(chunker).max_tokens();
                (self.heuristics.assess(&chunks, max_tokens), 0.0)
            }
            AssessmentMethod::AiAdvanced => {
                let judged = self.judge.assess(&chunks).await;
                self.record_costs(document_id, &judged.costs).await?;
                let cost = judged.total_cost();
                (judged.verdict, cost)
            }
        };

        let assessment = Assessment::new(document_id, chunker, method, verdict, cost);
        self.store.replace_assessment(&assessment).await?;
        tracing::info!(
            document_id,
            chunker = %chunker,
            method = %method,
            label = %assessment.label,
            score = assessment.quality_score,
            "assessment replaced"
        );
        Ok(assessment)
    }

    /// Align the stored chunk set against the rendered document. With `highlight`, also
    /// return the document HTML with that chunk's elements marked.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown chunker id, a missing chunk set or document,
    /// or a repository failure. Chunks that cannot be located are not errors.
    pub async fn align(
        &self,
        document_id: &str,
        chunker: &str,
        highlight: Option<usize>,
    ) -> Result<Alignment, ServiceError> {
        let chunker = parse_chunker(chunker)?;
        let chunks = self.stored_chunks(document_id, chunker).await?;
        let document = self.source.fetch(document_id).await?;
        let viewer_id = format!("{document_id}:{chunker}");

        let (context, html) = tokio::task::spawn_blocking(move || {
            let html = resolve_image_sources(&document.html, &document.images);
            let mut viewer = Viewer::new(viewer_id, &html);
            let context = viewer.align(&chunks);
            let rendered = highlight.map(|index| {
                viewer.highlight(&context, index);
                viewer.render()
            });
            (context, rendered)
        })
        .await?;

        tracing::info!(
            document_id,
            chunker = %chunker,
            found = context.found_count(),
            chunks = context.positions.len(),
            "alignment built"
        );
        Ok(Alignment { context, html })
    }

    /// # Errors
    ///
    /// Returns an error for an unknown chunker id or a repository failure.
    pub async fn chunks(&self, document_id: &str, chunker: &str) -> Result<Vec<Chunk>, ServiceError> {
        let chunker = parse_chunker(chunker)?;
        Ok(self.store.load_chunks(document_id, chunker).await?)
    }

    /// Totals over the cost ledger, optionally for one document and a `[from, to)` window.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger cannot be read.
    pub async fn cost_summary(
        &self,
        document_id: Option<&str>,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<CostSummary, ServiceError> {
        let records = self.store.cost_records(document_id).await?;
        Ok(CostSummary::of(within(&records, from, to)))
    }

    /// # Errors
    ///
    /// Returns an error if the ledger cannot be read.
    pub async fn cost_buckets(
        &self,
        document_id: Option<&str>,
        bucket: Bucket,
    ) -> Result<Vec<BucketSummary>, ServiceError> {
        let records = self.store.cost_records(document_id).await?;
        Ok(bucketize(&records, bucket))
    }

    async fn stored_chunks(&self, document_id: &str, chunker: ChunkerId) -> Result<Vec<Chunk>, ServiceError> {
        let chunks = self.store.load_chunks(document_id, chunker).await?;
        if chunks.is_empty() {
            return Err(ServiceError::NoChunks {
                document_id: document_id.to_owned(),
                chunker,
            });
        }
        Ok(chunks)
    }

    async fn record_costs(&self, document_id: &str, costs: &[CallCost]) -> Result<(), ServiceError> {
        let recorded_at = Utc::now();
        for cost in costs {
            let record = CostRecord::from_call(document_id, cost, recorded_at);
            self.store.append_cost(&record).await?;
        }
        if !costs.is_empty() {
            tracing::debug!(document_id, calls = costs.len(), "cost records appended");
        }
        Ok(())
    }
}
