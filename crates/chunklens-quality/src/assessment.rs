use chrono::{DateTime, Utc};
use chunklens_document::ChunkerId;
use serde::{Deserialize, Serialize};

use crate::label::{AssessmentMethod, QualityLabel};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkAssessment {
    pub index: usize,
    pub label: QualityLabel,
    pub quality_score: f64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,
}

impl ChunkAssessment {
    #[must_use]
    pub fn new(index: usize, label: QualityLabel, reason: impl Into<String>) -> Self {
        Self {
            index,
            label,
            quality_score: label.score(),
            reason: reason.into(),
        }
    }
}

/// Document-level label and mean score with the per-chunk breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub label: QualityLabel,
    pub quality_score: f64,
    pub chunks: Vec<ChunkAssessment>,
}

impl Verdict {
    /// Roll per-chunk results up into a document verdict.
    ///
    /// An empty breakdown is `BAD_POC` with score 0. Otherwise a majority of `BAD_POC`
    /// chunks makes the document `BAD_POC`, a `BAD_CHUNKS` share above
    /// `bad_chunk_ratio` makes it `BAD_CHUNKS`, and a mean at or above
    /// `good_threshold` makes it `GOOD`.
    #[must_use]
    pub fn from_chunks(chunks: Vec<ChunkAssessment>, bad_chunk_ratio: f64, good_threshold: f64) -> Self {
        if chunks.is_empty() {
            return Self {
                label: QualityLabel::BadPoc,
                quality_score: 0.0,
                chunks,
            };
        }
        #[allow(clippy::cast_precision_loss)]
        let n = chunks.len() as f64;
        let quality_score = chunks.iter().map(|c| c.quality_score).sum::<f64>() / n;
        #[allow(clippy::cast_precision_loss)]
        let share = |label: QualityLabel| chunks.iter().filter(|c| c.label == label).count() as f64 / n;

        let label = if share(QualityLabel::BadPoc) > 0.5 {
            QualityLabel::BadPoc
        } else if share(QualityLabel::BadChunks) > bad_chunk_ratio {
            QualityLabel::BadChunks
        } else if quality_score >= good_threshold {
            QualityLabel::Good
        } else {
            QualityLabel::Unknown
        };
        Self {
            label,
            quality_score,
            chunks,
        }
    }

    /// Every chunk relabelled `BAD_POC` because the source itself is unusable.
    #[must_use]
    pub fn degenerate_source(chunk_indices: impl IntoIterator<Item = usize>, reason: &str) -> Self {
        Self {
            label: QualityLabel::BadPoc,
            quality_score: 0.0,
            chunks: chunk_indices
                .into_iter()
                .map(|i| ChunkAssessment::new(i, QualityLabel::BadPoc, reason))
                .collect(),
        }
    }
}

/// A persisted judgment for one (document, chunker, method) key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    pub document_id: String,
    pub chunker_id: ChunkerId,
    pub method: AssessmentMethod,
    pub quality_score: f64,
    pub label: QualityLabel,
    /// USD spent on LLM calls for this assessment; zero for heuristics.
    pub cost: f64,
    pub updated_at: DateTime<Utc>,
    pub chunks: Vec<ChunkAssessment>,
}

impl Assessment {
    #[must_use]
    pub fn new(
        document_id: impl Into<String>,
        chunker_id: ChunkerId,
        method: AssessmentMethod,
        verdict: Verdict,
        cost: f64,
    ) -> Self {
        Self {
            document_id: document_id.into(),
            chunker_id,
            method,
            quality_score: verdict.quality_score,
            label: verdict.label,
            cost: cost.max(0.0),
            updated_at: Utc::now(),
            chunks: verdict.chunks,
        }
    }

    /// Count of chunks carrying `label`.
    #[must_use]
    pub fn count(&self, label: QualityLabel) -> usize {
        self.chunks.iter().filter(|c| c.label == label).count()
    }
}
