use chunklens_document::{Chunk, ChunkKind};
use serde::{Deserialize, Serialize};

use crate::ai::AiJudgeConfig;
use crate::assessment::{ChunkAssessment, Verdict};
use crate::label::QualityLabel;

/// Phrases whose presence in a short chunk marks it as site chrome rather than content.
const BOILERPLATE_MARKERS: &[&str] = &[
    "all rights reserved",
    "cookie",
    "privacy policy",
    "terms of use",
    "terms of service",
    "subscribe",
    "sign in",
    "log in",
    "sign up",
    "share this",
    "read more",
    "click here",
    "advertisement",
    "loading...",
    "table of contents",
    "©",
    "все права защищены",
    "подписаться",
    "читать далее",
];

const BOILERPLATE_MAX_CHARS: usize = 200;

const TERMINAL: &[char] = &[
    '.', '!', '?', ':', ';', '…', '"', '\'', ')', ']', '»', '”', '’',
];

/// Thresholds for heuristic scoring and the document verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    /// Text chunks under this many tokens are `BAD_CHUNKS`.
    pub min_tokens: usize,
    /// Documents with fewer non-whitespace characters are `BAD_POC`.
    pub min_document_chars: usize,
    /// Share of boilerplate-only text chunks at which the document is `BAD_POC`.
    pub boilerplate_ratio: f64,
    /// Share of `BAD_CHUNKS` above which the document verdict is `BAD_CHUNKS`.
    pub bad_chunk_ratio: f64,
    /// Mean score at or above which the document verdict is `GOOD`.
    pub good_threshold: f64,
    pub ai: AiJudgeConfig,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            min_tokens: 20,
            min_document_chars: 200,
            boilerplate_ratio: 0.6,
            bad_chunk_ratio: 0.3,
            good_threshold: 0.7,
            ai: AiJudgeConfig::default(),
        }
    }
}

/// Lowercased text is short and dominated by site chrome, or has no letters at all.
#[must_use]
pub fn is_boilerplate(text: &str) -> bool {
    if !text.chars().any(char::is_alphabetic) {
        return true;
    }
    if text.chars().count() > BOILERPLATE_MAX_CHARS {
        return false;
    }
    let lower = text.to_lowercase();
    BOILERPLATE_MARKERS.iter().any(|m| lower.contains(m))
}

fn ends_mid_sentence(text: &str) -> bool {
    text.trim_end()
        .chars()
        .last()
        .is_some_and(|c| !TERMINAL.contains(&c))
}

fn starts_mid_sentence(text: &str) -> bool {
    text.chars()
        .find(|c| c.is_alphabetic())
        .is_some_and(char::is_lowercase)
}

/// Structural scoring with no external calls.
#[derive(Debug, Clone, Default)]
pub struct HeuristicAssessor {
    config: QualityConfig,
}

impl HeuristicAssessor {
    #[must_use]
    pub fn new(config: QualityConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &QualityConfig {
        &self.config
    }

    /// Label one chunk. `max_tokens` is the producing strategy's hard cap.
    #[must_use]
    pub fn assess_chunk(&self, chunk: &Chunk, max_tokens: usize) -> ChunkAssessment {
        let (label, reason) = self.label_chunk(chunk, max_tokens);
        ChunkAssessment::new(chunk.index, label, reason)
    }

    fn label_chunk(&self, chunk: &Chunk, max_tokens: usize) -> (QualityLabel, &'static str) {
        let text = chunk.source_text().trim();
        if text.is_empty() {
            return (QualityLabel::BadPoc, "empty chunk");
        }
        match chunk.kind() {
            ChunkKind::Image => {
                let bare = chunk.caption().trim().is_empty()
                    && chunk.filename().is_some_and(|f| f == text);
                if bare {
                    (QualityLabel::Unknown, "image without caption or alt text")
                } else {
                    (QualityLabel::Good, "")
                }
            }
            ChunkKind::Code | ChunkKind::Table => {
                if chunk.token_count > max_tokens {
                    (QualityLabel::BadChunks, "exceeds token cap")
                } else {
                    (QualityLabel::Good, "")
                }
            }
            ChunkKind::Paragraph | ChunkKind::Section => {
                let tokens = chunk.token_count;
                if is_boilerplate(text) {
                    (QualityLabel::BadPoc, "boilerplate only")
                } else if tokens < self.config.min_tokens {
                    (QualityLabel::BadChunks, "too short")
                } else if tokens > max_tokens {
                    (QualityLabel::BadChunks, "exceeds token cap")
                } else if ends_mid_sentence(text) {
                    (QualityLabel::BadChunks, "ends mid-sentence")
                } else if starts_mid_sentence(text) {
                    (QualityLabel::BadChunks, "starts mid-sentence")
                } else {
                    (QualityLabel::Good, "")
                }
            }
        }
    }

    /// Score a chunk set and derive the document verdict.
    #[must_use]
    pub fn assess(&self, chunks: &[Chunk], max_tokens: usize) -> Verdict {
        let source_chars: usize = chunks
            .iter()
            .map(|c| c.source_text().chars().filter(|ch| !ch.is_whitespace()).count())
            .sum();
        if !chunks.is_empty() && source_chars < self.config.min_document_chars {
            tracing::debug!(source_chars, "source below minimum size");
            return Verdict::degenerate_source(chunks.iter().map(|c| c.index), "document too small");
        }

        let text_chunks: Vec<&Chunk> = chunks.iter().filter(|c| !c.kind().is_special()).collect();
        let boilerplate = text_chunks
            .iter()
            .filter(|c| is_boilerplate(c.source_text()))
            .count();
        #[allow(clippy::cast_precision_loss)]
        let boilerplate_share = if text_chunks.is_empty() {
            0.0
        } else {
            boilerplate as f64 / text_chunks.len() as f64
        };
        if boilerplate > 0 && boilerplate_share >= self.config.boilerplate_ratio {
            tracing::debug!(boilerplate, "source is mostly boilerplate");
            return Verdict::degenerate_source(chunks.iter().map(|c| c.index), "boilerplate source");
        }

        let assessed = chunks
            .iter()
            .map(|c| self.assess_chunk(c, max_tokens))
            .collect();
        Verdict::from_chunks(assessed, self.config.bad_chunk_ratio, self.config.good_threshold)
    }
}
