//! LLM-judged assessment. One judgment request per chunk, issued concurrently.

use chunklens_document::Chunk;
use chunklens_llm::{CallCost, CompletionRequest, LlmProvider, ModelPricing};
use futures::future::join_all;
use serde::{Deserialize, Serialize};

use crate::assessment::{ChunkAssessment, Verdict};
use crate::label::QualityLabel;

const SYSTEM_PROMPT: &str = "You review chunks cut from documents for a retrieval index. \
     Answer with a single JSON object and nothing else.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiJudgeConfig {
    pub max_tokens: u32,
    pub temperature: f32,
    /// Chunk text beyond this many characters is cut from the judgment prompt.
    pub max_content_chars: usize,
}

impl Default for AiJudgeConfig {
    fn default() -> Self {
        Self {
            max_tokens: 200,
            temperature: 0.0,
            max_content_chars: 4000,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Judgment {
    label: String,
    #[serde(default)]
    score: Option<f64>,
    #[serde(default)]
    reason: Option<String>,
}

fn build_prompt(chunk: &Chunk, max_chars: usize) -> String {
    let text = chunk.source_text();
    let body = match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}\n… [truncated]", &text[..cut]),
        None => text.to_owned(),
    };
    format!(
        "Chunk {} of {} (kind {}).\n---\n{body}\n---\n\
         Label the chunk with exactly one of:\n\
         GOOD: self-contained, well bounded, useful for retrieval\n\
         BAD_CHUNKS: the source is fine but this chunk is cut badly (too short, too long, \
         split mid-thought)\n\
         BAD_POC: the source content itself is unusable (empty, boilerplate, navigation)\n\
         UNKNOWN: cannot tell\n\
         Reply as {{\"label\": \"GOOD\", \"score\": 0.0-1.0, \"reason\": \"...\"}}",
        chunk.index + 1,
        chunk.total.max(chunk.index + 1),
        chunk.kind(),
    )
}

/// Parse the first JSON object in a model reply into a chunk assessment.
fn parse_judgment(index: usize, reply: &str) -> Option<ChunkAssessment> {
    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    if end < start {
        return None;
    }
    let judgment: Judgment = serde_json::from_str(&reply[start..=end]).ok()?;
    let label: QualityLabel = judgment.label.parse().ok()?;
    let quality_score = judgment
        .score
        .filter(|s| s.is_finite())
        .map_or(label.score(), |s| s.clamp(0.0, 1.0));
    Some(ChunkAssessment {
        index,
        label,
        quality_score,
        reason: judgment.reason.unwrap_or_default(),
    })
}

/// Result of an LLM-judged run: the verdict plus the cost of every completed call.
#[derive(Debug, Clone, PartialEq)]
pub struct AiAssessment {
    pub verdict: Verdict,
    pub costs: Vec<CallCost>,
}

impl AiAssessment {
    #[must_use]
    pub fn total_cost(&self) -> f64 {
        CallCost::sum(&self.costs).total_cost
    }
}

#[derive(Debug, Clone)]
pub struct AiAssessor<P> {
    provider: P,
    pricing: ModelPricing,
    config: AiJudgeConfig,
    bad_chunk_ratio: f64,
    good_threshold: f64,
}

impl<P: LlmProvider> AiAssessor<P> {
    #[must_use]
    pub fn new(provider: P, pricing: ModelPricing, quality: &crate::QualityConfig) -> Self {
        Self {
            provider,
            pricing,
            config: quality.ai.clone(),
            bad_chunk_ratio: quality.bad_chunk_ratio,
            good_threshold: quality.good_threshold,
        }
    }

    /// Judge every chunk. A failed call or unparseable reply degrades that chunk to
    /// `UNKNOWN`; the remaining chunks are unaffected.
    pub async fn assess(&self, chunks: &[Chunk]) -> AiAssessment {
        let replies = join_all(chunks.iter().map(|chunk| async move {
            let request = CompletionRequest::new(build_prompt(chunk, self.config.max_content_chars))
                .with_system(SYSTEM_PROMPT)
                .with_max_tokens(self.config.max_tokens)
                .with_temperature(self.config.temperature);
            self.provider.complete(&request).await
        }))
        .await;

        let mut costs = Vec::new();
        let mut assessed = Vec::with_capacity(chunks.len());
        for (chunk, reply) in chunks.iter().zip(replies) {
            let assessment = match reply {
                Ok(completion) => {
                    costs.push(self.pricing.cost_of(&completion));
                    parse_judgment(chunk.index, &completion.content).unwrap_or_else(|| {
                        tracing::warn!(index = chunk.index, "unparseable judgment reply");
                        ChunkAssessment::new(chunk.index, QualityLabel::Unknown, "unparseable reply")
                    })
                }
                Err(e) => {
                    tracing::warn!(index = chunk.index, "judgment call failed: {e}");
                    ChunkAssessment::new(chunk.index, QualityLabel::Unknown, format!("llm error: {e}"))
                }
            };
            assessed.push(assessment);
        }

        let verdict = Verdict::from_chunks(assessed, self.bad_chunk_ratio, self.good_threshold);
        tracing::info!(
            provider = self.provider.name(),
            chunks = chunks.len(),
            calls = costs.len(),
            label = %verdict.label,
            "ai assessment finished"
        );
        AiAssessment { verdict, costs }
    }
}
