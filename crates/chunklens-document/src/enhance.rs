//! LLM descriptions for image, table and code chunks.

use chunklens_llm::{CallCost, CompletionRequest, LlmProvider, ModelPricing};
use futures::future::join_all;
use serde::{Deserialize, Serialize};

use crate::chunk::{Chunk, ChunkContent};
use crate::split::truncate_chars;
use crate::tokens::{chars_for_tokens, estimate_tokens};

const SEPARATOR: &str = "\n\n";
const TRUNCATION_MARKER: &str = "\n… [truncated]";
/// A description shorter than this many tokens is not worth an LLM call.
const MIN_DESCRIPTION_TOKENS: usize = 16;

const SYSTEM_PROMPT: &str = "You write short descriptions of document fragments for a semantic \
     search index. Describe meaning and purpose in plain prose so that a reader's question would \
     match it. Do not transcribe the fragment and do not use markdown.";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnhancementConfig {
    /// Raw code/table content beyond this many characters is cut from the prompt.
    pub max_content_chars: usize,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for EnhancementConfig {
    fn default() -> Self {
        Self {
            max_content_chars: 4000,
            max_tokens: 400,
            temperature: 0.3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EnhancementOutcome {
    Enhanced,
    Failed { reason: String },
    Skipped { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkOutcome {
    pub index: usize,
    #[serde(flatten)]
    pub outcome: EnhancementOutcome,
}

/// Per-target outcomes, ordered by chunk index, and the cost of every completed call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnhancementReport {
    pub outcomes: Vec<ChunkOutcome>,
    pub costs: Vec<CallCost>,
}

impl EnhancementReport {
    #[must_use]
    pub fn enhanced(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.outcome == EnhancementOutcome::Enhanced)
            .count()
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.outcome, EnhancementOutcome::Failed { .. }))
            .count()
    }

    #[must_use]
    pub fn total_cost(&self) -> CallCost {
        CallCost::sum(&self.costs)
    }
}

fn truncate_content(content: &str, max_chars: usize) -> String {
    match content.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}{TRUNCATION_MARKER}", &content[..cut]),
        None => content.to_owned(),
    }
}

fn caption_line(caption: &str) -> String {
    if caption.trim().is_empty() {
        String::new()
    } else {
        format!("Caption: {caption}\n")
    }
}

/// Type-specific prompt for a special chunk; `None` for text chunks.
#[must_use]
pub fn build_prompt(chunk: &Chunk, max_content_chars: usize) -> Option<String> {
    let body = chunk.source_text();
    match &chunk.content {
        ChunkContent::Image { filename, caption } => {
            let mut prompt = String::from(
                "Describe the image below for retrieval. Say what it most likely shows and which \
                 topics it illustrates.\n",
            );
            prompt.push_str(&format!("Filename: {filename}\n"));
            prompt.push_str(&caption_line(caption));
            if body != filename && body != caption {
                prompt.push_str(&format!("Alt text: {body}\n"));
            }
            Some(prompt)
        }
        ChunkContent::Code { caption } => Some(format!(
            "Explain in a few sentences what the following code does, naming its purpose and \
             key identifiers.\n{}\n```\n{}\n```",
            caption_line(caption),
            truncate_content(body, max_content_chars)
        )),
        ChunkContent::Table { caption } => Some(format!(
            "Summarize in a few sentences what the following table contains, what it compares \
             and any notable values.\n{}\n{}",
            caption_line(caption),
            truncate_content(body, max_content_chars)
        )),
        ChunkContent::Paragraph | ChunkContent::Section => None,
    }
}

struct Target {
    position: usize,
    available_chars: usize,
    prompt: String,
}

/// Post-processes special chunks with LLM-written descriptions.
#[derive(Debug, Clone)]
pub struct Enhancer<P> {
    provider: P,
    config: EnhancementConfig,
    pricing: ModelPricing,
}

impl<P: LlmProvider> Enhancer<P> {
    #[must_use]
    pub fn new(provider: P, config: EnhancementConfig, pricing: ModelPricing) -> Self {
        Self {
            provider,
            config,
            pricing,
        }
    }

    #[must_use]
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Enhance every image, table and code chunk in place.
    ///
    /// Requests run concurrently; results are written back by position. A failed call
    /// leaves its chunk untouched and does not affect the others. `text` becomes
    /// `description + "\n\n" + content`, trimmed so the chunk stays within `max_tokens`.
    pub async fn enhance(&self, chunks: &mut [Chunk], max_tokens: usize) -> EnhancementReport {
        let budget_chars = chars_for_tokens(max_tokens);
        let min_chars = chars_for_tokens(MIN_DESCRIPTION_TOKENS);
        let mut outcomes = Vec::new();
        let mut targets = Vec::new();

        for (position, chunk) in chunks.iter().enumerate() {
            let Some(prompt) = build_prompt(chunk, self.config.max_content_chars) else {
                continue;
            };
            let used = chunk.source_text().chars().count() + SEPARATOR.len();
            let available_chars = budget_chars.saturating_sub(used);
            if available_chars < min_chars {
                tracing::debug!(index = chunk.index, "no token budget left for a description");
                outcomes.push(ChunkOutcome {
                    index: chunk.index,
                    outcome: EnhancementOutcome::Skipped {
                        reason: "no token budget left for a description".into(),
                    },
                });
                continue;
            }
            targets.push(Target {
                position,
                available_chars,
                prompt,
            });
        }

        let responses = join_all(targets.iter().map(|target| async move {
            let request = CompletionRequest::new(target.prompt.clone())
                .with_system(SYSTEM_PROMPT)
                .with_max_tokens(self.config.max_tokens)
                .with_temperature(self.config.temperature);
            self.provider.complete(&request).await
        }))
        .await;

        let mut costs = Vec::new();
        for (target, response) in targets.iter().zip(responses) {
            let chunk = &mut chunks[target.position];
            let outcome = match response {
                Ok(completion) => {
                    costs.push(self.pricing.cost_of(&completion));
                    let description = truncate_chars(completion.content.trim(), target.available_chars);
                    if description.is_empty() {
                        EnhancementOutcome::Failed {
                            reason: "empty description".into(),
                        }
                    } else {
                        apply_description(chunk, description);
                        EnhancementOutcome::Enhanced
                    }
                }
                Err(e) => {
                    tracing::warn!(index = chunk.index, kind = %chunk.kind(), "enhancement failed: {e}");
                    EnhancementOutcome::Failed {
                        reason: e.to_string(),
                    }
                }
            };
            outcomes.push(ChunkOutcome {
                index: chunk.index,
                outcome,
            });
        }
        outcomes.sort_by_key(|o| o.index);

        let report = EnhancementReport { outcomes, costs };
        tracing::info!(
            provider = self.provider.name(),
            enhanced = report.enhanced(),
            failed = report.failed(),
            "enhancement finished"
        );
        report
    }
}

fn apply_description(chunk: &mut Chunk, description: &str) {
    let original = chunk.source_text().to_owned();
    chunk.text = format!("{description}{SEPARATOR}{original}");
    chunk.original_text = match chunk.content {
        ChunkContent::Image { .. } => None,
        _ => Some(original),
    };
    chunk.token_count = estimate_tokens(&chunk.text);
    chunk.llm_processed = true;
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use chunklens_llm::mock::MockProvider;

    use super::*;
    use crate::chunk::{ChunkKind, ChunkerId};

    fn chunk(index: usize, content: ChunkContent, text: &str) -> Chunk {
        Chunk {
            index,
            total: 0,
            content,
            text: text.into(),
            original_text: None,
            token_count: estimate_tokens(text),
            chunker_id: ChunkerId::ReadContentParaLlm,
            created_at: Utc::now(),
            llm_processed: false,
        }
    }

    fn code(index: usize, text: &str) -> Chunk {
        chunk(
            index,
            ChunkContent::Code {
                caption: String::new(),
            },
            text,
        )
    }

    fn enhancer(provider: MockProvider) -> Enhancer<MockProvider> {
        Enhancer::new(
            provider,
            EnhancementConfig::default(),
            ModelPricing::new(0.15, 0.60),
        )
    }

    #[tokio::test]
    async fn code_gets_description_first_and_original_kept() {
        let mut chunks = vec![
            chunk(0, ChunkContent::Paragraph, "Intro text."),
            code(1, "fn main() {}"),
        ];
        let provider = MockProvider::with_responses(vec!["Defines an empty entry point.".into()]);
        let report = enhancer(provider).enhance(&mut chunks, 1024).await;

        assert_eq!(chunks[0].text, "Intro text.");
        assert!(!chunks[0].llm_processed);
        assert_eq!(chunks[1].text, "Defines an empty entry point.\n\nfn main() {}");
        assert_eq!(chunks[1].original_text.as_deref(), Some("fn main() {}"));
        assert!(chunks[1].llm_processed);
        assert_eq!(chunks[1].token_count, estimate_tokens(&chunks[1].text));
        assert_eq!(report.enhanced(), 1);
        assert_eq!(report.costs.len(), 1);
    }

    #[tokio::test]
    async fn image_has_no_original_text() {
        let mut chunks = vec![chunk(
            0,
            ChunkContent::Image {
                filename: "a.png".into(),
                caption: String::new(),
            },
            "a.png",
        )];
        enhancer(MockProvider::default()).enhance(&mut chunks, 1024).await;
        assert_eq!(chunks[0].text, "mock response\n\na.png");
        assert!(chunks[0].original_text.is_none());
        assert!(chunks[0].llm_processed);
        assert_eq!(chunks[0].kind(), ChunkKind::Image);
    }

    #[tokio::test]
    async fn one_failure_does_not_abort_batch() {
        let mut chunks: Vec<Chunk> = (0..5).map(|i| code(i, &format!("step_{i}()"))).collect();
        let provider = MockProvider::default().failing_on("step_2()");
        let report = enhancer(provider.clone()).enhance(&mut chunks, 1024).await;

        assert_eq!(provider.call_count(), 5);
        assert_eq!(chunks.iter().filter(|c| c.llm_processed).count(), 4);
        assert_eq!(chunks[2].text, "step_2()");
        assert!(chunks[2].original_text.is_none());
        assert_eq!(report.enhanced(), 4);
        assert_eq!(report.failed(), 1);
        assert!(matches!(report.outcomes[2].outcome, EnhancementOutcome::Failed { .. }));
        let indices: Vec<_> = report.outcomes.iter().map(|o| o.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn results_written_by_position_not_completion_order() {
        let mut chunks: Vec<Chunk> = (0..3).map(|i| code(i, &format!("body_{i}"))).collect();
        let provider = MockProvider::with_responses(vec!["first".into(), "second".into(), "third".into()])
            .with_delay(5);
        enhancer(provider).enhance(&mut chunks, 1024).await;
        for c in &chunks {
            assert!(c.text.ends_with(&format!("body_{}", c.index)));
        }
    }

    #[tokio::test]
    async fn description_trimmed_to_token_cap() {
        let mut chunks = vec![code(0, &"x".repeat(100))];
        let long = "This is a long description sentence. ".repeat(40);
        let provider = MockProvider::with_responses(vec![long]);
        enhancer(provider).enhance(&mut chunks, 64).await;
        assert!(chunks[0].llm_processed);
        assert!(chunks[0].token_count <= 64);
        assert!(chunks[0].text.ends_with(&"x".repeat(100)));
    }

    #[tokio::test]
    async fn skipped_when_no_budget_left() {
        let mut chunks = vec![code(0, &"x".repeat(250))];
        let provider = MockProvider::default();
        let report = enhancer(provider.clone()).enhance(&mut chunks, 64).await;
        assert_eq!(provider.call_count(), 0);
        assert!(!chunks[0].llm_processed);
        assert!(matches!(report.outcomes[0].outcome, EnhancementOutcome::Skipped { .. }));
        assert!(report.costs.is_empty());
    }

    #[tokio::test]
    async fn costs_follow_pricing() {
        let mut chunks = vec![code(0, "a()"), code(1, "b()")];
        let provider = MockProvider::default().with_usage(1000, 500);
        let report = enhancer(provider).enhance(&mut chunks, 1024).await;
        let total = report.total_cost();
        assert_eq!(total.input_tokens, 2000);
        assert!((total.total_cost - (2.0 * (0.00015 + 0.0003))).abs() < 1e-12);
    }

    #[test]
    fn prompts_are_type_specific() {
        let img = chunk(
            0,
            ChunkContent::Image {
                filename: "arch.png".into(),
                caption: "Figure 1: Architecture".into(),
            },
            "Figure 1: Architecture",
        );
        let prompt = build_prompt(&img, 100).unwrap();
        assert!(prompt.contains("Filename: arch.png"));
        assert!(prompt.contains("Caption: Figure 1: Architecture"));
        assert!(!prompt.contains("Alt text"));

        let table = chunk(
            1,
            ChunkContent::Table {
                caption: String::new(),
            },
            &"a | b\n".repeat(50),
        );
        let prompt = build_prompt(&table, 20).unwrap();
        assert!(prompt.contains("table"));
        assert!(prompt.ends_with(TRUNCATION_MARKER));
        assert!(!prompt.contains("Caption:"));

        assert!(build_prompt(&chunk(2, ChunkContent::Section, "x"), 100).is_none());
    }
}
