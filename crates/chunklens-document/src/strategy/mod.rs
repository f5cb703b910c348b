//! Section-to-chunk strategies.
//!
//! Both strategies share the special-element handling in [`special_drafts`]: images,
//! tables and code never merge with text and keep their place in the output order.

mod fixed;
mod paragraph;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::chunk::{Chunk, ChunkContent, ChunkerId};
use crate::section::Section;
use crate::split::{split_lines, split_prose};
use crate::tokens::estimate_tokens;

/// Token budgets for each strategy family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub default_max_tokens: usize,
    pub short_target_tokens: usize,
    pub short_max_tokens: usize,
    pub para_max_tokens: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            default_max_tokens: 1024,
            short_target_tokens: 512,
            short_max_tokens: 1024,
            para_max_tokens: 1024,
        }
    }
}

impl ChunkingConfig {
    /// Strategy for a chunker id. Enhanced variants map to their base strategy.
    #[must_use]
    pub fn strategy_for(&self, chunker: ChunkerId) -> Strategy {
        match chunker.base() {
            ChunkerId::ReadContentPara | ChunkerId::ReadContentParaLlm => Strategy::Paragraph {
                max_tokens: self.para_max_tokens.max(1),
            },
            ChunkerId::ReadContentShort | ChunkerId::ReadContentShortLlm => {
                let max_tokens = self.short_max_tokens.max(1);
                Strategy::FixedBudget {
                    target_tokens: self.short_target_tokens.clamp(1, max_tokens),
                    max_tokens,
                }
            }
            ChunkerId::Default1024T => {
                let max_tokens = self.default_max_tokens.max(1);
                Strategy::FixedBudget {
                    target_tokens: max_tokens,
                    max_tokens,
                }
            }
        }
    }
}

/// A chunking algorithm with its budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Accumulate text up to `target_tokens`; never exceed `max_tokens`.
    FixedBudget {
        target_tokens: usize,
        max_tokens: usize,
    },
    /// One chunk per paragraph-level element.
    Paragraph { max_tokens: usize },
}

/// Chunk body before indices and token counts are assigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Draft {
    pub content: ChunkContent,
    pub text: String,
}

impl Strategy {
    #[must_use]
    pub fn max_tokens(&self) -> usize {
        match *self {
            Self::FixedBudget { max_tokens, .. } | Self::Paragraph { max_tokens } => max_tokens,
        }
    }

    /// Turn sections into chunks. An empty section list yields no chunks.
    #[must_use]
    pub fn chunk(
        &self,
        sections: &[Section],
        chunker_id: ChunkerId,
        created_at: DateTime<Utc>,
    ) -> Vec<Chunk> {
        let drafts = match *self {
            Self::FixedBudget {
                target_tokens,
                max_tokens,
            } => fixed::drafts(sections, target_tokens, max_tokens),
            Self::Paragraph { max_tokens } => paragraph::drafts(sections, max_tokens),
        };
        finalize(drafts, chunker_id, created_at)
    }
}

fn finalize(drafts: Vec<Draft>, chunker_id: ChunkerId, created_at: DateTime<Utc>) -> Vec<Chunk> {
    let total = drafts.len();
    drafts
        .into_iter()
        .enumerate()
        .map(|(index, draft)| Chunk {
            index,
            total,
            token_count: estimate_tokens(&draft.text),
            content: draft.content,
            text: draft.text,
            original_text: None,
            chunker_id,
            created_at,
            llm_processed: false,
        })
        .collect()
}

/// Drafts for an image, table or code section, split to the budget when oversized.
pub(crate) fn special_drafts(section: &Section, max_tokens: usize) -> Vec<Draft> {
    match section {
        Section::Image {
            filename,
            alt,
            caption,
        } => {
            let text = [caption, alt, filename]
                .into_iter()
                .find(|t| !t.trim().is_empty())
                .map(|t| t.trim().to_owned());
            let Some(text) = text else {
                return Vec::new();
            };
            split_prose(&text, max_tokens)
                .into_iter()
                .map(|text| Draft {
                    content: ChunkContent::Image {
                        filename: filename.clone(),
                        caption: caption.clone(),
                    },
                    text,
                })
                .collect()
        }
        Section::Table { text, caption } => split_lines(text, max_tokens)
            .into_iter()
            .map(|text| Draft {
                content: ChunkContent::Table {
                    caption: caption.clone(),
                },
                text,
            })
            .collect(),
        Section::Code { text, caption, .. } => split_lines(text, max_tokens)
            .into_iter()
            .map(|text| Draft {
                content: ChunkContent::Code {
                    caption: caption.clone(),
                },
                text,
            })
            .collect(),
        Section::Heading { .. } | Section::Paragraph { .. } => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use proptest::arbitrary::any;
    use proptest::strategy::Strategy as _;
    use proptest::{prop_assert, prop_assert_eq, prop_oneof, proptest};

    use super::*;
    use crate::chunk::ChunkKind;

    fn sections_strategy() -> impl proptest::strategy::Strategy<Value = Vec<Section>> {
        let section = prop_oneof![
            "[A-Za-z ,.]{0,400}".prop_map(Section::paragraph),
            ("[A-Za-z ]{1,30}", "[A-Za-z ,.]{0,300}").prop_map(|(h, t)| Section::Paragraph {
                heading: Some(h),
                text: t
            }),
            "[A-Za-z ]{1,40}".prop_map(|t| Section::Heading { text: t, level: 2 }),
            "[a-z]{1,10}\\.png".prop_map(Section::image),
            "[a-z(){};\n ]{1,500}".prop_map(|t| Section::Code {
                text: t,
                caption: String::new(),
                language: None
            }),
            "[a-z|\n ]{1,300}".prop_map(|t| Section::Table {
                text: t,
                caption: "Table 1: T".into()
            }),
        ];
        proptest::collection::vec(section, 0..20)
    }

    #[test]
    fn config_maps_chunker_ids() {
        let config = ChunkingConfig::default();
        assert_eq!(
            config.strategy_for(ChunkerId::Default1024T),
            Strategy::FixedBudget {
                target_tokens: 1024,
                max_tokens: 1024
            }
        );
        assert_eq!(
            config.strategy_for(ChunkerId::ReadContentShortLlm),
            Strategy::FixedBudget {
                target_tokens: 512,
                max_tokens: 1024
            }
        );
        assert_eq!(
            config.strategy_for(ChunkerId::ReadContentPara),
            Strategy::Paragraph { max_tokens: 1024 }
        );
    }

    #[test]
    fn target_clamped_to_max() {
        let config = ChunkingConfig {
            short_target_tokens: 4000,
            short_max_tokens: 100,
            ..ChunkingConfig::default()
        };
        assert_eq!(
            config.strategy_for(ChunkerId::ReadContentShort),
            Strategy::FixedBudget {
                target_tokens: 100,
                max_tokens: 100
            }
        );
    }

    #[test]
    fn image_text_prefers_caption_then_alt_then_filename() {
        let with_caption = Section::Image {
            filename: "a.png".into(),
            alt: "alt".into(),
            caption: "Figure 1: Cap".into(),
        };
        assert_eq!(special_drafts(&with_caption, 100)[0].text, "Figure 1: Cap");
        let with_alt = Section::Image {
            filename: "a.png".into(),
            alt: "alt".into(),
            caption: String::new(),
        };
        assert_eq!(special_drafts(&with_alt, 100)[0].text, "alt");
        assert_eq!(special_drafts(&Section::image("a.png"), 100)[0].text, "a.png");
        assert!(special_drafts(&Section::image(""), 100).is_empty());
    }

    #[test]
    fn oversized_code_keeps_caption_on_each_piece() {
        let code = (0..60).map(|i| format!("let v{i} = {i};")).collect::<Vec<_>>().join("\n");
        let section = Section::Code {
            text: code,
            caption: "Listing 1: Vars".into(),
            language: None,
        };
        let drafts = special_drafts(&section, 32);
        assert!(drafts.len() > 1);
        for d in &drafts {
            assert_eq!(d.content.caption(), "Listing 1: Vars");
            assert!(estimate_tokens(&d.text) <= 32);
        }
    }

    proptest! {
        #[test]
        fn chunk_invariants_hold(sections in sections_strategy(), max in 8usize..200, by_para in any::<bool>()) {
            let strategy = if by_para {
                Strategy::Paragraph { max_tokens: max }
            } else {
                Strategy::FixedBudget { target_tokens: max / 2 + 1, max_tokens: max }
            };
            let chunks = strategy.chunk(&sections, ChunkerId::ReadContentShort, Utc::now());
            let n = chunks.len();
            for (i, c) in chunks.iter().enumerate() {
                prop_assert_eq!(c.index, i);
                prop_assert_eq!(c.total, n);
                prop_assert!(c.token_count <= max);
                prop_assert_eq!(c.token_count, estimate_tokens(&c.text));
                prop_assert!(!c.text.trim().is_empty());
            }
        }

        #[test]
        fn specials_keep_relative_order(sections in sections_strategy()) {
            let chunks = Strategy::FixedBudget { target_tokens: 512, max_tokens: 1024 }
                .chunk(&sections, ChunkerId::Default1024T, Utc::now());
            let expected: Vec<ChunkKind> = sections
                .iter()
                .flat_map(|s| special_drafts(s, 1024))
                .map(|d| d.content.kind())
                .collect();
            let actual: Vec<ChunkKind> = chunks
                .iter()
                .map(Chunk::kind)
                .filter(|k| k.is_special())
                .collect();
            prop_assert_eq!(actual, expected);
        }
    }
}
