use super::{Draft, special_drafts};
use crate::chunk::ChunkContent;
use crate::section::Section;
use crate::split::split_prose;
use crate::tokens::estimate_tokens;

const JOINER: &str = "\n\n";

struct Buffer {
    text: String,
    drafts: Vec<Draft>,
}

impl Buffer {
    fn flush(&mut self) {
        if self.text.is_empty() {
            return;
        }
        self.drafts.push(Draft {
            content: ChunkContent::Section,
            text: std::mem::take(&mut self.text),
        });
    }
}

/// Accumulate text sections until the next one would pass `target_tokens`.
///
/// A single section above `max_tokens` is split on its own and never merged.
pub(super) fn drafts(sections: &[Section], target_tokens: usize, max_tokens: usize) -> Vec<Draft> {
    let mut buffer = Buffer {
        text: String::new(),
        drafts: Vec::new(),
    };

    for section in sections {
        let Some(body) = section.body() else {
            buffer.flush();
            buffer.drafts.extend(special_drafts(section, max_tokens));
            continue;
        };
        let body = body.trim();
        if body.is_empty() {
            continue;
        }

        if estimate_tokens(body) > max_tokens {
            buffer.flush();
            buffer
                .drafts
                .extend(split_prose(body, max_tokens).into_iter().map(|text| Draft {
                    content: ChunkContent::Section,
                    text,
                }));
            continue;
        }

        if buffer.text.is_empty() {
            buffer.text.push_str(body);
            continue;
        }
        let merged_tokens = estimate_tokens(&buffer.text) + estimate_tokens(JOINER) + estimate_tokens(body);
        if merged_tokens > target_tokens {
            buffer.flush();
            buffer.text.push_str(body);
        } else {
            buffer.text.push_str(JOINER);
            buffer.text.push_str(body);
        }
    }
    buffer.flush();
    buffer.drafts
}
