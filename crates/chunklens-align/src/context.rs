use std::collections::HashMap;

use chunklens_document::{BlockKind, Chunk, ChunkKind, block_source_text, leaf_blocks};
use scraper::ElementRef;
use serde::{Deserialize, Serialize};

use crate::normalize::{floor_boundary, normalize, prefix_chars, suffix_chars};

/// Characters of the chunk start tried first, then the shorter fallback.
const START_ANCHORS: [usize; 2] = [200, 50];
const END_ANCHOR: usize = 200;

/// A leaf element's byte span in the normalized full text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementSpan {
    /// Position of the element among all elements under the viewer root, document order.
    pub ordinal: usize,
    pub start: usize,
    pub end: usize,
}

impl ElementSpan {
    #[must_use]
    pub fn overlaps(&self, start: usize, end: usize) -> bool {
        self.start < end && start < self.end
    }
}

/// Where a chunk landed. Unmatched chunks are `found: false` with an empty span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkPosition {
    pub index: usize,
    pub start: usize,
    pub end: usize,
    pub found: bool,
    /// Element highlighted for image chunks instead of a text span.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<usize>,
}

impl ChunkPosition {
    fn missing(index: usize) -> Self {
        Self {
            index,
            start: 0,
            end: 0,
            found: false,
            target: None,
        }
    }
}

/// Alignment of one chunk list against one viewer's document. Rebuilt per viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlignmentContext {
    pub viewer_id: String,
    pub full_text: String,
    pub elements: Vec<ElementSpan>,
    pub positions: Vec<ChunkPosition>,
}

impl AlignmentContext {
    /// Flatten the leaf blocks under `root` and align `chunks` against them in order.
    #[must_use]
    pub fn build(viewer_id: impl Into<String>, root: ElementRef<'_>, chunks: &[Chunk]) -> Self {
        let ordinals: HashMap<_, usize> = root
            .descendants()
            .filter_map(ElementRef::wrap)
            .enumerate()
            .map(|(i, e)| (e.id(), i))
            .collect();

        let mut full_text = String::new();
        let mut elements = Vec::new();
        let mut figures = Vec::new();
        for block in leaf_blocks(root) {
            let Some(&ordinal) = ordinals.get(&block.element.id()) else {
                continue;
            };
            if block.kind == BlockKind::Image {
                figures.push(block.element);
            }
            let text = normalize(&block_source_text(block));
            if !text.is_empty() && !full_text.is_empty() {
                full_text.push(' ');
            }
            let start = full_text.len();
            full_text.push_str(&text);
            elements.push(ElementSpan {
                ordinal,
                start,
                end: full_text.len(),
            });
        }

        let images: Vec<(String, usize)> = root
            .descendants()
            .filter_map(ElementRef::wrap)
            .filter(|e| e.value().name() == "img")
            .filter_map(|img| {
                let src = img.value().attr("src")?.to_owned();
                let target = image_target(img, &figures);
                ordinals.get(&target.id()).map(|&o| (src, o))
            })
            .collect();

        let mut cursor = 0;
        let mut used_images = Vec::new();
        let mut positions = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let position = if chunk.kind() == ChunkKind::Image {
                locate_image(chunk, &images, &mut used_images, &elements, cursor)
            } else {
                let needle = normalize(chunk.source_text());
                match locate_text(&full_text, &needle, cursor) {
                    Some((start, end)) => {
                        cursor = end;
                        ChunkPosition {
                            index: chunk.index,
                            start,
                            end,
                            found: true,
                            target: None,
                        }
                    }
                    None => ChunkPosition::missing(chunk.index),
                }
            };
            if !position.found {
                tracing::debug!(index = chunk.index, kind = %chunk.kind(), "chunk not aligned");
            }
            positions.push(position);
        }

        let context = Self {
            viewer_id: viewer_id.into(),
            full_text,
            elements,
            positions,
        };
        tracing::debug!(
            viewer = %context.viewer_id,
            elements = context.elements.len(),
            found = context.found_count(),
            chunks = chunks.len(),
            "alignment built"
        );
        context
    }

    #[must_use]
    pub fn position(&self, chunk_index: usize) -> Option<&ChunkPosition> {
        self.positions.iter().find(|p| p.index == chunk_index)
    }

    #[must_use]
    pub fn found_count(&self) -> usize {
        self.positions.iter().filter(|p| p.found).count()
    }

    /// Element ordinals to highlight for a chunk; empty when it was not found.
    #[must_use]
    pub fn targets(&self, chunk_index: usize) -> Vec<usize> {
        let Some(position) = self.position(chunk_index).filter(|p| p.found) else {
            return Vec::new();
        };
        if let Some(target) = position.target {
            return vec![target];
        }
        self.elements
            .iter()
            .filter(|e| e.overlaps(position.start, position.end))
            .map(|e| e.ordinal)
            .collect()
    }

    /// Normalized document text covered by a found chunk.
    #[must_use]
    pub fn span_text(&self, chunk_index: usize) -> Option<&str> {
        let p = self.position(chunk_index).filter(|p| p.found && p.target.is_none())?;
        self.full_text.get(p.start..p.end)
    }
}

/// Search for `needle` at or after `cursor`: start anchor of 200 then 50 characters,
/// end anchor of the last 200 characters (tried first where the whole needle would
/// end), else `start + needle.len()`.
fn locate_text(full_text: &str, needle: &str, cursor: usize) -> Option<(usize, usize)> {
    if needle.is_empty() || cursor > full_text.len() {
        return None;
    }
    let haystack = &full_text[cursor..];
    let start = START_ANCHORS
        .iter()
        .find_map(|&n| haystack.find(prefix_chars(needle, n)))
        .map(|i| cursor + i)?;

    let tail = suffix_chars(needle, END_ANCHOR);
    let expected = start + needle.len();
    // A tail that repeats inside the chunk must not end the span early.
    if full_text.get(start..expected).is_some_and(|span| span.ends_with(tail)) {
        return Some((start, expected));
    }
    let end = full_text[start..]
        .find(tail)
        .map_or_else(|| floor_boundary(full_text, expected), |i| start + i + tail.len());
    Some((start, end))
}

/// The `figure` leaf enclosing an image, else the image element itself.
fn image_target<'a>(img: ElementRef<'a>, figures: &[ElementRef<'a>]) -> ElementRef<'a> {
    img.ancestors()
        .filter_map(ElementRef::wrap)
        .find(|a| a.value().name() == "figure" || figures.contains(a))
        .or_else(|| figures.contains(&img).then_some(img))
        .unwrap_or(img)
}

/// First unused image at or after the text cursor, then any unused one, then a reuse.
fn locate_image(
    chunk: &Chunk,
    images: &[(String, usize)],
    used: &mut Vec<usize>,
    elements: &[ElementSpan],
    cursor: usize,
) -> ChunkPosition {
    let Some(filename) = chunk.filename().filter(|f| !f.is_empty()) else {
        return ChunkPosition::missing(chunk.index);
    };
    let span = |target: usize| elements.iter().find(|e| e.ordinal == target);
    let candidates: Vec<usize> = images
        .iter()
        .filter(|(src, _)| src.contains(filename))
        .map(|&(_, target)| target)
        .collect();
    let unused: Vec<usize> = candidates.iter().copied().filter(|t| !used.contains(t)).collect();
    let Some(target) = unused
        .iter()
        .copied()
        .find(|&t| span(t).is_some_and(|e| e.start >= cursor))
        .or_else(|| unused.first().copied())
        .or_else(|| candidates.first().copied())
    else {
        return ChunkPosition::missing(chunk.index);
    };
    used.push(target);
    let (start, end) = span(target).map_or((0, 0), |e| (e.start, e.end));
    ChunkPosition {
        index: chunk.index,
        start,
        end,
        found: true,
        target: Some(target),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use chunklens_document::{ChunkContent, ChunkPipeline, ChunkerId};
    use scraper::Html;

    use super::*;

    fn text_chunk(index: usize, text: &str) -> Chunk {
        Chunk {
            index,
            total: 0,
            content: ChunkContent::Paragraph,
            text: text.into(),
            original_text: None,
            token_count: 0,
            chunker_id: ChunkerId::ReadContentPara,
            created_at: Utc::now(),
            llm_processed: false,
        }
    }

    fn image_chunk(index: usize, filename: &str) -> Chunk {
        Chunk {
            content: ChunkContent::Image {
                filename: filename.into(),
                caption: String::new(),
            },
            ..text_chunk(index, filename)
        }
    }

    fn align(html: &str, chunks: &[Chunk]) -> AlignmentContext {
        let doc = Html::parse_fragment(html);
        AlignmentContext::build("viewer-1", doc.root_element(), chunks)
    }

    #[test]
    fn full_text_is_normalized_leaf_text() {
        let ctx = align("<div><p>One  “two”</p><p>Three — four</p></div>", &[]);
        assert_eq!(ctx.full_text, "One \"two\" Three - four");
        assert_eq!(ctx.elements.len(), 2);
        assert_eq!(&ctx.full_text[ctx.elements[1].start..ctx.elements[1].end], "Three - four");
    }

    #[test]
    fn finds_chunks_in_order() {
        let ctx = align(
            "<p>Alpha beta.</p><p>Gamma delta.</p><p>Alpha beta.</p>",
            &[text_chunk(0, "Alpha beta."), text_chunk(1, "Alpha   beta.")],
        );
        let p0 = ctx.positions[0];
        let p1 = ctx.positions[1];
        assert!(p0.found && p1.found);
        assert!(p1.start >= p0.end);
        assert_eq!(ctx.targets(1), vec![ctx.elements[2].ordinal]);
    }

    #[test]
    fn miss_does_not_move_cursor_or_stop_later_chunks() {
        let ctx = align(
            "<p>First paragraph.</p><p>Second paragraph.</p>",
            &[
                text_chunk(0, "Nowhere in the document."),
                text_chunk(1, "First paragraph."),
                text_chunk(2, "Second paragraph."),
            ],
        );
        assert!(!ctx.positions[0].found);
        assert!(ctx.positions[1].found && ctx.positions[2].found);
        assert!(ctx.targets(0).is_empty());
    }

    #[test]
    fn merged_chunk_spans_several_elements() {
        let ctx = align(
            "<h2>Intro</h2><p>P1 text.</p><p>P2 text.</p>",
            &[text_chunk(0, "Intro\n\nP1 text.\n\nP2 text.")],
        );
        assert_eq!(ctx.targets(0).len(), 3);
        assert_eq!(ctx.span_text(0), Some("Intro P1 text. P2 text."));
    }

    #[test]
    fn long_chunk_uses_start_and_end_anchors() {
        let body = "word ".repeat(120);
        let html = format!("<p>{body}</p><p>tail marker here.</p>");
        let chunk_text = format!("{body} tail marker here.");
        let ctx = align(&html, &[text_chunk(0, &chunk_text)]);
        let p = ctx.positions[0];
        assert!(p.found);
        assert_eq!(&ctx.full_text[p.start..p.end], normalize(&chunk_text));
    }

    #[test]
    fn fallback_end_when_tail_differs() {
        let body = "lorem ipsum ".repeat(30);
        let html = format!("<p>{body} ending A.</p>");
        let chunk = format!("{body} ending B, which is not in the document at all.");
        let ctx = align(&html, &[text_chunk(0, &chunk)]);
        let p = ctx.positions[0];
        assert!(p.found);
        assert!(p.end <= ctx.full_text.len());
        assert!(ctx.full_text.is_char_boundary(p.end));
    }

    #[test]
    fn enhanced_chunk_aligns_on_original_text() {
        let mut chunk = text_chunk(0, "A description.\n\nlet x = 1;");
        chunk.content = ChunkContent::Code {
            caption: String::new(),
        };
        chunk.original_text = Some("let x = 1;".into());
        let ctx = align("<pre>let x = 1;</pre>", &[chunk]);
        assert!(ctx.positions[0].found);
    }

    #[test]
    fn image_targets_enclosing_figure_without_moving_cursor() {
        let ctx = align(
            "<p>Before.</p><figure><img src=\"https://cdn/x/a.png\"><figcaption>Figure 1: A</figcaption></figure><p>After.</p>",
            &[
                text_chunk(0, "Before."),
                image_chunk(1, "a.png"),
                text_chunk(2, "After."),
                image_chunk(3, "missing.png"),
            ],
        );
        let image = ctx.positions[1];
        assert!(image.found);
        let figure_ordinal = ctx.elements[1].ordinal;
        assert_eq!(image.target, Some(figure_ordinal));
        assert_eq!(ctx.targets(1), vec![figure_ordinal]);
        assert!(ctx.positions[2].found);
        assert!(!ctx.positions[3].found);
    }

    #[test]
    fn round_trip_on_chunked_article() {
        let html = "<article><h1>Title</h1><p>First “quoted” paragraph — with dash.</p>\
                    <p>Listing 1: Hello</p><pre>fn main() {\n    println!(\"hi\");\n}</pre>\
                    <table><tr><td>a</td><td>b</td></tr></table><p>Last words.</p></article>";
        for chunker in [ChunkerId::ReadContentPara, ChunkerId::Default1024T] {
            let chunks = ChunkPipeline::default().chunk_html(html, chunker, Utc::now());
            let ctx = align(html, &chunks);
            for chunk in &chunks {
                let p = ctx.position(chunk.index).unwrap();
                assert!(p.found, "{chunker}: chunk {} not found", chunk.index);
                assert_eq!(ctx.span_text(chunk.index), Some(normalize(&chunk.text).as_str()));
            }
        }
    }

    #[test]
    fn repeated_tail_inside_chunk_keeps_full_span() {
        let code = format!("Start here. {}", "| a | b |\n".repeat(40));
        let mut chunk = text_chunk(0, code.trim_end());
        chunk.content = ChunkContent::Code {
            caption: String::new(),
        };
        let ctx = align(
            &format!("<pre>{code}</pre><p>After the rows.</p>"),
            &[chunk, text_chunk(1, "After the rows.")],
        );
        assert_eq!(ctx.span_text(0), Some(normalize(&code).as_str()));
        assert!(ctx.positions[1].found);
        assert!(ctx.positions[1].start >= ctx.positions[0].end);
    }

    #[test]
    fn duplicated_image_resolves_after_cursor() {
        let ctx = align(
            "<figure><img src=\"a.png\"></figure><p>Between.</p><figure><img src=\"x/a.png\"></figure>",
            &[text_chunk(0, "Between."), image_chunk(1, "a.png")],
        );
        let text = ctx.positions[0];
        let image = ctx.positions[1];
        assert!(image.found);
        assert_eq!(image.target, Some(ctx.elements[2].ordinal));
        assert!(image.start >= text.end);
    }
}
