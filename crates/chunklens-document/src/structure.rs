use scraper::{ElementRef, Html, Node};

use crate::caption::{CaptionResolver, CaptionSource};
use crate::section::Section;

const SKIP_TAGS: &[&str] = &[
    "script", "style", "noscript", "template", "head", "svg", "button", "form",
];

/// Elements that make their ancestor a container rather than a leaf.
const BLOCK_TAGS: &[&str] = &[
    "p", "h1", "h2", "h3", "h4", "h5", "h6", "li", "blockquote", "pre", "listing", "table",
    "figure", "div", "section", "article", "main", "header", "footer", "aside", "nav", "ul",
    "ol", "dl", "dt", "dd",
];

const CODE_CLASS_HINTS: &[&str] = &["code", "listing", "highlight", "sourcecode"];

/// Classification of a leaf block in document order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Heading(u8),
    Text,
    Image,
    Table,
    Code,
}

impl BlockKind {
    #[must_use]
    pub fn is_special(self) -> bool {
        matches!(self, Self::Image | Self::Table | Self::Code)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Block<'a> {
    pub element: ElementRef<'a>,
    pub kind: BlockKind,
}

enum Class {
    Skip,
    Container,
    Leaf(BlockKind),
}

fn has_descendant(element: ElementRef<'_>, pred: impl Fn(&str) -> bool) -> bool {
    element
        .descendants()
        .skip(1)
        .filter_map(ElementRef::wrap)
        .any(|d| pred(d.value().name()))
}

fn class_hints(element: ElementRef<'_>, hints: &[&str]) -> bool {
    element.value().classes().any(|c| {
        let c = c.to_ascii_lowercase();
        hints.iter().any(|h| c.contains(h))
    })
}

fn heading_level(name: &str) -> Option<u8> {
    match name {
        "h1" => Some(1),
        "h2" => Some(2),
        "h3" => Some(3),
        "h4" => Some(4),
        "h5" => Some(5),
        "h6" => Some(6),
        _ => None,
    }
}

fn is_code(element: ElementRef<'_>, name: &str) -> bool {
    match name {
        "pre" | "listing" => true,
        "figure" | "div" => {
            has_descendant(element, |n| n == "pre")
                && (class_hints(element, CODE_CLASS_HINTS)
                    || (name == "figure" && !has_descendant(element, |n| n == "img")))
        }
        _ => false,
    }
}

fn is_table(element: ElementRef<'_>, name: &str) -> bool {
    match name {
        "table" => true,
        "figure" | "div" => {
            has_descendant(element, |n| n == "table")
                && (name == "figure" || class_hints(element, &["table"]))
        }
        _ => false,
    }
}

fn classify(element: ElementRef<'_>) -> Class {
    let name = element.value().name();
    if SKIP_TAGS.contains(&name) {
        return Class::Skip;
    }
    if is_code(element, name) {
        return Class::Leaf(BlockKind::Code);
    }
    if is_table(element, name) {
        return Class::Leaf(BlockKind::Table);
    }
    if name == "img" || (matches!(name, "figure" | "picture") && has_descendant(element, |n| n == "img")) {
        return Class::Leaf(BlockKind::Image);
    }
    if has_descendant(element, |n| BLOCK_TAGS.contains(&n)) {
        return Class::Container;
    }
    if block_text(element).is_empty() {
        return if has_descendant(element, |n| n == "img") {
            Class::Leaf(BlockKind::Image)
        } else {
            Class::Skip
        };
    }
    match heading_level(name) {
        Some(level) => Class::Leaf(BlockKind::Heading(level)),
        None => Class::Leaf(BlockKind::Text),
    }
}

/// Whether `element` is an image, table or code block in its own right.
pub(crate) fn is_special_block(element: ElementRef<'_>) -> bool {
    matches!(classify(element), Class::Leaf(kind) if kind.is_special())
}

/// Leaf blocks under `root` in depth-first order. Containers holding block-level
/// children are never returned themselves, only their leaves.
#[must_use]
pub fn leaf_blocks(root: ElementRef<'_>) -> Vec<Block<'_>> {
    let mut out = Vec::new();
    collect(root, &mut out);
    out
}

fn collect<'a>(element: ElementRef<'a>, out: &mut Vec<Block<'a>>) {
    for child in element.children().filter_map(ElementRef::wrap) {
        match classify(child) {
            Class::Skip => {}
            Class::Container => collect(child, out),
            Class::Leaf(kind) => out.push(Block {
                element: child,
                kind,
            }),
        }
    }
}

/// Visible text of an element with whitespace collapsed.
#[must_use]
pub fn block_text(element: ElementRef<'_>) -> String {
    let mut raw = String::new();
    push_visible_text(element, &mut raw);
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn push_visible_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) => {
                if SKIP_TAGS.contains(&el.name()) {
                    continue;
                }
                if el.name() == "br" {
                    out.push(' ');
                }
                if let Some(child) = ElementRef::wrap(child) {
                    push_visible_text(child, out);
                }
            }
            _ => {}
        }
    }
}

fn find_self_or_descendant<'a>(element: ElementRef<'a>, name: &str) -> Option<ElementRef<'a>> {
    element
        .descendants()
        .filter_map(ElementRef::wrap)
        .find(|d| d.value().name() == name)
}

/// Raw preformatted text, whitespace preserved.
fn code_text(element: ElementRef<'_>) -> String {
    let source = find_self_or_descendant(element, "pre").unwrap_or(element);
    source.text().collect::<String>().trim_matches('\n').to_owned()
}

fn code_language(element: ElementRef<'_>) -> Option<String> {
    element
        .descendants()
        .filter_map(ElementRef::wrap)
        .flat_map(|e| e.value().classes().collect::<Vec<_>>())
        .find_map(|c| {
            c.strip_prefix("language-")
                .or_else(|| c.strip_prefix("lang-"))
                .map(str::to_owned)
        })
}

/// Rows joined by newlines, cells by ` | `. Caption elements are excluded.
fn table_text(element: ElementRef<'_>) -> String {
    let rows: Vec<String> = element
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|e| e.value().name() == "tr")
        .map(|row| {
            row.children()
                .filter_map(ElementRef::wrap)
                .filter(|c| matches!(c.value().name(), "td" | "th"))
                .map(block_text)
                .collect::<Vec<_>>()
                .join(" | ")
        })
        .filter(|r| !r.trim_matches(['|', ' ']).is_empty())
        .collect();
    if rows.is_empty() {
        block_text(element)
    } else {
        rows.join("\n")
    }
}

/// Text a strategy would see for this block: tables as rows, code verbatim, the rest
/// whitespace-collapsed.
#[must_use]
pub fn block_source_text(block: Block<'_>) -> String {
    match block.kind {
        BlockKind::Code => code_text(block.element),
        BlockKind::Table => table_text(block.element),
        BlockKind::Heading(_) | BlockKind::Text | BlockKind::Image => block_text(block.element),
    }
}

/// Final path segment of a resource reference, without query or fragment.
#[must_use]
pub fn basename(src: &str) -> &str {
    let end = src.find(['?', '#']).unwrap_or(src.len());
    let path = src[..end].trim_end_matches('/');
    path.rsplit('/').next().unwrap_or(path)
}

/// Walks a document tree and emits an ordered list of sections.
#[derive(Debug, Clone, Default)]
pub struct StructureExtractor {
    captions: CaptionResolver,
}

impl StructureExtractor {
    #[must_use]
    pub fn new(captions: CaptionResolver) -> Self {
        Self { captions }
    }

    #[must_use]
    pub fn captions(&self) -> &CaptionResolver {
        &self.captions
    }

    /// Parse an HTML fragment and extract its sections.
    #[must_use]
    pub fn extract_html(&self, html: &str) -> Vec<Section> {
        let document = Html::parse_fragment(html);
        self.extract(document.root_element())
    }

    /// Extract sections from the subtree under `root`.
    ///
    /// Sibling paragraphs that were consumed as the caption of an adjacent special
    /// element are not emitted as text.
    #[must_use]
    pub fn extract(&self, root: ElementRef<'_>) -> Vec<Section> {
        let blocks = leaf_blocks(root);

        let mut captions = Vec::with_capacity(blocks.len());
        let mut consumed: Vec<ElementRef<'_>> = Vec::new();
        for block in &blocks {
            if !block.kind.is_special() {
                captions.push(String::new());
                continue;
            }
            match self.captions.resolve_with_source(block.element) {
                Some(resolved) => {
                    if let Some(element) = resolved.element.filter(|_| {
                        matches!(
                            resolved.source,
                            CaptionSource::PreviousSibling | CaptionSource::NextSibling
                        )
                    }) {
                        consumed.push(element);
                    }
                    captions.push(resolved.text);
                }
                None => captions.push(String::new()),
            }
        }

        let mut sections = Vec::new();
        let mut pending: Vec<(String, u8)> = Vec::new();

        for (block, caption) in blocks.iter().zip(captions) {
            if consumed.contains(&block.element) {
                continue;
            }
            match block.kind {
                BlockKind::Heading(level) => {
                    pending.push((block_text(block.element), level));
                }
                BlockKind::Text => {
                    let heading = (!pending.is_empty()).then(|| join_headings(&pending));
                    pending.clear();
                    sections.push(Section::Paragraph {
                        heading,
                        text: block_text(block.element),
                    });
                }
                BlockKind::Image | BlockKind::Table | BlockKind::Code => {
                    flush_headings(&mut pending, &mut sections);
                    sections.push(special_section(*block, caption));
                }
            }
        }
        flush_headings(&mut pending, &mut sections);

        tracing::debug!(blocks = blocks.len(), sections = sections.len(), "extracted sections");
        sections
    }
}

fn join_headings(pending: &[(String, u8)]) -> String {
    pending
        .iter()
        .map(|(t, _)| t.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

fn flush_headings(pending: &mut Vec<(String, u8)>, sections: &mut Vec<Section>) {
    if pending.is_empty() {
        return;
    }
    let level = pending.iter().map(|(_, l)| *l).min().unwrap_or(1);
    sections.push(Section::Heading {
        text: join_headings(pending),
        level,
    });
    pending.clear();
}

fn special_section(block: Block<'_>, caption: String) -> Section {
    let element = block.element;
    match block.kind {
        BlockKind::Code => Section::Code {
            text: code_text(element),
            caption,
            language: code_language(element),
        },
        BlockKind::Table => Section::Table {
            text: table_text(element),
            caption,
        },
        _ => {
            let img = find_self_or_descendant(element, "img");
            let attr = |name: &str| {
                img.and_then(|i| i.value().attr(name))
                    .map(str::trim)
                    .unwrap_or_default()
                    .to_owned()
            };
            Section::Image {
                filename: basename(&attr("src")).to_owned(),
                alt: attr("alt"),
                caption,
            }
        }
    }
}
