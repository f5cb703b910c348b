use std::collections::BTreeSet;

use chunklens_document::Chunk;
use scraper::{ElementRef, Html, Node};

use crate::context::AlignmentContext;

pub const HIGHLIGHT_CLASS: &str = "chunk-highlight";

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

/// A rendered document under review, with its own highlight state.
pub struct Viewer {
    id: String,
    document: Html,
    highlighted: BTreeSet<usize>,
}

impl std::fmt::Debug for Viewer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Viewer")
            .field("id", &self.id)
            .field("highlighted", &self.highlighted)
            .finish_non_exhaustive()
    }
}

impl Viewer {
    #[must_use]
    pub fn new(id: impl Into<String>, html: &str) -> Self {
        Self {
            id: id.into(),
            document: Html::parse_fragment(html),
            highlighted: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    fn root(&self) -> ElementRef<'_> {
        self.document.root_element()
    }

    /// Build a fresh alignment of `chunks` against this viewer's document.
    #[must_use]
    pub fn align(&self, chunks: &[Chunk]) -> AlignmentContext {
        AlignmentContext::build(self.id.clone(), self.root(), chunks)
    }

    /// Clear all highlights, then highlight every element the chunk maps to.
    ///
    /// A context built for another viewer, or an unmatched chunk, leaves nothing highlighted.
    pub fn highlight(&mut self, context: &AlignmentContext, chunk_index: usize) -> &BTreeSet<usize> {
        self.highlighted.clear();
        if context.viewer_id == self.id {
            self.highlighted.extend(context.targets(chunk_index));
        } else {
            tracing::warn!(
                viewer = %self.id,
                context = %context.viewer_id,
                "alignment context belongs to another viewer"
            );
        }
        &self.highlighted
    }

    pub fn clear_highlights(&mut self) {
        self.highlighted.clear();
    }

    #[must_use]
    pub fn highlighted(&self) -> &BTreeSet<usize> {
        &self.highlighted
    }

    /// Serialize the document with the highlight class added to highlighted elements.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        // Ordinal 0 is the root itself; its children start at 1.
        let mut ordinal = 0;
        write_children(self.root(), &self.highlighted, &mut ordinal, &mut out);
        out
    }
}

fn escape_text(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            other => out.push(other),
        }
    }
}

fn escape_attr(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            other => out.push(other),
        }
    }
}

fn write_children(
    element: ElementRef<'_>,
    highlighted: &BTreeSet<usize>,
    ordinal: &mut usize,
    out: &mut String,
) {
    let raw = RAW_TEXT_ELEMENTS.contains(&element.value().name());
    for child in element.children() {
        match child.value() {
            Node::Text(text) if raw => out.push_str(text),
            Node::Text(text) => escape_text(text, out),
            Node::Comment(comment) => {
                out.push_str("<!--");
                out.push_str(comment);
                out.push_str("-->");
            }
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    write_element(child, highlighted, ordinal, out);
                }
            }
            _ => {}
        }
    }
}

fn write_element(
    element: ElementRef<'_>,
    highlighted: &BTreeSet<usize>,
    ordinal: &mut usize,
    out: &mut String,
) {
    *ordinal += 1;
    let mark = highlighted.contains(ordinal);
    let value = element.value();
    let name = value.name();

    out.push('<');
    out.push_str(name);
    let mut has_class = false;
    for (attr, v) in value.attrs() {
        out.push(' ');
        out.push_str(attr);
        out.push_str("=\"");
        escape_attr(v, out);
        if attr == "class" {
            has_class = true;
            if mark {
                if !v.is_empty() {
                    out.push(' ');
                }
                out.push_str(HIGHLIGHT_CLASS);
            }
        }
        out.push('"');
    }
    if mark && !has_class {
        out.push_str(" class=\"");
        out.push_str(HIGHLIGHT_CLASS);
        out.push('"');
    }
    out.push('>');

    if VOID_ELEMENTS.contains(&name) {
        return;
    }
    write_children(element, highlighted, ordinal, out);
    out.push_str("</");
    out.push_str(name);
    out.push('>');
}
