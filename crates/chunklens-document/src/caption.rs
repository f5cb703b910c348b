use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Node};

use crate::structure::{block_text, is_special_block};

/// Label words recognised in front of a caption, in English, Russian and German.
pub const DEFAULT_LABELS: &[&str] = &[
    "Listing",
    "Code",
    "Example",
    "Schema",
    "Table",
    "Figure",
    "Fig.",
    "Image",
    "Illustration",
    "Листинг",
    "Код",
    "Пример",
    "Схема",
    "Таблица",
    "Рисунок",
    "Рис.",
    "Изображение",
    "Abbildung",
    "Tabelle",
    "Beispiel",
    "Bild",
];

/// Sibling or descendant text longer than this is body text, not a caption.
const MAX_CAPTION_CHARS: usize = 300;

const CAPTION_CLASSES: &[&str] = &["caption", "title"];

static DEFAULT_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&caption_pattern(DEFAULT_LABELS)).unwrap());

fn caption_pattern<S: AsRef<str>>(labels: &[S]) -> String {
    let mut sorted: Vec<&str> = labels.iter().map(AsRef::as_ref).collect();
    sorted.sort_by_key(|l| std::cmp::Reverse(l.chars().count()));
    let alternatives = sorted
        .iter()
        .map(|l| regex::escape(l.trim()))
        .collect::<Vec<_>>()
        .join("|");
    format!(r"(?iu)^(?:{alternatives})\s*(?:[0-9]+(?:[.\-][0-9]+)*)?\s*:\s*\S")
}

/// Where a resolved caption came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptionSource {
    /// A dedicated caption element (`figcaption`, `caption`, `.caption`, `.title`).
    Slot,
    PreviousSibling,
    NextSibling,
    Descendant,
}

#[derive(Debug, Clone)]
pub struct Resolved<'a> {
    pub text: String,
    pub source: CaptionSource,
    /// Element the caption was read from; `None` for a bare text node.
    pub element: Option<ElementRef<'a>>,
}

/// The nearest significant sibling on one side of an element.
enum Neighbour<'a> {
    Element(ElementRef<'a>),
    Text(String),
}

/// Finds captions for image, table and code elements.
#[derive(Debug, Clone)]
pub struct CaptionResolver {
    pattern: Regex,
}

impl Default for CaptionResolver {
    fn default() -> Self {
        Self {
            pattern: DEFAULT_PATTERN.clone(),
        }
    }
}

impl CaptionResolver {
    /// Build a resolver for a custom label set. An empty set falls back to the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the label set produces an oversized pattern.
    pub fn new<S: AsRef<str>>(labels: &[S]) -> Result<Self, regex::Error> {
        if labels.iter().all(|l| l.as_ref().trim().is_empty()) {
            return Ok(Self::default());
        }
        let labels: Vec<&str> = labels
            .iter()
            .map(AsRef::as_ref)
            .filter(|l| !l.trim().is_empty())
            .collect();
        Ok(Self {
            pattern: Regex::new(&caption_pattern(&labels))?,
        })
    }

    /// Whether `text` has the `<label> <number>: <text>` caption shape.
    #[must_use]
    pub fn is_caption(&self, text: &str) -> bool {
        text.chars().count() <= MAX_CAPTION_CHARS && self.pattern.is_match(text)
    }

    /// Caption for a special element, or an empty string.
    #[must_use]
    pub fn resolve(&self, element: ElementRef<'_>) -> String {
        self.resolve_with_source(element)
            .map(|r| r.text)
            .unwrap_or_default()
    }

    /// Caption together with the element it was read from.
    #[must_use]
    pub fn resolve_with_source<'a>(&self, element: ElementRef<'a>) -> Option<Resolved<'a>> {
        if let Some(slot) = caption_slot(element) {
            let text = block_text(slot);
            if !text.is_empty() {
                return Some(Resolved {
                    text,
                    source: CaptionSource::Slot,
                    element: Some(slot),
                });
            }
        }

        let candidates = [
            (previous_neighbour(element), CaptionSource::PreviousSibling),
            (next_neighbour(element), CaptionSource::NextSibling),
        ];
        for (candidate, source) in candidates {
            let found = match candidate {
                // Another image, table or code block is never a caption.
                Some(Neighbour::Element(e)) if !is_special_block(e) => self.matching(e, source),
                Some(Neighbour::Text(text)) => self.is_caption(&text).then_some(Resolved {
                    text,
                    source,
                    element: None,
                }),
                _ => None,
            };
            if found.is_some() {
                return found;
            }
        }

        element
            .descendants()
            .skip(1)
            .filter_map(ElementRef::wrap)
            .filter(|d| !is_caption_opaque(d.value().name()))
            .find_map(|d| self.matching(d, CaptionSource::Descendant))
    }

    fn matching<'a>(&self, element: ElementRef<'a>, source: CaptionSource) -> Option<Resolved<'a>> {
        let text = block_text(element);
        self.is_caption(&text).then_some(Resolved {
            text,
            source,
            element: Some(element),
        })
    }
}

fn is_caption_opaque(name: &str) -> bool {
    matches!(name, "pre" | "code" | "script" | "style" | "tr" | "td" | "th" | "tbody" | "thead")
}

fn has_caption_class(element: ElementRef<'_>) -> bool {
    element
        .value()
        .classes()
        .any(|c| CAPTION_CLASSES.iter().any(|k| c.eq_ignore_ascii_case(k)))
}

/// Dedicated caption child of the element, or of its enclosing `figure`.
fn caption_slot(element: ElementRef<'_>) -> Option<ElementRef<'_>> {
    let own = element.children().filter_map(ElementRef::wrap).find(|c| {
        matches!(c.value().name(), "figcaption" | "caption") || has_caption_class(*c)
    });
    if own.is_some() {
        return own;
    }
    let figure = element
        .parent()
        .and_then(ElementRef::wrap)
        .filter(|p| p.value().name() == "figure")?;
    figure
        .children()
        .filter_map(ElementRef::wrap)
        .find(|c| c.value().name() == "figcaption")
}

fn previous_neighbour(element: ElementRef<'_>) -> Option<Neighbour<'_>> {
    element
        .prev_siblings()
        .find_map(|n| significant(n.value(), ElementRef::wrap(n)))
}

fn next_neighbour(element: ElementRef<'_>) -> Option<Neighbour<'_>> {
    element
        .next_siblings()
        .find_map(|n| significant(n.value(), ElementRef::wrap(n)))
}

/// Elements and non-blank text count as neighbours; comments and whitespace do not.
fn significant<'a>(node: &Node, element: Option<ElementRef<'a>>) -> Option<Neighbour<'a>> {
    match node {
        Node::Text(text) => {
            let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
            (!text.is_empty()).then_some(Neighbour::Text(text))
        }
        Node::Element(_) => element.map(Neighbour::Element),
        _ => None,
    }
}
