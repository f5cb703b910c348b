/// Transient structural unit produced by the extractor and consumed by a strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Section {
    /// A heading with no following text to attach to.
    Heading { text: String, level: u8 },
    /// A block of prose, carrying the heading(s) that immediately preceded it.
    Paragraph {
        heading: Option<String>,
        text: String,
    },
    Image {
        filename: String,
        alt: String,
        caption: String,
    },
    Table {
        text: String,
        caption: String,
    },
    Code {
        text: String,
        caption: String,
        language: Option<String>,
    },
}

impl Section {
    #[must_use]
    pub fn paragraph(text: impl Into<String>) -> Self {
        Self::Paragraph {
            heading: None,
            text: text.into(),
        }
    }

    #[must_use]
    pub fn image(filename: impl Into<String>) -> Self {
        Self::Image {
            filename: filename.into(),
            alt: String::new(),
            caption: String::new(),
        }
    }

    /// Whether this section is a heading or paragraph.
    #[must_use]
    pub fn is_text(&self) -> bool {
        matches!(self, Self::Heading { .. } | Self::Paragraph { .. })
    }

    /// Body text of a text section, heading included. `None` for special sections.
    #[must_use]
    pub fn body(&self) -> Option<String> {
        match self {
            Self::Heading { text, .. } => Some(text.clone()),
            Self::Paragraph {
                heading: Some(heading),
                text,
            } => Some(format!("{heading}\n\n{text}")),
            Self::Paragraph {
                heading: None,
                text,
            } => Some(text.clone()),
            _ => None,
        }
    }
}
