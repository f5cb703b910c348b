use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DocumentError;

/// Closed set of chunking strategy identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ChunkerId {
    #[serde(rename = "DEFAULT-1024T")]
    Default1024T,
    #[serde(rename = "READ-CONTENT-PARA")]
    ReadContentPara,
    #[serde(rename = "READ-CONTENT-PARA-LLM")]
    ReadContentParaLlm,
    #[serde(rename = "READ-CONTENT-SHORT")]
    ReadContentShort,
    #[serde(rename = "READ-CONTENT-SHORT-LLM")]
    ReadContentShortLlm,
}

impl ChunkerId {
    pub const ALL: [Self; 5] = [
        Self::Default1024T,
        Self::ReadContentPara,
        Self::ReadContentParaLlm,
        Self::ReadContentShort,
        Self::ReadContentShortLlm,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Default1024T => "DEFAULT-1024T",
            Self::ReadContentPara => "READ-CONTENT-PARA",
            Self::ReadContentParaLlm => "READ-CONTENT-PARA-LLM",
            Self::ReadContentShort => "READ-CONTENT-SHORT",
            Self::ReadContentShortLlm => "READ-CONTENT-SHORT-LLM",
        }
    }

    #[must_use]
    pub fn is_llm_enhanced(self) -> bool {
        matches!(self, Self::ReadContentParaLlm | Self::ReadContentShortLlm)
    }

    /// The text-producing strategy an enhanced variant post-processes.
    #[must_use]
    pub fn base(self) -> Self {
        match self {
            Self::ReadContentParaLlm => Self::ReadContentPara,
            Self::ReadContentShortLlm => Self::ReadContentShort,
            other => other,
        }
    }
}

impl fmt::Display for ChunkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChunkerId {
    type Err = DocumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| DocumentError::UnknownChunker(s.to_owned()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChunkKind {
    Paragraph,
    Section,
    Code,
    Image,
    Table,
}

impl ChunkKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Paragraph => "PARAGRAPH",
            Self::Section => "SECTION",
            Self::Code => "CODE",
            Self::Image => "IMAGE",
            Self::Table => "TABLE",
        }
    }

    /// Image, table and code chunks.
    #[must_use]
    pub fn is_special(self) -> bool {
        matches!(self, Self::Code | Self::Image | Self::Table)
    }
}

impl fmt::Display for ChunkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind-specific chunk payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChunkContent {
    Paragraph,
    Section,
    Code {
        #[serde(default)]
        caption: String,
    },
    Image {
        filename: String,
        #[serde(default)]
        caption: String,
    },
    Table {
        #[serde(default)]
        caption: String,
    },
}

impl ChunkContent {
    #[must_use]
    pub fn kind(&self) -> ChunkKind {
        match self {
            Self::Paragraph => ChunkKind::Paragraph,
            Self::Section => ChunkKind::Section,
            Self::Code { .. } => ChunkKind::Code,
            Self::Image { .. } => ChunkKind::Image,
            Self::Table { .. } => ChunkKind::Table,
        }
    }

    /// Caption of a special chunk; empty for text chunks or when none was found.
    #[must_use]
    pub fn caption(&self) -> &str {
        match self {
            Self::Code { caption } | Self::Image { caption, .. } | Self::Table { caption } => {
                caption
            }
            Self::Paragraph | Self::Section => "",
        }
    }

    #[must_use]
    pub fn filename(&self) -> Option<&str> {
        match self {
            Self::Image { filename, .. } => Some(filename),
            _ => None,
        }
    }
}

/// A retrieval-sized unit of document text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub index: usize,
    pub total: usize,
    #[serde(flatten)]
    pub content: ChunkContent,
    pub text: String,
    /// Pre-enhancement body, present only when enhancement replaced `text`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_text: Option<String>,
    pub token_count: usize,
    pub chunker_id: ChunkerId,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub llm_processed: bool,
}

impl Chunk {
    #[must_use]
    pub fn kind(&self) -> ChunkKind {
        self.content.kind()
    }

    #[must_use]
    pub fn caption(&self) -> &str {
        self.content.caption()
    }

    #[must_use]
    pub fn filename(&self) -> Option<&str> {
        self.content.filename()
    }

    /// Text as produced by the strategy, before any enhancement.
    #[must_use]
    pub fn source_text(&self) -> &str {
        self.original_text.as_deref().unwrap_or(&self.text)
    }

    /// Whether two chunk sets are identical apart from their creation timestamps.
    #[must_use]
    pub fn same_content(&self, other: &Self) -> bool {
        Self {
            created_at: other.created_at,
            ..self.clone()
        } == *other
    }
}
