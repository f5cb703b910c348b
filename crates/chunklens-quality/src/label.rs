use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::QualityError;

/// Closed quality taxonomy shared by both assessment methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QualityLabel {
    Good,
    /// The source document itself is unsuitable.
    BadPoc,
    /// Chunking degraded otherwise good source.
    BadChunks,
    Unknown,
}

impl QualityLabel {
    pub const ALL: [Self; 4] = [Self::Good, Self::BadPoc, Self::BadChunks, Self::Unknown];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Good => "GOOD",
            Self::BadPoc => "BAD_POC",
            Self::BadChunks => "BAD_CHUNKS",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Default numeric score for a label.
    #[must_use]
    pub fn score(self) -> f64 {
        match self {
            Self::Good => 1.0,
            Self::Unknown => 0.5,
            Self::BadChunks => 0.3,
            Self::BadPoc => 0.0,
        }
    }
}

impl fmt::Display for QualityLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QualityLabel {
    type Err = QualityError;

    /// Case-insensitive; `-` and space are accepted in place of `_`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let canonical = s.trim().to_ascii_uppercase().replace(['-', ' '], "_");
        Self::ALL
            .into_iter()
            .find(|l| l.as_str() == canonical)
            .ok_or_else(|| QualityError::UnknownLabel(s.to_owned()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AssessmentMethod {
    #[serde(rename = "basic-heuristics")]
    BasicHeuristics,
    #[serde(rename = "ai-advanced")]
    AiAdvanced,
}

impl AssessmentMethod {
    pub const ALL: [Self; 2] = [Self::BasicHeuristics, Self::AiAdvanced];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BasicHeuristics => "basic-heuristics",
            Self::AiAdvanced => "ai-advanced",
        }
    }
}

impl fmt::Display for AssessmentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssessmentMethod {
    type Err = QualityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| QualityError::UnknownMethod(s.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_parsing_is_lenient() {
        assert_eq!("GOOD".parse::<QualityLabel>().unwrap(), QualityLabel::Good);
        assert_eq!("bad-poc".parse::<QualityLabel>().unwrap(), QualityLabel::BadPoc);
        assert_eq!(" Bad Chunks ".parse::<QualityLabel>().unwrap(), QualityLabel::BadChunks);
        assert!("EXCELLENT".parse::<QualityLabel>().is_err());
    }

    #[test]
    fn label_serde_uses_screaming_snake() {
        assert_eq!(serde_json::to_string(&QualityLabel::BadChunks).unwrap(), "\"BAD_CHUNKS\"");
    }

    #[test]
    fn method_ids_are_exact() {
        assert_eq!(
            "basic-heuristics".parse::<AssessmentMethod>().unwrap(),
            AssessmentMethod::BasicHeuristics
        );
        assert_eq!(
            "ai-advanced".parse::<AssessmentMethod>().unwrap(),
            AssessmentMethod::AiAdvanced
        );
        assert!(matches!(
            "AI-ADVANCED".parse::<AssessmentMethod>(),
            Err(QualityError::UnknownMethod(_))
        ));
    }

    #[test]
    fn scores_are_ordered() {
        assert!(QualityLabel::Good.score() > QualityLabel::Unknown.score());
        assert!(QualityLabel::Unknown.score() > QualityLabel::BadChunks.score());
        assert!(QualityLabel::BadChunks.score() > QualityLabel::BadPoc.score());
    }
}
