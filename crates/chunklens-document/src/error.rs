#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("unknown chunker id: {0}")]
    UnknownChunker(String),

    #[error("invalid caption label set: {0}")]
    CaptionPattern(#[from] regex::Error),
}
