#[derive(Debug, thiserror::Error)]
pub enum QualityError {
    #[error("unknown assessment method: {0}")]
    UnknownMethod(String),

    #[error("unknown quality label: {0}")]
    UnknownLabel(String),
}
