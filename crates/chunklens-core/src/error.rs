use chunklens_document::ChunkerId;
use chunklens_store::StoreError;

use crate::source::SourceError;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("unknown chunker id {0:?}")]
    InvalidChunker(String),

    #[error("unknown assessment method {0:?}")]
    InvalidMethod(String),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("no chunks stored for document {document_id} with chunker {chunker}")]
    NoChunks {
        document_id: String,
        chunker: ChunkerId,
    },

    #[error("invalid caption label pattern: {0}")]
    CaptionPattern(#[from] regex::Error),

    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
