//! Configuration, content sources, and the service tying chunking, assessment and
//! alignment to a repository.

pub mod config;
pub mod error;
pub mod service;
pub mod source;

pub use config::Config;
pub use error::ServiceError;
pub use service::{Alignment, BatchResult, ChunkRun, ChunkService, DocumentOutcome};
pub use source::{ContentSource, DirectorySource, MemorySource, RenderedDocument, SourceError};
