use chrono::{DateTime, Utc};

use crate::chunk::{Chunk, ChunkerId};
use crate::strategy::{ChunkingConfig, Strategy};
use crate::structure::StructureExtractor;

/// Extraction plus strategy selection. Enhancement runs separately since it is async.
#[derive(Debug, Clone, Default)]
pub struct ChunkPipeline {
    extractor: StructureExtractor,
    config: ChunkingConfig,
}

impl ChunkPipeline {
    #[must_use]
    pub fn new(extractor: StructureExtractor, config: ChunkingConfig) -> Self {
        Self { extractor, config }
    }

    #[must_use]
    pub fn strategy(&self, chunker: ChunkerId) -> Strategy {
        self.config.strategy_for(chunker)
    }

    /// Chunk an HTML fragment with the base strategy of `chunker`.
    #[must_use]
    pub fn chunk_html(&self, html: &str, chunker: ChunkerId, created_at: DateTime<Utc>) -> Vec<Chunk> {
        let sections = self.extractor.extract_html(html);
        let chunks = self.strategy(chunker).chunk(&sections, chunker, created_at);
        tracing::debug!(
            chunker = %chunker,
            sections = sections.len(),
            chunks = chunks.len(),
            "chunked document"
        );
        chunks
    }
}
