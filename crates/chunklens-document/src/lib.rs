//! HTML structure extraction and chunking.
//!
//! The flow is `StructureExtractor` → `Strategy` → optional `Enhancer`. Sections are
//! transient; chunks are the persisted unit.

pub mod caption;
pub mod chunk;
pub mod enhance;
pub mod error;
pub mod pipeline;
pub mod render;
pub mod section;
mod split;
pub mod strategy;
pub mod structure;
pub mod tokens;

pub use caption::CaptionResolver;
pub use chunk::{Chunk, ChunkContent, ChunkKind, ChunkerId};
pub use enhance::{ChunkOutcome, EnhancementConfig, EnhancementOutcome, EnhancementReport, Enhancer};
pub use error::DocumentError;
pub use pipeline::ChunkPipeline;
pub use render::resolve_image_sources;
pub use section::Section;
pub use strategy::{ChunkingConfig, Strategy};
pub use structure::{
    Block, BlockKind, StructureExtractor, basename, block_source_text, block_text, leaf_blocks,
};
pub use tokens::estimate_tokens;
