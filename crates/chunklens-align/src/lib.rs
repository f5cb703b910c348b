//! Maps chunks back onto the rendered document they came from.
//!
//! Both the document text and each chunk are normalized the same way, then chunks are
//! searched for in index order behind a cursor that only moves forward.

pub mod context;
pub mod normalize;
pub mod viewer;

pub use context::{AlignmentContext, ChunkPosition, ElementSpan};
pub use normalize::normalize;
pub use viewer::{HIGHLIGHT_CLASS, Viewer};
