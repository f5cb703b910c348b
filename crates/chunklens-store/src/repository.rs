use std::future::Future;
use std::pin::Pin;

use chunklens_document::{Chunk, ChunkerId};
use chunklens_quality::{Assessment, AssessmentMethod};

use crate::error::StoreError;
use crate::ledger::CostRecord;

pub(crate) type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Persistence collaborator for chunk sets, assessments and cost records.
///
/// Replacements are all-or-nothing: on failure the previously stored value for the
/// key is left intact.
pub trait ChunkRepository: Send + Sync {
    /// Replace the chunk set for `(document_id, chunker)`. Other chunkers' sets are untouched.
    fn replace_chunks<'a>(
        &'a self,
        document_id: &'a str,
        chunker: ChunkerId,
        chunks: &'a [Chunk],
    ) -> BoxFuture<'a, Result<(), StoreError>>;

    /// Stored chunk set in index order; empty when none exists.
    fn load_chunks<'a>(
        &'a self,
        document_id: &'a str,
        chunker: ChunkerId,
    ) -> BoxFuture<'a, Result<Vec<Chunk>, StoreError>>;

    /// Replace the assessment for its `(document, chunker, method)` key.
    fn replace_assessment<'a>(
        &'a self,
        assessment: &'a Assessment,
    ) -> BoxFuture<'a, Result<(), StoreError>>;

    fn load_assessment<'a>(
        &'a self,
        document_id: &'a str,
        chunker: ChunkerId,
        method: AssessmentMethod,
    ) -> BoxFuture<'a, Result<Option<Assessment>, StoreError>>;

    fn append_cost<'a>(&'a self, record: &'a CostRecord) -> BoxFuture<'a, Result<(), StoreError>>;

    /// Ledger entries in append order, for one document or all of them.
    fn cost_records<'a>(
        &'a self,
        document_id: Option<&'a str>,
    ) -> BoxFuture<'a, Result<Vec<CostRecord>, StoreError>>;
}
