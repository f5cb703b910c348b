//! Persistence for chunk sets, assessments and the append-only cost ledger.

pub mod error;
pub mod ledger;
pub mod memory;
pub mod repository;
pub mod sqlite;

pub use error::StoreError;
pub use ledger::{Bucket, BucketSummary, CostRecord, CostSummary};
pub use memory::InMemoryStore;
pub use repository::ChunkRepository;
pub use sqlite::SqliteStore;
