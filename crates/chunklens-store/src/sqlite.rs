use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use chunklens_document::{Chunk, ChunkerId};
use chunklens_quality::{Assessment, AssessmentMethod};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use crate::error::StoreError;
use crate::ledger::CostRecord;
use crate::repository::{BoxFuture, ChunkRepository};

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS chunks (
        document_id TEXT NOT NULL,
        chunker_id TEXT NOT NULL,
        chunk_index INTEGER NOT NULL,
        payload TEXT NOT NULL,
        PRIMARY KEY (document_id, chunker_id, chunk_index)
    )",
    "CREATE TABLE IF NOT EXISTS assessments (
        document_id TEXT NOT NULL,
        chunker_id TEXT NOT NULL,
        method TEXT NOT NULL,
        payload TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        PRIMARY KEY (document_id, chunker_id, method)
    )",
    "CREATE TABLE IF NOT EXISTS cost_records (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        document_id TEXT NOT NULL,
        input_tokens INTEGER NOT NULL,
        output_tokens INTEGER NOT NULL,
        input_cost REAL NOT NULL,
        output_cost REAL NOT NULL,
        total_cost REAL NOT NULL,
        recorded_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_cost_records_document
        ON cost_records (document_id, recorded_at)",
];

type CostRow = (String, i64, i64, f64, f64, f64, String);

fn to_i64(v: u64) -> i64 {
    i64::try_from(v).unwrap_or(i64::MAX)
}

fn to_u64(v: i64) -> u64 {
    u64::try_from(v).unwrap_or_default()
}

fn timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|_| StoreError::Timestamp(s.to_owned()))
}

#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and create the schema.
    /// `":memory:"` opens a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or the schema fails.
    pub async fn open(path: &str) -> Result<Self, StoreError> {
        let in_memory = path == ":memory:";
        let url = if in_memory {
            "sqlite::memory:".to_string()
        } else {
            format!("sqlite:{path}?mode=rwc")
        };

        let opts = SqliteConnectOptions::from_str(&url)?.create_if_missing(true);

        // Each in-memory connection is its own database, so keep exactly one.
        let pool = SqlitePoolOptions::new()
            .max_connections(if in_memory { 1 } else { 5 })
            .connect_with(opts)
            .await?;

        let store = Self::new(pool);
        store.init().await?;
        Ok(store)
    }

    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create tables and indexes if missing.
    ///
    /// # Errors
    ///
    /// Returns an error if a schema statement fails.
    pub async fn init(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn write_chunks(
        &self,
        document_id: &str,
        chunker: ChunkerId,
        chunks: &[Chunk],
    ) -> Result<(), StoreError> {
        let payloads = chunks
            .iter()
            .map(|c| serde_json::to_string(c).map(|p| (c.index, p)))
            .collect::<Result<Vec<_>, _>>()?;

        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM chunks WHERE document_id = ? AND chunker_id = ?")
            .bind(document_id)
            .bind(chunker.as_str())
            .execute(&mut *tx)
            .await?;
        for (index, payload) in payloads {
            sqlx::query(
                "INSERT INTO chunks (document_id, chunker_id, chunk_index, payload) VALUES (?, ?, ?, ?)",
            )
            .bind(document_id)
            .bind(chunker.as_str())
            .bind(i64::try_from(index).unwrap_or(i64::MAX))
            .bind(payload)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        tracing::debug!(document_id, chunker = %chunker, chunks = chunks.len(), "replaced chunk set");
        Ok(())
    }

    async fn read_chunks(&self, document_id: &str, chunker: ChunkerId) -> Result<Vec<Chunk>, StoreError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT payload FROM chunks WHERE document_id = ? AND chunker_id = ? ORDER BY chunk_index",
        )
        .bind(document_id)
        .bind(chunker.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|(payload,)| serde_json::from_str(&payload).map_err(StoreError::from))
            .collect()
    }

    async fn write_assessment(&self, assessment: &Assessment) -> Result<(), StoreError> {
        let payload = serde_json::to_string(assessment)?;
        sqlx::query(
            "INSERT INTO assessments (document_id, chunker_id, method, payload, updated_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(document_id, chunker_id, method)
             DO UPDATE SET payload = excluded.payload, updated_at = excluded.updated_at",
        )
        .bind(&assessment.document_id)
        .bind(assessment.chunker_id.as_str())
        .bind(assessment.method.as_str())
        .bind(payload)
        .bind(timestamp(assessment.updated_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn read_assessment(
        &self,
        document_id: &str,
        chunker: ChunkerId,
        method: AssessmentMethod,
    ) -> Result<Option<Assessment>, StoreError> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT payload FROM assessments WHERE document_id = ? AND chunker_id = ? AND method = ?",
        )
        .bind(document_id)
        .bind(chunker.as_str())
        .bind(method.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.map(|(payload,)| serde_json::from_str(&payload))
            .transpose()
            .map_err(StoreError::from)
    }

    async fn insert_cost(&self, record: &CostRecord) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO cost_records
             (document_id, input_tokens, output_tokens, input_cost, output_cost, total_cost, recorded_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.document_id)
        .bind(to_i64(record.input_tokens))
        .bind(to_i64(record.output_tokens))
        .bind(record.input_cost)
        .bind(record.output_cost)
        .bind(record.total_cost)
        .bind(timestamp(record.recorded_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn read_costs(&self, document_id: Option<&str>) -> Result<Vec<CostRecord>, StoreError> {
        let rows: Vec<CostRow> = match document_id {
            Some(id) => {
                sqlx::query_as(
                    "SELECT document_id, input_tokens, output_tokens, input_cost, output_cost,
                            total_cost, recorded_at
                     FROM cost_records WHERE document_id = ? ORDER BY id",
                )
                .bind(id)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as(
                    "SELECT document_id, input_tokens, output_tokens, input_cost, output_cost,
                            total_cost, recorded_at
                     FROM cost_records ORDER BY id",
                )
                .fetch_all(&self.pool)
                .await?
            }
        };
        rows.into_iter()
            .map(
                |(document_id, input_tokens, output_tokens, input_cost, output_cost, total_cost, at)| {
                    Ok(CostRecord {
                        document_id,
                        input_tokens: to_u64(input_tokens),
                        output_tokens: to_u64(output_tokens),
                        input_cost,
                        output_cost,
                        total_cost,
                        recorded_at: parse_timestamp(&at)?,
                    })
                },
            )
            .collect()
    }
}

impl ChunkRepository for SqliteStore {
    fn replace_chunks<'a>(
        &'a self,
        document_id: &'a str,
        chunker: ChunkerId,
        chunks: &'a [Chunk],
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(self.write_chunks(document_id, chunker, chunks))
    }

    fn load_chunks<'a>(
        &'a self,
        document_id: &'a str,
        chunker: ChunkerId,
    ) -> BoxFuture<'a, Result<Vec<Chunk>, StoreError>> {
        Box::pin(self.read_chunks(document_id, chunker))
    }

    fn replace_assessment<'a>(
        &'a self,
        assessment: &'a Assessment,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(self.write_assessment(assessment))
    }

    fn load_assessment<'a>(
        &'a self,
        document_id: &'a str,
        chunker: ChunkerId,
        method: AssessmentMethod,
    ) -> BoxFuture<'a, Result<Option<Assessment>, StoreError>> {
        Box::pin(self.read_assessment(document_id, chunker, method))
    }

    fn append_cost<'a>(&'a self, record: &'a CostRecord) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(self.insert_cost(record))
    }

    fn cost_records<'a>(
        &'a self,
        document_id: Option<&'a str>,
    ) -> BoxFuture<'a, Result<Vec<CostRecord>, StoreError>> {
        Box::pin(self.read_costs(document_id))
    }
}
