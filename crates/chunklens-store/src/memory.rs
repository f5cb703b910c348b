use std::collections::HashMap;
use std::sync::RwLock;

use chunklens_document::{Chunk, ChunkerId};
use chunklens_quality::{Assessment, AssessmentMethod};

use crate::error::StoreError;
use crate::ledger::CostRecord;
use crate::repository::{BoxFuture, ChunkRepository};

type ChunkKey = (String, ChunkerId);
type AssessmentKey = (String, ChunkerId, AssessmentMethod);

/// Process-local repository for tests and one-shot runs.
#[derive(Default)]
pub struct InMemoryStore {
    chunks: RwLock<HashMap<ChunkKey, Vec<Chunk>>>,
    assessments: RwLock<HashMap<AssessmentKey, Assessment>>,
    costs: RwLock<Vec<CostRecord>>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl std::fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStore").finish_non_exhaustive()
    }
}

fn poisoned(e: impl std::fmt::Display) -> StoreError {
    StoreError::Lock(e.to_string())
}

impl ChunkRepository for InMemoryStore {
    fn replace_chunks<'a>(
        &'a self,
        document_id: &'a str,
        chunker: ChunkerId,
        chunks: &'a [Chunk],
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            let mut map = self.chunks.write().map_err(poisoned)?;
            map.insert((document_id.to_owned(), chunker), chunks.to_vec());
            Ok(())
        })
    }

    fn load_chunks<'a>(
        &'a self,
        document_id: &'a str,
        chunker: ChunkerId,
    ) -> BoxFuture<'a, Result<Vec<Chunk>, StoreError>> {
        Box::pin(async move {
            let map = self.chunks.read().map_err(poisoned)?;
            Ok(map
                .get(&(document_id.to_owned(), chunker))
                .cloned()
                .unwrap_or_default())
        })
    }

    fn replace_assessment<'a>(
        &'a self,
        assessment: &'a Assessment,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            let key = (
                assessment.document_id.clone(),
                assessment.chunker_id,
                assessment.method,
            );
            self.assessments
                .write()
                .map_err(poisoned)?
                .insert(key, assessment.clone());
            Ok(())
        })
    }

    fn load_assessment<'a>(
        &'a self,
        document_id: &'a str,
        chunker: ChunkerId,
        method: AssessmentMethod,
    ) -> BoxFuture<'a, Result<Option<Assessment>, StoreError>> {
        Box::pin(async move {
            let map = self.assessments.read().map_err(poisoned)?;
            Ok(map.get(&(document_id.to_owned(), chunker, method)).cloned())
        })
    }

    fn append_cost<'a>(&'a self, record: &'a CostRecord) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            self.costs.write().map_err(poisoned)?.push(record.clone());
            Ok(())
        })
    }

    fn cost_records<'a>(
        &'a self,
        document_id: Option<&'a str>,
    ) -> BoxFuture<'a, Result<Vec<CostRecord>, StoreError>> {
        Box::pin(async move {
            let costs = self.costs.read().map_err(poisoned)?;
            Ok(costs
                .iter()
                .filter(|r| document_id.is_none_or(|d| r.document_id == d))
                .cloned()
                .collect())
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use chunklens_document::ChunkContent;
    use chunklens_quality::{QualityLabel, Verdict};

    use super::*;

    fn chunks(chunker: ChunkerId, n: usize) -> Vec<Chunk> {
        (0..n)
            .map(|index| Chunk {
                index,
                total: n,
                content: ChunkContent::Section,
                text: format!("chunk {index}"),
                original_text: None,
                token_count: 2,
                chunker_id: chunker,
                created_at: Utc::now(),
                llm_processed: false,
            })
            .collect()
    }

    #[tokio::test]
    async fn chunk_sets_per_chunker_coexist() {
        let store = InMemoryStore::new();
        store
            .replace_chunks("doc", ChunkerId::Default1024T, &chunks(ChunkerId::Default1024T, 3))
            .await
            .unwrap();
        store
            .replace_chunks("doc", ChunkerId::ReadContentPara, &chunks(ChunkerId::ReadContentPara, 5))
            .await
            .unwrap();
        store
            .replace_chunks("doc", ChunkerId::Default1024T, &chunks(ChunkerId::Default1024T, 2))
            .await
            .unwrap();

        assert_eq!(store.load_chunks("doc", ChunkerId::Default1024T).await.unwrap().len(), 2);
        assert_eq!(store.load_chunks("doc", ChunkerId::ReadContentPara).await.unwrap().len(), 5);
        assert!(store.load_chunks("other", ChunkerId::ReadContentPara).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn assessment_overwrites_per_method() {
        let store = InMemoryStore::new();
        let verdict = |label: QualityLabel| Verdict {
            label,
            quality_score: label.score(),
            chunks: Vec::new(),
        };
        for (method, label) in [
            (AssessmentMethod::BasicHeuristics, QualityLabel::Good),
            (AssessmentMethod::AiAdvanced, QualityLabel::Unknown),
            (AssessmentMethod::BasicHeuristics, QualityLabel::BadChunks),
        ] {
            let a = Assessment::new("doc", ChunkerId::Default1024T, method, verdict(label), 0.0);
            store.replace_assessment(&a).await.unwrap();
        }
        let basic = store
            .load_assessment("doc", ChunkerId::Default1024T, AssessmentMethod::BasicHeuristics)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(basic.label, QualityLabel::BadChunks);
        let ai = store
            .load_assessment("doc", ChunkerId::Default1024T, AssessmentMethod::AiAdvanced)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(ai.label, QualityLabel::Unknown);
    }

    #[tokio::test]
    async fn costs_filter_by_document() {
        let store = InMemoryStore::new();
        for doc in ["a", "b", "a"] {
            let record = CostRecord {
                document_id: doc.into(),
                input_tokens: 1,
                output_tokens: 1,
                input_cost: 0.1,
                output_cost: 0.1,
                total_cost: 0.2,
                recorded_at: Utc::now(),
            };
            store.append_cost(&record).await.unwrap();
        }
        assert_eq!(store.cost_records(Some("a")).await.unwrap().len(), 2);
        assert_eq!(store.cost_records(None).await.unwrap().len(), 3);
    }
}
