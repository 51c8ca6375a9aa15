//! In-process vector store used for dry runs and tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{VectorStore, check_record_dimensions};
use crate::error::StoreError;
use crate::models::{IndexStats, QueryMatch, StoredRecord};

type NamespaceMap = HashMap<String, HashMap<String, StoredRecord>>;

/// A vector index held in memory, keyed by (namespace, id).
pub struct MemoryStore {
    index_name: String,
    dimension: usize,
    namespaces: Mutex<NamespaceMap>,
}

impl MemoryStore {
    pub fn new(index_name: impl Into<String>, dimension: usize) -> Self {
        Self {
            index_name: index_name.into(),
            dimension,
            namespaces: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, NamespaceMap>, StoreError> {
        self.namespaces
            .lock()
            .map_err(|_| StoreError::ClientError("memory store lock poisoned".to_string()))
    }

    /// Fetch a stored record by id.
    pub fn get(&self, id: &str, namespace: Option<&str>) -> Option<StoredRecord> {
        let guard = self.namespaces.lock().ok()?;
        guard
            .get(namespace.unwrap_or_default())
            .and_then(|ns| ns.get(id))
            .cloned()
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn health_check(&self) -> Result<bool, StoreError> {
        Ok(true)
    }

    async fn upsert(
        &self,
        records: Vec<StoredRecord>,
        namespace: Option<&str>,
    ) -> Result<u64, StoreError> {
        check_record_dimensions(&records, self.dimension)?;

        let count = records.len() as u64;
        let mut guard = self.lock()?;
        let ns = guard
            .entry(namespace.unwrap_or_default().to_string())
            .or_default();
        for record in records {
            ns.insert(record.id.clone(), record);
        }
        Ok(count)
    }

    async fn stats(&self) -> Result<IndexStats, StoreError> {
        let guard = self.lock()?;
        let namespaces: BTreeMap<String, u64> = guard
            .iter()
            .map(|(name, records)| (name.clone(), records.len() as u64))
            .collect();
        Ok(IndexStats {
            index_name: self.index_name.clone(),
            total_vector_count: namespaces.values().sum(),
            dimension: self.dimension as u64,
            namespaces,
        })
    }

    async fn query(
        &self,
        vector: Vec<f32>,
        top_k: u64,
        namespace: Option<&str>,
    ) -> Result<Vec<QueryMatch>, StoreError> {
        if vector.len() != self.dimension {
            return Err(StoreError::DimensionMismatch {
                id: "<query>".to_string(),
                expected: self.dimension,
                actual: vector.len(),
            });
        }

        let guard = self.lock()?;
        let Some(records) = guard.get(namespace.unwrap_or_default()) else {
            return Ok(Vec::new());
        };

        let mut matches: Vec<QueryMatch> = records
            .values()
            .map(|r| QueryMatch {
                id: r.id.clone(),
                score: cosine(&vector, &r.values),
                metadata: Some(r.metadata.clone()),
            })
            .collect();
        matches.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
        matches.truncate(top_k as usize);
        Ok(matches)
    }

    async fn dimension(&self) -> Result<usize, StoreError> {
        Ok(self.dimension)
    }

    fn index_name(&self) -> &str {
        &self.index_name
    }
}
