//! Vector store abstraction layer.
//!
//! A trait-based abstraction over the supported backends (Pinecone, Qdrant and
//! an in-process map), selected by configuration.

mod memory;
mod pinecone;
mod qdrant;

pub use memory::MemoryStore;
pub use pinecone::PineconeBackend;
pub use qdrant::QdrantBackend;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::models::{IndexStats, QueryMatch, StoredRecord, VectorDriver, VectorStoreConfig};

/// Abstract trait for vector store operations.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Check if the index is reachable with the configured credentials.
    async fn health_check(&self) -> Result<bool, StoreError>;

    /// Insert or overwrite records by id. Returns the number of records written.
    async fn upsert(
        &self,
        records: Vec<StoredRecord>,
        namespace: Option<&str>,
    ) -> Result<u64, StoreError>;

    /// Summary counts for the whole index.
    async fn stats(&self) -> Result<IndexStats, StoreError>;

    /// Nearest records to `vector`, best first.
    async fn query(
        &self,
        vector: Vec<f32>,
        top_k: u64,
        namespace: Option<&str>,
    ) -> Result<Vec<QueryMatch>, StoreError>;

    /// Dimension the index was created with.
    async fn dimension(&self) -> Result<usize, StoreError>;

    fn index_name(&self) -> &str;
}

/// Create a vector store backend based on configuration.
pub async fn create_backend(
    config: &VectorStoreConfig,
    embedding_dim: usize,
) -> Result<Box<dyn VectorStore>, StoreError> {
    match config.driver {
        VectorDriver::Pinecone => Ok(Box::new(PineconeBackend::new(config)?)),
        VectorDriver::Qdrant => Ok(Box::new(QdrantBackend::new(config, embedding_dim)?)),
        VectorDriver::Memory => Ok(Box::new(MemoryStore::new(
            config.index_name.clone(),
            embedding_dim,
        ))),
    }
}

/// Reject any record whose vector length differs from the index dimension.
pub fn check_record_dimensions(
    records: &[StoredRecord],
    expected: usize,
) -> Result<(), StoreError> {
    match records.iter().find(|r| r.dimension() != expected) {
        Some(record) => Err(StoreError::DimensionMismatch {
            id: record.id.clone(),
            expected,
            actual: record.dimension(),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Chunk, VectorStoreConfig};
    use std::path::Path;

    fn record(dim: usize) -> StoredRecord {
        let chunk = Chunk::new(Path::new("a.docx"), 0, 0, 1, "a".to_string());
        StoredRecord::new(&chunk, vec![0.0; dim], Path::new("a.docx"), "ts")
    }

    #[test]
    fn test_check_record_dimensions() {
        assert!(check_record_dimensions(&[record(512)], 512).is_ok());
        let err = check_record_dimensions(&[record(512), record(1536)], 512).unwrap_err();
        assert!(matches!(
            err,
            StoreError::DimensionMismatch {
                expected: 512,
                actual: 1536,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_create_memory_backend() {
        let config = VectorStoreConfig {
            driver: VectorDriver::Memory,
            index_name: "scratch".to_string(),
            ..Default::default()
        };
        let store = create_backend(&config, 8).await.unwrap();
        assert_eq!(store.index_name(), "scratch");
        assert_eq!(store.dimension().await.unwrap(), 8);
    }

    #[tokio::test]
    async fn test_create_pinecone_backend_requires_key() {
        let config = VectorStoreConfig::default();
        assert!(matches!(
            create_backend(&config, 512).await,
            Err(StoreError::MissingApiKey)
        ));
    }
}
