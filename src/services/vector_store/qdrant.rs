//! Qdrant vector store backend implementation.
//!
//! Qdrant has no namespaces, so the namespace is stored in the payload and
//! folded into the point id. Readable record ids live in `record_id`.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use qdrant_client::Qdrant;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::vectors_config::Config as VectorsConfigKind;
use qdrant_client::qdrant::{
    Condition, CreateCollectionBuilder, Distance, Filter, PayloadIncludeSelector, PointStruct,
    ScrollPointsBuilder, SearchPointsBuilder, UpsertPointsBuilder, Value, VectorParamsBuilder,
};
use uuid::Uuid;

use super::{VectorStore, check_record_dimensions};
use crate::error::StoreError;
use crate::models::{IndexStats, QueryMatch, RecordMetadata, StoredRecord, VectorStoreConfig};

const NAMESPACE_FIELD: &str = "namespace";
const RECORD_ID_FIELD: &str = "record_id";

/// Qdrant vector store backend.
pub struct QdrantBackend {
    client: Qdrant,
    collection: String,
    embedding_dim: usize,
}

/// Summary of an existing collection.
struct CollectionSummary {
    points_count: u64,
    dimension: Option<usize>,
}

impl QdrantBackend {
    pub fn new(config: &VectorStoreConfig, embedding_dim: usize) -> Result<Self, StoreError> {
        let mut builder = Qdrant::from_url(&config.url);

        if let Some(ref api_key) = config.api_key {
            builder = builder.api_key(api_key.clone());
        }

        let client = builder
            .build()
            .map_err(|e| StoreError::ConnectionError(e.to_string()))?;

        Ok(Self {
            client,
            collection: config.index_name.clone(),
            embedding_dim,
        })
    }

    /// Stable point id for a record within a namespace.
    pub fn point_id(record_id: &str, namespace: &str) -> String {
        let name = format!("{namespace}:{record_id}");
        Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string()
    }

    async fn collection_summary(&self) -> Result<Option<CollectionSummary>, StoreError> {
        match self.client.collection_info(&self.collection).await {
            Ok(info) => {
                let Some(result) = info.result else {
                    return Ok(None);
                };
                let dimension = result
                    .config
                    .and_then(|c| c.params)
                    .and_then(|p| p.vectors_config)
                    .and_then(|v| v.config)
                    .and_then(|c| match c {
                        VectorsConfigKind::Params(params) => Some(params.size as usize),
                        VectorsConfigKind::ParamsMap(_) => None,
                    });
                Ok(Some(CollectionSummary {
                    points_count: result.points_count.unwrap_or(0),
                    dimension,
                }))
            }
            Err(e) => {
                let msg = e.to_string();
                if msg.contains("not found") || msg.contains("doesn't exist") {
                    Ok(None)
                } else {
                    Err(StoreError::ConnectionError(msg))
                }
            }
        }
    }

    async fn create_collection(&self) -> Result<(), StoreError> {
        let create_collection = CreateCollectionBuilder::new(&self.collection).vectors_config(
            VectorParamsBuilder::new(self.embedding_dim as u64, Distance::Cosine),
        );

        self.client
            .create_collection(create_collection)
            .await
            .map_err(|e| StoreError::ClientError(e.to_string()))?;

        tracing::info!(
            "created collection '{}' ({} dimensions)",
            self.collection,
            self.embedding_dim
        );
        Ok(())
    }

    /// Count points per namespace by scrolling the namespace payload field.
    async fn namespace_counts(&self) -> Result<BTreeMap<String, u64>, StoreError> {
        let mut counts: BTreeMap<String, u64> = BTreeMap::new();
        let mut offset: Option<qdrant_client::qdrant::PointId> = None;

        loop {
            let mut scroll_builder = ScrollPointsBuilder::new(&self.collection)
                .limit(256u32)
                .with_payload(PayloadIncludeSelector {
                    fields: vec![NAMESPACE_FIELD.to_string()],
                })
                .with_vectors(false);

            if let Some(off) = offset {
                scroll_builder = scroll_builder.offset(off);
            }

            let response = self
                .client
                .scroll(scroll_builder)
                .await
                .map_err(|e| StoreError::QueryError(e.to_string()))?;

            if response.result.is_empty() {
                break;
            }

            for point in &response.result {
                let namespace = point
                    .payload
                    .get(NAMESPACE_FIELD)
                    .and_then(string_value)
                    .unwrap_or_default();
                *counts.entry(namespace).or_insert(0) += 1;
            }

            offset = response.next_page_offset;
            if offset.is_none() {
                break;
            }
        }

        Ok(counts)
    }
}

fn string_value(value: &Value) -> Option<String> {
    match &value.kind {
        Some(Kind::StringValue(s)) => Some(s.clone()),
        _ => None,
    }
}

fn integer_value(value: &Value) -> Option<u64> {
    match &value.kind {
        Some(Kind::IntegerValue(n)) => u64::try_from(*n).ok(),
        _ => None,
    }
}

fn to_payload(record: StoredRecord, namespace: &str) -> HashMap<String, Value> {
    let meta = record.metadata;
    let mut payload: HashMap<String, Value> = HashMap::new();
    payload.insert(RECORD_ID_FIELD.to_string(), record.id.into());
    payload.insert(NAMESPACE_FIELD.to_string(), namespace.to_string().into());
    payload.insert("text".to_string(), meta.text.into());
    payload.insert("source".to_string(), meta.source.into());
    payload.insert("file_path".to_string(), meta.file_path.into());
    payload.insert("chunk_index".to_string(), (meta.chunk_index as i64).into());
    payload.insert("chunk_length".to_string(), (meta.chunk_length as i64).into());
    payload.insert("start_offset".to_string(), (meta.start_offset as i64).into());
    payload.insert("end_offset".to_string(), (meta.end_offset as i64).into());
    payload.insert("timestamp".to_string(), meta.timestamp.into());
    payload.insert("document_type".to_string(), meta.document_type.into());
    payload
}

fn from_payload(payload: &HashMap<String, Value>) -> Option<RecordMetadata> {
    let text = |key: &str| payload.get(key).and_then(string_value);
    let number = |key: &str| payload.get(key).and_then(integer_value);

    Some(RecordMetadata {
        text: text("text")?,
        source: text("source")?,
        file_path: text("file_path").unwrap_or_default(),
        chunk_index: number("chunk_index")?,
        chunk_length: number("chunk_length").unwrap_or_default(),
        start_offset: number("start_offset").unwrap_or_default(),
        end_offset: number("end_offset").unwrap_or_default(),
        timestamp: text("timestamp").unwrap_or_default(),
        document_type: text("document_type").unwrap_or_default(),
    })
}

#[async_trait]
impl VectorStore for QdrantBackend {
    async fn health_check(&self) -> Result<bool, StoreError> {
        self.client
            .health_check()
            .await
            .map(|_| true)
            .map_err(|e| StoreError::ConnectionError(e.to_string()))
    }

    async fn upsert(
        &self,
        records: Vec<StoredRecord>,
        namespace: Option<&str>,
    ) -> Result<u64, StoreError> {
        if records.is_empty() {
            return Ok(0);
        }

        let dimension = match self.collection_summary().await? {
            Some(summary) => summary.dimension.unwrap_or(self.embedding_dim),
            None => {
                self.create_collection().await?;
                self.embedding_dim
            }
        };
        check_record_dimensions(&records, dimension)?;

        let namespace = namespace.unwrap_or_default();
        let count = records.len() as u64;
        let points: Vec<PointStruct> = records
            .into_iter()
            .map(|record| {
                let id = Self::point_id(&record.id, namespace);
                let vector = record.values.clone();
                PointStruct::new(id, vector, to_payload(record, namespace))
            })
            .collect();

        let upsert = UpsertPointsBuilder::new(&self.collection, points).wait(true);

        self.client
            .upsert_points(upsert)
            .await
            .map_err(|e| StoreError::UpsertError(e.to_string()))?;

        Ok(count)
    }

    async fn stats(&self) -> Result<IndexStats, StoreError> {
        let summary = self
            .collection_summary()
            .await?
            .ok_or_else(|| StoreError::IndexNotFound(self.collection.clone()))?;

        Ok(IndexStats {
            index_name: self.collection.clone(),
            total_vector_count: summary.points_count,
            dimension: summary.dimension.unwrap_or(self.embedding_dim) as u64,
            namespaces: self.namespace_counts().await?,
        })
    }

    async fn query(
        &self,
        vector: Vec<f32>,
        top_k: u64,
        namespace: Option<&str>,
    ) -> Result<Vec<QueryMatch>, StoreError> {
        let filter = Filter::must([Condition::matches(
            NAMESPACE_FIELD,
            namespace.unwrap_or_default().to_string(),
        )]);

        let search = SearchPointsBuilder::new(&self.collection, vector, top_k)
            .with_payload(true)
            .filter(filter);

        let results = self
            .client
            .search_points(search)
            .await
            .map_err(|e| StoreError::QueryError(e.to_string()))?;

        Ok(results
            .result
            .into_iter()
            .map(|point| QueryMatch {
                id: point
                    .payload
                    .get(RECORD_ID_FIELD)
                    .and_then(string_value)
                    .unwrap_or_default(),
                score: point.score,
                metadata: from_payload(&point.payload),
            })
            .collect())
    }

    async fn dimension(&self) -> Result<usize, StoreError> {
        Ok(self
            .collection_summary()
            .await?
            .and_then(|s| s.dimension)
            .unwrap_or(self.embedding_dim))
    }

    fn index_name(&self) -> &str {
        &self.collection
    }
}
