//! Records exchanged with the vector store, and the summaries it reports back.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::chunk::Chunk;

pub const DOCUMENT_TYPE: &str = "word_document";

/// Metadata stored next to each vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordMetadata {
    pub text: String,
    pub source: String,
    pub file_path: String,
    pub chunk_index: u64,
    pub chunk_length: u64,
    #[serde(default)]
    pub start_offset: u64,
    #[serde(default)]
    pub end_offset: u64,
    pub timestamp: String,
    #[serde(default = "default_document_type")]
    pub document_type: String,
}

fn default_document_type() -> String {
    DOCUMENT_TYPE.to_string()
}

impl RecordMetadata {
    pub fn for_chunk(chunk: &Chunk, source: &Path, timestamp: &str) -> Self {
        Self {
            text: chunk.text.clone(),
            source: source
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
            file_path: source.to_string_lossy().to_string(),
            chunk_index: chunk.index as u64,
            chunk_length: chunk.char_len() as u64,
            start_offset: chunk.start as u64,
            end_offset: chunk.end as u64,
            timestamp: timestamp.to_string(),
            document_type: default_document_type(),
        }
    }
}

/// An (id, vector, metadata) triple ready to upsert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: RecordMetadata,
}

impl StoredRecord {
    pub fn new(chunk: &Chunk, values: Vec<f32>, source: &Path, timestamp: &str) -> Self {
        Self {
            id: chunk.id.clone(),
            values,
            metadata: RecordMetadata::for_chunk(chunk, source, timestamp),
        }
    }

    pub fn dimension(&self) -> usize {
        self.values.len()
    }
}

/// Summary counts reported by an index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexStats {
    pub index_name: String,
    pub total_vector_count: u64,
    pub dimension: u64,
    /// Per-namespace vector counts; the default namespace is `""`.
    #[serde(default)]
    pub namespaces: BTreeMap<String, u64>,
}

/// One similarity-search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryMatch {
    pub id: String,
    pub score: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<RecordMetadata>,
}

/// Outcome of one pipeline run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunReport {
    pub file: String,
    pub index_name: String,
    pub namespace: Option<String>,
    pub characters: u64,
    pub chunks: u64,
    pub vectors_upserted: u64,
    pub dimension: u64,
    pub vector_ids: Vec<String>,
    pub persisted: bool,
    pub duration_ms: u64,
}
