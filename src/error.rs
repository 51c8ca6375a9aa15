//! Error types for the document loader.

use std::path::PathBuf;

use thiserror::Error;

use crate::utils::retry::Retryable;

/// Errors raised while opening and parsing the input document.
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("document not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("unsupported document format '{extension}' (expected .docx): {}", .path.display())]
    UnsupportedFormat { path: PathBuf, extension: String },

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid document {}: {reason}", .path.display())]
    InvalidDocument { path: PathBuf, reason: String },

    #[error("no text content found in document: {}", .0.display())]
    Empty(PathBuf),
}

/// Errors related to splitter configuration and input.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SplitError {
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,

    #[error("chunk overlap ({overlap}) must be smaller than chunk size ({size})")]
    OverlapTooLarge { size: usize, overlap: usize },

    #[error("document text cannot be empty")]
    EmptyText,
}

/// Errors related to embedding operations.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding API key is not configured (set OPENAI_API_KEY)")]
    MissingApiKey,

    #[error("embedding API rejected credentials: {0}")]
    Unauthorized(String),

    #[error("embedding API rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("embedding server error (status {status}): {detail}")]
    ServerError { status: u16, detail: String },

    #[error("embedding request rejected (status {status}): {detail}")]
    ClientError { status: u16, detail: String },

    #[error("embedding request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),

    #[error("embedding {index} has {actual} dimensions, expected {expected}")]
    DimensionMismatch {
        index: usize,
        expected: usize,
        actual: usize,
    },

    #[error("embedding timeout")]
    Timeout,
}

impl Retryable for EmbeddingError {
    fn is_retryable(&self) -> bool {
        match self {
            EmbeddingError::RateLimited(_) | EmbeddingError::Timeout => true,
            EmbeddingError::ServerError { status, .. } => *status >= 500,
            EmbeddingError::RequestError(e) => e.is_timeout() || e.is_connect(),
            EmbeddingError::MissingApiKey
            | EmbeddingError::Unauthorized(_)
            | EmbeddingError::ClientError { .. }
            | EmbeddingError::InvalidResponse(_)
            | EmbeddingError::DimensionMismatch { .. } => false,
        }
    }
}

/// Errors related to vector store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("vector store API key is not configured (set PINECONE_API_KEY)")]
    MissingApiKey,

    #[error("failed to connect to vector store: {0}")]
    ConnectionError(String),

    #[error("vector store rejected credentials: {0}")]
    Unauthorized(String),

    #[error("index not found: {0}")]
    IndexNotFound(String),

    #[error("vector '{id}' has {actual} dimensions but the index expects {expected}")]
    DimensionMismatch {
        id: String,
        expected: usize,
        actual: usize,
    },

    #[error("vector store rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("vector store server error (status {status}): {detail}")]
    ServerError { status: u16, detail: String },

    #[error("vector store rejected request (status {status}): {detail}")]
    InvalidRequest { status: u16, detail: String },

    #[error("upsert error: {0}")]
    UpsertError(String),

    #[error("query error: {0}")]
    QueryError(String),

    #[error("invalid vector store response: {0}")]
    InvalidResponse(String),

    #[error("vector store client error: {0}")]
    ClientError(String),
}

impl Retryable for StoreError {
    fn is_retryable(&self) -> bool {
        match self {
            StoreError::ConnectionError(_) | StoreError::RateLimited(_) => true,
            StoreError::ServerError { status, .. } => *status >= 500,
            StoreError::UpsertError(msg)
            | StoreError::QueryError(msg)
            | StoreError::ClientError(msg) => {
                let msg_lower = msg.to_lowercase();
                msg_lower.contains("timeout")
                    || msg_lower.contains("connection")
                    || msg_lower.contains("unavailable")
            }
            StoreError::MissingApiKey
            | StoreError::Unauthorized(_)
            | StoreError::IndexNotFound(_)
            | StoreError::DimensionMismatch { .. }
            | StoreError::InvalidRequest { .. }
            | StoreError::InvalidResponse(_) => false,
        }
    }
}

/// Pipeline stage names, as reported in failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Read,
    Split,
    Embed,
    Upsert,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Read => write!(f, "read"),
            Stage::Split => write!(f, "split"),
            Stage::Embed => write!(f, "embed"),
            Stage::Upsert => write!(f, "upsert"),
        }
    }
}

/// A failed run, tagged with the stage and chunks that were being processed.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("read stage failed: {0}")]
    Read(#[from] ReadError),

    #[error("split stage failed: {0}")]
    Split(#[from] SplitError),

    #[error("embed stage failed on chunks {first}..={last}: {source}")]
    Embed {
        first: usize,
        last: usize,
        #[source]
        source: EmbeddingError,
    },

    #[error("upsert stage failed on chunks {first}..={last}: {source}")]
    Upsert {
        first: usize,
        last: usize,
        #[source]
        source: StoreError,
    },
}

impl PipelineError {
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::Read(_) => Stage::Read,
            PipelineError::Split(_) => Stage::Split,
            PipelineError::Embed { .. } => Stage::Embed,
            PipelineError::Upsert { .. } => Stage::Upsert,
        }
    }
}

/// Errors related to configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParseError(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),

    #[error("path error: {0}")]
    PathError(String),

    #[error("validation error: {0}")]
    ValidationError(String),
}

/// Application-level errors that wrap domain errors.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("vector store error: {0}")]
    Store(#[from] StoreError),

    #[error("{0}")]
    Other(String),
}
