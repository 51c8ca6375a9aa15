mod chunk;
mod config;
mod output;
mod record;

pub use chunk::Chunk;
pub use config::{
    CONFIG_PATH_ENV, Config, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE, DEFAULT_EMBEDDING_DIMENSION,
    DEFAULT_EMBEDDING_MODEL, DEFAULT_INDEX_NAME, DEFAULT_TEST_NAMESPACE, EmbeddingConfig,
    LoggingConfig, OutputConfig, RetrySettings, SplitterConfig, VectorDriver, VectorStoreConfig,
};
pub use output::OutputFormat;
pub use record::{DOCUMENT_TYPE, IndexStats, QueryMatch, RecordMetadata, RunReport, StoredRecord};
