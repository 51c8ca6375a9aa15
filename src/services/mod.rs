mod embedding;
mod pipeline;
mod reader;
mod splitter;
mod vector_store;

pub use embedding::{Embedder, EmbeddingClient, check_dimensions};
pub use pipeline::{Pipeline, PreparedDocument};
pub use reader::{DocumentReader, SUPPORTED_EXTENSIONS, extract_paragraphs};
pub use splitter::{Spans, TextSpan, TextSplitter};
pub use vector_store::{
    MemoryStore, PineconeBackend, QdrantBackend, VectorStore, check_record_dimensions,
    create_backend,
};
