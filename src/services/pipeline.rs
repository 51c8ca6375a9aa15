//! Document ingestion: read, split, embed, upsert.

use std::path::Path;
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};

use crate::error::{EmbeddingError, PipelineError};
use crate::models::{Chunk, RunReport, StoredRecord};
use crate::services::embedding::{Embedder, check_dimensions};
use crate::services::reader::DocumentReader;
use crate::services::splitter::TextSplitter;
use crate::services::vector_store::{MemoryStore, VectorStore};
use crate::utils::{RetryConfig, with_retry};

const DEFAULT_EMBED_BATCH: usize = 64;
const DEFAULT_UPSERT_BATCH: usize = 100;

/// Text and chunks of a document that has been read and split.
#[derive(Debug, Clone)]
pub struct PreparedDocument {
    pub text: String,
    pub chunks: Vec<Chunk>,
}

impl PreparedDocument {
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

/// Runs one document through every stage, stopping at the first failure.
pub struct Pipeline<'a> {
    reader: DocumentReader,
    splitter: TextSplitter,
    embedder: &'a dyn Embedder,
    store: &'a dyn VectorStore,
    retry: RetryConfig,
    embed_batch_size: usize,
    upsert_batch_size: usize,
    show_progress: bool,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        splitter: TextSplitter,
        embedder: &'a dyn Embedder,
        store: &'a dyn VectorStore,
    ) -> Self {
        Self {
            reader: DocumentReader::new(),
            splitter,
            embedder,
            store,
            retry: RetryConfig::default(),
            embed_batch_size: DEFAULT_EMBED_BATCH,
            upsert_batch_size: DEFAULT_UPSERT_BATCH,
            show_progress: false,
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_batch_sizes(mut self, embed: usize, upsert: usize) -> Self {
        self.embed_batch_size = embed.max(1);
        self.upsert_batch_size = upsert.max(1);
        self
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Read and split a document without touching any remote service.
    pub fn prepare(&self, path: &Path) -> Result<PreparedDocument, PipelineError> {
        let text = self.reader.read(path)?;
        let chunks = self.splitter.split_document(path, &text)?;

        tracing::info!(
            "split {} ({} chars) into {} chunks (size {}, overlap {})",
            path.display(),
            text.chars().count(),
            chunks.len(),
            self.splitter.chunk_size(),
            self.splitter.overlap()
        );

        Ok(PreparedDocument { text, chunks })
    }

    /// Process a document end to end and upsert into the configured index.
    pub async fn run(
        &self,
        path: &Path,
        namespace: Option<&str>,
    ) -> Result<RunReport, PipelineError> {
        let start = Instant::now();
        let prepared = self.prepare(path)?;
        self.run_prepared(path, &prepared, namespace, start).await
    }

    /// Embed and upsert a document that has already been read and split.
    pub async fn run_prepared(
        &self,
        path: &Path,
        prepared: &PreparedDocument,
        namespace: Option<&str>,
        start: Instant,
    ) -> Result<RunReport, PipelineError> {
        let vectors = self.embed_chunks(&prepared.chunks).await?;
        let records = build_records(&prepared.chunks, vectors, path);

        let upserted = self.upsert_records(self.store, records, namespace).await?;
        tracing::info!(
            "upserted {} vectors into '{}'",
            upserted,
            self.store.index_name()
        );

        Ok(self.report(path, prepared, upserted, namespace, true, start))
    }

    /// Embed a document and load it into a scratch in-memory index sized like
    /// the real one. Nothing is written remotely.
    pub async fn dry_run(&self, path: &Path) -> Result<RunReport, PipelineError> {
        let start = Instant::now();
        let prepared = self.prepare(path)?;
        self.dry_run_prepared(path, &prepared, start).await
    }

    pub async fn dry_run_prepared(
        &self,
        path: &Path,
        prepared: &PreparedDocument,
        start: Instant,
    ) -> Result<RunReport, PipelineError> {
        let vectors = self.embed_chunks(&prepared.chunks).await?;
        let records = build_records(&prepared.chunks, vectors, path);

        let last = prepared.chunks.len().saturating_sub(1);
        let dimension = self
            .store
            .dimension()
            .await
            .map_err(|source| PipelineError::Upsert {
                first: 0,
                last,
                source,
            })?;
        let scratch = MemoryStore::new(self.store.index_name(), dimension);

        let upserted = self.upsert_records(&scratch, records, None).await?;
        tracing::info!("dry run validated {} vectors", upserted);

        Ok(self.report(path, prepared, upserted, None, false, start))
    }

    async fn embed_chunks(&self, chunks: &[Chunk]) -> Result<Vec<Vec<f32>>, PipelineError> {
        let progress = self.progress_bar(chunks.len() as u64);
        let dimension = self.embedder.dimension();
        let mut vectors = Vec::with_capacity(chunks.len());

        for (batch_no, batch) in chunks.chunks(self.embed_batch_size).enumerate() {
            let first = batch_no * self.embed_batch_size;
            let last = first + batch.len() - 1;
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();

            let label = format!("embed chunks {first}..={last}");
            let embedded = with_retry(&self.retry, &label, || self.embedder.embed_batch(&texts))
                .await
                .into_result()
                .and_then(|batch_vectors| {
                    if batch_vectors.len() != texts.len() {
                        return Err(EmbeddingError::InvalidResponse(format!(
                            "received {} embeddings for {} inputs",
                            batch_vectors.len(),
                            texts.len()
                        )));
                    }
                    check_dimensions(batch_vectors, dimension)
                })
                .map_err(|source| {
                    progress.abandon();
                    PipelineError::Embed {
                        first,
                        last,
                        source,
                    }
                })?;

            tracing::debug!("embedded chunks {}..={}", first, last);
            progress.inc(batch.len() as u64);
            vectors.extend(embedded);
        }

        progress.finish_and_clear();
        Ok(vectors)
    }

    async fn upsert_records(
        &self,
        store: &dyn VectorStore,
        records: Vec<StoredRecord>,
        namespace: Option<&str>,
    ) -> Result<u64, PipelineError> {
        let mut upserted = 0;

        for (batch_no, batch) in records.chunks(self.upsert_batch_size).enumerate() {
            let first = batch_no * self.upsert_batch_size;
            let last = first + batch.len() - 1;

            let label = format!("upsert chunks {first}..={last}");
            upserted += with_retry(&self.retry, &label, || store.upsert(batch.to_vec(), namespace))
                .await
                .into_result()
                .map_err(|source| PipelineError::Upsert {
                    first,
                    last,
                    source,
                })?;
        }

        Ok(upserted)
    }

    fn progress_bar(&self, len: u64) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new(len);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");
        pb.set_style(style);
        pb
    }

    fn report(
        &self,
        path: &Path,
        prepared: &PreparedDocument,
        upserted: u64,
        namespace: Option<&str>,
        persisted: bool,
        start: Instant,
    ) -> RunReport {
        RunReport {
            file: path.display().to_string(),
            index_name: self.store.index_name().to_string(),
            namespace: namespace.map(str::to_string),
            characters: prepared.char_count() as u64,
            chunks: prepared.chunks.len() as u64,
            vectors_upserted: upserted,
            dimension: self.embedder.dimension() as u64,
            vector_ids: prepared.chunks.iter().map(|c| c.id.clone()).collect(),
            persisted,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }
}

/// Pair chunks with their vectors; every record of a run shares one timestamp.
fn build_records(chunks: &[Chunk], vectors: Vec<Vec<f32>>, source: &Path) -> Vec<StoredRecord> {
    let timestamp = chrono::Utc::now().to_rfc3339();
    chunks
        .iter()
        .zip(vectors)
        .map(|(chunk, values)| StoredRecord::new(chunk, values, source, &timestamp))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Stage, StoreError};
    use crate::services::reader::tests::{body, para, write_docx};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;

    /// Deterministic embedder: vector component `i` is `len(text) + i`.
    struct FakeEmbedder {
        dimension: usize,
        returned_dimension: usize,
        failures_before_success: usize,
        calls: AtomicUsize,
        largest_batch: AtomicUsize,
    }

    impl FakeEmbedder {
        fn new(dimension: usize) -> Self {
            Self {
                dimension,
                returned_dimension: dimension,
                failures_before_success: 0,
                calls: AtomicUsize::new(0),
                largest_batch: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Embedder for FakeEmbedder {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            self.largest_batch.fetch_max(texts.len(), Ordering::SeqCst);
            if call < self.failures_before_success {
                return Err(EmbeddingError::RateLimited("slow down".to_string()));
            }
            Ok(texts
                .iter()
                .map(|t| {
                    (0..self.returned_dimension)
                        .map(|i| (t.len() + i) as f32)
                        .collect()
                })
                .collect())
        }

        fn model(&self) -> &str {
            "fake"
        }

        fn dimension(&self) -> usize {
            self.dimension
        }
    }

    fn fast_retry() -> RetryConfig {
        RetryConfig::new(3).with_initial_delay(Duration::from_millis(1))
    }

    fn docx_with(dir: &TempDir, name: &str, paragraphs: &[&str]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let inner: String = paragraphs.iter().map(|p| para(p)).collect();
        write_docx(&path, &body(&inner));
        path
    }

    fn splitter() -> TextSplitter {
        TextSplitter::new(4, 1).unwrap()
    }

    #[test]
    fn test_prepare_reads_and_splits() {
        let dir = TempDir::new().unwrap();
        let path = docx_with(&dir, "letters.docx", &["ABCDEFGHIJ"]);
        let embedder = FakeEmbedder::new(3);
        let store = MemoryStore::new("idx", 3);

        let pipeline = Pipeline::new(splitter(), &embedder, &store);
        let prepared = pipeline.prepare(&path).unwrap();

        assert_eq!(prepared.char_count(), 10);
        let texts: Vec<&str> = prepared.chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["ABCD", "DEFG", "GHIJ"]);
        assert_eq!(prepared.chunks[2].id, "letters_chunk_2");
    }

    #[tokio::test]
    async fn test_run_upserts_every_chunk() {
        let dir = TempDir::new().unwrap();
        let path = docx_with(&dir, "letters.docx", &["ABCDEFGHIJ"]);
        let embedder = FakeEmbedder::new(3);
        let store = MemoryStore::new("idx", 3);

        let pipeline = Pipeline::new(splitter(), &embedder, &store).with_batch_sizes(2, 2);
        let report = pipeline.run(&path, None).await.unwrap();

        assert_eq!(report.chunks, 3);
        assert_eq!(report.vectors_upserted, 3);
        assert_eq!(report.characters, 10);
        assert_eq!(report.index_name, "idx");
        assert!(report.persisted);
        assert_eq!(store.stats().await.unwrap().total_vector_count, 3);

        let first = store.get("letters_chunk_0", None).unwrap();
        let second = store.get("letters_chunk_1", None).unwrap();
        assert_eq!(first.metadata.text, "ABCD");
        assert_eq!(first.metadata.source, "letters.docx");
        assert_eq!(first.metadata.timestamp, second.metadata.timestamp);
    }

    #[tokio::test]
    async fn test_batch_size_sets_request_size() {
        let dir = TempDir::new().unwrap();
        let path = docx_with(&dir, "letters.docx", &["ABCDEFGHIJ"]);

        let embedder = FakeEmbedder::new(3);
        let store = MemoryStore::new("idx", 3);
        Pipeline::new(splitter(), &embedder, &store)
            .with_batch_sizes(2, 2)
            .run(&path, None)
            .await
            .unwrap();
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 2);
        assert_eq!(embedder.largest_batch.load(Ordering::SeqCst), 2);

        let embedder = FakeEmbedder::new(3);
        let store = MemoryStore::new("idx", 3);
        Pipeline::new(splitter(), &embedder, &store)
            .run(&path, None)
            .await
            .unwrap();
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);
        assert_eq!(embedder.largest_batch.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_rerun_overwrites_instead_of_duplicating() {
        let dir = TempDir::new().unwrap();
        let path = docx_with(&dir, "letters.docx", &["ABCDEFGHIJ"]);
        let embedder = FakeEmbedder::new(3);
        let store = MemoryStore::new("idx", 3);
        let pipeline = Pipeline::new(splitter(), &embedder, &store);

        pipeline.run(&path, Some("docs")).await.unwrap();
        pipeline.run(&path, Some("docs")).await.unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total_vector_count, 3);
        assert_eq!(stats.namespaces.get("docs"), Some(&3));
    }

    #[tokio::test]
    async fn test_embedding_dimension_mismatch_names_stage() {
        let dir = TempDir::new().unwrap();
        let path = docx_with(&dir, "letters.docx", &["ABCDEFGHIJ"]);
        let embedder = FakeEmbedder {
            returned_dimension: 2,
            ..FakeEmbedder::new(3)
        };
        let store = MemoryStore::new("idx", 3);

        let err = Pipeline::new(splitter(), &embedder, &store)
            .run(&path, None)
            .await
            .unwrap_err();

        assert_eq!(err.stage(), Stage::Embed);
        assert!(matches!(
            err,
            PipelineError::Embed {
                first: 0,
                last: 2,
                source: EmbeddingError::DimensionMismatch { .. }
            }
        ));
        assert_eq!(store.stats().await.unwrap().total_vector_count, 0);
    }

    #[tokio::test]
    async fn test_index_dimension_mismatch_fails_upsert() {
        let dir = TempDir::new().unwrap();
        let path = docx_with(&dir, "letters.docx", &["ABCDEFGHIJ"]);
        let embedder = FakeEmbedder::new(1536);
        let store = MemoryStore::new("idx", 512);

        let err = Pipeline::new(splitter(), &embedder, &store)
            .run(&path, None)
            .await
            .unwrap_err();

        assert_eq!(err.stage(), Stage::Upsert);
        assert!(matches!(
            err,
            PipelineError::Upsert {
                source: StoreError::DimensionMismatch {
                    expected: 512,
                    actual: 1536,
                    ..
                },
                ..
            }
        ));
        assert!(err.to_string().contains("upsert stage failed"));
    }

    #[tokio::test]
    async fn test_rate_limited_batches_are_retried() {
        let dir = TempDir::new().unwrap();
        let path = docx_with(&dir, "letters.docx", &["ABCDEFGHIJ"]);
        let embedder = FakeEmbedder {
            failures_before_success: 2,
            ..FakeEmbedder::new(3)
        };
        let store = MemoryStore::new("idx", 3);

        let report = Pipeline::new(splitter(), &embedder, &store)
            .with_retry(fast_retry())
            .run(&path, None)
            .await
            .unwrap();

        assert_eq!(report.vectors_upserted, 3);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retries_can_be_disabled() {
        let dir = TempDir::new().unwrap();
        let path = docx_with(&dir, "letters.docx", &["ABCDEFGHIJ"]);
        let embedder = FakeEmbedder {
            failures_before_success: 1,
            ..FakeEmbedder::new(3)
        };
        let store = MemoryStore::new("idx", 3);

        let err = Pipeline::new(splitter(), &embedder, &store)
            .with_retry(RetryConfig::none())
            .run(&path, None)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PipelineError::Embed {
                source: EmbeddingError::RateLimited(_),
                ..
            }
        ));
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_dry_run_leaves_index_untouched() {
        let dir = TempDir::new().unwrap();
        let path = docx_with(&dir, "letters.docx", &["ABCDEFGHIJ"]);
        let embedder = FakeEmbedder::new(3);
        let store = MemoryStore::new("idx", 3);

        let report = Pipeline::new(splitter(), &embedder, &store)
            .dry_run(&path)
            .await
            .unwrap();

        assert!(!report.persisted);
        assert_eq!(report.vectors_upserted, 3);
        assert_eq!(
            report.vector_ids,
            vec!["letters_chunk_0", "letters_chunk_1", "letters_chunk_2"]
        );
        assert_eq!(store.stats().await.unwrap().total_vector_count, 0);
    }

    #[tokio::test]
    async fn test_dry_run_checks_index_dimension() {
        let dir = TempDir::new().unwrap();
        let path = docx_with(&dir, "letters.docx", &["ABCDEFGHIJ"]);
        let embedder = FakeEmbedder::new(1536);
        let store = MemoryStore::new("idx", 512);

        let err = Pipeline::new(splitter(), &embedder, &store)
            .dry_run(&path)
            .await
            .unwrap_err();
        assert_eq!(err.stage(), Stage::Upsert);
    }

    #[tokio::test]
    async fn test_prepared_document_is_not_read_again() {
        let dir = TempDir::new().unwrap();
        let path = docx_with(&dir, "letters.docx", &["ABCDEFGHIJ"]);
        let embedder = FakeEmbedder::new(3);
        let store = MemoryStore::new("idx", 3);
        let pipeline = Pipeline::new(splitter(), &embedder, &store);

        let prepared = pipeline.prepare(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        let dry = pipeline
            .dry_run_prepared(&path, &prepared, Instant::now())
            .await
            .unwrap();
        assert_eq!(dry.chunks, 3);

        let report = pipeline
            .run_prepared(&path, &prepared, Some("test"), Instant::now())
            .await
            .unwrap();
        assert_eq!(report.vectors_upserted, 3);
        assert_eq!(store.stats().await.unwrap().namespaces.get("test"), Some(&3));
    }

    #[tokio::test]
    async fn test_missing_file_is_read_stage() {
        let embedder = FakeEmbedder::new(3);
        let store = MemoryStore::new("idx", 3);

        let err = Pipeline::new(splitter(), &embedder, &store)
            .run(Path::new("/nonexistent/manual.docx"), None)
            .await
            .unwrap_err();

        assert_eq!(err.stage(), Stage::Read);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }
}
