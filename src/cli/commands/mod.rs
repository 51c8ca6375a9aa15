mod config;
mod query;
mod run;
mod stats;
mod status;

pub use config::ConfigCommand;
pub use query::QueryArgs;
pub use run::RunArgs;
pub use test::TestArgs;

pub use config::handle_config;
pub use query::handle_query;
pub use run::handle_run;
pub use stats::handle_stats;
pub use status::handle_status;
pub use test::handle_test;

use std::io::IsTerminal;

use anyhow::{Context, Result};

use crate::models::{Config, OutputFormat};
use crate::services::{
    Embedder, EmbeddingClient, Pipeline, TextSplitter, VectorStore, create_backend,
};
use crate::utils::RetryConfig;

/// Clients needed by every command that embeds text.
pub(crate) struct Services {
    pub embedder: EmbeddingClient,
    pub store: Box<dyn VectorStore>,
}

impl Services {
    pub(crate) async fn connect(config: &Config) -> Result<Self> {
        let embedder =
            EmbeddingClient::new(&config.embedding).context("failed to create embedding client")?;
        let store = connect_store(config, embedder.dimension()).await?;
        Ok(Self { embedder, store })
    }

    pub(crate) fn pipeline(&self, config: &Config, format: OutputFormat) -> Result<Pipeline<'_>> {
        let splitter =
            TextSplitter::from_config(&config.splitter).context("invalid splitter settings")?;

        Ok(Pipeline::new(splitter, &self.embedder, self.store.as_ref())
            .with_retry(RetryConfig::from(&config.retry))
            .with_batch_sizes(
                config.embedding.batch_size as usize,
                config.vector_store.upsert_batch_size as usize,
            )
            .with_progress(format == OutputFormat::Text && std::io::stderr().is_terminal()))
    }
}

pub(crate) async fn connect_store(
    config: &Config,
    embedding_dim: usize,
) -> Result<Box<dyn VectorStore>> {
    create_backend(&config.vector_store, embedding_dim)
        .await
        .with_context(|| {
            format!(
                "failed to create {} vector store backend",
                config.vector_store.driver
            )
        })
}
