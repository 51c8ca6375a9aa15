use anyhow::Result;

use super::connect_store;
use crate::cli::output::{StatusInfo, get_formatter};
use crate::models::{Config, OutputFormat};
use crate::services::EmbeddingClient;

pub async fn handle_status(config: &Config, format: OutputFormat, _verbose: bool) -> Result<()> {
    let formatter = get_formatter(format);

    let embedding_result = match EmbeddingClient::new(&config.embedding) {
        Ok(client) => client.health_check().await,
        Err(e) => Err(e),
    };

    let (vector_store_connected, stats, vector_store_error) =
        match connect_store(config, config.embedding.dimension as usize).await {
            Ok(store) => match store.stats().await {
                Ok(stats) => (true, Some(stats), None),
                Err(e) => (false, None, Some(e.to_string())),
            },
            Err(e) => (false, None, Some(format!("{e:#}"))),
        };

    let status = StatusInfo {
        embedding_model: config.embedding.model.clone(),
        embedding_dimension: config.embedding.dimension,
        embedding_url: config.embedding.base_url.clone(),
        embedding_connected: embedding_result.is_ok(),
        embedding_error: embedding_result.err().map(|e| e.to_string()),
        vector_store_driver: config.vector_store.driver.to_string(),
        index_name: config.vector_store.index_name.clone(),
        vector_store_connected,
        vector_store_error,
        vector_count: stats.as_ref().map(|s| s.total_vector_count),
        index_dimension: stats.as_ref().map(|s| s.dimension),
    };

    print!("{}", formatter.format_status(&status));

    if !status.embedding_connected || !status.vector_store_connected {
        anyhow::bail!("connection test failed; check API keys and configuration");
    }

    if let Some(dim) = status.index_dimension
        && dim != u64::from(config.embedding.dimension)
    {
        eprintln!(
            "Warning: index '{}' has {} dimensions but embeddings are configured for {}",
            status.index_name, dim, config.embedding.dimension
        );
    }

    Ok(())
}
