use anyhow::{Context, Result};

use super::connect_store;
use crate::cli::output::get_formatter;
use crate::models::{Config, OutputFormat};

pub async fn handle_stats(config: &Config, format: OutputFormat, _verbose: bool) -> Result<()> {
    let formatter = get_formatter(format);
    let store = connect_store(config, config.embedding.dimension as usize).await?;

    let stats = store
        .stats()
        .await
        .with_context(|| format!("failed to read statistics for '{}'", store.index_name()))?;

    print!("{}", formatter.format_stats(&stats));
    Ok(())
}
