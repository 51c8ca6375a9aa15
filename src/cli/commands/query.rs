use anyhow::{Context, Result};
use clap::Args;

use super::Services;
use crate::cli::output::get_formatter;
use crate::models::{Config, OutputFormat};
use crate::services::Embedder;
use crate::utils::retry;

#[derive(Debug, Args)]
pub struct QueryArgs {
    #[arg(required = true, help = "Text to search for")]
    pub text: String,

    #[arg(long, short = 'k', default_value_t = 5, help = "Number of matches to return")]
    pub top_k: u64,

    #[arg(
        long,
        short = 'n',
        help = "Namespace to search (defaults to vector_store.namespace)"
    )]
    pub namespace: Option<String>,
}

pub async fn handle_query(
    args: QueryArgs,
    config: &Config,
    format: OutputFormat,
    _verbose: bool,
) -> Result<()> {
    let text = args.text.trim();
    if text.is_empty() {
        anyhow::bail!("query text cannot be empty");
    }
    if args.top_k == 0 {
        anyhow::bail!("top-k must be at least 1");
    }

    let formatter = get_formatter(format);
    let services = Services::connect(config).await?;
    let namespace = args
        .namespace
        .or_else(|| config.vector_store.namespace.clone());

    let vector = retry("embed query", || services.embedder.embed(text))
        .await
        .context("failed to embed query")?;

    let matches = retry("query index", || {
        services
            .store
            .query(vector.clone(), args.top_k, namespace.as_deref())
    })
    .await
    .with_context(|| format!("failed to query '{}'", services.store.index_name()))?;

    print!("{}", formatter.format_query_results(text, &matches));
    Ok(())
}
