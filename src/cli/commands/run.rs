use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use super::Services;
use crate::cli::output::get_formatter;
use crate::models::{Config, OutputFormat};

#[derive(Debug, Args)]
pub struct RunArgs {
    #[arg(required = true, help = "Path to the .docx file to load")]
    pub file: PathBuf,

    #[arg(
        long,
        short = 'n',
        help = "Target namespace (defaults to vector_store.namespace)"
    )]
    pub namespace: Option<String>,
}

pub async fn handle_run(
    args: RunArgs,
    config: &Config,
    format: OutputFormat,
    _verbose: bool,
) -> Result<()> {
    let formatter = get_formatter(format);
    let services = Services::connect(config).await?;
    let pipeline = services.pipeline(config, format)?;

    let namespace = args
        .namespace
        .or_else(|| config.vector_store.namespace.clone());

    let report = pipeline.run(&args.file, namespace.as_deref()).await?;

    print!("{}", formatter.format_run_report(&report));
    Ok(())
}
