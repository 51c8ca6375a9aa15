//! Command-line interface for the document loader.

pub mod commands;
pub mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::models::OutputFormat;

/// Load Word documents into a vector index as overlapping embedded chunks.
#[derive(Debug, Parser)]
#[command(name = "docload")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[arg(long, short = 'f', global = true, help = "Output format: text or json")]
    pub format: Option<OutputFormat>,

    #[arg(long, short = 'v', global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(
        long,
        short = 'c',
        global = true,
        env = "DOCLOAD_CONFIG",
        help = "Path to the config file"
    )]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Read, split, embed and upsert one document
    Run(commands::RunArgs),

    /// Show index statistics
    Stats,

    /// Try a document without touching the live namespace
    Test(commands::TestArgs),

    /// Embed a text and show the nearest stored chunks
    Query(commands::QueryArgs),

    /// Check the embedding API and vector store connections
    Status,

    /// Manage configuration
    #[command(subcommand)]
    Config(commands::ConfigCommand),
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_with_globals() {
        let cli = Cli::try_parse_from([
            "docload",
            "run",
            "handbook.docx",
            "--namespace",
            "hr",
            "--format",
            "json",
            "-v",
        ])
        .unwrap();

        assert_eq!(cli.format, Some(OutputFormat::Json));
        assert!(cli.verbose);
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.file, PathBuf::from("handbook.docx"));
                assert_eq!(args.namespace.as_deref(), Some("hr"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_test_and_query() {
        let cli = Cli::try_parse_from(["docload", "test", "a.docx", "--persist"]).unwrap();
        assert!(matches!(cli.command, Commands::Test(ref a) if a.persist));

        let cli = Cli::try_parse_from(["docload", "query", "leave policy", "-k", "3"]).unwrap();
        assert!(matches!(cli.command, Commands::Query(ref a) if a.top_k == 3));

        assert!(Cli::try_parse_from(["docload", "run"]).is_err());
    }
}
