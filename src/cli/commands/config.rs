use std::path::Path;

use anyhow::{Context, Result};
use clap::Subcommand;

use crate::cli::output::get_formatter;
use crate::models::{CONFIG_PATH_ENV, Config, OutputFormat};

const MASK: &str = "********";

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    #[command(about = "Initialize configuration file")]
    Init {
        #[arg(long, help = "Force overwrite existing config")]
        force: bool,
    },
    #[command(about = "Show current configuration (API keys masked)")]
    Show,
    #[command(about = "Show configuration file path")]
    Path,
}

pub async fn handle_config(
    cmd: ConfigCommand,
    explicit_path: Option<&Path>,
    format: OutputFormat,
) -> Result<()> {
    match cmd {
        ConfigCommand::Init { force } => handle_init(explicit_path, force, format),
        ConfigCommand::Show => handle_show(explicit_path, format),
        ConfigCommand::Path => handle_path(explicit_path),
    }
}

fn handle_init(explicit_path: Option<&Path>, force: bool, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);
    let path = Config::resolve_path(explicit_path)?;

    if path.exists() && !force {
        anyhow::bail!(
            "Config already exists at: {}\nUse --force to overwrite.",
            path.display()
        );
    }

    Config::default()
        .save(&path)
        .with_context(|| format!("failed to write config to {}", path.display()))?;

    println!(
        "{}",
        formatter.format_message(&format!("Created config at: {}", path.display()))
    );
    Ok(())
}

/// Copy of `config` that is safe to print.
fn masked(config: &Config) -> Config {
    let mut config = config.clone();
    if config.embedding.api_key.is_some() {
        config.embedding.api_key = Some(MASK.to_string());
    }
    if config.vector_store.api_key.is_some() {
        config.vector_store.api_key = Some(MASK.to_string());
    }
    config
}

fn handle_show(explicit_path: Option<&Path>, format: OutputFormat) -> Result<()> {
    let config = masked(&Config::load(explicit_path)?);

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    if let Ok(path) = Config::resolve_path(explicit_path) {
        let state = if path.exists() { "" } else { " (not found, using defaults)" };
        println!("# Config file: {}{}", path.display(), state);
    }
    println!("# Environment overrides applied");
    println!();
    print!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

fn handle_path(explicit_path: Option<&Path>) -> Result<()> {
    let path = Config::resolve_path(explicit_path)?;
    let state = if path.exists() { "active" } else { "would be" };

    println!("Config file ({}): {}", state, path.display());
    if explicit_path.is_none()
        && let Ok(value) = std::env::var(CONFIG_PATH_ENV)
        && !value.trim().is_empty()
    {
        println!("  (set by {})", CONFIG_PATH_ENV);
    }

    if let Ok(cwd) = std::env::current_dir() {
        let env_path = cwd.join(".env");
        let state = if env_path.exists() { "active" } else { "would be" };
        println!(".env file ({}): {}", state, env_path.display());
    }

    Ok(())
}
