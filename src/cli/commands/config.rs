use anyhow::{Context, Result};
use clap::Subcommand;
use std::path::{Path, PathBuf};

use crate::cli::output::get_formatter;
use crate::models::{Config, OutputFormat};

const MASKED: &str = "********";

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    #[command(about = "Write a config file with default values")]
    Init {
        #[arg(long, short = 'y', help = "Force overwrite existing config")]
        force: bool,
    },
    #[command(about = "Show the effective configuration")]
    Show,
    #[command(about = "Show the configuration file path")]
    Path,
}

/// `explicit_path` is the global `--config` flag; `config` is what was
/// loaded from it (or from the default location).
pub fn handle_config(
    cmd: ConfigCommand,
    config: &Config,
    explicit_path: Option<&Path>,
    format: OutputFormat,
) -> Result<()> {
    match cmd {
        ConfigCommand::Init { force } => handle_init(explicit_path, force, format),
        ConfigCommand::Show => handle_show(config, format),
        ConfigCommand::Path => handle_path(explicit_path),
    }
}

fn target_path(explicit_path: Option<&Path>) -> Result<PathBuf> {
    explicit_path
        .map(Path::to_path_buf)
        .or_else(Config::config_path)
        .ok_or_else(|| anyhow::anyhow!("could not determine config directory"))
}

fn handle_init(explicit_path: Option<&Path>, force: bool, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);
    let path = target_path(explicit_path)?;

    if path.exists() && !force {
        anyhow::bail!(
            "Config already exists at: {}\nUse --force to overwrite.",
            path.display()
        );
    }

    Config::default()
        .save_to(&path)
        .context("failed to create config")?;
    print!(
        "{}",
        formatter.format_message(&format!("Created config at: {}", path.display()))
    );
    Ok(())
}

fn handle_show(config: &Config, format: OutputFormat) -> Result<()> {
    let mut shown = config.clone();
    if shown.embedding.api_token.is_some() {
        shown.embedding.api_token = Some(MASKED.to_string());
    }

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&shown)?);
    } else {
        print!(
            "{}",
            toml::to_string_pretty(&shown).context("failed to render config")?
        );
    }
    Ok(())
}

fn handle_path(explicit_path: Option<&Path>) -> Result<()> {
    let path = target_path(explicit_path)?;
    let state = if path.exists() { "active" } else { "would be" };
    println!("Config file ({}): {}", state, path.display());

    if let Ok(cwd) = std::env::current_dir() {
        let env_path = cwd.join(".env");
        let state = if env_path.exists() { "active" } else { "would be" };
        println!(".env file ({}): {}", state, env_path.display());
    }
    Ok(())
}
