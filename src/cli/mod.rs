use clap::{Parser, Subcommand};
use colored::*;
use std::path::PathBuf;

use crate::config::{Config, ConfigError};
use crate::env::{EnvLoader, LoadReport, load_dotenv};
use crate::logger::init_tracing;

mod envcmd;
mod userconfig;

#[derive(Parser, Debug)]
#[command(
    name = "dotagent",
    version,
    about = "Load .env and resolve chat-model settings for an LLM agent",
    long_about = None,
    disable_help_subcommand = true,
)]
pub struct Cli {
    /// Load this env file instead of searching upward for `.env`
    #[arg(long, value_name = "PATH", global = true)]
    pub env_file: Option<PathBuf>,

    /// Let the env file replace variables that are already set
    #[arg(long = "override", global = true)]
    pub override_existing: bool,

    /// Config file (default: discovered config.yaml)
    #[arg(short, long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Debug logging for dotagent
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Command to run (default: env)
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Load the env file and list the keys it set (default)
    Env,
    /// Configuration operations
    Config {
        #[command(subcommand)]
        cmd: userconfig::ConfigCmd,
    },
}

impl Cli {
    /// Populate the process environment. Must run before any thread is spawned.
    pub fn load_env(&self) -> anyhow::Result<LoadReport> {
        if self.env_file.is_none() && !self.override_existing {
            return Ok(load_dotenv()?.clone());
        }
        let mut loader = EnvLoader::new().override_existing(self.override_existing);
        if let Some(path) = &self.env_file {
            loader = loader.path(path);
        }
        Ok(loader.load()?)
    }
}

pub fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let report = cli.load_env();
    let cfg = Config::resolve(cli.config.as_deref());

    // Logging may be configured by the env file, so it starts after loading it.
    let log_cfg = match &cfg {
        Ok(c) => c.log.clone(),
        Err(_) => {
            let mut fallback = Config::default();
            fallback.apply_env_overrides();
            fallback.log
        }
    };
    init_tracing(&log_cfg, cli.verbose);

    let report = report?;
    match &report.path {
        Some(path) => tracing::info!(
            path = %path.display(),
            applied = report.applied.len(),
            skipped = report.skipped.len(),
            invalid = report.invalid_lines.len(),
            "loaded env file"
        ),
        None => tracing::debug!("no env file loaded"),
    }
    if !report.skipped.is_empty() {
        tracing::debug!(keys = ?report.skipped, "kept existing variables");
    }

    dispatch(cli.command.unwrap_or(Command::Env), &report, cfg)
}

/// Only `config` subcommands need a readable config.
fn dispatch(
    command: Command,
    report: &LoadReport,
    cfg: Result<Config, ConfigError>,
) -> anyhow::Result<()> {
    match command {
        Command::Env => {
            if let Err(e) = &cfg {
                tracing::warn!(error = %e, "ignoring unusable config");
            }
            envcmd::print_report(report)
        }
        Command::Config { cmd } => userconfig::config_cmd(&cfg?, cmd),
    }
}

pub(crate) fn heading(text: &str) -> ColoredString {
    text.bold()
}
