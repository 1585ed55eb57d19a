use super::heading;
use crate::config::{CONFIG_TEMPLATE, Config};
use anyhow::Context;
use clap::Subcommand;
use colored::*;
use std::path::{Path, PathBuf};

#[derive(Subcommand, Debug, PartialEq)]
pub enum ConfigCmd {
    /// Print the resolved config (API key masked)
    Show,
    /// Validate the resolved config
    Check,
    /// Write a starter config.yaml into the user config directory
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

pub fn write_template(dir: &Path, force: bool) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let dst = dir.join("config.yaml");
    if dst.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", dst.display());
    }
    std::fs::write(&dst, CONFIG_TEMPLATE).with_context(|| format!("writing {}", dst.display()))?;
    Ok(dst)
}

pub fn config_cmd(cfg: &Config, cmd: ConfigCmd) -> anyhow::Result<()> {
    match cmd {
        ConfigCmd::Show => {
            let yaml = serde_yaml::to_string(&cfg.redacted())?;
            print!("{}", yaml);
        }
        ConfigCmd::Check => {
            cfg.validate()?;
            println!(
                "{} provider={} model={}",
                "OK".green().bold(),
                cfg.llm.provider,
                cfg.llm.model
            );
        }
        ConfigCmd::Init { force } => {
            let dst = write_template(&Config::user_config_dir(), force)?;
            println!("{} {}", heading("Wrote"), dst.display());
            println!(
                "{}",
                "Set OPENAI_API_KEY in .env or edit api_key in the file.".yellow()
            );
        }
    }
    Ok(())
}
