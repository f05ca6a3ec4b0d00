use crate::output::{OutputFormat, OutputManager};
use anyhow::{bail, Result};
use clap::Args;
use ormbench_engine::EngineConfig;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Configuration action
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(clap::Subcommand, Debug)]
pub enum ConfigAction {
    /// Write a configuration file with default values
    Init {
        /// Output path
        #[arg(short, long, default_value = "ormbench.toml")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Show the effective configuration
    Show,
}

pub async fn execute(args: ConfigArgs, config: &EngineConfig, output: &OutputManager) -> Result<()> {
    match args.action {
        ConfigAction::Init { output: path, force } => {
            if path.exists() && !force {
                bail!("{} already exists, use --force to overwrite", path.display());
            }
            EngineConfig::default().save_to_file(&path)?;
            output.print_success(&format!("Configuration written to {}", path.display()));
        }
        ConfigAction::Show => match output.format() {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(config)?),
            _ => print!("{}", toml::to_string_pretty(config)?),
        },
    }
    Ok(())
}
