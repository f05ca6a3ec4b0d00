use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use tracing::{debug, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

mod commands;
mod output;

use commands::*;
use ormbench_engine::EngineConfig;
use output::{OutputFormat, OutputManager};

const DEFAULT_CONFIG_FILE: &str = "ormbench.toml";

#[derive(Parser)]
#[command(name = "ormbench")]
#[command(about = "ormbench - Instrumented benchmarks for column-family mapping backends")]
#[command(version)]
#[command(long_about = "
ormbench inserts a trip dataset into each selected mapping backend chunk by chunk,
runs a repeated partition lookup, and compares throughput, time and memory.

Examples:
  ormbench run                                   # Benchmark both backends
  ormbench run --backend caspyorm -n 10000       # One backend, 10k records
  ormbench compare old.json new.json             # Compare two saved results
  ormbench scalability small.json large.json     # Scaling between two volumes
  ormbench config init                           # Write ormbench.toml
")]
struct Cli {
    /// Output format
    #[arg(long, global = true, value_enum, default_value = "table")]
    format: OutputFormatArg,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    /// Configuration file path
    #[arg(long, global = true, env = "ORMBENCH_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum OutputFormatArg {
    Table,
    Json,
    Csv,
    Prometheus,
}

impl From<OutputFormatArg> for OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Table => OutputFormat::Table,
            OutputFormatArg::Json => OutputFormat::Json,
            OutputFormatArg::Csv => OutputFormat::Csv,
            OutputFormatArg::Prometheus => OutputFormat::Prometheus,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run the benchmark against the selected backends
    Run(RunArgs),

    /// Compare two saved result or comparison files
    Compare(CompareArgs),

    /// Report scaling between two saved comparisons
    Scalability(ScalabilityArgs),

    /// Manage ormbench configuration
    Config(ConfigArgs),

    /// Check configuration and backend selection without running
    Validate(ValidateArgs),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let colored =
        !cli.no_color && !cli.quiet && console::Term::stdout().features().colors_supported();
    let output = OutputManager::new(OutputFormat::from(cli.format.clone()), colored, cli.quiet);

    match run_command(cli, &output).await {
        Ok(Outcome::Complete) => {}
        Ok(Outcome::Partial) => process::exit(2),
        Err(e) => {
            output.print_error(&format!("{:#}", e));
            process::exit(1);
        }
    }
}

async fn run_command(cli: Cli, output: &OutputManager) -> anyhow::Result<Outcome> {
    let (mut config, source) = load_config(cli.config.as_ref())?;
    if let Commands::Run(args) = &cli.command {
        args.apply_to(&mut config);
    }

    init_logging(&cli, &config);
    match &source {
        Some(path) => info!("Loaded configuration from: {}", path.display()),
        None => debug!("No configuration file, using defaults"),
    }

    match cli.command {
        Commands::Run(args) => {
            config.validate()?;
            commands::run::execute(args, config, output).await
        }
        Commands::Compare(args) => {
            commands::compare::execute(args, output).await?;
            Ok(Outcome::Complete)
        }
        Commands::Scalability(args) => {
            commands::scalability::execute(args, output).await?;
            Ok(Outcome::Complete)
        }
        Commands::Config(args) => {
            commands::config::execute(args, &config, output).await?;
            Ok(Outcome::Complete)
        }
        Commands::Validate(args) => {
            commands::validate::execute(args, &config, output).await?;
            Ok(Outcome::Complete)
        }
    }
}

fn init_logging(cli: &Cli, config: &EngineConfig) {
    let level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        config.logging.level.as_str()
    };

    let mut filter = EnvFilter::from_default_env();
    for directive in [format!("ormbench_engine={}", level), format!("ormbench={}", level)] {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }

    // stdout carries the report, logs go to stderr
    let layer = if cli.json_logs || config.logging.json {
        fmt::layer().json().with_writer(std::io::stderr).boxed()
    } else {
        fmt::layer().with_writer(std::io::stderr).boxed()
    };

    let _ = tracing_subscriber::registry().with(filter).with(layer).try_init();
}

/// File given on the command line, else `./ormbench.toml`, else defaults;
/// environment overrides are applied on top
fn load_config(path: Option<&PathBuf>) -> anyhow::Result<(EngineConfig, Option<PathBuf>)> {
    let source = match path {
        Some(path) => Some(path.clone()),
        None => {
            let default = PathBuf::from(DEFAULT_CONFIG_FILE);
            default.exists().then_some(default)
        }
    };

    let mut config = match &source {
        Some(path) => EngineConfig::load_from_file(path)?,
        None => EngineConfig::default(),
    };
    config.apply_env()?;
    Ok((config, source))
}
