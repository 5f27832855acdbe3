//! # Notifier Configuration Validator
//!
//! Loads the layered notifier configuration for an environment, validates it,
//! and prints the sanitized result along with the topic → handler table.

use clap::{Parser, Subcommand, ValueEnum};
use notifier_core::config::ConfigManager;
use notifier_core::gateway;
use std::path::PathBuf;
use std::process;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "config-validator")]
#[command(about = "Validate notifier configuration files")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Environment to validate (defaults to NOTIFIER_ENV / APP_ENV / development)
    #[arg(short, long)]
    environment: Option<String>,

    /// Configuration directory path (default: ./config)
    #[arg(short, long)]
    config_dir: Option<PathBuf>,

    /// Verbose output level (use multiple times for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate the configuration and build the push gateway
    All,

    /// Print the topic → handler bindings
    Topics,

    /// Print the sanitized configuration
    Show,
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let _subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .try_init();

    let result = load(&cli).and_then(|manager| match &cli.command {
        Some(Commands::All) | None => validate_all(&cli, &manager),
        Some(Commands::Topics) => print_topics(&cli, &manager),
        Some(Commands::Show) => show(&manager),
    });

    match result {
        Ok(()) => {
            info!("Configuration validation completed successfully");
            process::exit(0);
        }
        Err(e) => {
            error!("Configuration validation failed: {}", e);
            eprintln!("❌ {e}");
            process::exit(1);
        }
    }
}

fn load(cli: &Cli) -> anyhow::Result<std::sync::Arc<ConfigManager>> {
    let manager = match &cli.environment {
        Some(env) => ConfigManager::load_from_directory_with_env(cli.config_dir.clone(), env)?,
        None => ConfigManager::load_from_directory(cli.config_dir.clone())?,
    };
    Ok(manager)
}

fn validate_all(cli: &Cli, manager: &ConfigManager) -> anyhow::Result<()> {
    println!("🔧 Validating Notifier Configuration");
    println!("Environment: {}", manager.environment());
    println!("Config Directory: {}", manager.config_directory().display());
    println!();

    let config = manager.config();
    config.validate()?;
    println!("✅ Configuration values are valid");

    let gateway = gateway::from_config(&config.push)?;
    println!("✅ Push gateway '{}' constructed", gateway.name());
    println!(
        "✅ Fallback concurrency: {}",
        config.delivery.fallback_concurrency
    );
    println!();

    print_topics(cli, manager)
}

fn print_topics(cli: &Cli, manager: &ConfigManager) -> anyhow::Result<()> {
    let bindings = &manager.config().topics;
    match cli.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(bindings)?);
        }
        OutputFormat::Table => {
            let width = bindings
                .iter()
                .map(|b| b.topic.len())
                .max()
                .unwrap_or(5)
                .max(5);
            println!("{:<width$}  HANDLER", "TOPIC");
            for binding in bindings.iter() {
                println!("{:<width$}  {}", binding.topic, binding.handler);
            }
        }
    }
    Ok(())
}

fn show(manager: &ConfigManager) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(&manager.debug_config())?);
    Ok(())
}
