use clap::{Parser, Subcommand};
use log::info;
use std::path::PathBuf;

use guardia::config::{Config, ConfigError};
use guardia::Guardia;

#[derive(Parser)]
#[command(name = "guardia")]
#[command(about = "A storage-quota-aware TCP proxy for the MongoDB wire protocol")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = "guardia-team")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the proxy
    Run {
        /// Path to configuration file
        #[arg(short, long, default_value = "config/dev.toml")]
        config: PathBuf,
    },
    /// Generate an example configuration file
    Config {
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Validate a configuration file
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config } => {
            run_guardia(config).await?;
        }
        Commands::Config { output } => {
            generate_config(output)?;
        }
        Commands::Validate { config } => {
            validate_config(config)?;
        }
        Commands::Version => {
            show_version();
        }
    }

    Ok(())
}

async fn run_guardia(config_path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load_from_file(&config_path)
        .map_err(|e| format!("Failed to load config from {:?}: {}", config_path, e))?;

    init_logging(&config)?;

    info!("Starting guardia v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded from: {:?}", config_path);
    info!("Listening on: {}", config.server.listen_addr);
    info!("Backend: {}", config.mongodb.backend_addr());
    info!(
        "Storage quota filter: {}",
        if config.filter.enabled { "enabled" } else { "disabled" }
    );

    let guardia = Guardia::new(config);
    if let Err(e) = guardia.run().await {
        return Err(format!("guardia exited with an error: {}", e).into());
    }

    Ok(())
}

fn generate_config(output: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    println!("Generating configuration file: {:?}", output);

    Config::create_example_config(&output)
        .map_err(|e| format!("Failed to generate config: {}", e))?;

    println!("Configuration file generated successfully!");
    println!("Edit the file to match your environment and run:");
    println!("  guardia run --config {:?}", output);

    Ok(())
}

fn validate_config(config_path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    println!("Validating configuration file: {:?}", config_path);

    match Config::load_from_file(&config_path) {
        Ok(config) => {
            println!("✓ Configuration file is valid");
            println!("  Listen address: {}", config.server.listen_addr);
            println!("  Backend: {}", config.mongodb.backend_addr());
            println!("  Max connections: {}", config.server.max_connections);
            println!(
                "  Storage quota filter: {}",
                if config.filter.enabled { "enabled" } else { "disabled" }
            );
            if config.filter.enabled {
                println!("    base_dir: {}", config.filter.base_dir);
                println!("    quota_files: {}", config.filter.quota_files);
                println!("    quota_data_size_mb: {} MiB", config.filter.quota_data_size_mb);
            }
        }
        Err(e) => {
            eprintln!("✗ Configuration file validation failed:");
            match &e {
                ConfigError::IoError(msg) => eprintln!("  File error: {}", msg),
                ConfigError::ParseError(msg) => eprintln!("  Parse error: {}", msg),
                ConfigError::ValidationError(msg) => eprintln!("  Validation error: {}", msg),
                ConfigError::SerializeError(msg) => eprintln!("  Serialization error: {}", msg),
            }
            return Err(Box::new(e));
        }
    }

    Ok(())
}

fn show_version() {
    println!("guardia v{}", env!("CARGO_PKG_VERSION"));
    println!("A storage-quota-aware TCP proxy for the MongoDB wire protocol");
    println!();
    println!(
        "Built with Rust {}",
        option_env!("CARGO_PKG_RUST_VERSION").unwrap_or("unknown")
    );
    println!("Target: {}", std::env::consts::ARCH);
    println!();
    println!("Features:");
    println!("  • Wire-protocol-aware forwarding with per-packet admission control");
    println!("  • Data-size quota monitoring via dbStats");
    println!("  • On-disk data file count monitoring via filesystem watch");
    println!("  • Session recycling with cooperative async I/O on Tokio");
}

fn init_logging(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let log_level = match config.logging.level.as_str() {
        "debug" => log::LevelFilter::Debug,
        "info" => log::LevelFilter::Info,
        "warn" => log::LevelFilter::Warn,
        "error" => log::LevelFilter::Error,
        "trace" => log::LevelFilter::Trace,
        _ => log::LevelFilter::Info,
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    info!("Logging initialized at level: {:?}", log_level);
    Ok(())
}
