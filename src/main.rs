mod cli;

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use shelf_core::config::Config;
use shelf_server::catalog::Sweeper;

/// Config file picked up from the working directory when `--config` is absent.
const DEFAULT_CONFIG_FILE: &str = "photoshelf.toml";

fn load_config(path: Option<&Path>) -> Result<Config> {
    let mut config = match path {
        Some(p) => Config::load(p)
            .with_context(|| format!("Failed to load config from {}", p.display()))?,
        None => Config::load_or_default(Some(Path::new(DEFAULT_CONFIG_FILE))),
    };
    config.apply_env();
    Ok(config)
}

async fn serve(mut config: Config, host: Option<String>, port: Option<u16>) -> Result<()> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    tracing::info!(
        "Starting photoshelf on {}:{}",
        config.server.host,
        config.server.port
    );
    shelf_server::start(config)
        .await
        .context("Server terminated with an error")
}

async fn sweep(config: Config, dry_run: bool, grace_secs: Option<u64>) -> Result<()> {
    let grace = grace_secs
        .map(Duration::from_secs)
        .unwrap_or_else(|| config.storage.sweep_grace());
    let ctx = shelf_server::build_context(config).await?;
    let sweeper = Sweeper::new(ctx.photos.clone(), ctx.blobs.clone(), grace);

    let report = sweeper.sweep(dry_run).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {}", p.display());
            Config::load(p).with_context(|| format!("Invalid config {}", p.display()))?
        }
        None => {
            println!("No config file specified, using defaults");
            Config::default()
        }
    };

    let warnings = config.validate();
    if warnings.is_empty() {
        println!("Configuration is valid");
    } else {
        for warning in &warnings {
            println!("warning: {warning}");
        }
    }
    println!("  Server: {}:{}", config.server.host, config.server.port);
    println!("  Database: {}", config.database.path.display());
    println!("  Uploads: {}", config.storage.upload_dir.display());
    println!("  Max upload: {} bytes", config.storage.max_upload_bytes);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG if set, otherwise pick defaults from the verbose flag.
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "photoshelf=trace,shelf_server=trace,shelf_db=debug,shelf_storage=debug,tower_http=debug"
                .to_string()
        } else {
            "photoshelf=info,shelf_server=info,shelf_db=info,shelf_storage=info,tower_http=info"
                .to_string()
        }
    });

    tracing_subscriber::fmt().with_env_filter(&env_filter).init();

    match cli.command {
        Commands::Serve { host, port } => {
            let config = load_config(cli.config.as_deref())?;
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(serve(config, host, port))
        }
        Commands::Sweep {
            dry_run,
            grace_secs,
        } => {
            let config = load_config(cli.config.as_deref())?;
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(sweep(config, dry_run, grace_secs))
        }
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("photoshelf {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
