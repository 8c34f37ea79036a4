use certsync_service::{app, Config, ConfigError, RunOutcome, TransferMode};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// certsync - client certificate lifecycle reconciliation
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "certsync", args_conflicts_with_subcommands = true)]
struct Cli {
    /// Path to configuration file
    #[arg(value_name = "CONFIG", default_value = "config.json")]
    config_path: String,

    /// Validate configuration and exit (doesn't run a batch)
    #[arg(short, long)]
    validate: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Mirror SOURCE into TARGET by content hash, one way
    Sync {
        source: PathBuf,
        target: PathBuf,

        /// Copy changed files instead of moving them
        #[arg(long)]
        copy: bool,
    },
}

fn init_tracing(level: &str) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Some(Command::Sync {
        source,
        target,
        copy,
    }) = cli.command
    {
        init_tracing("info");
        let mode = if copy {
            TransferMode::Copy
        } else {
            TransferMode::Move
        };

        match app::sync_folders(source, target, mode).await {
            Ok(report) => {
                info!(
                    "Sync complete: {} transferred, {} deleted, {} unchanged, {} failed",
                    report.transferred, report.deleted, report.unchanged, report.failed
                );
                process::exit(0);
            }
            Err(e) => {
                error!("{}", e);
                process::exit(e.exit_code());
            }
        }
    }

    // Load or create configuration (without logging first)
    let config = match Config::from_file(&cli.config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            init_tracing("info");

            if cli.validate {
                eprintln!("Configuration validation failed!");
                eprintln!("   Error: {}", e);
                process::exit(2);
            }

            let missing =
                matches!(&e, ConfigError::Io(io) if io.kind() == std::io::ErrorKind::NotFound);
            if !missing {
                error!("Could not load config file {}: {}", cli.config_path, e);
                process::exit(2);
            }

            warn!("Config file not found: {}", cli.config_path);
            info!("Creating example configuration at: {}", cli.config_path);

            if let Err(e) = Config::example().to_file(&cli.config_path) {
                error!("Error creating example config: {}", e);
                process::exit(2);
            }

            info!("Please edit {} and run again", cli.config_path);
            process::exit(0);
        }
    };

    if cli.validate {
        println!("Configuration validated successfully!");
        println!();
        println!("Configuration summary:");
        println!("  Mode: {}", if config.import_from_disk { "import from disk" } else { "directory reconciliation" });
        println!("  Root CA: {}", config.trust_anchors.root_ca_path.display());
        println!("  Sub-CA: {}", config.trust_anchors.sub_ca_path.display());
        if let Some(ref directory) = config.directory {
            println!("  Directory: {} (base {})", directory.url, directory.base_dn);
        }
        if let Some(ref roster) = config.roster {
            println!("  Identity provider: {}", roster.base_url);
        }
        if let Some(ref volume) = config.volume {
            println!("  Volume: {}", volume.root_path.display());
        }
        println!("  State backend: {}", config.state.describe());
        println!(
            "  Revocation: {} attempts, {}s base delay",
            config.revocation.max_attempts, config.revocation.retry_delay_secs
        );
        println!("  Log level: {}", config.log_level.as_deref().unwrap_or("info"));
        process::exit(0);
    }

    init_tracing(config.log_level.as_deref().unwrap_or("info"));

    info!("certsync v{}", env!("CARGO_PKG_VERSION"));
    info!("Loaded configuration from: {}", cli.config_path);

    match app::run(&config).await {
        Ok(RunOutcome::Reconciled(report)) => {
            info!(
                "Reconciliation complete: {} published, {} stale removed, {} invalidated",
                report.published, report.stale_deleted, report.invalidated
            );
        }
        Ok(RunOutcome::Imported(count)) => {
            info!("Disk import complete: {} certificates published", count);
        }
        Err(e) => {
            error!(kind = ?e.kind(), "Run failed: {}", e);
            process::exit(e.exit_code());
        }
    }
}
