use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use trovebox_archiver::archive::{AlbumState, Archiver};
use trovebox_archiver::config::Config;
use trovebox_archiver::status::scan_archive;

#[derive(Parser)]
#[command(author, version, about = "Mirror Trovebox albums onto local disk")]
struct Cli {
    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize with a default config file
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,

        /// Path to config file
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,
    },

    /// Download every album that has not been archived yet
    Archive {
        /// Path to config file
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Directory to create album directories in
        #[arg(short, long, value_name = "DIR")]
        out_dir: Option<PathBuf>,
    },

    /// Show albums already archived locally
    Status {
        /// Path to config file
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Directory holding the archived albums
        #[arg(short, long, value_name = "DIR")]
        out_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    match &cli.command {
        Commands::Init { force, config } => init_config(config, *force),
        Commands::Archive { config, out_dir } => {
            let config_data = load_config(config, out_dir)?;
            println!("Archiving albums from {}", config_data.host);
            println!("Output directory: {}", config_data.out_dir.display());

            let archiver = Archiver::from_config(&config_data)?;
            let summary = archiver.run().await.context("Archive run failed")?;

            println!("\nArchive summary:");
            println!("  Albums archived: {}", summary.count(AlbumState::Done));
            println!("  Albums skipped: {}", summary.count(AlbumState::Skipped));
            println!("  Albums failed: {}", summary.count(AlbumState::Failed));
            println!("  Photos saved: {}", summary.photos_saved());
            println!("  Photos failed: {}", summary.photo_failures());

            Ok(())
        }
        Commands::Status { config, out_dir } => {
            let config_data = load_config(config, out_dir)?;
            println!("trovebox-archiver Status");
            println!("Configuration:");
            println!("  Host: {}", config_data.host);
            println!("  Output directory: {}", config_data.out_dir.display());
            println!("  Page size: {}", config_data.page_size);

            let status = scan_archive(&config_data.out_dir)?;
            println!(
                "\nArchived albums: {} ({} photos)",
                status.albums.len(),
                status.photo_count()
            );
            for album in &status.albums {
                println!(
                    "  {} - {} photos (server reported {})",
                    album.name, album.photo_count, album.declared_count
                );
            }

            if !status.without_manifest.is_empty() {
                println!("\nDirectories without album.json (skipped by archive):");
                for dir in &status.without_manifest {
                    println!("  {}", dir.display());
                }
            }

            Ok(())
        }
    }
}

fn init_logger(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(Some(env_logger::fmt::TimestampPrecision::Seconds))
        .init();
}

fn init_config(config_path_opt: &Option<PathBuf>, force: bool) -> Result<()> {
    let config_path = Config::get_config_path(config_path_opt);

    if config_path.exists() && !force {
        println!("Config file already exists at {}", config_path.display());
        println!("Use --force to overwrite");
        return Ok(());
    }

    let config = Config::default();
    config
        .save_to_file(&config_path)
        .with_context(|| format!("Failed to write config to {}", config_path.display()))?;

    println!("Created config file at {}", config_path.display());
    Ok(())
}

fn load_config(config_path_opt: &Option<PathBuf>, out_dir: &Option<PathBuf>) -> Result<Config> {
    let config_path = Config::get_config_path(config_path_opt);
    let mut config = Config::load_from_file(&config_path)?;

    if let Some(dir) = out_dir {
        config.out_dir = dir.clone();
    }

    Ok(config)
}
