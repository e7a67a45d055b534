//! CLI entry point for the `rcache` command-line tool.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

use roomcache::cli::commands;

#[derive(Parser)]
#[command(
    name = "rcache",
    about = "roomcache CLI: inspect and reset on-disk chat stores"
)]
struct Cli {
    /// Directory holding one store per user
    #[arg(long, env = "RCACHE_ROOT")]
    root: PathBuf,

    /// Output format: "text" (default) or "json"
    #[arg(long, default_value = "text", global = true)]
    format: String,

    /// Enable debug logging
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show metadata, room count and health of a user's store
    Info {
        /// User id owning the store
        user_id: String,
    },
    /// List the rooms of a user's store
    Rooms {
        /// User id owning the store
        user_id: String,
    },
    /// Show disk usage of a user's store
    Usage {
        /// User id owning the store
        user_id: String,
    },
    /// Delete everything stored for a user
    Wipe {
        /// User id owning the store
        user_id: String,
    },
}

fn main() {
    let cli = Cli::parse();
    let json = cli.format == "json";

    let level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Warn
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .parse_default_env()
        .init();

    let result = match cli.command {
        Commands::Info { user_id } => commands::cmd_info(&cli.root, &user_id, json),
        Commands::Rooms { user_id } => commands::cmd_rooms(&cli.root, &user_id, json),
        Commands::Usage { user_id } => commands::cmd_usage(&cli.root, &user_id, json),
        Commands::Wipe { user_id } => commands::cmd_wipe(&cli.root, &user_id, json),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
