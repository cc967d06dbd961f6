//! Syncro CLI
//!
//! Command-line tools for syncro paths, the realtime codecs and the
//! coordination service.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "syncro")]
#[command(about = "Syncro - floating entity sync tools")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Use a specific config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Coordination service URL (overrides registry_url)
    #[arg(long, global = true)]
    url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse and describe a path
    Parse {
        /// Path such as projects::<uuid> or projects::<uuid>::comments
        path: String,
        /// Accept a trailing `*` on the relation
        #[arg(long)]
        allow_wildcard: bool,
    },
    /// Encode a JSON state into typed fields
    Encode {
        /// JSON object, or `-` to read stdin
        input: String,
        /// Show the flattened realtime document instead
        #[arg(long)]
        wire: bool,
    },
    /// Decode typed fields into plain JSON
    Decode {
        /// Typed-field JSON object, or `-` to read stdin
        input: String,
    },
    /// Ask the coordination service to populate a document
    Populate {
        path: String,
        /// Re-populate even if the document exists
        #[arg(long)]
        force: bool,
    },
    /// Send one presence heartbeat
    Heartbeat {
        path: String,
        /// Session token (defaults to one derived from the process id)
        #[arg(long)]
        session: Option<String>,
        /// Report unflushed changes
        #[arg(long)]
        dirty: bool,
    },
    /// Ask the coordination service to flush a document
    Flush {
        path: String,
        /// Remove the realtime document afterwards
        #[arg(long)]
        destroy: bool,
    },
    /// Print a random nested state tree
    Synth {
        /// Maximum nesting depth
        #[arg(short, long, default_value_t = 3)]
        depth: u32,
        /// Seed for reproducible output
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (registry_url, heartbeat_interval_ms, throttle_ms, retries, retry_min_time_ms)
        key: String,
        /// Configuration value
        value: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));
    let config_path = cli.config.as_ref();
    let url = cli.url.as_deref();

    match cli.command {
        Commands::Parse {
            path,
            allow_wildcard,
        } => commands::path::parse_path(&path, allow_wildcard, &output),
        Commands::Encode { input, wire } => commands::codec::encode(&input, wire, &output),
        Commands::Decode { input } => commands::codec::decode(&input, &output),
        Commands::Populate { path, force } => {
            let client = commands::coordinate::client(url, config_path)?;
            commands::coordinate::populate(&client, &path, force, &output).await
        }
        Commands::Heartbeat {
            path,
            session,
            dirty,
        } => {
            let client = commands::coordinate::client(url, config_path)?;
            commands::coordinate::heartbeat(&client, &path, session, dirty, &output).await
        }
        Commands::Flush { path, destroy } => {
            let client = commands::coordinate::client(url, config_path)?;
            commands::coordinate::flush(&client, &path, destroy, &output).await
        }
        Commands::Synth { depth, seed } => commands::synth::generate(depth, seed, &output),
        Commands::Config { command } => match command {
            Some(ConfigCommands::Show) | None => commands::config::show(config_path, &output),
            Some(ConfigCommands::Set { key, value }) => {
                commands::config::set(key, value, config_path, &output)
            }
        },
    }
}

/// Log to stderr; RUST_LOG overrides the -v level
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("syncro_core={},syncro_cli={}", level, level))
    });

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
