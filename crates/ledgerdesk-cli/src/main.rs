//! Ledgerdesk CLI - Command-line interface for the Ledgerdesk backend
//!
//! Provides commands for:
//! - Signing in and out (tokens live in the system keyring)
//! - Issuing authenticated requests against any API path
//! - Listing paginated collections
//! - Uploading and downloading files
//! - Inspecting the configuration

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use ledgerdesk_core::domain::NormalizedError;
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{
    auth::AuthCommand,
    config::ConfigCommand,
    context::GlobalOptions,
    request::{ListArgs, RequestArgs},
    transfer::{DownloadArgs, UploadArgs},
};
use ledgerdesk_client::Verb;
use output::{get_formatter, OutputFormat};

#[derive(Debug, Parser)]
#[command(
    name = "ledgerdesk",
    version,
    about = "Command-line client for the Ledgerdesk accounting backend"
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Serve requests from demo fixtures where available
    #[arg(long, global = true)]
    demo: bool,

    /// Retry transient failures (timeouts, 429, 5xx) with backoff
    #[arg(long, global = true)]
    retry: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Authentication commands
    #[command(subcommand)]
    Auth(AuthCommand),
    /// GET a resource
    Get(RequestArgs),
    /// DELETE a resource
    Delete(RequestArgs),
    /// POST a JSON body
    Post(RequestArgs),
    /// PUT a JSON body
    Put(RequestArgs),
    /// PATCH a JSON body
    Patch(RequestArgs),
    /// List a paginated collection
    List(ListArgs),
    /// Upload a file as multipart/form-data
    Upload(UploadArgs),
    /// Download a file into the download directory
    Download(DownloadArgs),
    /// View and validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let options = GlobalOptions {
        format: if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        },
        config_path: cli.config.clone(),
        demo: cli.demo,
        retry: cli.retry,
    };

    // Setup tracing: RUST_LOG wins, then -v, then the configured level
    let filter = match cli.verbose {
        0 => options.load_config().logging.level,
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Auth(cmd) => cmd.execute(&options).await,
        Commands::Get(args) => args.execute(Verb::Get, &options).await,
        Commands::Delete(args) => args.execute(Verb::Delete, &options).await,
        Commands::Post(args) => args.execute(Verb::Post, &options).await,
        Commands::Put(args) => args.execute(Verb::Put, &options).await,
        Commands::Patch(args) => args.execute(Verb::Patch, &options).await,
        Commands::List(args) => args.execute(&options).await,
        Commands::Upload(args) => args.execute(&options).await,
        Commands::Download(args) => args.execute(&options).await,
        Commands::Config(cmd) => cmd.execute(&options).await,
    };

    // API failures were already classified; print them and exit non-zero
    // instead of letting anyhow dump a debug chain.
    if let Err(e) = &result {
        if let Some(api_error) = e.downcast_ref::<NormalizedError>() {
            get_formatter(options.format == OutputFormat::Json).api_error(api_error);
            std::process::exit(1);
        }
    }
    result
}
