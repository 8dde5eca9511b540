//! Convoy CLI
//!
//! Operator tools for the fleet-management sync server:
//!
//! - `serve` - host the repository and replication endpoints over a store root
//! - `query` / `checkout` / `commit` - one-shot client operations
//! - `log-dump` / `log-descriptors` - inspect audit event logs on disk

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Convoy fleet-management sync tools.
#[derive(Parser)]
#[command(name = "convoy")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the sync endpoints over a directory of versioned stores
    Serve {
        /// Address to bind
        #[arg(short, long, default_value = "0.0.0.0:8642")]
        bind: String,

        /// Directory holding `<customer>/<name>` store directories
        #[arg(short, long)]
        store_root: PathBuf,

        /// Maximum accepted commit payload in bytes
        #[arg(long, default_value_t = 64 * 1024 * 1024)]
        max_commit_bytes: usize,
    },

    /// List stores and their version ranges
    Query {
        /// Server base URL
        #[arg(short, long)]
        url: String,

        /// Restrict to one customer
        #[arg(short, long)]
        customer: Option<String>,

        /// Restrict to one store name
        #[arg(short, long)]
        name: Option<String>,

        /// Only list master stores
        #[arg(long)]
        masters_only: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Fetch a version's payload
    Checkout {
        /// Server base URL
        #[arg(short, long)]
        url: String,

        /// Customer owning the store
        #[arg(short, long)]
        customer: String,

        /// Store name
        #[arg(short, long)]
        name: String,

        /// Version to fetch (defaults to the highest)
        #[arg(long)]
        version: Option<u64>,

        /// File to write the payload to
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Propose a file as the next version
    Commit {
        /// Server base URL
        #[arg(short, long)]
        url: String,

        /// Customer owning the store
        #[arg(short, long)]
        customer: String,

        /// Store name
        #[arg(short, long)]
        name: String,

        /// The version the payload is based on (0 for an empty store)
        #[arg(long)]
        version: u64,

        /// File holding the payload
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Print events from a local log root
    LogDump {
        /// Log root directory
        #[arg(short, long)]
        root: PathBuf,

        /// Target ID
        #[arg(short, long)]
        target: String,

        /// Store ID
        #[arg(short, long)]
        store: u64,

        /// First event ID
        #[arg(long, default_value_t = 1)]
        from: u64,

        /// Last event ID
        #[arg(long, default_value_t = u64::MAX)]
        to: u64,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// List log descriptors from a local log root
    LogDescriptors {
        /// Log root directory
        #[arg(short, long)]
        root: PathBuf,

        /// Restrict to one target
        #[arg(short, long)]
        target: Option<String>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Serve {
            bind,
            store_root,
            max_commit_bytes,
        } => commands::serve::run(&bind, &store_root, max_commit_bytes)?,
        Commands::Query {
            url,
            customer,
            name,
            masters_only,
            format,
        } => commands::remote::query(&url, customer.as_deref(), name.as_deref(), masters_only, &format)?,
        Commands::Checkout {
            url,
            customer,
            name,
            version,
            out,
        } => commands::remote::checkout(&url, &customer, &name, version, &out)?,
        Commands::Commit {
            url,
            customer,
            name,
            version,
            input,
        } => commands::remote::commit(&url, &customer, &name, version, &input)?,
        Commands::LogDump {
            root,
            target,
            store,
            from,
            to,
            format,
        } => commands::logs::dump(&root, &target, store, from, to, &format)?,
        Commands::LogDescriptors {
            root,
            target,
            format,
        } => commands::logs::descriptors(&root, target.as_deref(), &format)?,
    }

    Ok(())
}
