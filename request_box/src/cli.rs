//! Command-line interface definitions using clap derive API.

use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Token-scoped HTTP request capture service
#[derive(Parser)]
#[command(name = "request-box")]
#[command(about = "Capture inbound HTTP requests into per-token inboxes")]
#[command(version)]
pub struct Cli {
    /// Path to a configuration file (defaults to ./config.toml if present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server
    Serve {
        /// Address to bind to, overriding server.host and server.port
        #[arg(long)]
        addr: Option<SocketAddr>,
    },
    /// Print the effective configuration and exit
    Config,
}
