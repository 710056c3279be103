use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "vicshield",
    about = "VicShield: contract analysis and KYC over content-addressed documents",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the HTTP server
    Serve(ServeArgs),
    /// Print the content hash of a file
    Hash(HashArgs),
    /// Print the effective configuration as TOML
    Config(ConfigArgs),
}

#[derive(Args)]
pub struct ConfigSource {
    /// TOML configuration file
    #[arg(short, long, env = "VICSHIELD_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Args)]
pub struct ServeArgs {
    #[command(flatten)]
    pub source: ConfigSource,
    /// Override the listen address
    #[arg(long)]
    pub bind: Option<SocketAddr>,
    /// Override the storage directory
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
    /// Keep everything in memory
    #[arg(long, conflicts_with = "data_dir")]
    pub memory: bool,
}

#[derive(Args)]
pub struct HashArgs {
    pub files: Vec<PathBuf>,
}

#[derive(Args)]
pub struct ConfigArgs {
    #[command(flatten)]
    pub source: ConfigSource,
}
