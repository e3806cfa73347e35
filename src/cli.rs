use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "keypool",
    version,
    about = "Credential pool for a generative-AI provider with health probing and cooldowns"
)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE", env = "KEYPOOL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Server bind address
    #[arg(long, default_value = "0.0.0.0", env = "KEYPOOL_HOST")]
    pub host: String,

    /// Log as JSON lines instead of human-readable text
    #[arg(long, env = "KEYPOOL_JSON_LOGS")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the pool service (default)
    Serve,

    /// Validate configuration and list configured credential ids
    Check,
}
