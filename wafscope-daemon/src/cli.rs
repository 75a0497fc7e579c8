//! CLI argument definitions for wafscope-daemon.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use clap::Parser;

/// wafscope WAF audit-log monitoring daemon.
///
/// Tails ModSecurity audit logs, classifies blocked requests, and streams
/// events and statistics to live dashboard subscribers.
#[derive(Parser, Debug)]
#[command(name = "wafscope-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to wafscope.toml configuration file.
    ///
    /// When omitted, built-in defaults are used (environment overrides still apply).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_format: Option<String>,

    /// Validate configuration and exit without starting the daemon.
    #[arg(long)]
    pub validate: bool,
}
