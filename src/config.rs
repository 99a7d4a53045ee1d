use clap::{ArgAction, Parser};
use std::net::SocketAddr;

/// Runtime configuration, from flags or `FORMAUTH_*` environment variables.
#[derive(Debug, Clone, Parser)]
#[command(name = "formauth", version, about = "Registration and login form backed by SQLite")]
pub struct Config {
    /// SQLite database URL; the file is created when missing
    #[arg(
        long,
        env = "FORMAUTH_DATABASE_URL",
        default_value = "sqlite://auth_app_data.sqlite"
    )]
    pub database_url: String,

    /// Address to listen on
    #[arg(long, env = "FORMAUTH_LISTEN", default_value = "0.0.0.0:3000")]
    pub listen: SocketAddr,

    /// Maximum pooled database connections
    #[arg(long, env = "FORMAUTH_MAX_CONNECTIONS", default_value_t = 5)]
    pub max_connections: u32,

    /// Default log filter when RUST_LOG is unset (error, warn, info, debug, trace)
    #[arg(long, env = "FORMAUTH_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Raise verbosity: -v for debug, -vv for trace (overrides --log-level)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Config {
    /// Filter directive used when RUST_LOG is unset.
    pub fn log_filter(&self) -> &str {
        match self.verbose {
            0 => &self.log_level,
            1 => "debug",
            _ => "trace",
        }
    }
}
