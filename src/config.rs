//! Configuration for the zoolab binaries
//!
//! CLI arguments and environment variable handling using clap.

use crate::captures::CaptureUpdate;
use crate::entities::ChampionKind;
use crate::error::Result;
use crate::rules::RuleBook;
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Zoolab - capture tracker and unlock engine
#[derive(Parser, Debug, Clone)]
#[command(name = "zoolab")]
#[command(about = "Track captures and unlock champions and prototypes")]
pub struct Args {
    /// SQLite database path
    #[arg(long, env = "ZOOLAB_DATABASE", default_value = "zoolab.db")]
    pub database: PathBuf,

    /// Rule book (JSON); built-in rules when absent
    #[arg(long, env = "ZOOLAB_RULES")]
    pub rules: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create the schema
    Init,
    /// Install a catalog JSON into the database
    Seed { catalog: PathBuf },
    /// Apply capture deltas, e.g. `capture 3:+1 7:-1`
    Capture {
        #[arg(required = true, allow_hyphen_values = true)]
        updates: Vec<CaptureUpdate>,
    },
    /// Mark a champion or prototype as defeated
    Defeat { kind: ChampionKind, id: i64 },
    /// Clear the defeated flag
    Undefeat { kind: ChampionKind, id: i64 },
    /// Zero captures and clear every flag
    Reset,
    /// Zone progress and unlock state
    Status,
    /// Audit trail for one champion or prototype
    Events { kind: ChampionKind, id: i64 },
}

/// Zoolab API server
#[derive(Parser, Debug, Clone)]
#[command(name = "zoolab-server")]
#[command(about = "JSON API over the zoolab unlock engine")]
pub struct ServerArgs {
    /// SQLite database path
    #[arg(long, env = "ZOOLAB_DATABASE", default_value = "zoolab.db")]
    pub database: PathBuf,

    /// Rule book (JSON); built-in rules when absent
    #[arg(long, env = "ZOOLAB_RULES")]
    pub rules: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8000")]
    pub listen: SocketAddr,

    /// Allowed CORS origins
    #[arg(
        long = "cors-origin",
        env = "CORS_ORIGIN",
        value_delimiter = ',',
        default_value = "http://localhost:3000"
    )]
    pub cors_origins: Vec<String>,
}

/// Install the tracing subscriber; `RUST_LOG` wins over `level`
pub fn init_tracing(level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("zoolab={},info", level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

pub fn load_rule_book(path: Option<&PathBuf>) -> Result<RuleBook> {
    match path {
        Some(path) => {
            let rules = RuleBook::from_file(path)?;
            info!(path = %path.display(), rules = rules.rule_count(), "rule book loaded");
            Ok(rules)
        }
        None => Ok(RuleBook::default()),
    }
}
