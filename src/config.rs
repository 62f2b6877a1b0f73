use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::state::DEFAULT_KEY;

const STORE_FILE: &str = "store.json";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Command line and environment configuration for the `counter` binary.
#[derive(Debug, Clone, Parser)]
#[command(name = "counter", version, about = "A persisted counter shared by two views")]
pub struct Config {
    /// JSON file the counter is persisted to. Defaults to the platform data directory.
    #[arg(long, env = "COUNTER_STORE")]
    pub store: Option<PathBuf>,

    /// Keep the counter in memory only. Wins over `--store`.
    #[arg(long)]
    pub memory: bool,

    /// Storage key of the counter record.
    #[arg(long, env = "COUNTER_KEY", default_value = DEFAULT_KEY)]
    pub key: String,

    /// Value used when nothing is stored yet.
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub initial: i64,

    /// Log filter, e.g. `info` or `shared_counter=debug`.
    #[arg(long, env = "COUNTER_LOG", default_value = "info")]
    pub log_level: String,

    #[arg(long, value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,
}

impl Config {
    /// Where the store lives, `None` for in-memory storage.
    pub fn store_path(&self) -> Option<PathBuf> {
        if self.memory {
            return None;
        }
        if let Some(path) = &self.store {
            return Some(path.clone());
        }
        let dir = dirs::data_dir()
            .map(|d| d.join(env!("CARGO_PKG_NAME")))
            .unwrap_or_else(|| PathBuf::from("."));
        Some(dir.join(STORE_FILE))
    }
}
