//! CLI argument definitions for the colloquy demo binary.
//!
//! Uses `clap` with derive macros. Priority resolution: CLI args > env vars
//! > config file > defaults.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Colloquy — conversation intelligence over an offline demo corpus.
#[derive(Parser, Debug)]
#[command(name = "colloquy", version, about)]
pub struct Cli {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Analyze the sample corpus and walk through a query, related
    /// conversations, and trending topics.
    Demo,
    /// Ask a question over the analyzed sample corpus.
    Query {
        /// The question to answer.
        text: String,
        /// Only consider conversations tagged with this topic (repeatable).
        #[arg(long = "topic")]
        topics: Vec<String>,
        /// Only consider conversations created in the last N days.
        #[arg(long = "days")]
        days: Option<i64>,
    },
    /// Suggest conversations related to one of the sample conversations.
    Related {
        /// Title of the anchor conversation.
        title: String,
    },
    /// Show trending topics across recently ended conversations.
    Trending {
        /// Trailing window in days.
        #[arg(long = "days", default_value_t = 30)]
        days: i64,
    },
}

impl Cli {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > COLLOQUY_CONFIG env var > ~/.colloquy/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref path) = self.config {
            return path.clone();
        }
        if let Ok(path) = std::env::var("COLLOQUY_CONFIG") {
            return PathBuf::from(path);
        }
        default_config_path()
    }
}

fn default_config_path() -> PathBuf {
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".colloquy").join("config.toml");
    }
    PathBuf::from("config.toml")
}
