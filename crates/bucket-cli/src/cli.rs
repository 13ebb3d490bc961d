//! Clap CLI definitions for Bucket.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub const AFTER_HELP: &str = "\
\x1b[1;36mExamples:\x1b[0m
  bucket start                      Connect to IRC and answer in the configured channels
  bucket --config bot.toml start    Use a config file other than ~/.bucket/config.toml
  bucket check-config               Validate the config and print the channel map";

/// Bucket, a factoid bot for IRC channels.
#[derive(Parser, Debug)]
#[command(name = "bucket", version, about, after_help = AFTER_HELP)]
pub struct Cli {
    /// Path to config file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Connect to the IRC server and run until Ctrl+C.
    Start,
    /// Load and validate the configuration, then print the channel map.
    CheckConfig,
}
