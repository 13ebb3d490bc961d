//! Bot configuration types.
//!
//! The file format is TOML; loading lives in `bucket-kernel::config`. All
//! sections are optional and fall back to the defaults below, but the
//! channel map is validated before the kernel boots.

use crate::error::{BucketError, BucketResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::path::PathBuf;
use std::time::Duration;

/// Default pause between two outbound replies.
pub const DEFAULT_REPLY_SPACING_MS: u64 = 1000;

/// Default number of remembered lines per (channel, speaker).
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BucketConfig {
    /// The bot's nick; utterances starting with `<nick>:` or `<nick>,` are addressed to it.
    pub nick: String,
    /// Host of the single admin identity. `None` disables admin commands.
    pub owner: Option<String>,
    /// Nicks whose messages are ignored entirely.
    pub ignore: Vec<String>,
    /// Minimum pause between two replies, in milliseconds.
    pub reply_spacing_ms: u64,
    /// Lines remembered per (channel, speaker) for `remember`.
    pub history_capacity: usize,
    /// IRC connection settings.
    pub irc: IrcConfig,
    /// Bucket storage settings.
    pub storage: StorageConfig,
    /// Channel to bucket mapping, in join order.
    pub channels: Vec<ChannelBinding>,
}

impl Default for BucketConfig {
    fn default() -> Self {
        Self {
            nick: "bucket".to_string(),
            owner: None,
            ignore: Vec::new(),
            reply_spacing_ms: DEFAULT_REPLY_SPACING_MS,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            irc: IrcConfig::default(),
            storage: StorageConfig::default(),
            channels: Vec::new(),
        }
    }
}

/// IRC server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IrcConfig {
    pub server: String,
    pub port: u16,
    /// Optional server password (PASS).
    pub password: Option<String>,
}

impl Default for IrcConfig {
    fn default() -> Self {
        Self {
            server: "irc.libera.chat".to_string(),
            port: 6667,
            password: None,
        }
    }
}

/// Which backend holds the buckets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Process-local maps, lost on exit.
    Memory,
    /// A single SQLite file shared by all buckets.
    #[default]
    Sqlite,
}

/// Storage settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// SQLite file path. Defaults to `~/.bucket/buckets.db`.
    pub path: Option<PathBuf>,
    /// Declared bucket names. When non-empty, every channel must map to one of them.
    pub buckets: Vec<String>,
}

/// One `{channel: bucket}` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelBinding {
    pub channel: String,
    pub bucket: String,
}

impl BucketConfig {
    /// Check the configuration for mistakes that would otherwise surface at runtime.
    pub fn validate(&self) -> BucketResult<()> {
        if self.nick.trim().is_empty() {
            return Err(BucketError::Config("nick must not be empty".into()));
        }
        if self.history_capacity == 0 {
            return Err(BucketError::Config(
                "history_capacity must be at least 1".into(),
            ));
        }

        let declared: HashSet<&str> = self.storage.buckets.iter().map(String::as_str).collect();
        let mut seen = HashSet::new();
        for binding in &self.channels {
            if binding.channel.trim().is_empty() {
                return Err(BucketError::Config("channel name must not be empty".into()));
            }
            if binding.bucket.trim().is_empty() {
                return Err(BucketError::Config(format!(
                    "channel {} maps to an empty bucket name",
                    binding.channel
                )));
            }
            if !seen.insert(binding.channel.to_lowercase()) {
                return Err(BucketError::Config(format!(
                    "channel {} is configured twice",
                    binding.channel
                )));
            }
            if !declared.is_empty() && !declared.contains(binding.bucket.as_str()) {
                return Err(BucketError::Config(format!(
                    "channel {} references unknown bucket {}",
                    binding.channel, binding.bucket
                )));
            }
        }
        Ok(())
    }

    /// Monitored channel names, in join order.
    pub fn channel_names(&self) -> Vec<String> {
        self.channels.iter().map(|b| b.channel.clone()).collect()
    }

    /// Distinct bucket names referenced by the channel map.
    pub fn bucket_names(&self) -> BTreeSet<String> {
        self.channels.iter().map(|b| b.bucket.clone()).collect()
    }

    pub fn reply_spacing(&self) -> Duration {
        Duration::from_millis(self.reply_spacing_ms)
    }

    /// Whether `nick` is on the ignore list.
    pub fn is_ignored(&self, nick: &str) -> bool {
        self.ignore.iter().any(|n| n.eq_ignore_ascii_case(nick))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binding(channel: &str, bucket: &str) -> ChannelBinding {
        ChannelBinding {
            channel: channel.to_string(),
            bucket: bucket.to_string(),
        }
    }

    #[test]
    fn test_defaults() {
        let config = BucketConfig::default();
        assert_eq!(config.nick, "bucket");
        assert_eq!(config.reply_spacing(), Duration::from_secs(1));
        assert_eq!(config.history_capacity, 100);
        assert_eq!(config.storage.backend, StorageBackend::Sqlite);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_toml() {
        let config: BucketConfig = toml::from_str(
            r##"
            nick = "bukkit"
            owner = "admin.example.org"
            ignore = ["otherbot"]

            [storage]
            backend = "memory"

            [[channels]]
            channel = "#a"
            bucket = "main"

            [[channels]]
            channel = "#b"
            bucket = "main"
            "##,
        )
        .unwrap();
        assert_eq!(config.nick, "bukkit");
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.channel_names(), vec!["#a", "#b"]);
        assert_eq!(config.bucket_names().len(), 1);
        assert!(config.is_ignored("OtherBot"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_duplicate_channel() {
        let config = BucketConfig {
            channels: vec![binding("#a", "one"), binding("#A", "two")],
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("configured twice"));
    }

    #[test]
    fn test_rejects_undeclared_bucket() {
        let mut config = BucketConfig {
            channels: vec![binding("#a", "one")],
            ..Default::default()
        };
        config.storage.buckets = vec!["two".to_string()];
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("unknown bucket"));

        config.storage.buckets.push("one".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_empty_names() {
        let config = BucketConfig {
            channels: vec![binding("#a", " ")],
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = BucketConfig {
            nick: String::new(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
