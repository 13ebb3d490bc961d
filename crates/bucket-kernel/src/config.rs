//! Configuration loading from `~/.bucket/config.toml`.

use crate::error::KernelResult;
use bucket_types::config::{BucketConfig, StorageBackend};
use bucket_types::error::BucketError;
use std::path::{Path, PathBuf};
use tracing::info;

/// Load the bot configuration from a TOML file.
///
/// A missing file yields the defaults. A file that cannot be read or parsed,
/// or a configuration that fails validation, is an error: the bot should not
/// join channels with a half-understood channel map.
pub fn load_config(path: Option<&Path>) -> KernelResult<BucketConfig> {
    let config_path = path
        .map(|p| p.to_path_buf())
        .unwrap_or_else(default_config_path);

    let mut config = if config_path.exists() {
        let contents = std::fs::read_to_string(&config_path).map_err(BucketError::from)?;
        let config = parse_config(&contents)?;
        info!(path = %config_path.display(), "Loaded configuration");
        config
    } else {
        info!(
            path = %config_path.display(),
            "Config file not found, using defaults"
        );
        BucketConfig::default()
    };

    resolve_storage_path(&mut config);
    config.validate()?;
    Ok(config)
}

/// Parse TOML text into a configuration without validating it.
pub fn parse_config(contents: &str) -> KernelResult<BucketConfig> {
    toml::from_str::<BucketConfig>(contents)
        .map_err(|e| BucketError::Config(format!("invalid config: {e}")).into())
}

/// Give the SQLite backend a file path, expanding a leading `~/`.
fn resolve_storage_path(config: &mut BucketConfig) {
    if config.storage.backend != StorageBackend::Sqlite {
        return;
    }
    let path = match config.storage.path.take() {
        Some(path) => expand_home(&path),
        None => bucket_home().join("buckets.db"),
    };
    config.storage.path = Some(path);
}

fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => dirs::home_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join(rest),
        Err(_) => path.to_path_buf(),
    }
}

/// Get the default config file path.
pub fn default_config_path() -> PathBuf {
    bucket_home().join("config.toml")
}

/// Get the default Bucket home directory.
pub fn bucket_home() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".bucket")
}
