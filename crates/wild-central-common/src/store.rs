//! Loading and persisting the configuration document
//!
//! Writes go through a sibling temp file that is renamed over the target, so a
//! failed save leaves the previous document in place.

use crate::config::Config;
use crate::error::ConfigError;
use crate::Result;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Read and decode the document at `path`, applying listener defaults.
///
/// A missing file is reported as [`ConfigError::NotFound`] so callers can
/// fall back to an empty configuration.
pub async fn load(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    let content = match fs::read_to_string(path).await {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        Err(e) => return Err(ConfigError::io("reading config file", path, e)),
    };

    let mut config = parse(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    config.apply_defaults();

    debug!(path = %path.display(), "Loaded configuration");
    Ok(config)
}

/// Encode `config` as YAML and write it to `path`
pub async fn save(config: &Config, path: impl AsRef<Path>) -> Result<()> {
    let yaml = serde_yaml::to_string(config).map_err(ConfigError::Serialize)?;
    write_atomic(path.as_ref(), yaml.as_bytes()).await
}

/// Write a raw document verbatim, without decoding it first
pub async fn save_raw(content: &[u8], path: impl AsRef<Path>) -> Result<()> {
    write_atomic(path.as_ref(), content).await
}

fn parse(content: &str) -> std::result::Result<Config, serde_yaml::Error> {
    // An empty file is an empty document, not a syntax error
    if content.trim().is_empty() {
        return Ok(Config::default());
    }
    serde_yaml::from_str(content)
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "config".into());
    name.push(".tmp");
    path.with_file_name(name)
}

async fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| ConfigError::io("creating config directory", parent, e))?;
    }

    let tmp = temp_path(path);
    if let Err(e) = fs::write(&tmp, content).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(ConfigError::io("writing config file", &tmp, e));
    }
    if let Err(e) = fs::rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(ConfigError::io("replacing config file", path, e));
    }

    debug!(path = %path.display(), bytes = content.len(), "Saved configuration");
    Ok(())
}
