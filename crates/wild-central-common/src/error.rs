use std::path::PathBuf;
use thiserror::Error;

/// Errors from loading or persisting the configuration document
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file does not exist yet
    #[error("configuration file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The file exists but is not a valid configuration document
    #[error("parsing config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// The in-memory document could not be encoded
    #[error("marshaling config: {0}")]
    Serialize(#[source] serde_yaml::Error),

    /// Any other filesystem failure
    #[error("{action} {}: {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    /// True when the document is absent rather than broken
    pub fn is_not_found(&self) -> bool {
        matches!(self, ConfigError::NotFound(_))
    }

    pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConfigError::Io {
            action,
            path: path.into(),
            source,
        }
    }
}
