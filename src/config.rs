//! Server configuration.
//!
//! Read from a TOML file; every field has a default so an empty file is valid.
//!
//! ```toml
//! listen = "0.0.0.0:8080"
//! data_dir = "/var/lib/dendro/tables"
//! dendrogram_dir = "/var/lib/dendro/dendrograms"
//! max_items = 1048576
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::codec::DEFAULT_MAX_ITEMS;

/// File looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "dendro.toml";

/// Errors raised while reading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config file {}", path.display())]
    Read {
        /// File that was read.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML for [`ServerConfig`].
    #[error("failed to parse config file {}", path.display())]
    Parse {
        /// File that was parsed.
        path: PathBuf,
        /// Parser failure.
        #[source]
        source: toml::de::Error,
    },
}

/// Settings of the clustering server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the server listens on.
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Directory holding CSV tables (`<table>.csv`).
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Directory holding persisted dendrograms (`<name>.dendro`).
    #[serde(default = "default_dendrogram_dir")]
    pub dendrogram_dir: PathBuf,

    /// Upper bound on any count or string length decoded from a peer or a file.
    #[serde(default = "default_max_items")]
    pub max_items: usize,
}

fn default_listen() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_dendrogram_dir() -> PathBuf {
    PathBuf::from("dendrograms")
}

fn default_max_items() -> usize {
    DEFAULT_MAX_ITEMS
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            data_dir: default_data_dir(),
            dendrogram_dir: default_dendrogram_dir(),
            max_items: default_max_items(),
        }
    }
}

impl ServerConfig {
    /// Parse a TOML document.
    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load from `path`, or from [`DEFAULT_CONFIG_FILE`] if it exists, or defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::from_file(p),
            None => {
                let local = Path::new(DEFAULT_CONFIG_FILE);
                if local.exists() {
                    Self::from_file(local)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Render as a TOML document.
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        assert_eq!(ServerConfig::from_toml("").unwrap(), ServerConfig::default());
    }

    #[test]
    fn test_partial_document() {
        let cfg = ServerConfig::from_toml("listen = \"0.0.0.0:9000\"\nmax_items = 64\n").unwrap();
        assert_eq!(cfg.listen, "0.0.0.0:9000");
        assert_eq!(cfg.max_items, 64);
        assert_eq!(cfg.data_dir, PathBuf::from("data"));
    }

    #[test]
    fn test_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dendro.toml");
        let cfg = ServerConfig {
            max_items: 10,
            ..ServerConfig::default()
        };
        std::fs::write(&path, cfg.to_toml()).unwrap();
        assert_eq!(ServerConfig::load(Some(&path)).unwrap(), cfg);
    }

    #[test]
    fn test_bad_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "max_items = \"many\"").unwrap();
        assert!(matches!(
            ServerConfig::from_file(&path),
            Err(ConfigError::Parse { .. })
        ));
        assert!(matches!(
            ServerConfig::from_file(dir.path().join("missing.toml")),
            Err(ConfigError::Read { .. })
        ));
    }
}
