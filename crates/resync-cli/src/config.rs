//! Configuration file handling for resync.
//!
//! Looks for `.config/resync.toml` in the current directory or any parent directory.
//! Every setting can also come from the command line or the environment, which
//! take precedence over the file.

use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use thiserror::Error;

const CONFIG_FILE: &str = ".config/resync.toml";

/// Connection settings. Every field is optional so layers can be stacked.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// URL of the database whose schema is the desired state
    pub reference_url: Option<String>,
    /// URL of the database to bring up to date
    pub target_url: Option<String>,
    /// Namespace (Postgres schema) to compare on both sides
    pub namespace: Option<String>,
}

impl Config {
    /// Fill every unset field from `fallback`.
    pub fn or(self, fallback: Config) -> Config {
        Config {
            reference_url: self.reference_url.or(fallback.reference_url),
            target_url: self.target_url.or(fallback.target_url),
            namespace: self.namespace.or(fallback.namespace),
        }
    }

    pub fn reference_url(&self) -> Result<&str, ConfigError> {
        self.reference_url.as_deref().ok_or(ConfigError::Missing {
            flag: "--reference-url",
            env: "RESYNC_REFERENCE_URL",
            key: "reference_url",
        })
    }

    pub fn target_url(&self) -> Result<&str, ConfigError> {
        self.target_url.as_deref().ok_or(ConfigError::Missing {
            flag: "--target-url",
            env: "RESYNC_TARGET_URL",
            key: "target_url",
        })
    }

    pub fn namespace(&self) -> &str {
        self.namespace.as_deref().unwrap_or("public")
    }
}

/// Load configuration from `.config/resync.toml`, searching up the directory tree.
///
/// A missing file is not an error; it just contributes nothing.
pub fn load() -> Result<Option<(Config, Utf8PathBuf)>, ConfigError> {
    let cwd = std::env::current_dir().map_err(|e| ConfigError::Io {
        path: ".".into(),
        source: e,
    })?;
    let cwd = Utf8PathBuf::from_path_buf(cwd).map_err(ConfigError::NonUtf8Path)?;
    load_from(&cwd)
}

/// Load configuration starting from a specific directory.
pub fn load_from(start: &Utf8Path) -> Result<Option<(Config, Utf8PathBuf)>, ConfigError> {
    let Some(config_path) = find_config_file(start) else {
        return Ok(None);
    };

    let content = std::fs::read_to_string(&config_path).map_err(|source| ConfigError::Io {
        path: config_path.clone(),
        source,
    })?;
    let config = parse(&content).map_err(|source| ConfigError::Parse {
        path: config_path.clone(),
        source,
    })?;

    tracing::debug!(path = %config_path, "loaded config file");
    Ok(Some((config, config_path)))
}

fn parse(content: &str) -> Result<Config, toml::de::Error> {
    toml::from_str(content)
}

/// Find `.config/resync.toml` by searching up the directory tree.
fn find_config_file(start: &Utf8Path) -> Option<Utf8PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(CONFIG_FILE))
        .find(|path| path.is_file())
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: Utf8PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("current directory is not valid UTF-8: {}", .0.display())]
    NonUtf8Path(std::path::PathBuf),

    #[error("no {key} configured (use {flag}, {env}, or `{key}` in .config/resync.toml)")]
    Missing {
        flag: &'static str,
        env: &'static str,
        key: &'static str,
    },
}
