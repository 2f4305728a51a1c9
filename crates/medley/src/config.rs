//! Startup configuration.
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! working configuration.
//!
//! ```toml
//! [playlist]
//! repeat_one = false
//! repeat_all = true
//!
//! [signals]
//! capacity = 256
//!
//! [persist]
//! compress = true
//! zstd_level = 3
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::signal::DEFAULT_SIGNAL_CAPACITY;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub playlist: PlaylistConfig,
    pub signals: SignalConfig,
    pub persist: PersistConfig,
}

/// Playback repeat flags. `repeat_one` takes precedence over `repeat_all`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaylistConfig {
    pub repeat_one: bool,
    pub repeat_all: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    /// Signals buffered per subscriber before the oldest are dropped.
    pub capacity: usize,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_SIGNAL_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistConfig {
    pub compress: bool,
    pub zstd_level: i32,
}

impl Default for PersistConfig {
    fn default() -> Self {
        Self {
            compress: true,
            zstd_level: 3,
        }
    }
}

impl CoreConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Loads a config file. Missing sections and keys take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_is_default() {
        let config = CoreConfig::from_toml_str("").unwrap();
        assert_eq!(config, CoreConfig::default());
        assert_eq!(config.signals.capacity, 256);
        assert!(config.persist.compress);
        assert!(!config.playlist.repeat_all);
    }

    #[test]
    fn test_partial_sections() {
        let config = CoreConfig::from_toml_str(
            r#"
            [playlist]
            repeat_all = true

            [persist]
            zstd_level = 9
            "#,
        )
        .unwrap();
        assert!(config.playlist.repeat_all);
        assert!(!config.playlist.repeat_one);
        assert_eq!(config.persist.zstd_level, 9);
        assert!(config.persist.compress);
    }

    #[test]
    fn test_parse_error() {
        let err = CoreConfig::from_toml_str("[signals]\ncapacity = \"lots\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[signals]\ncapacity = 16").unwrap();
        let config = CoreConfig::load(file.path()).unwrap();
        assert_eq!(config.signals.capacity, 16);

        let err = CoreConfig::load(file.path().with_extension("missing")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_serialize_roundtrip() {
        let mut config = CoreConfig::default();
        config.playlist.repeat_one = true;
        let text = config.to_toml_string().unwrap();
        assert_eq!(CoreConfig::from_toml_str(&text).unwrap(), config);
    }
}
