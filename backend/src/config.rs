//! Collector configuration.
//!
//! Values come from command-line flags first, then from the environment
//! (a `.env` file is loaded if present).
//!
//! | Variable | Meaning | Default |
//! |----------|---------|---------|
//! | `CLICKMAP_SCHEMA_FILE` | Record schema (Avro-style JSON) | required |
//! | `CLICKMAP_MAPPING_FILE` | Mapping script (JSON) | required |
//! | `CLICKMAP_PORT` | Listener port | 8290 |

use std::env;
use std::path::PathBuf;

use crate::error::{ConfigError, ConfigResult};

pub const SCHEMA_FILE_VAR: &str = "CLICKMAP_SCHEMA_FILE";
pub const MAPPING_FILE_VAR: &str = "CLICKMAP_MAPPING_FILE";
pub const PORT_VAR: &str = "CLICKMAP_PORT";

/// Default listener port
pub const DEFAULT_PORT: u16 = 8290;

#[derive(Debug, Clone, PartialEq)]
pub struct CollectorConfig {
    pub schema_file: PathBuf,
    pub mapping_file: PathBuf,
    pub port: u16,
}

/// Values given on the command line; `None` falls back to the environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub schema_file: Option<PathBuf>,
    pub mapping_file: Option<PathBuf>,
    pub port: Option<u16>,
}

impl CollectorConfig {
    /// Resolve against the process environment
    pub fn from_env(overrides: Overrides) -> ConfigResult<Self> {
        let _ = dotenvy::dotenv();
        Self::resolve(overrides, |name| env::var(name).ok())
    }

    /// Resolve with an explicit variable lookup
    pub fn resolve(
        overrides: Overrides,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> ConfigResult<Self> {
        let path = |given: Option<PathBuf>, var: &str| {
            given
                .or_else(|| lookup(var).filter(|v| !v.trim().is_empty()).map(PathBuf::from))
                .ok_or_else(|| ConfigError::MissingSetting(var.to_string()))
        };

        let schema_file = path(overrides.schema_file, SCHEMA_FILE_VAR)?;
        let mapping_file = path(overrides.mapping_file, MAPPING_FILE_VAR)?;

        let port = match overrides.port {
            Some(port) => port,
            None => match lookup(PORT_VAR) {
                Some(raw) => raw.trim().parse().map_err(|e| ConfigError::InvalidSetting {
                    name: PORT_VAR.to_string(),
                    message: format!("'{}': {}", raw, e),
                })?,
                None => DEFAULT_PORT,
            },
        };

        Ok(Self {
            schema_file,
            mapping_file,
            port,
        })
    }
}
