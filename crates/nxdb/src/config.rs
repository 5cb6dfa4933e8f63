use std::path::Path;

use nxdb_persist::PersistConfig;
use nxdb_query::QueryConfig;
use nxdb_update::UpdateConfig;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ConfigError, ConfigResult};

/// Configuration for a [`Database`](crate::Database).
///
/// Every section and key is optional in TOML; missing values take their
/// defaults.
///
/// ```toml
/// [update]
/// max_pending_commands = 1000
///
/// [query]
/// optimize = true
///
/// [persist]
/// strict_forms = false
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NxdbConfig {
    pub update: UpdateConfig,
    pub query: QueryConfig,
    pub persist: PersistConfig,
}

impl NxdbConfig {
    /// Defaults, except that serialized forms from other types are matched by
    /// member name instead of rejected.
    pub fn lenient() -> Self {
        Self {
            persist: PersistConfig::lenient(),
            ..Default::default()
        }
    }

    pub fn from_toml_str(text: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn to_toml(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}
