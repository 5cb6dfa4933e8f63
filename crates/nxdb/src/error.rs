use std::path::PathBuf;

use nxdb_persist::PersistError;
use nxdb_query::QueryError;
use nxdb_tree::TreeError;
use nxdb_update::UpdateError;

/// Errors loading or writing configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("cannot serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Errors from any layer of a [`Database`](crate::Database).
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("tree error: {0}")]
    Tree(#[from] TreeError),

    #[error("persistence error: {0}")]
    Persist(#[from] PersistError),

    #[error("update error: {0}")]
    Update(#[from] UpdateError),

    #[error("query error: {0}")]
    Query(#[from] QueryError),
}

pub type ConfigResult<T> = Result<T, ConfigError>;
pub type DatabaseResult<T> = Result<T, DatabaseError>;
