use serde::{Deserialize, Serialize};

/// Configuration for query compilation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Fold constant sub-expressions during compilation.
    pub optimize: bool,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self { optimize: true }
    }
}

impl QueryConfig {
    /// Compile expressions exactly as written.
    pub fn unoptimized() -> Self {
        Self { optimize: false }
    }
}
