use serde::{Deserialize, Serialize};

/// Configuration for the persistence layer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistConfig {
    /// When `true`, storing a serialized form into a type other than the one
    /// it was produced from is an error. When `false`, values are matched to
    /// the target type's members by name and unknown members are skipped.
    pub strict_forms: bool,
}

impl Default for PersistConfig {
    fn default() -> Self {
        Self { strict_forms: true }
    }
}

impl PersistConfig {
    /// Accept forms produced by other (e.g. older) versions of a type.
    pub fn lenient() -> Self {
        Self {
            strict_forms: false,
        }
    }
}
