//! Error types for persistence operations.

use nxdb_tree::TreeError;

/// Errors that can occur while building type caches or moving objects
/// to and from elements.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    /// A required member resolved to an empty value during fetch. The target
    /// object was not modified.
    #[error("required member {type_name}::{member} could not be fetched")]
    MissingRequiredMember {
        type_name: &'static str,
        member: String,
    },

    /// A declared member's accessor shape cannot serve its flags.
    #[error("unsupported member kind for {type_name}::{member}: {reason}")]
    UnsupportedMemberKind {
        type_name: &'static str,
        member: String,
        reason: String,
    },

    /// The same member name was registered twice for one type.
    #[error("duplicate member {type_name}::{member}")]
    DuplicateMember {
        type_name: &'static str,
        member: String,
    },

    /// A conversion failed for a specific member.
    #[error("conversion failed for {type_name}::{member}: {reason}")]
    Conversion {
        type_name: &'static str,
        member: String,
        reason: String,
    },

    /// A conversion rejected a value; not yet attributed to a member.
    #[error("invalid value: {0}")]
    InvalidValue(String),

    /// A serialized form does not belong to the type it is stored as.
    #[error("serialized form of {actual} cannot be stored as {expected}")]
    FormMismatch {
        expected: &'static str,
        actual: String,
    },

    /// An object graph refers back to an object that is still being
    /// serialized.
    #[error("cyclic reference while serializing {type_name}")]
    CyclicReference { type_name: &'static str },

    /// Tree engine failure.
    #[error("tree error: {0}")]
    Tree(#[from] TreeError),
}

impl PersistError {
    /// Attribute a member-less conversion error to `type_name::member`.
    pub fn in_member(self, type_name: &'static str, member: &str) -> Self {
        match self {
            Self::InvalidValue(reason) => Self::Conversion {
                type_name,
                member: member.to_string(),
                reason,
            },
            other => other,
        }
    }
}

/// Result alias for persistence operations.
pub type PersistResult<T> = Result<T, PersistError>;
