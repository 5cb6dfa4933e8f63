use serde::{Deserialize, Serialize};

/// Configuration for update scopes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateConfig {
    /// Maximum number of commands one scope may queue. `0` means unbounded.
    pub max_pending_commands: usize,
}

impl UpdateConfig {
    /// Limit each scope to `max` pending commands.
    pub fn bounded(max: usize) -> Self {
        Self {
            max_pending_commands: max,
        }
    }

    /// The pending-command limit, if any.
    pub fn limit(&self) -> Option<usize> {
        (self.max_pending_commands > 0).then_some(self.max_pending_commands)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_unbounded() {
        assert_eq!(UpdateConfig::default().limit(), None);
        assert_eq!(UpdateConfig::bounded(3).limit(), Some(3));
    }
}
