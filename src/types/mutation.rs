use serde::{Deserialize, Serialize};

/// Lifecycle of an optimistic local mutation.
///
/// A mutation is recorded as `Pending` when applied locally, then moves to
/// `Confirmed` when the backend accepts it or `Failed` once it has been reverted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum MutationState {
    Pending,
    Confirmed,
    Failed(String),
}

impl MutationState {
    pub fn is_failed(&self) -> bool {
        matches!(self, MutationState::Failed(_))
    }
}
