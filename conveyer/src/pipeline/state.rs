//! Pipeline lifecycle state.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of a pipeline instance: `Idle -> Running -> Terminated`.
///
/// A pipeline runs at most once; there is no transition back to `Idle`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    /// Accepting registrations; `run` has not been called.
    #[default]
    Idle,
    /// Stage tasks are executing.
    Running,
    /// `run` returned; all channels are closed.
    Terminated,
}

impl PipelineState {
    /// Returns true while registrations are accepted.
    #[must_use]
    pub const fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Running => write!(f, "running"),
            Self::Terminated => write!(f, "terminated"),
        }
    }
}
