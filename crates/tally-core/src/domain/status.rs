//! ステータスの状態機械（ジョブ・プッシュバッチ）

use serde::{Deserialize, Serialize};

/// Lifecycle of a background job record.
///
/// State transitions:
/// - (none) -> Running -> Succeeded
/// - (none) -> Running -> Failed
///
/// There is no pending state: the record is created already running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Running,
    Succeeded,
    Failed,
}

impl JobState {
    /// Is this a terminal state (no further transitions)?
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Succeeded | JobState::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Running => "running",
            JobState::Succeeded => "succeeded",
            JobState::Failed => "failed",
        }
    }
}

/// Lifecycle of a push batch record.
///
/// State transitions:
/// - Pending -> Running -> Succeeded
/// - Pending -> Running -> Failed
/// - Pending -> Failed (the batch failed before any installation was targeted)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PushState {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl PushState {
    pub fn is_terminal(self) -> bool {
        matches!(self, PushState::Succeeded | PushState::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PushState::Pending => "pending",
            PushState::Running => "running",
            PushState::Succeeded => "succeeded",
            PushState::Failed => "failed",
        }
    }
}
