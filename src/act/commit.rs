//! Commit: execution of a business action in an external system.

use serde::{Deserialize, Serialize};

use super::ask::{default_max_retries, DEFAULT_MAX_RETRIES};
use super::ActBase;
use crate::entity::EntityRef;

/// Action performed in the target system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitAction {
    /// Create a record.
    Create,
    /// Update a record.
    Update,
    /// Delete a record.
    Delete,
    /// Run a process.
    Execute,
    /// Cancel a process.
    Cancel,
    /// Pause a process.
    Pause,
    /// Resume a paused process.
    Resume,
}

/// Status of a commit operation.
///
/// The expected progression is `pending → in_progress → success | failed`,
/// with `failed → retrying → in_progress` while retries remain. The ledger
/// records whatever status a producer reports; [`Self::can_transition_to`]
/// is provided for producers that want to enforce the progression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitStatus {
    /// Not started.
    #[default]
    Pending,
    /// Running in the target system.
    InProgress,
    /// Completed successfully.
    Success,
    /// Failed; may be retried.
    Failed,
    /// Scheduled for another attempt.
    Retrying,
    /// Abandoned.
    Cancelled,
}

impl CommitStatus {
    /// Returns true if no further transition is expected.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Cancelled)
    }

    /// Returns true if moving from `self` to `next` follows the commit
    /// progression, given the attempts used so far.
    ///
    /// # Examples
    ///
    /// ```
    /// use astra::CommitStatus;
    ///
    /// assert!(CommitStatus::Failed.can_transition_to(CommitStatus::Retrying, 1, 3));
    /// assert!(!CommitStatus::Failed.can_transition_to(CommitStatus::Retrying, 3, 3));
    /// assert!(CommitStatus::Failed.can_transition_to(CommitStatus::Cancelled, 3, 3));
    /// ```
    #[must_use]
    pub const fn can_transition_to(&self, next: Self, retry_count: i64, max_retries: i64) -> bool {
        match (self, next) {
            (Self::Pending, Self::InProgress | Self::Cancelled)
            | (Self::InProgress, Self::Success | Self::Failed | Self::Cancelled)
            | (Self::Failed, Self::Cancelled)
            | (Self::Retrying, Self::InProgress | Self::Failed | Self::Cancelled) => true,
            (Self::Failed, Self::Retrying) => retry_count < max_retries,
            _ => false,
        }
    }
}

/// Error reported by the target system for a failed commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitError {
    /// Error code from the target system.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Error-specific data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Map<String, serde_json::Value>>,
    /// Whether a retry may succeed.
    pub recoverable: bool,
}

/// Executes a business process or triggers a system integration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commit {
    /// Shared act fields.
    #[serde(flatten)]
    pub base: ActBase,

    /// Entity being committed.
    #[serde(default)]
    pub entity: EntityRef,

    /// Action in the target system. Required; `None` fails validation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<CommitAction>,

    /// Target system (crm, order_management, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    /// Transaction id in the target system.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,

    /// Progress of the commit.
    #[serde(default)]
    pub status: CommitStatus,

    /// Failure details, for failed commits.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<CommitError>,

    /// Attempts made so far.
    #[serde(default)]
    pub retry_count: i64,

    /// Attempts allowed.
    #[serde(default = "default_max_retries")]
    pub max_retries: i64,

    /// Key the target system uses to deduplicate retries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,

    /// What is needed to undo this commit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollback_info: Option<serde_json::Map<String, serde_json::Value>>,
}

impl Commit {
    /// Creates a pending Commit with a fresh id, stamped now.
    ///
    /// # Examples
    ///
    /// ```
    /// use astra::{Commit, CommitAction, CommitStatus};
    ///
    /// let commit = Commit::new("system", "order_1", CommitAction::Create)
    ///     .with_system("order_management")
    ///     .with_status(CommitStatus::Success);
    /// assert_eq!(commit.max_retries, 3);
    /// ```
    #[must_use]
    pub fn new(speaker: impl Into<String>, entity: impl Into<EntityRef>, action: CommitAction) -> Self {
        Self::from_base(ActBase::new(speaker), entity, action)
    }

    /// Creates a pending Commit on an explicit base.
    #[must_use]
    pub fn from_base(base: ActBase, entity: impl Into<EntityRef>, action: CommitAction) -> Self {
        Self {
            base,
            entity: entity.into(),
            action: Some(action),
            system: None,
            transaction_id: None,
            status: CommitStatus::Pending,
            error: None,
            retry_count: 0,
            max_retries: DEFAULT_MAX_RETRIES,
            idempotency_key: None,
            rollback_info: None,
        }
    }

    /// Sets the target system.
    #[must_use]
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Sets the transaction id.
    #[must_use]
    pub fn with_transaction_id(mut self, id: impl Into<String>) -> Self {
        self.transaction_id = Some(id.into());
        self
    }

    /// Sets the status.
    #[must_use]
    pub const fn with_status(mut self, status: CommitStatus) -> Self {
        self.status = status;
        self
    }

    /// Marks the commit failed with the given error.
    #[must_use]
    pub fn with_error(mut self, error: CommitError) -> Self {
        self.status = CommitStatus::Failed;
        self.error = Some(error);
        self
    }

    /// Sets the retry counters.
    #[must_use]
    pub const fn with_retries(mut self, retry_count: i64, max_retries: i64) -> Self {
        self.retry_count = retry_count;
        self.max_retries = max_retries;
        self
    }

    /// Sets the idempotency key.
    #[must_use]
    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    /// Returns true if the commit failed recoverably and retries remain.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.status == CommitStatus::Failed
            && self.error.as_ref().map_or(true, |e| e.recoverable)
            && self.retry_count < self.max_retries
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_status_progression() {
        use CommitStatus::{Cancelled, Failed, InProgress, Pending, Retrying, Success};

        assert!(Pending.can_transition_to(InProgress, 0, 3));
        assert!(InProgress.can_transition_to(Success, 0, 3));
        assert!(InProgress.can_transition_to(Failed, 0, 3));
        assert!(Retrying.can_transition_to(InProgress, 1, 3));
        assert!(!Pending.can_transition_to(Success, 0, 3));
        assert!(!Success.can_transition_to(Failed, 0, 3));
        assert!(!Cancelled.can_transition_to(Pending, 0, 3));
        assert!(Success.is_terminal());
        assert!(!Failed.is_terminal());
    }

    #[test]
    fn test_retry_gated_by_budget() {
        assert!(CommitStatus::Failed.can_transition_to(CommitStatus::Retrying, 2, 3));
        assert!(!CommitStatus::Failed.can_transition_to(CommitStatus::Retrying, 3, 3));
        assert!(CommitStatus::Failed.can_transition_to(CommitStatus::Cancelled, 3, 3));
    }

    #[test]
    fn test_missing_action_decodes_as_none() {
        let commit: Commit = serde_json::from_value(json!({
            "id": "act_3",
            "timestamp": "2025-01-15T14:30:00Z",
            "speaker": "system",
            "entity": "order_1"
        }))
        .unwrap();
        assert!(commit.action.is_none());
        assert_eq!(commit.status, CommitStatus::Pending);
        assert_eq!(commit.max_retries, 3);
    }

    #[test]
    fn test_is_retryable() {
        let err = CommitError {
            code: "TIMEOUT".to_string(),
            message: "upstream timed out".to_string(),
            details: None,
            recoverable: true,
        };
        let commit = Commit::new("system", "order_1", CommitAction::Create).with_error(err.clone());
        assert_eq!(commit.status, CommitStatus::Failed);
        assert!(commit.is_retryable());
        assert!(!commit.clone().with_retries(3, 3).is_retryable());

        let fatal = Commit::new("system", "order_1", CommitAction::Create).with_error(CommitError {
            recoverable: false,
            ..err
        });
        assert!(!fatal.is_retryable());
    }
}
