//! Error acts: failures reported inside the conversation.

use serde::{Deserialize, Serialize};

use super::ActBase;

/// Severity of an error act.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSeverity {
    /// Informational.
    Info,
    /// Degraded but continuing.
    Warning,
    /// The current step failed.
    #[default]
    Error,
    /// The conversation cannot continue safely.
    Critical,
}

/// Classification of an error act.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Input failed validation.
    Validation,
    /// Internal processing failed.
    Processing,
    /// An external system failed.
    Integration,
    /// Something took too long.
    Timeout,
    /// Not allowed.
    Permission,
    /// Platform failure.
    System,
    /// The participant's input could not be used.
    UserInput,
    /// A business rule was violated.
    BusinessRule,
}

/// Suggested recovery for an error act.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestedAction {
    /// Try again.
    Retry,
    /// Hand over to a human.
    Escalate,
    /// Continue as if nothing happened.
    Ignore,
    /// Ask the participant to clarify.
    Clarify,
    /// Use an alternative path.
    Fallback,
    /// End the conversation.
    Terminate,
}

/// Reports a failure or exception during conversational processing.
///
/// Named `ErrorAct` to keep it apart from Rust error types; on the wire its
/// discriminator is `"error"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorAct {
    /// Shared act fields.
    #[serde(flatten)]
    pub base: ActBase,

    /// Machine-readable code.
    #[serde(default)]
    pub code: String,

    /// Human-readable message.
    #[serde(default)]
    pub message: String,

    /// Whether the conversation can continue.
    pub recoverable: bool,

    /// How serious the error is.
    #[serde(default)]
    pub severity: ErrorSeverity,

    /// Broad classification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<ErrorCategory>,

    /// Error-specific data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Map<String, serde_json::Value>>,

    /// Act that caused this error; must be a well-formed act id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_act_id: Option<String>,

    /// What the caller should do next.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_action: Option<SuggestedAction>,

    /// Message safe to show to participants.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_message: Option<String>,

    /// Technical trace; never shown to participants.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,
}

impl ErrorAct {
    /// Creates an error act with a fresh id, stamped now.
    #[must_use]
    pub fn new(
        speaker: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
        recoverable: bool,
    ) -> Self {
        Self::from_base(ActBase::new(speaker), code, message, recoverable)
    }

    /// Creates an error act on an explicit base.
    #[must_use]
    pub fn from_base(
        base: ActBase,
        code: impl Into<String>,
        message: impl Into<String>,
        recoverable: bool,
    ) -> Self {
        Self {
            base,
            code: code.into(),
            message: message.into(),
            recoverable,
            severity: ErrorSeverity::default(),
            category: None,
            details: None,
            related_act_id: None,
            suggested_action: None,
            user_message: None,
            stack_trace: None,
        }
    }

    /// Sets the severity.
    #[must_use]
    pub const fn with_severity(mut self, severity: ErrorSeverity) -> Self {
        self.severity = severity;
        self
    }

    /// Sets the category.
    #[must_use]
    pub const fn with_category(mut self, category: ErrorCategory) -> Self {
        self.category = Some(category);
        self
    }

    /// Links the act that caused the error.
    #[must_use]
    pub fn with_related_act(mut self, act_id: impl Into<String>) -> Self {
        self.related_act_id = Some(act_id.into());
        self
    }

    /// Sets the suggested recovery.
    #[must_use]
    pub const fn with_suggested_action(mut self, action: SuggestedAction) -> Self {
        self.suggested_action = Some(action);
        self
    }

    /// Sets the participant-facing message.
    #[must_use]
    pub fn with_user_message(mut self, message: impl Into<String>) -> Self {
        self.user_message = Some(message.into());
        self
    }

    /// Returns true if the error is at least [`ErrorSeverity::Critical`] or
    /// not recoverable.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !self.recoverable || self.severity >= ErrorSeverity::Critical
    }
}
