//! Confirm: verification of understanding before commitment.

use serde::{Deserialize, Serialize};

use super::ActBase;
use crate::entity::EntityRef;

/// How a confirmation was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationMethod {
    /// Spoken agreement.
    Verbal,
    /// Button, checkbox or typed "yes".
    Explicit,
    /// Inferred from continued interaction.
    Implicit,
    /// No response before the timeout.
    Timeout,
    /// Confirmed by a backend system.
    System,
}

/// Verifies understanding of information before it is committed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Confirm {
    /// Shared act fields.
    #[serde(flatten)]
    pub base: ActBase,

    /// Entity being confirmed.
    #[serde(default)]
    pub entity: EntityRef,

    /// Human-readable summary of what is being confirmed.
    #[serde(default)]
    pub summary: String,

    /// Whether the confirmation is still pending.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub awaiting: Option<bool>,

    /// Accepted (`true`) or rejected (`false`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmed: Option<bool>,

    /// How the confirmation was given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmation_method: Option<ConfirmationMethod>,

    /// Fields the confirmation covers.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields_confirmed: Vec<String>,

    /// Why the confirmation was rejected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,

    /// How long to wait for an answer, in milliseconds. Passive data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<i64>,
}

impl Confirm {
    /// Creates a pending Confirm with a fresh id, stamped now.
    #[must_use]
    pub fn new(
        speaker: impl Into<String>,
        entity: impl Into<EntityRef>,
        summary: impl Into<String>,
    ) -> Self {
        Self::from_base(ActBase::new(speaker), entity, summary)
    }

    /// Creates a pending Confirm on an explicit base.
    #[must_use]
    pub fn from_base(base: ActBase, entity: impl Into<EntityRef>, summary: impl Into<String>) -> Self {
        Self {
            base,
            entity: entity.into(),
            summary: summary.into(),
            awaiting: Some(true),
            confirmed: None,
            confirmation_method: None,
            fields_confirmed: Vec::new(),
            rejection_reason: None,
            timeout_ms: None,
        }
    }

    /// Records acceptance.
    #[must_use]
    pub const fn accepted(mut self, method: ConfirmationMethod) -> Self {
        self.awaiting = Some(false);
        self.confirmed = Some(true);
        self.confirmation_method = Some(method);
        self
    }

    /// Records rejection with a reason.
    #[must_use]
    pub fn declined(mut self, reason: impl Into<String>) -> Self {
        self.awaiting = Some(false);
        self.confirmed = Some(false);
        self.rejection_reason = Some(reason.into());
        self
    }

    /// Sets the fields covered by this confirmation.
    #[must_use]
    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields_confirmed = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the timeout.
    #[must_use]
    pub const fn with_timeout_ms(mut self, timeout_ms: i64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    /// Returns true if the confirmation is still awaiting an answer.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.awaiting.unwrap_or(self.confirmed.is_none())
    }
}
