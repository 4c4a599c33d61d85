//! Ask: a request for missing information.

use serde::{Deserialize, Serialize};

use super::ActBase;
use crate::constraint::{Constraint, ConstraintEngine, ConstraintViolation};

/// Default number of times a question may be re-asked.
pub const DEFAULT_MAX_RETRIES: i64 = 3;

pub(crate) const fn default_max_retries() -> i64 {
    DEFAULT_MAX_RETRIES
}

pub(crate) const fn default_true() -> bool {
    true
}

/// Expected data type of the answer to an [`Ask`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpectedType {
    /// Free text.
    String,
    /// Integer or decimal.
    Number,
    /// Yes or no.
    Boolean,
    /// Structured object.
    Object,
    /// List of values.
    Array,
    /// Calendar date.
    Date,
    /// Email address.
    Email,
    /// Phone number.
    Phone,
    /// Postal address.
    Address,
}

/// Requests information required to complete a business process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ask {
    /// Shared act fields.
    #[serde(flatten)]
    pub base: ActBase,

    /// Field being requested.
    #[serde(default)]
    pub field: String,

    /// Question presented to obtain the information.
    #[serde(default)]
    pub prompt: String,

    /// Rules the answer must satisfy.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<Constraint>,

    /// Whether the process can proceed without an answer.
    #[serde(default = "default_true")]
    pub required: bool,

    /// Shape the answer is expected to have.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_type: Option<ExpectedType>,

    /// Times this question has already been asked.
    #[serde(default)]
    pub retry_count: i64,

    /// Attempts allowed before escalation.
    #[serde(default = "default_max_retries")]
    pub max_retries: i64,
}

impl Ask {
    /// Creates an Ask with a fresh id, stamped now.
    ///
    /// # Examples
    ///
    /// ```
    /// use astra::Ask;
    /// use astra::constraint::Constraint;
    ///
    /// let ask = Ask::new("agent_1", "email", "What's your email?")
    ///     .with_constraint(Constraint::email());
    /// assert!(ask.required);
    /// assert_eq!(ask.max_retries, 3);
    /// ```
    #[must_use]
    pub fn new(speaker: impl Into<String>, field: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self::from_base(ActBase::new(speaker), field, prompt)
    }

    /// Creates an Ask on an explicit base.
    #[must_use]
    pub fn from_base(base: ActBase, field: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            base,
            field: field.into(),
            prompt: prompt.into(),
            constraints: Vec::new(),
            required: true,
            expected_type: None,
            retry_count: 0,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// Adds a constraint.
    #[must_use]
    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// Replaces the constraints.
    #[must_use]
    pub fn with_constraints(mut self, constraints: Vec<Constraint>) -> Self {
        self.constraints = constraints;
        self
    }

    /// Sets whether an answer is required.
    #[must_use]
    pub const fn with_required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// Sets the expected answer type.
    #[must_use]
    pub const fn with_expected_type(mut self, expected_type: ExpectedType) -> Self {
        self.expected_type = Some(expected_type);
        self
    }

    /// Sets the retry counters.
    #[must_use]
    pub const fn with_retries(mut self, retry_count: i64, max_retries: i64) -> Self {
        self.retry_count = retry_count;
        self.max_retries = max_retries;
        self
    }

    /// Returns true once the question has used up its retries.
    #[must_use]
    pub const fn retries_exhausted(&self) -> bool {
        self.retry_count >= self.max_retries
    }

    /// Evaluates this Ask's constraints against a candidate answer.
    #[must_use]
    pub fn check_answer(
        &self,
        engine: &ConstraintEngine,
        answer: &serde_json::Value,
    ) -> Vec<ConstraintViolation> {
        engine.evaluate(&self.constraints, answer)
    }
}
