//! Fact: a declared value for a field of a business entity.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ActBase;
use crate::entity::EntityRef;

/// How a fact's value is applied to the field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldOperation {
    /// Replace the field value.
    #[default]
    Set,
    /// Append to a list-valued field.
    Append,
    /// Add to a numeric field.
    Increment,
    /// Subtract from a numeric field.
    Decrement,
    /// Remove the field.
    Delete,
    /// Merge into an object-valued field.
    Merge,
}

/// Validation state of a fact's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    /// Not yet validated.
    #[default]
    Pending,
    /// Passed validation.
    Valid,
    /// Failed validation; see `validation_errors`.
    Invalid,
    /// Some parts passed.
    Partial,
}

/// Declares information provided during the conversation.
///
/// # Examples
///
/// ```
/// use astra::{EntityRef, Fact, FieldOperation};
/// use serde_json::json;
///
/// let fact = Fact::new("customer_1", EntityRef::from("order_1"), "quantity", json!(2))
///     .with_operation(FieldOperation::Increment);
/// assert_eq!(fact.operation, FieldOperation::Increment);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fact {
    /// Shared act fields.
    #[serde(flatten)]
    pub base: ActBase,

    /// Entity being modified.
    #[serde(default)]
    pub entity: EntityRef,

    /// Field being set.
    #[serde(default)]
    pub field: String,

    /// Value assigned to the field; must not be null.
    #[serde(default)]
    pub value: Value,

    /// How `value` is applied to the field.
    #[serde(default)]
    pub operation: FieldOperation,

    /// Value before this fact, for audit trails. Null means not recorded.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub previous_value: Value,

    /// Result of checking `value`.
    #[serde(default)]
    pub validation_status: ValidationStatus,

    /// Reasons the value failed validation.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validation_errors: Vec<String>,
}

impl Fact {
    /// Creates a Fact with a fresh id, stamped now.
    #[must_use]
    pub fn new(
        speaker: impl Into<String>,
        entity: impl Into<EntityRef>,
        field: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        Self::from_base(ActBase::new(speaker), entity, field, value)
    }

    /// Creates a Fact on an explicit base.
    #[must_use]
    pub fn from_base(
        base: ActBase,
        entity: impl Into<EntityRef>,
        field: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        Self {
            base,
            entity: entity.into(),
            field: field.into(),
            value: value.into(),
            operation: FieldOperation::default(),
            previous_value: Value::Null,
            validation_status: ValidationStatus::default(),
            validation_errors: Vec::new(),
        }
    }

    /// Sets the operation.
    #[must_use]
    pub const fn with_operation(mut self, operation: FieldOperation) -> Self {
        self.operation = operation;
        self
    }

    /// Records the previous value.
    #[must_use]
    pub fn with_previous_value(mut self, previous: impl Into<Value>) -> Self {
        self.previous_value = previous.into();
        self
    }

    /// Marks the fact valid.
    #[must_use]
    pub fn validated(mut self) -> Self {
        self.validation_status = ValidationStatus::Valid;
        self.validation_errors.clear();
        self
    }

    /// Marks the fact invalid with the given reasons.
    #[must_use]
    pub fn rejected<I, S>(mut self, errors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.validation_status = ValidationStatus::Invalid;
        self.validation_errors = errors.into_iter().map(Into::into).collect();
        self
    }
}
