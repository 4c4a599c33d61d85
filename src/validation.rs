//! Structural validation of acts.
//!
//! Structural validation checks shape only: required fields are present and
//! non-empty, identifiers are well-formed, counters are non-negative and
//! confidence is in range. It never evaluates an Ask's declared constraints
//! and never applies business rules; that is the constraint engine's job.
//!
//! Validation is fail-fast: the first violation is returned, in a fixed
//! order. Base fields come first (`id`, `speaker`, `confidence`), then the
//! variant's own fields in declaration order.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::act::{Act, ActBase, ActMetadata, ActType, Ask, Commit, Confirm, ErrorAct, Fact};
use crate::config::ValidationConfig;
use crate::entity::EntityRef;
use crate::error::{ValidationError, ValidationErrorKind};
use crate::ids;

/// Top-level fields shared by every act, including the discriminator.
pub const BASE_FIELDS: &[&str] = &[
    "id",
    "timestamp",
    "speaker",
    "type",
    "confidence",
    "source",
    "metadata",
];

const ASK_FIELDS: &[&str] = &[
    "field",
    "prompt",
    "constraints",
    "required",
    "expected_type",
    "retry_count",
    "max_retries",
];

const FACT_FIELDS: &[&str] = &[
    "entity",
    "field",
    "value",
    "operation",
    "previous_value",
    "validation_status",
    "validation_errors",
];

const CONFIRM_FIELDS: &[&str] = &[
    "entity",
    "summary",
    "awaiting",
    "confirmed",
    "confirmation_method",
    "fields_confirmed",
    "rejection_reason",
    "timeout_ms",
];

const COMMIT_FIELDS: &[&str] = &[
    "entity",
    "action",
    "system",
    "transaction_id",
    "status",
    "error",
    "retry_count",
    "max_retries",
    "idempotency_key",
    "rollback_info",
];

const ERROR_FIELDS: &[&str] = &[
    "code",
    "message",
    "recoverable",
    "severity",
    "category",
    "details",
    "related_act_id",
    "suggested_action",
    "user_message",
    "stack_trace",
];

/// Returns the variant-specific top-level fields of `act_type`.
#[must_use]
pub const fn declared_fields(act_type: ActType) -> &'static [&'static str] {
    match act_type {
        ActType::Ask => ASK_FIELDS,
        ActType::Fact => FACT_FIELDS,
        ActType::Confirm => CONFIRM_FIELDS,
        ActType::Commit => COMMIT_FIELDS,
        ActType::Error => ERROR_FIELDS,
    }
}

/// Returns true if `field` is a declared top-level field of `act_type`.
#[must_use]
pub fn is_declared(act_type: ActType, field: &str) -> bool {
    BASE_FIELDS.contains(&field) || declared_fields(act_type).contains(&field)
}

/// Checks that every top-level key of a raw act object is declared for its
/// variant. Keys nested under `metadata` are not inspected.
///
/// # Errors
///
/// Returns an [`ValidationErrorKind::UnknownField`] error naming the first
/// undeclared key, in map iteration order.
pub fn check_declared_fields(act_type: ActType, object: &Map<String, Value>) -> Result<(), ValidationError> {
    match object.keys().find(|k| !is_declared(act_type, k)) {
        Some(field) => Err(ValidationError::new(
            ValidationErrorKind::UnknownField,
            field.as_str(),
            format!("{field} is not a field of {act_type} acts"),
            object.get(field).cloned().unwrap_or(Value::Null),
        )),
        None => Ok(()),
    }
}

/// Rejects extension keys that name a typed field of the same object.
///
/// Such a key would serialize next to the typed field under the same name
/// and be read back into it, so the value could not survive a round trip.
///
/// # Errors
///
/// Returns a [`ValidationErrorKind::Duplicate`] error on `{prefix}.{key}`
/// for the first shadowing key.
pub fn check_extension_keys(
    prefix: &str,
    extensions: &BTreeMap<String, Value>,
    typed: &[&str],
) -> Result<(), ValidationError> {
    match extensions.iter().find(|(k, _)| typed.contains(&k.as_str())) {
        Some((key, value)) => Err(ValidationError::new(
            ValidationErrorKind::Duplicate,
            format!("{prefix}.{key}"),
            format!("{key} is a typed field and cannot be an extension key"),
            value.clone(),
        )),
        None => Ok(()),
    }
}

/// Validate a required text field.
fn validate_non_empty(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::missing(field, value));
    }
    Ok(())
}

fn validate_non_negative(field: &'static str, value: i64) -> Result<(), ValidationError> {
    if value < 0 {
        return Err(ValidationError::negative(field, value));
    }
    Ok(())
}

fn validate_entity(entity: &EntityRef) -> Result<(), ValidationError> {
    entity
        .resolve()
        .map(|_| ())
        .map_err(|_| ValidationError::missing("entity", entity.to_json()))
}

fn validate_act_id(field: &'static str, id: &str) -> Result<(), ValidationError> {
    if !ids::is_valid_act_id(id) {
        return Err(ValidationError::invalid_format(
            field,
            "invalid act ID format",
            id,
        ));
    }
    Ok(())
}

fn validate_confidence_range(confidence: Option<f64>) -> Result<(), ValidationError> {
    if let Some(v) = confidence {
        if !(0.0..=1.0).contains(&v) {
            return Err(ValidationError::new(
                ValidationErrorKind::OutOfRange,
                "confidence",
                "confidence must be between 0.0 and 1.0",
                // NaN and infinities have no JSON form.
                serde_json::Number::from_f64(v).map_or(Value::Null, Value::Number),
            ));
        }
    }
    Ok(())
}

/// Fail-fast structural validator.
///
/// # Examples
///
/// ```
/// use astra::{Ask, StructuralValidator};
///
/// let validator = StructuralValidator::new();
/// let ask = Ask::new("agent_1", "", "");
/// let err = validator.validate(&ask.into()).unwrap_err();
/// assert_eq!(err.field, "field");
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StructuralValidator {
    config: ValidationConfig,
}

impl StructuralValidator {
    /// Creates a validator with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a validator from configuration.
    #[must_use]
    pub const fn with_config(config: ValidationConfig) -> Self {
        Self { config }
    }

    /// Returns the active configuration.
    #[must_use]
    pub const fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// Validates an act, returning the first violation.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] in check order.
    pub fn validate(&self, act: &Act) -> Result<(), ValidationError> {
        self.validate_base(act.base())?;
        match act {
            Act::Ask(a) => self.validate_ask(a),
            Act::Fact(a) => Self::validate_fact(a),
            Act::Confirm(a) => self.validate_confirm(a),
            Act::Commit(a) => Self::validate_commit(a),
            Act::Error(a) => self.validate_error(a),
        }
    }

    fn validate_text_len(&self, field: &'static str, value: &str) -> Result<(), ValidationError> {
        let Some(max) = self.config.max_text_len else {
            return Ok(());
        };
        let len = value.chars().count();
        if len > max {
            return Err(ValidationError::new(
                ValidationErrorKind::TooLong,
                field,
                format!("{field} is {len} characters; maximum is {max}"),
                len,
            ));
        }
        Ok(())
    }

    fn validate_base(&self, base: &ActBase) -> Result<(), ValidationError> {
        if base.id.is_empty() {
            return Err(ValidationError::missing("id", ""));
        }
        validate_act_id("id", &base.id)?;
        validate_non_empty("speaker", &base.speaker)?;
        validate_confidence_range(base.confidence)?;
        if let Some(metadata) = &base.metadata {
            check_extension_keys("metadata", &metadata.extensions, ActMetadata::FIELDS)?;
            if let Some(text) = metadata.original_text.as_deref() {
                self.validate_text_len("original_text", text)?;
            }
        }
        Ok(())
    }

    fn validate_ask(&self, ask: &Ask) -> Result<(), ValidationError> {
        validate_non_empty("field", &ask.field)?;
        validate_non_empty("prompt", &ask.prompt)?;
        self.validate_text_len("prompt", &ask.prompt)?;
        validate_non_negative("retry_count", ask.retry_count)?;
        validate_non_negative("max_retries", ask.max_retries)?;
        Ok(())
    }

    fn validate_fact(fact: &Fact) -> Result<(), ValidationError> {
        validate_entity(&fact.entity)?;
        validate_non_empty("field", &fact.field)?;
        if fact.value.is_null() {
            return Err(ValidationError::missing("value", Value::Null));
        }
        Ok(())
    }

    fn validate_confirm(&self, confirm: &Confirm) -> Result<(), ValidationError> {
        validate_entity(&confirm.entity)?;
        validate_non_empty("summary", &confirm.summary)?;
        self.validate_text_len("summary", &confirm.summary)?;
        if let Some(timeout) = confirm.timeout_ms {
            validate_non_negative("timeout_ms", timeout)?;
        }
        Ok(())
    }

    fn validate_commit(commit: &Commit) -> Result<(), ValidationError> {
        validate_entity(&commit.entity)?;
        if commit.action.is_none() {
            return Err(ValidationError::missing("action", Value::Null));
        }
        validate_non_negative("retry_count", commit.retry_count)?;
        validate_non_negative("max_retries", commit.max_retries)?;
        Ok(())
    }

    fn validate_error(&self, error: &ErrorAct) -> Result<(), ValidationError> {
        validate_non_empty("code", &error.code)?;
        validate_non_empty("message", &error.message)?;
        self.validate_text_len("message", &error.message)?;
        if let Some(related) = &error.related_act_id {
            validate_act_id("related_act_id", related)?;
        }
        if let Some(user_message) = &error.user_message {
            self.validate_text_len("user_message", user_message)?;
        }
        Ok(())
    }
}

/// Validates an act with default settings.
///
/// # Errors
///
/// See [`StructuralValidator::validate`].
pub fn validate(act: &Act) -> Result<(), ValidationError> {
    StructuralValidator::new().validate(act)
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    use super::*;
    use crate::act::{CommitAction, CommitStatus};
    use crate::entity::Entity;

    fn base(id: &str) -> ActBase {
        ActBase::from_parts(id, Utc.with_ymd_and_hms(2025, 1, 15, 14, 30, 0).unwrap(), "agent_1")
    }

    #[test]
    fn test_ask_reports_field_before_prompt() {
        let act: Act = Ask::from_base(base("act_1"), "", "").into();
        let err = validate(&act).unwrap_err();
        assert_eq!(err.field, "field");
        assert_eq!(err.kind, ValidationErrorKind::Missing);
    }

    #[test]
    fn test_ask_order() {
        let act: Act = Ask::from_base(base("act_1"), "email", "").into();
        assert_eq!(validate(&act).unwrap_err().field, "prompt");

        let act: Act = Ask::from_base(base("act_1"), "email", "Email?")
            .with_retries(-1, -1)
            .into();
        assert_eq!(validate(&act).unwrap_err().field, "retry_count");

        let act: Act = Ask::from_base(base("act_1"), "email", "Email?")
            .with_retries(0, -1)
            .into();
        assert_eq!(validate(&act).unwrap_err().field, "max_retries");
    }

    #[test]
    fn test_base_checks_come_first() {
        let act: Act = Ask::from_base(base("ask_1"), "", "").into();
        let err = validate(&act).unwrap_err();
        assert_eq!(err.field, "id");
        assert_eq!(err.kind, ValidationErrorKind::InvalidFormat);

        let act: Act = Ask::from_base(base(""), "email", "Email?").into();
        assert_eq!(validate(&act).unwrap_err().kind, ValidationErrorKind::Missing);

        let mut b = base("act_1");
        b.speaker = String::new();
        let act: Act = Ask::from_base(b, "", "").into();
        assert_eq!(validate(&act).unwrap_err().field, "speaker");
    }

    #[test]
    fn test_metadata_extension_cannot_shadow_typed_field() {
        let mut metadata = ActMetadata::default().with_channel("voice");
        metadata.extensions.insert("channel".to_string(), json!("sms"));
        let act: Act = Ask::from_base(base("act_1").with_metadata(metadata), "email", "Email?").into();
        let err = validate(&act).unwrap_err();
        assert_eq!(err.field, "metadata.channel");
        assert_eq!(err.kind, ValidationErrorKind::Duplicate);

        let tagged = ActMetadata::default().with_extension("sentiment", "positive");
        let act: Act = Ask::from_base(base("act_1").with_metadata(tagged), "email", "Email?").into();
        assert!(validate(&act).is_ok());
    }

    #[test]
    fn test_confidence_range() {
        for bad in [-0.1, 1.1, f64::NAN] {
            let act: Act = Ask::from_base(base("act_1").with_confidence(bad), "email", "Email?").into();
            let err = validate(&act).unwrap_err();
            assert_eq!(err.field, "confidence");
            assert_eq!(err.kind, ValidationErrorKind::OutOfRange);
        }
        for good in [0.0, 0.5, 1.0] {
            let act: Act = Ask::from_base(base("act_1").with_confidence(good), "email", "Email?").into();
            assert!(validate(&act).is_ok());
        }
    }

    #[test]
    fn test_fact_order() {
        let act: Act = Fact::from_base(base("act_2"), "", "", Value::Null).into();
        assert_eq!(validate(&act).unwrap_err().field, "entity");

        let act: Act = Fact::from_base(base("act_2"), Entity::new("", "order"), "size", json!(1)).into();
        let err = validate(&act).unwrap_err();
        assert_eq!(err.field, "entity");
        assert_eq!(err.value["type"], "order");

        let act: Act = Fact::from_base(base("act_2"), "order_1", "size", Value::Null).into();
        assert_eq!(validate(&act).unwrap_err().field, "value");

        // Falsy but present values are fine.
        let act: Act = Fact::from_base(base("act_2"), "order_1", "gift", json!(false)).into();
        assert!(validate(&act).is_ok());
    }

    #[test]
    fn test_confirm_order() {
        let act: Act = Confirm::from_base(base("act_3"), "order_1", "").into();
        assert_eq!(validate(&act).unwrap_err().field, "summary");

        let act: Act = Confirm::from_base(base("act_3"), "order_1", "Confirm?")
            .with_timeout_ms(-5)
            .into();
        let err = validate(&act).unwrap_err();
        assert_eq!(err.field, "timeout_ms");
        assert_eq!(err.value, json!(-5));
    }

    #[test]
    fn test_commit_counters() {
        let act: Act = Commit::from_base(base("act_4"), "order_1", CommitAction::Create)
            .with_retries(-1, 3)
            .into();
        assert_eq!(validate(&act).unwrap_err().field, "retry_count");

        let act: Act = Commit::from_base(base("act_4"), "order_1", CommitAction::Create)
            .with_retries(0, 3)
            .with_status(CommitStatus::Success)
            .into();
        assert!(validate(&act).is_ok());
    }

    #[test]
    fn test_commit_missing_action() {
        let mut commit = Commit::from_base(base("act_4"), "order_1", CommitAction::Create);
        commit.action = None;
        assert_eq!(validate(&commit.into()).unwrap_err().field, "action");
    }

    #[test]
    fn test_error_order() {
        let act: Act = ErrorAct::from_base(base("act_5"), "", "", true).into();
        assert_eq!(validate(&act).unwrap_err().field, "code");

        let act: Act = ErrorAct::from_base(base("act_5"), "E1", "", true).into();
        assert_eq!(validate(&act).unwrap_err().field, "message");

        let act: Act = ErrorAct::from_base(base("act_5"), "E1", "boom", true)
            .with_related_act("not-an-act")
            .into();
        let err = validate(&act).unwrap_err();
        assert_eq!(err.field, "related_act_id");
        assert_eq!(err.kind, ValidationErrorKind::InvalidFormat);

        let act: Act = ErrorAct::from_base(base("act_5"), "E1", "boom", true)
            .with_related_act("act_4")
            .into();
        assert!(validate(&act).is_ok());
    }

    #[test]
    fn test_constraints_are_not_evaluated() {
        use crate::constraint::Constraint;
        let act: Act = Ask::from_base(base("act_1"), "email", "Email?")
            .with_constraint(Constraint::pattern("([unclosed"))
            .into();
        assert!(validate(&act).is_ok());
    }

    #[test]
    fn test_max_text_len() {
        let validator = StructuralValidator::with_config(ValidationConfig {
            max_text_len: Some(10),
            ..ValidationConfig::default()
        });
        let act: Act = Ask::from_base(base("act_1"), "email", "What is your email address?").into();
        let err = validator.validate(&act).unwrap_err();
        assert_eq!(err.field, "prompt");
        assert_eq!(err.kind, ValidationErrorKind::TooLong);

        // Default is unbounded.
        assert!(validate(&act).is_ok());
    }

    #[test]
    fn test_check_declared_fields() {
        let raw = json!({
            "id": "act_1",
            "type": "ask",
            "timestamp": "2025-01-15T14:30:00Z",
            "speaker": "agent_1",
            "field": "email",
            "prompt": "Email?",
            "metadata": {"anything": true}
        });
        assert!(check_declared_fields(ActType::Ask, raw.as_object().unwrap()).is_ok());

        let mut with_extra = raw.as_object().unwrap().clone();
        with_extra.insert("priority".to_string(), json!("high"));
        let err = check_declared_fields(ActType::Ask, &with_extra).unwrap_err();
        assert_eq!(err.field, "priority");
        assert_eq!(err.kind, ValidationErrorKind::UnknownField);

        // A field declared on another variant is still unknown here.
        assert!(!is_declared(ActType::Ask, "entity"));
        assert!(is_declared(ActType::Fact, "entity"));
    }
}
