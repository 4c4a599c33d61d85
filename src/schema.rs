//! Named JSON document schemas.
//!
//! The registry carries one descriptor per published document type (`act`,
//! the five act variants, `entity`, `participant`, `constraint` and
//! `conversation`) and checks raw JSON against it before any typed decoding:
//! required keys must be present, and each declared property that is present
//! must have the right JSON type and satisfy its `const`, `enum`, `pattern`,
//! `format`, numeric bounds and minimum item count.
//!
//! Only top-level properties are checked. Undeclared keys are left to the
//! codec's unknown-field policy.

use std::fmt;

use serde_json::{Map, Value};

use crate::constraint::{FormatType, PatternCache};
use crate::error::{AstraError, AstraResult, ValidationError, ValidationErrorKind};
use crate::ids::{ACT_ID_PATTERN, CONVERSATION_ID_PATTERN};

/// Version of every published schema.
pub const SCHEMA_VERSION: &str = "v1";

const LANGUAGE_PATTERN: &str = "^[a-z]{2}(-[A-Z]{2})?$";

const ACT_TYPES: &[&str] = &["ask", "fact", "confirm", "commit", "error"];
const ACT_SOURCES: &[&str] = &["human", "speech_recognition", "text_analysis", "system", "ai"];
const CONSTRAINT_TYPES: &[&str] = &[
    "required",
    "optional",
    "min_length",
    "max_length",
    "pattern",
    "format",
    "range",
    "enum",
    "custom",
];

/// JSON value type named by a property descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonType {
    /// A JSON string.
    String,
    /// Any JSON number.
    Number,
    /// A number with no fractional part.
    Integer,
    /// `true` or `false`.
    Boolean,
    /// A JSON object.
    Object,
    /// A JSON array.
    Array,
}

impl JsonType {
    fn matches(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Integer => {
                value.is_i64() || value.is_u64() || value.as_f64().is_some_and(|f| f.fract() == 0.0)
            }
            Self::Boolean => value.is_boolean(),
            Self::Object => value.is_object(),
            Self::Array => value.is_array(),
        }
    }

    const fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
        }
    }
}

impl fmt::Display for JsonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Rules for one top-level property.
#[derive(Debug, Clone, Copy)]
pub struct PropertySchema {
    /// Property name.
    pub name: &'static str,
    /// Accepted JSON types; empty accepts anything.
    pub types: &'static [JsonType],
    /// Exact string the value must equal.
    pub constant: Option<&'static str>,
    /// Allowed string values; empty allows any.
    pub allowed: &'static [&'static str],
    /// Regular expression a string value must match.
    pub pattern: Option<&'static str>,
    /// Named format a string value must satisfy.
    pub format: Option<FormatType>,
    /// Inclusive lower bound for numbers.
    pub minimum: Option<f64>,
    /// Inclusive upper bound for numbers.
    pub maximum: Option<f64>,
    /// Minimum length for arrays.
    pub min_items: Option<usize>,
}

impl PropertySchema {
    const fn any(name: &'static str) -> Self {
        Self {
            name,
            types: &[],
            constant: None,
            allowed: &[],
            pattern: None,
            format: None,
            minimum: None,
            maximum: None,
            min_items: None,
        }
    }

    const fn typed(name: &'static str, types: &'static [JsonType]) -> Self {
        let mut p = Self::any(name);
        p.types = types;
        p
    }

    const fn string(name: &'static str) -> Self {
        Self::typed(name, &[JsonType::String])
    }

    const fn object(name: &'static str) -> Self {
        Self::typed(name, &[JsonType::Object])
    }

    const fn array(name: &'static str) -> Self {
        Self::typed(name, &[JsonType::Array])
    }

    const fn boolean(name: &'static str) -> Self {
        Self::typed(name, &[JsonType::Boolean])
    }

    const fn count(name: &'static str) -> Self {
        Self::typed(name, &[JsonType::Integer]).at_least(0.0)
    }

    const fn one_of(name: &'static str, allowed: &'static [&'static str]) -> Self {
        let mut p = Self::string(name);
        p.allowed = allowed;
        p
    }

    const fn constant(name: &'static str, value: &'static str) -> Self {
        let mut p = Self::any(name);
        p.constant = Some(value);
        p
    }

    const fn matching(mut self, pattern: &'static str) -> Self {
        self.pattern = Some(pattern);
        self
    }

    const fn formatted(mut self, format: FormatType) -> Self {
        self.format = Some(format);
        self
    }

    const fn at_least(mut self, minimum: f64) -> Self {
        self.minimum = Some(minimum);
        self
    }

    const fn at_most(mut self, maximum: f64) -> Self {
        self.maximum = Some(maximum);
        self
    }

    const fn non_empty(mut self) -> Self {
        self.min_items = Some(1);
        self
    }
}

/// A named document schema.
#[derive(Debug, Clone, Copy)]
pub struct Schema {
    /// Schema name, as passed to [`SchemaRegistry::validate_json`].
    pub name: &'static str,
    /// Keys that must be present.
    pub required: &'static [&'static str],
    /// Property descriptors, grouped; groups are checked in order.
    pub groups: &'static [&'static [PropertySchema]],
}

impl Schema {
    /// Iterates over every property descriptor in check order.
    pub fn properties(&self) -> impl Iterator<Item = &PropertySchema> {
        self.groups.iter().flat_map(|g| g.iter())
    }
}

const ACT_COMMON: &[PropertySchema] = &[
    PropertySchema::string("id").matching(ACT_ID_PATTERN),
    PropertySchema::string("timestamp").formatted(FormatType::DateTime),
    PropertySchema::string("speaker"),
    PropertySchema::typed("confidence", &[JsonType::Number])
        .at_least(0.0)
        .at_most(1.0),
    PropertySchema::one_of("source", ACT_SOURCES),
    PropertySchema::object("metadata"),
];

const ENTITY_REF: &[PropertySchema] =
    &[PropertySchema::typed("entity", &[JsonType::String, JsonType::Object])];

const ASK: &[PropertySchema] = &[
    PropertySchema::constant("type", "ask"),
    PropertySchema::string("field"),
    PropertySchema::string("prompt"),
    PropertySchema::array("constraints"),
    PropertySchema::boolean("required"),
    PropertySchema::one_of(
        "expected_type",
        &["string", "number", "boolean", "object", "array", "date", "email", "phone", "address"],
    ),
    PropertySchema::count("retry_count"),
    PropertySchema::count("max_retries"),
];

const FACT: &[PropertySchema] = &[
    PropertySchema::constant("type", "fact"),
    PropertySchema::string("field"),
    PropertySchema::any("value"),
    PropertySchema::one_of(
        "operation",
        &["set", "append", "increment", "decrement", "delete", "merge"],
    ),
    PropertySchema::any("previous_value"),
    PropertySchema::one_of("validation_status", &["pending", "valid", "invalid", "partial"]),
    PropertySchema::array("validation_errors"),
];

const CONFIRM: &[PropertySchema] = &[
    PropertySchema::constant("type", "confirm"),
    PropertySchema::string("summary"),
    PropertySchema::boolean("awaiting"),
    PropertySchema::boolean("confirmed"),
    PropertySchema::one_of(
        "confirmation_method",
        &["verbal", "explicit", "implicit", "timeout", "system"],
    ),
    PropertySchema::array("fields_confirmed"),
    PropertySchema::string("rejection_reason"),
    PropertySchema::count("timeout_ms"),
];

const COMMIT: &[PropertySchema] = &[
    PropertySchema::constant("type", "commit"),
    PropertySchema::one_of(
        "action",
        &["create", "update", "delete", "execute", "cancel", "pause", "resume"],
    ),
    PropertySchema::string("system"),
    PropertySchema::string("transaction_id"),
    PropertySchema::one_of(
        "status",
        &["pending", "in_progress", "success", "failed", "retrying", "cancelled"],
    ),
    PropertySchema::object("error"),
    PropertySchema::count("retry_count"),
    PropertySchema::count("max_retries"),
    PropertySchema::string("idempotency_key"),
    PropertySchema::object("rollback_info"),
];

const ERROR: &[PropertySchema] = &[
    PropertySchema::constant("type", "error"),
    PropertySchema::string("code"),
    PropertySchema::string("message"),
    PropertySchema::boolean("recoverable"),
    PropertySchema::one_of("severity", &["info", "warning", "error", "critical"]),
    PropertySchema::one_of(
        "category",
        &[
            "validation",
            "processing",
            "integration",
            "timeout",
            "permission",
            "system",
            "user_input",
            "business_rule",
        ],
    ),
    PropertySchema::object("details"),
    PropertySchema::string("related_act_id").matching(ACT_ID_PATTERN),
    PropertySchema::one_of(
        "suggested_action",
        &["retry", "escalate", "ignore", "clarify", "fallback", "terminate"],
    ),
    PropertySchema::string("user_message"),
    PropertySchema::string("stack_trace"),
];

const ENTITY: &[PropertySchema] = &[
    PropertySchema::string("id"),
    PropertySchema::string("type"),
    PropertySchema::string("external_id"),
    PropertySchema::string("system"),
    PropertySchema::string("version"),
    PropertySchema::string("schema_url").formatted(FormatType::Url),
    PropertySchema::object("metadata"),
];

const PARTICIPANT: &[PropertySchema] = &[
    PropertySchema::string("id"),
    PropertySchema::one_of("type", &["human", "ai", "system", "bot"]),
    PropertySchema::string("role"),
    PropertySchema::string("name"),
    PropertySchema::string("email").formatted(FormatType::Email),
    PropertySchema::string("phone"),
    PropertySchema::string("external_id"),
    PropertySchema::string("system"),
    PropertySchema::array("capabilities"),
    PropertySchema::array("permissions"),
    PropertySchema::object("preferences"),
    PropertySchema::object("metadata"),
];

const CONSTRAINT: &[PropertySchema] = &[
    PropertySchema::one_of("type", CONSTRAINT_TYPES),
    PropertySchema::any("value"),
    PropertySchema::string("message"),
    PropertySchema::string("code"),
];

const CONVERSATION: &[PropertySchema] = &[
    PropertySchema::string("id").matching(CONVERSATION_ID_PATTERN),
    PropertySchema::array("participants").non_empty(),
    PropertySchema::array("acts"),
    PropertySchema::string("started_at").formatted(FormatType::DateTime),
    PropertySchema::string("ended_at").formatted(FormatType::DateTime),
    PropertySchema::one_of(
        "status",
        &["active", "paused", "completed", "failed", "cancelled"],
    ),
    PropertySchema::string("channel"),
    PropertySchema::string("schema"),
    PropertySchema::object("context"),
    PropertySchema::object("final_state"),
    PropertySchema::object("metadata"),
];

const PARTICIPANT_PREFERENCES: &[PropertySchema] =
    &[PropertySchema::string("language").matching(LANGUAGE_PATTERN)];

const ACT_REQUIRED: &[&str] = &["id", "timestamp", "speaker", "type"];

const SCHEMAS: &[Schema] = &[
    Schema {
        name: "act",
        required: ACT_REQUIRED,
        groups: &[ACT_COMMON, &[PropertySchema::one_of("type", ACT_TYPES)]],
    },
    Schema {
        name: "ask",
        required: &["id", "timestamp", "speaker", "type", "field", "prompt"],
        groups: &[ACT_COMMON, ASK],
    },
    Schema {
        name: "fact",
        required: &["id", "timestamp", "speaker", "type", "entity", "field", "value"],
        groups: &[ACT_COMMON, ENTITY_REF, FACT],
    },
    Schema {
        name: "confirm",
        required: &["id", "timestamp", "speaker", "type", "entity", "summary"],
        groups: &[ACT_COMMON, ENTITY_REF, CONFIRM],
    },
    Schema {
        name: "commit",
        required: &["id", "timestamp", "speaker", "type", "entity", "action"],
        groups: &[ACT_COMMON, ENTITY_REF, COMMIT],
    },
    Schema {
        name: "error",
        required: &["id", "timestamp", "speaker", "type", "code", "message", "recoverable"],
        groups: &[ACT_COMMON, ERROR],
    },
    Schema {
        name: "entity",
        required: &["id", "type"],
        groups: &[ENTITY],
    },
    Schema {
        name: "participant",
        required: &["id", "type"],
        groups: &[PARTICIPANT],
    },
    Schema {
        name: "constraint",
        required: &["type"],
        groups: &[CONSTRAINT],
    },
    Schema {
        name: "conversation",
        required: &["id", "participants", "acts"],
        groups: &[CONVERSATION],
    },
];

/// Registry of the published document schemas.
///
/// Build one and share it by reference; compiled property patterns are
/// cached inside it.
///
/// # Examples
///
/// ```
/// use astra::SchemaRegistry;
/// use serde_json::json;
///
/// let schemas = SchemaRegistry::new();
/// let fact = json!({
///     "id": "act_2",
///     "timestamp": "2025-01-15T14:30:00Z",
///     "speaker": "customer_1",
///     "type": "fact",
///     "entity": {"id": "order_1", "type": "order"},
///     "field": "email",
///     "value": "jane@example.com"
/// });
/// assert!(schemas.validate_json(&fact, "fact").is_ok());
/// assert!(schemas.validate_json(&fact, "ask").is_err());
/// assert!(schemas.validate_json(&fact, "invoice").unwrap_err().to_string().contains("invoice"));
/// ```
pub struct SchemaRegistry {
    patterns: PatternCache,
}

impl fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaRegistry")
            .field("schemas", &self.names())
            .field("cached_patterns", &self.patterns.len())
            .finish()
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaRegistry {
    /// Creates a registry with an empty pattern cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            patterns: PatternCache::new(SCHEMAS.len() * 2),
        }
    }

    /// Schema names, in publication order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        SCHEMAS.iter().map(|s| s.name).collect()
    }

    /// Returns true if a schema called `name` exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Looks up a schema by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&'static Schema> {
        SCHEMAS.iter().find(|s| s.name == name)
    }

    /// Version of the named schema, or `None` if it does not exist.
    #[must_use]
    pub fn version(&self, name: &str) -> Option<&'static str> {
        self.contains(name).then_some(SCHEMA_VERSION)
    }

    /// Checks `document` against the schema called `name`.
    ///
    /// Checks are fail-fast: required keys in declaration order, then
    /// properties in declaration order.
    ///
    /// # Errors
    ///
    /// - [`AstraError::SchemaNotFound`] for an unknown schema name.
    /// - [`AstraError::Validation`] describing the first violation.
    pub fn validate_json(&self, document: &Value, name: &str) -> AstraResult<()> {
        let schema = self.get(name).ok_or_else(|| AstraError::SchemaNotFound {
            name: name.to_string(),
        })?;
        let Value::Object(object) = document else {
            return Err(ValidationError::new(
                ValidationErrorKind::TypeMismatch,
                name,
                format!("expected object, got {}", json_type_name(document)),
                document.clone(),
            )
            .into());
        };

        if let Some(missing) = schema.required.iter().find(|k| !object.contains_key(**k)) {
            return Err(ValidationError::new(
                ValidationErrorKind::Missing,
                *missing,
                format!("required field missing: {missing}"),
                Value::Null,
            )
            .into());
        }

        for property in schema.properties() {
            if let Some(value) = object.get(property.name) {
                self.check_property(property, value)?;
            }
        }

        if name == "participant" {
            self.check_preferences(object)?;
        }
        Ok(())
    }

    fn check_preferences(&self, participant: &Map<String, Value>) -> AstraResult<()> {
        let Some(Value::Object(prefs)) = participant.get("preferences") else {
            return Ok(());
        };
        for property in PARTICIPANT_PREFERENCES {
            if let Some(value) = prefs.get(property.name) {
                self.check_property(property, value).map_err(|e| match e {
                    AstraError::Validation(mut v) => {
                        v.field = format!("preferences.{}", v.field);
                        AstraError::Validation(v)
                    }
                    other => other,
                })?;
            }
        }
        Ok(())
    }

    fn check_property(&self, property: &PropertySchema, value: &Value) -> AstraResult<()> {
        let fail = |kind, message: String| -> AstraResult<()> {
            Err(ValidationError::new(kind, property.name, message, value.clone()).into())
        };

        if !property.types.is_empty() && !property.types.iter().any(|t| t.matches(value)) {
            let expected: Vec<&str> = property.types.iter().map(|t| t.as_str()).collect();
            return fail(
                ValidationErrorKind::TypeMismatch,
                format!("expected {}, got {}", expected.join(" or "), json_type_name(value)),
            );
        }

        if let Some(constant) = property.constant {
            if value.as_str() != Some(constant) {
                return fail(
                    ValidationErrorKind::InvalidFormat,
                    format!("expected const value {constant}, got {value}"),
                );
            }
        }

        if !property.allowed.is_empty() {
            let ok = value.as_str().is_some_and(|s| property.allowed.contains(&s));
            if !ok {
                return fail(
                    ValidationErrorKind::InvalidFormat,
                    format!("value {value} not in [{}]", property.allowed.join(", ")),
                );
            }
        }

        if let Some(n) = value.as_f64() {
            if let Some(min) = property.minimum.filter(|min| n < *min) {
                return fail(
                    ValidationErrorKind::OutOfRange,
                    format!("value {n} is below minimum {min}"),
                );
            }
            if let Some(max) = property.maximum.filter(|max| n > *max) {
                return fail(
                    ValidationErrorKind::OutOfRange,
                    format!("value {n} is above maximum {max}"),
                );
            }
        }

        if let (Some(min), Some(items)) = (property.min_items, value.as_array()) {
            if items.len() < min {
                return fail(
                    ValidationErrorKind::OutOfRange,
                    format!("expected at least {min} items, got {}", items.len()),
                );
            }
        }

        if let Some(s) = value.as_str() {
            if let Some(pattern) = property.pattern {
                if !self.matches(pattern, s)? {
                    return fail(
                        ValidationErrorKind::InvalidFormat,
                        format!("string {s} does not match pattern {pattern}"),
                    );
                }
            }
            if let Some(format) = property.format {
                let shape_ok = match format.pattern() {
                    Some(pattern) => self.matches(pattern, s)?,
                    None => true,
                };
                if !(shape_ok && format.accepts(s)) {
                    return fail(
                        ValidationErrorKind::InvalidFormat,
                        format!("string {s} is not a valid {format}"),
                    );
                }
            }
        }

        Ok(())
    }

    fn matches(&self, pattern: &str, s: &str) -> AstraResult<bool> {
        let re = self
            .patterns
            .get(pattern)
            .map_err(|e| AstraError::internal(format!("schema pattern {pattern} failed to compile: {e}")))?;
        Ok(re.is_match(s))
    }
}
