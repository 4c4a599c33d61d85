//! Declarative validation constraints.
//!
//! A [`Constraint`] is a rule attached to an `Ask` field: on the wire it is
//! `{type, value, message?, code?}` where the shape of `value` depends on
//! `type`. In memory the pair is folded into a typed [`ConstraintRule`], so
//! a malformed constraint (a `min_length` of `"three"`) is rejected when it
//! is decoded rather than when it is evaluated.
//!
//! Evaluation lives in [`ConstraintEngine`].

mod engine;
mod format;

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use engine::{BusinessRuleHook, ConstraintEngine, ConstraintViolation, RuleOutcome};
pub use format::FormatType;
pub(crate) use engine::PatternCache;

/// Bounds of a `range` constraint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeBounds {
    /// Lower bound.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    /// Upper bound.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    /// Whether both bounds are inclusive.
    #[serde(default = "default_inclusive")]
    pub inclusive: bool,
}

const fn default_inclusive() -> bool {
    true
}

impl Default for RangeBounds {
    fn default() -> Self {
        Self {
            min: None,
            max: None,
            inclusive: true,
        }
    }
}

impl RangeBounds {
    /// Returns true if `v` lies within the bounds.
    #[must_use]
    pub fn contains(&self, v: f64) -> bool {
        let above_min = self
            .min
            .map_or(true, |min| if self.inclusive { v >= min } else { v > min });
        let below_max = self
            .max
            .map_or(true, |max| if self.inclusive { v <= max } else { v < max });
        above_min && below_max
    }
}

/// The typed rule carried by a constraint.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstraintRule {
    /// Value must be present and non-empty.
    Required,
    /// Never fails; documents that a field may be skipped.
    Optional,
    /// Minimum length of a string (in characters), array or object.
    MinLength(usize),
    /// Maximum length of a string (in characters), array or object.
    MaxLength(usize),
    /// String must contain a match for the regular expression.
    Pattern(String),
    /// String must satisfy a named format. Unknown names always fail.
    Format(String),
    /// Number must lie within bounds.
    Range(RangeBounds),
    /// Value must equal one of the listed JSON values.
    Enum(Vec<Value>),
    /// Delegated to a [`BusinessRuleHook`].
    Custom(Value),
}

impl ConstraintRule {
    /// Returns the wire name of this rule.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Required => "required",
            Self::Optional => "optional",
            Self::MinLength(_) => "min_length",
            Self::MaxLength(_) => "max_length",
            Self::Pattern(_) => "pattern",
            Self::Format(_) => "format",
            Self::Range(_) => "range",
            Self::Enum(_) => "enum",
            Self::Custom(_) => "custom",
        }
    }
}

impl fmt::Display for ConstraintRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Required | Self::Optional => write!(f, "{}", self.type_name()),
            Self::MinLength(n) => write!(f, "min_length({n})"),
            Self::MaxLength(n) => write!(f, "max_length({n})"),
            Self::Pattern(p) => write!(f, "pattern(/{p}/)"),
            Self::Format(name) => write!(f, "format({name})"),
            Self::Range(b) => {
                let (open, close) = if b.inclusive { ('[', ']') } else { ('(', ')') };
                let min = b.min.map_or_else(|| "-inf".to_string(), |v| v.to_string());
                let max = b.max.map_or_else(|| "+inf".to_string(), |v| v.to_string());
                write!(f, "range{open}{min}, {max}{close}")
            }
            Self::Enum(values) => write!(f, "enum({} values)", values.len()),
            Self::Custom(_) => write!(f, "custom"),
        }
    }
}

/// A declarative validation rule with an optional message and code.
///
/// # Examples
///
/// ```
/// use astra::constraint::{Constraint, ConstraintRule};
///
/// let c: Constraint = serde_json::from_str(r#"{"type":"min_length","value":3}"#).unwrap();
/// assert_eq!(c.rule, ConstraintRule::MinLength(3));
///
/// assert!(serde_json::from_str::<Constraint>(r#"{"type":"min_length","value":"three"}"#).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawConstraint", into = "RawConstraint")]
pub struct Constraint {
    /// The rule.
    pub rule: ConstraintRule,
    /// Message reported on violation instead of the default.
    pub message: Option<String>,
    /// Machine-readable code reported on violation.
    pub code: Option<String>,
}

impl Constraint {
    /// Creates a constraint with no custom message or code.
    #[must_use]
    pub const fn new(rule: ConstraintRule) -> Self {
        Self {
            rule,
            message: None,
            code: None,
        }
    }

    /// Sets the violation message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Sets the violation code.
    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// A required-field constraint.
    #[must_use]
    pub fn required() -> Self {
        Self::new(ConstraintRule::Required).with_message("This field is required")
    }

    /// An optional-field marker.
    #[must_use]
    pub const fn optional() -> Self {
        Self::new(ConstraintRule::Optional)
    }

    /// A minimum-length constraint.
    #[must_use]
    pub fn min_length(n: usize) -> Self {
        Self::new(ConstraintRule::MinLength(n))
            .with_message(format!("Minimum length is {n} characters"))
    }

    /// A maximum-length constraint.
    #[must_use]
    pub fn max_length(n: usize) -> Self {
        Self::new(ConstraintRule::MaxLength(n))
            .with_message(format!("Maximum length is {n} characters"))
    }

    /// A regular-expression constraint.
    #[must_use]
    pub fn pattern(pattern: impl Into<String>) -> Self {
        Self::new(ConstraintRule::Pattern(pattern.into()))
    }

    /// A named-format constraint.
    #[must_use]
    pub fn format(format: FormatType) -> Self {
        Self::new(ConstraintRule::Format(format.as_str().to_string()))
    }

    /// An email-format constraint.
    #[must_use]
    pub fn email() -> Self {
        Self::format(FormatType::Email).with_message("Must be a valid email address")
    }

    /// A phone-format constraint.
    #[must_use]
    pub fn phone() -> Self {
        Self::format(FormatType::Phone).with_message("Must be a valid phone number")
    }

    /// An enumeration constraint.
    #[must_use]
    pub fn one_of<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        let listed = values
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        Self::new(ConstraintRule::Enum(values)).with_message(format!("Must be one of: {listed}"))
    }

    /// A numeric range constraint.
    #[must_use]
    pub fn range(min: Option<f64>, max: Option<f64>, inclusive: bool) -> Self {
        Self::new(ConstraintRule::Range(RangeBounds {
            min,
            max,
            inclusive,
        }))
        .with_message("Value must be within the specified range")
    }

    /// A business-rule constraint, evaluated by the engine's hook.
    #[must_use]
    pub fn custom(value: impl Into<Value>) -> Self {
        Self::new(ConstraintRule::Custom(value.into()))
    }

    /// Returns the wire name of this constraint's type.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        self.rule.type_name()
    }
}

impl From<ConstraintRule> for Constraint {
    fn from(rule: ConstraintRule) -> Self {
        Self::new(rule)
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.rule)?;
        if let Some(code) = &self.code {
            write!(f, " [{code}]")?;
        }
        Ok(())
    }
}

/// Wire names of the constraint types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum ConstraintKind {
    Required,
    Optional,
    MinLength,
    MaxLength,
    Pattern,
    Format,
    Range,
    Enum,
    Custom,
}

/// Wire form of a constraint.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawConstraint {
    #[serde(rename = "type")]
    kind: ConstraintKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    code: Option<String>,
}

fn length_value(kind: &str, value: Option<&Value>) -> Result<usize, String> {
    value
        .and_then(Value::as_u64)
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| format!("{kind} constraint requires a non-negative integer value"))
}

fn string_value(kind: &str, value: Option<Value>) -> Result<String, String> {
    match value {
        Some(Value::String(s)) => Ok(s),
        _ => Err(format!("{kind} constraint requires a string value")),
    }
}

impl TryFrom<RawConstraint> for Constraint {
    type Error = String;

    fn try_from(raw: RawConstraint) -> Result<Self, Self::Error> {
        let rule = match raw.kind {
            ConstraintKind::Required => ConstraintRule::Required,
            ConstraintKind::Optional => ConstraintRule::Optional,
            ConstraintKind::MinLength => {
                ConstraintRule::MinLength(length_value("min_length", raw.value.as_ref())?)
            }
            ConstraintKind::MaxLength => {
                ConstraintRule::MaxLength(length_value("max_length", raw.value.as_ref())?)
            }
            ConstraintKind::Pattern => ConstraintRule::Pattern(string_value("pattern", raw.value)?),
            ConstraintKind::Format => ConstraintRule::Format(string_value("format", raw.value)?),
            ConstraintKind::Range => {
                let bounds = match raw.value {
                    Some(v @ Value::Object(_)) => serde_json::from_value::<RangeBounds>(v)
                        .map_err(|e| format!("invalid range constraint: {e}"))?,
                    _ => return Err("range constraint requires an object value".to_string()),
                };
                ConstraintRule::Range(bounds)
            }
            ConstraintKind::Enum => match raw.value {
                Some(Value::Array(values)) => ConstraintRule::Enum(values),
                _ => return Err("enum constraint requires an array value".to_string()),
            },
            ConstraintKind::Custom => ConstraintRule::Custom(raw.value.unwrap_or(Value::Null)),
        };
        Ok(Self {
            rule,
            message: raw.message,
            code: raw.code,
        })
    }
}

impl From<Constraint> for RawConstraint {
    fn from(c: Constraint) -> Self {
        let (kind, value) = match c.rule {
            ConstraintRule::Required => (ConstraintKind::Required, None),
            ConstraintRule::Optional => (ConstraintKind::Optional, None),
            ConstraintRule::MinLength(n) => (ConstraintKind::MinLength, Some(Value::from(n))),
            ConstraintRule::MaxLength(n) => (ConstraintKind::MaxLength, Some(Value::from(n))),
            ConstraintRule::Pattern(p) => (ConstraintKind::Pattern, Some(Value::String(p))),
            ConstraintRule::Format(name) => (ConstraintKind::Format, Some(Value::String(name))),
            ConstraintRule::Range(bounds) => (
                ConstraintKind::Range,
                serde_json::to_value(bounds).ok(),
            ),
            ConstraintRule::Enum(values) => (ConstraintKind::Enum, Some(Value::Array(values))),
            ConstraintRule::Custom(Value::Null) => (ConstraintKind::Custom, None),
            ConstraintRule::Custom(v) => (ConstraintKind::Custom, Some(v)),
        };
        Self {
            kind,
            value,
            message: c.message,
            code: c.code,
        }
    }
}
