//! Error types for ASTRA.
//!
//! All errors in ASTRA are strongly typed using thiserror and returned as
//! values. Nothing in the core panics on bad input: a rejected act, an
//! unresolvable entity reference or an unknown discriminator all surface as
//! a `Result` the caller can match on.

use std::fmt;

use thiserror::Error;

use crate::conversation::ConversationStatus;

/// Classification of a structural validation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationErrorKind {
    /// A required field is absent, empty or null.
    Missing,
    /// A numeric field is outside its allowed domain.
    OutOfRange,
    /// A string field does not match its required format.
    InvalidFormat,
    /// A value that must be unique within its scope is repeated.
    Duplicate,
    /// A field is present that the variant does not declare.
    UnknownField,
    /// A text field exceeds the configured maximum length.
    TooLong,
    /// A value has the wrong JSON type.
    TypeMismatch,
}

impl fmt::Display for ValidationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => write!(f, "missing"),
            Self::OutOfRange => write!(f, "out_of_range"),
            Self::InvalidFormat => write!(f, "invalid_format"),
            Self::Duplicate => write!(f, "duplicate"),
            Self::UnknownField => write!(f, "unknown_field"),
            Self::TooLong => write!(f, "too_long"),
            Self::TypeMismatch => write!(f, "type_mismatch"),
        }
    }
}

/// A single structural violation: the offending field, a human message and
/// the offending value.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("validation error for field '{field}': {message} (value: {value})")]
pub struct ValidationError {
    /// Name of the offending field, as it appears on the wire.
    pub field: String,
    /// Human-readable description of the violation.
    pub message: String,
    /// The offending value.
    pub value: serde_json::Value,
    /// Machine-matchable classification.
    pub kind: ValidationErrorKind,
}

impl ValidationError {
    /// Creates a validation error.
    #[must_use]
    pub fn new(
        kind: ValidationErrorKind,
        field: impl Into<String>,
        message: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            value: value.into(),
            kind,
        }
    }

    /// A required field is missing or empty.
    #[must_use]
    pub fn missing(field: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        let field = field.into();
        let message = format!("{field} is required");
        Self::new(ValidationErrorKind::Missing, field, message, value)
    }

    /// A counter field is negative.
    #[must_use]
    pub fn negative(field: impl Into<String>, value: i64) -> Self {
        let field = field.into();
        let message = format!("{field} cannot be negative");
        Self::new(ValidationErrorKind::OutOfRange, field, message, value)
    }

    /// A field does not match its required format.
    #[must_use]
    pub fn invalid_format(
        field: impl Into<String>,
        message: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        Self::new(ValidationErrorKind::InvalidFormat, field, message, value)
    }

    /// Returns true if this error names the given field.
    #[must_use]
    pub fn is_for(&self, field: &str) -> bool {
        self.field == field
    }
}

/// The `type` discriminator of an inbound act is absent or not one of the
/// five known act types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct UnknownActType {
    /// The discriminator that was found, if any.
    pub found: Option<String>,
}

impl fmt::Display for UnknownActType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.found {
            Some(t) => write!(f, "unknown act type: {t}"),
            None => write!(f, "unknown act type: discriminator 'type' is missing"),
        }
    }
}

/// An entity reference could not be resolved to an identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EntityReferenceError {
    /// A bare string reference is empty.
    #[error("entity reference is empty")]
    EmptyId,

    /// A structured reference has an empty `id`.
    #[error("structured entity reference of type '{entity_type}' has an empty id")]
    EmptyStructuredId {
        /// The `type` of the structured reference.
        entity_type: String,
    },
}

/// A lookup by act id found nothing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("act not found: {act_id}")]
pub struct ActNotFoundError {
    /// The id that was looked up.
    pub act_id: String,
}

/// Top-level error type for ASTRA.
#[derive(Debug, Error)]
pub enum AstraError {
    /// An act or document failed a structural check.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// An inbound act has no recognized `type`.
    #[error(transparent)]
    UnknownActType(#[from] UnknownActType),

    /// An entity reference did not resolve.
    #[error("Entity reference error: {0}")]
    EntityReference(#[from] EntityReferenceError),

    /// No act has the requested id.
    #[error(transparent)]
    ActNotFound(#[from] ActNotFoundError),

    /// Input bytes were not valid JSON or did not fit the target shape.
    #[error("Failed to decode {what}: {message}")]
    Decode {
        /// Kind of document being decoded.
        what: String,
        /// Underlying parser message.
        message: String,
    },

    /// A value could not be serialized.
    #[error("Failed to encode {what}: {message}")]
    Encode {
        /// Kind of document being encoded.
        what: String,
        /// Underlying serializer message.
        message: String,
    },

    /// An act inside a conversation document was rejected.
    #[error("Invalid act at index {index}: {source}")]
    InvalidAct {
        /// Position of the act in the document's `acts` array.
        index: usize,
        /// Why the act was rejected.
        #[source]
        source: Box<AstraError>,
    },

    /// A status change the lifecycle does not allow.
    #[error("Invalid conversation status transition: {from} -> {to}")]
    InvalidTransition {
        /// Current status.
        from: ConversationStatus,
        /// Requested status.
        to: ConversationStatus,
    },

    /// An act was appended to a conversation that has ended.
    #[error("Conversation {id} is closed ({status}); acts can no longer be appended")]
    ConversationClosed {
        /// Conversation id.
        id: String,
        /// The terminal status it ended with.
        status: ConversationStatus,
    },

    /// No conversation is registered under the id.
    #[error("Conversation not found: {id}")]
    ConversationNotFound {
        /// The id that was looked up.
        id: String,
    },

    /// A conversation with the same id is already registered.
    #[error("Conversation already registered: {id}")]
    DuplicateConversation {
        /// The conflicting id.
        id: String,
    },

    /// No schema is published under the name.
    #[error("Schema not found: {name}")]
    SchemaNotFound {
        /// The requested schema name.
        name: String,
    },

    /// Configuration failed to parse or validate.
    #[error("Invalid configuration: {reason}")]
    Config {
        /// What is wrong with it.
        reason: String,
    },

    /// A lock was poisoned or an internal invariant failed.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the failure.
        message: String,
    },
}

impl AstraError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Creates a decode error for the named document kind.
    #[must_use]
    pub fn decode(what: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Decode {
            what: what.into(),
            message: message.to_string(),
        }
    }

    /// Creates an encode error for the named document kind.
    #[must_use]
    pub fn encode(what: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Encode {
            what: what.into(),
            message: message.to_string(),
        }
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    /// Returns true if this is a structural validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is an unknown discriminator.
    #[must_use]
    pub const fn is_unknown_act_type(&self) -> bool {
        matches!(self, Self::UnknownActType(_))
    }

    /// Returns true if this is a decode failure (malformed JSON or shape).
    #[must_use]
    pub const fn is_decode(&self) -> bool {
        matches!(self, Self::Decode { .. })
    }

    /// Wraps an error raised while processing the act at `index` of a
    /// conversation document.
    #[must_use]
    pub fn at_act(index: usize, source: Self) -> Self {
        Self::InvalidAct {
            index,
            source: Box::new(source),
        }
    }

    /// Returns the innermost error, looking through [`Self::InvalidAct`].
    #[must_use]
    pub fn root(&self) -> &Self {
        match self {
            Self::InvalidAct { source, .. } => source.root(),
            other => other,
        }
    }

    /// Returns true if this is an internal error.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }

    /// Returns the structural validation error, if that is what this is.
    #[must_use]
    pub const fn as_validation(&self) -> Option<&ValidationError> {
        match self {
            Self::Validation(e) => Some(e),
            _ => None,
        }
    }

    /// Returns true if the same input could succeed on a later attempt.
    ///
    /// Only lock poisoning and a missing conversation (which may be
    /// registered later) are transient. A closed conversation never reopens,
    /// so [`Self::ConversationClosed`] is not retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Internal { .. } | Self::ConversationNotFound { .. })
    }
}

/// Result type alias for ASTRA operations.
pub type AstraResult<T> = Result<T, AstraError>;
