//! Conversational acts.
//!
//! An act is one atomic, timestamped action performed by a speaker. There are
//! exactly five kinds, modeled as the closed [`Act`] enum:
//!
//! - [`Ask`]: request information needed to complete a process
//! - [`Fact`]: declare a value for a field of a business entity
//! - [`Confirm`]: verify understanding before committing
//! - [`Commit`]: execute an action in an external system
//! - [`ErrorAct`]: report a failure during processing
//!
//! On the wire every act is a JSON object whose `type` field selects the
//! variant; the shared fields live in [`ActBase`].

mod ask;
mod commit;
mod confirm;
mod error_act;
mod fact;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use ask::{Ask, ExpectedType};
pub use commit::{Commit, CommitAction, CommitError, CommitStatus};
pub use confirm::{ConfirmationMethod, Confirm};
pub use error_act::{ErrorAct, ErrorCategory, ErrorSeverity, SuggestedAction};
pub use fact::{Fact, FieldOperation, ValidationStatus};

use crate::error::UnknownActType;
use crate::ids;

/// The discriminator of an act.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActType {
    /// Request for missing information.
    Ask,
    /// Declaration of a field value.
    Fact,
    /// Verification before commitment.
    Confirm,
    /// Execution in an external system.
    Commit,
    /// Failure report.
    Error,
}

impl ActType {
    /// All act types, in canonical order.
    pub const ALL: [Self; 5] = [
        Self::Ask,
        Self::Fact,
        Self::Confirm,
        Self::Commit,
        Self::Error,
    ];

    /// Returns the wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ask => "ask",
            Self::Fact => "fact",
            Self::Confirm => "confirm",
            Self::Commit => "commit",
            Self::Error => "error",
        }
    }
}

impl FromStr for ActType {
    type Err = UnknownActType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownActType {
                found: Some(s.to_string()),
            })
    }
}

impl fmt::Display for ActType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What produced an act.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActSource {
    /// Entered directly by a person.
    Human,
    /// Transcribed from audio.
    SpeechRecognition,
    /// Extracted from text by an analyzer.
    TextAnalysis,
    /// Emitted by a backend system.
    System,
    /// Produced by an AI agent.
    Ai,
}

/// Optional metadata attached to an act.
///
/// Known fields are typed; anything else is kept verbatim in `extensions` and
/// written back alongside the known fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActMetadata {
    /// Communication channel (voice, text, email, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,

    /// Language code (ISO 639-1, optional region).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    /// The utterance the act was extracted from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_text: Option<String>,

    /// Time taken to process the act, in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_time_ms: Option<f64>,

    /// Context-specific keys outside the known set.
    #[serde(flatten)]
    pub extensions: BTreeMap<String, serde_json::Value>,
}

impl ActMetadata {
    /// Wire names of the typed fields.
    pub const FIELDS: &'static [&'static str] =
        &["channel", "language", "original_text", "processing_time_ms"];

    /// Sets the channel.
    #[must_use]
    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    /// Sets the language.
    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Sets the original utterance.
    #[must_use]
    pub fn with_original_text(mut self, text: impl Into<String>) -> Self {
        self.original_text = Some(text.into());
        self
    }

    /// Adds an extension key.
    ///
    /// A key that names a typed field sets that field instead, so the value
    /// reads back the same after a round trip. If the value does not fit the
    /// typed field it is kept as an extension, which structural validation
    /// rejects.
    #[must_use]
    pub fn with_extension(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        use serde_json::Value;

        let key = key.into();
        let rest = match (key.as_str(), value.into()) {
            ("channel", Value::String(s)) => {
                self.channel = Some(s);
                None
            }
            ("language", Value::String(s)) => {
                self.language = Some(s);
                None
            }
            ("original_text", Value::String(s)) => {
                self.original_text = Some(s);
                None
            }
            ("processing_time_ms", Value::Number(n)) => {
                self.processing_time_ms = n.as_f64();
                None
            }
            (_, other) => Some(other),
        };
        if let Some(value) = rest {
            self.extensions.insert(key, value);
        }
        self
    }
}

/// Fields shared by every act.
///
/// The `type` discriminator is not stored here: it is implied by the [`Act`]
/// variant that embeds the base and re-emitted on serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActBase {
    /// Unique within the conversation; matches `^act_[A-Za-z0-9_-]+$`.
    #[serde(default)]
    pub id: String,

    /// When the act occurred.
    pub timestamp: DateTime<Utc>,

    /// Participant who performed the act.
    #[serde(default)]
    pub speaker: String,

    /// Extraction confidence in `[0.0, 1.0]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,

    /// How the act was produced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<ActSource>,

    /// Channel, language and other context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ActMetadata>,
}

impl ActBase {
    /// Creates a base for `speaker` with a fresh act id, stamped now.
    #[must_use]
    pub fn new(speaker: impl Into<String>) -> Self {
        Self::from_parts(ids::generate_act_id(), Utc::now(), speaker)
    }

    /// Creates a base from explicit parts.
    #[must_use]
    pub fn from_parts(
        id: impl Into<String>,
        timestamp: DateTime<Utc>,
        speaker: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            timestamp,
            speaker: speaker.into(),
            confidence: None,
            source: None,
            metadata: None,
        }
    }

    /// Sets the id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Sets the timestamp.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Sets the confidence. Range is checked by structural validation.
    #[must_use]
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    /// Sets the source.
    #[must_use]
    pub fn with_source(mut self, source: ActSource) -> Self {
        self.source = Some(source);
        self
    }

    /// Sets the metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: ActMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// A conversational act: exactly one of the five variants.
///
/// # Examples
///
/// ```
/// use astra::{Act, ActType, Ask};
///
/// let act: Act = Ask::new("agent_1", "delivery_address", "Where should we deliver?").into();
/// assert_eq!(act.act_type(), ActType::Ask);
/// assert_eq!(act.speaker(), "agent_1");
/// assert!(act.as_ask().is_some());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Act {
    /// Request for missing information.
    Ask(Ask),
    /// Declaration of a field value.
    Fact(Fact),
    /// Verification before commitment.
    Confirm(Confirm),
    /// Execution in an external system.
    Commit(Commit),
    /// Failure report.
    Error(ErrorAct),
}

impl Act {
    /// Returns the discriminator.
    #[must_use]
    pub const fn act_type(&self) -> ActType {
        match self {
            Self::Ask(_) => ActType::Ask,
            Self::Fact(_) => ActType::Fact,
            Self::Confirm(_) => ActType::Confirm,
            Self::Commit(_) => ActType::Commit,
            Self::Error(_) => ActType::Error,
        }
    }

    /// Returns the shared base fields.
    #[must_use]
    pub const fn base(&self) -> &ActBase {
        match self {
            Self::Ask(a) => &a.base,
            Self::Fact(a) => &a.base,
            Self::Confirm(a) => &a.base,
            Self::Commit(a) => &a.base,
            Self::Error(a) => &a.base,
        }
    }

    /// Returns the shared base fields mutably.
    pub fn base_mut(&mut self) -> &mut ActBase {
        match self {
            Self::Ask(a) => &mut a.base,
            Self::Fact(a) => &mut a.base,
            Self::Confirm(a) => &mut a.base,
            Self::Commit(a) => &mut a.base,
            Self::Error(a) => &mut a.base,
        }
    }

    /// Returns the act id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.base().id
    }

    /// Returns the speaker.
    #[must_use]
    pub fn speaker(&self) -> &str {
        &self.base().speaker
    }

    /// Returns the timestamp.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.base().timestamp
    }

    /// Returns the declared confidence, if any.
    #[must_use]
    pub const fn confidence(&self) -> Option<f64> {
        self.base().confidence
    }

    /// Returns the Ask, if this is one.
    #[must_use]
    pub const fn as_ask(&self) -> Option<&Ask> {
        match self {
            Self::Ask(a) => Some(a),
            _ => None,
        }
    }

    /// Returns the Fact, if this is one.
    #[must_use]
    pub const fn as_fact(&self) -> Option<&Fact> {
        match self {
            Self::Fact(a) => Some(a),
            _ => None,
        }
    }

    /// Returns the Confirm, if this is one.
    #[must_use]
    pub const fn as_confirm(&self) -> Option<&Confirm> {
        match self {
            Self::Confirm(a) => Some(a),
            _ => None,
        }
    }

    /// Returns the Commit, if this is one.
    #[must_use]
    pub const fn as_commit(&self) -> Option<&Commit> {
        match self {
            Self::Commit(a) => Some(a),
            _ => None,
        }
    }

    /// Returns the Error, if this is one.
    #[must_use]
    pub const fn as_error(&self) -> Option<&ErrorAct> {
        match self {
            Self::Error(a) => Some(a),
            _ => None,
        }
    }

    /// Returns true if this is an Ask.
    #[must_use]
    pub const fn is_ask(&self) -> bool {
        matches!(self, Self::Ask(_))
    }

    /// Returns true if this is a Fact.
    #[must_use]
    pub const fn is_fact(&self) -> bool {
        matches!(self, Self::Fact(_))
    }

    /// Returns true if this is a Confirm.
    #[must_use]
    pub const fn is_confirm(&self) -> bool {
        matches!(self, Self::Confirm(_))
    }

    /// Returns true if this is a Commit.
    #[must_use]
    pub const fn is_commit(&self) -> bool {
        matches!(self, Self::Commit(_))
    }

    /// Returns true if this is an Error.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// Returns true if this is a Commit whose status is `success`.
    #[must_use]
    pub fn is_successful_commit(&self) -> bool {
        self.as_commit()
            .is_some_and(|c| c.status == CommitStatus::Success)
    }
}

impl fmt::Display for Act {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}) by {}", self.act_type(), self.id(), self.speaker())
    }
}

impl From<Ask> for Act {
    fn from(a: Ask) -> Self {
        Self::Ask(a)
    }
}

impl From<Fact> for Act {
    fn from(a: Fact) -> Self {
        Self::Fact(a)
    }
}

impl From<Confirm> for Act {
    fn from(a: Confirm) -> Self {
        Self::Confirm(a)
    }
}

impl From<Commit> for Act {
    fn from(a: Commit) -> Self {
        Self::Commit(a)
    }
}

impl From<ErrorAct> for Act {
    fn from(a: ErrorAct) -> Self {
        Self::Error(a)
    }
}
