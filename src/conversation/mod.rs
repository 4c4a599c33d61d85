//! The conversation aggregate and its append-only act ledger.
//!
//! A [`Conversation`] owns its participants, its ordered acts and metadata
//! derived from those acts. Acts enter only through [`Conversation::add_act`],
//! which validates before it touches anything: a rejected act leaves the
//! conversation exactly as it was. Acts are never removed or reordered.
//!
//! Derived metadata is recomputed from the ledger after every mutation, so
//! `act_count == acts().len()` and the other aggregates hold at all times.

mod participant;
pub mod registry;

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

pub use participant::{Participant, ParticipantPreferences, ParticipantType};

use crate::act::{Act, ActType};
use crate::clock::{elapsed_ms, Clock, SystemClock};
use crate::error::{ActNotFoundError, AstraError, AstraResult, ValidationError, ValidationErrorKind};
use crate::ids;
use crate::validation::{check_extension_keys, StructuralValidator};

/// Lifecycle status of a conversation.
///
/// `active ⇄ paused`, and either may end in one of the terminal states
/// `completed`, `failed` or `cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationStatus {
    /// Accepting acts.
    #[default]
    Active,
    /// Temporarily suspended; still accepts acts.
    Paused,
    /// Ended normally.
    Completed,
    /// Ended by a failure.
    Failed,
    /// Abandoned.
    Cancelled,
}

impl ConversationStatus {
    /// Returns true for `completed`, `failed` and `cancelled`.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Returns true if the lifecycle allows moving from `self` to `next`.
    #[must_use]
    pub const fn can_transition_to(&self, next: Self) -> bool {
        match (self, next) {
            (Self::Active, Self::Paused) | (Self::Paused, Self::Active) => true,
            (Self::Active | Self::Paused, n) => n.is_terminal(),
            _ => false,
        }
    }

    /// Returns the wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ConversationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Session information for a conversation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationContext {
    /// Host session identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    /// Client information.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,

    /// Client network address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,

    /// How the conversation was initiated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referrer: Option<String>,

    /// Any other context keys.
    #[serde(flatten)]
    pub extensions: BTreeMap<String, Value>,
}

impl ConversationContext {
    /// Wire names of the typed fields.
    pub const FIELDS: &'static [&'static str] = &["session_id", "user_agent", "ip_address", "referrer"];

    /// Adds a context key.
    ///
    /// A key that names a typed field sets that field when the value is a
    /// string; otherwise it is kept as an extension, which building the
    /// conversation rejects.
    #[must_use]
    pub fn with_extension(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let key = key.into();
        let rest = match (key.as_str(), value.into()) {
            ("session_id", Value::String(s)) => {
                self.session_id = Some(s);
                None
            }
            ("user_agent", Value::String(s)) => {
                self.user_agent = Some(s);
                None
            }
            ("ip_address", Value::String(s)) => {
                self.ip_address = Some(s);
                None
            }
            ("referrer", Value::String(s)) => {
                self.referrer = Some(s);
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

/// Aggregates derived from the act ledger.
///
/// The counted fields are always recomputed from the acts; only
/// `extensions` is free-form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationMetadata {
    /// Milliseconds from `started_at` to `ended_at`; absent until ended.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_duration_ms: Option<i64>,

    /// Number of acts in the ledger.
    #[serde(default)]
    pub act_count: usize,

    /// Number of Error acts.
    #[serde(default)]
    pub error_count: usize,

    /// Number of Commit acts whose status is `success`.
    #[serde(default)]
    pub commit_count: usize,

    /// Mean confidence over acts that declare one; absent if none do.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_confidence: Option<f64>,

    /// Any other metadata keys.
    #[serde(flatten)]
    pub extensions: BTreeMap<String, Value>,
}

impl ConversationMetadata {
    /// Wire names of the derived fields. They are never extension keys.
    pub const DERIVED_FIELDS: &'static [&'static str] = &[
        "total_duration_ms",
        "act_count",
        "error_count",
        "commit_count",
        "avg_confidence",
    ];

    /// Computes the aggregates for a ledger. `extensions` is left empty.
    #[must_use]
    pub fn compute(acts: &[Act], started_at: DateTime<Utc>, ended_at: Option<DateTime<Utc>>) -> Self {
        let (sum, declared) = acts
            .iter()
            .filter_map(Act::confidence)
            .fold((0.0_f64, 0_u32), |(sum, n), c| (sum + c, n + 1));

        Self {
            total_duration_ms: ended_at.map(|end| elapsed_ms(started_at, end)),
            act_count: acts.len(),
            error_count: acts.iter().filter(|a| a.is_error()).count(),
            commit_count: acts.iter().filter(|a| a.is_successful_commit()).count(),
            avg_confidence: (declared > 0).then(|| sum / f64::from(declared)),
            extensions: BTreeMap::new(),
        }
    }
}

/// A conversation: participants, the act ledger and derived metadata.
///
/// # Examples
///
/// ```
/// use astra::{Ask, Conversation, ConversationStatus, Participant};
///
/// let mut conv = Conversation::builder()
///     .participant(Participant::human("customer_1"))
///     .participant(Participant::ai("agent_1"))
///     .build()
///     .unwrap();
///
/// conv.add_act(Ask::new("agent_1", "email", "What's your email?").into()).unwrap();
/// assert_eq!(conv.metadata().act_count, 1);
///
/// conv.end(ConversationStatus::Completed).unwrap();
/// assert!(conv.metadata().total_duration_ms.is_some());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Conversation {
    id: String,
    participants: Vec<Participant>,
    acts: Vec<Act>,
    started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ended_at: Option<DateTime<Utc>>,
    status: ConversationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    channel: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    schema: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<ConversationContext>,
    #[serde(skip_serializing_if = "Option::is_none")]
    final_state: Option<Map<String, Value>>,
    metadata: ConversationMetadata,
    #[serde(skip)]
    validator: StructuralValidator,
}

impl Conversation {
    /// Returns a builder.
    #[must_use]
    pub fn builder() -> ConversationBuilder {
        ConversationBuilder::new()
    }

    /// Conversation id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Participants, in the order they joined.
    #[must_use]
    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    /// The act ledger, in append order.
    #[must_use]
    pub fn acts(&self) -> &[Act] {
        &self.acts
    }

    /// Number of acts in the ledger.
    #[must_use]
    pub fn len(&self) -> usize {
        self.acts.len()
    }

    /// Returns true if no act has been appended.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.acts.is_empty()
    }

    /// When the conversation began.
    #[must_use]
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// When the conversation ended; `None` while it is open.
    #[must_use]
    pub const fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    /// Lifecycle status.
    #[must_use]
    pub const fn status(&self) -> ConversationStatus {
        self.status
    }

    /// Channel the conversation takes place on.
    #[must_use]
    pub fn channel(&self) -> Option<&str> {
        self.channel.as_deref()
    }

    /// Business schema or workflow the conversation follows.
    #[must_use]
    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    /// Session information, if recorded.
    #[must_use]
    pub const fn context(&self) -> Option<&ConversationContext> {
        self.context.as_ref()
    }

    /// Entity states at the end of the conversation.
    #[must_use]
    pub const fn final_state(&self) -> Option<&Map<String, Value>> {
        self.final_state.as_ref()
    }

    /// Derived metadata.
    #[must_use]
    pub const fn metadata(&self) -> &ConversationMetadata {
        &self.metadata
    }

    /// Appends an act.
    ///
    /// The act is structurally validated and its id checked for uniqueness
    /// within the ledger. On any failure the conversation is unchanged.
    ///
    /// # Errors
    ///
    /// - [`AstraError::ConversationClosed`] if the conversation has ended.
    /// - [`AstraError::Validation`] if the act is malformed or its id is
    ///   already in the ledger (kind `Duplicate`).
    pub fn add_act(&mut self, act: Act) -> AstraResult<()> {
        if self.status.is_terminal() {
            warn!(
                conversation_id = %self.id,
                act_id = %act.id(),
                status = %self.status,
                "rejected act: conversation closed"
            );
            return Err(AstraError::ConversationClosed {
                id: self.id.clone(),
                status: self.status,
            });
        }

        if let Err(e) = self.check_act(&act) {
            warn!(
                conversation_id = %self.id,
                act_id = %act.id(),
                field = %e.field,
                kind = %e.kind,
                "rejected act"
            );
            return Err(e.into());
        }

        debug!(
            conversation_id = %self.id,
            act_id = %act.id(),
            act_type = %act.act_type(),
            "appended act"
        );
        self.acts.push(act);
        self.recompute_metadata();
        Ok(())
    }

    fn check_act(&self, act: &Act) -> Result<(), ValidationError> {
        self.validator.validate(act)?;
        if self.acts.iter().any(|a| a.id() == act.id()) {
            return Err(ValidationError::new(
                ValidationErrorKind::Duplicate,
                "id",
                "act id already exists in this conversation",
                act.id(),
            ));
        }
        Ok(())
    }

    /// Adds a participant.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the participant id is empty or already
    /// present.
    pub fn add_participant(&mut self, participant: Participant) -> Result<(), ValidationError> {
        if participant.id.trim().is_empty() {
            return Err(ValidationError::missing("participants.id", ""));
        }
        if let Some(preferences) = &participant.preferences {
            check_extension_keys(
                "participants.preferences",
                &preferences.extensions,
                ParticipantPreferences::FIELDS,
            )?;
        }
        if self.participant(&participant.id).is_some() {
            return Err(ValidationError::new(
                ValidationErrorKind::Duplicate,
                "participants.id",
                "participant id already exists in this conversation",
                participant.id,
            ));
        }
        self.participants.push(participant);
        Ok(())
    }

    /// Looks up a participant by id.
    #[must_use]
    pub fn participant(&self, id: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.id == id)
    }

    /// Looks up an act by id.
    ///
    /// # Errors
    ///
    /// Returns [`ActNotFoundError`] if no act has that id.
    pub fn act(&self, id: &str) -> Result<&Act, ActNotFoundError> {
        self.acts
            .iter()
            .find(|a| a.id() == id)
            .ok_or_else(|| ActNotFoundError {
                act_id: id.to_string(),
            })
    }

    /// Acts of the given type, in ledger order.
    #[must_use]
    pub fn acts_by_type(&self, act_type: ActType) -> Vec<&Act> {
        self.acts
            .iter()
            .filter(|a| a.act_type() == act_type)
            .collect()
    }

    /// Acts by the given speaker, in ledger order.
    #[must_use]
    pub fn acts_by_speaker(&self, speaker: &str) -> Vec<&Act> {
        self.acts.iter().filter(|a| a.speaker() == speaker).collect()
    }

    /// The most recently appended act.
    #[must_use]
    pub fn last_act(&self) -> Option<&Act> {
        self.acts.last()
    }

    /// Suspends an active conversation.
    ///
    /// # Errors
    ///
    /// Returns [`AstraError::InvalidTransition`] unless the conversation is
    /// active.
    pub fn pause(&mut self) -> AstraResult<()> {
        self.transition(ConversationStatus::Paused)
    }

    /// Resumes a paused conversation.
    ///
    /// # Errors
    ///
    /// Returns [`AstraError::InvalidTransition`] unless the conversation is
    /// paused.
    pub fn resume(&mut self) -> AstraResult<()> {
        self.transition(ConversationStatus::Active)
    }

    fn transition(&mut self, next: ConversationStatus) -> AstraResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(AstraError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        debug!(conversation_id = %self.id, from = %self.status, to = %next, "status changed");
        self.status = next;
        Ok(())
    }

    /// Ends the conversation now.
    ///
    /// # Errors
    ///
    /// See [`Self::end_at`].
    pub fn end(&mut self, status: ConversationStatus) -> AstraResult<()> {
        self.end_with(status, &SystemClock)
    }

    /// Ends the conversation at the clock's current instant.
    ///
    /// # Errors
    ///
    /// See [`Self::end_at`].
    pub fn end_with(&mut self, status: ConversationStatus, clock: &dyn Clock) -> AstraResult<()> {
        self.end_at(status, clock.now())
    }

    /// Ends the conversation at `at` with a terminal `status`, then
    /// recomputes metadata (including `total_duration_ms`).
    ///
    /// # Errors
    ///
    /// - [`AstraError::InvalidTransition`] if `status` is not terminal or
    ///   the conversation has already ended.
    /// - [`AstraError::Validation`] if `at` precedes `started_at`.
    pub fn end_at(&mut self, status: ConversationStatus, at: DateTime<Utc>) -> AstraResult<()> {
        if !status.is_terminal() || !self.status.can_transition_to(status) {
            return Err(AstraError::InvalidTransition {
                from: self.status,
                to: status,
            });
        }
        if at < self.started_at {
            return Err(ValidationError::new(
                ValidationErrorKind::OutOfRange,
                "ended_at",
                "ended_at cannot precede started_at",
                at.to_rfc3339(),
            )
            .into());
        }

        self.status = status;
        self.ended_at = Some(at);
        self.recompute_metadata();
        info!(
            conversation_id = %self.id,
            status = %status,
            act_count = self.metadata.act_count,
            duration_ms = self.metadata.total_duration_ms.unwrap_or_default(),
            "conversation ended"
        );
        Ok(())
    }

    /// Records the entity states reached by the conversation.
    pub fn set_final_state(&mut self, final_state: Map<String, Value>) {
        self.final_state = Some(final_state);
    }

    /// Sets a free-form metadata key.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] (kind `Duplicate`) if `key` names a
    /// derived field such as `act_count`.
    pub fn set_metadata_extension(
        &mut self,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<(), ValidationError> {
        let key = key.into();
        if ConversationMetadata::DERIVED_FIELDS.contains(&key.as_str()) {
            return Err(ValidationError::new(
                ValidationErrorKind::Duplicate,
                format!("metadata.{key}"),
                format!("{key} is derived from the ledger and cannot be set"),
                value.into(),
            ));
        }
        self.metadata.extensions.insert(key, value.into());
        Ok(())
    }

    fn recompute_metadata(&mut self) {
        let mut extensions = std::mem::take(&mut self.metadata.extensions);
        extensions.retain(|key, _| !ConversationMetadata::DERIVED_FIELDS.contains(&key.as_str()));
        self.metadata = ConversationMetadata {
            extensions,
            ..ConversationMetadata::compute(&self.acts, self.started_at, self.ended_at)
        };
    }

    /// Rebuilds a conversation from a decoded document, re-checking every
    /// act in ledger order. `ended_at` must be present exactly when the
    /// status is terminal. Derived metadata is recomputed; extension keys
    /// are kept.
    pub(crate) fn restore(
        document: ConversationDocument,
        acts: Vec<Act>,
        validator: StructuralValidator,
    ) -> AstraResult<Self> {
        let mut conversation = ConversationBuilder::new()
            .id(document.id)
            .participants(document.participants)
            .started_at(document.started_at)
            .validator(validator)
            .build_inner(document.channel, document.schema, document.context)?;

        for (index, act) in acts.into_iter().enumerate() {
            conversation
                .check_act(&act)
                .map_err(|e| AstraError::at_act(index, e.into()))?;
            conversation.acts.push(act);
        }

        match (document.status.is_terminal(), document.ended_at) {
            (true, None) => {
                return Err(ValidationError::new(
                    ValidationErrorKind::Missing,
                    "ended_at",
                    format!("a {} conversation must record ended_at", document.status),
                    Value::Null,
                )
                .into());
            }
            (false, Some(ended_at)) => {
                return Err(ValidationError::invalid_format(
                    "ended_at",
                    format!("ended_at is set but status {} is not terminal", document.status),
                    ended_at.to_rfc3339(),
                )
                .into());
            }
            (true, Some(ended_at)) if ended_at < conversation.started_at => {
                return Err(ValidationError::new(
                    ValidationErrorKind::OutOfRange,
                    "ended_at",
                    "ended_at cannot precede started_at",
                    ended_at.to_rfc3339(),
                )
                .into());
            }
            _ => {}
        }
        conversation.status = document.status;
        conversation.ended_at = document.ended_at;
        conversation.final_state = document.final_state;
        if let Some(metadata) = document.metadata {
            conversation.metadata.extensions = metadata.extensions;
        }
        conversation.recompute_metadata();
        Ok(conversation)
    }
}

/// Wire form of a conversation, before its acts are decoded.
#[derive(Debug, Deserialize)]
pub(crate) struct ConversationDocument {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub participants: Vec<Participant>,
    #[serde(default)]
    pub acts: Vec<Value>,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: ConversationStatus,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub context: Option<ConversationContext>,
    #[serde(default)]
    pub final_state: Option<Map<String, Value>>,
    #[serde(default)]
    pub metadata: Option<ConversationMetadata>,
}

/// Builder for [`Conversation`].
#[derive(Debug, Default)]
pub struct ConversationBuilder {
    id: Option<String>,
    participants: Vec<Participant>,
    started_at: Option<DateTime<Utc>>,
    channel: Option<String>,
    schema: Option<String>,
    context: Option<ConversationContext>,
    validator: StructuralValidator,
}

impl ConversationBuilder {
    /// Creates a new conversation builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the id (optional, will be generated if not set).
    #[must_use]
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Adds a participant.
    #[must_use]
    pub fn participant(mut self, participant: Participant) -> Self {
        self.participants.push(participant);
        self
    }

    /// Adds several participants.
    #[must_use]
    pub fn participants(mut self, participants: impl IntoIterator<Item = Participant>) -> Self {
        self.participants.extend(participants);
        self
    }

    /// Sets the start instant (optional, defaults to now).
    #[must_use]
    pub const fn started_at(mut self, started_at: DateTime<Utc>) -> Self {
        self.started_at = Some(started_at);
        self
    }

    /// Sets the channel.
    #[must_use]
    pub fn channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    /// Sets the business schema.
    #[must_use]
    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Sets the session context.
    #[must_use]
    pub fn context(mut self, context: ConversationContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Sets the validator used by [`Conversation::add_act`].
    #[must_use]
    pub const fn validator(mut self, validator: StructuralValidator) -> Self {
        self.validator = validator;
        self
    }

    /// Builds the conversation in the `active` state with an empty ledger.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if the id is malformed, there are no
    /// participants, or a participant id is empty or repeated.
    pub fn build(mut self) -> Result<Conversation, ValidationError> {
        let channel = self.channel.take();
        let schema = self.schema.take();
        let context = self.context.take();
        self.build_inner(channel, schema, context)
    }

    fn build_inner(
        self,
        channel: Option<String>,
        schema: Option<String>,
        context: Option<ConversationContext>,
    ) -> Result<Conversation, ValidationError> {
        let id = self.id.unwrap_or_else(ids::generate_conversation_id);
        if id.is_empty() {
            return Err(ValidationError::missing("id", ""));
        }
        if !ids::is_valid_conversation_id(&id) {
            return Err(ValidationError::invalid_format(
                "id",
                "invalid conversation ID format",
                id,
            ));
        }
        if self.participants.is_empty() {
            return Err(ValidationError::new(
                ValidationErrorKind::Missing,
                "participants",
                "at least one participant is required",
                Value::Array(Vec::new()),
            ));
        }

        if let Some(context) = &context {
            check_extension_keys("context", &context.extensions, ConversationContext::FIELDS)?;
        }

        let started_at = self.started_at.unwrap_or_else(|| SystemClock.now());
        let mut conversation = Conversation {
            id,
            participants: Vec::with_capacity(self.participants.len()),
            acts: Vec::new(),
            started_at,
            ended_at: None,
            status: ConversationStatus::Active,
            channel,
            schema,
            context,
            final_state: None,
            metadata: ConversationMetadata::default(),
            validator: self.validator,
        };
        for participant in self.participants {
            conversation.add_participant(participant)?;
        }
        conversation.recompute_metadata();
        Ok(conversation)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    use super::*;
    use crate::act::{ActBase, Ask, Commit, CommitAction, CommitStatus, ErrorAct, Fact};
    use crate::clock::FixedClock;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 15, 14, 30, 0).unwrap()
    }

    fn base(id: &str, speaker: &str) -> ActBase {
        ActBase::from_parts(id, t0(), speaker)
    }

    fn conversation() -> Conversation {
        Conversation::builder()
            .id("conv_1")
            .participant(Participant::human("customer_1"))
            .participant(Participant::ai("agent_1"))
            .started_at(t0())
            .build()
            .unwrap()
    }

    #[test]
    fn test_new_conversation_is_active_and_empty() {
        let conv = conversation();
        assert_eq!(conv.status(), ConversationStatus::Active);
        assert!(conv.is_empty());
        assert_eq!(conv.metadata().act_count, 0);
        assert_eq!(conv.metadata().avg_confidence, None);
        assert_eq!(conv.metadata().total_duration_ms, None);
    }

    #[test]
    fn test_builder_validation() {
        let err = Conversation::builder().id("conv_1").build().unwrap_err();
        assert_eq!(err.field, "participants");

        let err = Conversation::builder()
            .id("chat_1")
            .participant(Participant::human("c"))
            .build()
            .unwrap_err();
        assert_eq!(err.field, "id");
        assert_eq!(err.kind, ValidationErrorKind::InvalidFormat);

        let err = Conversation::builder()
            .participant(Participant::human("c"))
            .participant(Participant::ai("c"))
            .build()
            .unwrap_err();
        assert_eq!(err.kind, ValidationErrorKind::Duplicate);

        let generated = Conversation::builder()
            .participant(Participant::human("c"))
            .build()
            .unwrap();
        assert!(ids::is_valid_conversation_id(generated.id()));
    }

    #[test]
    fn test_rejected_act_leaves_ledger_unchanged() {
        let mut conv = conversation();
        conv.add_act(Ask::from_base(base("act_1", "agent_1"), "email", "Email?").into())
            .unwrap();
        let before = conv.clone();

        let err = conv
            .add_act(Ask::from_base(base("act_2", "agent_1"), "", "").into())
            .unwrap_err();
        assert_eq!(err.as_validation().unwrap().field, "field");
        assert_eq!(conv, before);
    }

    #[test]
    fn test_duplicate_act_id_rejected() {
        let mut conv = conversation();
        conv.add_act(Ask::from_base(base("act_1", "agent_1"), "email", "Email?").into())
            .unwrap();
        let err = conv
            .add_act(Ask::from_base(base("act_1", "agent_1"), "phone", "Phone?").into())
            .unwrap_err();
        let v = err.as_validation().unwrap();
        assert_eq!(v.kind, ValidationErrorKind::Duplicate);
        assert_eq!(v.field, "id");
        assert_eq!(conv.len(), 1);
    }

    #[test]
    fn test_avg_confidence_over_declared_only() {
        let mut conv = conversation();
        conv.add_act(Ask::from_base(base("act_1", "agent_1").with_confidence(0.8), "a", "A?").into())
            .unwrap();
        conv.add_act(Ask::from_base(base("act_2", "agent_1"), "b", "B?").into())
            .unwrap();
        conv.add_act(Ask::from_base(base("act_3", "agent_1").with_confidence(0.6), "c", "C?").into())
            .unwrap();
        let avg = conv.metadata().avg_confidence.unwrap();
        assert!((avg - 0.7).abs() < 1e-9, "{avg}");
    }

    #[test]
    fn test_counts() {
        let mut conv = conversation();
        conv.add_act(
            Commit::from_base(base("act_1", "system"), "order_1", CommitAction::Create)
                .with_status(CommitStatus::Failed)
                .into(),
        )
        .unwrap();
        conv.add_act(ErrorAct::from_base(base("act_2", "system"), "E1", "boom", true).into())
            .unwrap();
        conv.add_act(
            Commit::from_base(base("act_3", "system"), "order_1", CommitAction::Create)
                .with_status(CommitStatus::Success)
                .into(),
        )
        .unwrap();
        let m = conv.metadata();
        assert_eq!(m.act_count, 3);
        assert_eq!(m.error_count, 1);
        assert_eq!(m.commit_count, 1);
    }

    #[test]
    fn test_lookups() {
        let mut conv = conversation();
        conv.add_act(Ask::from_base(base("act_1", "agent_1"), "email", "Email?").into())
            .unwrap();
        conv.add_act(
            Fact::from_base(base("act_2", "customer_1"), "order_1", "email", json!("a@b.com")).into(),
        )
        .unwrap();
        conv.add_act(Ask::from_base(base("act_3", "agent_1"), "phone", "Phone?").into())
            .unwrap();

        let asks = conv.acts_by_type(ActType::Ask);
        assert_eq!(asks.iter().map(|a| a.id()).collect::<Vec<_>>(), ["act_1", "act_3"]);
        assert_eq!(conv.acts_by_speaker("customer_1").len(), 1);
        assert!(conv.acts_by_speaker("nobody").is_empty());
        assert_eq!(conv.act("act_2").unwrap().act_type(), ActType::Fact);
        assert_eq!(conv.act("act_9").unwrap_err().act_id, "act_9");
        assert!(conv.participant("agent_1").is_some());
        assert!(conv.participant("agent_9").is_none());
        assert_eq!(conv.last_act().map(Act::id), Some("act_3"));
    }

    #[test]
    fn test_end_sets_duration() {
        let mut conv = conversation();
        let clock = FixedClock::at(t0()).advanced(Duration::seconds(90));
        conv.end_with(ConversationStatus::Completed, &clock).unwrap();
        assert_eq!(conv.status(), ConversationStatus::Completed);
        assert_eq!(conv.ended_at(), Some(clock.now()));
        assert_eq!(conv.metadata().total_duration_ms, Some(90_000));
    }

    #[test]
    fn test_end_rejects_non_terminal_and_repeat() {
        let mut conv = conversation();
        assert!(matches!(
            conv.end_at(ConversationStatus::Paused, t0()),
            Err(AstraError::InvalidTransition { .. })
        ));
        conv.end_at(ConversationStatus::Cancelled, t0()).unwrap();
        assert!(matches!(
            conv.end_at(ConversationStatus::Completed, t0()),
            Err(AstraError::InvalidTransition {
                from: ConversationStatus::Cancelled,
                to: ConversationStatus::Completed
            })
        ));
    }

    #[test]
    fn test_end_rejects_time_before_start() {
        let mut conv = conversation();
        let err = conv
            .end_at(ConversationStatus::Completed, t0() - Duration::seconds(1))
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(conv.status(), ConversationStatus::Active);
    }

    #[test]
    fn test_closed_conversation_rejects_acts() {
        let mut conv = conversation();
        conv.end_at(ConversationStatus::Failed, t0()).unwrap();
        let err = conv
            .add_act(Ask::from_base(base("act_1", "agent_1"), "email", "Email?").into())
            .unwrap_err();
        assert!(matches!(err, AstraError::ConversationClosed { .. }));
        assert!(conv.is_empty());
    }

    #[test]
    fn test_pause_resume() {
        let mut conv = conversation();
        conv.pause().unwrap();
        assert_eq!(conv.status(), ConversationStatus::Paused);
        assert!(conv.pause().is_err());

        // Paused conversations still record acts.
        conv.add_act(Ask::from_base(base("act_1", "agent_1"), "email", "Email?").into())
            .unwrap();

        conv.resume().unwrap();
        assert!(conv.resume().is_err());

        conv.pause().unwrap();
        conv.end_at(ConversationStatus::Completed, t0()).unwrap();
        assert!(conv.resume().is_err());
    }

    #[test]
    fn test_status_transitions() {
        use ConversationStatus::{Active, Cancelled, Completed, Failed, Paused};
        assert!(Active.can_transition_to(Paused));
        assert!(Paused.can_transition_to(Active));
        assert!(Paused.can_transition_to(Failed));
        assert!(!Completed.can_transition_to(Active));
        assert!(!Cancelled.can_transition_to(Failed));
        assert!(!Active.can_transition_to(Active));
    }

    #[test]
    fn test_metadata_extensions_survive_recompute() {
        let mut conv = conversation();
        conv.set_metadata_extension("csat", 5).unwrap();
        conv.add_act(Ask::from_base(base("act_1", "agent_1"), "email", "Email?").into())
            .unwrap();
        assert_eq!(conv.metadata().extensions["csat"], 5);
        assert_eq!(conv.metadata().act_count, 1);
    }

    #[test]
    fn test_add_participant() {
        let mut conv = conversation();
        conv.add_participant(Participant::system("crm")).unwrap();
        assert!(conv.add_participant(Participant::system("crm")).is_err());
        assert!(conv.add_participant(Participant::system(" ")).is_err());
        assert_eq!(conv.participants().len(), 3);
    }

    #[test]
    fn test_extension_keys_cannot_shadow_typed_fields() {
        let mut conv = conversation();
        let mut preferences = ParticipantPreferences::default();
        preferences.extensions.insert("language".to_string(), json!("fr"));
        let err = conv
            .add_participant(Participant::human("customer_2").with_preferences(preferences))
            .unwrap_err();
        assert_eq!(err.field, "participants.preferences.language");
        assert_eq!(conv.participants().len(), 2);

        let mut context = ConversationContext::default().with_extension("session_id", "sess_9");
        assert_eq!(context.session_id.as_deref(), Some("sess_9"));
        assert!(context.extensions.is_empty());

        context.extensions.insert("referrer".to_string(), json!(3));
        let err = Conversation::builder()
            .id("conv_2")
            .participant(Participant::ai("agent_1"))
            .context(context)
            .build()
            .unwrap_err();
        assert_eq!(err.field, "context.referrer");
        assert_eq!(err.kind, ValidationErrorKind::Duplicate);
    }

    #[test]
    fn test_serialized_shape() {
        let mut conv = conversation();
        conv.add_act(Ask::from_base(base("act_1", "agent_1"), "email", "Email?").into())
            .unwrap();
        let json = serde_json::to_value(&conv).unwrap();
        assert_eq!(json["id"], "conv_1");
        assert_eq!(json["status"], "active");
        assert_eq!(json["acts"][0]["type"], "ask");
        assert_eq!(json["metadata"]["act_count"], 1);
        assert!(json.get("ended_at").is_none());
        assert!(json.get("validator").is_none());
    }
}
