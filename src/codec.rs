//! JSON codec for acts and conversations.
//!
//! Decoding peeks the `type` discriminator before anything else, so an
//! unknown act type is reported as [`UnknownActType`] rather than as a
//! generic shape error. Undeclared top-level fields are then handled
//! according to the configured [`UnknownFieldPolicy`].
//!
//! Decoding an act does not run structural validation; call
//! [`crate::validation::validate`] (or append it to a conversation) for
//! that. Decoding a whole conversation does, because a decoded conversation
//! must satisfy the ledger invariants.

use serde_json::{Map, Value};
use tracing::debug;

use crate::act::{Act, ActType};
use crate::config::{AstraConfig, UnknownFieldPolicy};
use crate::conversation::{Conversation, ConversationDocument};
use crate::error::{AstraError, AstraResult, UnknownActType};
use crate::validation::{check_declared_fields, is_declared, StructuralValidator};

/// Encodes and decodes acts and conversations.
#[derive(Debug, Clone, Copy, Default)]
pub struct ActCodec {
    policy: UnknownFieldPolicy,
    validator: StructuralValidator,
}

impl ActCodec {
    /// Creates a codec that rejects unknown fields.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a codec from configuration.
    #[must_use]
    pub const fn with_config(config: &AstraConfig) -> Self {
        Self {
            policy: config.validation.unknown_fields,
            validator: StructuralValidator::with_config(config.validation),
        }
    }

    /// Sets the unknown-field policy.
    #[must_use]
    pub const fn with_policy(mut self, policy: UnknownFieldPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Returns the unknown-field policy.
    #[must_use]
    pub const fn policy(&self) -> UnknownFieldPolicy {
        self.policy
    }

    /// Decodes one act from JSON bytes.
    ///
    /// # Errors
    ///
    /// - [`AstraError::Decode`] if the bytes are not a JSON object of the
    ///   right shape.
    /// - [`AstraError::UnknownActType`] if `type` is absent or unknown.
    /// - [`AstraError::Validation`] (kind `UnknownField`) if the policy is
    ///   `reject` and the object carries an undeclared top-level field.
    ///
    /// # Examples
    ///
    /// ```
    /// use astra::codec::ActCodec;
    ///
    /// let raw = br#"{
    ///     "type": "ask",
    ///     "id": "act_1",
    ///     "timestamp": "2025-01-15T14:30:00Z",
    ///     "speaker": "agent_1",
    ///     "field": "email",
    ///     "prompt": "What's your email?"
    /// }"#;
    /// let act = ActCodec::new().decode(raw).unwrap();
    /// assert_eq!(act.as_ask().unwrap().max_retries, 3);
    ///
    /// let err = ActCodec::new()
    ///     .decode(br#"{"type": "schedule", "id": "act_2"}"#)
    ///     .unwrap_err();
    /// assert!(err.is_unknown_act_type());
    /// ```
    pub fn decode(&self, raw: &[u8]) -> AstraResult<Act> {
        let value: Value = serde_json::from_slice(raw).map_err(|e| AstraError::decode("act", e))?;
        self.decode_value(value)
    }

    /// Decodes one act from a parsed JSON value.
    ///
    /// # Errors
    ///
    /// See [`Self::decode`].
    pub fn decode_value(&self, value: Value) -> AstraResult<Act> {
        let Value::Object(mut object) = value else {
            return Err(AstraError::decode("act", "expected a JSON object"));
        };
        let act_type = discriminator(&object)?;

        match self.policy {
            UnknownFieldPolicy::Reject => check_declared_fields(act_type, &object)?,
            UnknownFieldPolicy::Tolerate => strip_undeclared(act_type, &mut object),
        }

        serde_json::from_value(Value::Object(object)).map_err(|e| AstraError::decode("act", e))
    }

    /// Encodes an act to JSON bytes. The `type` discriminator is always
    /// present.
    ///
    /// # Errors
    ///
    /// Returns [`AstraError::Encode`] if serialization fails.
    pub fn encode(&self, act: &Act) -> AstraResult<Vec<u8>> {
        serde_json::to_vec(act).map_err(|e| AstraError::encode("act", e))
    }

    /// Encodes an act to a JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`AstraError::Encode`] if serialization fails.
    pub fn encode_value(&self, act: &Act) -> AstraResult<Value> {
        serde_json::to_value(act).map_err(|e| AstraError::encode("act", e))
    }

    /// Decodes a conversation document.
    ///
    /// Every act goes through [`Self::decode_value`] and is then checked as
    /// if appended, in ledger order. Derived metadata is recomputed from the
    /// decoded acts; stored counts are ignored and extension keys are kept.
    ///
    /// # Errors
    ///
    /// [`AstraError::Decode`] for a malformed document,
    /// [`AstraError::InvalidAct`] naming the index of the first act that
    /// fails to decode or validate, or a validation error for the
    /// conversation's own fields.
    pub fn decode_conversation(&self, raw: &[u8]) -> AstraResult<Conversation> {
        let mut document: ConversationDocument =
            serde_json::from_slice(raw).map_err(|e| AstraError::decode("conversation", e))?;

        let acts = std::mem::take(&mut document.acts)
            .into_iter()
            .enumerate()
            .map(|(index, value)| {
                self.decode_value(value)
                    .map_err(|e| AstraError::at_act(index, e))
            })
            .collect::<AstraResult<Vec<_>>>()?;

        Conversation::restore(document, acts, self.validator)
    }

    /// Encodes a conversation to JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns [`AstraError::Encode`] if serialization fails.
    pub fn encode_conversation(&self, conversation: &Conversation) -> AstraResult<Vec<u8>> {
        serde_json::to_vec(conversation).map_err(|e| AstraError::encode("conversation", e))
    }
}

fn discriminator(object: &Map<String, Value>) -> Result<ActType, UnknownActType> {
    match object.get("type") {
        Some(Value::String(t)) => t.parse(),
        Some(other) => Err(UnknownActType {
            found: Some(other.to_string()),
        }),
        None => Err(UnknownActType { found: None }),
    }
}

fn strip_undeclared(act_type: ActType, object: &mut Map<String, Value>) {
    object.retain(|key, _| {
        let keep = is_declared(act_type, key);
        if !keep {
            debug!(act_type = %act_type, field = %key, "dropped undeclared act field");
        }
        keep
    });
}

/// Decodes an act with the default codec.
///
/// # Errors
///
/// See [`ActCodec::decode`].
pub fn decode(raw: &[u8]) -> AstraResult<Act> {
    ActCodec::new().decode(raw)
}

/// Encodes an act with the default codec.
///
/// # Errors
///
/// See [`ActCodec::encode`].
pub fn encode(act: &Act) -> AstraResult<Vec<u8>> {
    ActCodec::new().encode(act)
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    use super::*;
    use crate::act::{ActBase, Ask, Commit, CommitAction, CommitStatus, Confirm, ErrorAct, Fact};
    use crate::config::ValidationConfig;
    use crate::constraint::Constraint;
    use crate::error::ValidationErrorKind;

    fn base(id: &str, speaker: &str) -> ActBase {
        ActBase::from_parts(id, Utc.with_ymd_and_hms(2025, 1, 15, 14, 30, 0).unwrap(), speaker)
    }

    fn tolerant() -> ActCodec {
        ActCodec::with_config(&AstraConfig {
            validation: ValidationConfig {
                unknown_fields: UnknownFieldPolicy::Tolerate,
                max_text_len: None,
            },
            ..AstraConfig::default()
        })
    }

    #[test]
    fn test_round_trip_every_variant() {
        let acts: Vec<Act> = vec![
            Ask::from_base(base("act_1", "agent_1").with_confidence(0.9), "email", "Email?")
                .with_constraint(Constraint::required())
                .with_constraint(Constraint::email())
                .into(),
            Fact::from_base(base("act_2", "customer_1"), "order_1", "email", json!("jane@example.com"))
                .with_previous_value("old@example.com")
                .into(),
            Confirm::from_base(base("act_3", "agent_1"), "order_1", "Send to jane@example.com?")
                .with_fields(["email"])
                .into(),
            Commit::from_base(base("act_4", "system"), "order_1", CommitAction::Update)
                .with_system("crm")
                .with_status(CommitStatus::Success)
                .into(),
            ErrorAct::from_base(base("act_5", "system"), "TIMEOUT", "CRM timed out", true).into(),
        ];

        let codec = ActCodec::new();
        for act in acts {
            let bytes = codec.encode(&act).unwrap();
            let back = codec.decode(&bytes).unwrap();
            assert_eq!(back, act, "{}", act.act_type());
            assert_eq!(codec.encode_value(&act).unwrap()["type"], act.act_type().as_str());
        }
    }

    #[test]
    fn test_unknown_discriminator() {
        let err = decode(br#"{"type":"schedule","id":"act_1"}"#).unwrap_err();
        match err {
            AstraError::UnknownActType(e) => assert_eq!(e.found.as_deref(), Some("schedule")),
            other => panic!("unexpected error: {other}"),
        }

        let err = decode(br#"{"id":"act_1"}"#).unwrap_err();
        assert!(matches!(err, AstraError::UnknownActType(UnknownActType { found: None })));

        let err = decode(br#"{"type":7}"#).unwrap_err();
        assert!(err.is_unknown_act_type());
    }

    #[test]
    fn test_malformed_input() {
        assert!(decode(b"not json").unwrap_err().is_decode());
        assert!(decode(b"[1, 2]").unwrap_err().is_decode());
        // Entity references must be a string or an object.
        let err = decode(
            br#"{"type":"fact","id":"act_1","timestamp":"2025-01-15T14:30:00Z",
                 "speaker":"c","entity":42,"field":"email","value":"x"}"#,
        )
        .unwrap_err();
        assert!(err.is_decode());
    }

    #[test]
    fn test_unknown_field_policy() {
        let raw = json!({
            "type": "ask",
            "id": "act_1",
            "timestamp": "2025-01-15T14:30:00Z",
            "speaker": "agent_1",
            "field": "email",
            "prompt": "Email?",
            "priority": "high",
            "metadata": {"channel": "chat", "tenant": "acme"}
        });

        let err = ActCodec::new().decode_value(raw.clone()).unwrap_err();
        let v = err.as_validation().unwrap();
        assert_eq!(v.kind, ValidationErrorKind::UnknownField);
        assert_eq!(v.field, "priority");

        let act = tolerant().decode_value(raw).unwrap();
        let meta = act.base().metadata.as_ref().unwrap();
        assert_eq!(meta.extensions["tenant"], "acme");
        assert!(tolerant().encode_value(&act).unwrap().get("priority").is_none());
    }

    #[test]
    fn test_decode_does_not_validate() {
        let act = decode(
            br#"{"type":"commit","id":"act_1","timestamp":"2025-01-15T14:30:00Z",
                 "speaker":"system","entity":"order_1","action":"create","retry_count":-1}"#,
        )
        .unwrap();
        let err = crate::validation::validate(&act).unwrap_err();
        assert_eq!(err.field, "retry_count");
    }

    #[test]
    fn test_conversation_round_trip() {
        let mut conv = Conversation::builder()
            .id("conv_1")
            .participant(crate::conversation::Participant::human("customer_1"))
            .participant(crate::conversation::Participant::ai("agent_1"))
            .started_at(Utc.with_ymd_and_hms(2025, 1, 15, 14, 0, 0).unwrap())
            .channel("chat")
            .build()
            .unwrap();
        conv.add_act(Ask::from_base(base("act_1", "agent_1"), "email", "Email?").into())
            .unwrap();
        conv.add_act(
            Fact::from_base(base("act_2", "customer_1"), "order_1", "email", json!("a@b.com")).into(),
        )
        .unwrap();
        conv.set_metadata_extension("csat", 4).unwrap();

        let codec = ActCodec::new();
        let bytes = codec.encode_conversation(&conv).unwrap();
        let back = codec.decode_conversation(&bytes).unwrap();
        assert_eq!(back, conv);
    }

    #[test]
    fn test_conversation_recomputes_metadata() {
        let raw = json!({
            "id": "conv_1",
            "participants": [{"id": "agent_1", "type": "ai"}],
            "started_at": "2025-01-15T14:00:00Z",
            "ended_at": "2025-01-15T14:05:00Z",
            "status": "completed",
            "acts": [{
                "type": "ask", "id": "act_1", "timestamp": "2025-01-15T14:01:00Z",
                "speaker": "agent_1", "field": "email", "prompt": "Email?"
            }],
            "metadata": {"act_count": 99, "error_count": 7}
        });
        let conv = decode_conversation_value(&raw);
        assert_eq!(conv.metadata().act_count, 1);
        assert_eq!(conv.metadata().error_count, 0);
        assert_eq!(conv.metadata().total_duration_ms, Some(300_000));
        assert_eq!(conv.status(), crate::conversation::ConversationStatus::Completed);
    }

    #[test]
    fn test_conversation_reports_failing_act_index() {
        let raw = json!({
            "id": "conv_1",
            "participants": [{"id": "agent_1", "type": "ai"}],
            "started_at": "2025-01-15T14:00:00Z",
            "acts": [
                {"type": "ask", "id": "act_1", "timestamp": "2025-01-15T14:01:00Z",
                 "speaker": "agent_1", "field": "email", "prompt": "Email?"},
                {"type": "ask", "id": "act_2", "timestamp": "2025-01-15T14:02:00Z",
                 "speaker": "agent_1", "field": "", "prompt": ""},
                {"type": "schedule"}
            ]
        });
        let bytes = serde_json::to_vec(&raw).unwrap();
        let err = ActCodec::new().decode_conversation(&bytes).unwrap_err();
        // Index 2 is undecodable, but acts decode before any is checked.
        assert!(matches!(err, AstraError::InvalidAct { index: 2, .. }));
        assert!(err.root().is_unknown_act_type());

        let mut raw = raw;
        raw["acts"].as_array_mut().unwrap().pop();
        let bytes = serde_json::to_vec(&raw).unwrap();
        let err = ActCodec::new().decode_conversation(&bytes).unwrap_err();
        assert!(matches!(err, AstraError::InvalidAct { index: 1, .. }));
        assert_eq!(err.root().as_validation().unwrap().field, "field");
    }

    #[test]
    fn test_conversation_status_must_agree_with_ended_at() {
        let open_with_end = json!({
            "id": "conv_1",
            "participants": [{"id": "agent_1", "type": "ai"}],
            "started_at": "2025-01-15T14:00:00Z",
            "ended_at": "2025-01-15T14:05:00Z",
            "status": "active",
            "acts": []
        });
        let bytes = serde_json::to_vec(&open_with_end).unwrap();
        let err = ActCodec::new().decode_conversation(&bytes).unwrap_err();
        let v = err.as_validation().unwrap();
        assert_eq!((v.field.as_str(), v.kind), ("ended_at", ValidationErrorKind::InvalidFormat));

        let closed_without_end = json!({
            "id": "conv_1",
            "participants": [{"id": "agent_1", "type": "ai"}],
            "started_at": "2025-01-15T14:00:00Z",
            "status": "completed",
            "acts": []
        });
        let bytes = serde_json::to_vec(&closed_without_end).unwrap();
        let err = ActCodec::new().decode_conversation(&bytes).unwrap_err();
        let v = err.as_validation().unwrap();
        assert_eq!((v.field.as_str(), v.kind), ("ended_at", ValidationErrorKind::Missing));

        let paused = json!({
            "id": "conv_1",
            "participants": [{"id": "agent_1", "type": "ai"}],
            "started_at": "2025-01-15T14:00:00Z",
            "status": "paused",
            "acts": []
        });
        let conv = decode_conversation_value(&paused);
        assert!(conv.ended_at().is_none());
        assert!(conv.metadata().total_duration_ms.is_none());
    }

    #[test]
    fn test_derived_metadata_keys_are_never_extensions() {
        let mut conv = Conversation::builder()
            .id("conv_1")
            .participant(crate::conversation::Participant::ai("agent_1"))
            .build()
            .unwrap();
        let err = conv.set_metadata_extension("act_count", 99).unwrap_err();
        assert_eq!(err.field, "metadata.act_count");
        assert_eq!(err.kind, ValidationErrorKind::Duplicate);

        let encoded: Value =
            serde_json::from_slice(&ActCodec::new().encode_conversation(&conv).unwrap()).unwrap();
        assert_eq!(encoded["metadata"]["act_count"], 0);
        assert!(encoded["acts"].as_array().unwrap().is_empty());
    }

    fn decode_conversation_value(raw: &Value) -> Conversation {
        let bytes = serde_json::to_vec(raw).unwrap();
        ActCodec::new().decode_conversation(&bytes).unwrap()
    }
}
