//! Conversation participants.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Kind of participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantType {
    /// A person.
    Human,
    /// An AI agent.
    Ai,
    /// A backend system.
    System,
    /// A scripted bot.
    Bot,
}

/// Participant preferences.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParticipantPreferences {
    /// Preferred language (ISO 639-1, optional region).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    /// Preferred timezone (IANA identifier).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,

    /// Preferred channels, most preferred first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub communication_channels: Vec<String>,

    /// Any other preference keys.
    #[serde(flatten)]
    pub extensions: BTreeMap<String, serde_json::Value>,
}

impl ParticipantPreferences {
    /// Wire names of the typed fields.
    pub const FIELDS: &'static [&'static str] = &["language", "timezone", "communication_channels"];

    /// Adds a preference key.
    ///
    /// A key that names a typed field sets that field when the value fits;
    /// otherwise it is kept as an extension, which
    /// [`Conversation::add_participant`](super::Conversation::add_participant)
    /// rejects.
    #[must_use]
    pub fn with_extension(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        use serde_json::Value;

        let key = key.into();
        let rest = match (key.as_str(), value.into()) {
            ("language", Value::String(s)) => {
                self.language = Some(s);
                None
            }
            ("timezone", Value::String(s)) => {
                self.timezone = Some(s);
                None
            }
            ("communication_channels", Value::Array(items))
                if items.iter().all(Value::is_string) =>
            {
                self.communication_channels = items
                    .into_iter()
                    .filter_map(|v| match v {
                        Value::String(s) => Some(s),
                        _ => None,
                    })
                    .collect();
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

/// A party to a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    /// Identifier; acts name it as their `speaker`.
    pub id: String,

    /// Kind of participant.
    #[serde(rename = "type")]
    pub participant_type: ParticipantType,

    /// Business role (customer, agent, manager, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Contact email.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Contact phone number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,

    /// Identifier in an external system.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,

    /// System that manages this participant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    /// What the participant can do.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub capabilities: Vec<String>,

    /// What the participant is allowed to do.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub permissions: Vec<String>,

    /// Language, timezone and channel preferences.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferences: Option<ParticipantPreferences>,

    /// Participant-specific data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
}

impl Participant {
    /// Creates a participant.
    #[must_use]
    pub fn new(id: impl Into<String>, participant_type: ParticipantType) -> Self {
        Self {
            id: id.into(),
            participant_type,
            role: None,
            name: None,
            email: None,
            phone: None,
            external_id: None,
            system: None,
            capabilities: Vec::new(),
            permissions: Vec::new(),
            preferences: None,
            metadata: None,
        }
    }

    /// Creates a human participant.
    #[must_use]
    pub fn human(id: impl Into<String>) -> Self {
        Self::new(id, ParticipantType::Human)
    }

    /// Creates an AI participant.
    #[must_use]
    pub fn ai(id: impl Into<String>) -> Self {
        Self::new(id, ParticipantType::Ai)
    }

    /// Creates a system participant.
    #[must_use]
    pub fn system(id: impl Into<String>) -> Self {
        Self::new(id, ParticipantType::System)
    }

    /// Sets the role.
    #[must_use]
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the email address.
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Sets the phone number.
    #[must_use]
    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    /// Adds a capability.
    #[must_use]
    pub fn with_capability(mut self, capability: impl Into<String>) -> Self {
        self.capabilities.push(capability.into());
        self
    }

    /// Adds a permission.
    #[must_use]
    pub fn with_permission(mut self, permission: impl Into<String>) -> Self {
        self.permissions.push(permission.into());
        self
    }

    /// Sets the preferences.
    #[must_use]
    pub fn with_preferences(mut self, preferences: ParticipantPreferences) -> Self {
        self.preferences = Some(preferences);
        self
    }

    /// Returns true if the participant holds `permission`.
    #[must_use]
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_participant_wire_form() {
        let p = Participant::human("customer_1")
            .with_role("customer")
            .with_email("jane@example.com");
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json["type"], "human");
        assert_eq!(json["role"], "customer");
        assert!(json.get("capabilities").is_none());

        let minimal: Participant =
            serde_json::from_value(json!({"id": "agent_1", "type": "ai"})).unwrap();
        assert_eq!(minimal.participant_type, ParticipantType::Ai);
    }

    #[test]
    fn test_preferences_extensions() {
        let raw = json!({
            "language": "en-US",
            "communication_channels": ["sms", "email"],
            "quiet_hours": "22:00-07:00"
        });
        let prefs: ParticipantPreferences = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(prefs.communication_channels, vec!["sms", "email"]);
        assert_eq!(prefs.extensions["quiet_hours"], "22:00-07:00");
        assert_eq!(serde_json::to_value(&prefs).unwrap(), raw);
    }

    #[test]
    fn test_preference_extension_naming_typed_field() {
        let prefs = ParticipantPreferences::default()
            .with_extension("timezone", "Europe/London")
            .with_extension("communication_channels", json!(["sms"]))
            .with_extension("quiet_hours", "22:00-07:00");
        assert_eq!(prefs.timezone.as_deref(), Some("Europe/London"));
        assert_eq!(prefs.communication_channels, vec!["sms"]);
        assert_eq!(prefs.extensions.len(), 1);

        let back: ParticipantPreferences =
            serde_json::from_value(serde_json::to_value(&prefs).unwrap()).unwrap();
        assert_eq!(back, prefs);
    }

    #[test]
    fn test_permissions() {
        let p = Participant::ai("agent_1").with_permission("commit:orders");
        assert!(p.has_permission("commit:orders"));
        assert!(!p.has_permission("commit:refunds"));
    }
}
