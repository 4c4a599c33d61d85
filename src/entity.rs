//! Entity references and their resolution.
//!
//! Facts, confirmations and commits point at a business object (an order, a
//! customer, an appointment). On the wire that pointer is either a bare id
//! string or a structured entity record; [`EntityRef::resolve`] normalizes
//! both to the canonical id.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::EntityReferenceError;

/// Reference to a business entity carried in full.
///
/// # Examples
///
/// ```
/// use astra::Entity;
///
/// let order = Entity::new("order_2", "order").with_system("order_management");
/// assert_eq!(order.id, "order_2");
/// assert_eq!(order.system.as_deref(), Some("order_management"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Identifier within the conversation scope.
    pub id: String,

    /// Kind of business entity (order, customer, appointment, ticket, ...).
    #[serde(rename = "type")]
    pub entity_type: String,

    /// Identifier in the owning system.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,

    /// External system that owns this entity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    /// Version or revision.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// URL of the entity's schema.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_url: Option<String>,

    /// Entity-specific data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
}

impl Entity {
    /// Creates an entity with the given id and type.
    #[must_use]
    pub fn new(id: impl Into<String>, entity_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            entity_type: entity_type.into(),
            external_id: None,
            system: None,
            version: None,
            schema_url: None,
            metadata: None,
        }
    }

    /// Sets the external system identifier.
    #[must_use]
    pub fn with_external_id(mut self, external_id: impl Into<String>) -> Self {
        self.external_id = Some(external_id.into());
        self
    }

    /// Sets the owning system.
    #[must_use]
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Sets the version or revision.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Sets the schema URL.
    #[must_use]
    pub fn with_schema_url(mut self, schema_url: impl Into<String>) -> Self {
        self.schema_url = Some(schema_url.into());
        self
    }

    /// Sets entity-specific metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: serde_json::Map<String, serde_json::Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Returns true if both `id` and `type` are non-empty.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.id.is_empty() && !self.entity_type.is_empty()
    }
}

/// A polymorphic pointer to a business entity.
///
/// Serialized untagged: a JSON string is an [`EntityRef::Id`], a JSON object
/// is an [`EntityRef::Entity`]. Any other JSON shape fails to decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityRef {
    /// Bare identifier.
    Id(String),
    /// Structured entity record.
    Entity(Entity),
}

impl EntityRef {
    /// Resolves the reference to its canonical id.
    ///
    /// # Errors
    ///
    /// Returns [`EntityReferenceError`] if the id (bare or structured) is empty.
    ///
    /// # Examples
    ///
    /// ```
    /// use astra::{Entity, EntityRef};
    ///
    /// assert_eq!(EntityRef::from("order_1").resolve().unwrap(), "order_1");
    /// assert_eq!(EntityRef::from(Entity::new("order_2", "order")).resolve().unwrap(), "order_2");
    /// assert!(EntityRef::from(Entity::new("", "order")).resolve().is_err());
    /// ```
    pub fn resolve(&self) -> Result<&str, EntityReferenceError> {
        match self {
            Self::Id(id) if id.is_empty() => Err(EntityReferenceError::EmptyId),
            Self::Id(id) => Ok(id),
            Self::Entity(e) if e.id.is_empty() => Err(EntityReferenceError::EmptyStructuredId {
                entity_type: e.entity_type.clone(),
            }),
            Self::Entity(e) => Ok(&e.id),
        }
    }

    /// Returns the structured record, if this is one.
    #[must_use]
    pub const fn as_entity(&self) -> Option<&Entity> {
        match self {
            Self::Entity(e) => Some(e),
            Self::Id(_) => None,
        }
    }

    /// Returns true if the reference resolves.
    #[must_use]
    pub fn is_resolvable(&self) -> bool {
        self.resolve().is_ok()
    }

    /// Returns the wire form of this reference, for error reporting.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Id(id) => serde_json::Value::String(id.clone()),
            Self::Entity(e) => serde_json::to_value(e).unwrap_or(serde_json::Value::Null),
        }
    }
}

/// Resolves an entity reference to its canonical id.
///
/// # Errors
///
/// See [`EntityRef::resolve`].
pub fn resolve(reference: &EntityRef) -> Result<&str, EntityReferenceError> {
    reference.resolve()
}

impl Default for EntityRef {
    fn default() -> Self {
        Self::Id(String::new())
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::Entity(e) => write!(f, "{}:{}", e.entity_type, e.id),
        }
    }
}

impl From<&str> for EntityRef {
    fn from(id: &str) -> Self {
        Self::Id(id.to_string())
    }
}

impl From<String> for EntityRef {
    fn from(id: String) -> Self {
        Self::Id(id)
    }
}

impl From<Entity> for EntityRef {
    fn from(entity: Entity) -> Self {
        Self::Entity(entity)
    }
}
