//! Identifier patterns and generation.
//!
//! Act ids match `^act_[A-Za-z0-9_-]+$` and conversation ids match
//! `^conv_[A-Za-z0-9_-]+$`. Generation sits behind [`IdGenerator`] so hosts
//! can substitute their own scheme (sequential ids in tests, snowflakes in
//! production) as long as the patterns hold.

use std::sync::OnceLock;

use regex::Regex;
use uuid::Uuid;

/// Prefix of every act id.
pub const ACT_ID_PREFIX: &str = "act_";

/// Prefix of every conversation id.
pub const CONVERSATION_ID_PREFIX: &str = "conv_";

/// Pattern every act id matches. Also published in the `act` schema.
pub const ACT_ID_PATTERN: &str = "^act_[a-zA-Z0-9_-]+$";

/// Pattern every conversation id matches. Also published in the
/// `conversation` schema.
pub const CONVERSATION_ID_PATTERN: &str = "^conv_[a-zA-Z0-9_-]+$";

static ACT_ID_RE: OnceLock<Option<Regex>> = OnceLock::new();
static CONVERSATION_ID_RE: OnceLock<Option<Regex>> = OnceLock::new();

fn matches_pattern(cell: &OnceLock<Option<Regex>>, pattern: &str, id: &str) -> bool {
    cell.get_or_init(|| Regex::new(pattern).ok())
        .as_ref()
        .is_some_and(|re| re.is_match(id))
}

/// Returns true if `id` matches `^act_[A-Za-z0-9_-]+$`.
///
/// # Examples
///
/// ```
/// use astra::ids::is_valid_act_id;
///
/// assert!(is_valid_act_id("act_123"));
/// assert!(!is_valid_act_id("act_"));
/// assert!(!is_valid_act_id("ask_123"));
/// ```
#[must_use]
pub fn is_valid_act_id(id: &str) -> bool {
    matches_pattern(&ACT_ID_RE, ACT_ID_PATTERN, id)
}

/// Returns true if `id` matches `^conv_[A-Za-z0-9_-]+$`.
#[must_use]
pub fn is_valid_conversation_id(id: &str) -> bool {
    matches_pattern(&CONVERSATION_ID_RE, CONVERSATION_ID_PATTERN, id)
}

/// Source of fresh act and conversation identifiers.
///
/// Implementations must return ids satisfying the corresponding pattern and
/// must not repeat an id within the lifetime of the process.
pub trait IdGenerator: Send + Sync {
    /// Returns a new act id.
    fn generate_act_id(&self) -> String;

    /// Returns a new conversation id.
    fn generate_conversation_id(&self) -> String;
}

/// Default generator: a random v4 UUID in simple (hex) form behind the prefix.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidIdGenerator;

impl IdGenerator for UuidIdGenerator {
    fn generate_act_id(&self) -> String {
        format!("{ACT_ID_PREFIX}{}", Uuid::new_v4().simple())
    }

    fn generate_conversation_id(&self) -> String {
        format!("{CONVERSATION_ID_PREFIX}{}", Uuid::new_v4().simple())
    }
}

/// Generates an act id with the default generator.
#[must_use]
pub fn generate_act_id() -> String {
    UuidIdGenerator.generate_act_id()
}

/// Generates a conversation id with the default generator.
#[must_use]
pub fn generate_conversation_id() -> String {
    UuidIdGenerator.generate_conversation_id()
}
