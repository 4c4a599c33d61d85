//! Shared, thread-safe access to many conversations.
//!
//! The registry maps conversation ids to `Arc<Mutex<Conversation>>`. The map
//! lock is held only for lookup and insert; appends to one conversation
//! serialize on that conversation's mutex while other conversations proceed
//! in parallel.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use tracing::debug;

use super::{Conversation, ConversationStatus, Participant};
use crate::act::Act;
use crate::clock::{Clock, SystemClock};
use crate::error::{AstraError, AstraResult};
use crate::ids::{IdGenerator, UuidIdGenerator};
use crate::validation::StructuralValidator;

/// Shared handle to one registered conversation.
pub type SharedConversation = Arc<Mutex<Conversation>>;

fn lock_err(context: &'static str) -> AstraError {
    AstraError::internal(format!("poisoned lock: {context}"))
}

fn lock_conversation(conversation: &SharedConversation) -> AstraResult<MutexGuard<'_, Conversation>> {
    conversation.lock().map_err(|_| lock_err("conversation"))
}

/// In-process registry of live conversations.
pub struct LedgerRegistry {
    conversations: RwLock<HashMap<String, SharedConversation>>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    validator: StructuralValidator,
}

impl std::fmt::Debug for LedgerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerRegistry")
            .field("conversations", &self.len().unwrap_or_default())
            .field("validator", &self.validator)
            .finish_non_exhaustive()
    }
}

impl Default for LedgerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl LedgerRegistry {
    /// Creates an empty registry using the system clock and UUID ids.
    #[must_use]
    pub fn new() -> Self {
        Self {
            conversations: RwLock::new(HashMap::new()),
            clock: Arc::new(SystemClock),
            ids: Arc::new(UuidIdGenerator),
            validator: StructuralValidator::new(),
        }
    }

    /// Replaces the clock used for start and end instants.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replaces the id generator used by [`Self::create`].
    #[must_use]
    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    /// Replaces the validator given to conversations created here.
    #[must_use]
    pub const fn with_validator(mut self, validator: StructuralValidator) -> Self {
        self.validator = validator;
        self
    }

    /// Starts a new conversation and registers it.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `participants` is empty or has repeated
    /// ids, or an internal error if the registry lock is poisoned.
    ///
    /// # Examples
    ///
    /// ```
    /// use astra::{Ask, LedgerRegistry, Participant};
    ///
    /// let registry = LedgerRegistry::new();
    /// let id = registry
    ///     .create(vec![Participant::human("customer_1"), Participant::ai("agent_1")])
    ///     .unwrap();
    /// registry
    ///     .append(&id, Ask::new("agent_1", "email", "What's your email?").into())
    ///     .unwrap();
    /// assert_eq!(registry.snapshot(&id).unwrap().len(), 1);
    /// ```
    pub fn create(&self, participants: Vec<Participant>) -> AstraResult<String> {
        let conversation = Conversation::builder()
            .id(self.ids.generate_conversation_id())
            .participants(participants)
            .started_at(self.clock.now())
            .validator(self.validator)
            .build()?;
        let id = conversation.id().to_string();
        self.insert(conversation)?;
        Ok(id)
    }

    /// Registers an existing conversation.
    ///
    /// # Errors
    ///
    /// Returns [`AstraError::DuplicateConversation`] if the id is taken.
    pub fn insert(&self, conversation: Conversation) -> AstraResult<SharedConversation> {
        let mut map = self.conversations.write().map_err(|_| lock_err("registry"))?;
        let id = conversation.id().to_string();
        if map.contains_key(&id) {
            return Err(AstraError::DuplicateConversation { id });
        }
        let shared = Arc::new(Mutex::new(conversation));
        map.insert(id.clone(), Arc::clone(&shared));
        debug!(conversation_id = %id, "registered conversation");
        Ok(shared)
    }

    /// Returns the shared handle for `id`.
    ///
    /// # Errors
    ///
    /// Returns [`AstraError::ConversationNotFound`] if no conversation has
    /// that id.
    pub fn get(&self, id: &str) -> AstraResult<SharedConversation> {
        let map = self.conversations.read().map_err(|_| lock_err("registry"))?;
        map.get(id)
            .cloned()
            .ok_or_else(|| AstraError::ConversationNotFound { id: id.to_string() })
    }

    /// Returns a copy of the conversation as it is now.
    ///
    /// # Errors
    ///
    /// See [`Self::get`].
    pub fn snapshot(&self, id: &str) -> AstraResult<Conversation> {
        let shared = self.get(id)?;
        let conversation = lock_conversation(&shared)?;
        Ok(conversation.clone())
    }

    /// Appends an act to the conversation `id`.
    ///
    /// # Errors
    ///
    /// [`AstraError::ConversationNotFound`], or any error from
    /// [`Conversation::add_act`].
    pub fn append(&self, id: &str, act: Act) -> AstraResult<()> {
        let shared = self.get(id)?;
        let mut conversation = lock_conversation(&shared)?;
        conversation.add_act(act)
    }

    /// Ends the conversation `id` at the registry clock's current instant.
    ///
    /// # Errors
    ///
    /// [`AstraError::ConversationNotFound`], or any error from
    /// [`Conversation::end_at`].
    pub fn end(&self, id: &str, status: ConversationStatus) -> AstraResult<()> {
        let shared = self.get(id)?;
        let mut conversation = lock_conversation(&shared)?;
        conversation.end_with(status, self.clock.as_ref())
    }

    /// Unregisters and returns the conversation `id`.
    ///
    /// Outstanding handles from [`Self::get`] keep working on the removed
    /// conversation.
    ///
    /// # Errors
    ///
    /// [`AstraError::ConversationNotFound`] if `id` is not registered.
    pub fn remove(&self, id: &str) -> AstraResult<SharedConversation> {
        let mut map = self.conversations.write().map_err(|_| lock_err("registry"))?;
        let removed = map
            .remove(id)
            .ok_or_else(|| AstraError::ConversationNotFound { id: id.to_string() })?;
        debug!(conversation_id = %id, "unregistered conversation");
        Ok(removed)
    }

    /// Registered ids, sorted.
    ///
    /// # Errors
    ///
    /// Internal error if the registry lock is poisoned.
    pub fn ids(&self) -> AstraResult<Vec<String>> {
        let map = self.conversations.read().map_err(|_| lock_err("registry"))?;
        let mut ids: Vec<String> = map.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    /// Number of registered conversations.
    ///
    /// # Errors
    ///
    /// Internal error if the registry lock is poisoned.
    pub fn len(&self) -> AstraResult<usize> {
        let map = self.conversations.read().map_err(|_| lock_err("registry"))?;
        Ok(map.len())
    }

    /// Returns true if nothing is registered.
    ///
    /// # Errors
    ///
    /// Internal error if the registry lock is poisoned.
    pub fn is_empty(&self) -> AstraResult<bool> {
        Ok(self.len()? == 0)
    }
}
