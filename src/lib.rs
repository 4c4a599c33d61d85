//! # ASTRA - Act State Representation Architecture
//!
//! ASTRA models a business conversation as a typed, append-only ledger of
//! conversational acts. Every act is one of five kinds, and the ledger keeps
//! derived metadata consistent with the acts it holds.
//!
//! ## Core Concepts
//!
//! - **Act**: An atomic, timestamped action by a speaker: [`Ask`], [`Fact`],
//!   [`Confirm`], [`Commit`] or [`ErrorAct`]
//! - **Entity reference**: Either a bare id or a structured [`Entity`]
//! - **Constraint**: A declarative rule on an expected answer, evaluated by the
//!   [`ConstraintEngine`]
//! - **Conversation**: Participants, the act ledger and derived metadata
//!
//! Structural validation ([`StructuralValidator`]) is fail-fast and checks
//! shape only; constraint evaluation reports every violation.
//!
//! ## Usage
//!
//! ```rust
//! use astra::{
//!     Ask, Commit, CommitAction, CommitStatus, Conversation, ConversationStatus, Fact,
//!     Participant,
//! };
//! use serde_json::json;
//!
//! let mut conv = Conversation::builder()
//!     .participant(Participant::human("customer_1"))
//!     .participant(Participant::ai("agent_1"))
//!     .participant(Participant::system("order_system"))
//!     .build()?;
//!
//! conv.add_act(Ask::new("agent_1", "email", "What's your email?").into())?;
//! conv.add_act(Fact::new("customer_1", "order_1", "email", json!("jane@example.com")).into())?;
//! conv.add_act(
//!     Commit::new("order_system", "order_1", CommitAction::Update)
//!         .with_status(CommitStatus::Success)
//!         .into(),
//! )?;
//! conv.end(ConversationStatus::Completed)?;
//!
//! let meta = conv.metadata();
//! assert_eq!((meta.act_count, meta.error_count, meta.commit_count), (3, 0, 1));
//! # Ok::<(), astra::AstraError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Core types
pub mod act;
pub mod entity;
pub mod error;
pub mod ids;

// Validation and evaluation
pub mod constraint;
pub mod schema;
pub mod validation;

// Ledger, wire format and runtime
pub mod clock;
pub mod codec;
pub mod config;
pub mod conversation;

// Re-export primary types at crate root for convenience
pub use act::{
    Act, ActBase, ActMetadata, ActSource, ActType, Ask, Commit, CommitAction, CommitError,
    CommitStatus, Confirm, ConfirmationMethod, ErrorAct, ErrorCategory, ErrorSeverity,
    ExpectedType, Fact, FieldOperation, SuggestedAction, ValidationStatus,
};
pub use clock::{Clock, FixedClock, SystemClock};
pub use codec::ActCodec;
pub use config::{AstraConfig, UnknownFieldPolicy};
pub use constraint::{
    BusinessRuleHook, Constraint, ConstraintEngine, ConstraintRule, ConstraintViolation,
    FormatType, RangeBounds, RuleOutcome,
};
pub use conversation::registry::LedgerRegistry;
pub use conversation::{
    Conversation, ConversationBuilder, ConversationContext, ConversationMetadata,
    ConversationStatus, Participant, ParticipantType,
};
pub use entity::{Entity, EntityRef};
pub use error::{
    ActNotFoundError, AstraError, AstraResult, EntityReferenceError, UnknownActType,
    ValidationError, ValidationErrorKind,
};
pub use ids::{IdGenerator, UuidIdGenerator};
pub use schema::SchemaRegistry;
pub use validation::StructuralValidator;
