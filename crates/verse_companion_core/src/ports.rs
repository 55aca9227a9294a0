//! crates/verse_companion_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the
//! core to be independent of specific external implementations like databases
//! or HTTP APIs.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::domain::{DailyVerse, Message, MessageRole, Profile, UserCredentials, VerseContent};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// The storage collaborator: profiles, the append-only chat transcript, and
/// login sessions.
#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- Profiles ---

    /// Creates a profile with a zeroed engagement record (streak 0, never
    /// engaged). Duplicate emails are a [`PortError::Conflict`].
    async fn create_profile(&self, email: &str, hashed_password: &str) -> PortResult<Profile>;

    async fn get_profile(&self, user_id: Uuid) -> PortResult<Profile>;

    async fn get_credentials_by_email(&self, email: &str) -> PortResult<UserCredentials>;

    /// Persists the outcome of a streak computation: the new count and the
    /// day it was earned.
    async fn record_engagement(
        &self,
        user_id: Uuid,
        streak: u32,
        engaged_on: NaiveDate,
    ) -> PortResult<()>;

    // --- Messages ---

    /// Append-only insert. Inserting a second `system` message for the same
    /// user and day is a [`PortError::Conflict`] (one daily verse per day).
    async fn append_message(
        &self,
        user_id: Uuid,
        content: &str,
        role: MessageRole,
        conversation_date: NaiveDate,
    ) -> PortResult<Message>;

    /// The user's whole transcript, ordered by `created_at` ascending.
    async fn message_history(&self, user_id: Uuid) -> PortResult<Vec<Message>>;

    // --- Auth Sessions ---

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    /// Resolves a session id to its user, rejecting unknown and expired
    /// sessions with [`PortError::Unauthorized`].
    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;
}

/// The verse lookup collaborator.
#[async_trait]
pub trait VerseProvider: Send + Sync {
    /// A random verse, used when assigning the verse of the day.
    async fn random_verse(&self) -> PortResult<VerseContent>;

    /// Looks up a passage by reference (e.g. "John 3:16", "Psalm 23"). A
    /// passage spanning several verses yields one entry per verse.
    async fn search_passage(&self, query: &str) -> PortResult<Vec<VerseContent>>;
}

/// The chat completion collaborator: turns a user's message about today's
/// verse into a reflection reply.
#[async_trait]
pub trait ReflectionService: Send + Sync {
    async fn reflect(&self, verse: &DailyVerse, user_message: &str) -> PortResult<String>;
}
