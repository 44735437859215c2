//! crates/polls_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the concrete store behind it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{Choice, Question, QuestionDetail, QuestionSummary, User, UserCredentials};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from the storage backend.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Invalid input: {0}")]
    Invalid(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Query Types
//=========================================================================================

/// Admin list query: case-insensitive text search plus an optional
/// half-open publication range.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuestionQuery {
    pub text_contains: Option<String>,
    pub published_range: Option<(DateTime<Utc>, DateTime<Utc>)>,
}

impl QuestionQuery {
    pub fn matches(&self, question: &Question) -> bool {
        let text_ok = self.text_contains.as_ref().map_or(true, |needle| {
            question
                .text
                .to_lowercase()
                .contains(&needle.to_lowercase())
        });
        let range_ok = self.published_range.map_or(true, |(from, to)| {
            from <= question.publication_time && question.publication_time < to
        });
        text_ok && range_ok
    }
}

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- Questions ---
    /// Stores a question together with its initial choices; either all of
    /// them are written or none.
    async fn create_question(
        &self,
        text: &str,
        publication_time: DateTime<Utc>,
        choices: &[&str],
    ) -> PortResult<QuestionDetail>;

    async fn update_question(
        &self,
        question_id: i64,
        text: &str,
        publication_time: DateTime<Utc>,
    ) -> PortResult<Question>;

    /// Removes the question together with all of its choices.
    async fn delete_question(&self, question_id: i64) -> PortResult<()>;

    async fn get_question(&self, question_id: i64) -> PortResult<Question>;

    async fn search_questions(&self, query: &QuestionQuery) -> PortResult<Vec<QuestionSummary>>;

    // --- Visibility ---
    /// Published questions with at least one choice, newest first, at most `limit`.
    async fn list_visible_questions(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> PortResult<Vec<Question>>;

    /// `NotFound` when the question is missing, unpublished or has no choices.
    async fn get_visible_question(
        &self,
        question_id: i64,
        now: DateTime<Utc>,
    ) -> PortResult<Question>;

    // --- Choices ---
    async fn add_choice(&self, question_id: i64, text: &str) -> PortResult<Choice>;

    async fn delete_choice(&self, question_id: i64, choice_id: i64) -> PortResult<()>;

    async fn get_choices_for_question(&self, question_id: i64) -> PortResult<Vec<Choice>>;

    /// Adds exactly one vote to the choice in a single atomic step.
    /// `NotFound` when the choice does not belong to the question.
    async fn increment_choice_votes(&self, question_id: i64, choice_id: i64)
        -> PortResult<Choice>;

    // --- Accounts ---
    async fn create_user(&self, username: &str, hashed_password: &str) -> PortResult<User>;

    async fn get_user_by_username(&self, username: &str) -> PortResult<UserCredentials>;

    async fn get_user_by_id(&self, user_id: Uuid) -> PortResult<User>;

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    /// Returns the owner of a live session; `Unauthorized` if missing or expired.
    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;
}
