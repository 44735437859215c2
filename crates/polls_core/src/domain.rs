//! crates/polls_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::visibility::RecencyWindow;

/// A poll prompt. Becomes public once `publication_time` has passed and it
/// owns at least one choice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub id: i64,
    pub text: String,
    pub publication_time: DateTime<Utc>,
}

impl Question {
    /// Whether the question was published inside `window` around `now`.
    pub fn is_recent(&self, now: DateTime<Utc>, window: &RecencyWindow) -> bool {
        window.contains(self.publication_time, now)
    }
}

/// One selectable answer of a question, carrying its vote tally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    pub id: i64,
    pub question_id: i64,
    pub text: String,
    pub vote_count: i64,
}

/// A question together with its choices, ordered by choice id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionDetail {
    pub question: Question,
    pub choices: Vec<Choice>,
}

impl QuestionDetail {
    pub fn total_votes(&self) -> i64 {
        self.choices.iter().map(|c| c.vote_count).sum()
    }
}

/// Row of the admin question list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionSummary {
    pub question: Question,
    pub choice_count: i64,
}

// Represents a user - used throughout app
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub user_id: Uuid,
    pub username: String,
}

// Only used internally for signin - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user_id: Uuid,
    pub username: String,
    pub hashed_password: String,
}

// Represents a browser signin session (auth cookie)
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub id: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}
