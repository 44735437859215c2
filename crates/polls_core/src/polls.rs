//! crates/polls_core/src/polls.rs
//!
//! Poll business logic: the public visibility queries, the vote transaction
//! and the admin operations, all expressed against the `DatabaseService` port.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::domain::{Choice, Question, QuestionDetail, QuestionSummary};
use crate::ports::{DatabaseService, PortError, PortResult, QuestionQuery};
use crate::visibility::{PublishedFilter, RecencyWindow, INDEX_LIMIT};

/// Longest accepted question or choice text.
pub const MAX_LABEL_LEN: usize = 255;

/// Result of a vote submission that reached an existing question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteOutcome {
    /// The choice's tally went up by one.
    Recorded(Choice),
    /// No valid choice of the question was selected; nothing changed.
    NoSelection(QuestionDetail),
}

/// Input for creating a question from the admin surface.
#[derive(Debug, Clone)]
pub struct NewQuestion {
    pub text: String,
    pub publication_time: DateTime<Utc>,
    pub choices: Vec<String>,
}

/// Admin list row with the derived "recent" flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminQuestionRow {
    pub summary: QuestionSummary,
    pub is_recent: bool,
}

#[derive(Clone)]
pub struct PollService {
    db: Arc<dyn DatabaseService>,
    window: RecencyWindow,
}

impl PollService {
    pub fn new(db: Arc<dyn DatabaseService>, window: RecencyWindow) -> Self {
        Self { db, window }
    }

    pub fn window(&self) -> &RecencyWindow {
        &self.window
    }

    /// Questions for the public index: published, with choices, newest first,
    /// at most [`INDEX_LIMIT`].
    pub async fn list_visible(&self, now: DateTime<Utc>) -> PortResult<Vec<Question>> {
        self.db.list_visible_questions(now, INDEX_LIMIT).await
    }

    /// A single public question. Unpublished and choice-less questions
    /// report the same `NotFound` as missing ones.
    pub async fn get_visible(&self, question_id: i64, now: DateTime<Utc>) -> PortResult<QuestionDetail> {
        let question = self.db.get_visible_question(question_id, now).await?;
        self.with_choices(question).await
    }

    /// Current tallies of an existing question.
    pub async fn results(&self, question_id: i64) -> PortResult<QuestionDetail> {
        let question = self.db.get_question(question_id).await?;
        self.with_choices(question).await
    }

    /// Records one vote for `choice_id` on `question_id`.
    ///
    /// Fails with `NotFound` only when the question does not exist. A missing
    /// choice, or one owned by another question, yields
    /// [`VoteOutcome::NoSelection`] and leaves every tally untouched.
    pub async fn cast_vote(&self, question_id: i64, choice_id: Option<i64>) -> PortResult<VoteOutcome> {
        let question = self.db.get_question(question_id).await?;

        let Some(choice_id) = choice_id else {
            return Ok(VoteOutcome::NoSelection(self.with_choices(question).await?));
        };

        match self.db.increment_choice_votes(question_id, choice_id).await {
            Ok(choice) => Ok(VoteOutcome::Recorded(choice)),
            Err(PortError::NotFound(_)) => {
                Ok(VoteOutcome::NoSelection(self.with_choices(question).await?))
            }
            Err(e) => Err(e),
        }
    }

    // --- Admin ---

    pub async fn create_question(&self, input: NewQuestion) -> PortResult<QuestionDetail> {
        let text = validate_label(&input.text)?;
        let choices = input
            .choices
            .iter()
            .map(|c| validate_label(c))
            .collect::<PortResult<Vec<_>>>()?;

        self.db
            .create_question(text, input.publication_time, &choices)
            .await
    }

    pub async fn update_question(
        &self,
        question_id: i64,
        text: &str,
        publication_time: DateTime<Utc>,
    ) -> PortResult<Question> {
        let text = validate_label(text)?;
        self.db.update_question(question_id, text, publication_time).await
    }

    pub async fn delete_question(&self, question_id: i64) -> PortResult<()> {
        self.db.delete_question(question_id).await
    }

    pub async fn add_choice(&self, question_id: i64, text: &str) -> PortResult<Choice> {
        let text = validate_label(text)?;
        self.db.add_choice(question_id, text).await
    }

    pub async fn delete_choice(&self, question_id: i64, choice_id: i64) -> PortResult<()> {
        self.db.delete_choice(question_id, choice_id).await
    }

    /// Admin list, newest first, with the "recent" flag evaluated at `now`.
    pub async fn search(
        &self,
        text_contains: Option<String>,
        published: PublishedFilter,
        now: DateTime<Utc>,
    ) -> PortResult<Vec<AdminQuestionRow>> {
        let query = QuestionQuery {
            text_contains: text_contains.filter(|t| !t.trim().is_empty()),
            published_range: published.range(now),
        };
        let rows = self
            .db
            .search_questions(&query)
            .await?
            .into_iter()
            .map(|summary| AdminQuestionRow {
                is_recent: summary.question.is_recent(now, &self.window),
                summary,
            })
            .collect();
        Ok(rows)
    }

    async fn with_choices(&self, question: Question) -> PortResult<QuestionDetail> {
        let choices = self.db.get_choices_for_question(question.id).await?;
        Ok(QuestionDetail { question, choices })
    }
}

/// Trims a question or choice text and checks it is non-empty and short enough.
pub fn validate_label(text: &str) -> PortResult<&str> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(PortError::Invalid("text must not be empty".to_string()));
    }
    if trimmed.chars().count() > MAX_LABEL_LEN {
        return Err(PortError::Invalid(format!(
            "text must be at most {} characters",
            MAX_LABEL_LEN
        )));
    }
    Ok(trimmed)
}
