//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use polls_core::domain::{Choice, Question, QuestionDetail, QuestionSummary, User, UserCredentials};
use polls_core::ports::{DatabaseService, PortError, PortResult, QuestionQuery};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn not_found_or_unexpected(e: sqlx::Error, what: impl FnOnce() -> String) -> PortError {
    match e {
        sqlx::Error::RowNotFound => PortError::NotFound(what()),
        _ => PortError::Unexpected(e.to_string()),
    }
}

/// Escapes `%`, `_` and `\` so user text matches literally inside ILIKE.
fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct QuestionRecord {
    id: i64,
    text: String,
    publication_time: DateTime<Utc>,
}
impl QuestionRecord {
    fn to_domain(self) -> Question {
        Question {
            id: self.id,
            text: self.text,
            publication_time: self.publication_time,
        }
    }
}

#[derive(FromRow)]
struct QuestionSummaryRecord {
    id: i64,
    text: String,
    publication_time: DateTime<Utc>,
    choice_count: i64,
}
impl QuestionSummaryRecord {
    fn to_domain(self) -> QuestionSummary {
        QuestionSummary {
            question: Question {
                id: self.id,
                text: self.text,
                publication_time: self.publication_time,
            },
            choice_count: self.choice_count,
        }
    }
}

#[derive(FromRow)]
struct ChoiceRecord {
    id: i64,
    question_id: i64,
    text: String,
    vote_count: i64,
}
impl ChoiceRecord {
    fn to_domain(self) -> Choice {
        Choice {
            id: self.id,
            question_id: self.question_id,
            text: self.text,
            vote_count: self.vote_count,
        }
    }
}

#[derive(FromRow)]
struct UserRecord {
    user_id: Uuid,
    username: String,
}
impl UserRecord {
    fn to_domain(self) -> User {
        User {
            user_id: self.user_id,
            username: self.username,
        }
    }
}

#[derive(FromRow)]
struct CredentialsRecord {
    user_id: Uuid,
    username: String,
    hashed_password: String,
}
impl CredentialsRecord {
    fn to_domain(self) -> UserCredentials {
        UserCredentials {
            user_id: self.user_id,
            username: self.username,
            hashed_password: self.hashed_password,
        }
    }
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn create_question(
        &self,
        text: &str,
        publication_time: DateTime<Utc>,
        choices: &[&str],
    ) -> PortResult<QuestionDetail> {
        let unexpected = |e: sqlx::Error| PortError::Unexpected(e.to_string());
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        let question = sqlx::query_as::<_, QuestionRecord>(
            "INSERT INTO questions (text, publication_time) VALUES ($1, $2) RETURNING id, text, publication_time",
        )
        .bind(text)
        .bind(publication_time)
        .fetch_one(&mut *tx)
        .await
        .map_err(unexpected)?
        .to_domain();

        let mut created = Vec::with_capacity(choices.len());
        for choice in choices {
            let record = sqlx::query_as::<_, ChoiceRecord>(
                "INSERT INTO choices (question_id, text) VALUES ($1, $2) RETURNING id, question_id, text, vote_count",
            )
            .bind(question.id)
            .bind(*choice)
            .fetch_one(&mut *tx)
            .await
            .map_err(unexpected)?;
            created.push(record.to_domain());
        }

        // Dropping `tx` on an early return rolls the question back.
        tx.commit().await.map_err(unexpected)?;
        Ok(QuestionDetail {
            question,
            choices: created,
        })
    }

    async fn update_question(
        &self,
        question_id: i64,
        text: &str,
        publication_time: DateTime<Utc>,
    ) -> PortResult<Question> {
        let record = sqlx::query_as::<_, QuestionRecord>(
            "UPDATE questions SET text = $1, publication_time = $2 WHERE id = $3 RETURNING id, text, publication_time",
        )
        .bind(text)
        .bind(publication_time)
        .bind(question_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or_unexpected(e, || format!("Question {} not found", question_id)))?;
        Ok(record.to_domain())
    }

    async fn delete_question(&self, question_id: i64) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM questions WHERE id = $1")
            .bind(question_id)
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Question {} not found", question_id)));
        }
        Ok(())
    }

    async fn get_question(&self, question_id: i64) -> PortResult<Question> {
        let record = sqlx::query_as::<_, QuestionRecord>(
            "SELECT id, text, publication_time FROM questions WHERE id = $1",
        )
        .bind(question_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or_unexpected(e, || format!("Question {} not found", question_id)))?;
        Ok(record.to_domain())
    }

    async fn search_questions(&self, query: &QuestionQuery) -> PortResult<Vec<QuestionSummary>> {
        let pattern = query
            .text_contains
            .as_deref()
            .map(|t| format!("%{}%", escape_like(t)));
        let (from, to) = match query.published_range {
            Some((from, to)) => (Some(from), Some(to)),
            None => (None, None),
        };

        let records = sqlx::query_as::<_, QuestionSummaryRecord>(
            "SELECT q.id, q.text, q.publication_time, COUNT(c.id) AS choice_count \
             FROM questions q LEFT JOIN choices c ON c.question_id = q.id \
             WHERE ($1::TEXT IS NULL OR q.text ILIKE $1) \
               AND ($2::TIMESTAMPTZ IS NULL OR q.publication_time >= $2) \
               AND ($3::TIMESTAMPTZ IS NULL OR q.publication_time < $3) \
             GROUP BY q.id \
             ORDER BY q.publication_time DESC, q.id DESC",
        )
        .bind(pattern)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn list_visible_questions(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> PortResult<Vec<Question>> {
        let records = sqlx::query_as::<_, QuestionRecord>(
            "SELECT q.id, q.text, q.publication_time FROM questions q \
             WHERE q.publication_time <= $1 \
               AND EXISTS (SELECT 1 FROM choices c WHERE c.question_id = q.id) \
             ORDER BY q.publication_time DESC \
             LIMIT $2",
        )
        .bind(now)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn get_visible_question(
        &self,
        question_id: i64,
        now: DateTime<Utc>,
    ) -> PortResult<Question> {
        let record = sqlx::query_as::<_, QuestionRecord>(
            "SELECT q.id, q.text, q.publication_time FROM questions q \
             WHERE q.id = $1 AND q.publication_time <= $2 \
               AND EXISTS (SELECT 1 FROM choices c WHERE c.question_id = q.id)",
        )
        .bind(question_id)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or_unexpected(e, || format!("Question {} not found", question_id)))?;
        Ok(record.to_domain())
    }

    async fn add_choice(&self, question_id: i64, text: &str) -> PortResult<Choice> {
        // The foreign key rejects unknown questions; report those as missing.
        let record = sqlx::query_as::<_, ChoiceRecord>(
            "INSERT INTO choices (question_id, text) VALUES ($1, $2) RETURNING id, question_id, text, vote_count",
        )
        .bind(question_id)
        .bind(text)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_foreign_key_violation() => {
                PortError::NotFound(format!("Question {} not found", question_id))
            }
            _ => PortError::Unexpected(e.to_string()),
        })?;
        Ok(record.to_domain())
    }

    async fn delete_choice(&self, question_id: i64, choice_id: i64) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM choices WHERE id = $1 AND question_id = $2")
            .bind(choice_id)
            .bind(question_id)
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!(
                "Choice {} of question {} not found",
                choice_id, question_id
            )));
        }
        Ok(())
    }

    async fn get_choices_for_question(&self, question_id: i64) -> PortResult<Vec<Choice>> {
        let records = sqlx::query_as::<_, ChoiceRecord>(
            "SELECT id, question_id, text, vote_count FROM choices WHERE question_id = $1 ORDER BY id ASC",
        )
        .bind(question_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn increment_choice_votes(
        &self,
        question_id: i64,
        choice_id: i64,
    ) -> PortResult<Choice> {
        // Single statement: the row lock taken by UPDATE serialises concurrent voters.
        let record = sqlx::query_as::<_, ChoiceRecord>(
            "UPDATE choices SET vote_count = vote_count + 1 \
             WHERE id = $1 AND question_id = $2 \
             RETURNING id, question_id, text, vote_count",
        )
        .bind(choice_id)
        .bind(question_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            not_found_or_unexpected(e, || {
                format!("Choice {} of question {} not found", choice_id, question_id)
            })
        })?;
        Ok(record.to_domain())
    }

    async fn create_user(&self, username: &str, hashed_password: &str) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "INSERT INTO users (user_id, username, hashed_password) VALUES ($1, $2, $3) RETURNING user_id, username",
        )
        .bind(Uuid::new_v4())
        .bind(username)
        .bind(hashed_password)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                PortError::Conflict(format!("Username {} is already taken", username))
            }
            _ => PortError::Unexpected(e.to_string()),
        })?;
        Ok(record.to_domain())
    }

    async fn get_user_by_username(&self, username: &str) -> PortResult<UserCredentials> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT user_id, username, hashed_password FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or_unexpected(e, || format!("User {} not found", username)))?;
        Ok(record.to_domain())
    }

    async fn get_user_by_id(&self, user_id: Uuid) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "SELECT user_id, username FROM users WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or_unexpected(e, || format!("User {} not found", user_id)))?;
        Ok(record.to_domain())
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        // Expired rows are swept on each sign-in.
        sqlx::query("DELETE FROM auth_sessions WHERE expires_at <= NOW()")
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        sqlx::query("INSERT INTO auth_sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(session_id)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        let user_id = sqlx::query_scalar::<_, Uuid>(
            "SELECT user_id FROM auth_sessions WHERE id = $1 AND expires_at > NOW()",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        user_id.ok_or(PortError::Unauthorized)
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(())
    }
}
