//! services/api/src/adapters/memory.rs
//!
//! An in-process implementation of the `DatabaseService` port. Every
//! operation runs under a single mutex, so each call is atomic the same way
//! a single SQL statement is. Used by the test-suite and for running the
//! server without PostgreSQL (`DATABASE_URL=memory://`).

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use polls_core::domain::{
    AuthSession, Choice, Question, QuestionDetail, QuestionSummary, User, UserCredentials,
};
use polls_core::ports::{DatabaseService, PortError, PortResult, QuestionQuery};
use polls_core::visibility::{is_visible, select_visible};
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    next_question_id: i64,
    next_choice_id: i64,
    questions: BTreeMap<i64, Question>,
    choices: BTreeMap<i64, Choice>,
    users: BTreeMap<Uuid, UserCredentials>,
    sessions: BTreeMap<String, AuthSession>,
}

impl Tables {
    fn choice_count(&self, question_id: i64) -> usize {
        self.choices
            .values()
            .filter(|c| c.question_id == question_id)
            .count()
    }

    fn question(&self, question_id: i64) -> PortResult<&Question> {
        self.questions
            .get(&question_id)
            .ok_or_else(|| PortError::NotFound(format!("Question {} not found", question_id)))
    }
}

#[derive(Default)]
pub struct InMemoryDb {
    tables: Mutex<Tables>,
}

impl InMemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> PortResult<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| PortError::Unexpected("in-memory store poisoned".to_string()))
    }
}

#[async_trait]
impl DatabaseService for InMemoryDb {
    async fn create_question(
        &self,
        text: &str,
        publication_time: DateTime<Utc>,
        choices: &[&str],
    ) -> PortResult<QuestionDetail> {
        let mut tables = self.lock()?;
        tables.next_question_id += 1;
        let question = Question {
            id: tables.next_question_id,
            text: text.to_string(),
            publication_time,
        };
        tables.questions.insert(question.id, question.clone());

        let mut created = Vec::with_capacity(choices.len());
        for label in choices {
            tables.next_choice_id += 1;
            let choice = Choice {
                id: tables.next_choice_id,
                question_id: question.id,
                text: label.to_string(),
                vote_count: 0,
            };
            tables.choices.insert(choice.id, choice.clone());
            created.push(choice);
        }

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
        let mut tables = self.lock()?;
        let question = tables
            .questions
            .get_mut(&question_id)
            .ok_or_else(|| PortError::NotFound(format!("Question {} not found", question_id)))?;
        question.text = text.to_string();
        question.publication_time = publication_time;
        Ok(question.clone())
    }

    async fn delete_question(&self, question_id: i64) -> PortResult<()> {
        let mut tables = self.lock()?;
        if tables.questions.remove(&question_id).is_none() {
            return Err(PortError::NotFound(format!("Question {} not found", question_id)));
        }
        tables.choices.retain(|_, c| c.question_id != question_id);
        Ok(())
    }

    async fn get_question(&self, question_id: i64) -> PortResult<Question> {
        let tables = self.lock()?;
        tables.question(question_id).cloned()
    }

    async fn search_questions(&self, query: &QuestionQuery) -> PortResult<Vec<QuestionSummary>> {
        let tables = self.lock()?;
        let mut rows: Vec<QuestionSummary> = tables
            .questions
            .values()
            .filter(|q| query.matches(q))
            .map(|q| QuestionSummary {
                question: q.clone(),
                choice_count: tables.choice_count(q.id) as i64,
            })
            .collect();
        rows.sort_by(|a, b| {
            b.question
                .publication_time
                .cmp(&a.question.publication_time)
                .then(b.question.id.cmp(&a.question.id))
        });
        Ok(rows)
    }

    async fn list_visible_questions(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> PortResult<Vec<Question>> {
        let tables = self.lock()?;
        let candidates = tables
            .questions
            .values()
            .map(|q| (q.clone(), tables.choice_count(q.id)));
        Ok(select_visible(candidates, now, limit))
    }

    async fn get_visible_question(
        &self,
        question_id: i64,
        now: DateTime<Utc>,
    ) -> PortResult<Question> {
        let tables = self.lock()?;
        let question = tables.question(question_id)?;
        if !is_visible(question, tables.choice_count(question_id), now) {
            return Err(PortError::NotFound(format!("Question {} not found", question_id)));
        }
        Ok(question.clone())
    }

    async fn add_choice(&self, question_id: i64, text: &str) -> PortResult<Choice> {
        let mut tables = self.lock()?;
        tables.question(question_id)?;
        tables.next_choice_id += 1;
        let choice = Choice {
            id: tables.next_choice_id,
            question_id,
            text: text.to_string(),
            vote_count: 0,
        };
        tables.choices.insert(choice.id, choice.clone());
        Ok(choice)
    }

    async fn delete_choice(&self, question_id: i64, choice_id: i64) -> PortResult<()> {
        let mut tables = self.lock()?;
        let owned = tables
            .choices
            .get(&choice_id)
            .is_some_and(|c| c.question_id == question_id);
        if !owned {
            return Err(PortError::NotFound(format!(
                "Choice {} of question {} not found",
                choice_id, question_id
            )));
        }
        tables.choices.remove(&choice_id);
        Ok(())
    }

    async fn get_choices_for_question(&self, question_id: i64) -> PortResult<Vec<Choice>> {
        let tables = self.lock()?;
        Ok(tables
            .choices
            .values()
            .filter(|c| c.question_id == question_id)
            .cloned()
            .collect())
    }

    async fn increment_choice_votes(
        &self,
        question_id: i64,
        choice_id: i64,
    ) -> PortResult<Choice> {
        let mut tables = self.lock()?;
        match tables.choices.get_mut(&choice_id) {
            Some(choice) if choice.question_id == question_id => {
                choice.vote_count += 1;
                Ok(choice.clone())
            }
            _ => Err(PortError::NotFound(format!(
                "Choice {} of question {} not found",
                choice_id, question_id
            ))),
        }
    }

    async fn create_user(&self, username: &str, hashed_password: &str) -> PortResult<User> {
        let mut tables = self.lock()?;
        if tables.users.values().any(|u| u.username == username) {
            return Err(PortError::Conflict(format!(
                "Username {} is already taken",
                username
            )));
        }
        let credentials = UserCredentials {
            user_id: Uuid::new_v4(),
            username: username.to_string(),
            hashed_password: hashed_password.to_string(),
        };
        let user = User {
            user_id: credentials.user_id,
            username: credentials.username.clone(),
        };
        tables.users.insert(credentials.user_id, credentials);
        Ok(user)
    }

    async fn get_user_by_username(&self, username: &str) -> PortResult<UserCredentials> {
        let tables = self.lock()?;
        tables
            .users
            .values()
            .find(|u| u.username == username)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", username)))
    }

    async fn get_user_by_id(&self, user_id: Uuid) -> PortResult<User> {
        let tables = self.lock()?;
        tables
            .users
            .get(&user_id)
            .map(|u| User {
                user_id: u.user_id,
                username: u.username.clone(),
            })
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        let mut tables = self.lock()?;
        let now = Utc::now();
        tables.sessions.retain(|_, s| s.expires_at > now);
        tables.sessions.insert(
            session_id.to_string(),
            AuthSession {
                id: session_id.to_string(),
                user_id,
                expires_at,
            },
        );
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        let tables = self.lock()?;
        tables
            .sessions
            .get(session_id)
            .filter(|s| s.expires_at > Utc::now())
            .map(|s| s.user_id)
            .ok_or(PortError::Unauthorized)
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        let mut tables = self.lock()?;
        tables.sessions.remove(session_id);
        Ok(())
    }
}
