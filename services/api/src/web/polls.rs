//! services/api/src/web/polls.rs
//!
//! Public poll endpoints: the index, question detail, results and the vote
//! submission.

use axum::{
    extract::{rejection::FormRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Extension, Form, Json,
};
use chrono::{DateTime, Utc};
use polls_core::{Choice, PortError, Question, QuestionDetail, User, VoteOutcome};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::web::state::AppState;

pub const EMPTY_INDEX_MESSAGE: &str = "No polls are available.";
pub const NO_SELECTION_MESSAGE: &str = "You didn't select a choice.";

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Serialize, Deserialize, ToSchema)]
pub struct QuestionItem {
    pub id: i64,
    pub text: String,
    pub publication_time: DateTime<Utc>,
}

impl From<Question> for QuestionItem {
    fn from(q: Question) -> Self {
        Self {
            id: q.id,
            text: q.text,
            publication_time: q.publication_time,
        }
    }
}

/// The public index: newest visible questions.
#[derive(Serialize, Deserialize, ToSchema)]
pub struct IndexResponse {
    pub questions: Vec<QuestionItem>,
    /// Set when there is nothing to show.
    pub message: Option<String>,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct ChoiceItem {
    pub id: i64,
    pub text: String,
}

/// A question as offered for voting.
#[derive(Serialize, Deserialize, ToSchema)]
pub struct DetailResponse {
    pub id: i64,
    pub text: String,
    pub publication_time: DateTime<Utc>,
    pub choices: Vec<ChoiceItem>,
    /// Informational message, e.g. after a vote without a selection.
    pub message: Option<String>,
}

impl DetailResponse {
    fn new(detail: QuestionDetail, message: Option<&str>) -> Self {
        Self {
            id: detail.question.id,
            text: detail.question.text,
            publication_time: detail.question.publication_time,
            choices: detail
                .choices
                .into_iter()
                .map(|c| ChoiceItem {
                    id: c.id,
                    text: c.text,
                })
                .collect(),
            message: message.map(str::to_string),
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct ChoiceTally {
    pub id: i64,
    pub text: String,
    pub vote_count: i64,
}

impl From<Choice> for ChoiceTally {
    fn from(c: Choice) -> Self {
        Self {
            id: c.id,
            text: c.text,
            vote_count: c.vote_count,
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct ResultsResponse {
    pub id: i64,
    pub text: String,
    pub publication_time: DateTime<Utc>,
    pub total_votes: i64,
    pub choices: Vec<ChoiceTally>,
}

impl From<QuestionDetail> for ResultsResponse {
    fn from(detail: QuestionDetail) -> Self {
        let total_votes = detail.total_votes();
        Self {
            id: detail.question.id,
            text: detail.question.text,
            publication_time: detail.question.publication_time,
            total_votes,
            choices: detail.choices.into_iter().map(ChoiceTally::from).collect(),
        }
    }
}

/// Form body of a vote. `choice` holds the selected choice id.
#[derive(Deserialize, ToSchema)]
pub struct VoteForm {
    #[serde(default)]
    pub choice: Option<String>,
}

/// Question ids that do not parse are reported like missing questions.
pub(crate) fn parse_id(raw: &str) -> Result<i64, ApiError> {
    raw.parse::<i64>()
        .map_err(|_| PortError::NotFound(format!("No question with id '{}'", raw)).into())
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET / - The five newest published questions that have choices
#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Visible questions, newest first", body = IndexResponse),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn index_handler(State(state): State<Arc<AppState>>) -> Result<Json<IndexResponse>, ApiError> {
    let questions = state.polls.list_visible(Utc::now()).await?;
    let message = questions
        .is_empty()
        .then(|| EMPTY_INDEX_MESSAGE.to_string());

    Ok(Json(IndexResponse {
        questions: questions.into_iter().map(QuestionItem::from).collect(),
        message,
    }))
}

/// GET /{question_id}/ - A published question with its choices
#[utoipa::path(
    get,
    path = "/{question_id}/",
    params(("question_id" = i64, Path, description = "Question id")),
    responses(
        (status = 200, description = "Question detail", body = DetailResponse),
        (status = 404, description = "Missing, unpublished or without choices")
    )
)]
pub async fn detail_handler(
    State(state): State<Arc<AppState>>,
    Path(question_id): Path<String>,
) -> Result<Json<DetailResponse>, ApiError> {
    let question_id = parse_id(&question_id)?;
    let detail = state.polls.get_visible(question_id, Utc::now()).await?;
    Ok(Json(DetailResponse::new(detail, None)))
}

/// GET /{question_id}/results - Current tallies of a question
#[utoipa::path(
    get,
    path = "/{question_id}/results",
    params(("question_id" = i64, Path, description = "Question id")),
    responses(
        (status = 200, description = "Vote tallies", body = ResultsResponse),
        (status = 404, description = "Question not found")
    )
)]
pub async fn results_handler(
    State(state): State<Arc<AppState>>,
    Path(question_id): Path<String>,
) -> Result<Json<ResultsResponse>, ApiError> {
    let question_id = parse_id(&question_id)?;
    let detail = state.polls.results(question_id).await?;
    Ok(Json(ResultsResponse::from(detail)))
}

/// POST /{question_id}/vote - Add one vote to the selected choice
#[utoipa::path(
    post,
    path = "/{question_id}/vote",
    params(("question_id" = i64, Path, description = "Question id")),
    request_body(content = VoteForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Vote recorded, redirect to the results; or sign-in required"),
        (status = 200, description = "No choice selected, question redisplayed", body = DetailResponse),
        (status = 404, description = "Question not found")
    )
)]
pub async fn vote_handler(
    State(state): State<Arc<AppState>>,
    Path(question_id): Path<String>,
    Extension(user): Extension<User>,
    form: Result<Form<VoteForm>, FormRejection>,
) -> Result<Response, ApiError> {
    let question_id = parse_id(&question_id)?;
    // A missing or unreadable body is the same as submitting without a choice.
    let choice_id = form
        .ok()
        .and_then(|Form(form)| form.choice)
        .and_then(|c| c.trim().parse::<i64>().ok());

    match state.polls.cast_vote(question_id, choice_id).await? {
        VoteOutcome::Recorded(choice) => {
            info!(
                "User {} voted for choice {} of question {}",
                user.username, choice.id, question_id
            );
            Ok(Redirect::to(&format!("/{}/results", question_id)).into_response())
        }
        VoteOutcome::NoSelection(detail) => Ok((
            StatusCode::OK,
            Json(DetailResponse::new(detail, Some(NO_SELECTION_MESSAGE))),
        )
            .into_response()),
    }
}
