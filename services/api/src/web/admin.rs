//! services/api/src/web/admin.rs
//!
//! Staff-only endpoints for managing questions and their choices.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use polls_core::{AdminQuestionRow, NewQuestion, PortError, PublishedFilter};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

use crate::error::ApiError;
use crate::web::polls::{parse_id, ChoiceTally, QuestionItem, ResultsResponse};
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Serialize, Deserialize, ToSchema)]
pub struct SiteResponse {
    pub site_title: String,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListQuery {
    /// Case-insensitive text search.
    pub q: Option<String>,
    /// One of `any`, `today`, `past_7_days`, `this_month`, `this_year`.
    pub published: Option<String>,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct AdminQuestionItem {
    pub id: i64,
    pub text: String,
    pub publication_time: DateTime<Utc>,
    pub is_recent: bool,
    pub choice_count: i64,
}

impl From<AdminQuestionRow> for AdminQuestionItem {
    fn from(row: AdminQuestionRow) -> Self {
        Self {
            id: row.summary.question.id,
            text: row.summary.question.text,
            publication_time: row.summary.question.publication_time,
            is_recent: row.is_recent,
            choice_count: row.summary.choice_count,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct CreateQuestionRequest {
    pub text: String,
    /// Defaults to the time of the request.
    pub publication_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub choices: Vec<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateQuestionRequest {
    pub text: String,
    pub publication_time: DateTime<Utc>,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateChoiceRequest {
    pub text: String,
}

fn choice_id(raw: &str) -> Result<i64, ApiError> {
    raw.parse::<i64>()
        .map_err(|_| PortError::NotFound(format!("No choice with id '{}'", raw)).into())
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /admin/ - Admin site information
#[utoipa::path(
    get,
    path = "/admin/",
    responses(
        (status = 200, description = "Site title", body = SiteResponse),
        (status = 403, description = "Not a staff account")
    )
)]
pub async fn site_handler(State(state): State<Arc<AppState>>) -> Json<SiteResponse> {
    Json(SiteResponse {
        site_title: state.config.admin.site_title.clone(),
    })
}

/// GET /admin/questions - Search and filter all questions
#[utoipa::path(
    get,
    path = "/admin/questions",
    params(ListQuery),
    responses(
        (status = 200, description = "Matching questions, newest first", body = [AdminQuestionItem]),
        (status = 400, description = "Unknown publication filter")
    )
)]
pub async fn list_questions_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<AdminQuestionItem>>, ApiError> {
    let published = query
        .published
        .as_deref()
        .unwrap_or_default()
        .parse::<PublishedFilter>()
        .map_err(PortError::Invalid)?;

    let rows = state.polls.search(query.q, published, Utc::now()).await?;
    Ok(Json(rows.into_iter().map(AdminQuestionItem::from).collect()))
}

/// POST /admin/questions - Create a question with its initial choices
#[utoipa::path(
    post,
    path = "/admin/questions",
    request_body = CreateQuestionRequest,
    responses(
        (status = 201, description = "Question created", body = ResultsResponse),
        (status = 400, description = "Empty or overlong text")
    )
)]
pub async fn create_question_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateQuestionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let detail = state
        .polls
        .create_question(NewQuestion {
            text: req.text,
            publication_time: req.publication_time.unwrap_or_else(Utc::now),
            choices: req.choices,
        })
        .await?;
    info!(
        "Created question {} with {} choices",
        detail.question.id,
        detail.choices.len()
    );

    Ok((StatusCode::CREATED, Json(ResultsResponse::from(detail))))
}

/// GET /admin/questions/{question_id} - Any question, published or not
#[utoipa::path(
    get,
    path = "/admin/questions/{question_id}",
    params(("question_id" = i64, Path, description = "Question id")),
    responses(
        (status = 200, description = "Question with tallies", body = ResultsResponse),
        (status = 404, description = "Question not found")
    )
)]
pub async fn get_question_handler(
    State(state): State<Arc<AppState>>,
    Path(question_id): Path<String>,
) -> Result<Json<ResultsResponse>, ApiError> {
    let question_id = parse_id(&question_id)?;
    let detail = state.polls.results(question_id).await?;
    Ok(Json(ResultsResponse::from(detail)))
}

/// PUT /admin/questions/{question_id} - Edit text and publication time
#[utoipa::path(
    put,
    path = "/admin/questions/{question_id}",
    params(("question_id" = i64, Path, description = "Question id")),
    request_body = UpdateQuestionRequest,
    responses(
        (status = 200, description = "Question updated", body = QuestionItem),
        (status = 400, description = "Empty or overlong text"),
        (status = 404, description = "Question not found")
    )
)]
pub async fn update_question_handler(
    State(state): State<Arc<AppState>>,
    Path(question_id): Path<String>,
    Json(req): Json<UpdateQuestionRequest>,
) -> Result<Json<QuestionItem>, ApiError> {
    let question_id = parse_id(&question_id)?;
    let question = state
        .polls
        .update_question(question_id, &req.text, req.publication_time)
        .await?;
    Ok(Json(QuestionItem::from(question)))
}

/// DELETE /admin/questions/{question_id} - Delete a question and its choices
#[utoipa::path(
    delete,
    path = "/admin/questions/{question_id}",
    params(("question_id" = i64, Path, description = "Question id")),
    responses(
        (status = 204, description = "Question deleted"),
        (status = 404, description = "Question not found")
    )
)]
pub async fn delete_question_handler(
    State(state): State<Arc<AppState>>,
    Path(question_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let question_id = parse_id(&question_id)?;
    state.polls.delete_question(question_id).await?;
    info!("Deleted question {}", question_id);
    Ok(StatusCode::NO_CONTENT)
}

/// POST /admin/questions/{question_id}/choices - Add a choice
#[utoipa::path(
    post,
    path = "/admin/questions/{question_id}/choices",
    params(("question_id" = i64, Path, description = "Question id")),
    request_body = CreateChoiceRequest,
    responses(
        (status = 201, description = "Choice added", body = ChoiceTally),
        (status = 400, description = "Empty or overlong text"),
        (status = 404, description = "Question not found")
    )
)]
pub async fn add_choice_handler(
    State(state): State<Arc<AppState>>,
    Path(question_id): Path<String>,
    Json(req): Json<CreateChoiceRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let question_id = parse_id(&question_id)?;
    let choice = state.polls.add_choice(question_id, &req.text).await?;
    Ok((StatusCode::CREATED, Json(ChoiceTally::from(choice))))
}

/// DELETE /admin/questions/{question_id}/choices/{choice_id} - Remove a choice
#[utoipa::path(
    delete,
    path = "/admin/questions/{question_id}/choices/{choice_id}",
    params(
        ("question_id" = i64, Path, description = "Question id"),
        ("choice_id" = i64, Path, description = "Choice id")
    ),
    responses(
        (status = 204, description = "Choice removed"),
        (status = 404, description = "Choice not found on this question")
    )
)]
pub async fn delete_choice_handler(
    State(state): State<Arc<AppState>>,
    Path((question_id, choice)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let question_id = parse_id(&question_id)?;
    let choice_id = choice_id(&choice)?;
    state.polls.delete_choice(question_id, choice_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
