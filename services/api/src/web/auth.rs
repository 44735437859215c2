//! services/api/src/web/auth.rs
//!
//! Account endpoints for signup, signin and logout.
//!
//! Invalid form input is not an error: the form is sent back with `200 OK`
//! and per-field messages, and nothing is stored. Successful submissions
//! answer with a `303 See Other` redirect.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::{Query, State},
    http::{header, HeaderMap},
    response::{IntoResponse, Redirect, Response},
    Form, Json,
};
use chrono::Utc;
use polls_core::PortError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::middleware::{session_id_from_headers, SESSION_COOKIE};
use crate::web::state::AppState;

pub const MAX_USERNAME_LEN: usize = 150;
pub const MIN_PASSWORD_LEN: usize = 8;

const REQUIRED: &str = "This field is required.";
const INVALID_CREDENTIALS: &str =
    "Please enter a correct username and password. Note that both fields may be case-sensitive.";
const NON_FIELD: &str = "__all__";

const COMMON_PASSWORDS: &[&str] = &[
    "password", "password1", "password123", "12345678", "123456789", "1234567890", "qwerty123",
    "qwertyuiop", "iloveyou", "sunshine", "princess", "football", "baseball", "welcome1",
    "letmein1", "admin123", "trustno1", "dragon123", "monkey123", "abc12345",
];

/// Field name to the list of problems found with it.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, Default, ToSchema)]
pub struct SignupForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password1: String,
    #[serde(default)]
    pub password2: String,
    #[serde(default)]
    pub next: Option<String>,
}

#[derive(Deserialize, Default, ToSchema)]
pub struct SigninForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub next: Option<String>,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct NextQuery {
    /// Where to go after a successful submission.
    pub next: Option<String>,
}

/// A form to (re)display: the echoed username, errors and redirect target.
#[derive(Serialize, Deserialize, ToSchema)]
pub struct FormResponse {
    pub form: String,
    pub username: String,
    pub errors: FieldErrors,
    pub next: String,
}

impl FormResponse {
    fn signup(username: &str, errors: FieldErrors, next: Option<&str>) -> Self {
        Self {
            form: "signup".to_string(),
            username: username.to_string(),
            errors,
            next: safe_next(next).unwrap_or("/users/signin").to_string(),
        }
    }

    fn signin(username: &str, errors: FieldErrors, next: Option<&str>) -> Self {
        Self {
            form: "signin".to_string(),
            username: username.to_string(),
            errors,
            next: safe_next(next).unwrap_or("/").to_string(),
        }
    }
}

//=========================================================================================
// Validation
//=========================================================================================

/// Only same-site absolute paths are followed after a form submission.
///
/// Browsers drop tabs and newlines from a `Location`, so `/\t/host` would
/// become the off-site `//host`; any control character or whitespace is refused.
pub fn safe_next(next: Option<&str>) -> Option<&str> {
    next.filter(|n| {
        n.starts_with('/')
            && !n.starts_with("//")
            && !n.contains('\\')
            && !n.contains("://")
            && !n.chars().any(|c| c.is_control() || c.is_whitespace())
    })
}

fn push_error(errors: &mut FieldErrors, field: &str, message: impl Into<String>) {
    errors
        .entry(field.to_string())
        .or_default()
        .push(message.into());
}

/// Checks a signup form; an empty map means the account may be created.
/// Username uniqueness is left to the store.
pub fn validate_signup(form: &SignupForm) -> FieldErrors {
    let mut errors = FieldErrors::new();
    let username = form.username.trim();

    if username.is_empty() {
        push_error(&mut errors, "username", REQUIRED);
    } else {
        if username.chars().count() > MAX_USERNAME_LEN {
            push_error(
                &mut errors,
                "username",
                format!(
                    "Ensure this value has at most {} characters.",
                    MAX_USERNAME_LEN
                ),
            );
        }
        if !username
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'))
        {
            push_error(
                &mut errors,
                "username",
                "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
            );
        }
    }

    if form.password1.is_empty() {
        push_error(&mut errors, "password1", REQUIRED);
    }
    if form.password2.is_empty() {
        push_error(&mut errors, "password2", REQUIRED);
    }
    if form.password1.is_empty() || form.password2.is_empty() {
        return errors;
    }

    if form.password1 != form.password2 {
        push_error(
            &mut errors,
            "password2",
            "The two password fields didn't match.",
        );
        return errors;
    }

    for problem in password_problems(&form.password1, username) {
        push_error(&mut errors, "password2", problem);
    }
    errors
}

fn password_problems(password: &str, username: &str) -> Vec<String> {
    let mut problems = Vec::new();
    let lowered = password.to_lowercase();
    let user_lowered = username.to_lowercase();

    if !user_lowered.is_empty()
        && (lowered.contains(&user_lowered) || user_lowered.contains(&lowered))
    {
        problems.push("The password is too similar to the username.".to_string());
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        problems.push(format!(
            "This password is too short. It must contain at least {} characters.",
            MIN_PASSWORD_LEN
        ));
    }
    if COMMON_PASSWORDS.contains(&lowered.as_str()) {
        problems.push("This password is too common.".to_string());
    }
    if password.chars().all(|c| c.is_ascii_digit()) {
        problems.push("This password is entirely numeric.".to_string());
    }
    problems
}

fn session_cookie(state: &AppState, auth_session_id: &str) -> String {
    let secure = if state.config.cookie_secure { " Secure;" } else { "" };
    format!(
        "{}={}; HttpOnly;{} SameSite=Lax; Path=/; Max-Age={}",
        SESSION_COOKIE,
        auth_session_id,
        secure,
        state.config.session_ttl.num_seconds()
    )
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /users/signup - Blank signup form
#[utoipa::path(
    get,
    path = "/users/signup",
    params(NextQuery),
    responses((status = 200, description = "Blank form", body = FormResponse))
)]
pub async fn signup_form_handler(Query(query): Query<NextQuery>) -> Json<FormResponse> {
    Json(FormResponse::signup("", FieldErrors::new(), query.next.as_deref()))
}

/// POST /users/signup - Create a new account
#[utoipa::path(
    post,
    path = "/users/signup",
    request_body(content = SignupForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Account created, redirect to sign-in or `next`"),
        (status = 200, description = "Form redisplayed with errors", body = FormResponse),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn signup_handler(
    State(state): State<Arc<AppState>>,
    Form(form): Form<SignupForm>,
) -> Result<Response, ApiError> {
    let username = form.username.trim();
    let next = form.next.as_deref();

    // 1. Validate the form
    let errors = validate_signup(&form);
    if !errors.is_empty() {
        warn!("Rejected signup for '{}': {:?}", username, errors);
        return Ok(Json(FormResponse::signup(username, errors, next)).into_response());
    }

    // 2. Hash the password
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(form.password1.as_bytes(), &salt)
        .map_err(|e| {
            error!("Failed to hash password: {:?}", e);
            ApiError::Internal("Failed to hash password".to_string())
        })?
        .to_string();

    // 3. Create user in database
    let user = match state.db.create_user(username, &password_hash).await {
        Ok(user) => user,
        Err(PortError::Conflict(_)) => {
            let mut errors = FieldErrors::new();
            push_error(
                &mut errors,
                "username",
                "A user with that username already exists.",
            );
            return Ok(Json(FormResponse::signup(username, errors, next)).into_response());
        }
        Err(e) => return Err(e.into()),
    };
    info!("Created account {} ({})", user.username, user.user_id);

    // 4. Send the new user to sign in
    let target = safe_next(next).unwrap_or("/users/signin");
    Ok(Redirect::to(target).into_response())
}

/// GET /users/signin - Blank signin form
#[utoipa::path(
    get,
    path = "/users/signin",
    params(NextQuery),
    responses((status = 200, description = "Blank form", body = FormResponse))
)]
pub async fn signin_form_handler(Query(query): Query<NextQuery>) -> Json<FormResponse> {
    Json(FormResponse::signin("", FieldErrors::new(), query.next.as_deref()))
}

/// POST /users/signin - Sign in with an existing account
#[utoipa::path(
    post,
    path = "/users/signin",
    request_body(content = SigninForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Signed in, session cookie set, redirect to the index or `next`"),
        (status = 200, description = "Form redisplayed with errors", body = FormResponse),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn signin_handler(
    State(state): State<Arc<AppState>>,
    Form(form): Form<SigninForm>,
) -> Result<Response, ApiError> {
    let username = form.username.trim();
    let next = form.next.as_deref();

    // 1. Both fields are required
    let mut errors = FieldErrors::new();
    if username.is_empty() {
        push_error(&mut errors, "username", REQUIRED);
    }
    if form.password.is_empty() {
        push_error(&mut errors, "password", REQUIRED);
    }
    if !errors.is_empty() {
        return Ok(Json(FormResponse::signin(username, errors, next)).into_response());
    }

    // 2. Get user by username
    let user_creds = match state.db.get_user_by_username(username).await {
        Ok(creds) => Some(creds),
        Err(PortError::NotFound(_)) => None,
        Err(e) => return Err(e.into()),
    };

    // 3. Verify password
    let verified = match &user_creds {
        Some(creds) => {
            let parsed_hash = PasswordHash::new(&creds.hashed_password).map_err(|e| {
                error!("Failed to parse password hash: {:?}", e);
                ApiError::Internal("Authentication error".to_string())
            })?;
            Argon2::default()
                .verify_password(form.password.as_bytes(), &parsed_hash)
                .is_ok()
        }
        None => false,
    };
    let Some(user_creds) = user_creds.filter(|_| verified) else {
        warn!("Failed signin for '{}'", username);
        push_error(&mut errors, NON_FIELD, INVALID_CREDENTIALS);
        return Ok(Json(FormResponse::signin(username, errors, next)).into_response());
    };

    // 4. Create auth session in database
    let auth_session_id = Uuid::new_v4().to_string();
    let expires_at = Utc::now() + state.config.session_ttl;
    state
        .db
        .create_auth_session(&auth_session_id, user_creds.user_id, expires_at)
        .await?;
    info!("User {} signed in", user_creds.username);

    // 5. Set the cookie and redirect
    let cookie = session_cookie(&state, &auth_session_id);
    let target = safe_next(next).unwrap_or("/");
    Ok(([(header::SET_COOKIE, cookie)], Redirect::to(target)).into_response())
}

/// GET|POST /users/logout - End the session
#[utoipa::path(
    post,
    path = "/users/logout",
    responses((status = 303, description = "Session cleared, redirect to sign-in"))
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    // 1. Delete the auth session, if the browser had one
    if let Some(auth_session_id) = session_id_from_headers(&headers) {
        state.db.delete_auth_session(auth_session_id).await?;
    }

    // 2. Clear cookie
    let cookie = format!(
        "{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0",
        SESSION_COOKIE
    );
    Ok(([(header::SET_COOKIE, cookie)], Redirect::to("/users/signin")).into_response())
}
