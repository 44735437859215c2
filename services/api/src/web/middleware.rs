//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, Method},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
    Extension,
};
use polls_core::User;
use std::sync::Arc;
use tracing::{error, warn};

use crate::error::ApiError;
use crate::web::state::AppState;

/// Name of the cookie carrying the auth session id.
pub const SESSION_COOKIE: &str = "session";

/// Extracts the auth session id from the `Cookie` header, if any.
pub fn session_id_from_headers(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .find_map(|c| {
            let (name, value) = c.trim().split_once('=')?;
            (name == SESSION_COOKIE && !value.is_empty()).then_some(value)
        })
}

/// Sign-in page that sends the visitor back to `path` afterwards.
pub fn signin_redirect(path: &str) -> Redirect {
    Redirect::to(&format!("/users/signin?next={}", path))
}

/// Where to come back to after signing in. Only `GET` can be replayed by a
/// redirect, so a form submission returns to the page it was posted from:
/// `POST /3/vote` comes back to `/3/`.
pub fn return_path(method: &Method, path: &str) -> String {
    if method == Method::GET {
        return path.to_string();
    }
    match path.trim_end_matches('/').rfind('/') {
        Some(idx) => path[..=idx].to_string(),
        None => "/".to_string(),
    }
}

/// Middleware that validates the auth session cookie and loads the account.
///
/// If valid, inserts the `User` into request extensions for handlers to use.
/// If invalid or missing, redirects to the sign-in page.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    let path = req.uri().path().to_string();
    let back_to = return_path(req.method(), &path);

    // 1. Parse session ID from cookie
    let Some(auth_session_id) = session_id_from_headers(req.headers()).map(str::to_string) else {
        return signin_redirect(&back_to).into_response();
    };

    // 2. Validate auth session in database, get user_id
    let user_id = match state.db.validate_auth_session(&auth_session_id).await {
        Ok(user_id) => user_id,
        Err(e) => {
            warn!("Rejected auth session on {}: {:?}", path, e);
            return signin_redirect(&back_to).into_response();
        }
    };

    // 3. Load the account
    let user = match state.db.get_user_by_id(user_id).await {
        Ok(user) => user,
        Err(e) => {
            error!("Failed to load user {} for a live session: {:?}", user_id, e);
            return signin_redirect(&back_to).into_response();
        }
    };

    // 4. Insert user into request extensions and continue to the handler
    req.extensions_mut().insert(user);
    next.run(req).await
}

/// Middleware for the admin routes; must run after [`require_auth`].
pub async fn require_staff(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    req: Request,
    next: Next,
) -> Response {
    if !state.config.admin.is_staff(&user.username) {
        warn!("User {} tried to reach {}", user.username, req.uri().path());
        return ApiError::Forbidden.into_response();
    }
    next.run(req).await
}
