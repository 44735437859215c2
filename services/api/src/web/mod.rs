pub mod admin;
pub mod auth;
pub mod docs;
pub mod middleware;
pub mod polls;
pub mod state;

use axum::{
    middleware as axum_middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub use middleware::{require_auth, require_staff};
pub use state::AppState;

/// Builds every route of the service on top of `state`.
pub fn router(state: Arc<AppState>) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/", get(polls::index_handler))
        .route("/{question_id}/", get(polls::detail_handler))
        .route("/{question_id}/results", get(polls::results_handler))
        .route(
            "/users/signup",
            get(auth::signup_form_handler).post(auth::signup_handler),
        )
        .route(
            "/users/signin",
            get(auth::signin_form_handler).post(auth::signin_handler),
        )
        .route(
            "/users/logout",
            get(auth::logout_handler).post(auth::logout_handler),
        );

    // Voting needs a signed-in account
    let voting_routes = Router::new()
        .route("/{question_id}/vote", post(polls::vote_handler))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            require_auth,
        ));

    // Admin routes: signed in and listed as staff
    let admin_routes = Router::new()
        .route("/admin/", get(admin::site_handler))
        .route(
            "/admin/questions",
            get(admin::list_questions_handler).post(admin::create_question_handler),
        )
        .route(
            "/admin/questions/{question_id}",
            get(admin::get_question_handler)
                .put(admin::update_question_handler)
                .delete(admin::delete_question_handler),
        )
        .route(
            "/admin/questions/{question_id}/choices",
            post(admin::add_choice_handler),
        )
        .route(
            "/admin/questions/{question_id}/choices/{choice_id}",
            delete(admin::delete_choice_handler),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            require_staff,
        ))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(voting_routes)
        .merge(admin_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
