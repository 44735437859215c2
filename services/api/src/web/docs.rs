//! services/api/src/web/docs.rs
//!
//! The master definition for the OpenAPI specification.

use utoipa::OpenApi;

use crate::web::{admin, auth, polls};

#[derive(OpenApi)]
#[openapi(
    paths(
        polls::index_handler,
        polls::detail_handler,
        polls::results_handler,
        polls::vote_handler,
        auth::signup_form_handler,
        auth::signup_handler,
        auth::signin_form_handler,
        auth::signin_handler,
        auth::logout_handler,
        admin::site_handler,
        admin::list_questions_handler,
        admin::create_question_handler,
        admin::get_question_handler,
        admin::update_question_handler,
        admin::delete_question_handler,
        admin::add_choice_handler,
        admin::delete_choice_handler,
    ),
    components(
        schemas(
            polls::QuestionItem,
            polls::IndexResponse,
            polls::ChoiceItem,
            polls::DetailResponse,
            polls::ChoiceTally,
            polls::ResultsResponse,
            polls::VoteForm,
            auth::SignupForm,
            auth::SigninForm,
            auth::FormResponse,
            admin::SiteResponse,
            admin::AdminQuestionItem,
            admin::CreateQuestionRequest,
            admin::UpdateQuestionRequest,
            admin::CreateChoiceRequest,
        )
    ),
    tags(
        (name = "Polls API", description = "Polls, votes and accounts.")
    )
)]
pub struct ApiDoc;

/// The served document: [`ApiDoc`] stamped with this build's title and version.
pub fn document() -> utoipa::openapi::OpenApi {
    let mut doc = ApiDoc::openapi();
    doc.info.title = "Polls API".to_string();
    doc.info.version = env!("CARGO_PKG_VERSION").to_string();
    doc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_the_vote_endpoint() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/{question_id}/vote"));
        assert!(doc.paths.paths.contains_key("/admin/questions/{question_id}/choices/{choice_id}"));
    }

    #[test]
    fn document_carries_the_build_version() {
        let doc = document();
        assert_eq!(doc.info.title, "Polls API");
        assert_eq!(doc.info.version, env!("CARGO_PKG_VERSION"));
    }
}
