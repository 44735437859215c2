//! Poll endpoint integration tests: index, detail, results and voting.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use chrono::Utc;
use common::{assert_redirect, body_json, question_texts, TestApp};
use polls_core::VoteOutcome;
use std::sync::Arc;

// --- Index ---

#[tokio::test]
async fn index_without_questions_shows_empty_message() {
    let app = TestApp::new();

    let resp = app.get("/", None).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body = body_json(resp).await;
    assert_eq!(body["message"], "No polls are available.");
    assert!(question_texts(&body).is_empty());
}

#[tokio::test]
async fn index_lists_past_question() {
    let app = TestApp::new();
    let q = app.create_question("default", -3, &["A"]).await;

    assert!(!q.question.is_recent(Utc::now(), app.state.polls.window()));

    let body = body_json(app.get("/", None).await).await;
    assert_eq!(question_texts(&body), vec!["default"]);
    assert!(body["message"].is_null());
}

#[tokio::test]
async fn index_hides_future_question() {
    let app = TestApp::new();
    app.create_question("default", 3, &["A"]).await;

    let body = body_json(app.get("/", None).await).await;
    assert_eq!(body["message"], "No polls are available.");
    assert!(question_texts(&body).is_empty());
}

#[tokio::test]
async fn index_with_future_and_past_lists_only_past() {
    let app = TestApp::new();
    app.create_question("past", -3, &["A"]).await;
    app.create_question("future", 3, &["A"]).await;

    let body = body_json(app.get("/", None).await).await;
    assert_eq!(question_texts(&body), vec!["past"]);
}

#[tokio::test]
async fn index_orders_newest_first() {
    let app = TestApp::new();
    app.create_question("2", -4, &["A"]).await;
    app.create_question("1", -3, &["A"]).await;

    let body = body_json(app.get("/", None).await).await;
    assert_eq!(question_texts(&body), vec!["1", "2"]);
}

#[tokio::test]
async fn index_hides_questions_without_choices() {
    let app = TestApp::new();
    app.create_question("empty", -1, &[]).await;
    app.create_question("with choices", -2, &["A", "B"]).await;

    let body = body_json(app.get("/", None).await).await;
    assert_eq!(question_texts(&body), vec!["with choices"]);
}

#[tokio::test]
async fn index_shows_at_most_five() {
    let app = TestApp::new();
    for day in 1..=7 {
        app.create_question(&format!("q{}", day), -day, &["A"]).await;
    }

    let body = body_json(app.get("/", None).await).await;
    assert_eq!(question_texts(&body), vec!["q1", "q2", "q3", "q4", "q5"]);
}

// --- Detail ---

#[tokio::test]
async fn detail_of_future_question_is_not_found() {
    let app = TestApp::new();
    let q = app.create_question("default", 3, &["A"]).await;

    let resp = app.get(&format!("/{}/", q.question.id), None).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn detail_of_past_question_shows_choices() {
    let app = TestApp::new();
    let q = app.create_question("Past question", -3, &["A", "B"]).await;

    let resp = app.get(&format!("/{}/", q.question.id), None).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body = body_json(resp).await;
    assert_eq!(body["text"], "Past question");
    assert_eq!(body["choices"].as_array().unwrap().len(), 2);
    assert!(body["message"].is_null());
}

#[tokio::test]
async fn hidden_questions_look_like_missing_ones() {
    let app = TestApp::new();
    let empty = app.create_question("no choices", -3, &[]).await;

    let hidden = app.get(&format!("/{}/", empty.question.id), None).await;
    let missing = app.get("/9999/", None).await;
    let garbage = app.get("/not-a-number/", None).await;

    assert_eq!(hidden.status(), StatusCode::NOT_FOUND);
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    assert_eq!(garbage.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(hidden).await, body_json(missing).await);
}

// --- Voting ---

#[tokio::test]
async fn vote_requires_signin() {
    let app = TestApp::new();
    let q = app.create_question("default", -3, &["A"]).await;
    let id = q.question.id;

    let resp = app
        .post_form(&format!("/{}/vote", id), &format!("choice={}", q.choices[0].id), None)
        .await;

    assert_redirect(&resp, &format!("/users/signin?next=/{}/", id));
    assert_eq!(app.vote_counts(id).await, vec![0]);
}

#[tokio::test]
async fn vote_with_unknown_session_redirects_to_signin() {
    let app = TestApp::new();
    let q = app.create_question("default", -3, &["A"]).await;
    let id = q.question.id;

    let resp = app
        .post_form(
            &format!("/{}/vote", id),
            &format!("choice={}", q.choices[0].id),
            Some("session=forged"),
        )
        .await;

    assert_redirect(&resp, &format!("/users/signin?next=/{}/", id));
    assert_eq!(app.vote_counts(id).await, vec![0]);
}

#[tokio::test]
async fn valid_vote_increments_only_the_selected_choice() {
    let app = TestApp::new();
    let cookie = app.signed_in_cookie("alice").await;
    let q = app.create_question("default", -3, &["A", "B", "C"]).await;
    let id = q.question.id;

    let resp = app
        .post_form(
            &format!("/{}/vote", id),
            &format!("choice={}", q.choices[1].id),
            Some(&cookie),
        )
        .await;

    assert_redirect(&resp, &format!("/{}/results", id));
    assert_eq!(app.vote_counts(id).await, vec![0, 1, 0]);

    let results = body_json(app.get(&format!("/{}/results", id), None).await).await;
    assert_eq!(results["total_votes"], 1);
    assert_eq!(results["choices"][1]["vote_count"], 1);
}

#[tokio::test]
async fn vote_without_choice_redisplays_question_with_message() {
    let app = TestApp::new();
    let cookie = app.signed_in_cookie("alice").await;
    let q = app.create_question("default", -3, &["A", "B"]).await;
    let id = q.question.id;

    let resp = app.post_form(&format!("/{}/vote", id), "", Some(&cookie)).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body = body_json(resp).await;
    assert_eq!(body["message"], "You didn't select a choice.");
    assert_eq!(body["id"], id);
    assert_eq!(app.vote_counts(id).await, vec![0, 0]);
}

#[tokio::test]
async fn vote_without_body_redisplays_question_with_message() {
    let app = TestApp::new();
    let cookie = app.signed_in_cookie("alice").await;
    let q = app.create_question("default", -3, &["A", "B"]).await;
    let id = q.question.id;

    let request = Request::builder()
        .method("POST")
        .uri(format!("/{}/vote", id))
        .header(header::COOKIE, &cookie)
        .body(Body::empty())
        .unwrap();
    let resp = app.send(request).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body = body_json(resp).await;
    assert_eq!(body["message"], "You didn't select a choice.");
    assert_eq!(app.vote_counts(id).await, vec![0, 0]);
}

#[tokio::test]
async fn vote_for_another_questions_choice_changes_nothing() {
    let app = TestApp::new();
    let cookie = app.signed_in_cookie("alice").await;
    let q1 = app.create_question("first", -3, &["A"]).await;
    let q2 = app.create_question("second", -3, &["B"]).await;

    for body in [
        format!("choice={}", q2.choices[0].id),
        "choice=9999".to_string(),
        "choice=abc".to_string(),
    ] {
        let resp = app
            .post_form(&format!("/{}/vote", q1.question.id), &body, Some(&cookie))
            .await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["message"], "You didn't select a choice.");
    }

    assert_eq!(app.vote_counts(q1.question.id).await, vec![0]);
    assert_eq!(app.vote_counts(q2.question.id).await, vec![0]);
}

#[tokio::test]
async fn vote_on_missing_question_is_not_found() {
    let app = TestApp::new();
    let cookie = app.signed_in_cookie("alice").await;

    let resp = app.post_form("/4242/vote", "choice=1", Some(&cookie)).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn results_of_missing_question_is_not_found() {
    let app = TestApp::new();
    let resp = app.get("/4242/results", None).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_votes_are_all_counted() {
    let app = TestApp::new();
    let q = app.create_question("default", -3, &["A", "B"]).await;
    let (question_id, choice_id) = (q.question.id, q.choices[0].id);
    let polls = Arc::new(app.state.polls.clone());

    let handles: Vec<_> = (0..50)
        .map(|_| {
            let polls = polls.clone();
            tokio::spawn(async move { polls.cast_vote(question_id, Some(choice_id)).await })
        })
        .collect();
    for handle in handles {
        let outcome = handle.await.unwrap().unwrap();
        assert!(matches!(outcome, VoteOutcome::Recorded(_)));
    }

    assert_eq!(app.vote_counts(question_id).await, vec![50, 0]);
}

#[tokio::test]
async fn two_concurrent_http_votes_both_land() {
    let app = TestApp::new();
    let cookie = app.signed_in_cookie("alice").await;
    let q = app.create_question("default", -3, &["A"]).await;
    let uri = format!("/{}/vote", q.question.id);
    let body = format!("choice={}", q.choices[0].id);

    let (first, second) = tokio::join!(
        app.post_form(&uri, &body, Some(&cookie)),
        app.post_form(&uri, &body, Some(&cookie)),
    );

    assert_eq!(first.status(), StatusCode::SEE_OTHER);
    assert_eq!(second.status(), StatusCode::SEE_OTHER);
    assert_eq!(app.vote_counts(q.question.id).await, vec![2]);
}

#[tokio::test]
async fn end_to_end_poll_scenario() {
    let app = TestApp::new();
    let q = app.create_question("Q", -3, &["A"]).await;
    let (id, choice) = (q.question.id, q.choices[0].id);

    let index = body_json(app.get("/", None).await).await;
    assert_eq!(question_texts(&index), vec!["Q"]);

    let anonymous = app
        .post_form(&format!("/{}/vote", id), &format!("choice={}", choice), None)
        .await;
    assert_redirect(&anonymous, &format!("/users/signin?next=/{}/", id));
    assert_eq!(app.vote_counts(id).await, vec![0]);

    let cookie = app.signed_in_cookie("voter").await;
    let voted = app
        .post_form(&format!("/{}/vote", id), &format!("choice={}", choice), Some(&cookie))
        .await;
    assert_redirect(&voted, &format!("/{}/results", id));
    assert_eq!(app.vote_counts(id).await, vec![1]);
}
