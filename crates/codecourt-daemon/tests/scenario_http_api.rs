//! End-to-end HTTP scenario tests against the real router, composed
//! in-process with `tower::ServiceExt::oneshot` — no socket involved.
//! Run: CODE_COURT_TEST_DATABASE_URL=postgres://... cargo test -p codecourt-daemon -- --ignored

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use codecourt_daemon::{routes::build_router, state::AppState};
use codecourt_schemas::Role;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

async fn build_state() -> Arc<AppState> {
    let pool = codecourt_testkit::connect_test_pool().await;
    Arc::new(AppState::new(pool))
}

async fn json_body(resp: axum::response::Response) -> Value {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn basic_auth(username: &str, password: &str) -> String {
    use base64::Engine;
    format!(
        "Basic {}",
        base64::engine::general_purpose::STANDARD.encode(format!("{username}:{password}"))
    )
}

#[tokio::test]
#[ignore = "requires CODE_COURT_TEST_DATABASE_URL"]
async fn login_rejects_wrong_password_and_accepts_right_one() {
    let state = build_state().await;
    let pool = state.pool.clone();
    let username = format!("user-{}", uuid::Uuid::new_v4());
    codecourt_testkit::seed_user(&pool, &username, &[Role::Defendant]).await.unwrap();

    let app = build_router(state.clone());
    let bad = app
        .clone()
        .oneshot(
            Request::post("/api/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({"username": username, "password": "wrong"}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(bad.status(), StatusCode::UNAUTHORIZED);

    let ok = app
        .oneshot(
            Request::post("/api/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({"username": username, "password": "testpass"}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(ok.status(), StatusCode::OK);
    let body = json_body(ok).await;
    assert!(body["access_token"].as_str().unwrap().contains('.'));
}

#[tokio::test]
#[ignore = "requires CODE_COURT_TEST_DATABASE_URL"]
async fn bearer_token_round_trips_through_current_user() {
    let state = build_state().await;
    let pool = state.pool.clone();
    let username = format!("user-{}", uuid::Uuid::new_v4());
    codecourt_testkit::seed_user(&pool, &username, &[Role::Defendant]).await.unwrap();

    let app = build_router(state.clone());
    let login_resp = app
        .clone()
        .oneshot(
            Request::post("/api/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({"username": username, "password": "testpass"}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let token = json_body(login_resp).await["access_token"].as_str().unwrap().to_string();

    let resp = app
        .oneshot(
            Request::get("/api/current-user")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body["username"], username);

    // No header at all is unauthorized, same as a garbage token.
    let no_auth = build_router(state.clone())
        .oneshot(Request::get("/api/current-user").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(no_auth.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore = "requires CODE_COURT_TEST_DATABASE_URL"]
async fn get_writ_claims_and_submit_writ_judges_a_submission() {
    let state = build_state().await;
    let pool = state.pool.clone();
    let fixture = codecourt_testkit::seed_minimal_contest(&pool).await.unwrap();
    let defendant_id = codecourt_testkit::seed_enrolled_defendant(&pool, &fixture, &format!("def-{}", uuid::Uuid::new_v4()))
        .await
        .unwrap();
    let exec_username = format!("exec-{}", uuid::Uuid::new_v4());
    codecourt_testkit::seed_user(&pool, &exec_username, &[Role::Executioner]).await.unwrap();

    codecourt_db::insert_run(
        &pool,
        &codecourt_db::NewRun {
            user_id: defendant_id,
            contest_id: fixture.contest_id,
            language_id: fixture.language_id,
            problem_id: fixture.problem_id,
            submit_time: chrono::Utc::now(),
            local_submit_time: None,
            source_code: "irrelevant".to_string(),
            run_input: "15\n".to_string(),
            correct_output: Some("FizzBuzz\n".to_string()),
            is_submission: true,
            is_priority: false,
            state: codecourt_schemas::RunState::Judging,
        },
    )
    .await
    .unwrap();

    let app = build_router(state.clone());
    let auth = basic_auth(&exec_username, "testpass");

    let writ_resp = app
        .clone()
        .oneshot(
            Request::get("/api/get-writ")
                .header(header::AUTHORIZATION, auth.as_str())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(writ_resp.status(), StatusCode::OK);
    let writ = json_body(writ_resp).await;
    assert_eq!(writ["status"], "found");
    let run_id = writ["run_id"].as_i64().unwrap();
    let return_url = writ["return_url"].as_str().unwrap().to_string();

    let submit_resp = app
        .oneshot(
            Request::post(return_url.as_str())
                .header(header::AUTHORIZATION, auth.as_str())
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({"output": "FizzBuzz\n", "state": "executed"}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(submit_resp.status(), StatusCode::OK);

    let run = codecourt_db::fetch_run(&pool, run_id).await.unwrap().unwrap();
    assert_eq!(run.is_passed, Some(true));
    assert_eq!(run.state, codecourt_schemas::RunState::Successful);
}

#[tokio::test]
#[ignore = "requires CODE_COURT_TEST_DATABASE_URL"]
async fn submit_run_persists_a_terminal_run_when_contest_has_not_begun() {
    let state = build_state().await;
    let pool = state.pool.clone();

    let language_id = codecourt_db::insert_language(
        &pool,
        &codecourt_schemas::Language {
            id: 0,
            name: format!("lang-{}", uuid::Uuid::new_v4()),
            is_enabled: true,
            run_script: "#!/bin/bash\ntrue\n".to_string(),
            syntax_mode: None,
            default_template: None,
        },
    )
    .await
    .unwrap();
    let problem_type_id = codecourt_db::insert_problem_type(&pool, "input-output", "").await.unwrap();
    let problem_id = codecourt_db::insert_problem(
        &pool,
        &codecourt_schemas::Problem {
            id: 0,
            problem_type_id,
            slug: format!("p-{}", uuid::Uuid::new_v4()),
            name: "test".to_string(),
            problem_statement: String::new(),
            sample_input: "1\n".to_string(),
            sample_output: "1\n".to_string(),
            secret_input: "1\n".to_string(),
            secret_output: "1\n".to_string(),
            is_enabled: true,
        },
    )
    .await
    .unwrap();
    let contest_id = codecourt_db::insert_contest(
        &pool,
        &codecourt_schemas::Contest {
            id: 0,
            name: format!("c-{}", uuid::Uuid::new_v4()),
            activate_time: None,
            start_time: chrono::Utc::now() + chrono::Duration::hours(1),
            freeze_time: None,
            end_time: chrono::Utc::now() + chrono::Duration::hours(2),
            deactivate_time: None,
            is_public: true,
        },
    )
    .await
    .unwrap();
    codecourt_db::link_contest_problem(&pool, contest_id, problem_id).await.unwrap();

    let username = format!("def-{}", uuid::Uuid::new_v4());
    let user_id = codecourt_testkit::seed_user(&pool, &username, &[Role::Defendant]).await.unwrap();
    codecourt_db::enroll_user_in_contest(&pool, contest_id, user_id).await.unwrap();

    let login_resp = codecourt_daemon::routes::build_router(state.clone())
        .oneshot(
            Request::post("/api/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({"username": username, "password": "testpass"}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let token = json_body(login_resp).await["access_token"].as_str().unwrap().to_string();

    let slug = codecourt_db::fetch_problem(&pool, problem_id).await.unwrap().unwrap().slug;
    let submit_resp = build_router(state.clone())
        .oneshot(
            Request::post("/api/submit-run")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({
                        "problem_slug": slug,
                        "language_id": language_id,
                        "source_code": "x",
                        "is_submission": true,
                        "test_input": null,
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(submit_resp.status(), StatusCode::BAD_REQUEST);

    let runs = codecourt_db::list_runs_for_user_and_contest(&pool, user_id, contest_id).await.unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].state, codecourt_schemas::RunState::ContestHasNotBegun);
}

#[tokio::test]
#[ignore = "requires CODE_COURT_TEST_DATABASE_URL"]
async fn make_defendant_user_requires_operator_role_and_rejects_duplicate_username() {
    let state = build_state().await;
    let pool = state.pool.clone();
    let fixture = codecourt_testkit::seed_minimal_contest(&pool).await.unwrap();
    let contest = codecourt_db::fetch_contest(&pool, fixture.contest_id).await.unwrap().unwrap();

    let defendant_username = format!("def-{}", uuid::Uuid::new_v4());
    codecourt_testkit::seed_user(&pool, &defendant_username, &[Role::Defendant]).await.unwrap();
    let operator_username = format!("op-{}", uuid::Uuid::new_v4());
    codecourt_testkit::seed_user(&pool, &operator_username, &[Role::Operator]).await.unwrap();

    async fn login(app: axum::Router, username: &str) -> String {
        let resp = app
            .oneshot(
                Request::post("/api/login")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(json!({"username": username, "password": "testpass"}).to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        json_body(resp).await["access_token"].as_str().unwrap().to_string()
    }

    let defendant_token = login(build_router(state.clone()), &defendant_username).await;
    let new_username = format!("fresh-{}", uuid::Uuid::new_v4());
    let forbidden = build_router(state.clone())
        .oneshot(
            Request::post("/api/make-defendant-user")
                .header(header::AUTHORIZATION, format!("Bearer {defendant_token}"))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({"username": new_username, "password": "x", "name": "x", "contest_name": contest.name})
                        .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);

    let operator_token = login(build_router(state.clone()), &operator_username).await;
    let created = build_router(state.clone())
        .oneshot(
            Request::post("/api/make-defendant-user")
                .header(header::AUTHORIZATION, format!("Bearer {operator_token}"))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({"username": new_username, "password": "x", "name": "x", "contest_name": contest.name})
                        .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(created.status(), StatusCode::OK);

    let conflict = build_router(state.clone())
        .oneshot(
            Request::post("/api/make-defendant-user")
                .header(header::AUTHORIZATION, format!("Bearer {operator_token}"))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({"username": new_username, "password": "x", "name": "x", "contest_name": contest.name})
                        .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(conflict.status(), StatusCode::CONFLICT);
}
