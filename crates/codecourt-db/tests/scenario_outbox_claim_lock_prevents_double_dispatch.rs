//! Two concurrent pollers for the same language must never both claim the
//! same Run (a Run has at most one outstanding lease at a time).
//! Run: CODE_COURT_TEST_DATABASE_URL=... cargo test -p codecourt-db
//!      --features dispatch-claim --test scenario_outbox_claim_lock_prevents_double_dispatch -- --ignored

use chrono::Utc;
use codecourt_db::NewRun;
use codecourt_schemas::RunState;
use sqlx::PgPool;

async fn make_pool() -> PgPool {
    let url = std::env::var("CODE_COURT_TEST_DATABASE_URL")
        .expect("CODE_COURT_TEST_DATABASE_URL must be set for this test");
    let pool = codecourt_db::connect(&url).await.expect("connect");
    codecourt_db::migrate(&pool).await.expect("migrate");
    pool
}

async fn seed_fixture(pool: &PgPool) -> (i64, i64, i64, i64) {
    let language_id = codecourt_db::insert_language(
        pool,
        &codecourt_schemas::Language {
            id: 0,
            name: format!("lang-{}", uuid::Uuid::new_v4()),
            is_enabled: true,
            run_script: "#!/bin/bash\ncat $1 | true\n".to_string(),
            syntax_mode: None,
            default_template: None,
        },
    )
    .await
    .unwrap();

    let problem_type_id = codecourt_db::insert_problem_type(pool, "input-output", "")
        .await
        .unwrap();

    let problem_id = codecourt_db::insert_problem(
        pool,
        &codecourt_schemas::Problem {
            id: 0,
            problem_type_id,
            slug: format!("p-{}", uuid::Uuid::new_v4()),
            name: "test".to_string(),
            problem_statement: "".to_string(),
            sample_input: "".to_string(),
            sample_output: "".to_string(),
            secret_input: "15\n".to_string(),
            secret_output: "FizzBuzz\n".to_string(),
            is_enabled: true,
        },
    )
    .await
    .unwrap();

    let contest_id = codecourt_db::insert_contest(
        pool,
        &codecourt_schemas::Contest {
            id: 0,
            name: format!("c-{}", uuid::Uuid::new_v4()),
            activate_time: None,
            start_time: Utc::now() - chrono::Duration::hours(1),
            freeze_time: None,
            end_time: Utc::now() + chrono::Duration::hours(1),
            deactivate_time: None,
            is_public: true,
        },
    )
    .await
    .unwrap();

    let user_id = codecourt_db::insert_user(
        pool,
        &format!("user-{}", uuid::Uuid::new_v4()),
        "Test User",
        "x",
        serde_json::json!({}),
        &[codecourt_schemas::Role::Defendant],
    )
    .await
    .unwrap();

    (language_id, problem_id, contest_id, user_id)
}

#[tokio::test]
#[ignore = "requires CODE_COURT_TEST_DATABASE_URL; run: CODE_COURT_TEST_DATABASE_URL=postgres://... cargo test -p codecourt-db --features dispatch-claim -- --ignored"]
async fn claim_lock_prevents_double_dispatch() {
    let pool = make_pool().await;
    let (language_id, problem_id, contest_id, user_id) = seed_fixture(&pool).await;

    let run_id = codecourt_db::insert_run(
        &pool,
        &NewRun {
            user_id,
            contest_id,
            language_id,
            problem_id,
            submit_time: Utc::now(),
            local_submit_time: None,
            source_code: "print('hi')".to_string(),
            run_input: "15\n".to_string(),
            correct_output: Some("FizzBuzz\n".to_string()),
            is_submission: true,
            is_priority: false,
            state: RunState::Judging,
        },
    )
    .await
    .unwrap();

    let now = Utc::now();
    let (a, b) = tokio::join!(
        codecourt_db::claim_next_writ(&pool, now),
        codecourt_db::claim_next_writ(&pool, now),
    );
    let a = a.unwrap();
    let b = b.unwrap();

    let claimed: Vec<_> = [a, b].into_iter().flatten().collect();
    assert_eq!(claimed.len(), 1, "exactly one poller must win the claim");
    assert_eq!(claimed[0].id, run_id);
}
