//! Shared fixture builders for integration tests across the judging
//! pipeline. Every scenario test needs the same minimal object graph —
//! a language, a problem, a contest, a user enrolled in it — so it lives
//! here once instead of being re-typed in every crate's `tests/`.

use anyhow::{Context, Result};
use chrono::Utc;
use codecourt_schemas::{Contest, Id, Language, Problem, Role};
use sqlx::PgPool;

/// Connects to `CODE_COURT_TEST_DATABASE_URL` and runs migrations.
/// Panics with a clear message if the env var is unset — scenario tests
/// are `#[ignore]`d by default precisely because they need this.
pub async fn connect_test_pool() -> PgPool {
    let url = std::env::var("CODE_COURT_TEST_DATABASE_URL")
        .expect("CODE_COURT_TEST_DATABASE_URL must be set for this test");
    let pool = codecourt_db::connect(&url).await.expect("connect");
    codecourt_db::migrate(&pool).await.expect("migrate");
    pool
}

/// A contest with one enabled language and one input-output problem
/// linked to it, ready to accept Runs.
pub struct MinimalFixture {
    pub language_id: Id,
    pub problem_id: Id,
    pub contest_id: Id,
}

/// Seeds a contest running now (`start_time` an hour ago, `end_time` an
/// hour from now) with one problem whose secret case is `15 -> FizzBuzz`.
pub async fn seed_minimal_contest(pool: &PgPool) -> Result<MinimalFixture> {
    let language_id = codecourt_db::insert_language(
        pool,
        &Language {
            id: 0,
            name: format!("lang-{}", uuid::Uuid::new_v4()),
            is_enabled: true,
            run_script: "#!/bin/bash\ncat $input_file\n".to_string(),
            syntax_mode: None,
            default_template: None,
        },
    )
    .await
    .context("seed language")?;

    let problem_type_id = codecourt_db::insert_problem_type(pool, "input-output", "")
        .await
        .context("seed problem type")?;

    let problem_id = codecourt_db::insert_problem(
        pool,
        &Problem {
            id: 0,
            problem_type_id,
            slug: format!("p-{}", uuid::Uuid::new_v4()),
            name: "test problem".to_string(),
            problem_statement: String::new(),
            sample_input: "15\n".to_string(),
            sample_output: "FizzBuzz\n".to_string(),
            secret_input: "15\n".to_string(),
            secret_output: "FizzBuzz\n".to_string(),
            is_enabled: true,
        },
    )
    .await
    .context("seed problem")?;

    let contest_id = codecourt_db::insert_contest(
        pool,
        &Contest {
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
    .context("seed contest")?;

    codecourt_db::link_contest_problem(pool, contest_id, problem_id)
        .await
        .context("link problem to contest")?;

    Ok(MinimalFixture {
        language_id,
        problem_id,
        contest_id,
    })
}

/// Seeds a user with a throwaway bcrypt hash (cost held low, see
/// `codecourt_db::bcrypt_cost(true)`) and the given roles, unenrolled.
pub async fn seed_user(pool: &PgPool, username: &str, roles: &[Role]) -> Result<Id> {
    let hashed = codecourt_db::hash_password("testpass", codecourt_db::bcrypt_cost(true))?;
    codecourt_db::insert_user(pool, username, "Test User", &hashed, serde_json::json!({}), roles)
        .await
        .context("seed user")
}

/// Seeds a defendant and enrolls them in `fixture`'s contest in one call,
/// the shape almost every submission-flow scenario test wants.
pub async fn seed_enrolled_defendant(pool: &PgPool, fixture: &MinimalFixture, username: &str) -> Result<Id> {
    let user_id = seed_user(pool, username, &[Role::Defendant]).await?;
    codecourt_db::enroll_user_in_contest(pool, fixture.contest_id, user_id)
        .await
        .context("enroll defendant")?;
    Ok(user_id)
}
