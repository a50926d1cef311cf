//! The Store: connection/migration lifecycle plus CRUD for every
//! entity, the Writ Queue's lease protocol (gated behind the
//! `dispatch-claim` feature), the Lease Reaper's query, and the
//! Scoreboard Aggregator's read path.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use codecourt_schemas::{
    Configuration, Contest, Id, Language, Problem, ProblemType, Role, Run, RunState, User,
    ValType,
};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

pub mod queue;
pub mod scoreboard;

pub use queue::*;
pub use scoreboard::*;

pub const ENV_DB_URI: &str = "CODE_COURT_DB_URI";

/// Connect to Postgres using `CODE_COURT_DB_URI`.
pub async fn connect_from_env() -> Result<PgPool> {
    let url = std::env::var(ENV_DB_URI).with_context(|| format!("missing env var {ENV_DB_URI}"))?;
    connect(&url).await
}

pub async fn connect(url: &str) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(url)
        .await
        .context("failed to connect to Postgres")
}

/// Run embedded SQL migrations.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("db migrate failed")
}

/// Returns `true` for a unique-constraint violation (Postgres code 23505),
/// the signal callers use to turn an insert failure into the `Integrity`
/// error taxonomy row rather than a generic 500.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}

// ---------------------------------------------------------------------------
// Password hashing
// ---------------------------------------------------------------------------

/// bcrypt cost factor. Production uses a real cost; test builds use the
/// lowest valid cost so the suite doesn't spend seconds hashing passwords.
pub fn bcrypt_cost(is_test: bool) -> u32 {
    if is_test {
        bcrypt::DEFAULT_COST.min(4)
    } else {
        10
    }
}

pub fn hash_password(password: &str, cost: u32) -> Result<String> {
    bcrypt::hash(password, cost).context("bcrypt hash failed")
}

pub fn verify_password(password: &str, hashed: &str) -> Result<bool> {
    bcrypt::verify(password, hashed).context("bcrypt verify failed")
}

// ---------------------------------------------------------------------------
// Language
// ---------------------------------------------------------------------------

#[derive(sqlx::FromRow)]
struct LanguageRow {
    id: Id,
    name: String,
    is_enabled: bool,
    run_script: String,
    syntax_mode: Option<String>,
    default_template: Option<String>,
}

impl From<LanguageRow> for Language {
    fn from(r: LanguageRow) -> Self {
        Language {
            id: r.id,
            name: r.name,
            is_enabled: r.is_enabled,
            run_script: r.run_script,
            syntax_mode: r.syntax_mode,
            default_template: r.default_template,
        }
    }
}

pub async fn insert_language(pool: &PgPool, l: &Language) -> Result<Id> {
    let (id,): (Id,) = sqlx::query_as(
        r#"insert into languages (name, is_enabled, run_script, syntax_mode, default_template)
           values ($1, $2, $3, $4, $5) returning id"#,
    )
    .bind(&l.name)
    .bind(l.is_enabled)
    .bind(&l.run_script)
    .bind(&l.syntax_mode)
    .bind(&l.default_template)
    .fetch_one(pool)
    .await
    .context("insert_language failed")?;
    Ok(id)
}

pub async fn list_enabled_languages(pool: &PgPool) -> Result<Vec<Language>> {
    let rows: Vec<LanguageRow> = sqlx::query_as(
        "select id, name, is_enabled, run_script, syntax_mode, default_template
         from languages where is_enabled order by name",
    )
    .fetch_all(pool)
    .await
    .context("list_enabled_languages failed")?;
    Ok(rows.into_iter().map(Into::into).collect())
}

pub async fn fetch_language(pool: &PgPool, id: Id) -> Result<Option<Language>> {
    let row: Option<LanguageRow> = sqlx::query_as(
        "select id, name, is_enabled, run_script, syntax_mode, default_template
         from languages where id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("fetch_language failed")?;
    Ok(row.map(Into::into))
}

// ---------------------------------------------------------------------------
// ProblemType
// ---------------------------------------------------------------------------

pub async fn insert_problem_type(pool: &PgPool, name: &str, eval_script: &str) -> Result<Id> {
    let (id,): (Id,) = sqlx::query_as(
        "insert into problem_types (name, eval_script) values ($1, $2) returning id",
    )
    .bind(name)
    .bind(eval_script)
    .fetch_one(pool)
    .await
    .context("insert_problem_type failed")?;
    Ok(id)
}

pub async fn fetch_problem_type_by_name(pool: &PgPool, name: &str) -> Result<Option<ProblemType>> {
    let row: Option<(Id, String, String)> =
        sqlx::query_as("select id, name, eval_script from problem_types where name = $1")
            .bind(name)
            .fetch_optional(pool)
            .await
            .context("fetch_problem_type_by_name failed")?;
    Ok(row.map(|(id, name, eval_script)| ProblemType {
        id,
        name,
        eval_script,
    }))
}

// ---------------------------------------------------------------------------
// Problem
// ---------------------------------------------------------------------------

#[derive(sqlx::FromRow)]
struct ProblemRow {
    id: Id,
    problem_type_id: Id,
    slug: String,
    name: String,
    problem_statement: String,
    sample_input: String,
    sample_output: String,
    secret_input: String,
    secret_output: String,
    is_enabled: bool,
}

impl From<ProblemRow> for Problem {
    fn from(r: ProblemRow) -> Self {
        Problem {
            id: r.id,
            problem_type_id: r.problem_type_id,
            slug: r.slug,
            name: r.name,
            problem_statement: r.problem_statement,
            sample_input: r.sample_input,
            sample_output: r.sample_output,
            secret_input: r.secret_input,
            secret_output: r.secret_output,
            is_enabled: r.is_enabled,
        }
    }
}

const PROBLEM_COLUMNS: &str = "id, problem_type_id, slug, name, problem_statement, \
     sample_input, sample_output, secret_input, secret_output, is_enabled";

pub async fn insert_problem(pool: &PgPool, p: &Problem) -> Result<Id> {
    let (id,): (Id,) = sqlx::query_as(
        r#"insert into problems
           (problem_type_id, slug, name, problem_statement, sample_input, sample_output,
            secret_input, secret_output, is_enabled)
           values ($1, $2, $3, $4, $5, $6, $7, $8, $9)
           returning id"#,
    )
    .bind(p.problem_type_id)
    .bind(&p.slug)
    .bind(&p.name)
    .bind(&p.problem_statement)
    .bind(&p.sample_input)
    .bind(&p.sample_output)
    .bind(&p.secret_input)
    .bind(&p.secret_output)
    .bind(p.is_enabled)
    .fetch_one(pool)
    .await
    .context("insert_problem failed")?;
    Ok(id)
}

pub async fn fetch_problem(pool: &PgPool, id: Id) -> Result<Option<Problem>> {
    let row: Option<ProblemRow> =
        sqlx::query_as(&format!("select {PROBLEM_COLUMNS} from problems where id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
            .context("fetch_problem failed")?;
    Ok(row.map(Into::into))
}

pub async fn fetch_problem_by_slug(pool: &PgPool, slug: &str) -> Result<Option<Problem>> {
    let row: Option<ProblemRow> = sqlx::query_as(&format!(
        "select {PROBLEM_COLUMNS} from problems where slug = $1"
    ))
    .bind(slug)
    .fetch_optional(pool)
    .await
    .context("fetch_problem_by_slug failed")?;
    Ok(row.map(Into::into))
}

/// Enabled problems belonging to a contest, for the `problems` endpoint.
pub async fn list_enabled_problems_for_contest(pool: &PgPool, contest_id: Id) -> Result<Vec<Problem>> {
    let rows: Vec<ProblemRow> = sqlx::query_as(&format!(
        "select p.id, p.problem_type_id, p.slug, p.name, p.problem_statement, \
         p.sample_input, p.sample_output, p.secret_input, p.secret_output, p.is_enabled
         from problems p
         join contest_problems cp on cp.problem_id = p.id
         where cp.contest_id = $1 and p.is_enabled
         order by p.slug"
    ))
    .bind(contest_id)
    .fetch_all(pool)
    .await
    .context("list_enabled_problems_for_contest failed")?;
    Ok(rows.into_iter().map(Into::into).collect())
}

pub async fn link_contest_problem(pool: &PgPool, contest_id: Id, problem_id: Id) -> Result<()> {
    sqlx::query("insert into contest_problems (contest_id, problem_id) values ($1, $2)")
        .bind(contest_id)
        .bind(problem_id)
        .execute(pool)
        .await
        .context("link_contest_problem failed")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Id,
    username: String,
    name: String,
    hashed_password: String,
    creation_time: DateTime<Utc>,
    misc_data: serde_json::Value,
}

async fn roles_for_user(pool: &PgPool, user_id: Id) -> Result<Vec<Role>> {
    let rows: Vec<(String,)> = sqlx::query_as("select role from user_roles where user_id = $1")
        .bind(user_id)
        .fetch_all(pool)
        .await
        .context("roles_for_user failed")?;
    Ok(rows
        .into_iter()
        .filter_map(|(r,)| Role::parse(&r))
        .collect())
}

fn user_from_row(r: UserRow, roles: Vec<Role>) -> User {
    User {
        id: r.id,
        username: r.username,
        name: r.name,
        hashed_password: r.hashed_password,
        creation_time: r.creation_time,
        misc_data: r.misc_data,
        roles,
    }
}

pub async fn insert_user(
    pool: &PgPool,
    username: &str,
    name: &str,
    hashed_password: &str,
    misc_data: serde_json::Value,
    roles: &[Role],
) -> Result<Id> {
    let mut tx = pool.begin().await.context("begin insert_user tx")?;

    let (id,): (Id,) = sqlx::query_as(
        "insert into users (username, name, hashed_password, misc_data)
         values ($1, $2, $3, $4) returning id",
    )
    .bind(username)
    .bind(name)
    .bind(hashed_password)
    .bind(misc_data)
    .fetch_one(&mut *tx)
    .await
    .context("insert_user failed")?;

    for role in roles {
        sqlx::query("insert into user_roles (user_id, role) values ($1, $2)")
            .bind(id)
            .bind(role.as_str())
            .execute(&mut *tx)
            .await
            .context("insert user_roles failed")?;
    }

    tx.commit().await.context("commit insert_user tx")?;
    Ok(id)
}

pub async fn fetch_user_by_username(pool: &PgPool, username: &str) -> Result<Option<User>> {
    let row: Option<UserRow> = sqlx::query_as(
        "select id, username, name, hashed_password, creation_time, misc_data
         from users where username = $1",
    )
    .bind(username)
    .fetch_optional(pool)
    .await
    .context("fetch_user_by_username failed")?;

    match row {
        None => Ok(None),
        Some(row) => {
            let roles = roles_for_user(pool, row.id).await?;
            Ok(Some(user_from_row(row, roles)))
        }
    }
}

pub async fn fetch_user(pool: &PgPool, id: Id) -> Result<Option<User>> {
    let row: Option<UserRow> = sqlx::query_as(
        "select id, username, name, hashed_password, creation_time, misc_data
         from users where id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("fetch_user failed")?;

    match row {
        None => Ok(None),
        Some(row) => {
            let roles = roles_for_user(pool, row.id).await?;
            Ok(Some(user_from_row(row, roles)))
        }
    }
}

/// The ids of contests a user belongs to. `get-contest-info` requires
/// the caller to have exactly one.
pub async fn contests_for_user(pool: &PgPool, user_id: Id) -> Result<Vec<Id>> {
    let rows: Vec<(Id,)> =
        sqlx::query_as("select contest_id from contest_users where user_id = $1")
            .bind(user_id)
            .fetch_all(pool)
            .await
            .context("contests_for_user failed")?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

pub async fn enroll_user_in_contest(pool: &PgPool, contest_id: Id, user_id: Id) -> Result<()> {
    sqlx::query("insert into contest_users (contest_id, user_id) values ($1, $2)")
        .bind(contest_id)
        .bind(user_id)
        .execute(pool)
        .await
        .context("enroll_user_in_contest failed")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Contest
// ---------------------------------------------------------------------------

#[derive(sqlx::FromRow)]
struct ContestRow {
    id: Id,
    name: String,
    activate_time: Option<DateTime<Utc>>,
    start_time: DateTime<Utc>,
    freeze_time: Option<DateTime<Utc>>,
    end_time: DateTime<Utc>,
    deactivate_time: Option<DateTime<Utc>>,
    is_public: bool,
}

impl From<ContestRow> for Contest {
    fn from(r: ContestRow) -> Self {
        Contest {
            id: r.id,
            name: r.name,
            activate_time: r.activate_time,
            start_time: r.start_time,
            freeze_time: r.freeze_time,
            end_time: r.end_time,
            deactivate_time: r.deactivate_time,
            is_public: r.is_public,
        }
    }
}

const CONTEST_COLUMNS: &str =
    "id, name, activate_time, start_time, freeze_time, end_time, deactivate_time, is_public";

pub async fn insert_contest(pool: &PgPool, c: &Contest) -> Result<Id> {
    let (id,): (Id,) = sqlx::query_as(
        r#"insert into contests
           (name, activate_time, start_time, freeze_time, end_time, deactivate_time, is_public)
           values ($1, $2, $3, $4, $5, $6, $7)
           returning id"#,
    )
    .bind(&c.name)
    .bind(c.activate_time)
    .bind(c.start_time)
    .bind(c.freeze_time)
    .bind(c.end_time)
    .bind(c.deactivate_time)
    .bind(c.is_public)
    .fetch_one(pool)
    .await
    .context("insert_contest failed")?;
    Ok(id)
}

pub async fn fetch_contest(pool: &PgPool, id: Id) -> Result<Option<Contest>> {
    let row: Option<ContestRow> =
        sqlx::query_as(&format!("select {CONTEST_COLUMNS} from contests where id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
            .context("fetch_contest failed")?;
    Ok(row.map(Into::into))
}

pub async fn fetch_contest_by_name(pool: &PgPool, name: &str) -> Result<Option<Contest>> {
    let row: Option<ContestRow> =
        sqlx::query_as(&format!("select {CONTEST_COLUMNS} from contests where name = $1"))
            .bind(name)
            .fetch_optional(pool)
            .await
            .context("fetch_contest_by_name failed")?;
    Ok(row.map(Into::into))
}

/// `problems` endpoint membership check: does `contest_id` contain `slug`?
pub async fn contest_has_problem_slug(pool: &PgPool, contest_id: Id, slug: &str) -> Result<bool> {
    let row: Option<(Id,)> = sqlx::query_as(
        "select p.id from problems p
         join contest_problems cp on cp.problem_id = p.id
         where cp.contest_id = $1 and p.slug = $2",
    )
    .bind(contest_id)
    .bind(slug)
    .fetch_optional(pool)
    .await
    .context("contest_has_problem_slug failed")?;
    Ok(row.is_some())
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

pub async fn fetch_all_configuration(pool: &PgPool) -> Result<Vec<Configuration>> {
    let rows: Vec<(String, String, String, String)> =
        sqlx::query_as("select key, val, val_type, category from configuration")
            .fetch_all(pool)
            .await
            .context("fetch_all_configuration failed")?;

    rows.into_iter()
        .map(|(key, val, val_type, category)| {
            let val_type = ValType::parse(&val_type)
                .with_context(|| format!("configuration key {key} has unknown val_type {val_type}"))?;
            Ok(Configuration {
                key,
                val,
                val_type,
                category,
            })
        })
        .collect()
}

pub async fn upsert_configuration(
    pool: &PgPool,
    key: &str,
    val: &str,
    val_type: ValType,
    category: &str,
) -> Result<()> {
    sqlx::query(
        "insert into configuration (key, val, val_type, category) values ($1, $2, $3, $4)
         on conflict (key) do update set val = excluded.val, val_type = excluded.val_type, category = excluded.category",
    )
    .bind(key)
    .bind(val)
    .bind(val_type.as_str())
    .bind(category)
    .execute(pool)
    .await
    .context("upsert_configuration failed")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Run
// ---------------------------------------------------------------------------

#[derive(sqlx::FromRow)]
pub(crate) struct RunRow {
    pub id: Id,
    pub user_id: Id,
    pub contest_id: Id,
    pub language_id: Id,
    pub problem_id: Id,
    pub submit_time: DateTime<Utc>,
    pub local_submit_time: Option<DateTime<Utc>>,
    pub started_execing_time: Option<DateTime<Utc>>,
    pub finished_execing_time: Option<DateTime<Utc>>,
    pub source_code: String,
    pub run_input: String,
    pub correct_output: Option<String>,
    pub run_output: Option<String>,
    pub is_submission: bool,
    pub is_passed: Option<bool>,
    pub is_priority: bool,
    pub state: String,
}

impl RunRow {
    pub(crate) fn into_domain(self) -> Result<Run> {
        let state = RunState::parse(&self.state)
            .with_context(|| format!("run {} has unknown state {}", self.id, self.state))?;
        Ok(Run {
            id: self.id,
            user_id: self.user_id,
            contest_id: self.contest_id,
            language_id: self.language_id,
            problem_id: self.problem_id,
            submit_time: self.submit_time,
            local_submit_time: self.local_submit_time,
            started_execing_time: self.started_execing_time,
            finished_execing_time: self.finished_execing_time,
            source_code: self.source_code,
            run_input: self.run_input,
            correct_output: self.correct_output,
            run_output: self.run_output,
            is_submission: self.is_submission,
            is_passed: self.is_passed,
            is_priority: self.is_priority,
            state,
        })
    }
}

pub(crate) const RUN_COLUMNS: &str = "id, user_id, contest_id, language_id, problem_id, \
     submit_time, local_submit_time, started_execing_time, finished_execing_time, \
     source_code, run_input, correct_output, run_output, is_submission, is_passed, \
     is_priority, state";

pub struct NewRun {
    pub user_id: Id,
    pub contest_id: Id,
    pub language_id: Id,
    pub problem_id: Id,
    pub submit_time: DateTime<Utc>,
    pub local_submit_time: Option<DateTime<Utc>>,
    pub source_code: String,
    pub run_input: String,
    pub correct_output: Option<String>,
    pub is_submission: bool,
    pub is_priority: bool,
    pub state: RunState,
}

pub async fn insert_run(pool: &PgPool, r: &NewRun) -> Result<Id> {
    let (id,): (Id,) = sqlx::query_as(
        r#"insert into runs
           (user_id, contest_id, language_id, problem_id, submit_time, local_submit_time,
            source_code, run_input, correct_output, is_submission, is_priority, state)
           values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
           returning id"#,
    )
    .bind(r.user_id)
    .bind(r.contest_id)
    .bind(r.language_id)
    .bind(r.problem_id)
    .bind(r.submit_time)
    .bind(r.local_submit_time)
    .bind(&r.source_code)
    .bind(&r.run_input)
    .bind(&r.correct_output)
    .bind(r.is_submission)
    .bind(r.is_priority)
    .bind(r.state.as_str())
    .fetch_one(pool)
    .await
    .context("insert_run failed")?;
    Ok(id)
}

pub async fn fetch_run(pool: &PgPool, id: Id) -> Result<Option<Run>> {
    let row: Option<RunRow> =
        sqlx::query_as(&format!("select {RUN_COLUMNS} from runs where id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
            .context("fetch_run failed")?;
    row.map(RunRow::into_domain).transpose()
}

/// A user's runs within a contest, newest first — feeds the `problems`
/// endpoint's per-problem run history.
pub async fn list_runs_for_user_and_contest(pool: &PgPool, user_id: Id, contest_id: Id) -> Result<Vec<Run>> {
    let rows: Vec<RunRow> = sqlx::query_as(&format!(
        "select {RUN_COLUMNS} from runs where user_id = $1 and contest_id = $2 order by submit_time desc"
    ))
    .bind(user_id)
    .bind(contest_id)
    .fetch_all(pool)
    .await
    .context("list_runs_for_user_and_contest failed")?;
    rows.into_iter().map(RunRow::into_domain).collect()
}

/// Count of `user_id`'s runs submitted after `since` — the Rate Limiter's
/// window count.
pub async fn count_user_runs_since(pool: &PgPool, user_id: Id, since: DateTime<Utc>) -> Result<i64> {
    let (count,): (i64,) = sqlx::query_as(
        "select count(*) from runs where user_id = $1 and submit_time > $2",
    )
    .bind(user_id)
    .bind(since)
    .fetch_one(pool)
    .await
    .context("count_user_runs_since failed")?;
    Ok(count)
}

/// Completion path: set output/finish time, recompute `is_passed`
/// if a submission, transition state. Fails (returns `Ok(false)`) if the
/// run is already finished — the first completer wins.
pub async fn mark_run_finished(
    pool: &PgPool,
    run_id: Id,
    run_output: &str,
    is_passed: Option<bool>,
    state: RunState,
    now: DateTime<Utc>,
) -> Result<bool> {
    let row: Option<(Id,)> = sqlx::query_as(
        r#"update runs
           set run_output = $1, is_passed = $2, state = $3, finished_execing_time = $4
           where id = $5 and finished_execing_time is null
           returning id"#,
    )
    .bind(run_output)
    .bind(is_passed)
    .bind(state.as_str())
    .bind(now)
    .bind(run_id)
    .fetch_optional(pool)
    .await
    .context("mark_run_finished failed")?;
    Ok(row.is_some())
}

/// Explicit return (`return-without-run`): clear the lease.
/// Idempotent — returns `Ok(false)` (no-op) if already unleased or finished.
pub async fn return_run_without_run(pool: &PgPool, run_id: Id) -> Result<bool> {
    let row: Option<(Id,)> = sqlx::query_as(
        r#"update runs
           set started_execing_time = null
           where id = $1 and started_execing_time is not null and finished_execing_time is null
           returning id"#,
    )
    .bind(run_id)
    .fetch_optional(pool)
    .await
    .context("return_run_without_run failed")?;
    Ok(row.is_some())
}

/// Rejudge (S6): clear the four lifecycle fields and refresh
/// `run_input`/`correct_output` from the problem's secrets, returning the
/// Run to the unleased pool by its original `submit_time`.
pub async fn rejudge_run(
    pool: &PgPool,
    run_id: Id,
    run_input: &str,
    correct_output: Option<&str>,
) -> Result<bool> {
    let row: Option<(Id,)> = sqlx::query_as(
        r#"update runs
           set started_execing_time = null,
               finished_execing_time = null,
               run_output = null,
               is_passed = null,
               state = 'JUDGING',
               run_input = $1,
               correct_output = $2
           where id = $3
           returning id"#,
    )
    .bind(run_input)
    .bind(correct_output)
    .bind(run_id)
    .fetch_optional(pool)
    .await
    .context("rejudge_run failed")?;
    Ok(row.is_some())
}
