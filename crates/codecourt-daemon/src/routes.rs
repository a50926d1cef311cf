//! Axum router and all HTTP handlers for codecourt-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers. Handlers are `pub(crate)` so integration tests can
//! compose the router directly.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use codecourt_admission::{AdmissionRefusal, AdmissionVerdicts};
use codecourt_schemas::{Id, Problem, Role, RunState, SubmitWritBody, Writ};

use crate::{
    api_types::{
        ContestInfoResponse, CurrentUserResponse, HealthResponse, LoginRequest, LoginResponse,
        MakeDefendantUserRequest, MakeDefendantUserResponse, OkResponse, ProblemSummary,
        RunSummary, SubmitRunRequest, SubmitRunResponse,
    },
    auth,
    error::ApiError,
    state::AppState,
    token,
};

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/login", post(login))
        .route("/api/current-user", get(current_user))
        .route("/api/languages", get(languages))
        .route("/api/problems", get(problems_self))
        .route("/api/problems/:user_id", get(problems_for_user))
        .route("/api/get-contest-info", get(get_contest_info))
        .route("/api/scores/:contest_id", get(scores))
        .route("/api/submit-run", post(submit_run))
        .route("/api/make-defendant-user", post(make_defendant_user))
        .route("/api/get-writ", get(get_writ))
        .route("/api/return-without-run/:run_id", post(return_without_run))
        .route("/api/submit-writ/:run_id", post(submit_writ))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// GET /healthz
// ---------------------------------------------------------------------------

async fn healthz(State(st): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        service: st.build.service,
        version: st.build.version,
        uptime_secs: st.uptime_secs(),
    })
}

// ---------------------------------------------------------------------------
// POST /api/login
// ---------------------------------------------------------------------------

async fn login(
    State(st): State<Arc<AppState>>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let user = codecourt_db::fetch_user_by_username(&st.pool, &body.username)
        .await?
        .ok_or(ApiError::Unauthorized)?;

    let ok = codecourt_db::verify_password(&body.password, &user.hashed_password)?;
    if !ok {
        return Err(ApiError::Unauthorized);
    }

    let access_token = token::issue(&st.token_secret, user.id, Utc::now());
    Ok(Json(LoginResponse { access_token }))
}

// ---------------------------------------------------------------------------
// GET /api/current-user
// ---------------------------------------------------------------------------

async fn current_user(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<CurrentUserResponse>, ApiError> {
    let user = auth::authenticate_token(&st, &headers).await?;
    Ok(Json(CurrentUserResponse {
        id: user.id,
        username: user.username,
        name: user.name,
        roles: user.roles,
    }))
}

// ---------------------------------------------------------------------------
// GET /api/languages
// ---------------------------------------------------------------------------

async fn languages(
    State(st): State<Arc<AppState>>,
) -> Result<Json<Vec<codecourt_schemas::Language>>, ApiError> {
    let langs = codecourt_db::list_enabled_languages(&st.pool).await?;
    Ok(Json(langs))
}

// ---------------------------------------------------------------------------
// GET /api/problems[/:user_id]
// ---------------------------------------------------------------------------

async fn problems_self(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<ProblemSummary>>, ApiError> {
    let caller = auth::authenticate_token(&st, &headers).await?;
    problems_for(&st, caller.id).await.map(Json)
}

async fn problems_for_user(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(user_id): Path<Id>,
) -> Result<Json<Vec<ProblemSummary>>, ApiError> {
    let caller = auth::authenticate_token(&st, &headers).await?;
    if !(caller.has_role(Role::Operator) || caller.has_role(Role::Judge)) && caller.id != user_id {
        return Err(ApiError::Forbidden(
            "viewing another user's problem history requires the operator or judge role".to_string(),
        ));
    }
    problems_for(&st, user_id).await.map(Json)
}

async fn problems_for(st: &AppState, user_id: Id) -> Result<Vec<ProblemSummary>, ApiError> {
    let contest = require_single_contest(st, user_id).await?;
    let problems = codecourt_db::list_enabled_problems_for_contest(&st.pool, contest.id).await?;
    let runs = codecourt_db::list_runs_for_user_and_contest(&st.pool, user_id, contest.id).await?;

    Ok(problems
        .into_iter()
        .map(|p| {
            let runs = runs
                .iter()
                .filter(|r| r.problem_id == p.id)
                .map(|r| RunSummary {
                    id: r.id,
                    is_submission: r.is_submission,
                    is_passed: r.is_passed,
                    state: r.state.as_str().to_string(),
                    submit_time: r.submit_time,
                })
                .collect();
            ProblemSummary {
                slug: p.slug,
                name: p.name,
                problem_statement: p.problem_statement,
                sample_input: p.sample_input,
                sample_output: p.sample_output,
                is_enabled: p.is_enabled,
                runs,
            }
        })
        .collect())
}

// ---------------------------------------------------------------------------
// GET /api/get-contest-info
// ---------------------------------------------------------------------------

async fn get_contest_info(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<ContestInfoResponse>, ApiError> {
    let caller = auth::authenticate_token(&st, &headers).await?;
    let contest = require_single_contest(&st, caller.id).await?;
    Ok(Json(ContestInfoResponse {
        id: contest.id,
        name: contest.name,
        start_time: contest.start_time,
        end_time: contest.end_time,
        freeze_time: contest.freeze_time,
        is_public: contest.is_public,
    }))
}

/// Caller must belong to exactly one contest: 400 if none, 500 if
/// more than one (the data model permits it; the API contract doesn't).
async fn require_single_contest(st: &AppState, user_id: Id) -> Result<codecourt_schemas::Contest, ApiError> {
    let contest_ids = codecourt_db::contests_for_user(&st.pool, user_id).await?;
    match contest_ids.as_slice() {
        [] => Err(ApiError::BadRequest("caller is not enrolled in any contest".to_string())),
        [only] => codecourt_db::fetch_contest(&st.pool, *only)
            .await?
            .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("contest {only} referenced by contest_users but missing"))),
        _ => Err(ApiError::Internal(anyhow::anyhow!(
            "user {user_id} is enrolled in more than one contest"
        ))),
    }
}

// ---------------------------------------------------------------------------
// GET /api/scores/:contest_id
// ---------------------------------------------------------------------------

async fn scores(
    State(st): State<Arc<AppState>>,
    Path(contest_id): Path<Id>,
) -> Result<Json<Vec<codecourt_db::ScoreboardEntry>>, ApiError> {
    let runs = codecourt_db::fetch_judged_submissions_for_contest(&st.pool, contest_id).await?;
    let problems = codecourt_db::list_enabled_problems_for_contest(&st.pool, contest_id).await?;
    let problem_slugs = problems.into_iter().map(|p| (p.id, p.slug)).collect();
    Ok(Json(codecourt_db::compute_scoreboard(&runs, &problem_slugs)))
}

// ---------------------------------------------------------------------------
// POST /api/submit-run
// ---------------------------------------------------------------------------

async fn submit_run(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<SubmitRunRequest>,
) -> Result<Json<SubmitRunResponse>, ApiError> {
    let user = auth::authenticate_token(&st, &headers).await?;
    let contest = require_single_contest(&st, user.id).await?;

    if !codecourt_db::contest_has_problem_slug(&st.pool, contest.id, &body.problem_slug).await? {
        return Err(ApiError::BadRequest(format!(
            "contest does not contain problem {}",
            body.problem_slug
        )));
    }
    let problem = codecourt_db::fetch_problem_by_slug(&st.pool, &body.problem_slug)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("problem {} not found", body.problem_slug)))?;

    let now = Utc::now();
    let config = fetch_config(&st).await?;
    let window_mins = config.get_int("user_submission_time_limit", 1)?;
    let max_runs = config.get_int("max_user_submissions", 5)?;
    let since = now - chrono::Duration::minutes(window_mins);
    let recent = codecourt_db::count_user_runs_since(&st.pool, user.id, since).await?;

    let verdicts = AdmissionVerdicts::evaluate(&user, &contest, now, recent, max_runs);
    if let Err(refusal) = verdicts.enforce() {
        return match refusal {
            AdmissionRefusal::NotADefendant => Err(ApiError::Forbidden(refusal.to_string())),
            AdmissionRefusal::RateLimited => Err(ApiError::BadRequest(refusal.to_string())),
            AdmissionRefusal::ContestEnded | AdmissionRefusal::ContestHasNotBegun => {
                let terminal = match refusal {
                    AdmissionRefusal::ContestEnded => RunState::ContestEnded,
                    AdmissionRefusal::ContestHasNotBegun => RunState::ContestHasNotBegun,
                    _ => unreachable!(),
                };
                persist_terminal_run(&st, &user, &contest, &problem, &body, now, terminal).await?;
                Err(ApiError::BadRequest(refusal.to_string()))
            }
        };
    }

    let (run_input, correct_output) = choose_input(&problem, body.is_submission, body.test_input.clone());
    let run_id = codecourt_db::insert_run(
        &st.pool,
        &codecourt_db::NewRun {
            user_id: user.id,
            contest_id: contest.id,
            language_id: body.language_id,
            problem_id: problem.id,
            submit_time: now,
            local_submit_time: None,
            source_code: body.source_code,
            run_input,
            correct_output,
            is_submission: body.is_submission,
            is_priority: false,
            state: RunState::Judging,
        },
    )
    .await?;

    Ok(Json(SubmitRunResponse {
        run_id,
        state: RunState::Judging.as_str().to_string(),
    }))
}

fn choose_input(problem: &Problem, is_submission: bool, test_input: Option<String>) -> (String, Option<String>) {
    if is_submission {
        (problem.secret_input.clone(), Some(problem.secret_output.clone()))
    } else if let Some(test_input) = test_input {
        (test_input, Some(problem.sample_output.clone()))
    } else {
        (problem.sample_input.clone(), Some(problem.sample_output.clone()))
    }
}

async fn persist_terminal_run(
    st: &AppState,
    user: &codecourt_schemas::User,
    contest: &codecourt_schemas::Contest,
    problem: &Problem,
    body: &SubmitRunRequest,
    now: chrono::DateTime<Utc>,
    terminal: RunState,
) -> Result<(), ApiError> {
    let (run_input, correct_output) = choose_input(problem, body.is_submission, body.test_input.clone());
    let run_id = codecourt_db::insert_run(
        &st.pool,
        &codecourt_db::NewRun {
            user_id: user.id,
            contest_id: contest.id,
            language_id: body.language_id,
            problem_id: problem.id,
            submit_time: now,
            local_submit_time: None,
            source_code: body.source_code.clone(),
            run_input,
            correct_output,
            is_submission: body.is_submission,
            is_priority: false,
            state: terminal,
        },
    )
    .await?;
    codecourt_db::mark_run_finished(&st.pool, run_id, "", None, terminal, now).await?;
    Ok(())
}

async fn fetch_config(st: &AppState) -> Result<codecourt_config::ConfigAccessor, ApiError> {
    let rows = codecourt_db::fetch_all_configuration(&st.pool).await?;
    Ok(codecourt_config::ConfigAccessor::from_rows(rows))
}

// ---------------------------------------------------------------------------
// POST /api/make-defendant-user
// ---------------------------------------------------------------------------

async fn make_defendant_user(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<MakeDefendantUserRequest>,
) -> Result<Json<MakeDefendantUserResponse>, ApiError> {
    let caller = auth::authenticate_token(&st, &headers).await?;
    if !(caller.has_role(Role::Operator) || caller.has_role(Role::Judge)) {
        return Err(ApiError::Forbidden(
            "requires the operator or judge role".to_string(),
        ));
    }

    let contest = codecourt_db::fetch_contest_by_name(&st.pool, &body.contest_name)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("contest {} not found", body.contest_name)))?;

    let hashed = codecourt_db::hash_password(&body.password, codecourt_db::bcrypt_cost(false))?;
    let user_id = codecourt_db::insert_user(
        &st.pool,
        &body.username,
        &body.name,
        &hashed,
        body.misc_data.clone(),
        &[Role::Defendant],
    )
    .await
    .map_err(map_insert_user_err)?;

    codecourt_db::enroll_user_in_contest(&st.pool, contest.id, user_id).await?;

    Ok(Json(MakeDefendantUserResponse { user_id }))
}

fn map_insert_user_err(err: anyhow::Error) -> ApiError {
    match err.downcast_ref::<sqlx::Error>() {
        Some(db_err) if codecourt_db::is_unique_violation(db_err) => {
            ApiError::Conflict("username already exists".to_string())
        }
        _ => ApiError::Internal(err),
    }
}

// ---------------------------------------------------------------------------
// GET /api/get-writ (executor-facing)
// ---------------------------------------------------------------------------

async fn get_writ(State(st): State<Arc<AppState>>, headers: HeaderMap) -> Result<Json<Writ>, ApiError> {
    auth::authenticate_with_role(&st.pool, &headers, Role::Executioner).await?;

    let now = Utc::now();
    let claimed = codecourt_db::claim_next_writ(&st.pool, now).await?;
    let Some(run) = claimed else {
        return Ok(Json(Writ::Unavailable));
    };

    let language = codecourt_db::fetch_language(&st.pool, run.language_id)
        .await?
        .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("run {} references missing language", run.id)))?;

    Ok(Json(Writ::Found {
        run_id: run.id,
        source_code: run.source_code,
        language: language.name,
        run_script: language.run_script,
        input: run.run_input,
        return_url: format!("/api/submit-writ/{}", run.id),
    }))
}

// ---------------------------------------------------------------------------
// POST /api/return-without-run/:run_id
// ---------------------------------------------------------------------------

async fn return_without_run(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(run_id): Path<Id>,
) -> Result<Json<OkResponse>, ApiError> {
    auth::authenticate_with_role(&st.pool, &headers, Role::Executioner).await?;

    let run = codecourt_db::fetch_run(&st.pool, run_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("run {run_id} not found")))?;
    if run.is_judged() {
        return Err(ApiError::BadRequest(format!("run {run_id} is already finished")));
    }

    codecourt_db::return_run_without_run(&st.pool, run_id).await?;
    Ok(Json(OkResponse { ok: true }))
}

// ---------------------------------------------------------------------------
// POST /api/submit-writ/:run_id
// ---------------------------------------------------------------------------

async fn submit_writ(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(run_id): Path<Id>,
    Json(body): Json<SubmitWritBody>,
) -> Result<Json<OkResponse>, ApiError> {
    auth::authenticate_with_role(&st.pool, &headers, Role::Executioner).await?;

    let run = codecourt_db::fetch_run(&st.pool, run_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("run {run_id} not found")))?;
    if run.is_judged() {
        return Err(ApiError::BadRequest(format!("run {run_id} is already finished")));
    }

    let advisory = body.state.as_deref().and_then(RunState::parse).filter(RunState::is_sandbox_terminal);
    let base_state = advisory.unwrap_or(RunState::Executed);

    let (is_passed, final_state) = if run.is_submission {
        match base_state {
            RunState::Executed => {
                let config = fetch_config(&st).await?;
                let strict = config.get_bool("strict_whitespace_diffing", false)?;
                let policy = codecourt_comparator::Policy::from_strict_flag(strict);
                let expected = run.correct_output.as_deref().unwrap_or("");
                let passed = codecourt_comparator::compare(&body.output, expected, policy);
                let state = if passed { RunState::Successful } else { RunState::Failed };
                (Some(passed), state)
            }
            other => (Some(false), other),
        }
    } else {
        (None, base_state)
    };

    codecourt_db::mark_run_finished(&st.pool, run_id, &body.output, is_passed, final_state, Utc::now()).await?;
    Ok(Json(OkResponse { ok: true }))
}
