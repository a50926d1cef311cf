//! Request and response DTOs for every codecourt-daemon HTTP endpoint
//! No business logic lives here; handlers in `routes.rs` build
//! these from `codecourt-schemas` entities.

use chrono::{DateTime, Utc};
use codecourt_schemas::{Id, Role};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
}

/// Caller's own public profile. Never carries `hashed_password`.
#[derive(Debug, Clone, Serialize)]
pub struct CurrentUserResponse {
    pub id: Id,
    pub username: String,
    pub name: String,
    pub roles: Vec<Role>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub id: Id,
    pub is_submission: bool,
    pub is_passed: Option<bool>,
    pub state: String,
    pub submit_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProblemSummary {
    pub slug: String,
    pub name: String,
    pub problem_statement: String,
    pub sample_input: String,
    pub sample_output: String,
    pub is_enabled: bool,
    pub runs: Vec<RunSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContestInfoResponse {
    pub id: Id,
    pub name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub freeze_time: Option<DateTime<Utc>>,
    pub is_public: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitRunRequest {
    pub problem_slug: String,
    pub language_id: Id,
    pub source_code: String,
    pub is_submission: bool,
    /// Ignored when `is_submission` is true — submissions always run
    /// against the secret input.
    pub test_input: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmitRunResponse {
    pub run_id: Id,
    pub state: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MakeDefendantUserRequest {
    pub username: String,
    pub password: String,
    pub name: String,
    pub contest_name: String,
    #[serde(default)]
    pub misc_data: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct MakeDefendantUserResponse {
    pub user_id: Id,
}

#[derive(Debug, Clone, Serialize)]
pub struct OkResponse {
    pub ok: bool,
}
