//! Shared entity and value types for the judging pipeline.
//!
//! Every crate in this workspace that touches a `Run`, a `User`, or a
//! `Configuration` row agrees on the shapes here rather than redefining
//! them. Entities are keyed by integer ids and reference each other by id,
//! not by owning pointer, so the object graph stays a plain DAG of lookups
//! instead of a cycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type Id = i64;

/// One of the five roles a `User` may hold. Authorisation is a predicate
/// over the set a user carries, never a type hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Defendant,
    Operator,
    Judge,
    Executioner,
    Observer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Defendant => "defendant",
            Role::Operator => "operator",
            Role::Judge => "judge",
            Role::Executioner => "executioner",
            Role::Observer => "observer",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "defendant" => Some(Role::Defendant),
            "operator" => Some(Role::Operator),
            "judge" => Some(Role::Judge),
            "executioner" => Some(Role::Executioner),
            "observer" => Some(Role::Observer),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Language {
    pub id: Id,
    pub name: String,
    pub is_enabled: bool,
    /// Shell program containing `$input_file`, `$program_file`, `$scratch_dir`.
    pub run_script: String,
    pub syntax_mode: Option<String>,
    pub default_template: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProblemType {
    pub id: Id,
    pub name: String,
    /// Reserved for future problem types; the core comparator never invokes this.
    pub eval_script: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Problem {
    pub id: Id,
    pub problem_type_id: Id,
    pub slug: String,
    pub name: String,
    pub problem_statement: String,
    pub sample_input: String,
    pub sample_output: String,
    pub secret_input: String,
    pub secret_output: String,
    pub is_enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Id,
    pub username: String,
    pub name: String,
    #[serde(skip_serializing)]
    pub hashed_password: String,
    pub creation_time: DateTime<Utc>,
    /// Opaque JSON bag; holds email and any `extra_signup_fields`.
    pub misc_data: serde_json::Value,
    pub roles: Vec<Role>,
}

impl User {
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contest {
    pub id: Id,
    pub name: String,
    pub activate_time: Option<DateTime<Utc>>,
    pub start_time: DateTime<Utc>,
    pub freeze_time: Option<DateTime<Utc>>,
    pub end_time: DateTime<Utc>,
    pub deactivate_time: Option<DateTime<Utc>>,
    pub is_public: bool,
}

/// `Run.state`. `Executed` is a terminal-from-the-sandbox's-point-of-view
/// state: the comparator still needs to run on it if it is a submission
/// before it becomes `Successful`/`Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunState {
    Judging,
    Executed,
    Successful,
    Failed,
    ContestHasNotBegun,
    ContestEnded,
    TimedOut,
    OutputLimitExceeded,
    NoOutput,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Judging => "JUDGING",
            RunState::Executed => "EXECUTED",
            RunState::Successful => "SUCCESSFUL",
            RunState::Failed => "FAILED",
            RunState::ContestHasNotBegun => "CONTEST_HAS_NOT_BEGUN",
            RunState::ContestEnded => "CONTEST_ENDED",
            RunState::TimedOut => "TIMED_OUT",
            RunState::OutputLimitExceeded => "OUTPUT_LIMIT_EXCEEDED",
            RunState::NoOutput => "NO_OUTPUT",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "JUDGING" => RunState::Judging,
            "EXECUTED" => RunState::Executed,
            "SUCCESSFUL" => RunState::Successful,
            "FAILED" => RunState::Failed,
            "CONTEST_HAS_NOT_BEGUN" => RunState::ContestHasNotBegun,
            "CONTEST_ENDED" => RunState::ContestEnded,
            "TIMED_OUT" => RunState::TimedOut,
            "OUTPUT_LIMIT_EXCEEDED" => RunState::OutputLimitExceeded,
            "NO_OUTPUT" => RunState::NoOutput,
            _ => return None,
        })
    }

    /// States the sandbox may hand back directly as an advisory `state`
    /// override on submit. The server still computes `is_passed`.
    pub fn is_sandbox_terminal(&self) -> bool {
        matches!(
            self,
            RunState::Executed
                | RunState::TimedOut
                | RunState::OutputLimitExceeded
                | RunState::NoOutput
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
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
    pub state: RunState,
}

impl Run {
    pub fn is_judging(&self) -> bool {
        self.started_execing_time.is_some() && self.finished_execing_time.is_none()
    }

    pub fn is_judged(&self) -> bool {
        self.finished_execing_time.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValType {
    Integer,
    Bool,
    String,
    Json,
}

impl ValType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValType::Integer => "integer",
            ValType::Bool => "bool",
            ValType::String => "string",
            ValType::Json => "json",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "integer" => ValType::Integer,
            "bool" => ValType::Bool,
            "string" => ValType::String,
            "json" => ValType::Json,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Configuration {
    pub key: String,
    pub val: String,
    pub val_type: ValType,
    pub category: String,
}

/// Server → executor, returned from `get-writ`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Writ {
    Found {
        run_id: Id,
        source_code: String,
        language: String,
        run_script: String,
        input: String,
        return_url: String,
    },
    Unavailable,
}

/// Executor → server, posted to `submit-writ/{run_id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitWritBody {
    pub output: String,
    /// Advisory only; the server always recomputes `is_passed` itself.
    pub state: Option<String>,
}
