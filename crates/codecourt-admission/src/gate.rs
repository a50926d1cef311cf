//! Admission gate — the SINGLE choke-point a submission or run request
//! must clear before a `Run` row is created.
//!
//! # Invariant
//!
//! `enforce_gates` evaluates four verdicts in a fixed order and refuses
//! with the first `AdmissionRefusal` encountered:
//!
//! 1. `has_defendant_role` — caller is allowed to submit at all
//! 2. `under_rate_limit`   — caller is below the configured submission cap
//! 3. `contest_not_ended`  — contest's `end_time` has not passed
//! 4. `contest_started`    — contest's `start_time` has passed
//!
//! Callers build `AdmissionVerdicts` from already-fetched state (the
//! caller's roles, the contest row, a submission count query) and pass it
//! here. This crate never touches a database.

use chrono::{DateTime, Utc};
use codecourt_schemas::{Contest, Role, User};

/// Pre-evaluated gate verdicts the caller must supply before admitting a run.
#[derive(Debug, Clone, Copy)]
pub struct AdmissionVerdicts {
    pub has_defendant_role: bool,
    pub contest_started: bool,
    pub contest_not_ended: bool,
    pub under_rate_limit: bool,
}

impl AdmissionVerdicts {
    /// Derive verdicts from the caller, the contest window, and a recent
    /// submission count. `recent_submissions` and `max_submissions` share
    /// whatever window the caller queried the count over.
    pub fn evaluate(
        user: &User,
        contest: &Contest,
        now: DateTime<Utc>,
        recent_submissions: i64,
        max_submissions: i64,
    ) -> Self {
        Self {
            has_defendant_role: user.has_role(Role::Defendant),
            contest_started: now >= contest.start_time,
            contest_not_ended: now < contest.end_time,
            under_rate_limit: max_submissions <= 0 || recent_submissions < max_submissions,
        }
    }

    /// All gates clear — convenience helper for tests and seed scripts.
    pub fn all_clear() -> Self {
        Self {
            has_defendant_role: true,
            contest_started: true,
            contest_not_ended: true,
            under_rate_limit: true,
        }
    }

    /// Evaluate all four gates in order. Returns the first refusal
    /// encountered, or `Ok(())` if all pass.
    pub fn enforce(&self) -> Result<(), AdmissionRefusal> {
        if !self.has_defendant_role {
            return Err(AdmissionRefusal::NotADefendant);
        }
        if !self.under_rate_limit {
            return Err(AdmissionRefusal::RateLimited);
        }
        if !self.contest_not_ended {
            return Err(AdmissionRefusal::ContestEnded);
        }
        if !self.contest_started {
            return Err(AdmissionRefusal::ContestHasNotBegun);
        }
        Ok(())
    }
}

/// The reason a submission was refused at the admission gate. Three of
/// these map directly onto a `RunState` when the caller records the
/// refusal as a terminal Run rather than silently dropping it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionRefusal {
    NotADefendant,
    ContestHasNotBegun,
    ContestEnded,
    RateLimited,
}

impl std::fmt::Display for AdmissionRefusal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdmissionRefusal::NotADefendant => write!(f, "caller does not hold the defendant role"),
            AdmissionRefusal::ContestHasNotBegun => write!(f, "contest has not begun"),
            AdmissionRefusal::ContestEnded => write!(f, "contest has ended"),
            AdmissionRefusal::RateLimited => write!(f, "submission rate limit exceeded"),
        }
    }
}

impl std::error::Error for AdmissionRefusal {}
