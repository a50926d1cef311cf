//! Scoreboard Aggregator: read path plus the pure aggregation rule.
//! Kept separate from the query so the rule itself ("penalty counts
//! failed attempts before a user's first accept on a problem, and only on
//! problems the user eventually solved") is unit-testable without a
//! database.

use crate::{RunRow, RUN_COLUMNS};
use anyhow::{Context, Result};
use codecourt_schemas::{Id, Run};
use sqlx::PgPool;
use std::collections::BTreeMap;

/// All judged (`finished_execing_time is not null`) submissions (`is_submission`)
/// in a contest, oldest first — the order `compute_scoreboard` requires to
/// find each user's first accept per problem.
pub async fn fetch_judged_submissions_for_contest(pool: &PgPool, contest_id: Id) -> Result<Vec<Run>> {
    let rows: Vec<RunRow> = sqlx::query_as(&format!(
        "select {RUN_COLUMNS} from runs
         where contest_id = $1 and is_submission and finished_execing_time is not null
         order by submit_time asc, id asc"
    ))
    .bind(contest_id)
    .fetch_all(pool)
    .await
    .context("fetch_judged_submissions_for_contest failed")?;

    rows.into_iter().map(RunRow::into_domain).collect()
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ScoreboardEntry {
    pub user_id: Id,
    pub num_solved: i64,
    pub penalty: i64,
    /// Keyed by problem slug, `true` once the user has an accepted
    /// submission on that problem. Every contest problem gets an entry,
    /// defaulting `false` for problems the user never solved.
    pub problem_states: BTreeMap<String, bool>,
}

/// `runs` must be sorted oldest-first (as `fetch_judged_submissions_for_contest`
/// returns them). `problem_slugs` maps every problem in the contest to its
/// slug, so `problem_states` can report `false` for problems a user never
/// attempted. Only problems a user eventually solved contribute penalty;
/// failed attempts on problems never solved are free. Sorted by
/// `(num_solved desc, penalty asc, user_id asc)`.
pub fn compute_scoreboard(runs: &[Run], problem_slugs: &BTreeMap<Id, String>) -> Vec<ScoreboardEntry> {
    // user_id -> problem_id -> (solved, failed_attempts_before_first_accept)
    let mut per_user: BTreeMap<Id, BTreeMap<Id, (bool, i64)>> = BTreeMap::new();

    for run in runs {
        let problems = per_user.entry(run.user_id).or_default();
        let entry = problems.entry(run.problem_id).or_insert((false, 0));
        if entry.0 {
            // Already solved; later attempts on the same problem don't count.
            continue;
        }
        if run.is_passed == Some(true) {
            entry.0 = true;
        } else {
            entry.1 += 1;
        }
    }

    let mut entries: Vec<ScoreboardEntry> = per_user
        .into_iter()
        .map(|(user_id, problems)| {
            let mut num_solved = 0;
            let mut penalty = 0;
            let mut problem_states: BTreeMap<String, bool> =
                problem_slugs.values().map(|slug| (slug.clone(), false)).collect();

            for (problem_id, (solved, failed_before)) in &problems {
                if *solved {
                    num_solved += 1;
                    penalty += failed_before;
                }
                if let Some(slug) = problem_slugs.get(problem_id) {
                    problem_states.insert(slug.clone(), *solved);
                }
            }

            ScoreboardEntry {
                user_id,
                num_solved,
                penalty,
                problem_states,
            }
        })
        .collect();

    entries.sort_by(|a, b| {
        b.num_solved
            .cmp(&a.num_solved)
            .then(a.penalty.cmp(&b.penalty))
            .then(a.user_id.cmp(&b.user_id))
    });
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use codecourt_schemas::RunState;

    fn run(user_id: Id, problem_id: Id, minute: i64, is_passed: Option<bool>) -> Run {
        Run {
            id: minute,
            user_id,
            contest_id: 1,
            language_id: 1,
            problem_id,
            submit_time: Utc.timestamp_opt(1_700_000_000 + minute * 60, 0).unwrap(),
            local_submit_time: None,
            started_execing_time: Some(Utc.timestamp_opt(1_700_000_000, 0).unwrap()),
            finished_execing_time: Some(Utc.timestamp_opt(1_700_000_000, 0).unwrap()),
            source_code: String::new(),
            run_input: String::new(),
            correct_output: None,
            run_output: None,
            is_submission: true,
            is_passed,
            is_priority: false,
            state: if is_passed == Some(true) {
                RunState::Successful
            } else {
                RunState::Failed
            },
        }
    }

    fn slugs(pairs: &[(Id, &str)]) -> BTreeMap<Id, String> {
        pairs.iter().map(|(id, slug)| (*id, slug.to_string())).collect()
    }

    #[test]
    fn unsolved_problem_contributes_nothing() {
        let runs = vec![run(1, 10, 0, Some(false)), run(1, 10, 1, Some(false))];
        let board = compute_scoreboard(&runs, &slugs(&[(10, "p10")]));
        assert_eq!(board[0].num_solved, 0);
        assert_eq!(board[0].penalty, 0);
        assert_eq!(board[0].problem_states.get("p10"), Some(&false));
    }

    #[test]
    fn penalty_counts_only_attempts_before_first_accept() {
        let runs = vec![
            run(1, 10, 0, Some(false)),
            run(1, 10, 1, Some(false)),
            run(1, 10, 2, Some(true)),
            run(1, 10, 3, Some(false)), // after accept, doesn't count
        ];
        let board = compute_scoreboard(&runs, &slugs(&[(10, "p10")]));
        assert_eq!(board[0].num_solved, 1);
        assert_eq!(board[0].penalty, 2);
        assert_eq!(board[0].problem_states.get("p10"), Some(&true));
    }

    #[test]
    fn ranking_prefers_more_solved_then_lower_penalty() {
        let runs = vec![
            run(1, 10, 0, Some(true)), // user 1: 1 solved, 0 penalty
            run(2, 10, 0, Some(false)),
            run(2, 10, 1, Some(true)), // user 2: 1 solved, 1 penalty
            run(3, 10, 0, Some(true)),
            run(3, 20, 0, Some(true)), // user 3: 2 solved, 0 penalty
        ];
        let board = compute_scoreboard(&runs, &slugs(&[(10, "p10"), (20, "p20")]));
        assert_eq!(board[0].user_id, 3);
        assert_eq!(board[1].user_id, 1);
        assert_eq!(board[2].user_id, 2);
    }

    #[test]
    fn problem_never_attempted_by_a_user_still_appears_as_false() {
        let runs = vec![run(1, 10, 0, Some(true))];
        let board = compute_scoreboard(&runs, &slugs(&[(10, "p10"), (20, "p20")]));
        assert_eq!(board[0].problem_states.get("p10"), Some(&true));
        assert_eq!(board[0].problem_states.get("p20"), Some(&false));
    }
}
