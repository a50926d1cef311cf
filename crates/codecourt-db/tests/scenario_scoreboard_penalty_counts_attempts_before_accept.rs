//! S-scenario: a contestant who fails a problem twice before solving it
//! carries that penalty; a contestant who never solves a problem doesn't,
//! no matter how many times they tried.

use chrono::{TimeZone, Utc};
use codecourt_db::compute_scoreboard;
use codecourt_schemas::{Id, Run, RunState};
use std::collections::BTreeMap;

fn slugs(pairs: &[(Id, &str)]) -> BTreeMap<Id, String> {
    pairs.iter().map(|(id, slug)| (*id, slug.to_string())).collect()
}

fn judged(id: i64, user_id: i64, problem_id: i64, minute: i64, is_passed: bool) -> Run {
    Run {
        id,
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
        is_passed: Some(is_passed),
        is_priority: false,
        state: if is_passed {
            RunState::Successful
        } else {
            RunState::Failed
        },
    }
}

#[test]
fn attempts_after_solving_never_add_penalty() {
    // user 1 solves problem 10 on their third try, then resubmits again anyway.
    let runs = vec![
        judged(1, 1, 10, 0, false),
        judged(2, 1, 10, 1, false),
        judged(3, 1, 10, 2, true),
        judged(4, 1, 10, 3, false),
    ];
    let board = compute_scoreboard(&runs, &slugs(&[(10, "p10")]));
    assert_eq!(board.len(), 1);
    assert_eq!(board[0].num_solved, 1);
    assert_eq!(board[0].penalty, 2);
    assert_eq!(board[0].problem_states.get("p10"), Some(&true));
}

#[test]
fn unsolved_problem_never_penalises() {
    // user 2 fails problem 20 five times and never solves it.
    let runs: Vec<Run> = (0..5).map(|m| judged(m + 1, 2, 20, m, false)).collect();
    let board = compute_scoreboard(&runs, &slugs(&[(20, "p20")]));
    assert_eq!(board[0].num_solved, 0);
    assert_eq!(board[0].penalty, 0);
    assert_eq!(board[0].problem_states.get("p20"), Some(&false));
}

#[test]
fn more_solves_outranks_lower_penalty() {
    let runs = vec![
        judged(1, 1, 10, 0, false),
        judged(2, 1, 10, 1, true), // user 1: 1 solved, penalty 1
        judged(3, 2, 10, 0, true),
        judged(4, 2, 20, 0, true), // user 2: 2 solved, penalty 0
    ];
    let board = compute_scoreboard(&runs, &slugs(&[(10, "p10"), (20, "p20")]));
    assert_eq!(board[0].user_id, 2);
    assert_eq!(board[1].user_id, 1);
}
