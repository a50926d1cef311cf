//! The Writ Queue's lease protocol and the Lease Reaper's bulk
//! clear. Both mutate a Run's lease fields and both are restricted
//! to the `dispatch-claim` feature (see this crate's Cargo.toml).

#![cfg(feature = "dispatch-claim")]

use crate::{RunRow, RUN_COLUMNS};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use codecourt_schemas::{Id, Run};
use sqlx::PgPool;

/// Lease the next unleased, unfinished Run, in dispatch order:
/// priority runs first, then smallest `submit_time`, tied by smallest
/// `id`. A writ's `run_script` is self-contained (its own shebang), so
/// any executor can claim any language's writ — there is no per-language
/// partitioning of the queue. Mirrors the outbox pattern: a `FOR UPDATE
/// SKIP LOCKED` CTE selects the candidate so concurrent pollers never
/// block on each other, then a conditional `UPDATE ... WHERE
/// started_execing_time IS NULL` claims it — the `IS NULL` guard is what
/// makes the claim atomic even though SKIP LOCKED already rules out the
/// race in practice.
pub async fn claim_next_writ(pool: &PgPool, now: DateTime<Utc>) -> Result<Option<Run>> {
    let row: Option<RunRow> = sqlx::query_as(&format!(
        r#"with to_claim as (
               select id from runs
               where started_execing_time is null
                 and finished_execing_time is null
               order by is_priority desc, submit_time asc, id asc
               limit 1
               for update skip locked
           )
           update runs
           set started_execing_time = $1
           where id in (select id from to_claim) and started_execing_time is null
           returning {RUN_COLUMNS}"#
    ))
    .bind(now)
    .fetch_optional(pool)
    .await
    .context("claim_next_writ failed")?;

    row.map(RunRow::into_domain).transpose()
}

/// Clear leases whose `started_execing_time` is older than `timeout` and
/// whose `finished_execing_time` is still null — an executor that took a
/// Run and never reported back releases it for redispatch.
/// Returns the ids of the runs it cleared.
pub async fn reap_expired_leases(
    pool: &PgPool,
    now: DateTime<Utc>,
    timeout: chrono::Duration,
) -> Result<Vec<Id>> {
    let cutoff = now - timeout;
    let rows: Vec<(Id,)> = sqlx::query_as(
        r#"update runs
           set started_execing_time = null
           where started_execing_time is not null
             and started_execing_time < $1
             and finished_execing_time is null
           returning id"#,
    )
    .bind(cutoff)
    .fetch_all(pool)
    .await
    .context("reap_expired_leases failed")?;

    Ok(rows.into_iter().map(|(id,)| id).collect())
}
