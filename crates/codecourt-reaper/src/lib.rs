//! Lease Reaper: periodically clears Runs whose executor took a
//! lease and never reported back. Grounded on the same
//! injectable-clock discipline the Writ Queue's freshness checks use —
//! `C: Fn() -> DateTime<Utc>` so tests can drive time deterministically
//! instead of sleeping on the wall clock.

use chrono::{DateTime, Duration, Utc};
use codecourt_schemas::Id;
use sqlx::PgPool;
use std::time::Duration as StdDuration;

/// A Run is reapable once its lease has been held this long with no
/// `finished_execing_time` recorded.
pub const DEFAULT_LEASE_TIMEOUT_MINS: i64 = 5;

/// How often the reaper sweeps for overdue leases.
pub const DEFAULT_POLL_INTERVAL: StdDuration = StdDuration::from_secs(30);

pub fn system_clock() -> DateTime<Utc> {
    Utc::now()
}

pub struct Reaper<C: Fn() -> DateTime<Utc>> {
    pool: PgPool,
    lease_timeout: Duration,
    poll_interval: StdDuration,
    clock: C,
}

impl<C: Fn() -> DateTime<Utc>> Reaper<C> {
    pub fn new(pool: PgPool, lease_timeout: Duration, poll_interval: StdDuration, clock: C) -> Self {
        Self {
            pool,
            lease_timeout,
            poll_interval,
            clock,
        }
    }

    /// One sweep: clear every overdue lease, returning the ids cleared.
    pub async fn reap_once(&self) -> anyhow::Result<Vec<Id>> {
        let now = (self.clock)();
        codecourt_db::reap_expired_leases(&self.pool, now, self.lease_timeout).await
    }

    /// Sweep forever at `poll_interval`, logging but not stopping on
    /// individual sweep failures — a transient DB error shouldn't kill
    /// the reaper, the next sweep will retry.
    pub async fn run_forever(&self) -> ! {
        loop {
            match self.reap_once().await {
                Ok(cleared) if !cleared.is_empty() => {
                    tracing::info!(count = cleared.len(), "reaped overdue leases");
                }
                Ok(_) => {}
                Err(err) => {
                    tracing::error!(error = %err, "lease reap sweep failed");
                }
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
