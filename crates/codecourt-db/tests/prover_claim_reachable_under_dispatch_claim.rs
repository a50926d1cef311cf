//! Compile-only prover: `claim_next_writ` and `reap_expired_leases` are
//! reachable when `dispatch-claim` is enabled, and are not reachable
//! otherwise (the two-caller invariant described in this crate's
//! Cargo.toml). Run:
//!   cargo test -p codecourt-db --features dispatch-claim --test prover_claim_reachable_under_dispatch_claim

#![allow(dead_code)]

async fn _type_checks_only(
    pool: &sqlx::PgPool,
    now: chrono::DateTime<chrono::Utc>,
    timeout: chrono::Duration,
) -> anyhow::Result<()> {
    let _ = codecourt_db::claim_next_writ(pool, now).await?;
    let _ = codecourt_db::reap_expired_leases(pool, now, timeout).await?;
    Ok(())
}

#[test]
fn compiles() {
    // The real assertion is that this file compiles at all under
    // `--features dispatch-claim`.
}
