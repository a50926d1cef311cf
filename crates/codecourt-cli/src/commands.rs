//! Subcommand implementations for codecourt-cli.

use anyhow::{Context, Result};
use base64::Engine;
use chrono::Utc;
use codecourt_schemas::{Contest, Language, Problem, Role, SubmitWritBody, Writ};
use std::time::Duration;

pub async fn migrate() -> Result<()> {
    let pool = codecourt_db::connect_from_env().await?;
    codecourt_db::migrate(&pool).await?;
    println!("migrations applied");
    Ok(())
}

/// Minimal fixture a fresh deployment needs to accept its first submission:
/// one enabled language, one input-output problem, one contest running now,
/// one defendant enrolled in it.
pub async fn seed() -> Result<()> {
    let pool = codecourt_db::connect_from_env().await?;
    codecourt_db::migrate(&pool).await?;

    let language_id = codecourt_db::insert_language(
        &pool,
        &Language {
            id: 0,
            name: "python3".to_string(),
            is_enabled: true,
            run_script: "#!/bin/bash\npython3 $program_file < $input_file\n".to_string(),
            syntax_mode: Some("python".to_string()),
            default_template: None,
        },
    )
    .await
    .context("seed language")?;

    let problem_type_id = codecourt_db::insert_problem_type(&pool, "input-output", "")
        .await
        .context("seed problem type")?;

    let problem_id = codecourt_db::insert_problem(
        &pool,
        &Problem {
            id: 0,
            problem_type_id,
            slug: "fizzbuzz".to_string(),
            name: "FizzBuzz".to_string(),
            problem_statement: "Print FizzBuzz for the given n.".to_string(),
            sample_input: "15\n".to_string(),
            sample_output: "FizzBuzz\n".to_string(),
            secret_input: "15\n".to_string(),
            secret_output: "FizzBuzz\n".to_string(),
            is_enabled: true,
        },
    )
    .await
    .context("seed problem")?;

    let now = Utc::now();
    let contest_id = codecourt_db::insert_contest(
        &pool,
        &Contest {
            id: 0,
            name: "practice".to_string(),
            activate_time: None,
            start_time: now - chrono::Duration::hours(1),
            freeze_time: None,
            end_time: now + chrono::Duration::hours(23),
            deactivate_time: None,
            is_public: true,
        },
    )
    .await
    .context("seed contest")?;
    codecourt_db::link_contest_problem(&pool, contest_id, problem_id)
        .await
        .context("seed link problem")?;

    let hashed = codecourt_db::hash_password("defendant", codecourt_db::bcrypt_cost(false))?;
    let defendant_id = codecourt_db::insert_user(
        &pool,
        "defendant",
        "Sample Defendant",
        &hashed,
        serde_json::json!({}),
        &[Role::Defendant],
    )
    .await
    .context("seed defendant")?;
    codecourt_db::enroll_user_in_contest(&pool, contest_id, defendant_id).await?;

    let exec_hashed = codecourt_db::hash_password("executioner", codecourt_db::bcrypt_cost(false))?;
    codecourt_db::insert_user(
        &pool,
        "executioner",
        "Sample Executioner",
        &exec_hashed,
        serde_json::json!({}),
        &[Role::Executioner],
    )
    .await
    .context("seed executioner")?;

    println!("seeded contest_id={contest_id} problem_id={problem_id} language_id={language_id}");
    println!("login as defendant/defendant, executor as executioner/executioner");
    Ok(())
}

pub async fn rejudge(run_id: i64) -> Result<()> {
    let pool = codecourt_db::connect_from_env().await?;
    let run = codecourt_db::fetch_run(&pool, run_id)
        .await?
        .with_context(|| format!("run {run_id} not found"))?;

    let requeued = codecourt_db::rejudge_run(&pool, run_id, &run.run_input, run.correct_output.as_deref()).await?;
    if requeued {
        println!("run {run_id} requeued for judging");
    } else {
        anyhow::bail!("run {run_id} could not be requeued");
    }
    Ok(())
}

pub async fn reap_once() -> Result<()> {
    let pool = codecourt_db::connect_from_env().await?;
    let reaper = codecourt_reaper::Reaper::new(
        pool,
        chrono::Duration::minutes(codecourt_reaper::DEFAULT_LEASE_TIMEOUT_MINS),
        codecourt_reaper::DEFAULT_POLL_INTERVAL,
        codecourt_reaper::system_clock,
    );
    let cleared = reaper.reap_once().await?;
    println!("cleared {} overdue lease(s): {:?}", cleared.len(), cleared);
    Ok(())
}

/// Stand-in for the executor fleet: poll `get-writ`, run whatever comes
/// back through the sandbox, post the result to `return_url`. Speaks HTTP
/// Basic as an Executioner, matching the daemon's auth.rs expectations.
pub async fn execute(daemon_url: String, username: String, password: String, idle_poll_secs: u64) -> Result<()> {
    let client = reqwest::Client::new();
    let sandbox_config = codecourt_sandbox::SandboxConfig {
        insecure_host_exec: codecourt_config::env::insecure_host_exec(),
        ..Default::default()
    };
    if sandbox_config.insecure_host_exec {
        tracing::warn!("running writs as a plain host subprocess, no container isolation");
    }
    let sandbox = codecourt_sandbox::Sandbox::connect_local(sandbox_config)?;
    let auth_header = basic_auth_header(&username, &password);

    tracing::info!(daemon_url, "executor starting");
    loop {
        match poll_and_run(&client, &daemon_url, &auth_header, &sandbox).await {
            Ok(true) => {}
            Ok(false) => tokio::time::sleep(Duration::from_secs(idle_poll_secs)).await,
            Err(err) => {
                tracing::error!(error = %err, "poll cycle failed");
                tokio::time::sleep(Duration::from_secs(idle_poll_secs)).await;
            }
        }
    }
}

/// One get-writ/run/submit-writ cycle. Returns `true` if a writ was found
/// (so the caller should poll again immediately instead of sleeping).
async fn poll_and_run(
    client: &reqwest::Client,
    daemon_url: &str,
    auth_header: &str,
    sandbox: &codecourt_sandbox::Sandbox,
) -> Result<bool> {
    let writ: Writ = client
        .get(format!("{daemon_url}/api/get-writ"))
        .header(reqwest::header::AUTHORIZATION, auth_header)
        .send()
        .await
        .context("get-writ request failed")?
        .error_for_status()
        .context("get-writ returned an error status")?
        .json()
        .await
        .context("get-writ response was not valid Writ JSON")?;

    let Writ::Found {
        run_id,
        source_code,
        run_script,
        input,
        return_url,
        ..
    } = writ
    else {
        return Ok(false);
    };

    tracing::info!(run_id, "claimed writ");
    let outcome = sandbox.execute(&run_script, &input, &source_code).await?;

    let body = SubmitWritBody {
        output: outcome.output,
        state: Some(outcome.state.as_str().to_string()),
    };

    client
        .post(format!("{daemon_url}{return_url}"))
        .header(reqwest::header::AUTHORIZATION, auth_header)
        .json(&body)
        .send()
        .await
        .context("submit-writ request failed")?
        .error_for_status()
        .context("submit-writ returned an error status")?;

    Ok(true)
}

fn basic_auth_header(username: &str, password: &str) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(format!("{username}:{password}"));
    format!("Basic {encoded}")
}
