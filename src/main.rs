//! Tourplan - monthly touring-plan workflow service
//!
//! CLI entry point for the server and operator commands.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use eyre::{Context, Result};
use tracing::info;

use tourplan::cli::{Cli, Command};
use tourplan::config::Config;
use tourplan::domain::{SessionKey, TargetSubmission, WeeklyTargetSet};
use tourplan::store::{SessionManager, SessionStore, TargetManager};
use tourplan::workflow::WorkflowEngine;
use tourplan::{assistant, server};

fn setup_logging(verbose: bool) -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tourplan")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Write to log file, not stdout/stderr
    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };
    let log_file = fs::File::create(log_dir.join("tourplan.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (verbose: {})", verbose);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    match cli.command {
        Command::Serve => cmd_serve(&config).await,
        Command::SubmitTargets {
            week,
            year,
            file,
            created_by,
        } => cmd_submit_targets(&config, week, year, &file, &created_by).await,
        Command::ShowSession {
            employee_id,
            month,
            year,
            json,
        } => cmd_show_session(&config, &employee_id, month, year, json).await,
    }
}

/// Start the HTTP server
async fn cmd_serve(config: &Config) -> Result<()> {
    config.validate()?;

    let client = assistant::create_client(&config.assistant)?;
    let sessions = SessionManager::spawn(&config.storage.db_path)?;
    let targets = TargetManager::spawn(&config.storage.db_path)?;
    let engine = Arc::new(WorkflowEngine::new(client, Arc::new(sessions)));

    info!(
        "Tourplan serving on {}:{} (assistant: {})",
        config.server.bind, config.server.port, config.assistant.provider
    );
    server::serve(config, engine, targets).await
}

/// Load a targets file and write one week of rows per representative
async fn cmd_submit_targets(config: &Config, week: u32, year: i32, file: &PathBuf, created_by: &str) -> Result<()> {
    let content = fs::read_to_string(file).context(format!("Failed to read {}", file.display()))?;
    let submissions: std::collections::BTreeMap<String, TargetSubmission> =
        serde_json::from_str(&content).context("Failed to parse targets file")?;

    let targets = TargetManager::spawn(&config.storage.db_path)?;

    let mut total_rows = 0;
    for (employee_id, submission) in &submissions {
        let set = WeeklyTargetSet::from_submission(
            employee_id.clone(),
            submission,
            week,
            year,
            config.targets.working_days,
            created_by,
        )
        .ok_or_else(|| eyre::eyre!("Week {} of {} has no valid start date", week, year))?;

        let written = targets
            .submit_week(set)
            .await
            .map_err(|e| eyre::eyre!("Failed to store targets for {}: {}", employee_id, e))?;
        println!("{employee_id}: {written} rows");
        total_rows += written;
    }
    targets.shutdown().await;

    println!(
        "Wrote {} rows for {} representatives (week {}, {})",
        total_rows,
        submissions.len(),
        week,
        year
    );
    Ok(())
}

/// Print a stored planning session
async fn cmd_show_session(config: &Config, employee_id: &str, month: u32, year: i32, json: bool) -> Result<()> {
    let sessions = SessionManager::spawn(&config.storage.db_path)?;
    let key = SessionKey::new(employee_id, month, year);

    let session = sessions
        .get(&key)
        .await
        .map_err(|e| eyre::eyre!("Failed to load session: {}", e))?;
    sessions.shutdown().await;

    let Some(session) = session else {
        println!("No session for {key}");
        return Ok(());
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&session)?);
        return Ok(());
    }

    println!("Session {key}");
    println!("  phase:     {}", session.phase);
    println!("  version:   {}", session.version);
    println!("  revisions: {}", session.revision_history.len());
    if let Some(plan) = &session.plan {
        println!("  weeks:     {}", plan.weekly_plans.len());
        println!("  target:    {:.2}", plan.monthly_overview.target_revenue);
    }
    for revision in &session.revision_history {
        println!("  - week {} revised: {}", revision.week_number, revision.reason);
    }
    Ok(())
}
