// src/bin/commands/retry.rs
use anyhow::{anyhow, Context, Result};
use chrono::{TimeZone, Utc};
use clap::ArgMatches;
use colored::*;
use serde_json::Value;
use std::process;

use qrush_retry::{
    CancelOutcome, CancelStatus, CancelSummary, DelayedScheduler, JobDescriptor, RetryConfig,
    RetryStatus,
};

fn job_from_matches(matches: &ArgMatches) -> Result<JobDescriptor> {
    let class = matches
        .get_one::<String>("class")
        .ok_or_else(|| anyhow!("--class is required"))?;
    let raw_args = matches
        .get_one::<String>("args")
        .map(String::as_str)
        .unwrap_or("[]");

    let args: Vec<Value> = serde_json::from_str(raw_args)
        .with_context(|| format!("--args must be a JSON array, got {raw_args}"))?;
    Ok(JobDescriptor::new(class.as_str(), args))
}

fn timestamp_from_matches(matches: &ArgMatches) -> Result<i64> {
    let raw = matches
        .get_one::<String>("timestamp")
        .ok_or_else(|| anyhow!("timestamp is required"))?;
    raw.parse()
        .with_context(|| format!("timestamp must be unix seconds, got {raw}"))
}

fn number_from_matches(matches: &ArgMatches, name: &str) -> Result<usize> {
    let raw = matches
        .get_one::<String>(name)
        .ok_or_else(|| anyhow!("--{name} is required"))?;
    raw.trim()
        .parse()
        .with_context(|| format!("--{name} must be a non-negative number, got {raw}"))
}

fn format_timestamp(timestamp: i64) -> String {
    match Utc.timestamp_opt(timestamp, 0).single() {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        None => "invalid time".to_string(),
    }
}

fn job_label(job: &JobDescriptor) -> String {
    let args = serde_json::to_string(&job.args).unwrap_or_else(|_| "[]".to_string());
    format!("{}{}", job.class.bold(), args)
}

fn print_status(status: &RetryStatus, verbose: bool) {
    println!("  • {}", job_label(&status.job));
    println!("    Fingerprint: {}", status.fingerprint.dimmed());
    println!("    Attempts: {}", status.attempts.to_string().yellow());

    match &status.failure {
        Some(failure) => {
            let when = failure
                .failed_at_utc()
                .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                .unwrap_or_else(|| failure.failed_at.clone());
            println!("    Last failure: {} {} ({})", failure.exception.red(), failure.error, when);
            if let Some(worker) = &failure.worker {
                println!("    Worker: {}", worker);
            }
            if verbose {
                for line in &failure.backtrace {
                    println!("      {}", line.dimmed());
                }
            }
        }
        None => println!("    Last failure: {}", "none recorded".dimmed()),
    }
}

fn print_outcome(outcome: &CancelOutcome) {
    let label = job_label(&outcome.job);
    match &outcome.status {
        CancelStatus::Cancelled => println!("  {} {}", "✅ cancelled".green(), label),
        CancelStatus::NotScheduled => {
            println!("  {} {} (nothing scheduled)", "✅ cleared".green(), label)
        }
        CancelStatus::Partial { error } => println!(
            "  {} {} (retry state removed, still scheduled: {})",
            "⚠️  partial".yellow(),
            label,
            error
        ),
        CancelStatus::Failed { error } => {
            println!("  {} {} ({})", "❌ failed".red(), label, error)
        }
    }
}

fn print_summary(summary: &CancelSummary) {
    println!(
        "\nCancelled: {}  Not scheduled: {}  Partial: {}  Failed: {}",
        summary.cancelled.to_string().green(),
        summary.not_scheduled.to_string().blue(),
        summary.partial.to_string().yellow(),
        summary.failed.to_string().red()
    );
}

// Print fingerprint and state keys without touching Redis
pub async fn fingerprint_command(matches: &ArgMatches) -> Result<()> {
    let config = RetryConfig::from_env()?;
    let job = job_from_matches(matches)?;
    let fingerprint = config.fingerprinter().derive(&job);

    println!("Fingerprint:  {}", fingerprint.to_string().green());
    println!("Counter key:  {}", fingerprint.counter_key());
    println!("Failure key:  {}", fingerprint.failure_key());
    Ok(())
}

pub async fn show_command(matches: &ArgMatches) -> Result<()> {
    let job = job_from_matches(matches)?;
    let canceller = RetryConfig::from_env()?.canceller().await?;

    let status = canceller.state().status(&job).await?;
    println!("{}", "🔁 Retry Status".blue().bold());
    print_status(&status, true);
    Ok(())
}

pub async fn buckets_command(matches: &ArgMatches) -> Result<()> {
    let offset = number_from_matches(matches, "offset")?;
    let limit = number_from_matches(matches, "limit")?;
    let canceller = RetryConfig::from_env()?.canceller().await?;

    let timestamps = canceller.scheduler().timestamps(offset, limit).await?;
    println!("{}", "⏳ Scheduled Buckets".blue().bold());
    println!("{}", "=".repeat(50).blue());

    if timestamps.is_empty() {
        println!("{}", "ℹ️  No scheduled jobs.".blue());
        return Ok(());
    }

    for timestamp in timestamps {
        let jobs = canceller.scheduler().peek(timestamp, 0, 0).await?;
        println!(
            "  {}  {}  {} job(s)",
            timestamp.to_string().bold(),
            format_timestamp(timestamp),
            jobs.len().to_string().green()
        );
    }
    Ok(())
}

pub async fn bucket_command(matches: &ArgMatches) -> Result<()> {
    let timestamp = timestamp_from_matches(matches)?;
    let verbose = matches.get_flag("verbose");
    let canceller = RetryConfig::from_env()?.canceller().await?;

    println!(
        "{} {} ({})",
        "⏳ Bucket".blue().bold(),
        timestamp,
        format_timestamp(timestamp)
    );

    let entries = canceller.bucket_status(timestamp).await?;
    if entries.is_empty() {
        println!("{}", "ℹ️  Nothing scheduled at this timestamp.".blue());
        return Ok(());
    }

    for (job, status) in entries {
        match status {
            Ok(status) => print_status(&status, verbose),
            Err(err) => println!("  • {} {}", job_label(&job), err.to_string().red()),
        }
    }
    Ok(())
}

pub async fn cancel_command(matches: &ArgMatches) -> Result<()> {
    let timestamp = timestamp_from_matches(matches)?;
    let canceller = RetryConfig::from_env()?.canceller().await?;

    println!(
        "{} {} ({})",
        "🛑 Cancelling retries at".yellow(),
        timestamp,
        format_timestamp(timestamp)
    );

    let outcomes = canceller.cancel_bucket(timestamp).await?;
    if outcomes.is_empty() {
        println!("{}", "ℹ️  Nothing scheduled at this timestamp.".blue());
        return Ok(());
    }

    for outcome in &outcomes {
        print_outcome(outcome);
    }

    let summary = CancelSummary::from_outcomes(&outcomes);
    print_summary(&summary);
    if !summary.all_succeeded() {
        process::exit(2);
    }
    Ok(())
}

pub async fn cancel_job_command(matches: &ArgMatches) -> Result<()> {
    let job = job_from_matches(matches)?;
    let canceller = RetryConfig::from_env()?.canceller().await?;

    let outcome = canceller.cancel_one(&job).await;
    print_outcome(&outcome);
    if !outcome.is_success() {
        process::exit(2);
    }
    Ok(())
}
