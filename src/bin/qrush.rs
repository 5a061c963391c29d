// src/bin/qrush.rs
use clap::{Arg, ArgAction, Command};
use std::process;
use anyhow::Result;
use tracing_subscriber::EnvFilter;

mod commands;
use commands::*;

fn job_args(cmd: Command) -> Command {
    cmd.arg(Arg::new("class")
            .short('c')
            .long("class")
            .value_name("CLASS")
            .help("Job class name")
            .required(true))
        .arg(Arg::new("args")
            .short('a')
            .long("args")
            .value_name("JSON")
            .help("Job arguments as a JSON array")
            .default_value("[]"))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let app = Command::new("qrush-retry")
        .version(env!("CARGO_PKG_VERSION"))
        .author("SNM Maurya <sxmmaurya@gmail.com>")
        .about("Inspect and cancel scheduled job retries")
        .subcommand(
            job_args(Command::new("fingerprint")
                .about("Print the retry fingerprint and state keys of a job"))
        )
        .subcommand(
            job_args(Command::new("show")
                .about("Show attempts and the last failure of a job"))
        )
        .subcommand(
            Command::new("buckets")
                .about("List scheduled retry buckets")
                .arg(Arg::new("offset")
                    .short('o')
                    .long("offset")
                    .value_name("NUMBER")
                    .help("Skip this many buckets")
                    .default_value("0"))
                .arg(Arg::new("limit")
                    .short('l')
                    .long("limit")
                    .value_name("NUMBER")
                    .help("Limit number of buckets (0 = all)")
                    .default_value("20"))
        )
        .subcommand(
            Command::new("bucket")
                .about("Show every job scheduled at a timestamp with its retry state")
                .arg(Arg::new("timestamp")
                    .help("Bucket timestamp (unix seconds)")
                    .required(true))
                .arg(Arg::new("verbose")
                    .short('v')
                    .long("verbose")
                    .help("Show failure backtraces")
                    .action(ArgAction::SetTrue))
        )
        .subcommand(
            Command::new("cancel")
                .about("Cancel every retry scheduled at a timestamp")
                .arg(Arg::new("timestamp")
                    .help("Bucket timestamp (unix seconds)")
                    .required(true))
        )
        .subcommand(
            job_args(Command::new("cancel-job")
                .about("Cancel the retry of a single job"))
        );

    let matches = app.get_matches();

    match matches.subcommand() {
        Some(("fingerprint", sub_matches)) => fingerprint_command(sub_matches).await,
        Some(("show", sub_matches)) => show_command(sub_matches).await,
        Some(("buckets", sub_matches)) => buckets_command(sub_matches).await,
        Some(("bucket", sub_matches)) => bucket_command(sub_matches).await,
        Some(("cancel", sub_matches)) => cancel_command(sub_matches).await,
        Some(("cancel-job", sub_matches)) => cancel_job_command(sub_matches).await,
        _ => {
            println!("No command specified. Use --help for usage information.");
            process::exit(1);
        }
    }
}
