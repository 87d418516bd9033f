//! `file_sample` entry point
//!
//! Usage:
//!   file_sample --policy policy.json --username alice@contoso.com -f report.docx --setlabel general
//!
//! Flags fall back to `FILE_SAMPLE_*` and `IP_SDK_*` variables, which may
//! also come from a `.env` file in the working directory.

use clap::Parser;
use colored::Colorize;
use file_cli::{run, Args};
use logger_redacted::{init_tracing, LogLevel, LoggerConfig};
use std::process::ExitCode;
use tracing::warn;

fn main() -> ExitCode {
    // A missing .env is fine.
    let _ = dotenvy::dotenv();
    let args = Args::parse();

    init_tracing(&LoggerConfig {
        log_level: if args.verbose { LogLevel::Info } else { LogLevel::Error },
        ..LoggerConfig::default()
    });

    let mut stdout = std::io::stdout().lock();
    let result = run(&args, &mut stdout);
    drop(stdout);

    if let Err(e) = information_protection::release_all_resources() {
        warn!("SDK resources not released: {e}");
    }

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {e:#}", "error:".red().bold());
            ExitCode::FAILURE
        }
    }
}
