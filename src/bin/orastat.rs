//! Command-line entry point: read the instance registry, probe the estate,
//! and write the HTML status report.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use chrono::Local;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use orastat::collector::{EstateCollector, RealFs, RealRunner};
use orastat::inventory;
use orastat::report::{self, ReportMeta};

/// Reports land here; the timestamped filename keeps runs apart.
const OUTPUT_DIR: &str = "/tmp";

#[derive(Parser, Debug)]
#[command(name = "orastat", version, about = "Oracle estate status collector and reporter")]
struct Args {
    /// Path to the oratab registry; default locations are searched when
    /// omitted.
    #[arg(long, value_name = "PATH")]
    oratab: Option<PathBuf>,

    /// Timeout in seconds for every external command.
    #[arg(long, value_name = "SECS", default_value_t = 30)]
    timeout: u64,

    /// Increase log verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("orastat={}", level)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn hostname() -> String {
    if let Ok(name) = std::fs::read_to_string("/etc/hostname") {
        let name = name.trim();
        if !name.is_empty() {
            return name.to_string();
        }
    }
    std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string())
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    let entries = match inventory::load_entries_default(args.oratab.as_deref()) {
        Ok(entries) => entries,
        Err(e) => {
            error!("{}", e);
            eprintln!("orastat: {}", e);
            return ExitCode::FAILURE;
        }
    };
    info!("registry yielded {} instance(s)", entries.len());

    let runner = RealRunner::new();
    let fs = RealFs::new();
    let timeout = Duration::from_secs(args.timeout);
    let snapshot = EstateCollector::new(&runner, &fs, timeout).collect(&entries);

    let now = Local::now();
    let meta = ReportMeta {
        hostname: hostname(),
        generated_at: now.format("%Y-%m-%d %H:%M:%S").to_string(),
    };
    let html = match report::render(&snapshot, &meta) {
        Ok(html) => html,
        Err(e) => {
            error!("{}", e);
            eprintln!("orastat: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let file_name = format!("oracle_status_report_{}.html", now.format("%Y%m%d_%H%M%S"));
    let path = PathBuf::from(OUTPUT_DIR).join(file_name);
    if let Err(e) = std::fs::write(&path, html) {
        error!("failed to write {}: {}", path.display(), e);
        eprintln!("orastat: failed to write {}: {}", path.display(), e);
        return ExitCode::FAILURE;
    }

    info!(
        "report written to {} ({} instance(s), {} listener(s))",
        path.display(),
        snapshot.instances.len(),
        snapshot.listeners.len()
    );
    println!("{}", path.display());
    ExitCode::SUCCESS
}
