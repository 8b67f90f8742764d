//! Activity tracker CLI.
//!
//! Logs activities to a JSON-lines file, summarizes recent work, and runs the
//! periodic check-in countdown.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;

use tracker::activities::ActivitiesService;
use tracker::core::duration::IsoDuration;
use tracker::core::events::Emitter;
use tracker::core::validation::ValidationError;
use tracker::countdown::{CountdownService, PERIOD_ELAPSED_EVENT, PeriodElapsed};
use tracker::exit_codes;
use tracker::io::config::{CountdownConfig, TrackerConfig, load_config, write_config};
use tracker::logging;

#[derive(Parser)]
#[command(
    name = "tracker",
    version,
    about = "Activity tracker with a periodic check-in countdown"
)]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, global = true, default_value = "tracker.toml")]
    config: PathBuf,

    /// Raise log verbosity on stderr (-v info, -vv debug).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a default config file.
    Init {
        /// Overwrite an existing config.
        #[arg(short, long)]
        force: bool,
    },
    /// Validate a LogActivity request (JSON) and store it. Reads stdin when omitted.
    Log { request: Option<String> },
    /// Print recent activities and hour totals as JSON.
    Recent,
    /// Count down one check-in period, printing the remaining time on every tick.
    Countdown {
        /// ISO-8601 duration, e.g. PT20M. Defaults to the configured period.
        #[arg(long)]
        period: Option<IsoDuration>,
    },
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    let code = match run(cli) {
        Ok(()) => exit_codes::OK,
        Err(err) => {
            eprintln!("{:#}", err);
            exit_codes::exit_code_for(&err)
        }
    };
    std::process::exit(code);
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Init { force } => cmd_init(&cli.config, force),
        Command::Log { request } => cmd_log(&load_config(&cli.config)?, request),
        Command::Recent => cmd_recent(&load_config(&cli.config)?),
        Command::Countdown { period } => cmd_countdown(&load_config(&cli.config)?, period),
    }
}

fn cmd_init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    write_config(path, &TrackerConfig::default())?;
    println!("wrote {}", path.display());
    Ok(())
}

fn cmd_log(cfg: &TrackerConfig, request: Option<String>) -> Result<()> {
    let raw = match request {
        Some(raw) => raw,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("read request from stdin")?;
            buf
        }
    };
    let request: Value = serde_json::from_str(&raw)
        .map_err(|err| ValidationError::new(format!("The request is not valid JSON: {err}.")))?;

    let activity = ActivitiesService::create(cfg).log_activity(&request)?;
    print_json(&activity)
}

fn cmd_recent(cfg: &TrackerConfig) -> Result<()> {
    let recent = ActivitiesService::create(cfg).recent_activities()?;
    print_json(&recent)
}

fn cmd_countdown(cfg: &TrackerConfig, period: Option<IsoDuration>) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new().context("start tokio runtime")?;
    let countdown = CountdownConfig {
        period: period.unwrap_or(cfg.countdown.period),
        ..cfg.countdown.clone()
    };
    runtime.block_on(run_countdown(countdown))
}

async fn run_countdown(cfg: CountdownConfig) -> Result<()> {
    if cfg.period.is_zero() {
        bail!("countdown period must be > 0");
    }
    let service = Arc::new(CountdownService::create(&cfg)?);

    let (tx, mut rx) = mpsc::unbounded_channel::<PeriodElapsed>();
    service.events().subscribe(
        PERIOD_ELAPSED_EVENT,
        Arc::new(move |elapsed: &PeriodElapsed| {
            // The receiver only goes away once the command is done.
            let _ = tx.send(elapsed.clone());
        }),
    );
    let weak = Arc::downgrade(&service);
    service.subscribe(move || {
        if let Some(service) = weak.upgrade() {
            let state = service.state();
            if state.is_running {
                println!("{} remaining", state.remaining);
            }
        }
    });

    service.start(cfg.period, cfg.tick());
    let elapsed = rx
        .recv()
        .await
        .context("countdown ended before the period elapsed")?;
    service.stop();

    println!(
        "{} elapsed at {}",
        elapsed.period,
        elapsed.at.to_rfc3339()
    );
    Ok(())
}

/// Print `value` as pretty JSON on stdout.
fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let payload = serde_json::to_string_pretty(value).context("serialize json")?;
    println!("{payload}");
    Ok(())
}
