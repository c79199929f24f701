use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};

use roboclone_lib::config::{load_job_config, AppSettings};
use roboclone_lib::error::JobError;
use roboclone_lib::event_loop::{Controller, Presenter, SessionOutcome};
use roboclone_lib::input_validation::validate_job_config;
use roboclone_lib::job_engine::{
    split_exclusion_list, AppEvent, CountdownPhase, CountdownState, JobConfig, JobOutcome,
    PostAction, PostActionScheduler, PowerAction, PreflightReport, PreflightResult, ProgressState,
};
use roboclone_lib::logging::{init_tracing, LogEntry, LogLevel, LogManager, DEFAULT_MAX_LOG_LINES};
use roboclone_lib::system_integration::{DesktopNotifier, SystemPower};
use roboclone_lib::{check_preflight, run_preflight, submit_job};

const GB: f64 = 1_073_741_824.0;

#[derive(Parser)]
#[command(name = "roboclone-cli")]
#[command(about = "Mirror a folder with robocopy and follow it to completion", long_about = None)]
struct Cli {
    #[arg(short, long)]
    source: Option<PathBuf>,

    #[arg(short, long)]
    target: Option<PathBuf>,

    /// List what would be copied without copying anything
    #[arg(short = 'n', long)]
    simulate: bool,

    /// Semicolon-separated folder or file names to skip, e.g. "node_modules;.git;.tmp"
    #[arg(short = 'x', long)]
    exclude: Option<String>,

    #[arg(short = 'p', long, value_enum)]
    post_action: Option<PostAction>,

    #[arg(long)]
    no_notify: bool,

    /// Job description in YAML; command-line flags override its fields
    #[arg(long)]
    job: Option<PathBuf>,

    /// Settings file in YAML
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long)]
    strict_preflight: bool,

    /// Only run the free-space check
    #[arg(long)]
    estimate_only: bool,

    /// Emit one JSON object per event instead of a progress bar
    #[arg(long)]
    json: bool,
}

fn fail(err: &JobError) -> ! {
    eprintln!("❌ [{}] {}", err.code(), err);
    std::process::exit(1);
}

fn load_settings(cli: &Cli) -> Result<AppSettings, JobError> {
    let mut settings = match &cli.config {
        Some(path) => AppSettings::load(path).map_err(|e| JobError::Config(format!("{e:#}")))?,
        None => AppSettings::default(),
    };
    if cli.strict_preflight {
        settings.strict_preflight = true;
    }
    Ok(settings)
}

fn build_job_config(cli: &Cli) -> Result<JobConfig, JobError> {
    let mut config = match &cli.job {
        Some(path) => load_job_config(path).map_err(|e| JobError::Config(format!("{e:#}")))?,
        None => JobConfig::new(PathBuf::new(), PathBuf::new()),
    };

    if let Some(source) = &cli.source {
        config.source = source.clone();
    }
    if let Some(target) = &cli.target {
        config.target = target.clone();
    }
    if cli.simulate {
        config.simulate = true;
    }
    if let Some(raw) = &cli.exclude {
        config.exclusions = split_exclusion_list(raw);
    }
    if let Some(post_action) = cli.post_action {
        config.post_action = post_action;
    }
    if cli.no_notify {
        config.notify = false;
    }

    validate_job_config(&config).map_err(|e| JobError::Config(e.to_string()))?;
    Ok(config)
}

fn print_report(report: &PreflightReport, json: bool) {
    if json {
        println!(
            "{}",
            json!({
                "event": "preflight",
                "required_bytes": report.required_bytes,
                "available_bytes": report.available_bytes,
                "result": report.result(),
            })
        );
        return;
    }

    println!("💾 Free space check");
    println!("   Required:  {:.2} GB", report.required_bytes as f64 / GB);
    println!("   Available: {:.2} GB", report.available_bytes as f64 / GB);
    match report.result() {
        PreflightResult::Ok => println!("   ✅ Enough space on target"),
        PreflightResult::Deficit(bytes) => {
            println!("   ⚠️  Missing {:.2} GB on target", bytes as f64 / GB)
        }
    }
}

async fn estimate_only(config: &JobConfig, json: bool) -> Result<(), JobError> {
    let report = run_preflight(config).await?;
    print_report(&report, json);
    check_preflight(report).map(|_| ())
}

/// Forwards every line typed on stdin as a cancel request.
///
/// A plain thread so that a pending read never holds up runtime shutdown.
fn spawn_cancel_listener(events: UnboundedSender<AppEvent>) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            if line.is_err() || events.send(AppEvent::CancelRequested).is_err() {
                break;
            }
        }
    });
}

struct CliPresenter {
    bar: ProgressBar,
    json: bool,
}

impl CliPresenter {
    fn new(json: bool) -> anyhow::Result<Self> {
        let bar = if json {
            ProgressBar::hidden()
        } else {
            let bar = ProgressBar::new(100);
            bar.set_style(
                ProgressStyle::default_bar()
                    .template(
                        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>3}% {msg}",
                    )?
                    .progress_chars("#>-"),
            );
            bar
        };
        Ok(Self { bar, json })
    }

    fn emit(&self, value: serde_json::Value) {
        println!("{value}");
    }

    fn say(&self, line: String) {
        self.bar.suspend(|| println!("{line}"));
    }
}

impl Presenter for CliPresenter {
    fn progress(&mut self, state: &ProgressState) {
        if self.json {
            self.emit(json!({
                "event": "progress",
                "percent": state.percent_done,
                "status": state.status_text,
            }));
            return;
        }
        self.bar.set_position(u64::from(state.percent_done));
        self.bar.set_message(state.status_text.clone());
    }

    fn countdown(&mut self, state: &CountdownState) {
        if self.json {
            self.emit(json!({ "event": "countdown", "state": state }));
            return;
        }
        if state.cancelled {
            self.say(format!("🛑 Automatic {} cancelled", state.action));
        } else {
            self.say(format!(
                "⏳ PC will {} in {} seconds. Press Enter to cancel.",
                state.action, state.seconds_remaining
            ));
        }
    }

    fn countdown_resolved(&mut self, action: PowerAction, phase: CountdownPhase) {
        if self.json {
            self.emit(json!({ "event": "countdown_resolved", "action": action, "phase": phase }));
            return;
        }
        if phase == CountdownPhase::Fired {
            self.say(format!("🔌 Executing {action} now"));
        }
    }

    fn job_finished(&mut self, outcome: &JobOutcome) {
        if self.json {
            self.emit(json!({
                "event": "completed",
                "log_path": outcome.log_path,
                "exit_code": outcome.exit_code,
                "elapsed_secs": outcome.elapsed.as_secs_f64(),
            }));
            return;
        }
        self.bar.finish_with_message("✅ Backup completed");
        println!();
        println!("📊 Results:");
        println!("   Log file: {}", outcome.log_path.display());
        println!("   Elapsed: {:.1}s", outcome.elapsed.as_secs_f64());
        match outcome.exit_code {
            Some(code) => println!("   Tool exit code: {code}"),
            None => println!("   Tool exit code: unknown"),
        }
    }

    fn log(&mut self, entry: &LogEntry) {
        if self.json {
            self.emit(json!({ "event": "log", "entry": entry }));
            return;
        }
        let icon = match entry.level {
            LogLevel::Info => "ℹ️ ",
            LogLevel::Warning => "⚠️ ",
            LogLevel::Error => "❌",
        };
        self.say(format!("{icon} [{}] {}", entry.timestamp, entry.message));
    }

    fn error(&mut self, code: &str, message: &str) {
        if self.json {
            self.emit(json!({ "event": "error", "code": code, "message": message }));
            return;
        }
        self.bar.suspend(|| eprintln!("❌ [{code}] {message}"));
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing("warn");
    let cli = Cli::parse();

    let settings = load_settings(&cli).unwrap_or_else(|e| fail(&e));
    let config = build_job_config(&cli).unwrap_or_else(|e| fail(&e));

    if cli.estimate_only {
        if let Err(e) = estimate_only(&config, cli.json).await {
            fail(&e);
        }
        return Ok(());
    }

    if !cli.json {
        println!(
            "🚀 Starting {}...",
            if config.simulate { "simulation" } else { "backup" }
        );
        println!("   Source: {}", config.source.display());
        println!("   Target: {}", config.target.display());
        if !config.exclusions.is_empty() {
            println!("   Excluding: {}", config.exclusions.join(", "));
        }
        println!();
    }

    let (tx, mut rx) = unbounded_channel();
    let log = Arc::new(LogManager::with_events(DEFAULT_MAX_LOG_LINES, tx.clone()));

    let ticket = submit_job(&config, &settings, tx.clone(), &log)
        .await
        .unwrap_or_else(|e| fail(&e));
    if let Some(report) = &ticket.preflight {
        print_report(report, cli.json);
    }

    let scheduler = PostActionScheduler::new(
        Arc::new(DesktopNotifier::default()),
        Arc::new(SystemPower),
        settings.countdown.clone(),
        settings.notification.clone(),
        tx.clone(),
    );
    spawn_cancel_listener(tx);

    let presenter = CliPresenter::new(cli.json)?;
    let mut controller = Controller::new(config, Some(ticket.job_id), scheduler, log, presenter);
    let outcome = controller.run(&mut rx).await;

    match outcome {
        SessionOutcome::PowerActionFailed(_) => std::process::exit(1),
        _ => Ok(()),
    }
}
