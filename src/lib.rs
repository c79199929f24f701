pub mod config;
pub mod error;
pub mod error_codes;
pub mod event_loop;
pub mod input_validation;
pub mod job_engine;
pub mod logging;
pub mod system_integration;


use chrono::{DateTime, Local};
use std::path::PathBuf;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

use config::AppSettings;
use error::{JobError, PreflightError};
use input_validation::validate_job_config;
use job_engine::preflight::{estimate_report_with, SpaceProbe};
use job_engine::{
    launch, AppEvent, JobConfig, JobOutcome, PreflightReport, PreflightResult, ProgressMonitor,
};
use logging::LogManager;
use system_integration::get_available_space;

/// A job that has been launched and is being monitored.
pub struct JobTicket {
    pub job_id: String,
    pub log_path: PathBuf,
    pub started_at: DateTime<Local>,
    /// `None` when free space could not be verified and the job went ahead anyway.
    pub preflight: Option<PreflightReport>,
    pub monitor: JoinHandle<JobOutcome>,
}

/// Runs the free-space estimate on the blocking pool.
pub async fn run_preflight(config: &JobConfig) -> Result<PreflightReport, PreflightError> {
    run_preflight_with(config, get_available_space).await
}

pub async fn run_preflight_with(
    config: &JobConfig,
    available_space: SpaceProbe,
) -> Result<PreflightReport, PreflightError> {
    let source = config.source.clone();
    let target = config.target.clone();
    let exclusions = config.exclusion_set();

    tokio::task::spawn_blocking(move || {
        estimate_report_with(&source, &target, &exclusions, available_space)
    })
    .await
    .map_err(|e| PreflightError::Worker(e.to_string()))?
}

/// Turns a deficit into the blocking `PreflightDeficit` error.
pub fn check_preflight(report: PreflightReport) -> Result<PreflightReport, JobError> {
    match report.result() {
        PreflightResult::Ok => Ok(report),
        PreflightResult::Deficit(bytes_short) => Err(JobError::PreflightDeficit { bytes_short }),
    }
}

/// Validates, checks free space, launches the copy tool and starts monitoring it.
///
/// Progress and completion arrive on `events`. Nothing is spawned when this
/// returns an error.
pub async fn submit_job(
    config: &JobConfig,
    settings: &AppSettings,
    events: UnboundedSender<AppEvent>,
    log: &LogManager,
) -> Result<JobTicket, JobError> {
    submit_job_with(config, settings, events, log, get_available_space).await
}

/// [`submit_job`] with the free-space query supplied by the caller.
pub async fn submit_job_with(
    config: &JobConfig,
    settings: &AppSettings,
    events: UnboundedSender<AppEvent>,
    log: &LogManager,
    available_space: SpaceProbe,
) -> Result<JobTicket, JobError> {
    validate_job_config(config).map_err(|e| JobError::Config(e.to_string()))?;

    let preflight = match run_preflight_with(config, available_space).await {
        Ok(report) => match check_preflight(report) {
            Ok(report) => Some(report),
            Err(err) => {
                log.error(&err.to_string(), None);
                return Err(err);
            }
        },
        Err(e) if settings.strict_preflight => return Err(e.into()),
        Err(e) => {
            log.warn(&format!("Could not verify free space: {e}"), None);
            None
        }
    };

    let handle = launch(config, &settings.tool, &settings.logs_dir)?;
    let job_id = handle.job_id();
    let log_path = handle.log_path.clone();
    let started_at = handle.started_at;

    log.info(
        &format!(
            "{} started. Log: {}",
            if config.simulate { "Simulation" } else { "Copy" },
            log_path.display()
        ),
        Some(job_id.clone()),
    );

    let monitor = ProgressMonitor::new(handle, settings.poll_interval(), events).spawn();

    Ok(JobTicket {
        job_id,
        log_path,
        started_at,
        preflight,
        monitor,
    })
}
