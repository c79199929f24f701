use chrono::{DateTime, Local};
use std::ffi::OsString;
use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::{Child, Command};

use crate::config::{ToolFlavor, ToolSettings};
use crate::error::JobError;
use crate::job_engine::types::JobConfig;

/// A running copy process and the log file it writes.
///
/// Valid for as long as the process runs; consumed by the progress monitor.
#[derive(Debug)]
pub struct JobHandle {
    pub child: Child,
    pub log_path: PathBuf,
    pub started_at: DateTime<Local>,
}

impl JobHandle {
    /// Identifier used in the activity log, derived from the log file name.
    pub fn job_id(&self) -> String {
        job_id_for(&self.log_path)
    }
}

pub fn job_id_for(log_path: &Path) -> String {
    log_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "job".to_string())
}

const MAX_LOG_NAME_ATTEMPTS: u32 = 1000;

/// `<logs_dir>/job_log_<YYYYMMDD_HHMMSS>.txt`
pub fn log_path_for(logs_dir: &Path, started_at: &DateTime<Local>) -> PathBuf {
    logs_dir.join(format!("job_log_{}.txt", started_at.format("%Y%m%d_%H%M%S")))
}

/// Creates the empty log file for a job started at `started_at`.
///
/// Never reuses an existing file: a second job in the same second gets
/// `job_log_<YYYYMMDD_HHMMSS>_2.txt`, and so on.
pub fn create_log_file(logs_dir: &Path, started_at: &DateTime<Local>) -> io::Result<PathBuf> {
    let stamp = started_at.format("%Y%m%d_%H%M%S");

    for attempt in 1..=MAX_LOG_NAME_ATTEMPTS {
        let path = match attempt {
            1 => log_path_for(logs_dir, started_at),
            n => logs_dir.join(format!("job_log_{stamp}_{n}.txt")),
        };
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(_) => return Ok(path),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e),
        }
    }

    Err(io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("no free log file name for job_log_{stamp} in {}", logs_dir.display()),
    ))
}

/// Argument list for a mirror run: exact mirror including deletions, no retries,
/// no wait, one directory and one file exclusion per token, optional simulate
/// flag, log output to `log_path`.
pub fn build_args(flavor: ToolFlavor, config: &JobConfig, log_path: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        config.source.clone().into_os_string(),
        config.target.clone().into_os_string(),
    ];

    match flavor {
        ToolFlavor::Robocopy => {
            args.extend(["/MIR", "/R:0", "/W:0"].map(OsString::from));
            for token in config.exclusion_tokens() {
                args.extend(["/XD", token, "/XF", token].map(OsString::from));
            }
            if config.simulate {
                args.push("/L".into());
            }
            let mut log_arg = OsString::from("/LOG:");
            log_arg.push(log_path);
            args.push(log_arg);
        }
        ToolFlavor::Generic => {
            args.extend(["--mirror", "--retries=0", "--wait=0"].map(OsString::from));
            if config.simulate {
                args.push("--simulate".into());
            }
            for token in config.exclusion_tokens() {
                args.push(format!("--exclude-dir={token}").into());
                args.push(format!("--exclude-file={token}").into());
            }
            let mut log_arg = OsString::from("--log=");
            log_arg.push(log_path);
            args.push(log_arg);
        }
    }

    args
}

/// Starts the external copy tool without waiting for it.
///
/// The logs directory and a fresh, empty log file are created first. The
/// tool's stdout and stderr are discarded, the log file is the only progress
/// source.
pub fn launch(
    config: &JobConfig,
    tool: &ToolSettings,
    logs_dir: &Path,
) -> Result<JobHandle, JobError> {
    let program = tool.program().map_err(|e| JobError::Config(e.to_string()))?;
    let program_name = program.display().to_string();

    std::fs::create_dir_all(logs_dir).map_err(|source| JobError::Launch {
        program: program_name.clone(),
        source,
    })?;

    let started_at = Local::now();
    let log_path = create_log_file(logs_dir, &started_at).map_err(|source| JobError::Launch {
        program: program_name.clone(),
        source,
    })?;
    let args = build_args(tool.flavor, config, &log_path);

    tracing::info!(
        program = %program_name,
        ?args,
        log = %log_path.display(),
        "Launching copy job"
    );

    let child = Command::new(&program)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|source| JobError::Launch {
            program: program_name,
            source,
        })?;

    Ok(JobHandle {
        child,
        log_path,
        started_at,
    })
}
