use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::error_codes::{
    ERR_CONFIG_INVALID, ERR_LAUNCH_FAILED, ERR_POWER_ACTION_FAILED, ERR_PREFLIGHT_DEFICIT,
    ERR_PREFLIGHT_UNVERIFIED,
};
use crate::job_engine::types::PowerAction;

/// Free space could not be verified. Soft: callers usually warn and keep going.
#[derive(Debug, Error)]
pub enum PreflightError {
    #[error("cannot read source {path}: {source}")]
    SourceUnreadable { path: PathBuf, source: io::Error },

    #[error("cannot query free space for {path}: {source}")]
    VolumeUnavailable { path: PathBuf, source: io::Error },

    #[error("preflight worker failed: {0}")]
    Worker(String),
}

/// Failures that end a submission or a post-action.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("{0}")]
    Config(String),

    #[error("could not verify free space: {0}")]
    Preflight(#[from] PreflightError),

    #[error(
        "target drive is missing roughly {:.1} GB ({bytes_short} bytes)",
        gigabytes(.bytes_short)
    )]
    PreflightDeficit { bytes_short: u64 },

    #[error("failed to launch {program}: {source}")]
    Launch { program: String, source: io::Error },

    #[error("failed to {action}: {message}")]
    PowerAction { action: PowerAction, message: String },
}

fn gigabytes(bytes: &u64) -> f64 {
    *bytes as f64 / 1_073_741_824.0
}

impl JobError {
    pub fn code(&self) -> &'static str {
        match self {
            JobError::Config(_) => ERR_CONFIG_INVALID,
            JobError::Preflight(_) => ERR_PREFLIGHT_UNVERIFIED,
            JobError::PreflightDeficit { .. } => ERR_PREFLIGHT_DEFICIT,
            JobError::Launch { .. } => ERR_LAUNCH_FAILED,
            JobError::PowerAction { .. } => ERR_POWER_ACTION_FAILED,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deficit_message_reports_gigabytes() {
        let err = JobError::PreflightDeficit {
            bytes_short: 8 * 1_073_741_824,
        };
        assert_eq!(err.code(), ERR_PREFLIGHT_DEFICIT);
        assert!(err.to_string().contains("8.0 GB"));
    }

    #[test]
    fn test_codes_are_distinct() {
        let launch = JobError::Launch {
            program: "robocopy".into(),
            source: io::Error::new(io::ErrorKind::NotFound, "missing"),
        };
        let power = JobError::PowerAction {
            action: PowerAction::Shutdown,
            message: "denied".into(),
        };
        assert_eq!(launch.code(), ERR_LAUNCH_FAILED);
        assert_eq!(power.code(), ERR_POWER_ACTION_FAILED);
        assert_eq!(power.to_string(), "failed to shut down: denied");
        assert_eq!(JobError::Config("x".into()).code(), ERR_CONFIG_INVALID);
    }
}
