use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::logging::LogEntry;

/// Follow-up performed once the copy job has finished.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PostAction {
    #[default]
    None,
    Close,
    Reboot,
    Shutdown,
}

/// Irreversible machine-level actions, only ever run after a countdown.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PowerAction {
    Reboot,
    Shutdown,
}

impl fmt::Display for PowerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PowerAction::Reboot => write!(f, "reboot"),
            PowerAction::Shutdown => write!(f, "shut down"),
        }
    }
}

fn default_notify() -> bool {
    true
}

/// One submission. Never mutated after it has been handed to `submit_job`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobConfig {
    pub source: PathBuf,
    pub target: PathBuf,
    /// Preview only, the tool must not write anything.
    #[serde(default)]
    pub simulate: bool,
    #[serde(default)]
    pub exclusions: Vec<String>,
    #[serde(default)]
    pub post_action: PostAction,
    #[serde(default = "default_notify")]
    pub notify: bool,
}

impl JobConfig {
    pub fn new(source: impl Into<PathBuf>, target: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            simulate: false,
            exclusions: Vec::new(),
            post_action: PostAction::None,
            notify: true,
        }
    }

    /// Trimmed, non-empty tokens in the order the user gave them.
    /// These keep their original case, the external tool receives them as-is.
    pub fn exclusion_tokens(&self) -> Vec<&str> {
        self.exclusions
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .collect()
    }

    pub fn exclusion_set(&self) -> ExclusionSet {
        ExclusionSet::from_tokens(&self.exclusions)
    }
}

/// Lower-cased exclusion tokens used for case-insensitive substring matching.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExclusionSet {
    tokens: BTreeSet<String>,
}

impl ExclusionSet {
    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let tokens = tokens
            .into_iter()
            .map(|t| t.as_ref().trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        Self { tokens }
    }

    /// True when `haystack` contains any token, ignoring case.
    pub fn matches(&self, haystack: &str) -> bool {
        if self.tokens.is_empty() {
            return false;
        }
        let haystack = haystack.to_lowercase();
        self.tokens.iter().any(|t| haystack.contains(t.as_str()))
    }
}

/// Splits the `;`-separated exclusion field into raw tokens.
pub fn split_exclusion_list(raw: &str) -> Vec<String> {
    raw.split(';')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PreflightResult {
    Ok,
    /// Bytes missing on the target volume.
    Deficit(u64),
}

/// Measured numbers behind a [`PreflightResult`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PreflightReport {
    pub required_bytes: u64,
    pub available_bytes: u64,
}

impl PreflightReport {
    pub fn result(&self) -> PreflightResult {
        if self.required_bytes > self.available_bytes {
            PreflightResult::Deficit(self.required_bytes - self.available_bytes)
        } else {
            PreflightResult::Ok
        }
    }
}

/// What the user sees about the running job.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ProgressState {
    pub percent_done: u8,
    pub status_text: String,
}

impl Default for ProgressState {
    fn default() -> Self {
        Self {
            percent_done: 0,
            status_text: "Waiting…".to_string(),
        }
    }
}

impl ProgressState {
    pub fn start(&mut self) {
        self.percent_done = 0;
        self.status_text = "Running…".to_string();
    }

    pub fn apply(&mut self, percent: u8) {
        self.percent_done = percent.min(100);
        self.status_text = format!("{}% done", self.percent_done);
    }
}

/// Countdown state machine: `Pending(n) -> Pending(n-1) -> ... -> Pending(0) -> Fired`,
/// with `Pending(n) -> Cancelled` from any pending step.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum CountdownPhase {
    Pending(u32),
    Fired,
    Cancelled,
}

impl CountdownPhase {
    pub fn advance(self) -> Self {
        match self {
            CountdownPhase::Pending(0) => CountdownPhase::Fired,
            CountdownPhase::Pending(n) => CountdownPhase::Pending(n - 1),
            terminal => terminal,
        }
    }

    pub fn cancel(self) -> Self {
        match self {
            CountdownPhase::Pending(_) => CountdownPhase::Cancelled,
            terminal => terminal,
        }
    }
}

/// Lives only while a reboot/shutdown is pending.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CountdownState {
    pub action: PowerAction,
    pub seconds_remaining: u32,
    pub cancelled: bool,
}

/// Terminal record of one copy job.
#[derive(Debug, Clone, Serialize)]
pub struct JobOutcome {
    pub log_path: PathBuf,
    /// Recorded for the activity log only, completion is decided by process liveness.
    pub exit_code: Option<i32>,
    pub elapsed: Duration,
}

/// Messages delivered to the event loop. Workers never touch presentation state.
#[derive(Debug, Clone)]
pub enum AppEvent {
    Log(LogEntry),
    Progress { percent: u8 },
    JobCompleted(JobOutcome),
    CountdownTick { action: PowerAction, remaining: u32 },
    CountdownResolved { action: PowerAction, phase: CountdownPhase },
    PowerActionFailed { action: PowerAction, message: String },
    /// The user pressed the countdown's cancel control.
    CancelRequested,
    /// Application shutdown requested by the `close` post-action.
    CloseRequested,
}
