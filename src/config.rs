//! Application settings and job files.
//!
//! Both are plain YAML. Every settings field has a default, so an empty file
//! (or no file at all) gives the stock behaviour: robocopy, `logs/` next to the
//! executable, 1 s polling and a 5 s countdown.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::job_engine::types::JobConfig;

/// Argument dialect spoken by the external copy tool.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ToolFlavor {
    /// `robocopy <src> <dst> /MIR /R:0 /W:0 ... /LOG:<path>`
    #[default]
    Robocopy,
    /// `<tool> <src> <dst> --mirror --retries=0 --wait=0 ... --log=<path>`
    Generic,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ToolSettings {
    pub flavor: ToolFlavor,
    /// Executable to run. Required for the generic flavor.
    pub program: Option<PathBuf>,
}

impl ToolSettings {
    pub fn program(&self) -> Result<PathBuf> {
        match (&self.program, self.flavor) {
            (Some(program), _) => Ok(program.clone()),
            (None, ToolFlavor::Robocopy) => Ok(PathBuf::from("robocopy")),
            (None, ToolFlavor::Generic) => {
                bail!("tool.program is required for the generic tool flavor")
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CountdownSettings {
    pub seconds: u32,
    pub tick_ms: u64,
}

impl Default for CountdownSettings {
    fn default() -> Self {
        Self {
            seconds: 5,
            tick_ms: 1000,
        }
    }
}

impl CountdownSettings {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct NotificationSettings {
    pub title: String,
    pub body: String,
    pub timeout_secs: u32,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            title: "Copy finished".to_string(),
            body: "Backup completed successfully!".to_string(),
            timeout_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AppSettings {
    pub logs_dir: PathBuf,
    pub tool: ToolSettings,
    pub poll_interval_ms: u64,
    pub countdown: CountdownSettings,
    pub notification: NotificationSettings,
    /// Abort instead of warning when free space cannot be verified.
    pub strict_preflight: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            logs_dir: default_logs_dir(),
            tool: ToolSettings::default(),
            poll_interval_ms: 1000,
            countdown: CountdownSettings::default(),
            notification: NotificationSettings::default(),
            strict_preflight: false,
        }
    }
}

impl AppSettings {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file {}", path.display()))?;
        let settings: Self = serde_yaml::from_str(&raw)
            .with_context(|| format!("Invalid settings file {}", path.display()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            bail!("poll_interval_ms must be greater than zero");
        }
        if self.countdown.tick_ms == 0 {
            bail!("countdown.tick_ms must be greater than zero");
        }
        self.tool.program()?;
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// `logs/` beside the executable, or relative to the working directory as a fallback.
pub fn default_logs_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("logs")))
        .unwrap_or_else(|| PathBuf::from("logs"))
}

/// Reads a job submission from YAML.
pub fn load_job_config(path: &Path) -> Result<JobConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read job file {}", path.display()))?;
    serde_yaml::from_str(&raw).with_context(|| format!("Invalid job file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job_engine::types::PostAction;

    #[test]
    fn test_defaults() {
        let settings = AppSettings::default();
        assert_eq!(settings.poll_interval(), Duration::from_secs(1));
        assert_eq!(settings.countdown.seconds, 5);
        assert_eq!(settings.countdown.tick(), Duration::from_secs(1));
        assert_eq!(settings.tool.program().unwrap(), PathBuf::from("robocopy"));
        assert!(settings.logs_dir.ends_with("logs"));
        assert!(!settings.strict_preflight);
    }

    #[test]
    fn test_load_partial_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.yaml");
        std::fs::write(
            &path,
            "logs_dir: /var/log/roboclone
countdown:
  seconds: 10
tool:
  flavor: generic
  program: /usr/local/bin/mirror
",
        )
        .unwrap();

        let settings = AppSettings::load(&path).unwrap();
        assert_eq!(settings.logs_dir, PathBuf::from("/var/log/roboclone"));
        assert_eq!(settings.countdown.seconds, 10);
        assert_eq!(settings.countdown.tick_ms, 1000);
        assert_eq!(settings.tool.flavor, ToolFlavor::Generic);
        assert_eq!(settings.poll_interval_ms, 1000);
    }

    #[test]
    fn test_generic_flavor_requires_program() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.yaml");
        std::fs::write(&path, "tool:\n  flavor: generic\n").unwrap();

        let err = AppSettings::load(&path).unwrap_err();
        assert!(format!("{err:#}").contains("tool.program"));
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        let settings = AppSettings {
            poll_interval_ms: 0,
            ..AppSettings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_load_job_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("job.yaml");
        std::fs::write(
            &path,
            "source: /data
target: /backup
simulate: true
exclusions: [cache, tmp]
post_action: reboot
notify: false
",
        )
        .unwrap();

        let job = load_job_config(&path).unwrap();
        assert!(job.simulate);
        assert_eq!(job.exclusions, vec!["cache", "tmp"]);
        assert_eq!(job.post_action, PostAction::Reboot);
        assert!(!job.notify);
    }

    #[test]
    fn test_missing_settings_file() {
        assert!(AppSettings::load(Path::new("/nonexistent/settings.yaml")).is_err());
    }
}
