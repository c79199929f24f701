use std::path::Path;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedSender;

use crate::job_engine::launcher::JobHandle;
use crate::job_engine::types::{AppEvent, JobOutcome};

/// Substrings that mark a log line as carrying progress.
const PROGRESS_MARKERS: [&str; 3] = ["New File", "Newer", COMPLETION_MARKER];
const COMPLETION_MARKER: &str = "100%";

/// Percentage of progress-bearing lines that carry the completion marker.
///
/// `floor(100 * done / max(total, 1))`. A heuristic, not a byte count.
pub fn parse_progress(log: &str) -> u8 {
    let mut total = 0u64;
    let mut done = 0u64;

    for line in log.lines() {
        if PROGRESS_MARKERS.iter().any(|m| line.contains(m)) {
            total += 1;
            if line.contains(COMPLETION_MARKER) {
                done += 1;
            }
        }
    }

    (done * 100 / total.max(1)) as u8
}

/// Reads the log and returns the current percentage.
///
/// `None` when the log is missing or unreadable: the caller keeps its previous
/// state. `force` reports 100 regardless of the content, used once the process
/// has exited.
pub async fn read_progress(log_path: &Path, force: bool) -> Option<u8> {
    if force {
        return Some(100);
    }

    match tokio::fs::read(log_path).await {
        Ok(bytes) => Some(parse_progress(&String::from_utf8_lossy(&bytes))),
        Err(e) => {
            tracing::trace!(log = %log_path.display(), error = %e, "Progress log not readable yet");
            None
        }
    }
}

/// Supervises one copy process and reports its progress to the event loop.
pub struct ProgressMonitor {
    handle: JobHandle,
    interval: Duration,
    events: UnboundedSender<AppEvent>,
}

impl ProgressMonitor {
    pub fn new(handle: JobHandle, interval: Duration, events: UnboundedSender<AppEvent>) -> Self {
        Self {
            handle,
            interval,
            events,
        }
    }

    /// Polls the log every interval until the process exits, then sends a
    /// forced 100% and exactly one `JobCompleted`.
    pub async fn run(self) -> JobOutcome {
        let Self {
            mut handle,
            interval,
            events,
        } = self;
        let started = Instant::now();
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        let exit_code = loop {
            tokio::select! {
                status = handle.child.wait() => {
                    break match status {
                        Ok(status) => status.code(),
                        Err(e) => {
                            tracing::warn!(error = %e, "Lost track of copy process");
                            None
                        }
                    };
                }
                _ = ticker.tick() => {
                    if let Some(percent) = read_progress(&handle.log_path, false).await {
                        let _ = events.send(AppEvent::Progress { percent });
                    }
                }
            }
        };

        if let Some(percent) = read_progress(&handle.log_path, true).await {
            let _ = events.send(AppEvent::Progress { percent });
        }

        let outcome = JobOutcome {
            log_path: handle.log_path.clone(),
            exit_code,
            elapsed: started.elapsed(),
        };
        tracing::info!(
            log = %outcome.log_path.display(),
            exit_code = ?outcome.exit_code,
            elapsed_ms = outcome.elapsed.as_millis() as u64,
            "Copy job finished"
        );
        let _ = events.send(AppEvent::JobCompleted(outcome.clone()));
        outcome
    }

    pub fn spawn(self) -> tokio::task::JoinHandle<JobOutcome> {
        tokio::spawn(self.run())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn log_with(lines: &[&str]) -> String {
        let mut log =
            String::from("-------------------\n   ROBOCOPY     ::     Robust File Copy\n\n");
        for line in lines {
            log.push_str(line);
            log.push('\n');
        }
        log
    }

    #[test]
    fn test_parse_progress_ratio() {
        let log = log_with(&[
            "\t    New File  \t\t 1024\ta.bin 100%",
            "\t    New File  \t\t 2048\tb.bin",
            "\t    Newer     \t\t 4096\tc.bin",
        ]);
        assert_eq!(parse_progress(&log), 33);
    }

    #[test]
    fn test_parse_progress_without_relevant_lines() {
        assert_eq!(parse_progress(""), 0);
        assert_eq!(parse_progress(&log_with(&["   Source : C:\\data\\"])), 0);
    }

    #[test]
    fn test_parse_progress_standalone_markers() {
        // Completion markers on their own lines count towards the total as well.
        let log = log_with(&["New File  10  a.bin", "100%", "New File  10  b.bin", "100%"]);
        assert_eq!(parse_progress(&log), 50);
    }

    #[test]
    fn test_parse_progress_lossy_content() {
        let bytes = b"New File \xff\xfe a.bin 100%\nNew File b.bin\n";
        assert_eq!(parse_progress(&String::from_utf8_lossy(bytes)), 50);
    }

    #[tokio::test]
    async fn test_read_progress_missing_log() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("job_log_missing.txt");
        assert_eq!(read_progress(&missing, false).await, None);
        assert_eq!(read_progress(&missing, true).await, Some(100));
    }

    #[tokio::test]
    async fn test_read_progress_empty_log() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("job_log.txt");
        std::fs::write(&path, "").unwrap();
        assert_eq!(read_progress(&path, false).await, Some(0));
    }

    #[tokio::test]
    async fn test_read_progress_forced() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("job_log.txt");
        std::fs::write(&path, log_with(&["New File a", "New File b"])).unwrap();
        assert_eq!(read_progress(&path, false).await, Some(0));
        assert_eq!(read_progress(&path, true).await, Some(100));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_monitor_reports_completion_once() {
        use chrono::Local;
        use tokio::process::Command;

        let dir = TempDir::new().unwrap();
        let log_path = dir.path().join("job_log.txt");
        std::fs::write(&log_path, log_with(&["New File a.bin 100%", "New File b.bin"])).unwrap();

        let child = Command::new("sleep").arg("0.3").spawn().unwrap();
        let handle = JobHandle {
            child,
            log_path: log_path.clone(),
            started_at: Local::now(),
        };

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let outcome = ProgressMonitor::new(handle, Duration::from_millis(50), tx)
            .run()
            .await;
        assert_eq!(outcome.exit_code, Some(0));

        let mut percents = Vec::new();
        let mut completed = 0;
        while let Ok(event) = rx.try_recv() {
            match event {
                AppEvent::Progress { percent } => {
                    assert_eq!(completed, 0, "progress after completion");
                    percents.push(percent);
                }
                AppEvent::JobCompleted(done) => {
                    assert_eq!(done.log_path, log_path);
                    completed += 1;
                }
                other => panic!("unexpected event: {other:?}"),
            }
        }

        assert_eq!(completed, 1);
        assert!(percents.len() >= 2);
        assert_eq!(percents.last(), Some(&100));
        assert!(percents[..percents.len() - 1].iter().all(|p| *p == 50));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_monitor_tolerates_missing_log() {
        use chrono::Local;
        use tokio::process::Command;

        let dir = TempDir::new().unwrap();
        let child = Command::new("true").spawn().unwrap();
        let handle = JobHandle {
            child,
            log_path: dir.path().join("never_written.txt"),
            started_at: Local::now(),
        };

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        ProgressMonitor::new(handle, Duration::from_millis(20), tx).run().await;

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        assert!(matches!(events.last(), Some(AppEvent::JobCompleted(_))));
        assert!(matches!(
            events[events.len() - 2],
            AppEvent::Progress { percent: 100 }
        ));
    }
}
