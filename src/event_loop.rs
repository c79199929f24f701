//! Presentation-side event loop
//!
//! The [`Controller`] is the only writer of [`ProgressState`] and
//! [`CountdownState`] and the only caller of the [`Presenter`]. Background
//! workers (progress monitor, countdown) reach it exclusively through
//! [`AppEvent`]s on one channel.

use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::error::JobError;
use crate::job_engine::post_action::countdown_state;
use crate::job_engine::{
    AppEvent, CountdownHandle, CountdownPhase, CountdownState, JobConfig, JobOutcome,
    PostActionPlan, PostActionScheduler, PowerAction, ProgressState,
};
use crate::logging::{LogEntry, LogManager};

/// Whatever renders the session for the user.
pub trait Presenter: Send {
    fn progress(&mut self, state: &ProgressState);
    fn countdown(&mut self, state: &CountdownState);
    fn countdown_resolved(&mut self, action: PowerAction, phase: CountdownPhase);
    fn job_finished(&mut self, outcome: &JobOutcome);
    fn log(&mut self, entry: &LogEntry);
    fn error(&mut self, code: &str, message: &str);
}

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Job done, no follow-up.
    Completed,
    /// The `close` post-action asked the application to exit.
    Closed,
    PowerActionFired(PowerAction),
    CountdownCancelled(PowerAction),
    PowerActionFailed(PowerAction),
}

struct ActiveCountdown {
    state: CountdownState,
    handle: CountdownHandle,
}

pub struct Controller<P: Presenter> {
    config: JobConfig,
    job_id: Option<String>,
    scheduler: PostActionScheduler,
    log: Arc<LogManager>,
    presenter: P,
    progress: ProgressState,
    countdown: Option<ActiveCountdown>,
    job_done: bool,
    power_failed: bool,
}

impl<P: Presenter> Controller<P> {
    pub fn new(
        config: JobConfig,
        job_id: Option<String>,
        scheduler: PostActionScheduler,
        log: Arc<LogManager>,
        presenter: P,
    ) -> Self {
        Self {
            config,
            job_id,
            scheduler,
            log,
            presenter,
            progress: ProgressState::default(),
            countdown: None,
            job_done: false,
            power_failed: false,
        }
    }

    pub fn progress(&self) -> &ProgressState {
        &self.progress
    }

    pub fn countdown(&self) -> Option<&CountdownState> {
        self.countdown.as_ref().map(|c| &c.state)
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    pub fn into_presenter(self) -> P {
        self.presenter
    }

    /// Drains events until the session is over.
    pub async fn run(&mut self, events: &mut UnboundedReceiver<AppEvent>) -> SessionOutcome {
        self.progress.start();
        self.presenter.progress(&self.progress);

        while let Some(event) = events.recv().await {
            if let Some(outcome) = self.handle(event) {
                return outcome;
            }
        }

        // Every sender is gone; nothing else can happen.
        SessionOutcome::Completed
    }

    /// Applies one event. Returns the session outcome once it is decided.
    pub fn handle(&mut self, event: AppEvent) -> Option<SessionOutcome> {
        match event {
            AppEvent::Log(entry) => {
                self.presenter.log(&entry);
                None
            }
            AppEvent::Progress { percent } => {
                if !self.job_done {
                    self.progress.apply(percent);
                    self.presenter.progress(&self.progress);
                }
                None
            }
            AppEvent::JobCompleted(outcome) => self.on_job_completed(outcome),
            AppEvent::CountdownTick { remaining, .. } => {
                if let Some(active) = self.countdown.as_mut() {
                    active.state.seconds_remaining = remaining;
                    self.presenter.countdown(&active.state);
                }
                None
            }
            AppEvent::CountdownResolved { action, phase } => {
                self.countdown = None;
                self.presenter.countdown_resolved(action, phase);
                match phase {
                    CountdownPhase::Fired if self.power_failed => {
                        Some(SessionOutcome::PowerActionFailed(action))
                    }
                    CountdownPhase::Fired => Some(SessionOutcome::PowerActionFired(action)),
                    CountdownPhase::Cancelled => Some(SessionOutcome::CountdownCancelled(action)),
                    CountdownPhase::Pending(_) => None,
                }
            }
            AppEvent::PowerActionFailed { action, message } => {
                self.power_failed = true;
                let err = JobError::PowerAction { action, message };
                self.log.error(&err.to_string(), self.job_id.clone());
                self.presenter.error(err.code(), &err.to_string());
                None
            }
            AppEvent::CancelRequested => {
                if let Some(active) = self.countdown.as_mut() {
                    if !active.state.cancelled {
                        active.handle.cancel();
                        active.state.cancelled = true;
                        self.presenter.countdown(&active.state);
                        self.log.info(
                            &format!("Automatic {} cancelled by user", active.state.action),
                            self.job_id.clone(),
                        );
                    }
                }
                None
            }
            AppEvent::CloseRequested => Some(SessionOutcome::Closed),
        }
    }

    fn on_job_completed(&mut self, outcome: JobOutcome) -> Option<SessionOutcome> {
        if self.job_done {
            return None;
        }
        self.job_done = true;

        self.progress.apply(100);
        self.progress.status_text = "Completed".to_string();
        self.presenter.progress(&self.progress);
        self.presenter.job_finished(&outcome);

        self.log.info(
            &format!(
                "Backup completed. Log: {} (tool exit code: {})",
                outcome.log_path.display(),
                outcome
                    .exit_code
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "unknown".to_string())
            ),
            self.job_id.clone(),
        );

        match self.scheduler.on_job_complete(&self.config, &outcome) {
            PostActionPlan::Nothing => Some(SessionOutcome::Completed),
            PostActionPlan::CloseRequested => None,
            PostActionPlan::Countdown(handle) => {
                let state = countdown_state(handle.action, handle.seconds);
                self.log.warn(
                    &format!("PC will {} in {} seconds", handle.action, handle.seconds),
                    self.job_id.clone(),
                );
                self.presenter.countdown(&state);
                self.countdown = Some(ActiveCountdown { state, handle });
                None
            }
        }
    }
}
