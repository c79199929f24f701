use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::config::{CountdownSettings, NotificationSettings};
use crate::job_engine::types::{
    AppEvent, CountdownPhase, CountdownState, JobConfig, JobOutcome, PostAction, PowerAction,
};
use crate::system_integration::{run_power_action, Notifier, PowerControl};

/// A running reboot/shutdown countdown.
pub struct CountdownHandle {
    pub action: PowerAction,
    pub seconds: u32,
    token: CancellationToken,
    task: JoinHandle<CountdownPhase>,
}

impl CountdownHandle {
    /// Requests cancellation. Takes effect before the next tick starts.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Waits for the worker and returns the terminal phase. Fails if the
    /// worker panicked or was aborted.
    pub async fn join(self) -> Result<CountdownPhase, JoinError> {
        self.task.await
    }
}

/// What the scheduler decided for a finished job.
pub enum PostActionPlan {
    Nothing,
    /// `CloseRequested` was posted to the event loop.
    CloseRequested,
    Countdown(CountdownHandle),
}

/// Runs the configured follow-up once a job has completed.
pub struct PostActionScheduler {
    notifier: Arc<dyn Notifier>,
    power: Arc<dyn PowerControl>,
    countdown: CountdownSettings,
    notification: NotificationSettings,
    events: UnboundedSender<AppEvent>,
}

impl PostActionScheduler {
    pub fn new(
        notifier: Arc<dyn Notifier>,
        power: Arc<dyn PowerControl>,
        countdown: CountdownSettings,
        notification: NotificationSettings,
        events: UnboundedSender<AppEvent>,
    ) -> Self {
        Self {
            notifier,
            power,
            countdown,
            notification,
            events,
        }
    }

    /// Called exactly once per job, after its `JobCompleted` event.
    /// Must be called from within a tokio runtime.
    pub fn on_job_complete(&self, config: &JobConfig, outcome: &JobOutcome) -> PostActionPlan {
        tracing::debug!(
            log = %outcome.log_path.display(),
            post_action = ?config.post_action,
            "Job complete"
        );

        if config.notify {
            self.send_notification();
        }

        match config.post_action {
            PostAction::None => PostActionPlan::Nothing,
            PostAction::Close => {
                let _ = self.events.send(AppEvent::CloseRequested);
                PostActionPlan::CloseRequested
            }
            PostAction::Reboot => {
                PostActionPlan::Countdown(self.start_countdown(PowerAction::Reboot))
            }
            PostAction::Shutdown => {
                PostActionPlan::Countdown(self.start_countdown(PowerAction::Shutdown))
            }
        }
    }

    /// Fire and forget; delivery failures never reach the caller.
    fn send_notification(&self) {
        let notifier = Arc::clone(&self.notifier);
        let NotificationSettings {
            title,
            body,
            timeout_secs,
        } = self.notification.clone();

        tokio::task::spawn_blocking(move || {
            if let Err(e) = notifier.notify(&title, &body, timeout_secs) {
                tracing::debug!(error = %e, "Notification not delivered");
            }
        });
    }

    pub fn start_countdown(&self, action: PowerAction) -> CountdownHandle {
        let token = CancellationToken::new();
        let task = tokio::spawn(run_countdown(
            action,
            self.countdown.seconds,
            self.countdown.tick(),
            token.clone(),
            Arc::clone(&self.power),
            self.events.clone(),
        ));

        CountdownHandle {
            action,
            seconds: self.countdown.seconds,
            token,
            task,
        }
    }
}

/// Initial user-visible state for a countdown of `seconds`.
pub fn countdown_state(action: PowerAction, seconds: u32) -> CountdownState {
    CountdownState {
        action,
        seconds_remaining: seconds,
        cancelled: false,
    }
}

/// Ticks `Pending(seconds) .. Pending(0)`, one `tick` apart, then fires the
/// power action exactly once unless `token` was cancelled first.
pub async fn run_countdown(
    action: PowerAction,
    seconds: u32,
    tick: Duration,
    token: CancellationToken,
    power: Arc<dyn PowerControl>,
    events: UnboundedSender<AppEvent>,
) -> CountdownPhase {
    let mut phase = CountdownPhase::Pending(seconds);

    while let CountdownPhase::Pending(remaining) = phase {
        if token.is_cancelled() {
            phase = phase.cancel();
            break;
        }

        let _ = events.send(AppEvent::CountdownTick { action, remaining });
        if remaining == 0 {
            phase = phase.advance();
            break;
        }

        tokio::select! {
            _ = token.cancelled() => phase = phase.cancel(),
            _ = tokio::time::sleep(tick) => phase = phase.advance(),
        }
    }

    if phase == CountdownPhase::Fired {
        tracing::warn!(%action, "Countdown expired");
        let result = tokio::task::spawn_blocking(move || run_power_action(power.as_ref(), action))
            .await
            .map_err(anyhow::Error::from)
            .and_then(|r| r);
        if let Err(e) = result {
            tracing::error!(%action, error = %e, "Power action failed");
            let _ = events.send(AppEvent::PowerActionFailed {
                action,
                message: e.to_string(),
            });
        }
    } else {
        tracing::info!(%action, "Countdown cancelled");
    }

    let _ = events.send(AppEvent::CountdownResolved { action, phase });
    phase
}
