use crate::application::display::SessionDisplay;
use crate::application::phrases::{PhraseRotator, RotationSettings};
use crate::application::reconcile::{CompletionOutcome, CompletionReconciler};
use crate::application::timer::{format_remaining, remaining_seconds, run_tick_loop};
use crate::infrastructure::api_client::ForestApi;
use crate::infrastructure::audio::{AudioHandle, AudioPlayer};
use crate::infrastructure::config::ClientConfig;
use crate::infrastructure::error::InfraError;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Default)]
pub struct SessionEpoch {
    current: Arc<AtomicU64>,
}

impl SessionEpoch {
    pub fn advance(&self) -> u64 {
        self.current.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn current(&self) -> u64 {
        self.current.load(Ordering::SeqCst)
    }

    pub fn guard(&self, epoch: u64) -> SessionGuard {
        SessionGuard {
            epoch,
            current: Arc::clone(&self.current),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionGuard {
    epoch: u64,
    current: Arc<AtomicU64>,
}

impl SessionGuard {
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn is_current(&self) -> bool {
        self.current.load(Ordering::SeqCst) == self.epoch
    }
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub default_duration_minutes: u32,
    pub rotation: RotationSettings,
}

impl From<&ClientConfig> for SessionSettings {
    fn from(config: &ClientConfig) -> Self {
        Self {
            default_duration_minutes: config.default_duration_minutes,
            rotation: RotationSettings::from(config),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    Idle,
    Starting,
    Running,
    Reconciling,
    Completed(CompletionOutcome),
    CompletionFailed(String),
    StartFailed(String),
    Stopped,
}

impl SessionStatus {
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            Self::Completed(_) | Self::CompletionFailed(_) | Self::StartFailed(_) | Self::Stopped
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Remaining(u64),
    Expired,
    Inactive,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub running: bool,
    pub epoch: u64,
    pub duration_minutes: Option<u32>,
    pub started_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub remaining_seconds: Option<u64>,
}

enum SessionState {
    Idle,
    Starting { epoch: u64, duration_minutes: u32 },
    Running(ActiveSession),
}

struct ActiveSession {
    epoch: u64,
    duration_minutes: u32,
    started_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
    deadline: Instant,
    audio: Option<Box<dyn AudioHandle>>,
    cancel: CancellationToken,
}

impl ActiveSession {
    fn release(&mut self) {
        self.cancel.cancel();
        if let Some(mut audio) = self.audio.take() {
            audio.stop();
        }
    }
}

impl Drop for ActiveSession {
    fn drop(&mut self) {
        self.release();
    }
}

struct ControllerInner {
    api: Arc<dyn ForestApi>,
    display: Arc<dyn SessionDisplay>,
    audio: Arc<dyn AudioPlayer>,
    reconciler: CompletionReconciler,
    settings: SessionSettings,
    epoch: SessionEpoch,
    state: Mutex<SessionState>,
    status: watch::Sender<SessionStatus>,
}

/// Owns the lifecycle of at most one pomodoro session at a time.
///
/// Every exit path (stop, expiry, manual completion, a superseded start)
/// goes through dropping the [`ActiveSession`], which cancels the countdown
/// and phrase tasks and stops the ambient audio.
#[derive(Clone)]
pub struct SessionController {
    inner: Arc<ControllerInner>,
}

impl SessionController {
    pub fn new(
        api: Arc<dyn ForestApi>,
        display: Arc<dyn SessionDisplay>,
        audio: Arc<dyn AudioPlayer>,
        reconciler: CompletionReconciler,
        settings: SessionSettings,
    ) -> Self {
        let (status, _) = watch::channel(SessionStatus::Idle);
        Self {
            inner: Arc::new(ControllerInner {
                api,
                display,
                audio,
                reconciler,
                settings,
                epoch: SessionEpoch::default(),
                state: Mutex::new(SessionState::Idle),
                status,
            }),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.inner.status.subscribe()
    }

    pub fn default_duration_minutes(&self) -> u32 {
        self.inner.settings.default_duration_minutes
    }

    pub fn is_running(&self) -> bool {
        self.lock_state()
            .map(|state| matches!(*state, SessionState::Running(_)))
            .unwrap_or(false)
    }

    pub fn snapshot(&self) -> Result<SessionSnapshot, InfraError> {
        let state = self.lock_state()?;
        let epoch = self.inner.epoch.current();
        Ok(match &*state {
            SessionState::Running(active) => SessionSnapshot {
                running: true,
                epoch,
                duration_minutes: Some(active.duration_minutes),
                started_at: Some(active.started_at),
                ends_at: Some(active.ends_at),
                remaining_seconds: Some(remaining_seconds(active.deadline, Instant::now())),
            },
            SessionState::Idle | SessionState::Starting { .. } => SessionSnapshot {
                running: false,
                epoch,
                duration_minutes: None,
                started_at: None,
                ends_at: None,
                remaining_seconds: None,
            },
        })
    }

    pub async fn start(&self, duration_minutes: u32) -> Result<SessionSnapshot, InfraError> {
        if duration_minutes == 0 {
            return Err(InfraError::InvalidInput(
                "duration must be at least one minute".to_string(),
            ));
        }

        let guard = {
            let mut state = self.lock_state()?;
            if !matches!(*state, SessionState::Idle) {
                return Err(InfraError::Session(
                    "a pomodoro is already in progress".to_string(),
                ));
            }
            let epoch = self.inner.epoch.advance();
            *state = SessionState::Starting {
                epoch,
                duration_minutes,
            };
            self.inner.epoch.guard(epoch)
        };
        self.publish(SessionStatus::Starting);

        let started = match self.inner.api.start_pomodoro(duration_minutes).await {
            Ok(started) => started,
            Err(error) => {
                self.abandon_start(&guard)?;
                tracing::warn!(error = %error, "start request failed");
                self.publish(SessionStatus::StartFailed(error.to_string()));
                return Err(error);
            }
        };

        if !guard.is_current() {
            return Err(InfraError::Session(
                "session was stopped before it started".to_string(),
            ));
        }

        let audio = match self.inner.audio.play_loop(&started.audio_url) {
            Ok(handle) => Some(handle),
            Err(error) => {
                tracing::warn!(error = %error, "ambient audio unavailable");
                None
            }
        };
        let length = Duration::from_secs(u64::from(duration_minutes) * 60);
        let started_at = Utc::now();
        let cancel = CancellationToken::new();
        let active = ActiveSession {
            epoch: guard.epoch(),
            duration_minutes,
            started_at,
            ends_at: started_at + chrono::Duration::minutes(i64::from(duration_minutes)),
            deadline: Instant::now() + length,
            audio,
            cancel: cancel.clone(),
        };

        {
            let mut state = self.lock_state()?;
            if !matches!(*state, SessionState::Starting { epoch, .. } if epoch == guard.epoch()) {
                // stopped while the start request was in flight
                drop(state);
                drop(active);
                return Err(InfraError::Session(
                    "session was stopped before it started".to_string(),
                ));
            }
            *state = SessionState::Running(active);
            let display = &self.inner.display;
            display.show_remaining(&format_remaining(length.as_secs()));
            display.show_phrase(&started.motivational_phrase);
        }

        tokio::spawn(run_tick_loop(self.clone(), guard.clone(), cancel.clone()));
        PhraseRotator::new(
            Arc::clone(&self.inner.api),
            Arc::clone(&self.inner.display),
            self.inner.settings.rotation.clone(),
            guard.clone(),
            cancel,
            &started.motivational_phrase,
        )
        .spawn();

        self.publish(SessionStatus::Running);
        tracing::info!(epoch = guard.epoch(), duration_minutes, "pomodoro started");
        self.snapshot()
    }

    /// Tears the current session down without awarding anything. Returns
    /// whether there was a session to stop.
    pub fn stop(&self) -> Result<bool, InfraError> {
        let previous = {
            let mut state = self.lock_state()?;
            if matches!(*state, SessionState::Idle) {
                return Ok(false);
            }
            let previous = std::mem::replace(&mut *state, SessionState::Idle);
            self.inner.epoch.advance();
            previous
        };
        let minutes = match &previous {
            SessionState::Running(active) => active.duration_minutes,
            SessionState::Starting {
                duration_minutes, ..
            } => *duration_minutes,
            SessionState::Idle => self.inner.settings.default_duration_minutes,
        };
        drop(previous);

        let reset = u64::from(minutes) * 60;
        self.inner.display.show_remaining(&format_remaining(reset));
        self.publish(SessionStatus::Stopped);
        tracing::info!(epoch = self.inner.epoch.current(), "pomodoro stopped");
        Ok(true)
    }

    pub fn tick(&self) -> TickOutcome {
        let guard = self.inner.epoch.guard(self.inner.epoch.current());
        self.tick_for(&guard)
    }

    pub(crate) fn tick_for(&self, guard: &SessionGuard) -> TickOutcome {
        let state = match self.lock_state() {
            Ok(state) => state,
            Err(error) => {
                tracing::error!(error = %error, "session state unavailable");
                return TickOutcome::Inactive;
            }
        };
        let SessionState::Running(active) = &*state else {
            return TickOutcome::Inactive;
        };
        if active.epoch != guard.epoch() || !guard.is_current() {
            return TickOutcome::Inactive;
        }

        let seconds = remaining_seconds(active.deadline, Instant::now());
        self.inner.display.show_remaining(&format_remaining(seconds));
        if seconds == 0 {
            TickOutcome::Expired
        } else {
            TickOutcome::Remaining(seconds)
        }
    }

    pub async fn complete(&self) -> Result<CompletionOutcome, InfraError> {
        let active = self
            .take_running(None)?
            .ok_or_else(|| InfraError::Session("no pomodoro is running".to_string()))?;
        self.reconcile(active).await
    }

    pub(crate) async fn complete_expired(&self, guard: &SessionGuard) {
        let active = match self.take_running(Some(guard.epoch())) {
            Ok(Some(active)) => active,
            Ok(None) => return,
            Err(error) => {
                tracing::error!(error = %error, "could not finish expired session");
                return;
            }
        };
        // failures were already surfaced on the display
        let _ = self.reconcile(active).await;
    }

    async fn reconcile(&self, active: ActiveSession) -> Result<CompletionOutcome, InfraError> {
        let duration_minutes = active.duration_minutes;
        drop(active);

        self.publish(SessionStatus::Reconciling);
        let result = self.inner.reconciler.reconcile(duration_minutes).await;
        match &result {
            Ok(outcome) => self.publish(SessionStatus::Completed(outcome.clone())),
            Err(error) => self.publish(SessionStatus::CompletionFailed(error.to_string())),
        }
        result
    }

    fn take_running(&self, expected_epoch: Option<u64>) -> Result<Option<ActiveSession>, InfraError> {
        let mut state = self.lock_state()?;
        let matches = match &*state {
            SessionState::Running(active) => expected_epoch.is_none_or(|epoch| epoch == active.epoch),
            _ => false,
        };
        if !matches {
            return Ok(None);
        }
        let previous = std::mem::replace(&mut *state, SessionState::Idle);
        self.inner.epoch.advance();
        match previous {
            SessionState::Running(active) => Ok(Some(active)),
            _ => Ok(None),
        }
    }

    fn abandon_start(&self, guard: &SessionGuard) -> Result<(), InfraError> {
        let mut state = self.lock_state()?;
        if matches!(*state, SessionState::Starting { epoch, .. } if epoch == guard.epoch()) {
            *state = SessionState::Idle;
        }
        Ok(())
    }

    fn publish(&self, status: SessionStatus) {
        self.inner.status.send_replace(status);
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, SessionState>, InfraError> {
        self.inner
            .state
            .lock()
            .map_err(|_| InfraError::Session("session state lock poisoned".to_string()))
    }
}
