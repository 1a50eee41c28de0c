use crate::application::display::SessionDisplay;
use crate::application::session::SessionGuard;
use crate::infrastructure::api_client::ForestApi;
use crate::infrastructure::config::ClientConfig;
use rand::seq::SliceRandom;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

const DECORATIVE_MARKERS: [&str; 6] = ["🌱", "🌿", "🍃", "🌳", "🌲", "✨"];

#[derive(Debug, Clone)]
pub struct PhraseHistory {
    entries: VecDeque<String>,
    capacity: usize,
}

impl PhraseHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, phrase: impl Into<String>) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(phrase.into());
    }

    pub fn contains(&self, phrase: &str) -> bool {
        self.entries.iter().any(|entry| entry == phrase)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }
}

#[derive(Debug, Clone)]
pub struct RotationSettings {
    pub interval: Duration,
    pub retry_delay: Duration,
    pub duplicate_retry_delay: Duration,
    pub max_duplicate_attempts: u32,
    pub crossfade: Duration,
    pub history_capacity: usize,
}

impl Default for RotationSettings {
    fn default() -> Self {
        Self::from(&ClientConfig::default())
    }
}

impl From<&ClientConfig> for RotationSettings {
    fn from(config: &ClientConfig) -> Self {
        Self {
            interval: config.phrase_interval(),
            retry_delay: config.phrase_retry_delay(),
            duplicate_retry_delay: config.duplicate_retry_delay(),
            max_duplicate_attempts: config.max_duplicate_attempts,
            crossfade: config.crossfade(),
            history_capacity: config.phrase_history_capacity,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotatorState {
    Idle,
    Scheduled,
    Fetching,
}

/// Prefixes a repeated phrase with a marker that the previous display did
/// not start with, so the text on screen visibly changes.
pub fn decorate_repeat(phrase: &str, previous_display: &str) -> String {
    let candidates: Vec<&str> = DECORATIVE_MARKERS
        .iter()
        .copied()
        .filter(|marker| !previous_display.starts_with(marker))
        .collect();
    let marker = candidates
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(DECORATIVE_MARKERS[0]);
    format!("{marker} {phrase}")
}

pub struct PhraseRotator {
    api: Arc<dyn ForestApi>,
    display: Arc<dyn SessionDisplay>,
    settings: RotationSettings,
    guard: SessionGuard,
    cancel: CancellationToken,
    history: PhraseHistory,
    last_displayed: String,
    state: RotatorState,
}

impl PhraseRotator {
    pub fn new(
        api: Arc<dyn ForestApi>,
        display: Arc<dyn SessionDisplay>,
        settings: RotationSettings,
        guard: SessionGuard,
        cancel: CancellationToken,
        initial_phrase: &str,
    ) -> Self {
        let mut history = PhraseHistory::new(settings.history_capacity);
        let initial_phrase = initial_phrase.trim();
        if !initial_phrase.is_empty() {
            history.push(initial_phrase);
        }
        Self {
            api,
            display,
            settings,
            guard,
            cancel,
            history,
            last_displayed: initial_phrase.to_string(),
            state: RotatorState::Idle,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub async fn run(mut self) {
        let mut delay = self.settings.interval;
        let mut duplicate_attempts: u32 = 0;

        loop {
            self.transition(RotatorState::Scheduled);
            if !self.wait(delay).await {
                break;
            }

            self.transition(RotatorState::Fetching);
            let fetched = self.api.motivational_phrase().await;
            if !self.is_live() {
                tracing::debug!(epoch = self.guard.epoch(), "dropping phrase for a stopped session");
                break;
            }

            let phrase = match fetched {
                Ok(phrase) => phrase.trim().to_string(),
                Err(error) => {
                    tracing::warn!(error = %error, "failed to fetch motivational phrase");
                    delay = self.settings.retry_delay;
                    continue;
                }
            };

            let repeated = self.history.contains(&phrase);
            if repeated {
                duplicate_attempts += 1;
                if duplicate_attempts < self.settings.max_duplicate_attempts {
                    tracing::debug!(attempt = duplicate_attempts, "phrase repeated, fetching another");
                    delay = self.settings.duplicate_retry_delay;
                    continue;
                }
            }
            duplicate_attempts = 0;

            let text = if repeated {
                decorate_repeat(&phrase, &self.last_displayed)
            } else {
                phrase.clone()
            };
            self.history.push(phrase);
            if !self.crossfade(text).await {
                break;
            }
            delay = self.settings.interval;
        }

        self.transition(RotatorState::Idle);
    }

    fn is_live(&self) -> bool {
        !self.cancel.is_cancelled() && self.guard.is_current()
    }

    async fn wait(&self, delay: Duration) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = sleep(delay) => self.is_live(),
        }
    }

    async fn crossfade(&mut self, text: String) -> bool {
        self.display.hide_phrase();
        if !self.wait(self.settings.crossfade).await {
            return false;
        }
        self.display.show_phrase(&text);
        self.last_displayed = text;
        true
    }

    fn transition(&mut self, next: RotatorState) {
        tracing::trace!(from = ?self.state, to = ?next, epoch = self.guard.epoch(), "phrase rotator");
        self.state = next;
    }
}
