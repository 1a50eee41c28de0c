use crate::domain::models::UserStats;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::storage::{
    KeyValueStore, POMODOROS_COMPLETED_KEY, TOTAL_FOCUS_MINUTES_KEY, TOTAL_TREES_KEY,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct StatsCache {
    store: Arc<dyn KeyValueStore>,
}

impl StatsCache {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Missing or unparseable counters read as zero.
    pub fn load(&self) -> Result<UserStats, InfraError> {
        Ok(UserStats {
            total_trees: self.counter(TOTAL_TREES_KEY)?,
            pomodoros_completed: self.counter(POMODOROS_COMPLETED_KEY)?,
            total_focus_minutes: self.counter(TOTAL_FOCUS_MINUTES_KEY)?,
        })
    }

    pub fn save(&self, stats: &UserStats) -> Result<(), InfraError> {
        self.store
            .set(POMODOROS_COMPLETED_KEY, &stats.pomodoros_completed.to_string())?;
        self.store
            .set(TOTAL_FOCUS_MINUTES_KEY, &stats.total_focus_minutes.to_string())?;
        self.store.set(TOTAL_TREES_KEY, &stats.total_trees.to_string())
    }

    pub fn clear(&self) -> Result<(), InfraError> {
        self.store.remove_all(&[
            POMODOROS_COMPLETED_KEY,
            TOTAL_FOCUS_MINUTES_KEY,
            TOTAL_TREES_KEY,
        ])
    }

    fn counter(&self, key: &str) -> Result<u64, InfraError> {
        Ok(self
            .store
            .get(key)?
            .and_then(|raw| raw.trim().parse::<u64>().ok())
            .unwrap_or(0))
    }
}
