use crate::application::display::{Notice, NoticeLevel, SessionDisplay};
use crate::application::retry::{RetryPolicy, retry_on_server_error};
use crate::domain::models::{StatsDelta, Tree, UserStats};
use crate::infrastructure::api_client::ForestApi;
use crate::infrastructure::config::ClientConfig;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::stats_cache::StatsCache;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionOutcome {
    pub tree: Tree,
    pub message: Option<String>,
    pub stats: Option<UserStats>,
    pub stats_synced: bool,
}

#[derive(Clone)]
pub struct CompletionReconciler {
    api: Arc<dyn ForestApi>,
    display: Arc<dyn SessionDisplay>,
    cache: StatsCache,
    completion_policy: RetryPolicy,
    stats_policy: RetryPolicy,
}

impl CompletionReconciler {
    pub fn new(
        api: Arc<dyn ForestApi>,
        display: Arc<dyn SessionDisplay>,
        cache: StatsCache,
        completion_policy: RetryPolicy,
        stats_policy: RetryPolicy,
    ) -> Self {
        Self {
            api,
            display,
            cache,
            completion_policy,
            stats_policy,
        }
    }

    pub fn from_config(
        api: Arc<dyn ForestApi>,
        display: Arc<dyn SessionDisplay>,
        cache: StatsCache,
        config: &ClientConfig,
    ) -> Self {
        let backoff = config.completion_initial_backoff();
        Self::new(
            api,
            display,
            cache,
            RetryPolicy::new(config.completion_max_retries, backoff),
            RetryPolicy::new(config.stats_max_retries, backoff),
        )
    }

    /// Runs after the session has been torn down. Fails only when the
    /// completion itself could not be registered.
    pub async fn reconcile(&self, duration_minutes: u32) -> Result<CompletionOutcome, InfraError> {
        let api = &self.api;
        let earned = match retry_on_server_error(&self.completion_policy, "complete-pomodoro", || {
            api.complete_pomodoro()
        })
        .await
        {
            Ok(earned) => earned,
            Err(error) => {
                tracing::error!(error = %error, "completion was not registered");
                self.display.notify(Notice::new(
                    NoticeLevel::Error,
                    format!(
                        "Could not register the completed pomodoro: {error}. Your local progress is safe."
                    ),
                ));
                return Err(error);
            }
        };
        tracing::info!(tree_id = %earned.tree.id, duration_minutes, "pomodoro completed");

        let (stats, stats_synced) = self
            .sync_stats(StatsDelta::for_session(duration_minutes))
            .await;
        if let Some(stats) = &stats {
            self.display.show_stats(stats);
        }

        self.display.show_earned_tree(&earned.tree);
        self.display.notify(Notice::new(
            NoticeLevel::Success,
            earned
                .message
                .clone()
                .unwrap_or_else(|| "Pomodoro completed! You earned a new tree.".to_string()),
        ));

        Ok(CompletionOutcome {
            tree: earned.tree,
            message: earned.message,
            stats,
            stats_synced,
        })
    }

    async fn sync_stats(&self, delta: StatsDelta) -> (Option<UserStats>, bool) {
        let api = &self.api;
        let snapshot = match retry_on_server_error(&self.stats_policy, "user-stats", || {
            api.user_stats()
        })
        .await
        {
            Ok(snapshot) => snapshot,
            Err(error) => {
                tracing::warn!(error = %error, "could not read stats after completion");
                return (None, false);
            }
        };

        let merged = snapshot.merged_with(delta);
        let pushed = retry_on_server_error(&self.stats_policy, "update-user-stats", || {
            api.update_user_stats(&merged)
        })
        .await;
        if let Err(error) = &pushed {
            tracing::warn!(error = %error, "could not push merged stats");
        }

        // the mirror follows the merged value even when the push failed;
        // the next successful server read replaces it
        if let Err(error) = self.cache.save(&merged) {
            tracing::warn!(error = %error, "could not mirror stats locally");
        }

        (Some(merged), pushed.is_ok())
    }
}
