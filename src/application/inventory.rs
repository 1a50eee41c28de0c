use crate::domain::models::{Tree, TreeType, UserStats};
use crate::infrastructure::api_client::ForestApi;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::stats_cache::StatsCache;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatsSource {
    Server,
    Cache,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsView {
    pub stats: UserStats,
    pub source: StatsSource,
}

#[derive(Clone)]
pub struct InventoryService {
    api: Arc<dyn ForestApi>,
    stats_cache: StatsCache,
}

impl InventoryService {
    pub fn new(api: Arc<dyn ForestApi>, stats_cache: StatsCache) -> Self {
        Self { api, stats_cache }
    }

    pub async fn list_trees(&self, category: Option<&str>) -> Vec<Tree> {
        let trees = match self.api.list_trees().await {
            Ok(trees) => trees,
            Err(error) => {
                tracing::warn!(error = %error, "could not load trees");
                return Vec::new();
            }
        };
        match category.map(str::trim).filter(|category| !category.is_empty()) {
            Some(category) => trees
                .into_iter()
                .filter(|tree| tree.category.eq_ignore_ascii_case(category))
                .collect(),
            None => trees,
        }
    }

    pub async fn tree_types(&self) -> Vec<TreeType> {
        match self.api.tree_types().await {
            Ok(tree_types) => tree_types,
            Err(error) => {
                tracing::warn!(error = %error, "could not load tree types");
                Vec::new()
            }
        }
    }

    pub async fn update_description(
        &self,
        tree_id: &str,
        description: &str,
    ) -> Result<Tree, InfraError> {
        let tree_id = tree_id.trim();
        if tree_id.is_empty() {
            return Err(InfraError::InvalidInput("tree id is required".to_string()));
        }
        let tree = self
            .api
            .list_trees()
            .await?
            .into_iter()
            .find(|tree| tree.id == tree_id)
            .ok_or_else(|| InfraError::InvalidInput(format!("tree not found: {tree_id}")))?;

        let update = tree.with_description(description).map_err(InfraError::InvalidInput)?;
        self.api.update_tree(tree_id, &update).await?;
        tracing::info!(tree_id, "tree description updated");

        Ok(Tree {
            description: update.description,
            ..tree
        })
    }

    pub async fn delete_tree(&self, tree_id: &str) -> Result<(), InfraError> {
        let tree_id = tree_id.trim();
        if tree_id.is_empty() {
            return Err(InfraError::InvalidInput("tree id is required".to_string()));
        }
        self.api.delete_tree(tree_id).await?;
        tracing::info!(tree_id, "tree deleted");
        Ok(())
    }

    pub async fn stats(&self) -> StatsView {
        match self.api.user_stats().await {
            Ok(stats) => {
                if let Err(error) = self.stats_cache.save(&stats) {
                    tracing::warn!(error = %error, "could not mirror stats locally");
                }
                StatsView {
                    stats,
                    source: StatsSource::Server,
                }
            }
            Err(error) => {
                tracing::warn!(error = %error, "stats unavailable, reading local cache");
                let stats = self.stats_cache.load().unwrap_or_else(|error| {
                    tracing::warn!(error = %error, "local stats cache unreadable");
                    UserStats::default()
                });
                StatsView {
                    stats,
                    source: StatsSource::Cache,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::storage::InMemoryKeyValueStore;
    use crate::test_support::{FakeForestApi, sample_tree};

    fn service(api: FakeForestApi) -> (Arc<FakeForestApi>, StatsCache, InventoryService) {
        let api = Arc::new(api);
        let cache = StatsCache::new(Arc::new(InMemoryKeyValueStore::default()));
        let service = InventoryService::new(api.clone(), cache.clone());
        (api, cache, service)
    }

    fn forest() -> FakeForestApi {
        let api = FakeForestApi::new();
        let mut pine = sample_tree("pine");
        pine.name = "Pino".to_string();
        pine.category = "Conífera".to_string();
        *api.trees.lock().expect("trees") = vec![sample_tree("oak"), pine];
        api
    }

    #[tokio::test]
    async fn listing_failure_reads_as_empty_forest() {
        let api = forest();
        *api.tree_listing_failure.lock().expect("listing failure") = Some(500);
        let (_, _, service) = service(api);

        assert!(service.list_trees(None).await.is_empty());
    }

    #[tokio::test]
    async fn category_filter_ignores_case() {
        let (_, _, service) = service(forest());

        let trees = service.list_trees(Some("bosque")).await;
        assert_eq!(trees.len(), 1);
        assert_eq!(trees[0].id, "oak");
        assert_eq!(service.list_trees(Some("  ")).await.len(), 2);
    }

    #[tokio::test]
    async fn description_update_keeps_other_fields() {
        let (api, _, service) = service(forest());

        let updated = service
            .update_description("pine", "  Plantado en otoño  ")
            .await
            .expect("update");

        assert_eq!(updated.description, "Plantado en otoño");
        assert_eq!(updated.name, "Pino");
        let stored = api.trees.lock().expect("trees").clone();
        let pine = stored.iter().find(|tree| tree.id == "pine").expect("pine");
        assert_eq!(pine.description, "Plantado en otoño");
        assert_eq!(pine.category, "Conífera");
    }

    #[tokio::test]
    async fn blank_description_or_unknown_tree_is_rejected() {
        let (_, _, service) = service(forest());

        assert!(matches!(
            service.update_description("oak", "   ").await,
            Err(InfraError::InvalidInput(_))
        ));
        assert!(matches!(
            service.update_description("birch", "nuevo").await,
            Err(InfraError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn delete_removes_tree_and_rejects_empty_id() {
        let (api, _, service) = service(forest());

        service.delete_tree("oak").await.expect("delete");
        assert_eq!(api.trees.lock().expect("trees").len(), 1);
        assert!(matches!(
            service.delete_tree(" ").await,
            Err(InfraError::InvalidInput(_))
        ));
        assert_eq!(service.delete_tree("oak").await.expect_err("gone").status(), Some(404));
    }

    #[tokio::test]
    async fn stats_fall_back_to_the_mirror() {
        let api = FakeForestApi::new();
        *api.stats.lock().expect("stats") = UserStats {
            total_trees: 3,
            pomodoros_completed: 3,
            total_focus_minutes: 75,
        };
        let (api, cache, service) = service(api);

        let fresh = service.stats().await;
        assert_eq!(fresh.source, StatsSource::Server);
        assert_eq!(cache.load().expect("cache"), fresh.stats);

        *api.stats_failure.lock().expect("stats failure") = Some(502);
        let offline = service.stats().await;
        assert_eq!(offline.source, StatsSource::Cache);
        assert_eq!(offline.stats, fresh.stats);
    }

    #[tokio::test]
    async fn tree_types_are_listed() {
        let (_, _, service) = service(FakeForestApi::new());
        let types = service.tree_types().await;
        assert_eq!(types.len(), 1);
        assert_eq!(types[0].name, "Secuoya");
    }
}
