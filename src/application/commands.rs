use crate::application::auth::AuthService;
use crate::application::bootstrap::bootstrap_workspace;
use crate::application::display::{Notice, NoticeLevel, SessionDisplay, TerminalDisplay};
use crate::application::inventory::{InventoryService, StatsView};
use crate::application::reconcile::{CompletionOutcome, CompletionReconciler};
use crate::application::session::{SessionController, SessionSettings, SessionStatus};
use crate::domain::models::{StoredCredentials, Tree, TreeType, UserProfile};
use crate::infrastructure::api_client::{ForestApi, ReqwestForestApi};
use crate::infrastructure::audio::{AnnouncingAudioPlayer, AudioPlayer};
use crate::infrastructure::config::{ClientConfig, CredentialBackend, load_client_config};
use crate::infrastructure::credential_store::{
    CredentialStore, KeyringCredentialStore, LocalCredentialStore,
};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::stats_cache::StatsCache;
use crate::infrastructure::storage::{KeyValueStore, SqliteKeyValueStore};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct AppState {
    workspace_root: PathBuf,
    config: ClientConfig,
    api: Arc<dyn ForestApi>,
    credentials: Arc<dyn CredentialStore>,
    stats_cache: StatsCache,
    display: Arc<dyn SessionDisplay>,
    audio: Arc<dyn AudioPlayer>,
}

impl AppState {
    pub fn new(workspace_root: PathBuf) -> Result<Self, InfraError> {
        let bootstrap = bootstrap_workspace(&workspace_root)?;
        let config = load_client_config(&bootstrap.config_dir)?;

        let store: Arc<dyn KeyValueStore> =
            Arc::new(SqliteKeyValueStore::new(&bootstrap.database_path));
        let credentials: Arc<dyn CredentialStore> = match config.credential_backend {
            CredentialBackend::Local => Arc::new(LocalCredentialStore::new(Arc::clone(&store))),
            CredentialBackend::Keyring => Arc::new(KeyringCredentialStore::default()),
        };
        let api: Arc<dyn ForestApi> = Arc::new(ReqwestForestApi::new(
            &config.api_base_url,
            Arc::clone(&credentials),
        )?);
        tracing::debug!(
            workspace = %bootstrap.workspace_root.display(),
            api = %config.api_base_url,
            "app state ready"
        );

        Ok(Self::with_collaborators(
            bootstrap.workspace_root,
            config,
            api,
            credentials,
            StatsCache::new(store),
            Arc::new(TerminalDisplay::new()),
            Arc::new(AnnouncingAudioPlayer),
        ))
    }

    pub fn with_collaborators(
        workspace_root: PathBuf,
        config: ClientConfig,
        api: Arc<dyn ForestApi>,
        credentials: Arc<dyn CredentialStore>,
        stats_cache: StatsCache,
        display: Arc<dyn SessionDisplay>,
        audio: Arc<dyn AudioPlayer>,
    ) -> Self {
        Self {
            workspace_root,
            config,
            api,
            credentials,
            stats_cache,
            display,
            audio,
        }
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn auth(&self) -> AuthService {
        AuthService::new(
            Arc::clone(&self.api),
            Arc::clone(&self.credentials),
            self.stats_cache.clone(),
        )
    }

    pub fn inventory(&self) -> InventoryService {
        InventoryService::new(Arc::clone(&self.api), self.stats_cache.clone())
    }

    pub fn session_controller(&self) -> SessionController {
        let reconciler = CompletionReconciler::from_config(
            Arc::clone(&self.api),
            Arc::clone(&self.display),
            self.stats_cache.clone(),
            &self.config,
        );
        SessionController::new(
            Arc::clone(&self.api),
            Arc::clone(&self.display),
            Arc::clone(&self.audio),
            reconciler,
            SessionSettings::from(&self.config),
        )
    }

    pub fn command_error(&self, command: &str, error: &InfraError) -> String {
        tracing::error!(command, error = %error, "command failed");
        self.display
            .notify(Notice::new(NoticeLevel::Error, error.to_string()));
        error.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    Completed(CompletionOutcome),
    CompletionFailed(String),
    Stopped,
}

pub async fn register_impl(
    state: &AppState,
    username: String,
    password: String,
    email: String,
) -> Result<(), InfraError> {
    state.auth().register(&username, &password, &email).await
}

pub async fn login_impl(
    state: &AppState,
    username: String,
    password: String,
) -> Result<StoredCredentials, InfraError> {
    state.auth().login(&username, &password).await
}

pub fn logout_impl(state: &AppState) -> Result<(), InfraError> {
    state.auth().logout()
}

pub async fn whoami_impl(state: &AppState) -> Result<UserProfile, InfraError> {
    let auth = state.auth();
    auth.require_authenticated()?;
    Ok(auth.current_user().await)
}

pub async fn stats_impl(state: &AppState) -> Result<StatsView, InfraError> {
    state.auth().require_authenticated()?;
    Ok(state.inventory().stats().await)
}

pub async fn list_trees_impl(
    state: &AppState,
    category: Option<String>,
) -> Result<Vec<Tree>, InfraError> {
    state.auth().require_authenticated()?;
    Ok(state.inventory().list_trees(category.as_deref()).await)
}

pub async fn tree_types_impl(state: &AppState) -> Result<Vec<TreeType>, InfraError> {
    Ok(state.inventory().tree_types().await)
}

pub async fn describe_tree_impl(
    state: &AppState,
    tree_id: String,
    description: String,
) -> Result<Tree, InfraError> {
    state.auth().require_authenticated()?;
    state
        .inventory()
        .update_description(&tree_id, &description)
        .await
}

pub async fn delete_tree_impl(state: &AppState, tree_id: String) -> Result<(), InfraError> {
    state.auth().require_authenticated()?;
    state.inventory().delete_tree(&tree_id).await
}

/// Runs one session to its end. `interrupt` resolving stops the session, or
/// completes it early when `complete_on_interrupt` is set.
pub async fn run_session_impl<F>(
    state: &AppState,
    minutes: Option<u32>,
    complete_on_interrupt: bool,
    interrupt: F,
) -> Result<SessionEnd, InfraError>
where
    F: Future<Output = ()>,
{
    state.auth().require_authenticated()?;
    let controller = state.session_controller();
    let minutes = minutes.unwrap_or(controller.default_duration_minutes());
    let mut status = controller.subscribe();
    controller.start(minutes).await?;

    tokio::pin!(interrupt);
    let mut interrupted = false;
    loop {
        tokio::select! {
            _ = &mut interrupt, if !interrupted => {
                interrupted = true;
                if !controller.is_running() {
                    // already reconciling; let it finish
                    continue;
                }
                if complete_on_interrupt {
                    return match controller.complete().await {
                        Ok(outcome) => Ok(SessionEnd::Completed(outcome)),
                        Err(error) => Ok(SessionEnd::CompletionFailed(error.to_string())),
                    };
                }
                controller.stop()?;
                return Ok(SessionEnd::Stopped);
            }
            changed = status.changed() => {
                if changed.is_err() {
                    return Ok(SessionEnd::Stopped);
                }
                let current = status.borrow_and_update().clone();
                match current {
                    SessionStatus::Completed(outcome) => return Ok(SessionEnd::Completed(outcome)),
                    SessionStatus::CompletionFailed(message) => {
                        return Ok(SessionEnd::CompletionFailed(message));
                    }
                    SessionStatus::Stopped => return Ok(SessionEnd::Stopped),
                    _ => {}
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::UserStats;
    use crate::infrastructure::credential_store::InMemoryCredentialStore;
    use crate::infrastructure::storage::InMemoryKeyValueStore;
    use crate::test_support::{
        FakeAudioPlayer, FakeForestApi, RecordingDisplay, TempWorkspace, sample_tree,
    };
    use std::time::Duration;

    struct Fixture {
        api: Arc<FakeForestApi>,
        display: Arc<RecordingDisplay>,
        state: AppState,
    }

    fn fixture(api: FakeForestApi) -> Fixture {
        let api = Arc::new(api);
        let display = Arc::new(RecordingDisplay::default());
        let state = AppState::with_collaborators(
            PathBuf::from("."),
            ClientConfig::default(),
            api.clone(),
            Arc::new(InMemoryCredentialStore::default()),
            StatsCache::new(Arc::new(InMemoryKeyValueStore::default())),
            display.clone(),
            Arc::new(FakeAudioPlayer::default()),
        );
        Fixture {
            api,
            display,
            state,
        }
    }

    async fn logged_in(api: FakeForestApi) -> Fixture {
        let fixture = fixture(api);
        login_impl(&fixture.state, "ana".to_string(), "secret".to_string())
            .await
            .expect("login");
        fixture
    }

    #[test]
    fn app_state_bootstraps_a_fresh_workspace() {
        let workspace = TempWorkspace::new("app-state");

        let state = AppState::new(workspace.path().to_path_buf()).expect("app state");

        assert_eq!(state.config().default_duration_minutes, 25);
        assert!(
            state
                .workspace_root()
                .join("state")
                .join("forest.sqlite")
                .is_file()
        );
        assert!(!state.auth().is_authenticated().expect("auth state"));
    }

    #[tokio::test]
    async fn commands_require_login() {
        let fixture = fixture(FakeForestApi::new());

        let error = stats_impl(&fixture.state).await.expect_err("not logged in");
        assert!(matches!(error, InfraError::Credential(_)));
        assert!(matches!(
            run_session_impl(&fixture.state, Some(1), false, std::future::pending()).await,
            Err(InfraError::Credential(_))
        ));
        assert_eq!(FakeForestApi::calls(&fixture.api.start_calls), 0);
    }

    #[tokio::test]
    async fn command_errors_are_shown_as_notices() {
        let fixture = fixture(FakeForestApi::new());
        let error = InfraError::Session("a pomodoro is already in progress".to_string());

        let message = fixture.state.command_error("start", &error);

        assert_eq!(message, "session error: a pomodoro is already in progress");
        assert_eq!(fixture.display.notices().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_start_is_reported_once() {
        let api = FakeForestApi::new();
        *api.start_failure.lock().expect("start failure") = Some(500);
        let fixture = logged_in(api).await;

        let error = run_session_impl(&fixture.state, Some(25), false, std::future::pending())
            .await
            .expect_err("start fails");
        assert!(fixture.display.notices().is_empty());

        fixture.state.command_error("start", &error);

        let notices = fixture.display.notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].message, "Error 500");
    }

    #[tokio::test(start_paused = true)]
    async fn session_runs_to_completion() {
        let fixture = logged_in(FakeForestApi::new()).await;

        let end = run_session_impl(&fixture.state, Some(1), false, std::future::pending())
            .await
            .expect("session");

        let SessionEnd::Completed(outcome) = end else {
            panic!("expected completion, got {end:?}");
        };
        assert_eq!(outcome.stats.map(|stats| stats.total_focus_minutes), Some(1));
        assert_eq!(fixture.display.remaining().last().map(String::as_str), Some("00:00"));
    }

    #[tokio::test(start_paused = true)]
    async fn interrupt_stops_without_a_tree() {
        let fixture = logged_in(FakeForestApi::new()).await;

        let end = run_session_impl(
            &fixture.state,
            None,
            false,
            tokio::time::sleep(Duration::from_secs(90)),
        )
        .await
        .expect("session");

        assert_eq!(end, SessionEnd::Stopped);
        assert_eq!(FakeForestApi::calls(&fixture.api.completion_calls), 0);
        assert!(fixture.display.earned_trees().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn interrupt_can_complete_early() {
        let fixture = logged_in(FakeForestApi::new()).await;

        let end = run_session_impl(
            &fixture.state,
            Some(25),
            true,
            tokio::time::sleep(Duration::from_secs(90)),
        )
        .await
        .expect("session");

        assert!(matches!(end, SessionEnd::Completed(_)));
        assert_eq!(FakeForestApi::calls(&fixture.api.completion_calls), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_completion_is_reported() {
        let api = FakeForestApi::new();
        api.completion_failures.lock().expect("failures").push_back(403);
        let fixture = logged_in(api).await;

        let end = run_session_impl(&fixture.state, Some(1), false, std::future::pending())
            .await
            .expect("session");

        assert!(matches!(end, SessionEnd::CompletionFailed(_)));
    }

    #[tokio::test]
    async fn inventory_commands_round_trip_through_the_api() {
        let api = FakeForestApi::new();
        *api.trees.lock().expect("trees") = vec![sample_tree("oak")];
        *api.stats.lock().expect("stats") = UserStats {
            total_trees: 1,
            pomodoros_completed: 1,
            total_focus_minutes: 25,
        };
        let fixture = logged_in(api).await;

        let trees = list_trees_impl(&fixture.state, None).await.expect("trees");
        assert_eq!(trees.len(), 1);

        let tree = describe_tree_impl(&fixture.state, "oak".to_string(), "Mi roble".to_string())
            .await
            .expect("describe");
        assert_eq!(tree.description, "Mi roble");

        delete_tree_impl(&fixture.state, "oak".to_string())
            .await
            .expect("delete");
        assert!(list_trees_impl(&fixture.state, None).await.expect("trees").is_empty());

        let stats = stats_impl(&fixture.state).await.expect("stats");
        assert_eq!(stats.stats.total_focus_minutes, 25);
        assert_eq!(whoami_impl(&fixture.state).await.expect("whoami").username, "ana");

        logout_impl(&fixture.state).expect("logout");
        assert!(whoami_impl(&fixture.state).await.is_err());
    }
}
