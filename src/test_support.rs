use crate::application::display::{Notice, SessionDisplay};
use crate::domain::models::{
    AccessToken, EarnedTree, RegisterRequest, StartedPomodoro, Tree, TreeType, TreeUpdate,
    UserProfile, UserStats,
};
use crate::infrastructure::api_client::ForestApi;
use crate::infrastructure::audio::{AudioHandle, AudioPlayer};
use crate::infrastructure::error::InfraError;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

static NEXT_TEMP_WORKSPACE: AtomicUsize = AtomicUsize::new(0);

pub struct TempWorkspace {
    path: PathBuf,
}

impl TempWorkspace {
    pub fn new(label: &str) -> Self {
        let sequence = NEXT_TEMP_WORKSPACE.fetch_add(1, Ordering::Relaxed);
        let path = std::env::temp_dir().join(format!(
            "pomodoro-forest-{label}-{}-{}",
            std::process::id(),
            sequence
        ));
        fs::create_dir_all(&path).expect("create temp workspace");
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempWorkspace {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}

pub fn http_failure(status: u16) -> InfraError {
    InfraError::Http {
        status,
        message: format!("Error {status}"),
    }
}

pub fn sample_tree(id: &str) -> Tree {
    Tree {
        id: id.to_string(),
        name: "Roble".to_string(),
        category: "Bosque".to_string(),
        image_url: "https://example.com/oak.jpg".to_string(),
        description: "Un majestuoso roble".to_string(),
    }
}

#[derive(Debug, Clone)]
pub enum PhraseScript {
    Phrase(String),
    Fail(u16),
}

#[derive(Default)]
pub struct FakeForestApi {
    pub start_phrase: Mutex<String>,
    pub start_failure: Mutex<Option<u16>>,
    pub start_gate: Mutex<Option<Arc<Notify>>>,
    pub phrases: Mutex<VecDeque<PhraseScript>>,
    pub phrase_gate: Mutex<Option<Arc<Notify>>>,
    pub completion_failures: Mutex<VecDeque<u16>>,
    pub stats: Mutex<UserStats>,
    pub stats_failure: Mutex<Option<u16>>,
    pub update_stats_failure: Mutex<Option<u16>>,
    pub trees: Mutex<Vec<Tree>>,
    pub tree_listing_failure: Mutex<Option<u16>>,
    pub profile_failure: Mutex<Option<u16>>,
    pub start_calls: AtomicUsize,
    pub phrase_calls: AtomicUsize,
    pub completion_calls: AtomicUsize,
    pub stats_calls: AtomicUsize,
    pub update_stats_calls: AtomicUsize,
    pub register_calls: AtomicUsize,
}

impl FakeForestApi {
    pub fn new() -> Self {
        let api = Self::default();
        *api.start_phrase.lock().expect("start phrase") = "El tiempo es oro".to_string();
        api
    }

    pub fn script_phrases(&self, script: Vec<PhraseScript>) {
        self.phrases.lock().expect("phrases").extend(script);
    }

    pub fn gate_phrases(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.phrase_gate.lock().expect("phrase gate") = Some(Arc::clone(&gate));
        gate
    }

    pub fn gate_start(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.start_gate.lock().expect("start gate") = Some(Arc::clone(&gate));
        gate
    }

    pub fn calls(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    fn scripted(failure: &Mutex<Option<u16>>) -> Result<(), InfraError> {
        match *failure.lock().expect("failure script") {
            Some(status) => Err(http_failure(status)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ForestApi for FakeForestApi {
    async fn register(&self, request: &RegisterRequest) -> Result<(), InfraError> {
        self.register_calls.fetch_add(1, Ordering::SeqCst);
        if request.username == "taken" {
            return Err(InfraError::Http {
                status: 400,
                message: "Username already registered".to_string(),
            });
        }
        Ok(())
    }

    async fn login(&self, username: &str, password: &str) -> Result<AccessToken, InfraError> {
        if password != "secret" {
            return Err(InfraError::Http {
                status: 401,
                message: "Incorrect username or password".to_string(),
            });
        }
        Ok(AccessToken {
            access_token: format!("jwt-for-{username}"),
            token_type: "bearer".to_string(),
        })
    }

    async fn start_pomodoro(&self, duration_minutes: u32) -> Result<StartedPomodoro, InfraError> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.start_gate.lock().expect("start gate").clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        Self::scripted(&self.start_failure)?;
        Ok(StartedPomodoro {
            end_time: None,
            duration: Some(duration_minutes),
            audio_url: "https://example.com/forest.mp3".to_string(),
            motivational_phrase: self.start_phrase.lock().expect("start phrase").clone(),
        })
    }

    async fn motivational_phrase(&self) -> Result<String, InfraError> {
        let call = self.phrase_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.phrase_gate.lock().expect("phrase gate").clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        let next = self.phrases.lock().expect("phrases").pop_front();
        match next {
            Some(PhraseScript::Phrase(phrase)) => Ok(phrase),
            Some(PhraseScript::Fail(status)) => Err(http_failure(status)),
            None => Ok(format!("Frase número {call}")),
        }
    }

    async fn complete_pomodoro(&self) -> Result<EarnedTree, InfraError> {
        let call = self.completion_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(status) = self
            .completion_failures
            .lock()
            .expect("completion failures")
            .pop_front()
        {
            return Err(http_failure(status));
        }
        let tree = sample_tree(&format!("earned-{call}"));
        {
            let mut stats = self.stats.lock().expect("stats");
            stats.pomodoros_completed += 1;
            stats.total_trees += 1;
        }
        self.trees.lock().expect("trees").push(tree.clone());
        Ok(EarnedTree {
            message: Some("¡Felicidades! Has completado un pomodoro.".to_string()),
            tree,
        })
    }

    async fn list_trees(&self) -> Result<Vec<Tree>, InfraError> {
        Self::scripted(&self.tree_listing_failure)?;
        Ok(self.trees.lock().expect("trees").clone())
    }

    async fn update_tree(&self, tree_id: &str, update: &TreeUpdate) -> Result<(), InfraError> {
        let mut trees = self.trees.lock().expect("trees");
        let Some(tree) = trees.iter_mut().find(|tree| tree.id == tree_id) else {
            return Err(InfraError::Http {
                status: 404,
                message: "Tree not found".to_string(),
            });
        };
        tree.name = update.name.clone();
        tree.category = update.category.clone();
        tree.image_url = update.image_url.clone();
        tree.description = update.description.clone();
        Ok(())
    }

    async fn delete_tree(&self, tree_id: &str) -> Result<(), InfraError> {
        let mut trees = self.trees.lock().expect("trees");
        let before = trees.len();
        trees.retain(|tree| tree.id != tree_id);
        if trees.len() == before {
            return Err(InfraError::Http {
                status: 404,
                message: "Tree not found".to_string(),
            });
        }
        Ok(())
    }

    async fn user_stats(&self) -> Result<UserStats, InfraError> {
        self.stats_calls.fetch_add(1, Ordering::SeqCst);
        Self::scripted(&self.stats_failure)?;
        Ok(*self.stats.lock().expect("stats"))
    }

    async fn update_user_stats(&self, stats: &UserStats) -> Result<(), InfraError> {
        self.update_stats_calls.fetch_add(1, Ordering::SeqCst);
        Self::scripted(&self.update_stats_failure)?;
        let mut stored = self.stats.lock().expect("stats");
        stored.pomodoros_completed = stats.pomodoros_completed;
        stored.total_focus_minutes = stats.total_focus_minutes;
        Ok(())
    }

    async fn tree_types(&self) -> Result<Vec<TreeType>, InfraError> {
        Ok(vec![TreeType {
            id: Some("type-1".to_string()),
            name: "Secuoya".to_string(),
            category: "Antiguo".to_string(),
            image_url: None,
            description: None,
        }])
    }

    async fn current_user(&self) -> Result<UserProfile, InfraError> {
        Self::scripted(&self.profile_failure)?;
        Ok(UserProfile {
            username: "ana".to_string(),
            email: Some("ana@example.com".to_string()),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayEvent {
    Remaining(String),
    HidePhrase,
    Phrase(String),
    EarnedTree(Tree),
    Stats(UserStats),
    Notice(Notice),
}

#[derive(Debug, Default)]
pub struct RecordingDisplay {
    events: Mutex<Vec<DisplayEvent>>,
}

impl RecordingDisplay {
    pub fn events(&self) -> Vec<DisplayEvent> {
        self.events.lock().expect("display events").clone()
    }

    pub fn remaining(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                DisplayEvent::Remaining(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn phrases(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                DisplayEvent::Phrase(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn earned_trees(&self) -> Vec<Tree> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                DisplayEvent::EarnedTree(tree) => Some(tree),
                _ => None,
            })
            .collect()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                DisplayEvent::Notice(notice) => Some(notice),
                _ => None,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().expect("display events").len()
    }

    fn push(&self, event: DisplayEvent) {
        self.events.lock().expect("display events").push(event);
    }
}

impl SessionDisplay for RecordingDisplay {
    fn show_remaining(&self, text: &str) {
        self.push(DisplayEvent::Remaining(text.to_string()));
    }

    fn hide_phrase(&self) {
        self.push(DisplayEvent::HidePhrase);
    }

    fn show_phrase(&self, text: &str) {
        self.push(DisplayEvent::Phrase(text.to_string()));
    }

    fn show_earned_tree(&self, tree: &Tree) {
        self.push(DisplayEvent::EarnedTree(tree.clone()));
    }

    fn show_stats(&self, stats: &UserStats) {
        self.push(DisplayEvent::Stats(*stats));
    }

    fn notify(&self, notice: Notice) {
        self.push(DisplayEvent::Notice(notice));
    }
}

#[derive(Debug, Default)]
pub struct FakeAudioPlayer {
    pub plays: AtomicUsize,
    pub stops: Arc<AtomicUsize>,
}

struct FakeAudioHandle {
    stops: Arc<AtomicUsize>,
    stopped: bool,
}

impl AudioHandle for FakeAudioHandle {
    fn stop(&mut self) {
        if !self.stopped {
            self.stopped = true;
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
    }
}

impl AudioPlayer for FakeAudioPlayer {
    fn play_loop(&self, _url: &str) -> Result<Box<dyn AudioHandle>, InfraError> {
        self.plays.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeAudioHandle {
            stops: Arc::clone(&self.stops),
            stopped: false,
        }))
    }
}
