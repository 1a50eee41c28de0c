use crate::domain::models::{Tree, TreeType, UserStats};
use std::io::Write;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl NoticeLevel {
    fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Success => "ok",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn new(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }
}

pub trait SessionDisplay: Send + Sync {
    fn show_remaining(&self, text: &str);
    fn hide_phrase(&self);
    fn show_phrase(&self, text: &str);
    fn show_earned_tree(&self, tree: &Tree);
    fn show_stats(&self, stats: &UserStats);
    fn notify(&self, notice: Notice);
}

#[derive(Debug, Default)]
pub struct TerminalDisplay {
    countdown_open: Mutex<bool>,
}

impl TerminalDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    fn println(&self, line: &str) {
        let mut stdout = std::io::stdout().lock();
        if let Ok(mut open) = self.countdown_open.lock() {
            if *open {
                let _ = writeln!(stdout);
                *open = false;
            }
        }
        let _ = writeln!(stdout, "{line}");
        let _ = stdout.flush();
    }

    pub fn print_trees(&self, trees: &[Tree]) {
        if trees.is_empty() {
            self.println("Your forest is empty. Complete a pomodoro to plant your first tree.");
            return;
        }
        for tree in trees {
            self.println(&format!(
                "{:<26} {:<16} {:<12} {}",
                tree.id, tree.name, tree.category, tree.description
            ));
        }
    }

    pub fn print_tree_types(&self, tree_types: &[TreeType]) {
        if tree_types.is_empty() {
            self.println("No tree types available.");
            return;
        }
        for tree_type in tree_types {
            self.println(&format!("{:<16} {}", tree_type.name, tree_type.category));
        }
    }

    pub fn print_line(&self, line: &str) {
        self.println(line);
    }
}

impl SessionDisplay for TerminalDisplay {
    fn show_remaining(&self, text: &str) {
        let mut stdout = std::io::stdout().lock();
        let _ = write!(stdout, "\r⏳ {text}   ");
        let _ = stdout.flush();
        if let Ok(mut open) = self.countdown_open.lock() {
            *open = true;
        }
    }

    fn hide_phrase(&self) {}

    fn show_phrase(&self, text: &str) {
        self.println(&format!("💬 {text}"));
    }

    fn show_earned_tree(&self, tree: &Tree) {
        self.println(&format!("🌳 You earned a tree: {} ({})", tree.name, tree.category));
        if !tree.description.trim().is_empty() {
            self.println(&format!("   {}", tree.description));
        }
    }

    fn show_stats(&self, stats: &UserStats) {
        self.println(&format!(
            "Trees: {}  Pomodoros: {}  Focus minutes: {}",
            stats.total_trees, stats.pomodoros_completed, stats.total_focus_minutes
        ));
    }

    fn notify(&self, notice: Notice) {
        self.println(&format!("[{}] {}", notice.level.as_str(), notice.message));
    }
}
