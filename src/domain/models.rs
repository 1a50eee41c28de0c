use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tree {
    #[serde(alias = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub description: String,
}

impl Tree {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "tree.id")?;
        validate_non_empty(&self.name, "tree.name")?;
        Ok(())
    }

    pub fn with_description(&self, description: &str) -> Result<TreeUpdate, String> {
        let description = description.trim();
        validate_non_empty(description, "tree.description")?;
        Ok(TreeUpdate {
            name: self.name.clone(),
            category: self.category.clone(),
            image_url: self.image_url.clone(),
            description: description.to_string(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TreeUpdate {
    pub name: String,
    pub category: String,
    pub image_url: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TreeType {
    #[serde(default, alias = "_id")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserStats {
    #[serde(default)]
    pub total_trees: u64,
    #[serde(default)]
    pub pomodoros_completed: u64,
    #[serde(default)]
    pub total_focus_minutes: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsDelta {
    pub focus_minutes: u64,
}

impl StatsDelta {
    pub fn for_session(duration_minutes: u32) -> Self {
        Self {
            focus_minutes: u64::from(duration_minutes),
        }
    }
}

impl UserStats {
    /// Applies `delta` on top of a server snapshot. The snapshot already
    /// carries the server-side pomodoro increment, so only focus minutes move.
    pub fn merged_with(&self, delta: StatsDelta) -> UserStats {
        UserStats {
            total_trees: self.total_trees,
            pomodoros_completed: self.pomodoros_completed,
            total_focus_minutes: self.total_focus_minutes.saturating_add(delta.focus_minutes),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserProfile {
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub email: String,
}

impl RegisterRequest {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.username, "register.username")?;
        validate_non_empty(&self.password, "register.password")?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessToken {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredCredentials {
    pub access_token: String,
    pub username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StartedPomodoro {
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub duration: Option<u32>,
    pub audio_url: String,
    pub motivational_phrase: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MotivationalPhrase {
    pub phrase: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompletionResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub tree: Option<Tree>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EarnedTree {
    pub message: Option<String>,
    pub tree: Tree,
}

impl CompletionResponse {
    /// The server answers 200 with `{"error": ...}` when it cannot award a
    /// tree; that is not a completion.
    pub fn into_earned(self) -> Result<EarnedTree, String> {
        match self.tree {
            Some(tree) => Ok(EarnedTree {
                message: self.message,
                tree,
            }),
            None => Err(self
                .error
                .unwrap_or_else(|| "no tree received from the server".to_string())),
        }
    }
}

fn default_token_type() -> String {
    "bearer".to_string()
}

fn validate_non_empty(value: &str, field_name: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field_name} must not be empty"));
    }
    Ok(())
}
