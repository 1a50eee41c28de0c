use crate::infrastructure::config::{ensure_default_configs, load_client_config};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::storage::initialize_database;
use std::fs;
use std::path::{Path, PathBuf};

const APP_DIR_NAME: &str = "pomodoro-forest";

#[derive(Debug)]
pub struct BootstrapResult {
    pub workspace_root: PathBuf,
    pub config_dir: PathBuf,
    pub database_path: PathBuf,
}

pub fn default_workspace_root() -> Result<PathBuf, InfraError> {
    match dirs::data_dir() {
        Some(data_dir) => Ok(data_dir.join(APP_DIR_NAME)),
        None => Ok(std::env::current_dir()?),
    }
}

pub fn bootstrap_workspace(workspace_root: &Path) -> Result<BootstrapResult, InfraError> {
    let config_dir = workspace_root.join("config");
    let state_dir = workspace_root.join("state");
    let database_path = state_dir.join("forest.sqlite");

    fs::create_dir_all(&config_dir)?;
    fs::create_dir_all(&state_dir)?;

    ensure_default_configs(&config_dir)?;
    let _ = load_client_config(&config_dir)?;
    initialize_database(&database_path)?;

    Ok(BootstrapResult {
        workspace_root: workspace_root.to_path_buf(),
        config_dir,
        database_path,
    })
}
