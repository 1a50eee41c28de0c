use crate::infrastructure::error::InfraError;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const SCHEMA_SQL: &str = include_str!("../../sql/schema.sql");

pub const TOKEN_KEY: &str = "token";
pub const USERNAME_KEY: &str = "username";
pub const POMODOROS_COMPLETED_KEY: &str = "pomodoros_completed";
pub const TOTAL_FOCUS_MINUTES_KEY: &str = "total_focus_minutes";
pub const TOTAL_TREES_KEY: &str = "total_trees";

pub const ALL_KEYS: [&str; 5] = [
    TOKEN_KEY,
    USERNAME_KEY,
    POMODOROS_COMPLETED_KEY,
    TOTAL_FOCUS_MINUTES_KEY,
    TOTAL_TREES_KEY,
];

pub fn initialize_database(path: &Path) -> Result<(), InfraError> {
    let connection = Connection::open(path)?;
    connection.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, InfraError>;
    fn set(&self, key: &str, value: &str) -> Result<(), InfraError>;
    fn remove(&self, key: &str) -> Result<(), InfraError>;

    fn remove_all(&self, keys: &[&str]) -> Result<(), InfraError> {
        for key in keys {
            self.remove(key)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct SqliteKeyValueStore {
    db_path: PathBuf,
}

impl SqliteKeyValueStore {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    fn connect(&self) -> Result<Connection, InfraError> {
        Connection::open(&self.db_path).map_err(InfraError::from)
    }
}

impl KeyValueStore for SqliteKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, InfraError> {
        let connection = self.connect()?;
        let value = connection
            .query_row(
                "SELECT value FROM kv_store WHERE key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), InfraError> {
        let connection = self.connect()?;
        connection.execute(
            "INSERT INTO kv_store (key, value)
             VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), InfraError> {
        let connection = self.connect()?;
        connection.execute("DELETE FROM kv_store WHERE key = ?1", params![key])?;
        Ok(())
    }

    fn remove_all(&self, keys: &[&str]) -> Result<(), InfraError> {
        let mut connection = self.connect()?;
        let transaction = connection.transaction()?;
        for key in keys {
            transaction.execute("DELETE FROM kv_store WHERE key = ?1", params![key])?;
        }
        transaction.commit()?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryKeyValueStore {
    values: Mutex<HashMap<String, String>>,
}

impl InMemoryKeyValueStore {
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, InfraError> {
        self.values
            .lock()
            .map_err(|error| InfraError::InvalidConfig(format!("key-value lock poisoned: {error}")))
    }
}

impl KeyValueStore for InMemoryKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, InfraError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), InfraError> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), InfraError> {
        self.lock()?.remove(key);
        Ok(())
    }
}
