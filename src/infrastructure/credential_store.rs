use crate::domain::models::StoredCredentials;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::storage::{KeyValueStore, TOKEN_KEY, USERNAME_KEY};
use std::sync::{Arc, Mutex};

pub trait CredentialStore: Send + Sync {
    fn save_credentials(&self, credentials: &StoredCredentials) -> Result<(), InfraError>;
    fn load_credentials(&self) -> Result<Option<StoredCredentials>, InfraError>;
    fn delete_credentials(&self) -> Result<(), InfraError>;

    fn access_token(&self) -> Result<Option<String>, InfraError> {
        Ok(self
            .load_credentials()?
            .map(|credentials| credentials.access_token)
            .filter(|token| !token.trim().is_empty()))
    }
}

#[derive(Clone)]
pub struct LocalCredentialStore {
    store: Arc<dyn KeyValueStore>,
}

impl LocalCredentialStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }
}

impl CredentialStore for LocalCredentialStore {
    fn save_credentials(&self, credentials: &StoredCredentials) -> Result<(), InfraError> {
        self.store.set(TOKEN_KEY, &credentials.access_token)?;
        self.store.set(USERNAME_KEY, &credentials.username)
    }

    fn load_credentials(&self) -> Result<Option<StoredCredentials>, InfraError> {
        let Some(access_token) = self.store.get(TOKEN_KEY)? else {
            return Ok(None);
        };
        let username = self.store.get(USERNAME_KEY)?.unwrap_or_default();
        Ok(Some(StoredCredentials {
            access_token,
            username,
        }))
    }

    fn delete_credentials(&self) -> Result<(), InfraError> {
        self.store.remove_all(&[TOKEN_KEY, USERNAME_KEY])
    }
}

#[derive(Debug, Clone)]
pub struct KeyringCredentialStore {
    service_name: String,
    account_name: String,
}

impl KeyringCredentialStore {
    pub fn new(service_name: impl Into<String>, account_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            account_name: account_name.into(),
        }
    }

    fn entry(&self) -> Result<keyring::Entry, InfraError> {
        keyring::Entry::new(&self.service_name, &self.account_name)
            .map_err(|error| InfraError::Credential(error.to_string()))
    }
}

impl Default for KeyringCredentialStore {
    fn default() -> Self {
        Self::new("pomodoro-forest.session", "default")
    }
}

impl CredentialStore for KeyringCredentialStore {
    fn save_credentials(&self, credentials: &StoredCredentials) -> Result<(), InfraError> {
        let payload = serde_json::to_string(credentials)
            .map_err(|error| InfraError::Credential(error.to_string()))?;
        self.entry()?
            .set_password(&payload)
            .map_err(|error| InfraError::Credential(error.to_string()))
    }

    fn load_credentials(&self) -> Result<Option<StoredCredentials>, InfraError> {
        let payload = match self.entry()?.get_password() {
            Ok(value) => value,
            Err(keyring::Error::NoEntry) => return Ok(None),
            Err(error) => return Err(InfraError::Credential(error.to_string())),
        };

        let credentials = serde_json::from_str::<StoredCredentials>(&payload)
            .map_err(|error| InfraError::Credential(error.to_string()))?;
        Ok(Some(credentials))
    }

    fn delete_credentials(&self) -> Result<(), InfraError> {
        match self.entry()?.delete_credential() {
            Ok(_) => Ok(()),
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(error) => Err(InfraError::Credential(error.to_string())),
        }
    }
}

#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    credentials: Mutex<Option<StoredCredentials>>,
}

impl CredentialStore for InMemoryCredentialStore {
    fn save_credentials(&self, credentials: &StoredCredentials) -> Result<(), InfraError> {
        let mut guard = self
            .credentials
            .lock()
            .map_err(|error| InfraError::Credential(format!("in-memory lock poisoned: {error}")))?;
        *guard = Some(credentials.clone());
        Ok(())
    }

    fn load_credentials(&self) -> Result<Option<StoredCredentials>, InfraError> {
        let guard = self
            .credentials
            .lock()
            .map_err(|error| InfraError::Credential(format!("in-memory lock poisoned: {error}")))?;
        Ok(guard.clone())
    }

    fn delete_credentials(&self) -> Result<(), InfraError> {
        let mut guard = self
            .credentials
            .lock()
            .map_err(|error| InfraError::Credential(format!("in-memory lock poisoned: {error}")))?;
        *guard = None;
        Ok(())
    }
}
