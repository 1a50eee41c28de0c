use crate::domain::models::{RegisterRequest, StoredCredentials, UserProfile};
use crate::infrastructure::api_client::ForestApi;
use crate::infrastructure::credential_store::CredentialStore;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::stats_cache::StatsCache;
use std::sync::Arc;

const FALLBACK_USERNAME: &str = "Usuario";

#[derive(Clone)]
pub struct AuthService {
    api: Arc<dyn ForestApi>,
    credentials: Arc<dyn CredentialStore>,
    stats_cache: StatsCache,
}

impl AuthService {
    pub fn new(
        api: Arc<dyn ForestApi>,
        credentials: Arc<dyn CredentialStore>,
        stats_cache: StatsCache,
    ) -> Self {
        Self {
            api,
            credentials,
            stats_cache,
        }
    }

    pub async fn register(
        &self,
        username: &str,
        password: &str,
        email: &str,
    ) -> Result<(), InfraError> {
        let request = RegisterRequest {
            username: username.trim().to_string(),
            password: password.to_string(),
            email: email.trim().to_string(),
        };
        request.validate().map_err(InfraError::InvalidInput)?;
        self.api.register(&request).await?;
        tracing::info!(username = %request.username, "account registered");
        Ok(())
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<StoredCredentials, InfraError> {
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            return Err(InfraError::InvalidInput(
                "username and password are required".to_string(),
            ));
        }

        let token = self.api.login(username, password).await?;
        if token.access_token.trim().is_empty() {
            return Err(InfraError::UnexpectedPayload(
                "login response carried an empty token".to_string(),
            ));
        }
        let credentials = StoredCredentials {
            access_token: token.access_token,
            username: username.to_string(),
        };
        self.credentials.save_credentials(&credentials)?;
        tracing::info!(username, "logged in");
        Ok(credentials)
    }

    pub fn logout(&self) -> Result<(), InfraError> {
        self.credentials.delete_credentials()?;
        self.stats_cache.clear()?;
        tracing::info!("logged out");
        Ok(())
    }

    pub fn is_authenticated(&self) -> Result<bool, InfraError> {
        Ok(self.credentials.access_token()?.is_some())
    }

    pub fn require_authenticated(&self) -> Result<(), InfraError> {
        if self.is_authenticated()? {
            Ok(())
        } else {
            Err(InfraError::Credential(
                "not logged in; run `forest login` first".to_string(),
            ))
        }
    }

    pub async fn current_user(&self) -> UserProfile {
        match self.api.current_user().await {
            Ok(profile) => profile,
            Err(error) => {
                tracing::warn!(error = %error, "could not load profile, using stored username");
                let username = self
                    .credentials
                    .load_credentials()
                    .ok()
                    .flatten()
                    .map(|credentials| credentials.username)
                    .filter(|username| !username.trim().is_empty())
                    .unwrap_or_else(|| FALLBACK_USERNAME.to_string());
                UserProfile {
                    username,
                    email: None,
                }
            }
        }
    }
}
