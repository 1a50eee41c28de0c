use crate::domain::models::{
    AccessToken, CompletionResponse, EarnedTree, MotivationalPhrase, RegisterRequest,
    StartedPomodoro, Tree, TreeType, TreeUpdate, UserProfile, UserStats,
};
use crate::infrastructure::credential_store::CredentialStore;
use crate::infrastructure::error::InfraError;
use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[async_trait]
pub trait ForestApi: Send + Sync {
    async fn register(&self, request: &RegisterRequest) -> Result<(), InfraError>;
    async fn login(&self, username: &str, password: &str) -> Result<AccessToken, InfraError>;
    async fn start_pomodoro(&self, duration_minutes: u32) -> Result<StartedPomodoro, InfraError>;
    async fn motivational_phrase(&self) -> Result<String, InfraError>;
    async fn complete_pomodoro(&self) -> Result<EarnedTree, InfraError>;
    async fn list_trees(&self) -> Result<Vec<Tree>, InfraError>;
    async fn update_tree(&self, tree_id: &str, update: &TreeUpdate) -> Result<(), InfraError>;
    async fn delete_tree(&self, tree_id: &str) -> Result<(), InfraError>;
    async fn user_stats(&self) -> Result<UserStats, InfraError>;
    async fn update_user_stats(&self, stats: &UserStats) -> Result<(), InfraError>;
    async fn tree_types(&self) -> Result<Vec<TreeType>, InfraError>;
    async fn current_user(&self) -> Result<UserProfile, InfraError>;
}

enum RequestBody<'a> {
    Empty,
    Json(serde_json::Value),
    Form(&'a [(&'a str, &'a str)]),
}

pub struct ReqwestForestApi {
    client: Client,
    base_url: Url,
    credential_store: Arc<dyn CredentialStore>,
}

impl ReqwestForestApi {
    pub fn new(base_url: &str, credential_store: Arc<dyn CredentialStore>) -> Result<Self, InfraError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|error| InfraError::Network(format!("failed to build http client: {error}")))?;
        Self::with_client(base_url, client, credential_store)
    }

    pub fn with_client(
        base_url: &str,
        client: Client,
        credential_store: Arc<dyn CredentialStore>,
    ) -> Result<Self, InfraError> {
        let base_url = Url::parse(base_url.trim())
            .map_err(|error| InfraError::InvalidConfig(format!("invalid api base url: {error}")))?;
        if base_url.cannot_be_a_base() {
            return Err(InfraError::InvalidConfig(
                "api base url cannot be a base".to_string(),
            ));
        }
        Ok(Self {
            client,
            base_url,
            credential_store,
        })
    }

    /// `endpoint` may carry a leading slash and several segments
    /// (`/user/stats/update`); each segment is percent-encoded.
    pub fn endpoint_url(&self, endpoint: &str) -> Result<Url, InfraError> {
        build_endpoint_url(&self.base_url, endpoint.split('/'))
    }

    fn tree_url(&self, tree_id: &str) -> Result<Url, InfraError> {
        let tree_id = tree_id.trim();
        if tree_id.is_empty() {
            return Err(InfraError::InvalidInput("tree id must not be empty".to_string()));
        }
        build_endpoint_url(&self.base_url, ["trees", tree_id])
    }

    fn build_request(
        &self,
        method: Method,
        url: Url,
        body: RequestBody<'_>,
    ) -> Result<reqwest::Request, InfraError> {
        let mut request = self.client.request(method, url);
        if let Some(token) = self.credential_store.access_token()? {
            request = request.bearer_auth(token);
        }
        request = match body {
            RequestBody::Empty => request,
            RequestBody::Json(value) => request.json(&value),
            RequestBody::Form(fields) => request.form(fields),
        };
        request
            .build()
            .map_err(|error| InfraError::Network(format!("failed to build request: {error}")))
    }

    async fn send(
        &self,
        method: Method,
        url: Url,
        body: RequestBody<'_>,
    ) -> Result<serde_json::Value, InfraError> {
        let endpoint = url.path().to_string();
        let request = self.build_request(method.clone(), url, body)?;

        tracing::debug!(%method, endpoint = %endpoint, "sending api request");
        let response = self.client.execute(request).await.map_err(|error| {
            tracing::error!(endpoint = %endpoint, error = %error, "api request failed");
            InfraError::Network(format!("request to {endpoint} failed: {error}"))
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|error| {
            InfraError::Network(format!("failed reading response from {endpoint}: {error}"))
        })?;

        if !status.is_success() {
            let error = http_error(status, &body);
            tracing::error!(endpoint = %endpoint, status = status.as_u16(), error = %error, "api returned an error");
            return Err(error);
        }
        parse_success_body(status, &body)
    }

    async fn get(&self, endpoint: &str) -> Result<serde_json::Value, InfraError> {
        self.send(Method::GET, self.endpoint_url(endpoint)?, RequestBody::Empty)
            .await
    }

    async fn post_json(
        &self,
        endpoint: &str,
        body: serde_json::Value,
    ) -> Result<serde_json::Value, InfraError> {
        self.send(Method::POST, self.endpoint_url(endpoint)?, RequestBody::Json(body))
            .await
    }
}

#[async_trait]
impl ForestApi for ReqwestForestApi {
    async fn register(&self, request: &RegisterRequest) -> Result<(), InfraError> {
        self.post_json("/register", serde_json::to_value(request)?)
            .await?;
        Ok(())
    }

    async fn login(&self, username: &str, password: &str) -> Result<AccessToken, InfraError> {
        let fields = [("username", username), ("password", password)];
        let value = self
            .send(
                Method::POST,
                self.endpoint_url("/token")?,
                RequestBody::Form(&fields),
            )
            .await?;
        decode(value, "token")
    }

    async fn start_pomodoro(&self, duration_minutes: u32) -> Result<StartedPomodoro, InfraError> {
        let value = self
            .post_json(
                "/start-pomodoro",
                serde_json::json!({ "duration": duration_minutes }),
            )
            .await?;
        decode(value, "start-pomodoro")
    }

    async fn motivational_phrase(&self) -> Result<String, InfraError> {
        let value = self.get("/motivational-phrase").await?;
        let phrase: MotivationalPhrase = decode(value, "motivational-phrase")?;
        Ok(phrase.phrase)
    }

    async fn complete_pomodoro(&self) -> Result<EarnedTree, InfraError> {
        let value = self
            .send(
                Method::POST,
                self.endpoint_url("/complete-pomodoro")?,
                RequestBody::Empty,
            )
            .await?;
        let response: CompletionResponse = decode(value, "complete-pomodoro")?;
        response.into_earned().map_err(InfraError::UnexpectedPayload)
    }

    async fn list_trees(&self) -> Result<Vec<Tree>, InfraError> {
        let value = self.get("/trees").await?;
        trees_from_listing(value)
    }

    async fn update_tree(&self, tree_id: &str, update: &TreeUpdate) -> Result<(), InfraError> {
        let url = self.tree_url(tree_id)?;
        self.send(Method::PUT, url, RequestBody::Json(serde_json::to_value(update)?))
            .await?;
        Ok(())
    }

    async fn delete_tree(&self, tree_id: &str) -> Result<(), InfraError> {
        let url = self.tree_url(tree_id)?;
        self.send(Method::DELETE, url, RequestBody::Empty).await?;
        Ok(())
    }

    async fn user_stats(&self) -> Result<UserStats, InfraError> {
        let value = self.get("/user/stats").await?;
        if value.is_null() {
            return Err(InfraError::UnexpectedPayload(
                "empty statistics response".to_string(),
            ));
        }
        decode(value, "user/stats")
    }

    async fn update_user_stats(&self, stats: &UserStats) -> Result<(), InfraError> {
        self.post_json("/user/stats/update", serde_json::to_value(stats)?)
            .await?;
        Ok(())
    }

    async fn tree_types(&self) -> Result<Vec<TreeType>, InfraError> {
        let value = self.get("/tree-types").await?;
        decode(value, "tree-types")
    }

    async fn current_user(&self) -> Result<UserProfile, InfraError> {
        let value = self.get("/users/me").await?;
        decode(value, "users/me")
    }
}

fn build_endpoint_url<'a>(
    base_url: &Url,
    segments: impl IntoIterator<Item = &'a str>,
) -> Result<Url, InfraError> {
    let mut url = base_url.clone();
    {
        let mut path = url
            .path_segments_mut()
            .map_err(|_| InfraError::InvalidConfig("api base url cannot be a base".to_string()))?;
        path.pop_if_empty();
        for segment in segments {
            let segment = segment.trim();
            if !segment.is_empty() {
                path.push(segment);
            }
        }
    }
    Ok(url)
}

pub fn http_error(status: StatusCode, body: &str) -> InfraError {
    let detail = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| value.get("detail").cloned())
        .and_then(|detail| match detail {
            serde_json::Value::Null => None,
            serde_json::Value::String(text) if text.trim().is_empty() => None,
            serde_json::Value::String(text) => Some(text),
            other => Some(other.to_string()),
        });
    let message = detail.unwrap_or_else(|| {
        format!(
            "Error {}: {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or("Unknown Status")
        )
    });
    InfraError::Http {
        status: status.as_u16(),
        message,
    }
}

fn parse_success_body(status: StatusCode, body: &str) -> Result<serde_json::Value, InfraError> {
    if status == StatusCode::NO_CONTENT || body.trim().is_empty() {
        return Ok(serde_json::json!({}));
    }
    serde_json::from_str(body).map_err(|error| {
        InfraError::UnexpectedPayload(format!("response is not JSON: {error}"))
    })
}

fn decode<T: DeserializeOwned>(value: serde_json::Value, endpoint: &str) -> Result<T, InfraError> {
    serde_json::from_value(value).map_err(|error| {
        InfraError::UnexpectedPayload(format!("invalid {endpoint} payload: {error}"))
    })
}

// `/trees` answers with a bare array; older deployments wrapped it in
// `{"trees": [...]}`.
pub fn trees_from_listing(value: serde_json::Value) -> Result<Vec<Tree>, InfraError> {
    let items = match value {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Object(mut object) => match object.remove("trees") {
            Some(serde_json::Value::Array(items)) => items,
            _ => {
                return Err(InfraError::UnexpectedPayload(
                    "tree listing is neither an array nor {trees: [...]}".to_string(),
                ));
            }
        },
        _ => {
            return Err(InfraError::UnexpectedPayload(
                "tree listing is neither an array nor {trees: [...]}".to_string(),
            ));
        }
    };
    decode(serde_json::Value::Array(items), "trees")
}
