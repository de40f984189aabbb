//! Remote REST API client.
//!
//! The stores talk to the server through the `TaskApi`, `ProjectApi` and
//! `TeamApi` traits so they can be driven by an in-memory fake in tests.
//! `HttpApi` is the production implementation over `reqwest`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::config::Config;
use crate::project::{NewProject, Project};
use crate::task::{NewTask, Task, TaskPatch};
use crate::team::User;

/// Failure of a remote call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    /// The request never produced a response (connection refused, timeout, ...).
    #[error("network error: {0}")]
    Transport(String),

    /// The server rejected the session token.
    #[error("not signed in or session expired")]
    Unauthorized,

    /// Any other non-success status.
    #[error("server returned {status}: {message}")]
    Status { status: u16, message: String },

    /// The response body did not match the expected schema.
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ApiError::Decode(e.to_string())
        } else {
            ApiError::Transport(e.to_string())
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        ApiError::Decode(e.to_string())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Task endpoints.
#[async_trait]
pub trait TaskApi: Send + Sync {
    async fn fetch_tasks(&self, project_id: u64) -> ApiResult<Vec<Task>>;
    async fn create_task(&self, task: &NewTask) -> ApiResult<Task>;
    async fn update_task(&self, id: u64, patch: &TaskPatch) -> ApiResult<Task>;
    async fn delete_task(&self, id: u64) -> ApiResult<()>;
}

/// Project endpoints.
#[async_trait]
pub trait ProjectApi: Send + Sync {
    async fn fetch_projects(&self) -> ApiResult<Vec<Project>>;
    async fn create_project(&self, project: &NewProject) -> ApiResult<Project>;
    async fn delete_project(&self, id: u64) -> ApiResult<()>;
}

/// User directory endpoints.
#[async_trait]
pub trait TeamApi: Send + Sync {
    async fn fetch_users(&self) -> ApiResult<Vec<User>>;
}

/// HTTP implementation of the API traits.
#[derive(Clone)]
pub struct HttpApi {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpApi {
    /// Build a client for the configured server.
    pub fn new(config: &Config) -> ApiResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self::with_client(client, config))
    }

    /// Use an already configured client; only the URL and token are read from `config`.
    pub fn with_client(client: Client, config: &Config) -> Self {
        HttpApi {
            client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        debug!(%method, path, "api request");
        let builder = self.client.request(method, self.url(path));
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send<T: DeserializeOwned>(builder: RequestBuilder) -> ApiResult<T> {
        let response = check_status(builder.send().await?).await?;
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn send_empty(builder: RequestBuilder) -> ApiResult<()> {
        check_status(builder.send().await?).await?;
        Ok(())
    }
}

#[async_trait]
impl TaskApi for HttpApi {
    async fn fetch_tasks(&self, project_id: u64) -> ApiResult<Vec<Task>> {
        let builder = self
            .request(Method::GET, "/api/tasks")
            .query(&[("projectId", project_id)]);
        Self::send(builder).await
    }

    async fn create_task(&self, task: &NewTask) -> ApiResult<Task> {
        Self::send(self.request(Method::POST, "/api/tasks").json(task)).await
    }

    async fn update_task(&self, id: u64, patch: &TaskPatch) -> ApiResult<Task> {
        let path = format!("/api/tasks/{id}");
        Self::send(self.request(Method::PUT, &path).json(patch)).await
    }

    async fn delete_task(&self, id: u64) -> ApiResult<()> {
        let path = format!("/api/tasks/{id}");
        Self::send_empty(self.request(Method::DELETE, &path)).await
    }
}

#[async_trait]
impl ProjectApi for HttpApi {
    async fn fetch_projects(&self) -> ApiResult<Vec<Project>> {
        Self::send(self.request(Method::GET, "/api/projects")).await
    }

    async fn create_project(&self, project: &NewProject) -> ApiResult<Project> {
        Self::send(self.request(Method::POST, "/api/projects").json(project)).await
    }

    async fn delete_project(&self, id: u64) -> ApiResult<()> {
        let path = format!("/api/projects/{id}");
        Self::send_empty(self.request(Method::DELETE, &path)).await
    }
}

#[async_trait]
impl TeamApi for HttpApi {
    async fn fetch_users(&self) -> ApiResult<Vec<User>> {
        Self::send(self.request(Method::GET, "/api/users")).await
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

async fn check_status(response: Response) -> ApiResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::UNAUTHORIZED {
        return Err(ApiError::Unauthorized);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ApiError::Status {
        status: status.as_u16(),
        message: error_message(status, &body),
    })
}

/// Pick the most useful message out of an error response body.
fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(ErrorBody { message: Some(message) }) = serde_json::from_str::<ErrorBody>(body) {
        if !message.trim().is_empty() {
            return message;
        }
    }
    let body = body.trim();
    if !body.is_empty() && body.len() <= 200 {
        return body.to_string();
    }
    status.canonical_reason().unwrap_or("request failed").to_string()
}
