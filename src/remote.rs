//! Task actions on the agent's HTTP API
//!
//! The synchronization core only needs four fire-and-forget calls. They sit behind
//! the [`TaskApi`] trait so the manager and entity helpers can be driven by any
//! transport; [`HttpTaskApi`] is the `reqwest` implementation.

use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::types::TaskId;
use async_trait::async_trait;
use url::Url;

/// Remote actions on a task
///
/// Every call resolves once the agent has accepted the request. Failures are
/// returned to the caller, never swallowed.
#[async_trait]
pub trait TaskApi: Send + Sync {
    /// Restart a failed task
    async fn retry(&self, id: &TaskId) -> Result<()>;

    /// Resume a stopped task
    async fn start(&self, id: &TaskId) -> Result<()>;

    /// Stop a running task
    async fn stop(&self, id: &TaskId) -> Result<()>;

    /// Delete a task on the agent
    async fn remove(&self, id: &TaskId) -> Result<()>;
}

/// [`TaskApi`] over the agent's HTTP API
///
/// Each action is `GET {api_url}download/{action}/{id}`.
#[derive(Clone, Debug)]
pub struct HttpTaskApi {
    client: reqwest::Client,
    base: Url,
}

impl HttpTaskApi {
    /// Build a client for the configured agent
    pub fn new(server: &ServerConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(server.request_timeout)
            .build()?;

        Ok(Self {
            client,
            base: server.api_base()?,
        })
    }

    /// Request URL for an action on a task
    pub fn action_url(&self, action: &str, id: &TaskId) -> Result<Url> {
        let path = format!("download/{}/{}", action, urlencoding::encode(id.as_str()));
        Ok(self.base.join(&path)?)
    }

    async fn call(&self, action: &'static str, id: &TaskId) -> Result<()> {
        let url = self.action_url(action, id)?;
        tracing::debug!(task_id = %id, action, url = %url, "calling agent");

        let response = self.client.get(url.clone()).send().await?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(task_id = %id, action, status = status.as_u16(), "agent rejected task action");
            return Err(Error::Api {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(())
    }
}

#[async_trait]
impl TaskApi for HttpTaskApi {
    async fn retry(&self, id: &TaskId) -> Result<()> {
        self.call("retry", id).await
    }

    async fn start(&self, id: &TaskId) -> Result<()> {
        self.call("start", id).await
    }

    async fn stop(&self, id: &TaskId) -> Result<()> {
        self.call("stop", id).await
    }

    async fn remove(&self, id: &TaskId) -> Result<()> {
        self.call("remove", id).await
    }
}
