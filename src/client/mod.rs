//! Async client for the VCFA CloudAPI.

mod auth;
pub mod error;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{ACCEPT, LOCATION};
use reqwest::{Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::time::Instant;
use url::Url;

use crate::config::ClientConfig;
use crate::util::uuid_from_urn;

pub use auth::{ApiTokenFile, ServiceAccountTokenFile};
pub use error::{ApiErrorBody, ClientError, Result};
use types::{Page, Task};

pub const API_VERSION: &str = "40.0";
pub const ACCESS_TOKEN_HEADER: &str = "X-VMWARE-VCLOUD-ACCESS-TOKEN";
pub const TENANT_CONTEXT_HEADER: &str = "X-VMWARE-VCLOUD-TENANT-CONTEXT";

pub const ORGS_PATH: &str = "cloudapi/1.0.0/orgs";
pub const USERS_PATH: &str = "cloudapi/1.0.0/users";
pub const ROLES_PATH: &str = "cloudapi/1.0.0/roles";
pub const REGIONS_PATH: &str = "cloudapi/vcf/regions";
pub const VERSIONS_PATH: &str = "api/versions";

const PAGE_SIZE: u32 = 128;
const RETRY_PAUSE: Duration = Duration::from_secs(2);
const TASK_POLL_INTERVAL: Duration = Duration::from_secs(1);

pub fn accept_header() -> String {
    format!("application/json;version={API_VERSION}")
}

/// Authenticated CloudAPI session. Cheap to clone.
#[derive(Clone)]
pub struct VcfaClient {
    http: reqwest::Client,
    base: Url,
    token: Arc<str>,
    max_retry_timeout: Duration,
    retry_pause: Duration,
    poll_interval: Duration,
    import_separator: String,
}

impl std::fmt::Debug for VcfaClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VcfaClient")
            .field("base", &self.base.as_str())
            .field("max_retry_timeout", &self.max_retry_timeout)
            .finish_non_exhaustive()
    }
}

impl VcfaClient {
    /// Build the HTTP client and log in.
    pub async fn connect(config: &ClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("terraform-provider-vcfa/", env!("CARGO_PKG_VERSION")))
            .danger_accept_invalid_certs(config.allow_unverified_ssl)
            .build()?;

        let token = auth::login(&http, config).await?;
        tracing::info!(url = %config.url, org = %config.org, "connected to VCFA");

        Ok(Self {
            http,
            base: config.url.clone(),
            token: token.into(),
            max_retry_timeout: config.max_retry_timeout,
            retry_pause: RETRY_PAUSE,
            poll_interval: TASK_POLL_INTERVAL,
            import_separator: config.import_separator.clone(),
        })
    }

    /// Shorten the pauses between retries and task polls.
    pub fn with_intervals(mut self, retry_pause: Duration, poll_interval: Duration) -> Self {
        self.retry_pause = retry_pause;
        self.poll_interval = poll_interval;
        self
    }

    pub fn import_separator(&self) -> &str {
        &self.import_separator
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str, tenant: Option<&str>) -> Result<T> {
        let url = self.base.join(path)?;
        let response = self.send(Method::GET, url, &[], None, tenant).await?;
        Ok(response.json().await?)
    }

    /// Fetch every page of a collection.
    pub async fn list<T: DeserializeOwned>(
        &self,
        path: &str,
        filter: Option<&str>,
        tenant: Option<&str>,
    ) -> Result<Vec<T>> {
        let url = self.base.join(path)?;
        let mut values = Vec::new();
        let mut page = 1u64;

        loop {
            let mut query = vec![
                ("page", page.to_string()),
                ("pageSize", PAGE_SIZE.to_string()),
            ];
            if let Some(filter) = filter {
                query.push(("filter", filter.to_string()));
            }

            let response = self
                .send(Method::GET, url.clone(), &query, None, tenant)
                .await?;
            let body: Page<T> = response.json().await?;
            values.extend(body.values);

            if page >= body.page_count {
                break;
            }
            page += 1;
        }

        tracing::trace!(path, count = values.len(), "listed collection");
        Ok(values)
    }

    /// Look up the single entity of a collection named `name`.
    pub async fn get_by_name<T: DeserializeOwned>(
        &self,
        kind: &'static str,
        path: &str,
        name: &str,
        tenant: Option<&str>,
    ) -> Result<T> {
        self.find_one(kind, path, "name", name, tenant).await
    }

    /// Look up the single entity of a collection whose `field` equals `value`.
    pub async fn find_one<T: DeserializeOwned>(
        &self,
        kind: &'static str,
        path: &str,
        field: &str,
        value: &str,
        tenant: Option<&str>,
    ) -> Result<T> {
        let filter = format!("{field}=={value}");
        let mut found: Vec<T> = self.list(path, Some(&filter), tenant).await?;
        match found.len() {
            0 => Err(ClientError::NotFound {
                kind,
                name: value.to_string(),
            }),
            1 => Ok(found.remove(0)),
            count => Err(ClientError::Ambiguous {
                kind,
                name: value.to_string(),
                count,
            }),
        }
    }

    /// `POST` a new entity to a collection and return it as stored by the server.
    pub async fn create<B, T>(&self, path: &str, body: &B, tenant: Option<&str>) -> Result<T>
    where
        B: Serialize,
        T: DeserializeOwned,
    {
        let url = self.base.join(path)?;
        let body = serde_json::to_value(body)?;
        let response = self
            .send(Method::POST, url, &[], Some(body), tenant)
            .await?;

        if response.status() == StatusCode::ACCEPTED {
            let task = self.wait_for_task(&response, tenant).await?;
            let owner = task.owner.ok_or_else(|| ClientError::Task {
                task: task.id.clone(),
                message: "task has no owner".to_string(),
            })?;
            let path = format!("{}/{}", path.trim_end_matches('/'), owner.id);
            return self.get(&path, tenant).await;
        }

        Ok(response.json().await?)
    }

    pub async fn update<B, T>(&self, path: &str, body: &B, tenant: Option<&str>) -> Result<T>
    where
        B: Serialize,
        T: DeserializeOwned,
    {
        let url = self.base.join(path)?;
        let body = serde_json::to_value(body)?;
        let response = self.send(Method::PUT, url, &[], Some(body), tenant).await?;

        if response.status() == StatusCode::ACCEPTED {
            self.wait_for_task(&response, tenant).await?;
            return self.get(path, tenant).await;
        }

        Ok(response.json().await?)
    }

    pub async fn delete(
        &self,
        path: &str,
        query: &[(&str, String)],
        tenant: Option<&str>,
    ) -> Result<()> {
        let url = self.base.join(path)?;
        let response = self.send(Method::DELETE, url, query, None, tenant).await?;

        if response.status() == StatusCode::ACCEPTED {
            self.wait_for_task(&response, tenant).await?;
        }
        Ok(())
    }

    async fn wait_for_task(&self, response: &Response, tenant: Option<&str>) -> Result<Task> {
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| ClientError::Task {
                task: String::new(),
                message: "accepted without a task location".to_string(),
            })?;
        let url = self.base.join(location)?;

        loop {
            let response = self
                .send(Method::GET, url.clone(), &[], None, tenant)
                .await?;
            let task: Task = response.json().await?;

            if task.is_finished() {
                if task.is_success() {
                    return Ok(task);
                }
                let message = task
                    .error
                    .map(|e| e.message)
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| format!("ended with status {}", task.status));
                return Err(ClientError::Task {
                    task: task.id,
                    message,
                });
            }

            tracing::trace!(task = %task.id, status = %task.status, "waiting for task");
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn send(
        &self,
        method: Method,
        url: Url,
        query: &[(&str, String)],
        body: Option<serde_json::Value>,
        tenant: Option<&str>,
    ) -> Result<Response> {
        let deadline = Instant::now() + self.max_retry_timeout;

        loop {
            let mut request = self
                .http
                .request(method.clone(), url.clone())
                .header(ACCEPT, accept_header())
                .bearer_auth(&*self.token);
            if !query.is_empty() {
                request = request.query(query);
            }
            if let Some(org_id) = tenant {
                request = request.header(TENANT_CONTEXT_HEADER, uuid_from_urn(org_id));
            }
            if let Some(body) = &body {
                request = request.json(body);
            }

            tracing::debug!(%method, %url, "sending request");
            let response = request.send().await?;

            match check_status(response).await {
                Ok(response) => return Ok(response),
                Err(err) if err.is_busy() && Instant::now() + self.retry_pause <= deadline => {
                    tracing::warn!(%method, %url, "entity is busy, retrying: {err}");
                    tokio::time::sleep(self.retry_pause).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let mut body: ApiErrorBody = response.json().await.unwrap_or_default();
    if body.message.is_empty() {
        body.message = status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string();
    }
    Err(ClientError::api(status, body))
}
