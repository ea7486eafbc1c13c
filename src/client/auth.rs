use std::path::Path;

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use super::error::{ApiErrorBody, ClientError, Result};
use super::{accept_header, ACCESS_TOKEN_HEADER};
use crate::config::{ClientConfig, Credentials};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiTokenFile {
    #[serde(default)]
    pub token_type: String,
    pub refresh_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceAccountTokenFile {
    #[serde(default)]
    pub token_type: String,
    pub refresh_token: String,
    pub client_id: String,
}

#[derive(Debug, Deserialize)]
struct TokenReply {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
}

/// Log in with the configured credentials and return the bearer token.
pub async fn login(http: &reqwest::Client, config: &ClientConfig) -> Result<String> {
    tracing::debug!(
        org = %config.org,
        auth_type = %config.credentials.auth_type(),
        "logging in to {}",
        config.url
    );

    match &config.credentials {
        Credentials::Integrated { user, password } => {
            integrated_login(http, config, user, password).await
        }
        Credentials::Token(token) => Ok(token.clone()),
        Credentials::ApiToken(refresh_token) => {
            Ok(refresh(http, config, refresh_token, None).await?.access_token)
        }
        Credentials::ApiTokenFile(path) => {
            let file: ApiTokenFile = read_token_file(path).await?;
            if !file.token_type.is_empty() && file.token_type != "API Token" {
                return Err(token_file_error(
                    path,
                    format!("expected token_type 'API Token', got '{}'", file.token_type),
                ));
            }
            Ok(refresh(http, config, &file.refresh_token, None)
                .await?
                .access_token)
        }
        Credentials::ServiceAccountTokenFile(path) => {
            let mut file: ServiceAccountTokenFile = read_token_file(path).await?;
            let reply = refresh(http, config, &file.refresh_token, Some(&file.client_id)).await?;

            // The server rotates the refresh token on every use.
            if let Some(rotated) = reply.refresh_token {
                file.refresh_token = rotated;
                let content = serde_json::to_string_pretty(&file)?;
                tokio::fs::write(path, content)
                    .await
                    .map_err(|e| token_file_error(path, e.to_string()))?;
            }
            Ok(reply.access_token)
        }
    }
}

async fn integrated_login(
    http: &reqwest::Client,
    config: &ClientConfig,
    user: &str,
    password: &str,
) -> Result<String> {
    let path = if config.is_system_org() {
        "cloudapi/1.0.0/sessions/provider"
    } else {
        "cloudapi/1.0.0/sessions"
    };
    let url = config.url.join(path)?;

    let response = http
        .post(url)
        .header(ACCEPT, accept_header())
        .basic_auth(format!("{user}@{}", config.org), Some(password))
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(login_error(response).await);
    }

    response
        .headers()
        .get(ACCESS_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .ok_or(ClientError::MissingAccessToken(ACCESS_TOKEN_HEADER))
}

async fn refresh(
    http: &reqwest::Client,
    config: &ClientConfig,
    refresh_token: &str,
    client_id: Option<&str>,
) -> Result<TokenReply> {
    let path = if config.is_system_org() {
        "oauth/provider/token".to_string()
    } else {
        format!("oauth/tenant/{}/token", config.org)
    };
    let url = config.url.join(&path)?;

    let body = {
        let mut form = url::form_urlencoded::Serializer::new(String::new());
        form.append_pair("grant_type", "refresh_token");
        if let Some(client_id) = client_id {
            form.append_pair("client_id", client_id);
        }
        form.append_pair("refresh_token", refresh_token);
        form.finish()
    };

    let response = http
        .post(url)
        .header(ACCEPT, "application/json")
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(body)
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(login_error(response).await);
    }
    Ok(response.json().await?)
}

async fn read_token_file<T>(path: &Path) -> Result<T>
where
    T: for<'de> Deserialize<'de>,
{
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| token_file_error(path, e.to_string()))?;
    serde_json::from_str(&content).map_err(|e| token_file_error(path, e.to_string()))
}

async fn login_error(response: reqwest::Response) -> ClientError {
    let status = response.status();
    let body: ApiErrorBody = response.json().await.unwrap_or_default();
    let message = if body.message.is_empty() {
        status.to_string()
    } else {
        format!("{status}: {}", body.message)
    };
    ClientError::Login { message }
}

fn token_file_error(path: &Path, message: String) -> ClientError {
    ClientError::TokenFile {
        path: path.display().to_string(),
        message,
    }
}
