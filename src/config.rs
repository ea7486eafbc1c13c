use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

pub const SYSTEM_ORG: &str = "System";
pub const DEFAULT_MAX_RETRY_TIMEOUT: u64 = 60;
pub const DEFAULT_IMPORT_SEPARATOR: &str = ".";

/// Provider block as written in the Terraform configuration.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub url: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub org: Option<String>,
    pub auth_type: Option<String>,
    pub token: Option<String>,
    pub api_token: Option<String>,
    pub api_token_file: Option<String>,
    pub service_account_token_file: Option<String>,
    pub allow_unverified_ssl: Option<bool>,
    pub max_retry_timeout: Option<i64>,
    pub import_separator: Option<String>,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{attribute} is required (set it in the provider block or with {env})")]
    Missing {
        attribute: &'static str,
        env: &'static str,
    },

    #[error("url '{url}' is invalid: {message}")]
    InvalidUrl { url: String, message: String },

    #[error("auth_type '{0}' is not supported, expected one of: integrated, token, api_token, api_token_file, service_account_token_file")]
    UnknownAuthType(String),

    #[error("{env} must be a boolean, got '{value}'")]
    InvalidBool { env: &'static str, value: String },

    #[error("max_retry_timeout must be a non-negative number of seconds, got '{0}'")]
    InvalidRetryTimeout(String),

    #[error("import_separator must not be empty")]
    EmptySeparator,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthType {
    #[default]
    Integrated,
    Token,
    ApiToken,
    ApiTokenFile,
    ServiceAccountTokenFile,
}

impl FromStr for AuthType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "integrated" => Ok(Self::Integrated),
            "token" => Ok(Self::Token),
            "api_token" => Ok(Self::ApiToken),
            "api_token_file" => Ok(Self::ApiTokenFile),
            "service_account_token_file" => Ok(Self::ServiceAccountTokenFile),
            other => Err(ConfigError::UnknownAuthType(other.to_string())),
        }
    }
}

impl fmt::Display for AuthType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Integrated => "integrated",
            Self::Token => "token",
            Self::ApiToken => "api_token",
            Self::ApiTokenFile => "api_token_file",
            Self::ServiceAccountTokenFile => "service_account_token_file",
        };
        f.write_str(name)
    }
}

/// Credentials for one of the supported login flows.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    Integrated { user: String, password: String },
    Token(String),
    ApiToken(String),
    ApiTokenFile(PathBuf),
    ServiceAccountTokenFile(PathBuf),
}

impl Credentials {
    pub fn auth_type(&self) -> AuthType {
        match self {
            Self::Integrated { .. } => AuthType::Integrated,
            Self::Token(_) => AuthType::Token,
            Self::ApiToken(_) => AuthType::ApiToken,
            Self::ApiTokenFile(_) => AuthType::ApiTokenFile,
            Self::ServiceAccountTokenFile(_) => AuthType::ServiceAccountTokenFile,
        }
    }
}

// Secrets stay out of logs and diagnostics.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integrated { user, .. } => f
                .debug_struct("Integrated")
                .field("user", user)
                .field("password", &"<redacted>")
                .finish(),
            Self::Token(_) => f.write_str("Token(<redacted>)"),
            Self::ApiToken(_) => f.write_str("ApiToken(<redacted>)"),
            Self::ApiTokenFile(path) => f.debug_tuple("ApiTokenFile").field(path).finish(),
            Self::ServiceAccountTokenFile(path) => f
                .debug_tuple("ServiceAccountTokenFile")
                .field(path)
                .finish(),
        }
    }
}

/// Fully resolved connection settings.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub url: Url,
    pub org: String,
    pub credentials: Credentials,
    pub allow_unverified_ssl: bool,
    pub max_retry_timeout: Duration,
    pub import_separator: String,
}

impl ClientConfig {
    /// Resolve the provider block against the process environment.
    pub fn resolve(config: &ProviderConfig) -> Result<Self, ConfigError> {
        Self::resolve_with(config, |name| std::env::var(name).ok())
    }

    /// Resolve the provider block, looking up unset attributes with `env`.
    pub fn resolve_with<F>(config: &ProviderConfig, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let pick = |value: &Option<String>, name: &str| {
            value
                .clone()
                .or_else(|| env(name))
                .filter(|v| !v.is_empty())
        };

        let url = pick(&config.url, "VCFA_URL").ok_or(ConfigError::Missing {
            attribute: "url",
            env: "VCFA_URL",
        })?;
        let url = parse_endpoint(&url)?;

        let org = pick(&config.org, "VCFA_ORG").unwrap_or_else(|| SYSTEM_ORG.to_string());

        let auth_type = match pick(&config.auth_type, "VCFA_AUTH_TYPE") {
            Some(value) => value.parse()?,
            None => AuthType::default(),
        };

        let credentials = match auth_type {
            AuthType::Integrated => Credentials::Integrated {
                user: pick(&config.user, "VCFA_USER").ok_or(ConfigError::Missing {
                    attribute: "user",
                    env: "VCFA_USER",
                })?,
                password: pick(&config.password, "VCFA_PASSWORD").ok_or(
                    ConfigError::Missing {
                        attribute: "password",
                        env: "VCFA_PASSWORD",
                    },
                )?,
            },
            AuthType::Token => {
                Credentials::Token(pick(&config.token, "VCFA_TOKEN").ok_or(
                    ConfigError::Missing {
                        attribute: "token",
                        env: "VCFA_TOKEN",
                    },
                )?)
            }
            AuthType::ApiToken => {
                Credentials::ApiToken(pick(&config.api_token, "VCFA_API_TOKEN").ok_or(
                    ConfigError::Missing {
                        attribute: "api_token",
                        env: "VCFA_API_TOKEN",
                    },
                )?)
            }
            AuthType::ApiTokenFile => Credentials::ApiTokenFile(
                pick(&config.api_token_file, "VCFA_API_TOKEN_FILE")
                    .ok_or(ConfigError::Missing {
                        attribute: "api_token_file",
                        env: "VCFA_API_TOKEN_FILE",
                    })?
                    .into(),
            ),
            AuthType::ServiceAccountTokenFile => Credentials::ServiceAccountTokenFile(
                pick(&config.service_account_token_file, "VCFA_SA_TOKEN_FILE")
                    .ok_or(ConfigError::Missing {
                        attribute: "service_account_token_file",
                        env: "VCFA_SA_TOKEN_FILE",
                    })?
                    .into(),
            ),
        };

        let allow_unverified_ssl = match config.allow_unverified_ssl {
            Some(value) => value,
            None => match env("VCFA_ALLOW_UNVERIFIED_SSL") {
                Some(value) => parse_bool("VCFA_ALLOW_UNVERIFIED_SSL", &value)?,
                None => false,
            },
        };

        let max_retry_timeout = match config.max_retry_timeout {
            Some(seconds) => u64::try_from(seconds)
                .map_err(|_| ConfigError::InvalidRetryTimeout(seconds.to_string()))?,
            None => match env("VCFA_MAX_RETRY_TIMEOUT") {
                Some(value) => value
                    .trim()
                    .parse::<u64>()
                    .map_err(|_| ConfigError::InvalidRetryTimeout(value))?,
                None => DEFAULT_MAX_RETRY_TIMEOUT,
            },
        };

        let import_separator = match config.import_separator.clone() {
            Some(separator) => separator,
            None => env("VCFA_IMPORT_SEPARATOR")
                .unwrap_or_else(|| DEFAULT_IMPORT_SEPARATOR.to_string()),
        };
        if import_separator.is_empty() {
            return Err(ConfigError::EmptySeparator);
        }

        Ok(Self {
            url,
            org,
            credentials,
            allow_unverified_ssl,
            max_retry_timeout: Duration::from_secs(max_retry_timeout),
            import_separator,
        })
    }

    pub fn is_system_org(&self) -> bool {
        self.org.eq_ignore_ascii_case(SYSTEM_ORG)
    }
}

/// Accepts `https://host`, `https://host/` and `https://host/api`.
fn parse_endpoint(raw: &str) -> Result<Url, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    let trimmed = trimmed.strip_suffix("/api").unwrap_or(trimmed);

    let mut url = Url::parse(trimmed).map_err(|e| ConfigError::InvalidUrl {
        url: raw.to_string(),
        message: e.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidUrl {
            url: raw.to_string(),
            message: format!("unsupported scheme '{}'", url.scheme()),
        });
    }
    // API paths are joined relative to the endpoint.
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn parse_bool(env: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" | "" => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            env,
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn integrated() -> ProviderConfig {
        ProviderConfig {
            url: Some("https://vcfa.example.com".to_string()),
            user: Some("admin".to_string()),
            password: Some("secret".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn defaults_to_integrated_system_login() {
        let config = ClientConfig::resolve_with(&integrated(), no_env).unwrap();

        assert_eq!(config.org, SYSTEM_ORG);
        assert!(config.is_system_org());
        assert_eq!(config.credentials.auth_type(), AuthType::Integrated);
        assert_eq!(config.max_retry_timeout, Duration::from_secs(60));
        assert_eq!(config.import_separator, ".");
        assert!(!config.allow_unverified_ssl);
    }

    #[test]
    fn strips_api_suffix_from_url() {
        let mut provider = integrated();
        provider.url = Some("https://vcfa.example.com/api/".to_string());

        let config = ClientConfig::resolve_with(&provider, no_env).unwrap();

        assert_eq!(config.url.as_str(), "https://vcfa.example.com/");
    }

    #[test]
    fn keeps_endpoint_path_prefix() {
        let mut provider = integrated();
        provider.url = Some("https://gateway.example.com/vcfa".to_string());

        let config = ClientConfig::resolve_with(&provider, no_env).unwrap();

        assert_eq!(config.url.as_str(), "https://gateway.example.com/vcfa/");
    }

    #[test]
    fn rejects_missing_url() {
        let mut provider = integrated();
        provider.url = None;

        let err = ClientConfig::resolve_with(&provider, no_env).unwrap_err();

        assert_eq!(
            err,
            ConfigError::Missing {
                attribute: "url",
                env: "VCFA_URL"
            }
        );
    }

    #[test]
    fn rejects_non_http_url() {
        let mut provider = integrated();
        provider.url = Some("ftp://vcfa.example.com".to_string());

        let err = ClientConfig::resolve_with(&provider, no_env).unwrap_err();

        assert!(matches!(err, ConfigError::InvalidUrl { .. }));
    }

    #[test]
    fn integrated_requires_password() {
        let mut provider = integrated();
        provider.password = None;

        let err = ClientConfig::resolve_with(&provider, no_env).unwrap_err();

        assert!(err.to_string().contains("password"));
    }

    #[test]
    fn environment_fills_unset_attributes() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("VCFA_URL", "https://env.example.com"),
            ("VCFA_AUTH_TYPE", "api_token"),
            ("VCFA_API_TOKEN", "refresh"),
            ("VCFA_ORG", "acme"),
            ("VCFA_ALLOW_UNVERIFIED_SSL", "true"),
            ("VCFA_MAX_RETRY_TIMEOUT", "5"),
            ("VCFA_IMPORT_SEPARATOR", "/"),
        ]);

        let config = ClientConfig::resolve_with(&ProviderConfig::default(), |name| {
            env.get(name).map(|v| v.to_string())
        })
        .unwrap();

        assert_eq!(config.url.host_str(), Some("env.example.com"));
        assert_eq!(config.org, "acme");
        assert!(!config.is_system_org());
        assert_eq!(config.credentials, Credentials::ApiToken("refresh".to_string()));
        assert!(config.allow_unverified_ssl);
        assert_eq!(config.max_retry_timeout, Duration::from_secs(5));
        assert_eq!(config.import_separator, "/");
    }

    #[test]
    fn explicit_attribute_wins_over_environment() {
        let config = ClientConfig::resolve_with(&integrated(), |name| match name {
            "VCFA_URL" => Some("https://other.example.com".to_string()),
            _ => None,
        })
        .unwrap();

        assert_eq!(config.url.host_str(), Some("vcfa.example.com"));
    }

    #[test]
    fn rejects_unknown_auth_type() {
        let mut provider = integrated();
        provider.auth_type = Some("saml".to_string());

        let err = ClientConfig::resolve_with(&provider, no_env).unwrap_err();

        assert_eq!(err, ConfigError::UnknownAuthType("saml".to_string()));
    }

    #[test]
    fn token_file_auth_requires_path() {
        let provider = ProviderConfig {
            url: Some("https://vcfa.example.com".to_string()),
            auth_type: Some("service_account_token_file".to_string()),
            ..Default::default()
        };

        let err = ClientConfig::resolve_with(&provider, no_env).unwrap_err();

        assert!(err.to_string().contains("VCFA_SA_TOKEN_FILE"));
    }

    #[test]
    fn rejects_negative_retry_timeout() {
        let mut provider = integrated();
        provider.max_retry_timeout = Some(-1);

        let err = ClientConfig::resolve_with(&provider, no_env).unwrap_err();

        assert_eq!(err, ConfigError::InvalidRetryTimeout("-1".to_string()));
    }

    #[test]
    fn rejects_empty_import_separator() {
        let mut provider = integrated();
        provider.import_separator = Some(String::new());

        let err = ClientConfig::resolve_with(&provider, no_env).unwrap_err();

        assert_eq!(err, ConfigError::EmptySeparator);
    }

    #[test]
    fn debug_output_hides_secrets() {
        let config = ClientConfig::resolve_with(&integrated(), no_env).unwrap();

        let rendered = format!("{config:?}");

        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("admin"));
    }
}
