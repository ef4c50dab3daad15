//! Operator configuration: endpoints, credentials and TLS material.
//!
//! Loaded from the environment (optionally via a `.env` file) or deserialized
//! from a host tool's own configuration.
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use mgmt_auth_core::TrustConfig;
use mgmt_auth_oauth::BrokerCredentials;
use mgmt_auth_oauth::oauth_core::https_base;
use serde::Deserialize;
use url::Url;

pub const SERVER_ENDPOINT: &str = "MGMT_SERVER_ENDPOINT";
pub const DEPLOYMENT: &str = "MGMT_DEPLOYMENT";
pub const IDENTITY_ENDPOINT: &str = "MGMT_IDENTITY_ENDPOINT";
pub const REFRESH_TOKEN: &str = "MGMT_REFRESH_TOKEN";
pub const BROKER_ENDPOINT: &str = "MGMT_BROKER_ENDPOINT";
pub const USERNAME: &str = "MGMT_USERNAME";
pub const PASSWORD: &str = "MGMT_PASSWORD";
pub const PROJECT_ID: &str = "MGMT_PROJECT_ID";
pub const TLS_INSECURE: &str = "MGMT_TLS_INSECURE";
pub const TLS_CLIENT_CERT_FILE: &str = "MGMT_TLS_CLIENT_CERT_FILE";
pub const TLS_CLIENT_KEY_FILE: &str = "MGMT_TLS_CLIENT_KEY_FILE";
pub const TLS_CLIENT_CERT_PEM: &str = "MGMT_TLS_CLIENT_CERT_PEM";
pub const TLS_CLIENT_KEY_PEM: &str = "MGMT_TLS_CLIENT_KEY_PEM";
pub const TLS_CA_FILE: &str = "MGMT_TLS_CA_FILE";
pub const TLS_CA_PEM: &str = "MGMT_TLS_CA_PEM";

pub const DEFAULT_IDENTITY_ENDPOINT: &str = "console.cloud.vmware.com";
/// Prefix of the default broker host, in front of the server host.
pub const BROKER_HOST_PREFIX: &str = "pinniped-supervisor";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing configuration: {0}")]
    Missing(&'static str),
    #[error("invalid configuration: {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
    #[error("conflicting configuration: {0}")]
    Conflict(String),
}

/// Which identity model the management plane uses. Fixed for the life of a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeploymentMode {
    Saas,
    SelfManaged,
}

impl fmt::Display for DeploymentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Saas => f.write_str("saas"),
            Self::SelfManaged => f.write_str("self-managed"),
        }
    }
}

impl FromStr for DeploymentMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "saas" | "cloud" => Ok(Self::Saas),
            "self-managed" | "self_managed" | "selfmanaged" | "on-prem" => Ok(Self::SelfManaged),
            other => Err(ConfigError::Invalid {
                key: DEPLOYMENT,
                reason: format!("unknown deployment mode {other:?}"),
            }),
        }
    }
}

/// Long-lived credentials, one kind per mode.
#[derive(Clone, Deserialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum Credentials {
    Saas {
        #[serde(default = "default_identity_endpoint")]
        identity_endpoint: String,
        refresh_token: String,
    },
    SelfManaged(BrokerCredentials),
}

fn default_identity_endpoint() -> String {
    DEFAULT_IDENTITY_ENDPOINT.to_string()
}

impl Credentials {
    pub fn mode(&self) -> DeploymentMode {
        match self {
            Self::Saas { .. } => DeploymentMode::Saas,
            Self::SelfManaged(_) => DeploymentMode::SelfManaged,
        }
    }

    /// Endpoint the credentials are exchanged at.
    pub fn exchange_endpoint(&self) -> &str {
        match self {
            Self::Saas { identity_endpoint, .. } => identity_endpoint,
            Self::SelfManaged(broker) => &broker.broker_host,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Saas { identity_endpoint, .. } => f
                .debug_struct("Saas")
                .field("identity_endpoint", identity_endpoint)
                .field("refresh_token", &"<redacted>")
                .finish(),
            Self::SelfManaged(broker) => f.debug_tuple("SelfManaged").field(broker).finish(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub server_endpoint: String,
    pub credentials: Credentials,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub trust: TrustConfig,
}

impl AuthConfig {
    /// Read the configuration from the process environment, loading `.env` first if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let server_endpoint = get(SERVER_ENDPOINT).ok_or(ConfigError::Missing(SERVER_ENDPOINT))?;
        let refresh_token = get(REFRESH_TOKEN);
        let username = get(USERNAME);
        let password = get(PASSWORD);

        let mode = match get(DEPLOYMENT) {
            Some(value) => value.parse()?,
            None => match (&refresh_token, username.is_some() || password.is_some()) {
                (Some(_), true) => {
                    return Err(ConfigError::Conflict(format!(
                        "both {REFRESH_TOKEN} and {USERNAME}/{PASSWORD} are set; \
                         choose one with {DEPLOYMENT}"
                    )));
                }
                (Some(_), false) => DeploymentMode::Saas,
                (None, true) => DeploymentMode::SelfManaged,
                (None, false) => return Err(ConfigError::Missing(REFRESH_TOKEN)),
            },
        };

        let credentials = match mode {
            DeploymentMode::Saas => Credentials::Saas {
                identity_endpoint: get(IDENTITY_ENDPOINT).unwrap_or_else(default_identity_endpoint),
                refresh_token: refresh_token.ok_or(ConfigError::Missing(REFRESH_TOKEN))?,
            },
            DeploymentMode::SelfManaged => Credentials::SelfManaged(BrokerCredentials::new(
                get(BROKER_ENDPOINT).unwrap_or_default(),
                username.ok_or(ConfigError::Missing(USERNAME))?,
                password.ok_or(ConfigError::Missing(PASSWORD))?,
            )),
        };

        let insecure = match get(TLS_INSECURE) {
            Some(value) => parse_bool(TLS_INSECURE, &value)?,
            None => false,
        };
        let trust = TrustConfig {
            allow_insecure: insecure,
            client_cert_path: get(TLS_CLIENT_CERT_FILE).map(PathBuf::from),
            client_key_path: get(TLS_CLIENT_KEY_FILE).map(PathBuf::from),
            client_cert_pem: get(TLS_CLIENT_CERT_PEM),
            client_key_pem: get(TLS_CLIENT_KEY_PEM),
            ca_cert_path: get(TLS_CA_FILE).map(PathBuf::from),
            ca_cert_pem: get(TLS_CA_PEM),
        };

        let mut config = Self {
            server_endpoint,
            credentials,
            project_id: get(PROJECT_ID),
            trust,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn mode(&self) -> DeploymentMode {
        self.credentials.mode()
    }

    /// Check required values and fill in derived defaults (the broker host).
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        let server = self.parsed_server()?;
        match &mut self.credentials {
            Credentials::Saas { identity_endpoint, refresh_token } => {
                if refresh_token.is_empty() {
                    return Err(ConfigError::Missing(REFRESH_TOKEN));
                }
                if identity_endpoint.trim().is_empty() {
                    *identity_endpoint = default_identity_endpoint();
                }
            }
            Credentials::SelfManaged(broker) => {
                if broker.username.is_empty() {
                    return Err(ConfigError::Missing(USERNAME));
                }
                if broker.password.is_empty() {
                    return Err(ConfigError::Missing(PASSWORD));
                }
                if broker.broker_host.trim().is_empty() {
                    let host = server.host_str().unwrap_or_default();
                    broker.broker_host = format!("{BROKER_HOST_PREFIX}.{host}");
                }
            }
        }
        Ok(())
    }

    /// Absolute base URL of the management API.
    pub fn server_url(&self) -> String {
        https_base(&self.server_endpoint)
    }

    /// `host[:port]` of the management API, as sent in the `Host` header.
    pub fn server_host(&self) -> Result<String, ConfigError> {
        let url = self.parsed_server()?;
        let host = url.host_str().unwrap_or_default();
        Ok(match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        })
    }

    fn parsed_server(&self) -> Result<Url, ConfigError> {
        if self.server_endpoint.trim().is_empty() {
            return Err(ConfigError::Missing(SERVER_ENDPOINT));
        }
        let invalid = |reason: String| ConfigError::Invalid { key: SERVER_ENDPOINT, reason };
        let url = Url::parse(&self.server_url()).map_err(|e| invalid(e.to_string()))?;
        if url.host_str().is_none_or(str::is_empty) {
            return Err(invalid("endpoint has no host".into()));
        }
        Ok(url)
    }
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::Invalid {
            key,
            reason: format!("expected a boolean, got {other:?}"),
        }),
    }
}
