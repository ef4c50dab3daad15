//! Authentication for management-plane API clients.
//!
//! [`AuthenticationContext`] owns the shared [`Connection`] and keeps its
//! authorization headers valid, either by exchanging a SaaS refresh token or
//! by logging in to a self-managed identity broker.

pub mod config;
pub mod context;
pub mod exchange;
pub mod logging;

pub use config::{AuthConfig, ConfigError, Credentials, DeploymentMode};
pub use context::{AuthenticationContext, ContextError, HOST_HEADER, PROJECT_ID_HEADER};
pub use exchange::{HeaderSource, RetryPolicy, SaasExchange, SelfManagedExchange};

pub use mgmt_auth_core::{
    Connection, ConnectionError, HeaderSet, TlsMaterial, TrustConfig, TrustError,
};
pub use mgmt_auth_oauth::{AuthError, BrokerCredentials, TokenSet};
