pub mod broker;
pub mod oauth_core;
pub mod saas;

pub use broker::{self_managed_headers, BrokerCredentials, IdentityBrokerSession};
pub use oauth_core::crypto::{CsrfState, PkcePair};
pub use oauth_core::error::AuthError;
pub use oauth_core::headers::{AUTHORIZATION_HEADER, ID_TOKEN_HEADER, REFRESH_TOKEN_HEADER};
pub use oauth_core::types::TokenSet;
pub use saas::TokenExchangeClient;
