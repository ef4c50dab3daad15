//! Primitives shared by both credential exchanges: tokens, PKCE/CSRF material, errors and headers.

pub mod crypto;
pub mod error;
pub mod headers;
pub mod types;

/// Normalise an operator supplied endpoint into an absolute base URL without trailing slash.
///
/// Bare hosts are assumed to speak HTTPS.
pub fn https_base(endpoint: &str) -> String {
    let endpoint = endpoint.trim().trim_end_matches('/');
    if endpoint.contains("://") {
        endpoint.to_string()
    } else {
        format!("https://{endpoint}")
    }
}
