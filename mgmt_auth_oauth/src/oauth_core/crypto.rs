//! PKCE and CSRF material using `ring`.
//!
//! Both are single-use secrets scoped to one authorization attempt; neither
//! type is `Clone` and their `Debug` output is redacted.
use std::fmt;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use ring::digest;
use ring::rand::{SecureRandom, SystemRandom};

use super::error::AuthError;

/// PKCE method used for every challenge.
pub const PKCE_METHOD: &str = "S256";

/// Generate a PKCE code challenge from the given verifier using SHA-256 and base64url (no padding).
pub fn pkce_code_challenge(verifier: &str) -> String {
    let hash = digest::digest(&digest::SHA256, verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash.as_ref())
}

fn random_urlsafe(rng: &SystemRandom, len: usize, what: &'static str) -> Result<String, AuthError> {
    let mut buf = vec![0u8; len];
    rng.fill(&mut buf).map_err(|_| AuthError::Crypto(what))?;
    Ok(URL_SAFE_NO_PAD.encode(&buf))
}

/// PKCE code verifier with its derived challenge.
pub struct PkcePair {
    verifier: String,
    challenge: String,
}

impl PkcePair {
    /// Fresh verifier from 32 random bytes (43 base64url characters).
    pub fn generate() -> Result<Self, AuthError> {
        let verifier = random_urlsafe(&SystemRandom::new(), 32, "PKCE code verifier")?;
        let challenge = pkce_code_challenge(&verifier);
        Ok(Self { verifier, challenge })
    }

    pub fn verifier(&self) -> &str {
        &self.verifier
    }

    pub fn challenge(&self) -> &str {
        &self.challenge
    }

    pub fn method(&self) -> &'static str {
        PKCE_METHOD
    }
}

impl fmt::Debug for PkcePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PkcePair")
            .field("challenge", &self.challenge)
            .field("method", &PKCE_METHOD)
            .finish_non_exhaustive()
    }
}

/// Opaque anti-CSRF nonce echoed back through the redirect.
pub struct CsrfState(String);

impl CsrfState {
    pub fn generate() -> Result<Self, AuthError> {
        random_urlsafe(&SystemRandom::new(), 16, "CSRF state").map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn matches(&self, echoed: &str) -> bool {
        self.0 == echoed
    }
}

impl fmt::Debug for CsrfState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CsrfState(<redacted>)")
    }
}
