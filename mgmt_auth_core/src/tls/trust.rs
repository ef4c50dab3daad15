use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustls::crypto::ring::default_provider;
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::{ClientConfig, RootCertStore};
use serde::Deserialize;
use tracing::{debug, warn};
use webpki_roots::TLS_SERVER_ROOTS;

use super::error::{LoadCause, Result, TrustError};
use super::verifier::AcceptAnyServerCert;

/// Operator supplied TLS inputs.
///
/// Client certificate and key come in pairs: file with file, inline with inline.
/// Both CA sources are independent and may both contribute trust anchors.
/// Empty strings count as "not provided".
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct TrustConfig {
    /// Disable peer certificate verification. Insecure, opt-in only.
    pub allow_insecure: bool,
    pub client_cert_path: Option<PathBuf>,
    pub client_key_path: Option<PathBuf>,
    pub client_cert_pem: Option<String>,
    pub client_key_pem: Option<String>,
    pub ca_cert_path: Option<PathBuf>,
    pub ca_cert_pem: Option<String>,
}

impl fmt::Debug for TrustConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrustConfig")
            .field("allow_insecure", &self.allow_insecure)
            .field("client_cert_path", &self.client_cert_path)
            .field("client_key_path", &self.client_key_path)
            .field("client_cert_pem", &self.client_cert_pem.as_ref().map(|_| "<pem>"))
            .field("client_key_pem", &self.client_key_pem.as_ref().map(|_| "<redacted>"))
            .field("ca_cert_path", &self.ca_cert_path)
            .field("ca_cert_pem", &self.ca_cert_pem.as_ref().map(|_| "<pem>"))
            .finish()
    }
}

/// Resolved transport trust and identity configuration, ready to hand to an HTTP client.
#[derive(Clone)]
pub struct TlsMaterial {
    config: Arc<ClientConfig>,
    insecure: bool,
    custom_roots: bool,
    trust_anchors: usize,
    client_identity: bool,
}

impl TlsMaterial {
    /// The rustls client configuration every outbound connection uses.
    pub fn client_config(&self) -> Arc<ClientConfig> {
        self.config.clone()
    }

    pub fn is_insecure(&self) -> bool {
        self.insecure
    }

    /// Whether operator supplied CA certificates replace the bundled web PKI roots.
    pub fn uses_custom_roots(&self) -> bool {
        self.custom_roots
    }

    /// Number of trust anchors peers are verified against (zero when insecure).
    pub fn trust_anchor_count(&self) -> usize {
        self.trust_anchors
    }

    pub fn has_client_identity(&self) -> bool {
        self.client_identity
    }
}

impl fmt::Debug for TlsMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsMaterial")
            .field("insecure", &self.insecure)
            .field("custom_roots", &self.custom_roots)
            .field("trust_anchors", &self.trust_anchors)
            .field("client_identity", &self.client_identity)
            .finish()
    }
}

type ClientIdentity = (Vec<CertificateDer<'static>>, PrivateKeyDer<'static>);

/// Build TLS material from a [`TrustConfig`].
///
/// Pure transformation: reads the referenced files but performs no network I/O.
/// Fails fast on the first malformed or incomplete input.
pub fn resolve(config: &TrustConfig) -> Result<TlsMaterial> {
    let identity = client_identity(config)?;
    let custom_roots = ca_roots(config)?;

    let provider = Arc::new(default_provider());
    let builder = ClientConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()?;

    let uses_custom_roots = custom_roots.is_some();
    let (builder, trust_anchors) = if config.allow_insecure {
        warn!("TLS peer certificate verification is disabled");
        let verifier = Arc::new(AcceptAnyServerCert::new(provider));
        (builder.dangerous().with_custom_certificate_verifier(verifier), 0)
    } else {
        let roots = custom_roots.unwrap_or_else(web_pki_roots);
        let anchors = roots.len();
        (builder.with_root_certificates(roots), anchors)
    };

    let has_identity = identity.is_some();
    let client_config = match identity {
        Some((certs, key)) => builder
            .with_client_auth_cert(certs, key)
            .map_err(|e| TrustError::load("client certificate pair", LoadCause::Pair(e)))?,
        None => builder.with_no_client_auth(),
    };

    debug!(
        insecure = config.allow_insecure,
        custom_roots = uses_custom_roots,
        trust_anchors,
        client_identity = has_identity,
        "Resolved TLS material"
    );
    Ok(TlsMaterial {
        config: Arc::new(client_config),
        insecure: config.allow_insecure,
        custom_roots: uses_custom_roots,
        trust_anchors,
        client_identity: has_identity,
    })
}

fn web_pki_roots() -> RootCertStore {
    let mut root_store = RootCertStore::empty();
    root_store.extend(TLS_SERVER_ROOTS.iter().cloned());
    root_store
}

fn non_empty_path(path: &Option<PathBuf>) -> Option<&Path> {
    path.as_deref().filter(|p| !p.as_os_str().is_empty())
}

fn non_empty_str(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

/// Check pairing first, then load. No file is touched while a pair is incomplete.
fn client_identity(config: &TrustConfig) -> Result<Option<ClientIdentity>> {
    let cert_path = non_empty_path(&config.client_cert_path);
    let key_path = non_empty_path(&config.client_key_path);
    let cert_pem = non_empty_str(&config.client_cert_pem);
    let key_pem = non_empty_str(&config.client_key_pem);

    match (cert_path, key_path) {
        (Some(_), None) => return Err(TrustError::MissingKeyFile),
        (None, Some(_)) => return Err(TrustError::MissingCertFile),
        _ => {}
    }
    match (cert_pem, key_pem) {
        (Some(_), None) => return Err(TrustError::MissingKey),
        (None, Some(_)) => return Err(TrustError::MissingCert),
        _ => {}
    }

    if let (Some(cert_path), Some(key_path)) = (cert_path, key_path) {
        if cert_pem.is_some() {
            warn!("Both file and inline client certificates are configured, using the files");
        }
        let what = "client certificate files";
        let cert = fs::read(cert_path).map_err(|e| TrustError::load(what, e))?;
        let key = fs::read(key_path).map_err(|e| TrustError::load(what, e))?;
        return parse_identity(&cert, &key, what).map(Some);
    }
    if let (Some(cert), Some(key)) = (cert_pem, key_pem) {
        let what = "inline client certificate";
        return parse_identity(cert.as_bytes(), key.as_bytes(), what).map(Some);
    }
    Ok(None)
}

fn parse_identity(cert: &[u8], key: &[u8], what: &'static str) -> Result<ClientIdentity> {
    let certs = CertificateDer::pem_slice_iter(cert)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| TrustError::load(what, e))?;
    if certs.is_empty() {
        return Err(TrustError::load(what, LoadCause::Empty));
    }
    let key = PrivateKeyDer::from_pem_slice(key).map_err(|e| TrustError::load(what, e))?;
    Ok((certs, key))
}

/// Collect operator supplied CA certificates, or `None` when no CA source is configured.
fn ca_roots(config: &TrustConfig) -> Result<Option<RootCertStore>> {
    let ca_path = non_empty_path(&config.ca_cert_path);
    let ca_pem = non_empty_str(&config.ca_cert_pem);
    if ca_path.is_none() && ca_pem.is_none() {
        return Ok(None);
    }

    let mut roots = RootCertStore::empty();
    if let Some(path) = ca_path {
        let pem = fs::read(path).map_err(|e| TrustError::load("CA certificate file", e))?;
        append_certs(&mut roots, &pem, "file")?;
    }
    if let Some(pem) = ca_pem {
        append_certs(&mut roots, pem.as_bytes(), "inline")?;
    }
    Ok(Some(roots))
}

fn append_certs(roots: &mut RootCertStore, pem: &[u8], source_kind: &'static str) -> Result<()> {
    let certs = CertificateDer::pem_slice_iter(pem)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| TrustError::load("CA certificates", e))?;
    let (added, ignored) = roots.add_parsable_certificates(certs);
    if ignored > 0 {
        warn!(source = source_kind, ignored, "Skipped unparsable CA certificates");
    }
    if added == 0 {
        return Err(TrustError::AppendFailed { source_kind });
    }
    debug!(source = source_kind, added, "Added CA certificates to the trust pool");
    Ok(())
}
