use std::error::Error as StdError;
use std::fmt;
use std::io;

/// Transport level failure classes.
///
/// The retry policy of the token exchanges is expressed over these kinds
/// instead of over a generic error chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// The OS refused or failed the TCP connect to an already resolved address.
    SocketConnect,
    /// Any other connect-phase failure, name resolution included.
    Connect,
    Timeout,
    Tls,
    /// The request could not be built or sent.
    Request,
    /// The response body could not be read.
    Body,
    Other,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SocketConnect => write!(f, "socket connect failed"),
            Self::Connect => write!(f, "connection failed"),
            Self::Timeout => write!(f, "timed out"),
            Self::Tls => write!(f, "TLS failure"),
            Self::Request => write!(f, "invalid request"),
            Self::Body => write!(f, "failed to read body"),
            Self::Other => write!(f, "transport error"),
        }
    }
}

/// Error returned by an [`HttpTransport`](super::HttpTransport).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    /// Simulated OS-level connect failure, mostly useful to tests.
    pub fn socket_connect(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::SocketConnect, message)
    }

    /// True only for OS-level TCP connect failures, the one class worth an immediate retry.
    pub fn is_socket_connect(&self) -> bool {
        self.kind == TransportErrorKind::SocketConnect
    }

    pub fn is_timeout(&self) -> bool {
        self.kind == TransportErrorKind::Timeout
    }

    pub(crate) fn from_reqwest(error: reqwest::Error) -> Self {
        let kind = if error.is_timeout() {
            TransportErrorKind::Timeout
        } else if error.is_connect() {
            match find_io_error(&error) {
                Some(io) if is_socket_connect(io) => TransportErrorKind::SocketConnect,
                _ if find_rustls_error(&error) => TransportErrorKind::Tls,
                _ => TransportErrorKind::Connect,
            }
        } else if error.is_builder() || error.is_request() {
            TransportErrorKind::Request
        } else if error.is_body() || error.is_decode() {
            TransportErrorKind::Body
        } else {
            TransportErrorKind::Other
        };
        Self::new(kind, error_chain(&error))
    }
}

/// An I/O error carrying a raw OS code came out of a failed connect syscall.
/// Resolver failures surface as I/O errors without one.
pub fn is_socket_connect(error: &io::Error) -> bool {
    error.raw_os_error().is_some()
        || matches!(
            error.kind(),
            io::ErrorKind::ConnectionRefused
                | io::ErrorKind::ConnectionReset
                | io::ErrorKind::ConnectionAborted
                | io::ErrorKind::AddrNotAvailable
                | io::ErrorKind::NetworkUnreachable
                | io::ErrorKind::HostUnreachable
        )
}

fn find_io_error<'a>(error: &'a (dyn StdError + 'static)) -> Option<&'a io::Error> {
    let mut source = error.source();
    while let Some(err) = source {
        if let Some(io) = err.downcast_ref::<io::Error>() {
            return Some(io);
        }
        source = err.source();
    }
    None
}

fn find_rustls_error(error: &(dyn StdError + 'static)) -> bool {
    let mut source = error.source();
    while let Some(err) = source {
        if err.downcast_ref::<rustls::Error>().is_some() {
            return true;
        }
        // tokio-rustls hides the rustls error inside an io::Error payload
        if let Some(inner) = err.downcast_ref::<io::Error>().and_then(io::Error::get_ref) {
            if inner.is::<rustls::Error>() {
                return true;
            }
        }
        source = err.source();
    }
    false
}

fn error_chain(error: &(dyn StdError + 'static)) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(err) = source {
        message.push_str(": ");
        message.push_str(&err.to_string());
        source = err.source();
    }
    message
}
