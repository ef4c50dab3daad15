pub mod connection;
pub mod headers;
pub mod http;
pub mod tls;

pub use connection::{Connection, ConnectionError, HookError, PreRequestHook};
pub use headers::HeaderSet;
pub use http::{
    ClientTuning, HttpMethod, HttpRequest, HttpResponse, HttpTransport, InMemoryHttpClient,
    RedirectPolicy, ReqwestHttpClient, TransportError, TransportErrorKind,
};
pub use tls::{TlsMaterial, TrustConfig, TrustError};
