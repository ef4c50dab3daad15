pub mod client;
pub mod error;
pub mod memory;
pub mod reqwest_client;

pub use self::client::{
    HttpMethod, HttpRequest, HttpResponse, HttpTransport, RedirectPolicy, TransportFuture,
};
pub use self::error::{TransportError, TransportErrorKind};
pub use self::memory::InMemoryHttpClient;
pub use self::reqwest_client::{ClientTuning, ReqwestHttpClient};
