pub mod error;
pub mod trust;
mod verifier;

pub use self::error::{Result, TrustError};
pub use self::trust::{resolve, TlsMaterial, TrustConfig};
