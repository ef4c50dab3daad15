pub mod error;
pub mod handle;
pub mod hook;

pub use self::error::{ConnectionError, Result};
pub use self::handle::Connection;
pub use self::hook::{HookError, PreRequestHook};
