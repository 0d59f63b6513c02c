//! HTTP command interface subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (accept loop, hyper HTTP/1.1, graceful drain)
//!     → request.rs (x-request-id)
//!     → commands.rs (parse path → lifecycle call or status read)
//!     → text/plain response
//! ```

pub mod commands;
pub mod request;
pub mod server;

pub use commands::{AppState, Command};
pub use request::X_REQUEST_ID;
pub use server::{CommandServer, Termination, DEFAULT_DRAIN_TIMEOUT};
