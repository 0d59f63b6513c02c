//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Commands (http::commands):
//!     /start → manager.rs start() → stop-if-running → allocate ports → launch
//!     /stop  → manager.rs stop()  → shutdown.rs trigger()
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → shutdown.rs trigger()
//!
//! Shutdown (http::server):
//!     signal observed → stop accepting → drain connections → manager stop()
//! ```
//!
//! # Design Decisions
//! - One manager per process, shared via Arc and passed in explicitly
//! - The shutdown signal is one-shot and never reset

pub mod manager;
pub mod shutdown;
pub mod signals;

pub use manager::{LifecycleError, LifecycleManager, ServiceStatus};
pub use shutdown::Shutdown;
