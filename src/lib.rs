//! Giggletech OSCQuery helper library.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod service;

pub use config::HelperConfig;
pub use http::CommandServer;
pub use lifecycle::{LifecycleManager, Shutdown};
