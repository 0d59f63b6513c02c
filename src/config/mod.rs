//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config_oscq.toml (or legacy config_oscq.yml)
//!     → loader.rs (read & parse by extension)
//!     → schema.rs (per-key coercion, defaults)
//!     → HelperConfig (immutable for the process lifetime)
//! ```
//!
//! # Design Decisions
//! - Configuration errors are never fatal; defaults are substituted and logged
//! - Each key falls back independently

pub mod loader;
pub mod schema;

pub use loader::{
    default_config_path, load_config, load_or_default, ConfigError, DEFAULT_CONFIG_FILE,
    LEGACY_CONFIG_FILE,
};
pub use schema::{ConfigIssue, HelperConfig, DEFAULT_HTTP_PORT, DEFAULT_SERVICE_NAME};
