//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured events → stdout + service_log_oscq.txt)
//!     → metrics.rs (command counters, running gauge)
//!
//! Consumers:
//!     → Operators reading the log file
//!     → Optional Prometheus scrape (metricsAddress)
//! ```

pub mod logging;
pub mod metrics;
