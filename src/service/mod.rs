//! Managed service abstraction.
//!
//! # Data Flow
//! ```text
//! LifecycleManager
//!     → ports.rs (ephemeral TCP + UDP port)
//!     → ServiceLauncher::launch (bind, spawn host)
//!     → ServiceHandle::add_endpoint (/avatar)
//!     → ServiceHandle::dispose (exactly once per launch)
//! ```
//!
//! # Design Decisions
//! - The lifecycle manager only sees these traits; tests swap in stubs
//! - Launch is synchronous and local, so it runs under the lifecycle lock

pub mod oscquery;
pub mod ports;

use std::fmt;
use std::io;

use serde_json::Value;
use thiserror::Error;

pub use oscquery::OscQueryLauncher;
pub use ports::{EphemeralPorts, PortAllocator};

/// Transport protocol of an allocated port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Tcp,
    Udp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "TCP"),
            Protocol::Udp => write!(f, "UDP"),
        }
    }
}

/// The port pair assigned to one service instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ServicePorts {
    pub tcp: u16,
    pub udp: u16,
}

/// Everything a launcher needs to bring up one instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSpec {
    pub tcp_port: u16,
    pub udp_port: u16,
    pub name: String,
}

/// OSCQuery access level of an endpoint.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    NoValue = 0,
    ReadOnly = 1,
    WriteOnly = 2,
    ReadWrite = 3,
}

impl Access {
    /// Whether clients may read the current value.
    pub fn is_readable(self) -> bool {
        matches!(self, Access::ReadOnly | Access::ReadWrite)
    }
}

/// A named data endpoint registered on a running service.
#[derive(Debug, Clone, PartialEq)]
pub struct Endpoint {
    /// Absolute OSC address, e.g. `/avatar`.
    pub path: String,
    /// OSC type tag string, e.g. `s`.
    pub type_tag: String,
    pub access: Access,
    pub value: Vec<Value>,
    pub description: Option<String>,
}

impl Endpoint {
    /// The endpoint every started instance exposes.
    pub fn avatar() -> Self {
        Self {
            path: "/avatar".to_string(),
            type_tag: "s".to_string(),
            access: Access::WriteOnly,
            value: vec![Value::from("This is my avatar endpoint")],
            description: None,
        }
    }
}

/// Errors raised by a managed service.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Could not bind the assigned port.
    #[error("failed to bind {protocol} port {port}: {source}")]
    Bind {
        protocol: Protocol,
        port: u16,
        #[source]
        source: io::Error,
    },

    /// Endpoint registration rejected.
    #[error("invalid endpoint {path}: {reason}")]
    Endpoint { path: String, reason: &'static str },

    #[error("service I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Constructs managed service instances.
pub trait ServiceLauncher: Send + Sync {
    /// Bring up a new instance on the given ports.
    fn launch(&self, spec: &ServiceSpec) -> Result<Box<dyn ServiceHandle>, ServiceError>;
}

/// A live managed service instance.
pub trait ServiceHandle: Send {
    /// Register a data endpoint on this instance.
    fn add_endpoint(&mut self, endpoint: Endpoint) -> Result<(), ServiceError>;

    /// Release every resource held by the instance.
    ///
    /// Sockets owned by background tasks may close shortly after this returns.
    fn dispose(self: Box<Self>);
}
