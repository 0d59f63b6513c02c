//! Managed service lifecycle.
//!
//! # State Transitions
//! ```text
//! Stopped ──start()──▶ Running(handle)
//! Running ──start()──▶ dispose old ──▶ Running(new handle)
//! Running ──stop()───▶ Stopped
//! Stopped ──stop()───▶ Stopped (no-op)
//! ```
//!
//! # Design Decisions
//! - `start` and `stop` hold one async mutex for the whole transition, so
//!   two handles are never live and no handle is disposed twice
//! - `status` reads an `ArcSwap` snapshot published after each transition;
//!   it never waits on a running `start` and never sees a half-applied one
//! - Ports survive `stop` for post-mortem `/info`

use std::io;
use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::observability::metrics;
use crate::service::{
    Endpoint, PortAllocator, Protocol, ServiceError, ServiceHandle, ServiceLauncher, ServicePorts,
    ServiceSpec,
};

/// Errors returned by [`LifecycleManager::start`].
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("no free {protocol} port available: {source}")]
    PortAllocation {
        protocol: Protocol,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Service(#[from] ServiceError),
}

/// Point-in-time view of the managed service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceStatus {
    pub tcp_port: u16,
    pub udp_port: u16,
    pub service_name: String,
    pub running: bool,
}

enum LifecycleState {
    Stopped,
    Running(RunningService),
}

struct RunningService {
    handle: Box<dyn ServiceHandle>,
    ports: ServicePorts,
}

/// Owner of the single managed service instance.
pub struct LifecycleManager {
    service_name: String,
    launcher: Arc<dyn ServiceLauncher>,
    allocator: Arc<dyn PortAllocator>,
    state: Mutex<LifecycleState>,
    status: ArcSwap<ServiceStatus>,
}

impl LifecycleManager {
    pub fn new(
        service_name: impl Into<String>,
        launcher: Arc<dyn ServiceLauncher>,
        allocator: Arc<dyn PortAllocator>,
    ) -> Self {
        let service_name = service_name.into();
        let status = ServiceStatus {
            tcp_port: 0,
            udp_port: 0,
            service_name: service_name.clone(),
            running: false,
        };
        Self {
            service_name,
            launcher,
            allocator,
            state: Mutex::new(LifecycleState::Stopped),
            status: ArcSwap::from_pointee(status),
        }
    }

    /// Start the managed service, replacing any running instance.
    ///
    /// On error the manager is left stopped with nothing to dispose.
    pub async fn start(&self) -> Result<ServicePorts, LifecycleError> {
        let mut state = self.state.lock().await;

        if self.stop_locked(&mut state) {
            tracing::info!(
                "A service instance was already running. The previous service has been stopped and a new instance will be started"
            );
        }

        let result = self.launch();
        metrics::record_service_start(result.is_ok());
        let running = result.inspect_err(|e| {
            tracing::error!(service_name = %self.service_name, error = %e, "Failed to start service");
        })?;

        let ports = running.ports;
        *state = LifecycleState::Running(running);
        self.publish(ports, true);

        tracing::info!(
            tcp_port = ports.tcp,
            udp_port = ports.udp,
            service_name = %self.service_name,
            "OSCQuery service started"
        );
        tracing::info!(udp_port = ports.udp, "OSC messages on UDP");
        Ok(ports)
    }

    /// Stop the managed service if it is running.
    ///
    /// Returns whether an instance was disposed. Stopping twice is a no-op.
    pub async fn stop(&self) -> bool {
        let mut state = self.state.lock().await;
        self.stop_locked(&mut state)
    }

    /// Current status snapshot.
    pub fn status(&self) -> ServiceStatus {
        self.status.load().as_ref().clone()
    }

    /// Whether an instance is live.
    pub fn is_running(&self) -> bool {
        self.status.load().running
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    fn launch(&self) -> Result<RunningService, LifecycleError> {
        let ports = ServicePorts {
            tcp: self.allocate(Protocol::Tcp)?,
            udp: self.allocate(Protocol::Udp)?,
        };
        let spec = ServiceSpec {
            tcp_port: ports.tcp,
            udp_port: ports.udp,
            name: self.service_name.clone(),
        };

        let mut handle = self.launcher.launch(&spec)?;
        if let Err(e) = handle.add_endpoint(Endpoint::avatar()) {
            handle.dispose();
            return Err(e.into());
        }
        Ok(RunningService { handle, ports })
    }

    fn allocate(&self, protocol: Protocol) -> Result<u16, LifecycleError> {
        self.allocator
            .allocate(protocol)
            .map_err(|source| LifecycleError::PortAllocation { protocol, source })
    }

    fn stop_locked(&self, state: &mut LifecycleState) -> bool {
        match std::mem::replace(state, LifecycleState::Stopped) {
            LifecycleState::Running(running) => {
                running.handle.dispose();
                self.publish(running.ports, false);
                tracing::info!(service_name = %self.service_name, "OSCQueryService stopped");
                true
            }
            LifecycleState::Stopped => false,
        }
    }

    fn publish(&self, ports: ServicePorts, running: bool) {
        self.status.store(Arc::new(ServiceStatus {
            tcp_port: ports.tcp,
            udp_port: ports.udp,
            service_name: self.service_name.clone(),
            running,
        }));
        metrics::set_service_running(running);
    }
}
