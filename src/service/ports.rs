//! Ephemeral port allocation.

use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpListener, UdpSocket};

use crate::service::Protocol;

/// Source of free ports for a new service instance.
pub trait PortAllocator: Send + Sync {
    /// Return a port that is currently unused for `protocol`.
    fn allocate(&self, protocol: Protocol) -> io::Result<u16>;
}

/// Asks the OS for a free port by binding port 0 and releasing it.
#[derive(Debug, Clone, Copy)]
pub struct EphemeralPorts {
    ip: IpAddr,
}

impl EphemeralPorts {
    pub fn new(ip: IpAddr) -> Self {
        Self { ip }
    }
}

impl Default for EphemeralPorts {
    fn default() -> Self {
        Self::new(IpAddr::V4(Ipv4Addr::LOCALHOST))
    }
}

impl PortAllocator for EphemeralPorts {
    fn allocate(&self, protocol: Protocol) -> io::Result<u16> {
        let addr = SocketAddr::new(self.ip, 0);
        let port = match protocol {
            Protocol::Tcp => TcpListener::bind(addr)?.local_addr()?.port(),
            Protocol::Udp => UdpSocket::bind(addr)?.local_addr()?.port(),
        };
        tracing::trace!(%protocol, port, "Allocated ephemeral port");
        Ok(port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocates_nonzero_ports() {
        let ports = EphemeralPorts::default();
        assert_ne!(ports.allocate(Protocol::Tcp).unwrap(), 0);
        assert_ne!(ports.allocate(Protocol::Udp).unwrap(), 0);
    }

    #[test]
    fn allocated_tcp_port_is_bindable() {
        let ports = EphemeralPorts::default();
        let port = ports.allocate(Protocol::Tcp).unwrap();
        assert!(TcpListener::bind(("127.0.0.1", port)).is_ok());
    }
}
