//! Shared utilities for integration testing.

use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use oscq_helper::http::{Termination, DEFAULT_DRAIN_TIMEOUT};
use oscq_helper::lifecycle::{LifecycleManager, Shutdown};
use oscq_helper::net::Listener;
use oscq_helper::service::{
    Endpoint, PortAllocator, Protocol, ServiceError, ServiceHandle, ServiceLauncher, ServiceSpec,
};
use oscq_helper::CommandServer;
use tokio::task::JoinHandle;

/// Instrumented launcher that counts live handles instead of binding ports.
#[derive(Default)]
pub struct StubLauncher {
    pub live: Arc<AtomicUsize>,
    pub peak: Arc<AtomicUsize>,
    pub launched: AtomicUsize,
    pub disposed: Arc<AtomicUsize>,
    pub fail: AtomicBool,
}

#[allow(dead_code)]
impl StubLauncher {
    pub fn launched(&self) -> usize {
        self.launched.load(Ordering::SeqCst)
    }

    pub fn disposed(&self) -> usize {
        self.disposed.load(Ordering::SeqCst)
    }

    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

struct StubHandle {
    live: Arc<AtomicUsize>,
    disposed: Arc<AtomicUsize>,
}

impl ServiceLauncher for StubLauncher {
    fn launch(&self, spec: &ServiceSpec) -> Result<Box<dyn ServiceHandle>, ServiceError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ServiceError::Bind {
                protocol: Protocol::Udp,
                port: spec.udp_port,
                source: io::Error::from(io::ErrorKind::AddrInUse),
            });
        }
        let live = self.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(live, Ordering::SeqCst);
        self.launched.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(StubHandle {
            live: self.live.clone(),
            disposed: self.disposed.clone(),
        }))
    }
}

impl ServiceHandle for StubHandle {
    fn add_endpoint(&mut self, _endpoint: Endpoint) -> Result<(), ServiceError> {
        Ok(())
    }

    fn dispose(self: Box<Self>) {
        self.live.fetch_sub(1, Ordering::SeqCst);
        self.disposed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Hands out consecutive port numbers.
pub struct SequentialPorts(AtomicU16);

impl SequentialPorts {
    pub fn starting_at(port: u16) -> Self {
        Self(AtomicU16::new(port))
    }
}

impl PortAllocator for SequentialPorts {
    fn allocate(&self, _protocol: Protocol) -> io::Result<u16> {
        Ok(self.0.fetch_add(1, Ordering::SeqCst))
    }
}

/// A helper instance running on an OS-assigned port.
#[allow(dead_code)]
pub struct TestHelper {
    pub addr: SocketAddr,
    pub launcher: Arc<StubLauncher>,
    pub manager: Arc<LifecycleManager>,
    pub shutdown: Shutdown,
    pub server: JoinHandle<Termination>,
    pub client: reqwest::Client,
}

#[allow(dead_code)]
impl TestHelper {
    /// GET a command path and return status code and body.
    pub async fn get(&self, path: &str) -> (u16, String) {
        let res = self
            .client
            .get(format!("http://{}{}", self.addr, path))
            .send()
            .await
            .expect("helper unreachable");
        let status = res.status().as_u16();
        (status, res.text().await.expect("body"))
    }
}

/// Start a helper backed by [`StubLauncher`] and [`SequentialPorts`].
pub async fn start_helper() -> TestHelper {
    start_helper_with_drain(DEFAULT_DRAIN_TIMEOUT).await
}

/// Like [`start_helper`], with a custom shutdown drain deadline.
pub async fn start_helper_with_drain(drain_timeout: Duration) -> TestHelper {
    let launcher = Arc::new(StubLauncher::default());
    let manager = Arc::new(LifecycleManager::new(
        "Giggletech",
        launcher.clone(),
        Arc::new(SequentialPorts::starting_at(41000)),
    ));

    let listener = Listener::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), 0)
        .await
        .unwrap();
    let addr = listener.local_addr();

    let shutdown = Shutdown::new();
    let server = tokio::spawn(
        CommandServer::new(manager.clone(), shutdown.clone())
            .with_drain_timeout(drain_timeout)
            .run(listener),
    );

    let client = reqwest::Client::builder().no_proxy().build().unwrap();

    TestHelper {
        addr,
        launcher,
        manager,
        shutdown,
        server,
        client,
    }
}
