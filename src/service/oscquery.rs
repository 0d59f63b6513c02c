//! OSCQuery host: the service whose lifecycle the helper manages.
//!
//! # Responsibilities
//! - Serve the OSCQuery namespace (JSON) over HTTP on the assigned TCP port
//! - Answer `?HOST_INFO` with the OSC endpoint of this host
//! - Hold the assigned UDP port and drain datagrams sent to it
//!
//! # Design Decisions
//! - No mDNS advertisement; callers learn the ports from the helper
//! - Datagrams are not decoded, only counted in trace logs
//! - Dropping the host stops both tasks; the ports are freed shortly after,
//!   once the runtime has wound them down

use std::collections::BTreeMap;
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{Arc, PoisonError, RwLock};

use axum::{
    extract::{RawQuery, State},
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use serde_json::Value;
use tokio::net::UdpSocket;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::service::{
    Endpoint, Protocol, ServiceError, ServiceHandle, ServiceLauncher, ServicePorts, ServiceSpec,
};

type Namespace = Arc<RwLock<BTreeMap<String, Endpoint>>>;

/// Launches [`OscQueryHost`] instances bound to one IP address.
#[derive(Debug, Clone, Copy)]
pub struct OscQueryLauncher {
    ip: IpAddr,
}

impl OscQueryLauncher {
    pub fn new(ip: IpAddr) -> Self {
        Self { ip }
    }
}

impl Default for OscQueryLauncher {
    fn default() -> Self {
        Self::new(IpAddr::V4(Ipv4Addr::LOCALHOST))
    }
}

impl ServiceLauncher for OscQueryLauncher {
    fn launch(&self, spec: &ServiceSpec) -> Result<Box<dyn ServiceHandle>, ServiceError> {
        let runtime = Handle::try_current().map_err(io::Error::other)?;
        let _enter = runtime.enter();

        let tcp = std::net::TcpListener::bind(SocketAddr::new(self.ip, spec.tcp_port)).map_err(
            |source| ServiceError::Bind {
                protocol: Protocol::Tcp,
                port: spec.tcp_port,
                source,
            },
        )?;
        tcp.set_nonblocking(true)?;
        let tcp = tokio::net::TcpListener::from_std(tcp)?;

        let udp = std::net::UdpSocket::bind(SocketAddr::new(self.ip, spec.udp_port)).map_err(
            |source| ServiceError::Bind {
                protocol: Protocol::Udp,
                port: spec.udp_port,
                source,
            },
        )?;
        udp.set_nonblocking(true)?;
        let udp = UdpSocket::from_std(udp)?;

        let namespace: Namespace = Arc::default();
        let state = HostState {
            info: Arc::new(HostInfo::new(&spec.name, self.ip, spec.udp_port)),
            namespace: namespace.clone(),
        };
        let router = Router::new()
            .route("/", get(query_node))
            .route("/{*path}", get(query_node))
            .with_state(state);

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let name = spec.name.clone();
        runtime.spawn(async move {
            let serve = axum::serve(tcp, router).with_graceful_shutdown(async {
                let _ = stop_rx.await;
            });
            if let Err(e) = serve.await {
                tracing::warn!(service = %name, error = %e, "OSCQuery HTTP host failed");
            }
        });
        let udp_task = runtime.spawn(drain_datagrams(udp, spec.name.clone()));

        tracing::debug!(
            service = %spec.name,
            tcp_port = spec.tcp_port,
            udp_port = spec.udp_port,
            "OSCQuery host launched"
        );

        Ok(Box::new(OscQueryHost {
            name: spec.name.clone(),
            ports: ServicePorts {
                tcp: spec.tcp_port,
                udp: spec.udp_port,
            },
            namespace,
            stop_tx: Some(stop_tx),
            udp_task,
        }))
    }
}

/// A running OSCQuery host.
pub struct OscQueryHost {
    name: String,
    ports: ServicePorts,
    namespace: Namespace,
    stop_tx: Option<oneshot::Sender<()>>,
    udp_task: JoinHandle<()>,
}

impl ServiceHandle for OscQueryHost {
    fn add_endpoint(&mut self, endpoint: Endpoint) -> Result<(), ServiceError> {
        if !is_valid_path(&endpoint.path) {
            return Err(ServiceError::Endpoint {
                path: endpoint.path,
                reason: "path must be absolute with non-empty segments",
            });
        }

        let mut namespace = self.namespace.write().unwrap_or_else(PoisonError::into_inner);
        if namespace.contains_key(&endpoint.path) {
            return Err(ServiceError::Endpoint {
                path: endpoint.path,
                reason: "already registered",
            });
        }
        tracing::debug!(service = %self.name, path = %endpoint.path, "Endpoint added");
        namespace.insert(endpoint.path.clone(), endpoint);
        Ok(())
    }

    /// Signals the HTTP task to stop and aborts the UDP task. Both sockets
    /// close when their tasks finish on the runtime, not before this returns.
    fn dispose(self: Box<Self>) {
        tracing::debug!(
            service = %self.name,
            tcp_port = self.ports.tcp,
            udp_port = self.ports.udp,
            "Disposing OSCQuery host"
        );
    }
}

impl Drop for OscQueryHost {
    fn drop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        self.udp_task.abort();
    }
}

fn is_valid_path(path: &str) -> bool {
    match path.strip_prefix('/') {
        Some(rest) => !rest.is_empty() && rest.split('/').all(|segment| !segment.is_empty()),
        None => false,
    }
}

async fn drain_datagrams(socket: UdpSocket, name: String) {
    let mut buf = vec![0u8; 4096];
    loop {
        match socket.recv_from(&mut buf).await {
            Ok((len, peer)) => {
                tracing::trace!(service = %name, %peer, len, "OSC datagram received");
            }
            // ICMP port-unreachable surfaces here on some platforms.
            Err(e) if e.kind() == io::ErrorKind::ConnectionReset => continue,
            Err(e) => {
                tracing::warn!(service = %name, error = %e, "UDP receive failed");
                break;
            }
        }
    }
}

#[derive(Clone)]
struct HostState {
    info: Arc<HostInfo>,
    namespace: Namespace,
}

/// Response to `GET /?HOST_INFO`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
struct HostInfo {
    name: String,
    osc_ip: String,
    osc_port: u16,
    osc_transport: &'static str,
    extensions: BTreeMap<&'static str, bool>,
}

impl HostInfo {
    fn new(name: &str, ip: IpAddr, udp_port: u16) -> Self {
        let extensions = [
            ("ACCESS", true),
            ("CLIPMODE", false),
            ("DESCRIPTION", true),
            ("RANGE", false),
            ("TAGS", false),
            ("VALUE", true),
        ]
        .into_iter()
        .collect();
        Self {
            name: name.to_string(),
            osc_ip: ip.to_string(),
            osc_port: udp_port,
            osc_transport: "UDP",
            extensions,
        }
    }
}

/// One node of the OSCQuery JSON namespace.
#[derive(Debug, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
struct OscNode {
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    full_path: String,
    access: u8,
    #[serde(rename = "TYPE", skip_serializing_if = "Option::is_none")]
    type_tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    contents: BTreeMap<String, OscNode>,
}

impl OscNode {
    fn container(full_path: String) -> Self {
        Self {
            description: None,
            full_path,
            access: 0,
            type_tag: None,
            value: None,
            contents: BTreeMap::new(),
        }
    }

    fn build(endpoints: &BTreeMap<String, Endpoint>) -> Self {
        let mut root = Self::container("/".to_string());
        root.description = Some("root node".to_string());

        for endpoint in endpoints.values() {
            let mut node = &mut root;
            let mut full_path = String::new();
            for segment in endpoint.path.split('/').filter(|s| !s.is_empty()) {
                full_path.push('/');
                full_path.push_str(segment);
                node = node
                    .contents
                    .entry(segment.to_string())
                    .or_insert_with(|| OscNode::container(full_path.clone()));
            }
            node.description = endpoint.description.clone();
            node.access = endpoint.access as u8;
            node.type_tag = Some(endpoint.type_tag.clone());
            if endpoint.access.is_readable() && !endpoint.value.is_empty() {
                node.value = Some(endpoint.value.clone());
            }
        }
        root
    }

    fn find(&self, path: &str) -> Option<&OscNode> {
        path.split('/')
            .filter(|s| !s.is_empty())
            .try_fold(self, |node, segment| node.contents.get(segment))
    }
}

async fn query_node(
    State(state): State<HostState>,
    RawQuery(query): RawQuery,
    uri: Uri,
) -> Response {
    if query
        .as_deref()
        .is_some_and(|q| q.eq_ignore_ascii_case("HOST_INFO"))
    {
        return Json(state.info.as_ref().clone()).into_response();
    }

    let tree = {
        let namespace = state.namespace.read().unwrap_or_else(PoisonError::into_inner);
        OscNode::build(&namespace)
    };
    match tree.find(uri.path()) {
        Some(node) => Json(node).into_response(),
        None => (StatusCode::NOT_FOUND, "No such OSC address").into_response(),
    }
}
