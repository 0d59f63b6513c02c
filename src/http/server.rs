//! Command server: the accept loop.
//!
//! # Responsibilities
//! - Build the Axum router for the command interface
//! - Accept connections and serve each on its own task over HTTP/1.1
//! - Observe the shutdown signal, drain in-flight responses, stop the service
//! - Bound the drain: connections still open at the deadline are abandoned
//!
//! # Loop States
//! ```text
//! Accepting ──connection──▶ Dispatching (spawned) ──▶ Accepting
//! Accepting ──shutdown / accept error──▶ Draining ──▶ Terminated
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{body::Body, extract::Request, routing::any, Router};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
use tower::ServiceExt;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::http::commands::{dispatch, AppState};
use crate::http::request::{request_id_header, MakeRequestUuidV4};
use crate::lifecycle::{LifecycleManager, Shutdown};
use crate::net::{ConnectionTracker, Listener};

/// How long shutdown waits for open connections before stopping anyway.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Why the accept loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// The shutdown signal was raised (`/stop` or an OS signal).
    ShutdownRequested,
    /// The listener stopped accepting connections.
    AcceptFailed(String),
}

/// HTTP command server.
pub struct CommandServer {
    manager: Arc<LifecycleManager>,
    shutdown: Shutdown,
    tracker: ConnectionTracker,
    drain_timeout: Duration,
    /// Raised when the drain deadline passes; closes whatever is still open.
    abandon: Shutdown,
}

impl CommandServer {
    pub fn new(manager: Arc<LifecycleManager>, shutdown: Shutdown) -> Self {
        Self {
            manager,
            shutdown,
            tracker: ConnectionTracker::new(),
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
            abandon: Shutdown::new(),
        }
    }

    /// Override the drain deadline.
    pub fn with_drain_timeout(mut self, drain_timeout: Duration) -> Self {
        self.drain_timeout = drain_timeout;
        self
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/", any(dispatch))
            .route("/{*command}", any(dispatch))
            .with_state(state)
            .layer(PropagateRequestIdLayer::new(request_id_header()))
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::new(request_id_header(), MakeRequestUuidV4))
    }

    /// Run the accept loop until shutdown, then drain and stop the service.
    pub async fn run(self, listener: Listener) -> Termination {
        let addr = listener.local_addr();
        let router = Self::build_router(AppState {
            manager: self.manager.clone(),
            shutdown: self.shutdown.clone(),
            listener_port: addr.port(),
        });

        tracing::info!("HTTP server listening on http://localhost:{}/", addr.port());

        let termination = loop {
            tokio::select! {
                biased;
                _ = self.shutdown.wait() => break Termination::ShutdownRequested,
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => self.spawn_connection(stream, peer, router.clone()),
                    Err(e) => {
                        tracing::error!(error = %e, "Listener stopped or failed");
                        self.shutdown.trigger();
                        break Termination::AcceptFailed(e.to_string());
                    }
                },
            }
        };

        drop(listener);
        tracing::info!(
            in_flight = self.tracker.active_count(),
            "Stopped accepting; draining connections"
        );
        if !self.tracker.wait_for_drain(self.drain_timeout).await {
            tracing::warn!(
                still_open = self.tracker.active_count(),
                timeout_ms = self.drain_timeout.as_millis() as u64,
                "Drain deadline passed; abandoning open connections"
            );
            self.abandon.trigger();
        }

        self.manager.stop().await;
        tracing::info!(?termination, "HTTP server stopped");
        termination
    }

    fn spawn_connection(&self, stream: TcpStream, peer: SocketAddr, router: Router) {
        let guard = self.tracker.track();
        let shutdown = self.shutdown.clone();
        let abandon = self.abandon.clone();

        tokio::spawn(async move {
            let service = hyper::service::service_fn(move |request: Request<Incoming>| {
                router.clone().oneshot(request.map(Body::new))
            });
            let conn = http1::Builder::new().serve_connection(TokioIo::new(stream), service);
            tokio::pin!(conn);

            let mut draining = false;
            loop {
                tokio::select! {
                    result = conn.as_mut() => {
                        if let Err(e) = result {
                            tracing::debug!(connection_id = %guard.id(), peer = %peer, error = %e, "Connection error");
                        }
                        break;
                    }
                    _ = shutdown.wait(), if !draining => {
                        draining = true;
                        conn.as_mut().graceful_shutdown();
                    }
                    _ = abandon.wait() => {
                        tracing::debug!(connection_id = %guard.id(), peer = %peer, "Closing connection past drain deadline");
                        break;
                    }
                }
            }
            drop(guard);
        });
    }
}
