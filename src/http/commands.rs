//! Command parsing and dispatch.
//!
//! # Commands
//! | Path        | Action                                   |
//! |-------------|------------------------------------------|
//! | `/start`    | start or restart the managed service     |
//! | `/stop`     | stop the service, then shut the helper down |
//! | `/info`     | multi-line status block                  |
//! | `/port_tcp` | current TCP port                         |
//! | `/port_udp` | current UDP port                         |
//!
//! Anything else answers `Unknown command`. Only the path is consulted.

use std::fmt;
use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Response},
};

use crate::http::request::request_id;
use crate::lifecycle::{LifecycleManager, ServiceStatus, Shutdown};
use crate::observability::metrics;

pub const STOPPED_MESSAGE: &str = "Service stopped. Application shutting down...";
pub const UNKNOWN_MESSAGE: &str = "Unknown command";

/// A command addressed to the helper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Stop,
    Info,
    PortTcp,
    PortUdp,
    Unknown(String),
}

impl Command {
    /// Parse a request path: slashes trimmed, case-insensitive.
    pub fn parse(path: &str) -> Self {
        let token = path.trim_matches('/').to_lowercase();
        match token.as_str() {
            "start" => Command::Start,
            "stop" => Command::Stop,
            "info" => Command::Info,
            "port_tcp" => Command::PortTcp,
            "port_udp" => Command::PortUdp,
            _ => Command::Unknown(token),
        }
    }

    /// Metric label for this command.
    pub fn label(&self) -> &'static str {
        match self {
            Command::Start => "start",
            Command::Stop => "stop",
            Command::Info => "info",
            Command::PortTcp => "port_tcp",
            Command::PortUdp => "port_udp",
            Command::Unknown(_) => "unknown",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Unknown(token) => write!(f, "{}", token),
            other => write!(f, "{}", other.label()),
        }
    }
}

/// State shared by every command handler.
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<LifecycleManager>,
    pub shutdown: Shutdown,
    pub listener_port: u16,
}

/// Handle one command request. Always produces exactly one response.
pub async fn dispatch(State(state): State<AppState>, uri: Uri, headers: HeaderMap) -> Response {
    let command = Command::parse(uri.path());
    tracing::info!(
        request_id = %request_id(&headers),
        command = %command,
        "Received command"
    );
    metrics::record_command(command.label());

    match command {
        Command::Start => match state.manager.start().await {
            Ok(ports) => format!(
                "Service started...\nTCP Port: {}\nUDP Port: {}",
                ports.tcp, ports.udp
            )
            .into_response(),
            Err(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to start service: {}", e),
            )
                .into_response(),
        },
        Command::Stop => {
            state.manager.stop().await;
            if state.shutdown.trigger() {
                tracing::info!("Shutting down application...");
            }
            STOPPED_MESSAGE.into_response()
        }
        Command::Info => render_info(&state.manager.status(), state.listener_port).into_response(),
        Command::PortTcp => state.manager.status().tcp_port.to_string().into_response(),
        Command::PortUdp => state.manager.status().udp_port.to_string().into_response(),
        Command::Unknown(_) => UNKNOWN_MESSAGE.into_response(),
    }
}

/// Body of the `/info` response.
pub fn render_info(status: &ServiceStatus, listener_port: u16) -> String {
    format!(
        "Giggletech OSCQuery Helper\nTCP Port: {}\nUDP Port: {}\nHTTP Listener Port: {}\nService Name: {}\nRunning: {}",
        status.tcp_port, status.udp_port, listener_port, status.service_name, status.running
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_commands() {
        assert_eq!(Command::parse("/start"), Command::Start);
        assert_eq!(Command::parse("/stop"), Command::Stop);
        assert_eq!(Command::parse("/info"), Command::Info);
        assert_eq!(Command::parse("/port_tcp"), Command::PortTcp);
        assert_eq!(Command::parse("/port_udp"), Command::PortUdp);
    }

    #[test]
    fn parse_trims_slashes_and_case() {
        assert_eq!(Command::parse("/START/"), Command::Start);
        assert_eq!(Command::parse("//Port_UDP//"), Command::PortUdp);
        assert_eq!(Command::parse("info"), Command::Info);
    }

    #[test]
    fn unknown_keeps_token() {
        assert_eq!(Command::parse("/Bogus"), Command::Unknown("bogus".to_string()));
        assert_eq!(Command::parse("/"), Command::Unknown(String::new()));
        assert_eq!(Command::parse("/start/now"), Command::Unknown("start/now".to_string()));
        assert_eq!(Command::parse("/bogus").label(), "unknown");
    }

    #[test]
    fn info_block_lists_everything() {
        let status = ServiceStatus {
            tcp_port: 4100,
            udp_port: 4101,
            service_name: "Giggletech".to_string(),
            running: true,
        };
        let body = render_info(&status, 6969);
        assert_eq!(
            body.lines().collect::<Vec<_>>(),
            vec![
                "Giggletech OSCQuery Helper",
                "TCP Port: 4100",
                "UDP Port: 4101",
                "HTTP Listener Port: 6969",
                "Service Name: Giggletech",
                "Running: true",
            ]
        );
    }
}
