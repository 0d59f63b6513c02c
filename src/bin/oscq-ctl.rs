use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::process::{Child, Command};

#[derive(Parser)]
#[command(name = "oscq-ctl")]
#[command(about = "Control client for the Giggletech OSCQuery helper", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:6969")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start (or restart) the OSCQuery service
    Start,
    /// Stop the service and shut the helper down
    Stop,
    /// Show ports, service name and state
    Info,
    /// Print the OSCQuery TCP port
    PortTcp,
    /// Print the OSC UDP port
    PortUdp,
    /// Wait until the service reports a UDP port, starting it if needed
    WaitUdp {
        /// Helper executable to launch (and relaunch when unreachable)
        #[arg(long)]
        spawn: Option<PathBuf>,

        /// Delay between polls
        #[arg(long, default_value_t = 1000)]
        interval_ms: u64,

        /// Give up after this many polls
        #[arg(long)]
        max_attempts: Option<u32>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::builder().no_proxy().build()?;
    let base = cli.url.trim_end_matches('/');

    let path = match cli.command {
        Commands::Start => "start",
        Commands::Stop => "stop",
        Commands::Info => "info",
        Commands::PortTcp => "port_tcp",
        Commands::PortUdp => "port_udp",
        Commands::WaitUdp {
            spawn,
            interval_ms,
            max_attempts,
        } => {
            let port = wait_for_udp_port(
                &client,
                base,
                spawn.as_deref(),
                Duration::from_millis(interval_ms),
                max_attempts,
            )
            .await?;
            println!("{}", port);
            return Ok(());
        }
    };

    let res = client.get(format!("{}/{}", base, path)).send().await?;
    let status = res.status();
    let body = res.text().await?;
    if !status.is_success() {
        eprintln!("Error: helper returned status {}", status);
        eprintln!("Response: {}", body);
        std::process::exit(1);
    }
    println!("{}", body);
    Ok(())
}

/// Poll `/port_udp` until it reports a non-zero port.
///
/// A zero (or unparsable) answer sends `/start`; an unreachable helper is
/// relaunched when `spawn` is given.
async fn wait_for_udp_port(
    client: &reqwest::Client,
    base: &str,
    spawn: Option<&Path>,
    interval: Duration,
    max_attempts: Option<u32>,
) -> Result<u16, Box<dyn std::error::Error>> {
    let mut helper = match spawn {
        Some(path) => Some(spawn_helper(path)?),
        None => None,
    };

    let mut attempts = 0;
    loop {
        attempts += 1;

        match fetch_udp_port(client, base).await {
            Ok(0) => {
                eprintln!("UDP port is 0, sending start command...");
                if let Err(e) = send_start(client, base).await {
                    eprintln!("Failed to start service: {}", e);
                }
            }
            Ok(port) => return Ok(port),
            Err(e) => {
                eprintln!("Failed to retrieve UDP port: {}", e);
                if let (Some(path), Some(child)) = (spawn, helper.as_mut()) {
                    eprintln!("Restarting helper process...");
                    let _ = child.kill().await;
                    *child = spawn_helper(path)?;
                }
            }
        }

        if max_attempts.is_some_and(|max| attempts >= max) {
            return Err(format!("no UDP port after {} attempts", attempts).into());
        }
        tokio::time::sleep(interval).await;
    }
}

async fn fetch_udp_port(client: &reqwest::Client, base: &str) -> Result<u16, reqwest::Error> {
    let body = client
        .get(format!("{}/port_udp", base))
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;
    Ok(body.trim().parse().unwrap_or(0))
}

async fn send_start(client: &reqwest::Client, base: &str) -> Result<(), reqwest::Error> {
    client
        .get(format!("{}/start", base))
        .send()
        .await?
        .error_for_status()?;
    Ok(())
}

fn spawn_helper(path: &Path) -> std::io::Result<Child> {
    Command::new(path).spawn()
}
