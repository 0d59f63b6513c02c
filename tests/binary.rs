//! Process-level tests: run the `oscq-helper` binary and check exit codes.

use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::{Child, Command};

fn free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

fn spawn_helper(dir: &Path, port: u16) -> Child {
    let config = dir.join("config_oscq.toml");
    std::fs::write(&config, format!("httpPort = {}\nserviceName = \"Binary\"\n", port)).unwrap();

    Command::new(env!("CARGO_BIN_EXE_oscq-helper"))
        .arg("--config")
        .arg(&config)
        .arg("--log-file")
        .arg(dir.join("service_log_oscq.txt"))
        .current_dir(dir)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .unwrap()
}

async fn wait_exit(child: &mut Child) -> ExitStatus {
    tokio::time::timeout(Duration::from_secs(15), child.wait())
        .await
        .expect("helper should exit")
        .unwrap()
}

async fn wait_ready(client: &reqwest::Client, base: &str) {
    for _ in 0..100 {
        if client.get(format!("{}/info", base)).send().await.is_ok() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    panic!("helper never became reachable at {}", base);
}

#[tokio::test]
async fn stop_exits_with_success() {
    let dir = tempfile::tempdir().unwrap();
    let port = free_port();
    let mut child = spawn_helper(dir.path(), port);

    let client = reqwest::Client::builder().no_proxy().build().unwrap();
    let base = format!("http://127.0.0.1:{}", port);
    wait_ready(&client, &base).await;

    let started = client
        .get(format!("{}/start", base))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(started.starts_with("Service started..."));

    let info = client
        .get(format!("{}/info", base))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(info.contains("Service Name: Binary"));
    assert!(info.contains(&format!("HTTP Listener Port: {}", port)));

    let stopped = client
        .get(format!("{}/stop", base))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(stopped, "Service stopped. Application shutting down...");

    let status = wait_exit(&mut child).await;
    assert_eq!(status.code(), Some(0));

    let log = std::fs::read_to_string(dir.path().join("service_log_oscq.txt")).unwrap();
    assert!(log.contains("Shutdown complete"));
}

#[tokio::test]
async fn occupied_port_exits_with_failure() {
    let dir = tempfile::tempdir().unwrap();
    let occupied = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = occupied.local_addr().unwrap().port();

    let mut child = spawn_helper(dir.path(), port);
    let status = wait_exit(&mut child).await;
    assert_eq!(status.code(), Some(1));

    let log = std::fs::read_to_string(dir.path().join("service_log_oscq.txt")).unwrap();
    assert!(log.contains("Failed to start HTTP listener"));
    drop(occupied);
}
