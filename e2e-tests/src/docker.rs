use anyhow::Result;
use std::net::TcpListener;
use std::process::Command;
use tokio::time::{sleep, Duration};

pub const MYSQL_ROOT_PASSWORD: &str = "root";
pub const MYSQL_DATABASE: &str = "batch_e2e";

pub async fn start_mysql_container() -> Result<(String, u16)> {
    ensure_docker_daemon().await?;

    let port = allocate_free_port()?;
    let name = format!("mysql_batch_e2e_{}_{port}", std::process::id());

    let status = Command::new("docker")
        .args([
            "run",
            "-d",
            "--name",
            &name,
            "-e",
            &format!("MYSQL_ROOT_PASSWORD={}", MYSQL_ROOT_PASSWORD),
            "-e",
            &format!("MYSQL_DATABASE={}", MYSQL_DATABASE),
            "-p",
            &format!("{}:3306", port),
            "mysql:8",
        ])
        .output();

    let out = match status {
        Ok(o) => o,
        Err(_) => return Err(anyhow::anyhow!("Docker not available")),
    };
    if !out.status.success() {
        return Err(anyhow::anyhow!(
            "Failed to start mysql container: {}",
            String::from_utf8_lossy(&out.stderr)
        ));
    }

    // The port opens before the server accepts logins, callers still retry connecting.
    for _ in 0..120 {
        if port_open(port).await {
            return Ok((name, port));
        }
        sleep(Duration::from_millis(500)).await;
    }

    let _ = stop_mysql_container(&name).await;
    Err(anyhow::anyhow!("MySQL did not open port {}", port))
}

/// Ensure the Docker daemon is running. Attempts to start Docker Desktop (macOS)
/// or Colima if available. Times out after ~30s if daemon is unavailable.
pub async fn ensure_docker_daemon() -> Result<()> {
    if docker_info_ok() {
        return Ok(());
    }

    #[cfg(target_os = "macos")]
    {
        let _ = Command::new("open").args(["-g", "-a", "Docker"]).output();
    }

    if which("colima") {
        let _ = Command::new("colima").arg("start").output();
    }

    for _ in 0..60 {
        if docker_info_ok() {
            return Ok(());
        }
        sleep(Duration::from_millis(500)).await;
    }
    Err(anyhow::anyhow!("Docker daemon not available after waiting"))
}

fn docker_info_ok() -> bool {
    Command::new("docker").arg("info").output().map(|o| o.status.success()).unwrap_or(false)
}

fn which(bin: &str) -> bool {
    Command::new("which").arg(bin).output().map(|o| o.status.success()).unwrap_or(false)
}

pub async fn stop_mysql_container(name: &str) -> Result<()> {
    let _ = Command::new("docker").args(["rm", "-f", name]).output();
    Ok(())
}

/// A local port nothing listens on once this returns.
pub fn allocate_free_port() -> Result<u16> {
    let listener = TcpListener::bind(("127.0.0.1", 0))?;
    let port = listener.local_addr()?.port();
    drop(listener);
    Ok(port)
}

async fn port_open(port: u16) -> bool {
    tokio::net::TcpStream::connect(("127.0.0.1", port)).await.is_ok()
}
