//! Shared utilities for integration tests.

use std::future::Future;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use mockroute::config::MockConfig;
use mockroute::{HttpServer, Shutdown};

/// A canned backend response.
#[allow(dead_code)]
pub struct BackendResponse {
    pub status: u16,
    pub headers: Vec<(&'static str, String)>,
    pub body: String,
}

#[allow(dead_code)]
impl BackendResponse {
    pub fn json(status: u16, body: &str) -> Self {
        Self {
            status,
            headers: vec![("Content-Type", "application/json".to_string())],
            body: body.to_string(),
        }
    }
}

/// Write a fixture, creating parent directories.
#[allow(dead_code)]
pub fn write_fixture(dir: &Path, file: &str, contents: &str) {
    let path = dir.join(file);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, contents).unwrap();
}

/// Config for a server over `mocks_dir` with delays and watching off.
#[allow(dead_code)]
pub fn test_config(mocks_dir: &Path) -> MockConfig {
    let mut config = MockConfig::default();
    config.mocks_dir = mocks_dir.to_path_buf();
    config.listener.port = 0;
    config.delay_ms = 0;
    config.watch = false;
    config
}

/// Start a server on an ephemeral port. Dropping the `Shutdown` does not stop it; trigger it.
#[allow(dead_code)]
pub async fn start_server(config: MockConfig) -> (SocketAddr, Shutdown) {
    let server = HttpServer::new(config).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.clone();

    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    (addr, shutdown)
}

#[allow(dead_code)]
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// Start a programmable backend. The handler receives the raw request head.
#[allow(dead_code)]
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = BackendResponse> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let head = read_head(&mut socket).await;
                        let response = f(head).await;

                        let mut raw = format!("HTTP/1.1 {} X\r\n", response.status);
                        for (name, value) in &response.headers {
                            raw.push_str(&format!("{}: {}\r\n", name, value));
                        }
                        raw.push_str(&format!(
                            "Content-Length: {}\r\nConnection: close\r\n\r\n{}",
                            response.body.len(),
                            response.body
                        ));
                        let _ = socket.write_all(raw.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// An address nothing listens on.
#[allow(dead_code)]
pub async fn unused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

async fn read_head(socket: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
    String::from_utf8_lossy(&buf).to_string()
}
