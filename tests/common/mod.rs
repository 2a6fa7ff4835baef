//! Shared test harness: spawn a gateway on an ephemeral port and drive
//! it with a non-pooled client.

use std::net::SocketAddr;

use serde_json::{json, Value};
use tokio::net::TcpListener;

use gateguard::config::GatewayConfig;
use gateguard::http::HttpServer;

/// Bind an ephemeral loopback port and run the gateway on it.
pub async fn spawn_gateway(config: GatewayConfig) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = HttpServer::new(config);
    tokio::spawn(async move {
        let _ = server.run(listener).await;
    });
    addr
}

/// Non-pooled client so each request exercises a fresh connection.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// A plausible device report for session-start bodies.
pub fn sample_device_info() -> Value {
    json!({
        "browser": "Firefox",
        "browser_version": "128.0",
        "os": "Linux",
        "os_version": "6.9",
        "device_type": "desktop",
        "screen_resolution": "2560x1440",
        "timezone": "Europe/Berlin",
        "language": "de-DE"
    })
}
