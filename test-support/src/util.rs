//! Utility helpers for asynchronous tests.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use jaild::config::Config;
use tokio::net::TcpStream;
use tokio::time::sleep;

/// Number of polling attempts used by [`wait_until_refused`].
pub const CONNECT_RETRY_COUNT: u32 = 50;
/// Delay between polling attempts.
pub const CONNECT_RETRY_DELAY: Duration = Duration::from_millis(20);

/// Configuration binding both listeners to kernel-chosen loopback ports.
#[must_use]
pub fn loopback_config() -> Config {
    Config {
        interface: IpAddr::V4(Ipv4Addr::LOCALHOST),
        port: 0,
        secure_port: Some(0),
        accept_retry_limit: 1,
        accept_min_delay_ms: 1,
    }
}

/// Poll `addr` until connections are refused.
///
/// Returns `true` if the socket stopped accepting within `tries` attempts.
pub async fn wait_until_refused(addr: SocketAddr, tries: u32, delay: Duration) -> bool {
    for _ in 0..tries {
        if TcpStream::connect(addr).await.is_err() {
            return true;
        }
        sleep(delay).await;
    }
    TcpStream::connect(addr).await.is_err()
}
