//! Network probes: TCP latency (stage one) and HTTP throughput (stage two).

pub mod latency;
pub mod throughput;

use async_trait::async_trait;
use std::io;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;

/// Port every latency probe dials; CDN edges terminate TLS here.
pub const PROBE_PORT: u16 = 443;

/// A single timed connection attempt. The production implementation opens a
/// real TCP connection; tests substitute scripted outcomes.
#[async_trait]
pub trait Dialer: Send + Sync {
    /// Attempt one connection to `addr`, bounded by `timeout`.
    /// Returns the elapsed wall-clock time on success.
    async fn dial(&self, addr: SocketAddr, timeout: Duration) -> io::Result<Duration>;
}

/// Dialer backed by the operating system's TCP stack.
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpDialer;

#[async_trait]
impl Dialer for TcpDialer {
    async fn dial(&self, addr: SocketAddr, timeout: Duration) -> io::Result<Duration> {
        let start = Instant::now();
        match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => {
                let elapsed = start.elapsed();
                // Reachability is all we wanted; no payload is exchanged.
                drop(stream);
                Ok(elapsed)
            }
            Ok(Err(err)) => Err(err),
            Err(_) => Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("connect timed out after {timeout:?}"),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;
    use tokio_test::assert_err;

    #[tokio::test]
    async fn tcp_dialer_connects_to_local_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let elapsed = TcpDialer
            .dial(addr, Duration::from_secs(1))
            .await
            .expect("local connect should succeed");
        assert!(elapsed > Duration::ZERO);
    }

    #[tokio::test]
    async fn tcp_dialer_reports_refused_port() {
        // Bind then drop, so the port is known to not be listening.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        assert_err!(TcpDialer.dial(addr, Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn tcp_dialer_times_out_reasonably() {
        // TEST-NET-1 address; packets are dropped or rejected, never answered.
        let addr: SocketAddr = "203.0.113.1:9".parse().unwrap();
        assert_err!(TcpDialer.dial(addr, Duration::from_millis(200)).await);
    }
}
