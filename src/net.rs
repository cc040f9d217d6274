//! Connection helpers shared across services: retrying dials with
//! exponential backoff, free-port scanning for match services, and the
//! readiness probe used before handing players off.

use rand::RngExt;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpSocket, TcpStream, ToSocketAddrs};
use tokio::time::sleep;

/// Retry schedule for dials with exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    /// Fraction of the delay added as random jitter (0.0 to 1.0).
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 1.5,
            jitter_factor: 0.1,
        }
    }
}

impl RetryConfig {
    fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(attempt as i32);
        let capped = base.min(self.max_delay.as_secs_f64());
        let jitter = if self.jitter_factor > 0.0 && capped > 0.0 {
            rand::rng().random_range(0.0..capped * self.jitter_factor)
        } else {
            0.0
        };
        Duration::from_secs_f64(capped + jitter)
    }
}

/// Dial `addr`, retrying per `retry` before giving up with the last error.
pub async fn connect_with_retry<A>(addr: A, retry: &RetryConfig) -> std::io::Result<TcpStream>
where
    A: ToSocketAddrs + Clone,
{
    let mut last_err = None;
    for attempt in 0..retry.max_attempts {
        match TcpStream::connect(addr.clone()).await {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                tracing::debug!(attempt = attempt + 1, error = %e, "connect attempt failed");
                last_err = Some(e);
            }
        }
        if attempt + 1 < retry.max_attempts {
            sleep(retry.delay_for(attempt)).await;
        }
    }
    Err(last_err.unwrap_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::TimedOut, "no connection attempts made")
    }))
}

/// Bind a listener with `SO_REUSEADDR` so a restart does not have to wait
/// out TIME_WAIT.
pub fn bind_reuse(addr: SocketAddr) -> std::io::Result<TcpListener> {
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;
    socket.listen(1024)
}

/// Find a free TCP port by trial-binding, starting from `start_port`.
pub fn find_free_port(start_port: u16) -> std::io::Result<u16> {
    for port in start_port..u16::MAX {
        if std::net::TcpListener::bind(("0.0.0.0", port)).is_ok() {
            return Ok(port);
        }
    }
    Err(std::io::Error::new(
        std::io::ErrorKind::AddrNotAvailable,
        "no free port above the configured start port",
    ))
}

/// Resolve when the process receives SIGINT or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = terminate.recv() => {}
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
    }
}

/// Poll `addr` with connect-probes until it accepts, up to `timeout`.
/// Returns `true` once a probe succeeds.
pub async fn probe_ready(addr: &str, timeout: Duration, cadence: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        match tokio::time::timeout(Duration::from_millis(500), TcpStream::connect(addr)).await {
            Ok(Ok(_)) => return true,
            Ok(Err(_)) | Err(_) => {}
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        sleep(cadence).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_and_caps() {
        let retry = RetryConfig {
            jitter_factor: 0.0,
            ..RetryConfig::default()
        };
        assert_eq!(retry.delay_for(0), Duration::from_millis(500));
        assert_eq!(retry.delay_for(1), Duration::from_millis(750));
        assert!(retry.delay_for(10) <= retry.max_delay);
    }

    #[test]
    fn trial_bind_finds_a_port() {
        let port = find_free_port(49152).unwrap();
        assert!(port >= 49152);
        // The port is actually bindable.
        std::net::TcpListener::bind(("0.0.0.0", port)).unwrap();
    }

    #[tokio::test]
    async fn probe_sees_a_listening_socket() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        assert!(
            probe_ready(
                &addr,
                Duration::from_secs(1),
                Duration::from_millis(50)
            )
            .await
        );
    }

    #[tokio::test]
    async fn connect_with_retry_gives_up_eventually() {
        let retry = RetryConfig {
            max_attempts: 2,
            initial_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(10),
            backoff_multiplier: 1.5,
            jitter_factor: 0.0,
        };
        // Reserved port with nothing listening.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        assert!(connect_with_retry(addr, &retry).await.is_err());
    }
}
