//! Connectivity probes for stored proxies
//!
//! A probe is a bounded proxied connect to a known target: it validates both
//! connectivity to the proxy itself and the proxy's ability to reach out.
//! Probes never hang — anything slower than the timeout is a failure.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_socks::tcp::{Socks4Stream, Socks5Stream};
use tracing::debug;

use crate::error::{PoolError, Result};
use crate::models::{ProxyProtocol, ProxyRecord};

/// Probe configuration
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Hard bound on the whole probe, connect included
    pub timeout: Duration,
    /// Host the proxy is asked to reach
    pub target_host: String,
    /// Port on the target host
    pub target_port: u16,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            target_host: "www.google.com".to_string(),
            target_port: 80,
        }
    }
}

/// Result of one probe; a timeout is a failure, never a pending state.
#[derive(Debug, Clone)]
pub struct ProbeOutcome {
    pub success: bool,
    pub response_time_ms: Option<f64>,
    pub error: Option<String>,
}

impl ProbeOutcome {
    fn success(elapsed_ms: f64) -> Self {
        Self {
            success: true,
            response_time_ms: Some(elapsed_ms),
            error: None,
        }
    }

    fn failure(message: String) -> Self {
        Self {
            success: false,
            response_time_ms: None,
            error: Some(message),
        }
    }
}

/// Probing seam, implemented over real sockets in production and scripted
/// in tests.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, record: &ProxyRecord, password: Option<&str>) -> ProbeOutcome;
}

/// Socket-level prober
pub struct NetProber {
    config: ProbeConfig,
}

impl NetProber {
    pub fn new(config: ProbeConfig) -> Self {
        Self { config }
    }

    async fn connect(&self, record: &ProxyRecord, password: Option<&str>) -> Result<()> {
        match record.protocol_enum() {
            Some(ProxyProtocol::Socks5) => self.connect_socks5(record, password).await,
            Some(ProxyProtocol::Socks4) => self.connect_socks4(record).await,
            Some(ProxyProtocol::Http) => self.connect_http(record, password).await,
            None => {
                // Unknown protocol string in storage; fall back to checking
                // that the endpoint accepts TCP at all.
                TcpStream::connect(record.address()).await?;
                Ok(())
            }
        }
    }

    async fn connect_socks5(&self, record: &ProxyRecord, password: Option<&str>) -> Result<()> {
        let proxy_addr = record.address();
        let target = (self.config.target_host.as_str(), self.config.target_port);

        let result = match (&record.username, password) {
            (Some(user), Some(pass)) => {
                Socks5Stream::connect_with_password(proxy_addr.as_str(), target, user, pass).await
            }
            _ => Socks5Stream::connect(proxy_addr.as_str(), target).await,
        };

        result.map_err(|e| PoolError::ProbeFailed(format!("socks5 connect failed: {}", e)))?;
        Ok(())
    }

    // SOCKS4 has no password field; the username doubles as the userid.
    async fn connect_socks4(&self, record: &ProxyRecord) -> Result<()> {
        let proxy_addr = record.address();
        let target = (self.config.target_host.as_str(), self.config.target_port);

        let result = match &record.username {
            Some(user) => {
                Socks4Stream::connect_with_userid(proxy_addr.as_str(), target, user).await
            }
            None => Socks4Stream::connect(proxy_addr.as_str(), target).await,
        };

        result.map_err(|e| PoolError::ProbeFailed(format!("socks4 connect failed: {}", e)))?;
        Ok(())
    }

    async fn connect_http(&self, record: &ProxyRecord, password: Option<&str>) -> Result<()> {
        let mut stream = TcpStream::connect(record.address())
            .await
            .map_err(|e| PoolError::ProbeFailed(format!("tcp connect failed: {}", e)))?;

        let mut request = format!(
            "CONNECT {host}:{port} HTTP/1.1\r\nHost: {host}:{port}\r\n",
            host = self.config.target_host,
            port = self.config.target_port,
        );
        if let (Some(user), Some(pass)) = (&record.username, password) {
            let encoded = BASE64.encode(format!("{}:{}", user, pass).as_bytes());
            request.push_str(&format!("Proxy-Authorization: Basic {}\r\n", encoded));
        }
        request.push_str("\r\n");

        stream
            .write_all(request.as_bytes())
            .await
            .map_err(|e| PoolError::ProbeFailed(format!("CONNECT write failed: {}", e)))?;

        let mut response = vec![0u8; 1024];
        let n = stream
            .read(&mut response)
            .await
            .map_err(|e| PoolError::ProbeFailed(format!("CONNECT read failed: {}", e)))?;

        let response_str = String::from_utf8_lossy(&response[..n]);
        if response_str.starts_with("HTTP/1.1 200") || response_str.starts_with("HTTP/1.0 200") {
            Ok(())
        } else {
            Err(PoolError::ProbeFailed(format!(
                "CONNECT refused: {}",
                response_str.lines().next().unwrap_or("empty response")
            )))
        }
    }
}

#[async_trait]
impl Prober for NetProber {
    async fn probe(&self, record: &ProxyRecord, password: Option<&str>) -> ProbeOutcome {
        let start = Instant::now();

        let result = match timeout(self.config.timeout, self.connect(record, password)).await {
            Ok(result) => result,
            Err(_) => Err(PoolError::Timeout),
        };

        match result {
            Ok(()) => {
                let elapsed = start.elapsed().as_secs_f64() * 1000.0;
                debug!(id = record.id, addr = %record.address(), elapsed_ms = elapsed, "Probe succeeded");
                ProbeOutcome::success(elapsed)
            }
            Err(e) => {
                debug!(id = record.id, addr = %record.address(), error = %e, "Probe failed");
                ProbeOutcome::failure(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_support;

    #[tokio::test]
    async fn test_probe_timeout_is_a_failure() {
        // Non-routable address (TEST-NET-1) with a tiny timeout
        let prober = NetProber::new(ProbeConfig {
            timeout: Duration::from_millis(50),
            ..Default::default()
        });
        let mut record = test_support::record(1);
        record.host = "192.0.2.1".to_string();

        let outcome = prober.probe(&record, None).await;
        assert!(!outcome.success);
        assert!(outcome.response_time_ms.is_none());
        assert_eq!(
            outcome.error.as_deref(),
            Some(PoolError::Timeout.to_string().as_str())
        );
    }

    /// Accepts one connection and grants any SOCKS4 CONNECT; anything that
    /// does not open with version byte 0x04 gets the connection closed.
    async fn spawn_socks4_responder() -> std::net::SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut buf = [0u8; 256];
                    let n = socket.read(&mut buf).await.unwrap_or(0);
                    if n > 0 && buf[0] == 0x04 {
                        let _ = socket.write_all(&[0x00, 0x5A, 0, 0, 0, 0, 0, 0]).await;
                    }
                });
            }
        });

        addr
    }

    #[tokio::test]
    async fn test_socks4_probe_speaks_version_4() {
        let addr = spawn_socks4_responder().await;
        let prober = NetProber::new(ProbeConfig {
            timeout: Duration::from_secs(2),
            ..Default::default()
        });

        let mut record = test_support::record(1);
        record.host = "127.0.0.1".to_string();
        record.port = addr.port() as i32;
        record.protocol = "socks4".to_string();

        let outcome = prober.probe(&record, None).await;
        assert!(outcome.success, "socks4 probe failed: {:?}", outcome.error);
        assert!(outcome.response_time_ms.is_some());

        // The responder only speaks version 4; a socks5 handshake against the
        // same endpoint must be recorded as a failure, not mislabeled.
        record.protocol = "socks5".to_string();
        let outcome = prober.probe(&record, None).await;
        assert!(!outcome.success);
    }

    #[tokio::test]
    async fn test_probe_connection_refused_is_a_failure() {
        let prober = NetProber::new(ProbeConfig {
            timeout: Duration::from_secs(2),
            ..Default::default()
        });
        let mut record = test_support::record(1);
        // Reserved port on localhost that nothing listens on
        record.host = "127.0.0.1".to_string();
        record.port = 1;

        let outcome = prober.probe(&record, None).await;
        assert!(!outcome.success);
    }
}
