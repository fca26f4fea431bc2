//! Print sink capability
//!
//! The core treats physical printers as an opaque capability with two
//! operations: enumerate the locally attached sinks, and send a rendered
//! document to one of them. The raw-TCP implementation below covers the
//! common label printers listening on port 9100; driver-backed sinks plug
//! in behind the same trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use crate::compiler::Document;
use crate::error::{PrintError, PrintResult};

/// Connection kind of a sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkKind {
    Network,
    Driver,
}

/// Descriptor of one locally attached sink
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SinkInfo {
    /// Stable sink id (e.g. "net:192.168.1.40:9100")
    pub id: String,
    /// Human-readable name shown to the operator
    pub name: String,
    pub kind: SinkKind,
}

/// Local print-sink capability
///
/// A capability instance is exclusively owned by the terminal it runs on;
/// sink ids may travel as opaque back-references but the capability handle
/// never does.
#[async_trait]
pub trait SinkCapability: Send + Sync {
    /// Enumerate the sinks currently attached and reachable
    async fn enumerate(&self) -> Vec<SinkInfo>;

    /// Send a rendered document to the given sink
    async fn send(&self, sink_id: &str, document: &Document) -> PrintResult<()>;

    /// Whether the sink honours the document's native repeat instruction
    fn supports_repeat(&self, _sink_id: &str) -> bool {
        true
    }
}

/// Network label printer (raw TCP, port 9100)
#[derive(Debug, Clone)]
pub struct NetworkSink {
    id: String,
    name: String,
    addr: SocketAddr,
    timeout: Duration,
}

impl NetworkSink {
    /// Create a new network sink
    pub fn new(host: &str, port: u16) -> PrintResult<Self> {
        let addr_str = format!("{}:{}", host, port);
        let addr = addr_str
            .parse()
            .map_err(|_| PrintError::InvalidConfig(format!("Invalid address: {}", addr_str)))?;

        Ok(Self {
            id: format!("net:{}", addr),
            name: format!("Label printer {}", addr),
            addr,
            timeout: Duration::from_secs(5),
        })
    }

    /// Set a human-readable name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set connection timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn info(&self) -> SinkInfo {
        SinkInfo {
            id: self.id.clone(),
            name: self.name.clone(),
            kind: SinkKind::Network,
        }
    }

    /// Send raw bytes to the printer
    pub async fn write_raw(&self, data: &[u8]) -> PrintResult<()> {
        let stream = tokio::time::timeout(self.timeout, TcpStream::connect(self.addr))
            .await
            .map_err(|_| PrintError::Timeout(format!("Connection timeout: {}", self.addr)))?
            .map_err(|e| PrintError::Connection(format!("{}: {}", self.addr, e)))?;

        debug!(addr = %self.addr, bytes = data.len(), "sending label data");

        let mut stream = stream;
        stream.write_all(data).await.map_err(|e| {
            PrintError::Io(std::io::Error::new(
                e.kind(),
                format!("Write failed: {}", e),
            ))
        })?;

        stream.flush().await?;

        info!(addr = %self.addr, "label job sent");
        Ok(())
    }

    /// Check if the printer is reachable
    pub async fn is_online(&self) -> bool {
        let check_timeout = Duration::from_millis(500);

        match tokio::time::timeout(check_timeout, TcpStream::connect(self.addr)).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                warn!(addr = %self.addr, error = %e, "sink offline");
                false
            }
            Err(_) => {
                warn!(addr = %self.addr, "sink probe timeout");
                false
            }
        }
    }
}

/// A configured set of network sinks exposed as one capability
///
/// Enumeration probes each configured printer and reports only the
/// reachable ones, so a powered-off printer drops out of the terminal's
/// presence on the next refresh.
#[derive(Debug, Clone, Default)]
pub struct StaticSinkPool {
    sinks: Vec<NetworkSink>,
}

impl StaticSinkPool {
    pub fn new(sinks: Vec<NetworkSink>) -> Self {
        Self { sinks }
    }

    fn find(&self, sink_id: &str) -> PrintResult<&NetworkSink> {
        self.sinks
            .iter()
            .find(|s| s.id() == sink_id)
            .ok_or_else(|| PrintError::UnknownSink(sink_id.to_string()))
    }
}

#[async_trait]
impl SinkCapability for StaticSinkPool {
    async fn enumerate(&self) -> Vec<SinkInfo> {
        let mut infos = Vec::with_capacity(self.sinks.len());
        for sink in &self.sinks {
            if sink.is_online().await {
                infos.push(sink.info());
            }
        }
        infos
    }

    async fn send(&self, sink_id: &str, document: &Document) -> PrintResult<()> {
        let sink = self.find(sink_id)?;
        let data = if self.supports_repeat(sink_id) {
            document.render()
        } else {
            document.render_flattened()
        };
        sink.write_raw(&data).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_sink_new() {
        let sink = NetworkSink::new("192.168.1.100", 9100).unwrap();
        assert_eq!(sink.id(), "net:192.168.1.100:9100");
        assert_eq!(sink.info().kind, SinkKind::Network);
    }

    #[test]
    fn test_invalid_addr() {
        let result = NetworkSink::new("not an address", 9100);
        assert!(matches!(result, Err(PrintError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_pool_unknown_sink() {
        let pool = StaticSinkPool::default();
        let doc = crate::LabelCompiler::default()
            .compile(&shared::LabelSpec::adhoc(
                "Колан",
                rust_decimal_macros::dec!(1.00),
                1,
            ))
            .unwrap();

        let err = pool.send("net:10.0.0.1:9100", &doc).await.unwrap_err();
        assert!(matches!(err, PrintError::UnknownSink(_)));
    }

    #[tokio::test]
    async fn test_pool_enumerate_skips_unreachable() {
        // Reserved TEST-NET address: nothing listens there
        let sink = NetworkSink::new("192.0.2.1", 9100)
            .unwrap()
            .with_timeout(Duration::from_millis(100));
        let pool = StaticSinkPool::new(vec![sink]);

        assert!(pool.enumerate().await.is_empty());
    }
}
