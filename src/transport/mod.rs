//! # Printer Transport Layer
//!
//! Byte-stream backends a session talks to the printer through.
//!
//! ## Available Transports
//!
//! | Endpoint | Transport | Notes |
//! |----------|-----------|-------|
//! | `host:port` | [`TcpTransport`] | raw socket printing, usually port 9100 |
//! | `/dev/rfcomm0` | [`AccessoryTransport`] | already-paired serial/RFCOMM character device |
//! | `memory:name` | [`MemoryTransport`] | in-process printer for tests and dry runs |
//!
//! ## Link Faults
//!
//! Transports may learn asynchronously that the link failed (a read error,
//! the peer closing). They report it through the [`LinkStatus`] handed to
//! them on open; the session checks it before every operation.
//!
//! ## One Session per Endpoint
//!
//! [`EndpointLocks`] is a shared set of claimed endpoints. A session claims
//! its endpoint on connect and releases it on disconnect (or drop).

#[cfg(unix)]
pub mod accessory;
pub mod memory;
pub mod tcp;

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::{EtiquetaError, Result};
use crate::printer::SessionConfig;

#[cfg(unix)]
pub use accessory::AccessoryTransport;
pub use memory::{MemoryConnector, MemoryPrinter, MemoryTransport};
pub use tcp::TcpTransport;

/// Conventional raw printing port
pub const DEFAULT_TCP_PORT: u16 = 9100;

// ============================================================================
// TRANSPORT TRAITS
// ============================================================================

/// Result of a bounded read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// `n` bytes were read into the buffer
    Data(usize),
    /// Nothing arrived before the timeout
    TimedOut,
    /// The peer closed the stream
    Closed,
}

/// A bidirectional byte stream to one printer.
pub trait Transport: Send {
    /// Write every byte or fail with `Transport`.
    fn write_all(&mut self, data: &[u8]) -> Result<()>;

    /// Read whatever arrives within `timeout`.
    fn read_timeout(&mut self, buf: &mut [u8], timeout: Duration) -> Result<ReadOutcome>;

    /// Close the stream. Later calls may fail.
    fn close(&mut self) -> Result<()>;
}

/// Opens transports for endpoints.
pub trait Connector: Send + Sync {
    fn open(&self, endpoint: &Endpoint, link: LinkStatus) -> Result<Box<dyn Transport>>;
}

// ============================================================================
// ENDPOINTS
// ============================================================================

/// Where a printer is reached.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Tcp { host: String, port: u16 },
    /// Path of an opened accessory channel (serial / RFCOMM device)
    Accessory { device: String },
    /// Named in-memory printer
    Memory { name: String },
}

impl Endpoint {
    /// Parse `host:port`, `tcp://host[:port]`, `/dev/...` or `memory:name`.
    ///
    /// ```
    /// use etiqueta::transport::Endpoint;
    ///
    /// assert_eq!(
    ///     Endpoint::parse("192.168.1.50:9100")?,
    ///     Endpoint::Tcp { host: "192.168.1.50".into(), port: 9100 }
    /// );
    /// assert_eq!(
    ///     Endpoint::parse("/dev/rfcomm0")?,
    ///     Endpoint::Accessory { device: "/dev/rfcomm0".into() }
    /// );
    /// # Ok::<(), etiqueta::EtiquetaError>(())
    /// ```
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        let invalid = || EtiquetaError::Connect(format!("invalid endpoint {:?}", s));

        if let Some(name) = s.strip_prefix("memory:") {
            if name.is_empty() {
                return Err(invalid());
            }
            return Ok(Self::Memory {
                name: name.to_string(),
            });
        }
        if s.starts_with('/') {
            return Ok(Self::Accessory {
                device: s.to_string(),
            });
        }

        let (rest, default_port) = match s.strip_prefix("tcp://") {
            Some(rest) => (rest, Some(DEFAULT_TCP_PORT)),
            None => (s, None),
        };
        let (host, port) = match rest.rsplit_once(':') {
            Some((host, port)) => (host, Some(port.parse::<u16>().map_err(|_| invalid())?)),
            None => (rest, default_port),
        };
        let port = port.ok_or_else(invalid)?;
        if host.is_empty() {
            return Err(invalid());
        }

        Ok(Self::Tcp {
            host: host.to_string(),
            port,
        })
    }
}

impl FromStr for Endpoint {
    type Err = EtiquetaError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp { host, port } => write!(f, "{}:{}", host, port),
            Self::Accessory { device } => f.write_str(device),
            Self::Memory { name } => write!(f, "memory:{}", name),
        }
    }
}

// ============================================================================
// LINK STATUS
// ============================================================================

/// Asynchronous link failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkFault {
    Error(String),
    Closed,
}

impl fmt::Display for LinkFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error(msg) => write!(f, "link error: {}", msg),
            Self::Closed => f.write_str("link closed by peer"),
        }
    }
}

/// Shared flag through which a transport reports link faults.
///
/// The first fault sticks; later reports are ignored.
#[derive(Debug, Clone, Default)]
pub struct LinkStatus {
    fault: Arc<Mutex<Option<LinkFault>>>,
}

impl LinkStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report_error(&self, message: impl Into<String>) {
        self.report(LinkFault::Error(message.into()));
    }

    pub fn report_closed(&self) {
        self.report(LinkFault::Closed);
    }

    fn report(&self, fault: LinkFault) {
        let mut slot = self.fault.lock();
        if slot.is_none() {
            tracing::error!(%fault, "printer link fault");
            *slot = Some(fault);
        }
    }

    pub fn fault(&self) -> Option<LinkFault> {
        self.fault.lock().clone()
    }

    pub fn is_faulted(&self) -> bool {
        self.fault.lock().is_some()
    }
}

// ============================================================================
// ENDPOINT LOCKS
// ============================================================================

/// Set of endpoints currently claimed by a session.
#[derive(Debug, Clone, Default)]
pub struct EndpointLocks {
    claimed: Arc<Mutex<HashSet<Endpoint>>>,
}

impl EndpointLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim an endpoint until the returned guard is dropped.
    ///
    /// ## Errors
    ///
    /// [`EtiquetaError::AlreadyConnected`] if another session holds it.
    pub fn claim(&self, endpoint: &Endpoint) -> Result<EndpointClaim> {
        if !self.claimed.lock().insert(endpoint.clone()) {
            return Err(EtiquetaError::AlreadyConnected(endpoint.to_string()));
        }
        Ok(EndpointClaim {
            locks: self.clone(),
            endpoint: endpoint.clone(),
        })
    }

    pub fn is_claimed(&self, endpoint: &Endpoint) -> bool {
        self.claimed.lock().contains(endpoint)
    }
}

/// Releases its endpoint when dropped.
#[derive(Debug)]
pub struct EndpointClaim {
    locks: EndpointLocks,
    endpoint: Endpoint,
}

impl EndpointClaim {
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }
}

impl Drop for EndpointClaim {
    fn drop(&mut self) {
        self.locks.claimed.lock().remove(&self.endpoint);
    }
}

// ============================================================================
// DEFAULT CONNECTOR
// ============================================================================

/// Opens TCP and accessory endpoints.
#[derive(Debug, Clone, Default)]
pub struct DefaultConnector {
    config: SessionConfig,
}

impl DefaultConnector {
    pub fn new(config: SessionConfig) -> Self {
        Self { config }
    }
}

impl Connector for DefaultConnector {
    fn open(&self, endpoint: &Endpoint, link: LinkStatus) -> Result<Box<dyn Transport>> {
        match endpoint {
            Endpoint::Tcp { host, port } => Ok(Box::new(TcpTransport::connect(
                host,
                *port,
                self.config.connect_timeout(),
                link,
            )?)),
            #[cfg(unix)]
            Endpoint::Accessory { device } => {
                let mut transport = AccessoryTransport::open(device, link)?;
                transport.set_chunk_size(self.config.write_chunk_size);
                Ok(Box::new(transport))
            }
            #[cfg(not(unix))]
            Endpoint::Accessory { device } => Err(EtiquetaError::Connect(format!(
                "accessory device {} needs a unix host",
                device
            ))),
            Endpoint::Memory { .. } => Err(EtiquetaError::Connect(format!(
                "{} needs a MemoryConnector",
                endpoint
            ))),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tcp() {
        assert_eq!(
            Endpoint::parse("printer.local:9100").unwrap(),
            Endpoint::Tcp {
                host: "printer.local".into(),
                port: 9100
            }
        );
        assert_eq!(
            Endpoint::parse("tcp://10.0.0.7").unwrap(),
            Endpoint::Tcp {
                host: "10.0.0.7".into(),
                port: DEFAULT_TCP_PORT
            }
        );
    }

    #[test]
    fn test_parse_memory_and_accessory() {
        assert_eq!(
            Endpoint::parse("memory:bench").unwrap(),
            Endpoint::Memory {
                name: "bench".into()
            }
        );
        assert_eq!(
            Endpoint::parse("/dev/ttyUSB0").unwrap(),
            Endpoint::Accessory {
                device: "/dev/ttyUSB0".into()
            }
        );
    }

    #[test]
    fn test_parse_invalid() {
        for s in ["printer", ":9100", "host:notaport", "memory:", "host:70000"] {
            assert!(
                matches!(Endpoint::parse(s), Err(EtiquetaError::Connect(_))),
                "{s} should not parse"
            );
        }
    }

    #[test]
    fn test_display_round_trips() {
        for s in ["10.0.0.7:9100", "/dev/rfcomm0", "memory:x"] {
            assert_eq!(Endpoint::parse(s).unwrap().to_string(), s);
        }
    }

    #[test]
    fn test_link_status_first_fault_sticks() {
        let link = LinkStatus::new();
        assert!(!link.is_faulted());

        let observer = link.clone();
        link.report_error("reset by peer");
        link.report_closed();
        assert_eq!(observer.fault(), Some(LinkFault::Error("reset by peer".into())));
    }

    #[test]
    fn test_endpoint_claims() {
        let locks = EndpointLocks::new();
        let endpoint = Endpoint::parse("memory:a").unwrap();

        let claim = locks.claim(&endpoint).unwrap();
        assert!(matches!(
            locks.claim(&endpoint),
            Err(EtiquetaError::AlreadyConnected(_))
        ));
        assert!(locks.claim(&Endpoint::parse("memory:b").unwrap()).is_ok());

        drop(claim);
        assert!(!locks.is_claimed(&endpoint));
        assert!(locks.claim(&endpoint).is_ok());
    }

    #[test]
    fn test_default_connector_rejects_memory() {
        let connector = DefaultConnector::default();
        let result = connector.open(&Endpoint::parse("memory:a").unwrap(), LinkStatus::new());
        assert!(matches!(result, Err(EtiquetaError::Connect(_))));
    }
}
