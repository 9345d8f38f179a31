//! # Raw TCP Transport
//!
//! Socket printing: open a TCP connection (port 9100 by convention) and
//! stream command bytes. Card reader data comes back on the same socket.

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use super::{LinkStatus, ReadOutcome, Transport};
use crate::error::{EtiquetaError, Result};

/// Smallest read timeout; the socket API rejects zero
const MIN_READ_TIMEOUT: Duration = Duration::from_millis(1);

/// A connected printer socket.
#[derive(Debug)]
pub struct TcpTransport {
    stream: TcpStream,
    peer: String,
    link: LinkStatus,
}

impl TcpTransport {
    /// Connect to `host:port`, trying each resolved address in turn.
    ///
    /// ## Errors
    ///
    /// [`EtiquetaError::Connect`] if the name does not resolve or no address
    /// accepts within `timeout`.
    pub fn connect(host: &str, port: u16, timeout: Duration, link: LinkStatus) -> Result<Self> {
        let peer = format!("{}:{}", host, port);
        let addrs: Vec<SocketAddr> = (host, port)
            .to_socket_addrs()
            .map_err(|e| EtiquetaError::Connect(format!("cannot resolve {}: {}", peer, e)))?
            .collect();

        let mut last_err = None;
        for addr in &addrs {
            match TcpStream::connect_timeout(addr, timeout) {
                Ok(stream) => {
                    stream.set_nodelay(true)?;
                    tracing::info!(peer = %peer, %addr, "tcp connected");
                    return Ok(Self { stream, peer, link });
                }
                Err(e) => {
                    tracing::debug!(%addr, error = %e, "tcp connect attempt failed");
                    last_err = Some(e);
                }
            }
        }

        Err(EtiquetaError::Connect(match last_err {
            Some(e) => format!("{}: {}", peer, e),
            None => format!("{}: no addresses", peer),
        }))
    }
}

impl Transport for TcpTransport {
    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        self.stream
            .write_all(data)
            .and_then(|()| self.stream.flush())
            .map_err(|e| {
                EtiquetaError::Transport(format!("write to {} failed: {}", self.peer, e))
            })
    }

    fn read_timeout(&mut self, buf: &mut [u8], timeout: Duration) -> Result<ReadOutcome> {
        self.stream
            .set_read_timeout(Some(timeout.max(MIN_READ_TIMEOUT)))?;

        match self.stream.read(buf) {
            Ok(0) => {
                self.link.report_closed();
                Ok(ReadOutcome::Closed)
            }
            Ok(n) => Ok(ReadOutcome::Data(n)),
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                Ok(ReadOutcome::TimedOut)
            }
            Err(e) => {
                self.link.report_error(e.to_string());
                Err(EtiquetaError::Transport(format!(
                    "read from {} failed: {}",
                    self.peer, e
                )))
            }
        }
    }

    fn close(&mut self) -> Result<()> {
        match self.stream.shutdown(Shutdown::Both) {
            Ok(()) => Ok(()),
            // Peer already went away
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            Err(e) => Err(EtiquetaError::Transport(format!(
                "close {} failed: {}",
                self.peer, e
            ))),
        }
    }
}
