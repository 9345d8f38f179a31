//! # In-Memory Transport
//!
//! A printer that lives in the process. Every write is recorded, failures
//! can be switched on, and card reader data can be queued. Used by tests
//! and by the CLI's dry-run mode.
//!
//! ```
//! use etiqueta::transport::{Connector, Endpoint, LinkStatus, MemoryConnector};
//!
//! let connector = MemoryConnector::new();
//! let printer = connector.printer("bench");
//!
//! let endpoint = Endpoint::parse("memory:bench")?;
//! let mut transport = connector.open(&endpoint, LinkStatus::new())?;
//! transport.write_all(b"\x1b@")?;
//!
//! assert_eq!(printer.bytes(), b"\x1b@".to_vec());
//! # Ok::<(), etiqueta::EtiquetaError>(())
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use super::{Connector, Endpoint, LinkFault, LinkStatus, ReadOutcome, Transport};
use crate::error::{EtiquetaError, Result};

#[derive(Debug, Default)]
struct PrinterState {
    writes: Vec<Vec<u8>>,
    card_data: VecDeque<u8>,
    fail_connect: bool,
    fail_writes: bool,
    fail_close: bool,
    open: bool,
    opens: usize,
    link: Option<LinkStatus>,
}

/// Handle to an in-memory printer; clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryPrinter {
    state: Arc<Mutex<PrinterState>>,
}

impl MemoryPrinter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Each successful transport write, in order.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.state.lock().writes.clone()
    }

    /// Every byte received, concatenated.
    pub fn bytes(&self) -> Vec<u8> {
        self.state.lock().writes.concat()
    }

    pub fn write_count(&self) -> usize {
        self.state.lock().writes.len()
    }

    pub fn clear(&self) {
        self.state.lock().writes.clear();
    }

    pub fn fail_connect(&self, fail: bool) {
        self.state.lock().fail_connect = fail;
    }

    pub fn fail_writes(&self, fail: bool) {
        self.state.lock().fail_writes = fail;
    }

    pub fn fail_close(&self, fail: bool) {
        self.state.lock().fail_close = fail;
    }

    /// Queue bytes as if a card had been swiped.
    pub fn swipe(&self, data: &[u8]) {
        self.state.lock().card_data.extend(data);
    }

    /// Report a fault on the link of the currently open transport.
    pub fn inject_fault(&self, fault: LinkFault) {
        let link = self.state.lock().link.clone();
        match (link, fault) {
            (Some(link), LinkFault::Error(msg)) => link.report_error(msg),
            (Some(link), LinkFault::Closed) => link.report_closed(),
            (None, _) => tracing::debug!("fault injected with no open transport"),
        }
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().open
    }

    /// How many times a transport was opened on this printer.
    pub fn open_count(&self) -> usize {
        self.state.lock().opens
    }

    fn open(&self, link: LinkStatus) -> Result<MemoryTransport> {
        let mut state = self.state.lock();
        if state.fail_connect {
            return Err(EtiquetaError::Connect("memory printer refused".to_string()));
        }
        state.open = true;
        state.opens += 1;
        state.link = Some(link);
        Ok(MemoryTransport {
            printer: self.clone(),
        })
    }
}

/// Transport end of a [`MemoryPrinter`].
#[derive(Debug)]
pub struct MemoryTransport {
    printer: MemoryPrinter,
}

impl MemoryTransport {
    /// Open a transport on a standalone printer.
    pub fn open(printer: &MemoryPrinter, link: LinkStatus) -> Result<Self> {
        printer.open(link)
    }
}

impl Transport for MemoryTransport {
    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        let mut state = self.printer.state.lock();
        if !state.open {
            return Err(EtiquetaError::Transport("memory printer closed".to_string()));
        }
        if state.fail_writes {
            return Err(EtiquetaError::Transport("simulated write failure".to_string()));
        }
        state.writes.push(data.to_vec());
        Ok(())
    }

    fn read_timeout(&mut self, buf: &mut [u8], _timeout: Duration) -> Result<ReadOutcome> {
        let mut state = self.printer.state.lock();
        if state.card_data.is_empty() {
            return Ok(ReadOutcome::TimedOut);
        }
        let n = buf.len().min(state.card_data.len());
        for (slot, byte) in buf.iter_mut().zip(state.card_data.drain(..n)) {
            *slot = byte;
        }
        Ok(ReadOutcome::Data(n))
    }

    fn close(&mut self) -> Result<()> {
        let mut state = self.printer.state.lock();
        state.open = false;
        state.link = None;
        if state.fail_close {
            return Err(EtiquetaError::Transport("simulated close failure".to_string()));
        }
        Ok(())
    }
}

/// Opens `memory:name` endpoints, creating printers on first use.
#[derive(Debug, Default)]
pub struct MemoryConnector {
    printers: Mutex<HashMap<String, MemoryPrinter>>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// The printer behind `memory:name`.
    pub fn printer(&self, name: &str) -> MemoryPrinter {
        self.printers
            .lock()
            .entry(name.to_string())
            .or_default()
            .clone()
    }
}

impl Connector for MemoryConnector {
    fn open(&self, endpoint: &Endpoint, link: LinkStatus) -> Result<Box<dyn Transport>> {
        match endpoint {
            Endpoint::Memory { name } => Ok(Box::new(self.printer(name).open(link)?)),
            other => Err(EtiquetaError::Connect(format!(
                "{} is not a memory endpoint",
                other
            ))),
        }
    }
}
