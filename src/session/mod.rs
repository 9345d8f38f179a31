//! # Printer Session
//!
//! One session per physical connection. The session owns the transport
//! (through its [`CommandBuffer`]), sends the initialization commands on
//! connect, and drives the print progress state machine.
//!
//! ## State Machine
//!
//! ```text
//!                connect                 first data command
//! Disconnected ──────────► Connected ─────────────────────► DocumentOpen
//!      ▲                      │  ▲                               │
//!      │      disconnect      │  └────────── end_doc ────────────┤
//!      └──────────────────────┴──────────── disconnect ──────────┘
//! ```
//!
//! ## Events
//!
//! | Sequence | Events |
//! |----------|--------|
//! | connect, disconnect | Finished |
//! | connect, write, end_doc | StartDoc, EndDoc, Complete |
//! | connect, write, disconnect | StartDoc, EndDoc, Finished, Complete |
//! | connect, write, *write fails*, disconnect | StartDoc, EndDoc, Cancel, Finished |
//!
//! Complete and Cancel are mutually exclusive per document and are only
//! published after the final flush returned.
//!
//! ## Failure Handling
//!
//! A transport write failure is returned from the call that triggered it
//! and marks the open document cancelled. From then on the document's bytes
//! are discarded instead of written. A link fault reported asynchronously
//! through [`LinkStatus`] has the same effect and additionally marks every
//! later document of this connection as cancelled.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use etiqueta::events::ProgressKind;
//! use etiqueta::printer::CommandProfile;
//! use etiqueta::session::PrinterSession;
//! use etiqueta::transport::{Endpoint, MemoryConnector};
//!
//! let connector = Arc::new(MemoryConnector::new());
//! let printer = connector.printer("bench");
//! let profile = CommandProfile::builtin()?.resolve("PR2")?;
//!
//! let mut session = PrinterSession::new(profile, connector);
//! session.connect(&Endpoint::parse("memory:bench")?)?;
//! session.write_line("Apple 1kg")?;
//! session.end_doc()?;
//! session.disconnect()?;
//!
//! assert!(printer.bytes().ends_with(b"Apple 1kg\r\n"));
//! # Ok::<(), etiqueta::EtiquetaError>(())
//! ```

pub mod buffer;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

pub use buffer::CommandBuffer;

use crate::error::{EtiquetaError, Result};
use crate::events::{JobId, ProgressEvent, ProgressEventBus, ProgressKind};
use crate::ir::{GraphicSource, RenderedCommand, codegen};
use crate::printer::{ResolvedProfile, SessionConfig, Setting};
use crate::protocol::barcode::Symbology;
use crate::protocol::graphics::{Placement, Rotation};
use crate::protocol::text::{self, FontAttribute};
use crate::transport::{Connector, Endpoint, EndpointClaim, EndpointLocks, LinkStatus, ReadOutcome};

/// Idle gap that ends a card read once data started arriving
const MSR_IDLE_TIMEOUT: Duration = Duration::from_millis(50);

/// Largest single read from the card reader
const MSR_CHUNK_SIZE: usize = 4096;

/// A session shared between threads.
pub type SharedSession = Arc<Mutex<PrinterSession>>;

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connected,
    DocumentOpen,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connected => "connected",
            Self::DocumentOpen => "document open",
        };
        f.write_str(name)
    }
}

/// How the last closed document ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentOutcome {
    /// Complete was published
    Completed,
    /// Cancel was published
    Cancelled,
}

/// Outcome of a card reader read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MsrRead {
    /// Card data, retained until [`PrinterSession::clear_msr`]
    Data(Vec<u8>),
    TimedOut,
    /// More than the allowed number of bytes arrived; not retained
    Exceeded(Vec<u8>),
}

/// A connection to one printer.
pub struct PrinterSession {
    profile: ResolvedProfile,
    config: SessionConfig,
    connector: Arc<dyn Connector>,
    locks: EndpointLocks,
    bus: Arc<ProgressEventBus>,
    job: Option<JobId>,

    state: SessionState,
    cancel_pending: bool,
    buffer: CommandBuffer,
    link: LinkStatus,
    claim: Option<EndpointClaim>,
    ever_connected: bool,
    last_document: Option<DocumentOutcome>,
    msr: Option<Vec<u8>>,
}

impl PrinterSession {
    /// A disconnected session with its own event bus and endpoint locks.
    pub fn new(profile: ResolvedProfile, connector: Arc<dyn Connector>) -> Self {
        let config = SessionConfig::default();
        let buffer = CommandBuffer::new(
            config.buffer_capacity_for(&profile),
            codegen::line_terminator(&profile),
        );
        Self {
            profile,
            config,
            connector,
            locks: EndpointLocks::new(),
            bus: Arc::new(ProgressEventBus::new()),
            job: None,
            state: SessionState::Disconnected,
            cancel_pending: false,
            buffer,
            link: LinkStatus::new(),
            claim: None,
            ever_connected: false,
            last_document: None,
            msr: None,
        }
    }

    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Publish events on a shared bus.
    pub fn with_bus(mut self, bus: Arc<ProgressEventBus>) -> Self {
        self.bus = bus;
        self
    }

    /// Share endpoint claims with other sessions.
    pub fn with_locks(mut self, locks: EndpointLocks) -> Self {
        self.locks = locks;
        self
    }

    /// Tag every published event with a job id.
    pub fn with_job(mut self, job: JobId) -> Self {
        self.job = Some(job);
        self
    }

    /// Wrap for use from several threads.
    pub fn into_shared(self) -> SharedSession {
        Arc::new(Mutex::new(self))
    }

    // ========================================================================
    // ACCESSORS
    // ========================================================================

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state != SessionState::Disconnected
    }

    pub fn bus(&self) -> &Arc<ProgressEventBus> {
        &self.bus
    }

    pub fn profile(&self) -> &ResolvedProfile {
        &self.profile
    }

    /// Override a profile setting for this session only.
    pub fn set_setting(&mut self, name: impl Into<String>, value: Setting) {
        self.profile.set(name, value);
        self.buffer.set_line_feed(codegen::line_terminator(&self.profile));
    }

    /// Outcome of the most recent document closed since the last connect,
    /// `None` if none was.
    pub fn last_document(&self) -> Option<DocumentOutcome> {
        self.last_document
    }

    /// Bytes written to the transport since the last connect.
    ///
    /// ## Errors
    ///
    /// [`EtiquetaError::NoConnection`] if the session never connected.
    pub fn bytes_written(&self) -> Result<u64> {
        if !self.ever_connected {
            return Err(EtiquetaError::NoConnection);
        }
        Ok(self.buffer.bytes_written())
    }

    // ========================================================================
    // CONNECTION
    // ========================================================================

    /// Claim the endpoint, open the transport, and send `Initialize` and
    /// `NormalFont`.
    ///
    /// The byte counter restarts at zero before the init bytes are written,
    /// so right after connect it holds their length. A failed init write
    /// closes the transport and leaves the session Disconnected.
    pub fn connect(&mut self, endpoint: &Endpoint) -> Result<()> {
        if self.is_connected() {
            return Err(EtiquetaError::AlreadyConnected(endpoint.to_string()));
        }

        let claim = self.locks.claim(endpoint)?;
        let link = LinkStatus::new();
        let transport = self.connector.open(endpoint, link.clone())?;

        self.buffer = CommandBuffer::new(
            self.config.buffer_capacity_for(&self.profile),
            codegen::line_terminator(&self.profile),
        );
        self.buffer.attach(transport);
        let init = codegen::init_sequence(&self.profile);
        if let Err(e) = self.buffer.write(&init).and_then(|_| self.buffer.flush()) {
            tracing::error!(%endpoint, error = %e, "init write failed");
            self.buffer.discard();
            if let Some(mut transport) = self.buffer.detach() {
                let _ = transport.close();
            }
            return Err(e);
        }

        self.link = link;
        self.claim = Some(claim);
        self.state = SessionState::Connected;
        self.cancel_pending = false;
        self.ever_connected = true;
        self.last_document = None;
        self.msr = None;

        tracing::info!(
            %endpoint,
            printer = self.profile.printer_id(),
            capacity = self.buffer.capacity(),
            "connected"
        );
        Ok(())
    }

    /// Close the connection.
    ///
    /// With a document open this flushes, publishes EndDoc (and Cancel if
    /// the document failed), closes the transport, publishes Finished and
    /// then Complete for a document that printed. Teardown always runs to
    /// the end; the first error met is returned and the session is
    /// Disconnected either way.
    pub fn disconnect(&mut self) -> Result<()> {
        if !self.is_connected() {
            return Err(EtiquetaError::NoConnection);
        }
        self.check_link();

        let mut first_err = None;
        let flushed = self.flush_inner();
        let mut completed = false;

        if self.state == SessionState::DocumentOpen {
            if let Err(e) = flushed {
                first_err = Some(e);
            }
            self.publish(ProgressKind::EndDoc);
            if self.cancel_pending {
                self.last_document = Some(DocumentOutcome::Cancelled);
                self.publish(ProgressKind::Cancel);
            } else {
                self.last_document = Some(DocumentOutcome::Completed);
                completed = true;
            }
        } else if let Err(e) = flushed {
            first_err = Some(e);
        }

        if let Some(mut transport) = self.buffer.detach() {
            if let Err(e) = transport.close() {
                tracing::error!(error = %e, "close failed");
                first_err.get_or_insert(e);
            }
        }

        let endpoint = self.claim.take().map(|c| c.endpoint().to_string());
        self.state = SessionState::Disconnected;
        self.cancel_pending = false;
        tracing::info!(
            endpoint = endpoint.as_deref().unwrap_or("?"),
            bytes = self.buffer.bytes_written(),
            "disconnected"
        );

        self.publish(ProgressKind::Finished);
        if completed {
            self.publish(ProgressKind::Complete);
        }

        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    // ========================================================================
    // DOCUMENT LIFECYCLE
    // ========================================================================

    /// Flush and close the open document: EndDoc, then Complete or Cancel.
    pub fn end_doc(&mut self) -> Result<()> {
        if self.state != SessionState::DocumentOpen {
            return Err(EtiquetaError::NoConnection);
        }
        self.check_link();

        let flushed = self.flush_inner();
        self.publish(ProgressKind::EndDoc);
        if self.cancel_pending {
            self.last_document = Some(DocumentOutcome::Cancelled);
            self.publish(ProgressKind::Cancel);
        } else {
            self.last_document = Some(DocumentOutcome::Completed);
            self.publish(ProgressKind::Complete);
        }

        self.state = SessionState::Connected;
        self.cancel_pending = false;
        flushed
    }

    /// Mark the open document cancelled. Its remaining bytes are discarded
    /// and Cancel is published when it ends. Returns false when no document
    /// is open.
    pub fn cancel(&mut self) -> bool {
        if self.state != SessionState::DocumentOpen {
            return false;
        }
        if !self.cancel_pending {
            tracing::info!(job = ?self.job, "document cancelled");
            self.cancel_pending = true;
        }
        true
    }

    /// Send buffered bytes.
    pub fn flush(&mut self) -> Result<()> {
        self.require_connected()?;
        self.check_link();
        self.flush_inner()
    }

    // ========================================================================
    // DATA COMMANDS
    // ========================================================================

    /// Queue ASCII text.
    pub fn write(&mut self, s: &str) -> Result<()> {
        self.require_connected()?;
        self.begin_data();
        self.enqueue(&text::encode(s))
    }

    /// Text followed by one line advance.
    pub fn write_line(&mut self, s: &str) -> Result<()> {
        self.write(s)?;
        self.new_line(1)
    }

    /// Advance `n` lines and flush; `n <= 0` only flushes.
    pub fn new_line(&mut self, n: i32) -> Result<()> {
        if n <= 0 {
            return self.flush();
        }
        self.require_connected()?;
        self.begin_data();
        if self.discarding() {
            return self.flush_inner();
        }
        self.buffer
            .new_line(n)
            .map(|_| ())
            .map_err(|e| self.transport_failed(e))
    }

    /// Advance to the next label and flush.
    pub fn form_feed(&mut self) -> Result<()> {
        self.require_connected()?;
        self.begin_data();
        self.enqueue(&codegen::form_feed(&self.profile))?;
        self.flush_inner()
    }

    /// Toggle a font attribute. Printers without the attribute get nothing.
    pub fn set_font(&mut self, attr: FontAttribute, on: bool) -> Result<()> {
        self.require_connected()?;
        self.begin_data();
        let bytes = codegen::font_toggle(&self.profile, attr, on);
        self.enqueue(&bytes)
    }

    pub fn set_bold(&mut self, on: bool) -> Result<()> {
        self.set_font(FontAttribute::Bold, on)
    }

    pub fn set_compress(&mut self, on: bool) -> Result<()> {
        self.set_font(FontAttribute::Compress, on)
    }

    pub fn set_double_high(&mut self, on: bool) -> Result<()> {
        self.set_font(FontAttribute::DoubleHigh, on)
    }

    pub fn set_double_wide(&mut self, on: bool) -> Result<()> {
        self.set_font(FontAttribute::DoubleWide, on)
    }

    /// Send the command stored under `name` in the profile.
    ///
    /// ## Errors
    ///
    /// `UnknownSetting` if the profile has no such command; nothing is sent
    /// and no document is opened.
    pub fn send_custom_command(&mut self, name: &str) -> Result<()> {
        self.require_connected()?;
        let bytes = self.profile.command_bytes(name)?;
        self.begin_data();
        self.enqueue(&bytes)
    }

    /// Queue bytes unchanged.
    pub fn write_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.require_connected()?;
        self.begin_data();
        self.enqueue(bytes)
    }

    /// Print a barcode. The payload is validated before anything is queued.
    pub fn write_barcode(
        &mut self,
        symbology: Symbology,
        data: &str,
        height_dots: u16,
        x_offset_dots: u16,
    ) -> Result<()> {
        self.require_connected()?;
        let bytes =
            codegen::encode_barcode(&self.profile, symbology, data, height_dots, x_offset_dots)?;
        self.begin_data();
        self.enqueue(&bytes)
    }

    /// Print an image file. `rotation` is in degrees (multiples of 90);
    /// zero width or height keeps the aspect ratio.
    pub fn write_graphic(
        &mut self,
        path: &str,
        rotation: i32,
        x_offset_dots: u16,
        width_dots: u16,
        height_dots: u16,
    ) -> Result<()> {
        let rotation = codegen::rotation(rotation)?;
        self.write_graphic_source(
            &GraphicSource::Path(path.into()),
            rotation,
            x_offset_dots,
            width_dots,
            height_dots,
        )
    }

    /// Print a base64-encoded image.
    pub fn write_graphic_base64(
        &mut self,
        data: &str,
        rotation: i32,
        x_offset_dots: u16,
        width_dots: u16,
        height_dots: u16,
    ) -> Result<()> {
        let rotation = codegen::rotation(rotation)?;
        self.write_graphic_source(
            &GraphicSource::Base64(data.to_string()),
            rotation,
            x_offset_dots,
            width_dots,
            height_dots,
        )
    }

    pub fn write_graphic_source(
        &mut self,
        source: &GraphicSource,
        rotation: Rotation,
        x_offset_dots: u16,
        width_dots: u16,
        height_dots: u16,
    ) -> Result<()> {
        self.require_connected()?;
        let placement = Placement {
            rotation,
            x_offset: x_offset_dots,
            width: width_dots,
            height: height_dots,
        };
        let bytes = codegen::encode_graphic(&self.profile, &source.load()?, placement)?;
        self.begin_data();
        self.enqueue(&bytes)
    }

    /// Send rendered commands in order, each through its matching operation.
    pub fn print_commands(&mut self, cmds: &[RenderedCommand]) -> Result<()> {
        for cmd in cmds {
            match cmd {
                RenderedCommand::Text(s) => self.write(s)?,
                RenderedCommand::FontToggle(attr, on) => self.set_font(*attr, *on)?,
                RenderedCommand::Barcode {
                    symbology,
                    data,
                    height_dots,
                    x_offset_dots,
                } => self.write_barcode(*symbology, data, *height_dots, *x_offset_dots)?,
                RenderedCommand::Graphic {
                    source,
                    rotation,
                    x_offset_dots,
                    width_dots,
                    height_dots,
                } => self.write_graphic_source(
                    source,
                    *rotation,
                    *x_offset_dots,
                    *width_dots,
                    *height_dots,
                )?,
                RenderedCommand::Raw(bytes) => self.write_raw(bytes)?,
                RenderedCommand::NewLine(n) => self.new_line(i32::from(*n))?,
                RenderedCommand::FormFeed => self.form_feed()?,
            }
        }
        Ok(())
    }

    // ========================================================================
    // CARD READER
    // ========================================================================

    /// Wait up to `timeout` for card data of at most `max_len` bytes.
    ///
    /// Data already retained from an earlier read is returned again without
    /// touching the transport.
    pub fn read_msr(&mut self, max_len: usize, timeout: Duration) -> Result<MsrRead> {
        self.require_connected()?;
        self.check_link();
        if let Some(data) = &self.msr {
            return Ok(MsrRead::Data(data.clone()));
        }

        let transport = self.buffer.transport_mut()?;
        let mut chunk = vec![0u8; max_len.saturating_add(1).min(MSR_CHUNK_SIZE)];
        let mut data = Vec::new();
        let mut wait = timeout;

        while data.len() <= max_len {
            match transport.read_timeout(&mut chunk, wait)? {
                ReadOutcome::Data(n) => data.extend_from_slice(&chunk[..n]),
                ReadOutcome::TimedOut | ReadOutcome::Closed => break,
            }
            wait = MSR_IDLE_TIMEOUT;
        }

        if data.is_empty() {
            return Ok(MsrRead::TimedOut);
        }
        if data.len() > max_len {
            tracing::warn!(bytes = data.len(), max_len, "card data too long");
            return Ok(MsrRead::Exceeded(data));
        }

        tracing::debug!(bytes = data.len(), "card read");
        self.msr = Some(data.clone());
        Ok(MsrRead::Data(data))
    }

    /// Forget retained card data.
    pub fn clear_msr(&mut self) {
        self.msr = None;
    }

    // ========================================================================
    // INTERNALS
    // ========================================================================

    fn require_connected(&self) -> Result<()> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(EtiquetaError::NoConnection)
        }
    }

    /// Pick up faults reported asynchronously by the transport.
    fn check_link(&mut self) {
        if let Some(fault) = self.link.fault() {
            if self.state == SessionState::DocumentOpen && !self.cancel_pending {
                tracing::warn!(%fault, "document cancelled by link fault");
                self.cancel_pending = true;
            }
        }
    }

    /// Open a document on the first data command.
    fn begin_data(&mut self) {
        self.check_link();
        if self.state == SessionState::Connected {
            self.state = SessionState::DocumentOpen;
            self.cancel_pending = self.link.is_faulted();
            self.publish(ProgressKind::StartDoc);
        }
    }

    fn discarding(&self) -> bool {
        self.cancel_pending || self.link.is_faulted()
    }

    fn enqueue(&mut self, bytes: &[u8]) -> Result<()> {
        if self.discarding() {
            let dropped = self.buffer.discard() + bytes.len();
            tracing::debug!(bytes = dropped, "document cancelled, bytes dropped");
            return Ok(());
        }
        self.buffer.write(bytes).map_err(|e| self.transport_failed(e))
    }

    fn flush_inner(&mut self) -> Result<()> {
        if self.discarding() {
            let dropped = self.buffer.discard();
            if dropped > 0 {
                tracing::warn!(bytes = dropped, "discarding buffered bytes");
            }
            return Ok(());
        }
        self.buffer
            .flush()
            .map(|_| ())
            .map_err(|e| self.transport_failed(e))
    }

    fn transport_failed(&mut self, err: EtiquetaError) -> EtiquetaError {
        tracing::error!(error = %err, state = %self.state, "transport write failed");
        if self.state == SessionState::DocumentOpen {
            self.cancel_pending = true;
        }
        err
    }

    fn publish(&self, kind: ProgressKind) {
        let event = ProgressEvent::new(kind, self.job, self.buffer.bytes_written());
        tracing::debug!(%event, "progress");
        if let Err(e) = self.bus.publish(&event) {
            tracing::warn!(error = %e, failures = ?e.failures, "progress listener failed");
        }
    }
}

impl fmt::Debug for PrinterSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrinterSession")
            .field("printer", &self.profile.printer_id())
            .field("state", &self.state)
            .field("cancel_pending", &self.cancel_pending)
            .field("last_document", &self.last_document)
            .field("buffer", &self.buffer)
            .finish()
    }
}

// ============================================================================
// TESTS
// ============================================================================
