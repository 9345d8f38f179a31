//! # Etiqueta - Label Printer Command Protocol Client
//!
//! Etiqueta turns structured label data (price, description, barcode payload,
//! template choice) into a correctly ordered, correctly buffered stream of
//! line-printer commands, sends it over a byte-stream transport, and reports
//! the lifecycle of each print job as progress events.
//!
//! - **Command profiles**: printer commands and defaults described in JSON
//! - **Label rendering**: fixed per-template layouts of text, barcode and logo
//! - **Sessions**: connect, buffered writes, document and progress tracking
//! - **Transports**: raw TCP, serial/RFCOMM accessory streams, in-memory
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use etiqueta::{
//!     label::{LabelRecord, TemplateKind},
//!     printer::{CommandProfile, SessionConfig},
//!     protocol::Symbology,
//!     service::LabelPrinter,
//!     transport::{DefaultConnector, Endpoint},
//! };
//!
//! let config = SessionConfig::default();
//! let connector = Arc::new(DefaultConnector::new(config.clone()));
//! let service = LabelPrinter::new(CommandProfile::builtin()?, connector).with_config(config);
//!
//! service.bus().subscribe_fn(|event| println!("{}", event));
//!
//! let record = LabelRecord::new(TemplateKind::StandardPrice)
//!     .price("$4.99")
//!     .description("Honeycrisp apples 1kg")
//!     .barcode(Symbology::Code128, "0123456789");
//!
//! let job = service.submit_label(record, "PR2", &Endpoint::parse("192.168.1.50:9100")?)?;
//! job.wait()?;
//! # Ok::<(), etiqueta::EtiquetaError>(())
//! ```
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`printer`] | Command profiles, settings, session configuration |
//! | [`label`] | Label records and the template renderer |
//! | [`ir`] | Rendered commands and their byte encoding |
//! | [`protocol`] | Byte-level command builders |
//! | [`session`] | Printer session state machine and command buffer |
//! | [`events`] | Progress events and the event bus |
//! | [`transport`] | Communication backends |
//! | [`service`] | Job submission and cancellation |
//! | [`error`] | Error types |

pub mod error;
pub mod events;
pub mod ir;
pub mod label;
pub mod printer;
pub mod protocol;
pub mod service;
pub mod session;
pub mod transport;

// Re-exports for convenience
pub use error::{EtiquetaError, Result};
pub use events::{ProgressEvent, ProgressKind};
pub use label::{LabelRecord, TemplateKind};
pub use printer::{CommandProfile, ResolvedProfile, SessionConfig};
pub use service::{JobHandle, JobOutcome, JobReport, LabelPrinter};
pub use session::PrinterSession;

/// Install a `tracing` subscriber writing to stderr.
///
/// The filter comes from `RUST_LOG` and defaults to `info`. Calling this
/// more than once is harmless.
pub fn init_logging() {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
