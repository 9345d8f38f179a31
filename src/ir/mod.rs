//! # Intermediate Representation (IR)
//!
//! The IR sits between label templates and raw printer bytes. A label is
//! first rendered to a `Vec<RenderedCommand>`, which can be inspected,
//! compared in tests, or dry-run to bytes, and is then handed to a
//! [`PrinterSession`](crate::session::PrinterSession) for printing.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌──────────────────────┐     ┌──────────┐
//! │ LabelRecord │ ──► │ Vec<RenderedCommand> │ ──► │ Codegen  │
//! │ + template  │     │     (inspectable)    │     │ (bytes)  │
//! └─────────────┘     └──────────────────────┘     └──────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use etiqueta::ir::{self, RenderedCommand};
//! use etiqueta::printer::CommandProfile;
//! use etiqueta::protocol::FontAttribute;
//!
//! let pr2 = CommandProfile::builtin()?.resolve("PR2")?;
//! let cmds = vec![
//!     RenderedCommand::FontToggle(FontAttribute::Bold, true),
//!     RenderedCommand::text("PRICE"),
//!     RenderedCommand::FontToggle(FontAttribute::Bold, false),
//!     RenderedCommand::NewLine(1),
//! ];
//!
//! let bytes = ir::to_bytes(&cmds, &pr2)?;
//! assert_eq!(bytes, b"\x1bEPRICE\x1bF\r\n".to_vec());
//! # Ok::<(), etiqueta::EtiquetaError>(())
//! ```

pub mod codegen;
mod ops;

pub use codegen::{init_sequence, to_bytes};
pub use ops::*;
