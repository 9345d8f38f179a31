//! # Line Printer Protocol
//!
//! Low-level command builders for the line printer command set used by
//! PR-series label printers.
//!
//! ## Module Structure
//!
//! - [`commands`]: Control bytes, initialization, feeds, positioning
//! - [`text`]: ASCII text encoding and font attribute names
//! - [`barcode`]: Code 39 / Code 128 validation and print command
//! - [`graphics`]: Image to raster conversion and raster command
//!
//! Printer-specific sequences (font toggles, line terminator, form feed) are
//! read from the command profile; this module only builds the fixed ones.
//!
//! ## Usage Example
//!
//! ```
//! use etiqueta::protocol::{barcode, commands, text};
//! use etiqueta::protocol::barcode::Symbology;
//!
//! let mut data = Vec::new();
//! data.extend(commands::init());
//! data.extend(text::encode("Apple 1kg"));
//! data.extend(commands::line_feed());
//! data.extend(barcode::barcode(Symbology::Code128, b"12345", 50, 0));
//! data.extend(commands::form_feed());
//!
//! // Send `data` to the printer via a transport...
//! ```

pub mod barcode;
pub mod commands;
pub mod graphics;
pub mod text;

pub use barcode::Symbology;
pub use graphics::Rotation;
pub use text::FontAttribute;
