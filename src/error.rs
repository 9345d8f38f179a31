//! # Error Types
//!
//! This module defines error types used throughout the etiqueta library.
//!
//! Errors fall into two groups:
//!
//! - **Validation errors** (`InvalidAttributeFile`, `InvalidPrinterId`,
//!   `UnknownSetting`, `UnsupportedSymbology`, `InvalidBarcodeData`) are raised
//!   while loading profiles or rendering labels, before any transport I/O.
//! - **Session errors** (`Connect`, `AlreadyConnected`, `NoConnection`,
//!   `Transport`) are raised by a [`PrinterSession`](crate::session::PrinterSession)
//!   while it talks to the printer.

use thiserror::Error;

/// Main error type for etiqueta operations
#[derive(Debug, Error)]
pub enum EtiquetaError {
    /// Opening the transport failed
    #[error("Connect error: {0}")]
    Connect(String),

    /// `connect` called on a session or endpoint that is already connected
    #[error("Already connected to {0}")]
    AlreadyConnected(String),

    /// Operation requires an open connection (or open document)
    #[error("No connection to printer")]
    NoConnection,

    /// Transport-level write/close failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// Command profile source missing, malformed, or empty
    #[error("Invalid attribute file: {0}")]
    InvalidAttributeFile(String),

    /// Printer identifier has no section in the command profile
    #[error("Invalid printer id: {0}")]
    InvalidPrinterId(String),

    /// Setting name not present in the resolved profile
    #[error("Unknown setting: {0}")]
    UnknownSetting(String),

    /// Setting exists but holds a value of the wrong type
    #[error("Invalid setting {name}: {reason}")]
    InvalidSetting { name: String, reason: String },

    /// Barcode symbology not supported by the library or the printer
    #[error("Unsupported symbology: {0}")]
    UnsupportedSymbology(String),

    /// Barcode payload cannot be encoded in the requested symbology
    #[error("Invalid barcode data for {symbology}: {reason}")]
    InvalidBarcodeData { symbology: String, reason: String },

    /// Graphic could not be loaded or converted
    #[error("Graphic error: {0}")]
    Graphic(String),

    /// Should not happen; indicates a bug or a poisoned collaborator
    #[error("Unexpected error: {0}")]
    Unexpected(String),

    /// I/O error wrapper
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, EtiquetaError>;

impl EtiquetaError {
    /// Whether this error was raised before any transport I/O happened.
    ///
    /// Validation errors never leave a session partially connected.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidAttributeFile(_)
                | Self::InvalidPrinterId(_)
                | Self::UnknownSetting(_)
                | Self::InvalidSetting { .. }
                | Self::UnsupportedSymbology(_)
                | Self::InvalidBarcodeData { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_classification() {
        assert!(EtiquetaError::UnknownSetting("BoldOn".into()).is_validation());
        assert!(EtiquetaError::UnsupportedSymbology("QR".into()).is_validation());
        assert!(!EtiquetaError::NoConnection.is_validation());
        assert!(!EtiquetaError::Transport("broken pipe".into()).is_validation());
    }

    #[test]
    fn test_display_messages() {
        let err = EtiquetaError::InvalidPrinterId("PR9".into());
        assert_eq!(err.to_string(), "Invalid printer id: PR9");
        assert_eq!(EtiquetaError::NoConnection.to_string(), "No connection to printer");
    }
}
