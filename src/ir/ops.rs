//! # Rendered Commands
//!
//! A label is rendered to an ordered list of [`RenderedCommand`]s before any
//! bytes are produced. Each command is one printer directive; emission order
//! is significant and preserved all the way to the transport.
//!
//! ```text
//! LabelRecord → Vec<RenderedCommand> (inspectable) → Codegen / Session → Bytes
//! ```

use std::fmt;
use std::fs;
use std::path::PathBuf;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;

use crate::error::{EtiquetaError, Result};
use crate::protocol::barcode::Symbology;
use crate::protocol::graphics::Rotation;
use crate::protocol::text::FontAttribute;

/// Where a graphic's encoded image bytes come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphicSource {
    /// Image file on disk
    Path(PathBuf),
    /// Encoded image (PNG, BMP, ...) in memory
    Bytes(Vec<u8>),
    /// Base64 text of an encoded image, optionally as a `data:` URI
    Base64(String),
}

impl GraphicSource {
    /// Encoded image bytes.
    ///
    /// ## Errors
    ///
    /// [`EtiquetaError::Graphic`] when the file cannot be read or the base64
    /// text does not decode.
    pub fn load(&self) -> Result<Vec<u8>> {
        match self {
            Self::Path(path) => fs::read(path).map_err(|e| {
                EtiquetaError::Graphic(format!("cannot read {}: {}", path.display(), e))
            }),
            Self::Bytes(bytes) => Ok(bytes.clone()),
            Self::Base64(text) => {
                let payload = text
                    .split_once("base64,")
                    .map_or(text.as_str(), |(_, rest)| rest);
                let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
                BASE64
                    .decode(compact)
                    .map_err(|e| EtiquetaError::Graphic(format!("invalid base64 image: {}", e)))
            }
        }
    }
}

impl fmt::Display for GraphicSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => write!(f, "{}", path.display()),
            Self::Bytes(bytes) => write!(f, "<{} bytes>", bytes.len()),
            Self::Base64(text) => write!(f, "<base64, {} chars>", text.len()),
        }
    }
}

/// One structured, not-yet-serialized printer directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderedCommand {
    /// ASCII text on the current line
    Text(String),

    /// Switch a font attribute on (`true`) or off
    FontToggle(FontAttribute, bool),

    /// Linear barcode at an absolute horizontal position
    Barcode {
        symbology: Symbology,
        data: String,
        height_dots: u16,
        x_offset_dots: u16,
    },

    /// Raster image; zero width or height keeps the aspect ratio
    Graphic {
        source: GraphicSource,
        rotation: Rotation,
        x_offset_dots: u16,
        width_dots: u16,
        height_dots: u16,
    },

    /// Bytes passed through unchanged
    Raw(Vec<u8>),

    /// Advance `n` lines and flush
    NewLine(u16),

    /// Advance to the next die-cut label
    FormFeed,
}

impl RenderedCommand {
    /// Convenience for [`RenderedCommand::Text`].
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }
}

impl fmt::Display for RenderedCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => write!(f, "text {:?}", s),
            Self::FontToggle(attr, on) => {
                write!(f, "{} {}", attr, if *on { "on" } else { "off" })
            }
            Self::Barcode {
                symbology,
                data,
                height_dots,
                x_offset_dots,
            } => write!(
                f,
                "barcode {} {:?} height={} x={}",
                symbology, data, height_dots, x_offset_dots
            ),
            Self::Graphic {
                source,
                rotation,
                x_offset_dots,
                width_dots,
                height_dots,
            } => write!(
                f,
                "graphic {} rotate={} x={} size={}x{}",
                source,
                rotation.degrees(),
                x_offset_dots,
                width_dots,
                height_dots
            ),
            Self::Raw(bytes) => write!(f, "raw {} bytes", bytes.len()),
            Self::NewLine(n) => write!(f, "newline {}", n),
            Self::FormFeed => f.write_str("form feed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base64_source() {
        let source = GraphicSource::Base64("aGVs\nbG8=".into());
        assert_eq!(source.load().unwrap(), b"hello".to_vec());
    }

    #[test]
    fn test_base64_data_uri() {
        let source = GraphicSource::Base64("data:image/png;base64,aGVsbG8=".into());
        assert_eq!(source.load().unwrap(), b"hello".to_vec());
    }

    #[test]
    fn test_invalid_base64() {
        let source = GraphicSource::Base64("!!!".into());
        assert!(matches!(source.load(), Err(EtiquetaError::Graphic(_))));
    }

    #[test]
    fn test_missing_path() {
        let source = GraphicSource::Path("/nonexistent/logo.png".into());
        assert!(matches!(source.load(), Err(EtiquetaError::Graphic(_))));
    }

    #[test]
    fn test_display() {
        let cmd = RenderedCommand::FontToggle(FontAttribute::DoubleHigh, true);
        assert_eq!(cmd.to_string(), "double-high on");
        assert_eq!(RenderedCommand::NewLine(3).to_string(), "newline 3");
    }
}
