//! # Text and Font Attributes
//!
//! Text is sent to the printer as ASCII. Font attributes are switched on and
//! off with commands looked up in the command profile:
//!
//! | Attribute | Setting names |
//! |-----------|---------------|
//! | Bold | `BoldOn` / `BoldOff` |
//! | Compress | `CompressOn` / `CompressOff` |
//! | Double high | `DoubleHighOn` / `DoubleHighOff` |
//! | Double wide | `DoubleWideOn` / `DoubleWideOff` |
//!
//! A printer whose profile lacks a toggle simply ignores that attribute.

use std::fmt;

/// Font attributes a line printer can toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FontAttribute {
    Bold,
    Compress,
    DoubleHigh,
    DoubleWide,
}

impl FontAttribute {
    pub const ALL: [FontAttribute; 4] = [
        FontAttribute::Bold,
        FontAttribute::Compress,
        FontAttribute::DoubleHigh,
        FontAttribute::DoubleWide,
    ];

    /// Profile setting holding the on or off command for this attribute.
    ///
    /// ```
    /// use etiqueta::protocol::text::FontAttribute;
    ///
    /// assert_eq!(FontAttribute::Bold.setting_name(true), "BoldOn");
    /// assert_eq!(FontAttribute::DoubleWide.setting_name(false), "DoubleWideOff");
    /// ```
    pub fn setting_name(self, enabled: bool) -> &'static str {
        match (self, enabled) {
            (Self::Bold, true) => "BoldOn",
            (Self::Bold, false) => "BoldOff",
            (Self::Compress, true) => "CompressOn",
            (Self::Compress, false) => "CompressOff",
            (Self::DoubleHigh, true) => "DoubleHighOn",
            (Self::DoubleHigh, false) => "DoubleHighOff",
            (Self::DoubleWide, true) => "DoubleWideOn",
            (Self::DoubleWide, false) => "DoubleWideOff",
        }
    }
}

impl fmt::Display for FontAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Bold => "bold",
            Self::Compress => "compress",
            Self::DoubleHigh => "double-high",
            Self::DoubleWide => "double-wide",
        };
        f.write_str(name)
    }
}

/// Replacement for characters outside 7-bit ASCII
const REPLACEMENT: u8 = b'?';

/// Convert text to the printer's ASCII character data.
///
/// Characters outside 7-bit ASCII are replaced with `?`; one replacement per
/// character, not per UTF-8 byte.
///
/// ```
/// use etiqueta::protocol::text::encode;
///
/// assert_eq!(encode("Apple 1kg"), b"Apple 1kg".to_vec());
/// assert_eq!(encode("Café"), b"Caf?".to_vec());
/// ```
pub fn encode(s: &str) -> Vec<u8> {
    s.chars()
        .map(|c| if c.is_ascii() { c as u8 } else { REPLACEMENT })
        .collect()
}
