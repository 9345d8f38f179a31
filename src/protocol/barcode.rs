//! # Linear Barcode Commands
//!
//! Label printers in this family print two linear symbologies natively:
//!
//! | Symbology | n1 | Character set |
//! |-----------|----|---------------|
//! | Code 39 | 52 | `0-9 A-Z - . space $ / + %` |
//! | Code 128 | 54 | printable ASCII (code set B) |
//!
//! Payloads are checked with the `barcoders` encoders before any command is
//! built, so a bad payload fails at render time instead of printing garbage.
//!
//! ## Usage
//!
//! ```
//! use etiqueta::protocol::barcode::{self, Symbology};
//!
//! let symbology: Symbology = "code128".parse()?;
//! barcode::validate(symbology, "4006381333931")?;
//!
//! let cmd = barcode::barcode(symbology, b"4006381333931", 50, 16);
//! assert_eq!(&cmd[..5], &[0x1B, 0x1D, 0x41, 16, 0]); // move to x = 16
//! # Ok::<(), etiqueta::EtiquetaError>(())
//! ```

use std::fmt;
use std::str::FromStr;

use barcoders::sym::code39::Code39;
use barcoders::sym::code128::Code128;
use serde::{Deserialize, Serialize};

use super::commands::{ESC, RS, absolute_position};
use crate::error::{EtiquetaError, Result};

/// Code 128 character set B selector understood by `barcoders`
const CODE128_SET_B: char = '\u{0181}';

/// n2: HRI below the bars, Font A, line feed after printing
const HRI_BELOW_WITH_FEED: u8 = 50;

/// n3: narrowest module (2 dots), keeps barcodes inside a 384 dot head
const MODULE_WIDTH_2_DOTS: u8 = 49;

/// Barcode symbologies understood by the command set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Symbology {
    Code39,
    Code128,
}

impl Symbology {
    /// Name used in profiles (`Symbologies` setting) and records.
    pub fn name(self) -> &'static str {
        match self {
            Self::Code39 => "CODE39",
            Self::Code128 => "CODE128",
        }
    }

    /// Type byte (n1) of the `ESC b` command
    fn type_code(self) -> u8 {
        match self {
            Self::Code39 => 52,
            Self::Code128 => 54,
        }
    }
}

impl fmt::Display for Symbology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Symbology {
    type Err = EtiquetaError;

    /// Accepts `CODE39`, `code-39`, `Code 128`, etc.
    fn from_str(s: &str) -> Result<Self> {
        let normalized: String = s
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .map(|c| c.to_ascii_uppercase())
            .collect();

        match normalized.as_str() {
            "CODE39" => Ok(Self::Code39),
            "CODE128" => Ok(Self::Code128),
            _ => Err(EtiquetaError::UnsupportedSymbology(s.to_string())),
        }
    }
}

/// Check that `data` can be encoded in `symbology`.
///
/// ## Errors
///
/// [`EtiquetaError::InvalidBarcodeData`] for empty payloads and characters
/// outside the symbology's set.
pub fn validate(symbology: Symbology, data: &str) -> Result<()> {
    let invalid = |reason: String| EtiquetaError::InvalidBarcodeData {
        symbology: symbology.name().to_string(),
        reason,
    };

    if data.is_empty() {
        return Err(invalid("empty payload".to_string()));
    }

    match symbology {
        Symbology::Code39 => Code39::new(data).map(|_| ()),
        Symbology::Code128 => Code128::new(format!("{}{}", CODE128_SET_B, data)).map(|_| ()),
    }
    .map_err(|e| invalid(format!("{:?} rejected: {}", data, e)))
}

/// # Print Barcode (ESC GS A n1 n2, ESC b n1 n2 n3 n4 d1...dk RS)
///
/// Moves to `x_offset_dots` and prints a linear barcode.
///
/// ## Protocol Details
///
/// | Format  | Bytes |
/// |---------|-------|
/// | ASCII   | ESC GS A xL xH ESC b n1 n2 n3 n4 d1...dk RS |
/// | Hex     | 1B 1D 41 xL xH 1B 62 n1 n2 n3 n4 d1...dk 1E |
///
/// ## Parameters
///
/// | Param | Meaning |
/// |-------|---------|
/// | n1 | Symbology (52 = Code 39, 54 = Code 128) |
/// | n2 | 50: HRI text below, line feed after |
/// | n3 | 49: 2 dot module width |
/// | n4 | Bar height in dots, 1-255 |
///
/// Heights outside 1-255 are clamped.
pub fn barcode(symbology: Symbology, data: &[u8], height_dots: u16, x_offset_dots: u16) -> Vec<u8> {
    let height = height_dots.clamp(1, 255) as u8;

    let mut cmd = absolute_position(x_offset_dots);
    cmd.reserve(7 + data.len());
    cmd.extend([
        ESC,
        b'b',
        symbology.type_code(),
        HRI_BELOW_WITH_FEED,
        MODULE_WIDTH_2_DOTS,
        height,
    ]);
    cmd.extend_from_slice(data);
    cmd.push(RS);
    cmd
}

// ============================================================================
// TESTS
// ============================================================================
