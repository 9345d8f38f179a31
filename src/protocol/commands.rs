//! # Line Printer Control Commands
//!
//! Control bytes and positioning commands shared by the other protocol
//! builders.
//!
//! ## Escape Sequence Structure
//!
//! Commands follow these patterns:
//! - Single byte: `LF`, `CR`, `FF`
//! - Two bytes: `ESC @`
//! - Multi-byte with parameters: `ESC GS A n1 n2`, `ESC b n1 n2 n3 n4 data RS`
//!
//! ## Byte Order
//!
//! Multi-byte integers use **little-endian** encoding:
//! - `u16` value 0x1234 is sent as bytes `[0x34, 0x12]`
//!
//! Text attribute toggles, the line terminator and form feed are not fixed
//! here: they come from the printer's command profile so that each model can
//! describe its own sequences.

// ============================================================================
// CONTROL BYTES
// ============================================================================

/// ESC (Escape) - Command prefix byte
pub const ESC: u8 = 0x1B;

/// GS (Group Separator) - Extended command prefix
pub const GS: u8 = 0x1D;

/// RS (Record Separator) - Barcode data terminator
pub const RS: u8 = 0x1E;

/// LF (Line Feed) - Print and advance one line
pub const LF: u8 = 0x0A;

/// CR (Carriage Return)
pub const CR: u8 = 0x0D;

/// FF (Form Feed) - Advance to top of next label/page
pub const FF: u8 = 0x0C;

// ============================================================================
// INITIALIZATION
// ============================================================================

/// # Initialize Printer (ESC @)
///
/// Resets the printer to its power-on default state. Used when a profile
/// does not define its own `Initialize` command.
///
/// | Format  | Bytes |
/// |---------|-------|
/// | ASCII   | ESC @ |
/// | Hex     | 1B 40 |
///
/// ```
/// use etiqueta::protocol::commands;
///
/// assert_eq!(commands::init(), vec![0x1B, 0x40]);
/// ```
#[inline]
pub fn init() -> Vec<u8> {
    vec![ESC, b'@']
}

// ============================================================================
// PAPER MOVEMENT
// ============================================================================

/// Default line terminator when the profile has no `LineFeed` setting.
#[inline]
pub fn line_feed() -> Vec<u8> {
    vec![CR, LF]
}

/// Default form feed when the profile has no `FormFeed` setting.
#[inline]
pub fn form_feed() -> Vec<u8> {
    vec![FF]
}

/// Repeat a line terminator `count` times.
///
/// ```
/// use etiqueta::protocol::commands;
///
/// assert_eq!(commands::line_feeds(&[0x0A], 3), vec![0x0A, 0x0A, 0x0A]);
/// assert!(commands::line_feeds(&[0x0D, 0x0A], 0).is_empty());
/// ```
pub fn line_feeds(terminator: &[u8], count: usize) -> Vec<u8> {
    terminator.repeat(count)
}

// ============================================================================
// POSITIONING
// ============================================================================

/// # Absolute Horizontal Position (ESC GS A n1 n2)
///
/// Moves the print position to `dots` from the left margin. Used for barcode
/// x-offsets.
///
/// | Format  | Bytes |
/// |---------|-------|
/// | ASCII   | ESC GS A n1 n2 |
/// | Hex     | 1B 1D 41 n1 n2 |
///
/// ```
/// use etiqueta::protocol::commands;
///
/// assert_eq!(commands::absolute_position(300), vec![0x1B, 0x1D, 0x41, 0x2C, 0x01]);
/// ```
pub fn absolute_position(dots: u16) -> Vec<u8> {
    let [n1, n2] = u16_le(dots);
    vec![ESC, GS, b'A', n1, n2]
}

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Encode a u16 value as little-endian bytes [low, high]
///
/// ```
/// use etiqueta::protocol::commands::u16_le;
///
/// assert_eq!(u16_le(0x1234), [0x34, 0x12]);
/// assert_eq!(u16_le(384), [0x80, 0x01]);
/// ```
#[inline]
pub const fn u16_le(value: u16) -> [u8; 2] {
    [value as u8, (value >> 8) as u8]
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init() {
        assert_eq!(init(), vec![0x1B, 0x40]);
    }

    #[test]
    fn test_default_feeds() {
        assert_eq!(line_feed(), vec![0x0D, 0x0A]);
        assert_eq!(form_feed(), vec![0x0C]);
    }

    #[test]
    fn test_line_feeds_repeat() {
        assert_eq!(line_feeds(&[CR, LF], 2), vec![CR, LF, CR, LF]);
    }

    #[test]
    fn test_absolute_position() {
        assert_eq!(absolute_position(0), vec![0x1B, 0x1D, 0x41, 0, 0]);
        assert_eq!(absolute_position(16), vec![0x1B, 0x1D, 0x41, 16, 0]);
    }

    #[test]
    fn test_u16_le() {
        assert_eq!(u16_le(0x0000), [0x00, 0x00]);
        assert_eq!(u16_le(0x00FF), [0xFF, 0x00]);
        assert_eq!(u16_le(0xFF00), [0x00, 0xFF]);
        assert_eq!(u16_le(576), [0x40, 0x02]);
    }
}
