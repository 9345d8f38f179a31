//! # Code Generation
//!
//! Converts rendered commands to printer bytes using the protocol builders
//! and the printer's resolved profile.

use super::ops::RenderedCommand;
use crate::error::{EtiquetaError, Result};
use crate::printer::profile::{self, ResolvedProfile};
use crate::protocol::barcode::{self, Symbology};
use crate::protocol::graphics::{self, Placement, Rotation};
use crate::protocol::{commands, text};
use crate::protocol::text::FontAttribute;

/// Printhead width assumed when the profile does not declare one (PR2).
pub const DEFAULT_PRINTHEAD_WIDTH: u16 = 384;

impl RenderedCommand {
    /// Serialize one command.
    ///
    /// `NewLine` only produces its line terminators here; the flush that
    /// follows a line advance is the session's concern.
    pub fn encode(&self, profile: &ResolvedProfile) -> Result<Vec<u8>> {
        match self {
            Self::Text(s) => Ok(text::encode(s)),
            Self::FontToggle(attr, on) => Ok(font_toggle(profile, *attr, *on)),
            Self::Barcode {
                symbology,
                data,
                height_dots,
                x_offset_dots,
            } => encode_barcode(profile, *symbology, data, *height_dots, *x_offset_dots),
            Self::Graphic {
                source,
                rotation,
                x_offset_dots,
                width_dots,
                height_dots,
            } => {
                let encoded = source.load()?;
                let placement = Placement {
                    rotation: *rotation,
                    x_offset: *x_offset_dots,
                    width: *width_dots,
                    height: *height_dots,
                };
                encode_graphic(profile, &encoded, placement)
            }
            Self::Raw(bytes) => Ok(bytes.clone()),
            Self::NewLine(n) => Ok(commands::line_feeds(
                &line_terminator(profile),
                usize::from(*n),
            )),
            Self::FormFeed => Ok(form_feed(profile)),
        }
    }
}

/// Serialize a command list, in order, without the initialization prefix.
pub fn to_bytes(cmds: &[RenderedCommand], profile: &ResolvedProfile) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    for cmd in cmds {
        out.extend(cmd.encode(profile)?);
    }
    Ok(out)
}

/// Bytes sent on connect: `Initialize` (or `ESC @`) then `NormalFont`.
pub fn init_sequence(profile: &ResolvedProfile) -> Vec<u8> {
    let mut out = match profile.lookup(profile::INITIALIZE).and_then(|s| s.as_command()) {
        Some(bytes) => bytes.to_vec(),
        None => commands::init(),
    };
    out.extend(profile.optional_command(profile::NORMAL_FONT));
    out
}

/// Line terminator from the profile, `CR LF` if absent.
pub fn line_terminator(profile: &ResolvedProfile) -> Vec<u8> {
    profile
        .lookup(profile::LINE_FEED)
        .and_then(|s| s.as_command())
        .map_or_else(commands::line_feed, <[u8]>::to_vec)
}

pub fn form_feed(profile: &ResolvedProfile) -> Vec<u8> {
    profile
        .lookup(profile::FORM_FEED)
        .and_then(|s| s.as_command())
        .map_or_else(commands::form_feed, <[u8]>::to_vec)
}

/// Toggle bytes for a font attribute; empty when the printer lacks it.
pub fn font_toggle(profile: &ResolvedProfile, attr: FontAttribute, on: bool) -> Vec<u8> {
    let name = attr.setting_name(on);
    let bytes = profile.optional_command(name);
    if bytes.is_empty() {
        tracing::debug!(printer = profile.printer_id(), setting = name, "font attribute not supported");
    }
    bytes
}

/// Fail with `UnsupportedSymbology` if the profile's `Symbologies` list
/// does not name `symbology`. Profiles without the list accept both.
pub fn check_symbology(profile: &ResolvedProfile, symbology: Symbology) -> Result<()> {
    let Some(list) = profile.text(profile::SYMBOLOGIES) else {
        return Ok(());
    };

    let supported = list
        .split(',')
        .filter_map(|name| name.parse::<Symbology>().ok())
        .any(|s| s == symbology);

    if supported {
        Ok(())
    } else {
        Err(EtiquetaError::UnsupportedSymbology(format!(
            "{} (printer {} supports {})",
            symbology,
            profile.printer_id(),
            list
        )))
    }
}

pub fn encode_barcode(
    profile: &ResolvedProfile,
    symbology: Symbology,
    data: &str,
    height_dots: u16,
    x_offset_dots: u16,
) -> Result<Vec<u8>> {
    check_symbology(profile, symbology)?;
    barcode::validate(symbology, data)?;
    Ok(barcode::barcode(
        symbology,
        data.as_bytes(),
        height_dots,
        x_offset_dots,
    ))
}

/// Printhead width in dots from the profile.
pub fn printhead_width(profile: &ResolvedProfile) -> u16 {
    let width = profile.int_or(profile::PRINTHEAD_WIDTH, i64::from(DEFAULT_PRINTHEAD_WIDTH));
    u16::try_from(width)
        .ok()
        .filter(|&w| w > 0)
        .unwrap_or(DEFAULT_PRINTHEAD_WIDTH)
}

pub fn encode_graphic(
    profile: &ResolvedProfile,
    encoded: &[u8],
    placement: Placement,
) -> Result<Vec<u8>> {
    if !profile.bool_or(profile::GRAPHICS, true) {
        return Err(EtiquetaError::Graphic(format!(
            "printer {} does not print graphics",
            profile.printer_id()
        )));
    }

    let bitmap = graphics::rasterize(encoded, placement, printhead_width(profile))?;
    tracing::debug!(
        width = bitmap.width_dots,
        height = bitmap.height,
        rotation = placement.rotation.degrees(),
        "graphic rasterized"
    );
    Ok(bitmap.to_raster_commands())
}

/// Rotation from a degree count, failing with `Graphic` for non-right angles.
pub fn rotation(degrees: i32) -> Result<Rotation> {
    Rotation::from_degrees(degrees)
        .ok_or_else(|| EtiquetaError::Graphic(format!("unsupported rotation {}", degrees)))
}

// ============================================================================
// TESTS
// ============================================================================
