//! # Label Rendering
//!
//! Expands a [`LabelRecord`] into rendered commands using a fixed skeleton
//! per template kind.
//!
//! ## Skeletons
//!
//! | Template | Slots, in order |
//! |----------|-----------------|
//! | StandardPrice | heading, price (double high + double wide + bold), description, barcode, graphic, line advance |
//! | FoodInfo | heading (bold), description (compressed), price (bold), barcode, graphic, line advance |
//! | Other | description, price, barcode, line advance |
//!
//! A text slot is `toggles on, text, toggles off (reversed), newline 1`.
//! Slots whose content is empty are left out entirely, toggles included.
//!
//! The line advance is `NewLine(LabelFeedLines)` on continuous stock and a
//! form feed on die-cut stock.

use super::record::{LabelRecord, LabelStock, TemplateKind};
use crate::error::Result;
use crate::ir::codegen;
use crate::ir::{GraphicSource, RenderedCommand};
use crate::printer::profile::{self, ResolvedProfile};
use crate::protocol::barcode;
use crate::protocol::graphics::{self, Placement, Rotation};
use crate::protocol::text::FontAttribute;
use crate::protocol::text::FontAttribute::{Bold, Compress, DoubleHigh, DoubleWide};

const STANDARD_PRICE_HEADING: &str = "StandardPriceHeading";
const FOOD_INFO_HEADING: &str = "FoodInfoHeading";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Heading(&'static [FontAttribute]),
    Price(&'static [FontAttribute]),
    Description(&'static [FontAttribute]),
    Barcode,
    Graphic,
    LineAdvance,
}

fn skeleton(template: TemplateKind) -> &'static [Slot] {
    match template {
        TemplateKind::StandardPrice => &[
            Slot::Heading(&[]),
            Slot::Price(&[DoubleHigh, DoubleWide, Bold]),
            Slot::Description(&[]),
            Slot::Barcode,
            Slot::Graphic,
            Slot::LineAdvance,
        ],
        TemplateKind::FoodInfo => &[
            Slot::Heading(&[Bold]),
            Slot::Description(&[Compress]),
            Slot::Price(&[Bold]),
            Slot::Barcode,
            Slot::Graphic,
            Slot::LineAdvance,
        ],
        TemplateKind::Other => &[
            Slot::Description(&[]),
            Slot::Price(&[]),
            Slot::Barcode,
            Slot::LineAdvance,
        ],
    }
}

/// Render a label record for one printer.
///
/// Nothing is sent anywhere; all validation happens here so that a label
/// that renders is a label the session can print.
///
/// ## Errors
///
/// - `UnsupportedSymbology` if the printer's `Symbologies` list lacks the
///   record's symbology
/// - `InvalidBarcodeData` if the payload does not fit the symbology
/// - `UnknownSetting` if a barcode is requested, the record has no override
///   and the profile has no `DefaultBarcodeHeight` / `DefaultBarcodeXOffset`
/// - `Graphic` if the logo cannot be read or decoded
///
/// ```
/// use etiqueta::label::{self, LabelRecord, TemplateKind};
/// use etiqueta::ir::RenderedCommand;
/// use etiqueta::printer::CommandProfile;
///
/// let pr2 = CommandProfile::builtin()?.resolve("PR2")?;
/// let record = LabelRecord::new(TemplateKind::Other).description("Apple 1kg");
///
/// let cmds = label::render(&record, &pr2)?;
/// assert_eq!(cmds[0], RenderedCommand::text("Apple 1kg"));
/// # Ok::<(), etiqueta::EtiquetaError>(())
/// ```
pub fn render(record: &LabelRecord, profile: &ResolvedProfile) -> Result<Vec<RenderedCommand>> {
    codegen::check_symbology(profile, record.barcode_type)?;

    let mut out = Vec::new();
    for slot in skeleton(record.template) {
        match *slot {
            Slot::Heading(attrs) => {
                if let Some(heading) = heading_for(record.template, profile) {
                    text_slot(&mut out, heading, attrs);
                }
            }
            Slot::Price(attrs) => text_slot(&mut out, &record.item_price, attrs),
            Slot::Description(attrs) => text_slot(&mut out, &record.item_description, attrs),
            Slot::Barcode => barcode_slot(&mut out, record, profile)?,
            Slot::Graphic => graphic_slot(&mut out, record, profile)?,
            Slot::LineAdvance => out.push(line_advance(record.stock, profile)),
        }
    }

    tracing::debug!(
        template = %record.template,
        printer = profile.printer_id(),
        commands = out.len(),
        "label rendered"
    );
    Ok(out)
}

fn heading_for(template: TemplateKind, profile: &ResolvedProfile) -> Option<&str> {
    match template {
        TemplateKind::StandardPrice => profile.text(STANDARD_PRICE_HEADING),
        TemplateKind::FoodInfo => profile.text(FOOD_INFO_HEADING),
        TemplateKind::Other => None,
    }
}

fn text_slot(out: &mut Vec<RenderedCommand>, text: &str, attrs: &[FontAttribute]) {
    let text = text.trim();
    if text.is_empty() {
        return;
    }

    out.extend(attrs.iter().map(|&a| RenderedCommand::FontToggle(a, true)));
    out.push(RenderedCommand::text(text));
    out.extend(attrs.iter().rev().map(|&a| RenderedCommand::FontToggle(a, false)));
    out.push(RenderedCommand::NewLine(1));
}

fn barcode_slot(
    out: &mut Vec<RenderedCommand>,
    record: &LabelRecord,
    profile: &ResolvedProfile,
) -> Result<()> {
    let data = record.barcode_value.trim();
    if data.is_empty() {
        return Ok(());
    }
    barcode::validate(record.barcode_type, data)?;

    let mut height = match record.barcode_height {
        Some(h) => h,
        None => dots(profile.int(profile::DEFAULT_BARCODE_HEIGHT)?),
    };
    if let Some(max) = record.stock.max_barcode_height() {
        height = height.min(max);
    }
    let x_offset = match record.barcode_x_offset {
        Some(x) => x,
        None => dots(profile.int(profile::DEFAULT_BARCODE_X_OFFSET)?),
    };

    out.push(RenderedCommand::Barcode {
        symbology: record.barcode_type,
        data: data.to_string(),
        height_dots: height,
        x_offset_dots: x_offset,
    });
    Ok(())
}

fn graphic_slot(
    out: &mut Vec<RenderedCommand>,
    record: &LabelRecord,
    profile: &ResolvedProfile,
) -> Result<()> {
    let Some(source) = &record.logo else {
        return Ok(());
    };
    if !profile.bool_or(profile::GRAPHICS, true) {
        tracing::debug!(printer = profile.printer_id(), "graphics disabled, logo skipped");
        return Ok(());
    }

    let head = codegen::printhead_width(profile);
    let width = dots(profile.int_or(profile::LOGO_WIDTH, 0)).min(head);
    let x_offset = if width == 0 { 0 } else { (head - width) / 2 };
    let placement = Placement {
        rotation: Rotation::Deg0,
        x_offset,
        width,
        height: 0,
    };

    // loaded once; the session prints these bytes, not the file
    let encoded = source.load()?;
    graphics::rasterize(&encoded, placement, head)?;

    out.push(RenderedCommand::Graphic {
        source: GraphicSource::Bytes(encoded),
        rotation: placement.rotation,
        x_offset_dots: x_offset,
        width_dots: width,
        height_dots: 0,
    });
    Ok(())
}

fn line_advance(stock: LabelStock, profile: &ResolvedProfile) -> RenderedCommand {
    match stock {
        LabelStock::Continuous => {
            RenderedCommand::NewLine(dots(profile.int_or(profile::LABEL_FEED_LINES, 1)))
        }
        LabelStock::Die50x30 => RenderedCommand::FormFeed,
    }
}

/// Clamp a profile integer to a dot count.
fn dots(value: i64) -> u16 {
    value.clamp(0, i64::from(u16::MAX)) as u16
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EtiquetaError;
    use crate::printer::CommandProfile;
    use crate::protocol::barcode::Symbology;
    use pretty_assertions::assert_eq;
    use crate::ir::RenderedCommand::{FontToggle, NewLine};

    fn pr2() -> ResolvedProfile {
        CommandProfile::builtin().unwrap().resolve("PR2").unwrap()
    }

    fn logo_png() -> Vec<u8> {
        use image::{ImageFormat, Rgba, RgbaImage};

        let mut png = Vec::new();
        RgbaImage::from_pixel(8, 2, Rgba([0, 0, 0, 255]))
            .write_to(&mut std::io::Cursor::new(&mut png), ImageFormat::Png)
            .unwrap();
        png
    }

    fn full(template: TemplateKind) -> LabelRecord {
        LabelRecord::new(template)
            .price("$4.99")
            .description("Apple 1kg")
            .barcode(Symbology::Code128, "12345")
    }

    fn barcode(height: u16, x: u16) -> RenderedCommand {
        RenderedCommand::Barcode {
            symbology: Symbology::Code128,
            data: "12345".into(),
            height_dots: height,
            x_offset_dots: x,
        }
    }

    #[test]
    fn test_standard_price_skeleton() {
        let cmds = render(&full(TemplateKind::StandardPrice), &pr2()).unwrap();
        assert_eq!(
            cmds,
            vec![
                RenderedCommand::text("PRICE"),
                NewLine(1),
                FontToggle(DoubleHigh, true),
                FontToggle(DoubleWide, true),
                FontToggle(Bold, true),
                RenderedCommand::text("$4.99"),
                FontToggle(Bold, false),
                FontToggle(DoubleWide, false),
                FontToggle(DoubleHigh, false),
                NewLine(1),
                RenderedCommand::text("Apple 1kg"),
                NewLine(1),
                barcode(50, 0),
                NewLine(3),
            ]
        );
    }

    #[test]
    fn test_food_info_skeleton() {
        let cmds = render(&full(TemplateKind::FoodInfo), &pr2()).unwrap();
        assert_eq!(
            cmds,
            vec![
                FontToggle(Bold, true),
                RenderedCommand::text("FOOD INFO"),
                FontToggle(Bold, false),
                NewLine(1),
                FontToggle(Compress, true),
                RenderedCommand::text("Apple 1kg"),
                FontToggle(Compress, false),
                NewLine(1),
                FontToggle(Bold, true),
                RenderedCommand::text("$4.99"),
                FontToggle(Bold, false),
                NewLine(1),
                barcode(50, 0),
                NewLine(3),
            ]
        );
    }

    #[test]
    fn test_other_skeleton() {
        let cmds = render(&full(TemplateKind::Other), &pr2()).unwrap();
        assert_eq!(
            cmds,
            vec![
                RenderedCommand::text("Apple 1kg"),
                NewLine(1),
                RenderedCommand::text("$4.99"),
                NewLine(1),
                barcode(50, 0),
                NewLine(3),
            ]
        );
    }

    #[test]
    fn test_empty_fields_omit_slots_and_toggles() {
        let record = LabelRecord::new(TemplateKind::StandardPrice).price("   ");
        let mut profile = pr2();
        profile.set_text(STANDARD_PRICE_HEADING, "");

        let cmds = render(&record, &profile).unwrap();
        assert_eq!(cmds, vec![NewLine(3)]);
    }

    #[test]
    fn test_no_empty_text_commands() {
        for template in TemplateKind::ALL {
            let record = LabelRecord::new(template).description("x");
            for cmd in render(&record, &pr2()).unwrap() {
                if let RenderedCommand::Text(s) = cmd {
                    assert!(!s.trim().is_empty());
                }
            }
        }
    }

    #[test]
    fn test_die_cut_stock_caps_barcode_and_form_feeds() {
        let record = full(TemplateKind::Other).stock(LabelStock::Die50x30);
        let pr3 = CommandProfile::builtin().unwrap().resolve("PR3").unwrap();
        let cmds = render(&record, &pr3).unwrap();

        assert_eq!(cmds[cmds.len() - 2], barcode(40, 16));
        assert_eq!(cmds[cmds.len() - 1], RenderedCommand::FormFeed);
    }

    #[test]
    fn test_record_overrides_barcode_defaults() {
        let record = full(TemplateKind::Other).barcode_height(20).barcode_x_offset(100);
        let cmds = render(&record, &pr2()).unwrap();
        assert!(cmds.contains(&barcode(20, 100)));
    }

    #[test]
    fn test_missing_barcode_default_is_unknown_setting() {
        let profile = ResolvedProfile::new("BARE");
        let err = render(&full(TemplateKind::Other), &profile).unwrap_err();
        assert!(matches!(err, EtiquetaError::UnknownSetting(name) if name == "DefaultBarcodeHeight"));

        // Overrides make the defaults unnecessary
        let record = full(TemplateKind::Other).barcode_height(30).barcode_x_offset(0);
        assert!(render(&record, &profile).is_ok());
    }

    #[test]
    fn test_unsupported_symbology() {
        let mut profile = pr2();
        profile.set_text(profile::SYMBOLOGIES, "CODE39");
        let err = render(&full(TemplateKind::Other), &profile).unwrap_err();
        assert!(matches!(err, EtiquetaError::UnsupportedSymbology(_)));
    }

    #[test]
    fn test_invalid_barcode_data() {
        let record = full(TemplateKind::Other).barcode(Symbology::Code39, "lower@case");
        let err = render(&record, &pr2()).unwrap_err();
        assert!(matches!(err, EtiquetaError::InvalidBarcodeData { .. }));
    }

    #[test]
    fn test_logo_slot_centered() {
        let record = full(TemplateKind::StandardPrice).logo(GraphicSource::Bytes(logo_png()));
        let cmds = render(&record, &pr2()).unwrap();
        let graphic = cmds
            .iter()
            .find(|c| matches!(c, RenderedCommand::Graphic { .. }))
            .unwrap();

        assert_eq!(
            graphic,
            &RenderedCommand::Graphic {
                source: GraphicSource::Bytes(logo_png()),
                rotation: Rotation::Deg0,
                x_offset_dots: 92,
                width_dots: 200,
                height_dots: 0,
            }
        );
        // graphic sits between the barcode and the line advance
        let n = cmds.len();
        assert!(matches!(cmds[n - 3], RenderedCommand::Barcode { .. }));
        assert!(matches!(cmds[n - 1], NewLine(3)));
    }

    #[test]
    fn test_other_template_has_no_graphic_slot() {
        let record = full(TemplateKind::Other).logo(GraphicSource::Bytes(vec![1]));
        let cmds = render(&record, &pr2()).unwrap();
        assert!(!cmds.iter().any(|c| matches!(c, RenderedCommand::Graphic { .. })));
    }

    #[test]
    fn test_logo_loaded_at_render() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logo.png");
        std::fs::write(&path, logo_png()).unwrap();

        let record = full(TemplateKind::FoodInfo).logo(GraphicSource::Path(path.clone()));
        let cmds = render(&record, &pr2()).unwrap();
        std::fs::remove_file(&path).unwrap();

        let source = cmds.iter().find_map(|c| match c {
            RenderedCommand::Graphic { source, .. } => Some(source),
            _ => None,
        });
        assert_eq!(source, Some(&GraphicSource::Bytes(logo_png())));
        assert!(codegen::to_bytes(&cmds, &pr2()).is_ok());
    }

    #[test]
    fn test_undecodable_logo_fails_render() {
        let record = full(TemplateKind::StandardPrice)
            .logo(GraphicSource::Bytes(b"not an image".to_vec()));
        assert!(matches!(render(&record, &pr2()), Err(EtiquetaError::Graphic(_))));

        let record = full(TemplateKind::StandardPrice)
            .logo(GraphicSource::Path("/no/such/logo.png".into()));
        assert!(matches!(render(&record, &pr2()), Err(EtiquetaError::Graphic(_))));
    }
}
