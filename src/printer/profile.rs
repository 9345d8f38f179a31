//! # Command Profile
//!
//! The command profile holds printer-specific command definitions and
//! defaults, grouped into one section per printer identifier.
//!
//! ## Source Format
//!
//! A JSON object whose keys are printer identifiers and whose values are
//! objects of settings (see [`Setting`] for the value types):
//!
//! ```json
//! {
//!   "PR2": {
//!     "Initialize": [27, 64],
//!     "BoldOn": [27, 69],
//!     "PrintheadWidth": 384,
//!     "LineFeed": "\r\n"
//!   }
//! }
//! ```
//!
//! ## Usage
//!
//! ```
//! use etiqueta::printer::{CommandProfile, Setting};
//!
//! let profile = CommandProfile::builtin()?;
//! let mut pr2 = profile.resolve("PR2")?;
//!
//! // Overrides replace the prior value; the loaded profile is untouched.
//! pr2.set_int("DefaultBarcodeHeight", 80);
//! assert_eq!(pr2.get("DefaultBarcodeHeight")?, &Setting::Int(80));
//! # Ok::<(), etiqueta::EtiquetaError>(())
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use super::setting::Setting;
use crate::error::{EtiquetaError, Result};

/// Profile shipped with the crate.
const BUILTIN_PROFILE: &str = include_str!("../../profiles/printer_profiles.json");

// ============================================================================
// WELL-KNOWN SETTING NAMES
// ============================================================================

pub const INITIALIZE: &str = "Initialize";
pub const NORMAL_FONT: &str = "NormalFont";
pub const LINE_FEED: &str = "LineFeed";
pub const FORM_FEED: &str = "FormFeed";
pub const PRINTHEAD_WIDTH: &str = "PrintheadWidth";
pub const BUFFER_SIZE: &str = "BufferSize";
pub const GRAPHICS: &str = "Graphics";
pub const DEFAULT_BARCODE_HEIGHT: &str = "DefaultBarcodeHeight";
pub const DEFAULT_BARCODE_X_OFFSET: &str = "DefaultBarcodeXOffset";
pub const SYMBOLOGIES: &str = "Symbologies";
pub const LOGO_WIDTH: &str = "LogoWidth";
pub const LABEL_FEED_LINES: &str = "LabelFeedLines";

/// Loaded command/attribute definitions for every printer identifier.
#[derive(Debug, Clone)]
pub struct CommandProfile {
    source: String,
    sections: BTreeMap<String, BTreeMap<String, Setting>>,
}

impl CommandProfile {
    /// Load a profile from a file path or inline JSON text.
    ///
    /// Text whose first non-blank character is `{` is parsed as JSON;
    /// anything else is treated as a path.
    ///
    /// ## Errors
    ///
    /// [`EtiquetaError::InvalidAttributeFile`] if the file is missing, the
    /// JSON is malformed or holds an unsupported value, or no printer section
    /// is defined.
    pub fn load(source: &str) -> Result<Self> {
        if source.trim_start().starts_with('{') {
            return Self::from_json(source, "<inline>");
        }

        let path = Path::new(source);
        let text = fs::read_to_string(path).map_err(|e| {
            EtiquetaError::InvalidAttributeFile(format!("{}: {}", path.display(), e))
        })?;
        Self::from_json(&text, &path.display().to_string())
    }

    /// The profile embedded in the crate (`PR2`, `PR3`).
    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN_PROFILE, "<builtin>")
    }

    fn from_json(text: &str, source: &str) -> Result<Self> {
        let sections: BTreeMap<String, BTreeMap<String, Setting>> = serde_json::from_str(text)
            .map_err(|e| EtiquetaError::InvalidAttributeFile(format!("{}: {}", source, e)))?;

        if sections.is_empty() {
            return Err(EtiquetaError::InvalidAttributeFile(format!(
                "{}: no printer sections defined",
                source
            )));
        }
        if sections.keys().any(|id| id.trim().is_empty()) {
            return Err(EtiquetaError::InvalidAttributeFile(format!(
                "{}: empty printer identifier",
                source
            )));
        }

        tracing::debug!(source, printers = sections.len(), "loaded command profile");
        Ok(Self {
            source: source.to_string(),
            sections,
        })
    }

    /// Where this profile was loaded from (path, `<inline>` or `<builtin>`).
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Printer identifiers defined in this profile, sorted.
    pub fn printer_ids(&self) -> Vec<&str> {
        self.sections.keys().map(String::as_str).collect()
    }

    /// Select the settings of one printer identifier.
    pub fn resolve(&self, printer_id: &str) -> Result<ResolvedProfile> {
        let section = self
            .sections
            .get(printer_id)
            .ok_or_else(|| EtiquetaError::InvalidPrinterId(printer_id.to_string()))?;

        Ok(ResolvedProfile {
            printer_id: printer_id.to_string(),
            settings: section
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        })
    }
}

/// Settings of a single printer, owned by one session or renderer.
///
/// This is a copy of the loaded section; [`set`](Self::set) only affects
/// this copy.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedProfile {
    printer_id: String,
    settings: HashMap<String, Setting>,
}

impl ResolvedProfile {
    /// Build a resolved profile directly (mostly useful in tests).
    pub fn new(printer_id: impl Into<String>) -> Self {
        Self {
            printer_id: printer_id.into(),
            settings: HashMap::new(),
        }
    }

    pub fn printer_id(&self) -> &str {
        &self.printer_id
    }

    /// Look up a setting; fails with `UnknownSetting` if absent.
    pub fn get(&self, name: &str) -> Result<&Setting> {
        self.settings
            .get(name)
            .ok_or_else(|| EtiquetaError::UnknownSetting(name.to_string()))
    }

    /// Look up a setting that is allowed to be absent.
    pub fn lookup(&self, name: &str) -> Option<&Setting> {
        self.settings.get(name)
    }

    /// Insert or replace a setting.
    pub fn set(&mut self, name: impl Into<String>, value: Setting) {
        let name = name.into();
        if let Some(previous) = self.settings.insert(name.clone(), value) {
            tracing::trace!(setting = %name, previous = previous.type_name(), "setting overridden");
        }
    }

    pub fn set_bool(&mut self, name: impl Into<String>, value: bool) {
        self.set(name, Setting::Bool(value));
    }

    pub fn set_int(&mut self, name: impl Into<String>, value: i64) {
        self.set(name, Setting::Int(value));
    }

    pub fn set_text(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.set(name, Setting::Text(value.into()));
    }

    /// Store a raw byte command. The slice length is the command length.
    pub fn set_bytes(&mut self, name: impl Into<String>, value: &[u8]) {
        self.set(name, Setting::Bytes(value.to_vec()));
    }

    /// Integer setting; `UnknownSetting` if absent, `InvalidSetting` if not an int.
    pub fn int(&self, name: &str) -> Result<i64> {
        let setting = self.get(name)?;
        setting
            .as_int()
            .ok_or_else(|| wrong_type(name, "int", setting))
    }

    /// Integer setting with a fallback for absent (or mistyped) values.
    pub fn int_or(&self, name: &str, default: i64) -> i64 {
        self.lookup(name).and_then(Setting::as_int).unwrap_or(default)
    }

    /// Boolean setting with a fallback for absent (or mistyped) values.
    pub fn bool_or(&self, name: &str, default: bool) -> bool {
        self.lookup(name).and_then(Setting::as_bool).unwrap_or(default)
    }

    /// Optional text setting; `None` when absent, not text, or blank.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.lookup(name)
            .and_then(Setting::as_text)
            .filter(|s| !s.trim().is_empty())
    }

    /// Bytes of a command-valued (text or bytes) setting.
    pub fn command_bytes(&self, name: &str) -> Result<Vec<u8>> {
        let setting = self.get(name)?;
        setting
            .as_command()
            .map(<[u8]>::to_vec)
            .ok_or_else(|| wrong_type(name, "text or bytes", setting))
    }

    /// Bytes of an optional command; printers lacking it get an empty command.
    pub fn optional_command(&self, name: &str) -> Vec<u8> {
        self.lookup(name)
            .and_then(Setting::as_command)
            .map(<[u8]>::to_vec)
            .unwrap_or_default()
    }
}

fn wrong_type(name: &str, expected: &str, found: &Setting) -> EtiquetaError {
    EtiquetaError::InvalidSetting {
        name: name.to_string(),
        reason: format!("expected {}, found {}", expected, found.type_name()),
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const INLINE: &str = r#"{
        "PX1": { "Initialize": [27, 64], "PrintheadWidth": 384, "Slogan": "Save Time" }
    }"#;

    #[test]
    fn test_builtin_has_pr2_and_pr3() {
        let profile = CommandProfile::builtin().unwrap();
        assert_eq!(profile.printer_ids(), vec!["PR2", "PR3"]);
        assert_eq!(profile.source(), "<builtin>");
    }

    #[test]
    fn test_load_inline() {
        let profile = CommandProfile::load(INLINE).unwrap();
        let px1 = profile.resolve("PX1").unwrap();
        assert_eq!(px1.int(PRINTHEAD_WIDTH).unwrap(), 384);
        assert_eq!(px1.command_bytes(INITIALIZE).unwrap(), vec![0x1B, 0x40]);
        assert_eq!(px1.command_bytes("Slogan").unwrap(), b"Save Time".to_vec());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(INLINE.as_bytes()).unwrap();

        let profile = CommandProfile::load(file.path().to_str().unwrap()).unwrap();
        assert_eq!(profile.printer_ids(), vec!["PX1"]);
    }

    #[test]
    fn test_missing_file_is_invalid_attribute_file() {
        let err = CommandProfile::load("/nonexistent/printer_profiles.json").unwrap_err();
        assert!(matches!(err, EtiquetaError::InvalidAttributeFile(_)));
    }

    #[test]
    fn test_malformed_and_empty_sources() {
        for source in ["{ not json", "{}", r#"{"PR2": {"BoldOn": [999]}}"#, r#"{"PR2": 5}"#] {
            let err = CommandProfile::load(source).unwrap_err();
            assert!(
                matches!(err, EtiquetaError::InvalidAttributeFile(_)),
                "{source} gave {err:?}"
            );
        }
    }

    #[test]
    fn test_resolve_unknown_printer() {
        let profile = CommandProfile::load(INLINE).unwrap();
        let err = profile.resolve("PR9").unwrap_err();
        assert!(matches!(err, EtiquetaError::InvalidPrinterId(id) if id == "PR9"));
    }

    #[test]
    fn test_get_unknown_setting() {
        let px1 = CommandProfile::load(INLINE).unwrap().resolve("PX1").unwrap();
        assert!(matches!(px1.get("Nope"), Err(EtiquetaError::UnknownSetting(_))));
        assert!(px1.lookup("Nope").is_none());
    }

    #[test]
    fn test_set_overrides_previous_value() {
        let profile = CommandProfile::load(INLINE).unwrap();
        let mut px1 = profile.resolve("PX1").unwrap();

        px1.set_int(PRINTHEAD_WIDTH, 576);
        assert_eq!(px1.get(PRINTHEAD_WIDTH).unwrap(), &Setting::Int(576));

        // Type may change on overwrite
        px1.set_text(PRINTHEAD_WIDTH, "wide");
        assert_eq!(px1.get(PRINTHEAD_WIDTH).unwrap(), &Setting::Text("wide".into()));

        // The loaded profile keeps its original value
        let fresh = profile.resolve("PX1").unwrap();
        assert_eq!(fresh.int(PRINTHEAD_WIDTH).unwrap(), 384);
    }

    #[test]
    fn test_set_bytes_and_bool() {
        let mut p = ResolvedProfile::new("X");
        p.set_bytes("MyCommand", &[0x42, 0x43, 0x0D]);
        p.set_bool("Graphics", false);
        assert_eq!(p.command_bytes("MyCommand").unwrap(), vec![0x42, 0x43, 0x0D]);
        assert!(!p.bool_or("Graphics", true));
    }

    #[test]
    fn test_wrong_type_is_invalid_setting() {
        let px1 = CommandProfile::load(INLINE).unwrap().resolve("PX1").unwrap();
        assert!(matches!(
            px1.command_bytes(PRINTHEAD_WIDTH),
            Err(EtiquetaError::InvalidSetting { .. })
        ));
        assert!(matches!(px1.int("Slogan"), Err(EtiquetaError::InvalidSetting { .. })));
    }

    #[test]
    fn test_fallbacks() {
        let p = ResolvedProfile::new("X");
        assert_eq!(p.int_or(BUFFER_SIZE, 4096), 4096);
        assert!(p.optional_command("BoldOn").is_empty());
        assert_eq!(p.text("StandardPriceHeading"), None);
    }
}
