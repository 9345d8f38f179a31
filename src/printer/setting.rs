//! # Profile Settings
//!
//! A setting is one typed value inside a printer section of the command
//! profile. The JSON representation maps directly onto the variants:
//!
//! | JSON | Variant | Example |
//! |------|---------|---------|
//! | `true` / `false` | [`Setting::Bool`] | `"Graphics": true` |
//! | integer | [`Setting::Int`] | `"PrintheadWidth": 384` |
//! | string | [`Setting::Text`] | `"LineFeed": "\r\n"` |
//! | array of 0..=255 | [`Setting::Bytes`] | `"BoldOn": [27, 69]` |

use serde::{Deserialize, Serialize};

/// A typed profile value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Setting {
    Bool(bool),
    Int(i64),
    Text(String),
    Bytes(Vec<u8>),
}

impl Setting {
    /// Name of the value type, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Text(_) => "text",
            Self::Bytes(_) => "bytes",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Raw bytes to send for a command-valued setting.
    ///
    /// Text settings are sent as their UTF-8 bytes; bytes settings verbatim.
    /// Booleans and integers are not commands and return `None`.
    pub fn as_command(&self) -> Option<&[u8]> {
        match self {
            Self::Text(s) => Some(s.as_bytes()),
            Self::Bytes(b) => Some(b),
            _ => None,
        }
    }
}

impl From<bool> for Setting {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Setting {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for Setting {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Setting {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&[u8]> for Setting {
    fn from(value: &[u8]) -> Self {
        Self::Bytes(value.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_shapes_map_to_variants() {
        let parsed: Vec<Setting> =
            serde_json::from_str(r#"[true, 384, "\r\n", [27, 64]]"#).unwrap();
        assert_eq!(
            parsed,
            vec![
                Setting::Bool(true),
                Setting::Int(384),
                Setting::Text("\r\n".into()),
                Setting::Bytes(vec![0x1B, 0x40]),
            ]
        );
    }

    #[test]
    fn test_out_of_range_byte_is_rejected() {
        assert!(serde_json::from_str::<Setting>("[27, 300]").is_err());
        assert!(serde_json::from_str::<Setting>("1.5").is_err());
    }

    #[test]
    fn test_as_command() {
        assert_eq!(Setting::from("AB").as_command(), Some(&b"AB"[..]));
        assert_eq!(Setting::Bytes(vec![1, 2]).as_command(), Some(&[1u8, 2][..]));
        assert_eq!(Setting::Int(5).as_command(), None);
        assert_eq!(Setting::Bool(true).as_command(), None);
    }
}
