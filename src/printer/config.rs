//! # Session Configuration
//!
//! Connection-level knobs that are not part of the printer's command profile.
//! A [`SessionConfig`] is handed to every session explicitly; there is no
//! process-wide settings object.
//!
//! ## Usage
//!
//! ```
//! use etiqueta::printer::{CommandProfile, SessionConfig};
//!
//! let pr2 = CommandProfile::builtin()?.resolve("PR2")?;
//! let config = SessionConfig::default();
//!
//! // The PR2 profile declares a 1024 byte buffer
//! assert_eq!(config.buffer_capacity_for(&pr2), 1024);
//! # Ok::<(), etiqueta::EtiquetaError>(())
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::profile::{self, ResolvedProfile};
use crate::error::{EtiquetaError, Result};

/// Buffer capacity used when neither config nor profile specify one
pub const DEFAULT_BUFFER_CAPACITY: usize = 4096;

/// Default TCP connect timeout (milliseconds)
const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;

/// Default chunk size for accessory stream writes (bytes)
const DEFAULT_WRITE_CHUNK_SIZE: usize = 4096;

/// # Session Configuration
///
/// | Field | Default | Meaning |
/// |-------|---------|---------|
/// | `buffer_capacity` | profile `BufferSize`, else 4096 | bytes held before an automatic flush |
/// | `connect_timeout_ms` | 10000 | TCP connect timeout |
/// | `write_chunk_size` | 4096 | max bytes per accessory write |
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Overrides the profile's `BufferSize` when set
    pub buffer_capacity: Option<usize>,

    /// TCP connect timeout in milliseconds
    pub connect_timeout_ms: u64,

    /// Maximum bytes per write on accessory streams
    pub write_chunk_size: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: None,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            write_chunk_size: DEFAULT_WRITE_CHUNK_SIZE,
        }
    }
}

impl SessionConfig {
    /// Read a JSON config file. Missing fields take their defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(|e| {
            EtiquetaError::Unexpected(format!("invalid config {}: {}", path.display(), e))
        })
    }

    /// Effective buffer capacity for a printer. Never zero.
    pub fn buffer_capacity_for(&self, profile: &ResolvedProfile) -> usize {
        let capacity = match self.buffer_capacity {
            Some(capacity) => capacity,
            None => usize::try_from(profile.int_or(profile::BUFFER_SIZE, 0))
                .ok()
                .filter(|&n| n > 0)
                .unwrap_or(DEFAULT_BUFFER_CAPACITY),
        };
        capacity.max(1)
    }

    #[inline]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.buffer_capacity, None);
        assert_eq!(config.connect_timeout(), Duration::from_secs(10));
        assert_eq!(config.write_chunk_size, 4096);
    }

    #[test]
    fn test_capacity_precedence() {
        let mut profile = ResolvedProfile::new("X");
        let config = SessionConfig::default();
        assert_eq!(config.buffer_capacity_for(&profile), DEFAULT_BUFFER_CAPACITY);

        profile.set_int(profile::BUFFER_SIZE, 512);
        assert_eq!(config.buffer_capacity_for(&profile), 512);

        let config = SessionConfig {
            buffer_capacity: Some(64),
            ..Default::default()
        };
        assert_eq!(config.buffer_capacity_for(&profile), 64);
    }

    #[test]
    fn test_capacity_never_zero() {
        let config = SessionConfig {
            buffer_capacity: Some(0),
            ..Default::default()
        };
        assert_eq!(config.buffer_capacity_for(&ResolvedProfile::new("X")), 1);

        let mut profile = ResolvedProfile::new("X");
        profile.set_int(profile::BUFFER_SIZE, -3);
        assert_eq!(
            SessionConfig::default().buffer_capacity_for(&profile),
            DEFAULT_BUFFER_CAPACITY
        );
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(br#"{ "buffer_capacity": 256 }"#).unwrap();

        let config = SessionConfig::load(file.path()).unwrap();
        assert_eq!(config.buffer_capacity, Some(256));
        assert_eq!(config.connect_timeout_ms, DEFAULT_CONNECT_TIMEOUT_MS);
    }
}
