//! # Printer Module
//!
//! Printer-specific data: command profiles and session configuration.
//!
//! ## Modules
//!
//! - [`profile`]: Command/attribute definitions keyed by printer identifier
//! - [`setting`]: Typed setting values
//! - [`config`]: Session configuration (buffer size, timeouts)

pub mod config;
pub mod profile;
pub mod setting;

pub use config::SessionConfig;
pub use profile::{CommandProfile, ResolvedProfile};
pub use setting::Setting;
