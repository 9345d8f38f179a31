//! # Labels
//!
//! Label records and the templates that turn them into printer commands.
//!
//! - [`record`]: [`LabelRecord`], [`TemplateKind`], [`LabelStock`]
//! - [`render`](mod@render): the fixed per-template skeletons

pub mod record;
pub mod render;

pub use record::{LabelRecord, LabelStock, TemplateKind};
pub use render::render;
