//! # Progress Events
//!
//! Print job lifecycle notifications.
//!
//! A session publishes, per document:
//!
//! ```text
//! StartDoc ─► EndDoc ─► Complete | Cancel
//! ```
//!
//! and `Finished` whenever the connection closes. Complete and Cancel never
//! both appear for the same document.
//!
//! ## Example
//!
//! ```
//! use etiqueta::events::{ProgressEvent, ProgressEventBus, ProgressKind};
//!
//! let bus = ProgressEventBus::new();
//! let id = bus.subscribe_fn(|event| println!("{}", event));
//!
//! bus.publish(&ProgressEvent::new(ProgressKind::Finished, None, 0)).unwrap();
//! assert!(bus.unsubscribe(id));
//! ```

mod bus;
mod event;

pub use bus::{ListenerError, ProgressEventBus, ProgressListener, PublishError, SubscriptionId};
pub use event::{JobId, ProgressEvent, ProgressKind};
