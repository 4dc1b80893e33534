//! Domain layer: the normalized event record and its enum tags.
//!
//! This module contains the server-side domain model: event identity,
//! the source and category tags, the severity scale, and the event record
//! in both its adapter-draft and fully materialized forms.

pub mod event;
pub mod event_id;
pub mod kind;
pub mod level;
pub mod source;

pub use event::{Event, NewEvent};
pub use event_id::EventId;
pub use kind::EventKind;
pub use level::Level;
pub use source::SourceId;
