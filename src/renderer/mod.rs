//! GPU hand-off
//!
//! No drawing happens in this crate. Frames are packed into plain instance
//! data that any instanced-quad renderer can upload as is.

pub mod instance;

pub use instance::{InstanceRaw, SpriteTable, clear_color, instances_bytes, pack_frame};
