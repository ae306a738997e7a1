//! Convenience re-exports for the common driver vocabulary

pub use crate::bus::Can;
pub use crate::config::Bitrate;
pub use crate::core::{CanId, Dependencies};
pub use crate::filter::MobId;
pub use crate::mob::{FrameKind, MobConfig, MobIndex, Mode};
pub use embedded_can::{ExtendedId, Id, StandardId};
