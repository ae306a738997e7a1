//! # AT90CAN controller HAL
//!
//! Driver for the on-chip CAN controller of AVR microcontrollers that carry
//! it. The controller owns 15 independent message objects, each a complete
//! send/receive/filter unit with its own identifier, acceptance mask and
//! eight-byte buffer, reachable through a paged register window. The driver
//! configures the controller, manages the objects and dispatches the single
//! multiplexed interrupt to per-object callbacks.
//!
//! ## Overview
//!
//! * [`bus::Can`] is the driver value: construction resets the controller,
//!   programs a [`config::Bitrate`] preset and starts bus operation.
//! * [`mob`] holds the per-object descriptors; objects are configured with
//!   [`bus::Can::configure`] and armed with the mode-specific calls.
//! * [`interrupt`] is the dispatch half; the firmware's CAN vector calls
//!   [`bus::Can::interrupt`].
//!
//! Integration with a concrete chip crate goes through the
//! [`CanId`](at90can_core::CanId) and
//! [`Dependencies`](at90can_core::Dependencies) traits from the companion
//! `at90can-core` crate, re-exported here as [`core`].
//!
//! ## Example
//!
//! ```no_run
//! use at90can::bus::Can;
//! use at90can::config::Bitrate;
//! use at90can::embedded_can::{Id, StandardId};
//! use at90can::filter::MobId;
//! use at90can::mob::{FrameKind, MobConfig, MobIndex, Mode};
//!
//! enum Can0 {}
//!
//! unsafe impl at90can::core::CanId for Can0 {
//!     fn address() -> *const () {
//!         0xD8 as *const ()
//!     }
//! }
//!
//! struct Board;
//!
//! unsafe impl at90can::core::Dependencies<Can0> for Board {
//!     fn can_clock(&self) -> at90can::core::fugit::HertzU32 {
//!         at90can::core::fugit::HertzU32::MHz(16)
//!     }
//! }
//!
//! fn on_frame(index: MobIndex, id: Id, kind: FrameKind) {
//!     // runs in interrupt context
//! }
//!
//! let mut can = Can::<Can0, _>::new(Bitrate::Kbps500, Board).unwrap();
//! let mut rx = MobConfig::new(
//!     Mode::Receive,
//!     MobId::Standard {
//!         id: StandardId::new(0x71).unwrap(),
//!         mask: StandardId::new(0xF0).unwrap(),
//!     },
//! );
//! rx.on_receive = Some(on_frame);
//! can.configure(MobIndex::new(0).unwrap(), rx);
//! // ... and from the CAN interrupt vector:
//! can.interrupt();
//! ```
#![no_std]
#![warn(missing_docs)]

pub mod bus;
pub mod config;
pub mod filter;
pub mod interrupt;
pub mod mob;
pub mod prelude;
pub mod reg;

#[cfg(test)]
pub(crate) mod test_util;

pub use at90can_core as core;
pub use embedded_can;
