//! In-memory register blocks and stub dependencies for host tests.
//!
//! Each test declares its own marker type and backing storage with
//! [`mock_can!`], so tests can run in parallel without sharing register
//! state. The mock is plain memory: it does not emulate the message data
//! auto-increment, write-one-to-clear flags or paging, so tests assert on
//! the raw cell contents instead.

use crate::reg::RegisterBlock;
use at90can_core::{CanId, Dependencies};
use fugit::HertzU32;

/// A register block that can back a `static`. Register cells are not `Sync`;
/// in tests each block is only touched from its own test thread.
pub(crate) struct SharedRegs(pub RegisterBlock);

unsafe impl Sync for SharedRegs {}

impl SharedRegs {
    pub const fn new() -> Self {
        Self(RegisterBlock::new())
    }
}

/// Dependencies stub reporting the clock the timing table is built for.
pub(crate) struct SixteenMhz;

unsafe impl<Id: CanId> Dependencies<Id> for SixteenMhz {
    fn can_clock(&self) -> HertzU32 {
        HertzU32::MHz(16)
    }
}

/// Dependencies stub reporting a clock no preset supports.
pub(crate) struct WrongClock;

unsafe impl<Id: CanId> Dependencies<Id> for WrongClock {
    fn can_clock(&self) -> HertzU32 {
        HertzU32::MHz(8)
    }
}

/// Declares a peripheral marker type backed by a fresh in-memory block.
macro_rules! mock_can {
    ($id:ident, $regs:ident) => {
        enum $id {}
        static $regs: crate::test_util::SharedRegs = crate::test_util::SharedRegs::new();
        unsafe impl at90can_core::CanId for $id {
            fn address() -> *const () {
                &$regs.0 as *const crate::reg::RegisterBlock as *const ()
            }
        }
    };
}

pub(crate) use mock_can;
