//! Register-level access to the CAN controller
//!
//! The controller exposes one general register group plus a single
//! object-scoped register window that is multiplexed across the 15 message
//! objects by the page-select register (CANPAGE). Everything below CANPAGE in
//! the block is controller-global; everything from CANSTMOB onwards belongs
//! to whichever object the current page selects.

use crate::mob::MobIndex;
use at90can_core::CanId;
use core::marker::PhantomData;
use core::ops::Deref;
use vcell::VolatileCell;

/// The CAN controller register block, in address order.
///
/// All registers are eight bits wide. The layout matches the controller's
/// I/O map starting at CANGCON, so a pointer to the block base is enough to
/// address every register.
#[repr(C)]
pub struct RegisterBlock {
    /// General control (software reset, enable/standby)
    pub cangcon: VolatileCell<u8>,
    /// General status
    pub cangsta: VolatileCell<u8>,
    /// General interrupt flags, cleared by writing ones
    pub cangit: VolatileCell<u8>,
    /// General interrupt enable
    pub cangie: VolatileCell<u8>,
    /// Enabled-object flags, objects 0..=7
    pub canen2: VolatileCell<u8>,
    /// Enabled-object flags, objects 8..=14
    pub canen1: VolatileCell<u8>,
    /// Per-object interrupt enable, objects 0..=7
    pub canie2: VolatileCell<u8>,
    /// Per-object interrupt enable, objects 8..=14
    pub canie1: VolatileCell<u8>,
    /// Pending-interrupt flags, objects 0..=7
    pub cansit2: VolatileCell<u8>,
    /// Pending-interrupt flags, objects 8..=14
    pub cansit1: VolatileCell<u8>,
    /// Bit timing 1 (baud rate prescaler)
    pub canbt1: VolatileCell<u8>,
    /// Bit timing 2 (propagation segment, jump width)
    pub canbt2: VolatileCell<u8>,
    /// Bit timing 3 (phase segments, sample mode)
    pub canbt3: VolatileCell<u8>,
    /// Timer control
    pub cantcon: VolatileCell<u8>,
    /// Timer, low byte
    pub cantiml: VolatileCell<u8>,
    /// Timer, high byte
    pub cantimh: VolatileCell<u8>,
    /// TTC timer, low byte
    pub canttcl: VolatileCell<u8>,
    /// TTC timer, high byte
    pub canttch: VolatileCell<u8>,
    /// Transmit error counter
    pub cantec: VolatileCell<u8>,
    /// Receive error counter
    pub canrec: VolatileCell<u8>,
    /// Highest-priority pending object, [`hpmob::NONE`] for general events
    pub canhpmob: VolatileCell<u8>,
    /// Page select; bits 7:4 choose the object whose bank the window shows
    pub canpage: VolatileCell<u8>,
    /// Status of the paged object (event and error flags)
    pub canstmob: VolatileCell<u8>,
    /// Control and DLC of the paged object
    pub cancdmob: VolatileCell<u8>,
    /// Identifier tag byte 4 of the paged object (also carries RTRTAG)
    pub canidt4: VolatileCell<u8>,
    /// Identifier tag byte 3 of the paged object
    pub canidt3: VolatileCell<u8>,
    /// Identifier tag byte 2 of the paged object
    pub canidt2: VolatileCell<u8>,
    /// Identifier tag byte 1 of the paged object (most significant bits)
    pub canidt1: VolatileCell<u8>,
    /// Identifier mask byte 4 of the paged object
    pub canidm4: VolatileCell<u8>,
    /// Identifier mask byte 3 of the paged object
    pub canidm3: VolatileCell<u8>,
    /// Identifier mask byte 2 of the paged object
    pub canidm2: VolatileCell<u8>,
    /// Identifier mask byte 1 of the paged object
    pub canidm1: VolatileCell<u8>,
    /// Timestamp of the paged object, low byte
    pub canstml: VolatileCell<u8>,
    /// Timestamp of the paged object, high byte
    pub canstmh: VolatileCell<u8>,
    /// Data window of the paged object; consecutive accesses auto-increment
    /// through the eight payload bytes
    pub canmsg: VolatileCell<u8>,
}

impl RegisterBlock {
    /// An all-zero register block.
    ///
    /// The real block lives at a fixed address and is never constructed;
    /// this exists so that test doubles can allocate one in ordinary memory.
    pub const fn new() -> Self {
        Self {
            cangcon: VolatileCell::new(0),
            cangsta: VolatileCell::new(0),
            cangit: VolatileCell::new(0),
            cangie: VolatileCell::new(0),
            canen2: VolatileCell::new(0),
            canen1: VolatileCell::new(0),
            canie2: VolatileCell::new(0),
            canie1: VolatileCell::new(0),
            cansit2: VolatileCell::new(0),
            cansit1: VolatileCell::new(0),
            canbt1: VolatileCell::new(0),
            canbt2: VolatileCell::new(0),
            canbt3: VolatileCell::new(0),
            cantcon: VolatileCell::new(0),
            cantiml: VolatileCell::new(0),
            cantimh: VolatileCell::new(0),
            canttcl: VolatileCell::new(0),
            canttch: VolatileCell::new(0),
            cantec: VolatileCell::new(0),
            canrec: VolatileCell::new(0),
            canhpmob: VolatileCell::new(0),
            canpage: VolatileCell::new(0),
            canstmob: VolatileCell::new(0),
            cancdmob: VolatileCell::new(0),
            canidt4: VolatileCell::new(0),
            canidt3: VolatileCell::new(0),
            canidt2: VolatileCell::new(0),
            canidt1: VolatileCell::new(0),
            canidm4: VolatileCell::new(0),
            canidm3: VolatileCell::new(0),
            canidm2: VolatileCell::new(0),
            canidm1: VolatileCell::new(0),
            canstml: VolatileCell::new(0),
            canstmh: VolatileCell::new(0),
            canmsg: VolatileCell::new(0),
        }
    }
}

impl Default for RegisterBlock {
    fn default() -> Self {
        Self::new()
    }
}

/// CANGCON bits
pub mod gcon {
    /// Software reset request
    pub const SWRES: u8 = 0x01;
    /// Enable/standby mode request
    pub const ENASTB: u8 = 0x02;
}

/// CANGIT bits
pub mod git {
    /// Bus-off interrupt flag
    pub const BOFFIT: u8 = 0x40;
}

/// CANGIE bits
pub mod gie {
    /// Global CAN interrupt enable
    pub const ENIT: u8 = 0x80;
    /// Bus-off interrupt enable
    pub const ENBOFF: u8 = 0x40;
    /// Receive-complete interrupt enable
    pub const ENRX: u8 = 0x20;
    /// Transmit-complete interrupt enable
    pub const ENTX: u8 = 0x10;
    /// Per-object error interrupt enable
    pub const ENERR: u8 = 0x08;
}

/// CANHPMOB values
pub mod hpmob {
    /// No object-scoped interrupt is pending; the event is on the general
    /// channel
    pub const NONE: u8 = 0xF0;
}

/// CANCDMOB bits
pub mod cdmob {
    /// Enable transmission
    pub const CONMOB_TX: u8 = 0x40;
    /// Enable reception
    pub const CONMOB_RX: u8 = 0x80;
    /// Automatic reply valid
    pub const RPLV: u8 = 0x20;
    /// Extended (29-bit) identifier
    pub const IDE: u8 = 0x10;
    /// Data length code field
    pub const DLC_MASK: u8 = 0x0F;
}

/// CANIDT4 bits
pub mod idt {
    /// Remote transmission request tag
    pub const RTRTAG: u8 = 0x04;
}

/// CANSTMOB bits (see also [`crate::interrupt::MobStatus`])
pub mod stmob {
    /// All five per-frame error flags
    pub const ERR_MASK: u8 = 0x1F;
}

/// The register block of CAN peripheral `Id`
///
/// Owning an instance stands for exclusive ownership of the hardware
/// registers; it is `Deref`ed wherever raw access is needed.
pub struct Can<Id> {
    _markers: PhantomData<Id>,
}

impl<Id: CanId> Can<Id> {
    /// # Safety
    /// The caller must be the sole owner of the peripheral identified by
    /// `Id`; constructing two accessors for one peripheral aliases its
    /// registers.
    pub(crate) unsafe fn new() -> Self {
        Self {
            _markers: PhantomData,
        }
    }
}

impl<Id: CanId> Deref for Can<Id> {
    type Target = RegisterBlock;

    fn deref(&self) -> &RegisterBlock {
        // Safety: `CanId` guarantees the address points at a live register
        // block and `Can::new` guarantees exclusive ownership.
        unsafe { &*(Id::address() as *const RegisterBlock) }
    }
}

/// Scoped page selection.
///
/// CANPAGE is the one register shared between mainline code and the
/// interrupt handler, and the save-on-entry/restore-on-every-exit discipline
/// around it is the only synchronization the driver has. Constructing a
/// guard saves the current page and selects the given object's bank;
/// dropping it restores the saved page, on early returns included. Guards
/// nest safely since save/restore is idempotent.
pub(crate) struct PageGuard<'a> {
    regs: &'a RegisterBlock,
    saved: u8,
}

impl<'a> PageGuard<'a> {
    /// Selects the register bank of `index`, remembering the current page.
    pub(crate) fn select(regs: &'a RegisterBlock, index: MobIndex) -> Self {
        let saved = regs.canpage.get();
        regs.canpage.set(index.page());
        Self { regs, saved }
    }
}

impl Drop for PageGuard<'_> {
    fn drop(&mut self) {
        self.regs.canpage.set(self.saved);
    }
}
