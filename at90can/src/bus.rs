//! The CAN bus driver value
//!
//! [`Can`] is an explicit value owned by the embedding firmware; there is
//! no hidden singleton. Mainline code calls the configuration and arming
//! methods below; the firmware's CAN interrupt vector calls
//! [`Can::interrupt`](crate::bus::Can::interrupt). All methods execute in a
//! handful of register accesses and never block; backpressure is entirely
//! the controller's own arbitration and retry hardware.
//!
//! Sharing the value between mainline code and the interrupt handler is the
//! firmware's job (critical section, RTIC resource or similar). Two rules
//! are not checked by the driver: do not reconfigure an object while one of
//! its events may be in flight, and do not call mainline methods from a
//! second interrupt priority.

use crate::config::{Bitrate, ConfigurationError, ASSUMED_CAN_CLOCK};
use crate::mob::{BusOffCallback, MobConfig, MobIndex, Mode, MAX_DATA_LEN, MOB_COUNT};
use crate::reg::{self, cdmob, gcon, gie, idt, PageGuard};
use at90can_core::{CanId, Dependencies};

/// Errors from object-scoped operations
#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    /// The object has never been configured, so its identifier width is
    /// unknown and arming it would program garbage
    NotConfigured,
}

/// A running CAN controller
///
/// Construction resets the controller, programs bit timing, enables the
/// interrupt sources and starts bus operation; the value then lives until
/// device reset. Each of the 15 message objects is configured and armed
/// individually through a bounds-checked [`MobIndex`].
pub struct Can<Id, D> {
    pub(crate) regs: reg::Can<Id>,
    dependencies: D,
    /// Software-side mirror of every object's configuration. Written only by
    /// configuration calls, read by the dispatcher.
    pub(crate) mobs: [Option<MobConfig>; MOB_COUNT],
    pub(crate) bus_off: Option<BusOffCallback>,
}

impl<Id: CanId, D: Dependencies<Id>> Can<Id, D> {
    /// Resets and starts the controller at the given bit rate.
    ///
    /// Fails if the dependencies report a controller clock the bit timing
    /// table was not generated for.
    pub fn new(bitrate: Bitrate, dependencies: D) -> Result<Self, ConfigurationError> {
        let can_clock = dependencies.can_clock();
        if can_clock != ASSUMED_CAN_CLOCK {
            return Err(ConfigurationError::UnsupportedClock {
                can_clock,
                expected: ASSUMED_CAN_CLOCK,
            });
        }
        // Safety: holding `dependencies` implies sole ownership of the
        // peripheral identified by `Id`.
        let regs = unsafe { reg::Can::<Id>::new() };
        let can = Self {
            regs,
            dependencies,
            mobs: [None; MOB_COUNT],
            bus_off: None,
        };
        can.reset(bitrate);
        Ok(can)
    }

    /// Stops using the peripheral and releases the dependencies.
    pub fn free(self) -> D {
        self.dependencies
    }

    fn reset(&self, bitrate: Bitrate) {
        let regs = &*self.regs;
        regs.cangcon.set(gcon::SWRES);
        // The object banks hold undefined values after reset; stray status
        // bits would fire spurious interrupts as soon as the controller
        // starts, so every bank is zeroed first.
        for index in MobIndex::all() {
            let _page = PageGuard::select(regs, index);
            regs.canstmob.set(0);
            regs.cancdmob.set(0);
            regs.canidt1.set(0);
            regs.canidt2.set(0);
            regs.canidt3.set(0);
            regs.canidt4.set(0);
            regs.canidm1.set(0);
            regs.canidm2.set(0);
            regs.canidm3.set(0);
            regs.canidm4.set(0);
        }
        regs.cangie
            .set(gie::ENIT | gie::ENBOFF | gie::ENRX | gie::ENTX | gie::ENERR);
        regs.canie2.set(0xFF);
        regs.canie1.set(0x7F);
        let timing = bitrate.timing();
        regs.canbt1.set(timing.canbt1);
        regs.canbt2.set(timing.canbt2);
        regs.canbt3.set(timing.canbt3);
        regs.cangcon.set(gcon::ENASTB);
    }

    /// Binds or unbinds the controller-wide bus-off notifier.
    ///
    /// With `None`, a bus-off event is still acknowledged in hardware but
    /// silently dropped; absence of the callback means "no escalation", not
    /// "no fault occurred". Bus-off is terminal from the driver's point of
    /// view; restarting the bus is the firmware's decision.
    pub fn set_bus_off_callback(&mut self, callback: Option<BusOffCallback>) {
        self.bus_off = callback;
    }

    /// Configures a message object from a descriptor.
    ///
    /// Writes the software-side mirror, programs identifier and mask
    /// registers for the descriptor's width and clears any stale status from
    /// a previous frame. Receive objects are armed immediately; transmit and
    /// reply objects stay unarmed until the matching arm call; disabled
    /// objects are inert. Reconfiguring to [`Mode::Disabled`] is also the
    /// only way to cancel a pending operation.
    pub fn configure(&mut self, index: MobIndex, config: MobConfig) {
        self.mobs[index.as_usize()] = Some(config);
        self.apply(index, &config);
    }

    /// Programs the hardware side of a configuration. Also used by the
    /// dispatcher to re-arm from the mirror, which is why it must not touch
    /// `self.mobs`.
    pub(crate) fn apply(&self, index: MobIndex, config: &MobConfig) {
        let regs = &*self.regs;
        let _page = PageGuard::select(regs, index);
        let id = config.id.id_bytes();
        let mask = config.id.mask_bytes();
        regs.canidt1.set(id[0]);
        regs.canidt2.set(id[1]);
        regs.canidt3.set(id[2]);
        regs.canidt4.set(id[3]);
        regs.canidm1.set(mask[0]);
        regs.canidm2.set(mask[1]);
        regs.canidm3.set(mask[2]);
        regs.canidm4.set(mask[3]);
        regs.canstmob.set(0);
        regs.cancdmob.set(match config.mode {
            Mode::Receive => cdmob::CONMOB_RX | ide_bit(config),
            Mode::Disabled | Mode::Transmit | Mode::Reply => 0,
        });
    }

    /// Loads payload bytes into an object's data buffer.
    ///
    /// At most eight bytes are written; excess input is silently clamped.
    /// The object's data length field is set to the written count, which is
    /// also returned. Writing the length leaves the object unarmed; see
    /// [`Can::send`].
    pub fn load_data(&mut self, index: MobIndex, data: &[u8]) -> usize {
        let regs = &*self.regs;
        let _page = PageGuard::select(regs, index);
        let n = data.len().min(MAX_DATA_LEN);
        for &byte in &data[..n] {
            regs.canmsg.set(byte);
        }
        regs.cancdmob.set(n as u8);
        n
    }

    /// Reads payload bytes from an object's data buffer.
    ///
    /// Returns `min(buffer.len(), data length field)` bytes; a buffer longer
    /// than the received payload is simply not filled further.
    pub fn read_data(&mut self, index: MobIndex, buffer: &mut [u8]) -> usize {
        let regs = &*self.regs;
        let _page = PageGuard::select(regs, index);
        let dlc = usize::from(regs.cancdmob.get() & cdmob::DLC_MASK).min(MAX_DATA_LEN);
        let n = buffer.len().min(dlc);
        for slot in &mut buffer[..n] {
            *slot = regs.canmsg.get();
        }
        n
    }

    /// Arms a transmit object.
    ///
    /// The frame goes out once the bus is idle and the object's identifier
    /// wins arbitration (numerically lower wins). Clears a stale
    /// remote-request tag from a previous exchange and keeps the data length
    /// programmed by [`Can::load_data`].
    pub fn send(&mut self, index: MobIndex) -> Result<(), Error> {
        let config = self.lookup(index)?;
        let regs = &*self.regs;
        let _page = PageGuard::select(regs, index);
        regs.canidt4.set(regs.canidt4.get() & !idt::RTRTAG);
        let dlc = regs.cancdmob.get() & cdmob::DLC_MASK;
        regs.cancdmob.set(cdmob::CONMOB_TX | ide_bit(&config) | dlc);
        Ok(())
    }

    /// Re-arms a receive object.
    ///
    /// Receive objects are armed by [`Can::configure`] and re-armed by the
    /// dispatcher after every reception; this exists for manual intervention
    /// in between.
    pub fn receive(&mut self, index: MobIndex) -> Result<(), Error> {
        let config = self.lookup(index)?;
        let regs = &*self.regs;
        let _page = PageGuard::select(regs, index);
        regs.cancdmob.set(cdmob::CONMOB_RX | ide_bit(&config));
        Ok(())
    }

    /// Arms a transmit object to send a remote request for `len` bytes.
    ///
    /// `len` is clamped to eight. How many bytes actually come back is up to
    /// whichever node answers the request.
    pub fn request_remote(&mut self, index: MobIndex, len: usize) -> Result<(), Error> {
        let config = self.lookup(index)?;
        let regs = &*self.regs;
        let _page = PageGuard::select(regs, index);
        // The identifier registers take part in arbitration and must be
        // final before transmission is requested, so the tag goes first.
        regs.canidt4.set(regs.canidt4.get() | idt::RTRTAG);
        let dlc = len.min(MAX_DATA_LEN) as u8;
        regs.cancdmob.set(cdmob::CONMOB_TX | ide_bit(&config) | dlc);
        Ok(())
    }

    /// Arms a reply object to answer matching remote requests.
    ///
    /// The controller ignores this object's own data length field when
    /// replying; the reply length is dictated by the incoming request's DLC.
    /// That is how the peripheral works, not a driver shortcut.
    pub fn enable_reply(&mut self, index: MobIndex) -> Result<(), Error> {
        let config = self.lookup(index)?;
        let regs = &*self.regs;
        let _page = PageGuard::select(regs, index);
        regs.cancdmob
            .set(cdmob::CONMOB_RX | cdmob::RPLV | ide_bit(&config));
        Ok(())
    }

    fn lookup(&self, index: MobIndex) -> Result<MobConfig, Error> {
        self.mobs[index.as_usize()].ok_or(Error::NotConfigured)
    }
}

fn ide_bit(config: &MobConfig) -> u8 {
    if config.id.is_extended() {
        cdmob::IDE
    } else {
        0
    }
}
