//! Interrupt dispatch
//!
//! The controller multiplexes every event onto a single interrupt vector.
//! [`Can::interrupt`] is the handler body: the firmware's CAN vector calls
//! it once per interrupt and it retires exactly one event, trusting the
//! hardware to keep the line asserted while further events are pending.
//! Event sources are found through CANHPMOB, which reports the
//! highest-priority pending object or [`hpmob::NONE`](crate::reg::hpmob)
//! when the event is controller-global.

use crate::bus::Can;
use crate::filter;
use crate::mob::{FrameKind, MobIndex};
use crate::reg::{git, hpmob, idt, stmob, PageGuard};
use at90can_core::{CanId, Dependencies};
use bitfield::bitfield;

bitfield! {
    /// A snapshot of one object's status register (CANSTMOB)
    ///
    /// All dispatch decisions for an event are made from a single snapshot,
    /// so a flag set by the hardware mid-handler cannot change which branch
    /// runs.
    #[derive(Copy, Clone, PartialEq, Eq)]
    pub struct MobStatus(u8);
    impl Debug;
    /// Data length warning, received DLC differed from the programmed one
    pub dlcw, _: 7;
    /// Transmission completed
    pub txok, _: 6;
    /// Reception completed
    pub rxok, _: 5;
    /// Bit error
    pub berr, _: 4;
    /// Stuff error
    pub serr, _: 3;
    /// CRC error
    pub cerr, _: 2;
    /// Form error
    pub ferr, _: 1;
    /// Acknowledgement error
    pub aerr, _: 0;
}

/// Per-frame bus error kinds, in reporting priority order
///
/// The controller can raise several error flags for one frame; the
/// dispatcher reports exactly one per event so downstream accounting stays
/// deterministic.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BusError {
    /// A transmitted bit read back with the opposite level
    Bit,
    /// More than five consecutive equal bits on the bus
    Stuff,
    /// CRC mismatch on a received frame
    Crc,
    /// A fixed-form field held an illegal value
    Form,
    /// No node acknowledged a transmitted frame
    Ack,
}

impl BusError {
    /// Picks the error to report from a status snapshot.
    ///
    /// Fixed priority: bit, then stuff, CRC, form, acknowledgement.
    pub fn classify(status: MobStatus) -> Option<Self> {
        if status.berr() {
            Some(Self::Bit)
        } else if status.serr() {
            Some(Self::Stuff)
        } else if status.cerr() {
            Some(Self::Crc)
        } else if status.ferr() {
            Some(Self::Form)
        } else if status.aerr() {
            Some(Self::Ack)
        } else {
            None
        }
    }
}

impl<Id: CanId, D: Dependencies<Id>> Can<Id, D> {
    /// Retires one pending controller event.
    ///
    /// Call this from the CAN interrupt vector. Completed transmissions and
    /// receptions are acknowledged, reported through the object's callbacks
    /// and the object is re-armed from its stored configuration. Per-frame
    /// errors are reported and acknowledged without touching the object's
    /// control register, which leaves the controller's automatic retry in
    /// charge of the frame. The page register is restored on every path, so
    /// mainline code interrupted mid-access finds its page intact.
    pub fn interrupt(&mut self) {
        // The low nibble of CANHPMOB is general-purpose storage; only the
        // object number in the high nibble matters here.
        let pending = self.regs.canhpmob.get() & 0xF0;
        if pending == hpmob::NONE {
            self.general_event();
            return;
        }
        let Ok(index) = MobIndex::new(pending >> 4) else {
            // CANHPMOB only ever reports 0..=14 or NONE
            return;
        };
        self.mob_event(index);
    }

    fn mob_event(&mut self, index: MobIndex) {
        let regs = &*self.regs;
        let _page = PageGuard::select(regs, index);
        let status = MobStatus(regs.canstmob.get());
        let Some(config) = self.mobs[index.as_usize()] else {
            // An event on an object that was never configured; acknowledge
            // it so the interrupt line drops.
            regs.canstmob.set(0);
            return;
        };
        if status.txok() {
            regs.canstmob.set(0);
            if let Some(callback) = config.on_transmit {
                callback(index);
            }
            self.apply(index, &config);
        } else if status.rxok() {
            regs.canstmob.set(0);
            if let Some(callback) = config.on_receive {
                // The identifier registers hold the received identifier, not
                // the configured one, until the re-arm below rewrites them.
                let bytes = [
                    regs.canidt1.get(),
                    regs.canidt2.get(),
                    regs.canidt3.get(),
                    regs.canidt4.get(),
                ];
                let id = filter::decode(bytes, config.id.is_extended());
                let kind = if bytes[3] & idt::RTRTAG != 0 {
                    FrameKind::Remote
                } else {
                    FrameKind::Data
                };
                callback(index, id, kind);
            }
            self.apply(index, &config);
        } else if let Some(error) = BusError::classify(status) {
            if let Some(callback) = config.on_error {
                callback(index, error);
            }
            // Clear only the error flags. Rewriting the control register
            // here would cancel the hardware's automatic retry.
            regs.canstmob.set(regs.canstmob.get() & !stmob::ERR_MASK);
        }
    }

    fn general_event(&mut self) {
        let regs = &*self.regs;
        if regs.cangit.get() & git::BOFFIT != 0 {
            if let Some(callback) = self.bus_off {
                callback();
            }
        }
        // General flags clear by writing ones, no read-modify-write needed.
        // Bus-off is the only general source enabled at construction.
        regs.cangit.set(git::BOFFIT);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::bus::Can;
    use crate::config::Bitrate;
    use crate::filter::MobId;
    use crate::mob::{MobConfig, Mode};
    use crate::reg::cdmob;
    use crate::test_util::{mock_can, SixteenMhz};
    use core::sync::atomic::{AtomicU32, AtomicU8, AtomicUsize, Ordering};
    use embedded_can::{ExtendedId, Id, StandardId};

    #[test]
    fn classify_reports_one_error_by_priority() {
        assert_eq!(BusError::classify(MobStatus(0x00)), None);
        assert_eq!(BusError::classify(MobStatus(0x01)), Some(BusError::Ack));
        assert_eq!(BusError::classify(MobStatus(0x02)), Some(BusError::Form));
        assert_eq!(BusError::classify(MobStatus(0x04)), Some(BusError::Crc));
        assert_eq!(BusError::classify(MobStatus(0x08)), Some(BusError::Stuff));
        assert_eq!(BusError::classify(MobStatus(0x10)), Some(BusError::Bit));
        // With several flags raised the highest-priority one wins
        assert_eq!(BusError::classify(MobStatus(0x15)), Some(BusError::Bit));
        assert_eq!(BusError::classify(MobStatus(0x05)), Some(BusError::Crc));
        assert_eq!(BusError::classify(MobStatus(0x03)), Some(BusError::Form));
        // Completion flags never classify as errors
        assert_eq!(BusError::classify(MobStatus(0x60)), None);
    }

    #[test]
    fn reception_reports_the_received_identifier_and_rearms() {
        mock_can!(Can0, REGS);
        static HITS: AtomicUsize = AtomicUsize::new(0);
        static SEEN_INDEX: AtomicU8 = AtomicU8::new(0xFF);
        static SEEN_ID: AtomicU32 = AtomicU32::new(u32::MAX);
        static SEEN_KIND: AtomicU8 = AtomicU8::new(0xFF);
        fn on_receive(index: MobIndex, id: Id, kind: FrameKind) {
            HITS.fetch_add(1, Ordering::SeqCst);
            SEEN_INDEX.store(index.as_raw(), Ordering::SeqCst);
            if let Id::Standard(id) = id {
                SEEN_ID.store(u32::from(id.as_raw()), Ordering::SeqCst);
            }
            SEEN_KIND.store((kind == FrameKind::Remote) as u8, Ordering::SeqCst);
        }

        let mut can = Can::<Can0, _>::new(Bitrate::Kbps500, SixteenMhz).unwrap();
        let mut config = MobConfig::new(
            Mode::Receive,
            MobId::Standard {
                id: StandardId::new(0x71).unwrap(),
                mask: StandardId::new(0xF0).unwrap(),
            },
        );
        config.on_receive = Some(on_receive);
        can.configure(MobIndex::new(0).unwrap(), config);

        // A matching frame with identifier 0x75 arrives: the hardware
        // overwrites the identifier registers and raises RXOK.
        can.regs.canidt1.set(0x0E);
        can.regs.canidt2.set(0xA0);
        can.regs.canstmob.set(0x20);
        can.regs.canhpmob.set(0x00);
        can.regs.canpage.set(0x50);
        can.interrupt();

        assert_eq!(HITS.load(Ordering::SeqCst), 1);
        assert_eq!(SEEN_INDEX.load(Ordering::SeqCst), 0);
        assert_eq!(SEEN_ID.load(Ordering::SeqCst), 0x75);
        assert_eq!(SEEN_KIND.load(Ordering::SeqCst), 0);
        // Re-armed from the stored configuration: status cleared, reception
        // enabled, configured identifier back in place of the received one
        assert_eq!(can.regs.canstmob.get(), 0);
        assert_eq!(can.regs.cancdmob.get(), cdmob::CONMOB_RX);
        assert_eq!(can.regs.canidt1.get(), 0x0E);
        assert_eq!(can.regs.canidt2.get(), 0x20);
        // Mainline page selection survives the handler
        assert_eq!(can.regs.canpage.get(), 0x50);
    }

    #[test]
    fn remote_requests_are_flagged_as_such() {
        mock_can!(Can0, REGS);
        static REMOTE: AtomicU8 = AtomicU8::new(0xFF);
        fn on_receive(_index: MobIndex, _id: Id, kind: FrameKind) {
            REMOTE.store((kind == FrameKind::Remote) as u8, Ordering::SeqCst);
        }

        let mut can = Can::<Can0, _>::new(Bitrate::Kbps500, SixteenMhz).unwrap();
        let mut config = MobConfig::new(
            Mode::Receive,
            MobId::Standard {
                id: StandardId::new(0x20).unwrap(),
                mask: StandardId::MAX,
            },
        );
        config.on_receive = Some(on_receive);
        can.configure(MobIndex::new(1).unwrap(), config);

        can.regs.canidt4.set(idt::RTRTAG);
        can.regs.canstmob.set(0x20);
        can.regs.canhpmob.set(0x10);
        can.interrupt();

        assert_eq!(REMOTE.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn transmit_completion_restores_the_configured_state() {
        mock_can!(Can0, REGS);
        static HITS: AtomicUsize = AtomicUsize::new(0);
        static SEEN_INDEX: AtomicU8 = AtomicU8::new(0xFF);
        fn on_transmit(index: MobIndex) {
            HITS.fetch_add(1, Ordering::SeqCst);
            SEEN_INDEX.store(index.as_raw(), Ordering::SeqCst);
        }

        let mut can = Can::<Can0, _>::new(Bitrate::Kbps500, SixteenMhz).unwrap();
        let mut config = MobConfig::new(
            Mode::Transmit,
            MobId::Extended {
                id: ExtendedId::new(0x1ABCDE).unwrap(),
                mask: ExtendedId::MAX,
            },
        );
        config.on_transmit = Some(on_transmit);
        let index = MobIndex::new(3).unwrap();
        can.configure(index, config);
        can.load_data(index, &[1, 2, 3, 4, 5]);
        can.send(index).unwrap();
        assert_eq!(can.regs.cancdmob.get(), cdmob::CONMOB_TX | cdmob::IDE | 5);

        // The frame leaves the bus: TXOK
        can.regs.canstmob.set(0x40);
        can.regs.canhpmob.set(0x30);
        can.interrupt();

        assert_eq!(HITS.load(Ordering::SeqCst), 1);
        assert_eq!(SEEN_INDEX.load(Ordering::SeqCst), 3);
        // Back to the freshly-configured state: disarmed, status clear,
        // identifier reprogrammed
        assert_eq!(can.regs.canstmob.get(), 0);
        assert_eq!(can.regs.cancdmob.get(), 0);
        assert_eq!(can.regs.canidt1.get(), 0x00);
        assert_eq!(can.regs.canidt2.get(), 0xD5);
        assert_eq!(can.regs.canidt3.get(), 0xE6);
        assert_eq!(can.regs.canidt4.get(), 0xF0);
    }

    #[test]
    fn frame_errors_leave_the_retry_armed() {
        mock_can!(Can0, REGS);
        static ERRORS: AtomicUsize = AtomicUsize::new(0);
        static SEEN: AtomicU8 = AtomicU8::new(0xFF);
        fn on_error(_index: MobIndex, error: BusError) {
            ERRORS.fetch_add(1, Ordering::SeqCst);
            SEEN.store(error as u8, Ordering::SeqCst);
        }

        let mut can = Can::<Can0, _>::new(Bitrate::Kbps500, SixteenMhz).unwrap();
        let mut config = MobConfig::new(
            Mode::Transmit,
            MobId::Standard {
                id: StandardId::new(0x3C).unwrap(),
                mask: StandardId::ZERO,
            },
        );
        config.on_error = Some(on_error);
        let index = MobIndex::new(2).unwrap();
        can.configure(index, config);
        can.load_data(index, &[7, 7]);
        can.send(index).unwrap();
        let armed = can.regs.cancdmob.get();

        // CRC error mid-transmission
        can.regs.canstmob.set(0x04);
        can.regs.canhpmob.set(0x20);
        can.interrupt();

        assert_eq!(ERRORS.load(Ordering::SeqCst), 1);
        assert_eq!(SEEN.load(Ordering::SeqCst), BusError::Crc as u8);
        // Only the error flags were cleared; the object is still armed with
        // its data length, so the hardware retry proceeds untouched
        assert_eq!(can.regs.canstmob.get(), 0);
        assert_eq!(can.regs.cancdmob.get(), armed);
    }

    #[test]
    fn error_clear_preserves_completion_flags() {
        mock_can!(Can0, REGS);
        let mut can = Can::<Can0, _>::new(Bitrate::Kbps500, SixteenMhz).unwrap();
        let config = MobConfig::new(
            Mode::Transmit,
            MobId::Standard {
                id: StandardId::new(0x10).unwrap(),
                mask: StandardId::ZERO,
            },
        );
        let index = MobIndex::new(4).unwrap();
        can.configure(index, config);

        // An acknowledgement error with the DLC warning bit also set; only
        // the low five bits may be cleared
        can.regs.canstmob.set(0x81);
        can.regs.canhpmob.set(0x40);
        can.interrupt();

        assert_eq!(can.regs.canstmob.get(), 0x80);
    }

    #[test]
    fn bus_off_reaches_the_bound_callback() {
        mock_can!(Can0, REGS);
        static HITS: AtomicUsize = AtomicUsize::new(0);
        fn on_bus_off() {
            HITS.fetch_add(1, Ordering::SeqCst);
        }

        let mut can = Can::<Can0, _>::new(Bitrate::Kbps500, SixteenMhz).unwrap();
        can.set_bus_off_callback(Some(on_bus_off));
        can.regs.cangit.set(git::BOFFIT);
        can.regs.canhpmob.set(hpmob::NONE);
        can.regs.canpage.set(0x20);
        can.interrupt();

        assert_eq!(HITS.load(Ordering::SeqCst), 1);
        // General events never touch the page register
        assert_eq!(can.regs.canpage.get(), 0x20);
    }

    #[test]
    fn bus_off_without_callback_is_still_acknowledged() {
        mock_can!(Can0, REGS);
        let mut can = Can::<Can0, _>::new(Bitrate::Kbps500, SixteenMhz).unwrap();
        can.regs.cangit.set(git::BOFFIT);
        can.regs.canhpmob.set(hpmob::NONE);
        can.interrupt();
        // The mock has no write-one-to-clear semantics; the handler wrote
        // the clear pattern and returned without faulting
        assert_eq!(can.regs.cangit.get(), git::BOFFIT);
    }

    #[test]
    fn events_on_unconfigured_objects_are_acknowledged_silently() {
        mock_can!(Can0, REGS);
        let mut can = Can::<Can0, _>::new(Bitrate::Kbps500, SixteenMhz).unwrap();
        can.regs.canstmob.set(0x40);
        can.regs.canhpmob.set(0x50);
        can.interrupt();
        assert_eq!(can.regs.canstmob.get(), 0);
    }

    #[test]
    fn completion_without_callback_still_rearms() {
        mock_can!(Can0, REGS);
        let mut can = Can::<Can0, _>::new(Bitrate::Kbps500, SixteenMhz).unwrap();
        let config = MobConfig::new(
            Mode::Receive,
            MobId::Standard {
                id: StandardId::new(0x71).unwrap(),
                mask: StandardId::new(0xF0).unwrap(),
            },
        );
        let index = MobIndex::new(0).unwrap();
        can.configure(index, config);

        can.regs.cancdmob.set(0); // the hardware disarms on reception
        can.regs.canstmob.set(0x20);
        can.regs.canhpmob.set(0x00);
        can.interrupt();

        assert_eq!(can.regs.canstmob.get(), 0);
        assert_eq!(can.regs.cancdmob.get(), cdmob::CONMOB_RX);
    }
}
