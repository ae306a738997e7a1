//! Bus configuration and bit timing
//!
//! The controller derives its bit timing from three raw registers
//! (CANBT1..CANBT3). Unlike peripherals with a runtime prescaler search,
//! this driver ships a fixed table generated for a 16 MHz controller clock:
//! every preset uses 16 time quanta per bit (sync + 7 + 4 + 4, sampling
//! three times) and only the baud rate prescaler differs. Running the
//! controller from any other clock requires regenerating the table and is
//! rejected at construction time.

use fugit::HertzU32;

/// The controller clock the timing table is generated for
pub const ASSUMED_CAN_CLOCK: HertzU32 = HertzU32::MHz(16);

/// Named bit-rate presets
///
/// A closed set; arbitrary rates are not expressible because the three
/// timing registers interact and the sample point placement is part of the
/// generated table.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Bitrate {
    /// 1 Mbit/s
    Kbps1000,
    /// 500 kbit/s
    Kbps500,
    /// 250 kbit/s
    Kbps250,
    /// 200 kbit/s
    Kbps200,
    /// 125 kbit/s
    Kbps125,
    /// 100 kbit/s
    Kbps100,
}

/// Raw values for the three bit timing registers
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BitTiming {
    /// CANBT1: baud rate prescaler
    pub canbt1: u8,
    /// CANBT2: propagation segment and resynchronization jump width
    pub canbt2: u8,
    /// CANBT3: phase segments and sample mode
    pub canbt3: u8,
}

impl Bitrate {
    /// The register triple realizing this rate at [`ASSUMED_CAN_CLOCK`].
    pub const fn timing(self) -> BitTiming {
        // 16 quanta per bit throughout; CANBT2/CANBT3 fix the segment
        // layout and CANBT1 scales the quantum.
        let canbt1 = match self {
            Self::Kbps1000 => 0x00,
            Self::Kbps500 => 0x02,
            Self::Kbps250 => 0x06,
            Self::Kbps200 => 0x08,
            Self::Kbps125 => 0x0E,
            Self::Kbps100 => 0x12,
        };
        BitTiming {
            canbt1,
            canbt2: 0x0C,
            canbt3: 0x37,
        }
    }
}

/// Errors that may occur during construction
#[derive(Debug, PartialEq, Eq)]
pub enum ConfigurationError {
    /// The clock reported by the dependencies does not match the clock the
    /// bit timing table was generated for
    UnsupportedClock {
        /// Provided controller clock
        can_clock: HertzU32,
        /// Clock the table assumes
        expected: HertzU32,
    },
}
