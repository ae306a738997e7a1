//! Message objects and their software-side descriptors
//!
//! The controller has 15 independent message objects. Each is a hardware
//! send/receive/filter unit whose registers are reachable only through the
//! page-select window; the driver keeps a software-side copy of every
//! object's configuration so the interrupt dispatcher can learn an object's
//! mode, identifier width and callbacks without touching hardware.

use crate::filter::MobId;
use crate::interrupt::BusError;
use embedded_can::Id;

/// Number of message objects in the controller
pub const MOB_COUNT: usize = 15;

/// Maximum payload of a single CAN frame in bytes
pub const MAX_DATA_LEN: usize = 8;

/// Bounds-checked message object index, `0..=14`
///
/// Constructing an index is the only place where the range is checked;
/// everything downstream can rely on it and no out-of-range value can ever
/// reach the page-select register.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MobIndex(u8);

/// The requested message object index is outside `0..=14`
#[derive(Debug, PartialEq, Eq)]
pub struct InvalidMobIndex(
    /// The rejected raw value
    pub u8,
);

impl MobIndex {
    /// Creates an index, rejecting values outside `0..=14`.
    pub const fn new(index: u8) -> Result<Self, InvalidMobIndex> {
        if index < MOB_COUNT as u8 {
            Ok(Self(index))
        } else {
            Err(InvalidMobIndex(index))
        }
    }

    /// The raw index value
    pub const fn as_raw(self) -> u8 {
        self.0
    }

    /// The index as a store subscript
    pub(crate) const fn as_usize(self) -> usize {
        self.0 as usize
    }

    /// The CANPAGE value selecting this object's register bank
    pub(crate) const fn page(self) -> u8 {
        self.0 << 4
    }

    /// Iterates over all valid indices in ascending order.
    pub fn all() -> impl Iterator<Item = Self> {
        (0..MOB_COUNT as u8).map(Self)
    }
}

impl TryFrom<u8> for MobIndex {
    type Error = InvalidMobIndex;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<MobIndex> for u8 {
    fn from(index: MobIndex) -> Self {
        index.as_raw()
    }
}

/// Operating mode of a message object
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Mode {
    /// The object is inert; also the way to cancel a pending operation
    #[default]
    Disabled,
    /// Accept frames matching the id/mask filter. Armed as soon as it is
    /// configured.
    Receive,
    /// Transmit frames or remote requests. Stays unarmed until
    /// [`send`](crate::bus::Can::send) or
    /// [`request_remote`](crate::bus::Can::request_remote).
    Transmit,
    /// Answer matching remote requests automatically. Stays unarmed until
    /// [`enable_reply`](crate::bus::Can::enable_reply).
    Reply,
}

/// Distinguishes payload-carrying frames from remote transmission requests
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FrameKind {
    /// A regular data frame
    Data,
    /// A remote transmission request
    Remote,
}

/// Invoked from the dispatcher after a frame left the bus successfully
pub type TxCallback = fn(MobIndex);
/// Invoked from the dispatcher after a frame passed the object's filter
pub type RxCallback = fn(MobIndex, Id, FrameKind);
/// Invoked from the dispatcher on a per-frame bus error
pub type ErrorCallback = fn(MobIndex, BusError);
/// Invoked from the dispatcher when the controller goes bus-off
pub type BusOffCallback = fn();

/// Configuration descriptor of one message object
///
/// Callbacks run in interrupt context and are fire-and-forget; keep them
/// short. An unbound callback drops the corresponding notification but never
/// the hardware acknowledgement.
#[derive(Copy, Clone)]
pub struct MobConfig {
    /// Operating mode
    pub mode: Mode,
    /// Identifier and acceptance mask; also fixes the identifier width
    pub id: MobId,
    /// Transmit-complete notification
    pub on_transmit: Option<TxCallback>,
    /// Receive-complete notification
    pub on_receive: Option<RxCallback>,
    /// Per-frame bus error notification
    pub on_error: Option<ErrorCallback>,
}

impl MobConfig {
    /// A descriptor with the given mode and filter and no callbacks bound.
    pub const fn new(mode: Mode, id: MobId) -> Self {
        Self {
            mode,
            id,
            on_transmit: None,
            on_receive: None,
            on_error: None,
        }
    }
}
