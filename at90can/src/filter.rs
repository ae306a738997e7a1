//! Identifier filters in the peripheral's representation
//!
//! Each message object carries one classic id/mask pair spread over the four
//! CANIDT and four CANIDM registers. An 11-bit identifier occupies the top of
//! the first two bytes; a 29-bit identifier is spread over all four at shift
//! offsets of 21, 13, 5 and -3 bits. The encoding is bit-exact with the
//! hardware and round-trips through [`decode`].

use embedded_can::{ExtendedId, Id, StandardId};

/// Identifier and acceptance mask of a message object
///
/// The variant fixes the identifier width programmed into the object. A mask
/// bit of one requires the corresponding identifier bit of an incoming frame
/// to match; a mask bit of zero accepts either value. Objects that only
/// transmit never consult the mask; pass `StandardId::ZERO`/
/// `ExtendedId::ZERO` there.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MobId {
    /// Classic 11-bit identifier filter
    Standard {
        /// Identifier compared against incoming frames (or sent, for
        /// transmit objects)
        id: StandardId,
        /// Acceptance mask over the 11 identifier bits
        mask: StandardId,
    },
    /// Extended 29-bit identifier filter
    Extended {
        /// Identifier compared against incoming frames (or sent, for
        /// transmit objects)
        id: ExtendedId,
        /// Acceptance mask over the 29 identifier bits
        mask: ExtendedId,
    },
}

impl MobId {
    /// Whether the object uses the extended (29-bit) identifier format
    pub fn is_extended(&self) -> bool {
        matches!(self, Self::Extended { .. })
    }

    /// The identifier packed as the CANIDT1..CANIDT4 bytes
    pub(crate) fn id_bytes(&self) -> [u8; 4] {
        match *self {
            Self::Standard { id, .. } => pack_standard(id.as_raw()),
            Self::Extended { id, .. } => pack_extended(id.as_raw()),
        }
    }

    /// The mask packed as the CANIDM1..CANIDM4 bytes
    pub(crate) fn mask_bytes(&self) -> [u8; 4] {
        match *self {
            Self::Standard { mask, .. } => pack_standard(mask.as_raw()),
            Self::Extended { mask, .. } => pack_extended(mask.as_raw()),
        }
    }
}

/// 11 bits into the top of the first two bytes; the remaining two identifier
/// bytes stay zero
fn pack_standard(raw: u16) -> [u8; 4] {
    [(raw >> 3) as u8, ((raw << 5) & 0xE0) as u8, 0, 0]
}

/// 29 bits across all four bytes; the low byte leaves room for the RTR and
/// reserved-bit tags below bit 3
fn pack_extended(raw: u32) -> [u8; 4] {
    [
        (raw >> 21) as u8,
        (raw >> 13) as u8,
        (raw >> 5) as u8,
        ((raw << 3) & 0xF8) as u8,
    ]
}

/// Reconstructs an identifier from the CANIDT1..CANIDT4 bytes.
///
/// The width cannot be read back from the identifier registers themselves;
/// the caller supplies it from the object's cached configuration.
pub(crate) fn decode(bytes: [u8; 4], extended: bool) -> Id {
    if extended {
        let raw = (u32::from(bytes[0]) << 21)
            | (u32::from(bytes[1]) << 13)
            | (u32::from(bytes[2]) << 5)
            | (u32::from(bytes[3]) >> 3);
        // The mask ensures the value is in range for a 29-bit identifier
        Id::Extended(unsafe { ExtendedId::new_unchecked(raw & ExtendedId::MAX.as_raw()) })
    } else {
        let raw = (u16::from(bytes[0]) << 3) | (u16::from(bytes[1]) >> 5);
        // The mask ensures the value is in range for an 11-bit identifier
        Id::Standard(unsafe { StandardId::new_unchecked(raw & StandardId::MAX.as_raw()) })
    }
}
