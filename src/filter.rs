use embedded_hal::can::{ExtendedId, Id, StandardId};

use crate::{
    buffer::pack_id,
    frame::split_id,
    regs::{Register, SidL},
};

/// Acceptance filter set-up for Rx buffer 0.
///
/// Only Rx buffer 0 can be filtered. With a filter active, Rx buffer 1 only
/// receives frames that roll over from a full Rx buffer 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterConfig {
    /// Acceptance filter `RXF0`.
    pub filter0: Id,
    /// Acceptance filter `RXF1`.
    pub filter1: Id,
    /// Acceptance mask `RXM0`. Set bits are compared against the filters.
    pub mask0: Id,
}

impl FilterConfig {
    /// A single filter with an exact-match mask.
    pub fn exact(id: Id) -> Self {
        let mask = match id {
            Id::Standard(_) => Id::Standard(StandardId::MAX),
            Id::Extended(_) => Id::Extended(ExtendedId::MAX),
        };
        Self {
            filter0: id,
            filter1: id,
            mask0: mask,
        }
    }
}

/// Acceptance filter registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "ufmt", derive(ufmt::derive::uDebug))]
pub enum RxFilter {
    F0,
    F1,
    F2,
    F3,
    F4,
    F5,
}

impl RxFilter {
    /// Filters that belong to Rx buffer 1.
    pub const RXB1: [Self; 4] = [RxFilter::F2, RxFilter::F3, RxFilter::F4, RxFilter::F5];

    /// Returns the `SIDH` register, start of the 4 byte filter.
    pub const fn sidh(self) -> Register {
        match self {
            RxFilter::F0 => Register::RXF0SIDH,
            RxFilter::F1 => Register::RXF1SIDH,
            RxFilter::F2 => Register::RXF2SIDH,
            RxFilter::F3 => Register::RXF3SIDH,
            RxFilter::F4 => Register::RXF4SIDH,
            RxFilter::F5 => Register::RXF5SIDH,
        }
    }
}

/// Acceptance mask registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "ufmt", derive(ufmt::derive::uDebug))]
pub enum RxMask {
    Mask0,
    Mask1,
}

impl RxMask {
    /// Returns the `SIDH` register, start of the 4 byte mask.
    pub const fn sidh(self) -> Register {
        match self {
            RxMask::Mask0 => Register::RXM0SIDH,
            RxMask::Mask1 => Register::RXM1SIDH,
        }
    }
}

/// Mask value that compares no bits, so every frame passes.
pub const ACCEPT_ALL: [u8; 4] = [0x00; 4];

/// Mask and filter value used to shut Rx buffer 1 off when Rx buffer 0 is
/// filtered.
pub const REJECT_ALL: [u8; 4] = [0xFF; 4];

/// Packs an identifier into filter register layout.
pub fn filter_bytes(id: Id) -> [u8; 4] {
    let (raw, extended) = split_id(id);
    pack_id(raw, extended)
}

/// Packs an identifier into mask register layout. Masks have no `EXIDE` bit.
pub fn mask_bytes(id: Id) -> [u8; 4] {
    let mut bytes = filter_bytes(id);
    bytes[1] = SidL::from_bytes([bytes[1]]).with_exide(false).into_bytes()[0];
    bytes
}
