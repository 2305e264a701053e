//! Bit timing for a 16 MHz oscillator.

/// Speed the CAN bus is operating at.
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "ufmt", derive(ufmt::derive::uDebug))]
pub enum CanSpeed {
    Kbps5 = 5,
    Kbps10 = 10,
    Kbps20 = 20,
    Kbps33 = 33,
    Kbps40 = 40,
    Kbps50 = 50,
    Kbps80 = 80,
    Kbps95 = 95,
    Kbps100 = 100,
    Kbps125 = 125,
    Kbps200 = 200,
    Kbps250 = 250,
    Kbps500 = 500,
    Kbps1000 = 1000,
}

impl CanSpeed {
    /// All supported speeds, slowest first.
    pub const ALL: [Self; 14] = [
        CanSpeed::Kbps5,
        CanSpeed::Kbps10,
        CanSpeed::Kbps20,
        CanSpeed::Kbps33,
        CanSpeed::Kbps40,
        CanSpeed::Kbps50,
        CanSpeed::Kbps80,
        CanSpeed::Kbps95,
        CanSpeed::Kbps100,
        CanSpeed::Kbps125,
        CanSpeed::Kbps200,
        CanSpeed::Kbps250,
        CanSpeed::Kbps500,
        CanSpeed::Kbps1000,
    ];

    /// Looks up a bus speed in kbit/s.
    pub fn from_kbps(kbps: u16) -> Option<Self> {
        Self::ALL.iter().copied().find(|speed| speed.kbps() == kbps)
    }

    /// Bus speed in kbit/s.
    #[inline]
    pub const fn kbps(self) -> u16 {
        self as u16
    }

    /// Raw `CNF3`, `CNF2`, `CNF1` bytes, in register address order.
    pub const fn timing(self) -> [u8; 3] {
        match self {
            CanSpeed::Kbps1000 => [0x82, 0xD0, 0x00],
            CanSpeed::Kbps500 => [0x86, 0xF0, 0x00],
            CanSpeed::Kbps250 => [0x85, 0xF1, 0x41],
            CanSpeed::Kbps200 => [0x87, 0xFA, 0x01],
            CanSpeed::Kbps125 => [0x86, 0xF0, 0x03],
            CanSpeed::Kbps100 => [0x87, 0xFA, 0x03],
            CanSpeed::Kbps95 => [0x07, 0xAD, 0x03],
            CanSpeed::Kbps80 => [0x87, 0xFF, 0x03],
            CanSpeed::Kbps50 => [0x87, 0xFA, 0x07],
            CanSpeed::Kbps40 => [0x87, 0xFF, 0x07],
            CanSpeed::Kbps33 => [0x07, 0xBE, 0x09],
            CanSpeed::Kbps20 => [0x87, 0xFF, 0x0F],
            CanSpeed::Kbps10 => [0x87, 0xFF, 0x1F],
            CanSpeed::Kbps5 => [0x87, 0xFF, 0x3F],
        }
    }
}

impl TryFrom<u16> for CanSpeed {
    type Error = u16;

    fn try_from(kbps: u16) -> Result<Self, Self::Error> {
        Self::from_kbps(kbps).ok_or(kbps)
    }
}

/// Raw table lookup. Unknown speeds map to an all-zero configuration, which
/// the chip does not accept; check [`CanSpeed::from_kbps`] first.
pub fn bit_timing(kbps: u16) -> [u8; 3] {
    CanSpeed::from_kbps(kbps).map_or([0; 3], CanSpeed::timing)
}
