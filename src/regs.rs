//! MCP2515 registers.

use core::ops::BitOr;

use modular_bitfield::prelude::*;

/// SPI instruction set of the MCP2515.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Instruction {
    Write = 0x02,
    Read = 0x03,
    Bitmod = 0x05,
    /// Request-to-send. The low three bits select the Tx buffers.
    Rts = 0x80,
    ReadRx0 = 0x90,
    ReadRx1 = 0x94,
    ReadStatus = 0xA0,
    Reset = 0xC0,
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "ufmt", derive(ufmt::derive::uDebug))]
pub enum Register {
    RXF0SIDH = 0x00,
    RXF0SIDL = 0x01,
    RXF0EID8 = 0x02,
    RXF0EID0 = 0x03,
    RXF1SIDH = 0x04,
    RXF1SIDL = 0x05,
    RXF1EID8 = 0x06,
    RXF1EID0 = 0x07,
    RXF2SIDH = 0x08,
    RXF2SIDL = 0x09,
    RXF2EID8 = 0x0A,
    RXF2EID0 = 0x0B,
    BFPCTRL = 0x0C,
    TXRTSCTRL = 0x0D,
    CANSTAT = 0x0E,
    CANCTRL = 0x0F,
    RXF3SIDH = 0x10,
    RXF3SIDL = 0x11,
    RXF3EID8 = 0x12,
    RXF3EID0 = 0x13,
    RXF4SIDH = 0x14,
    RXF4SIDL = 0x15,
    RXF4EID8 = 0x16,
    RXF4EID0 = 0x17,
    RXF5SIDH = 0x18,
    RXF5SIDL = 0x19,
    RXF5EID8 = 0x1A,
    RXF5EID0 = 0x1B,
    TEC = 0x1C,
    REC = 0x1D,
    RXM0SIDH = 0x20,
    RXM0SIDL = 0x21,
    RXM0EID8 = 0x22,
    RXM0EID0 = 0x23,
    RXM1SIDH = 0x24,
    RXM1SIDL = 0x25,
    RXM1EID8 = 0x26,
    RXM1EID0 = 0x27,
    CNF3 = 0x28,
    CNF2 = 0x29,
    CNF1 = 0x2A,
    CANINTE = 0x2B,
    CANINTF = 0x2C,
    EFLG = 0x2D,
    TXB0CTRL = 0x30,
    TXB0SIDH = 0x31,
    TXB0SIDL = 0x32,
    TXB0EID8 = 0x33,
    TXB0EID0 = 0x34,
    TXB0DLC = 0x35,
    TXB0DATA = 0x36,
    TXB1CTRL = 0x40,
    TXB1SIDH = 0x41,
    TXB1SIDL = 0x42,
    TXB1EID8 = 0x43,
    TXB1EID0 = 0x44,
    TXB1DLC = 0x45,
    TXB1DATA = 0x46,
    TXB2CTRL = 0x50,
    TXB2SIDH = 0x51,
    TXB2SIDL = 0x52,
    TXB2EID8 = 0x53,
    TXB2EID0 = 0x54,
    TXB2DLC = 0x55,
    TXB2DATA = 0x56,
    RXB0CTRL = 0x60,
    RXB0SIDH = 0x61,
    RXB0SIDL = 0x62,
    RXB0EID8 = 0x63,
    RXB0EID0 = 0x64,
    RXB0DLC = 0x65,
    RXB0DATA = 0x66,
    RXB1CTRL = 0x70,
    RXB1SIDH = 0x71,
    RXB1SIDL = 0x72,
    RXB1EID8 = 0x73,
    RXB1EID0 = 0x74,
    RXB1DLC = 0x75,
    RXB1DATA = 0x76,
}

/// A single-byte register with a fixed address.
pub trait Reg: Copy {
    /// Address of the register.
    const ADDRESS: Register;

    /// Read the register from its raw content.
    fn read(content: u8) -> Self;

    /// Write the register to its raw content.
    fn write(self) -> u8;
}

/// Marker trait implemented on registers which support the BIT MODIFY
/// instruction.
pub trait BitModifiable: Reg {}

#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanCtrl {
    /// CLKOUT prescaler
    pub clkpre: B2,
    /// CLKOUT enable
    pub clken: bool,
    /// One-shot mode
    pub osm: bool,
    /// Abort all pending transmissions
    pub abat: bool,
    /// Request operation mode
    pub reqop: OpMode,
}

impl CanCtrl {
    /// Mask to modify the `reqop` bits.
    pub const MASK_REQOP: Self = Self::from_bytes([0b1110_0000]);
}

impl BitModifiable for CanCtrl {}

#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanStat {
    #[skip]
    __: B1,
    #[skip(setters)]
    pub icod: B3,
    #[skip]
    __: B1,
    #[skip(setters)]
    pub opmod: OpMode,
}

#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rxb0Ctrl {
    #[skip(setters)]
    pub filhit0: bool,
    /// Read-only copy of BUKT.
    #[skip(setters)]
    pub bukt1: bool,
    /// Rollover enable.
    pub bukt: bool,
    #[skip(setters)]
    pub rxrtr: bool,
    #[skip]
    __: B1,
    /// Receive buffer operating mode.
    pub rxm: RecvBufOpMode,
    #[skip]
    __: B1,
}

impl Rxb0Ctrl {
    pub const MASK_RXM: Self = Self::from_bytes([0b0110_0000]);
    pub const MASK_BUKT: Self = Self::from_bytes([0b0000_0100]);
}

impl BitModifiable for Rxb0Ctrl {}

#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rxb1Ctrl {
    #[skip(setters)]
    pub filhit: B3,
    #[skip(setters)]
    pub rxrtr: bool,
    #[skip]
    __: B1,
    /// Receive buffer operating mode.
    pub rxm: RecvBufOpMode,
    #[skip]
    __: B1,
}

impl Rxb1Ctrl {
    pub const MASK_RXM: Self = Self::from_bytes([0b0110_0000]);
}

impl BitModifiable for Rxb1Ctrl {}

/// `TXBnCTRL`. Shared by all three Tx buffers, so it has no [`Reg`] impl.
#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxbCtrl {
    pub txp: B2,
    #[skip]
    __: B1,
    pub txreq: bool,
    #[skip(setters)]
    pub txerr: bool,
    #[skip(setters)]
    pub mloa: bool,
    #[skip(setters)]
    pub abtf: bool,
    #[skip]
    __: B1,
}

impl TxbCtrl {
    pub const MASK_TXREQ: Self = Self::from_bytes([0b0000_1000]);
}

/// Error flag register.
#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Eflg {
    pub ewarn: bool,
    pub rxwar: bool,
    pub txwar: bool,
    pub rxep: bool,
    pub txep: bool,
    pub txbo: bool,
    /// Receive buffer 0 overflowed.
    pub rx0ovr: bool,
    /// Receive buffer 1 overflowed.
    pub rx1ovr: bool,
}

impl Eflg {
    pub const MASK_RXOVR: Self = Self::from_bytes([0b1100_0000]);
}

impl BitModifiable for Eflg {}

/// `RXnBF` pin control and status.
#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BfpCtrl {
    /// `RX0BF` signals buffer-full interrupts when set, digital output when clear.
    pub b0bfm: bool,
    pub b1bfm: bool,
    /// Pin function enable.
    pub b0bfe: bool,
    pub b1bfe: bool,
    /// Output level when in digital output mode.
    pub b0bfs: bool,
    pub b1bfs: bool,
    #[skip]
    __: B2,
}

impl BitModifiable for BfpCtrl {}

/// `TXnRTS` pin control and status.
#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxRtsCtrl {
    /// Request-to-send mode when set, digital input when clear.
    pub b0rtsm: bool,
    pub b1rtsm: bool,
    pub b2rtsm: bool,
    /// Input levels.
    #[skip(setters)]
    pub b0rts: bool,
    #[skip(setters)]
    pub b1rts: bool,
    #[skip(setters)]
    pub b2rts: bool,
    #[skip]
    __: B2,
}

impl BitModifiable for TxRtsCtrl {}

/// `SIDL` byte of a Tx/Rx buffer, filter or mask.
#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SidL {
    /// Extended identifier bits 17..16.
    pub eid_hi: B2,
    #[skip]
    __: B1,
    /// Extended identifier enable.
    pub exide: bool,
    /// Standard remote request (Rx) or RTR marker for standard frames.
    pub srr: bool,
    /// Standard identifier bits 2..0.
    pub sid_lo: B3,
}

/// `DLC` byte of a Tx/Rx buffer.
#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DlcReg {
    pub dlc: B4,
    #[skip]
    __: B2,
    /// Remote transmission request of extended frames.
    pub rtr: bool,
    #[skip]
    __: B1,
}

///////////////////
/// Enums
///////////////////

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, BitfieldSpecifier)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "ufmt", derive(ufmt::derive::uDebug))]
#[bits = 2]
pub enum RecvBufOpMode {
    /// Receives messages that meet the filter criteria.
    FilterOn = 0x0,
    /// Turns masks/filters off; receives any message.
    FilterOff = 0x3,
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, BitfieldSpecifier)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "ufmt", derive(ufmt::derive::uDebug))]
#[bits = 3]
pub enum OpMode {
    Normal,
    Sleep,
    Loopback,
    ListenOnly,
    Configuration,
}

macro_rules! reg {
    ($($s:ty => $reg:expr),*) => {
        $(
            impl Reg for $s {
                const ADDRESS: Register = $reg;

                #[inline]
                fn read(content: u8) -> Self {
                    Self::from_bytes([content])
                }

                #[inline]
                fn write(self) -> u8 {
                    self.into_bytes()[0]
                }
            }

            impl BitOr for $s {
                type Output = Self;

                fn bitor(self, rhs: Self) -> Self::Output {
                    Self::from_bytes([
                        self.into_bytes()[0] | rhs.into_bytes()[0]
                    ])
                }
            }
        )*
    };
}

reg! {
    CanCtrl => Register::CANCTRL,
    CanStat => Register::CANSTAT,
    Rxb0Ctrl => Register::RXB0CTRL,
    Rxb1Ctrl => Register::RXB1CTRL,
    Eflg => Register::EFLG,
    BfpCtrl => Register::BFPCTRL,
    TxRtsCtrl => Register::TXRTSCTRL
}
