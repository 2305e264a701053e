//! Tx/Rx buffer selection and the 13 byte buffer record layout shared by
//! both directions:
//!
//! | byte  | content                                   |
//! |-------|-------------------------------------------|
//! | 0     | `SIDH`, standard id bits 10..3            |
//! | 1     | `SIDL`, see [`SidL`]                      |
//! | 2     | `EID8`, extended id bits 15..8            |
//! | 3     | `EID0`, extended id bits 7..0             |
//! | 4     | `DLC`, see [`DlcReg`]                     |
//! | 5..13 | data                                      |

use bitflags::bitflags;
use heapless::Vec;

use crate::{
    frame::CanFrame,
    regs::{DlcReg, Instruction, Register, SidL},
};

/// Size of a raw Tx/Rx buffer record, `SIDH` through `D7`.
pub const RECORD_LEN: usize = 13;

/// Raw Tx/Rx buffer record.
pub type Record = [u8; RECORD_LEN];

bitflags! {
    /// Tx buffer selection for the RTS instruction.
    pub struct TxMask: u8 {
        const B0 = 0b001;
        const B1 = 0b010;
        const B2 = 0b100;
    }
}

/// Transmit buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "ufmt", derive(ufmt::derive::uDebug))]
pub enum TxBuf {
    /// Tx buffer 0.
    B0,
    /// Tx buffer 1.
    B1,
    /// Tx buffer 2.
    B2,
}

impl TxBuf {
    /// All valid options for [`TxBuf`].
    pub const ALL: [Self; 3] = [TxBuf::B0, TxBuf::B1, TxBuf::B2];

    /// Returns the `CTRL` register for the selected Tx buffer.
    pub const fn ctrl(self) -> Register {
        match self {
            TxBuf::B0 => Register::TXB0CTRL,
            TxBuf::B1 => Register::TXB1CTRL,
            TxBuf::B2 => Register::TXB2CTRL,
        }
    }

    /// Returns the `SIDH` register, start of the 13 byte record.
    pub const fn sidh(self) -> Register {
        match self {
            TxBuf::B0 => Register::TXB0SIDH,
            TxBuf::B1 => Register::TXB1SIDH,
            TxBuf::B2 => Register::TXB2SIDH,
        }
    }

    /// Returns the RTS bit for this buffer.
    pub const fn mask(self) -> TxMask {
        match self {
            TxBuf::B0 => TxMask::B0,
            TxBuf::B1 => TxMask::B1,
            TxBuf::B2 => TxMask::B2,
        }
    }

    /// Index of the buffer, 0-2.
    pub const fn index(self) -> u8 {
        self as u8
    }
}

/// Receive buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "ufmt", derive(ufmt::derive::uDebug))]
pub enum RxBuf {
    /// Rx buffer 0.
    B0,
    /// Rx buffer 1.
    B1,
}

impl RxBuf {
    /// All valid options for [`RxBuf`], in drain order.
    pub const ALL: [Self; 2] = [RxBuf::B0, RxBuf::B1];

    /// READ RX BUFFER instruction starting at `RXBnSIDH`.
    pub(crate) const fn read_instruction(self) -> Instruction {
        match self {
            RxBuf::B0 => Instruction::ReadRx0,
            RxBuf::B1 => Instruction::ReadRx1,
        }
    }
}

/// Packs an identifier into `SIDH`, `SIDL`, `EID8`, `EID0`.
///
/// In standard mode `exide` is clear and the id goes into the `sid` bits. In
/// extended mode the upper 11 bits go into `sid` and the lower 18 bits into
/// `eid`.
pub fn pack_id(id: u32, extended: bool) -> [u8; 4] {
    if extended {
        let sidl = SidL::new()
            .with_sid_lo(((id >> 18) & 0x07) as u8)
            .with_exide(true)
            .with_eid_hi(((id >> 16) & 0x03) as u8);
        [
            (id >> 21) as u8,
            sidl.into_bytes()[0],
            (id >> 8) as u8,
            id as u8,
        ]
    } else {
        let sidl = SidL::new().with_sid_lo((id & 0x07) as u8);
        [(id >> 3) as u8, sidl.into_bytes()[0], 0, 0]
    }
}

/// Encodes a frame into a Tx buffer record. Run [`CanFrame::validate`] first.
pub fn encode(frame: &CanFrame) -> Record {
    let mut record = [0u8; RECORD_LEN];
    let mut head = pack_id(frame.id, frame.extended);
    let mut dlc = DlcReg::new().with_dlc(frame.dlc & 0x0F);
    if frame.rtr {
        if frame.extended {
            dlc.set_rtr(true);
        } else {
            head[1] = SidL::from_bytes([head[1]]).with_srr(true).into_bytes()[0];
        }
    }
    record[..4].copy_from_slice(&head);
    record[4] = dlc.into_bytes()[0];
    if !frame.rtr {
        let len = frame.data.len().min(frame.dlc as usize);
        record[5..5 + len].copy_from_slice(&frame.data[..len]);
    }
    record
}

/// Decodes an Rx buffer record.
///
/// A DLC above 8 is reported as 8, matching what the chip stores.
pub fn decode(record: &Record, timestamp: u64) -> CanFrame {
    let sidl = SidL::from_bytes([record[1]]);
    let dlc_reg = DlcReg::from_bytes([record[4]]);
    let sid = ((record[0] as u32) << 3) | sidl.sid_lo() as u32;

    let (id, rtr) = if sidl.exide() {
        let eid = ((sidl.eid_hi() as u32) << 16) | ((record[2] as u32) << 8) | record[3] as u32;
        ((sid << 18) | eid, dlc_reg.rtr())
    } else {
        (sid, sidl.srr())
    };

    let dlc = dlc_reg.dlc().min(8);
    let mut data = Vec::new();
    // Capacity is 8 and `dlc` is clamped to 8, so this cannot fail.
    let _ = data.extend_from_slice(&record[5..5 + dlc as usize]);

    CanFrame {
        id,
        extended: sidl.exide(),
        rtr,
        dlc,
        data,
        timestamp,
    }
}

/// A raw Rx buffer record with the time it was drained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RxRecord {
    pub raw: Record,
    pub timestamp: u64,
}

impl RxRecord {
    pub fn decode(self) -> CanFrame {
        decode(&self.raw, self.timestamp)
    }
}
