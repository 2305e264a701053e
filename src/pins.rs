//! `RXnBF` and `TXnRTS` pins used as general purpose I/O.

use core::fmt::Debug;

use embedded_hal::{blocking::spi::Transfer, digital::v2::OutputPin};

use crate::{
    error::Result,
    regs::{BfpCtrl, TxRtsCtrl},
    Clock, MCP2515,
};

/// `RXnBF` pin. Signals Rx buffer full by default, can be turned into a
/// digital output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "ufmt", derive(ufmt::derive::uDebug))]
pub enum BfPin {
    Rx0Bf,
    Rx1Bf,
}

impl BfPin {
    /// `BnBFM`, `BnBFE` and `BnBFS` bits of this pin.
    fn bits(self) -> BfpCtrl {
        match self {
            BfPin::Rx0Bf => BfpCtrl::new().with_b0bfm(true).with_b0bfe(true).with_b0bfs(true),
            BfPin::Rx1Bf => BfpCtrl::new().with_b1bfm(true).with_b1bfe(true).with_b1bfs(true),
        }
    }

    fn output(self, high: bool) -> BfpCtrl {
        match self {
            BfPin::Rx0Bf => BfpCtrl::new().with_b0bfe(true).with_b0bfs(high),
            BfPin::Rx1Bf => BfpCtrl::new().with_b1bfe(true).with_b1bfs(high),
        }
    }

    fn interrupt(self) -> BfpCtrl {
        match self {
            BfPin::Rx0Bf => BfpCtrl::new().with_b0bfm(true).with_b0bfe(true),
            BfPin::Rx1Bf => BfpCtrl::new().with_b1bfm(true).with_b1bfe(true),
        }
    }
}

/// `TXnRTS` pin. Triggers transmission by default, can be read as a digital
/// input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "ufmt", derive(ufmt::derive::uDebug))]
pub enum RtsPin {
    Tx0Rts,
    Tx1Rts,
    Tx2Rts,
}

impl RtsPin {
    fn mode_bit(self) -> TxRtsCtrl {
        match self {
            RtsPin::Tx0Rts => TxRtsCtrl::new().with_b0rtsm(true),
            RtsPin::Tx1Rts => TxRtsCtrl::new().with_b1rtsm(true),
            RtsPin::Tx2Rts => TxRtsCtrl::new().with_b2rtsm(true),
        }
    }

    fn level(self, reg: TxRtsCtrl) -> bool {
        match self {
            RtsPin::Tx0Rts => reg.b0rts(),
            RtsPin::Tx1Rts => reg.b1rts(),
            RtsPin::Tx2Rts => reg.b2rts(),
        }
    }
}

impl<SPI, CS, CLK, SPIE, CSE> MCP2515<SPI, CS, CLK>
where
    SPI: Transfer<u8, Error = SPIE>,
    CS: OutputPin<Error = CSE>,
    CLK: Clock,
    SPIE: Debug,
    CSE: Debug,
{
    /// Drives an `RXnBF` pin as a digital output. Buffer-full signalling on
    /// that pin stops until [`MCP2515::set_aux_interrupt`].
    pub fn set_aux_output(&mut self, pin: BfPin, high: bool) -> Result<(), SPIE, CSE> {
        self.modify_register(pin.output(high), pin.bits())
    }

    /// Returns the level an `RXnBF` pin is driven to in output mode.
    pub fn read_aux_output(&mut self, pin: BfPin) -> Result<bool, SPIE, CSE> {
        let reg: BfpCtrl = self.read_register()?;
        Ok(match pin {
            BfPin::Rx0Bf => reg.b0bfs(),
            BfPin::Rx1Bf => reg.b1bfs(),
        })
    }

    /// Returns an `RXnBF` pin to signalling its Rx buffer is full.
    pub fn set_aux_interrupt(&mut self, pin: BfPin) -> Result<(), SPIE, CSE> {
        self.modify_register(pin.interrupt(), pin.bits())
    }

    /// Reads a `TXnRTS` pin as a digital input.
    ///
    /// The pin is switched out of request-to-send mode first. The chip only
    /// accepts that change in configuration mode; otherwise the level is read
    /// as is.
    pub fn read_aux_input(&mut self, pin: RtsPin) -> Result<bool, SPIE, CSE> {
        self.modify_register(TxRtsCtrl::new(), pin.mode_bit())?;
        let reg: TxRtsCtrl = self.read_register()?;
        Ok(pin.level(reg))
    }
}
