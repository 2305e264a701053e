//! Simulated MCP2515 behind `Transfer<u8>` and `OutputPin`, for driver tests.

use core::cell::{Cell, RefCell};
use std::{rc::Rc, vec::Vec};

use embedded_hal::{blocking::spi::Transfer, digital::v2::OutputPin};

use crate::{regs::Register, Clock};

/// Injected SPI failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpiFault;

/// Register file and bus bookkeeping of the simulated chip.
#[derive(Debug)]
pub struct ChipState {
    pub regs: [u8; 128],
    /// Chip select currently asserted.
    pub selected: bool,
    /// Bytes clocked in during the current select window.
    cmd: Vec<u8>,
    /// Every completed select window, in order.
    pub commands: Vec<Vec<u8>>,
    /// `(buffer index, SIDH..D7)` for every buffer an RTS was issued for.
    pub sent: Vec<(u8, [u8; 13])>,
    /// MISO stuck low, as with no chip fitted.
    pub absent: bool,
    /// Fail the next SPI transfer.
    pub fail_next: bool,
}

impl ChipState {
    fn new() -> Self {
        let mut state = ChipState {
            regs: [0; 128],
            selected: false,
            cmd: Vec::new(),
            commands: Vec::new(),
            sent: Vec::new(),
            absent: false,
            fail_next: false,
        };
        state.power_on();
        state
    }

    fn power_on(&mut self) {
        self.regs = [0; 128];
        self.regs[Register::CANSTAT as usize] = 0x80;
        self.regs[Register::CANCTRL as usize] = 0x87;
    }

    pub fn reg(&self, reg: Register) -> u8 {
        self.regs[reg as usize]
    }

    pub fn block(&self, reg: Register, len: usize) -> &[u8] {
        &self.regs[reg as usize..reg as usize + len]
    }

    fn config_mode(&self) -> bool {
        self.regs[Register::CANSTAT as usize] >> 5 == 0b100
    }

    /// Register writes outside configuration mode are dropped for the
    /// configuration-only registers.
    fn store(&mut self, addr: u8, value: u8) {
        let addr = addr as usize & 0x7F;
        let config_only = addr < 0x0C
            || (0x10..0x1C).contains(&addr)
            || (0x20..0x2B).contains(&addr);
        if config_only && !self.config_mode() {
            return;
        }
        self.regs[addr] = value;
        if addr == Register::CANCTRL as usize {
            let canstat = &mut self.regs[Register::CANSTAT as usize];
            *canstat = (*canstat & 0x1F) | (value & 0xE0);
        }
    }

    fn status(&self) -> u8 {
        let intf = self.reg(Register::CANINTF);
        let txreq = |r: Register| (self.reg(r) >> 3) & 1;
        (intf & 0x01)
            | (intf & 0x02)
            | txreq(Register::TXB0CTRL) << 2
            | ((intf >> 2) & 1) << 3
            | txreq(Register::TXB1CTRL) << 4
            | ((intf >> 3) & 1) << 5
            | txreq(Register::TXB2CTRL) << 6
            | ((intf >> 4) & 1) << 7
    }

    /// Clocks one byte in, returning the byte clocked out.
    fn clock_byte(&mut self, mosi: u8) -> u8 {
        let idx = self.cmd.len();
        self.cmd.push(mosi);
        let op = self.cmd[0];
        let miso = match (op, idx) {
            (_, 0) => 0,
            (0x03, 1) | (0x02, 1) | (0x05, 1) | (0x05, 2) => 0,
            (0x03, n) => self.regs[(self.cmd[1] as usize + n - 2) & 0x7F],
            (0x02, n) => {
                self.store(self.cmd[1].wrapping_add((n - 2) as u8), mosi);
                0
            }
            (0x05, 3) => {
                let (addr, mask) = (self.cmd[1], self.cmd[2]);
                let old = self.regs[addr as usize & 0x7F];
                self.store(addr, (old & !mask) | (mosi & mask));
                0
            }
            (0xA0, _) => self.status(),
            (0x90, n) => self.regs[Register::RXB0SIDH as usize + n - 1],
            (0x94, n) => self.regs[Register::RXB1SIDH as usize + n - 1],
            _ => 0,
        };
        if self.absent {
            0
        } else {
            miso
        }
    }

    fn finish(&mut self) {
        let cmd = core::mem::take(&mut self.cmd);
        match cmd.first() {
            Some(0xC0) => self.power_on(),
            Some(0x90) => self.regs[Register::CANINTF as usize] &= !0x01,
            Some(0x94) => self.regs[Register::CANINTF as usize] &= !0x02,
            Some(&op) if op & 0xF8 == 0x80 => {
                for (i, ctrl) in [0x30usize, 0x40, 0x50].into_iter().enumerate() {
                    if op & (1 << i) != 0 {
                        self.regs[ctrl] |= 0x08;
                        let mut record = [0u8; 13];
                        record.copy_from_slice(&self.regs[ctrl + 1..ctrl + 14]);
                        self.sent.push((i as u8, record));
                    }
                }
            }
            _ => {}
        }
        self.commands.push(cmd);
    }

    /// A frame arrives in Rx buffer `buf`. If the buffer is still full the
    /// frame is lost and the overflow flag is raised.
    pub fn deliver(&mut self, buf: u8, record: [u8; 13]) {
        let (flag, base, ovr) = match buf {
            0 => (0x01, Register::RXB0SIDH as usize, 0x40),
            _ => (0x02, Register::RXB1SIDH as usize, 0x80),
        };
        if self.regs[Register::CANINTF as usize] & flag != 0 {
            self.regs[Register::EFLG as usize] |= ovr;
            return;
        }
        self.regs[base..base + 13].copy_from_slice(&record);
        self.regs[Register::CANINTF as usize] |= flag;
    }

    /// Writes issued since the last call to [`ChipState::clear_commands`]
    /// that can change register content.
    pub fn mutating_commands(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c.first(), Some(0x02) | Some(0x05) | Some(0xC0)))
            .count()
    }

    pub fn clear_commands(&mut self) {
        self.commands.clear();
        self.sent.clear();
    }
}

pub type Shared = Rc<RefCell<ChipState>>;

pub struct FakeSpi(pub Shared);

impl Transfer<u8> for FakeSpi {
    type Error = SpiFault;

    fn transfer<'w>(&mut self, words: &'w mut [u8]) -> Result<&'w [u8], SpiFault> {
        let mut chip = self.0.borrow_mut();
        assert!(chip.selected, "SPI transfer without chip select");
        if core::mem::take(&mut chip.fail_next) {
            return Err(SpiFault);
        }
        for word in words.iter_mut() {
            *word = chip.clock_byte(*word);
        }
        Ok(words)
    }
}

pub struct FakeCs(pub Shared);

impl OutputPin for FakeCs {
    type Error = SpiFault;

    fn set_low(&mut self) -> Result<(), SpiFault> {
        let mut chip = self.0.borrow_mut();
        assert!(!chip.selected, "chip select asserted twice");
        chip.selected = true;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), SpiFault> {
        let mut chip = self.0.borrow_mut();
        if chip.selected {
            chip.selected = false;
            chip.finish();
        }
        Ok(())
    }
}

/// Manually advanced millisecond clock.
#[derive(Clone, Default)]
pub struct FakeClock(pub Rc<Cell<u64>>);

impl FakeClock {
    pub fn advance(&self, ms: u64) {
        self.0.set(self.0.get() + ms);
    }
}

impl Clock for FakeClock {
    fn now_ms(&mut self) -> u64 {
        self.0.get()
    }
}

pub type TestDriver = crate::MCP2515<FakeSpi, FakeCs, FakeClock>;

/// A driver wired to a fresh simulated chip.
pub fn driver() -> (TestDriver, Shared, FakeClock) {
    let chip = Rc::new(RefCell::new(ChipState::new()));
    let clock = FakeClock::default();
    let can = crate::MCP2515::new(FakeSpi(chip.clone()), FakeCs(chip.clone()), clock.clone());
    (can, chip, clock)
}

pub struct NoDelay;

impl embedded_hal::blocking::delay::DelayMs<u8> for NoDelay {
    fn delay_ms(&mut self, _ms: u8) {}
}
