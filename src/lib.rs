#![cfg_attr(not(test), no_std)]

extern crate alloc;

#[macro_use]
mod macros;

pub mod buffer;
pub mod error;
pub mod filter;
pub mod frame;
pub mod pins;
pub mod regs;
pub mod stat;
pub mod timing;

#[cfg(test)]
pub(crate) mod mocks;

use alloc::collections::VecDeque;
use core::fmt::Debug;

use buffer::{RxBuf, RxRecord, TxBuf, TxMask, RECORD_LEN};
use embedded_hal::{
    blocking::{delay::DelayMs, spi::Transfer},
    digital::v2::OutputPin,
};
use filter::{FilterConfig, RxFilter, RxMask};
use frame::CanFrame;
use regs::{Instruction, OpMode, Register};
use stat::Status;
use timing::CanSpeed;

use crate::{
    error::{Error, Result},
    regs::{CanCtrl, CanStat, Eflg, RecvBufOpMode, Rxb0Ctrl, Rxb1Ctrl, TxbCtrl},
};

/// Time the chip is given to come out of reset before `CANSTAT` is checked.
pub const RESET_SETTLE_MS: u8 = 200;

/// Millisecond time source used to timestamp received frames.
pub trait Clock {
    /// Milliseconds since boot. Wrap-around is not corrected.
    fn now_ms(&mut self) -> u64;
}

impl<F: FnMut() -> u64> Clock for F {
    #[inline]
    fn now_ms(&mut self) -> u64 {
        self()
    }
}

/// Settings used to start the MCP2515.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    /// Bus speed in kbit/s. Must be one of [`CanSpeed::ALL`].
    pub speed_kbps: u16,
    /// Acceptance filter for Rx buffer 0. `None` accepts every frame on both
    /// Rx buffers.
    pub filter: Option<FilterConfig>,
    /// Start in listen-only mode instead of normal mode.
    pub listen_only: bool,
}

impl Settings {
    pub fn new(speed_kbps: u16) -> Self {
        Self {
            speed_kbps,
            ..Self::default()
        }
    }

    pub fn with_filter(self, filter: FilterConfig) -> Self {
        Self {
            filter: Some(filter),
            ..self
        }
    }

    pub fn with_listen_only(self, listen_only: bool) -> Self {
        Self {
            listen_only,
            ..self
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            speed_kbps: CanSpeed::Kbps125.kbps(),
            filter: None,
            listen_only: false,
        }
    }
}

/// MCP2515 driver.
///
/// Owns the SPI interface, the chip-select pin and all controller state. Calls
/// are not reentrant; share the driver between contexts behind a mutex.
pub struct MCP2515<SPI, CS, CLK> {
    /// SPI interface to interact with the MCP2515.
    spi: SPI,
    /// Chip select pin to select the MCP2515.
    cs: CS,
    /// Time source for receive timestamps.
    clock: CLK,
    /// Last operation mode requested.
    mode: OpMode,
    /// Filter applied by the last `start`.
    filter: Option<FilterConfig>,
    /// Drained but not yet returned frames, oldest first.
    rx_queue: VecDeque<RxRecord>,
    /// Rx buffer overflows seen in `EFLG`.
    overflows: u32,
}

impl<SPI, CS, CLK, SPIE, CSE> MCP2515<SPI, CS, CLK>
where
    SPI: Transfer<u8, Error = SPIE>,
    CS: OutputPin<Error = CSE>,
    CLK: Clock,
    SPIE: Debug,
    CSE: Debug,
{
    /// Creates a new MCP2515 driver. Nothing is sent to the chip until
    /// [`MCP2515::init`].
    ///
    /// # Configuration
    ///
    /// As this driver only takes ownership of the SPI interface, it is up to
    /// the user to create and configure the SPI interface. Namely, the MCP2515
    /// requires the following options:
    ///
    /// * **Data Order**: MSB first.
    /// * **Clock**: Up to 10 MHz.
    /// * **Mode**: Mode 0.
    ///
    /// The bit timing table assumes a 16 MHz oscillator on the MCP2515.
    ///
    /// # Parameters
    ///
    /// * `spi` - SPI interface.
    /// * `cs` - Chip-select pin for the MCP2515.
    /// * `clock` - Millisecond clock used to timestamp received frames.
    pub fn new(spi: SPI, cs: CS, clock: CLK) -> Self {
        Self {
            spi,
            cs,
            clock,
            mode: OpMode::Configuration,
            filter: None,
            rx_queue: VecDeque::new(),
            overflows: 0,
        }
    }

    /// Releases the SPI interface, chip-select pin and clock.
    pub fn release(self) -> (SPI, CS, CLK) {
        (self.spi, self.cs, self.clock)
    }

    /// Resets the chip and checks that it responds. This should be called
    /// once at the start of the program, before [`MCP2515::start`].
    ///
    /// The check only rejects an all-zero `CANSTAT`, which is what an absent
    /// chip (MISO floating low) reads as.
    pub fn init(&mut self, delay: &mut impl DelayMs<u8>) -> Result<(), SPIE, CSE> {
        self.cs.set_high().map_err(Error::Hal)?;
        self.reset()?;
        delay.delay_ms(RESET_SETTLE_MS);

        let canstat: CanStat = self.read_register()?;
        if canstat.into_bytes()[0] == 0 {
            log_warn!("MCP2515 init failed, CANSTAT read back 0");
            return Err(Error::InitFailed);
        }
        self.mode = OpMode::Configuration;
        log_debug!("MCP2515 initialized");
        Ok(())
    }

    /// Configures bit timing and acceptance filters, then leaves configuration
    /// mode.
    ///
    /// The chip is always reset and put into configuration mode first, so this
    /// can be called again from any mode to reconfigure.
    ///
    /// # Parameters
    ///
    /// * `settings` - See [`Settings`].
    pub fn start(&mut self, settings: Settings) -> Result<(), SPIE, CSE> {
        let speed = CanSpeed::from_kbps(settings.speed_kbps)
            .ok_or(Error::UnsupportedSpeed(settings.speed_kbps))?;

        self.reset()?;
        self.set_mode(OpMode::Configuration)?;
        self.write_registers(Register::CNF3, &speed.timing())?;

        match &settings.filter {
            None => {
                // Rx buffer 0 rolls over into Rx buffer 1, both take any frame.
                self.modify_register(
                    Rxb0Ctrl::new()
                        .with_rxm(RecvBufOpMode::FilterOff)
                        .with_bukt(true),
                    Rxb0Ctrl::MASK_RXM | Rxb0Ctrl::MASK_BUKT,
                )?;
                self.modify_register(
                    Rxb1Ctrl::new().with_rxm(RecvBufOpMode::FilterOff),
                    Rxb1Ctrl::MASK_RXM,
                )?;
                self.write_registers(RxMask::Mask0.sidh(), &filter::ACCEPT_ALL)?;
                self.write_registers(RxMask::Mask1.sidh(), &filter::ACCEPT_ALL)?;
            }
            Some(config) => {
                self.modify_register(
                    Rxb0Ctrl::new()
                        .with_rxm(RecvBufOpMode::FilterOn)
                        .with_bukt(true),
                    Rxb0Ctrl::MASK_RXM | Rxb0Ctrl::MASK_BUKT,
                )?;
                self.write_registers(RxFilter::F0.sidh(), &filter::filter_bytes(config.filter0))?;
                self.write_registers(RxFilter::F1.sidh(), &filter::filter_bytes(config.filter1))?;
                self.write_registers(RxMask::Mask0.sidh(), &filter::mask_bytes(config.mask0))?;

                // Rx buffer 1 has no filter support of its own.
                self.modify_register(
                    Rxb1Ctrl::new().with_rxm(RecvBufOpMode::FilterOn),
                    Rxb1Ctrl::MASK_RXM,
                )?;
                self.write_registers(RxMask::Mask1.sidh(), &filter::REJECT_ALL)?;
            }
        }

        // Filters 2-5 power up undefined and only serve Rx buffer 1.
        let rxb1_filter = if settings.filter.is_some() {
            filter::REJECT_ALL
        } else {
            filter::ACCEPT_ALL
        };
        for filt in RxFilter::RXB1 {
            self.write_registers(filt.sidh(), &rxb1_filter)?;
        }

        self.filter = settings.filter;
        log_debug!(
            "MCP2515 started at {} kbit/s, listen-only: {}, filtered: {}",
            speed.kbps(),
            settings.listen_only,
            settings.filter.is_some()
        );

        self.set_mode(if settings.listen_only {
            OpMode::ListenOnly
        } else {
            OpMode::Normal
        })
    }

    /// Puts the chip to sleep.
    pub fn stop(&mut self) -> Result<(), SPIE, CSE> {
        self.set_mode(OpMode::Sleep)
    }

    /// Requests a new operation mode.
    ///
    /// The request is not confirmed against `CANSTAT`.
    ///
    /// # Parameters
    ///
    /// * `mode` - New device mode.
    pub fn set_mode(&mut self, mode: OpMode) -> Result<(), SPIE, CSE> {
        self.modify_register(CanCtrl::new().with_reqop(mode), CanCtrl::MASK_REQOP)?;
        self.mode = mode;
        log_trace!("MCP2515 mode request {}", CanCtrl::new().with_reqop(mode).into_bytes()[0]);
        Ok(())
    }

    /// Last operation mode requested.
    #[inline]
    pub fn mode(&self) -> OpMode {
        self.mode
    }

    /// Filter applied by the last [`MCP2515::start`].
    #[inline]
    pub fn filter(&self) -> Option<&FilterConfig> {
        self.filter.as_ref()
    }

    /// Sends a CAN frame via Tx buffer 0.
    ///
    /// # Parameters
    ///
    /// * `frame` - Frame to send.
    #[inline]
    pub fn send(&mut self, frame: &CanFrame) -> Result<(), SPIE, CSE> {
        self.send_via(frame, TxBuf::B0)
    }

    /// Sends a CAN frame via a specific Tx buffer.
    ///
    /// Any frame still pending in `buf` is aborted and replaced. Success means
    /// the frame was loaded and transmission was requested, not that it made
    /// it onto the bus.
    ///
    /// # Parameters
    ///
    /// * `frame` - Frame to send.
    /// * `buf` - Tx buffer to use for transmission.
    pub fn send_via(&mut self, frame: &CanFrame, buf: TxBuf) -> Result<(), SPIE, CSE> {
        frame.validate()?;

        // Clear `txreq` to abort whatever is pending.
        self.modify_bits(buf.ctrl(), TxbCtrl::MASK_TXREQ.into_bytes()[0], 0)?;
        self.write_registers(buf.sidh(), &buffer::encode(frame))?;
        self.request_to_send(buf.mask())?;

        log_trace!("MCP2515 queued id {:#x} on Tx buffer {}", frame.id, buf.index());
        Ok(())
    }

    /// Returns the oldest received frame, draining the chip first if nothing
    /// is queued. `None` means no frame is available.
    pub fn receive(&mut self) -> Result<Option<CanFrame>, SPIE, CSE> {
        if self.rx_queue.is_empty() {
            self.poll()?;
        }
        Ok(self.rx_queue.pop_front().map(RxRecord::decode))
    }

    /// Drains both Rx buffers into the receive queue, Rx buffer 0 first.
    ///
    /// Call this often enough that the two hardware buffers do not overflow.
    ///
    /// # Returns
    ///
    /// Whether an Rx buffer overflow was flagged since the last poll. Each
    /// flagged buffer also bumps [`MCP2515::overflows`].
    pub fn poll(&mut self) -> Result<bool, SPIE, CSE> {
        let status = self.read_status()?;
        let queued = self.rx_queue.len();
        for buf in RxBuf::ALL {
            if status.rx_pending(buf) {
                let raw = self.read_rx_buffer(buf)?;
                let timestamp = self.clock.now_ms();
                self.rx_queue.push_back(RxRecord { raw, timestamp });
            }
        }
        if self.rx_queue.len() > queued {
            log_trace!(
                "MCP2515 drained {} frames, {} queued",
                self.rx_queue.len() - queued,
                self.rx_queue.len()
            );
        }

        let eflg: Eflg = self.read_register()?;
        let lost = eflg.rx0ovr() as u32 + eflg.rx1ovr() as u32;
        if lost > 0 {
            self.overflows = self.overflows.saturating_add(lost);
            log_warn!("MCP2515 Rx buffer overflow, {} total", self.overflows);
            self.modify_register(Eflg::new(), Eflg::MASK_RXOVR)?;
        }
        Ok(lost > 0)
    }

    /// Number of received frames waiting in the queue.
    #[inline]
    pub fn pending(&self) -> usize {
        self.rx_queue.len()
    }

    /// Number of Rx buffer overflows observed so far.
    #[inline]
    pub fn overflows(&self) -> u32 {
        self.overflows
    }

    /// Resets the overflow counter, returning its previous value.
    pub fn clear_overflows(&mut self) -> u32 {
        core::mem::take(&mut self.overflows)
    }

    /// Resets the MCP2515, which also enters configuration mode.
    pub fn reset(&mut self) -> Result<(), SPIE, CSE> {
        self.transfer(&mut [Instruction::Reset as u8])?;
        self.mode = OpMode::Configuration;
        Ok(())
    }

    /// Reads the status register.
    pub fn read_status(&mut self) -> Result<Status, SPIE, CSE> {
        let mut data = [Instruction::ReadStatus as u8, 0];
        self.transfer(&mut data)
            .map(|b| [b])
            .map(Status::from_bytes)
    }

    /// Reads a whole Rx buffer record, `SIDH` through `D7`. The chip clears the
    /// matching `RXnIF` flag when chip select is released.
    pub fn read_rx_buffer(&mut self, buf: RxBuf) -> Result<[u8; RECORD_LEN], SPIE, CSE> {
        let mut hdr = [buf.read_instruction() as u8];
        let mut ret = [0u8; RECORD_LEN];
        self.with_cs(|spi| -> core::result::Result<_, SPIE> {
            spi.transfer(&mut hdr)?;
            spi.transfer(&mut ret)?;
            Ok(())
        })?
        .map_err(Error::Spi)?;
        Ok(ret)
    }

    /// Requests transmission of the Tx buffers in `mask`.
    pub fn request_to_send(&mut self, mask: TxMask) -> Result<(), SPIE, CSE> {
        self.transfer(&mut [Instruction::Rts as u8 | mask.bits()])?;
        Ok(())
    }

    /// Read a register via a register object.
    #[inline]
    pub fn read_register<R: regs::Reg>(&mut self) -> Result<R, SPIE, CSE> {
        let mut ret = [0u8; 1];
        self.read_registers(R::ADDRESS, &mut ret)?;
        Ok(R::read(ret[0]))
    }

    /// Reads registers starting from `reg` sequentially, moving on to the next
    /// register until `ret` is full.
    ///
    /// # Parameters
    ///
    /// * `reg` - Register to start reading from.
    /// * `ret` - Return slice to write into.
    pub fn read_registers(&mut self, reg: Register, ret: &mut [u8]) -> Result<(), SPIE, CSE> {
        let mut hdr = [Instruction::Read as u8, reg as u8];
        // The MCP2515 ignores what is clocked out during a read.
        ret.fill(0);
        self.with_cs(|spi| -> core::result::Result<_, SPIE> {
            spi.transfer(&mut hdr)?;
            spi.transfer(ret)?;
            Ok(())
        })?
        .map_err(Error::Spi)
    }

    /// Write to a register using a register object.
    #[inline]
    pub fn write_register<R: regs::Reg>(&mut self, reg: R) -> Result<(), SPIE, CSE> {
        self.write_registers(R::ADDRESS, &[reg.write()])
    }

    /// Writes to sequential registers. Writing will start at `reg` and continue
    /// sequentially until `data` is empty.
    pub fn write_registers(&mut self, reg: Register, data: &[u8]) -> Result<(), SPIE, CSE> {
        let mut hdr = [Instruction::Write as u8, reg as u8];
        self.with_cs(|spi| -> core::result::Result<_, SPIE> {
            spi.transfer(&mut hdr)?;
            for d in data {
                let mut data = [*d];
                spi.transfer(&mut data)?;
            }
            Ok(())
        })?
        .map_err(Error::Spi)
    }

    /// Modifies a register.
    ///
    /// # Parameters
    ///
    /// * `reg` - New register content.
    /// * `mask` - Mask register. The bits must be 1 in the positions you want
    ///   to modify.
    #[inline]
    pub fn modify_register<R: regs::BitModifiable>(
        &mut self,
        reg: R,
        mask: R,
    ) -> Result<(), SPIE, CSE> {
        self.modify_bits(R::ADDRESS, mask.write(), reg.write())
    }

    /// BIT MODIFY instruction. The chip computes
    /// `reg = (reg & !mask) | (value & mask)`.
    pub fn modify_bits(&mut self, reg: Register, mask: u8, value: u8) -> Result<(), SPIE, CSE> {
        let mut data = [
            Instruction::Bitmod as u8, // BIT MODIFY
            reg as u8,                 // Register address
            mask,                      // Modify mask byte
            value,                     // Data byte
        ];
        self.transfer(&mut data)?;
        Ok(())
    }

    /// Transfers an array of bytes via SPI, returning the slave response inside
    /// the given mutable bytes array.
    ///
    /// # Returns
    ///
    /// Returns the last element received from the slave. If no bytes were sent,
    /// 0 is returned.
    fn transfer(&mut self, bytes: &mut [u8]) -> Result<u8, SPIE, CSE> {
        self.with_cs(|spi| spi.transfer(bytes).map(|b| b.last().copied().unwrap_or(0)))?
            .map_err(Error::Spi)
    }

    /// Calls a function `f` after bringing the chip select pin low, restoring
    /// it to high after the function has finished, whether or not it failed.
    fn with_cs<T>(&mut self, f: impl FnOnce(&mut SPI) -> T) -> Result<T, SPIE, CSE> {
        self.cs.set_low().map_err(Error::Hal)?;
        let result = f(&mut self.spi);
        self.cs.set_high().map_err(Error::Hal)?;
        Ok(result)
    }
}

impl<SPI, CS, CLK, SPIE, CSE> embedded_hal::can::nb::Can for MCP2515<SPI, CS, CLK>
where
    SPI: Transfer<u8, Error = SPIE>,
    CS: OutputPin<Error = CSE>,
    CLK: Clock,
    SPIE: Debug,
    CSE: Debug,
{
    type Frame = CanFrame;
    type Error = Error<SPIE, CSE>;

    /// Always replaces the frame in Tx buffer 0, so nothing is ever handed
    /// back.
    fn transmit(&mut self, frame: &Self::Frame) -> nb::Result<Option<Self::Frame>, Self::Error> {
        self.send(frame)?;
        Ok(None)
    }

    fn receive(&mut self) -> nb::Result<Self::Frame, Self::Error> {
        MCP2515::receive(self)?.ok_or(nb::Error::WouldBlock)
    }
}

impl<SPI, CS, CLK, SPIE, CSE> embedded_hal::blocking::can::Can for MCP2515<SPI, CS, CLK>
where
    SPI: Transfer<u8, Error = SPIE>,
    CS: OutputPin<Error = CSE>,
    CLK: Clock,
    SPIE: Debug,
    CSE: Debug,
{
    type Frame = CanFrame;
    type Error = Error<SPIE, CSE>;

    #[inline]
    fn transmit(&mut self, frame: &Self::Frame) -> Result<(), SPIE, CSE> {
        self.send(frame)
    }

    /// Polls the chip until a frame arrives.
    fn receive(&mut self) -> Result<Self::Frame, SPIE, CSE> {
        nb::block!(embedded_hal::can::nb::Can::receive(self))
    }
}
