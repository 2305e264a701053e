use core::fmt::Debug;

use embedded_hal::can::{Error as CanError, ErrorKind};

use crate::frame::FrameError;

pub type Result<T, SPIE, CSE> = core::result::Result<T, Error<SPIE, CSE>>;

#[derive(Debug, thiserror::Error)]
pub enum Error<SPIE, CSE> {
    /// `CANSTAT` read back as zero after reset; the chip is absent or not
    /// responding.
    #[error("MCP2515 did not respond after reset")]
    InitFailed,
    /// Bus speed (kbit/s) missing from the bit timing table.
    #[error("unsupported bus speed: {0} kbit/s")]
    UnsupportedSpeed(u16),
    /// Outbound frame rejected before anything was written.
    #[error("malformed frame: {0}")]
    Frame(#[from] FrameError),
    /// SPI error.
    #[error("SPI transfer failed: {0:?}")]
    Spi(SPIE),
    /// Chip-select pin error.
    #[error("chip-select pin failed: {0:?}")]
    Hal(CSE),
}

impl<SPIE: Debug, CSE: Debug> CanError for Error<SPIE, CSE> {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}
