use modular_bitfield::prelude::*;

use crate::buffer::RxBuf;

/// Response byte of the READ STATUS instruction.
#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status {
    #[skip(setters)]
    pub rx0if: bool,
    #[skip(setters)]
    pub rx1if: bool,
    #[skip(setters)]
    pub tx0req: bool,
    #[skip(setters)]
    pub tx0if: bool,
    #[skip(setters)]
    pub tx1req: bool,
    #[skip(setters)]
    pub tx1if: bool,
    #[skip(setters)]
    pub tx2req: bool,
    #[skip(setters)]
    pub tx2if: bool,
}

impl Status {
    /// Whether `buf` holds a received frame that has not been read yet.
    pub fn rx_pending(&self, buf: RxBuf) -> bool {
        match buf {
            RxBuf::B0 => self.rx0if(),
            RxBuf::B1 => self.rx1if(),
        }
    }
}
