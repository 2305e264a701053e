use embedded_hal::can::{ExtendedId, Frame, Id, StandardId};
use heapless::Vec;

/// Largest standard (11 bit) identifier.
pub const MAX_STANDARD_ID: u32 = 0x7FF;
/// Largest extended (29 bit) identifier.
pub const MAX_EXTENDED_ID: u32 = 0x1FFF_FFFF;
/// Largest data length code.
pub const MAX_DLC: u8 = 8;

/// CAN frame.
///
/// Fields are public so callers can build frames directly; [`CanFrame::validate`]
/// is run by the driver before anything is written to the chip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanFrame {
    /// Raw identifier, 11 bits for standard frames and 29 bits for extended
    /// frames.
    pub id: u32,
    /// Whether `id` is an extended identifier.
    pub extended: bool,
    /// Whether the frame is an RTR frame.
    pub rtr: bool,
    /// Declared length of data, 0-8.
    pub dlc: u8,
    /// Payload. Bytes past `dlc` are ignored on send.
    pub data: Vec<u8, 8>,
    /// Milliseconds since boot at which the frame was drained from the chip.
    /// Always zero for frames built by the caller.
    pub timestamp: u64,
}

/// Reason a frame was rejected before transmission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    #[error("standard identifier {0:#X} exceeds 0x7FF")]
    StandardIdOutOfRange(u32),
    #[error("extended identifier {0:#X} exceeds 0x1FFFFFFF")]
    ExtendedIdOutOfRange(u32),
    #[error("data length code {0} exceeds 8")]
    DlcOutOfRange(u8),
    #[error("payload holds {len} bytes but the data length code is {dlc}")]
    PayloadTooShort { dlc: u8, len: usize },
}

#[cfg(feature = "defmt")]
impl defmt::Format for CanFrame {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(
            fmt,
            "CanFrame {{ id: {:#X}, extended: {}, rtr: {}, dlc: {}, data: {:#X}, timestamp: {} }}",
            self.id,
            self.extended,
            self.rtr,
            self.dlc,
            self.data.as_slice(),
            self.timestamp
        );
    }
}

impl CanFrame {
    /// Creates a data frame from a raw identifier, checking every field.
    pub fn new_data(id: u32, extended: bool, data: &[u8]) -> Result<Self, FrameError> {
        if data.len() > MAX_DLC as usize {
            return Err(FrameError::DlcOutOfRange(data.len() as u8));
        }
        let frame = CanFrame {
            id,
            extended,
            rtr: false,
            dlc: data.len() as u8,
            data: Vec::from_slice(data).map_err(|_| FrameError::DlcOutOfRange(data.len() as u8))?,
            timestamp: 0,
        };
        frame.validate()?;
        Ok(frame)
    }

    /// Creates a remote frame requesting `dlc` bytes.
    pub fn new_rtr(id: u32, extended: bool, dlc: u8) -> Result<Self, FrameError> {
        let frame = CanFrame {
            id,
            extended,
            rtr: true,
            dlc,
            data: Vec::new(),
            timestamp: 0,
        };
        frame.validate()?;
        Ok(frame)
    }

    /// Checks identifier range, DLC range and payload length.
    pub fn validate(&self) -> Result<(), FrameError> {
        if self.extended && self.id > MAX_EXTENDED_ID {
            return Err(FrameError::ExtendedIdOutOfRange(self.id));
        }
        if !self.extended && self.id > MAX_STANDARD_ID {
            return Err(FrameError::StandardIdOutOfRange(self.id));
        }
        if self.dlc > MAX_DLC {
            return Err(FrameError::DlcOutOfRange(self.dlc));
        }
        if !self.rtr && self.data.len() < self.dlc as usize {
            return Err(FrameError::PayloadTooShort {
                dlc: self.dlc,
                len: self.data.len(),
            });
        }
        Ok(())
    }
}

impl Frame for CanFrame {
    fn new(id: impl Into<Id>, data: &[u8]) -> Option<Self> {
        let (id, extended) = split_id(id.into());
        CanFrame::new_data(id, extended, data).ok()
    }

    fn new_remote(id: impl Into<Id>, dlc: usize) -> Option<Self> {
        if dlc > MAX_DLC as usize {
            return None;
        }
        let (id, extended) = split_id(id.into());
        CanFrame::new_rtr(id, extended, dlc as u8).ok()
    }

    #[inline]
    fn is_extended(&self) -> bool {
        self.extended
    }

    #[inline]
    fn is_remote_frame(&self) -> bool {
        self.rtr
    }

    fn id(&self) -> Id {
        // Out of range identifiers are masked; `validate` rejects them before send.
        if self.extended {
            ExtendedId::new(self.id & MAX_EXTENDED_ID)
                .map(Id::Extended)
                .unwrap_or(Id::Extended(ExtendedId::ZERO))
        } else {
            StandardId::new((self.id & MAX_STANDARD_ID) as u16)
                .map(Id::Standard)
                .unwrap_or(Id::Standard(StandardId::ZERO))
        }
    }

    #[inline]
    fn dlc(&self) -> usize {
        self.dlc as usize
    }

    #[inline]
    fn data(&self) -> &[u8] {
        let len = self.data.len().min(self.dlc());
        &self.data[..len]
    }
}

/// Splits an [`Id`] into its raw value and extended flag.
pub(crate) fn split_id(id: Id) -> (u32, bool) {
    match id {
        Id::Standard(id) => (id.as_raw() as u32, false),
        Id::Extended(id) => (id.as_raw(), true),
    }
}
