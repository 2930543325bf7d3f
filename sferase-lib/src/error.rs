use crate::geometry::Granularity;
use thiserror::Error;

/// Convenient result type for `sferase-lib`.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("integer parse error: {0}")]
    ParseInt(#[from] std::num::ParseIntError),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("device error: {0}")]
    Device(String),

    #[error("range 0x{address:08X}+0x{len:X} exceeds device capacity 0x{capacity:X}")]
    OutOfRange { address: u32, len: u64, capacity: u64 },

    #[error("{granularity} erase at 0x{address:08X} is not aligned to 0x{size:X}")]
    Misaligned {
        granularity: Granularity,
        address: u32,
        size: u32,
    },

    #[error("flash not erased at 0x{address:08X} (read 0x{value:02X})")]
    NotErased { address: u32, value: u8 },
}

impl Error {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn device(msg: impl Into<String>) -> Self {
        Self::Device(msg.into())
    }
}
