//! Our error types for PMBus sessions.

use thiserror::Error;

use crate::session::SessionState;

pub type Result<T, I> = core::result::Result<T, Error<I>>;

/// Custom error type for PMBus communications.
///
/// `I` is the error type of the bus adapter, carried unchanged in [`Error::Bus`].
#[derive(Error, Debug)]
pub enum Error<I: embedded_io::Error> {
    #[error("Bus transfer failed")]
    Bus(I),
    #[error("PMBus protocol violation: {0}")]
    ProtocolViolation(&'static str),
    #[error("Operation not supported by the device or adapter")]
    Unsupported,
    #[error("Extended command {0:#06x} is not implemented")]
    NotImplemented(u16),
    #[error("Invalid argument")]
    InvalidArgument,
    /// The device sent a larger block than the destination can hold.
    ///
    /// The first `copied` bytes of the destination are still valid.
    #[error("Block of {declared} bytes exceeds destination, {copied} bytes copied")]
    SizeExceeded { declared: usize, copied: usize },
    #[error("No device acknowledged address {0:#04x}")]
    NoDevice(u8),
    #[error("Operation not valid while session is {0:?}")]
    InvalidState(SessionState),
}

impl<I: embedded_io::Error> Error<I> {
    /// Whether this error came from the adapter rather than from protocol handling.
    pub fn is_bus(&self) -> bool {
        matches!(self, Error::Bus(_))
    }
}
