//! This crate interrogates PMBus power-management devices: which commands a device implements,
//! how its numbers are encoded, and what its status registers say.
//!
//! It supports `no-std` environments by use of the `no-std` feature flag.
//!
//! The crate does not open buses itself. Bring an adapter implementing
//! [`SmbusAdapter`](transport::SmbusAdapter), already set up to talk to the target address, and
//! wrap it in a [`DeviceSession`](session::DeviceSession):
//!
//! ```ignore
//! let address = DeviceAddress::try_from(0x58)?;
//! let mut session = DeviceSession::open(adapter, address, SessionConfig::default())?;
//! session.scan()?;
//! for supported in session.supported_commands()? {
//!     // ...
//! }
//! let status = session.read_status()?;
//! let adapter = session.release();
//! ```
//!
//! What the crate knows about:
//! * QUERY negotiation, with COEFFICIENTS retrieval for DIRECT format commands
//! * LINEAR11, DIRECT and VOUT_MODE relative value formats
//! * STATUS_WORD/STATUS_BYTE and the detail status registers
//! * Block transfers beyond the 32 byte SMBus limit, through raw I2C messages
//!
//! Extended (two byte) commands are not supported and fail with
//! [`Error::NotImplemented`](error::Error::NotImplemented).
//!
//! Diagnostics go through the [`log`] facade; install any logger to see them.

#![cfg_attr(all(feature = "no-std", not(test)), no_std)]

pub mod catalog;
pub mod codec;
pub mod coefficients;
pub mod command;
pub mod error;
pub mod identity;
pub mod query;
pub mod session;
pub mod status;
pub mod transport;

#[cfg(test)]
mod mock_bus;
