//! SMBus/PMBus transport: typed access to a bus adapter plus the raw I2C fallback path.
//!
//! Block transfers have two backends. [`Backend::Smbus`] uses the adapter's native length-prefixed
//! primitives, which are limited to [`SMBUS_BLOCK_MAX`] bytes. [`Backend::RawI2c`] builds the same
//! frames by hand out of raw I2C messages. Which backends are usable is decided once, from the
//! adapter's [`Functionality`], when the [`Transport`] is created.

use embedded_io::Error as _;
use log::{debug, warn};
use modular_bitfield::prelude::*;

use crate::{
    command::{is_core, uses_extended_path},
    error::{Error, Result},
};

/// Largest data block a single SMBus block transaction can carry.
pub const SMBUS_BLOCK_MAX: usize = 32;
/// Largest PMBus block (the length prefix is one byte).
pub const PMBUS_BLOCK_MAX: usize = 255;

/// What an adapter can do. Mirrors the Linux `I2C_FUNC_*` bits we care about.
#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Functionality {
    /// SMBus quick command.
    pub quick: bool,
    /// Send byte (command code only).
    pub send_byte: bool,
    pub byte_data: bool,
    pub word_data: bool,
    /// SMBus process call (write word, read word).
    pub proc_call: bool,
    /// SMBus block read.
    pub read_block: bool,
    /// SMBus block write.
    pub write_block: bool,
    /// SMBus block process call.
    pub block_proc_call: bool,
    /// Raw I2C messages with repeated start.
    pub i2c: bool,
    /// Packet error checking.
    pub pec: bool,
    #[skip]
    __: B6,
}

impl Functionality {
    /// Adapter with every capability, mostly useful for tests and simulators.
    pub fn all() -> Self {
        Self::new()
            .with_quick(true)
            .with_send_byte(true)
            .with_byte_data(true)
            .with_word_data(true)
            .with_proc_call(true)
            .with_read_block(true)
            .with_write_block(true)
            .with_block_proc_call(true)
            .with_i2c(true)
            .with_pec(true)
    }

    /// Minimal SMBus support is almost enough for PMBus. Block reads and block process calls
    /// must be possible natively or through raw I2C messages.
    pub fn supports_pmbus(&self) -> bool {
        self.byte_data()
            && self.word_data()
            && self.proc_call()
            && (self.read_block() || self.i2c())
            && (self.block_proc_call() || self.i2c())
    }
}

/// The bus adapter consumed by this crate.
///
/// All SMBus methods address the device the adapter was attached to during process setup.
/// Raw I2C transfers take the address explicitly.
pub trait SmbusAdapter: embedded_io::ErrorType {
    /// Capabilities of this adapter. Must not change over the adapter's lifetime.
    fn functionality(&self) -> Functionality;

    /// Enable or disable packet error checking for subsequent SMBus transactions.
    fn set_pec(&mut self, enable: bool) -> core::result::Result<(), Self::Error>;

    /// Quick command with the write bit. Returns `false` if the address was not acknowledged.
    fn quick_write(&mut self) -> core::result::Result<bool, Self::Error>;

    fn send_byte(&mut self, command: u8) -> core::result::Result<(), Self::Error>;

    fn read_byte_data(&mut self, command: u8) -> core::result::Result<u8, Self::Error>;

    fn write_byte_data(&mut self, command: u8, value: u8) -> core::result::Result<(), Self::Error>;

    /// Word data; the adapter takes care of byte ordering.
    fn read_word_data(&mut self, command: u8) -> core::result::Result<u16, Self::Error>;

    fn write_word_data(&mut self, command: u8, value: u16) -> core::result::Result<(), Self::Error>;

    /// Write a word, read a word back in the same transaction.
    fn process_call(&mut self, command: u8, value: u16) -> core::result::Result<u16, Self::Error>;

    /// SMBus block read. Returns the byte count sent by the device, which may be larger than the
    /// block when the device misbehaves; only the first [`SMBUS_BLOCK_MAX`] bytes are delivered.
    fn read_block_data(
        &mut self,
        command: u8,
        block: &mut [u8; SMBUS_BLOCK_MAX],
    ) -> core::result::Result<usize, Self::Error>;

    /// SMBus block write of at most [`SMBUS_BLOCK_MAX`] bytes. The adapter adds the length prefix.
    fn write_block_data(&mut self, command: u8, data: &[u8]) -> core::result::Result<(), Self::Error>;

    /// SMBus block process call. Returns the byte count sent by the device.
    fn block_process_call(
        &mut self,
        command: u8,
        request: &[u8],
        response: &mut [u8; SMBUS_BLOCK_MAX],
    ) -> core::result::Result<usize, Self::Error>;

    /// Raw I2C: write `write` then, with a repeated start, read `read.len()` bytes.
    /// An empty `read` is a single write message.
    fn i2c_transfer(
        &mut self,
        address: u8,
        write: &[u8],
        read: &mut [u8],
    ) -> core::result::Result<(), Self::Error>;
}

/// A 7-bit SMBus device address outside the ranges SMBus 2.0 reserves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceAddress(u8);

impl DeviceAddress {
    pub const fn get(self) -> u8 {
        self.0
    }

    /// SMBus 2.0 table 4.
    pub const fn is_reserved(address: u8) -> bool {
        matches!(address, 0x00..=0x08 | 0x0c | 0x28 | 0x37 | 0x61 | 0x78..)
    }
}

impl TryFrom<u8> for DeviceAddress {
    type Error = ReservedAddress;

    fn try_from(value: u8) -> core::result::Result<Self, Self::Error> {
        if Self::is_reserved(value) {
            Err(ReservedAddress(value))
        } else {
            Ok(Self(value))
        }
    }
}

/// Address rejected by [`DeviceAddress::try_from`]. Converts to [`Error::InvalidArgument`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("SMBus address {0:#04x} is reserved")]
pub struct ReservedAddress(pub u8);

impl<I: embedded_io::Error> From<ReservedAddress> for Error<I> {
    fn from(_: ReservedAddress) -> Self {
        Error::InvalidArgument
    }
}

/// One way of performing block transfers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Native SMBus block primitives.
    Smbus,
    /// Hand built frames over raw I2C messages.
    RawI2c,
}

/// Backends usable for one kind of block transfer, in order of preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub primary: Option<Backend>,
    pub fallback: Option<Backend>,
}

impl Route {
    fn select(native: bool, raw: bool) -> Self {
        match (native, raw) {
            (true, true) => Self {
                primary: Some(Backend::Smbus),
                fallback: Some(Backend::RawI2c),
            },
            (true, false) => Self {
                primary: Some(Backend::Smbus),
                fallback: None,
            },
            (false, true) => Self {
                primary: Some(Backend::RawI2c),
                fallback: None,
            },
            (false, false) => Self {
                primary: None,
                fallback: None,
            },
        }
    }

    pub fn has(&self, backend: Backend) -> bool {
        self.primary == Some(backend) || self.fallback == Some(backend)
    }
}

/// Backends chosen for every block transfer kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Routes {
    pub block_read: Route,
    pub block_write: Route,
    pub block_process_call: Route,
}

impl Routes {
    pub fn select(functionality: Functionality) -> Self {
        let raw = functionality.i2c();
        Self {
            block_read: Route::select(functionality.read_block(), raw),
            block_write: Route::select(functionality.write_block(), raw),
            block_process_call: Route::select(functionality.block_proc_call(), raw),
        }
    }
}

/// Validate a command code and narrow it to the byte that goes on the wire.
fn wire_command<I: embedded_io::Error>(code: u16) -> Result<u8, I> {
    if uses_extended_path(code) {
        return Err(Error::NotImplemented(code));
    }
    if !is_core(code) {
        return Err(Error::InvalidArgument);
    }
    Ok(code as u8)
}

/// Copy a received block into the caller's buffer.
///
/// When `declared` does not fit, as much as fits is copied and `SizeExceeded` is returned.
fn deliver<I: embedded_io::Error>(declared: usize, payload: &[u8], out: &mut [u8]) -> Result<usize, I> {
    if declared <= out.len() {
        out[..payload.len()].copy_from_slice(payload);
        Ok(payload.len())
    } else {
        let copied = payload.len().min(out.len());
        out[..copied].copy_from_slice(&payload[..copied]);
        Err(Error::SizeExceeded { declared, copied })
    }
}

/// Typed PMBus transactions on top of an [`SmbusAdapter`].
pub struct Transport<A: SmbusAdapter> {
    bus: A,
    address: DeviceAddress,
    functionality: Functionality,
    routes: Routes,
    pec: bool,
}

impl<A: SmbusAdapter> Transport<A> {
    /// Wrap an adapter attached to `address`. Backends are selected here, once.
    pub fn new(bus: A, address: DeviceAddress) -> Self {
        let functionality = bus.functionality();
        let routes = Routes::select(functionality);
        debug!("PMBus transport for {:#04x}: {:?}", address.get(), routes);
        Self {
            bus,
            address,
            functionality,
            routes,
            pec: false,
        }
    }

    pub fn address(&self) -> DeviceAddress {
        self.address
    }

    pub fn functionality(&self) -> Functionality {
        self.functionality
    }

    pub fn routes(&self) -> Routes {
        self.routes
    }

    pub fn pec_enabled(&self) -> bool {
        self.pec
    }

    /// Give the adapter back.
    pub fn into_inner(self) -> A {
        self.bus
    }

    /// Turn packet error checking on or off for the whole session.
    pub fn set_pec(&mut self, enable: bool) -> Result<(), A::Error> {
        if !self.functionality.pec() {
            return Err(Error::Unsupported);
        }
        self.bus.set_pec(enable).map_err(Error::Bus)?;
        self.pec = enable;
        Ok(())
    }

    /// Check that something acknowledges our address.
    ///
    /// PMBus forbids transactions starting with the read bit set, quick commands included,
    /// so this always uses the write flavour.
    pub fn quick_presence(&mut self) -> Result<bool, A::Error> {
        if !self.functionality.quick() {
            return Err(Error::Unsupported);
        }
        self.bus.quick_write().map_err(Error::Bus)
    }

    pub fn send_byte(&mut self, command: u16) -> Result<(), A::Error> {
        let command = wire_command::<A::Error>(command)?;
        self.bus.send_byte(command).map_err(Error::Bus)
    }

    pub fn read_byte(&mut self, command: u16) -> Result<u8, A::Error> {
        let command = wire_command::<A::Error>(command)?;
        self.bus.read_byte_data(command).map_err(Error::Bus)
    }

    pub fn read_word(&mut self, command: u16) -> Result<u16, A::Error> {
        let command = wire_command::<A::Error>(command)?;
        self.bus.read_word_data(command).map_err(Error::Bus)
    }

    pub fn write_byte(&mut self, command: u16, value: u8) -> Result<(), A::Error> {
        let command = wire_command::<A::Error>(command)?;
        self.bus.write_byte_data(command, value).map_err(Error::Bus)
    }

    pub fn write_word(&mut self, command: u16, value: u16) -> Result<(), A::Error> {
        let command = wire_command::<A::Error>(command)?;
        self.bus.write_word_data(command, value).map_err(Error::Bus)
    }

    pub fn process_call(&mut self, command: u16, value: u16) -> Result<u16, A::Error> {
        let command = wire_command::<A::Error>(command)?;
        if !self.functionality.proc_call() {
            return Err(Error::Unsupported);
        }
        self.bus.process_call(command, value).map_err(Error::Bus)
    }

    /// Read a length-prefixed block into `out`, returning the number of bytes copied.
    ///
    /// The block length is learned first with a byte read of the same command, which lets blocks
    /// beyond the SMBus limit go straight to raw I2C instead of failing half way. If the block is
    /// larger than `out`, the part that fits is copied and [`Error::SizeExceeded`] is returned.
    pub fn read_block(&mut self, command: u16, out: &mut [u8]) -> Result<usize, A::Error> {
        if out.is_empty() {
            return Err(Error::InvalidArgument);
        }
        let command = wire_command::<A::Error>(command)?;
        let declared = self.read_declared_length(command)?;

        let route = self.routes.block_read;
        let mut failure = Error::Unsupported;
        if route.primary == Some(Backend::Smbus) {
            if declared > SMBUS_BLOCK_MAX {
                debug!("Block {command:#04x} of {declared} bytes is too big for SMBus");
            } else {
                match self.smbus_read_block(command, out) {
                    Err(Error::Bus(e)) => {
                        debug!("SMBus block read of {command:#04x} failed: {:?}", e.kind());
                        failure = Error::Bus(e);
                    }
                    Err(Error::Unsupported) => {
                        debug!("SMBus block read of {command:#04x} returned an oversized block");
                    }
                    other => return other,
                }
            }
        }
        if route.has(Backend::RawI2c) {
            return self.raw_read_block(command, declared, out);
        }
        Err(failure)
    }

    /// Write a block of 1 to 255 bytes.
    pub fn write_block(&mut self, command: u16, data: &[u8]) -> Result<(), A::Error> {
        if data.is_empty() || data.len() > PMBUS_BLOCK_MAX {
            return Err(Error::InvalidArgument);
        }
        let command = wire_command::<A::Error>(command)?;

        let route = self.routes.block_write;
        if route.primary == Some(Backend::Smbus) && data.len() <= SMBUS_BLOCK_MAX {
            return self.bus.write_block_data(command, data).map_err(Error::Bus);
        }
        if route.has(Backend::RawI2c) {
            let mut frame = [0u8; PMBUS_BLOCK_MAX + 2];
            frame[0] = command;
            frame[1] = data.len() as u8;
            frame[2..2 + data.len()].copy_from_slice(data);
            return self
                .bus
                .i2c_transfer(self.address.get(), &frame[..2 + data.len()], &mut [])
                .map_err(Error::Bus);
        }
        Err(Error::Unsupported)
    }

    /// Block write, block read process call.
    ///
    /// Returns the byte count announced by the device. At most `response.len()` bytes are copied;
    /// callers decide whether the announced count is acceptable.
    pub fn block_process_call(
        &mut self,
        command: u16,
        request: &[u8],
        response: &mut [u8],
    ) -> Result<usize, A::Error> {
        if request.is_empty() || request.len() > SMBUS_BLOCK_MAX || response.is_empty() {
            return Err(Error::InvalidArgument);
        }
        let command = wire_command::<A::Error>(command)?;

        match self.routes.block_process_call.primary {
            Some(Backend::Smbus) => {
                let mut block = [0u8; SMBUS_BLOCK_MAX];
                let count = self
                    .bus
                    .block_process_call(command, request, &mut block)
                    .map_err(Error::Bus)?;
                let copied = count.min(SMBUS_BLOCK_MAX).min(response.len());
                response[..copied].copy_from_slice(&block[..copied]);
                Ok(count)
            }
            // NOTE: no PEC on this path, it could be computed here if ever needed.
            Some(Backend::RawI2c) => {
                let mut frame = [0u8; SMBUS_BLOCK_MAX + 2];
                frame[0] = command;
                frame[1] = request.len() as u8;
                frame[2..2 + request.len()].copy_from_slice(request);

                let wanted = response.len().min(SMBUS_BLOCK_MAX);
                let mut reply = [0u8; SMBUS_BLOCK_MAX + 1];
                self.bus
                    .i2c_transfer(
                        self.address.get(),
                        &frame[..2 + request.len()],
                        &mut reply[..wanted + 1],
                    )
                    .map_err(Error::Bus)?;
                let count = usize::from(reply[0]);
                let copied = count.min(wanted);
                response[..copied].copy_from_slice(&reply[1..1 + copied]);
                Ok(count)
            }
            None => Err(Error::Unsupported),
        }
    }

    /// Byte read of a block command, which answers with the block's length prefix.
    ///
    /// Only part of the device's packet is read, so PEC is switched off around it.
    fn read_declared_length(&mut self, command: u8) -> Result<usize, A::Error> {
        let pec = self.pec;
        if pec {
            if let Err(e) = self.bus.set_pec(false) {
                warn!("Cannot temporarily disable PEC: {:?}", e.kind());
            }
        }
        let length = self.bus.read_byte_data(command);
        if pec {
            if let Err(e) = self.bus.set_pec(true) {
                warn!("Cannot re-enable PEC: {:?}", e.kind());
            }
        }
        length.map(usize::from).map_err(Error::Bus)
    }

    fn smbus_read_block(&mut self, command: u8, out: &mut [u8]) -> Result<usize, A::Error> {
        let mut block = [0u8; SMBUS_BLOCK_MAX];
        let count = self
            .bus
            .read_block_data(command, &mut block)
            .map_err(Error::Bus)?;
        if count > SMBUS_BLOCK_MAX {
            return Err(Error::Unsupported);
        }
        deliver(count, &block[..count], out)
    }

    // NOTE: no PEC on this path either.
    fn raw_read_block(&mut self, command: u8, declared: usize, out: &mut [u8]) -> Result<usize, A::Error> {
        let mut frame = [0u8; PMBUS_BLOCK_MAX + 1];
        let frame = &mut frame[..declared + 1];
        self.bus
            .i2c_transfer(self.address.get(), &[command], frame)
            .map_err(Error::Bus)?;
        let count = usize::from(frame[0]);
        deliver(count, &frame[1..1 + count.min(declared)], out)
    }
}
