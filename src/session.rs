//! A PMBus device session: attach, scan, report, close.
//!
//! ```text
//! Unopened --open--> Attached --scan--> Scanned --report--> Reporting --close--> Closed
//! ```
//!
//! Every session owns its own table of discovered commands, so sessions on different devices
//! never see each other's QUERY answers. Only the [`CommandInfo`] catalog is shared.

use embedded_io::Error as _;
use log::{debug, error, info, warn};
use strum::IntoEnumIterator;

use crate::{
    catalog::{self, CATALOG},
    codec::{Bitmap, Value, ValueClass, classify, decode_word},
    coefficients::Coefficients,
    command::{
        APP_PROFILE_SUPPORT, CAPABILITY, CLEAR_FAULT, CommandInfo, IC_DEVICE_ID, IC_DEVICE_REV,
        MFR_DATE, MFR_ID, MFR_LOCATION, MFR_MODEL, MFR_REVISION, MFR_SERIAL, MFR_SPECIFIC_COUNT,
        PAGE, PMBUS_REVISION, QUERY, TransferShape, mfr_specific, uses_extended_path,
    },
    error::{Error, Result},
    identity::{ApplicationProfile, Capability, Inventory, InventoryString, PmbusRevision, latin1_to_string},
    query::{CommandTable, DataFormat, DiscoveredCommand, QueryEngine, Slot, Support},
    status::{StatusReading, StatusRegister, StatusReport},
    transport::{DeviceAddress, PMBUS_BLOCK_MAX, SmbusAdapter, Transport},
};

/// Lifecycle of a [`DeviceSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No adapter attached yet. A session value never is in this state, it exists for reporting.
    Unopened,
    /// Attached to an address, nothing probed.
    Attached,
    /// Presence checked and the catalog swept.
    Scanned,
    /// Reports have been read.
    Reporting,
    Closed,
}

/// Operator choices for a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionConfig {
    /// Use packet error checking if both adapter and device support it.
    pub enable_pec: bool,
}

impl SessionConfig {
    pub fn with_pec(mut self, enable: bool) -> Self {
        self.enable_pec = enable;
        self
    }
}

/// One implemented command, as listed by [`DeviceSession::supported_commands`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupportedCommand<'c> {
    pub command: DiscoveredCommand<'c>,
    /// How word values are interpreted. `None` for commands that are not words.
    pub class: Option<ValueClass>,
}

/// Our main PMBus device type.
pub struct DeviceSession<'c, A: SmbusAdapter> {
    transport: Transport<A>,
    engine: QueryEngine<'c>,
    config: SessionConfig,
    capability: Option<Capability>,
    revision: Option<PmbusRevision>,
    state: SessionState,
}

impl<A: SmbusAdapter> DeviceSession<'static, A> {
    /// Attach to `address` using the built-in command catalog.
    pub fn open(adapter: A, address: DeviceAddress, config: SessionConfig) -> Result<Self, A::Error> {
        Self::open_with_catalog(adapter, address, config, CATALOG)
    }
}

impl<'c, A: SmbusAdapter> DeviceSession<'c, A> {
    /// Attach to `address`, describing commands with `catalog`.
    ///
    /// Fails with [`Error::Unsupported`] if the adapter cannot do PMBus at all. A PEC request the
    /// adapter cannot honour is dropped with a warning.
    pub fn open_with_catalog(
        adapter: A,
        address: DeviceAddress,
        mut config: SessionConfig,
        catalog: &'c [CommandInfo],
    ) -> Result<Self, A::Error> {
        let functionality = adapter.functionality();
        if !functionality.supports_pmbus() {
            error!("Adapter functionality {functionality:?} does not support PMBus");
            return Err(Error::Unsupported);
        }
        if config.enable_pec && !functionality.pec() {
            warn!("Adapter has no PEC support, continuing without PEC");
            config.enable_pec = false;
        }
        for (code, first, second) in catalog::duplicate_codes(catalog) {
            warn!("Catalog lists {code:#04x} as both {first} and {second}, using {first}");
        }

        Ok(Self {
            transport: Transport::new(adapter, address),
            engine: QueryEngine::new(catalog),
            config,
            capability: None,
            revision: None,
            state: SessionState::Attached,
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn address(&self) -> DeviceAddress {
        self.transport.address()
    }

    pub fn config(&self) -> SessionConfig {
        self.config
    }

    /// CAPABILITY byte, if it could be read during the scan.
    pub fn capability(&self) -> Option<Capability> {
        self.capability
    }

    /// PMBUS_REVISION byte, if it could be read during the scan.
    pub fn revision(&self) -> Option<PmbusRevision> {
        self.revision
    }

    pub fn pec_enabled(&self) -> bool {
        self.transport.pec_enabled()
    }

    /// The device could not answer QUERY, support of every command is unknown.
    pub fn no_query(&self) -> bool {
        self.engine.no_query()
    }

    pub fn commands(&self) -> &CommandTable<'c> {
        self.engine.table()
    }

    /// Probe the device and discover what it implements.
    ///
    /// Only the presence check is fatal: a device that does not acknowledge its address closes
    /// the session. Everything after it is best effort.
    pub fn scan(&mut self) -> Result<(), A::Error> {
        self.expect_state(&[SessionState::Attached])?;

        // SMBus devices must always acknowledge their address.
        if self.transport.functionality().quick() {
            match self.transport.quick_presence() {
                Ok(true) => {}
                Ok(false) => {
                    error!("No device present at {:#04x}", self.address().get());
                    self.state = SessionState::Closed;
                    return Err(Error::NoDevice(self.address().get()));
                }
                Err(e) => {
                    error!("Presence check of {:#04x} failed: {e}", self.address().get());
                    self.state = SessionState::Closed;
                    return Err(e);
                }
            }
        }

        self.engine.check_support(&mut self.transport, QUERY);
        self.read_capability();
        self.read_revision();
        self.engine.sweep(&mut self.transport);

        if self.engine.no_query() {
            info!("Device at {:#04x} cannot QUERY supported commands", self.address().get());
        } else {
            info!(
                "Device at {:#04x} implements {} catalogued commands",
                self.address().get(),
                self.engine.table().resolved().count()
            );
        }
        self.state = SessionState::Scanned;
        Ok(())
    }

    fn read_capability(&mut self) {
        if self.engine.check_support(&mut self.transport, CAPABILITY) == Support::Unsupported {
            return;
        }
        let capability = match self.transport.read_byte(CAPABILITY) {
            Ok(raw) => Capability::from_raw(raw),
            Err(e) => {
                debug!("No CAPABILITY support, assuming no PEC ({e})");
                return;
            }
        };
        self.capability = Some(capability);

        if capability.pec() && self.config.enable_pec {
            match self.transport.set_pec(true) {
                Ok(()) => debug!("PEC enabled"),
                Err(Error::Bus(e)) => warn!("Couldn't enable PEC: {:?}", e.kind()),
                Err(e) => warn!("Couldn't enable PEC: {e}"),
            }
        }
    }

    fn read_revision(&mut self) {
        if self.engine.check_support(&mut self.transport, PMBUS_REVISION) == Support::Unsupported {
            return;
        }
        match self.transport.read_byte(PMBUS_REVISION) {
            Ok(raw) => self.revision = Some(PmbusRevision::from_raw(raw)),
            Err(e) => debug!("No PMBUS_REVISION support, assuming 1.0 ({e})"),
        }
    }

    /// Whether the device implements `code`, negotiating with QUERY on first use.
    pub fn check_support(&mut self, code: u16) -> Result<Support, A::Error> {
        self.expect_state(&[SessionState::Attached, SessionState::Scanned, SessionState::Reporting])?;
        Ok(self.engine.check_support(&mut self.transport, code))
    }

    /// __W__ - Select the output rail later commands apply to.
    ///
    /// A failure here aborts the session, later reports would describe the wrong rail.
    pub fn select_page(&mut self, page: u8) -> Result<(), A::Error> {
        self.expect_state(&[SessionState::Scanned, SessionState::Reporting])?;
        if let Err(e) = self.transport.write_byte(PAGE, page) {
            error!("PAGE command failed: {e}");
            self.state = SessionState::Closed;
            return Err(e);
        }
        Ok(())
    }

    /// __R__ - Read and decode one command's value.
    ///
    /// Commands known to be unsupported, write-only commands, and commands without a plain
    /// value (send byte, process calls, manufacturer defined) fail with [`Error::Unsupported`].
    pub fn read_value(&mut self, code: u16) -> Result<Value, A::Error> {
        self.begin_report()?;
        if uses_extended_path(code) {
            return Err(Error::NotImplemented(code));
        }
        let info = catalog::find(self.engine.catalog(), code).ok_or(Error::InvalidArgument)?;
        if self.engine.check_support(&mut self.transport, code) == Support::Unsupported
            || !info.access.readable()
        {
            return Err(Error::Unsupported);
        }

        match info.shape {
            TransferShape::Byte => {
                let raw = self.transport.read_byte(code)?;
                Ok(Value::Bitmap(Self::bitmap(code, u16::from(raw), 8)))
            }
            TransferShape::Word => {
                let raw = self.transport.read_word(code)?;
                let (format, read) = match self.engine.table().get(code as u8) {
                    Slot::Resolved(command) => {
                        (command.query.data_format(), *command.read_coefficients())
                    }
                    // Without QUERY the format bits read as zero.
                    _ => (DataFormat::Linear, Coefficients::default()),
                };
                let vout = self.engine.vout_mode();
                Ok(match classify(info, format, vout) {
                    ValueClass::Bitmap => Value::Bitmap(Self::bitmap(code, raw, 16)),
                    class => decode_word(class, raw, info.unit, vout, &read),
                })
            }
            TransferShape::Block | TransferShape::Block14 | TransferShape::ProfileBlock => {
                let mut block = [0u8; PMBUS_BLOCK_MAX];
                let count = self.transport.read_block(code, &mut block)?;
                heapless::Vec::from_slice(&block[..count])
                    .map(Value::Block)
                    .map_err(|_| Error::ProtocolViolation("block longer than 255 bytes"))
            }
            TransferShape::NoData
            | TransferShape::QueryCall
            | TransferShape::CoefficientsCall
            | TransferShape::Undefined => Err(Error::Unsupported),
        }
    }

    /// Status registers get their labels, anything else is reported bit by bit.
    fn bitmap(code: u16, raw: u16, width: u8) -> Bitmap {
        match StatusRegister::iter().find(|register| register.code() == code) {
            Some(register) => register.decode(raw),
            None => Bitmap::decode(raw, width, None),
        }
    }

    /// Read STATUS_WORD (or STATUS_BYTE) and every detail register it points at.
    pub fn read_status(&mut self) -> Result<StatusReport, A::Error> {
        self.begin_report()?;

        let summary = match self.read_summary()? {
            Some(summary) => summary,
            None => return Err(Error::Unsupported),
        };

        let mut details = heapless::Vec::new();
        for register in StatusRegister::details(summary.bits.raw) {
            if self.engine.check_support(&mut self.transport, register.code()) == Support::Unsupported {
                continue;
            }
            match self.transport.read_byte(register.code()) {
                Ok(raw) => {
                    // One entry per detail register, capacity is enough.
                    let _ = details.push(StatusReading {
                        register,
                        bits: register.decode(u16::from(raw)),
                    });
                }
                Err(e) => debug!("Device failed read of STATUS_{}: {e}", <&str>::from(register)),
            }
        }
        Ok(StatusReport { summary, details })
    }

    /// Prefer the full status word, fall back to the status byte.
    fn read_summary(&mut self) -> Result<Option<StatusReading>, A::Error> {
        for register in [StatusRegister::Word, StatusRegister::Byte] {
            let support = self.engine.check_support(&mut self.transport, register.code());
            if support == Support::Unsupported {
                continue;
            }
            let raw = match register {
                StatusRegister::Word => self.transport.read_word(register.code()),
                _ => self.transport.read_byte(register.code()).map(u16::from),
            };
            match raw {
                Ok(raw) => {
                    return Ok(Some(StatusReading {
                        register,
                        bits: register.decode(raw),
                    }));
                }
                // A device that cannot QUERY may simply lack STATUS_WORD.
                Err(e) if e.is_bus() && support == Support::Unknown && register == StatusRegister::Word => {
                    debug!("STATUS_WORD failed, trying STATUS_BYTE: {e}");
                }
                Err(e) => {
                    error!("Device failed read of STATUS_{}: {e}", <&str>::from(register));
                    return Err(e);
                }
            }
        }
        Ok(None)
    }

    /// Read the manufacturer identification strings.
    ///
    /// Strings are also tried when support is unknown, devices without QUERY usually still have
    /// them. Failed or unsupported strings are left out.
    pub fn inventory(&mut self) -> Result<Inventory, A::Error> {
        self.begin_report()?;
        Ok(Inventory {
            manufacturer: self.read_string(MFR_ID),
            model: self.read_string(MFR_MODEL),
            revision: self.read_string(MFR_REVISION),
            location: self.read_string(MFR_LOCATION),
            date: self.read_string(MFR_DATE),
            serial: self.read_string(MFR_SERIAL),
            ic_device_id: self.read_string(IC_DEVICE_ID),
            ic_device_revision: self.read_string(IC_DEVICE_REV),
        })
    }

    fn read_string(&mut self, code: u16) -> Option<InventoryString> {
        if self.engine.check_support(&mut self.transport, code) == Support::Unsupported {
            return None;
        }
        let mut block = [0u8; PMBUS_BLOCK_MAX];
        match self.transport.read_block(code, &mut block) {
            Ok(count) if count > 0 => Some(latin1_to_string(&block[..count])),
            Ok(_) => None,
            Err(e) => {
                debug!("Cannot read string {code:#04x}: {e}");
                None
            }
        }
    }

    /// __R__ - Application profiles the device conforms to.
    pub fn application_profiles(&mut self) -> Result<heapless::Vec<ApplicationProfile, 127>, A::Error> {
        self.begin_report()?;
        if self.engine.check_support(&mut self.transport, APP_PROFILE_SUPPORT) != Support::Supported {
            return Err(Error::Unsupported);
        }
        let mut block = [0u8; PMBUS_BLOCK_MAX];
        let count = self.transport.read_block(APP_PROFILE_SUPPORT, &mut block)?;
        Ok(ApplicationProfile::parse_list(&block[..count]))
    }

    /// Commands the device implements, in code order.
    pub fn supported_commands(&self) -> Result<impl Iterator<Item = SupportedCommand<'c>> + '_, A::Error> {
        self.expect_state(&[SessionState::Scanned, SessionState::Reporting])?;
        let vout = self.engine.vout_mode();
        Ok(self.engine.table().resolved().map(move |command| SupportedCommand {
            command: *command,
            class: (command.info.shape == TransferShape::Word)
                .then(|| classify(command.info, command.query.data_format(), vout)),
        }))
    }

    /// __W__ - Clear latched faults.
    ///
    /// Returns `false`, without touching the bus, when the device is known not to implement
    /// CLEAR_FAULT.
    pub fn clear_faults(&mut self) -> Result<bool, A::Error> {
        self.expect_state(&[SessionState::Scanned, SessionState::Reporting])?;
        if self.engine.check_support(&mut self.transport, CLEAR_FAULT) == Support::Unsupported {
            return Ok(false);
        }
        self.transport.send_byte(CLEAR_FAULT)?;
        Ok(true)
    }

    /// __W__ - Send `MFR_SPECIFIC_nn` as a data-less command.
    ///
    /// Manufacturer commands can have any syntax; this is only right for those that take no data.
    pub fn send_mfr_specific(&mut self, index: u8) -> Result<(), A::Error> {
        self.expect_state(&[SessionState::Scanned, SessionState::Reporting])?;
        if index >= MFR_SPECIFIC_COUNT {
            return Err(Error::InvalidArgument);
        }
        let code = mfr_specific(index);
        if self.engine.check_support(&mut self.transport, code) == Support::Unsupported {
            return Err(Error::Unsupported);
        }
        debug!("Issuing mfr_specific command {code:#04x}");
        self.transport.send_byte(code)
    }

    /// End the session, switching PEC back off if we turned it on.
    pub fn close(&mut self) -> Result<(), A::Error> {
        if self.state == SessionState::Closed {
            return Ok(());
        }
        self.state = SessionState::Closed;
        if self.transport.pec_enabled() {
            self.transport.set_pec(false)?;
        }
        Ok(())
    }

    /// Close the session and hand the adapter back.
    pub fn release(mut self) -> A {
        if let Err(e) = self.close() {
            warn!("Closing session failed: {e}");
        }
        self.transport.into_inner()
    }

    fn expect_state(&self, allowed: &[SessionState]) -> Result<(), A::Error> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(Error::InvalidState(self.state))
        }
    }

    fn begin_report(&mut self) -> Result<(), A::Error> {
        self.expect_state(&[SessionState::Scanned, SessionState::Reporting])?;
        self.state = SessionState::Reporting;
        Ok(())
    }
}
