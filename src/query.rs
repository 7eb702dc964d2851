//! QUERY negotiation and the per-session table of discovered commands.

use embedded_io::Error as _;
use log::{debug, info, warn};
use modular_bitfield::prelude::*;

use crate::{
    catalog,
    codec::VoutMode,
    coefficients::{Coefficients, Direction, fetch_coefficients},
    command::{COEFFICIENTS, CommandInfo, QUERY, VOUT_MODE, is_core},
    error::Error,
    transport::{SmbusAdapter, Transport},
};

/// Byte returned by QUERY for one command.
#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryResponse {
    #[skip]
    __: B2,
    /// Data format class, see [`DataFormat`].
    pub format: B3,
    pub readable: bool,
    pub writable: bool,
    /// Command is implemented at all.
    pub supported: bool,
}

impl QueryResponse {
    pub fn from_raw(raw: u8) -> Self {
        Self::from_bytes([raw])
    }

    pub fn raw(&self) -> u8 {
        self.into_bytes()[0]
    }

    pub fn data_format(&self) -> DataFormat {
        DataFormat::from(self.format())
    }
}

/// Numeric data format announced by QUERY bits 4:2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataFormat {
    Linear,
    Unsigned16,
    Direct,
    Unsigned8,
    Vid,
    Manufacturer,
    Unknown(u8),
}

impl From<u8> for DataFormat {
    fn from(value: u8) -> Self {
        match value {
            0 => DataFormat::Linear,
            1 => DataFormat::Unsigned16,
            3 => DataFormat::Direct,
            4 => DataFormat::Unsigned8,
            5 => DataFormat::Vid,
            6 => DataFormat::Manufacturer,
            other => DataFormat::Unknown(other),
        }
    }
}

/// Answer of [`QueryEngine::check_support`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Support {
    Supported,
    Unsupported,
    /// The device cannot tell us.
    Unknown,
}

/// What was learned about a command the device implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveredCommand<'c> {
    pub info: &'c CommandInfo,
    pub query: QueryResponse,
    /// Indexed by [`Direction::index`].
    pub coefficients: [Coefficients; 2],
}

impl DiscoveredCommand<'_> {
    pub fn read_coefficients(&self) -> &Coefficients {
        &self.coefficients[Direction::Read.index()]
    }

    pub fn write_coefficients(&self) -> &Coefficients {
        &self.coefficients[Direction::Write.index()]
    }
}

/// State of one command code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Slot<'c> {
    #[default]
    NotProbed,
    Unsupported,
    Resolved(DiscoveredCommand<'c>),
}

/// One slot per core command code. Slots leave `NotProbed` at most once.
pub struct CommandTable<'c> {
    slots: [Slot<'c>; 256],
}

impl<'c> CommandTable<'c> {
    pub fn new() -> Self {
        Self {
            slots: [Slot::NotProbed; 256],
        }
    }

    pub fn get(&self, code: u8) -> &Slot<'c> {
        &self.slots[usize::from(code)]
    }

    /// Bind a slot. Returns `false`, changing nothing, if it was already bound.
    fn bind(&mut self, code: u8, slot: Slot<'c>) -> bool {
        let current = &mut self.slots[usize::from(code)];
        if *current != Slot::NotProbed {
            return false;
        }
        *current = slot;
        true
    }

    fn resolved_mut(&mut self, code: u8) -> Option<&mut DiscoveredCommand<'c>> {
        match &mut self.slots[usize::from(code)] {
            Slot::Resolved(command) => Some(command),
            _ => None,
        }
    }

    /// Commands the device implements, in code order.
    pub fn resolved(&self) -> impl Iterator<Item = &DiscoveredCommand<'c>> {
        self.slots.iter().filter_map(|slot| match slot {
            Slot::Resolved(command) => Some(command),
            _ => None,
        })
    }
}

impl Default for CommandTable<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs QUERY negotiations against one device and records the outcome.
pub struct QueryEngine<'c> {
    catalog: &'c [CommandInfo],
    table: CommandTable<'c>,
    no_query: bool,
    vout_mode: Option<VoutMode>,
}

impl<'c> QueryEngine<'c> {
    pub fn new(catalog: &'c [CommandInfo]) -> Self {
        Self {
            catalog,
            table: CommandTable::new(),
            no_query: false,
            vout_mode: None,
        }
    }

    pub fn catalog(&self) -> &'c [CommandInfo] {
        self.catalog
    }

    pub fn table(&self) -> &CommandTable<'c> {
        &self.table
    }

    /// The device failed a QUERY exchange; nothing more will be negotiated.
    pub fn no_query(&self) -> bool {
        self.no_query
    }

    /// VOUT_MODE as read while negotiating it.
    pub fn vout_mode(&self) -> Option<VoutMode> {
        self.vout_mode
    }

    /// Whether the device implements `code`, negotiating on first use.
    ///
    /// QUERY failures are not retried: a transfer error or a malformed answer marks the whole
    /// device as unable to QUERY and every later call answers [`Support::Unknown`].
    pub fn check_support<A: SmbusAdapter>(&mut self, transport: &mut Transport<A>, code: u16) -> Support {
        if !is_core(code) || self.no_query {
            return Support::Unknown;
        }
        let wire = code as u8;
        if code != QUERY && *self.table.get(QUERY as u8) == Slot::Unsupported {
            return Support::Unknown;
        }

        if *self.table.get(wire) == Slot::NotProbed {
            let Some(info) = catalog::find(self.catalog, code) else {
                return Support::Unknown;
            };
            self.negotiate(transport, wire, info);
        }

        match self.table.get(wire) {
            Slot::Resolved(_) => Support::Supported,
            Slot::Unsupported => Support::Unsupported,
            Slot::NotProbed => Support::Unknown,
        }
    }

    fn negotiate<A: SmbusAdapter>(&mut self, transport: &mut Transport<A>, code: u8, info: &'c CommandInfo) {
        let answer = match transport.process_call(QUERY, u16::from(code) << 8 | 1) {
            Ok(answer) => answer,
            Err(e) => {
                match e {
                    Error::Bus(e) => info!("QUERY of {code:#04x} failed ({:?}), giving up on QUERY", e.kind()),
                    e => info!("QUERY of {code:#04x} failed ({e}), giving up on QUERY"),
                }
                self.no_query = true;
                return;
            }
        };
        if answer & 0xff != 1 {
            info!("QUERY of {code:#04x} answered {answer:#06x}, giving up on QUERY");
            self.no_query = true;
            return;
        }

        let query = QueryResponse::from_raw((answer >> 8) as u8);
        if !query.supported() {
            self.table.bind(code, Slot::Unsupported);
            return;
        }
        self.table.bind(
            code,
            Slot::Resolved(DiscoveredCommand {
                info,
                query,
                coefficients: [Coefficients::default(); 2],
            }),
        );

        if u16::from(code) == VOUT_MODE {
            self.load_vout_mode(transport);
            return;
        }

        if query.data_format() == DataFormat::Direct
            && self.check_support(transport, COEFFICIENTS) == Support::Supported
        {
            for direction in [Direction::Read, Direction::Write] {
                let wanted = match direction {
                    Direction::Read => query.readable(),
                    Direction::Write => query.writable(),
                };
                if !wanted {
                    continue;
                }
                if let Some(command) = self.table.resolved_mut(code) {
                    fetch_coefficients(
                        transport,
                        code,
                        direction,
                        &mut command.coefficients[direction.index()],
                    );
                }
            }
        }
    }

    /// VOUT_MODE has no coefficients. Its raw byte goes into both slots instead, as the shared
    /// exponent of every output voltage command.
    fn load_vout_mode<A: SmbusAdapter>(&mut self, transport: &mut Transport<A>) {
        match transport.read_byte(VOUT_MODE) {
            Ok(raw) => {
                if let Some(command) = self.table.resolved_mut(VOUT_MODE as u8) {
                    for coefficients in command.coefficients.iter_mut() {
                        coefficients.r = raw as i8;
                    }
                }
                let mode = VoutMode::from_raw(raw);
                debug!("VOUT_MODE {raw:#04x}, linear: {}", mode.is_linear());
                self.vout_mode = Some(mode);
            }
            Err(Error::Bus(e)) => warn!("Cannot read VOUT_MODE: {:?}", e.kind()),
            Err(e) => warn!("Cannot read VOUT_MODE: {e}"),
        }
    }

    /// Query every catalog entry, stopping early if the device turns out not to support QUERY.
    pub fn sweep<A: SmbusAdapter>(&mut self, transport: &mut Transport<A>) {
        for info in catalog::entries(self.catalog) {
            if self.no_query {
                break;
            }
            self.check_support(transport, info.code);
        }
    }
}
