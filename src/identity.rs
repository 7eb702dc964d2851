//! Device identity: bus capabilities, implemented PMBus revision, application profiles and the
//! manufacturer inventory strings.

use modular_bitfield::prelude::*;
use strum_macros::IntoStaticStr;

use crate::transport::PMBUS_BLOCK_MAX;

/// __R__ - CAPABILITY byte.
#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capability {
    #[skip]
    __: B4,
    /// Device can assert SMBALERT#.
    pub smbalert: bool,
    /// See [`Capability::bus_speed`].
    pub max_bus_speed: B2,
    /// Device supports packet error checking.
    pub pec: bool,
}

impl Capability {
    pub fn from_raw(raw: u8) -> Self {
        Self::from_bytes([raw])
    }

    pub fn raw(&self) -> u8 {
        self.into_bytes()[0]
    }

    pub fn bus_speed(&self) -> BusSpeed {
        match self.max_bus_speed() {
            0 => BusSpeed::Standard,
            1 => BusSpeed::Fast,
            other => BusSpeed::Reserved(other),
        }
    }
}

/// Maximum bus speed from [`Capability`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoStaticStr)]
pub enum BusSpeed {
    #[strum(serialize = "100 KHz")]
    Standard,
    #[strum(serialize = "400 KHz")]
    Fast,
    #[strum(serialize = "?speed?")]
    Reserved(u8),
}

/// __R__ - PMBUS_REVISION byte.
///
/// Part I lives in bits 7:5 and part II in bits 4:0. Revision 1.0 of the standard defined these
/// widths, later tables show two nibbles; the 1.0 layout is kept for compatibility.
#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PmbusRevision {
    pub part_two: B5,
    pub part_one: B3,
}

impl PmbusRevision {
    pub fn from_raw(raw: u8) -> Self {
        Self::from_bytes([raw])
    }

    pub fn raw(&self) -> u8 {
        self.into_bytes()[0]
    }

    pub fn part_one_version(&self) -> PmbusVersion {
        PmbusVersion::from(self.part_one())
    }

    pub fn part_two_version(&self) -> PmbusVersion {
        PmbusVersion::from(self.part_two())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoStaticStr)]
pub enum PmbusVersion {
    #[strum(serialize = "1.0")]
    V1_0,
    #[strum(serialize = "1.1")]
    V1_1,
    #[strum(serialize = "1.2")]
    V1_2,
    #[strum(serialize = "?")]
    Unknown(u8),
}

impl From<u8> for PmbusVersion {
    fn from(value: u8) -> Self {
        match value {
            0 => PmbusVersion::V1_0,
            1 => PmbusVersion::V1_1,
            2 => PmbusVersion::V1_2,
            other => PmbusVersion::Unknown(other),
        }
    }
}

/// Application profile families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoStaticStr)]
pub enum ProfileKind {
    #[strum(serialize = "Server AC-DC Power Supply")]
    ServerAcDc,
    #[strum(serialize = "DC-DC Converters for Microprocessor Power and other Computer Applications")]
    MicroprocessorDcDc,
    #[strum(serialize = "DC-DC Converters for General-Purpose Use")]
    GeneralPurposeDcDc,
    #[strum(serialize = "(reserved)")]
    Reserved(u8),
}

/// One `(profile, revision)` pair of APP_PROFILE_SUPPORT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApplicationProfile {
    pub id: u8,
    pub revision: u8,
}

impl ApplicationProfile {
    pub fn kind(&self) -> ProfileKind {
        match self.id {
            1 => ProfileKind::ServerAcDc,
            2 => ProfileKind::MicroprocessorDcDc,
            3 => ProfileKind::GeneralPurposeDcDc,
            other => ProfileKind::Reserved(other),
        }
    }

    /// `(major, minor)` from the revision nibbles.
    pub fn version(&self) -> (u8, u8) {
        (self.revision >> 4, self.revision & 0x0f)
    }

    /// Parse an APP_PROFILE_SUPPORT block. Profile id 0 means "none" and is skipped, as is a
    /// trailing odd byte.
    pub fn parse_list(block: &[u8]) -> heapless::Vec<ApplicationProfile, 127> {
        block
            .chunks_exact(2)
            .filter(|pair| pair[0] != 0)
            .map(|pair| ApplicationProfile {
                id: pair[0],
                revision: pair[1],
            })
            .collect()
    }
}

/// An inventory string, ISO 8859/1 on the wire.
///
/// Latin-1 bytes above 0x7f take two bytes as UTF-8, so the capacity covers a full block of them.
pub type InventoryString = heapless::String<{ 2 * PMBUS_BLOCK_MAX }>;

/// Convert an ISO 8859/1 block to a string. Trailing NULs, which some devices use as padding,
/// are dropped. Input beyond one PMBus block is cut off.
pub fn latin1_to_string(block: &[u8]) -> InventoryString {
    let end = block.iter().rposition(|&b| b != 0).map_or(0, |last| last + 1);
    let mut out = InventoryString::new();
    for &byte in &block[..end] {
        // Every Latin-1 byte is the code point of the same value.
        if out.push(char::from(byte)).is_err() {
            break;
        }
    }
    out
}

/// Manufacturer identification strings. Missing entries were unsupported or failed to read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inventory {
    pub manufacturer: Option<InventoryString>,
    pub model: Option<InventoryString>,
    pub revision: Option<InventoryString>,
    pub location: Option<InventoryString>,
    pub date: Option<InventoryString>,
    pub serial: Option<InventoryString>,
    pub ic_device_id: Option<InventoryString>,
    pub ic_device_revision: Option<InventoryString>,
}
