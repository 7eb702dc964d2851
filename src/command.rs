//! This module is used to define PMBus commands and the static metadata we keep for each of them.
//!
//! Command codes are `u16` so the 16-bit "extended" namespace (prefix bytes `0xFE`/`0xFF`) can be
//! named, even though nothing in this crate can transfer such commands.

use strum_macros::IntoStaticStr;

/// __R/W__ - Selects the output rail on multi-rail devices.
pub const PAGE: u16 = 0x00;
/// __W__ - Clears all latched status bits. Send byte, no data.
pub const CLEAR_FAULT: u16 = 0x03;
/// __R__ - Bus interface capabilities. See [`Capability`](crate::identity::Capability).
pub const CAPABILITY: u16 = 0x19;
/// __Process call__ - Per-command capability negotiation.
pub const QUERY: u16 = 0x1a;
/// __R/W__ - Output voltage data format and exponent.
///
/// See [`VoutMode`](crate::codec::VoutMode).
pub const VOUT_MODE: u16 = 0x20;
/// __Block process call__ - DIRECT format coefficients of another command.
pub const COEFFICIENTS: u16 = 0x30;

pub const STATUS_BYTE: u16 = 0x78;
pub const STATUS_WORD: u16 = 0x79;
pub const STATUS_VOUT: u16 = 0x7a;
pub const STATUS_IOUT: u16 = 0x7b;
pub const STATUS_INPUT: u16 = 0x7c;
pub const STATUS_TEMPERATURE: u16 = 0x7d;
pub const STATUS_CML: u16 = 0x7e;
pub const STATUS_OTHER: u16 = 0x7f;
pub const STATUS_MFR_SPECIFIC: u16 = 0x80;
pub const STATUS_FANS_1_2: u16 = 0x81;
pub const STATUS_FANS_3_4: u16 = 0x82;

/// __R__ - Implemented PMBus revision. See [`PmbusRevision`](crate::identity::PmbusRevision).
pub const PMBUS_REVISION: u16 = 0x98;
pub const MFR_ID: u16 = 0x99;
pub const MFR_MODEL: u16 = 0x9a;
pub const MFR_REVISION: u16 = 0x9b;
pub const MFR_LOCATION: u16 = 0x9c;
pub const MFR_DATE: u16 = 0x9d;
pub const MFR_SERIAL: u16 = 0x9e;
pub const APP_PROFILE_SUPPORT: u16 = 0x9f;
pub const IC_DEVICE_ID: u16 = 0xad;
pub const IC_DEVICE_REV: u16 = 0xae;

/// Number of `USER_DATA_nn` commands.
pub const USER_DATA_COUNT: u8 = 16;
/// Number of `MFR_SPECIFIC_nn` commands.
pub const MFR_SPECIFIC_COUNT: u8 = 46;

/// Prefix byte of the manufacturer-specific extended command space.
pub const MFR_SPECIFIC_COMMAND_EXT: u16 = 0xfe;
/// Prefix byte of the PMBus extended command space.
pub const PMBUS_COMMAND_EXT: u16 = 0xff;

/// `USER_DATA_nn` command code, `0 <= index <= 15`.
pub const fn user_data(index: u8) -> u16 {
    0xb0 + index as u16
}

/// `MFR_SPECIFIC_nn` command code, `0 <= index <= 45`.
pub const fn mfr_specific(index: u8) -> u16 {
    0xd0 + index as u16
}

/// Two byte command in the extended space, `(prefix << 8) | code`.
pub const fn is_extended(code: u16) -> bool {
    code & 0xfe00 == 0xfe00
}

/// Needs the extended command path: an extended code or one of the bare prefixes.
pub const fn uses_extended_path(code: u16) -> bool {
    is_extended(code) || code == MFR_SPECIFIC_COMMAND_EXT || code == PMBUS_COMMAND_EXT
}

/// Plain 8 bit command which can go on the wire as-is.
///
/// `0xFE` and `0xFF` are only ever sent as prefixes of an extended command, so they are excluded.
pub const fn is_core(code: u16) -> bool {
    code & 0xff00 == 0 && code & 0xfe != 0xfe
}

/// Shape of the bus transaction(s) used to transfer a command's data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoStaticStr)]
pub enum TransferShape {
    /// Send byte: the command code is the whole transaction.
    NoData,
    /// Byte data.
    Byte,
    /// Two byte "word" data, little endian on the wire.
    Word,
    /// Length prefixed block, up to 255 bytes.
    Block,
    /// Length prefixed block of exactly 14 bytes.
    Block14,
    /// Process call used by QUERY.
    QueryCall,
    /// Block process call used by COEFFICIENTS.
    CoefficientsCall,
    /// Block of `(profile, revision)` pairs.
    ProfileBlock,
    /// Manufacturer defined, nothing can be assumed.
    Undefined,
}

/// Which directions a command's data can be transferred in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Access {
    #[default]
    ReadWrite,
    ReadOnly,
    WriteOnly,
}

impl Access {
    pub const fn readable(self) -> bool {
        !matches!(self, Access::WriteOnly)
    }
}

/// Engineering unit of a command's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, IntoStaticStr)]
pub enum Unit {
    #[strum(serialize = "Volts")]
    Volts,
    #[strum(serialize = "Amperes")]
    Amperes,
    #[strum(serialize = "milliseconds")]
    Milliseconds,
    #[strum(serialize = "degrees Celsius")]
    DegreesC,
    #[strum(serialize = "Watts")]
    Watts,
    /// Value is a bitmask of conditions.
    #[strum(serialize = "bits")]
    Bits,
    /// ISO 8859/1 string.
    #[strum(serialize = "ISO 8859/1 string")]
    String,
    /// No unit recorded.
    #[default]
    #[strum(serialize = "")]
    Unspecified,
}

/// Per command flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CommandFlags(u8);

impl CommandFlags {
    pub const NONE: Self = Self(0);
    /// Shown in the device summary (identity data) rather than with the attribute values.
    pub const SUMMARY: Self = Self(1 << 0);
    /// A status register.
    pub const STATUS: Self = Self(1 << 1);
    /// Value is formatted according to VOUT_MODE.
    pub const VOUT_FORMAT: Self = Self(1 << 2);

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

/// Static metadata for one command, as listed in PMBus Part II.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandInfo {
    pub code: u16,
    /// Lower case command name. Empty only for the catalog terminator.
    pub tag: &'static str,
    pub shape: TransferShape,
    pub access: Access,
    pub unit: Unit,
    pub flags: CommandFlags,
}

impl CommandInfo {
    /// Terminates a catalog. Code `0x00` is a real command, so only the empty tag marks the end.
    pub const END: Self = Self::new(0, "", TransferShape::Undefined);

    pub const fn new(code: u16, tag: &'static str, shape: TransferShape) -> Self {
        Self {
            code,
            tag,
            shape,
            access: Access::ReadWrite,
            unit: Unit::Unspecified,
            flags: CommandFlags::NONE,
        }
    }

    pub const fn read_only(mut self) -> Self {
        self.access = Access::ReadOnly;
        self
    }

    pub const fn write_only(mut self) -> Self {
        self.access = Access::WriteOnly;
        self
    }

    pub const fn unit(mut self, unit: Unit) -> Self {
        self.unit = unit;
        self
    }

    pub const fn flags(mut self, flags: CommandFlags) -> Self {
        self.flags = self.flags.union(flags);
        self
    }

    pub const fn is_end(&self) -> bool {
        self.tag.is_empty()
    }

    pub const fn is_status(&self) -> bool {
        self.flags.contains(CommandFlags::STATUS)
    }

    pub const fn is_vout_format(&self) -> bool {
        self.flags.contains(CommandFlags::VOUT_FORMAT)
    }
}
