//! Status registers, their bit labels, and the tree of registers reported by a status read.

use strum_macros::{EnumIter, IntoStaticStr};

use crate::{codec::Bitmap, command};

/// A PMBus status register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, IntoStaticStr)]
pub enum StatusRegister {
    #[strum(serialize = "WORD")]
    Word,
    #[strum(serialize = "BYTE")]
    Byte,
    #[strum(serialize = "VOUT")]
    Vout,
    #[strum(serialize = "IOUT")]
    Iout,
    #[strum(serialize = "INPUT")]
    Input,
    #[strum(serialize = "TEMPERATURE")]
    Temperature,
    #[strum(serialize = "CML")]
    Cml,
    #[strum(serialize = "OTHER")]
    Other,
    #[strum(serialize = "MFR_SPECIFIC")]
    MfrSpecific,
    #[strum(serialize = "FANS_1_2")]
    Fans12,
    #[strum(serialize = "FANS_3_4")]
    Fans34,
}

/// STATUS_WORD, the low byte is STATUS_BYTE.
static SUMMARY: [&str; 16] = [
    "unspecified",
    "comm/memory/logic",
    "temperature",
    "vin_underflow",
    "iout_overflow",
    "vout_overflow",
    "off",
    "busy",
    "unknown",
    "other",
    "fan",
    "power_good#",
    "mfr",
    "vin",
    "iout",
    "vout",
];

static VOUT: [&str; 8] = [
    "VOUT Tracking Error",
    "TOFF_MAX_WARNING",
    "TON_MAX_FAULT",
    "Attempted to exceed VOUT_MAX",
    "Output Undervoltage Fault",
    "Output Undervoltage Warning",
    "Output Overvoltage Warning",
    "Output Overvoltage Fault",
];

static IOUT: [&str; 8] = [
    "Output Overpower Warning",
    "Output Overpower Fault",
    "In Power Limiting Mode",
    "Current Share Fault",
    "Output Undercurrent Fault",
    "Output Overcurrent Warning",
    "Output Overcurrent and Low Voltage Fault",
    "Output Overcurrent Fault",
];

static INPUT: [&str; 8] = [
    "Input Overpower Warning",
    "Input Overcurrent Warning",
    "Input Overcurrent Fault",
    "Unit Off for Insufficient Input Voltage",
    "Input Undervoltage Fault",
    "Input Undervoltage Warning",
    "Input Overvoltage Warning",
    "Input Overvoltage Fault",
];

static TEMPERATURE: [&str; 8] = [
    "(reserved)",
    "(reserved)",
    "(reserved)",
    "(reserved)",
    "overtemp warning",
    "overtemp fault",
    "undertemp warning",
    "undertemp fault",
];

static CML: [&str; 8] = [
    "other memory/logic fault",
    "other comm fault",
    "(reserved)",
    "processor fault",
    "memory fault",
    "PEC",
    "invalid data",
    "invalid command",
];

static OTHER: [&str; 8] = [
    "(reserved)",
    "Output OR-ing Device Fault",
    "Input B OR-ing Device Fault",
    "Input A OR-ing Device Fault",
    "Input B Fuse or Circuit Breaker Fault",
    "Input A Fuse or Circuit Breaker Fault",
    "(reserved)",
    "(reserved)",
];

static MFR_SPECIFIC: [&str; 8] = [
    "mfr_status_0",
    "mfr_status_1",
    "mfr_status_2",
    "mfr_status_3",
    "mfr_status_4",
    "mfr_status_5",
    "mfr_status_6",
    "mfr_status_7",
];

static FANS_1_2: [&str; 8] = [
    "airflow warning",
    "airflow fault",
    "fan 2 speed override",
    "fan 1 speed override",
    "fan 2 warning",
    "fan 1 warning",
    "fan 2 fault",
    "fan 1 fault",
];

static FANS_3_4: [&str; 8] = [
    "(reserved)",
    "(reserved)",
    "fan 4 speed override",
    "fan 3 speed override",
    "fan 4 warning",
    "fan 3 warning",
    "fan 4 fault",
    "fan 3 fault",
];

impl StatusRegister {
    pub const fn code(self) -> u16 {
        match self {
            StatusRegister::Word => command::STATUS_WORD,
            StatusRegister::Byte => command::STATUS_BYTE,
            StatusRegister::Vout => command::STATUS_VOUT,
            StatusRegister::Iout => command::STATUS_IOUT,
            StatusRegister::Input => command::STATUS_INPUT,
            StatusRegister::Temperature => command::STATUS_TEMPERATURE,
            StatusRegister::Cml => command::STATUS_CML,
            StatusRegister::Other => command::STATUS_OTHER,
            StatusRegister::MfrSpecific => command::STATUS_MFR_SPECIFIC,
            StatusRegister::Fans12 => command::STATUS_FANS_1_2,
            StatusRegister::Fans34 => command::STATUS_FANS_3_4,
        }
    }

    /// Bit labels, `labels()[n]` names bit `n`.
    pub fn labels(self) -> &'static [&'static str] {
        match self {
            StatusRegister::Word | StatusRegister::Byte => &SUMMARY,
            StatusRegister::Vout => &VOUT,
            StatusRegister::Iout => &IOUT,
            StatusRegister::Input => &INPUT,
            StatusRegister::Temperature => &TEMPERATURE,
            StatusRegister::Cml => &CML,
            StatusRegister::Other => &OTHER,
            StatusRegister::MfrSpecific => &MFR_SPECIFIC,
            StatusRegister::Fans12 => &FANS_1_2,
            StatusRegister::Fans34 => &FANS_3_4,
        }
    }

    /// Register width in bits.
    pub fn width(self) -> u8 {
        match self {
            StatusRegister::Word => 16,
            _ => 8,
        }
    }

    pub fn decode(self, raw: u16) -> Bitmap {
        Bitmap::decode(raw, self.width(), Some(self.labels()))
    }

    /// Detail registers a summary value points at, in reporting order.
    pub fn details(summary: u16) -> heapless::Vec<StatusRegister, 9> {
        const SELECTORS: [(u16, StatusRegister); 8] = [
            ((1 << 15) | (1 << 5), StatusRegister::Vout),
            ((1 << 14) | (1 << 4), StatusRegister::Iout),
            ((1 << 13) | (1 << 3), StatusRegister::Input),
            (1 << 12, StatusRegister::MfrSpecific),
            (1 << 10, StatusRegister::Fans12),
            (1 << 9, StatusRegister::Other),
            (1 << 2, StatusRegister::Temperature),
            (1 << 1, StatusRegister::Cml),
        ];
        let mut details = heapless::Vec::new();
        for (mask, register) in SELECTORS {
            if summary & mask == 0 {
                continue;
            }
            // Capacity covers every selector.
            let _ = details.push(register);
            if register == StatusRegister::Fans12 {
                let _ = details.push(StatusRegister::Fans34);
            }
        }
        details
    }
}

/// One status register as read from the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReading {
    pub register: StatusRegister,
    pub bits: Bitmap,
}

/// Summary register and whatever detail registers it pointed at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    /// STATUS_WORD, or STATUS_BYTE if the word could not be read.
    pub summary: StatusReading,
    pub details: heapless::Vec<StatusReading, 9>,
}
