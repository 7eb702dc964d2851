//! Decoding of raw PMBus values into engineering quantities.
//!
//! Scaling by powers of two and ten is done with repeated multiplication and division rather than
//! `powi`, so results match fixed-point firmware bit for bit (and no `libm` is needed).

use modular_bitfield::prelude::*;

use crate::{
    coefficients::Coefficients,
    command::{CommandInfo, Unit},
    query::DataFormat,
};

/// __R/W__ - VOUT_MODE: data format of every output voltage command.
#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoutMode {
    /// Exponent (linear mode) or VID code type, depending on `mode`.
    pub parameter: B5,
    pub mode: B3,
}

impl VoutMode {
    pub fn from_raw(raw: u8) -> Self {
        Self::from_bytes([raw])
    }

    pub fn raw(&self) -> u8 {
        self.into_bytes()[0]
    }

    /// Output voltage values are plain integers scaled by `2^exponent`.
    pub fn is_linear(&self) -> bool {
        self.mode() == 0
    }

    /// Sign extended 5 bit exponent.
    pub fn exponent(&self) -> i8 {
        ((self.parameter() << 3) as i8) >> 3
    }
}

/// LINEAR11: 11 bit two's complement mantissa, 5 bit two's complement exponent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Linear11 {
    mantissa: i16,
    exponent: i8,
}

impl Linear11 {
    pub const MANTISSA_MIN: i16 = -1024;
    pub const MANTISSA_MAX: i16 = 1023;
    pub const EXPONENT_MIN: i8 = -16;
    pub const EXPONENT_MAX: i8 = 15;

    /// `None` when either part does not fit its field.
    pub fn new(mantissa: i16, exponent: i8) -> Option<Self> {
        let mantissa_ok = (Self::MANTISSA_MIN..=Self::MANTISSA_MAX).contains(&mantissa);
        let exponent_ok = (Self::EXPONENT_MIN..=Self::EXPONENT_MAX).contains(&exponent);
        (mantissa_ok && exponent_ok).then_some(Self { mantissa, exponent })
    }

    pub fn from_raw(raw: u16) -> Self {
        Self {
            mantissa: ((raw << 5) as i16) >> 5,
            exponent: (((raw >> 11) as u8) << 3) as i8 >> 3,
        }
    }

    pub fn to_raw(&self) -> u16 {
        (((self.exponent as u16) & 0x1f) << 11) | ((self.mantissa as u16) & 0x07ff)
    }

    pub fn mantissa(&self) -> i16 {
        self.mantissa
    }

    pub fn exponent(&self) -> i8 {
        self.exponent
    }

    pub fn value(&self) -> f64 {
        scale_pow2(f64::from(self.mantissa), self.exponent)
    }
}

fn scale_pow2(mut value: f64, exponent: i8) -> f64 {
    if exponent >= 0 {
        for _ in 0..exponent {
            value *= 2.0;
        }
    } else {
        for _ in 0..exponent.unsigned_abs() {
            value /= 2.0;
        }
    }
    value
}

/// DIRECT format: `(s16(raw) * 10^-R - b) / m` with the read coefficients.
///
/// `None` if the coefficients were never read, or describe a zero slope.
pub fn decode_direct(raw: u16, coefficients: &Coefficients) -> Option<f64> {
    if !coefficients.valid || coefficients.m == 0 {
        return None;
    }
    let mut value = f64::from(raw as i16);
    let mut r = coefficients.r;
    while r < 0 {
        value *= 10.0;
        r += 1;
    }
    while r > 0 {
        value /= 10.0;
        r -= 1;
    }
    value -= f64::from(coefficients.b);
    value /= f64::from(coefficients.m);
    Some(value)
}

/// Output voltage word in VOUT_MODE linear format: unsigned, scaled by `2^exponent`.
pub fn decode_vout(raw: u16, exponent: i8) -> f64 {
    scale_pow2(f64::from(raw), exponent)
}

/// How a word value is to be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::IntoStaticStr)]
pub enum ValueClass {
    #[strum(serialize = "bitmask")]
    Bitmap,
    #[strum(serialize = "VOUT_MODE")]
    VoutRelative,
    #[strum(serialize = "LINEAR")]
    LinearFloat,
    #[strum(serialize = "u16")]
    UnsignedInt16,
    #[strum(serialize = "DIRECT")]
    DirectFloat,
    #[strum(serialize = "u8")]
    UnsignedInt8,
    #[strum(serialize = "VID")]
    VidCode,
    #[strum(serialize = "MFR")]
    ManufacturerSpecific,
    #[strum(serialize = "UNKNOWN")]
    Unknown,
}

/// Pick the interpretation of a command's word value.
///
/// `vout` is the device's VOUT_MODE, if it is known.
pub fn classify(info: &CommandInfo, format: DataFormat, vout: Option<VoutMode>) -> ValueClass {
    if info.unit == Unit::Bits {
        return ValueClass::Bitmap;
    }
    if info.is_vout_format() && vout.is_some_and(|mode| mode.is_linear()) {
        return ValueClass::VoutRelative;
    }
    match format {
        DataFormat::Linear => ValueClass::LinearFloat,
        DataFormat::Unsigned16 => ValueClass::UnsignedInt16,
        DataFormat::Direct => ValueClass::DirectFloat,
        DataFormat::Unsigned8 => ValueClass::UnsignedInt8,
        DataFormat::Vid => ValueClass::VidCode,
        DataFormat::Manufacturer => ValueClass::ManufacturerSpecific,
        DataFormat::Unknown(_) => ValueClass::Unknown,
    }
}

/// One set bit of a bitmap register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Condition {
    pub bit: u8,
    /// `None` if the register has no label table.
    pub label: Option<&'static str>,
}

/// A register value where every bit reports a separate condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    pub raw: u16,
    /// 8 or 16.
    pub width: u8,
    /// Set bits, highest first.
    pub conditions: heapless::Vec<Condition, 16>,
}

impl Bitmap {
    /// `labels[n]` names bit `n`.
    pub fn decode(raw: u16, width: u8, labels: Option<&'static [&'static str]>) -> Self {
        let width = width.min(16);
        let mut conditions = heapless::Vec::new();
        for bit in (0..width).rev() {
            if raw & (1 << bit) == 0 {
                continue;
            }
            let label = labels.and_then(|labels| labels.get(usize::from(bit)).copied());
            // At most 16 bits can be set.
            let _ = conditions.push(Condition { bit, label });
        }
        Self {
            raw,
            width,
            conditions,
        }
    }

    /// Bits at or beyond `width` are never set.
    pub fn is_set(&self, bit: u8) -> bool {
        bit < self.width && self.raw.checked_shr(u32::from(bit)).is_some_and(|bits| bits & 1 == 1)
    }
}

/// A decoded value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// A number in engineering units.
    Quantity { value: f64, unit: Unit },
    /// Plain unsigned integer.
    Unsigned { value: u16, unit: Unit },
    Bitmap(Bitmap),
    /// Recognised but not decoded.
    Opaque { raw: u16, class: ValueClass },
    Block(heapless::Vec<u8, 255>),
}

/// Decode a word according to its class.
///
/// `vout` is only consulted for [`ValueClass::VoutRelative`], `read` only for
/// [`ValueClass::DirectFloat`].
pub fn decode_word(
    class: ValueClass,
    raw: u16,
    unit: Unit,
    vout: Option<VoutMode>,
    read: &Coefficients,
) -> Value {
    match class {
        ValueClass::Bitmap => Value::Bitmap(Bitmap::decode(raw, 16, None)),
        ValueClass::VoutRelative => match vout {
            Some(mode) if mode.is_linear() => Value::Quantity {
                value: decode_vout(raw, mode.exponent()),
                unit,
            },
            _ => Value::Opaque { raw, class },
        },
        ValueClass::LinearFloat => Value::Quantity {
            value: Linear11::from_raw(raw).value(),
            unit,
        },
        ValueClass::UnsignedInt16 => Value::Unsigned { value: raw, unit },
        ValueClass::DirectFloat => match decode_direct(raw, read) {
            Some(value) => Value::Quantity { value, unit },
            None => Value::Opaque { raw, class },
        },
        ValueClass::UnsignedInt8 => Value::Unsigned {
            value: raw & 0xff,
            unit,
        },
        ValueClass::VidCode | ValueClass::ManufacturerSpecific | ValueClass::Unknown => {
            Value::Opaque { raw, class }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{CommandFlags, TransferShape};

    fn direct(r: i8, m: i16, b: i16) -> Coefficients {
        Coefficients { r, m, b, valid: true }
    }

    #[test]
    fn linear11_is_self_inverse() {
        for mantissa in Linear11::MANTISSA_MIN..=Linear11::MANTISSA_MAX {
            for exponent in Linear11::EXPONENT_MIN..=Linear11::EXPONENT_MAX {
                let value = Linear11::new(mantissa, exponent).unwrap();
                let decoded = Linear11::from_raw(value.to_raw());
                assert_eq!(decoded.mantissa(), mantissa);
                assert_eq!(decoded.exponent(), exponent);
                assert_eq!(decoded.to_raw(), value.to_raw());
            }
        }
    }

    #[test]
    fn linear11_values() {
        // 0xd280: exponent -6, mantissa 0x280 = 640 -> 10.0
        assert_eq!(Linear11::from_raw(0xd280).value(), 10.0);
        // 0x07ff: exponent 0, mantissa -1
        assert_eq!(Linear11::from_raw(0x07ff).value(), -1.0);
        // 0x0803: exponent 1, mantissa 3
        assert_eq!(Linear11::from_raw(0x0803).value(), 6.0);
        assert_eq!(Linear11::from_raw(0x8001).value(), 1.0 / 65536.0);
    }

    #[test]
    fn linear11_rejects_out_of_range() {
        assert!(Linear11::new(1024, 0).is_none());
        assert!(Linear11::new(-1025, 0).is_none());
        assert!(Linear11::new(0, 16).is_none());
        assert!(Linear11::new(0, -17).is_none());
    }

    #[test]
    fn direct_examples() {
        assert_eq!(decode_direct(250, &direct(2, 1, 0)), Some(2.5));
        assert_eq!(decode_direct(3, &direct(-2, 1, 0)), Some(300.0));
        assert_eq!(decode_direct(0xffff, &direct(0, 1, 0)), Some(-1.0));
        assert_eq!(decode_direct(110, &direct(0, 2, 10)), Some(50.0));
    }

    #[test]
    fn direct_needs_valid_coefficients() {
        assert_eq!(decode_direct(250, &Coefficients::default()), None);
        assert_eq!(decode_direct(250, &direct(0, 0, 0)), None);
    }

    #[test]
    fn vout_mode_fields() {
        let mode = VoutMode::from_raw(0x17);
        assert!(mode.is_linear());
        assert_eq!(mode.exponent(), -9);
        assert_eq!(mode.raw(), 0x17);

        let mode = VoutMode::from_raw(0x05);
        assert_eq!(mode.exponent(), 5);

        let mode = VoutMode::from_raw(0x40);
        assert!(!mode.is_linear());
        assert_eq!(mode.mode(), 2);
    }

    #[test]
    fn vout_relative_decoding() {
        assert_eq!(decode_vout(0x0600, -9), 3.0);
        assert_eq!(decode_vout(3, 2), 12.0);
    }

    #[test]
    fn classification_precedence() {
        let bits = CommandInfo::new(0x79, "status_word", TransferShape::Word).unit(Unit::Bits);
        let vout = CommandInfo::new(0x8b, "read_vout", TransferShape::Word)
            .unit(Unit::Volts)
            .flags(CommandFlags::VOUT_FORMAT);
        let iout = CommandInfo::new(0x8c, "read_iout", TransferShape::Word).unit(Unit::Amperes);
        let linear = Some(VoutMode::from_raw(0x17));
        let vid = Some(VoutMode::from_raw(0x20));

        assert_eq!(classify(&bits, DataFormat::Direct, linear), ValueClass::Bitmap);
        assert_eq!(classify(&vout, DataFormat::Direct, linear), ValueClass::VoutRelative);
        assert_eq!(classify(&vout, DataFormat::Direct, vid), ValueClass::DirectFloat);
        assert_eq!(classify(&vout, DataFormat::Linear, None), ValueClass::LinearFloat);
        assert_eq!(classify(&iout, DataFormat::Unsigned16, linear), ValueClass::UnsignedInt16);
        assert_eq!(classify(&iout, DataFormat::Unsigned8, linear), ValueClass::UnsignedInt8);
        assert_eq!(classify(&iout, DataFormat::Vid, linear), ValueClass::VidCode);
        assert_eq!(
            classify(&iout, DataFormat::Manufacturer, linear),
            ValueClass::ManufacturerSpecific
        );
        assert_eq!(classify(&iout, DataFormat::Unknown(7), linear), ValueClass::Unknown);
    }

    #[test]
    fn word_decoding_per_class() {
        let none = Coefficients::default();
        assert_eq!(
            decode_word(ValueClass::LinearFloat, 0xd280, Unit::Amperes, None, &none),
            Value::Quantity {
                value: 10.0,
                unit: Unit::Amperes
            }
        );
        assert_eq!(
            decode_word(ValueClass::UnsignedInt8, 0x1234, Unit::Unspecified, None, &none),
            Value::Unsigned {
                value: 0x34,
                unit: Unit::Unspecified
            }
        );
        assert_eq!(
            decode_word(ValueClass::DirectFloat, 250, Unit::Watts, None, &none),
            Value::Opaque {
                raw: 250,
                class: ValueClass::DirectFloat
            }
        );
        assert_eq!(
            decode_word(ValueClass::VoutRelative, 0x0600, Unit::Volts, Some(VoutMode::from_raw(0x17)), &none),
            Value::Quantity {
                value: 3.0,
                unit: Unit::Volts
            }
        );
        assert_eq!(
            decode_word(ValueClass::VidCode, 0x00a0, Unit::Volts, None, &none),
            Value::Opaque {
                raw: 0x00a0,
                class: ValueClass::VidCode
            }
        );
    }

    #[test]
    fn bitmap_lists_highest_bit_first() {
        static LABELS: [&str; 8] = ["b0", "b1", "b2", "b3", "b4", "b5", "b6", "b7"];
        let bitmap = Bitmap::decode(0x85, 8, Some(&LABELS));
        let bits: heapless::Vec<u8, 8> = bitmap.conditions.iter().map(|c| c.bit).collect();
        assert_eq!(bits.as_slice(), &[7, 2, 0]);
        assert_eq!(bitmap.conditions[0].label, Some("b7"));
        assert!(bitmap.is_set(2));
        assert!(!bitmap.is_set(1));
        assert!(!Bitmap::decode(0xffff, 8, None).is_set(8));
        assert!(!Bitmap::decode(0xffff, 16, None).is_set(16));
        assert!(!Bitmap::decode(0xffff, 16, None).is_set(255));

        let unlabelled = Bitmap::decode(0x8000, 16, None);
        assert_eq!(
            unlabelled.conditions.as_slice(),
            &[Condition {
                bit: 15,
                label: None
            }]
        );
    }
}
