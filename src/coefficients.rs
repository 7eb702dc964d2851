//! DIRECT format coefficients and the COEFFICIENTS block process call that retrieves them.

use embedded_io::Error as _;
use log::debug;
use strum_macros::EnumIter;

use crate::{
    command::COEFFICIENTS,
    error::{Error, Result},
    transport::{SmbusAdapter, Transport},
};

/// Linear transform for DIRECT format values: `X = (Y * 10^-R - b) / m`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Coefficients {
    /// Power of ten exponent.
    pub r: i8,
    /// Slope.
    pub m: i16,
    /// Offset.
    pub b: i16,
    /// Set only from a well formed COEFFICIENTS response.
    pub valid: bool,
}

impl Coefficients {
    /// Length of the COEFFICIENTS response, count byte excluded.
    pub const RESPONSE_LEN: usize = 5;

    /// Parse `m_lo m_hi b_lo b_hi R`.
    pub fn from_response(response: [u8; Self::RESPONSE_LEN]) -> Self {
        Self {
            m: i16::from_le_bytes([response[0], response[1]]),
            b: i16::from_le_bytes([response[2], response[3]]),
            r: response[4] as i8,
            valid: true,
        }
    }
}

/// Which transfer direction a set of coefficients applies to.
///
/// The discriminant is the value sent on the wire, and the index into a command's coefficient pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter)]
pub enum Direction {
    Write = 0,
    Read = 1,
}

impl Direction {
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Ask the device for the coefficients `code` uses in `direction`.
///
/// `target` is only written when the device answers with exactly five bytes. Any failure leaves
/// it untouched, coefficients are an enrichment and never required.
pub fn fetch_coefficients<A: SmbusAdapter>(
    transport: &mut Transport<A>,
    code: u8,
    direction: Direction,
    target: &mut Coefficients,
) {
    match request(transport, code, direction) {
        Ok(coefficients) => *target = coefficients,
        Err(Error::Bus(e)) => {
            debug!("COEFFICIENTS of {code:#04x} ({direction:?}) failed: {:?}", e.kind());
        }
        Err(e) => debug!("COEFFICIENTS of {code:#04x} ({direction:?}): {e}"),
    }
}

fn request<A: SmbusAdapter>(
    transport: &mut Transport<A>,
    code: u8,
    direction: Direction,
) -> Result<Coefficients, A::Error> {
    let mut response = [0u8; Coefficients::RESPONSE_LEN];
    let count = transport.block_process_call(COEFFICIENTS, &[code, direction as u8], &mut response)?;
    if count != Coefficients::RESPONSE_LEN {
        return Err(Error::ProtocolViolation("COEFFICIENTS response is not 5 bytes"));
    }
    Ok(Coefficients::from_response(response))
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;
    use crate::{
        mock_bus::{MockBus, Transaction},
        transport::{DeviceAddress, Functionality},
    };

    fn attach(bus: MockBus) -> Transport<MockBus> {
        Transport::new(bus, DeviceAddress::try_from(0x40).unwrap())
    }

    #[test]
    fn parses_little_endian_response() {
        let c = Coefficients::from_response([0x10, 0x27, 0xfe, 0xff, 0xfd]);
        assert_eq!(c.m, 10000);
        assert_eq!(c.b, -2);
        assert_eq!(c.r, -3);
        assert!(c.valid);
    }

    #[test]
    fn fetches_over_block_process_call() {
        let mut bus = MockBus::new();
        bus.set_coefficients(0x8c, 1, &[0x01, 0x00, 0x00, 0x00, 0x02]);
        let mut transport = attach(bus);

        let mut target = Coefficients::default();
        fetch_coefficients(&mut transport, 0x8c, Direction::Read, &mut target);
        assert_eq!(
            target,
            Coefficients {
                r: 2,
                m: 1,
                b: 0,
                valid: true
            }
        );
        assert_eq!(
            transport.into_inner().transactions(),
            &[Transaction::BlockProcessCall(0x30, vec![0x8c, 1])]
        );
    }

    #[test]
    fn falls_back_to_raw_frame() {
        let mut bus = MockBus::new();
        bus.set_functionality(Functionality::all().with_block_proc_call(false));
        bus.set_coefficients(0x8c, 0, &[0x05, 0x00, 0x0a, 0x00, 0x01]);
        let mut transport = attach(bus);

        let mut target = Coefficients::default();
        fetch_coefficients(&mut transport, 0x8c, Direction::Write, &mut target);
        assert_eq!((target.m, target.b, target.r), (5, 10, 1));
        assert_eq!(
            transport.into_inner().transactions(),
            &[Transaction::I2c {
                address: 0x40,
                write: vec![0x30, 2, 0x8c, 0],
                read_len: 6,
            }]
        );
    }

    #[test]
    fn wrong_length_keeps_previous_values() {
        let mut bus = MockBus::new();
        bus.set_coefficients(0x8c, 1, &[0x01, 0x00, 0x00, 0x00]);
        bus.set_coefficients(0x8c, 0, &[0x01, 0x00, 0x00, 0x00, 0x02, 0x00]);
        let mut transport = attach(bus);

        let previous = Coefficients {
            r: -1,
            m: 7,
            b: 3,
            valid: true,
        };
        for direction in Direction::iter() {
            let mut target = previous;
            fetch_coefficients(&mut transport, 0x8c, direction, &mut target);
            assert_eq!(target, previous);
        }

        let mut target = Coefficients::default();
        fetch_coefficients(&mut transport, 0x8c, Direction::Read, &mut target);
        assert!(!target.valid);
    }

    #[test]
    fn bus_failure_keeps_previous_values() {
        let mut bus = MockBus::new();
        bus.set_coefficients(0x8c, 1, &[0x01, 0x00, 0x00, 0x00, 0x02]);
        bus.fail_command(0x30);
        let mut transport = attach(bus);

        let mut target = Coefficients::default();
        fetch_coefficients(&mut transport, 0x8c, Direction::Read, &mut target);
        assert_eq!(target, Coefficients::default());
    }
}
