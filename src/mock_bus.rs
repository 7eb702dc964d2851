//! We use this mocking module in unit tests to emulate a PMBus device behind an SMBus adapter.

use std::collections::{BTreeMap, BTreeSet};
use std::vec::Vec;

use crate::transport::{Functionality, SMBUS_BLOCK_MAX, SmbusAdapter};

/// Every transaction the mock has seen, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transaction {
    SetPec(bool),
    Quick,
    SendByte(u8),
    ReadByte(u8),
    WriteByte(u8, u8),
    ReadWord(u8),
    WriteWord(u8, u16),
    ProcessCall(u8, u16),
    ReadBlock(u8),
    WriteBlock(u8, Vec<u8>),
    BlockProcessCall(u8, Vec<u8>),
    I2c {
        address: u8,
        write: Vec<u8>,
        read_len: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockBusError {
    /// Nothing answered the transaction.
    Nack,
    /// Failure injected by the test.
    Simulated,
}

impl core::fmt::Display for MockBusError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            MockBusError::Nack => write!(f, "no acknowledge"),
            MockBusError::Simulated => write!(f, "simulated failure"),
        }
    }
}

impl core::error::Error for MockBusError {}

impl embedded_io::Error for MockBusError {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self {
            MockBusError::Nack => embedded_io::ErrorKind::NotConnected,
            MockBusError::Simulated => embedded_io::ErrorKind::Other,
        }
    }
}

/// Our mock type used to emulate a device.
///
/// Commands answer from the tables the test fills in. Anything not in a table is not acknowledged,
/// except QUERY which answers "not supported" for unknown commands like real devices do.
pub struct MockBus {
    functionality: Functionality,
    present: bool,
    pec: bool,
    bytes: BTreeMap<u8, u8>,
    words: BTreeMap<u8, u16>,
    blocks: BTreeMap<u8, Vec<u8>>,
    /// QUERY results keyed by the queried command.
    queries: BTreeMap<u8, u8>,
    /// COEFFICIENTS responses keyed by `(command, direction)`, count byte excluded.
    coefficients: BTreeMap<(u8, u8), Vec<u8>>,
    /// Replaces the byte count echoed by QUERY.
    query_echo: Option<u8>,
    /// Commands whose every SMBus transaction fails.
    failing: BTreeSet<u8>,
    /// Flag to make native SMBus block transfers fail
    fail_smbus_blocks: bool,
    /// Flag to make the quick command fail
    fail_quick: bool,
    transactions: Vec<Transaction>,
}

impl SmbusAdapter for MockBus {
    fn functionality(&self) -> Functionality {
        self.functionality
    }

    fn set_pec(&mut self, enable: bool) -> Result<(), Self::Error> {
        self.transactions.push(Transaction::SetPec(enable));
        self.pec = enable;
        Ok(())
    }

    fn quick_write(&mut self) -> Result<bool, Self::Error> {
        self.transactions.push(Transaction::Quick);
        if self.fail_quick {
            return Err(MockBusError::Simulated);
        }
        Ok(self.present)
    }

    fn send_byte(&mut self, command: u8) -> Result<(), Self::Error> {
        self.transactions.push(Transaction::SendByte(command));
        self.check(command)
    }

    fn read_byte_data(&mut self, command: u8) -> Result<u8, Self::Error> {
        self.transactions.push(Transaction::ReadByte(command));
        self.check(command)?;
        if let Some(value) = self.bytes.get(&command) {
            return Ok(*value);
        }
        // A byte read of a block command returns its length prefix.
        self.blocks
            .get(&command)
            .map(|block| block.len() as u8)
            .ok_or(MockBusError::Nack)
    }

    fn write_byte_data(&mut self, command: u8, value: u8) -> Result<(), Self::Error> {
        self.transactions.push(Transaction::WriteByte(command, value));
        self.check(command)?;
        self.bytes.insert(command, value);
        Ok(())
    }

    fn read_word_data(&mut self, command: u8) -> Result<u16, Self::Error> {
        self.transactions.push(Transaction::ReadWord(command));
        self.check(command)?;
        self.words.get(&command).copied().ok_or(MockBusError::Nack)
    }

    fn write_word_data(&mut self, command: u8, value: u16) -> Result<(), Self::Error> {
        self.transactions.push(Transaction::WriteWord(command, value));
        self.check(command)?;
        self.words.insert(command, value);
        Ok(())
    }

    fn process_call(&mut self, command: u8, value: u16) -> Result<u16, Self::Error> {
        self.transactions.push(Transaction::ProcessCall(command, value));
        self.check(command)?;
        if u16::from(command) != crate::command::QUERY || value & 0xff != 1 {
            return Err(MockBusError::Nack);
        }
        let queried = (value >> 8) as u8;
        let result = self.queries.get(&queried).copied().unwrap_or(0);
        Ok(u16::from(result) << 8 | u16::from(self.query_echo.unwrap_or(1)))
    }

    fn read_block_data(
        &mut self,
        command: u8,
        block: &mut [u8; SMBUS_BLOCK_MAX],
    ) -> Result<usize, Self::Error> {
        self.transactions.push(Transaction::ReadBlock(command));
        self.check(command)?;
        if self.fail_smbus_blocks {
            return Err(MockBusError::Simulated);
        }
        let data = self.blocks.get(&command).ok_or(MockBusError::Nack)?;
        let copied = data.len().min(SMBUS_BLOCK_MAX);
        block[..copied].copy_from_slice(&data[..copied]);
        Ok(data.len())
    }

    fn write_block_data(&mut self, command: u8, data: &[u8]) -> Result<(), Self::Error> {
        self.transactions
            .push(Transaction::WriteBlock(command, data.to_vec()));
        self.check(command)?;
        if self.fail_smbus_blocks {
            return Err(MockBusError::Simulated);
        }
        self.blocks.insert(command, data.to_vec());
        Ok(())
    }

    fn block_process_call(
        &mut self,
        command: u8,
        request: &[u8],
        response: &mut [u8; SMBUS_BLOCK_MAX],
    ) -> Result<usize, Self::Error> {
        self.transactions
            .push(Transaction::BlockProcessCall(command, request.to_vec()));
        self.check(command)?;
        if self.fail_smbus_blocks {
            return Err(MockBusError::Simulated);
        }
        let reply = self.block_call_reply(command, request)?;
        let copied = reply.len().min(SMBUS_BLOCK_MAX);
        response[..copied].copy_from_slice(&reply[..copied]);
        Ok(reply.len())
    }

    fn i2c_transfer(&mut self, address: u8, write: &[u8], read: &mut [u8]) -> Result<(), Self::Error> {
        self.transactions.push(Transaction::I2c {
            address,
            write: write.to_vec(),
            read_len: read.len(),
        });
        if !self.present || write.is_empty() {
            return Err(MockBusError::Nack);
        }
        self.check(write[0])?;

        match (write, read.is_empty()) {
            // Block write frame: command, count, data.
            ([command, count, data @ ..], true) if usize::from(*count) == data.len() => {
                self.blocks.insert(*command, data.to_vec());
                Ok(())
            }
            // Block read: command, then count and data.
            ([command], false) => {
                let data = self.blocks.get(command).ok_or(MockBusError::Nack)?;
                Self::fill(read, data);
                Ok(())
            }
            // Block process call: command, count, request, then count and response.
            ([command, count, request @ ..], false) if usize::from(*count) == request.len() => {
                let reply = self.block_call_reply(*command, request)?;
                Self::fill(read, &reply);
                Ok(())
            }
            _ => Err(MockBusError::Nack),
        }
    }
}

impl embedded_io::ErrorType for MockBus {
    type Error = MockBusError;
}

impl MockBus {
    /// Create a present device on a fully capable adapter, with empty tables.
    pub fn new() -> Self {
        Self {
            functionality: Functionality::all(),
            present: true,
            pec: false,
            bytes: BTreeMap::new(),
            words: BTreeMap::new(),
            blocks: BTreeMap::new(),
            queries: BTreeMap::new(),
            coefficients: BTreeMap::new(),
            query_echo: None,
            failing: BTreeSet::new(),
            fail_smbus_blocks: false,
            fail_quick: false,
            transactions: Vec::new(),
        }
    }

    pub fn set_functionality(&mut self, functionality: Functionality) {
        self.functionality = functionality;
    }

    /// Whether the device acknowledges the quick command.
    pub fn set_present(&mut self, present: bool) {
        self.present = present;
    }

    pub fn set_byte(&mut self, command: u8, value: u8) {
        self.bytes.insert(command, value);
    }

    pub fn set_word(&mut self, command: u8, value: u16) {
        self.words.insert(command, value);
    }

    pub fn set_block(&mut self, command: u8, data: &[u8]) {
        self.blocks.insert(command, data.to_vec());
    }

    /// QUERY result byte for `command`.
    pub fn set_query(&mut self, command: u8, result: u8) {
        self.queries.insert(command, result);
    }

    /// COEFFICIENTS answer for `command` in `direction`, without the count byte.
    pub fn set_coefficients(&mut self, command: u8, direction: u8, response: &[u8]) {
        self.coefficients.insert((command, direction), response.to_vec());
    }

    /// Answer QUERY with this byte count instead of 1.
    pub fn set_query_echo(&mut self, echo: u8) {
        self.query_echo = Some(echo);
    }

    /// Make every SMBus transaction on `command` fail.
    pub fn fail_command(&mut self, command: u8) {
        self.failing.insert(command);
    }

    pub fn fail_smbus_blocks(&mut self, fail: bool) {
        self.fail_smbus_blocks = fail;
    }

    pub fn fail_quick(&mut self, fail: bool) {
        self.fail_quick = fail;
    }

    pub fn pec(&self) -> bool {
        self.pec
    }

    pub fn byte(&self, command: u8) -> Option<u8> {
        self.bytes.get(&command).copied()
    }

    pub fn block(&self, command: u8) -> Option<&[u8]> {
        self.blocks.get(&command).map(Vec::as_slice)
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// How many QUERY process calls were made about `command`.
    pub fn queries_of(&self, command: u8) -> usize {
        self.transactions
            .iter()
            .filter(|t| {
                matches!(t, Transaction::ProcessCall(c, v)
                    if u16::from(*c) == crate::command::QUERY && (*v >> 8) as u8 == command)
            })
            .count()
    }

    fn check(&self, command: u8) -> Result<(), MockBusError> {
        if self.failing.contains(&command) {
            Err(MockBusError::Simulated)
        } else {
            Ok(())
        }
    }

    fn block_call_reply(&self, command: u8, request: &[u8]) -> Result<Vec<u8>, MockBusError> {
        match (u16::from(command), request) {
            (crate::command::COEFFICIENTS, [code, direction]) => self
                .coefficients
                .get(&(*code, *direction))
                .cloned()
                .ok_or(MockBusError::Nack),
            _ => Err(MockBusError::Nack),
        }
    }

    /// Write a count prefixed reply into a raw read buffer.
    fn fill(read: &mut [u8], data: &[u8]) {
        read[0] = data.len() as u8;
        let copied = data.len().min(read.len() - 1);
        read[1..1 + copied].copy_from_slice(&data[..copied]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_read_of_block_returns_length() {
        let mut bus = MockBus::new();
        bus.set_block(0x99, b"ACME");
        assert_eq!(bus.read_byte_data(0x99), Ok(4));
        assert_eq!(bus.read_byte_data(0x9a), Err(MockBusError::Nack));
    }

    #[test]
    fn query_answers_unknown_commands_as_unsupported() {
        let mut bus = MockBus::new();
        bus.set_query(0x8b, 0xa0);
        assert_eq!(bus.process_call(0x1a, 0x8b01), Ok(0xa001));
        assert_eq!(bus.process_call(0x1a, 0x8c01), Ok(0x0001));
        bus.set_query_echo(2);
        assert_eq!(bus.process_call(0x1a, 0x8b01), Ok(0xa002));
        assert_eq!(bus.queries_of(0x8b), 2);
    }

    #[test]
    fn raw_frames_reach_the_tables() {
        let mut bus = MockBus::new();
        bus.i2c_transfer(0x40, &[0xb0, 3, 1, 2, 3], &mut []).unwrap();
        assert_eq!(bus.block(0xb0), Some(&[1u8, 2, 3][..]));

        let mut read = [0u8; 4];
        bus.i2c_transfer(0x40, &[0xb0], &mut read).unwrap();
        assert_eq!(read, [3, 1, 2, 3]);

        bus.set_coefficients(0x8b, 1, &[1, 0, 0, 0, 2]);
        let mut read = [0u8; 6];
        bus.i2c_transfer(0x40, &[0x30, 2, 0x8b, 1], &mut read).unwrap();
        assert_eq!(read, [5, 1, 0, 0, 0, 2]);
    }

    #[test]
    fn injected_failures() {
        let mut bus = MockBus::new();
        bus.set_word(0x8b, 1);
        bus.fail_command(0x8b);
        assert_eq!(bus.read_word_data(0x8b), Err(MockBusError::Simulated));
        bus.fail_quick(true);
        assert_eq!(bus.quick_write(), Err(MockBusError::Simulated));
        assert_eq!(bus.transactions().len(), 2);
    }
}
