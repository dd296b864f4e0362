//! Mock implementations for testing
//!
//! This module provides mock implementations of the collaborator traits the
//! codec engine consumes, for use in unit and integration tests.

#![cfg(any(test, feature = "std"))]

use std::collections::BTreeMap;
use std::vec::Vec;

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation};

use crate::hooks::SystemHooks;

/// Fake clock: every delay returns immediately and is only accounted.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MockDelay {
    /// Total requested delay in nanoseconds.
    pub elapsed_ns: u64,
    /// Individual delay requests in nanoseconds, in call order.
    pub calls: Vec<u32>,
}

impl MockDelay {
    /// Create a fake clock at t = 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total requested delay in microseconds (rounded down).
    pub fn elapsed_us(&self) -> u64 {
        self.elapsed_ns / 1_000
    }
}

impl DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.elapsed_ns = self.elapsed_ns.saturating_add(u64::from(ns));
        self.calls.push(ns);
    }
}

/// Hooks that count their invocations.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MockHooks {
    /// Number of `setup` calls.
    pub setup_count: usize,
    /// Number of `teardown` calls.
    pub teardown_count: usize,
}

impl MockHooks {
    /// Create hooks with zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }
}

impl SystemHooks for MockHooks {
    #[allow(clippy::arithmetic_side_effects)] // Mock counter; overflow not a concern in tests
    fn setup(&mut self) {
        self.setup_count += 1;
    }

    #[allow(clippy::arithmetic_side_effects)] // Mock counter; overflow not a concern in tests
    fn teardown(&mut self) {
        self.teardown_count += 1;
    }
}

/// One recorded bus write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    /// 7-bit slave address.
    pub addr: u8,
    /// Bytes written, in order.
    pub bytes: Vec<u8>,
}

/// Recording I2C mock with scripted read-back.
///
/// Writes are recorded verbatim. A `write_read` whose write phase starts
/// with byte `b` answers from the value scripted for `(addr, b)`, or `0`.
/// Writes can be made to fail after a fixed number of successful transfers.
#[derive(Debug, Default, Clone)]
pub struct MockI2c {
    /// Every write transfer, in order.
    pub writes: Vec<Transfer>,
    /// Number of `write_read` transactions served.
    pub reads: usize,
    replies: BTreeMap<(u8, u8), u8>,
    fail_after: Option<usize>,
}

impl MockI2c {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the byte returned for reads addressed with `select` on `addr`.
    pub fn reply(&mut self, addr: u8, select: u8, value: u8) {
        self.replies.insert((addr, select), value);
    }

    /// Fail every write after `count` successful ones with a NACK.
    pub fn fail_after(&mut self, count: usize) {
        self.fail_after = Some(count);
    }

    /// Total number of bytes written across all transfers.
    pub fn bytes_written(&self) -> usize {
        self.writes.iter().map(|t| t.bytes.len()).sum()
    }
}

impl ErrorType for MockI2c {
    type Error = ErrorKind;
}

impl I2c for MockI2c {
    #[allow(clippy::arithmetic_side_effects)] // Mock counter; overflow not a concern in tests
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let mut select = None;
        for op in operations.iter_mut() {
            match op {
                Operation::Write(data) => {
                    if self.fail_after.is_some_and(|n| self.writes.len() >= n) {
                        return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
                    }
                    select = data.first().copied();
                    self.writes.push(Transfer {
                        addr: address,
                        bytes: data.to_vec(),
                    });
                }
                Operation::Read(buf) => {
                    self.reads += 1;
                    // The write half of a write_read is a select, not a register write.
                    if select.is_some() {
                        self.writes.pop();
                    }
                    let value = select
                        .and_then(|s| self.replies.get(&(address, s)).copied())
                        .unwrap_or(0);
                    buf.fill(value);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_delay_accumulates() {
        let mut delay = MockDelay::new();
        delay.delay_us(150);
        delay.delay_ms(2);
        assert_eq!(delay.elapsed_us(), 2_150);
        assert_eq!(delay.calls.len(), 2);
    }

    #[test]
    fn test_mock_hooks_count() {
        let mut hooks = MockHooks::new();
        hooks.setup();
        hooks.teardown();
        hooks.setup();
        assert_eq!(hooks.setup_count, 2);
        assert_eq!(hooks.teardown_count, 1);
    }

    #[test]
    fn test_mock_i2c_records_writes() {
        let mut i2c = MockI2c::new();
        i2c.write(0x11, &[0x02, 0x05]).unwrap();
        i2c.write(0x3A, &[0x08, 0x01, 0x02]).unwrap();
        assert_eq!(i2c.writes.len(), 2);
        assert_eq!(i2c.writes[1].addr, 0x3A);
        assert_eq!(i2c.bytes_written(), 5);
    }

    #[test]
    fn test_mock_i2c_scripted_read() {
        let mut i2c = MockI2c::new();
        i2c.reply(0x11, 0x02, 0xA5);
        let mut buf = [0u8; 1];
        i2c.write_read(0x11, &[0x02], &mut buf).unwrap();
        assert_eq!(buf[0], 0xA5);
        assert!(i2c.writes.is_empty(), "read select must not count as a write");
        assert_eq!(i2c.reads, 1);
    }

    #[test]
    fn test_mock_i2c_fail_after() {
        let mut i2c = MockI2c::new();
        i2c.fail_after(1);
        assert!(i2c.write(0x11, &[0x00, 0x01]).is_ok());
        assert_eq!(
            i2c.write(0x11, &[0x00, 0x01]),
            Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address))
        );
    }
}
