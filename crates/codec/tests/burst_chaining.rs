//! Executor-level tests: burst merging, redundant-write elimination and the
//! exact wire format.

// Test files legitimately unwrap and index; allow at file level.
#![allow(clippy::unwrap_used)]
#![allow(clippy::indexing_slicing)]
#![allow(clippy::arithmetic_side_effects)]

use codec::config::WaitTiming;
use codec::packet::WriteMode;
use codec::regmap::{Access, Bank, RegAddr};
use codec::registers::{ANA_PD_MB, ANA_PD_REF, IF_DEVICE_ID, MA_VOL_BASE};
use codec::sim::DeviceModel;
use codec::{Error, Executor};
use embedded_hal_mock::eh1::delay::NoopDelay;
use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction as I2cTransaction};
use platform::config::{DEFAULT_ANALOG_ADDR, DEFAULT_DIGITAL_ADDR};
use platform::mocks::MockDelay;
use proptest::prelude::*;

fn sim_executor() -> Executor<DeviceModel, MockDelay> {
    let mut exec = Executor::new(DeviceModel::default(), MockDelay::new());
    exec.reset(
        DEFAULT_DIGITAL_ADDR,
        DEFAULT_ANALOG_ADDR,
        WaitTiming::default(),
    );
    exec
}

/// Cache and device agree on every register the host owns.
fn assert_cache_matches_device(exec: &Executor<DeviceModel, MockDelay>) {
    for bank in Bank::ALL {
        for (offset, info) in bank.table().iter().enumerate() {
            if !info.exists() || info.access.intersects(Access::VOLATILE | Access::WINDOW) {
                continue;
            }
            let reg = RegAddr::new(bank, offset as u8);
            assert_eq!(
                exec.cache().value(reg),
                exec.bus().register(reg),
                "{reg:?}"
            );
        }
    }
}

#[test]
fn exact_transactions_for_a_burst_and_a_read() {
    let expectations = [
        // ANA_PD_REF and ANA_PD_MB are neighbours: one burst.
        I2cTransaction::write(DEFAULT_ANALOG_ADDR, vec![0x09, 0x00, 0x06]),
        I2cTransaction::write_read(DEFAULT_DIGITAL_ADDR, vec![0x16], vec![0x83]),
    ];
    let mut exec = Executor::new(I2cMock::new(&expectations), NoopDelay::new());
    exec.allocate().unwrap();
    exec.enqueue_write(ANA_PD_REF, 0x00, WriteMode::Normal).unwrap();
    exec.enqueue_write(ANA_PD_MB, 0x06, WriteMode::Normal).unwrap();
    exec.flush().unwrap();
    exec.release();
    assert_eq!(exec.read(IF_DEVICE_ID).unwrap(), 0x83);
    let (mut i2c, _) = exec.release_parts();
    i2c.done();
}

#[test]
fn redundant_writes_emit_no_transfer() {
    let mut exec = sim_executor();
    exec.allocate().unwrap();
    exec.enqueue_write(ANA_PD_REF, 0x03, WriteMode::Normal).unwrap();
    exec.enqueue_write(ANA_PD_MB, 0x07, WriteMode::Normal).unwrap();
    exec.flush().unwrap();
    assert_eq!(exec.bus().write_count(), 0);

    exec.enqueue_write(ANA_PD_REF, 0x03, WriteMode::Force).unwrap();
    exec.flush().unwrap();
    assert_eq!(exec.bus().write_count(), 1);
}

#[test]
fn double_allocation_is_resource_exhausted() {
    let mut exec = sim_executor();
    exec.allocate().unwrap();
    assert_eq!(exec.allocate(), Err(Error::ResourceExhausted));
    exec.release();
    assert!(exec.allocate().is_ok());
}

#[test]
fn window_burst_matches_discrete_writes_byte_for_byte() {
    let mut merged = sim_executor();
    merged.allocate().unwrap();
    for i in 0..6u8 {
        let reg = RegAddr::new(Bank::Ma, MA_VOL_BASE + i);
        merged.enqueue_write(reg, 0x40 + i, WriteMode::Normal).unwrap();
    }
    merged.flush().unwrap();

    let transfers: Vec<_> = merged.bus().transfers().cloned().collect();
    assert_eq!(transfers.len(), 1);
    // Select the window address, then one burst on the data port.
    assert_eq!(
        transfers[0].bytes.as_slice(),
        &[0x08, MA_VOL_BASE, 0x0B, 0x40, 0x41, 0x42, 0x43, 0x44, 0x45]
    );
    assert_cache_matches_device(&merged);
}

proptest! {
    /// Any batch of writes leaves the device exactly as the same writes
    /// flushed one at a time.
    #[test]
    fn merged_and_discrete_programs_agree(
        writes in prop::collection::vec((0usize..6, 0u8..0x20, any::<u8>()), 1..40)
    ) {
        let banks = [Bank::A, Bank::Ma, Bank::Mb, Bank::E, Bank::Ana, Bank::Cd];
        let mut merged = sim_executor();
        let mut discrete = sim_executor();
        merged.allocate().unwrap();
        discrete.allocate().unwrap();
        for (bank, offset, value) in writes {
            let reg = RegAddr::new(banks[bank], offset);
            let Some(info) = reg.info() else { continue };
            if !info.access.contains(Access::W)
                || info.access.intersects(Access::VOLATILE | Access::WINDOW)
            {
                continue;
            }
            merged.enqueue_write(reg, value, WriteMode::Normal).unwrap();
            discrete.enqueue_write(reg, value, WriteMode::Normal).unwrap();
            discrete.flush().unwrap();
        }
        merged.flush().unwrap();
        for bank in Bank::ALL {
            prop_assert_eq!(merged.bus().bank(bank), discrete.bus().bank(bank));
            prop_assert_eq!(merged.cache().bank(bank), discrete.cache().bank(bank));
        }
        prop_assert!(merged.bus().write_count() <= discrete.bus().write_count());
        assert_cache_matches_device(&merged);
    }
}
