//! Register-level model of the codec's two I²C slaves.
//!
//! [`DeviceModel`] decodes the control wire format, honours write
//! permissions, emulates the address windows with auto-increment and
//! answers status polls. Tests compare its bank contents with the engine's
//! shadow cache; `xtask trace` prints its transfer log.
//!
//! It is allocation-free so it runs anywhere the engine does.

use embedded_hal::i2c::{ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation};
use heapless::{Deque, Vec};
use platform::config::{DEFAULT_ANALOG_ADDR, DEFAULT_DIGITAL_ADDR};

use crate::config::MAX_TRANSFER;
use crate::regmap::{Access, Addressing, Bank, RegAddr, Slave, BURST, MAX_BANK_SIZE};
use crate::registers::{
    ANA_MUTE_STATUS, ANA_STATUS, IF_RST, IF_STATUS, MUTE_DONE_HP, MUTE_DONE_LO1, MUTE_DONE_LO2,
    MUTE_DONE_RC, MUTE_DONE_SP, RST_SOFT,
};
use crate::volume::VolumeTarget;

/// Transfers kept in the log; older ones are dropped.
pub const LOG_CAPACITY: usize = 256;

/// Status registers the model keeps at "ready" unless told otherwise.
const STATUS_REGS: [RegAddr; 3] = [IF_STATUS, ANA_STATUS, ANA_MUTE_STATUS];

/// Output volume pairs behind each `ANA_MUTE_STATUS` bit.
const MUTE_OUTPUTS: [(VolumeTarget, u8); 5] = [
    (VolumeTarget::Headphone, MUTE_DONE_HP),
    (VolumeTarget::Speaker, MUTE_DONE_SP),
    (VolumeTarget::Receiver, MUTE_DONE_RC),
    (VolumeTarget::LineOut1, MUTE_DONE_LO1),
    (VolumeTarget::LineOut2, MUTE_DONE_LO2),
];

/// One write transfer as seen on the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    /// 7-bit slave address.
    pub addr: u8,
    /// Bytes written, in order.
    pub bytes: Vec<u8, MAX_TRANSFER>,
}

/// Simulated codec.
#[derive(Debug, Clone)]
pub struct DeviceModel {
    digital_addr: u8,
    analog_addr: u8,
    regs: [[u8; MAX_BANK_SIZE]; Bank::COUNT],
    pointer: [u8; Bank::COUNT],
    status: [u8; 3],
    log: Deque<Transfer, LOG_CAPACITY>,
    writes: usize,
    reads: usize,
    fail_after: Option<usize>,
    track_mute: bool,
}

impl Default for DeviceModel {
    fn default() -> Self {
        Self::new(DEFAULT_DIGITAL_ADDR, DEFAULT_ANALOG_ADDR)
    }
}

impl DeviceModel {
    /// A freshly powered device answering on the two addresses.
    pub fn new(digital_addr: u8, analog_addr: u8) -> Self {
        let mut model = Self {
            digital_addr,
            analog_addr,
            regs: [[0; MAX_BANK_SIZE]; Bank::COUNT],
            pointer: [0; Bank::COUNT],
            status: [0x07, 0x0F, 0x1F],
            log: Deque::new(),
            writes: 0,
            reads: 0,
            fail_after: None,
            track_mute: false,
        };
        model.soft_reset();
        model
    }

    /// Current contents of a register (`0` for unknown addresses).
    pub fn register(&self, reg: RegAddr) -> u8 {
        self.regs
            .get(reg.bank.index())
            .and_then(|b| b.get(usize::from(reg.offset)))
            .copied()
            .unwrap_or(0)
    }

    /// Contents of a whole bank.
    pub fn bank(&self, bank: Bank) -> &[u8] {
        self.regs
            .get(bank.index())
            .and_then(|b| b.get(..bank.size()))
            .unwrap_or(&[])
    }

    /// Drive a read-only status or input register from outside the bus.
    ///
    /// Status values survive a soft reset.
    pub fn set_status(&mut self, reg: RegAddr, value: u8) {
        if let Some(i) = STATUS_REGS.iter().position(|&r| r == reg) {
            if let Some(slot) = self.status.get_mut(i) {
                *slot = value;
            }
        }
        self.store(reg, value);
    }

    /// Make every write after the next `count` fail with a NACK.
    pub fn fail_after(&mut self, count: usize) {
        self.fail_after = Some(self.writes.saturating_add(count));
    }

    /// Derive `ANA_MUTE_STATUS` from the output volume registers instead
    /// of holding it at "ready".
    ///
    /// An output's ramp-done bit is set only while one of its channels
    /// holds the mute code, so a wait for it passes once a mute write has
    /// landed and not before.
    pub fn track_mute(&mut self, on: bool) {
        self.track_mute = on;
        if on {
            self.refresh_mute_status();
        } else {
            let held = self.status.get(2).copied().unwrap_or(0);
            self.store(ANA_MUTE_STATUS, held);
        }
    }

    /// Stop failing writes.
    pub fn heal(&mut self) {
        self.fail_after = None;
    }

    /// Logged write transfers, oldest first.
    pub fn transfers(&self) -> impl Iterator<Item = &Transfer> {
        self.log.iter()
    }

    /// Number of write transfers accepted since creation.
    pub fn write_count(&self) -> usize {
        self.writes
    }

    /// Number of read transactions served since creation.
    pub fn read_count(&self) -> usize {
        self.reads
    }

    /// Forget the transfer log.
    pub fn clear_log(&mut self) {
        self.log.clear();
    }

    fn soft_reset(&mut self) {
        for (bank, slots) in Bank::ALL.iter().zip(self.regs.iter_mut()) {
            slots.fill(0);
            for (slot, info) in slots.iter_mut().zip(bank.table()) {
                *slot = info.default;
            }
        }
        self.pointer = [0; Bank::COUNT];
        for (reg, value) in STATUS_REGS.into_iter().zip(self.status) {
            self.store(reg, value);
        }
    }

    fn refresh_mute_status(&mut self) {
        let mut flags = 0;
        for (target, flag) in MUTE_OUTPUTS {
            let mask = target.class().code_mask();
            let (left, right) = target.regs();
            let muted = core::iter::once(left)
                .chain(right)
                .any(|reg| self.register(reg) & mask == 0);
            if muted {
                flags |= flag;
            }
        }
        self.store(ANA_MUTE_STATUS, flags);
    }

    fn slave(&self, addr: u8) -> Option<Slave> {
        if addr == self.digital_addr {
            Some(Slave::Digital)
        } else if addr == self.analog_addr {
            Some(Slave::Analog)
        } else {
            None
        }
    }

    fn store(&mut self, reg: RegAddr, value: u8) {
        if let Some(slot) = self
            .regs
            .get_mut(reg.bank.index())
            .and_then(|b| b.get_mut(usize::from(reg.offset)))
        {
            *slot = value;
        }
    }

    /// Window bank served by direct register `port`, and whether `port` is
    /// its data port.
    fn window_of(slave: Slave, port: u8) -> Option<(Bank, bool)> {
        Bank::ALL.into_iter().find_map(|bank| match bank.addressing() {
            Addressing::Window { adr, data } if bank.slave() == slave => {
                if port == adr {
                    Some((bank, false))
                } else if port == data {
                    Some((bank, true))
                } else {
                    None
                }
            }
            _ => None,
        })
    }

    fn window_reg(&self, bank: Bank) -> RegAddr {
        RegAddr::new(bank, self.pointer.get(bank.index()).copied().unwrap_or(0))
    }

    fn advance(&mut self, bank: Bank) {
        let next = self.window_reg(bank).next();
        if let (Some(next), Some(p)) = (next, self.pointer.get_mut(bank.index())) {
            *p = next.offset;
        }
    }

    /// Apply one data byte addressed to direct register `reg`.
    fn write_direct(&mut self, slave: Slave, reg: RegAddr, value: u8) {
        match Self::window_of(slave, reg.offset) {
            Some((bank, false)) => {
                if let Some(p) = self.pointer.get_mut(bank.index()) {
                    *p = value;
                }
            }
            Some((bank, true)) => {
                let target = self.window_reg(bank);
                self.write_checked(target, value);
                self.advance(bank);
            }
            None => {
                if reg == IF_RST && value & RST_SOFT != 0 {
                    tracing::trace!("model soft reset");
                    self.soft_reset();
                } else {
                    self.write_checked(reg, value);
                }
            }
        }
    }

    fn write_checked(&mut self, reg: RegAddr, value: u8) {
        if reg.info().is_some_and(|i| i.access.contains(Access::W)) {
            self.store(reg, value);
        }
    }

    fn read_direct(&mut self, slave: Slave, reg: RegAddr) -> u8 {
        match Self::window_of(slave, reg.offset) {
            Some((bank, true)) => {
                let target = self.window_reg(bank);
                let value = self.register(target);
                self.advance(bank);
                value
            }
            Some((bank, false)) => self.pointer.get(bank.index()).copied().unwrap_or(0),
            None => self.register(reg),
        }
    }

    /// Decode one write transfer: repeated `select, payload` commands where
    /// a burst select consumes the rest of the transfer.
    fn write_transfer(&mut self, slave: Slave, bytes: &[u8]) {
        let direct = Bank::direct_of(slave);
        let mut rest = bytes;
        while let Some((&sel, tail)) = rest.split_first() {
            let mut reg = RegAddr::new(direct, sel.wrapping_shr(1));
            if sel & BURST == 0 {
                let Some((&value, tail)) = tail.split_first() else {
                    return;
                };
                self.write_direct(slave, reg, value);
                rest = tail;
                continue;
            }
            let window = Self::window_of(slave, reg.offset).is_some();
            for &value in tail {
                self.write_direct(slave, reg, value);
                if !window {
                    match reg.next() {
                        Some(next) => reg = next,
                        None => break,
                    }
                }
            }
            return;
        }
    }
}

impl ErrorType for DeviceModel {
    type Error = ErrorKind;
}

impl I2c for DeviceModel {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let slave = self
            .slave(address)
            .ok_or(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address))?;
        let direct = Bank::direct_of(slave);
        let mut select: Option<RegAddr> = None;
        let reads = operations
            .iter()
            .any(|op| matches!(op, Operation::Read(_)));
        for op in operations.iter_mut() {
            match op {
                Operation::Write(data) if reads && data.len() == 1 => {
                    select = data
                        .first()
                        .map(|&sel| RegAddr::new(direct, sel.wrapping_shr(1)));
                }
                Operation::Write(data) => {
                    let bytes: &[u8] = data;
                    if self.fail_after.is_some_and(|n| self.writes >= n) {
                        return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data));
                    }
                    self.writes = self.writes.saturating_add(1);
                    if self.log.is_full() {
                        let _ = self.log.pop_front();
                    }
                    let mut logged = Vec::new();
                    let _ = logged.extend_from_slice(bytes.get(..MAX_TRANSFER).unwrap_or(bytes));
                    let _ = self.log.push_back(Transfer {
                        addr: address,
                        bytes: logged,
                    });
                    self.write_transfer(slave, bytes);
                    if self.track_mute {
                        self.refresh_mute_status();
                    }
                }
                Operation::Read(buf) => {
                    self.reads = self.reads.saturating_add(1);
                    let Some(mut reg) = select else {
                        return Err(ErrorKind::Other);
                    };
                    let window = Self::window_of(slave, reg.offset).is_some();
                    for byte in buf.iter_mut() {
                        *byte = self.read_direct(slave, reg);
                        if !window {
                            reg = reg.next().unwrap_or(reg);
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::chain::select;
    use crate::registers::{A_PD_CLK, ANA_PD_MB, ANA_PD_REF, IF_DEVICE_ID, MA_DAC_SRC};

    const D: u8 = DEFAULT_DIGITAL_ADDR;
    const A: u8 = DEFAULT_ANALOG_ADDR;

    #[test]
    fn powers_up_with_register_defaults() {
        let model = DeviceModel::default();
        assert_eq!(model.register(A_PD_CLK), 0x07);
        assert_eq!(model.register(IF_DEVICE_ID), 0x83);
        assert_eq!(model.register(IF_STATUS), 0x07);
    }

    #[test]
    fn direct_burst_walks_successive_registers() {
        let mut model = DeviceModel::default();
        model
            .write(A, &[select(0x04, true), 0x00, 0x02])
            .unwrap();
        assert_eq!(model.register(ANA_PD_REF), 0x00);
        assert_eq!(model.register(ANA_PD_MB), 0x02);
    }

    #[test]
    fn window_writes_auto_increment() {
        let mut model = DeviceModel::default();
        // Ma window: address port 0x04, data port 0x05.
        model
            .write(D, &[select(0x04, false), 0x03, select(0x05, true), 0x01, 0x02])
            .unwrap();
        assert_eq!(model.register(MA_DAC_SRC), 0x01);
        assert_eq!(model.register(RegAddr::new(Bank::Ma, 0x04)), 0x02);
    }

    #[test]
    fn read_only_registers_ignore_writes() {
        let mut model = DeviceModel::default();
        model.write(D, &[select(0x0B, false), 0x00]).unwrap();
        assert_eq!(model.register(IF_DEVICE_ID), 0x83);
    }

    #[test]
    fn soft_reset_restores_defaults_but_keeps_status() {
        let mut model = DeviceModel::default();
        model.set_status(IF_STATUS, 0x00);
        model.write(A, &[select(0x04, false), 0x00]).unwrap();
        model.write(D, &[select(0x00, false), RST_SOFT]).unwrap();
        assert_eq!(model.register(ANA_PD_REF), 0x03);
        assert_eq!(model.register(IF_STATUS), 0x00);
    }

    #[test]
    fn window_read_uses_selected_address() {
        let mut model = DeviceModel::default();
        model.set_status(RegAddr::new(Bank::A, 0x0C), 0x05);
        model.write(D, &[select(0x02, false), 0x0C]).unwrap();
        let mut buf = [0u8];
        model.write_read(D, &[select(0x03, false)], &mut buf).unwrap();
        assert_eq!(buf, [0x05]);
        assert_eq!(model.read_count(), 1);
    }

    #[test]
    fn tracked_mute_flag_follows_the_volume_registers() {
        let mut model = DeviceModel::default();
        // HP pair at 0x14/0x15, both live.
        model
            .write(A, &[select(0x14, true), 0x11, 0x11])
            .unwrap();
        model.track_mute(true);
        assert_eq!(model.register(ANA_MUTE_STATUS) & MUTE_DONE_HP, 0);
        model.write(A, &[select(0x15, false), 0x00]).unwrap();
        assert_ne!(model.register(ANA_MUTE_STATUS) & MUTE_DONE_HP, 0);
        model.track_mute(false);
        assert_eq!(model.register(ANA_MUTE_STATUS), 0x1F);
    }

    #[test]
    fn unknown_address_is_not_acknowledged() {
        let mut model = DeviceModel::default();
        assert_eq!(
            model.write(0x50, &[0x00, 0x00]),
            Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address))
        );
    }

    #[test]
    fn injected_failures_are_not_applied() {
        let mut model = DeviceModel::default();
        model.fail_after(0);
        assert!(model.write(A, &[select(0x04, false), 0x00]).is_err());
        assert_eq!(model.register(ANA_PD_REF), 0x03);
        assert_eq!(model.write_count(), 0);
    }
}
