//! Shadow copy of every register the host has written.
//!
//! Only the executor mutates the cache, and only for values that rode a
//! transfer the transport accepted (or `Dummy` writes, which never hit the
//! wire). Everything that needs chip state (power, routing, settings
//! getters) decodes it from here.

use crate::regmap::{Bank, RegAddr, MAX_BANK_SIZE};

/// Per-bank byte arrays seeded from power-on defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShadowCache {
    banks: [[u8; MAX_BANK_SIZE]; Bank::COUNT],
}

impl ShadowCache {
    /// A cache holding every register's power-on value.
    pub fn seeded() -> Self {
        let mut banks = [[0u8; MAX_BANK_SIZE]; Bank::COUNT];
        for (bank, slots) in Bank::ALL.iter().zip(banks.iter_mut()) {
            for (slot, info) in slots.iter_mut().zip(bank.table()) {
                *slot = info.default;
            }
        }
        Self { banks }
    }

    /// Cached value, `None` for a register that does not exist.
    pub fn get(&self, reg: RegAddr) -> Option<u8> {
        reg.info()?;
        self.banks
            .get(reg.bank.index())
            .and_then(|bank| bank.get(usize::from(reg.offset)))
            .copied()
    }

    /// Cached value, or `0` for a register that does not exist.
    ///
    /// Decoders address only registers from the static map, so the
    /// fallback is never observed in practice.
    pub fn value(&self, reg: RegAddr) -> u8 {
        self.get(reg).unwrap_or(0)
    }

    /// Cached contents of a whole bank.
    pub fn bank(&self, bank: Bank) -> &[u8] {
        self.banks
            .get(bank.index())
            .and_then(|b| b.get(..bank.size()))
            .unwrap_or(&[])
    }

    pub(crate) fn set(&mut self, reg: RegAddr, value: u8) {
        if reg.info().is_none() {
            return;
        }
        if let Some(slot) = self
            .banks
            .get_mut(reg.bank.index())
            .and_then(|bank| bank.get_mut(usize::from(reg.offset)))
        {
            *slot = value;
        }
    }
}

impl Default for ShadowCache {
    fn default() -> Self {
        Self::seeded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registers::{A_PD_BLK, ANA_PD_AMP, MA_DAC_SRC};

    #[test]
    fn seeded_cache_holds_defaults() {
        let cache = ShadowCache::seeded();
        assert_eq!(cache.get(A_PD_BLK), Some(0xFF));
        assert_eq!(cache.get(ANA_PD_AMP), Some(0xFF));
        assert_eq!(cache.get(MA_DAC_SRC), Some(0x00));
    }

    #[test]
    fn missing_registers_read_as_none_and_ignore_writes() {
        let mut cache = ShadowCache::seeded();
        let hole = RegAddr::new(Bank::Ma, 0x06);
        cache.set(hole, 0x55);
        assert_eq!(cache.get(hole), None);
        assert_eq!(cache.value(hole), 0);
    }

    #[test]
    fn bank_slice_matches_table_size() {
        let cache = ShadowCache::seeded();
        for bank in Bank::ALL {
            assert_eq!(cache.bank(bank).len(), bank.size());
        }
    }
}
