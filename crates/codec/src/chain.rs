//! Physical transfer builder with burst chaining.
//!
//! An [`OpenTransfer`] accumulates commands for one slave. A write whose
//! target is the auto-increment successor of the previous data write in the
//! same bank (directly, or through one re-sent hole) extends that command
//! into a burst instead of starting a new one. Cache values carried by the
//! transfer stay pending until the executor reports the transfer accepted.

use heapless::Vec;

use crate::cache::ShadowCache;
use crate::config::MAX_TRANSFER;
use crate::regmap::{Addressing, Bank, RegAddr, Slave, BURST};

/// Select byte for register `reg`.
#[allow(clippy::arithmetic_side_effects)] // reg < 0x80 for every mapped register
pub const fn select(reg: u8, burst: bool) -> u8 {
    (reg << 1) | if burst { BURST } else { 0 }
}

#[derive(Debug, Clone, Copy)]
struct LastData {
    reg: RegAddr,
    select_at: usize,
}

/// The transfer under construction.
#[derive(Debug, Default)]
pub(crate) struct OpenTransfer {
    slave: Option<Slave>,
    bytes: Vec<u8, MAX_TRANSFER>,
    pending: Vec<(RegAddr, u8), MAX_TRANSFER>,
    last: Option<LastData>,
    burst: bool,
    window: [Option<u8>; Bank::COUNT],
}

impl OpenTransfer {
    pub(crate) fn slave(&self) -> Option<Slave> {
        self.slave
    }

    pub(crate) fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub(crate) fn pending(&self) -> &[(RegAddr, u8)] {
        &self.pending
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }

    /// Committed cache overlaid with values pending in this transfer.
    pub(crate) fn effective(&self, cache: &ShadowCache, reg: RegAddr) -> u8 {
        self.pending
            .iter()
            .rev()
            .find(|(r, _)| *r == reg)
            .map_or_else(|| cache.value(reg), |&(_, v)| v)
    }

    /// Drop a pending value superseded by a cache-only write.
    pub(crate) fn forget(&mut self, reg: RegAddr) {
        self.pending.retain(|(r, _)| *r != reg);
    }

    /// Append a data write. Returns `false`, leaving the transfer untouched,
    /// when the write needs a fresh transfer.
    pub(crate) fn try_push(&mut self, cache: &ShadowCache, reg: RegAddr, data: u8) -> bool {
        let slave = reg.bank.slave();
        if self.slave.is_some_and(|s| s != slave) {
            return false;
        }

        if let Some(hole) = self.successor_path(reg) {
            return self.extend(cache, hole, reg, data);
        }
        if self.burst {
            return false;
        }

        let mut cmd: Vec<u8, 4> = Vec::new();
        let port = match reg.bank.addressing() {
            Addressing::Direct => reg.offset,
            Addressing::Window { adr, data: port } => {
                if self.window_at(reg.bank) != Some(reg.offset) {
                    let _ = cmd.push(select(adr, false));
                    let _ = cmd.push(reg.offset);
                }
                port
            }
        };
        let select_at = self.bytes.len().saturating_add(cmd.len());
        let _ = cmd.push(select(port, false));
        let _ = cmd.push(data);

        if self.bytes.len().saturating_add(cmd.len()) > MAX_TRANSFER
            || self.pending.is_full()
            || self.bytes.extend_from_slice(&cmd).is_err()
        {
            return false;
        }
        let _ = self.pending.push((reg, data));
        self.slave = Some(slave);
        self.last = Some(LastData { reg, select_at });
        self.advance_window(reg);
        true
    }

    /// `Some(None)` when `reg` directly follows the last data write,
    /// `Some(Some(hole))` when exactly one hole sits between them.
    fn successor_path(&self, reg: RegAddr) -> Option<Option<RegAddr>> {
        let last = self.last?;
        if last.reg.bank != reg.bank {
            return None;
        }
        let succ = last.reg.next()?;
        if succ == reg {
            return Some(None);
        }
        (succ.is_hole() && succ.next() == Some(reg)).then_some(Some(succ))
    }

    fn extend(
        &mut self,
        cache: &ShadowCache,
        hole: Option<RegAddr>,
        reg: RegAddr,
        data: u8,
    ) -> bool {
        let Some(last) = self.last else {
            return false;
        };
        let needed = if hole.is_some() { 2 } else { 1 };
        if self.bytes.len().saturating_add(needed) > MAX_TRANSFER
            || self.pending.len().saturating_add(needed) > MAX_TRANSFER
        {
            return false;
        }
        let Some(sel) = self.bytes.get_mut(last.select_at) else {
            return false;
        };
        *sel |= BURST;

        if let Some(hole) = hole {
            let value = self.effective(cache, hole);
            let _ = self.bytes.push(value);
            let _ = self.pending.push((hole, value));
        }
        let _ = self.bytes.push(data);
        let _ = self.pending.push((reg, data));
        self.burst = true;
        self.last = Some(LastData {
            reg,
            select_at: last.select_at,
        });
        self.advance_window(reg);
        true
    }

    fn window_at(&self, bank: Bank) -> Option<u8> {
        self.window.get(bank.index()).copied().flatten()
    }

    fn advance_window(&mut self, reg: RegAddr) {
        if let Some(slot) = self.window.get_mut(reg.bank.index()) {
            *slot = reg.next().map(|r| r.offset);
        }
    }
}
