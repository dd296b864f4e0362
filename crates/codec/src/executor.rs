//! Packet executor: drains the queue onto the bus.
//!
//! The executor owns the transport, the delay source, the shadow cache and
//! the packet pool. Writes flow through [`OpenTransfer`] so that contiguous
//! addresses merge into bursts; waits commit the open transfer first so
//! ordering against the device is preserved.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{Error as _, I2c};
use platform::config::{DEFAULT_ANALOG_ADDR, DEFAULT_DIGITAL_ADDR};

use crate::cache::ShadowCache;
use crate::chain::{select, OpenTransfer};
use crate::config::WaitTiming;
use crate::error::{Error, Result};
use crate::packet::{Op, PacketPool, WaitEvent, WriteMode};
use crate::regmap::{Addressing, RegAddr, Slave};

/// Bus-facing half of the engine.
pub struct Executor<I, D> {
    i2c: I,
    delay: D,
    digital_addr: u8,
    analog_addr: u8,
    wait: WaitTiming,
    cache: ShadowCache,
    open: OpenTransfer,
    pool: PacketPool,
}

impl<I: I2c, D: DelayNs> Executor<I, D> {
    /// Wrap a transport and delay source using the default slave addresses.
    pub fn new(i2c: I, delay: D) -> Self {
        Self {
            i2c,
            delay,
            digital_addr: DEFAULT_DIGITAL_ADDR,
            analog_addr: DEFAULT_ANALOG_ADDR,
            wait: WaitTiming::default(),
            cache: ShadowCache::seeded(),
            open: OpenTransfer::default(),
            pool: PacketPool::new(),
        }
    }

    /// Point the executor at a device instance and reseed the cache.
    pub fn reset(&mut self, digital_addr: u8, analog_addr: u8, wait: WaitTiming) {
        self.digital_addr = digital_addr;
        self.analog_addr = analog_addr;
        self.wait = wait;
        self.cache = ShadowCache::seeded();
        self.open.reset();
    }

    /// Committed register contents.
    pub fn cache(&self) -> &ShadowCache {
        &self.cache
    }

    /// The transport.
    pub fn bus(&self) -> &I {
        &self.i2c
    }

    /// The transport, mutably (test scripting).
    pub fn bus_mut(&mut self) -> &mut I {
        &mut self.i2c
    }

    /// The delay source.
    pub fn delay(&self) -> &D {
        &self.delay
    }

    /// Give back the transport and delay source.
    pub fn release_parts(self) -> (I, D) {
        (self.i2c, self.delay)
    }

    /// Claim the packet buffer; a second claim is `ResourceExhausted`.
    pub fn allocate(&mut self) -> Result<()> {
        self.pool.allocate()
    }

    /// Return the packet buffer, dropping anything not flushed.
    pub fn release(&mut self) {
        self.pool.release();
    }

    /// Queue an operation; a full queue is flushed first.
    pub fn enqueue(&mut self, op: Op) -> Result<()> {
        if op == Op::Terminate {
            return self.flush();
        }
        if self.pool.queue()?.is_full() {
            tracing::trace!("packet queue full, flushing");
            self.flush()?;
        }
        self.pool.queue()?.push(op)
    }

    /// Queue a register write.
    pub fn enqueue_write(&mut self, reg: RegAddr, data: u8, mode: WriteMode) -> Result<()> {
        self.enqueue(Op::Write { reg, data, mode })
    }

    /// Queue a fixed delay.
    pub fn enqueue_timed_wait(&mut self, us: u32) -> Result<()> {
        self.enqueue(Op::TimedWait { us })
    }

    /// Queue a status poll.
    pub fn enqueue_event_wait(&mut self, event: WaitEvent) -> Result<()> {
        self.enqueue(Op::EventWait { event })
    }

    /// Execute everything queued, in order.
    ///
    /// The first failure discards the rest of the queue. The cache keeps
    /// every value from transfers the transport accepted before it.
    pub fn flush(&mut self) -> Result<()> {
        self.pool.queue()?.push_sentinel()?;
        loop {
            let op = self.pool.queue()?.pop().ok_or(Error::Internal);
            let step = match op {
                Ok(Op::Write { reg, data, mode }) => self.apply(reg, data, mode),
                Ok(Op::TimedWait { us }) => self.timed_wait(us),
                Ok(Op::EventWait { event }) => self.event_wait(event),
                Ok(Op::Terminate) => match self.commit() {
                    Ok(()) => return Ok(()),
                    Err(e) => Err(e),
                },
                Err(e) => Err(e),
            };
            if let Err(e) = step {
                tracing::warn!(error = %e, "packet program aborted");
                if let Ok(queue) = self.pool.queue() {
                    queue.clear();
                }
                self.open.reset();
                return Err(e);
            }
        }
    }

    /// Read a register from the device, committing the open transfer first.
    pub fn read(&mut self, reg: RegAddr) -> Result<u8> {
        reg.require()?;
        self.commit()?;
        self.read_raw(reg)
    }

    fn apply(&mut self, reg: RegAddr, data: u8, mode: WriteMode) -> Result<()> {
        reg.require()?;
        match mode {
            WriteMode::Dummy => {
                self.open.forget(reg);
                self.cache.set(reg, data);
                return Ok(());
            }
            WriteMode::Normal if self.open.effective(&self.cache, reg) == data => {
                return Ok(());
            }
            WriteMode::Normal | WriteMode::Force => {}
        }
        if self.open.try_push(&self.cache, reg, data) {
            return Ok(());
        }
        self.commit()?;
        if self.open.try_push(&self.cache, reg, data) {
            Ok(())
        } else {
            Err(Error::Internal)
        }
    }

    fn commit(&mut self) -> Result<()> {
        let Some(slave) = self.open.slave() else {
            return Ok(());
        };
        if self.open.is_empty() {
            self.open.reset();
            return Ok(());
        }
        let addr = self.address(slave);
        tracing::trace!(addr, len = self.open.bytes().len(), "transfer");
        let sent = self.i2c.write(addr, self.open.bytes());
        match sent {
            Ok(()) => {
                for &(reg, value) in self.open.pending() {
                    self.cache.set(reg, value);
                }
                self.open.reset();
                Ok(())
            }
            Err(e) => {
                self.open.reset();
                Err(Error::Bus(e.kind()))
            }
        }
    }

    fn timed_wait(&mut self, us: u32) -> Result<()> {
        self.commit()?;
        tracing::trace!(us, "settle");
        self.delay.delay_us(us);
        Ok(())
    }

    fn event_wait(&mut self, event: WaitEvent) -> Result<()> {
        self.commit()?;
        let interval = self.wait.poll_interval_us.max(1);
        let mut waited: u32 = 0;
        loop {
            let value = self.read_raw(event.reg)?;
            if event.is_met(value) {
                tracing::trace!(waited_us = waited, mask = event.mask, "event met");
                return Ok(());
            }
            if waited >= self.wait.timeout_us {
                tracing::warn!(mask = event.mask, value, "event wait timed out");
                return Err(Error::Timeout(event));
            }
            self.delay.delay_us(interval);
            waited = waited.saturating_add(interval);
        }
    }

    fn read_raw(&mut self, reg: RegAddr) -> Result<u8> {
        let addr = self.address(reg.bank.slave());
        let mut buf = [0u8];
        let result = match reg.bank.addressing() {
            Addressing::Direct => self
                .i2c
                .write_read(addr, &[select(reg.offset, false)], &mut buf),
            Addressing::Window { adr, data } => self
                .i2c
                .write(addr, &[select(adr, false), reg.offset])
                .and_then(|()| {
                    self.i2c
                        .write_read(addr, &[select(data, false)], &mut buf)
                }),
        };
        result.map_err(|e| Error::Bus(e.kind()))?;
        let [value] = buf;
        Ok(value)
    }

    fn address(&self, slave: Slave) -> u8 {
        match slave {
            Slave::Digital => self.digital_addr,
            Slave::Analog => self.analog_addr,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::regmap::Bank;
    use crate::registers::{ANA_PD_AMP, ANA_PD_MB, ANA_PD_REF, IF_RST, MA_DAC_SRC};
    use platform::mocks::{MockDelay, MockI2c};

    fn executor() -> Executor<MockI2c, MockDelay> {
        let mut ex = Executor::new(MockI2c::new(), MockDelay::new());
        ex.allocate().unwrap();
        ex
    }

    #[test]
    fn redundant_normal_write_emits_nothing() {
        let mut ex = executor();
        ex.enqueue_write(ANA_PD_AMP, 0xFF, WriteMode::Normal).unwrap();
        ex.flush().unwrap();
        assert!(ex.bus().writes.is_empty());
    }

    #[test]
    fn forced_write_is_always_sent() {
        let mut ex = executor();
        ex.enqueue_write(ANA_PD_AMP, 0xFF, WriteMode::Force).unwrap();
        ex.flush().unwrap();
        assert_eq!(ex.bus().writes.len(), 1);
        assert_eq!(ex.bus().writes[0].bytes, vec![select(0x07, false), 0xFF]);
    }

    #[test]
    fn dummy_write_updates_cache_only() {
        let mut ex = executor();
        ex.enqueue_write(IF_RST, 0x01, WriteMode::Force).unwrap();
        ex.enqueue_write(IF_RST, 0x00, WriteMode::Dummy).unwrap();
        ex.flush().unwrap();
        assert_eq!(ex.bus().writes.len(), 1);
        assert_eq!(ex.cache().get(IF_RST), Some(0x00));
    }

    #[test]
    fn cache_commits_after_transfer_is_accepted() {
        let mut ex = executor();
        ex.enqueue_write(ANA_PD_REF, 0x00, WriteMode::Normal).unwrap();
        ex.enqueue_write(ANA_PD_MB, 0x00, WriteMode::Normal).unwrap();
        assert_eq!(ex.cache().get(ANA_PD_REF), Some(0x03));
        ex.flush().unwrap();
        assert_eq!(ex.cache().get(ANA_PD_REF), Some(0x00));
        assert_eq!(ex.cache().get(ANA_PD_MB), Some(0x00));
        assert_eq!(ex.bus().writes.len(), 1);
    }

    #[test]
    fn timed_wait_splits_transfers_and_delays() {
        let mut ex = executor();
        ex.enqueue_write(ANA_PD_REF, 0x00, WriteMode::Normal).unwrap();
        ex.enqueue_timed_wait(250).unwrap();
        ex.enqueue_write(ANA_PD_MB, 0x00, WriteMode::Normal).unwrap();
        ex.flush().unwrap();
        assert_eq!(ex.bus().writes.len(), 2);
        assert_eq!(ex.delay().elapsed_us(), 250);
    }

    #[test]
    fn event_wait_times_out_and_discards_the_rest() {
        let mut ex = executor();
        ex.enqueue_write(ANA_PD_REF, 0x00, WriteMode::Normal).unwrap();
        ex.enqueue_event_wait(WaitEvent::REFERENCE_READY).unwrap();
        ex.enqueue_write(ANA_PD_MB, 0x00, WriteMode::Normal).unwrap();
        assert_eq!(
            ex.flush(),
            Err(Error::Timeout(WaitEvent::REFERENCE_READY))
        );
        // First write landed and is cached; the one after the wait never ran.
        assert_eq!(ex.cache().get(ANA_PD_REF), Some(0x00));
        assert_eq!(ex.cache().get(ANA_PD_MB), Some(0x07));
        assert_eq!(ex.bus().writes.len(), 1);
        assert!(ex.delay().elapsed_us() >= u64::from(WaitTiming::default().timeout_us));
    }

    #[test]
    fn event_wait_succeeds_on_scripted_flag() {
        let mut ex = executor();
        ex.bus_mut()
            .reply(DEFAULT_ANALOG_ADDR, select(0x02, false), 0x01);
        ex.enqueue_event_wait(WaitEvent::REFERENCE_READY).unwrap();
        ex.flush().unwrap();
        assert_eq!(ex.bus().reads, 1);
    }

    #[test]
    fn bus_error_leaves_cache_untouched() {
        let mut ex = executor();
        ex.bus_mut().fail_after(0);
        ex.enqueue_write(MA_DAC_SRC, 0x01, WriteMode::Normal).unwrap();
        assert!(matches!(ex.flush(), Err(Error::Bus(_))));
        assert_eq!(ex.cache().get(MA_DAC_SRC), Some(0x00));
    }

    #[test]
    fn full_queue_flushes_implicitly() {
        let mut ex = executor();
        for i in 0..100u8 {
            let reg = RegAddr::new(Bank::Ana, if i % 2 == 0 { 0x14 } else { 0x1C });
            ex.enqueue_write(reg, i, WriteMode::Force).unwrap();
        }
        // 63 usable slots: the 64th enqueue flushed the first batch.
        assert!(!ex.bus().writes.is_empty());
        ex.flush().unwrap();
        let total: usize = ex.bus().writes.iter().map(|t| t.bytes.len()).sum();
        assert_eq!(total, 200);
    }

    #[test]
    fn enqueue_without_allocation_is_a_state_error() {
        let mut ex = Executor::new(MockI2c::new(), MockDelay::new());
        assert_eq!(ex.enqueue_timed_wait(1), Err(Error::State));
    }

    #[test]
    fn window_register_read_selects_address_first() {
        let mut ex = executor();
        ex.read(MA_DAC_SRC).unwrap();
        assert_eq!(ex.bus().writes[0].bytes, vec![select(0x04, false), 0x03]);
    }
}
