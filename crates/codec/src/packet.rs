//! Operation descriptors and the fixed-capacity packet queue.
//!
//! Callers build a program of [`Op`]s into the queue; the
//! [`Executor`](crate::executor::Executor) drains it in order on flush.

use heapless::Deque;

use crate::config::QUEUE_CAPACITY;
use crate::error::{Error, Result};
use crate::regmap::RegAddr;
use crate::registers::{
    ANA_MUTE_STATUS, ANA_STATUS, ANA_STATUS_CP_RDY, ANA_STATUS_HP_RDY, ANA_STATUS_REF_RDY,
    ANA_STATUS_SP_RDY, IF_STATUS, STATUS_CLK_STABLE, STATUS_ENGINE_IDLE, STATUS_PLL_LOCK,
};

/// How a queued write interacts with the shadow cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WriteMode {
    /// Skip when the value already matches the cache.
    Normal,
    /// Always transmit.
    Force,
    /// Update the cache only; the device got there by itself.
    Dummy,
}

/// Which way a status bit must settle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Polarity {
    /// Every bit in the mask reads 1.
    Set,
    /// Every bit in the mask reads 0.
    Clear,
}

/// A hardware condition polled by an event-wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct WaitEvent {
    /// Status register to poll.
    pub reg: RegAddr,
    /// Bits that must match.
    pub mask: u8,
    /// Required level of the masked bits.
    pub polarity: Polarity,
}

impl WaitEvent {
    /// PLL reports lock.
    pub const PLL_LOCK: Self = Self::set(IF_STATUS, STATUS_PLL_LOCK);
    /// System clock stable.
    pub const CLOCK_STABLE: Self = Self::set(IF_STATUS, STATUS_CLK_STABLE);
    /// Audio engine finished its current frame.
    pub const ENGINE_IDLE: Self = Self::set(IF_STATUS, STATUS_ENGINE_IDLE);
    /// Reference rails ready.
    pub const REFERENCE_READY: Self = Self::set(ANA_STATUS, ANA_STATUS_REF_RDY);
    /// Charge pump ready.
    pub const CHARGE_PUMP_READY: Self = Self::set(ANA_STATUS, ANA_STATUS_CP_RDY);
    /// Headphone amplifiers ready.
    pub const HEADPHONE_READY: Self = Self::set(ANA_STATUS, ANA_STATUS_HP_RDY);
    /// Speaker amplifier ready.
    pub const SPEAKER_READY: Self = Self::set(ANA_STATUS, ANA_STATUS_SP_RDY);

    /// Wait until every bit of `mask` in `reg` reads 1.
    pub const fn set(reg: RegAddr, mask: u8) -> Self {
        Self {
            reg,
            mask,
            polarity: Polarity::Set,
        }
    }

    /// Wait until every bit of `mask` in `reg` reads 0.
    pub const fn clear(reg: RegAddr, mask: u8) -> Self {
        Self {
            reg,
            mask,
            polarity: Polarity::Clear,
        }
    }

    /// Soft-mute ramp finished on the outputs in `mask`.
    pub const fn mute_done(mask: u8) -> Self {
        Self::set(ANA_MUTE_STATUS, mask)
    }

    /// Whether a polled register value satisfies the condition.
    pub fn is_met(&self, value: u8) -> bool {
        match self.polarity {
            Polarity::Set => value & self.mask == self.mask,
            Polarity::Clear => value & self.mask == 0,
        }
    }
}

/// One queued operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Op {
    /// Register write through the cache and chainer.
    Write {
        /// Target register.
        reg: RegAddr,
        /// Value.
        data: u8,
        /// Cache interaction.
        mode: WriteMode,
    },
    /// Fixed delay.
    TimedWait {
        /// Microseconds.
        us: u32,
    },
    /// Poll a status register.
    EventWait {
        /// Condition.
        event: WaitEvent,
    },
    /// End of program; commits the open transfer.
    Terminate,
}

/// Bounded FIFO of descriptors; the last slot is reserved for the sentinel.
#[derive(Debug, Default)]
pub struct PacketQueue {
    ops: Deque<Op, QUEUE_CAPACITY>,
}

impl PacketQueue {
    /// Descriptors a caller may queue before an implicit flush.
    pub const USABLE: usize = QUEUE_CAPACITY - 1;

    /// An empty queue.
    pub fn new() -> Self {
        Self { ops: Deque::new() }
    }

    /// Queued descriptors.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Whether only the sentinel slot is left.
    pub fn is_full(&self) -> bool {
        self.ops.len() >= Self::USABLE
    }

    /// Queue a caller descriptor; fails when only the sentinel slot is left.
    pub fn push(&mut self, op: Op) -> Result<()> {
        if self.is_full() {
            return Err(Error::Internal);
        }
        self.ops.push_back(op).map_err(|_| Error::Internal)
    }

    pub(crate) fn push_sentinel(&mut self) -> Result<()> {
        self.ops.push_back(Op::Terminate).map_err(|_| Error::Internal)
    }

    pub(crate) fn pop(&mut self) -> Option<Op> {
        self.ops.pop_front()
    }

    pub(crate) fn clear(&mut self) {
        self.ops.clear();
    }
}

/// The session's single packet buffer.
#[derive(Debug, Default)]
pub struct PacketPool {
    queue: PacketQueue,
    allocated: bool,
}

impl PacketPool {
    /// A pool with its buffer free.
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the buffer; it is not reentrant.
    pub fn allocate(&mut self) -> Result<()> {
        if self.allocated {
            return Err(Error::ResourceExhausted);
        }
        self.allocated = true;
        Ok(())
    }

    /// Return the buffer, dropping anything still queued.
    pub fn release(&mut self) {
        self.queue.clear();
        self.allocated = false;
    }

    /// Whether the buffer is claimed.
    pub fn is_allocated(&self) -> bool {
        self.allocated
    }

    /// The queue, if claimed.
    pub fn queue(&mut self) -> Result<&mut PacketQueue> {
        if self.allocated {
            Ok(&mut self.queue)
        } else {
            Err(Error::State)
        }
    }
}
