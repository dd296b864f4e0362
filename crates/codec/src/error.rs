//! Error types for the codec engine.

use embedded_hal::i2c::ErrorKind;
use platform::OutOfRangeError;

use crate::packet::WaitEvent;
use crate::regmap::RegAddr;
use crate::routing::{Sink, Source};

/// Result alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;

/// Every failure a public codec operation can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror_no_std::Error)]
pub enum Error {
    /// A request was rejected before anything was enqueued.
    #[error("invalid argument: {0}")]
    Argument(#[from] ArgumentError),

    /// Called before `initialize`, after `terminate`, or `initialize` twice.
    #[error("operation not valid in the current session state")]
    State,

    /// The packet buffer is already allocated.
    #[error("packet buffer already allocated")]
    ResourceExhausted,

    /// An event-wait exhausted its polling budget.
    #[error("timed out waiting for a status flag")]
    Timeout(WaitEvent),

    /// The transport reported an error; the transfer was not committed.
    #[error("bus transfer failed")]
    Bus(ErrorKind),

    /// Descriptor or plan bookkeeping reached a state that cannot happen.
    #[error("internal invariant violated")]
    Internal,
}

/// Why a request argument was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror_no_std::Error)]
pub enum ArgumentError {
    /// A numeric field is outside its legal range.
    #[error("{field} = {value} outside {min}..={max}")]
    OutOfRange {
        /// Name of the offending field.
        field: &'static str,
        /// Rejected value.
        value: i32,
        /// Smallest legal value.
        min: i32,
        /// Largest legal value.
        max: i32,
    },

    /// A field is legal on its own but not together with the others.
    #[error("{field} is not valid in this combination")]
    Conflict {
        /// Name of the offending field.
        field: &'static str,
    },

    /// No register exists at this address.
    #[error("unknown register")]
    UnknownRegister(RegAddr),

    /// The register does not allow the requested direction, or is a window
    /// register owned by the engine.
    #[error("register access direction not permitted")]
    RegisterDirection(RegAddr),

    /// The routing request names an input the sink cannot take.
    #[error("routing edge is not wired")]
    EdgeNotWired {
        /// Requested sink.
        sink: Sink,
        /// Requested input.
        input: Source,
    },

    /// ADC and PDM capture would both be active.
    #[error("ADC and PDM capture are mutually exclusive")]
    RoutingExclusive,

    /// Slave addresses are reserved or collide.
    #[error("invalid slave address {0:#04x}")]
    InvalidAddress(u8),
}

impl ArgumentError {
    /// Attach a field name to a platform range error.
    pub const fn out_of_range(field: &'static str, err: OutOfRangeError) -> Self {
        Self::OutOfRange {
            field,
            value: err.value,
            min: err.min,
            max: err.max,
        }
    }
}

/// Range-check `value` against `min..=max`, naming `field` on failure.
pub(crate) fn check_range(field: &'static str, value: i32, min: i32, max: i32) -> Result<()> {
    OutOfRangeError::check(value, min, max)
        .map_err(|e| Error::Argument(ArgumentError::out_of_range(field, e)))
}
