//! Audio domain newtypes for compile-time safety.
//!
//! These zero-cost abstractions prevent common errors:
//! - `Decibel`: fixed-point dB in 1/256 dB units with a reserved mute sentinel
//! - `SampleRateHz`: validates the rates a digital audio port can clock
//! - `I2cAddr<Slave>`: phantom type binds an address to the correct slave

use core::marker::PhantomData;

// ── Error type ───────────────────────────────────────────────────────────────

/// Error returned when a value is out of the valid range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror_no_std::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[error("value {value} outside {min}..={max}")]
pub struct OutOfRangeError {
    /// The value that was out of range.
    pub value: i32,
    /// The inclusive minimum allowed value.
    pub min: i32,
    /// The inclusive maximum allowed value.
    pub max: i32,
}

impl OutOfRangeError {
    /// Check `value` against an inclusive range.
    ///
    /// # Errors
    ///
    /// Returns [`OutOfRangeError`] if `value` is outside `min..=max`.
    pub fn check(value: i32, min: i32, max: i32) -> Result<(), Self> {
        if value < min || value > max {
            Err(Self { value, min, max })
        } else {
            Ok(())
        }
    }
}

// ── Decibel ──────────────────────────────────────────────────────────────────

/// Logical level in 1/256 dB units.
///
/// `Decibel::MUTE` is a sentinel, not a level: every volume curve maps it to
/// its mute code regardless of range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(transparent)]
pub struct Decibel(i16);

impl Decibel {
    /// Units per dB.
    pub const ONE_DB: i16 = 256;

    /// Mute sentinel.
    pub const MUTE: Self = Self(i16::MIN);

    /// 0 dB.
    pub const ZERO: Self = Self(0);

    /// Wrap a raw 1/256 dB value.
    #[must_use]
    pub const fn from_raw(raw: i16) -> Self {
        Self(raw)
    }

    /// Build from whole decibels, saturating at the representable range.
    ///
    /// Never produces the mute sentinel.
    #[must_use]
    pub const fn from_db(db: i16) -> Self {
        let raw = db.saturating_mul(Self::ONE_DB);
        if raw == i16::MIN {
            Self(i16::MIN + 1)
        } else {
            Self(raw)
        }
    }

    /// Raw 1/256 dB value.
    #[must_use]
    pub const fn raw(self) -> i16 {
        self.0
    }

    /// `true` for the mute sentinel.
    #[must_use]
    pub const fn is_mute(self) -> bool {
        self.0 == i16::MIN
    }
}

impl Default for Decibel {
    fn default() -> Self {
        Self::MUTE
    }
}

// ── SampleRateHz ─────────────────────────────────────────────────────────────

/// Sample rate in Hz, restricted to the rates a digital audio port supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(transparent)]
pub struct SampleRateHz(u32);

impl SampleRateHz {
    /// Supported rates, in register-code order.
    pub const SUPPORTED: [u32; 8] = [
        8_000, 11_025, 16_000, 22_050, 32_000, 44_100, 48_000, 96_000,
    ];

    /// 48 kHz.
    pub const HZ_48000: Self = Self(48_000);

    /// Create a `SampleRateHz`, returning an error for unsupported rates.
    ///
    /// # Errors
    ///
    /// Returns [`OutOfRangeError`] if `hz` is not one of [`Self::SUPPORTED`].
    pub fn new(hz: u32) -> Result<Self, OutOfRangeError> {
        if Self::SUPPORTED.contains(&hz) {
            Ok(Self(hz))
        } else {
            Err(OutOfRangeError {
                value: i32::try_from(hz).unwrap_or(i32::MAX),
                min: 8_000,
                max: 96_000,
            })
        }
    }

    /// Position of this rate in [`Self::SUPPORTED`].
    #[must_use]
    #[allow(clippy::cast_possible_truncation)] // SUPPORTED has 8 entries
    pub fn code(self) -> u8 {
        Self::SUPPORTED
            .iter()
            .position(|&hz| hz == self.0)
            .unwrap_or(0) as u8
    }

    /// Inverse of [`Self::code`]; unknown codes decode to `None`.
    #[must_use]
    pub fn from_code(code: u8) -> Option<Self> {
        Self::SUPPORTED.get(usize::from(code)).copied().map(Self)
    }

    /// Return the sample rate in Hz.
    #[must_use]
    pub fn get(self) -> u32 {
        self.0
    }
}

impl Default for SampleRateHz {
    fn default() -> Self {
        Self::HZ_48000
    }
}

// ── Slave phantom types ──────────────────────────────────────────────────────

/// Phantom type for the codec's digital-block slave (clocks, mixer, engine).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DigitalSlave;

/// Phantom type for the codec's analog-block slave (rails, amps, mixers).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalogSlave;

// ── I2cAddr ──────────────────────────────────────────────────────────────────

/// I2C 7-bit address bound to a specific slave via phantom type.
///
/// The phantom type `Slave` ensures the digital and analog addresses of the
/// codec are not swapped at compile time.
///
/// ## Reserved I2C addresses (I2C specification):
/// - 0x00–0x07: reserved (general call, CBUS, etc.)
/// - 0x78–0x7F: reserved (10-bit address prefix, device ID, etc.)
///
/// ## Usage:
/// ```rust
/// use platform::audio_types::{AnalogSlave, DigitalSlave, I2cAddr};
///
/// let digital: I2cAddr<DigitalSlave> = I2cAddr::new(0x11);
/// let analog: I2cAddr<AnalogSlave> = I2cAddr::new(0x3A);
/// assert_ne!(digital.get(), analog.get());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct I2cAddr<Slave> {
    addr: u8,
    _slave: PhantomData<Slave>,
}

impl<Slave> I2cAddr<Slave> {
    /// Create an I2C address without checking reserved ranges.
    ///
    /// Prefer [`try_new`][Self::try_new] for addresses that come from
    /// configuration. Use this only for known hardware-fixed constants.
    #[must_use]
    pub const fn new(addr: u8) -> Self {
        Self {
            addr,
            _slave: PhantomData,
        }
    }

    /// Create an I2C address, rejecting I2C-reserved ranges.
    ///
    /// Reserved: 0x00–0x07 (general call etc.) and 0x78–0x7F (10-bit prefix).
    ///
    /// # Errors
    ///
    /// Returns [`OutOfRangeError`] if `addr <= 0x07` or `addr >= 0x78`.
    pub fn try_new(addr: u8) -> Result<Self, OutOfRangeError> {
        if addr <= 0x07 || addr >= 0x78 {
            Err(OutOfRangeError {
                value: i32::from(addr),
                min: 0x08,
                max: 0x77,
            })
        } else {
            Ok(Self::new(addr))
        }
    }

    /// Return the 7-bit I2C address.
    #[must_use]
    pub const fn get(self) -> u8 {
        self.addr
    }
}

#[cfg(feature = "defmt")]
impl<Slave> defmt::Format for I2cAddr<Slave> {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{=u8:#x}", self.addr);
    }
}
