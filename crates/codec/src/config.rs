//! Session configuration passed to [`Codec::initialize`](crate::Codec::initialize).
//!
//! All fields are validated before anything touches the bus; see
//! [`InitConfig::validate`].

use platform::config::{DEFAULT_ANALOG_ADDR, DEFAULT_DIGITAL_ADDR};
use platform::{AnalogSlave, DigitalSlave, I2cAddr};

use crate::error::{check_range, ArgumentError, Error, Result};

/// Packet queue capacity in descriptors, including the terminate sentinel.
pub const QUEUE_CAPACITY: usize = 64;

/// Longest physical transfer the engine will build, in bytes.
pub const MAX_TRANSFER: usize = 64;

/// Soft-reset recovery time before the first register write.
pub const RESET_RECOVERY_US: u32 = 100;

/// Who sequences the analog rails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerMode {
    /// On-chip automation; the engine polls ready flags.
    #[default]
    Auto,
    /// The engine inserts explicit settle delays.
    Manual,
}

/// PLL divider programming.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PllConfig {
    /// Reference divider, `1..=31`.
    pub divr: u8,
    /// Feedback divider, `1..=4095`.
    pub divf: u16,
    /// Loop mode, `0..=3`.
    pub mode: u8,
}

impl Default for PllConfig {
    fn default() -> Self {
        Self {
            divr: 1,
            divf: 32,
            mode: 0,
        }
    }
}

impl PllConfig {
    fn validate(&self) -> Result<()> {
        check_range("pll.divr", i32::from(self.divr), 1, 31)?;
        check_range("pll.divf", i32::from(self.divf), 1, 4095)?;
        check_range("pll.mode", i32::from(self.mode), 0, 3)
    }
}

/// Settle times in microseconds, used in [`PowerMode::Manual`] and for
/// rails without a ready flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SettleTimes {
    /// PLL power-up before reset release.
    pub pll: u32,
    /// Reference rails.
    pub reference: u32,
    /// Charge pump.
    pub charge_pump: u32,
    /// Mic bias.
    pub mic_bias: u32,
    /// ADC front end (converters and preamps).
    pub adc_front_end: u32,
    /// Headphone amplifiers.
    pub headphone: u32,
    /// Speaker amplifier.
    pub speaker: u32,
    /// Receiver amplifier.
    pub receiver: u32,
    /// Line-out amplifiers.
    pub line_out: u32,
}

impl Default for SettleTimes {
    fn default() -> Self {
        Self {
            pll: 500,
            reference: 10_000,
            charge_pump: 2_000,
            mic_bias: 5_000,
            adc_front_end: 3_000,
            headphone: 8_000,
            speaker: 4_000,
            receiver: 1_000,
            line_out: 1_000,
        }
    }
}

/// Event-wait polling budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct WaitTiming {
    /// Delay between status polls.
    pub poll_interval_us: u32,
    /// Give up after this much accumulated delay.
    pub timeout_us: u32,
}

impl Default for WaitTiming {
    fn default() -> Self {
        Self {
            poll_interval_us: 100,
            timeout_us: 20_000,
        }
    }
}

/// Everything `initialize` needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InitConfig {
    /// 7-bit address of the digital slave.
    pub digital_addr: u8,
    /// 7-bit address of the analog slave.
    pub analog_addr: u8,
    /// PLL dividers.
    pub pll: PllConfig,
    /// Rail sequencing mode.
    pub power_mode: PowerMode,
    /// Settle times.
    pub settle: SettleTimes,
    /// Event-wait polling.
    pub wait: WaitTiming,
    /// Mic inputs whose bias rail must be up while routed.
    pub mic_bias: [bool; 3],
    /// Mic bias voltage code, `0..=3`.
    pub mic_bias_voltage: u8,
    /// Keep clocks and reference rails up while no path is active.
    pub hold_clocks: bool,
}

impl Default for InitConfig {
    fn default() -> Self {
        Self {
            digital_addr: DEFAULT_DIGITAL_ADDR,
            analog_addr: DEFAULT_ANALOG_ADDR,
            pll: PllConfig::default(),
            power_mode: PowerMode::default(),
            settle: SettleTimes::default(),
            wait: WaitTiming::default(),
            mic_bias: [true; 3],
            mic_bias_voltage: 0,
            hold_clocks: false,
        }
    }
}

impl InitConfig {
    /// Check every field; nothing is programmed on failure.
    pub fn validate(&self) -> Result<()> {
        self.digital()?;
        self.analog()?;
        if self.digital_addr == self.analog_addr {
            return Err(ArgumentError::InvalidAddress(self.analog_addr).into());
        }
        self.pll.validate()?;
        check_range(
            "wait.poll_interval_us",
            i32::try_from(self.wait.poll_interval_us).unwrap_or(i32::MAX),
            1,
            i32::MAX,
        )?;
        if self.wait.timeout_us < self.wait.poll_interval_us {
            return Err(ArgumentError::Conflict {
                field: "wait.timeout_us",
            }
            .into());
        }
        check_range("mic_bias_voltage", i32::from(self.mic_bias_voltage), 0, 3)
    }

    /// Typed digital slave address.
    pub fn digital(&self) -> Result<I2cAddr<DigitalSlave>> {
        I2cAddr::try_new(self.digital_addr)
            .map_err(|_| Error::Argument(ArgumentError::InvalidAddress(self.digital_addr)))
    }

    /// Typed analog slave address.
    pub fn analog(&self) -> Result<I2cAddr<AnalogSlave>> {
        I2cAddr::try_new(self.analog_addr)
            .map_err(|_| Error::Argument(ArgumentError::InvalidAddress(self.analog_addr)))
    }
}
