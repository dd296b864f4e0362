//! Consumer-facing block settings and their register encodings.
//!
//! Every settings type validates as a whole before anything is enqueued,
//! and decodes back from the shadow cache so getters always report what the
//! chip holds.

use platform::SampleRateHz;

use crate::cache::ShadowCache;
use crate::error::{check_range, ArgumentError, Result};
use crate::regmap::{Bank, RegAddr};
use crate::registers::{
    A_GP0_CFG, CD_SP_CFG, E_CTRL, E_CTRL_DRC, E_CTRL_EQ, E_DRC_THRESHOLD, E_EQ_COEF_BASE,
    E_NG_CTRL, E_NG_TIME, MB_ADC_CFG, MB_DAC_CFG, MB_DIO0_MODE, MB_DIO_BCK, MB_DIO_FMT,
    MB_DIO_STRIDE, MB_PDM_CFG,
};

const fn bit(value: u8, mask: u8) -> bool {
    value & mask != 0
}

const fn flag(on: bool, mask: u8) -> u8 {
    if on {
        mask
    } else {
        0
    }
}

/// A block whose whole configuration lives in one register.
pub trait ControlRegister: Copy + Sized {
    /// Register holding the configuration.
    const REG: RegAddr;

    /// Reject out-of-range or conflicting fields.
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// Register value for these settings.
    fn encode(&self) -> u8;

    /// Settings held by a register value.
    fn decode(value: u8) -> Self;
}

// ── Digital IO ───────────────────────────────────────────────────────────────

/// One of the three digital audio ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum DioPort {
    /// Port 0.
    Dio0,
    /// Port 1.
    Dio1,
    /// Port 2.
    Dio2,
}

impl DioPort {
    /// All ports, lowest first.
    pub const ALL: [DioPort; 3] = [DioPort::Dio0, DioPort::Dio1, DioPort::Dio2];

    /// Port number.
    pub const fn index(self) -> usize {
        self as usize
    }

    #[allow(clippy::arithmetic_side_effects)] // at most 0x0A
    const fn reg(self, field: u8) -> RegAddr {
        RegAddr::new(Bank::Mb, MB_DIO0_MODE + MB_DIO_STRIDE * (self as u8) + field)
    }
}

/// Serial audio framing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum AudioFormat {
    /// Philips I²S.
    #[default]
    I2s = 0,
    /// Left justified.
    LeftJustified = 1,
    /// Right justified.
    RightJustified = 2,
    /// PCM / DSP mode.
    Pcm = 3,
}

impl AudioFormat {
    const fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            1 => Self::LeftJustified,
            2 => Self::RightJustified,
            3 => Self::Pcm,
            _ => Self::I2s,
        }
    }
}

/// Sample word width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum WordWidth {
    /// 16 bits.
    #[default]
    B16 = 0,
    /// 20 bits.
    B20 = 1,
    /// 24 bits.
    B24 = 2,
}

impl WordWidth {
    const fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            1 => Self::B20,
            2 => Self::B24,
            _ => Self::B16,
        }
    }
}

/// Bit clocks per frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum BclkRatio {
    /// 32 fs.
    Fs32 = 0,
    /// 48 fs.
    Fs48 = 1,
    /// 64 fs.
    #[default]
    Fs64 = 2,
}

impl BclkRatio {
    const fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => Self::Fs32,
            1 => Self::Fs48,
            _ => Self::Fs64,
        }
    }
}

/// Configuration of one digital audio port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DioSettings {
    /// Drive the bit and frame clocks.
    pub master: bool,
    /// Frame rate.
    pub rate: SampleRateHz,
    /// Framing.
    pub format: AudioFormat,
    /// Word width.
    pub width: WordWidth,
    /// Bit-clock ratio.
    pub bclk: BclkRatio,
    /// Route this port through the sample-rate converter.
    pub src: bool,
}

impl DioSettings {
    /// Reject word widths that do not fit the bit clock.
    pub fn validate(&self) -> Result<()> {
        if self.bclk == BclkRatio::Fs32 && self.width != WordWidth::B16 {
            return Err(ArgumentError::Conflict { field: "bclk" }.into());
        }
        Ok(())
    }

    /// Mode, format and bit-clock register writes for `port`.
    #[allow(clippy::arithmetic_side_effects)] // shifts of 2-bit codes
    pub(crate) fn encode(&self, port: DioPort) -> [(RegAddr, u8); 3] {
        [
            (
                port.reg(0),
                flag(self.master, 0x01) | (self.rate.code() << 1),
            ),
            (
                port.reg(MB_DIO_FMT),
                self.format as u8 | ((self.width as u8) << 2),
            ),
            (port.reg(MB_DIO_BCK), self.bclk as u8),
        ]
    }

    /// Settings held in the cache for `port`; `src` is session state.
    #[allow(clippy::arithmetic_side_effects)]
    pub(crate) fn decode(cache: &ShadowCache, port: DioPort, src: bool) -> Self {
        let mode = cache.value(port.reg(0));
        let fmt = cache.value(port.reg(MB_DIO_FMT));
        Self {
            master: bit(mode, 0x01),
            rate: SampleRateHz::from_code((mode >> 1) & 0x07).unwrap_or_default(),
            format: AudioFormat::from_bits(fmt),
            width: WordWidth::from_bits(fmt >> 2),
            bclk: BclkRatio::from_bits(cache.value(port.reg(MB_DIO_BCK))),
            src,
        }
    }
}

/// Sample-rate converter owner code: `0` for none, `n + 1` for the lowest
/// requesting port `n`.
#[allow(clippy::cast_possible_truncation)] // three ports
pub(crate) fn src_owner(requests: &[bool; 3]) -> u8 {
    requests
        .iter()
        .position(|&r| r)
        .map_or(0, |p| (p as u8).saturating_add(1))
}

// ── Converters ───────────────────────────────────────────────────────────────

/// DAC channel mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ChannelMap {
    /// Left to left, right to right.
    #[default]
    Stereo = 0,
    /// Channels swapped.
    Swapped = 1,
    /// Left on both channels.
    MonoLeft = 2,
    /// Right on both channels.
    MonoRight = 3,
}

/// DAC configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DacSettings {
    /// Channel mapping.
    pub channels: ChannelMap,
    /// DC-blocking filter.
    pub dc_cut: bool,
    /// Dither.
    pub dither: bool,
}

impl ControlRegister for DacSettings {
    const REG: RegAddr = MB_DAC_CFG;

    fn encode(&self) -> u8 {
        self.channels as u8 | flag(self.dc_cut, 1 << 2) | flag(self.dither, 1 << 3)
    }

    fn decode(value: u8) -> Self {
        Self {
            channels: match value & 0x03 {
                1 => ChannelMap::Swapped,
                2 => ChannelMap::MonoLeft,
                3 => ChannelMap::MonoRight,
                _ => ChannelMap::Stereo,
            },
            dc_cut: bit(value, 1 << 2),
            dither: bit(value, 1 << 3),
        }
    }
}

/// ADC configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AdcSettings {
    /// Automatic gain control.
    pub agc: bool,
    /// AGC target level, `0..=3`.
    pub agc_target: u8,
    /// Mono capture.
    pub mono: bool,
    /// High-pass filter.
    pub high_pass: bool,
}

impl ControlRegister for AdcSettings {
    const REG: RegAddr = MB_ADC_CFG;

    fn validate(&self) -> Result<()> {
        check_range("agc_target", i32::from(self.agc_target), 0, 3)
    }

    #[allow(clippy::arithmetic_side_effects)] // validated 2-bit field
    fn encode(&self) -> u8 {
        flag(self.agc, 1 << 0)
            | ((self.agc_target & 0x03) << 1)
            | flag(self.mono, 1 << 3)
            | flag(self.high_pass, 1 << 4)
    }

    #[allow(clippy::arithmetic_side_effects)]
    fn decode(value: u8) -> Self {
        Self {
            agc: bit(value, 1 << 0),
            agc_target: (value >> 1) & 0x03,
            mono: bit(value, 1 << 3),
            high_pass: bit(value, 1 << 4),
        }
    }
}

/// Speaker amplifier configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SpeakerSettings {
    /// Class-D output stage (class-AB otherwise).
    pub class_d: bool,
    /// Boost level, `0..=3`; class-D only.
    pub boost: u8,
}

impl ControlRegister for SpeakerSettings {
    const REG: RegAddr = CD_SP_CFG;

    fn validate(&self) -> Result<()> {
        check_range("boost", i32::from(self.boost), 0, 3)?;
        if self.boost != 0 && !self.class_d {
            return Err(ArgumentError::Conflict { field: "boost" }.into());
        }
        Ok(())
    }

    #[allow(clippy::arithmetic_side_effects)]
    fn encode(&self) -> u8 {
        flag(self.class_d, 1 << 0) | ((self.boost & 0x03) << 2)
    }

    #[allow(clippy::arithmetic_side_effects)]
    fn decode(value: u8) -> Self {
        Self {
            class_d: bit(value, 1 << 0),
            boost: (value >> 2) & 0x03,
        }
    }
}

/// PDM bit-clock rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PdmClock {
    /// 64 fs.
    #[default]
    Fs64,
    /// 128 fs.
    Fs128,
}

/// PDM input configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PdmSettings {
    /// Clock rate.
    pub clock: PdmClock,
    /// Sample the left channel on the rising edge.
    pub rising_edge: bool,
    /// Data delay in half clocks, `0..=7`.
    pub data_delay: u8,
    /// Two microphones on one data line.
    pub stereo: bool,
}

impl ControlRegister for PdmSettings {
    const REG: RegAddr = MB_PDM_CFG;

    fn validate(&self) -> Result<()> {
        check_range("data_delay", i32::from(self.data_delay), 0, 7)
    }

    #[allow(clippy::arithmetic_side_effects)]
    fn encode(&self) -> u8 {
        flag(self.clock == PdmClock::Fs128, 1 << 0)
            | flag(self.rising_edge, 1 << 1)
            | ((self.data_delay & 0x07) << 2)
            | flag(self.stereo, 1 << 5)
    }

    #[allow(clippy::arithmetic_side_effects)]
    fn decode(value: u8) -> Self {
        Self {
            clock: if bit(value, 1 << 0) {
                PdmClock::Fs128
            } else {
                PdmClock::Fs64
            },
            rising_edge: bit(value, 1 << 1),
            data_delay: (value >> 2) & 0x07,
            stereo: bit(value, 1 << 5),
        }
    }
}

// ── Audio engine ─────────────────────────────────────────────────────────────

/// Number of equalizer coefficient registers.
pub const EQ_COEFFICIENTS: usize = 15;

/// Noise gate on the engine input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NoiseGate {
    /// Gate enabled.
    pub enabled: bool,
    /// Threshold step, `0..=15`.
    pub threshold: u8,
    /// Attack time step, `0..=3`.
    pub attack: u8,
    /// Release time step, `0..=3`.
    pub release: u8,
}

impl NoiseGate {
    /// Range-check every field.
    pub fn validate(&self) -> Result<()> {
        check_range("threshold", i32::from(self.threshold), 0, 15)?;
        check_range("attack", i32::from(self.attack), 0, 3)?;
        check_range("release", i32::from(self.release), 0, 3)
    }

    #[allow(clippy::arithmetic_side_effects)]
    pub(crate) fn encode(&self) -> [(RegAddr, u8); 2] {
        [
            (
                E_NG_CTRL,
                flag(self.enabled, 1 << 0) | ((self.threshold & 0x0F) << 1),
            ),
            (E_NG_TIME, (self.attack & 0x03) | ((self.release & 0x03) << 2)),
        ]
    }

    #[allow(clippy::arithmetic_side_effects)]
    pub(crate) fn decode(cache: &ShadowCache) -> Self {
        let ctrl = cache.value(E_NG_CTRL);
        let time = cache.value(E_NG_TIME);
        Self {
            enabled: bit(ctrl, 1 << 0),
            threshold: (ctrl >> 1) & 0x0F,
            attack: time & 0x03,
            release: (time >> 2) & 0x03,
        }
    }
}

/// Equalizer and compressor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AudioEngine {
    /// Equalizer enabled.
    pub eq: bool,
    /// Compressor enabled.
    pub drc: bool,
    /// Compressor threshold step, `0..=63`.
    pub drc_threshold: u8,
    /// Equalizer coefficients, written in register order.
    pub eq_coefficients: [u8; EQ_COEFFICIENTS],
}

impl AudioEngine {
    /// Range-check every field.
    pub fn validate(&self) -> Result<()> {
        check_range("drc_threshold", i32::from(self.drc_threshold), 0, 63)
    }

    pub(crate) fn ctrl(&self) -> u8 {
        flag(self.eq, E_CTRL_EQ) | flag(self.drc, E_CTRL_DRC)
    }

    pub(crate) fn threshold(&self) -> (RegAddr, u8) {
        (E_DRC_THRESHOLD, self.drc_threshold & 0x3F)
    }

    /// Coefficient registers paired with their values.
    #[allow(clippy::arithmetic_side_effects)] // offsets 0x10..=0x1E
    pub(crate) fn coefficients(&self) -> impl Iterator<Item = (RegAddr, u8)> + '_ {
        (E_EQ_COEF_BASE..)
            .zip(self.eq_coefficients.iter())
            .map(|(offset, &c)| (RegAddr::new(Bank::E, offset), c))
    }

    pub(crate) fn decode(cache: &ShadowCache) -> Self {
        let ctrl = cache.value(E_CTRL);
        let mut eq_coefficients = [0u8; EQ_COEFFICIENTS];
        for (slot, offset) in eq_coefficients.iter_mut().zip(E_EQ_COEF_BASE..) {
            *slot = cache.value(RegAddr::new(Bank::E, offset));
        }
        Self {
            eq: bit(ctrl, E_CTRL_EQ),
            drc: bit(ctrl, E_CTRL_DRC),
            drc_threshold: cache.value(E_DRC_THRESHOLD) & 0x3F,
            eq_coefficients,
        }
    }
}

// ── GPIO ─────────────────────────────────────────────────────────────────────

/// General-purpose pad.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum GpioPad {
    /// Pad 0.
    P0,
    /// Pad 1.
    P1,
    /// Pad 2.
    P2,
}

impl GpioPad {
    /// All pads.
    pub const ALL: [GpioPad; 3] = [GpioPad::P0, GpioPad::P1, GpioPad::P2];

    /// Bit of this pad in the mask, data and interrupt-enable registers.
    #[allow(clippy::arithmetic_side_effects)] // pad < 3
    pub const fn mask(self) -> u8 {
        1 << (self as u8)
    }

    #[allow(clippy::arithmetic_side_effects)]
    pub(crate) const fn cfg_reg(self) -> RegAddr {
        RegAddr::new(A_GP0_CFG.bank, A_GP0_CFG.offset + self as u8)
    }
}

/// Pad direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GpioDirection {
    /// Input.
    #[default]
    Input,
    /// Push-pull output.
    Output,
}

/// Pad pull resistor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Pull {
    /// Floating.
    #[default]
    None = 0,
    /// Pull-up.
    Up = 1,
    /// Pull-down.
    Down = 2,
}

/// Interrupt edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum IrqEdge {
    /// No interrupt.
    #[default]
    None = 0,
    /// Rising edge.
    Rising = 1,
    /// Falling edge.
    Falling = 2,
    /// Either edge.
    Both = 3,
}

/// Pad configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GpioConfig {
    /// Direction.
    pub direction: GpioDirection,
    /// Pull resistor.
    pub pull: Pull,
    /// Interrupt edge; inputs only.
    pub irq: IrqEdge,
}

impl GpioConfig {
    /// Reject interrupts on output pads.
    pub fn validate(&self) -> Result<()> {
        if self.direction == GpioDirection::Output && self.irq != IrqEdge::None {
            return Err(ArgumentError::Conflict { field: "irq" }.into());
        }
        Ok(())
    }

    #[allow(clippy::arithmetic_side_effects)]
    pub(crate) fn encode(&self) -> u8 {
        flag(self.direction == GpioDirection::Output, 1 << 0)
            | ((self.pull as u8) << 1)
            | ((self.irq as u8) << 3)
    }

    #[allow(clippy::arithmetic_side_effects)]
    pub(crate) fn decode(value: u8) -> Self {
        Self {
            direction: if bit(value, 1 << 0) {
                GpioDirection::Output
            } else {
                GpioDirection::Input
            },
            pull: match (value >> 1) & 0x03 {
                1 => Pull::Up,
                2 => Pull::Down,
                _ => Pull::None,
            },
            irq: match (value >> 3) & 0x03 {
                1 => IrqEdge::Rising,
                2 => IrqEdge::Falling,
                3 => IrqEdge::Both,
                _ => IrqEdge::None,
            },
        }
    }
}
