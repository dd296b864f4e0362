//! Volume curves and stereo-latched volume programming.
//!
//! Three register classes share one logical unit, [`Decibel`] (1/256 dB):
//!
//! | Class       | Range            | Codes         | Step                          |
//! |-------------|------------------|---------------|-------------------------------|
//! | Digital     | −74.25 … +18 dB  | 1…124, 0 mute | 0.75 dB                       |
//! | Analog out  | −42 … 0 dB       | 1…31, 0 mute  | 2 dB, then 0.5 dB from −6 dB  |
//! | Gain        | −9 … +33 dB      | 1…15, 0 mute  | 3 dB                          |
//!
//! Stereo pairs use bit 7 of the left register as a latch: a latched left
//! value is held until the right register is written, so both channels
//! change on the same sample.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use platform::Decibel;

use crate::cache::ShadowCache;
use crate::error::Result;
use crate::executor::Executor;
use crate::packet::WriteMode;
use crate::regmap::{Bank, RegAddr};
use crate::registers::{ANA_HP_VOL_L, ANA_MIC1_GAIN, MA_VOL_BASE};
use crate::routing::{RoutingGraph, Sink, Source};

/// Left-register latch bit for stereo pairs.
pub const LATCH: u8 = 0x80;

/// Register family a volume target belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum VolumeClass {
    /// Digital attenuator.
    Digital,
    /// Analog output attenuator.
    AnalogOut,
    /// Analog input gain.
    Gain,
}

// Curve anchors in 1/256 dB.
const DIG_ZERO: i32 = -19_200; // code 0 position (-75 dB)
const DIG_STEP: i32 = 192; // 0.75 dB
const DIG_MAX: u8 = 124;
const ANA_FLOOR: i32 = -10_752; // code 1: -42 dB
const ANA_COARSE: i32 = 512; // 2 dB
const ANA_KNEE: i32 = -1_536; // code 19: -6 dB
const ANA_KNEE_CODE: u8 = 19;
const ANA_FINE: i32 = 128; // 0.5 dB
const ANA_MAX: u8 = 31;
const GAIN_FLOOR: i32 = -2_304; // code 1: -9 dB
const GAIN_STEP: i32 = 768; // 3 dB
const GAIN_MAX: u8 = 15;

impl VolumeClass {
    /// Highest register code.
    pub const fn max_code(self) -> u8 {
        match self {
            VolumeClass::Digital => DIG_MAX,
            VolumeClass::AnalogOut => ANA_MAX,
            VolumeClass::Gain => GAIN_MAX,
        }
    }

    /// Bits holding the code (the rest is latch or reserved).
    pub const fn code_mask(self) -> u8 {
        match self {
            VolumeClass::Digital => 0x7F,
            VolumeClass::AnalogOut => 0x1F,
            VolumeClass::Gain => 0x0F,
        }
    }

    /// Quantize a level to a register code.
    ///
    /// Above range clamps to the top code. Below the floor mutes the two
    /// attenuator classes and clamps gains to code 1. Ties round down.
    #[allow(clippy::arithmetic_side_effects)] // i32 math on i16 inputs
    pub fn convert(self, db: Decibel) -> u8 {
        if db.is_mute() {
            return 0;
        }
        let raw = i32::from(db.raw());
        let code = match self {
            VolumeClass::Digital => {
                if raw < DIG_ZERO + DIG_STEP {
                    return 0;
                }
                (raw - DIG_ZERO + DIG_STEP / 2 - 1) / DIG_STEP
            }
            VolumeClass::AnalogOut => {
                if raw < ANA_FLOOR {
                    return 0;
                }
                if raw >= ANA_KNEE {
                    i32::from(ANA_KNEE_CODE) + (raw - ANA_KNEE + ANA_FINE / 2 - 1) / ANA_FINE
                } else {
                    1 + (raw - ANA_FLOOR + ANA_COARSE / 2 - 1) / ANA_COARSE
                }
            }
            VolumeClass::Gain => {
                if raw <= GAIN_FLOOR {
                    return 1;
                }
                1 + (raw - GAIN_FLOOR + GAIN_STEP / 2 - 1) / GAIN_STEP
            }
        };
        u8::try_from(code.clamp(1, i32::from(self.max_code()))).unwrap_or(self.max_code())
    }

    /// Exact level of a register code; `0` is [`Decibel::MUTE`].
    #[allow(clippy::arithmetic_side_effects, clippy::cast_possible_truncation)] // bounded by max_code
    pub fn to_decibel(self, code: u8) -> Decibel {
        if code == 0 {
            return Decibel::MUTE;
        }
        let c = i32::from(code.min(self.max_code()));
        let raw = match self {
            VolumeClass::Digital => DIG_ZERO + DIG_STEP * c,
            VolumeClass::AnalogOut if c >= i32::from(ANA_KNEE_CODE) => {
                ANA_KNEE + ANA_FINE * (c - i32::from(ANA_KNEE_CODE))
            }
            VolumeClass::AnalogOut => ANA_FLOOR + ANA_COARSE * (c - 1),
            VolumeClass::Gain => GAIN_FLOOR + GAIN_STEP * (c - 1),
        };
        Decibel::from_raw(raw as i16)
    }

    /// Round a level onto this class's grid.
    pub fn quantize(self, db: Decibel) -> Decibel {
        self.to_decibel(self.convert(db))
    }
}

/// Every volume-controlled point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum VolumeTarget {
    /// Digital IO port 0 receive.
    Dio0In,
    /// Digital IO port 1 receive.
    Dio1In,
    /// Digital IO port 2 receive.
    Dio2In,
    /// ADC capture.
    AdcIn,
    /// PDM capture.
    PdmIn,
    /// DAC playback.
    DacOut,
    /// Digital IO port 0 transmit.
    Dio0Out,
    /// Digital IO port 1 transmit.
    Dio1Out,
    /// Digital IO port 2 transmit.
    Dio2Out,
    /// Headphone amplifier.
    Headphone,
    /// Speaker amplifier.
    Speaker,
    /// Receiver amplifier.
    Receiver,
    /// Line out 1.
    LineOut1,
    /// Line out 2.
    LineOut2,
    /// Mic 1 preamp.
    Mic1,
    /// Mic 2 preamp.
    Mic2,
    /// Mic 3 preamp.
    Mic3,
    /// Line input.
    LineIn,
}

impl VolumeTarget {
    /// Number of targets.
    pub const COUNT: usize = 18;

    /// All targets in index order.
    pub const ALL: [VolumeTarget; Self::COUNT] = [
        VolumeTarget::Dio0In,
        VolumeTarget::Dio1In,
        VolumeTarget::Dio2In,
        VolumeTarget::AdcIn,
        VolumeTarget::PdmIn,
        VolumeTarget::DacOut,
        VolumeTarget::Dio0Out,
        VolumeTarget::Dio1Out,
        VolumeTarget::Dio2Out,
        VolumeTarget::Headphone,
        VolumeTarget::Speaker,
        VolumeTarget::Receiver,
        VolumeTarget::LineOut1,
        VolumeTarget::LineOut2,
        VolumeTarget::Mic1,
        VolumeTarget::Mic2,
        VolumeTarget::Mic3,
        VolumeTarget::LineIn,
    ];

    /// Register class.
    pub const fn class(self) -> VolumeClass {
        match self as u8 {
            0..=8 => VolumeClass::Digital,
            9..=13 => VolumeClass::AnalogOut,
            _ => VolumeClass::Gain,
        }
    }

    /// Whether the target has a right channel.
    pub const fn is_stereo(self) -> bool {
        !matches!(
            self,
            VolumeTarget::Speaker
                | VolumeTarget::Receiver
                | VolumeTarget::Mic1
                | VolumeTarget::Mic2
                | VolumeTarget::Mic3
        )
    }

    /// Left (or mono) register and the right register of a pair.
    #[allow(clippy::arithmetic_side_effects)] // offsets stay inside their banks
    pub const fn regs(self) -> (RegAddr, Option<RegAddr>) {
        let i = self as u8;
        let (bank, left) = match self {
            VolumeTarget::Dio0In
            | VolumeTarget::Dio1In
            | VolumeTarget::Dio2In
            | VolumeTarget::AdcIn
            | VolumeTarget::PdmIn
            | VolumeTarget::DacOut
            | VolumeTarget::Dio0Out
            | VolumeTarget::Dio1Out
            | VolumeTarget::Dio2Out => (Bank::Ma, MA_VOL_BASE + 2 * i),
            VolumeTarget::Headphone => (Bank::Ana, ANA_HP_VOL_L),
            VolumeTarget::Speaker => (Bank::Ana, ANA_HP_VOL_L + 2),
            VolumeTarget::Receiver => (Bank::Ana, ANA_HP_VOL_L + 3),
            VolumeTarget::LineOut1 => (Bank::Ana, ANA_HP_VOL_L + 4),
            VolumeTarget::LineOut2 => (Bank::Ana, ANA_HP_VOL_L + 6),
            VolumeTarget::Mic1 => (Bank::Ana, ANA_MIC1_GAIN),
            VolumeTarget::Mic2 => (Bank::Ana, ANA_MIC1_GAIN + 1),
            VolumeTarget::Mic3 => (Bank::Ana, ANA_MIC1_GAIN + 2),
            VolumeTarget::LineIn => (Bank::Ana, ANA_MIC1_GAIN + 3),
        };
        let right = if self.is_stereo() {
            Some(RegAddr::new(bank, left + 1))
        } else {
            None
        };
        (RegAddr::new(bank, left), right)
    }

    /// Whether the path through this point carries signal in `graph`.
    pub fn is_active(self, graph: &RoutingGraph) -> bool {
        let [left, right] = self.channels_active(graph);
        left || right
    }

    /// Per-channel activity, left then right. Outputs and inputs with a
    /// sink or source per channel report each side on its own; the rest
    /// report the same state twice.
    pub fn channels_active(self, graph: &RoutingGraph) -> [bool; 2] {
        let pair = |left: Sink, right: Sink| [graph.sink_active(left), graph.sink_active(right)];
        let shared = match self {
            VolumeTarget::Headphone => return pair(Sink::HpL, Sink::HpR),
            VolumeTarget::LineOut1 => return pair(Sink::Lo1L, Sink::Lo1R),
            VolumeTarget::LineOut2 => return pair(Sink::Lo2L, Sink::Lo2R),
            VolumeTarget::LineIn => {
                return [
                    graph.source_used(Source::LineInL),
                    graph.source_used(Source::LineInR),
                ]
            }
            VolumeTarget::Dio0In => graph.source_used(Source::Dio0In),
            VolumeTarget::Dio1In => graph.source_used(Source::Dio1In),
            VolumeTarget::Dio2In => graph.source_used(Source::Dio2In),
            VolumeTarget::AdcIn => graph.source_used(Source::Adc),
            VolumeTarget::PdmIn => graph.source_used(Source::Pdm),
            VolumeTarget::DacOut => graph.sink_active(Sink::Dac),
            VolumeTarget::Dio0Out => graph.sink_active(Sink::Dio0Out),
            VolumeTarget::Dio1Out => graph.sink_active(Sink::Dio1Out),
            VolumeTarget::Dio2Out => graph.sink_active(Sink::Dio2Out),
            VolumeTarget::Speaker => graph.sink_active(Sink::Sp),
            VolumeTarget::Receiver => graph.sink_active(Sink::Rc),
            VolumeTarget::Mic1 => graph.source_used(Source::Mic1),
            VolumeTarget::Mic2 => graph.source_used(Source::Mic2),
            VolumeTarget::Mic3 => graph.source_used(Source::Mic3),
        };
        [shared; 2]
    }
}

/// Logical (quantized) level of every target, left then right.
///
/// Mono targets keep their right channel at [`Decibel::MUTE`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeSettings {
    levels: [[Decibel; 2]; VolumeTarget::COUNT],
}

impl Default for VolumeSettings {
    fn default() -> Self {
        Self {
            levels: [[Decibel::MUTE; 2]; VolumeTarget::COUNT],
        }
    }
}

impl VolumeSettings {
    /// Left and right level of `target`.
    pub fn get(&self, target: VolumeTarget) -> [Decibel; 2] {
        self.levels
            .get(target as usize)
            .copied()
            .unwrap_or([Decibel::MUTE; 2])
    }

    /// Register codes for `target`.
    pub fn codes(&self, target: VolumeTarget) -> [u8; 2] {
        let class = target.class();
        self.get(target).map(|db| class.convert(db))
    }

    /// A copy with every `Some` entry of `request` applied and quantized.
    #[must_use]
    pub fn apply(&self, request: &VolumeRequest) -> Self {
        let mut next = *self;
        for target in VolumeTarget::ALL {
            let class = target.class();
            let channels = if target.is_stereo() { 2 } else { 1 };
            let Some(slot) = next.levels.get_mut(target as usize) else {
                continue;
            };
            for (level, wanted) in slot.iter_mut().zip(request.get(target)).take(channels) {
                if let Some(db) = wanted {
                    *level = class.quantize(db);
                }
            }
        }
        next
    }

    /// Levels after a partly applied change to `next`: a channel takes its
    /// new level when the committed cache holds the code that level needs,
    /// and keeps its current level otherwise.
    pub(crate) fn committed(
        &self,
        next: &VolumeSettings,
        cache: &ShadowCache,
        active: impl Fn(VolumeTarget) -> [bool; 2],
    ) -> Self {
        let mut out = *self;
        for target in VolumeTarget::ALL {
            let mask = target.class().code_mask();
            let (left, right) = target.regs();
            let codes = effective_codes(next, target, active(target));
            let wanted = next.get(target);
            let Some(slot) = out.levels.get_mut(target as usize) else {
                continue;
            };
            let channels = [Some(left), right].into_iter().zip(codes).zip(wanted);
            for (level, ((reg, code), want)) in slot.iter_mut().zip(channels) {
                if reg.is_some_and(|reg| cache.value(reg) & mask == code) {
                    *level = want;
                }
            }
        }
        out
    }
}

/// A partial volume change: `None` keeps the channel's current level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VolumeRequest {
    levels: [[Option<Decibel>; 2]; VolumeTarget::COUNT],
}

impl VolumeRequest {
    /// A request that changes nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set both channels of `target` independently.
    pub fn set(
        &mut self,
        target: VolumeTarget,
        left: Option<Decibel>,
        right: Option<Decibel>,
    ) -> &mut Self {
        if let Some(slot) = self.levels.get_mut(target as usize) {
            *slot = [left, right];
        }
        self
    }

    /// Set both channels of `target` to `db`.
    pub fn both(&mut self, target: VolumeTarget, db: Decibel) -> &mut Self {
        self.set(target, Some(db), Some(db))
    }

    /// Requested channels of `target`.
    pub fn get(&self, target: VolumeTarget) -> [Option<Decibel>; 2] {
        self.levels
            .get(target as usize)
            .copied()
            .unwrap_or([None; 2])
    }
}

impl From<&VolumeSettings> for VolumeRequest {
    fn from(settings: &VolumeSettings) -> Self {
        let mut req = Self::new();
        for target in VolumeTarget::ALL {
            let [l, r] = settings.get(target);
            req.set(target, Some(l), Some(r));
        }
        req
    }
}

/// Queue the register writes that bring every target to its effective
/// code: the logical level on channels where `active(target)` is set, mute
/// on the others. A channel mutes on its own, never through the latch.
///
/// Decisions compare against the committed cache, so the queue must not
/// hold unflushed volume writes.
pub(crate) fn program<I: I2c, D: DelayNs>(
    exec: &mut Executor<I, D>,
    settings: &VolumeSettings,
    active: impl Fn(VolumeTarget) -> [bool; 2],
) -> Result<()> {
    for target in VolumeTarget::ALL {
        let class = target.class();
        let mask = class.code_mask();
        let [left, right] = effective_codes(settings, target, active(target));
        let (lreg, rreg) = target.regs();
        let left_changed = exec.cache().value(lreg) & mask != left;
        match rreg {
            None => {
                if left_changed {
                    exec.enqueue_write(lreg, left, WriteMode::Normal)?;
                }
            }
            Some(rreg) => {
                let right_changed = exec.cache().value(rreg) & mask != right;
                if left_changed && right_changed && left != 0 && right != 0 {
                    exec.enqueue_write(lreg, left | LATCH, WriteMode::Normal)?;
                    exec.enqueue_write(rreg, right, WriteMode::Normal)?;
                } else {
                    if left_changed {
                        exec.enqueue_write(lreg, left, WriteMode::Normal)?;
                    }
                    if right_changed {
                        exec.enqueue_write(rreg, right, WriteMode::Normal)?;
                    }
                }
            }
        }
    }
    Ok(())
}

/// Codes `target` should hold with the given channel activity.
pub(crate) fn effective_codes(
    settings: &VolumeSettings,
    target: VolumeTarget,
    active: [bool; 2],
) -> [u8; 2] {
    let [left, right] = settings.codes(target);
    let [left_on, right_on] = active;
    [
        if left_on { left } else { 0 },
        if right_on { right } else { 0 },
    ]
}
