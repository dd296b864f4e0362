//! Power-domain model and sequencer.
//!
//! [`PowerState`] is decoded from the power-down registers in the shadow
//! cache, so it always reflects what actually reached the chip. The
//! [`PowerSequencer`] turns a (desired, current) pair into an ordered
//! [`PowerPlan`] of register writes and waits:
//!
//! ```text
//! up:   PLL ─▶ PLL run ─▶ clock ─▶ reference ─▶ blocks ─▶ CP ┬ MB ┬ ADC FE ─▶ amps ─▶ final settle
//!                                                          (parallel, max settle)
//! down: mute-done ─▶ amps ─▶ CP ─▶ MB/ADC FE ─▶ reference ─▶ engine idle ─▶ blocks ─▶ clock ─▶ PLL reset ─▶ PLL
//! ```

use bitflags::bitflags;
use heapless::Vec;

use crate::cache::ShadowCache;
use crate::config::{PowerMode, SettleTimes};
use crate::error::{Error, Result};
use crate::packet::{Op, WaitEvent, WriteMode};
use crate::regmap::RegAddr;
use crate::registers::{
    A_PD_BLK, A_PD_CLK, ANA_PD_ADC, ANA_PD_AMP, ANA_PD_MB, ANA_PD_REF, CD_PD_CP, MUTE_DONE_HP,
    MUTE_DONE_LO1, MUTE_DONE_LO2, MUTE_DONE_RC, MUTE_DONE_SP,
};

/// Upper bound on the descriptors one plan can hold.
pub const PLAN_CAPACITY: usize = 32;

bitflags! {
    /// Digital clock and block domains.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct DigitalDomains: u16 {
        /// PLL powered.
        const PLL = 1 << 0;
        /// PLL out of reset.
        const PLL_RUN = 1 << 1;
        /// System clock ungated.
        const CLOCK = 1 << 2;
        /// Digital IO port 0.
        const DIO0 = 1 << 3;
        /// Digital IO port 1.
        const DIO1 = 1 << 4;
        /// Digital IO port 2.
        const DIO2 = 1 << 5;
        /// DAC interface.
        const DAC = 1 << 6;
        /// ADC interface.
        const ADC = 1 << 7;
        /// PDM interface.
        const PDM = 1 << 8;
        /// Audio engine.
        const ENGINE = 1 << 9;
        /// Digital mixer.
        const MIXER = 1 << 10;

        /// Clock chain.
        const CLOCKS = Self::PLL.bits() | Self::PLL_RUN.bits() | Self::CLOCK.bits();
        /// Every clocked block.
        const BLOCKS = Self::DIO0.bits() | Self::DIO1.bits() | Self::DIO2.bits()
            | Self::DAC.bits() | Self::ADC.bits() | Self::PDM.bits()
            | Self::ENGINE.bits() | Self::MIXER.bits();
    }

    /// Reference rails.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ReferenceRails: u8 {
        /// Voltage reference.
        const VREF = 1 << 0;
        /// Analog LDO.
        const LDO = 1 << 1;
    }

    /// Headphone charge pump.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ChargePump: u8 {
        /// Charge pump running.
        const CP = 1 << 0;
    }

    /// Output amplifiers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Amps: u8 {
        /// Headphone left.
        const HP_L = 1 << 0;
        /// Headphone right.
        const HP_R = 1 << 1;
        /// Speaker.
        const SP = 1 << 2;
        /// Receiver.
        const RC = 1 << 3;
        /// Line out 1 left.
        const LO1_L = 1 << 4;
        /// Line out 1 right.
        const LO1_R = 1 << 5;
        /// Line out 2 left.
        const LO2_L = 1 << 6;
        /// Line out 2 right.
        const LO2_R = 1 << 7;

        /// Both headphone channels.
        const HP = Self::HP_L.bits() | Self::HP_R.bits();
        /// Both line out 1 channels.
        const LO1 = Self::LO1_L.bits() | Self::LO1_R.bits();
        /// Both line out 2 channels.
        const LO2 = Self::LO2_L.bits() | Self::LO2_R.bits();
    }

    /// Mic bias rails.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct MicBias: u8 {
        /// Mic 1 bias.
        const MB1 = 1 << 0;
        /// Mic 2 bias.
        const MB2 = 1 << 1;
        /// Mic 3 bias.
        const MB3 = 1 << 2;
    }

    /// ADC converters and input preamps.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct AdcFrontEnd: u8 {
        /// Left converter.
        const ADC_L = 1 << 0;
        /// Right converter.
        const ADC_R = 1 << 1;
        /// Mic 1 preamp.
        const MIC1 = 1 << 2;
        /// Mic 2 preamp.
        const MIC2 = 1 << 3;
        /// Mic 3 preamp.
        const MIC3 = 1 << 4;
        /// Line input buffer.
        const LINE = 1 << 5;
    }
}

impl Amps {
    /// `ANA_MUTE_STATUS` bits of the outputs these amps drive.
    pub fn mute_flags(self) -> u8 {
        let mut flags = 0;
        if self.intersects(Amps::HP) {
            flags |= MUTE_DONE_HP;
        }
        if self.contains(Amps::SP) {
            flags |= MUTE_DONE_SP;
        }
        if self.contains(Amps::RC) {
            flags |= MUTE_DONE_RC;
        }
        if self.intersects(Amps::LO1) {
            flags |= MUTE_DONE_LO1;
        }
        if self.intersects(Amps::LO2) {
            flags |= MUTE_DONE_LO2;
        }
        flags
    }
}

/// Which domains are powered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PowerState {
    /// Clocks and digital blocks.
    pub digital: DigitalDomains,
    /// Reference rails.
    pub reference: ReferenceRails,
    /// Charge pump.
    pub charge_pump: ChargePump,
    /// Output amplifiers.
    pub amps: Amps,
    /// Mic bias rails.
    pub mic_bias: MicBias,
    /// ADC front end.
    pub adc: AdcFrontEnd,
}

impl PowerState {
    /// Everything off.
    pub const OFF: Self = Self {
        digital: DigitalDomains::empty(),
        reference: ReferenceRails::empty(),
        charge_pump: ChargePump::empty(),
        amps: Amps::empty(),
        mic_bias: MicBias::empty(),
        adc: AdcFrontEnd::empty(),
    };

    /// Everything on.
    pub const ALL: Self = Self {
        digital: DigitalDomains::all(),
        reference: ReferenceRails::all(),
        charge_pump: ChargePump::all(),
        amps: Amps::all(),
        mic_bias: MicBias::all(),
        adc: AdcFrontEnd::all(),
    };

    /// Clock chain plus reference rails: what `hold_clocks` keeps up.
    pub const BASE: Self = Self {
        digital: DigitalDomains::CLOCKS,
        reference: ReferenceRails::all(),
        ..Self::OFF
    };

    /// Whether no domain is powered.
    pub fn is_off(&self) -> bool {
        *self == Self::OFF
    }

    /// Domains in either state.
    #[must_use]
    pub fn union(self, other: Self) -> Self {
        Self {
            digital: self.digital | other.digital,
            reference: self.reference | other.reference,
            charge_pump: self.charge_pump | other.charge_pump,
            amps: self.amps | other.amps,
            mic_bias: self.mic_bias | other.mic_bias,
            adc: self.adc | other.adc,
        }
    }

    /// Domains in both states.
    #[must_use]
    pub fn intersection(self, other: Self) -> Self {
        Self {
            digital: self.digital & other.digital,
            reference: self.reference & other.reference,
            charge_pump: self.charge_pump & other.charge_pump,
            amps: self.amps & other.amps,
            mic_bias: self.mic_bias & other.mic_bias,
            adc: self.adc & other.adc,
        }
    }

    /// Domains in `self` but not in `other`.
    #[must_use]
    pub fn difference(self, other: Self) -> Self {
        self.intersection(other.complement())
    }

    /// Domains not in `self`.
    #[must_use]
    pub fn complement(self) -> Self {
        Self {
            digital: !self.digital,
            reference: !self.reference,
            charge_pump: !self.charge_pump,
            amps: !self.amps,
            mic_bias: !self.mic_bias,
            adc: !self.adc,
        }
    }

    /// Whether every domain of `other` is in `self`.
    pub fn contains(self, other: Self) -> bool {
        other.difference(self).is_off()
    }

    /// Apply a request through an update mask: masked domains follow
    /// `desired`, the rest keep `current`.
    #[must_use]
    pub fn masked(desired: Self, current: Self, mask: Self) -> Self {
        desired
            .intersection(mask)
            .union(current.intersection(mask.complement()))
    }

    /// Add every domain the powered ones depend on.
    #[must_use]
    pub fn with_dependencies(self) -> Self {
        let mut s = self;
        if s.digital.intersects(DigitalDomains::BLOCKS) {
            s.digital |= DigitalDomains::CLOCK;
        }
        if s.digital.contains(DigitalDomains::CLOCK) {
            s.digital |= DigitalDomains::PLL_RUN;
        }
        if s.digital.contains(DigitalDomains::PLL_RUN) {
            s.digital |= DigitalDomains::PLL;
        }
        if s.amps.intersects(Amps::HP) {
            s.charge_pump |= ChargePump::CP;
        }
        if !(s.charge_pump.is_empty()
            && s.amps.is_empty()
            && s.mic_bias.is_empty()
            && s.adc.is_empty())
        {
            s.reference = ReferenceRails::all();
        }
        s
    }

    /// Decode from the power-down registers (all active high).
    pub fn decode(cache: &ShadowCache) -> Self {
        let clk = u16::from(!cache.value(A_PD_CLK)) & DigitalDomains::CLOCKS.bits();
        let blk = u16::from(!cache.value(A_PD_BLK)).wrapping_shl(3);
        Self {
            digital: DigitalDomains::from_bits_truncate(clk | blk),
            reference: ReferenceRails::from_bits_truncate(!cache.value(ANA_PD_REF)),
            charge_pump: ChargePump::from_bits_truncate(!cache.value(CD_PD_CP)),
            amps: Amps::from_bits_truncate(!cache.value(ANA_PD_AMP)),
            mic_bias: MicBias::from_bits_truncate(!cache.value(ANA_PD_MB)),
            adc: AdcFrontEnd::from_bits_truncate(!cache.value(ANA_PD_ADC)),
        }
    }

    #[allow(clippy::cast_possible_truncation)] // CLOCKS fits in bits 2:0
    fn pd_clk(&self) -> u8 {
        !((self.digital & DigitalDomains::CLOCKS).bits() as u8) & 0x07
    }

    #[allow(clippy::cast_possible_truncation)] // BLOCKS occupies bits 10:3
    fn pd_blk(&self) -> u8 {
        !((self.digital & DigitalDomains::BLOCKS).bits().wrapping_shr(3) as u8)
    }

    fn pd_ref(&self) -> u8 {
        !self.reference.bits() & ReferenceRails::all().bits()
    }

    fn pd_cp(&self) -> u8 {
        !self.charge_pump.bits() & ChargePump::all().bits()
    }

    fn pd_amp(&self) -> u8 {
        !self.amps.bits()
    }

    fn pd_mb(&self) -> u8 {
        !self.mic_bias.bits() & MicBias::all().bits()
    }

    fn pd_adc(&self) -> u8 {
        !self.adc.bits() & AdcFrontEnd::all().bits()
    }
}

/// An ordered power transition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PowerPlan {
    /// Descriptors to enqueue, in order.
    pub ops: Vec<Op, PLAN_CAPACITY>,
    /// Domains this plan switches.
    pub transitioned: PowerState,
}

impl PowerPlan {
    /// Whether the plan does nothing.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Total timed settle delay in the plan.
    pub fn settle_us(&self) -> u64 {
        self.ops
            .iter()
            .map(|op| match op {
                Op::TimedWait { us } => u64::from(*us),
                _ => 0,
            })
            .sum()
    }

    fn push(&mut self, op: Op) -> Result<()> {
        self.ops.push(op).map_err(|_| Error::Internal)
    }

    fn write(&mut self, reg: RegAddr, data: u8) -> Result<()> {
        self.push(Op::Write {
            reg,
            data,
            mode: WriteMode::Normal,
        })
    }

    fn wait(&mut self, event: WaitEvent) -> Result<()> {
        self.push(Op::EventWait { event })
    }
}

/// Settle bookkeeping for manual mode: parallel rails record deadlines and
/// the plan only waits for the furthest one still ahead.
#[derive(Debug, Default)]
struct Timeline {
    now: u32,
    latest: u32,
}

impl Timeline {
    fn deadline(&mut self, settle_us: u32) -> u32 {
        let at = self.now.saturating_add(settle_us);
        self.latest = self.latest.max(at);
        at
    }

    fn wait_until(&mut self, plan: &mut PowerPlan, at: u32) -> Result<()> {
        if at > self.now {
            plan.push(Op::TimedWait {
                us: at.saturating_sub(self.now),
            })?;
            self.now = at;
        }
        Ok(())
    }
}

/// Computes power plans for one power mode and set of settle times.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PowerSequencer {
    mode: PowerMode,
    settle: SettleTimes,
}

impl PowerSequencer {
    /// A sequencer for `mode`.
    pub fn new(mode: PowerMode, settle: SettleTimes) -> Self {
        Self { mode, settle }
    }

    /// Power up every domain `desired` needs that `current` lacks.
    ///
    /// Never touches a domain that is already on.
    pub fn compute_power_up(&self, desired: PowerState, current: PowerState) -> Result<PowerPlan> {
        let add = desired.with_dependencies().difference(current);
        let mut plan = PowerPlan {
            transitioned: add,
            ..PowerPlan::default()
        };
        if add.is_off() {
            return Ok(plan);
        }
        let manual = self.mode == PowerMode::Manual;
        let mut state = current;
        let mut time = Timeline::default();

        // Clock chain, strictly serial.
        let pll = add.digital & (DigitalDomains::PLL | DigitalDomains::PLL_RUN);
        if manual {
            if pll.contains(DigitalDomains::PLL) {
                state.digital |= DigitalDomains::PLL;
                plan.write(A_PD_CLK, state.pd_clk())?;
                let at = time.now.saturating_add(self.settle.pll);
                time.wait_until(&mut plan, at)?;
            }
            if pll.contains(DigitalDomains::PLL_RUN) {
                state.digital |= DigitalDomains::PLL_RUN;
                plan.write(A_PD_CLK, state.pd_clk())?;
                plan.wait(WaitEvent::PLL_LOCK)?;
            }
        } else if !pll.is_empty() {
            state.digital |= pll;
            plan.write(A_PD_CLK, state.pd_clk())?;
            if pll.contains(DigitalDomains::PLL_RUN) {
                plan.wait(WaitEvent::PLL_LOCK)?;
            }
        }
        if add.digital.contains(DigitalDomains::CLOCK) {
            state.digital |= DigitalDomains::CLOCK;
            plan.write(A_PD_CLK, state.pd_clk())?;
            plan.wait(WaitEvent::CLOCK_STABLE)?;
        }

        // Reference first among the analog rails; it settles while the
        // digital blocks come up.
        let mut reference_ready = 0;
        if !add.reference.is_empty() {
            state.reference |= add.reference;
            plan.write(ANA_PD_REF, state.pd_ref())?;
            if manual {
                reference_ready = time.deadline(self.settle.reference);
            } else {
                plan.wait(WaitEvent::REFERENCE_READY)?;
            }
        }

        let blocks = add.digital & DigitalDomains::BLOCKS;
        if !blocks.is_empty() {
            state.digital |= blocks;
            plan.write(A_PD_BLK, state.pd_blk())?;
        }

        let rails = !(add.charge_pump.is_empty()
            && add.mic_bias.is_empty()
            && add.adc.is_empty()
            && add.amps.is_empty());
        if rails {
            time.wait_until(&mut plan, reference_ready)?;
        }

        // Charge pump, mic bias and ADC front end settle in parallel.
        let mut cp_ready = time.now;
        let mut cp_pending = false;
        if !add.charge_pump.is_empty() {
            state.charge_pump |= add.charge_pump;
            plan.write(CD_PD_CP, state.pd_cp())?;
            if manual {
                cp_ready = time.deadline(self.settle.charge_pump);
            } else {
                cp_pending = true;
            }
        }
        if !add.mic_bias.is_empty() {
            state.mic_bias |= add.mic_bias;
            plan.write(ANA_PD_MB, state.pd_mb())?;
            time.deadline(self.settle.mic_bias);
        }
        if !add.adc.is_empty() {
            state.adc |= add.adc;
            plan.write(ANA_PD_ADC, state.pd_adc())?;
            time.deadline(self.settle.adc_front_end);
        }

        if !add.amps.is_empty() {
            if add.amps.intersects(Amps::HP) {
                if cp_pending {
                    plan.wait(WaitEvent::CHARGE_PUMP_READY)?;
                    cp_pending = false;
                } else {
                    time.wait_until(&mut plan, cp_ready)?;
                }
            }
            state.amps |= add.amps;
            plan.write(ANA_PD_AMP, state.pd_amp())?;
            if add.amps.intersects(Amps::HP) {
                if manual {
                    time.deadline(self.settle.headphone);
                } else {
                    plan.wait(WaitEvent::HEADPHONE_READY)?;
                }
            }
            if add.amps.contains(Amps::SP) {
                if manual {
                    time.deadline(self.settle.speaker);
                } else {
                    plan.wait(WaitEvent::SPEAKER_READY)?;
                }
            }
            if add.amps.contains(Amps::RC) {
                time.deadline(self.settle.receiver);
            }
            if add.amps.intersects(Amps::LO1 | Amps::LO2) {
                time.deadline(self.settle.line_out);
            }
        }
        if cp_pending {
            plan.wait(WaitEvent::CHARGE_PUMP_READY)?;
        }

        let latest = time.latest;
        time.wait_until(&mut plan, latest)?;
        tracing::debug!(ops = plan.ops.len(), "power-up plan");
        Ok(plan)
    }

    /// Power down every domain of `current` outside the dependency closure
    /// of `desired`. `carrying` names the amps that had an active path and
    /// must finish their mute ramp first.
    pub fn compute_power_down(
        &self,
        desired: PowerState,
        current: PowerState,
        carrying: Amps,
    ) -> Result<PowerPlan> {
        let remove = current.difference(desired.with_dependencies());
        let mut plan = PowerPlan {
            transitioned: remove,
            ..PowerPlan::default()
        };
        if remove.is_off() {
            return Ok(plan);
        }
        let mut state = current;

        if !remove.amps.is_empty() {
            let flags = (remove.amps & carrying).mute_flags();
            if flags != 0 {
                plan.wait(WaitEvent::mute_done(flags))?;
            }
            state.amps.remove(remove.amps);
            plan.write(ANA_PD_AMP, state.pd_amp())?;
        }
        if !remove.charge_pump.is_empty() {
            state.charge_pump.remove(remove.charge_pump);
            plan.write(CD_PD_CP, state.pd_cp())?;
        }
        if !remove.mic_bias.is_empty() {
            state.mic_bias.remove(remove.mic_bias);
            plan.write(ANA_PD_MB, state.pd_mb())?;
        }
        if !remove.adc.is_empty() {
            state.adc.remove(remove.adc);
            plan.write(ANA_PD_ADC, state.pd_adc())?;
        }
        if !remove.reference.is_empty() {
            state.reference.remove(remove.reference);
            plan.write(ANA_PD_REF, state.pd_ref())?;
        }

        let blocks = remove.digital & DigitalDomains::BLOCKS;
        if !blocks.is_empty() {
            if blocks.contains(DigitalDomains::ENGINE) {
                plan.wait(WaitEvent::ENGINE_IDLE)?;
            }
            state.digital.remove(blocks);
            plan.write(A_PD_BLK, state.pd_blk())?;
        }

        let clocks = remove.digital & DigitalDomains::CLOCKS;
        if self.mode == PowerMode::Manual {
            for step in [
                DigitalDomains::CLOCK,
                DigitalDomains::PLL_RUN,
                DigitalDomains::PLL,
            ] {
                if clocks.contains(step) {
                    state.digital.remove(step);
                    plan.write(A_PD_CLK, state.pd_clk())?;
                }
            }
        } else if !clocks.is_empty() {
            state.digital.remove(clocks);
            plan.write(A_PD_CLK, state.pd_clk())?;
        }
        tracing::debug!(ops = plan.ops.len(), "power-down plan");
        Ok(plan)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn manual() -> PowerSequencer {
        PowerSequencer::new(PowerMode::Manual, SettleTimes::default())
    }

    fn auto() -> PowerSequencer {
        PowerSequencer::new(PowerMode::Auto, SettleTimes::default())
    }

    fn apply(cache: &mut ShadowCache, plan: &PowerPlan) {
        for op in &plan.ops {
            if let Op::Write { reg, data, .. } = op {
                cache.set(*reg, *data);
            }
        }
    }

    fn headphone() -> PowerState {
        PowerState {
            digital: DigitalDomains::DAC | DigitalDomains::MIXER,
            amps: Amps::HP,
            ..PowerState::OFF
        }
    }

    #[test]
    fn seeded_cache_decodes_as_everything_off() {
        assert!(PowerState::decode(&ShadowCache::seeded()).is_off());
    }

    #[test]
    fn dependency_closure_adds_clocks_reference_and_charge_pump() {
        let s = headphone().with_dependencies();
        assert!(s.digital.contains(DigitalDomains::CLOCKS));
        assert_eq!(s.reference, ReferenceRails::all());
        assert_eq!(s.charge_pump, ChargePump::CP);
    }

    #[test]
    fn masked_update_keeps_unmasked_domains() {
        let current = PowerState {
            amps: Amps::SP,
            ..PowerState::OFF
        };
        let desired = PowerState {
            amps: Amps::HP_L,
            ..PowerState::OFF
        };
        let mask = PowerState {
            amps: Amps::HP,
            ..PowerState::OFF
        };
        let eff = PowerState::masked(desired, current, mask);
        assert_eq!(eff.amps, Amps::SP | Amps::HP_L);
    }

    #[test]
    fn manual_power_up_orders_clock_chain_then_rails() {
        let plan = manual()
            .compute_power_up(headphone(), PowerState::OFF)
            .unwrap();
        let settle = SettleTimes::default();
        assert_eq!(
            &plan.ops[..5],
            &[
                Op::Write { reg: A_PD_CLK, data: 0x06, mode: WriteMode::Normal },
                Op::TimedWait { us: settle.pll },
                Op::Write { reg: A_PD_CLK, data: 0x04, mode: WriteMode::Normal },
                Op::EventWait { event: WaitEvent::PLL_LOCK },
                Op::Write { reg: A_PD_CLK, data: 0x00, mode: WriteMode::Normal },
            ]
        );
        let amp_at = plan
            .ops
            .iter()
            .position(|op| matches!(op, Op::Write { reg, .. } if *reg == ANA_PD_AMP))
            .unwrap();
        let cp_at = plan
            .ops
            .iter()
            .position(|op| matches!(op, Op::Write { reg, .. } if *reg == CD_PD_CP))
            .unwrap();
        assert!(cp_at < amp_at);
    }

    #[test]
    fn parallel_rails_cost_the_maximum_not_the_sum() {
        let settle = SettleTimes::default();
        let desired = PowerState {
            charge_pump: ChargePump::CP,
            mic_bias: MicBias::MB1,
            adc: AdcFrontEnd::ADC_L | AdcFrontEnd::MIC1,
            ..PowerState::OFF
        };
        let current = PowerState {
            reference: ReferenceRails::all(),
            ..PowerState::OFF
        };
        let plan = manual().compute_power_up(desired, current).unwrap();
        let longest = settle
            .charge_pump
            .max(settle.mic_bias)
            .max(settle.adc_front_end);
        assert_eq!(plan.settle_us(), u64::from(longest));
    }

    #[test]
    fn auto_mode_polls_ready_flags() {
        let plan = auto().compute_power_up(headphone(), PowerState::OFF).unwrap();
        let waits: std::vec::Vec<WaitEvent> = plan
            .ops
            .iter()
            .filter_map(|op| match op {
                Op::EventWait { event } => Some(*event),
                _ => None,
            })
            .collect();
        assert_eq!(
            waits,
            vec![
                WaitEvent::PLL_LOCK,
                WaitEvent::CLOCK_STABLE,
                WaitEvent::REFERENCE_READY,
                WaitEvent::CHARGE_PUMP_READY,
                WaitEvent::HEADPHONE_READY,
            ]
        );
    }

    #[test]
    fn power_down_waits_for_mute_then_unwinds_in_reverse() {
        let mut cache = ShadowCache::seeded();
        let up = manual().compute_power_up(headphone(), PowerState::OFF).unwrap();
        apply(&mut cache, &up);
        let current = PowerState::decode(&cache);
        let down = manual()
            .compute_power_down(PowerState::OFF, current, Amps::HP)
            .unwrap();
        assert_eq!(
            down.ops[0],
            Op::EventWait {
                event: WaitEvent::mute_done(MUTE_DONE_HP)
            }
        );
        let last = down.ops.last().unwrap();
        assert_eq!(
            *last,
            Op::Write { reg: A_PD_CLK, data: 0x07, mode: WriteMode::Normal }
        );
        apply(&mut cache, &down);
        assert!(PowerState::decode(&cache).is_off());
    }

    #[test]
    fn charge_pump_stays_while_a_headphone_amp_remains() {
        let current = headphone().with_dependencies();
        let desired = PowerState {
            amps: Amps::HP_L,
            digital: DigitalDomains::DAC,
            ..PowerState::OFF
        };
        let down = auto().compute_power_down(desired, current, Amps::HP).unwrap();
        assert!(down.transitioned.charge_pump.is_empty());
        assert_eq!(down.transitioned.amps, Amps::HP_R);
    }

    #[test]
    fn engine_idle_precedes_engine_gating() {
        let current = PowerState {
            digital: DigitalDomains::ENGINE,
            ..PowerState::OFF
        }
        .with_dependencies();
        let down = auto()
            .compute_power_down(PowerState::OFF, current, Amps::empty())
            .unwrap();
        assert_eq!(down.ops[0], Op::EventWait { event: WaitEvent::ENGINE_IDLE });
    }

    fn any_state() -> impl Strategy<Value = PowerState> {
        (any::<u16>(), any::<u8>(), any::<u8>(), any::<u8>(), any::<u8>(), any::<u8>()).prop_map(
            |(d, r, c, a, m, f)| PowerState {
                digital: DigitalDomains::from_bits_truncate(d),
                reference: ReferenceRails::from_bits_truncate(r),
                charge_pump: ChargePump::from_bits_truncate(c),
                amps: Amps::from_bits_truncate(a),
                mic_bias: MicBias::from_bits_truncate(m),
                adc: AdcFrontEnd::from_bits_truncate(f),
            },
        )
    }

    proptest! {
        #[test]
        fn power_up_never_transitions_an_on_domain(desired in any_state(), current in any_state()) {
            for seq in [manual(), auto()] {
                let plan = seq.compute_power_up(desired, current).unwrap();
                prop_assert!(plan.transitioned.intersection(current).is_off());
            }
        }

        #[test]
        fn power_up_reaches_the_dependency_closure(desired in any_state()) {
            let mut cache = ShadowCache::seeded();
            let plan = manual().compute_power_up(desired, PowerState::OFF).unwrap();
            apply(&mut cache, &plan);
            prop_assert_eq!(PowerState::decode(&cache), desired.with_dependencies());
        }

        #[test]
        fn power_down_never_removes_a_required_domain(desired in any_state(), current in any_state()) {
            for seq in [manual(), auto()] {
                let plan = seq.compute_power_down(desired, current, Amps::all()).unwrap();
                prop_assert!(plan.transitioned.intersection(desired.with_dependencies()).is_off());
            }
        }

        #[test]
        fn power_down_lands_on_the_kept_set(desired in any_state(), current in any_state()) {
            let mut cache = ShadowCache::seeded();
            let up = auto().compute_power_up(current, PowerState::OFF).unwrap();
            apply(&mut cache, &up);
            let on = PowerState::decode(&cache);
            let down = auto().compute_power_down(desired, on, Amps::empty()).unwrap();
            apply(&mut cache, &down);
            prop_assert_eq!(
                PowerState::decode(&cache),
                on.intersection(desired.with_dependencies())
            );
        }
    }
}
