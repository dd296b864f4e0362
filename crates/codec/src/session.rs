//! The codec session: the consumer-facing API.
//!
//! A [`Codec`] owns the executor and the system hooks. Between
//! [`Codec::initialize`] and [`Codec::terminate`] it also holds the session
//! state the chip cannot report back (logical volumes, SRC requests, the
//! power sequencer). Everything else is decoded from the shadow cache on
//! demand.
//!
//! Every setter validates its whole request first, then queues a register
//! program inside one packet allocation and flushes it.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use platform::{NoHooks, SystemHooks};

use crate::cache::ShadowCache;
use crate::config::{InitConfig, RESET_RECOVERY_US};
use crate::error::{ArgumentError, Error, Result};
use crate::executor::Executor;
use crate::packet::{Op, WaitEvent, WriteMode};
use crate::power::{DigitalDomains, PowerSequencer, PowerState};
use crate::regmap::{Access, RegAddr, RegInfo};
use crate::registers::{
    A_GP_DATA, A_GP_MASK, A_PLL_DIVF_H, A_PLL_DIVF_L, A_PLL_DIVR, A_PLL_MODE, CD_MB_VOLT,
    E_CTRL, E_CTRL_EQ, IF_IRQ_EN, IF_RST, MB_SRC_OWNER, RST_SOFT,
};
use crate::routing::{resolve, PathRequest, RoutingGraph, Sink, Source};
use crate::settings::{
    src_owner, AdcSettings, AudioEngine, ControlRegister, DacSettings, DioPort, DioSettings,
    GpioConfig, GpioDirection, GpioPad, IrqEdge, NoiseGate, PdmSettings, SpeakerSettings,
};
use crate::volume::{self, VolumeRequest, VolumeSettings, VolumeTarget};

/// State that lives only between `initialize` and `terminate`.
#[derive(Debug, Clone, Copy)]
struct Session {
    config: InitConfig,
    sequencer: PowerSequencer,
    volumes: VolumeSettings,
    src: [bool; 3],
}

impl Session {
    fn new(config: InitConfig) -> Self {
        Self {
            config,
            sequencer: PowerSequencer::new(config.power_mode, config.settle),
            volumes: VolumeSettings::default(),
            src: [false; 3],
        }
    }

    /// Domains a graph needs, plus the idle base when clocks are held.
    fn desired_power(&self, graph: &RoutingGraph) -> PowerState {
        let needed = graph.required_power(&self.config);
        if self.config.hold_clocks {
            needed.union(PowerState::BASE)
        } else {
            needed
        }
    }
}

/// One codec instance.
pub struct Codec<I, D, H = NoHooks> {
    exec: Executor<I, D>,
    hooks: H,
    session: Option<Session>,
}

impl<I: I2c, D: DelayNs> Codec<I, D, NoHooks> {
    /// A codec on `i2c` for a board with no setup/teardown needs.
    pub fn new(i2c: I, delay: D) -> Self {
        Self::with_hooks(i2c, delay, NoHooks)
    }
}

impl<I: I2c, D: DelayNs, H: SystemHooks> Codec<I, D, H> {
    /// A codec on `i2c` with board hooks.
    pub fn with_hooks(i2c: I, delay: D, hooks: H) -> Self {
        Self {
            exec: Executor::new(i2c, delay),
            hooks,
            session: None,
        }
    }

    /// Whether a session is open.
    pub fn is_initialized(&self) -> bool {
        self.session.is_some()
    }

    /// Committed register contents.
    pub fn cache(&self) -> &ShadowCache {
        self.exec.cache()
    }

    /// The transport.
    pub fn bus(&self) -> &I {
        self.exec.bus()
    }

    /// The transport, mutably (test scripting).
    pub fn bus_mut(&mut self) -> &mut I {
        self.exec.bus_mut()
    }

    /// The delay source.
    pub fn delay(&self) -> &D {
        self.exec.delay()
    }

    /// The board hooks.
    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    /// Give back the transport, delay source and hooks.
    pub fn into_parts(self) -> (I, D, H) {
        let (i2c, delay) = self.exec.release_parts();
        (i2c, delay, self.hooks)
    }

    fn session(&self) -> Result<&Session> {
        self.session.as_ref().ok_or(Error::State)
    }

    fn active(&mut self) -> Result<(&mut Executor<I, D>, &mut Session)> {
        let session = self.session.as_mut().ok_or(Error::State)?;
        Ok((&mut self.exec, session))
    }

    // ── Lifecycle ────────────────────────────────────────────────────────────

    /// Open a session: reset the chip, program the PLL and bring up the
    /// idle power base.
    ///
    /// On failure the hooks are torn down again and no session exists.
    pub fn initialize(&mut self, config: InitConfig) -> Result<()> {
        if self.session.is_some() {
            return Err(Error::State);
        }
        config.validate()?;
        tracing::debug!(
            digital = config.digital_addr,
            analog = config.analog_addr,
            "initialize"
        );
        self.hooks.setup();
        self.exec
            .reset(config.digital_addr, config.analog_addr, config.wait);
        let session = Session::new(config);
        match transaction(&mut self.exec, |exec| boot(exec, &session)) {
            Ok(()) => {
                self.session = Some(session);
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "initialize failed");
                self.hooks.teardown();
                Err(e)
            }
        }
    }

    /// Close the session: mute, clear every route and power everything
    /// down.
    ///
    /// On failure the session stays open so the caller can retry.
    pub fn terminate(&mut self) -> Result<()> {
        tracing::debug!("terminate");
        let (exec, session) = self.active()?;
        let session = *session;
        transaction(exec, |exec| {
            volume::program(exec, &session.volumes, |_| [false; 2])?;
            let graph = RoutingGraph::decode(exec.cache());
            let power = PowerState::decode(exec.cache());
            let down =
                session
                    .sequencer
                    .compute_power_down(PowerState::OFF, power, graph.active_amps())?;
            enqueue_all(exec, &down.ops)?;
            for (reg, value) in RoutingGraph::EMPTY.encode() {
                exec.enqueue_write(reg, value, WriteMode::Normal)?;
            }
            Ok(())
        })?;
        self.hooks.teardown();
        self.session = None;
        Ok(())
    }

    // ── Raw register access ──────────────────────────────────────────────────

    /// Read a register from the device.
    pub fn read_register(&mut self, reg: RegAddr) -> Result<u8> {
        self.session()?;
        check_direction(reg, Access::R)?;
        self.exec.read(reg)
    }

    /// Write a register through the cache; volatile registers are always
    /// sent.
    pub fn write_register(&mut self, reg: RegAddr, data: u8) -> Result<()> {
        self.session()?;
        let info = check_direction(reg, Access::W)?;
        let mode = if info.access.contains(Access::VOLATILE) {
            WriteMode::Force
        } else {
            WriteMode::Normal
        };
        transaction(&mut self.exec, |exec| exec.enqueue_write(reg, data, mode))
    }

    // ── Routing ──────────────────────────────────────────────────────────────

    /// Resolved routing graph.
    pub fn path(&self) -> Result<RoutingGraph> {
        self.session()?;
        Ok(RoutingGraph::decode(self.exec.cache()))
    }

    /// Source currently selected on a multiplexed sink.
    pub fn active_source(&self, sink: Sink) -> Result<Option<Source>> {
        Ok(self.path()?.active_source(sink))
    }

    /// Apply a routing change.
    ///
    /// Paths that stop carrying signal are muted first, then unused domains
    /// power down, the routing registers change, newly needed domains power
    /// up, and finally every active path gets its logical volume.
    pub fn set_path(&mut self, request: &PathRequest) -> Result<()> {
        let (exec, session) = self.active()?;
        let session = *session;
        let current = RoutingGraph::decode(exec.cache());
        let next = resolve(request, &current)?;
        tracing::debug!(
            amps = next.active_amps().bits(),
            idle = next.is_empty(),
            "set_path"
        );
        transaction(exec, |exec| {
            volume::program(exec, &session.volumes, |t| {
                let [was_l, was_r] = t.channels_active(&current);
                let [now_l, now_r] = t.channels_active(&next);
                [was_l && now_l, was_r && now_r]
            })?;
            let desired = session.desired_power(&next);
            let power = PowerState::decode(exec.cache());
            let down =
                session
                    .sequencer
                    .compute_power_down(desired, power, current.active_amps())?;
            enqueue_all(exec, &down.ops)?;
            for (reg, value) in next.encode() {
                exec.enqueue_write(reg, value, WriteMode::Normal)?;
            }
            let up = session
                .sequencer
                .compute_power_up(desired, power.difference(down.transitioned))?;
            enqueue_all(exec, &up.ops)?;
            exec.flush()?;
            volume::program(exec, &session.volumes, |t| t.channels_active(&next))
        })
    }

    // ── Volume ───────────────────────────────────────────────────────────────

    /// Logical (quantized) volume of every target.
    pub fn volume(&self) -> Result<VolumeSettings> {
        Ok(self.session()?.volumes)
    }

    /// Change some volumes; `None` channels keep their level.
    ///
    /// Targets without an active path are stored but stay muted on the chip.
    /// If the writes abort partway, the channels whose new code reached the
    /// chip take their new level and the rest keep the old one.
    pub fn set_volume(&mut self, request: &VolumeRequest) -> Result<()> {
        let (exec, session) = self.active()?;
        let next = session.volumes.apply(request);
        let graph = RoutingGraph::decode(exec.cache());
        let active = |t: VolumeTarget| t.channels_active(&graph);
        let result = transaction(exec, |exec| volume::program(exec, &next, active));
        session.volumes = if result.is_ok() {
            next
        } else {
            session.volumes.committed(&next, exec.cache(), active)
        };
        result
    }

    // ── Digital IO ───────────────────────────────────────────────────────────

    /// Configuration of a digital audio port.
    pub fn digital_io(&self, port: DioPort) -> Result<DioSettings> {
        let session = self.session()?;
        let src = session.src.get(port.index()).copied().unwrap_or(false);
        Ok(DioSettings::decode(self.exec.cache(), port, src))
    }

    /// Configure a digital audio port.
    ///
    /// When several ports request the sample-rate converter, the lowest
    /// port owns it.
    pub fn set_digital_io(&mut self, port: DioPort, settings: &DioSettings) -> Result<()> {
        let (exec, session) = self.active()?;
        settings.validate()?;
        let mut src = session.src;
        if let Some(slot) = src.get_mut(port.index()) {
            *slot = settings.src;
        }
        transaction(exec, |exec| {
            for (reg, value) in settings.encode(port) {
                exec.enqueue_write(reg, value, WriteMode::Normal)?;
            }
            exec.enqueue_write(MB_SRC_OWNER, src_owner(&src), WriteMode::Normal)
        })?;
        session.src = src;
        Ok(())
    }

    // ── Single-register blocks ───────────────────────────────────────────────

    /// Current settings of a single-register block.
    pub fn control<T: ControlRegister>(&self) -> Result<T> {
        self.session()?;
        Ok(T::decode(self.exec.cache().value(T::REG)))
    }

    /// Validate and program a single-register block.
    pub fn set_control<T: ControlRegister>(&mut self, settings: &T) -> Result<()> {
        let (exec, _) = self.active()?;
        settings.validate()?;
        transaction(exec, |exec| {
            exec.enqueue_write(T::REG, settings.encode(), WriteMode::Normal)
        })
    }

    /// DAC settings.
    pub fn dac(&self) -> Result<DacSettings> {
        self.control()
    }

    /// Program the DAC.
    pub fn set_dac(&mut self, settings: &DacSettings) -> Result<()> {
        self.set_control(settings)
    }

    /// ADC settings.
    pub fn adc(&self) -> Result<AdcSettings> {
        self.control()
    }

    /// Program the ADC.
    pub fn set_adc(&mut self, settings: &AdcSettings) -> Result<()> {
        self.set_control(settings)
    }

    /// Speaker amplifier settings.
    pub fn speaker(&self) -> Result<SpeakerSettings> {
        self.control()
    }

    /// Program the speaker amplifier.
    pub fn set_speaker(&mut self, settings: &SpeakerSettings) -> Result<()> {
        self.set_control(settings)
    }

    /// PDM input settings.
    pub fn pdm(&self) -> Result<PdmSettings> {
        self.control()
    }

    /// Program the PDM input.
    pub fn set_pdm(&mut self, settings: &PdmSettings) -> Result<()> {
        self.set_control(settings)
    }

    // ── Audio engine ─────────────────────────────────────────────────────────

    /// Noise gate settings.
    pub fn noise_gate(&self) -> Result<NoiseGate> {
        self.session()?;
        Ok(NoiseGate::decode(self.exec.cache()))
    }

    /// Program the noise gate.
    pub fn set_noise_gate(&mut self, gate: &NoiseGate) -> Result<()> {
        let (exec, _) = self.active()?;
        gate.validate()?;
        transaction(exec, |exec| {
            for (reg, value) in gate.encode() {
                exec.enqueue_write(reg, value, WriteMode::Normal)?;
            }
            Ok(())
        })
    }

    /// Equalizer and compressor settings.
    pub fn audio_engine(&self) -> Result<AudioEngine> {
        self.session()?;
        Ok(AudioEngine::decode(self.exec.cache()))
    }

    /// Program the equalizer and compressor.
    ///
    /// New coefficients for a running equalizer are loaded with the
    /// equalizer stopped: it is disabled, the engine drains to idle, the
    /// coefficients are written and the new control value re-enables it.
    pub fn set_audio_engine(&mut self, engine: &AudioEngine) -> Result<()> {
        let (exec, _) = self.active()?;
        engine.validate()?;
        let current = AudioEngine::decode(exec.cache());
        let running = current.eq
            && PowerState::decode(exec.cache())
                .digital
                .contains(DigitalDomains::ENGINE);
        let reload = running && current.eq_coefficients != engine.eq_coefficients;
        transaction(exec, |exec| {
            if reload {
                exec.enqueue_write(E_CTRL, current.ctrl() & !E_CTRL_EQ, WriteMode::Normal)?;
                exec.enqueue_event_wait(WaitEvent::ENGINE_IDLE)?;
            }
            for (reg, value) in engine.coefficients() {
                exec.enqueue_write(reg, value, WriteMode::Normal)?;
            }
            let (reg, value) = engine.threshold();
            exec.enqueue_write(reg, value, WriteMode::Normal)?;
            exec.enqueue_write(E_CTRL, engine.ctrl(), WriteMode::Normal)
        })
    }

    // ── GPIO ─────────────────────────────────────────────────────────────────

    /// Configuration of a pad.
    pub fn gpio(&self, pad: GpioPad) -> Result<GpioConfig> {
        self.session()?;
        Ok(GpioConfig::decode(self.exec.cache().value(pad.cfg_reg())))
    }

    /// Configure a pad's direction, pull and interrupt edge.
    pub fn configure_gpio(&mut self, pad: GpioPad, config: &GpioConfig) -> Result<()> {
        let (exec, _) = self.active()?;
        config.validate()?;
        let irq_en = with_bit(
            exec.cache().value(IF_IRQ_EN),
            pad.mask(),
            config.irq != IrqEdge::None,
        );
        transaction(exec, |exec| {
            exec.enqueue_write(pad.cfg_reg(), config.encode(), WriteMode::Normal)?;
            exec.enqueue_write(IF_IRQ_EN, irq_en, WriteMode::Normal)
        })
    }

    /// Mask or unmask a pad's interrupt.
    pub fn mask_gpio(&mut self, pad: GpioPad, masked: bool) -> Result<()> {
        let (exec, _) = self.active()?;
        let mask = with_bit(exec.cache().value(A_GP_MASK), pad.mask(), masked);
        transaction(exec, |exec| {
            exec.enqueue_write(A_GP_MASK, mask, WriteMode::Normal)
        })
    }

    /// Drive an output pad (`Some(level)`) or sample any pad (`None`).
    ///
    /// Returns the pad level.
    pub fn getset_gpio(&mut self, pad: GpioPad, level: Option<bool>) -> Result<bool> {
        let (exec, _) = self.active()?;
        match level {
            Some(level) => {
                let config = GpioConfig::decode(exec.cache().value(pad.cfg_reg()));
                if config.direction != GpioDirection::Output {
                    return Err(ArgumentError::Conflict { field: "level" }.into());
                }
                let data = with_bit(exec.cache().value(A_GP_DATA), pad.mask(), level);
                transaction(exec, |exec| {
                    exec.enqueue_write(A_GP_DATA, data, WriteMode::Force)
                })?;
                Ok(level)
            }
            None => Ok(exec.read(A_GP_DATA)? & pad.mask() != 0),
        }
    }
}

/// Claim the packet buffer, queue a program, flush it and release the
/// buffer whatever happened.
fn transaction<I: I2c, D: DelayNs, T>(
    exec: &mut Executor<I, D>,
    program: impl FnOnce(&mut Executor<I, D>) -> Result<T>,
) -> Result<T> {
    exec.allocate()?;
    let result = match program(exec) {
        Ok(value) => exec.flush().map(|()| value),
        Err(e) => Err(e),
    };
    exec.release();
    result
}

fn enqueue_all<I: I2c, D: DelayNs>(exec: &mut Executor<I, D>, ops: &[Op]) -> Result<()> {
    for &op in ops {
        exec.enqueue(op)?;
    }
    Ok(())
}

/// Reset sequence, PLL and mic-bias programming, idle power base.
fn boot<I: I2c, D: DelayNs>(exec: &mut Executor<I, D>, session: &Session) -> Result<()> {
    let config = &session.config;
    exec.enqueue_write(IF_RST, RST_SOFT, WriteMode::Force)?;
    // The reset bit self-clears.
    exec.enqueue_write(IF_RST, 0, WriteMode::Dummy)?;
    exec.enqueue_timed_wait(RESET_RECOVERY_US)?;

    let [divf_h, divf_l] = config.pll.divf.to_be_bytes();
    exec.enqueue_write(A_PLL_DIVR, config.pll.divr, WriteMode::Normal)?;
    exec.enqueue_write(A_PLL_DIVF_H, divf_h & 0x0F, WriteMode::Normal)?;
    exec.enqueue_write(A_PLL_DIVF_L, divf_l, WriteMode::Normal)?;
    exec.enqueue_write(A_PLL_MODE, config.pll.mode, WriteMode::Normal)?;
    exec.enqueue_write(CD_MB_VOLT, config.mic_bias_voltage, WriteMode::Normal)?;

    if config.hold_clocks {
        let up = session
            .sequencer
            .compute_power_up(PowerState::BASE, PowerState::decode(exec.cache()))?;
        enqueue_all(exec, &up.ops)?;
    }
    Ok(())
}

fn check_direction(reg: RegAddr, needed: Access) -> Result<&'static RegInfo> {
    let info = reg.require()?;
    if !info.access.contains(needed) || info.access.contains(Access::WINDOW) {
        return Err(ArgumentError::RegisterDirection(reg).into());
    }
    Ok(info)
}

fn with_bit(value: u8, mask: u8, on: bool) -> u8 {
    if on {
        value | mask
    } else {
        value & !mask
    }
}
