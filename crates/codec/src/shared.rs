//! Session-wide lock around a [`Codec`].
//!
//! Consumers on several tasks share one codec through a
//! [`SharedCodec`]; the raw mutex type decides what "several" means
//! (`NoopRawMutex` for one executor, `CriticalSectionRawMutex` across
//! interrupt priorities).
//!
//! Every session operation of [`Codec`] has a delegate here. [`SharedCodec::lock`]
//! runs several calls under one acquisition, or reaches the codec's
//! accessors such as `cache` and `bus`.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use platform::{NoHooks, SystemHooks};

use crate::config::InitConfig;
use crate::error::{Error, Result};
use crate::regmap::RegAddr;
use crate::routing::{PathRequest, RoutingGraph, Sink, Source};
use crate::session::Codec;
use crate::settings::{
    AdcSettings, AudioEngine, ControlRegister, DacSettings, DioPort, DioSettings, GpioConfig,
    GpioPad, NoiseGate, PdmSettings, SpeakerSettings,
};
use crate::volume::{VolumeRequest, VolumeSettings};

/// A [`Codec`] behind a blocking mutex.
pub struct SharedCodec<M: RawMutex, I, D, H = NoHooks> {
    inner: Mutex<M, RefCell<Codec<I, D, H>>>,
}

impl<M: RawMutex, I: I2c, D: DelayNs, H: SystemHooks> SharedCodec<M, I, D, H> {
    /// Wrap a codec.
    pub fn new(codec: Codec<I, D, H>) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(codec)),
        }
    }

    /// Run `f` with exclusive access to the codec.
    ///
    /// A nested call from inside `f` is refused with `ResourceExhausted`.
    pub fn lock<T>(&self, f: impl FnOnce(&mut Codec<I, D, H>) -> Result<T>) -> Result<T> {
        self.inner.lock(|cell| {
            let mut codec = cell.try_borrow_mut().map_err(|_| {
                tracing::warn!("re-entrant codec lock");
                Error::ResourceExhausted
            })?;
            f(&mut codec)
        })
    }

    /// Unwrap the codec.
    pub fn into_inner(self) -> Codec<I, D, H> {
        self.inner.into_inner().into_inner()
    }

    /// See [`Codec::initialize`].
    pub fn initialize(&self, config: InitConfig) -> Result<()> {
        self.lock(|c| c.initialize(config))
    }

    /// See [`Codec::terminate`].
    pub fn terminate(&self) -> Result<()> {
        self.lock(Codec::terminate)
    }

    /// See [`Codec::read_register`].
    pub fn read_register(&self, reg: RegAddr) -> Result<u8> {
        self.lock(|c| c.read_register(reg))
    }

    /// See [`Codec::write_register`].
    pub fn write_register(&self, reg: RegAddr, data: u8) -> Result<()> {
        self.lock(|c| c.write_register(reg, data))
    }

    /// See [`Codec::path`].
    pub fn path(&self) -> Result<RoutingGraph> {
        self.lock(|c| c.path())
    }

    /// See [`Codec::set_path`].
    pub fn set_path(&self, request: &PathRequest) -> Result<()> {
        self.lock(|c| c.set_path(request))
    }

    /// See [`Codec::volume`].
    pub fn volume(&self) -> Result<VolumeSettings> {
        self.lock(|c| c.volume())
    }

    /// See [`Codec::active_source`].
    pub fn active_source(&self, sink: Sink) -> Result<Option<Source>> {
        self.lock(|c| c.active_source(sink))
    }

    /// See [`Codec::set_volume`].
    pub fn set_volume(&self, request: &VolumeRequest) -> Result<()> {
        self.lock(|c| c.set_volume(request))
    }

    /// See [`Codec::digital_io`].
    pub fn digital_io(&self, port: DioPort) -> Result<DioSettings> {
        self.lock(|c| c.digital_io(port))
    }

    /// See [`Codec::set_digital_io`].
    pub fn set_digital_io(&self, port: DioPort, settings: &DioSettings) -> Result<()> {
        self.lock(|c| c.set_digital_io(port, settings))
    }

    /// See [`Codec::control`].
    pub fn control<T: ControlRegister>(&self) -> Result<T> {
        self.lock(|c| c.control())
    }

    /// See [`Codec::set_control`].
    pub fn set_control<T: ControlRegister>(&self, settings: &T) -> Result<()> {
        self.lock(|c| c.set_control(settings))
    }

    /// See [`Codec::dac`].
    pub fn dac(&self) -> Result<DacSettings> {
        self.lock(|c| c.dac())
    }

    /// See [`Codec::set_dac`].
    pub fn set_dac(&self, settings: &DacSettings) -> Result<()> {
        self.lock(|c| c.set_dac(settings))
    }

    /// See [`Codec::adc`].
    pub fn adc(&self) -> Result<AdcSettings> {
        self.lock(|c| c.adc())
    }

    /// See [`Codec::set_adc`].
    pub fn set_adc(&self, settings: &AdcSettings) -> Result<()> {
        self.lock(|c| c.set_adc(settings))
    }

    /// See [`Codec::speaker`].
    pub fn speaker(&self) -> Result<SpeakerSettings> {
        self.lock(|c| c.speaker())
    }

    /// See [`Codec::set_speaker`].
    pub fn set_speaker(&self, settings: &SpeakerSettings) -> Result<()> {
        self.lock(|c| c.set_speaker(settings))
    }

    /// See [`Codec::pdm`].
    pub fn pdm(&self) -> Result<PdmSettings> {
        self.lock(|c| c.pdm())
    }

    /// See [`Codec::set_pdm`].
    pub fn set_pdm(&self, settings: &PdmSettings) -> Result<()> {
        self.lock(|c| c.set_pdm(settings))
    }

    /// See [`Codec::noise_gate`].
    pub fn noise_gate(&self) -> Result<NoiseGate> {
        self.lock(|c| c.noise_gate())
    }

    /// See [`Codec::set_noise_gate`].
    pub fn set_noise_gate(&self, gate: &NoiseGate) -> Result<()> {
        self.lock(|c| c.set_noise_gate(gate))
    }

    /// See [`Codec::audio_engine`].
    pub fn audio_engine(&self) -> Result<AudioEngine> {
        self.lock(|c| c.audio_engine())
    }

    /// See [`Codec::set_audio_engine`].
    pub fn set_audio_engine(&self, engine: &AudioEngine) -> Result<()> {
        self.lock(|c| c.set_audio_engine(engine))
    }

    /// See [`Codec::gpio`].
    pub fn gpio(&self, pad: GpioPad) -> Result<GpioConfig> {
        self.lock(|c| c.gpio(pad))
    }

    /// See [`Codec::configure_gpio`].
    pub fn configure_gpio(&self, pad: GpioPad, config: &GpioConfig) -> Result<()> {
        self.lock(|c| c.configure_gpio(pad, config))
    }

    /// See [`Codec::mask_gpio`].
    pub fn mask_gpio(&self, pad: GpioPad, masked: bool) -> Result<()> {
        self.lock(|c| c.mask_gpio(pad, masked))
    }

    /// See [`Codec::getset_gpio`].
    pub fn getset_gpio(&self, pad: GpioPad, level: Option<bool>) -> Result<bool> {
        self.lock(|c| c.getset_gpio(pad, level))
    }
}
