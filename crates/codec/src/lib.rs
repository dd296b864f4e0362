//! Control engine for a two-slave audio codec
//!
//! Turns high-level requests (routing, volume, block settings, power) into
//! the minimal, correctly ordered register program the chip needs, while a
//! shadow cache keeps the host's view of the chip truthful.
//!
//! # Architecture Layers
//!
//! ```text
//! Codec / SharedCodec         session, validation, consumer API
//!         ↓
//! routing · volume · power    resolve graphs, curves, power plans
//!         ↓
//! Executor                    packet queue, burst chaining, waits
//!         ↓
//! ShadowCache · regmap        committed state, static register tables
//!         ↓
//! embedded_hal::i2c::I2c      transport (DeviceModel in tests)
//! ```
//!
//! # Features
//!
//! - `std`: Enable the platform mocks outside `cfg(test)`
//! - `defmt`: Enable defmt derives
//!
//! # Example
//!
//! ```
//! use codec::{Codec, InitConfig, PathRequest, Sink, Source};
//! use codec::sim::DeviceModel;
//! # struct NoDelay;
//! # impl embedded_hal::delay::DelayNs for NoDelay { fn delay_ns(&mut self, _: u32) {} }
//!
//! let mut codec = Codec::new(DeviceModel::default(), NoDelay);
//! codec.initialize(InitConfig::default())?;
//!
//! let mut route = PathRequest::new();
//! route.on(Sink::Dac, Source::Dio0In).on(Sink::HpL, Source::DacL);
//! codec.set_path(&route)?;
//! assert_eq!(codec.active_source(Sink::Dac)?, Some(Source::Dio0In));
//!
//! codec.terminate()?;
//! # Ok::<(), codec::Error>(())
//! ```

// ── Lint policy ─────────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)] // no .unwrap() in production code
#![deny(clippy::expect_used)] // no .expect() in production code
#![deny(clippy::panic)] // no panic!() in production code
#![deny(unused_must_use)]
// all Results must be handled
// ────────────────────────────────────────────────────────────────────────────
#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::print_stdout)] // prefer tracing/defmt over println! in lib code
#![allow(clippy::doc_markdown)] // register names in doc comments
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

#[cfg(feature = "std")]
extern crate std;

pub mod cache;
mod chain;
pub mod config;
pub mod error;
pub mod executor;
pub mod packet;
pub mod power;
pub mod regmap;
pub mod registers;
pub mod routing;
pub mod session;
pub mod settings;
pub mod shared;
pub mod sim;
pub mod volume;

pub use cache::ShadowCache;
pub use config::{InitConfig, PllConfig, PowerMode, SettleTimes, WaitTiming};
pub use error::{ArgumentError, Error, Result};
pub use executor::Executor;
pub use packet::{Op, Polarity, WaitEvent, WriteMode};
pub use platform::Decibel;
pub use power::{PowerPlan, PowerSequencer, PowerState};
pub use regmap::{Bank, RegAddr};
pub use routing::{resolve, EdgeState, PathRequest, RoutingGraph, Sink, Source};
pub use session::Codec;
pub use settings::{
    AdcSettings, AudioEngine, AudioFormat, BclkRatio, ChannelMap, ControlRegister, DacSettings,
    DioPort, DioSettings, GpioConfig, GpioDirection, GpioPad, IrqEdge, NoiseGate, PdmClock,
    PdmSettings, Pull, SpeakerSettings, WordWidth,
};
pub use shared::SharedCodec;
pub use volume::{VolumeClass, VolumeRequest, VolumeSettings, VolumeTarget};
