//! Platform abstractions for the codec control engine
//!
//! This crate provides the collaborator seams the engine is written
//! against, enabling development and testing without physical hardware.
//!
//! # Architecture Layers
//!
//! ```text
//! Consumer (audio service, board support)
//!         ↓
//! Codec engine (codec crate)
//!         ↓
//! Platform seams (this crate + embedded-hal traits)
//!         ↓
//! Hardware (I²C controller, timers, supply/clock gating)
//! ```
//!
//! # Seams
//!
//! - Transport: [`embedded_hal::i2c::I2c`]
//! - Time: [`embedded_hal::delay::DelayNs`]
//! - Board lifetime: [`SystemHooks`]
//! - Locking: `embassy_sync` raw mutexes (chosen by the consumer)
//!
//! # Features
//!
//! - `std`: Enable [`mocks`] outside `cfg(test)`
//! - `defmt`: Enable defmt derives
//!
//! # Example
//!
//! ```
//! use platform::audio_types::{Decibel, I2cAddr, DigitalSlave};
//!
//! let addr: I2cAddr<DigitalSlave> = I2cAddr::try_new(0x11).unwrap();
//! assert_eq!(addr.get(), 0x11);
//! assert!(Decibel::MUTE.is_mute());
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
#![allow(clippy::doc_markdown)] // hex addresses and register names in doc comments
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

#[cfg(feature = "std")]
extern crate std;

pub mod audio_types;
pub mod config;
pub mod hooks;
pub mod mocks;

pub use audio_types::{
    AnalogSlave, Decibel, DigitalSlave, I2cAddr, OutOfRangeError, SampleRateHz,
};
pub use hooks::{NoHooks, SystemHooks};
