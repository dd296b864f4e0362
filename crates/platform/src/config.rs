//! Board-level constants shared by every crate in the workspace.
//!
//! Driver and tooling code reference these rather than hardcoding values.

/// Default 7-bit address of the digital-block slave.
pub const DEFAULT_DIGITAL_ADDR: u8 = 0x11;

/// Default 7-bit address of the analog-block slave.
pub const DEFAULT_ANALOG_ADDR: u8 = 0x3A;
