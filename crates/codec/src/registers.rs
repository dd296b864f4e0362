//! Named registers and bit fields.

use crate::regmap::{Bank, RegAddr};

// ── Digital interface bank (direct) ──────────────────────────────────────────

/// Soft reset; bit 0 self-clears.
pub const IF_RST: RegAddr = RegAddr::new(Bank::If, 0x00);
/// Digital status flags.
pub const IF_STATUS: RegAddr = RegAddr::new(Bank::If, 0x01);
/// Interrupt enable per GPIO pad.
pub const IF_IRQ_EN: RegAddr = RegAddr::new(Bank::If, 0x0A);
/// Device identification.
pub const IF_DEVICE_ID: RegAddr = RegAddr::new(Bank::If, 0x0B);

/// `IF_RST`: start a soft reset.
pub const RST_SOFT: u8 = 1 << 0;
/// `IF_STATUS`: PLL locked.
pub const STATUS_PLL_LOCK: u8 = 1 << 0;
/// `IF_STATUS`: system clock stable.
pub const STATUS_CLK_STABLE: u8 = 1 << 1;
/// `IF_STATUS`: audio engine idle.
pub const STATUS_ENGINE_IDLE: u8 = 1 << 2;

// ── Bank A: clocks, block power, GPIO ────────────────────────────────────────

/// Clock power-down (active high).
pub const A_PD_CLK: RegAddr = RegAddr::new(Bank::A, 0x00);
/// Block power-down (active high), one bit per digital block.
pub const A_PD_BLK: RegAddr = RegAddr::new(Bank::A, 0x01);
/// PLL reference divider.
pub const A_PLL_DIVR: RegAddr = RegAddr::new(Bank::A, 0x04);
/// PLL feedback divider, bits 11:8.
pub const A_PLL_DIVF_H: RegAddr = RegAddr::new(Bank::A, 0x05);
/// PLL feedback divider, bits 7:0.
pub const A_PLL_DIVF_L: RegAddr = RegAddr::new(Bank::A, 0x06);
/// PLL loop mode.
pub const A_PLL_MODE: RegAddr = RegAddr::new(Bank::A, 0x07);
/// GPIO pad 0 configuration (pads 1, 2 follow).
pub const A_GP0_CFG: RegAddr = RegAddr::new(Bank::A, 0x08);
/// GPIO interrupt mask.
pub const A_GP_MASK: RegAddr = RegAddr::new(Bank::A, 0x0B);
/// GPIO pad levels.
pub const A_GP_DATA: RegAddr = RegAddr::new(Bank::A, 0x0C);

/// `A_PD_CLK`: PLL powered down.
pub const PD_CLK_PLL: u8 = 1 << 0;
/// `A_PD_CLK`: PLL held in reset.
pub const PD_CLK_PLL_RST: u8 = 1 << 1;
/// `A_PD_CLK`: system clock gated.
pub const PD_CLK_CLK: u8 = 1 << 2;

// ── Bank MA: selectors, digital volumes ──────────────────────────────────────

/// Digital IO port 0 transmit selector (ports 1, 2 follow).
pub const MA_DIO0_SRC: RegAddr = RegAddr::new(Bank::Ma, 0x00);
/// DAC selector.
pub const MA_DAC_SRC: RegAddr = RegAddr::new(Bank::Ma, 0x03);
/// Audio engine input selector.
pub const MA_ENGINE_SRC: RegAddr = RegAddr::new(Bank::Ma, 0x04);
/// First digital volume register; targets occupy consecutive L/R pairs.
pub const MA_VOL_BASE: u8 = 0x08;

// ── Bank MB: digital IO and converter configuration ─────────────────────────

/// Digital IO port 0 mode (ports 1, 2 at +4, +8).
pub const MB_DIO0_MODE: u8 = 0x00;
/// Offset of the format register within a port block.
pub const MB_DIO_FMT: u8 = 0x01;
/// Offset of the bit-clock register within a port block.
pub const MB_DIO_BCK: u8 = 0x02;
/// Stride between port blocks.
pub const MB_DIO_STRIDE: u8 = 0x04;
/// DAC configuration.
pub const MB_DAC_CFG: RegAddr = RegAddr::new(Bank::Mb, 0x10);
/// ADC configuration.
pub const MB_ADC_CFG: RegAddr = RegAddr::new(Bank::Mb, 0x11);
/// PDM input configuration.
pub const MB_PDM_CFG: RegAddr = RegAddr::new(Bank::Mb, 0x12);
/// Sample-rate converter owner (0 = none, n = port n-1).
pub const MB_SRC_OWNER: RegAddr = RegAddr::new(Bank::Mb, 0x13);

// ── Bank E: audio engine ─────────────────────────────────────────────────────

/// Engine control.
pub const E_CTRL: RegAddr = RegAddr::new(Bank::E, 0x00);
/// Dynamic range compressor threshold.
pub const E_DRC_THRESHOLD: RegAddr = RegAddr::new(Bank::E, 0x01);
/// Noise gate enable and threshold.
pub const E_NG_CTRL: RegAddr = RegAddr::new(Bank::E, 0x02);
/// Noise gate attack/release.
pub const E_NG_TIME: RegAddr = RegAddr::new(Bank::E, 0x03);
/// First equalizer coefficient.
pub const E_EQ_COEF_BASE: u8 = 0x10;

/// `E_CTRL`: equalizer enabled.
pub const E_CTRL_EQ: u8 = 1 << 0;
/// `E_CTRL`: compressor enabled.
pub const E_CTRL_DRC: u8 = 1 << 1;

// ── Analog direct bank ───────────────────────────────────────────────────────

/// Analog status flags.
pub const ANA_STATUS: RegAddr = RegAddr::new(Bank::Ana, 0x02);
/// Per-output mute-complete flags.
pub const ANA_MUTE_STATUS: RegAddr = RegAddr::new(Bank::Ana, 0x03);
/// Reference rails power-down.
pub const ANA_PD_REF: RegAddr = RegAddr::new(Bank::Ana, 0x04);
/// Mic bias power-down.
pub const ANA_PD_MB: RegAddr = RegAddr::new(Bank::Ana, 0x05);
/// ADC front end power-down.
pub const ANA_PD_ADC: RegAddr = RegAddr::new(Bank::Ana, 0x06);
/// Amplifier power-down.
pub const ANA_PD_AMP: RegAddr = RegAddr::new(Bank::Ana, 0x07);
/// First analog mixer register (ADC L); sinks follow in `Sink` order.
pub const ANA_MIX_BASE: u8 = 0x08;
/// Headphone left volume; outputs follow in `VolumeTarget` order.
pub const ANA_HP_VOL_L: u8 = 0x14;
/// Mic 1 gain; mic 2, mic 3, line-in L/R follow.
pub const ANA_MIC1_GAIN: u8 = 0x1C;

/// `ANA_STATUS`: reference rails ready.
pub const ANA_STATUS_REF_RDY: u8 = 1 << 0;
/// `ANA_STATUS`: charge pump ready.
pub const ANA_STATUS_CP_RDY: u8 = 1 << 1;
/// `ANA_STATUS`: headphone amp ready.
pub const ANA_STATUS_HP_RDY: u8 = 1 << 2;
/// `ANA_STATUS`: speaker amp ready.
pub const ANA_STATUS_SP_RDY: u8 = 1 << 3;

/// `ANA_MUTE_STATUS`: headphone ramp done.
pub const MUTE_DONE_HP: u8 = 1 << 0;
/// `ANA_MUTE_STATUS`: speaker ramp done.
pub const MUTE_DONE_SP: u8 = 1 << 1;
/// `ANA_MUTE_STATUS`: receiver ramp done.
pub const MUTE_DONE_RC: u8 = 1 << 2;
/// `ANA_MUTE_STATUS`: line out 1 ramp done.
pub const MUTE_DONE_LO1: u8 = 1 << 3;
/// `ANA_MUTE_STATUS`: line out 2 ramp done.
pub const MUTE_DONE_LO2: u8 = 1 << 4;

// ── Bank CD: charge pump, speaker ────────────────────────────────────────────

/// Charge pump power-down.
pub const CD_PD_CP: RegAddr = RegAddr::new(Bank::Cd, 0x00);
/// Speaker amp configuration.
pub const CD_SP_CFG: RegAddr = RegAddr::new(Bank::Cd, 0x01);
/// Mic bias output voltage.
pub const CD_MB_VOLT: RegAddr = RegAddr::new(Bank::Cd, 0x02);
