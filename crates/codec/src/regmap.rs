//! Static register map: banks, per-register attributes and successor tables.
//!
//! Each bank is described by a compact list of `RegSpec` entries; the full
//! per-offset [`RegInfo`] tables (including the "next contiguous address"
//! link used for auto-increment bursts) are generated at compile time by
//! `build_table`.

use bitflags::bitflags;

use crate::error::{ArgumentError, Error, Result};

/// Select-byte flag: payload continues to the end of the transfer.
pub const BURST: u8 = 0x01;

/// Largest bank, in registers.
pub const MAX_BANK_SIZE: usize = 0x40;

/// Which physical slave device answers for a bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Slave {
    /// Digital core (interfaces, clocks, mixers, audio engine).
    Digital,
    /// Analog core (references, amplifiers, analog mixers).
    Analog,
}

/// How a bank's registers are reached on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Addressing {
    /// The offset is the register number on the slave.
    Direct,
    /// The offset is loaded into `adr`, then data moves through `data`.
    /// Both are direct registers of the owning slave.
    Window {
        /// Address-select register.
        adr: u8,
        /// Data port register.
        data: u8,
    },
}

/// Register bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Bank {
    /// Digital interface bank: reset, status, window ports.
    If = 0,
    /// Clock, block power and GPIO.
    A = 1,
    /// Multiplexer selectors and digital volumes.
    Ma = 2,
    /// Digital IO ports and converter configuration.
    Mb = 3,
    /// Audio engine.
    E = 4,
    /// Analog direct bank.
    Ana = 5,
    /// Analog charge pump / speaker window bank.
    Cd = 6,
}

impl Bank {
    /// Number of banks.
    pub const COUNT: usize = 7;

    /// All banks in index order.
    pub const ALL: [Bank; Self::COUNT] = [
        Bank::If,
        Bank::A,
        Bank::Ma,
        Bank::Mb,
        Bank::E,
        Bank::Ana,
        Bank::Cd,
    ];

    /// Dense index for per-bank arrays.
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Slave that owns the bank.
    pub const fn slave(self) -> Slave {
        match self {
            Bank::If | Bank::A | Bank::Ma | Bank::Mb | Bank::E => Slave::Digital,
            Bank::Ana | Bank::Cd => Slave::Analog,
        }
    }

    /// Wire addressing of the bank.
    pub const fn addressing(self) -> Addressing {
        match self {
            Bank::If | Bank::Ana => Addressing::Direct,
            Bank::A => Addressing::Window { adr: 0x02, data: 0x03 },
            Bank::Ma => Addressing::Window { adr: 0x04, data: 0x05 },
            Bank::Mb => Addressing::Window { adr: 0x06, data: 0x07 },
            Bank::E => Addressing::Window { adr: 0x08, data: 0x09 },
            Bank::Cd => Addressing::Window { adr: 0x00, data: 0x01 },
        }
    }

    /// Attribute table, one entry per offset.
    pub fn table(self) -> &'static [RegInfo] {
        match self {
            Bank::If => &IF_TABLE,
            Bank::A => &A_TABLE,
            Bank::Ma => &MA_TABLE,
            Bank::Mb => &MB_TABLE,
            Bank::E => &E_TABLE,
            Bank::Ana => &ANA_TABLE,
            Bank::Cd => &CD_TABLE,
        }
    }

    /// Number of offsets in the bank.
    pub fn size(self) -> usize {
        self.table().len()
    }

    /// The direct bank on `slave`.
    pub const fn direct_of(slave: Slave) -> Bank {
        match slave {
            Slave::Digital => Bank::If,
            Slave::Analog => Bank::Ana,
        }
    }
}

bitflags! {
    /// Per-register attributes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Access: u8 {
        /// Readable.
        const R = 0x01;
        /// Writable.
        const W = 0x02;
        /// Changes behind the host's back (status, self-clearing bits).
        const VOLATILE = 0x04;
        /// Window address/data port, driven by the engine only.
        const WINDOW = 0x08;
        /// Read-write.
        const RW = Self::R.bits() | Self::W.bits();
    }
}

/// Register number within a bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RegAddr {
    /// Owning bank.
    pub bank: Bank,
    /// Offset within the bank.
    pub offset: u8,
}

impl RegAddr {
    /// Build an address; validity is checked on use.
    pub const fn new(bank: Bank, offset: u8) -> Self {
        Self { bank, offset }
    }

    /// Attributes of this register, if it exists.
    pub fn info(self) -> Option<&'static RegInfo> {
        self.bank
            .table()
            .get(usize::from(self.offset))
            .filter(|info| info.exists())
    }

    /// Attributes of this register, or `Argument(UnknownRegister)`.
    pub fn require(self) -> Result<&'static RegInfo> {
        self.info()
            .ok_or(Error::Argument(ArgumentError::UnknownRegister(self)))
    }

    /// Next existing register in auto-increment order.
    pub fn next(self) -> Option<RegAddr> {
        self.info()
            .and_then(|info| info.next)
            .map(|offset| RegAddr::new(self.bank, offset))
    }

    /// A register a burst may pass through by re-sending its cached value.
    pub fn is_hole(self) -> bool {
        self.info().is_some_and(|info| {
            info.access.contains(Access::W)
                && !info.access.intersects(Access::VOLATILE.union(Access::WINDOW))
        })
    }
}

/// Generated attributes for one offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegInfo {
    /// Permission and behavior flags; empty means "no register here".
    pub access: Access,
    /// Power-on value.
    pub default: u8,
    /// Next existing offset in the bank.
    pub next: Option<u8>,
}

impl RegInfo {
    const ABSENT: Self = Self {
        access: Access::empty(),
        default: 0,
        next: None,
    };

    /// Whether a register exists at this offset.
    pub const fn exists(&self) -> bool {
        !self.access.is_empty()
    }
}

/// One line of a bank description.
#[derive(Debug, Clone, Copy)]
struct RegSpec {
    offset: u8,
    access: Access,
    default: u8,
}

const fn reg(offset: u8, access: Access, default: u8) -> RegSpec {
    RegSpec {
        offset,
        access,
        default,
    }
}

/// Expand a bank description into a dense table with successor links.
///
/// Runs in const context only: an offset beyond `N` or a duplicate offset
/// fails the build.
#[allow(clippy::indexing_slicing, clippy::arithmetic_side_effects, clippy::panic)]
#[allow(clippy::cast_possible_truncation)] // N <= MAX_BANK_SIZE
const fn build_table<const N: usize>(specs: &[RegSpec]) -> [RegInfo; N] {
    let mut table = [RegInfo::ABSENT; N];
    let mut i = 0;
    while i < specs.len() {
        let spec = specs[i];
        let slot = spec.offset as usize;
        if table[slot].exists() {
            panic!("duplicate register offset");
        }
        table[slot] = RegInfo {
            access: spec.access,
            default: spec.default,
            next: None,
        };
        i += 1;
    }

    let mut a = 0;
    while a < N {
        if table[a].exists() {
            let mut b = a + 1;
            while b < N && !table[b].exists() {
                b += 1;
            }
            if b < N {
                table[a].next = Some(b as u8);
            }
        }
        a += 1;
    }
    table
}

const R: Access = Access::R;
const RW: Access = Access::RW;
const R_VOL: Access = Access::R.union(Access::VOLATILE);
const W_VOL: Access = Access::W.union(Access::VOLATILE);
const RW_VOL: Access = Access::RW.union(Access::VOLATILE);
const W_WIN: Access = Access::W.union(Access::WINDOW);
const RW_WIN: Access = Access::RW.union(Access::WINDOW);

const IF_REGS: [RegSpec; 12] = [
    reg(0x00, W_VOL, 0x00),
    reg(0x01, R_VOL, 0x00),
    reg(0x02, W_WIN, 0x00),
    reg(0x03, RW_WIN, 0x00),
    reg(0x04, W_WIN, 0x00),
    reg(0x05, RW_WIN, 0x00),
    reg(0x06, W_WIN, 0x00),
    reg(0x07, RW_WIN, 0x00),
    reg(0x08, W_WIN, 0x00),
    reg(0x09, RW_WIN, 0x00),
    reg(0x0A, RW, 0x00),
    reg(0x0B, R, 0x83),
];

const A_REGS: [RegSpec; 11] = [
    reg(0x00, RW, 0x07),
    reg(0x01, RW, 0xFF),
    reg(0x04, RW, 0x01),
    reg(0x05, RW, 0x00),
    reg(0x06, RW, 0x20),
    reg(0x07, RW, 0x00),
    reg(0x08, RW, 0x00),
    reg(0x09, RW, 0x00),
    reg(0x0A, RW, 0x00),
    reg(0x0B, RW, 0x07),
    reg(0x0C, RW_VOL, 0x00),
];

const MA_REGS: [RegSpec; 23] = [
    reg(0x00, RW, 0x00),
    reg(0x01, RW, 0x00),
    reg(0x02, RW, 0x00),
    reg(0x03, RW, 0x00),
    reg(0x04, RW, 0x00),
    reg(0x08, RW, 0x00),
    reg(0x09, RW, 0x00),
    reg(0x0A, RW, 0x00),
    reg(0x0B, RW, 0x00),
    reg(0x0C, RW, 0x00),
    reg(0x0D, RW, 0x00),
    reg(0x0E, RW, 0x00),
    reg(0x0F, RW, 0x00),
    reg(0x10, RW, 0x00),
    reg(0x11, RW, 0x00),
    reg(0x12, RW, 0x00),
    reg(0x13, RW, 0x00),
    reg(0x14, RW, 0x00),
    reg(0x15, RW, 0x00),
    reg(0x16, RW, 0x00),
    reg(0x17, RW, 0x00),
    reg(0x18, RW, 0x00),
    reg(0x19, RW, 0x00),
];

const MB_REGS: [RegSpec; 13] = [
    reg(0x00, RW, 0x00),
    reg(0x01, RW, 0x00),
    reg(0x02, RW, 0x00),
    reg(0x04, RW, 0x00),
    reg(0x05, RW, 0x00),
    reg(0x06, RW, 0x00),
    reg(0x08, RW, 0x00),
    reg(0x09, RW, 0x00),
    reg(0x0A, RW, 0x00),
    reg(0x10, RW, 0x00),
    reg(0x11, RW, 0x00),
    reg(0x12, RW, 0x00),
    reg(0x13, RW, 0x00),
];

const E_REGS: [RegSpec; 19] = [
    reg(0x00, RW, 0x00),
    reg(0x01, RW, 0x00),
    reg(0x02, RW, 0x00),
    reg(0x03, RW, 0x00),
    reg(0x10, RW, 0x00),
    reg(0x11, RW, 0x00),
    reg(0x12, RW, 0x00),
    reg(0x13, RW, 0x00),
    reg(0x14, RW, 0x00),
    reg(0x15, RW, 0x00),
    reg(0x16, RW, 0x00),
    reg(0x17, RW, 0x00),
    reg(0x18, RW, 0x00),
    reg(0x19, RW, 0x00),
    reg(0x1A, RW, 0x00),
    reg(0x1B, RW, 0x00),
    reg(0x1C, RW, 0x00),
    reg(0x1D, RW, 0x00),
    reg(0x1E, RW, 0x00),
];

const ANA_REGS: [RegSpec; 31] = [
    reg(0x00, W_WIN, 0x00),
    reg(0x01, RW_WIN, 0x00),
    reg(0x02, R_VOL, 0x00),
    reg(0x03, R_VOL, 0x00),
    reg(0x04, RW, 0x03),
    reg(0x05, RW, 0x07),
    reg(0x06, RW, 0x3F),
    reg(0x07, RW, 0xFF),
    reg(0x08, RW, 0x00),
    reg(0x09, RW, 0x00),
    reg(0x0A, RW, 0x00),
    reg(0x0B, RW, 0x00),
    reg(0x0C, RW, 0x00),
    reg(0x0D, RW, 0x00),
    reg(0x0E, RW, 0x00),
    reg(0x0F, RW, 0x00),
    reg(0x10, RW, 0x00),
    reg(0x11, RW, 0x00),
    reg(0x14, RW, 0x00),
    reg(0x15, RW, 0x00),
    reg(0x16, RW, 0x00),
    reg(0x17, RW, 0x00),
    reg(0x18, RW, 0x00),
    reg(0x19, RW, 0x00),
    reg(0x1A, RW, 0x00),
    reg(0x1B, RW, 0x00),
    reg(0x1C, RW, 0x00),
    reg(0x1D, RW, 0x00),
    reg(0x1E, RW, 0x00),
    reg(0x1F, RW, 0x00),
    reg(0x20, RW, 0x00),
];

const CD_REGS: [RegSpec; 3] = [
    reg(0x00, RW, 0x01),
    reg(0x01, RW, 0x00),
    reg(0x02, RW, 0x00),
];

static IF_TABLE: [RegInfo; 0x10] = build_table(&IF_REGS);
static A_TABLE: [RegInfo; 0x20] = build_table(&A_REGS);
static MA_TABLE: [RegInfo; 0x20] = build_table(&MA_REGS);
static MB_TABLE: [RegInfo; 0x20] = build_table(&MB_REGS);
static E_TABLE: [RegInfo; 0x20] = build_table(&E_REGS);
static ANA_TABLE: [RegInfo; 0x28] = build_table(&ANA_REGS);
static CD_TABLE: [RegInfo; 0x08] = build_table(&CD_REGS);

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn successor_skips_missing_offsets() {
        let pd_blk = RegAddr::new(Bank::A, 0x01);
        assert_eq!(pd_blk.next(), Some(RegAddr::new(Bank::A, 0x04)));
        let last = RegAddr::new(Bank::A, 0x0C);
        assert_eq!(last.next(), None);
    }

    #[test]
    fn missing_offsets_are_unknown() {
        assert!(RegAddr::new(Bank::Ma, 0x05).info().is_none());
        assert!(RegAddr::new(Bank::Cd, 0x30).info().is_none());
        assert_eq!(
            RegAddr::new(Bank::Mb, 0x03).require(),
            Err(Error::Argument(ArgumentError::UnknownRegister(
                RegAddr::new(Bank::Mb, 0x03)
            )))
        );
    }

    #[test]
    fn holes_exclude_volatile_and_window_registers() {
        assert!(RegAddr::new(Bank::Ana, 0x08).is_hole());
        assert!(!RegAddr::new(Bank::Ana, 0x02).is_hole()); // status
        assert!(!RegAddr::new(Bank::Ana, 0x00).is_hole()); // window adr
        assert!(!RegAddr::new(Bank::A, 0x0C).is_hole()); // GPIO data
        assert!(!RegAddr::new(Bank::If, 0x0B).is_hole()); // read-only id
    }

    #[test]
    fn every_table_fits_a_cache_bank() {
        for bank in Bank::ALL {
            assert!(bank.size() <= MAX_BANK_SIZE);
            // Registers must fit the 7-bit select field.
            assert!(bank.size() <= 0x80);
        }
    }

    #[test]
    fn window_ports_belong_to_the_owning_slave() {
        for bank in Bank::ALL {
            if let Addressing::Window { adr, data } = bank.addressing() {
                let direct = Bank::direct_of(bank.slave());
                let adr = RegAddr::new(direct, adr).info().unwrap();
                let data = RegAddr::new(direct, data).info().unwrap();
                assert!(adr.access.contains(Access::WINDOW));
                assert!(data.access.contains(Access::WINDOW));
            }
        }
    }

    #[test]
    fn power_down_registers_default_to_everything_off() {
        assert_eq!(RegAddr::new(Bank::A, 0x00).info().unwrap().default, 0x07);
        assert_eq!(RegAddr::new(Bank::A, 0x01).info().unwrap().default, 0xFF);
        assert_eq!(RegAddr::new(Bank::Ana, 0x07).info().unwrap().default, 0xFF);
    }
}
