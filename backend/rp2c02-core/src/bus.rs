//! Interfaces between the PPU and the rest of the emulated machine.

/// Master clocks per PPU dot. The CPU runs at 12 master clocks per cycle.
pub const MASTER_CLOCKS_PER_DOT: u64 = 4;

/// Everything the PPU needs from the host: cartridge CHR memory, the CPU's clock and NMI line,
/// and (optionally) a mapper that watches PPU address line A12.
pub trait PpuBus {
    /// Read pattern memory, `$0000-$1FFF`.
    fn read_chr(&mut self, address: u16) -> u8;

    /// Write pattern memory. Cartridges with CHR ROM should ignore this.
    fn write_chr(&mut self, address: u16, value: u8);

    /// Current CPU position in master clocks, relative to the start of the current frame.
    fn cpu_clock(&self) -> u64;

    /// Length of the current frame in master clocks.
    fn next_frame_clock(&self) -> u64;

    fn set_next_frame_clock(&mut self, clock: u64);

    /// Request an NMI at the given master clock.
    fn do_nmi(&mut self, clock: u64);

    /// Whether a mapper needs A12 rising-edge notifications. Checked once per PPU run.
    fn monitors_a12(&self) -> bool {
        false
    }

    /// Notification of an A12 0->1 transition at the given master clock.
    fn a12_signaled(&mut self, _clock: u64) {}
}

#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PpuRegister {
    PPUCTRL,
    PPUMASK,
    PPUSTATUS,
    OAMADDR,
    OAMDATA,
    PPUSCROLL,
    PPUADDR,
    PPUDATA,
}

impl PpuRegister {
    /// Map a CPU address in `$2000-$3FFF` to its register. The 8 registers are mirrored every 8
    /// bytes.
    #[must_use]
    pub fn from_address(address: u16) -> Option<Self> {
        if !(0x2000..=0x3FFF).contains(&address) {
            return None;
        }

        let register = match address & 0x0007 {
            0x00 => Self::PPUCTRL,
            0x01 => Self::PPUMASK,
            0x02 => Self::PPUSTATUS,
            0x03 => Self::OAMADDR,
            0x04 => Self::OAMDATA,
            0x05 => Self::PPUSCROLL,
            0x06 => Self::PPUADDR,
            0x07 => Self::PPUDATA,
            _ => unreachable!("value & 0x0007 is always <= 7"),
        };
        Some(register)
    }

    #[must_use]
    pub const fn to_address(self) -> u16 {
        match self {
            Self::PPUCTRL => 0x2000,
            Self::PPUMASK => 0x2001,
            Self::PPUSTATUS => 0x2002,
            Self::OAMADDR => 0x2003,
            Self::OAMDATA => 0x2004,
            Self::PPUSCROLL => 0x2005,
            Self::PPUADDR => 0x2006,
            Self::PPUDATA => 0x2007,
        }
    }
}
