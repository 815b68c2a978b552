//! PPU-owned nametable RAM and cartridge-controlled mirroring.

use bincode::{Decode, Encode};

const BANK_LEN: usize = 0x400;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Mirroring {
    Horizontal,
    #[default]
    Vertical,
    FourScreen,
    SingleScreenFirst,
    SingleScreenSecond,
}

impl Mirroring {
    /// Physical bank backing each of the 4 logical nametables.
    #[must_use]
    pub fn banks(self) -> [u8; 4] {
        match self {
            Self::Horizontal => [0, 0, 1, 1],
            Self::Vertical => [0, 1, 0, 1],
            Self::FourScreen => [0, 1, 2, 3],
            Self::SingleScreenFirst => [0, 0, 0, 0],
            Self::SingleScreenSecond => [1, 1, 1, 1],
        }
    }
}

/// 2KB of console VRAM plus 2KB of cartridge VRAM for four-screen boards, mapped into the
/// `$2000-$2FFF` window 1KB at a time.
#[derive(Debug, Clone, Encode, Decode)]
pub struct Nametables {
    ram: [[u8; BANK_LEN]; 4],
    banks: [u8; 4],
}

impl Nametables {
    #[must_use]
    pub fn new(mirroring: Mirroring) -> Self {
        Self { ram: [[0xFF; BANK_LEN]; 4], banks: mirroring.banks() }
    }

    #[inline]
    #[must_use]
    pub fn bank(&self, nametable: u16) -> u8 {
        self.banks[(nametable & 3) as usize]
    }

    #[inline]
    #[must_use]
    pub fn read_bank(&self, bank: u8, index: u16) -> u8 {
        self.ram[bank as usize][(index & 0x3FF) as usize]
    }

    /// Read through the mirroring, using address bits 0-11.
    #[inline]
    #[must_use]
    pub fn read(&self, address: u16) -> u8 {
        self.read_bank(self.bank(address >> 10), address)
    }

    /// Returns whether the stored byte changed.
    pub fn write(&mut self, address: u16, value: u8) -> bool {
        let bank = self.bank(address >> 10) as usize;
        let slot = &mut self.ram[bank][(address & 0x3FF) as usize];
        let changed = *slot != value;
        *slot = value;
        changed
    }

    /// Returns whether the mapping changed.
    pub fn set_mirroring(&mut self, mirroring: Mirroring) -> bool {
        let banks = mirroring.banks();
        let changed = self.banks != banks;
        self.banks = banks;
        changed
    }

    /// Logical nametables (0-3) that currently map to the same bank as `nametable`.
    pub fn aliases(&self, nametable: u16) -> impl Iterator<Item = u16> + '_ {
        let bank = self.bank(nametable);
        (0..4).filter(move |&nt| self.bank(nt) == bank)
    }
}
