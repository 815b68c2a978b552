//! Precomputed tables for the background and sprite fetch pipelines.
//!
//! The name and attribute tables are derived from nametable RAM and are indexed directly by the
//! scroll registers, so a tile fetch costs one table read. They are owned alongside the PPU state
//! and patched in place whenever a nametable byte changes.

use crate::memory::Nametables;
use std::sync::OnceLock;

/// Palette indices for the 8 pixels of one tile row, left to right. Transparent pixels are 0.
pub type TilePixels = [u8; 8];

const PATTERNS: usize = 0x10000;

/// Decode a tile row into palette indices. `pattern` holds the low bitplane in bits 0-7 and the
/// high bitplane in bits 8-15, and `palette` is the 2-bit attribute palette.
#[inline]
#[must_use]
pub fn tile_pixels(palette: u8, pattern: u16) -> &'static TilePixels {
    static TILE_LUT: OnceLock<Box<[TilePixels]>> = OnceLock::new();

    let lut = TILE_LUT.get_or_init(|| {
        let mut lut = vec![[0; 8]; 4 * PATTERNS].into_boxed_slice();
        for palette in 0..4 {
            for pattern in 0..PATTERNS {
                let pixels = &mut lut[palette * PATTERNS + pattern];
                for (j, pixel) in pixels.iter_mut().enumerate() {
                    let color = ((pattern >> (15 - j)) & 1) << 1 | ((pattern >> (7 - j)) & 1);
                    if color != 0 {
                        *pixel = (palette << 2 | color) as u8;
                    }
                }
            }
        }
        lut
    });
    &lut[((palette & 3) as usize) * PATTERNS + pattern as usize]
}

/// Shift (in 2-bit units) applied to an interleaved sprite pattern to reach each pixel, for
/// unflipped and horizontally flipped sprites.
pub const SPRITE_PIXEL_POSITIONS: [[u8; 8]; 2] = [[3, 7, 2, 6, 1, 5, 0, 4], [4, 0, 5, 1, 6, 2, 7, 3]];

/// Interleave two sprite bitplanes so each 2-bit group holds one pixel; see
/// [`SPRITE_PIXEL_POSITIONS`] for the pixel order.
#[inline]
#[must_use]
pub fn interleave_sprite_pattern(low: u8, high: u8) -> u16 {
    let (low, high) = (u16::from(low), u16::from(high));
    (low >> 1 & 0x55) | (high & 0xAA) | ((low & 0x55) | (high << 1 & 0xAA)) << 8
}

/// The attribute fetch result for one 16x16 pixel quadrant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AttrEntry {
    pub io_addr: u16,
    pub palette: u8,
    pub shift: u8,
}

const NAME_LUT_LEN: usize = 0x10000;
const ATTR_LUT_LEN: usize = 0x8000;
const ATTR_ENTRIES: usize = 4 * 64 * 4;

fn attr_io_addr(scroll: u16) -> u16 {
    0x23C0 | (scroll & 0x0C00) | (scroll >> 4 & 0x0038) | (scroll >> 2 & 0x0007)
}

fn attr_shift(scroll: u16) -> u8 {
    ((scroll & 0x0002) | (scroll >> 4 & 0x0004)) as u8
}

fn attr_key(io_addr: u16, shift: u8) -> u16 {
    ((io_addr >> 10 & 3) << 6 | (io_addr & 0x3F)) << 2 | u16::from(shift >> 1)
}

fn name_entry(tile: u8, scroll_with_base: usize) -> u16 {
    let fine_y = (scroll_with_base >> 12 & 7) as u16;
    let pattern_base = (scroll_with_base >> 15 & 1) as u16;
    u16::from(tile) << 4 | fine_y | pattern_base << 12
}

#[derive(Debug, Clone)]
pub struct FetchLut {
    // Indexed by coarse X + fine Y/coarse Y/nametable + background pattern base in bit 15;
    // yields the pattern table address of the tile row
    name: Box<[u16]>,
    // Indexed by coarse X + fine Y/coarse Y/nametable; yields a key into `attr_entries`
    attr: Box<[u16]>,
    attr_entries: Box<[AttrEntry]>,
}

impl FetchLut {
    #[must_use]
    pub fn new(nametables: &Nametables) -> Self {
        let mut lut = Self {
            name: vec![0; NAME_LUT_LEN].into_boxed_slice(),
            attr: vec![0; ATTR_LUT_LEN].into_boxed_slice(),
            attr_entries: vec![AttrEntry::default(); ATTR_ENTRIES].into_boxed_slice(),
        };
        lut.rebuild(nametables);
        lut
    }

    /// Recompute every entry, e.g. after the nametable mapping changed.
    pub fn rebuild(&mut self, nametables: &Nametables) {
        for (i, entry) in self.name.iter_mut().enumerate() {
            *entry = name_entry(nametables.read(i as u16), i);
        }

        for (i, key) in self.attr.iter_mut().enumerate() {
            let scroll = i as u16;
            let io_addr = attr_io_addr(scroll);
            let shift = attr_shift(scroll);

            *key = attr_key(io_addr, shift);
            self.attr_entries[*key as usize] =
                AttrEntry { io_addr, palette: nametables.read(io_addr) >> shift & 3, shift };
        }

        log::debug!("Rebuilt nametable fetch tables");
    }

    /// Pattern address for the tile under the given scroll position.
    #[inline]
    #[must_use]
    pub fn name(&self, scroll_with_base: u16) -> u16 {
        self.name[scroll_with_base as usize]
    }

    #[inline]
    #[must_use]
    pub fn attr_key(&self, scroll: u16) -> u16 {
        self.attr[(scroll & 0x7FFF) as usize]
    }

    #[inline]
    #[must_use]
    pub fn attr_entry(&self, key: u16) -> AttrEntry {
        self.attr_entries[key as usize]
    }

    /// Patch the entries derived from the nametable byte at `address`. `nametables` must already
    /// hold the new value; every logical nametable mirroring the written bank is refreshed.
    pub fn on_nametable_write(&mut self, nametables: &Nametables, address: u16, value: u8) {
        let index = address & 0x03FF;

        for nametable in nametables.aliases(address >> 10) {
            let nametable_addr = nametable << 10 | index;
            for fine_y in 0..8 {
                for pattern_base in 0..2 {
                    let i = (pattern_base << 15 | fine_y << 12 | nametable_addr) as usize;
                    self.name[i] = name_entry(value, i);
                }
            }

            if index >= 0x03C0 {
                let io_addr = 0x2000 | nametable_addr;
                for shift in [0, 2, 4, 6] {
                    let entry = &mut self.attr_entries[attr_key(io_addr, shift) as usize];
                    debug_assert_eq!(entry.io_addr, io_addr);
                    entry.palette = value >> shift & 3;
                }
            }
        }
    }
}
