//! Background fetches and the scroll counters.

use super::{Engine, PpuState, name_io_addr};
use crate::bus::PpuBus;
use crate::lut;

impl PpuState {
    /// Coarse X increment, wrapping into the horizontally adjacent nametable.
    pub(super) fn scroll_clock_x(&mut self) {
        if self.scroll_addr_0_4 < 0x1F {
            self.scroll_addr_0_4 += 1;
            self.name_io_addr += 1;
        } else {
            self.scroll_addr_0_4 = 0;
            self.scroll_addr_5_14 ^= 0x0400;
            self.name_io_addr ^= 0x041F;
        }
    }

    /// Fine Y increment, carrying into coarse Y. Coarse Y 29 wraps into the vertically adjacent
    /// nametable; 30 and 31 (attribute rows) wrap without switching.
    pub(super) fn scroll_clock_y(&mut self) {
        if self.scroll_addr_5_14 & 0x7000 != 0x7000 {
            self.scroll_addr_5_14 += 0x1000;
        } else {
            match self.scroll_addr_5_14 & 0x03E0 {
                0x03A0 => {
                    self.scroll_addr_5_14 ^= 0x0800;
                    self.scroll_addr_5_14 &= 0x0C00;
                }
                0x03E0 => self.scroll_addr_5_14 &= 0x0C00,
                _ => self.scroll_addr_5_14 = (self.scroll_addr_5_14 & 0x0FE0) + 0x20,
            }
        }

        self.name_io_addr = name_io_addr(self.scroll_addr_0_4, self.scroll_addr_5_14);
    }

    // Dot 257: copy coarse X and the horizontal nametable bit from t
    pub(super) fn scroll_reset_x(&mut self) {
        self.scroll_addr_0_4 = self.scroll_latch & 0x001F;
        self.scroll_addr_5_14 = (self.scroll_addr_5_14 & 0x7BE0) | (self.scroll_latch & 0x0400);
        self.name_io_addr = name_io_addr(self.scroll_addr_0_4, self.scroll_addr_5_14);
    }

    // Pre-render dot 304: copy all of t into v
    pub(super) fn scroll_reset_y(&mut self) {
        self.scroll_addr_0_4 = self.scroll_latch & 0x001F;
        self.scroll_addr_5_14 = self.scroll_latch & 0x7FE0;
        self.name_io_addr = name_io_addr(self.scroll_addr_0_4, self.scroll_addr_5_14);
    }

    // Shift out the 8 rendered pixels and queue the fetched tile behind the fine X offset
    pub(super) fn load_tiles(&mut self) {
        self.bg_pixels.rotate_left(8);
        self.preload_tiles();
    }

    pub(super) fn preload_tiles(&mut self) {
        let start = usize::from(self.scroll_xfine);
        self.bg_pixels[start..start + 8]
            .copy_from_slice(lut::tile_pixels(self.bg_pattern_lut, self.bg_pattern));
    }
}

impl<B: PpuBus> Engine<'_, B> {
    pub(super) fn open_name(&mut self) {
        self.set_io_addr(self.state.name_io_addr);
    }

    pub(super) fn fetch_name(&mut self) {
        let state = &mut *self.state;
        state.io_pattern = self
            .lut
            .name(state.scroll_addr_0_4 + state.scroll_addr_5_14 + state.bg_pattern_base_15);
    }

    pub(super) fn open_attr(&mut self) {
        let key = self.lut.attr_key(self.state.scroll_addr_0_4 + self.state.scroll_addr_5_14);
        self.state.bg_attr_key = key;
        self.set_io_addr(self.lut.attr_entry(key).io_addr);
    }

    pub(super) fn fetch_attr(&mut self) {
        self.state.bg_pattern_lut = self.lut.attr_entry(self.state.bg_attr_key).palette;
    }

    #[inline]
    pub(super) fn open_pattern(&mut self, address: u16) {
        self.set_io_addr(address);
    }

    pub(super) fn fetch_bg_pattern_0(&mut self) {
        self.state.bg_pattern = self.read_chr(self.state.io_addr).into();
    }

    pub(super) fn fetch_bg_pattern_1(&mut self) {
        self.state.bg_pattern |= u16::from(self.read_chr(self.state.io_addr)) << 8;
    }
}
