//! Sprite evaluation and the per-scanline sprite pixel map.
//!
//! Evaluation runs on dots 64-255 as alternating reads (even dots) and processing steps (odd
//! dots), copying in-range sprites from OAM into the sprite buffer. Once the buffer is full the
//! evaluator keeps scanning for a 9th sprite to set the overflow flag, reproducing the hardware
//! bug where the byte offset within each sprite is incremented alongside the sprite index.
//!
//! Pattern fetches for buffered sprites happen on dots 257-320, and each fetched sprite is drawn
//! into `sp_map` for the next scanline. Lower-indexed sprites have priority, so a map slot is only
//! written if it is still empty.

use super::{Engine, PpuState};
use crate::bus::PpuBus;
use crate::lut::{self, SPRITE_PIXEL_POSITIONS};
use crate::num::GetBit;
use bincode::{Decode, Encode};

/// 8 sprites, 4 bytes each
const HARDWARE_BUFFER_LIMIT: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub(super) enum SpritePhase {
    /// Outside of dots 64-255
    Idle,
    /// Checking the Y coordinate of the next OAM entry
    Scanning,
    CopyingTile,
    CopyingAttributes,
    CopyingX,
    /// Buffer full; looking for one more in-range sprite
    OverflowScan,
    OverflowTile,
    OverflowAttributes,
    OverflowX,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub(super) struct SpritePixel {
    pub behind: bool,
    pub zero_hit: bool,
    pub color: u8,
}

impl PpuState {
    fn sprite_in_range(&self) -> bool {
        let y = u16::from(self.sp_latch);
        y <= self.scanline && self.scanline < y + self.sp_height
    }

    pub(super) fn start_sprite_evaluation(&mut self) {
        self.sp_addr = self.regs_oam & 0xF8;
        self.sp_phase = SpritePhase::Scanning;
        self.sp_latch = 0xFF;
    }

    pub(super) fn reset_sprite_evaluation(&mut self) {
        self.sp_buffered = 0;
        self.sp_zero_in_line = false;
        self.sp_index = 0;
        self.sp_phase = SpritePhase::Idle;
    }

    pub(super) fn evaluate_sprites_even(&mut self) {
        self.sp_latch = self.sp_ram[usize::from(self.sp_addr)];
    }

    pub(super) fn evaluate_sprites_odd(&mut self) {
        let buffered = usize::from(self.sp_buffered);

        match self.sp_phase {
            SpritePhase::Idle => {}
            SpritePhase::Scanning => {
                self.sp_index += 1;
                if self.sprite_in_range() {
                    self.sp_addr = self.sp_addr.wrapping_add(1);
                    self.sp_phase = SpritePhase::CopyingTile;
                    self.sp_buffer[buffered] = self.sp_latch;
                } else if self.sp_index == 64 {
                    self.sp_addr = 0;
                    self.sp_phase = SpritePhase::Done;
                } else if self.sp_index == 2 {
                    self.sp_addr = 8;
                } else {
                    self.sp_addr = self.sp_addr.wrapping_add(4);
                }
            }
            SpritePhase::CopyingTile => {
                self.sp_addr = self.sp_addr.wrapping_add(1);
                self.sp_phase = SpritePhase::CopyingAttributes;
                self.sp_buffer[buffered + 1] = self.sp_latch;
            }
            SpritePhase::CopyingAttributes => {
                self.sp_addr = self.sp_addr.wrapping_add(1);
                self.sp_phase = SpritePhase::CopyingX;
                self.sp_buffer[buffered + 2] = self.sp_latch;
            }
            SpritePhase::CopyingX => {
                self.sp_buffer[buffered + 3] = self.sp_latch;
                self.sp_buffered += 4;

                if self.sp_index != 64 {
                    self.sp_phase = if self.sp_buffered < self.sp_limit {
                        SpritePhase::Scanning
                    } else {
                        SpritePhase::OverflowScan
                    };

                    if self.sp_index != 2 {
                        self.sp_addr = self.sp_addr.wrapping_add(1);
                        self.sp_zero_in_line |= self.sp_index == 1;
                    } else {
                        self.sp_addr = 8;
                    }
                } else {
                    self.sp_addr = 0;
                    self.sp_phase = SpritePhase::Done;
                }
            }
            SpritePhase::OverflowScan => {
                if self.sprite_in_range() {
                    self.sp_phase = SpritePhase::OverflowTile;
                    self.sp_addr = self.sp_addr.wrapping_add(1);
                    self.sp_overflow = true;
                } else {
                    // Both the sprite index and the byte offset advance
                    self.sp_addr = (self.sp_addr.wrapping_add(4) & 0xFC)
                        .wrapping_add(self.sp_addr.wrapping_add(1) & 3);
                    if self.sp_addr <= 5 {
                        self.sp_phase = SpritePhase::Done;
                        self.sp_addr &= 0xFC;
                    }
                }
            }
            SpritePhase::OverflowTile => {
                self.sp_addr = self.sp_addr.wrapping_add(1);
                self.sp_phase = SpritePhase::OverflowAttributes;
            }
            SpritePhase::OverflowAttributes => {
                self.sp_addr = self.sp_addr.wrapping_add(1);
                self.sp_phase = SpritePhase::OverflowX;
            }
            SpritePhase::OverflowX => {
                self.sp_phase = SpritePhase::Done;
                self.sp_addr = self.sp_addr.wrapping_add(1);
                if self.sp_addr & 3 == 3 {
                    self.sp_addr = self.sp_addr.wrapping_add(1);
                }
                self.sp_addr &= 0xFC;
            }
            SpritePhase::Done => {
                self.sp_addr = self.sp_addr.wrapping_add(4);
            }
        }
    }

    /// Pattern table address of the row of buffered sprite `index` (a byte offset into the
    /// sprite buffer) that intersects the current scanline.
    pub(super) fn sprite_pattern_address(&self, index: usize) -> u16 {
        let y = u16::from(self.sp_buffer[index]);
        let tile = u16::from(self.sp_buffer[index + 1]);
        let flip_vertical = self.sp_buffer[index + 2].bit(7);

        let row = self.scanline.wrapping_sub(y) ^ if flip_vertical { 0x0F } else { 0x00 };
        let address = if self.sp_height == 16 {
            // 8x16 sprites select the pattern table with tile bit 0
            (tile & 0x01) << 12 | (tile & 0xFE) << 4 | (row & 0x08) << 1
        } else {
            self.sp_base | tile << 4
        };
        address | (row & 0x07)
    }

    /// Draw buffered sprite `index` into the sprite map for the next scanline.
    pub(super) fn load_sprite(&mut self, index: usize, low: u8, high: u8) {
        let attributes = self.sp_buffer[index + 2];
        let x = usize::from(self.sp_buffer[index + 3]);
        let pattern = lut::interleave_sprite_pattern(low, high);
        let positions = &SPRITE_PIXEL_POSITIONS[usize::from(attributes.bit(6))];

        let palette = 0x10 | (attributes & 0x03) << 2;
        let behind = attributes.bit(5);
        let zero_hit = index == 0 && self.sp_zero_in_line;

        if !self.sp_visible {
            self.sp_map.fill(None);
            self.sp_visible = true;
        }

        for (slot, &position) in self.sp_map[x..x + 8].iter_mut().zip(positions) {
            let color = (pattern >> (position * 2)) as u8 & 0x03;
            if slot.is_some() || color == 0 {
                continue;
            }
            *slot = Some(SpritePixel { behind, zero_hit, color: palette | color });
        }

        self.sp_active = self.sp_enabled;
    }
}

impl<B: PpuBus> Engine<'_, B> {
    // Sprites past the 8th only exist with the sprite limit removed. They get no fetch slots of
    // their own, so their patterns are read directly without touching the address bus
    pub(super) fn load_extended_sprites(&mut self) {
        let buffered = usize::from(self.state.sp_buffered);
        if buffered <= HARDWARE_BUFFER_LIMIT {
            return;
        }

        for index in (HARDWARE_BUFFER_LIMIT..buffered).step_by(4) {
            let address = self.state.sprite_pattern_address(index);
            let low = self.bus.read_chr(address);
            let high = self.bus.read_chr(address | 8);
            if low != 0 || high != 0 {
                self.state.load_sprite(index, low, high);
            }
        }
    }
}
