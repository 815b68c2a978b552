//! RP2C02 (NTSC PPU) dot engine.
//!
//! The PPU steps through 262 scanlines of 341 dots. Visible scanlines 0-239 fetch and render
//! background tiles and sprites, scanline 240 is idle, 241-260 are vertical blanking, and the
//! pre-render scanline 261 repeats the fetch pattern without drawing to prepare scanline 0.
//!
//! Dot positions are tracked in `hclk`, which uses an extended range so that the irregular parts
//! of the frame are single dispatch targets:
//! * 0-340: a normal rendering scanline
//! * 341-659: the first 320 dots of the pre-render scanline, stepped 2 dots at a time since only
//!   the address bus is observable there; dot 659 continues at 320 of the same scanline
//! * 681/682/684: the three steps of vertical blank entry
//! * 685: power-on wait
//!
//! The engine only runs when the CPU side needs it to catch up (a register access, the end of the
//! frame, or every instruction when a mapper monitors A12), and always yields at vblank entry.

mod background;
mod registers;
mod sprites;

#[cfg(test)]
mod tests;

pub(crate) use registers::{oam_dma, read_register, write_register};

use crate::bus::{MASTER_CLOCKS_PER_DOT, PpuBus};
use crate::graphics::{self, Color, SCREEN_HEIGHT, SCREEN_WIDTH};
use crate::lut::FetchLut;
use crate::memory::{Mirroring, Nametables};
use crate::num::GetBit;
use bincode::{Decode, Encode};
use rp2c02_config::{NesPalette, PpuConfig};
use sprites::{SpritePhase, SpritePixel};
use std::ops::ControlFlow;

const DOTS_PER_SCANLINE: u64 = 341;
const SCANLINES_PER_FRAME: u64 = 262;

/// Length of a full NTSC frame in master clocks.
pub const FRAME_CLOCKS: u64 = SCANLINES_PER_FRAME * DOTS_PER_SCANLINE * MASTER_CLOCKS_PER_DOT;
// Odd frames with rendering enabled skip one dot on the pre-render scanline
const SHORT_FRAME_CLOCKS: u64 = FRAME_CLOCKS - MASTER_CLOCKS_PER_DOT;
// Frames begin with the 20 vblank scanlines that follow NMI
const VBLANK_END_CLOCKS: u64 = 20 * DOTS_PER_SCANLINE * MASTER_CLOCKS_PER_DOT;
const BOOT_FRAME_CLOCKS: u64 =
    240 * DOTS_PER_SCANLINE * MASTER_CLOCKS_PER_DOT + 312 * MASTER_CLOCKS_PER_DOT;
const NEVER: u64 = u64::MAX;

pub const PRE_RENDER_SCANLINE: u16 = 261;
const POST_RENDER_SCANLINE: u16 = 240;
const LAST_VISIBLE_DOT: u16 = 255;
const FIRST_EVALUATION_DOT: u16 = 64;
const Y_INCREMENT_DOT: u16 = 251;
const VERTICAL_RELOAD_HCLK: u16 = 645;
// Pre-render dot 256 in the extended range; sprite fetch slots start here
const PRE_RENDER_SPRITE_FETCH_HCLK: u16 = 597;

const PRE_RENDER_HCLK: u16 = 341;
const PRE_RENDER_WRAP_HCLK: u16 = 659;
const VBLANK_SET_HCLK: u16 = 681;
const VBLANK_COMMIT_HCLK: u16 = 682;
const VBLANK_NMI_HCLK: u16 = 684;
const BOOT_HCLK: u16 = 685;

// Sprites can start at X=255 and extend 7 pixels past the right edge
const SPRITE_MAP_LEN: usize = 264;
const SPRITE_BUFFER_LEN: usize = 32 * 4;

const BLACK_NES_COLOR: u16 = 0x0F;

// Palette RAM contents at power-on, per blargg's power_up_palette test
const POWER_ON_PALETTE: [u8; 32] = [
    0x09, 0x01, 0x00, 0x01, 0x00, 0x02, 0x02, 0x0D, 0x08, 0x10, 0x08, 0x24, 0x00, 0x00, 0x04, 0x2C,
    0x09, 0x01, 0x34, 0x03, 0x00, 0x04, 0x00, 0x14, 0x08, 0x3A, 0x00, 0x02, 0x00, 0x20, 0x2C, 0x08,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
enum PpuWriteToggle {
    First,
    Second,
}

impl PpuWriteToggle {
    fn toggle(self) -> Self {
        match self {
            Self::First => Self::Second,
            Self::Second => Self::First,
        }
    }
}

#[inline]
fn name_io_addr(scroll_addr_0_4: u16, scroll_addr_5_14: u16) -> u16 {
    (scroll_addr_0_4 | scroll_addr_5_14) & 0x0FFF | 0x2000
}

fn sprite_buffer_limit(config: &PpuConfig) -> u8 {
    let sprites: u8 = if config.remove_sprite_limit { 32 } else { 8 };
    sprites * 4
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct PpuState {
    // Clock position
    scanline: u16,
    hclk: u16,
    vclk: u64,
    // Within a run: dot deadline relative to vclk. Between runs: the master clock the PPU has
    // caught up to, or NEVER while parked in vblank
    hclk_target: u64,
    odd_frame: bool,
    // CPU interface
    io_latch: u8,
    io_buffer: u8,
    write_toggle: PpuWriteToggle,
    regs_oam: u8,
    vram_addr_inc: u16,
    need_nmi: bool,
    vblank: bool,
    vblanking: bool,
    // Palette
    palette: NesPalette,
    palette_ram: [u8; 32],
    output_color: [Color; 32],
    coloring: u8,
    emphasis: u16,
    // Scroll registers: v is split into coarse X (bits 0-4) and everything else (bits 5-14)
    scroll_latch: u16,
    // 8 - fine X, the offset in bg_pixels where newly fetched tiles are written
    scroll_xfine: u8,
    scroll_addr_0_4: u16,
    scroll_addr_5_14: u16,
    name_io_addr: u16,
    // Address bus and background pipeline
    any_show: bool,
    io_addr: u16,
    io_pattern: u16,
    a12_state: bool,
    bg_enabled: bool,
    bg_show: bool,
    bg_show_edge: bool,
    bg_pixels: [u8; 16],
    bg_pattern_base: u16,
    bg_pattern_base_15: u16,
    bg_pattern: u16,
    bg_pattern_lut: u8,
    bg_attr_key: u16,
    // Sprite pipeline
    sp_enabled: bool,
    sp_active: bool,
    sp_show: bool,
    sp_show_edge: bool,
    sp_base: u16,
    sp_height: u16,
    pattern_end: u16,
    sp_phase: SpritePhase,
    sp_ram: [u8; 256],
    sp_index: u8,
    sp_addr: u8,
    sp_latch: u8,
    sp_limit: u8,
    sp_buffer: [u8; SPRITE_BUFFER_LEN],
    sp_buffered: u8,
    sp_visible: bool,
    sp_map: [Option<SpritePixel>; SPRITE_MAP_LEN],
    sp_zero_in_line: bool,
    sp_overflow: bool,
    sp_zero_hit: bool,
    // Memory and output
    nametables: Nametables,
    frame_buffer: Vec<Color>,
}

impl PpuState {
    #[must_use]
    pub fn new(config: &PpuConfig) -> Self {
        let mut state = Self {
            scanline: POST_RENDER_SCANLINE,
            hclk: BOOT_HCLK,
            vclk: 0,
            hclk_target: NEVER,
            odd_frame: false,
            io_latch: 0,
            io_buffer: 0xE8,
            write_toggle: PpuWriteToggle::First,
            regs_oam: 0,
            vram_addr_inc: 1,
            need_nmi: false,
            vblank: false,
            vblanking: false,
            palette: config.palette,
            palette_ram: POWER_ON_PALETTE,
            output_color: [Color::BLACK; 32],
            coloring: 0x3F,
            emphasis: 0,
            scroll_latch: 0,
            scroll_xfine: 8,
            scroll_addr_0_4: 0,
            scroll_addr_5_14: 0,
            name_io_addr: 0x2000,
            any_show: false,
            io_addr: 0,
            io_pattern: 0,
            a12_state: false,
            bg_enabled: false,
            bg_show: false,
            bg_show_edge: false,
            bg_pixels: [0; 16],
            bg_pattern_base: 0,
            bg_pattern_base_15: 0,
            bg_pattern: 0,
            bg_pattern_lut: 0,
            bg_attr_key: 0,
            sp_enabled: false,
            sp_active: false,
            sp_show: false,
            sp_show_edge: false,
            sp_base: 0,
            sp_height: 8,
            pattern_end: 0x0FF0,
            sp_phase: SpritePhase::Idle,
            sp_ram: [0xFF; 256],
            sp_index: 0,
            sp_addr: 0,
            sp_latch: 0,
            sp_limit: sprite_buffer_limit(config),
            sp_buffer: [0; SPRITE_BUFFER_LEN],
            sp_buffered: 0,
            sp_visible: false,
            sp_map: [None; SPRITE_MAP_LEN],
            sp_zero_in_line: false,
            sp_overflow: false,
            sp_zero_hit: false,
            nametables: Nametables::new(Mirroring::default()),
            frame_buffer: Vec::with_capacity(SCREEN_WIDTH * SCREEN_HEIGHT),
        };
        state.update_output_color();
        state
    }

    /// Power-cycle the chip registers. OAM, palette and nametable RAM keep their contents.
    pub(crate) fn reset(&mut self, config: &PpuConfig) {
        let nametables = self.nametables.clone();
        let sp_ram = self.sp_ram;
        let palette_ram = self.palette_ram;

        *self = Self::new(config);
        self.nametables = nametables;
        self.sp_ram = sp_ram;
        self.palette_ram = palette_ram;
        self.update_output_color();
    }

    pub(crate) fn apply_config(&mut self, config: &PpuConfig) {
        self.sp_limit = sprite_buffer_limit(config);
        if self.palette != config.palette {
            self.palette = config.palette;
            self.update_output_color();
        }
    }

    fn update_output_color(&mut self) {
        for (color, &entry) in self.output_color.iter_mut().zip(&self.palette_ram) {
            *color = graphics::palette_color(&self.palette, u16::from(entry & self.coloring) | self.emphasis);
        }
    }

    fn update_enabled_flags(&mut self) {
        self.bg_enabled = self.bg_show;
        self.sp_enabled = self.sp_show;
        self.sp_active = self.sp_enabled && self.sp_visible;
    }

    // Variant latched for the leftmost 8 pixels, which have their own mask bits
    fn update_enabled_flags_edge(&mut self) {
        self.bg_enabled = self.bg_show_edge;
        self.sp_enabled = self.sp_show_edge;
        self.sp_active = self.sp_enabled && self.sp_visible;
    }

    fn rendering_active(&self) -> bool {
        self.any_show && self.scanline != POST_RENDER_SCANLINE
    }

    pub(crate) fn nametables(&self) -> &Nametables {
        &self.nametables
    }

    pub(crate) fn nametables_mut(&mut self) -> &mut Nametables {
        &mut self.nametables
    }

    #[must_use]
    pub fn vblank(&self) -> bool {
        self.vblank
    }

    #[must_use]
    pub fn sprite_zero_hit(&self) -> bool {
        self.sp_zero_hit
    }

    #[must_use]
    pub fn sprite_overflow(&self) -> bool {
        self.sp_overflow
    }

    #[must_use]
    pub fn scanline(&self) -> u16 {
        self.scanline
    }

    /// Raw extended-range dot position; see the module docs.
    #[must_use]
    pub fn hclk(&self) -> u16 {
        self.hclk
    }

    /// Dot within the current scanline. Reads 0 while waiting out vblank or the power-on delay.
    #[must_use]
    pub fn dot(&self) -> u16 {
        match self.hclk {
            0..PRE_RENDER_HCLK => self.hclk,
            PRE_RENDER_HCLK..=PRE_RENDER_WRAP_HCLK => self.hclk - PRE_RENDER_HCLK,
            _ => 0,
        }
    }

    #[must_use]
    pub fn frame_buffer(&self) -> &[Color] {
        &self.frame_buffer
    }

    #[must_use]
    pub fn output_color(&self, index: usize) -> Color {
        self.output_color[index & 0x1F]
    }

    #[must_use]
    pub fn oam(&self) -> &[u8; 256] {
        &self.sp_ram
    }
}

/// Mutable view of everything a run touches. The capability check for A12 monitoring is made
/// once when the view is created.
struct Engine<'a, B> {
    state: &'a mut PpuState,
    lut: &'a FetchLut,
    bus: &'a mut B,
    monitor_a12: bool,
}

impl<'a, B: PpuBus> Engine<'a, B> {
    fn new(state: &'a mut PpuState, lut: &'a FetchLut, bus: &'a mut B) -> Self {
        let monitor_a12 = state.any_show && bus.monitors_a12();
        Self { state, lut, bus, monitor_a12 }
    }

    fn run(&mut self) {
        self.state.name_io_addr =
            name_io_addr(self.state.scroll_addr_0_4, self.state.scroll_addr_5_14);

        while self.state.hclk_target > u64::from(self.state.hclk) {
            if self.step().is_break() {
                return;
            }
        }

        self.state.hclk_target =
            (self.state.vclk + u64::from(self.state.hclk)) * MASTER_CLOCKS_PER_DOT;
    }

    // Execute the dot (or 2-dot group) at the current hclk. Breaks at vblank entry and boot
    fn step(&mut self) -> ControlFlow<()> {
        let hclk = self.state.hclk;
        let rendering = self.state.any_show;

        match hclk {
            0..=LAST_VISIBLE_DOT => {
                if rendering {
                    self.tile_cycle(hclk);
                } else {
                    self.state.backdrop_pixel();
                }
                self.state.hclk += 1;
            }
            256 => {
                if rendering {
                    self.open_name();
                    self.state.sp_latch = 0xFF;
                }
                self.state.hclk += 1;
            }
            257 => {
                if rendering {
                    self.state.scroll_reset_x();
                }
                self.state.sp_visible = false;
                self.state.sp_active = false;
                self.state.hclk += 1;
            }
            258..=319 => self.sprite_fetch_cycle(hclk, rendering),
            320 => {
                if rendering {
                    self.load_extended_sprites();
                    self.open_name();
                    self.state.sp_latch = self.state.sp_ram[0];
                }
                self.state.reset_sprite_evaluation();
                self.state.hclk += 1;
            }
            321..=336 => {
                if rendering {
                    self.prefetch_cycle(hclk);
                }
                self.state.hclk += 1;
            }
            337 => {
                if rendering {
                    self.state.update_enabled_flags_edge();
                    if self.state.scanline == PRE_RENDER_SCANLINE && self.state.odd_frame {
                        self.bus.set_next_frame_clock(SHORT_FRAME_CLOCKS);
                    }
                }
                self.state.hclk += 1;
            }
            338 => self.end_scanline(rendering),
            PRE_RENDER_HCLK..PRE_RENDER_WRAP_HCLK => self.pre_render_cycle(hclk, rendering),
            PRE_RENDER_WRAP_HCLK => {
                if rendering {
                    self.open_pattern(self.state.io_addr | 8);
                }
                self.state.hclk = 320;
                self.state.vclk += DOTS_PER_SCANLINE;
                self.state.hclk_target -= DOTS_PER_SCANLINE;
            }
            VBLANK_SET_HCLK => {
                self.state.vblanking = true;
                self.state.hclk = VBLANK_COMMIT_HCLK;
            }
            VBLANK_COMMIT_HCLK => {
                // A PPUSTATUS read between the previous step and this one suppresses the flag
                self.state.vblank |= self.state.vblanking;
                self.state.vblanking = false;
                self.state.sp_visible = false;
                self.state.sp_active = false;
                self.state.hclk = VBLANK_NMI_HCLK;
            }
            VBLANK_NMI_HCLK => {
                self.state.vblank |= self.state.vblanking;
                self.state.vblanking = false;
                self.state.hclk = PRE_RENDER_HCLK;
                self.state.hclk_target = NEVER;
                if self.state.need_nmi && self.state.vblank {
                    let clock = self.bus.next_frame_clock();
                    log::trace!("PPU: NMI at master clock {clock}");
                    self.bus.do_nmi(clock);
                }
                return ControlFlow::Break(());
            }
            BOOT_HCLK => {
                self.state.vblank = true;
                self.state.hclk = PRE_RENDER_HCLK;
                self.state.hclk_target = NEVER;
                return ControlFlow::Break(());
            }
            _ => unreachable!("hclk is never {hclk}"),
        }

        ControlFlow::Continue(())
    }

    // Dots 0-255: one micro-op of the 8-dot background fetch, sprite evaluation from dot 64 on,
    // and one output pixel
    fn tile_cycle(&mut self, hclk: u16) {
        let evaluating = hclk >= FIRST_EVALUATION_DOT;

        match hclk % 8 {
            0 => {
                if hclk == FIRST_EVALUATION_DOT {
                    self.state.start_sprite_evaluation();
                }
                self.state.load_tiles();
                if evaluating {
                    self.state.evaluate_sprites_even();
                }
                self.open_name();
            }
            1 => {
                self.fetch_name();
                if evaluating {
                    self.state.evaluate_sprites_odd();
                }
            }
            2 => {
                if evaluating {
                    self.state.evaluate_sprites_even();
                }
                self.open_attr();
            }
            3 => {
                self.fetch_attr();
                if evaluating {
                    self.state.evaluate_sprites_odd();
                }
                if hclk == Y_INCREMENT_DOT {
                    self.state.scroll_clock_y();
                }
                self.state.scroll_clock_x();
            }
            4 => {
                if evaluating {
                    self.state.evaluate_sprites_even();
                }
                self.open_pattern(self.state.io_pattern);
            }
            5 => {
                self.fetch_bg_pattern_0();
                if evaluating {
                    self.state.evaluate_sprites_odd();
                }
            }
            6 => {
                if evaluating {
                    self.state.evaluate_sprites_even();
                }
                self.open_pattern(self.state.io_pattern | 8);
            }
            7 => {
                self.fetch_bg_pattern_1();
                if evaluating {
                    self.state.evaluate_sprites_odd();
                }
            }
            _ => unreachable!("value % 8 is always < 8"),
        }

        self.state.render_pixel();

        if hclk % 8 == 7 && hclk != LAST_VISIBLE_DOT {
            self.state.update_enabled_flags();
        }
    }

    // Dots 258-319: 8 slots of sprite pattern fetches, with a garbage nametable/attribute fetch
    // between slots. The address-only dot of each pair is skipped
    fn sprite_fetch_cycle(&mut self, hclk: u16, rendering: bool) {
        let buffered = usize::from(self.state.sp_buffered);

        match (hclk - 256) % 8 {
            0 => {
                if rendering {
                    self.open_name();
                }
                self.state.hclk += 2;
            }
            2 => {
                if rendering {
                    self.open_attr();
                }
                self.state.hclk += 2;
            }
            4 => {
                if rendering {
                    let index = usize::from(hclk - 260) / 2;
                    let address = if index >= buffered {
                        self.state.pattern_end
                    } else {
                        self.state.sprite_pattern_address(index)
                    };
                    self.open_pattern(address);

                    if hclk == 316 && self.state.scanline == 238 {
                        self.state.regs_oam = 0;
                    }
                }
                self.state.hclk += 1;
            }
            5 => {
                if rendering && usize::from(hclk - 261) / 2 < buffered {
                    self.state.io_pattern = self.read_chr(self.state.io_addr).into();
                }
                self.state.hclk += 1;
            }
            6 => {
                if rendering {
                    self.open_pattern(self.state.io_addr | 8);
                }
                self.state.hclk += 1;
            }
            7 => {
                let index = usize::from(hclk - 263) / 2;
                if rendering && index < buffered {
                    let low = self.state.io_pattern as u8;
                    let high = self.read_chr(self.state.io_addr);
                    if low != 0 || high != 0 {
                        self.state.load_sprite(index, low, high);
                    }
                }
                self.state.hclk += 1;
            }
            _ => unreachable!("odd sprite fetch dots are never dispatched: {hclk}"),
        }
    }

    // Dots 321-336: the first two tiles of the next scanline
    fn prefetch_cycle(&mut self, hclk: u16) {
        match (hclk - 320) % 8 {
            0 => {
                if hclk == 328 {
                    self.state.preload_tiles();
                }
                self.open_name();
            }
            1 => self.fetch_name(),
            2 => self.open_attr(),
            3 => {
                self.fetch_attr();
                self.state.scroll_clock_x();
            }
            4 => self.open_pattern(self.state.io_pattern),
            5 => self.fetch_bg_pattern_0(),
            6 => self.open_pattern(self.state.io_pattern | 8),
            7 => self.fetch_bg_pattern_1(),
            _ => unreachable!("value % 8 is always < 8"),
        }
    }

    // Pre-render dots 0-318, 2 at a time. Only addresses matter here: they drive A12
    fn pre_render_cycle(&mut self, hclk: u16, rendering: bool) {
        debug_assert!(hclk % 2 == 1, "pre-render hclk should be odd: {hclk}");

        if hclk == PRE_RENDER_HCLK {
            self.state.sp_overflow = false;
            self.state.sp_zero_hit = false;
            self.state.vblanking = false;
            self.state.vblank = false;
            self.state.scanline = PRE_RENDER_SCANLINE;
        }

        if rendering {
            match (hclk - PRE_RENDER_HCLK) % 8 {
                0 => {
                    if hclk == VERTICAL_RELOAD_HCLK {
                        self.state.scroll_reset_y();
                    }
                    self.open_name();
                }
                2 => self.open_attr(),
                4 => {
                    let address = if hclk < PRE_RENDER_SPRITE_FETCH_HCLK {
                        self.state.bg_pattern_base
                    } else {
                        self.state.pattern_end
                    };
                    self.open_pattern(address);
                }
                6 => self.open_pattern(self.state.io_addr | 8),
                _ => unreachable!("pre-render hclk is always odd"),
            }
        }

        self.state.hclk += 2;
    }

    fn end_scanline(&mut self, rendering: bool) {
        if rendering {
            self.open_name();
        }

        self.state.scanline =
            if self.state.scanline == PRE_RENDER_SCANLINE { 0 } else { self.state.scanline + 1 };
        if self.state.scanline == POST_RENDER_SCANLINE {
            self.state.hclk = VBLANK_SET_HCLK;
            return;
        }

        let line_len = if rendering {
            if self.state.scanline != 0 || !self.state.odd_frame {
                DOTS_PER_SCANLINE
            } else {
                DOTS_PER_SCANLINE - 1
            }
        } else {
            self.state.update_enabled_flags_edge();
            DOTS_PER_SCANLINE
        };

        self.state.hclk = 0;
        self.state.vclk += line_len;
        self.state.hclk_target = self.state.hclk_target.saturating_sub(line_len);
    }

    // Drive the address bus, notifying the mapper of A12 rising edges
    #[inline]
    fn set_io_addr(&mut self, address: u16) {
        self.state.io_addr = address;

        if self.monitor_a12 {
            let a12 = address.bit(12);
            if !self.state.a12_state && a12 {
                let clock =
                    (self.state.vclk + u64::from(self.state.hclk)) * MASTER_CLOCKS_PER_DOT;
                self.bus.a12_signaled(clock);
            }
            self.state.a12_state = a12;
        }
    }

    #[inline]
    fn read_chr(&mut self, address: u16) -> u8 {
        self.bus.read_chr(address & 0x1FFF)
    }
}

impl PpuState {
    // Forced blank: the backdrop is palette entry 0 unless v points into palette RAM, in which
    // case that entry is shown
    fn backdrop_pixel(&mut self) {
        let index = if self.scroll_addr_5_14 & 0x3F00 == 0x3F00 { self.scroll_addr_0_4 } else { 0 };
        self.bg_pixels[usize::from(self.hclk % 8)] = 0;
        self.frame_buffer.push(self.output_color[usize::from(index)]);
    }

    fn render_pixel(&mut self) {
        let x = usize::from(self.hclk);
        let mut pixel = if self.bg_enabled { self.bg_pixels[x % 8] } else { 0 };

        if let Some(sprite) = self.sp_map[x].filter(|_| self.sp_active) {
            if pixel % 4 == 0 {
                pixel = sprite.color;
            } else {
                if sprite.zero_hit && self.hclk != LAST_VISIBLE_DOT {
                    self.sp_zero_hit = true;
                }
                if !sprite.behind {
                    pixel = sprite.color;
                }
            }
        }

        self.frame_buffer.push(self.output_color[usize::from(pixel)]);
    }
}

/// Run the engine until the CPU master clock `elapsed`, or until a vblank/boot boundary.
pub(crate) fn sync<B: PpuBus>(state: &mut PpuState, lut: &FetchLut, bus: &mut B, elapsed: u64) {
    if state.hclk_target >= elapsed {
        return;
    }

    state.hclk_target = (elapsed / MASTER_CLOCKS_PER_DOT).saturating_sub(state.vclk);
    Engine::new(state, lut, bus).run();
}

/// Catch up to the CPU's current position plus `data_setup` master clocks.
pub(crate) fn catch_up<B: PpuBus>(
    state: &mut PpuState,
    lut: &FetchLut,
    bus: &mut B,
    data_setup: u64,
) {
    let elapsed = bus.cpu_clock() + data_setup;
    sync(state, lut, bus, elapsed);
}

pub(crate) fn begin_frame<B: PpuBus>(state: &mut PpuState, bus: &mut B) {
    state.frame_buffer.clear();
    state.odd_frame = !state.odd_frame;

    let (vclk, hclk_target, frame_clock) = if state.hclk == PRE_RENDER_HCLK {
        (
            VBLANK_END_CLOCKS / MASTER_CLOCKS_PER_DOT - u64::from(PRE_RENDER_HCLK),
            VBLANK_END_CLOCKS,
            FRAME_CLOCKS,
        )
    } else {
        (
            BOOT_FRAME_CLOCKS / MASTER_CLOCKS_PER_DOT - u64::from(BOOT_HCLK),
            BOOT_FRAME_CLOCKS,
            BOOT_FRAME_CLOCKS,
        )
    };
    state.vclk = vclk;
    state.hclk_target = hclk_target;
    bus.set_next_frame_clock(frame_clock);

    log::debug!("PPU: begin frame (odd={}, frame clocks={frame_clock})", state.odd_frame);
}

pub(crate) fn end_frame<B: PpuBus>(state: &mut PpuState, lut: &FetchLut, bus: &mut B) {
    if state.hclk_target != NEVER {
        state.hclk_target = NEVER;
        Engine::new(state, lut, bus).run();
    }

    let black = graphics::palette_color(&state.palette, BLACK_NES_COLOR);
    state.frame_buffer.resize(SCREEN_WIDTH * SCREEN_HEIGHT, black);

    log::debug!("PPU: end frame (vblank={}, zero hit={})", state.vblank, state.sp_zero_hit);
}
