//! CPU-facing registers at `$2000-$2007`.
//!
//! Every access first catches the dot engine up to the CPU so register side effects land on the
//! right dot. Writes also set the I/O latch, which is returned for reads of write-only registers.

use super::{
    DOTS_PER_SCANLINE, PpuState, PpuWriteToggle, VBLANK_END_CLOCKS, catch_up, name_io_addr,
};
use crate::bus::{MASTER_CLOCKS_PER_DOT, PpuBus, PpuRegister};
use crate::graphics;
use crate::lut::FetchLut;
use crate::num::GetBit;

// Time for a register write's value to reach the PPU
const REGISTER_SETUP_CLOCKS: u64 = MASTER_CLOCKS_PER_DOT;
// PPUDATA writes land partway through the next fetch cycle
const DATA_WRITE_SETUP_CLOCKS: u64 = 4 * MASTER_CLOCKS_PER_DOT;

// Scanlines 0-239 relative to the end of the frame
const VISIBLE_LINES_TO_FRAME_END: u64 = 241 * DOTS_PER_SCANLINE * MASTER_CLOCKS_PER_DOT;
const VISIBLE_LINES_CLOCKS: u64 = 240 * DOTS_PER_SCANLINE * MASTER_CLOCKS_PER_DOT;

pub(crate) fn write_register<B: PpuBus>(
    state: &mut PpuState,
    lut: &mut FetchLut,
    bus: &mut B,
    register: PpuRegister,
    value: u8,
) {
    log::trace!(
        "PPU: {register:?} <- {value:02X} (scanline {}, hclk {})",
        state.scanline,
        state.hclk
    );

    match register {
        PpuRegister::PPUCTRL => write_ctrl(state, lut, bus, value),
        PpuRegister::PPUMASK => write_mask(state, lut, bus, value),
        PpuRegister::PPUSTATUS => {}
        PpuRegister::OAMADDR => {
            catch_up(state, lut, bus, REGISTER_SETUP_CLOCKS);
            state.regs_oam = value;
        }
        PpuRegister::OAMDATA => {
            catch_up(state, lut, bus, REGISTER_SETUP_CLOCKS);
            store_oam_data(state, value);
        }
        PpuRegister::PPUSCROLL => write_scroll(state, lut, bus, value),
        PpuRegister::PPUADDR => write_addr(state, lut, bus, value),
        PpuRegister::PPUDATA => write_data(state, lut, bus, value),
    }

    state.io_latch = value;
}

pub(crate) fn read_register<B: PpuBus>(
    state: &mut PpuState,
    lut: &FetchLut,
    bus: &mut B,
    register: PpuRegister,
) -> u8 {
    let value = match register {
        PpuRegister::PPUCTRL
        | PpuRegister::PPUMASK
        | PpuRegister::OAMADDR
        | PpuRegister::PPUSCROLL
        | PpuRegister::PPUADDR => return state.io_latch,
        PpuRegister::PPUSTATUS => read_status(state, lut, bus),
        PpuRegister::OAMDATA => read_oam_data(state, lut, bus),
        PpuRegister::PPUDATA => read_data(state, lut, bus),
    };

    log::trace!("PPU: {register:?} -> {value:02X}");
    state.io_latch = value;
    value
}

/// Copy a 256-byte page into OAM starting at OAMADDR, as written through OAMDATA.
pub(crate) fn oam_dma<B: PpuBus>(
    state: &mut PpuState,
    lut: &FetchLut,
    bus: &mut B,
    data: &[u8; 256],
) {
    catch_up(state, lut, bus, REGISTER_SETUP_CLOCKS);

    log::trace!("PPU: OAM DMA at OAMADDR {:02X}", state.regs_oam);
    for &value in data {
        store_oam_data(state, value);
    }
}

fn write_ctrl<B: PpuBus>(state: &mut PpuState, lut: &FetchLut, bus: &mut B, value: u8) {
    catch_up(state, lut, bus, REGISTER_SETUP_CLOCKS);

    let nmi_was_enabled = state.need_nmi;

    state.scroll_latch = (state.scroll_latch & 0x73FF) | u16::from(value & 0x03) << 10;
    state.vram_addr_inc = if value.bit(2) { 32 } else { 1 };
    state.sp_base = if value.bit(3) { 0x1000 } else { 0x0000 };
    state.bg_pattern_base = if value.bit(4) { 0x1000 } else { 0x0000 };
    state.sp_height = if value.bit(5) { 16 } else { 8 };
    state.need_nmi = value.bit(7);

    state.bg_pattern_base_15 = if value.bit(4) { 0x8000 } else { 0x0000 };
    state.pattern_end =
        if state.sp_base != 0 || state.sp_height == 16 { 0x1FF0 } else { 0x0FF0 };

    // Enabling NMI during vblank triggers one immediately
    if state.need_nmi && !nmi_was_enabled && state.vblank {
        let clock = bus.cpu_clock() + REGISTER_SETUP_CLOCKS;
        if clock < VBLANK_END_CLOCKS {
            log::trace!("PPU: NMI enabled during vblank, NMI at master clock {clock}");
            bus.do_nmi(clock);
        }
    }
}

fn write_mask<B: PpuBus>(state: &mut PpuState, lut: &FetchLut, bus: &mut B, value: u8) {
    catch_up(state, lut, bus, REGISTER_SETUP_CLOCKS);

    let prev_show = (state.bg_show, state.bg_show_edge, state.sp_show, state.sp_show_edge);
    let prev_color = (state.coloring, state.emphasis);
    let was_rendering = state.any_show;

    state.bg_show = value.bit(3);
    state.bg_show_edge = value.bit(1) && state.bg_show;
    state.sp_show = value.bit(4);
    state.sp_show_edge = value.bit(2) && state.sp_show;
    state.any_show = state.bg_show || state.sp_show;
    state.coloring = if value.bit(0) { 0x30 } else { 0x3F };
    state.emphasis = u16::from(value & 0xE0) << 1;

    if prev_show != (state.bg_show, state.bg_show_edge, state.sp_show, state.sp_show_edge) {
        // The change takes effect immediately for the current 8-pixel group
        if state.hclk < 8 || state.hclk >= 248 {
            state.update_enabled_flags_edge();
        } else {
            state.update_enabled_flags();
        }

        if was_rendering && !state.any_show {
            update_scroll_address_line(state, bus);
        }
    }

    if prev_color != (state.coloring, state.emphasis) {
        state.update_output_color();
    }
}

fn write_scroll<B: PpuBus>(state: &mut PpuState, lut: &FetchLut, bus: &mut B, value: u8) {
    catch_up(state, lut, bus, REGISTER_SETUP_CLOCKS);

    match state.write_toggle {
        PpuWriteToggle::First => {
            state.scroll_latch = (state.scroll_latch & 0x7FE0) | u16::from(value >> 3);

            // Realign pixels already in the background pipeline to the new fine X
            let xfine = 8 - (value & 0x07);
            let shift = (i16::from(state.scroll_xfine) - i16::from(xfine)).rem_euclid(16);
            state.bg_pixels.rotate_left(shift as usize);
            state.scroll_xfine = xfine;
        }
        PpuWriteToggle::Second => {
            let value = u16::from(value);
            state.scroll_latch =
                (state.scroll_latch & 0x0C1F) | ((value << 2 | value << 12) & 0x73E0);
        }
    }
    state.write_toggle = state.write_toggle.toggle();
}

fn write_addr<B: PpuBus>(state: &mut PpuState, lut: &FetchLut, bus: &mut B, value: u8) {
    catch_up(state, lut, bus, REGISTER_SETUP_CLOCKS);

    match state.write_toggle {
        PpuWriteToggle::First => {
            state.scroll_latch = (state.scroll_latch & 0x00FF) | u16::from(value & 0x3F) << 8;
        }
        PpuWriteToggle::Second => {
            state.scroll_latch = (state.scroll_latch & 0x7F00) | u16::from(value);
            state.scroll_addr_0_4 = state.scroll_latch & 0x001F;
            state.scroll_addr_5_14 = state.scroll_latch & 0x7FE0;
            update_scroll_address_line(state, bus);
        }
    }
    state.write_toggle = state.write_toggle.toggle();
}

fn write_data<B: PpuBus>(state: &mut PpuState, lut: &mut FetchLut, bus: &mut B, value: u8) {
    catch_up(state, lut, bus, DATA_WRITE_SETUP_CLOCKS);

    let address = (state.scroll_addr_0_4 | state.scroll_addr_5_14) & 0x3FFF;
    increment_vram_addr(state, bus);

    match address {
        0x0000..=0x1FFF => bus.write_chr(address, value),
        0x2000..=0x3EFF => {
            let nametables = state.nametables_mut();
            if nametables.write(address, value) {
                lut.on_nametable_write(state.nametables(), address, value);
            }
        }
        0x3F00..=0x3FFF => write_palette(state, (address & 0x1F) as usize, value),
        0x4000..=0xFFFF => unreachable!("{address} should be <= 0x3FFF after masking"),
    }
}

fn write_palette(state: &mut PpuState, index: usize, value: u8) {
    let value = value & 0x3F;
    let color =
        graphics::palette_color(&state.palette, u16::from(value & state.coloring) | state.emphasis);

    state.palette_ram[index] = value;
    state.output_color[index] = color;
    // Entry 0 of each sprite palette is shared with the background palette
    if index & 0x03 == 0 {
        state.palette_ram[index ^ 0x10] = value;
        state.output_color[index ^ 0x10] = color;
    }
}

fn read_status<B: PpuBus>(state: &mut PpuState, lut: &FetchLut, bus: &mut B) -> u8 {
    catch_up(state, lut, bus, REGISTER_SETUP_CLOCKS);

    // Bits 4-0 come from the I/O latch
    let value = (state.io_latch & 0x1F)
        | u8::from(state.vblank) << 7
        | u8::from(state.sp_zero_hit) << 6
        | u8::from(state.sp_overflow) << 5;

    state.write_toggle = PpuWriteToggle::First;
    state.vblank = false;
    state.vblanking = false;

    value
}

fn read_oam_data<B: PpuBus>(state: &mut PpuState, lut: &FetchLut, bus: &mut B) -> u8 {
    // While rendering visible lines, reads expose the sprite evaluation latch
    if state.any_show {
        let visible_start = bus.next_frame_clock().saturating_sub(VISIBLE_LINES_TO_FRAME_END);
        let in_visible_lines = bus
            .cpu_clock()
            .checked_sub(visible_start)
            .is_some_and(|clock| clock < VISIBLE_LINES_CLOCKS);
        if in_visible_lines {
            catch_up(state, lut, bus, REGISTER_SETUP_CLOCKS);
            return state.sp_latch;
        }
    }

    state.sp_ram[usize::from(state.regs_oam)]
}

fn read_data<B: PpuBus>(state: &mut PpuState, lut: &FetchLut, bus: &mut B) -> u8 {
    catch_up(state, lut, bus, REGISTER_SETUP_CLOCKS);

    let address = (state.scroll_addr_0_4 | state.scroll_addr_5_14) & 0x3FFF;
    increment_vram_addr(state, bus);

    let (value, buffer_address) = if address < 0x3F00 {
        (state.io_buffer, address)
    } else {
        // Palette reads are not buffered; the buffer is filled from the nametable underneath
        let palette_byte = state.palette_ram[usize::from(address & 0x1F)] & state.coloring;
        (palette_byte | (state.io_latch & 0xC0), address - 0x1000)
    };

    state.io_buffer = if buffer_address >= 0x2000 {
        state.nametables().read(buffer_address)
    } else {
        bus.read_chr(buffer_address)
    };

    value
}

// OAMDATA writes during rendering store $FF instead of the written value
fn store_oam_data(state: &mut PpuState, value: u8) {
    let value = if state.rendering_active() {
        0xFF
    } else if state.regs_oam & 0x03 == 0x02 {
        // Bits 2-4 of the attribute byte do not exist
        value & 0xE3
    } else {
        value
    };

    state.sp_ram[usize::from(state.regs_oam)] = value;
    state.regs_oam = state.regs_oam.wrapping_add(1);
}

fn increment_vram_addr<B: PpuBus>(state: &mut PpuState, bus: &mut B) {
    if state.vram_addr_inc == 32 {
        if state.rendering_active() {
            // Row increments during rendering go through the fine Y counter
            state.scroll_clock_y();
        } else {
            state.scroll_addr_5_14 = (state.scroll_addr_5_14 + 0x20) & 0x7FE0;
        }
    } else if state.scroll_addr_0_4 < 0x1F {
        state.scroll_addr_0_4 += 1;
    } else {
        state.scroll_addr_0_4 = 0;
        state.scroll_addr_5_14 = (state.scroll_addr_5_14 + 0x20) & 0x7FE0;
    }

    update_scroll_address_line(state, bus);
}

/// Outside of rendering, the address bus follows v; a mapper watching A12 sees its edges at the
/// CPU's position.
fn update_scroll_address_line<B: PpuBus>(state: &mut PpuState, bus: &mut B) {
    state.name_io_addr = name_io_addr(state.scroll_addr_0_4, state.scroll_addr_5_14);

    if bus.monitors_a12() {
        let a12 = state.scroll_addr_5_14 & 0x3000 == 0x1000;
        if !state.a12_state && a12 {
            bus.a12_signaled(bus.cpu_clock());
        }
        state.a12_state = a12;
    }
}
