use super::*;
use crate::bus::PpuRegister;
use test_log::test;

const DOTS_PER_FRAME: u64 = SCANLINES_PER_FRAME * DOTS_PER_SCANLINE;
const REGISTER_SETUP: u64 = MASTER_CLOCKS_PER_DOT;

struct TestBus {
    chr: Vec<u8>,
    cpu_clock: u64,
    next_frame_clock: u64,
    monitor_a12: bool,
    nmis: Vec<u64>,
    a12_rises: Vec<u64>,
}

impl TestBus {
    fn new() -> Self {
        Self {
            chr: vec![0; 0x2000],
            cpu_clock: 0,
            next_frame_clock: 0,
            monitor_a12: false,
            nmis: vec![],
            a12_rises: vec![],
        }
    }
}

impl PpuBus for TestBus {
    fn read_chr(&mut self, address: u16) -> u8 {
        self.chr[usize::from(address)]
    }

    fn write_chr(&mut self, address: u16, value: u8) {
        self.chr[usize::from(address)] = value;
    }

    fn cpu_clock(&self) -> u64 {
        self.cpu_clock
    }

    fn next_frame_clock(&self) -> u64 {
        self.next_frame_clock
    }

    fn set_next_frame_clock(&mut self, clock: u64) {
        self.next_frame_clock = clock;
    }

    fn do_nmi(&mut self, clock: u64) {
        self.nmis.push(clock);
    }

    fn monitors_a12(&self) -> bool {
        self.monitor_a12
    }

    fn a12_signaled(&mut self, clock: u64) {
        self.a12_rises.push(clock);
    }
}

struct Harness {
    state: PpuState,
    lut: FetchLut,
    bus: TestBus,
}

impl Harness {
    fn new() -> Self {
        Self::with_config(&PpuConfig::default())
    }

    fn with_config(config: &PpuConfig) -> Self {
        let state = PpuState::new(config);
        let lut = FetchLut::new(state.nametables());
        Self { state, lut, bus: TestBus::new() }
    }

    // Power on and run the boot frame, leaving the PPU parked in vblank
    fn booted() -> Self {
        let mut harness = Self::new();
        harness.run_frame();
        harness
    }

    fn write(&mut self, register: PpuRegister, value: u8) {
        write_register(&mut self.state, &mut self.lut, &mut self.bus, register, value);
    }

    fn read(&mut self, register: PpuRegister) -> u8 {
        read_register(&mut self.state, &self.lut, &mut self.bus, register)
    }

    fn set_vram_addr(&mut self, address: u16) {
        self.write(PpuRegister::PPUADDR, (address >> 8) as u8);
        self.write(PpuRegister::PPUADDR, address as u8);
    }

    fn write_vram(&mut self, address: u16, values: &[u8]) {
        self.set_vram_addr(address);
        for &value in values {
            self.write(PpuRegister::PPUDATA, value);
        }
    }

    fn write_oam(&mut self, sprites: &[[u8; 4]]) {
        let mut page = [0xFF; 256];
        for (chunk, sprite) in page.chunks_exact_mut(4).zip(sprites) {
            chunk.copy_from_slice(sprite);
        }
        self.write(PpuRegister::OAMADDR, 0);
        oam_dma(&mut self.state, &self.lut, &mut self.bus, &page);
    }

    fn begin_frame(&mut self) {
        begin_frame(&mut self.state, &mut self.bus);
    }

    fn sync(&mut self, clock: u64) {
        sync(&mut self.state, &self.lut, &mut self.bus, clock);
    }

    fn end_frame(&mut self) {
        end_frame(&mut self.state, &self.lut, &mut self.bus);
    }

    fn run_frame(&mut self) {
        self.begin_frame();
        self.end_frame();
    }

    fn save_state(&self) -> Vec<u8> {
        bincode::encode_to_vec(&self.state, bincode::config::standard())
            .expect("PPU state should always encode")
    }
}

// Pattern data, nametable contents, scroll and sprites for a busy rendered frame
fn scene() -> Harness {
    let mut harness = Harness::booted();

    for (i, byte) in harness.bus.chr.iter_mut().enumerate() {
        *byte = (i * 37 + (i >> 3)) as u8;
    }

    let tiles: Vec<_> = (0..0x3C0).map(|i: u16| (i * 7) as u8).collect();
    harness.write_vram(0x2000, &tiles);
    let attributes: Vec<_> = (0..0x40).map(|i: u8| i.wrapping_mul(0x1B)).collect();
    harness.write_vram(0x23C0, &attributes);
    harness.write_vram(0x3F00, &(0..0x20).map(|i: u8| i * 2 + 1).collect::<Vec<_>>());

    let sprites: Vec<_> = (0..24).map(|i: u8| [i * 9 + 3, i, i & 0xE3, i * 11]).collect();
    harness.write_oam(&sprites);

    harness.write(PpuRegister::PPUSCROLL, 13);
    harness.write(PpuRegister::PPUSCROLL, 37);
    harness.write(PpuRegister::PPUCTRL, 0x08);
    harness.write(PpuRegister::PPUMASK, 0x1E);
    harness
}

#[test]
fn boot_frame() {
    let mut harness = Harness::new();
    harness.run_frame();

    assert!(harness.state.vblank());
    assert_eq!(harness.bus.next_frame_clock, BOOT_FRAME_CLOCKS);
    assert_eq!(harness.state.hclk(), PRE_RENDER_HCLK);

    // Nothing is rendered before the boot wait ends
    let black = graphics::palette_color(&harness.state.palette, BLACK_NES_COLOR);
    assert_eq!(harness.state.frame_buffer().len(), SCREEN_WIDTH * SCREEN_HEIGHT);
    assert!(harness.state.frame_buffer().iter().all(|&color| color == black));
}

// Master clock positions (relative to the first frame) at which the vblank flag rises
fn vblank_rises(harness: &mut Harness, frames: usize) -> Vec<u64> {
    let mut rises = vec![];
    let mut frame_start = 0;

    for _ in 0..frames {
        harness.begin_frame();
        let mut prev_vblank = harness.state.vblank();
        for clock in (0..FRAME_CLOCKS + 16).step_by(MASTER_CLOCKS_PER_DOT as usize) {
            harness.sync(clock);
            if harness.state.vblank() && !prev_vblank {
                rises.push(frame_start + clock);
            }
            prev_vblank = harness.state.vblank();
        }
        harness.end_frame();
        frame_start += harness.bus.next_frame_clock;
    }

    rises
}

#[test]
fn odd_frames_skip_a_dot_while_rendering() {
    let mut harness = Harness::booted();
    harness.write(PpuRegister::PPUMASK, 0x08);

    let rises = vblank_rises(&mut harness, 5);
    let frame_dots: Vec<_> =
        rises.windows(2).map(|w| (w[1] - w[0]) / MASTER_CLOCKS_PER_DOT).collect();
    assert_eq!(
        frame_dots,
        vec![DOTS_PER_FRAME - 1, DOTS_PER_FRAME, DOTS_PER_FRAME - 1, DOTS_PER_FRAME]
    );
}

#[test]
fn disabled_frames_are_full_length() {
    let mut harness = Harness::booted();

    let rises = vblank_rises(&mut harness, 5);
    assert_eq!(rises.len(), 5);
    assert!(rises.windows(2).all(|w| w[1] - w[0] == FRAME_CLOCKS));
}

#[test]
fn disabled_frame_is_backdrop() {
    let mut harness = Harness::booted();
    harness.bus.monitor_a12 = true;
    harness.run_frame();

    let backdrop = harness.state.output_color(0);
    assert_ne!(backdrop, graphics::palette_color(&harness.state.palette, BLACK_NES_COLOR));
    assert_eq!(harness.state.frame_buffer().len(), SCREEN_WIDTH * SCREEN_HEIGHT);
    assert!(harness.state.frame_buffer().iter().all(|&color| color == backdrop));
    assert!(harness.bus.a12_rises.is_empty());
}

#[test]
fn forced_blank_shows_palette_entry_under_vram_address() {
    let mut harness = Harness::booted();
    harness.set_vram_addr(0x3F05);
    harness.run_frame();

    let entry = harness.state.output_color(5);
    assert_ne!(entry, harness.state.output_color(0));
    assert!(harness.state.frame_buffer().iter().all(|&color| color == entry));

    harness.set_vram_addr(0x2000);
    harness.run_frame();

    let backdrop = harness.state.output_color(0);
    assert!(harness.state.frame_buffer().iter().all(|&color| color == backdrop));
}

#[test]
fn scroll_clock_x_wraps_nametable() {
    let mut state = PpuState::new(&PpuConfig::default());
    state.scroll_addr_0_4 = 5;
    state.scroll_addr_5_14 = 0x0800 | 0x0120;
    state.name_io_addr = name_io_addr(state.scroll_addr_0_4, state.scroll_addr_5_14);

    for i in 1..=32 {
        state.scroll_clock_x();
        assert_eq!(
            state.name_io_addr,
            name_io_addr(state.scroll_addr_0_4, state.scroll_addr_5_14),
            "after {i} increments"
        );
    }

    assert_eq!(state.scroll_addr_0_4, 5);
    assert_eq!(state.scroll_addr_5_14, 0x0C00 | 0x0120);
}

#[test]
fn scroll_clock_y_wraps_coarse_y() {
    let mut state = PpuState::new(&PpuConfig::default());

    // Fine Y below 7 only increments fine Y
    state.scroll_addr_5_14 = 0x2000 | 4 << 5;
    state.scroll_clock_y();
    assert_eq!(state.scroll_addr_5_14, 0x3000 | 4 << 5);

    for coarse_y in 0..29 {
        state.scroll_addr_5_14 = 0x7000 | 0x0400 | coarse_y << 5;
        state.scroll_clock_y();
        assert_eq!(state.scroll_addr_5_14, 0x0400 | (coarse_y + 1) << 5);
    }

    // Row 29 is the last row of tiles: switch vertical nametables
    state.scroll_addr_5_14 = 0x7000 | 0x0400 | 29 << 5;
    state.scroll_clock_y();
    assert_eq!(state.scroll_addr_5_14, 0x0C00);

    // Rows 30 and 31 hold attributes: 31 wraps without switching
    state.scroll_addr_5_14 = 0x7000 | 0x0400 | 31 << 5;
    state.scroll_clock_y();
    assert_eq!(state.scroll_addr_5_14, 0x0400);
    assert_eq!(state.name_io_addr, 0x2400);
}

#[test]
fn a12_rises_once_per_sprite_slot() {
    let mut harness = Harness::booted();
    harness.bus.monitor_a12 = true;
    // Background patterns at $0000, sprite patterns at $1000
    harness.write(PpuRegister::PPUCTRL, 0x08);
    harness.write(PpuRegister::PPUMASK, 0x18);

    harness.run_frame();

    // 8 sprite fetch slots on each of the 240 visible lines and the pre-render line
    assert_eq!(harness.bus.a12_rises.len(), 8 * 241);
    assert!(harness.bus.a12_rises.windows(2).all(|w| w[0] < w[1]));
    assert!(harness.bus.a12_rises.iter().all(|&clock| clock < FRAME_CLOCKS));
}

#[test]
fn no_a12_rises_with_shared_pattern_table() {
    let mut harness = Harness::booted();
    harness.bus.monitor_a12 = true;
    harness.write(PpuRegister::PPUMASK, 0x18);

    harness.run_frame();
    assert!(harness.bus.a12_rises.is_empty());
}

fn sprite_zero_scene(sprite_zero: [u8; 4]) -> Harness {
    let mut harness = Harness::booted();

    // Opaque background everywhere; sprite tile 1 is opaque, tile 2 transparent
    harness.bus.chr[..0x1000].fill(0xFF);
    harness.bus.chr[0x1010..0x1020].fill(0xFF);

    harness.write_oam(&[sprite_zero]);
    harness.write(PpuRegister::PPUCTRL, 0x08);
    harness.write(PpuRegister::PPUMASK, 0x1E);
    harness
}

#[test]
fn sprite_zero_hit_on_opaque_overlap() {
    let mut harness = sprite_zero_scene([30, 1, 0, 100]);

    harness.begin_frame();
    // Line 31 is the first line the sprite is drawn on
    let line_31_start = (VBLANK_END_CLOCKS / MASTER_CLOCKS_PER_DOT + DOTS_PER_SCANLINE * 32)
        * MASTER_CLOCKS_PER_DOT;
    harness.sync(line_31_start + 100 * MASTER_CLOCKS_PER_DOT);
    assert!(!harness.state.sprite_zero_hit());

    harness.sync(line_31_start + 101 * MASTER_CLOCKS_PER_DOT);
    assert!(harness.state.sprite_zero_hit());

    harness.end_frame();
    assert!(harness.state.sprite_zero_hit());

    // Cleared on the pre-render line of the next frame
    harness.begin_frame();
    harness.sync(VBLANK_END_CLOCKS + 8 * MASTER_CLOCKS_PER_DOT);
    assert!(!harness.state.sprite_zero_hit());
}

#[test]
fn no_sprite_zero_hit_at_last_dot() {
    let mut harness = sprite_zero_scene([30, 1, 0, 255]);
    harness.run_frame();
    assert!(!harness.state.sprite_zero_hit());
}

#[test]
fn no_sprite_zero_hit_with_transparent_sprite() {
    let mut harness = sprite_zero_scene([30, 2, 0, 100]);
    harness.run_frame();
    assert!(!harness.state.sprite_zero_hit());
}

#[test]
fn no_sprite_zero_hit_with_background_disabled() {
    let mut harness = sprite_zero_scene([30, 1, 0, 100]);
    harness.write(PpuRegister::PPUMASK, 0x14);
    harness.run_frame();
    assert!(!harness.state.sprite_zero_hit());
}

#[test]
fn split_runs_match_single_run() {
    let mut single = scene();
    let mut split = scene();
    single.bus.monitor_a12 = true;
    split.bus.monitor_a12 = true;

    for _ in 0..2 {
        single.run_frame();

        split.begin_frame();
        let mut clock = 0;
        while clock < FRAME_CLOCKS {
            split.sync(clock);
            clock += 997;
        }
        split.end_frame();

        assert_eq!(single.state.frame_buffer(), split.state.frame_buffer());
        assert_eq!(single.save_state(), split.save_state());
    }

    assert_eq!(single.bus.a12_rises, split.bus.a12_rises);
    assert!(!single.bus.a12_rises.is_empty());
}

#[test]
fn sprites_are_drawn_one_line_below_y() {
    let mut harness = Harness::booted();
    harness.bus.chr[0x0010..0x0018].fill(0xFF);
    harness.write_vram(0x3F11, &[0x16]);
    harness.write_oam(&[[49, 1, 0, 40]]);
    harness.write(PpuRegister::PPUMASK, 0x14);

    harness.run_frame();

    let sprite_color = harness.state.output_color(0x11);
    let backdrop = harness.state.output_color(0);
    let frame = harness.state.frame_buffer();
    for y in 49..=58 {
        let row = &frame[y * SCREEN_WIDTH..(y + 1) * SCREEN_WIDTH];
        let expected = if (50..58).contains(&y) { sprite_color } else { backdrop };
        assert_eq!(row[40], expected, "line {y}");
        assert_eq!(row[47], expected, "line {y}");
        assert_eq!(row[39], backdrop, "line {y}");
        assert_eq!(row[48], backdrop, "line {y}");
    }
}

#[test]
fn status_read_clears_vblank_and_toggle() {
    let mut harness = Harness::booted();
    harness.write(PpuRegister::PPUADDR, 0x21);

    assert_eq!(harness.read(PpuRegister::PPUSTATUS) & 0x80, 0x80);
    assert_eq!(harness.read(PpuRegister::PPUSTATUS) & 0x80, 0x00);

    // The toggle was reset, so this pair sets the full address
    harness.set_vram_addr(0x2345);
    assert_eq!(harness.state.scroll_addr_0_4 | harness.state.scroll_addr_5_14, 0x2345);
}

#[test]
fn status_read_before_vblank_suppresses_nmi() {
    let mut harness = Harness::booted();
    harness.write(PpuRegister::PPUCTRL, 0x80);
    // Enabling NMI while the boot vblank flag is set fires immediately
    assert_eq!(harness.bus.nmis, vec![REGISTER_SETUP]);
    harness.bus.nmis.clear();

    harness.run_frame();
    assert_eq!(harness.bus.nmis, vec![FRAME_CLOCKS]);
    harness.bus.nmis.clear();

    harness.read(PpuRegister::PPUSTATUS);
    harness.begin_frame();
    // Lands between the internal flag set and its commit
    harness.bus.cpu_clock = FRAME_CLOCKS - REGISTER_SETUP;
    let status = harness.read(PpuRegister::PPUSTATUS);
    assert_eq!(status & 0x80, 0x00);
    harness.end_frame();

    assert!(!harness.state.vblank());
    assert!(harness.bus.nmis.is_empty());
}

#[test]
fn data_reads_are_buffered() {
    let mut harness = Harness::booted();
    harness.write_vram(0x2400, &[0x5A, 0x6B]);
    harness.bus.chr[0x0123] = 0x77;

    harness.set_vram_addr(0x2400);
    harness.read(PpuRegister::PPUDATA);
    assert_eq!(harness.read(PpuRegister::PPUDATA), 0x5A);
    assert_eq!(harness.read(PpuRegister::PPUDATA), 0x6B);

    harness.set_vram_addr(0x0123);
    harness.read(PpuRegister::PPUDATA);
    assert_eq!(harness.read(PpuRegister::PPUDATA), 0x77);
}

#[test]
fn palette_writes_mirror_backdrop_entries() {
    let mut harness = Harness::booted();
    harness.write_vram(0x3F10, &[0x2C]);

    assert_eq!(harness.state.palette_ram[0x00], 0x2C);
    assert_eq!(harness.state.output_color(0x00), harness.state.output_color(0x10));

    // Palette reads are not delayed by the buffer
    harness.set_vram_addr(0x3F00);
    assert_eq!(harness.read(PpuRegister::PPUDATA) & 0x3F, 0x2C);

    // Greyscale masks the color index
    harness.write(PpuRegister::PPUMASK, 0x01);
    harness.set_vram_addr(0x3F00);
    assert_eq!(harness.read(PpuRegister::PPUDATA) & 0x3F, 0x20);
    assert_eq!(
        harness.state.output_color(0x00),
        graphics::palette_color(&harness.state.palette, 0x20)
    );
}

#[test]
fn vram_increment_of_32() {
    let mut harness = Harness::booted();
    harness.write(PpuRegister::PPUCTRL, 0x04);
    harness.write_vram(0x2000, &[0x11, 0x22]);

    assert_eq!(harness.state.nametables().read(0x2000), 0x11);
    assert_eq!(harness.state.nametables().read(0x2020), 0x22);
    assert_eq!(harness.state.scroll_addr_0_4 | harness.state.scroll_addr_5_14, 0x2040);
}

#[test]
fn nametable_writes_reach_the_background() {
    let mut harness = Harness::booted();
    // Tile 3 row 0 is solid color 1
    harness.bus.chr[0x0030] = 0xFF;
    harness.write_vram(0x2000, &[0x03]);
    harness.write_vram(0x23C0, &[0x00]);
    harness.write_vram(0x3F00, &[0x0F, 0x21]);
    harness.write(PpuRegister::PPUSCROLL, 0);
    harness.write(PpuRegister::PPUSCROLL, 0);
    harness.write(PpuRegister::PPUCTRL, 0x00);
    // The nametable default is tile $FF, which stays transparent
    harness.write(PpuRegister::PPUMASK, 0x0A);

    harness.run_frame();

    let frame = harness.state.frame_buffer();
    let color_1 = harness.state.output_color(1);
    let backdrop = harness.state.output_color(0);
    assert!(frame[..8].iter().all(|&color| color == color_1));
    assert_eq!(frame[8], backdrop);
    assert_eq!(frame[SCREEN_WIDTH], backdrop);
}

#[test]
fn oam_writes_during_rendering_store_ff() {
    let mut harness = scene();
    harness.begin_frame();
    harness.bus.cpu_clock = VBLANK_END_CLOCKS + 100 * DOTS_PER_SCANLINE * MASTER_CLOCKS_PER_DOT;

    harness.write(PpuRegister::OAMADDR, 0x40);
    harness.write(PpuRegister::OAMDATA, 0x12);
    assert_eq!(harness.state.oam()[0x40], 0xFF);

    harness.end_frame();
    harness.bus.cpu_clock = 0;
    harness.write(PpuRegister::OAMADDR, 0x42);
    harness.write(PpuRegister::OAMDATA, 0xFF);
    // Attribute bits 2-4 are unimplemented
    assert_eq!(harness.state.oam()[0x42], 0xE3);
}

fn nine_sprites_on_a_line(config: &PpuConfig) -> Harness {
    let mut harness = Harness::with_config(config);
    harness.run_frame();

    harness.bus.chr[0x0010..0x0018].fill(0xFF);
    let sprites: Vec<_> = (0..9).map(|i: u8| [49, 1, 0, i * 10]).collect();
    harness.write_oam(&sprites);
    harness.write(PpuRegister::PPUMASK, 0x14);

    harness.run_frame();
    harness
}

#[test]
fn ninth_sprite_hidden_by_default() {
    let harness = nine_sprites_on_a_line(&PpuConfig::default());
    let row = &harness.state.frame_buffer()[50 * SCREEN_WIDTH..51 * SCREEN_WIDTH];

    assert_eq!(row[70], harness.state.output_color(0x11));
    assert_eq!(row[80], harness.state.output_color(0));
    assert!(harness.state.sprite_overflow());
}

#[test]
fn ninth_sprite_drawn_with_limit_removed() {
    let config = PpuConfig { remove_sprite_limit: true, ..PpuConfig::default() };
    let harness = nine_sprites_on_a_line(&config);
    let row = &harness.state.frame_buffer()[50 * SCREEN_WIDTH..51 * SCREEN_WIDTH];

    assert_eq!(row[80], harness.state.output_color(0x11));
    assert_eq!(row[87], harness.state.output_color(0x11));
    assert!(!harness.state.sprite_overflow());
}
