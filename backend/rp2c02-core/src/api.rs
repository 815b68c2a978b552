//! Public interface for embedding the PPU in an NES emulator.

use crate::bus::{PpuBus, PpuRegister};
use crate::graphics::Color;
use crate::lut::FetchLut;
use crate::memory::Mirroring;
use crate::ppu::{self, PpuState};
use bincode::config::{Fixint, LittleEndian};
use bincode::error::{DecodeError, EncodeError};
use rp2c02_config::PpuConfig;
use std::io;
use std::io::{BufReader, BufWriter};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SaveStateError {
    #[error("error saving state: {source}")]
    Serialization {
        #[from]
        source: EncodeError,
    },
    #[error("error loading state: {source}")]
    Deserialization {
        #[from]
        source: DecodeError,
    },
}

const BINCODE_CONFIG: bincode::config::Configuration<LittleEndian, Fixint> =
    bincode::config::standard().with_little_endian().with_fixed_int_encoding();

/// An NTSC PPU. The host drives it one frame at a time:
///
/// 1. [`Rp2c02::begin_frame`] at the start of each CPU frame
/// 2. register accesses and [`Rp2c02::sync`] calls as the CPU runs; these catch the PPU up to
///    [`PpuBus::cpu_clock`]
/// 3. [`Rp2c02::end_frame`] once the CPU reaches [`PpuBus::next_frame_clock`], after which
///    [`Rp2c02::frame_buffer`] holds the completed frame
#[derive(Debug, Clone)]
pub struct Rp2c02 {
    state: PpuState,
    lut: FetchLut,
    config: PpuConfig,
}

impl Rp2c02 {
    #[must_use]
    pub fn new(config: PpuConfig) -> Self {
        let state = PpuState::new(&config);
        let lut = FetchLut::new(state.nametables());
        Self { state, lut, config }
    }

    pub fn reload_config(&mut self, config: PpuConfig) {
        log::debug!("Reloading PPU config: remove_sprite_limit={}", config.remove_sprite_limit);
        self.config = config;
        self.state.apply_config(&config);
    }

    /// Return to the power-on state. OAM, palette and nametable RAM are not cleared.
    pub fn reset(&mut self) {
        log::debug!("Resetting PPU");
        self.state.reset(&self.config);
    }

    pub fn begin_frame<B: PpuBus>(&mut self, bus: &mut B) {
        ppu::begin_frame(&mut self.state, bus);
    }

    /// Catch up to master clock `elapsed` of the current frame.
    pub fn sync<B: PpuBus>(&mut self, bus: &mut B, elapsed: u64) {
        ppu::sync(&mut self.state, &self.lut, bus, elapsed);
    }

    pub fn end_frame<B: PpuBus>(&mut self, bus: &mut B) {
        ppu::end_frame(&mut self.state, &self.lut, bus);
    }

    pub fn read_register<B: PpuBus>(&mut self, bus: &mut B, register: PpuRegister) -> u8 {
        ppu::read_register(&mut self.state, &self.lut, bus, register)
    }

    pub fn write_register<B: PpuBus>(&mut self, bus: &mut B, register: PpuRegister, value: u8) {
        ppu::write_register(&mut self.state, &mut self.lut, bus, register, value);
    }

    /// Handle a write to `$4014`, given the 256 bytes of the selected CPU page.
    pub fn oam_dma<B: PpuBus>(&mut self, bus: &mut B, page: &[u8; 256]) {
        ppu::oam_dma(&mut self.state, &self.lut, bus, page);
    }

    /// Change the nametable mapping, e.g. after a mapper register write.
    pub fn set_mirroring<B: PpuBus>(&mut self, bus: &mut B, mirroring: Mirroring) {
        ppu::catch_up(&mut self.state, &self.lut, bus, 0);

        if self.state.nametables_mut().set_mirroring(mirroring) {
            log::debug!("Nametable mirroring set to {mirroring:?}");
            self.lut.rebuild(self.state.nametables());
        }
    }

    #[must_use]
    pub fn frame_buffer(&self) -> &[Color] {
        self.state.frame_buffer()
    }

    #[must_use]
    pub fn vblank(&self) -> bool {
        self.state.vblank()
    }

    #[must_use]
    pub fn sprite_zero_hit(&self) -> bool {
        self.state.sprite_zero_hit()
    }

    #[must_use]
    pub fn sprite_overflow(&self) -> bool {
        self.state.sprite_overflow()
    }

    #[must_use]
    pub fn scanline(&self) -> u16 {
        self.state.scanline()
    }

    #[must_use]
    pub fn dot(&self) -> u16 {
        self.state.dot()
    }

    #[must_use]
    pub fn output_color(&self, index: usize) -> Color {
        self.state.output_color(index)
    }

    #[must_use]
    pub fn oam(&self) -> &[u8; 256] {
        self.state.oam()
    }

    /// # Errors
    ///
    /// Propagates any error from bincode or the writer.
    pub fn save_state<W: io::Write>(&self, writer: W) -> Result<(), SaveStateError> {
        let mut writer = BufWriter::new(writer);
        bincode::encode_into_std_write(&self.state, &mut writer, BINCODE_CONFIG)?;

        Ok(())
    }

    /// Restore a state written by [`Rp2c02::save_state`]. The current config is kept.
    ///
    /// # Errors
    ///
    /// Returns an error if the state cannot be decoded; the PPU is unchanged in that case.
    pub fn load_state<R: io::Read>(&mut self, reader: R) -> Result<(), SaveStateError> {
        let mut reader = BufReader::new(reader);
        let state: PpuState = bincode::decode_from_std_read(&mut reader, BINCODE_CONFIG)?;

        self.state = state;
        self.state.apply_config(&self.config);
        self.lut.rebuild(self.state.nametables());

        log::debug!("Loaded PPU state at scanline {}", self.state.scanline());

        Ok(())
    }
}
