//! Cycle-accurate emulation of the NTSC NES picture processing unit (Ricoh RP2C02).

mod api;
pub mod bus;
pub mod graphics;
mod lut;
pub mod memory;
mod num;
mod ppu;

pub use api::{Rp2c02, SaveStateError};
pub use bus::{MASTER_CLOCKS_PER_DOT, PpuBus, PpuRegister};
pub use graphics::{Color, SCREEN_HEIGHT, SCREEN_WIDTH};
pub use memory::Mirroring;
pub use ppu::{FRAME_CLOCKS, PRE_RENDER_SCANLINE};
pub use rp2c02_config::{NesPalette, PaletteLoadError, PpuConfig};
