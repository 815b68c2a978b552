use bincode::{Decode, Encode};
use rp2c02_config::NesPalette;

pub const SCREEN_WIDTH: usize = 256;
pub const SCREEN_HEIGHT: usize = 240;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLACK: Self = Self::rgb(0, 0, 0);

    #[must_use]
    #[inline]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }
}

/// Resolve a 9-bit palette index (6-bit NES color + 3 emphasis bits) to RGBA.
#[must_use]
pub fn palette_color(palette: &NesPalette, index: u16) -> Color {
    let (r, g, b) = palette[(index & 0x1FF) as usize];
    Color::rgb(r, g, b)
}
