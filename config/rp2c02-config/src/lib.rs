pub mod palettes;

#[cfg(feature = "serde")]
mod serialization;

use bincode::{Decode, Encode};
use std::ops::Index;
use std::path::Path;
use std::{array, fs, io};
use thiserror::Error;

const FULL_PALETTE_LEN: usize = 512 * 3;
const BASE_PALETTE_LEN: usize = 64 * 3;

#[derive(Debug, Error)]
pub enum PaletteLoadError {
    #[error("I/O error loading palette: {0}")]
    Io(#[from] io::Error),
    #[error("Incorrect palette size; expected 192 or 1536 bytes, was {len}")]
    IncorrectSize { len: u64 },
}

fn bytes_to_triples_array<const LEN: usize>(bytes: &[u8]) -> [(u8, u8, u8); LEN] {
    array::from_fn(|i| (bytes[3 * i], bytes[3 * i + 1], bytes[3 * i + 2]))
}

/// RGB colors for all 512 combinations of a 6-bit NES color (bits 0-5) and the 3 PPUMASK color
/// emphasis bits (bits 6-8: red, green, blue).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub struct NesPalette(pub [(u8, u8, u8); 512]);

impl NesPalette {
    #[must_use]
    pub fn from_fn(f: impl FnMut(usize) -> (u8, u8, u8)) -> Self {
        Self(array::from_fn(f))
    }

    /// Parse the contents of a `.pal` file. 64-color palettes are extended with emphasis colors;
    /// bytes past the first 512 colors are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if there are fewer than 64 colors.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PaletteLoadError> {
        if bytes.len() >= FULL_PALETTE_LEN {
            Ok(Self(bytes_to_triples_array(bytes)))
        } else if bytes.len() >= BASE_PALETTE_LEN {
            Ok(palettes::extend_with_emphasis(&bytes_to_triples_array(bytes)))
        } else {
            Err(PaletteLoadError::IncorrectSize { len: bytes.len() as u64 })
        }
    }

    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        self.0.iter().flat_map(|&(r, g, b)| [r, g, b]).collect()
    }

    /// Load a 512-color or 64-color palette from a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is too small or if there is an I/O error reading it.
    pub fn read_from(path: &Path) -> Result<Self, PaletteLoadError> {
        let bytes = fs::read(path)?;
        Self::from_bytes(&bytes)
    }

    /// Write all 512 colors to a file.
    ///
    /// # Errors
    ///
    /// Propagates any I/O errors encountered while creating or writing the file.
    pub fn write_to(&self, path: &Path) -> io::Result<()> {
        fs::write(path, self.to_bytes())
    }
}

impl Default for NesPalette {
    fn default() -> Self {
        palettes::defacto()
    }
}

impl Index<usize> for NesPalette {
    type Output = (u8, u8, u8);

    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PpuConfig {
    /// Buffer up to 32 sprites per scanline instead of 8. Sprite overflow is then only reported
    /// for a 33rd sprite.
    pub remove_sprite_limit: bool,
    pub palette: NesPalette,
}
