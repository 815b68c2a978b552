//! Palette construction. Colors are derived from a model of the composite signal the 2C02 emits:
//! each NES color is a square wave sampled at 12 phases per color subcarrier cycle, which is then
//! demodulated to YUV and converted to RGB.
//!
//! See <https://www.nesdev.org/wiki/NTSC_video>

#![allow(clippy::many_single_char_names)]

use crate::NesPalette;
use std::array;
use std::f64::consts::TAU;

const PHASES: u8 = 12;

// Bits 6-8 of a palette index
const EMPHASIS_MASK: usize = 0x1C0;

// Composite voltage levels for luma 0-3, normal and attenuated by color emphasis
const SIGNAL_LOW: [f64; 4] = [0.228, 0.312, 0.552, 0.880];
const SIGNAL_HIGH: [f64; 4] = [0.616, 0.840, 1.100, 1.100];
const EMPHASIZED_LOW: [f64; 4] = [0.192, 0.256, 0.448, 0.712];
const EMPHASIZED_HIGH: [f64; 4] = [0.500, 0.676, 0.896, 0.896];
const BLACK_LEVEL: f64 = 0.312;
const WHITE_LEVEL: f64 = 1.100;

const CHROMA_GAIN: f64 = 2.0 * (40.0 / 140.0) / (0.524 - 0.148);

#[rustfmt::skip]
const DEFACTO_BASE: [(u8, u8, u8); 64] = [
    (0x66, 0x66, 0x66), (0x00, 0x2A, 0x88), (0x14, 0x12, 0xA7), (0x3B, 0x00, 0xA4),
    (0x5C, 0x00, 0x7E), (0x6E, 0x00, 0x40), (0x6C, 0x06, 0x00), (0x56, 0x1D, 0x00),
    (0x33, 0x35, 0x00), (0x0B, 0x48, 0x00), (0x00, 0x52, 0x00), (0x00, 0x4F, 0x08),
    (0x00, 0x40, 0x4D), (0x00, 0x00, 0x00), (0x00, 0x00, 0x00), (0x00, 0x00, 0x00),
    (0xAD, 0xAD, 0xAD), (0x15, 0x5F, 0xD9), (0x42, 0x40, 0xFF), (0x75, 0x27, 0xFE),
    (0xA0, 0x1A, 0xCC), (0xB7, 0x1E, 0x7B), (0xB5, 0x31, 0x20), (0x99, 0x4E, 0x00),
    (0x6B, 0x6D, 0x00), (0x38, 0x87, 0x00), (0x0C, 0x93, 0x00), (0x00, 0x8F, 0x32),
    (0x00, 0x7C, 0x8D), (0x00, 0x00, 0x00), (0x00, 0x00, 0x00), (0x00, 0x00, 0x00),
    (0xFF, 0xFE, 0xFF), (0x64, 0xB0, 0xFF), (0x92, 0x90, 0xFF), (0xC6, 0x76, 0xFF),
    (0xF3, 0x6A, 0xFF), (0xFE, 0x6E, 0xCC), (0xFE, 0x81, 0x70), (0xEA, 0x9E, 0x22),
    (0xBC, 0xBE, 0x00), (0x88, 0xD8, 0x00), (0x5C, 0xE4, 0x30), (0x45, 0xE0, 0x82),
    (0x48, 0xCD, 0xDE), (0x4F, 0x4F, 0x4F), (0x00, 0x00, 0x00), (0x00, 0x00, 0x00),
    (0xFF, 0xFE, 0xFF), (0xC0, 0xDF, 0xFF), (0xD3, 0xD2, 0xFF), (0xE8, 0xC8, 0xFF),
    (0xFB, 0xC2, 0xFF), (0xFE, 0xC4, 0xEA), (0xFE, 0xCC, 0xC5), (0xF7, 0xD8, 0xA5),
    (0xE4, 0xE5, 0x94), (0xCF, 0xEF, 0x96), (0xBD, 0xF4, 0xAB), (0xB3, 0xF3, 0xCC),
    (0xB5, 0xEB, 0xF2), (0xB8, 0xB8, 0xB8), (0x00, 0x00, 0x00), (0x00, 0x00, 0x00),
];

/// The bundled default palette.
#[must_use]
pub fn defacto() -> NesPalette {
    extend_with_emphasis(&DEFACTO_BASE)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NtscPaletteSettings {
    pub brightness: f64,
    pub saturation: f64,
    pub contrast: f64,
    pub gamma: f64,
    pub hue_offset: f64,
}

impl Default for NtscPaletteSettings {
    fn default() -> Self {
        Self { brightness: 1.0, saturation: 1.0, contrast: 1.0, gamma: 2.0, hue_offset: 0.0 }
    }
}

/// Normalized composite level (0.0 = black, 1.0 = white) for one of the 12 subcarrier phases.
/// `index` is a full 9-bit palette index including emphasis bits.
fn signal_level(index: usize, phase: u8) -> f64 {
    let hue = (index & 0x0F) as u8;
    let luma = if hue >= 0x0E { 1 } else { (index >> 4) & 3 };

    let active = |start: u8| (start + phase) % PHASES < PHASES / 2;

    // Emphasis bit N darkens the phases where color 4N (red, green, blue) is high.
    // Colors $xE and $xF are never affected
    let emphasized = hue < 0x0E
        && [(0x040, 0), (0x080, 4), (0x100, 8)]
            .into_iter()
            .any(|(bit, start)| index & bit != 0 && active(start));

    let (low, high) = if emphasized {
        (EMPHASIZED_LOW[luma], EMPHASIZED_HIGH[luma])
    } else {
        (SIGNAL_LOW[luma], SIGNAL_HIGH[luma])
    };

    let level = match hue {
        0x00 => high,
        0x01..=0x0C => {
            if active(hue) {
                high
            } else {
                low
            }
        }
        0x0D..=0x0F => low,
        _ => unreachable!("hue is a 4-bit value"),
    };

    (level - BLACK_LEVEL) / (WHITE_LEVEL - BLACK_LEVEL)
}

#[derive(Debug, Clone, Copy, Default)]
struct Yuv {
    y: f64,
    u: f64,
    v: f64,
}

impl Yuv {
    fn from_rgb((r, g, b): (u8, u8, u8)) -> Self {
        let [r, g, b] = [r, g, b].map(|c| f64::from(c) / 255.0);

        let y = 0.299 * r + 0.587 * g + 0.114 * b;
        Self { y, u: 0.492111 * (b - y), v: 0.877283 * (r - y) }
    }

    fn to_rgb(self, gamma: f64) -> (u8, u8, u8) {
        let channel = |c: f64| {
            let corrected = if c > 0.0 { c.powf(2.2 / gamma) } else { 0.0 };
            (corrected * 255.0).round().clamp(0.0, 255.0) as u8
        };

        (
            channel(self.y + 1.139883 * self.v),
            channel(self.y - 0.394642 * self.u - 0.580622 * self.v),
            channel(self.y + 2.032062 * self.u),
        )
    }

    /// Accumulate one of the 12 samples of a subcarrier cycle. Negative levels subtract.
    fn add_sample(&mut self, level: f64, phase: f64) {
        let level = level / f64::from(PHASES);
        let angle = phase / f64::from(PHASES) * TAU;

        self.y += level;
        self.u += level * angle.sin() * CHROMA_GAIN;
        self.v += level * angle.cos() * CHROMA_GAIN;
    }
}

/// Generate all 512 colors from the composite signal model.
#[must_use]
pub fn generate_ntsc(settings: NtscPaletteSettings) -> NesPalette {
    NesPalette::from_fn(|index| {
        let mut yuv = Yuv::default();
        for phase in 0..PHASES {
            yuv.add_sample(signal_level(index, phase), f64::from(phase) + 3.0 + settings.hue_offset);
        }

        yuv.y = ((yuv.y - 0.5) * settings.contrast + 0.5) * settings.brightness;
        yuv.u *= settings.brightness * settings.saturation;
        yuv.v *= settings.brightness * settings.saturation;

        yuv.to_rgb(settings.gamma)
    })
}

/// Extend a 64-color palette to 512 colors. Each emphasized color starts from its base color and
/// removes the part of the signal that emphasis attenuates.
#[must_use]
pub fn extend_with_emphasis(base: &[(u8, u8, u8); 64]) -> NesPalette {
    NesPalette(array::from_fn(|index| {
        let color = index & 0x3F;
        if index & EMPHASIS_MASK == 0 {
            return base[color];
        }

        let mut yuv = Yuv::from_rgb(base[color]);
        for phase in 0..PHASES {
            let lost = signal_level(color, phase) - signal_level(index, phase);
            debug_assert!(lost >= 0.0);

            if lost > 1e-6 {
                yuv.add_sample(-lost, f64::from(phase) + 3.0);
            }
        }

        yuv.to_rgb(2.2)
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn brightness((r, g, b): (u8, u8, u8)) -> u32 {
        u32::from(r) + u32::from(g) + u32::from(b)
    }

    #[test]
    fn defacto_base_colors() {
        let palette = defacto();

        assert_eq!(palette[0x00], (0x66, 0x66, 0x66));
        assert_eq!(palette[0x0F], (0x00, 0x00, 0x00));
        assert_eq!(palette[0x30], (0xFF, 0xFE, 0xFF));
    }

    #[test]
    fn generated_grey_extremes() {
        let palette = generate_ntsc(NtscPaletteSettings::default());

        assert_eq!(palette[0x0F], (0, 0, 0));
        assert_eq!(palette[0x20], (255, 255, 255));
    }

    #[test]
    fn emphasis_darkens_colors() {
        let palette = defacto();

        for emphasis in [0x040, 0x080, 0x100, 0x1C0] {
            assert!(brightness(palette[emphasis | 0x10]) < brightness(palette[0x10]));
        }
    }

    #[test]
    fn emphasis_skips_blacks() {
        let palette = extend_with_emphasis(&DEFACTO_BASE);

        for emphasis in [0x040, 0x080, 0x100, 0x1C0] {
            assert_eq!(palette[emphasis | 0x0E], palette[0x0E]);
            assert_eq!(palette[emphasis | 0x0F], palette[0x0F]);
        }
    }
}
