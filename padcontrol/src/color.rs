//! Pad accent colors.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// Accent palette, assigned to buttons by declaration order.
pub const PALETTE: [Rgb; 12] = [
    Rgb::new(0xff, 0x6b, 0x6b),
    Rgb::new(0xff, 0xa9, 0x4d),
    Rgb::new(0xff, 0xd4, 0x3b),
    Rgb::new(0xa9, 0xe3, 0x4b),
    Rgb::new(0x69, 0xdb, 0x7c),
    Rgb::new(0x38, 0xd9, 0xa9),
    Rgb::new(0x3b, 0xc9, 0xdb),
    Rgb::new(0x4d, 0xab, 0xf7),
    Rgb::new(0x74, 0x8f, 0xfc),
    Rgb::new(0x97, 0x75, 0xfa),
    Rgb::new(0xda, 0x77, 0xf2),
    Rgb::new(0xf7, 0x83, 0xac),
];

const BLACK: Rgb = Rgb::new(0, 0, 0);
const WHITE: Rgb = Rgb::new(0xff, 0xff, 0xff);

/// Accent of the button declared at `index`.
pub fn accent_for_index(index: usize) -> Rgb {
    PALETTE[index % PALETTE.len()]
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parses `#rrggbb` or `rrggbb`.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let digits = hex.trim().trim_start_matches('#');
        if digits.len() != 6 || !digits.is_ascii() {
            return None;
        }
        let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&digits[range], 16).ok();
        Some(Self::new(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    /// Linear blend towards `other`, `t` clamped to `[0, 1]`.
    pub fn mix(self, other: Rgb, t: f32) -> Rgb {
        let t = t.clamp(0.0, 1.0);
        let lerp = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;
        Rgb::new(lerp(self.r, other.r), lerp(self.g, other.g), lerp(self.b, other.b))
    }

    /// Shade used for idle pads.
    pub fn dimmed(self) -> Rgb {
        self.mix(BLACK, 0.55)
    }

    /// Relative luminance in `[0, 1]` (sRGB weights, no gamma correction).
    pub fn luminance(self) -> f32 {
        (0.2126 * self.r as f32 + 0.7152 * self.g as f32 + 0.0722 * self.b as f32) / 255.0
    }

    /// Black or white, whichever reads better on top of `self`.
    pub fn contrast_text(self) -> Rgb {
        if self.luminance() > 0.55 { BLACK } else { WHITE }
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_palette_cycles() {
        for i in 0..40 {
            assert_eq!(accent_for_index(i), PALETTE[i % 12]);
        }
        assert_eq!(accent_for_index(12), accent_for_index(0));
        assert_ne!(accent_for_index(1), accent_for_index(0));
    }

    #[test]
    fn test_hex_parsing() {
        assert_eq!(Rgb::from_hex("#ff6b6b"), Some(PALETTE[0]));
        assert_eq!(Rgb::from_hex("4DABF7"), Some(PALETTE[7]));
        assert_eq!(Rgb::from_hex("#fff"), None);
        assert_eq!(Rgb::from_hex("#gg0000"), None);
        assert_eq!(PALETTE[3].to_hex(), "#a9e34b");
    }

    #[test]
    fn test_mix_and_shades() {
        let red = Rgb::new(200, 0, 0);
        assert_eq!(red.mix(BLACK, 0.0), red);
        assert_eq!(red.mix(BLACK, 1.0), BLACK);
        assert_eq!(red.mix(WHITE, 2.0), WHITE);
        assert_eq!(red.dimmed(), Rgb::new(90, 0, 0));
    }

    #[test]
    fn test_contrast_text() {
        assert_eq!(Rgb::new(0xff, 0xd4, 0x3b).contrast_text(), BLACK);
        assert_eq!(Rgb::new(0x20, 0x20, 0x60).contrast_text(), WHITE);
    }
}
