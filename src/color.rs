//! Color values and format conversion
//!
//! This module converts pixels between [`PixelFormat`]s. Every conversion goes
//! through 8-bit-per-channel [`Rgb888`], which keeps the rules simple:
//!
//! - Narrowing a channel truncates (`0xFF` red becomes `0x1F` in RGB565).
//! - Widening a channel replicates its high bits into the new low bits, so a
//!   widen-then-narrow round trip is lossless.
//! - Palette indices are looked up in the owning surface's [`Palette`].
//!   Mapping a color *into* a palette requires an exact match; a miss is an
//!   [`Error::PaletteMiss`], never a silent approximation.
//!
//! [`pack`] and [`unpack`] read and write single pixels inside a byte buffer,
//! including sub-byte depths where several pixels share a byte.
//!
//! ## Example
//!
//! ```
//! use surfblit::color::{self, Rgb888};
//! use surfblit::PixelFormat;
//!
//! let red = Rgb888::new(0xFF, 0, 0);
//! assert_eq!(red.to_raw(PixelFormat::Rgb565), 0xF800);
//!
//! let raw = color::convert(0xF800, PixelFormat::Rgb565, None, PixelFormat::Rgb888, None);
//! assert_eq!(raw, Ok(0x0000FF));
//! ```

use alloc::vec::Vec;

use crate::error::Error;
use crate::format::PixelFormat;

/// 24-bit RGB color
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Rgb888 {
    /// Red channel
    pub r: u8,
    /// Green channel
    pub g: u8,
    /// Blue channel
    pub b: u8,
}

/// 32-bit color with alpha
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Argb8888 {
    /// Alpha (0 transparent, 255 opaque)
    pub a: u8,
    /// Red channel
    pub r: u8,
    /// Green channel
    pub g: u8,
    /// Blue channel
    pub b: u8,
}

#[inline]
const fn expand2(v: u32) -> u8 {
    (v * 0x55) as u8
}

#[inline]
const fn expand3(v: u32) -> u8 {
    ((v << 5) | (v << 2) | (v >> 1)) as u8
}

#[inline]
const fn expand5(v: u32) -> u8 {
    ((v << 3) | (v >> 2)) as u8
}

#[inline]
const fn expand6(v: u32) -> u8 {
    ((v << 2) | (v >> 4)) as u8
}

/// Gray level of entry `index` in an evenly spaced palette of `bits` depth
#[inline]
const fn gray_level(index: u32, bits: u8) -> u8 {
    match bits {
        1 => (index * 0xFF) as u8,
        2 => expand2(index),
        4 => (index * 0x11) as u8,
        _ => index as u8,
    }
}

impl Rgb888 {
    /// Black
    pub const BLACK: Self = Self::new(0, 0, 0);
    /// White
    pub const WHITE: Self = Self::new(0xFF, 0xFF, 0xFF);
    /// Red
    pub const RED: Self = Self::new(0xFF, 0, 0);
    /// Green
    pub const GREEN: Self = Self::new(0, 0xFF, 0);
    /// Blue
    pub const BLUE: Self = Self::new(0, 0, 0xFF);

    /// Create a color from its channels
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Luminance approximation `(r + 2g + b) / 4`
    pub const fn luminance(self) -> u8 {
        ((self.r as u32 + 2 * self.g as u32 + self.b as u32) >> 2) as u8
    }

    /// Encode as a raw value of a direct-color format
    ///
    /// For palette formats the result is the luminance quantized to the
    /// index depth, which is the matching entry of a grayscale palette.
    /// Use [`encode`] to map through an actual palette.
    pub const fn to_raw(self, format: PixelFormat) -> u32 {
        let (r, g, b) = (self.r as u32, self.g as u32, self.b as u32);
        match format {
            PixelFormat::Palette1
            | PixelFormat::Palette2
            | PixelFormat::Palette4
            | PixelFormat::Palette8 => {
                (self.luminance() as u32) >> (8 - format.bits_per_pixel() as u32)
            }
            PixelFormat::Rgb332 => color332(self.r, self.g, self.b) as u32,
            PixelFormat::Grayscale8 => self.luminance() as u32,
            PixelFormat::Rgb565 => color565(self.r, self.g, self.b) as u32,
            PixelFormat::Rgb565Be => color565(self.r, self.g, self.b).swap_bytes() as u32,
            PixelFormat::Rgb666 => (r & 0xFC) | (g & 0xFC) << 8 | (b & 0xFC) << 16,
            PixelFormat::Rgb888 => r | g << 8 | b << 16,
            PixelFormat::Bgr888 => b | g << 8 | r << 16,
            PixelFormat::Argb8888 => 0xFF00_0000 | color888(self.r, self.g, self.b),
        }
    }

    /// Decode a raw value of a direct-color format
    ///
    /// Palette formats decode as the entry of a grayscale palette; use
    /// [`decode`] to look up an actual palette.
    pub const fn from_raw(format: PixelFormat, raw: u32) -> Self {
        let raw = raw & format.mask();
        match format {
            PixelFormat::Palette1
            | PixelFormat::Palette2
            | PixelFormat::Palette4
            | PixelFormat::Palette8 => {
                let v = gray_level(raw, format.bits_per_pixel());
                Self::new(v, v, v)
            }
            PixelFormat::Rgb332 => Self::new(
                expand3(raw >> 5),
                expand3((raw >> 2) & 0x07),
                expand2(raw & 0x03),
            ),
            PixelFormat::Grayscale8 => Self::new(raw as u8, raw as u8, raw as u8),
            PixelFormat::Rgb565 => Self::from_565(raw),
            PixelFormat::Rgb565Be => Self::from_565((raw as u16).swap_bytes() as u32),
            PixelFormat::Rgb666 => Self::new(
                expand6((raw >> 2) & 0x3F),
                expand6((raw >> 10) & 0x3F),
                expand6((raw >> 18) & 0x3F),
            ),
            PixelFormat::Rgb888 => Self::new(raw as u8, (raw >> 8) as u8, (raw >> 16) as u8),
            PixelFormat::Bgr888 => Self::new((raw >> 16) as u8, (raw >> 8) as u8, raw as u8),
            PixelFormat::Argb8888 => Self::new((raw >> 16) as u8, (raw >> 8) as u8, raw as u8),
        }
    }

    const fn from_565(raw: u32) -> Self {
        Self::new(
            expand5(raw >> 11),
            expand6((raw >> 5) & 0x3F),
            expand5(raw & 0x1F),
        )
    }
}

impl Argb8888 {
    /// Fully transparent black
    pub const TRANSPARENT: Self = Self::new(0, 0, 0, 0);

    /// Create a color from its channels
    pub const fn new(a: u8, r: u8, g: u8, b: u8) -> Self {
        Self { a, r, g, b }
    }

    /// Attach an alpha value to an RGB color
    pub const fn from_rgb(color: Rgb888, a: u8) -> Self {
        Self::new(a, color.r, color.g, color.b)
    }

    /// The color without alpha
    pub const fn rgb(self) -> Rgb888 {
        Rgb888::new(self.r, self.g, self.b)
    }

    /// Raw `AARRGGBB` value
    pub const fn to_raw(self) -> u32 {
        (self.a as u32) << 24 | (self.r as u32) << 16 | (self.g as u32) << 8 | self.b as u32
    }

    /// From a raw `AARRGGBB` value
    pub const fn from_raw(raw: u32) -> Self {
        Self::new((raw >> 24) as u8, (raw >> 16) as u8, (raw >> 8) as u8, raw as u8)
    }

    /// Blend this color over `dst` by its alpha
    pub const fn blend_over(self, dst: Rgb888) -> Rgb888 {
        let a = self.a as u32 + 1;
        let inv = 257 - a;
        Rgb888::new(
            ((self.r as u32 * a + dst.r as u32 * inv) >> 8) as u8,
            ((self.g as u32 * a + dst.g as u32 * inv) >> 8) as u8,
            ((self.b as u32 * a + dst.b as u32 * inv) >> 8) as u8,
        )
    }
}

/// Pack 8-bit channels into `RRRGGGBB`
pub const fn color332(r: u8, g: u8, b: u8) -> u8 {
    (r & 0xE0) | ((g >> 3) & 0x1C) | (b >> 6)
}

/// Pack 8-bit channels into `RRRRRGGGGGGBBBBB`
pub const fn color565(r: u8, g: u8, b: u8) -> u16 {
    ((r as u16 & 0xF8) << 8) | ((g as u16 & 0xFC) << 3) | (b as u16 >> 3)
}

/// Pack 8-bit channels into `0x00RRGGBB`
pub const fn color888(r: u8, g: u8, b: u8) -> u32 {
    (r as u32) << 16 | (g as u32) << 8 | b as u32
}

/// Index-to-color table of a palette-indexed surface
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Palette {
    colors: Vec<Rgb888>,
}

impl Palette {
    /// Evenly spaced grayscale ramp for a `bits`-deep index
    ///
    /// ```
    /// use surfblit::color::{Palette, Rgb888};
    ///
    /// let palette = Palette::grayscale(2);
    /// assert_eq!(palette.len(), 4);
    /// assert_eq!(palette.get(1), Some(Rgb888::new(0x55, 0x55, 0x55)));
    /// ```
    pub fn grayscale(bits: u8) -> Self {
        let bits = bits.min(8);
        let colors = (0..1u32 << bits)
            .map(|i| {
                let v = gray_level(i, bits);
                Rgb888::new(v, v, v)
            })
            .collect();
        Self { colors }
    }

    /// Palette with the given entries
    pub fn from_colors(colors: &[Rgb888]) -> Self {
        Self {
            colors: colors.to_vec(),
        }
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.colors.len()
    }

    /// Whether the palette has no entries
    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// Entries in index order
    pub fn colors(&self) -> &[Rgb888] {
        &self.colors
    }

    /// Color at `index`
    pub fn get(&self, index: u32) -> Option<Rgb888> {
        self.colors.get(index as usize).copied()
    }

    /// Replace the color at `index`, returning `false` if out of range
    pub fn set(&mut self, index: u32, color: Rgb888) -> bool {
        match self.colors.get_mut(index as usize) {
            Some(entry) => {
                *entry = color;
                true
            }
            None => false,
        }
    }

    /// Lowest index holding exactly `color`
    pub fn index_of(&self, color: Rgb888) -> Option<u32> {
        self.colors
            .iter()
            .position(|&c| c == color)
            .map(|i| i as u32)
    }

    /// Grow or shrink to `len` entries, filling new ones with black
    pub(crate) fn resize(&mut self, len: usize) {
        self.colors.resize(len, Rgb888::BLACK);
    }
}

/// Map a color to a raw value of `format`
///
/// # Errors
///
/// Palette formats need `palette` ([`Error::MissingPalette`]) and an exact
/// entry for `color` ([`Error::PaletteMiss`]).
pub fn encode(color: Rgb888, format: PixelFormat, palette: Option<&Palette>) -> Result<u32, Error> {
    if format.is_palette() {
        let palette = palette.ok_or(Error::MissingPalette)?;
        return palette
            .index_of(color)
            .filter(|&i| i <= format.mask())
            .ok_or(Error::PaletteMiss { color });
    }
    Ok(color.to_raw(format))
}

/// Map a raw value of `format` to a color
///
/// Indices beyond the end of the palette decode as black.
///
/// # Errors
///
/// Palette formats need `palette` ([`Error::MissingPalette`]).
pub fn decode(raw: u32, format: PixelFormat, palette: Option<&Palette>) -> Result<Rgb888, Error> {
    if format.is_palette() {
        let palette = palette.ok_or(Error::MissingPalette)?;
        return Ok(palette.get(raw & format.mask()).unwrap_or_default());
    }
    Ok(Rgb888::from_raw(format, raw))
}

/// Convert a raw value from `src` to `dst`
///
/// Palette to palette conversions copy the index unchanged unless both
/// sides carry different palettes.
///
/// # Errors
///
/// See [`encode`] and [`decode`].
pub fn convert(
    raw: u32,
    src: PixelFormat,
    src_palette: Option<&Palette>,
    dst: PixelFormat,
    dst_palette: Option<&Palette>,
) -> Result<u32, Error> {
    if src == dst && !src.is_palette() {
        return Ok(raw & src.mask());
    }
    let shared = src_palette.is_none() || dst_palette.is_none() || src_palette == dst_palette;
    if src.is_palette() && dst.is_palette() && shared {
        return Ok(raw & src.mask() & dst.mask());
    }
    let color = decode(raw, src, src_palette)?;
    encode(color, dst, dst_palette)
}

/// Write one raw value of `bits` depth at pixel `index`
///
/// Sub-byte values are packed MSB-first; the other pixels sharing the byte
/// are left untouched.
#[inline]
pub fn pack(bytes: &mut [u8], index: usize, bits: u8, value: u32) {
    if bits < 8 {
        let bit = index * bits as usize;
        let shift = 8 - (bit & 7) - bits as usize;
        let mask = (((1u32 << bits) - 1) << shift) as u8;
        let byte = &mut bytes[bit >> 3];
        *byte = (*byte & !mask) | ((value << shift) as u8 & mask);
    } else {
        let n = bits as usize >> 3;
        let start = index * n;
        bytes[start..start + n].copy_from_slice(&value.to_le_bytes()[..n]);
    }
}

/// Read one raw value of `bits` depth at pixel `index`
#[inline]
pub fn unpack(bytes: &[u8], index: usize, bits: u8) -> u32 {
    if bits < 8 {
        let bit = index * bits as usize;
        let shift = 8 - (bit & 7) - bits as usize;
        (u32::from(bytes[bit >> 3]) >> shift) & ((1u32 << bits) - 1)
    } else {
        let n = bits as usize >> 3;
        let start = index * n;
        let mut le = [0u8; 4];
        le[..n].copy_from_slice(&bytes[start..start + n]);
        u32::from_le_bytes(le)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn direct_formats() -> impl Iterator<Item = PixelFormat> {
        PixelFormat::ALL.into_iter().filter(|f| f.channels().is_some())
    }

    fn samples() -> impl Iterator<Item = Rgb888> {
        (0..=255u32)
            .step_by(7)
            .map(|v| Rgb888::new(v as u8, (255 - v) as u8, (v * 3) as u8))
            .chain([Rgb888::BLACK, Rgb888::WHITE, Rgb888::RED])
    }

    #[test]
    fn test_color565() {
        assert_eq!(color565(0xFF, 0, 0), 0xF800);
        assert_eq!(color565(0, 0xFF, 0), 0x07E0);
        assert_eq!(color565(0, 0, 0xFF), 0x001F);
        assert_eq!(color332(0xFF, 0xFF, 0xFF), 0xFF);
        assert_eq!(color888(0x12, 0x34, 0x56), 0x0012_3456);
    }

    #[test]
    fn test_raw_byte_layouts() {
        let c = Rgb888::new(0x11, 0x22, 0x33);
        assert_eq!(c.to_raw(PixelFormat::Rgb888).to_le_bytes()[..3], [0x11, 0x22, 0x33]);
        assert_eq!(c.to_raw(PixelFormat::Bgr888).to_le_bytes()[..3], [0x33, 0x22, 0x11]);
        assert_eq!(Rgb888::RED.to_raw(PixelFormat::Rgb565Be).to_le_bytes()[..2], [0xF8, 0x00]);
        assert_eq!(Rgb888::RED.to_raw(PixelFormat::Rgb565).to_le_bytes()[..2], [0x00, 0xF8]);
        assert_eq!(c.to_raw(PixelFormat::Argb8888), 0xFF11_2233);
    }

    #[test]
    fn test_widen_then_narrow_is_lossless() {
        for a in direct_formats() {
            for b in direct_formats() {
                let (ca, cb) = (a.channels().unwrap(), b.channels().unwrap());
                let wider = cb.red >= ca.red
                    && cb.green >= ca.green
                    && cb.blue >= ca.blue
                    && cb.alpha >= ca.alpha;
                if !wider {
                    continue;
                }
                for color in samples() {
                    let raw = color.to_raw(a);
                    let there = convert(raw, a, None, b, None).unwrap();
                    let back = convert(there, b, None, a, None).unwrap();
                    assert_eq!(back, raw, "{a:?} -> {b:?} -> {a:?} for {color:?}");
                }
            }
        }
    }

    #[test]
    fn test_narrowing_truncates() {
        for color in samples() {
            let raw = convert(
                color.to_raw(PixelFormat::Rgb888),
                PixelFormat::Rgb888,
                None,
                PixelFormat::Rgb565,
                None,
            )
            .unwrap();
            let narrowed = Rgb888::from_raw(PixelFormat::Rgb565, raw);
            assert_eq!(narrowed.r >> 3, color.r >> 3);
            assert_eq!(narrowed.g >> 2, color.g >> 2);
            assert_eq!(narrowed.b >> 3, color.b >> 3);
        }
    }

    #[test]
    fn test_palette_lookup_and_miss() {
        let palette = Palette::from_colors(&[Rgb888::BLACK, Rgb888::BLUE, Rgb888::GREEN]);
        assert_eq!(
            convert(2, PixelFormat::Palette4, Some(&palette), PixelFormat::Rgb888, None),
            Ok(0x00FF00)
        );
        assert_eq!(
            encode(Rgb888::BLUE, PixelFormat::Palette4, Some(&palette)),
            Ok(1)
        );
        assert_eq!(
            encode(Rgb888::RED, PixelFormat::Palette4, Some(&palette)),
            Err(Error::PaletteMiss {
                color: Rgb888::RED
            })
        );
        assert_eq!(
            encode(Rgb888::RED, PixelFormat::Palette4, None),
            Err(Error::MissingPalette)
        );
    }

    #[test]
    fn test_palette_to_palette_without_destination_palette_copies_index() {
        let palette = Palette::grayscale(4);
        assert_eq!(
            convert(9, PixelFormat::Palette4, Some(&palette), PixelFormat::Palette8, None),
            Ok(9)
        );
    }

    #[test]
    fn test_grayscale_palette() {
        let p1 = Palette::grayscale(1);
        assert_eq!(p1.colors(), &[Rgb888::BLACK, Rgb888::WHITE]);
        let p4 = Palette::grayscale(4);
        assert_eq!(p4.get(15), Some(Rgb888::WHITE));
        assert_eq!(p4.get(1), Some(Rgb888::new(0x11, 0x11, 0x11)));
        assert_eq!(Palette::grayscale(8).len(), 256);
    }

    #[test]
    fn test_pack_preserves_neighbors() {
        let mut bytes = [0xFFu8; 2];
        pack(&mut bytes, 1, 2, 0b00);
        assert_eq!(bytes, [0b1100_1111, 0xFF]);
        pack(&mut bytes, 3, 4, 0xA);
        assert_eq!(bytes, [0b1100_1111, 0xFA]);
        assert_eq!(unpack(&bytes, 3, 4), 0xA);
        assert_eq!(unpack(&bytes, 1, 2), 0);
        assert_eq!(unpack(&bytes, 0, 2), 0b11);

        let mut bits = [0u8; 1];
        pack(&mut bits, 7, 1, 1);
        assert_eq!(bits, [0x01]);
    }

    #[test]
    fn test_pack_multi_byte() {
        let mut bytes = [0u8; 6];
        pack(&mut bytes, 1, 24, 0x00AA_BBCC);
        assert_eq!(bytes, [0, 0, 0, 0xCC, 0xBB, 0xAA]);
        assert_eq!(unpack(&bytes, 1, 24), 0x00AA_BBCC);
    }

    #[test]
    fn test_blend_over() {
        let dst = Rgb888::BLACK;
        assert_eq!(Argb8888::new(0xFF, 0xFF, 0, 0).blend_over(dst), Rgb888::RED);
        let half = Argb8888::new(0x80, 0xFF, 0xFF, 0xFF).blend_over(dst);
        assert!((0x7F..=0x81).contains(&half.r));
    }
}
