//! Pixel format descriptions
//!
//! A [`PixelFormat`] describes how one pixel is laid out in memory: its bit
//! depth, whether it is a palette index or a direct color, and the order of
//! the color channels. The numeric [`code`](PixelFormat::code) of every
//! variant is stable and can be exchanged with panel drivers and decoders.
//!
//! ## Packing
//!
//! | Variant          | bpp     | Memory layout                        |
//! |------------------|---------|--------------------------------------|
//! | `Palette1/2/4/8` | 1/2/4/8 | index, MSB-first within a byte       |
//! | `Rgb332`         | 8       | `RRRGGGBB`                           |
//! | `Grayscale8`     | 8       | luminance                            |
//! | `Rgb565`         | 16      | little-endian `RRRRRGGGGGGBBBBB`     |
//! | `Rgb565Be`       | 16      | big-endian (SPI wire order)          |
//! | `Rgb666`         | 24      | `[R, G, B]`, value in the upper 6 bits |
//! | `Rgb888`         | 24      | `[R, G, B]`                          |
//! | `Bgr888`         | 24      | `[B, G, R]`                          |
//! | `Argb8888`       | 32      | little-endian `AARRGGBB`             |
//!
//! A *raw value* is the pixel's bytes read as a little-endian integer.
//!
//! ## Example
//!
//! ```
//! use surfblit::PixelFormat;
//!
//! let fmt = PixelFormat::Palette4;
//! assert_eq!(fmt.bits_per_pixel(), 4);
//! assert_eq!(fmt.bytes_per_pixel(), 0);
//! // 5 pixels at 4 bpp round up to 6 pixels (3 bytes) per row
//! assert_eq!(fmt.row_bytes(5), 3);
//! ```

/// Flag bit marking a palette-indexed format
const PALETTE_FLAG: u16 = 0x0800;
/// Flag bit marking a byte-swapped (wire order) format
const SWAPPED_FLAG: u16 = 0x0100;
/// Flag bit marking an alternate encoding at the same depth
const ALTERNATE_FLAG: u16 = 0x1000;

/// Pixel encoding
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum PixelFormat {
    /// 1-bit palette index
    Palette1 = PALETTE_FLAG | 1,
    /// 2-bit palette index
    Palette2 = PALETTE_FLAG | 2,
    /// 4-bit palette index
    Palette4 = PALETTE_FLAG | 4,
    /// 8-bit palette index
    Palette8 = PALETTE_FLAG | 8,
    /// 8-bit `RRRGGGBB`
    Rgb332 = 8,
    /// 8-bit luminance
    Grayscale8 = ALTERNATE_FLAG | 8,
    /// 16-bit RGB565, little-endian in memory
    #[default]
    Rgb565 = 16,
    /// 16-bit RGB565, big-endian in memory
    Rgb565Be = SWAPPED_FLAG | 16,
    /// 18-bit color stored in three bytes
    Rgb666 = ALTERNATE_FLAG | 24,
    /// 24-bit color, red first
    Rgb888 = 24,
    /// 24-bit color, blue first
    Bgr888 = SWAPPED_FLAG | 24,
    /// 32-bit color with alpha
    Argb8888 = 32,
}

/// Order of the color channels in memory
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelOrder {
    /// Red is stored in the most significant field (or first byte)
    Rgb,
    /// Blue is stored first
    Bgr,
}

/// Channel layout of a direct-color format
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Channels {
    /// Channel order
    pub order: ChannelOrder,
    /// Red channel width in bits
    pub red: u8,
    /// Green channel width in bits
    pub green: u8,
    /// Blue channel width in bits
    pub blue: u8,
    /// Alpha channel width in bits (0 when absent)
    pub alpha: u8,
}

impl Channels {
    const fn rgb(red: u8, green: u8, blue: u8) -> Self {
        Self {
            order: ChannelOrder::Rgb,
            red,
            green,
            blue,
            alpha: 0,
        }
    }
}

impl PixelFormat {
    /// All formats, in code order
    pub const ALL: [Self; 12] = [
        Self::Palette1,
        Self::Palette2,
        Self::Palette4,
        Self::Palette8,
        Self::Rgb332,
        Self::Grayscale8,
        Self::Rgb565,
        Self::Rgb565Be,
        Self::Rgb666,
        Self::Rgb888,
        Self::Bgr888,
        Self::Argb8888,
    ];

    /// Stable numeric code
    pub const fn code(self) -> u16 {
        self as u16
    }

    /// Look a format up by its numeric code
    pub fn from_code(code: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.code() == code)
    }

    /// Bits per pixel
    pub const fn bits_per_pixel(self) -> u8 {
        (self.code() & 0xFF) as u8
    }

    /// Bytes per pixel, 0 for sub-byte formats
    pub const fn bytes_per_pixel(self) -> usize {
        (self.bits_per_pixel() >> 3) as usize
    }

    /// Whether pixels are palette indices
    pub const fn is_palette(self) -> bool {
        self.code() & PALETTE_FLAG != 0
    }

    /// Number of entries a palette for this format holds
    pub const fn palette_len(self) -> usize {
        if self.is_palette() {
            1 << self.bits_per_pixel()
        } else {
            0
        }
    }

    /// Channel layout, `None` for palette and luminance formats
    pub const fn channels(self) -> Option<Channels> {
        match self {
            Self::Palette1 | Self::Palette2 | Self::Palette4 | Self::Palette8 => None,
            Self::Rgb332 => Some(Channels::rgb(3, 3, 2)),
            Self::Grayscale8 => None,
            Self::Rgb565 | Self::Rgb565Be => Some(Channels::rgb(5, 6, 5)),
            Self::Rgb666 => Some(Channels::rgb(6, 6, 6)),
            Self::Rgb888 => Some(Channels::rgb(8, 8, 8)),
            Self::Bgr888 => Some(Channels {
                order: ChannelOrder::Bgr,
                ..Channels::rgb(8, 8, 8)
            }),
            Self::Argb8888 => Some(Channels {
                alpha: 8,
                ..Channels::rgb(8, 8, 8)
            }),
        }
    }

    /// Mask covering one raw value
    pub const fn mask(self) -> u32 {
        match self.bits_per_pixel() {
            32 => u32::MAX,
            bits => (1u32 << bits) - 1,
        }
    }

    /// Pixels per byte minus one
    ///
    /// Rows of sub-byte formats are padded to a multiple of `row_alignment() + 1`
    /// pixels so that every row starts on a byte boundary.
    pub const fn row_alignment(self) -> u32 {
        7 >> (self.bits_per_pixel() >> 1)
    }

    /// Row width in pixels after padding to a whole byte
    pub const fn padded_width(self, width: u32) -> u32 {
        let align = self.row_alignment();
        (width + align) & !align
    }

    /// Bytes per buffer row for `width` pixels
    pub const fn row_bytes(self, width: u32) -> usize {
        self.padded_width(width) as usize * self.bits_per_pixel() as usize / 8
    }

    /// Buffer size in bytes for a `width`×`height` image
    pub const fn buffer_size(self, width: u32, height: u32) -> usize {
        self.row_bytes(width) * height as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable_and_unique() {
        assert_eq!(PixelFormat::Rgb565.code(), 0x0010);
        assert_eq!(PixelFormat::Palette4.code(), 0x0804);
        assert_eq!(PixelFormat::Bgr888.code(), 0x0118);
        for fmt in PixelFormat::ALL {
            assert_eq!(PixelFormat::from_code(fmt.code()), Some(fmt));
        }
        assert_eq!(PixelFormat::from_code(0x0007), None);
    }

    #[test]
    fn test_sub_byte_formats_are_palette() {
        for fmt in PixelFormat::ALL {
            if fmt.bits_per_pixel() < 8 {
                assert!(fmt.is_palette(), "{fmt:?}");
                assert_eq!(fmt.bytes_per_pixel(), 0);
            }
        }
    }

    #[test]
    fn test_row_alignment() {
        assert_eq!(PixelFormat::Palette1.row_alignment(), 7);
        assert_eq!(PixelFormat::Palette2.row_alignment(), 3);
        assert_eq!(PixelFormat::Palette4.row_alignment(), 1);
        assert_eq!(PixelFormat::Palette8.row_alignment(), 0);
        assert_eq!(PixelFormat::Argb8888.row_alignment(), 0);
    }

    #[test]
    fn test_row_bytes() {
        assert_eq!(PixelFormat::Palette1.row_bytes(9), 2);
        assert_eq!(PixelFormat::Palette2.row_bytes(5), 2);
        assert_eq!(PixelFormat::Rgb565.row_bytes(10), 20);
        assert_eq!(PixelFormat::Rgb888.row_bytes(3), 9);
        assert_eq!(PixelFormat::Argb8888.buffer_size(4, 2), 32);
    }

    #[test]
    fn test_mask() {
        assert_eq!(PixelFormat::Palette2.mask(), 0x3);
        assert_eq!(PixelFormat::Rgb565Be.mask(), 0xFFFF);
        assert_eq!(PixelFormat::Argb8888.mask(), u32::MAX);
    }
}
