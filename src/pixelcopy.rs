//! Scanline pixel transfer
//!
//! [`PixelCopy`] streams pixels from a [`SourceImage`] into a destination
//! byte buffer, converting formats and honoring transparency. A scanline is
//! consumed by alternating two calls:
//!
//! - [`copy_run`](PixelCopy::copy_run) writes pixels until the end of the
//!   span or until a transparent (or out-of-range) source pixel is reached.
//! - [`skip_run`](PixelCopy::skip_run) advances past transparent pixels
//!   without touching the destination.
//!
//! The "draw or skip" decision is therefore paid once per run, not once per
//! pixel. The conversion strategy ([`CopyKind`]) is selected once, when the
//! copier is created.
//!
//! Source traversal uses a fixed-point cursor with [`FP_SCALE`] fractional
//! bits, advanced by a per-pixel step. Pixels whose cursor falls outside the
//! source are treated as transparent, so rotated and zoomed pushes need no
//! bounds checks beyond the caller's geometry setup.
//!
//! ## Example
//!
//! ```
//! use surfblit::pixelcopy::{PixelCopy, SourceImage, Transparency};
//! use surfblit::PixelFormat;
//!
//! // Four RGB565 pixels, the third one is the transparent key
//! let src = [0x11, 0x11, 0x22, 0x22, 0x00, 0x00, 0x44, 0x44];
//! let image = SourceImage::new(&src, PixelFormat::Rgb565, 4, 1).unwrap();
//! let mut copy = PixelCopy::new(image, PixelFormat::Rgb565, None, Transparency::Key(0)).unwrap();
//!
//! let mut dst = [0xFFu8; 8];
//! assert_eq!(copy.copy_run(&mut dst, 0, 4), 2);
//! assert_eq!(copy.skip_run(2, 4), 3);
//! assert_eq!(copy.copy_run(&mut dst, 3, 4), 4);
//! assert_eq!(dst, [0x11, 0x11, 0x22, 0x22, 0xFF, 0xFF, 0x44, 0x44]);
//! ```

use alloc::vec::Vec;
use log::{trace, warn};

use crate::color::{pack, unpack, Argb8888, Palette, Rgb888};
use crate::error::{Error, MAX_SURFACE_DIMENSION};
use crate::format::PixelFormat;
use crate::rotation::Walk;

/// Fractional bits of a fixed-point source cursor
pub const FP_SCALE: u32 = 16;
/// One pixel in fixed point
pub const FP_ONE: i32 = 1 << FP_SCALE;
/// Half a pixel in fixed point
pub const FP_HALF: i32 = FP_ONE >> 1;

/// Marker for palette entries with no counterpart in the destination palette
const UNMAPPED: u32 = u32::MAX;

/// Read-only pixel source
#[derive(Clone, Copy, Debug)]
pub struct SourceImage<'a> {
    data: &'a [u8],
    format: PixelFormat,
    width: u32,
    height: u32,
    stride: u32,
    palette: Option<&'a Palette>,
}

impl<'a> SourceImage<'a> {
    /// Describe `width`×`height` pixels of `format` stored in `data`
    ///
    /// Rows are expected to be tightly packed, padded to a whole byte for
    /// sub-byte formats.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDimensions`] for an empty or oversized image and
    /// [`Error::BufferTooSmall`] if `data` cannot hold it.
    pub fn new(data: &'a [u8], format: PixelFormat, width: u32, height: u32) -> Result<Self, Error> {
        Self {
            data,
            format,
            width,
            height,
            stride: format.padded_width(width),
            palette: None,
        }
        .validated()
    }

    /// Use a row stride of `stride` pixels instead of the packed width
    ///
    /// # Errors
    ///
    /// Returns [`Error::BufferTooSmall`] if `data` cannot hold the padded rows.
    pub fn with_stride(self, stride: u32) -> Result<Self, Error> {
        Self {
            stride: self.format.padded_width(stride.max(self.width)),
            ..self
        }
        .validated()
    }

    /// Attach the palette used to decode palette indices
    pub fn with_palette(self, palette: &'a Palette) -> Self {
        Self {
            palette: Some(palette),
            ..self
        }
    }

    fn validated(self) -> Result<Self, Error> {
        if self.width == 0
            || self.height == 0
            || self.width > MAX_SURFACE_DIMENSION
            || self.height > MAX_SURFACE_DIMENSION
        {
            return Err(Error::InvalidDimensions {
                width: self.width,
                height: self.height,
            });
        }
        let required = self.format.buffer_size(self.stride, self.height);
        if self.data.len() < required {
            return Err(Error::BufferTooSmall {
                required,
                provided: self.data.len(),
            });
        }
        Ok(self)
    }

    /// Pixel format
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Width in pixels
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Row stride in pixels
    pub fn stride(&self) -> u32 {
        self.stride
    }

    /// Palette, if attached
    pub fn palette(&self) -> Option<&'a Palette> {
        self.palette
    }

    /// Raw bytes
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Raw value at (`x`, `y`), which must be inside the image
    #[inline]
    pub fn raw(&self, x: u32, y: u32) -> u32 {
        unpack(
            self.data,
            (y * self.stride + x) as usize,
            self.format.bits_per_pixel(),
        )
    }

    /// Raw value under a fixed-point cursor, `None` outside the image
    #[inline]
    fn raw_at(&self, x32: i32, y32: i32) -> Option<u32> {
        let sx = (x32 >> FP_SCALE) as u32;
        let sy = (y32 >> FP_SCALE) as u32;
        (sx < self.width && sy < self.height).then(|| self.raw(sx, sy))
    }

    /// Visit every pixel's raw value
    fn for_each_raw(&self, mut f: impl FnMut(u32) -> Result<(), Error>) -> Result<(), Error> {
        for y in 0..self.height {
            for x in 0..self.width {
                f(self.raw(x, y))?;
            }
        }
        Ok(())
    }
}

/// How source pixels are excluded from a copy
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Transparency {
    /// Every pixel is drawn
    #[default]
    None,
    /// Pixels whose raw source value equals the key are skipped
    Key(u32),
    /// Per-pixel alpha of an `Argb8888` source: 0 skipped, 255 copied,
    /// anything else blended with the destination
    Alpha,
}

/// Conversion strategy, chosen once per blit
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CopyKind {
    /// Identical formats, bytes copied unchanged
    Raw,
    /// Palette index copied into a palette destination of another depth
    Index,
    /// Palette index translated through a table
    Lut(Vec<u32>),
    /// Direct color converted to another direct format
    Convert,
    /// Direct color mapped onto an exact destination palette entry, as
    /// `(raw, index)` pairs sorted by raw value
    Remap(Vec<(u32, u32)>),
    /// Direct color blended by source alpha
    Alpha,
}

/// Format-converting scanline copier
#[derive(Clone, Debug)]
pub struct PixelCopy<'a> {
    src: SourceImage<'a>,
    dst_format: PixelFormat,
    transparency: Transparency,
    kind: CopyKind,
    /// Source cursor, per-pixel step and per-row step
    pub walk: Walk,
}

impl<'a> PixelCopy<'a> {
    /// Prepare a copy from `src` to pixels of `dst_format`
    ///
    /// The cursor starts at the source origin and steps one pixel to the
    /// right per destination pixel, one row down per destination row.
    ///
    /// # Errors
    ///
    /// - [`Error::MissingPalette`] when a palette is needed but absent
    /// - [`Error::PaletteMiss`] when a source color has no exact entry in
    ///   `dst_palette`; the whole source is checked before anything is drawn,
    ///   including pixels the destination clip will later drop, so a miss
    ///   anywhere in the image rejects the blit
    /// - [`Error::UnsupportedConversion`] for alpha blending onto a palette
    pub fn new(
        src: SourceImage<'a>,
        dst_format: PixelFormat,
        dst_palette: Option<&Palette>,
        transparency: Transparency,
    ) -> Result<Self, Error> {
        let src_format = src.format();
        let transparency = match transparency {
            Transparency::Alpha if src_format != PixelFormat::Argb8888 => Transparency::None,
            t => t,
        };
        let is_transparent = |raw: u32| transparent(transparency, raw);

        let kind = if transparency == Transparency::Alpha {
            if dst_format.is_palette() {
                return Err(Error::UnsupportedConversion {
                    src: src_format,
                    dst: dst_format,
                });
            }
            CopyKind::Alpha
        } else if src_format.is_palette() {
            let shares_palette =
                src.palette().is_none() || dst_palette.is_none() || src.palette() == dst_palette;
            if dst_format.is_palette() && shares_palette {
                if src_format == dst_format {
                    CopyKind::Raw
                } else {
                    CopyKind::Index
                }
            } else {
                let src_palette = src.palette().ok_or(Error::MissingPalette)?;
                let lut = palette_lut(src_format, src_palette, dst_format, dst_palette);
                if lut.contains(&UNMAPPED) {
                    src.for_each_raw(|raw| match lut.get(raw as usize) {
                        Some(&UNMAPPED) if !is_transparent(raw) => Err(Error::PaletteMiss {
                            color: src_palette.get(raw).unwrap_or_default(),
                        }),
                        _ => Ok(()),
                    })
                    .inspect_err(|e| warn!("blit rejected: {e}"))?;
                }
                CopyKind::Lut(lut)
            }
        } else if dst_format.is_palette() {
            let palette = dst_palette.ok_or(Error::MissingPalette)?;
            let mut table: Vec<(u32, u32)> = Vec::new();
            src.for_each_raw(|raw| {
                if is_transparent(raw) {
                    return Ok(());
                }
                let Err(slot) = table.binary_search_by_key(&raw, |&(r, _)| r) else {
                    return Ok(());
                };
                let color = Rgb888::from_raw(src_format, raw);
                let index = palette.index_of(color).ok_or(Error::PaletteMiss { color })?;
                table.insert(slot, (raw, index));
                Ok(())
            })
            .inspect_err(|e| warn!("blit rejected: {e}"))?;
            CopyKind::Remap(table)
        } else if src_format == dst_format {
            CopyKind::Raw
        } else {
            CopyKind::Convert
        };

        Ok(Self {
            src,
            dst_format,
            transparency,
            kind,
            walk: Walk {
                x32: 0,
                y32: 0,
                add_x: FP_ONE,
                add_y: 0,
                next_x: 0,
                next_y: FP_ONE,
            },
        })
    }

    /// Selected conversion strategy
    pub fn kind(&self) -> &CopyKind {
        &self.kind
    }

    /// Source image
    pub fn source(&self) -> &SourceImage<'a> {
        &self.src
    }

    /// Transparency mode in effect
    pub fn transparency(&self) -> Transparency {
        self.transparency
    }

    /// Destination format
    pub fn dst_format(&self) -> PixelFormat {
        self.dst_format
    }

    /// Whether pixels are copied unchanged with nothing skipped
    pub fn is_raw(&self) -> bool {
        self.kind == CopyKind::Raw && self.transparency == Transparency::None
    }

    /// Whether the cursor walks the source one pixel per destination pixel
    pub fn is_unit_step(&self) -> bool {
        self.walk.add_x == FP_ONE && self.walk.add_y == 0
    }

    /// Place the cursor on source pixel (`x`, `y`)
    pub fn set_origin(&mut self, x: i32, y: i32) {
        self.walk.x32 = x << FP_SCALE;
        self.walk.y32 = y << FP_SCALE;
    }

    /// Write pixels `[start, end)` of `dst`, returning the index reached
    ///
    /// Stops early, without advancing past it, at the first source pixel that
    /// is transparent or outside the source image.
    pub fn copy_run(&mut self, dst: &mut [u8], start: usize, end: usize) -> usize {
        let src = &self.src;
        let walk = &mut self.walk;
        let t = self.transparency;
        let df = self.dst_format;
        let bits = df.bits_per_pixel();
        match &self.kind {
            CopyKind::Raw => {
                if t == Transparency::None && bits >= 8 && walk.add_x == FP_ONE && walk.add_y == 0 {
                    return raw_span(src, walk, dst, start, end);
                }
                run(src, walk, t, start, end, |i, raw| pack(dst, i, bits, raw))
            }
            CopyKind::Index => run(src, walk, t, start, end, |i, raw| {
                pack(dst, i, bits, raw & df.mask());
            }),
            CopyKind::Lut(lut) => run(src, walk, t, start, end, |i, raw| {
                pack(dst, i, bits, lut.get(raw as usize).copied().unwrap_or(0));
            }),
            CopyKind::Convert => {
                let sf = src.format();
                run(src, walk, t, start, end, |i, raw| {
                    pack(dst, i, bits, Rgb888::from_raw(sf, raw).to_raw(df));
                })
            }
            CopyKind::Remap(table) => run(src, walk, t, start, end, |i, raw| {
                let index = table
                    .binary_search_by_key(&raw, |&(r, _)| r)
                    .map_or(0, |slot| table[slot].1);
                pack(dst, i, bits, index);
            }),
            CopyKind::Alpha => run(src, walk, t, start, end, |i, raw| {
                let color = Argb8888::from_raw(raw);
                let out = if color.a == 0xFF {
                    color.rgb()
                } else {
                    color.blend_over(Rgb888::from_raw(df, unpack(dst, i, bits)))
                };
                pack(dst, i, bits, out.to_raw(df));
            }),
        }
    }

    /// Advance past transparent pixels `[start, end)`, returning the index reached
    ///
    /// Stops at the first source pixel that would be drawn.
    pub fn skip_run(&mut self, start: usize, end: usize) -> usize {
        let mut i = start;
        while i < end {
            if let Some(raw) = self.src.raw_at(self.walk.x32, self.walk.y32) {
                if !transparent(self.transparency, raw) {
                    break;
                }
            }
            self.walk.x32 += self.walk.add_x;
            self.walk.y32 += self.walk.add_y;
            i += 1;
        }
        i
    }

    /// Fill `[start, end)` by alternating copy and skip runs
    pub fn blit_span(&mut self, dst: &mut [u8], start: usize, end: usize) {
        let mut pos = start;
        while pos < end {
            pos = self.copy_run(dst, pos, end);
            if pos < end {
                pos = self.skip_run(pos, end);
            }
        }
    }
}

#[inline]
fn transparent(transparency: Transparency, raw: u32) -> bool {
    match transparency {
        Transparency::None => false,
        Transparency::Key(key) => raw == key,
        Transparency::Alpha => raw >> 24 == 0,
    }
}

/// Per-pixel copy loop shared by every strategy
#[inline]
fn run(
    src: &SourceImage<'_>,
    walk: &mut Walk,
    transparency: Transparency,
    start: usize,
    end: usize,
    mut write: impl FnMut(usize, u32),
) -> usize {
    let mut i = start;
    while i < end {
        let Some(raw) = src.raw_at(walk.x32, walk.y32) else {
            break;
        };
        if transparent(transparency, raw) {
            break;
        }
        write(i, raw);
        walk.x32 += walk.add_x;
        walk.y32 += walk.add_y;
        i += 1;
    }
    i
}

/// Byte copy of a unit-step span of identical whole-byte pixels
fn raw_span(src: &SourceImage<'_>, walk: &mut Walk, dst: &mut [u8], start: usize, end: usize) -> usize {
    let sx = walk.x32 >> FP_SCALE;
    let sy = walk.y32 >> FP_SCALE;
    if sx < 0 || sy < 0 || sx as u32 >= src.width() || sy as u32 >= src.height() {
        return start;
    }
    let n = (end - start).min((src.width() - sx as u32) as usize);
    let bytes = src.format().bytes_per_pixel();
    let from = (sy as u32 * src.stride() + sx as u32) as usize * bytes;
    let to = start * bytes;
    trace!("raw copy of {n} pixels");
    dst[to..to + n * bytes].copy_from_slice(&src.data()[from..from + n * bytes]);
    walk.x32 += (n as i32) << FP_SCALE;
    start + n
}

/// Destination raw value for every index of a palette source
fn palette_lut(
    src_format: PixelFormat,
    src_palette: &Palette,
    dst_format: PixelFormat,
    dst_palette: Option<&Palette>,
) -> Vec<u32> {
    (0..src_format.palette_len() as u32)
        .map(|i| {
            let color = src_palette.get(i).unwrap_or_default();
            match dst_palette {
                Some(palette) if dst_format.is_palette() => palette
                    .index_of(color)
                    .filter(|&index| index <= dst_format.mask())
                    .unwrap_or(UNMAPPED),
                _ => color.to_raw(dst_format),
            }
        })
        .collect()
}

/// Bilinear sampler producing `Argb8888` coverage for anti-aliased pushes
#[derive(Clone, Debug)]
pub struct Sampler<'a> {
    src: SourceImage<'a>,
    transparency: Transparency,
    colors: Vec<Rgb888>,
}

impl<'a> Sampler<'a> {
    /// Prepare sampling of `src`
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingPalette`] for a palette source without palette.
    pub fn new(src: SourceImage<'a>, transparency: Transparency) -> Result<Self, Error> {
        let transparency = match transparency {
            Transparency::Alpha if src.format() != PixelFormat::Argb8888 => Transparency::None,
            t => t,
        };
        let colors = if src.format().is_palette() {
            let palette = src.palette().ok_or(Error::MissingPalette)?;
            (0..src.format().palette_len() as u32)
                .map(|i| palette.get(i).unwrap_or_default())
                .collect()
        } else {
            Vec::new()
        };
        Ok(Self {
            src,
            transparency,
            colors,
        })
    }

    /// Color and alpha of the source pixel (`x`, `y`), `None` if excluded
    fn texel(&self, x: i32, y: i32) -> Option<(Rgb888, u32)> {
        if x < 0 || y < 0 || x as u32 >= self.src.width() || y as u32 >= self.src.height() {
            return None;
        }
        let raw = self.src.raw(x as u32, y as u32);
        if transparent(self.transparency, raw) {
            return None;
        }
        let format = self.src.format();
        if format.is_palette() {
            return Some((self.colors.get(raw as usize).copied().unwrap_or_default(), 255));
        }
        let alpha = match self.transparency {
            Transparency::Alpha => raw >> 24,
            _ => 255,
        };
        Some((Rgb888::from_raw(format, raw), alpha))
    }

    /// Blend of the four source pixels around a fixed-point position
    ///
    /// Pixel centers sit at half-pixel offsets. Neighbours outside the source
    /// or excluded by transparency contribute no coverage, so edges fade out
    /// instead of wrapping or extrapolating.
    pub fn sample_bilinear(&self, x32: i32, y32: i32) -> Argb8888 {
        let x = x32 - FP_HALF;
        let y = y32 - FP_HALF;
        let (x0, y0) = (x >> FP_SCALE, y >> FP_SCALE);
        let fx = ((x >> (FP_SCALE - 8)) & 0xFF) as u32;
        let fy = ((y >> (FP_SCALE - 8)) & 0xFF) as u32;
        let taps = [
            (x0, y0, (256 - fx) * (256 - fy)),
            (x0 + 1, y0, fx * (256 - fy)),
            (x0, y0 + 1, (256 - fx) * fy),
            (x0 + 1, y0 + 1, fx * fy),
        ];

        let (mut r, mut g, mut b, mut a) = (0u32, 0u32, 0u32, 0u32);
        for (tx, ty, weight) in taps {
            if weight == 0 {
                continue;
            }
            if let Some((color, alpha)) = self.texel(tx, ty) {
                let w = weight * alpha / 255;
                r += color.r as u32 * w;
                g += color.g as u32 * w;
                b += color.b as u32 * w;
                a += w;
            }
        }
        if a == 0 {
            return Argb8888::TRANSPARENT;
        }
        Argb8888::new(
            (a >> 8).min(255) as u8,
            (r / a) as u8,
            (g / a) as u8,
            (b / a) as u8,
        )
    }
}
