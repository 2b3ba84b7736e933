//! Rotated, zoomed and affine image pushes
//!
//! A push maps every destination pixel back into the source through the
//! inverse of an [`Affine`] matrix. The inverse is converted to fixed point
//! once, then each destination row is reduced to the single span whose
//! pixel centers land inside the source, so the inner loop is a plain
//! [`PixelCopy`] run with a constant step.
//!
//! Nearest-neighbor pushes ([`push_affine`], [`push_rotate_zoom`]) copy
//! source pixels directly. Anti-aliased pushes go through a [`Compositor`],
//! which samples each span bilinearly into its scratch line and blends the
//! line onto the destination.
//!
//! ## Coordinates
//!
//! Pivot and centre are continuous coordinates: `(0.0, 0.0)` is the top-left
//! corner of the first pixel, `(4.0, 4.0)` the middle of an 8×8 image.
//! Positive angles rotate clockwise on a y-down surface.
//!
//! ```
//! use surfblit::compositor::push_rotate_zoom;
//! use surfblit::{PixelFormat, SourceImage, Sprite, Surface, Transparency};
//! use surfblit::buffer::SystemHeap;
//!
//! let pixels = [0xFFu8; 2 * 2];
//! let image = SourceImage::new(&pixels, PixelFormat::Palette8, 2, 2).unwrap();
//!
//! let mut dst = Sprite::new(PixelFormat::Palette8);
//! dst.create(&mut SystemHeap, 8, 8).unwrap();
//! // 2x zoom around the image centre, centred on (4, 4)
//! push_rotate_zoom(&mut dst, &image, (1.0, 1.0), (4.0, 4.0), 0.0, 2.0, 2.0, Transparency::None)
//!     .unwrap();
//! assert_eq!(dst.read_pixel(2, 2), Ok(0xFF));
//! assert_eq!(dst.read_pixel(5, 5), Ok(0xFF));
//! assert_eq!(dst.read_pixel(6, 6), Ok(0));
//! ```

use alloc::vec::Vec;
use core::f32::consts::PI;
use log::{debug, warn};

use crate::buffer::AllocationSource;
use crate::error::{Error, MAX_SURFACE_DIMENSION};
use crate::format::PixelFormat;
use crate::pixelcopy::{PixelCopy, Sampler, SourceImage, Transparency, FP_HALF, FP_ONE, FP_SCALE};
use crate::rotation::{Rect, Walk};
use crate::surface::{ClipGuard, ClipRect, Surface};

/// Largest inverse step accepted, one source dimension per destination pixel
const MAX_STEP: f32 = (MAX_SURFACE_DIMENSION as f32) * FP_ONE as f32;
/// Largest fixed-point translation representable in a cursor
const MAX_OFFSET: f32 = i32::MAX as f32;
/// Bound applied to destination bounding boxes before integer conversion
const COORD_LIMIT: f32 = 1_048_576.0;

/// 2×3 matrix mapping source coordinates to destination coordinates
///
/// `[m0, m1, m2, m3, m4, m5]` maps (x, y) to
/// `(m0·x + m1·y + m2, m3·x + m4·y + m5)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Affine(pub [f32; 6]);

impl Affine {
    /// Identity mapping
    pub const IDENTITY: Self = Self([1.0, 0.0, 0.0, 0.0, 1.0, 0.0]);

    /// Matrix from its six coefficients
    pub const fn new(m: [f32; 6]) -> Self {
        Self(m)
    }

    /// Rotation by `angle` degrees and zoom around `pivot`, placed at `centre`
    ///
    /// The source point `pivot` lands on the destination point `centre`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidZoom`] unless both zoom factors are finite and
    /// strictly positive.
    pub fn rotate_zoom(
        pivot: (f32, f32),
        centre: (f32, f32),
        angle: f32,
        zoom_x: f32,
        zoom_y: f32,
    ) -> Result<Self, Error> {
        if !(zoom_x.is_finite() && zoom_y.is_finite() && zoom_x > 0.0 && zoom_y > 0.0) {
            debug!("push skipped: zoom {zoom_x}x{zoom_y}");
            return Err(Error::InvalidZoom);
        }
        let rad = libm::fmodf(angle, 360.0) * (PI / 180.0);
        let (sin, cos) = (libm::sinf(rad), libm::cosf(rad));
        let (px, py) = pivot;
        let (cx, cy) = centre;
        let m0 = cos * zoom_x;
        let m1 = -sin * zoom_y;
        let m3 = sin * zoom_x;
        let m4 = cos * zoom_y;
        Ok(Self([
            m0,
            m1,
            cx - px * m0 - py * m1,
            m3,
            m4,
            cy - px * m3 - py * m4,
        ]))
    }

    /// Pure translation
    pub const fn translate(dx: f32, dy: f32) -> Self {
        Self([1.0, 0.0, dx, 0.0, 1.0, dy])
    }

    /// Map a source point
    pub fn transform_point(&self, x: f32, y: f32) -> (f32, f32) {
        let [m0, m1, m2, m3, m4, m5] = self.0;
        (m0 * x + m1 * y + m2, m3 * x + m4 * y + m5)
    }

    /// Inverse matrix in fixed point with [`FP_SCALE`] fractional bits
    ///
    /// # Errors
    ///
    /// Returns [`Error::DegenerateMatrix`] when the matrix is singular, not
    /// finite, or shrinks so far that its inverse steps overflow a cursor.
    pub fn invert_fixed(&self) -> Result<[i32; 6], Error> {
        let [m0, m1, m2, m3, m4, m5] = self.0;
        let det = m0 * m4 - m1 * m3;
        if det == 0.0 || !det.is_finite() {
            return Err(Error::DegenerateMatrix);
        }
        let d = FP_ONE as f32 / det;
        let inverse = [
            d * m4,
            -d * m1,
            d * (m1 * m5 - m2 * m4),
            -d * m3,
            d * m0,
            d * (m2 * m3 - m0 * m5),
        ];
        let in_range = inverse.iter().enumerate().all(|(i, &v)| {
            let limit = if i % 3 == 2 { MAX_OFFSET } else { MAX_STEP };
            libm::fabsf(v) <= limit
        });
        if !in_range {
            return Err(Error::DegenerateMatrix);
        }
        Ok(inverse.map(|v| libm::roundf(v) as i32))
    }
}

impl Default for Affine {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Destination rows and columns touched by the source, within the clip
///
/// `margin` grows the source rectangle on every side, in pixels.
fn target_rect<S: Surface + ?Sized>(
    dst: &S,
    matrix: &Affine,
    src: &SourceImage<'_>,
    margin: f32,
) -> Option<Rect> {
    let (w, h) = (src.width() as f32 + margin, src.height() as f32 + margin);
    let corners = [(-margin, -margin), (w, -margin), (-margin, h), (w, h)];
    let (mut x0, mut y0) = (f32::MAX, f32::MAX);
    let (mut x1, mut y1) = (f32::MIN, f32::MIN);
    for (x, y) in corners {
        let (tx, ty) = matrix.transform_point(x, y);
        x0 = x0.min(tx);
        y0 = y0.min(ty);
        x1 = x1.max(tx);
        y1 = y1.max(ty);
    }
    if !(x0.is_finite() && y0.is_finite() && x1.is_finite() && y1.is_finite()) {
        return None;
    }
    let bound = |v: f32| v.clamp(-COORD_LIMIT, COORD_LIMIT) as i32;
    let left = bound(libm::floorf(x0)) - 1;
    let top = bound(libm::floorf(y0)) - 1;
    let right = bound(libm::ceilf(x1)) + 1;
    let bottom = bound(libm::ceilf(y1)) + 1;
    let rect = Rect::new(left, top, right - left, bottom - top).intersect(&dst.clip().to_rect());
    (!rect.is_empty()).then_some(rect)
}

/// One destination row segment and the source cursor at its first pixel
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Span {
    y: i32,
    left: i32,
    right: i32,
    x32: i32,
    y32: i32,
}

/// Row-by-row spans of a fixed-point inverse mapping over a target rectangle
///
/// Only spans whose first pixel samples inside the source (grown by
/// `margin`) are produced.
struct Spans {
    a: [i64; 6],
    xs1: i64,
    xs2: i64,
    ys1: i64,
    ys2: i64,
    scale_w: i64,
    scale_h: i64,
    margin: i64,
    cl: i64,
    cr: i64,
    y: i32,
    end: i32,
}

impl Spans {
    fn new(inverse: [i32; 6], width: u32, height: u32, target: Rect, margin: i32) -> Self {
        let [a0, a1, mut a2, a3, a4, mut a5] = inverse.map(i64::from);
        let margin = i64::from(margin);

        // Sample pixel centers: half a step along the row, and start one row
        // early since every row advances before use.
        let offset = 2 * i64::from(target.y) - 1;
        a2 += (a0 + a1 * offset) >> 1;
        a5 += (a3 + a4 * offset) >> 1;

        let scale_w = (i64::from(width) << FP_SCALE) + 2 * margin;
        let scale_h = (i64::from(height) << FP_SCALE) + 2 * margin;
        let xs1 = if a0 < 0 { -scale_w } else { 1 } - a0 + margin;
        let xs2 = if a0 < 0 { 0 } else { 1 - scale_w } - a0 + margin;
        let ys1 = if a3 < 0 { -scale_h } else { 1 } - a3 + margin;
        let ys2 = if a3 < 0 { 0 } else { 1 - scale_h } - a3 + margin;

        Self {
            a: [a0, a1, a2, a3, a4, a5],
            xs1,
            xs2,
            ys1,
            ys2,
            scale_w,
            scale_h,
            margin,
            cl: i64::from(target.x),
            cr: i64::from(target.x + target.w),
            y: target.y,
            end: target.y + target.h,
        }
    }

    fn inside(&self, x32: i64, y32: i64) -> bool {
        (0..self.scale_w).contains(&(x32 + self.margin))
            && (0..self.scale_h).contains(&(y32 + self.margin))
    }
}

impl Iterator for Spans {
    type Item = Span;

    fn next(&mut self) -> Option<Span> {
        while self.y < self.end {
            let [a0, a1, _, a3, a4, _] = self.a;
            self.a[2] += a1;
            self.a[5] += a4;
            let (a2, a5) = (self.a[2], self.a[5]);
            let y = self.y;
            self.y += 1;

            let left = self
                .cl
                .max(if a0 != 0 { (a2 + self.xs1) / -a0 } else { self.cl })
                .max(if a3 != 0 { (a5 + self.ys1) / -a3 } else { self.cl });
            let right = self
                .cr
                .min(if a0 != 0 { (a2 + self.xs2) / -a0 } else { self.cr })
                .min(if a3 != 0 { (a5 + self.ys2) / -a3 } else { self.cr });
            if left >= right {
                continue;
            }
            let x32 = a2 + left * a0;
            let y32 = a5 + left * a3;
            if !self.inside(x32, y32) {
                continue;
            }
            return Some(Span {
                y,
                left: left as i32,
                right: right as i32,
                x32: x32 as i32,
                y32: y32 as i32,
            });
        }
        None
    }
}

/// Push `src` through `matrix`, nearest neighbor
///
/// # Errors
///
/// Returns [`Error::DegenerateMatrix`] for a singular matrix and the errors
/// of [`PixelCopy::new`]. A source that misses the clip is not an error.
pub fn push_affine<S: Surface + ?Sized>(
    dst: &mut S,
    src: &SourceImage<'_>,
    matrix: &Affine,
    transparency: Transparency,
) -> Result<(), S::Error> {
    let inverse = matrix
        .invert_fixed()
        .inspect_err(|_| debug!("push skipped: degenerate matrix {:?}", matrix.0))?;
    let Some(target) = target_rect(dst, matrix, src, 0.0) else {
        debug!("push skipped: nothing inside the clip");
        return Ok(());
    };
    let mut copy = PixelCopy::new(*src, dst.pixel_format(), dst.palette(), transparency)?;
    let spans = Spans::new(inverse, src.width(), src.height(), target, 0);

    let mut guard = ClipGuard::new(dst, ClipRect::from_rect(target));
    for span in spans {
        copy.walk = Walk {
            x32: span.x32,
            y32: span.y32,
            add_x: inverse[0],
            add_y: inverse[3],
            next_x: 0,
            next_y: 0,
        };
        let rect = Rect::new(span.left, span.y, span.right - span.left, 1);
        guard.write_image(rect, &mut copy)?;
    }
    Ok(())
}

/// Push `src` rotated by `angle` degrees and zoomed around `pivot`, placed at `centre`
///
/// # Errors
///
/// See [`Affine::rotate_zoom`] and [`push_affine`].
#[allow(clippy::too_many_arguments)]
pub fn push_rotate_zoom<S: Surface + ?Sized>(
    dst: &mut S,
    src: &SourceImage<'_>,
    pivot: (f32, f32),
    centre: (f32, f32),
    angle: f32,
    zoom_x: f32,
    zoom_y: f32,
    transparency: Transparency,
) -> Result<(), S::Error> {
    let matrix = Affine::rotate_zoom(pivot, centre, angle, zoom_x, zoom_y)?;
    push_affine(dst, src, &matrix, transparency)
}

/// Anti-aliased compositing with an owned scratch line
///
/// The line holds one destination row of `Argb8888` samples. Create the
/// compositor once, sized for the widest destination, and reuse it.
#[derive(Clone, Debug, Default)]
pub struct Compositor {
    line: Vec<u8>,
}

impl Compositor {
    /// Compositor with an empty scratch line, grown on first use
    pub fn new() -> Self {
        Self::default()
    }

    /// Compositor with a scratch line for rows up to `width` pixels
    ///
    /// # Errors
    ///
    /// Returns [`Error::AllocationFailed`] if the line cannot be allocated.
    pub fn with_capacity(width: u32) -> Result<Self, Error> {
        let mut compositor = Self::new();
        compositor.line(width as usize)?;
        Ok(compositor)
    }

    /// Scratch line capacity in pixels
    pub fn capacity(&self) -> usize {
        self.line.len() / 4
    }

    fn line(&mut self, pixels: usize) -> Result<&mut [u8], Error> {
        let bytes = pixels * 4;
        if self.line.len() < bytes {
            self.line
                .try_reserve_exact(bytes - self.line.len())
                .map_err(|_| {
                    warn!("compositor line of {bytes} bytes could not be allocated");
                    Error::AllocationFailed {
                        requested: bytes,
                        source: AllocationSource::Normal,
                    }
                })?;
            self.line.resize(bytes, 0);
        }
        Ok(&mut self.line[..bytes])
    }

    /// Push `src` through `matrix` with bilinear filtering
    ///
    /// Edges fade out over half a pixel and are blended with the destination.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedConversion`] for palette-indexed
    /// destinations, [`Error::DegenerateMatrix`] for a singular matrix, and
    /// [`Error::MissingPalette`] for a palette source without palette.
    pub fn push_affine_aa<S: Surface + ?Sized>(
        &mut self,
        dst: &mut S,
        src: &SourceImage<'_>,
        matrix: &Affine,
        transparency: Transparency,
    ) -> Result<(), S::Error> {
        let dst_format = dst.pixel_format();
        if dst_format.is_palette() {
            return Err(Error::UnsupportedConversion {
                src: src.format(),
                dst: dst_format,
            }
            .into());
        }
        let inverse = matrix
            .invert_fixed()
            .inspect_err(|_| debug!("push skipped: degenerate matrix {:?}", matrix.0))?;
        let Some(target) = target_rect(dst, matrix, src, 0.5) else {
            debug!("push skipped: nothing inside the clip");
            return Ok(());
        };
        let sampler = Sampler::new(*src, transparency)?;
        let spans = Spans::new(inverse, src.width(), src.height(), target, FP_HALF);

        let mut guard = ClipGuard::new(dst, ClipRect::from_rect(target));
        for span in spans {
            let len = (span.right - span.left) as usize;
            let line = self.line(len)?;
            let (mut x32, mut y32) = (span.x32, span.y32);
            for px in line.chunks_exact_mut(4) {
                let color = sampler.sample_bilinear(x32, y32);
                px.copy_from_slice(&color.to_raw().to_le_bytes());
                x32 += inverse[0];
                y32 += inverse[3];
            }
            let image = SourceImage::new(line, PixelFormat::Argb8888, len as u32, 1)?;
            let mut copy = PixelCopy::new(image, dst_format, None, Transparency::Alpha)?;
            guard.write_image(Rect::new(span.left, span.y, len as i32, 1), &mut copy)?;
        }
        Ok(())
    }

    /// Anti-aliased [`push_rotate_zoom`]
    ///
    /// # Errors
    ///
    /// See [`Affine::rotate_zoom`] and [`Compositor::push_affine_aa`].
    #[allow(clippy::too_many_arguments)]
    pub fn push_rotate_zoom_aa<S: Surface + ?Sized>(
        &mut self,
        dst: &mut S,
        src: &SourceImage<'_>,
        pivot: (f32, f32),
        centre: (f32, f32),
        angle: f32,
        zoom_x: f32,
        zoom_y: f32,
        transparency: Transparency,
    ) -> Result<(), S::Error> {
        let matrix = Affine::rotate_zoom(pivot, centre, angle, zoom_x, zoom_y)?;
        self.push_affine_aa(dst, src, &matrix, transparency)
    }
}
