//! In-memory surfaces
//!
//! A [`Sprite`] owns (or borrows) a pixel buffer in any [`PixelFormat`],
//! including packed sub-byte palette formats. It implements [`Surface`], so
//! it can be drawn on like a panel, and it can itself be pushed onto any
//! other surface: plainly, rotated and zoomed, or through an arbitrary
//! affine matrix.
//!
//! Pixels are stored in the physical (unrotated) layout. The sprite's own
//! [`Rotation`] only changes how drawing coordinates map into the buffer;
//! pushing a sprite always reads its physical buffer.
//!
//! ## Example
//!
//! ```
//! use surfblit::buffer::SystemHeap;
//! use surfblit::color::Rgb888;
//! use surfblit::{PixelFormat, Rect, Sprite, Surface, Transparency};
//!
//! let mut icon = Sprite::new(PixelFormat::Palette2);
//! icon.create(&mut SystemHeap, 4, 4).unwrap();
//! let white = icon.palette_index(Rgb888::WHITE).unwrap();
//! icon.fill_rect(Rect::new(1, 1, 2, 2), white).unwrap();
//!
//! let mut screen = Sprite::new(PixelFormat::Rgb565);
//! screen.create(&mut SystemHeap, 16, 16).unwrap();
//! icon.push_sprite(&mut screen, 6, 6, Transparency::Key(0)).unwrap();
//! assert_eq!(screen.read_pixel(7, 7), Ok(0xFFFF));
//! assert_eq!(screen.read_pixel(6, 6), Ok(0));
//! ```

use alloc::vec::Vec;
use log::{debug, warn};

use crate::buffer::{AllocationSource, MemoryPool, SurfaceBuffer};
use crate::color::{self, pack, unpack, Palette, Rgb888};
use crate::compositor::{self, Affine, Compositor};
use crate::config::Config;
use crate::error::{Error, MAX_SURFACE_DIMENSION};
use crate::format::PixelFormat;
use crate::pixelcopy::{PixelCopy, SourceImage, Transparency, FP_SCALE};
use crate::rotation::{rotate_walk, transform_point, transform_rect, Rect, Rotation, Walk};
use crate::surface::{ClipRect, Surface, Window};

/// In-memory surface
#[derive(Debug)]
pub struct Sprite<'a> {
    buffer: SurfaceBuffer<'a>,
    format: PixelFormat,
    palette: Option<Palette>,
    rotation: Rotation,
    /// Physical width in pixels
    panel_width: u32,
    /// Physical height in pixels
    panel_height: u32,
    /// Physical row stride in pixels
    bitwidth: u32,
    clip: ClipRect,
    window: Window,
    pivot: (f32, f32),
    /// Region moved by `scroll`
    scroll: Rect,
    /// Fill for the strip `scroll` exposes
    base_color: Rgb888,
    /// One physical row, for sub-byte rectangle copies
    scratch: Vec<u8>,
    memory: AllocationSource,
}

fn check_dimensions(width: u32, height: u32) -> Result<(), Error> {
    if width == 0 || height == 0 || width > MAX_SURFACE_DIMENSION || height > MAX_SURFACE_DIMENSION {
        return Err(Error::InvalidDimensions { width, height });
    }
    Ok(())
}

impl<'a> Sprite<'a> {
    /// Sprite without pixel memory
    pub fn new(format: PixelFormat) -> Self {
        Self {
            buffer: SurfaceBuffer::Empty,
            format,
            palette: None,
            rotation: Rotation::Rotate0,
            panel_width: 0,
            panel_height: 0,
            bitwidth: 0,
            clip: ClipRect::full(0, 0),
            window: Window::full(0, 0),
            pivot: (0.0, 0.0),
            scroll: Rect::new(0, 0, 0, 0),
            base_color: Rgb888::BLACK,
            scratch: Vec::new(),
            memory: AllocationSource::default(),
        }
    }

    /// Sprite allocated as described by `config`
    ///
    /// # Errors
    ///
    /// See [`Sprite::create`].
    pub fn from_config<P: MemoryPool + ?Sized>(config: &Config, pool: &mut P) -> Result<Self, Error> {
        let mut sprite = Self::new(config.format);
        sprite.memory = config.memory;
        sprite.palette = config.palette.clone();
        sprite.create(pool, config.dimensions.width, config.dimensions.height)?;
        sprite.set_rotation(config.rotation);
        Ok(sprite)
    }

    /// Memory source used by [`create`](Sprite::create)
    pub fn set_memory(&mut self, memory: AllocationSource) {
        self.memory = memory;
    }

    /// Allocate a zeroed `width`×`height` buffer
    ///
    /// Palette formats get a grayscale palette unless one is already set.
    /// The clip, window and pivot are reset; the rotation is kept.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDimensions`] or [`Error::AllocationFailed`].
    /// On error the sprite is left exactly as it was.
    pub fn create<P: MemoryPool + ?Sized>(
        &mut self,
        pool: &mut P,
        width: u32,
        height: u32,
    ) -> Result<(), Error> {
        check_dimensions(width, height)?;
        let len = self.format.buffer_size(width, height);
        let buffer = SurfaceBuffer::allocate(pool, len, self.memory)?;
        let scratch = self.alloc_scratch(width)?;
        debug!(
            "sprite created: {width}x{height} {:?}, {len} bytes",
            self.format
        );
        self.install(buffer, scratch, width, height);
        Ok(())
    }

    /// Use caller memory for a `width`×`height` buffer
    ///
    /// The memory is never freed by the sprite. Its contents are kept.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDimensions`] or [`Error::BufferTooSmall`].
    pub fn set_buffer(&mut self, data: &'a mut [u8], width: u32, height: u32) -> Result<(), Error> {
        check_dimensions(width, height)?;
        let required = self.format.buffer_size(width, height);
        if data.len() < required {
            return Err(Error::BufferTooSmall {
                required,
                provided: data.len(),
            });
        }
        let scratch = self.alloc_scratch(width)?;
        self.install(SurfaceBuffer::borrowed(data), scratch, width, height);
        Ok(())
    }

    fn alloc_scratch(&self, width: u32) -> Result<Vec<u8>, Error> {
        let mut scratch = Vec::new();
        if self.format.bits_per_pixel() < 8 {
            let len = self.format.row_bytes(width);
            scratch.try_reserve_exact(len).map_err(|_| {
                warn!("sprite scratch row of {len} bytes could not be allocated");
                Error::AllocationFailed {
                    requested: len,
                    source: AllocationSource::Normal,
                }
            })?;
            scratch.resize(len, 0);
        }
        Ok(scratch)
    }

    fn install(&mut self, buffer: SurfaceBuffer<'a>, scratch: Vec<u8>, width: u32, height: u32) {
        self.buffer = buffer;
        self.scratch = scratch;
        self.panel_width = width;
        self.panel_height = height;
        self.bitwidth = self.format.padded_width(width);
        if self.format.is_palette() {
            let bits = self.format.bits_per_pixel();
            self.palette
                .get_or_insert_with(|| Palette::grayscale(bits))
                .resize(self.format.palette_len());
        } else {
            self.palette = None;
        }
        self.pivot = (width as f32 / 2.0, height as f32 / 2.0);
        self.reset_clip();
    }

    fn reset_clip(&mut self) {
        let (w, h) = (self.width(), self.height());
        self.clip = ClipRect::full(w, h);
        self.window = Window::full(w, h);
        self.scroll = Rect::new(0, 0, w as i32, h as i32);
    }

    /// Release the buffer
    ///
    /// Owned memory is freed, borrowed memory is forgotten. The palette is kept.
    pub fn delete(&mut self) {
        self.buffer.release();
        self.scratch = Vec::new();
        self.panel_width = 0;
        self.panel_height = 0;
        self.bitwidth = 0;
        self.reset_clip();
    }

    /// Switch to `format`, recreating the buffer at the same size
    ///
    /// Pixel contents are cleared. A sprite without buffer only changes format.
    /// The palette survives only when the palette depth stays the same; another
    /// depth starts from a grayscale ramp and direct formats drop it.
    ///
    /// # Errors
    ///
    /// See [`Sprite::create`]; the previous format, palette and buffer survive
    /// a failure.
    pub fn set_format<P: MemoryPool + ?Sized>(
        &mut self,
        format: PixelFormat,
        pool: &mut P,
    ) -> Result<(), Error> {
        let previous = self.format;
        let previous_palette = self.palette.clone();
        let same_depth = previous.is_palette()
            && format.is_palette()
            && previous.bits_per_pixel() == format.bits_per_pixel();
        self.format = format;
        if !format.is_palette() {
            self.palette = None;
        } else if !same_depth {
            self.palette = Some(Palette::grayscale(format.bits_per_pixel()));
        }
        if self.buffer.is_empty() {
            return Ok(());
        }
        let (width, height) = (self.panel_width, self.panel_height);
        self.create(pool, width, height).inspect_err(|_| {
            self.format = previous;
            self.palette = previous_palette;
        })
    }

    /// Whether the sprite has pixel memory
    pub fn is_created(&self) -> bool {
        !self.buffer.is_empty()
    }

    /// Memory source of an owned buffer
    pub fn memory_source(&self) -> Option<AllocationSource> {
        self.buffer.source()
    }

    /// Physical buffer bytes
    pub fn as_bytes(&self) -> &[u8] {
        self.buffer.as_slice()
    }

    /// Physical buffer bytes, mutable
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        self.buffer.as_mut_slice()
    }

    /// Physical size (width, height) of the buffer
    pub fn physical_size(&self) -> (u32, u32) {
        (self.panel_width, self.panel_height)
    }

    /// Reset the palette to a grayscale ramp
    ///
    /// Returns `false` for direct-color formats, which have no palette.
    pub fn create_palette(&mut self) -> bool {
        if !self.format.is_palette() {
            return false;
        }
        self.palette = Some(Palette::grayscale(self.format.bits_per_pixel()));
        true
    }

    /// Use `colors` as the palette
    ///
    /// Extra colors are dropped, missing entries are black. Returns `false`
    /// for direct-color formats.
    pub fn create_palette_from(&mut self, colors: &[Rgb888]) -> bool {
        if !self.format.is_palette() {
            return false;
        }
        let mut palette = Palette::from_colors(colors);
        palette.resize(self.format.palette_len());
        self.palette = Some(palette);
        true
    }

    /// Change one palette entry, `false` if there is no such entry
    pub fn set_palette_color(&mut self, index: u32, color: Rgb888) -> bool {
        self.palette
            .as_mut()
            .is_some_and(|palette| palette.set(index, color))
    }

    /// Index of `color` in the palette
    pub fn palette_index(&self, color: Rgb888) -> Option<u32> {
        self.palette
            .as_ref()?
            .index_of(color)
            .filter(|&i| i <= self.format.mask())
    }

    /// Drop the palette
    pub fn delete_palette(&mut self) {
        self.palette = None;
    }

    /// Fill the whole sprite, ignoring the clip
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptySurface`] without buffer, or the errors of
    /// [`color::encode`].
    pub fn fill_sprite(&mut self, color: Rgb888) -> Result<(), Error> {
        if self.buffer.is_empty() {
            return Err(Error::EmptySurface);
        }
        let raw = self.color_to_raw(color)?;
        let rect = Rect::new(0, 0, self.width() as i32, self.height() as i32);
        self.fill_rect(rect, raw)
    }

    /// Color of the logical pixel (`x`, `y`)
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingPalette`] for a palette format without palette.
    pub fn read_color(&self, x: i32, y: i32) -> Result<Rgb888, Error> {
        let raw = self.read_pixel(x, y)?;
        color::decode(raw, self.format, self.palette.as_ref())
    }

    /// Region moved by [`scroll`](Sprite::scroll), clamped to the sprite
    ///
    /// Reset to the whole sprite by [`create`](Sprite::create) and rotation changes.
    pub fn set_scroll_rect(&mut self, rect: Rect) {
        let (w, h) = (self.width(), self.height());
        self.scroll = ClipRect::from_rect(rect).clamped(w, h).to_rect();
    }

    /// Current scroll region
    pub fn scroll_rect(&self) -> Rect {
        self.scroll
    }

    /// Color filling the strip uncovered by [`scroll`](Sprite::scroll)
    pub fn set_base_color(&mut self, color: Rgb888) {
        self.base_color = color;
    }

    /// Current base color
    pub fn base_color(&self) -> Rgb888 {
        self.base_color
    }

    /// Move the scroll region's contents by (`dx`, `dy`)
    ///
    /// Pixels moved out of the region are lost, the uncovered strip is filled
    /// with the base color. A shift as large as the region clears it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptySurface`] without buffer, or the errors of
    /// [`color::encode`] for the base color.
    pub fn scroll(&mut self, dx: i32, dy: i32) -> Result<(), Error> {
        if self.buffer.is_empty() {
            return Err(Error::EmptySurface);
        }
        let area = self.scroll;
        if area.is_empty() {
            return Ok(());
        }
        let raw = self.color_to_raw(self.base_color)?;
        let w = area.w - dx.abs();
        let h = area.h - dy.abs();
        if w <= 0 || h <= 0 {
            return self.fill_rect(area, raw);
        }

        let src_x = if dx < 0 { area.x - dx } else { area.x };
        let src_y = if dy < 0 { area.y - dy } else { area.y };
        let dst_y = src_y + dy;
        self.copy_rect(src_x + dx, dst_y, Rect::new(src_x, src_y, w, h))?;

        if dy != 0 {
            let y = if dy < 0 { area.y + area.h + dy } else { area.y };
            self.fill_rect(Rect::new(area.x, y, area.w, dy.abs()), raw)?;
        }
        if dx != 0 {
            let x = if dx < 0 { area.x + area.w + dx } else { area.x };
            self.fill_rect(Rect::new(x, dst_y, dx.abs(), h), raw)?;
        }
        Ok(())
    }

    /// Point of the sprite placed on the target centre by rotated pushes
    pub fn set_pivot(&mut self, x: f32, y: f32) {
        self.pivot = (x, y);
    }

    /// Current pivot, the geometric centre by default
    pub fn pivot(&self) -> (f32, f32) {
        self.pivot
    }

    /// Physical buffer as a push source
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptySurface`] without buffer.
    pub fn source(&self) -> Result<SourceImage<'_>, Error> {
        if self.buffer.is_empty() {
            return Err(Error::EmptySurface);
        }
        let image = SourceImage::new(
            self.buffer.as_slice(),
            self.format,
            self.panel_width,
            self.panel_height,
        )?;
        Ok(match &self.palette {
            Some(palette) => image.with_palette(palette),
            None => image,
        })
    }

    /// Draw onto `dst` with the top-left corner at (`x`, `y`)
    ///
    /// `transparency` keys are raw values of this sprite's format.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptySurface`] without buffer, and the errors of
    /// [`PixelCopy::new`].
    pub fn push_sprite<S: Surface + ?Sized>(
        &self,
        dst: &mut S,
        x: i32,
        y: i32,
        transparency: Transparency,
    ) -> Result<(), S::Error> {
        let src = self.source()?;
        dst.push_image(x, y, &src, transparency)
    }

    /// Draw rotated and zoomed around the pivot, placed at (`x`, `y`)
    ///
    /// # Errors
    ///
    /// See [`compositor::push_rotate_zoom`].
    #[allow(clippy::too_many_arguments)]
    pub fn push_rotate_zoom<S: Surface + ?Sized>(
        &self,
        dst: &mut S,
        x: f32,
        y: f32,
        angle: f32,
        zoom_x: f32,
        zoom_y: f32,
        transparency: Transparency,
    ) -> Result<(), S::Error> {
        let src = self.source()?;
        compositor::push_rotate_zoom(dst, &src, self.pivot, (x, y), angle, zoom_x, zoom_y, transparency)
    }

    /// Draw rotated around the pivot, placed at (`x`, `y`)
    ///
    /// # Errors
    ///
    /// See [`compositor::push_rotate_zoom`].
    pub fn push_rotated<S: Surface + ?Sized>(
        &self,
        dst: &mut S,
        x: f32,
        y: f32,
        angle: f32,
        transparency: Transparency,
    ) -> Result<(), S::Error> {
        self.push_rotate_zoom(dst, x, y, angle, 1.0, 1.0, transparency)
    }

    /// Draw rotated and zoomed with the pivots of both sprites aligned
    ///
    /// # Errors
    ///
    /// See [`compositor::push_rotate_zoom`].
    pub fn push_rotate_zoom_to_pivot(
        &self,
        dst: &mut Sprite<'_>,
        angle: f32,
        zoom_x: f32,
        zoom_y: f32,
        transparency: Transparency,
    ) -> Result<(), Error> {
        let (x, y) = dst.pivot();
        self.push_rotate_zoom(dst, x, y, angle, zoom_x, zoom_y, transparency)
    }

    /// Draw rotated with the pivots of both sprites aligned
    ///
    /// # Errors
    ///
    /// See [`compositor::push_rotate_zoom`].
    pub fn push_rotated_to_pivot(
        &self,
        dst: &mut Sprite<'_>,
        angle: f32,
        transparency: Transparency,
    ) -> Result<(), Error> {
        self.push_rotate_zoom_to_pivot(dst, angle, 1.0, 1.0, transparency)
    }

    /// Draw through `matrix`
    ///
    /// # Errors
    ///
    /// See [`compositor::push_affine`].
    pub fn push_affine<S: Surface + ?Sized>(
        &self,
        dst: &mut S,
        matrix: &Affine,
        transparency: Transparency,
    ) -> Result<(), S::Error> {
        let src = self.source()?;
        compositor::push_affine(dst, &src, matrix, transparency)
    }

    /// Anti-aliased [`push_rotate_zoom`](Sprite::push_rotate_zoom)
    ///
    /// # Errors
    ///
    /// See [`Compositor::push_rotate_zoom_aa`].
    #[allow(clippy::too_many_arguments)]
    pub fn push_rotate_zoom_aa<S: Surface + ?Sized>(
        &self,
        compositor: &mut Compositor,
        dst: &mut S,
        x: f32,
        y: f32,
        angle: f32,
        zoom_x: f32,
        zoom_y: f32,
        transparency: Transparency,
    ) -> Result<(), S::Error> {
        let src = self.source()?;
        compositor.push_rotate_zoom_aa(dst, &src, self.pivot, (x, y), angle, zoom_x, zoom_y, transparency)
    }

    /// Anti-aliased [`push_affine`](Sprite::push_affine)
    ///
    /// # Errors
    ///
    /// See [`Compositor::push_affine_aa`].
    pub fn push_affine_aa<S: Surface + ?Sized>(
        &self,
        compositor: &mut Compositor,
        dst: &mut S,
        matrix: &Affine,
        transparency: Transparency,
    ) -> Result<(), S::Error> {
        let src = self.source()?;
        compositor.push_affine_aa(dst, &src, matrix, transparency)
    }

    fn logical(&self) -> (i32, i32) {
        (self.width() as i32, self.height() as i32)
    }

    fn in_bounds(&self, rect: Rect) -> bool {
        let (w, h) = self.logical();
        rect.x >= 0 && rect.y >= 0 && rect.x + rect.w <= w && rect.y + rect.h <= h
    }
}

impl Surface for Sprite<'_> {
    type Error = Error;

    fn width(&self) -> u32 {
        self.rotation.logical_size(self.panel_width, self.panel_height).0
    }

    fn height(&self) -> u32 {
        self.rotation.logical_size(self.panel_width, self.panel_height).1
    }

    fn rotation(&self) -> Rotation {
        self.rotation
    }

    fn set_rotation(&mut self, rotation: Rotation) {
        self.rotation = rotation;
        self.reset_clip();
    }

    fn pixel_format(&self) -> PixelFormat {
        self.format
    }

    fn palette(&self) -> Option<&Palette> {
        self.palette.as_ref()
    }

    fn clip(&self) -> ClipRect {
        self.clip
    }

    fn set_clip(&mut self, clip: ClipRect) {
        self.clip = clip.clamped(self.width(), self.height());
    }

    fn window(&self) -> Window {
        self.window
    }

    fn set_window_state(&mut self, window: Window) {
        self.window = window;
    }

    fn draw_pixel(&mut self, x: i32, y: i32, raw: u32) -> Result<(), Error> {
        debug_assert!(self.in_bounds(Rect::new(x, y, 1, 1)), "pixel ({x}, {y}) outside sprite");
        let (w, h) = self.logical();
        let (px, py) = transform_point(self.rotation, x, y, w, h);
        let index = (py as u32 * self.bitwidth + px as u32) as usize;
        pack(self.buffer.as_mut_slice(), index, self.format.bits_per_pixel(), raw);
        Ok(())
    }

    fn fill_rect(&mut self, rect: Rect, raw: u32) -> Result<(), Error> {
        if rect.is_empty() {
            return Ok(());
        }
        debug_assert!(self.in_bounds(rect), "{rect:?} outside sprite");
        let (w, h) = self.logical();
        let r = transform_rect(self.rotation, rect, w, h);
        let bits = self.format.bits_per_pixel();
        let stride = self.bitwidth as usize;
        let buf = self.buffer.as_mut_slice();
        let first = r.y as usize * stride + r.x as usize;
        let bytes = self.format.bytes_per_pixel();
        if bytes == 0 {
            for row in 0..r.h as usize {
                let start = first + row * stride;
                for i in start..start + r.w as usize {
                    pack(buf, i, bits, raw);
                }
            }
            return Ok(());
        }
        for i in first..first + r.w as usize {
            pack(buf, i, bits, raw);
        }
        let from = first * bytes;
        let len = r.w as usize * bytes;
        for row in 1..r.h as usize {
            buf.copy_within(from..from + len, from + row * stride * bytes);
        }
        Ok(())
    }

    fn write_image(&mut self, rect: Rect, copy: &mut PixelCopy<'_>) -> Result<(), Error> {
        if rect.is_empty() {
            return Ok(());
        }
        debug_assert!(self.in_bounds(rect), "{rect:?} outside sprite");
        let (w, h) = self.logical();
        let saved = copy.walk;
        let (r, walk) = rotate_walk(self.rotation, rect, w, h, saved);
        let stride = self.bitwidth as usize;
        let buf = self.buffer.as_mut_slice();
        for row in 0..r.h {
            copy.walk = Walk {
                x32: walk.x32 + row * walk.next_x,
                y32: walk.y32 + row * walk.next_y,
                ..walk
            };
            let start = (r.y + row) as usize * stride + r.x as usize;
            copy.blit_span(buf, start, start + r.w as usize);
        }
        copy.walk = saved;
        Ok(())
    }

    /// Pixels outside the sprite read as 0.
    fn read_pixel(&self, x: i32, y: i32) -> Result<u32, Error> {
        if !self.in_bounds(Rect::new(x, y, 1, 1)) {
            return Ok(0);
        }
        let (w, h) = self.logical();
        let (px, py) = transform_point(self.rotation, x, y, w, h);
        let index = (py as u32 * self.bitwidth + px as u32) as usize;
        Ok(unpack(self.buffer.as_slice(), index, self.format.bits_per_pixel()))
    }

    fn read_rect(&self, rect: Rect, dst: &mut [u8], format: PixelFormat) -> Result<(), Error> {
        if rect.is_empty() {
            return Ok(());
        }
        debug_assert!(self.in_bounds(rect), "{rect:?} outside sprite");
        let required = format.buffer_size(rect.w as u32, rect.h as u32);
        if dst.len() < required {
            return Err(Error::BufferTooSmall {
                required,
                provided: dst.len(),
            });
        }
        let (w, h) = self.logical();
        let origin = transform_point(self.rotation, rect.x, rect.y, w, h);
        let right = transform_point(self.rotation, rect.x + 1, rect.y, w, h);
        let down = transform_point(self.rotation, rect.x, rect.y + 1, w, h);
        let walk = Walk {
            x32: origin.0 << FP_SCALE,
            y32: origin.1 << FP_SCALE,
            add_x: (right.0 - origin.0) << FP_SCALE,
            add_y: (right.1 - origin.1) << FP_SCALE,
            next_x: (down.0 - origin.0) << FP_SCALE,
            next_y: (down.1 - origin.1) << FP_SCALE,
        };
        let mut copy = PixelCopy::new(self.source()?, format, None, Transparency::None)?;
        let row_pixels = format.padded_width(rect.w as u32) as usize;
        for row in 0..rect.h {
            copy.walk = Walk {
                x32: walk.x32 + row * walk.next_x,
                y32: walk.y32 + row * walk.next_y,
                ..walk
            };
            let start = row as usize * row_pixels;
            copy.blit_span(dst, start, start + rect.w as usize);
        }
        Ok(())
    }

    fn copy_rect(&mut self, dst_x: i32, dst_y: i32, src: Rect) -> Result<(), Error> {
        if self.buffer.is_empty() {
            return Err(Error::EmptySurface);
        }
        let (w, h) = self.logical();
        let bounds = Rect::new(0, 0, w, h);
        let clipped = src.intersect(&bounds);
        let dst = Rect::new(
            dst_x + clipped.x - src.x,
            dst_y + clipped.y - src.y,
            clipped.w,
            clipped.h,
        )
        .intersect(&bounds);
        if dst.is_empty() {
            return Ok(());
        }
        let src = Rect::new(
            clipped.x + dst.x - (dst_x + clipped.x - src.x),
            clipped.y + dst.y - (dst_y + clipped.y - src.y),
            dst.w,
            dst.h,
        );

        let ps = transform_rect(self.rotation, src, w, h);
        let pd = transform_rect(self.rotation, dst, w, h);
        let stride = self.bitwidth as usize;
        let bits = self.format.bits_per_pixel();
        let bytes = self.format.bytes_per_pixel();
        let buf = self.buffer.as_mut_slice();
        let scratch = &mut self.scratch;

        let bottom_up = pd.y > ps.y;
        for i in 0..ps.h {
            let row = if bottom_up { ps.h - 1 - i } else { i };
            let from = (ps.y + row) as usize * stride + ps.x as usize;
            let to = (pd.y + row) as usize * stride + pd.x as usize;
            if bytes > 0 {
                let len = ps.w as usize * bytes;
                buf.copy_within(from * bytes..from * bytes + len, to * bytes);
            } else {
                for i in 0..ps.w as usize {
                    pack(scratch, i, bits, unpack(buf, from + i, bits));
                }
                for i in 0..ps.w as usize {
                    pack(buf, to + i, bits, unpack(scratch, i, bits));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::SystemHeap;
    use alloc::vec;

    fn sprite(format: PixelFormat, width: u32, height: u32) -> Sprite<'static> {
        let mut sprite = Sprite::new(format);
        sprite.create(&mut SystemHeap, width, height).unwrap();
        sprite
    }

    struct NoMemory;

    impl MemoryPool for NoMemory {
        fn allocate(&mut self, _len: usize, _source: AllocationSource) -> Option<Vec<u8>> {
            None
        }
    }

    #[test]
    fn test_rotate_zoom_90_lands_centred() {
        let mut src = sprite(PixelFormat::Rgb565, 8, 8);
        src.fill_sprite(Rgb888::RED).unwrap();
        let mut dst = sprite(PixelFormat::Rgb565, 16, 16);
        src.push_rotate_zoom(&mut dst, 8.0, 8.0, 90.0, 1.0, 1.0, Transparency::None)
            .unwrap();
        for y in 0..16 {
            for x in 0..16 {
                let inside = (4..12).contains(&x) && (4..12).contains(&y);
                let expected = if inside { 0xF800 } else { 0 };
                assert_eq!(dst.read_pixel(x, y), Ok(expected), "({x}, {y})");
            }
        }
    }

    #[test]
    fn test_rotate_zoom_90_is_clockwise() {
        let mut src = sprite(PixelFormat::Rgb565, 8, 8);
        let blue = src.color_to_raw(Rgb888::BLUE).unwrap();
        let green = src.color_to_raw(Rgb888::GREEN).unwrap();
        src.fill_rect(Rect::new(0, 0, 1, 8), blue).unwrap();
        src.fill_rect(Rect::new(1, 0, 7, 1), green).unwrap();
        let mut dst = sprite(PixelFormat::Rgb565, 16, 16);
        src.push_rotated(&mut dst, 8.0, 8.0, 90.0, Transparency::None).unwrap();
        // Left column becomes the top row, top row becomes the right column
        for i in 4..12 {
            assert_eq!(dst.read_pixel(i, 4), Ok(blue), "top row {i}");
        }
        for i in 5..12 {
            assert_eq!(dst.read_pixel(11, i), Ok(green), "right column {i}");
        }
    }

    #[test]
    fn test_palette_sprite_onto_rgb888() {
        let mut src = sprite(PixelFormat::Palette4, 5, 3);
        assert!(src.create_palette_from(&[Rgb888::BLACK, Rgb888::BLUE, Rgb888::GREEN, Rgb888::RED]));
        src.fill_sprite(Rgb888::GREEN).unwrap();
        assert_eq!(src.read_pixel(4, 2), Ok(2));

        let mut dst = sprite(PixelFormat::Rgb888, 5, 3);
        src.push_sprite(&mut dst, 0, 0, Transparency::None).unwrap();
        for px in dst.as_bytes().chunks(3) {
            assert_eq!(px, [0x00, 0xFF, 0x00]);
        }
    }

    #[test]
    fn test_rotation_commutes_with_push() {
        let marks = [(0, 0, 0x1111u32), (3, 0, 0x2222), (1, 2, 0x3333), (2, 3, 0x4444)];
        for rotation in Rotation::ALL {
            let mut plain = sprite(PixelFormat::Rgb565, 4, 4);
            for &(x, y, raw) in &marks {
                plain.draw_pixel(x, y, raw).unwrap();
            }
            let mut rotated_dst = sprite(PixelFormat::Rgb565, 4, 4);
            rotated_dst.set_rotation(rotation);
            plain.push_sprite(&mut rotated_dst, 0, 0, Transparency::None).unwrap();

            let mut rotated_src = sprite(PixelFormat::Rgb565, 4, 4);
            rotated_src.set_rotation(rotation);
            for &(x, y, raw) in &marks {
                rotated_src.draw_pixel(x, y, raw).unwrap();
            }
            let mut plain_dst = sprite(PixelFormat::Rgb565, 4, 4);
            rotated_src.push_sprite(&mut plain_dst, 0, 0, Transparency::None).unwrap();

            assert_eq!(rotated_dst.as_bytes(), plain_dst.as_bytes(), "{rotation:?}");
        }
    }

    #[test]
    fn test_failed_create_keeps_previous_state() {
        let mut s = sprite(PixelFormat::Rgb565, 4, 2);
        s.fill_sprite(Rgb888::WHITE).unwrap();
        let result = s.create(&mut NoMemory, 8, 8);
        assert!(matches!(result, Err(Error::AllocationFailed { .. })));
        assert_eq!((s.width(), s.height()), (4, 2));
        assert!(s.as_bytes().iter().all(|&b| b == 0xFF));

        let result = s.set_format(PixelFormat::Rgb888, &mut NoMemory);
        assert!(result.is_err());
        assert_eq!(s.pixel_format(), PixelFormat::Rgb565);
        assert_eq!(s.as_bytes().len(), 16);
    }

    #[test]
    fn test_invalid_dimensions() {
        let mut s = Sprite::new(PixelFormat::Rgb565);
        assert!(matches!(
            s.create(&mut SystemHeap, 0, 4),
            Err(Error::InvalidDimensions { width: 0, height: 4 })
        ));
        assert!(s.create(&mut SystemHeap, MAX_SURFACE_DIMENSION + 1, 1).is_err());
        assert!(!s.is_created());
        assert!(matches!(s.source(), Err(Error::EmptySurface)));
    }

    #[test]
    fn test_borrowed_buffer() {
        let mut memory = [0u8; 8];
        let mut short = [0u8; 3];
        {
            let mut s = Sprite::new(PixelFormat::Palette8);
            assert!(matches!(
                s.set_buffer(&mut short, 2, 2),
                Err(Error::BufferTooSmall { required: 4, provided: 3 })
            ));
            s.set_buffer(&mut memory, 4, 2).unwrap();
            s.fill_screen(5).unwrap();
            assert!(s.memory_source().is_none());
            s.delete();
        }
        assert_eq!(memory, [5; 8]);
    }

    #[test]
    fn test_sub_byte_grayscale_palette() {
        let mut s = sprite(PixelFormat::Palette1, 10, 2);
        assert_eq!(s.palette().map(Palette::len), Some(2));
        assert_eq!(s.as_bytes().len(), 4);
        s.fill_sprite(Rgb888::WHITE).unwrap();
        assert_eq!(s.as_bytes(), [0xFF, 0xC0, 0xFF, 0xC0]);
        assert!(s.set_palette_color(1, Rgb888::RED));
        assert_eq!(s.read_color(9, 1), Ok(Rgb888::RED));
        assert!(!s.set_palette_color(2, Rgb888::RED));
    }

    #[test]
    fn test_set_format_recreates_palette_on_depth_change() {
        let mut s = sprite(PixelFormat::Palette1, 8, 2);
        assert!(s.set_palette_color(1, Rgb888::RED));
        s.set_format(PixelFormat::Palette4, &mut SystemHeap).unwrap();
        assert_eq!(s.palette(), Some(&Palette::grayscale(4)));

        s.set_format(PixelFormat::Rgb565, &mut SystemHeap).unwrap();
        assert!(s.palette().is_none());
        s.set_format(PixelFormat::Palette4, &mut SystemHeap).unwrap();
        assert_eq!(s.palette(), Some(&Palette::grayscale(4)));

        // Same depth keeps custom entries
        assert!(s.set_palette_color(3, Rgb888::RED));
        s.set_format(PixelFormat::Palette4, &mut SystemHeap).unwrap();
        assert_eq!(s.palette_index(Rgb888::RED), Some(3));

        // A failed change restores the old palette
        let result = s.set_format(PixelFormat::Palette8, &mut NoMemory);
        assert!(result.is_err());
        assert_eq!(s.pixel_format(), PixelFormat::Palette4);
        assert_eq!(s.palette().map(Palette::len), Some(16));
        assert_eq!(s.palette_index(Rgb888::RED), Some(3));
    }

    fn numbered(width: u32, height: u32) -> Sprite<'static> {
        let mut s = sprite(PixelFormat::Palette8, width, height);
        for y in 0..height as i32 {
            for x in 0..width as i32 {
                s.draw_pixel(x, y, (y * width as i32 + x) as u32).unwrap();
            }
        }
        s
    }

    #[test]
    fn test_scroll_positive_shift() {
        let mut s = numbered(4, 4);
        s.set_base_color(Rgb888::WHITE);
        s.scroll(1, 1).unwrap();
        assert_eq!(
            s.as_bytes(),
            [255, 255, 255, 255, 255, 0, 1, 2, 255, 4, 5, 6, 255, 8, 9, 10]
        );
    }

    #[test]
    fn test_scroll_negative_shift() {
        let mut s = numbered(4, 4);
        s.scroll(-2, 0).unwrap();
        assert_eq!(
            s.as_bytes(),
            [2, 3, 0, 0, 6, 7, 0, 0, 10, 11, 0, 0, 14, 15, 0, 0]
        );

        // Only the scroll region moves
        let mut s = numbered(4, 4);
        s.set_scroll_rect(Rect::new(1, 1, 2, 2));
        s.set_base_color(Rgb888::WHITE);
        s.scroll(0, -1).unwrap();
        assert_eq!(
            s.as_bytes(),
            [0, 1, 2, 3, 4, 9, 10, 7, 8, 255, 255, 11, 12, 13, 14, 15]
        );
    }

    #[test]
    fn test_scroll_beyond_rect_clears() {
        let mut s = numbered(4, 4);
        s.set_base_color(Rgb888::WHITE);
        s.scroll(0, -7).unwrap();
        assert!(s.as_bytes().iter().all(|&b| b == 255));

        let mut s = numbered(4, 4);
        s.scroll(4, 1).unwrap();
        assert!(s.as_bytes().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_scroll_rect_clamped_and_reset() {
        let mut s = numbered(4, 4);
        s.set_scroll_rect(Rect::new(-2, 2, 10, 10));
        assert_eq!(s.scroll_rect(), Rect::new(0, 2, 4, 2));
        s.set_rotation(Rotation::Rotate90);
        assert_eq!(s.scroll_rect(), Rect::new(0, 0, 4, 4));
        assert!(matches!(
            Sprite::new(PixelFormat::Rgb565).scroll(1, 0),
            Err(Error::EmptySurface)
        ));
    }

    #[test]
    fn test_palette_miss_outside_clip_rejects_push() {
        let mut src = sprite(PixelFormat::Rgb565, 2, 1);
        src.draw_pixel(0, 0, 0xFFFF).unwrap();
        src.draw_pixel(1, 0, 0xF800).unwrap();
        let mut dst = sprite(PixelFormat::Palette1, 4, 1);
        // The red pixel would land past the right edge
        let result = src.push_sprite(&mut dst, 3, 0, Transparency::None);
        assert!(matches!(result, Err(Error::PaletteMiss { .. })));
        assert_eq!(dst.read_pixel(3, 0), Ok(0));

        src.draw_pixel(1, 0, 0).unwrap();
        src.push_sprite(&mut dst, 3, 0, Transparency::None).unwrap();
        assert_eq!(dst.read_pixel(3, 0), Ok(1));
    }

    #[test]
    fn test_push_rotated_to_pivot() {
        let mut src = sprite(PixelFormat::Rgb565, 8, 8);
        src.fill_sprite(Rgb888::RED).unwrap();
        let mut dst = sprite(PixelFormat::Rgb565, 16, 16);
        assert_eq!(dst.pivot(), (8.0, 8.0));
        src.push_rotated_to_pivot(&mut dst, 90.0, Transparency::None).unwrap();

        let mut expected = sprite(PixelFormat::Rgb565, 16, 16);
        src.push_rotate_zoom(&mut expected, 8.0, 8.0, 90.0, 1.0, 1.0, Transparency::None)
            .unwrap();
        assert_eq!(dst.as_bytes(), expected.as_bytes());

        let mut dst = sprite(PixelFormat::Rgb565, 16, 16);
        dst.set_pivot(4.0, 4.0);
        src.push_rotate_zoom_to_pivot(&mut dst, 90.0, 1.0, 1.0, Transparency::None)
            .unwrap();
        assert_eq!(dst.read_pixel(0, 0), Ok(0xF800));
        assert_eq!(dst.read_pixel(7, 7), Ok(0xF800));
        assert_eq!(dst.read_pixel(8, 8), Ok(0));
    }

    #[test]
    fn test_set_rotation_resets_clip_and_window() {
        let mut s = sprite(PixelFormat::Rgb565, 8, 4);
        s.set_clip(ClipRect::from_rect(Rect::new(1, 1, 2, 2)));
        s.set_window(Rect::new(2, 2, 2, 2));
        s.set_rotation(Rotation::Rotate90);
        assert_eq!((s.width(), s.height()), (4, 8));
        assert_eq!(s.clip(), ClipRect::full(4, 8));
        assert_eq!(s.window(), Window::full(4, 8));
    }

    #[test]
    fn test_rotated_fill_lands_in_physical_layout() {
        let mut s = sprite(PixelFormat::Palette8, 3, 2);
        s.set_rotation(Rotation::Rotate90);
        // Logical 2x3: first logical row is the last physical column
        s.fill_rect(Rect::new(0, 0, 2, 1), 9).unwrap();
        assert_eq!(s.as_bytes(), [0, 0, 9, 0, 0, 9]);
    }

    #[test]
    fn test_write_pixels_wraps_in_window() {
        let mut s = sprite(PixelFormat::Palette8, 4, 3);
        let src: Vec<u8> = (1..=6).collect();
        let image = SourceImage::new(&src, PixelFormat::Palette8, 6, 1).unwrap();
        let mut copy = PixelCopy::new(image, PixelFormat::Palette8, None, Transparency::None).unwrap();
        s.set_window(Rect::new(1, 1, 2, 2));
        s.write_pixels(&mut copy, 4).unwrap();
        s.write_pixels(&mut copy, 2).unwrap();
        assert_eq!(s.as_bytes(), [0, 0, 0, 0, 0, 5, 6, 0, 0, 3, 4, 0]);
        assert_eq!((s.window().x, s.window().y), (1, 2));
    }

    #[test]
    fn test_read_rect_converts_and_rotates() {
        let mut s = sprite(PixelFormat::Rgb565, 3, 2);
        s.set_rotation(Rotation::Rotate180);
        s.draw_pixel(0, 0, 0xF800).unwrap();
        s.draw_pixel(2, 1, 0x001F).unwrap();
        let mut out = vec![0u8; 3 * 3 * 2];
        s.read_rect(Rect::new(0, 0, 3, 2), &mut out, PixelFormat::Rgb888).unwrap();
        assert_eq!(out[..3], [0xFF, 0, 0]);
        assert_eq!(out[15..], [0, 0, 0xFF]);

        let mut small = [0u8; 4];
        assert!(matches!(
            s.read_rect(Rect::new(0, 0, 3, 2), &mut small, PixelFormat::Rgb888),
            Err(Error::BufferTooSmall { .. })
        ));
    }

    #[test]
    fn test_copy_rect_overlapping() {
        let mut s = sprite(PixelFormat::Palette8, 4, 4);
        for y in 0..4 {
            for x in 0..4 {
                s.draw_pixel(x, y, (y * 4 + x) as u32).unwrap();
            }
        }
        s.copy_rect(1, 1, Rect::new(0, 0, 3, 3)).unwrap();
        assert_eq!(
            s.as_bytes(),
            [0, 1, 2, 3, 4, 0, 1, 2, 8, 4, 5, 6, 12, 8, 9, 10]
        );
    }

    #[test]
    fn test_copy_rect_sub_byte_and_clipped() {
        let mut s = sprite(PixelFormat::Palette2, 4, 2);
        s.draw_pixel(0, 0, 1).unwrap();
        s.draw_pixel(1, 0, 2).unwrap();
        s.draw_pixel(2, 0, 3).unwrap();
        // Destination partly outside: only two pixels land
        s.copy_rect(2, 1, Rect::new(0, 0, 4, 1)).unwrap();
        assert_eq!(s.read_pixel(2, 1), Ok(1));
        assert_eq!(s.read_pixel(3, 1), Ok(2));
        assert_eq!(s.read_pixel(0, 1), Ok(0));
        assert_eq!(s.as_bytes()[0], 0b0110_1100);
    }

    #[test]
    fn test_from_config() {
        let config = crate::config::Builder::new()
            .dimensions(crate::config::Dimensions::new(6, 4).unwrap())
            .format(PixelFormat::Palette4)
            .rotation(Rotation::Rotate270)
            .palette(Palette::from_colors(&[Rgb888::RED]))
            .build()
            .unwrap();
        let s = Sprite::from_config(&config, &mut SystemHeap).unwrap();
        assert_eq!((s.width(), s.height()), (4, 6));
        assert_eq!(s.palette().map(Palette::len), Some(16));
        assert_eq!(s.palette_index(Rgb888::RED), Some(0));
        assert_eq!(s.pivot(), (3.0, 2.0));
    }

    #[test]
    fn test_draw_clipped_ignores_outside() {
        let mut s = sprite(PixelFormat::Palette8, 2, 2);
        s.draw_pixel_clipped(-1, 0, 1).unwrap();
        s.draw_pixel_clipped(2, 1, 1).unwrap();
        s.fill_rect_clipped(Rect::new(1, 1, 5, 5), 3).unwrap();
        assert_eq!(s.as_bytes(), [0, 0, 0, 3]);
    }
}
