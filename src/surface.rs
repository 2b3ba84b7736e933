//! The drawing surface contract
//!
//! A [`Surface`] is anything pixels can be written to: an in-memory
//! [`Sprite`](crate::sprite::Sprite) or a hardware [`Panel`](crate::panel::Panel).
//! Implementors supply a handful of *preclipped* primitives that work in
//! logical coordinates and apply the [`rotation`](crate::rotation) rule
//! themselves. Clipping, image pushes and streaming writes are provided on
//! top of them, so every surface clips and streams identically.
//!
//! Colors are passed as raw values of the surface's
//! [`pixel_format`](Surface::pixel_format); use
//! [`color_to_raw`](Surface::color_to_raw) to encode an [`Rgb888`].

use core::ops::{Deref, DerefMut};

use crate::color::{self, Palette, Rgb888};
use crate::error::Error;
use crate::format::PixelFormat;
use crate::pixelcopy::{PixelCopy, SourceImage, Transparency};
use crate::rotation::{Rect, Rotation};

/// Inclusive clipping rectangle
///
/// `right < left` or `bottom < top` clips everything.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClipRect {
    /// Leftmost drawable column
    pub left: i32,
    /// Topmost drawable row
    pub top: i32,
    /// Rightmost drawable column
    pub right: i32,
    /// Bottommost drawable row
    pub bottom: i32,
}

impl ClipRect {
    /// Clip covering a whole `width`×`height` surface
    pub const fn full(width: u32, height: u32) -> Self {
        Self {
            left: 0,
            top: 0,
            right: width as i32 - 1,
            bottom: height as i32 - 1,
        }
    }

    /// Clip covering `rect`
    pub const fn from_rect(rect: Rect) -> Self {
        Self {
            left: rect.x,
            top: rect.y,
            right: rect.x + rect.w - 1,
            bottom: rect.y + rect.h - 1,
        }
    }

    /// Restrict to a `width`×`height` surface
    pub fn clamped(self, width: u32, height: u32) -> Self {
        let full = Self::full(width, height);
        Self {
            left: self.left.max(0),
            top: self.top.max(0),
            right: self.right.min(full.right),
            bottom: self.bottom.min(full.bottom),
        }
    }

    /// As a rectangle (empty when nothing is drawable)
    pub fn to_rect(self) -> Rect {
        Rect::new(
            self.left,
            self.top,
            (self.right - self.left + 1).max(0),
            (self.bottom - self.top + 1).max(0),
        )
    }

    /// Whether (`x`, `y`) is drawable
    pub const fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.left && x <= self.right && y >= self.top && y <= self.bottom
    }
}

/// Streaming write window with its cursor
///
/// Bounds are inclusive. Streaming writes fill the window row by row from the
/// cursor and wrap back to the top-left corner after the last pixel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Window {
    /// Left column
    pub left: i32,
    /// Top row
    pub top: i32,
    /// Right column
    pub right: i32,
    /// Bottom row
    pub bottom: i32,
    /// Cursor column
    pub x: i32,
    /// Cursor row
    pub y: i32,
}

impl Window {
    /// Window over `rect` clamped to a `width`×`height` surface, cursor at its origin
    pub fn new(rect: Rect, width: u32, height: u32) -> Self {
        let max_x = (width as i32 - 1).max(0);
        let max_y = (height as i32 - 1).max(0);
        let left = rect.x.clamp(0, max_x);
        let top = rect.y.clamp(0, max_y);
        let right = (rect.x + rect.w - 1).clamp(left, max_x);
        let bottom = (rect.y + rect.h - 1).clamp(top, max_y);
        Self {
            left,
            top,
            right,
            bottom,
            x: left,
            y: top,
        }
    }

    /// Window over a whole surface
    pub fn full(width: u32, height: u32) -> Self {
        Self::new(Rect::new(0, 0, width as i32, height as i32), width, height)
    }

    /// Longest run from the cursor, at most `len` pixels, that stays on one row
    pub fn next_run(&self, len: usize) -> Rect {
        let w = ((self.right - self.x + 1) as usize).min(len);
        Rect::new(self.x, self.y, w as i32, 1)
    }

    /// Move the cursor `n` pixels along the current row, wrapping at the edges
    pub fn advance(&mut self, n: i32) {
        self.x += n;
        if self.x > self.right {
            self.x = self.left;
            self.y = if self.y < self.bottom { self.y + 1 } else { self.top };
        }
    }
}

/// Pixel destination (and possibly source)
///
/// Methods named `*_clipped` and [`push_image`](Surface::push_image) clip
/// against [`clip`](Surface::clip). The other drawing primitives are
/// *preclipped*: calling them outside the surface is a caller bug caught by
/// `debug_assert!`.
pub trait Surface {
    /// Error type of the surface
    ///
    /// Core errors convert into it, so `?` works on [`Error`] inside surface code.
    type Error: From<Error>;

    /// Logical width
    fn width(&self) -> u32;

    /// Logical height
    fn height(&self) -> u32;

    /// Current rotation
    fn rotation(&self) -> Rotation;

    /// Change the rotation
    ///
    /// Resets the clip and the window to the full logical extent.
    fn set_rotation(&mut self, rotation: Rotation);

    /// Format of raw pixel values
    fn pixel_format(&self) -> PixelFormat;

    /// Palette of palette-indexed surfaces
    fn palette(&self) -> Option<&Palette>;

    /// Current clip rectangle
    fn clip(&self) -> ClipRect;

    /// Set the clip rectangle, clamped to the surface
    fn set_clip(&mut self, clip: ClipRect);

    /// Current streaming window
    fn window(&self) -> Window;

    /// Replace the streaming window state (bounds and cursor)
    fn set_window_state(&mut self, window: Window);

    /// Write one pixel
    fn draw_pixel(&mut self, x: i32, y: i32, raw: u32) -> Result<(), Self::Error>;

    /// Fill a rectangle
    fn fill_rect(&mut self, rect: Rect, raw: u32) -> Result<(), Self::Error>;

    /// Copy pixels into `rect` from `copy`'s cursor, row by row
    ///
    /// Source pixels that are transparent or out of range leave the
    /// destination untouched. The cursor of `copy` is left where it was.
    fn write_image(&mut self, rect: Rect, copy: &mut PixelCopy<'_>) -> Result<(), Self::Error>;

    /// Read one raw pixel
    fn read_pixel(&self, x: i32, y: i32) -> Result<u32, Self::Error> {
        let _ = (x, y);
        Err(Error::ReadUnsupported.into())
    }

    /// Read `rect` into `dst` as pixels of `format`
    ///
    /// Rows in `dst` are `format.row_bytes(rect.w)` bytes apart.
    fn read_rect(&self, rect: Rect, dst: &mut [u8], format: PixelFormat) -> Result<(), Self::Error> {
        let _ = (rect, dst, format);
        Err(Error::ReadUnsupported.into())
    }

    /// Copy `src` to (`dst_x`, `dst_y`) within the surface, overlap-safe
    fn copy_rect(&mut self, dst_x: i32, dst_y: i32, src: Rect) -> Result<(), Self::Error> {
        let _ = (dst_x, dst_y, src);
        Err(Error::ReadUnsupported.into())
    }

    /// Set the streaming window to `rect`, clamped, with the cursor at its origin
    fn set_window(&mut self, rect: Rect) {
        let window = Window::new(rect, self.width(), self.height());
        self.set_window_state(window);
    }

    /// Encode `color` in the surface's format
    fn color_to_raw(&self, color: Rgb888) -> Result<u32, Error> {
        color::encode(color, self.pixel_format(), self.palette())
    }

    /// Write one pixel if it is inside the clip
    fn draw_pixel_clipped(&mut self, x: i32, y: i32, raw: u32) -> Result<(), Self::Error> {
        if self.clip().contains(x, y) {
            self.draw_pixel(x, y, raw)?;
        }
        Ok(())
    }

    /// Fill the part of `rect` inside the clip
    fn fill_rect_clipped(&mut self, rect: Rect, raw: u32) -> Result<(), Self::Error> {
        let rect = rect.intersect(&self.clip().to_rect());
        if !rect.is_empty() {
            self.fill_rect(rect, raw)?;
        }
        Ok(())
    }

    /// Fill everything inside the clip
    fn fill_screen(&mut self, raw: u32) -> Result<(), Self::Error> {
        let rect = Rect::new(0, 0, self.width() as i32, self.height() as i32);
        self.fill_rect_clipped(rect, raw)
    }

    /// Stream `len` pixels from `copy` into the window at its cursor
    ///
    /// The source is consumed as one continuous run; the window cursor wraps
    /// row by row and back to the top. The cursor of `copy` ends after the
    /// last pixel consumed.
    fn write_pixels(&mut self, copy: &mut PixelCopy<'_>, len: usize) -> Result<(), Self::Error> {
        let start = copy.walk;
        let mut window = self.window();
        debug_assert!(
            window.x >= window.left
                && window.x <= window.right
                && window.y >= window.top
                && window.y <= window.bottom,
            "window cursor outside the window"
        );
        let mut consumed = 0i32;
        let mut remaining = len;
        while remaining > 0 {
            let run = window.next_run(remaining);
            copy.walk.x32 = start.x32 + consumed * start.add_x;
            copy.walk.y32 = start.y32 + consumed * start.add_y;
            self.write_image(run, copy)?;
            window.advance(run.w);
            consumed += run.w;
            remaining -= run.w as usize;
        }
        copy.walk.x32 = start.x32 + consumed * start.add_x;
        copy.walk.y32 = start.y32 + consumed * start.add_y;
        self.set_window_state(window);
        Ok(())
    }

    /// Draw `src` with its top-left corner at (`x`, `y`), clipped
    fn push_image(
        &mut self,
        x: i32,
        y: i32,
        src: &SourceImage<'_>,
        transparency: Transparency,
    ) -> Result<(), Self::Error> {
        let target = Rect::new(x, y, src.width() as i32, src.height() as i32);
        let rect = target.intersect(&self.clip().to_rect());
        if rect.is_empty() {
            return Ok(());
        }
        let mut copy = PixelCopy::new(*src, self.pixel_format(), self.palette(), transparency)?;
        copy.set_origin(rect.x - x, rect.y - y);
        self.write_image(rect, &mut copy)
    }
}

/// Scoped clip change, restored when dropped
///
/// Dereferences to the surface, so drawing goes through the guard:
///
/// ```
/// use surfblit::{ClipGuard, ClipRect, Rect, Sprite, Surface, PixelFormat};
/// use surfblit::buffer::SystemHeap;
///
/// let mut sprite = Sprite::new(PixelFormat::Rgb565);
/// sprite.create(&mut SystemHeap, 8, 8).unwrap();
/// {
///     let mut guard = ClipGuard::new(&mut sprite, ClipRect::from_rect(Rect::new(2, 2, 2, 2)));
///     guard.fill_screen(0xFFFF).unwrap();
/// }
/// assert_eq!(sprite.clip(), ClipRect::full(8, 8));
/// assert_eq!(sprite.read_pixel(2, 2), Ok(0xFFFF));
/// assert_eq!(sprite.read_pixel(4, 4), Ok(0));
/// ```
pub struct ClipGuard<'s, S: Surface + ?Sized> {
    surface: &'s mut S,
    saved: ClipRect,
}

impl<'s, S: Surface + ?Sized> ClipGuard<'s, S> {
    /// Narrow `surface`'s clip to `clip` (intersected with the current clip)
    pub fn new(surface: &'s mut S, clip: ClipRect) -> Self {
        let saved = surface.clip();
        let narrowed = ClipRect {
            left: clip.left.max(saved.left),
            top: clip.top.max(saved.top),
            right: clip.right.min(saved.right),
            bottom: clip.bottom.min(saved.bottom),
        };
        surface.set_clip(narrowed);
        Self { surface, saved }
    }
}

impl<S: Surface + ?Sized> Deref for ClipGuard<'_, S> {
    type Target = S;

    fn deref(&self) -> &S {
        self.surface
    }
}

impl<S: Surface + ?Sized> DerefMut for ClipGuard<'_, S> {
    fn deref_mut(&mut self) -> &mut S {
        self.surface
    }
}

impl<S: Surface + ?Sized> Drop for ClipGuard<'_, S> {
    fn drop(&mut self) {
        self.surface.set_clip(self.saved);
    }
}
