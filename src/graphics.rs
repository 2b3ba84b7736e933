//! Graphics support via embedded-graphics
//!
//! This module provides the [`Canvas`] struct which borrows any [`Surface`]
//! and implements the [`DrawTarget`](embedded_graphics_core::draw_target::DrawTarget) trait from
//! the embedded-graphics ecosystem.
//!
//! ## Features
//!
//! - 2D graphics primitives (lines, rectangles, circles, text, etc.) on sprites and panels
//! - Colors encoded through the surface's pixel format and palette
//! - Drawing clipped to the surface clip rectangle
//! - Solid fills forwarded as rectangle fills
//!
//! ## Example
//!
//! ```rust
//! use embedded_graphics::{
//!     pixelcolor::Rgb888,
//!     prelude::*,
//!     primitives::{Circle, PrimitiveStyle, Rectangle},
//! };
//! use surfblit::buffer::SystemHeap;
//! use surfblit::graphics::Canvas;
//! use surfblit::{PixelFormat, Sprite, Surface};
//!
//! let mut sprite = Sprite::new(PixelFormat::Rgb565);
//! sprite.create(&mut SystemHeap, 64, 32).unwrap();
//!
//! let mut canvas = Canvas::new(&mut sprite);
//! Rectangle::new(Point::new(0, 0), Size::new(64, 32))
//!     .into_styled(PrimitiveStyle::with_stroke(Rgb888::WHITE, 1))
//!     .draw(&mut canvas)
//!     .unwrap();
//! Circle::new(Point::new(20, 4), 24)
//!     .into_styled(PrimitiveStyle::with_fill(Rgb888::RED))
//!     .draw(&mut canvas)
//!     .unwrap();
//!
//! assert_eq!(sprite.read_pixel(0, 0), Ok(0xFFFF));
//! ```

use embedded_graphics_core::{
    draw_target::DrawTarget,
    geometry::{OriginDimensions, Point, Size},
    pixelcolor::{Rgb888 as EgRgb888, RgbColor},
    prelude::Pixel,
    primitives::Rectangle,
};

use crate::color::Rgb888;
use crate::rotation::Rect;
use crate::surface::Surface;

/// embedded-graphics view of a surface
///
/// Borrows the surface for as long as drawing goes on. Colors are encoded
/// with [`Surface::color_to_raw`], so palette surfaces need an exact palette
/// entry for every color drawn.
///
/// # Type Parameters
///
/// * `S` - Surface type implementing [`Surface`]
pub struct Canvas<'s, S: Surface + ?Sized> {
    /// Target surface
    surface: &'s mut S,
}

impl<'s, S: Surface + ?Sized> Canvas<'s, S> {
    /// Wrap `surface`
    pub fn new(surface: &'s mut S) -> Self {
        Self { surface }
    }

    /// Get a reference to the underlying surface
    pub fn surface(&self) -> &S {
        self.surface
    }

    /// Get a mutable reference to the underlying surface
    pub fn surface_mut(&mut self) -> &mut S {
        self.surface
    }

    /// Give the surface back
    pub fn into_inner(self) -> &'s mut S {
        self.surface
    }

    fn raw(&self, color: EgRgb888) -> Result<u32, S::Error> {
        let raw = self
            .surface
            .color_to_raw(Rgb888::new(color.r(), color.g(), color.b()))?;
        Ok(raw)
    }
}

impl<S: Surface + ?Sized> DrawTarget for Canvas<'_, S> {
    type Color = EgRgb888;
    type Error = S::Error;

    fn draw_iter<Iter>(&mut self, pixels: Iter) -> Result<(), Self::Error>
    where
        Iter: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(Point { x, y }, color) in pixels {
            if !self.surface.clip().contains(x, y) {
                continue;
            }
            let raw = self.raw(color)?;
            self.surface.draw_pixel(x, y, raw)?;
        }
        Ok(())
    }

    fn fill_solid(&mut self, area: &Rectangle, color: Self::Color) -> Result<(), Self::Error> {
        let rect = Rect::new(
            area.top_left.x,
            area.top_left.y,
            area.size.width as i32,
            area.size.height as i32,
        );
        let raw = self.raw(color)?;
        self.surface.fill_rect_clipped(rect, raw)
    }

    fn clear(&mut self, color: Self::Color) -> Result<(), Self::Error> {
        let raw = self.raw(color)?;
        self.surface.fill_screen(raw)
    }
}

impl<S: Surface + ?Sized> OriginDimensions for Canvas<'_, S> {
    fn size(&self) -> Size {
        Size::new(self.surface.width(), self.surface.height())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::SystemHeap;
    use crate::error::Error;
    use crate::format::PixelFormat;
    use crate::rotation::Rotation;
    use crate::sprite::Sprite;
    use crate::surface::ClipRect;
    use embedded_graphics::prelude::*;
    use embedded_graphics::primitives::{Line, PrimitiveStyle};

    fn test_sprite(format: PixelFormat) -> Sprite<'static> {
        let mut sprite = Sprite::new(format);
        sprite.create(&mut SystemHeap, 16, 8).unwrap();
        sprite
    }

    #[test]
    fn test_size_follows_rotation() {
        let mut sprite = test_sprite(PixelFormat::Rgb565);
        sprite.set_rotation(Rotation::Rotate90);
        let canvas = Canvas::new(&mut sprite);
        assert_eq!(canvas.size(), Size::new(8, 16));
    }

    #[test]
    fn test_filled_rectangle_is_encoded() {
        let mut sprite = test_sprite(PixelFormat::Rgb888);
        let mut canvas = Canvas::new(&mut sprite);
        Rectangle::new(Point::new(2, 1), Size::new(3, 2))
            .into_styled(PrimitiveStyle::with_fill(EgRgb888::new(0x12, 0x34, 0x56)))
            .draw(&mut canvas)
            .unwrap();
        let color = Rgb888::new(0x12, 0x34, 0x56);
        assert_eq!(sprite.read_color(2, 1).unwrap(), color);
        assert_eq!(sprite.read_color(4, 2).unwrap(), color);
        assert_eq!(sprite.read_color(5, 2).unwrap(), Rgb888::BLACK);
        assert_eq!(sprite.read_color(2, 3).unwrap(), Rgb888::BLACK);
    }

    #[test]
    fn test_pixels_outside_clip_are_dropped() {
        let mut sprite = test_sprite(PixelFormat::Rgb565);
        sprite.set_clip(ClipRect::from_rect(Rect::new(0, 0, 4, 8)));
        let mut canvas = Canvas::new(&mut sprite);
        Line::new(Point::new(-4, 0), Point::new(20, 0))
            .into_styled(PrimitiveStyle::with_stroke(EgRgb888::WHITE, 1))
            .draw(&mut canvas)
            .unwrap();
        assert_eq!(sprite.read_pixel(3, 0), Ok(0xFFFF));
        assert_eq!(sprite.read_pixel(4, 0), Ok(0));
    }

    #[test]
    fn test_clear_fills_clip() {
        let mut sprite = test_sprite(PixelFormat::Rgb565);
        sprite.set_clip(ClipRect::from_rect(Rect::new(8, 0, 8, 8)));
        Canvas::new(&mut sprite).clear(EgRgb888::WHITE).unwrap();
        assert_eq!(sprite.read_pixel(7, 7), Ok(0));
        assert_eq!(sprite.read_pixel(8, 7), Ok(0xFFFF));
    }

    #[test]
    fn test_palette_surface_rejects_unknown_color() {
        let mut sprite = test_sprite(PixelFormat::Palette4);
        let mut canvas = Canvas::new(&mut sprite);
        Pixel(Point::new(1, 1), EgRgb888::WHITE)
            .draw(&mut canvas)
            .unwrap();
        let result = Pixel(Point::new(0, 0), EgRgb888::RED).draw(&mut canvas);
        assert!(matches!(result, Err(Error::PaletteMiss { .. })));
        assert_eq!(sprite.read_color(1, 1).unwrap(), Rgb888::WHITE);
    }
}
