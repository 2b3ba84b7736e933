//! Coordinate rotation utilities
//!
//! Every surface stores pixels in a fixed *physical* layout and exposes a
//! *logical* coordinate space selected by a [`Rotation`]. This module is the
//! single place where logical coordinates become physical ones. Pixel writes,
//! rectangle fills, streaming writes and rectangle copies all go through the
//! same rule:
//!
//! 1. if the code flips vertically: `y' = height - (y + h)`
//! 2. if the code flips horizontally: `x' = width - (x + w)`
//! 3. if the code is odd: swap x/y, w/h (and the source step deltas)
//!
//! `width` and `height` are the *logical* extent of the surface.
//!
//! ## Rotation Codes
//!
//! | Code | Variant     | Vertical flip | Horizontal flip | Swap axes |
//! |------|-------------|---------------|-----------------|-----------|
//! | 0    | `Rotate0`   |               |                 |           |
//! | 1    | `Rotate90`  | yes           |                 | yes       |
//! | 2    | `Rotate180` | yes           | yes             |           |
//! | 3    | `Rotate270` |               | yes             | yes       |
//! | 4    | `Mirror0`   | yes           |                 |           |
//! | 5    | `Mirror90`  |               |                 | yes       |
//! | 6    | `Mirror180` |               | yes             |           |
//! | 7    | `Mirror270` | yes           | yes             | yes       |
//!
//! ## Example
//!
//! ```
//! use surfblit::rotation::{transform_point, Rotation};
//!
//! // On a 16x8 logical surface rotated 90 degrees, the logical origin is
//! // stored at the top-right of the 8x16 physical buffer.
//! assert_eq!(transform_point(Rotation::Rotate90, 0, 0, 16, 8), (7, 0));
//! ```

use core::mem::swap;

/// Orientation of a surface relative to its physical memory layout
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Rotation {
    /// No rotation
    #[default]
    Rotate0,
    /// Rotate 90 degrees clockwise
    Rotate90,
    /// Rotate 180 degrees
    Rotate180,
    /// Rotate 270 degrees clockwise
    Rotate270,
    /// Mirrored top to bottom
    Mirror0,
    /// Mirrored along the main diagonal
    Mirror90,
    /// Mirrored left to right
    Mirror180,
    /// Mirrored along the anti-diagonal
    Mirror270,
}

impl Rotation {
    /// All rotations, in code order
    pub const ALL: [Self; 8] = [
        Self::Rotate0,
        Self::Rotate90,
        Self::Rotate180,
        Self::Rotate270,
        Self::Mirror0,
        Self::Mirror90,
        Self::Mirror180,
        Self::Mirror270,
    ];

    /// Rotation for a 3-bit code; higher bits are ignored
    pub const fn from_code(code: u8) -> Self {
        Self::ALL[(code & 7) as usize]
    }

    /// 3-bit rotation code
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Whether logical rows are stored bottom-up
    pub const fn flips_vertical(self) -> bool {
        (0b1001_0110u8 >> self.code()) & 1 != 0
    }

    /// Whether logical columns are stored right-to-left
    pub const fn flips_horizontal(self) -> bool {
        self.code() & 2 != 0
    }

    /// Whether logical x runs along physical y
    pub const fn swaps_axes(self) -> bool {
        self.code() & 1 != 0
    }

    /// Logical extent of a physical `width`×`height` buffer
    pub const fn logical_size(self, width: u32, height: u32) -> (u32, u32) {
        if self.swaps_axes() {
            (height, width)
        } else {
            (width, height)
        }
    }
}

/// Axis-aligned rectangle
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Rect {
    /// Left edge
    pub x: i32,
    /// Top edge
    pub y: i32,
    /// Width
    pub w: i32,
    /// Height
    pub h: i32,
}

impl Rect {
    /// Create a rectangle
    pub const fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    /// Whether the rectangle covers no pixels
    pub const fn is_empty(&self) -> bool {
        self.w <= 0 || self.h <= 0
    }

    /// Overlap with `other`, possibly empty
    pub fn intersect(&self, other: &Self) -> Self {
        let left = self.x.max(other.x);
        let top = self.y.max(other.y);
        let right = (self.x + self.w).min(other.x + other.w);
        let bottom = (self.y + self.h).min(other.y + other.h);
        Self::new(left, top, (right - left).max(0), (bottom - top).max(0))
    }
}

/// Map a logical rectangle to physical buffer coordinates
///
/// `width` and `height` are the logical extent of the surface.
pub fn transform_rect(rotation: Rotation, rect: Rect, width: i32, height: i32) -> Rect {
    let mut r = rect;
    if rotation.flips_vertical() {
        r.y = height - (r.y + r.h);
    }
    if rotation.flips_horizontal() {
        r.x = width - (r.x + r.w);
    }
    if rotation.swaps_axes() {
        swap(&mut r.x, &mut r.y);
        swap(&mut r.w, &mut r.h);
    }
    r
}

/// Map a physical rectangle back to logical coordinates
///
/// `width` and `height` are the logical extent of the surface.
pub fn inverse_rect(rotation: Rotation, rect: Rect, width: i32, height: i32) -> Rect {
    let mut r = rect;
    if rotation.swaps_axes() {
        swap(&mut r.x, &mut r.y);
        swap(&mut r.w, &mut r.h);
    }
    if rotation.flips_horizontal() {
        r.x = width - (r.x + r.w);
    }
    if rotation.flips_vertical() {
        r.y = height - (r.y + r.h);
    }
    r
}

/// Map a logical pixel to physical buffer coordinates
pub fn transform_point(rotation: Rotation, x: i32, y: i32, width: i32, height: i32) -> (i32, i32) {
    let r = transform_rect(rotation, Rect::new(x, y, 1, 1), width, height);
    (r.x, r.y)
}

/// Map a physical pixel back to logical coordinates
pub fn inverse_point(rotation: Rotation, x: i32, y: i32, width: i32, height: i32) -> (i32, i32) {
    let r = inverse_rect(rotation, Rect::new(x, y, 1, 1), width, height);
    (r.x, r.y)
}

/// Source cursor walk over a destination rectangle
///
/// `x32`/`y32` is the fixed-point source position of the first pixel.
/// `add_*` is added per destination pixel along a row and `next_*` per row.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Walk {
    /// Source x of the first pixel
    pub x32: i32,
    /// Source y of the first pixel
    pub y32: i32,
    /// Source x step per pixel
    pub add_x: i32,
    /// Source y step per pixel
    pub add_y: i32,
    /// Source x step per row
    pub next_x: i32,
    /// Source y step per row
    pub next_y: i32,
}

/// Map a logical destination rectangle and its source walk to physical order
///
/// The returned walk visits the physical rectangle row by row, left to right,
/// and still lands on the same source pixel for every destination pixel.
pub fn rotate_walk(
    rotation: Rotation,
    rect: Rect,
    width: i32,
    height: i32,
    walk: Walk,
) -> (Rect, Walk) {
    let mut r = rect;
    let mut s = walk;
    if rotation.flips_vertical() {
        s.x32 += s.next_x * (r.h - 1);
        s.y32 += s.next_y * (r.h - 1);
        s.next_x = -s.next_x;
        s.next_y = -s.next_y;
        r.y = height - (r.y + r.h);
    }
    if rotation.flips_horizontal() {
        s.x32 += s.add_x * (r.w - 1);
        s.y32 += s.add_y * (r.w - 1);
        s.add_x = -s.add_x;
        s.add_y = -s.add_y;
        r.x = width - (r.x + r.w);
    }
    if rotation.swaps_axes() {
        swap(&mut r.x, &mut r.y);
        swap(&mut r.w, &mut r.h);
        swap(&mut s.add_x, &mut s.next_x);
        swap(&mut s.add_y, &mut s.next_y);
    }
    (r, s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_round_trip() {
        for (code, rotation) in Rotation::ALL.into_iter().enumerate() {
            assert_eq!(rotation.code() as usize, code);
            assert_eq!(Rotation::from_code(code as u8), rotation);
        }
        assert_eq!(Rotation::from_code(9), Rotation::Rotate90);
    }

    #[test]
    fn test_flip_bits() {
        let vertical: [bool; 8] = Rotation::ALL.map(Rotation::flips_vertical);
        assert_eq!(
            vertical,
            [false, true, true, false, true, false, false, true]
        );
        let horizontal: [bool; 8] = Rotation::ALL.map(Rotation::flips_horizontal);
        assert_eq!(
            horizontal,
            [false, false, true, true, false, false, true, true]
        );
    }

    #[test]
    fn test_rect_round_trip_identity() {
        let (w, h) = (20, 12);
        let rects = [
            Rect::new(0, 0, 20, 12),
            Rect::new(3, 4, 5, 2),
            Rect::new(19, 11, 1, 1),
            Rect::new(0, 7, 9, 5),
        ];
        for rotation in Rotation::ALL {
            let (pw, ph) = if rotation.swaps_axes() { (h, w) } else { (w, h) };
            for rect in rects {
                let physical = transform_rect(rotation, rect, w, h);
                assert_eq!(inverse_rect(rotation, physical, w, h), rect, "{rotation:?}");
                assert!(physical.x >= 0 && physical.x + physical.w <= pw);
                assert!(physical.y >= 0 && physical.y + physical.h <= ph);
            }
        }
    }

    #[test]
    fn test_rotate90_corners() {
        // 16x8 logical, 8x16 physical
        assert_eq!(transform_point(Rotation::Rotate90, 0, 0, 16, 8), (7, 0));
        assert_eq!(transform_point(Rotation::Rotate90, 15, 0, 16, 8), (7, 15));
        assert_eq!(transform_point(Rotation::Rotate90, 0, 7, 16, 8), (0, 0));
        assert_eq!(transform_point(Rotation::Rotate180, 0, 0, 16, 8), (15, 7));
        assert_eq!(transform_point(Rotation::Mirror90, 3, 5, 16, 8), (5, 3));
    }

    #[test]
    fn test_rotate_walk_lands_on_same_source_pixels() {
        let (w, h) = (9, 6);
        let rect = Rect::new(2, 1, 4, 3);
        let walk = Walk {
            x32: 0,
            y32: 0,
            add_x: 1,
            add_y: 0,
            next_x: 0,
            next_y: 1,
        };
        for rotation in Rotation::ALL {
            let (pr, s) = rotate_walk(rotation, rect, w, h, walk);
            assert_eq!(pr, transform_rect(rotation, rect, w, h));
            for pj in 0..pr.h {
                for pi in 0..pr.w {
                    let sx = s.x32 + pi * s.add_x + pj * s.next_x;
                    let sy = s.y32 + pi * s.add_y + pj * s.next_y;
                    let (lx, ly) = inverse_point(rotation, pr.x + pi, pr.y + pj, w, h);
                    assert_eq!((sx, sy), (lx - rect.x, ly - rect.y), "{rotation:?}");
                }
            }
        }
    }

    #[test]
    fn test_intersect() {
        let a = Rect::new(0, 0, 10, 10);
        assert_eq!(a.intersect(&Rect::new(5, -2, 10, 4)), Rect::new(5, 0, 5, 2));
        assert!(a.intersect(&Rect::new(20, 20, 1, 1)).is_empty());
    }
}
