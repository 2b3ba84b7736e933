//! Pixel Transfer and Sprite Compositing for Embedded Displays
//!
//! Device-independent drawing for TFT panels and off-screen sprites: every
//! write is converted to the destination's pixel format, oriented by its
//! rotation and clipped to its clip rectangle by the same engine, whether it
//! lands in RAM or on the wire.
//!
//! ## Features
//!
//! - `no_std` compatible (needs `alloc`)
//! - Packed 1/2/4-bit, 8-bit, 16-bit, 18/24-bit and 32-bit pixel formats
//! - Palette-indexed and direct color, with exact palette matching
//! - Eight rotation/mirror states applied identically to sprites and panels
//! - Rotated, zoomed and affine sprite pushes, optionally anti-aliased
//! - `embedded-hal` v1.0 panel support over SPI
//! - `embedded-graphics` integration (with `graphics` feature)
//!
//! ## Usage
//!
//! ```rust
//! use surfblit::buffer::SystemHeap;
//! use surfblit::{PixelFormat, Rgb888, Rotation, Sprite, Surface, Transparency};
//!
//! // Off-screen 16-bit canvas, rotated a quarter turn
//! let mut canvas = Sprite::new(PixelFormat::Rgb565);
//! canvas.create(&mut SystemHeap, 32, 16).unwrap();
//! canvas.set_rotation(Rotation::Rotate90);
//! assert_eq!((canvas.width(), canvas.height()), (16, 32));
//!
//! // 4-bit icon with a grayscale palette
//! let mut icon = Sprite::new(PixelFormat::Palette4);
//! icon.create(&mut SystemHeap, 8, 8).unwrap();
//! icon.fill_sprite(Rgb888::WHITE).unwrap();
//!
//! // Push it rotated 90 degrees, its centre on (8, 16)
//! icon.push_rotated(&mut canvas, 8.0, 16.0, 90.0, Transparency::None).unwrap();
//! assert_eq!(canvas.read_color(8, 16).unwrap(), Rgb888::WHITE);
//! ```

#![no_std]

extern crate alloc;

/// Sprite pixel memory and allocation sources
pub mod buffer;
/// Color types, palettes and format conversion
pub mod color;
/// MIPI-DCS command definitions
pub mod command;
/// Rotated, zoomed and affine image pushes
pub mod compositor;
/// Surface configuration types and builder
pub mod config;
/// Error types for the library
pub mod error;
/// Pixel formats
pub mod format;
/// Hardware interface abstraction
pub mod interface;
/// Hardware panel surface
pub mod panel;
/// Format-converting scanline copy
pub mod pixelcopy;
/// Coordinate rotation utilities
pub mod rotation;
/// In-memory surfaces
pub mod sprite;
/// The drawing surface contract
pub mod surface;

/// Graphics support via embedded-graphics (requires `graphics` feature)
#[cfg(feature = "graphics")]
pub mod graphics;

pub use buffer::{AllocationSource, MemoryPool, SurfaceBuffer, SystemHeap};
pub use color::{Argb8888, Palette, Rgb888};
pub use compositor::{Affine, Compositor};
pub use config::{Builder, Config, Dimensions};
pub use error::{BuilderError, Error, MAX_SURFACE_DIMENSION, PanelError};
pub use format::PixelFormat;
pub use interface::InterfaceError;
pub use interface::{DisplayInterface, Interface};
pub use panel::Panel;
pub use pixelcopy::{PixelCopy, SourceImage, Transparency};
pub use rotation::{Rect, Rotation};
pub use sprite::Sprite;
pub use surface::{ClipGuard, ClipRect, Surface, Window};

#[cfg(feature = "graphics")]
pub use graphics::Canvas;
