//! Error types for the engine
//!
//! This module defines error types for configuration building ([`BuilderError`]),
//! core pixel/geometry operations ([`Error`]) and hardware panel surfaces
//! ([`PanelError`]).
//!
//! ## Error Types
//!
//! - [`BuilderError`] - Errors during configuration construction
//! - [`Error`] - Data, format and geometry errors raised by the core
//! - [`PanelError`] - Bus errors from a [`DisplayInterface`](crate::interface::DisplayInterface)
//!   or core errors raised while driving a [`Panel`](crate::panel::Panel)
//!
//! Conditions that depend on data (bad geometry, allocation pressure, palette
//! misses) are always reported through these types. Caller bugs such as a
//! streaming write outside the active window are `debug_assert!`s instead.
//!
//! ## Example
//!
//! ```
//! use surfblit::{Builder, BuilderError, Dimensions};
//!
//! // Missing dimensions
//! let result = Builder::new().build();
//! assert!(matches!(result, Err(BuilderError::MissingDimensions)));
//!
//! // Invalid dimensions
//! let result = Dimensions::new(0, 16);
//! assert!(result.is_err());
//! ```

use crate::buffer::AllocationSource;
use crate::color::Rgb888;
use crate::format::PixelFormat;

/// Largest width or height accepted for a surface, in pixels
///
/// Fixed-point source cursors carry 16 fractional bits in an `i32`, which
/// leaves 15 bits of integer range; 4096 keeps comfortable headroom for
/// zoomed and rotated traversal.
pub const MAX_SURFACE_DIMENSION: u32 = 4096;

/// Errors raised by the pixel transfer and compositing core
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Error {
    /// Invalid surface dimensions
    ///
    /// Both axes must satisfy `1 <= n <= MAX_SURFACE_DIMENSION`.
    InvalidDimensions {
        /// Requested width
        width: u32,
        /// Requested height
        height: u32,
    },
    /// Buffer is too small for the requested surface or image
    BufferTooSmall {
        /// Required buffer size in bytes
        required: usize,
        /// Provided buffer size in bytes
        provided: usize,
    },
    /// No memory could be obtained, even after falling back
    AllocationFailed {
        /// Requested size in bytes
        requested: usize,
        /// Memory source that was asked for first
        source: AllocationSource,
    },
    /// A palette-indexed format was used without a palette
    MissingPalette,
    /// A color has no exact match in the destination palette
    PaletteMiss {
        /// The color that could not be mapped
        color: Rgb888,
    },
    /// The engine has no conversion between these formats
    UnsupportedConversion {
        /// Source format
        src: PixelFormat,
        /// Destination format
        dst: PixelFormat,
    },
    /// Zoom factors must be finite and strictly positive
    InvalidZoom,
    /// The affine matrix is not invertible
    DegenerateMatrix,
    /// The sprite has no pixel buffer
    EmptySurface,
    /// The surface cannot be read back
    ReadUnsupported,
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::InvalidDimensions { width, height } => write!(
                f,
                "Invalid dimensions {width}x{height} (max {MAX_SURFACE_DIMENSION}x{MAX_SURFACE_DIMENSION})"
            ),
            Self::BufferTooSmall { required, provided } => {
                write!(
                    f,
                    "Buffer too small: required {required} bytes, provided {provided}"
                )
            }
            Self::AllocationFailed { requested, source } => {
                write!(f, "Failed to allocate {requested} bytes from {source:?}")
            }
            Self::MissingPalette => write!(f, "Palette-indexed format used without a palette"),
            Self::PaletteMiss { color } => write!(
                f,
                "Color #{:02X}{:02X}{:02X} is not in the destination palette",
                color.r, color.g, color.b
            ),
            Self::UnsupportedConversion { src, dst } => {
                write!(f, "Unsupported conversion from {src:?} to {dst:?}")
            }
            Self::InvalidZoom => write!(f, "Zoom factors must be positive"),
            Self::DegenerateMatrix => write!(f, "Affine matrix is not invertible"),
            Self::EmptySurface => write!(f, "Surface has no pixel buffer"),
            Self::ReadUnsupported => write!(f, "Surface does not support readback"),
        }
    }
}

impl core::error::Error for Error {}

/// Errors that can occur when building configuration
///
/// These errors occur during the builder pattern before the sprite is created.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BuilderError {
    /// Dimensions were not specified
    ///
    /// [`Builder::dimensions()`](crate::config::Builder::dimensions) must be called before building.
    MissingDimensions,
    /// Invalid dimensions provided
    ///
    /// See [`Dimensions::new()`](crate::config::Dimensions::new) for constraints.
    InvalidDimensions {
        /// Requested width
        width: u32,
        /// Requested height
        height: u32,
    },
}

impl core::fmt::Display for BuilderError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::MissingDimensions => write!(f, "Dimensions must be specified"),
            Self::InvalidDimensions { width, height } => write!(
                f,
                "Invalid dimensions {width}x{height} (max {MAX_SURFACE_DIMENSION}x{MAX_SURFACE_DIMENSION})"
            ),
        }
    }
}

impl core::error::Error for BuilderError {}

/// Errors raised by a hardware [`Panel`](crate::panel::Panel)
///
/// Generic over the interface error type so callers can match on the
/// underlying bus failure.
#[derive(Debug)]
pub enum PanelError<E> {
    /// Interface error (SPI/GPIO)
    Interface(E),
    /// Core pixel/geometry error
    Core(Error),
}

impl<E> From<Error> for PanelError<E> {
    fn from(err: Error) -> Self {
        Self::Core(err)
    }
}

impl<E: core::fmt::Debug> core::fmt::Display for PanelError<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Interface(e) => write!(f, "Interface error: {e:?}"),
            Self::Core(e) => write!(f, "{e}"),
        }
    }
}

impl<E: core::fmt::Debug> core::error::Error for PanelError<E> {}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn test_palette_miss_message_shows_hex_color() {
        let err = Error::PaletteMiss {
            color: Rgb888::new(0x12, 0xAB, 0xFF),
        };
        assert_eq!(
            err.to_string(),
            "Color #12ABFF is not in the destination palette"
        );
    }

    #[test]
    fn test_panel_error_wraps_core_error() {
        let err: PanelError<()> = Error::InvalidZoom.into();
        assert!(matches!(err, PanelError::Core(Error::InvalidZoom)));
    }
}
