//! Surface configuration types and builder

use crate::buffer::AllocationSource;
use crate::color::Palette;
pub use crate::error::{BuilderError, MAX_SURFACE_DIMENSION};
use crate::format::PixelFormat;
use crate::rotation::Rotation;

/// Physical surface dimensions
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Dimensions {
    /// Width in pixels of the unrotated surface
    pub width: u32,
    /// Height in pixels of the unrotated surface
    pub height: u32,
}

impl Dimensions {
    /// Create new dimensions with validation
    ///
    /// # Errors
    ///
    /// Returns `BuilderError::InvalidDimensions` if either side is 0 or
    /// larger than [`MAX_SURFACE_DIMENSION`].
    pub fn new(width: u32, height: u32) -> Result<Self, BuilderError> {
        if width == 0 || width > MAX_SURFACE_DIMENSION {
            return Err(BuilderError::InvalidDimensions { width, height });
        }
        if height == 0 || height > MAX_SURFACE_DIMENSION {
            return Err(BuilderError::InvalidDimensions { width, height });
        }
        Ok(Self { width, height })
    }

    /// Calculate required buffer size in bytes for `format`
    pub fn buffer_size(&self, format: PixelFormat) -> usize {
        format.buffer_size(self.width, self.height)
    }
}

/// Surface configuration
///
/// Use `Builder` to create a Config.
#[derive(Clone, Debug)]
pub struct Config {
    /// Physical dimensions
    pub dimensions: Dimensions,
    /// Pixel format
    pub format: PixelFormat,
    /// Initial rotation
    pub rotation: Rotation,
    /// Preferred memory for sprite buffers
    pub memory: AllocationSource,
    /// Palette for palette formats, a grayscale ramp when `None`
    pub palette: Option<Palette>,
}

impl Config {
    /// Get the logical dimensions based on rotation setting
    pub fn logical_dimensions(&self) -> Dimensions {
        let (width, height) = self
            .rotation
            .logical_size(self.dimensions.width, self.dimensions.height);
        Dimensions { width, height }
    }
}

/// Builder for constructing surface configuration
///
/// # Example
///
/// ```
/// use surfblit::{Builder, Dimensions, PixelFormat, Rotation};
///
/// let dims = Dimensions::new(240, 135).unwrap();
/// let config = Builder::new()
///     .dimensions(dims)
///     .format(PixelFormat::Rgb565)
///     .rotation(Rotation::Rotate90)
///     .build()
///     .unwrap();
/// assert_eq!(config.logical_dimensions(), Dimensions::new(135, 240).unwrap());
/// ```
#[must_use]
#[derive(Default)]
pub struct Builder {
    /// Physical dimensions (required)
    dimensions: Option<Dimensions>,
    /// Pixel format
    format: PixelFormat,
    /// Initial rotation
    rotation: Rotation,
    /// Preferred memory for sprite buffers
    memory: AllocationSource,
    /// Palette for palette formats
    palette: Option<Palette>,
}

impl Builder {
    /// Create a new Builder with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set physical dimensions (required)
    pub fn dimensions(mut self, dims: Dimensions) -> Self {
        self.dimensions = Some(dims);
        self
    }

    /// Set pixel format (default RGB565)
    pub fn format(mut self, format: PixelFormat) -> Self {
        self.format = format;
        self
    }

    /// Set initial rotation
    pub fn rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self
    }

    /// Set preferred memory for sprite buffers (default DMA-capable)
    pub fn memory(mut self, memory: AllocationSource) -> Self {
        self.memory = memory;
        self
    }

    /// Set the palette used by palette formats
    pub fn palette(mut self, palette: Palette) -> Self {
        self.palette = Some(palette);
        self
    }

    /// Build the configuration
    ///
    /// # Errors
    ///
    /// Returns `BuilderError::MissingDimensions` if dimensions were not set
    pub fn build(self) -> Result<Config, BuilderError> {
        Ok(Config {
            dimensions: self.dimensions.ok_or(BuilderError::MissingDimensions)?,
            format: self.format,
            rotation: self.rotation,
            memory: self.memory,
            palette: self.palette,
        })
    }
}
