//! Hardware panel surface
//!
//! [`Panel`] drives a MIPI-DCS TFT controller through a [`DisplayInterface`].
//! Every write opens a column/row window (`CASET`/`RASET`), then streams the
//! pixel bytes after `RAMWR`. Rotation is applied in software with the same
//! transform sprites use, so the controller is always addressed in its native
//! orientation.
//!
//! Only whole-byte direct formats can go on the wire:
//! [`Rgb565Be`](PixelFormat::Rgb565Be), [`Rgb666`](PixelFormat::Rgb666),
//! [`Rgb888`](PixelFormat::Rgb888) and [`Bgr888`](PixelFormat::Bgr888).
//! Frame memory cannot be read back.

use alloc::vec::Vec;
use embedded_hal::delay::DelayNs;
use log::{debug, warn};

use crate::buffer::AllocationSource;
use crate::color::Palette;
use crate::command::{
    CASET, COLMOD, COLMOD_16BIT, COLMOD_18BIT, DISPOFF, DISPON, INVOFF, INVON, MADCTL, MADCTL_BGR,
    MADCTL_RGB, RAMWR, RASET, SLPIN, SLPOUT, SWRESET,
};
use crate::config::Config;
use crate::error::{Error, PanelError};
use crate::format::PixelFormat;
use crate::interface::DisplayInterface;
use crate::pixelcopy::PixelCopy;
use crate::rotation::{Rect, Rotation, Walk, rotate_walk, transform_point, transform_rect};
use crate::surface::{ClipRect, Surface, Window};

type PanelResult<I> = core::result::Result<(), PanelError<<I as DisplayInterface>::Error>>;

/// MIPI-DCS display surface
///
/// Holds one physical line of pixel bytes, allocated at construction, that
/// image writes are converted into before they are sent.
pub struct Panel<I>
where
    I: DisplayInterface,
{
    /// Hardware interface
    interface: I,
    /// Wire format
    format: PixelFormat,
    /// Physical width
    width: u32,
    /// Physical height
    height: u32,
    rotation: Rotation,
    clip: ClipRect,
    window: Window,
    /// One physical row of wire bytes
    line: Vec<u8>,
}

impl<I> Panel<I>
where
    I: DisplayInterface,
{
    /// Create a panel with the dimensions, format and rotation of `config`
    ///
    /// # Errors
    ///
    /// - [`Error::UnsupportedConversion`] when the format cannot be sent to a
    ///   DCS controller
    /// - [`Error::AllocationFailed`] when the line buffer cannot be allocated
    pub fn new(interface: I, config: &Config) -> Result<Self, Error> {
        let format = config.format;
        if !matches!(
            format,
            PixelFormat::Rgb565Be | PixelFormat::Rgb666 | PixelFormat::Rgb888 | PixelFormat::Bgr888
        ) {
            return Err(Error::UnsupportedConversion {
                src: format,
                dst: PixelFormat::Rgb565Be,
            });
        }
        let width = config.dimensions.width;
        let height = config.dimensions.height;
        let bytes = width as usize * format.bytes_per_pixel();
        let mut line = Vec::new();
        line.try_reserve_exact(bytes).map_err(|_| {
            warn!("panel line of {bytes} bytes could not be allocated");
            Error::AllocationFailed {
                requested: bytes,
                source: AllocationSource::Normal,
            }
        })?;
        line.resize(bytes, 0);
        debug!("panel {width}x{height} {format:?} {:?}", config.rotation);

        let (w, h) = config.rotation.logical_size(width, height);
        Ok(Self {
            interface,
            format,
            width,
            height,
            rotation: config.rotation,
            clip: ClipRect::full(w, h),
            window: Window::full(w, h),
            line,
        })
    }

    /// Hardware reset followed by the generic DCS bring-up
    ///
    /// Chip-specific registers (gamma, power, frame rate) are left at their
    /// reset values; send them afterwards through [`interface_mut`](Self::interface_mut).
    pub fn init<D: DelayNs>(&mut self, delay: &mut D) -> PanelResult<I> {
        self.interface.reset(delay);
        self.send_command(SWRESET)?;
        delay.delay_ms(120);
        self.send_command(SLPOUT)?;
        delay.delay_ms(120);

        let colmod = match self.format {
            PixelFormat::Rgb565Be => COLMOD_16BIT,
            _ => COLMOD_18BIT,
        };
        self.send_command(COLMOD)?;
        self.send_data(&[colmod])?;

        // Blue-first bytes are interpreted by flipping the panel's color order
        let madctl = match self.format {
            PixelFormat::Bgr888 => MADCTL_BGR,
            _ => MADCTL_RGB,
        };
        self.send_command(MADCTL)?;
        self.send_data(&[madctl])?;

        self.send_command(DISPON)
    }

    /// Turn the display off and enter sleep mode
    pub fn sleep<D: DelayNs>(&mut self, delay: &mut D) -> PanelResult<I> {
        self.send_command(DISPOFF)?;
        self.send_command(SLPIN)?;
        delay.delay_ms(5);
        Ok(())
    }

    /// Leave sleep mode and turn the display on
    pub fn wake<D: DelayNs>(&mut self, delay: &mut D) -> PanelResult<I> {
        self.send_command(SLPOUT)?;
        delay.delay_ms(120);
        self.send_command(DISPON)
    }

    /// Invert every color on the glass
    pub fn set_inverted(&mut self, inverted: bool) -> PanelResult<I> {
        self.send_command(if inverted { INVON } else { INVOFF })
    }

    /// Physical size
    pub fn physical_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Access the interface, e.g. for chip-specific commands
    pub fn interface_mut(&mut self) -> &mut I {
        &mut self.interface
    }

    /// Release the interface
    pub fn release(self) -> I {
        self.interface
    }

    fn send_command(&mut self, cmd: u8) -> PanelResult<I> {
        self.interface.send_command(cmd).map_err(PanelError::Interface)
    }

    fn send_data(&mut self, data: &[u8]) -> PanelResult<I> {
        self.interface.send_data(data).map_err(PanelError::Interface)
    }

    fn logical(&self) -> (i32, i32) {
        let (w, h) = self.rotation.logical_size(self.width, self.height);
        (w as i32, h as i32)
    }

    fn in_bounds(&self, rect: Rect) -> bool {
        let (w, h) = self.logical();
        rect.x >= 0 && rect.y >= 0 && rect.x + rect.w <= w && rect.y + rect.h <= h
    }
}

/// Open a physical window and start a memory write
fn address_window<I: DisplayInterface>(interface: &mut I, r: Rect) -> PanelResult<I> {
    let x0 = r.x as u16;
    let x1 = (r.x + r.w - 1) as u16;
    let y0 = r.y as u16;
    let y1 = (r.y + r.h - 1) as u16;
    let [x0h, x0l] = x0.to_be_bytes();
    let [x1h, x1l] = x1.to_be_bytes();
    let [y0h, y0l] = y0.to_be_bytes();
    let [y1h, y1l] = y1.to_be_bytes();
    interface.send_command(CASET).map_err(PanelError::Interface)?;
    interface
        .send_data(&[x0h, x0l, x1h, x1l])
        .map_err(PanelError::Interface)?;
    interface.send_command(RASET).map_err(PanelError::Interface)?;
    interface
        .send_data(&[y0h, y0l, y1h, y1l])
        .map_err(PanelError::Interface)?;
    interface.send_command(RAMWR).map_err(PanelError::Interface)
}

/// Write `bytes` into the physical window `r`
fn send_run<I: DisplayInterface>(interface: &mut I, r: Rect, bytes: &[u8]) -> PanelResult<I> {
    address_window(interface, r)?;
    interface.send_data(bytes).map_err(PanelError::Interface)
}

impl<I> Surface for Panel<I>
where
    I: DisplayInterface,
{
    type Error = PanelError<I::Error>;

    fn width(&self) -> u32 {
        self.logical().0 as u32
    }

    fn height(&self) -> u32 {
        self.logical().1 as u32
    }

    fn rotation(&self) -> Rotation {
        self.rotation
    }

    fn set_rotation(&mut self, rotation: Rotation) {
        self.rotation = rotation;
        let (w, h) = self.logical();
        self.clip = ClipRect::full(w as u32, h as u32);
        self.window = Window::full(w as u32, h as u32);
    }

    fn pixel_format(&self) -> PixelFormat {
        self.format
    }

    fn palette(&self) -> Option<&Palette> {
        None
    }

    fn clip(&self) -> ClipRect {
        self.clip
    }

    fn set_clip(&mut self, clip: ClipRect) {
        let (w, h) = self.logical();
        self.clip = clip.clamped(w as u32, h as u32);
    }

    fn window(&self) -> Window {
        self.window
    }

    fn set_window_state(&mut self, window: Window) {
        self.window = window;
    }

    fn draw_pixel(&mut self, x: i32, y: i32, raw: u32) -> PanelResult<I> {
        debug_assert!(self.in_bounds(Rect::new(x, y, 1, 1)), "({x}, {y}) outside panel");
        let (w, h) = self.logical();
        let (px, py) = transform_point(self.rotation, x, y, w, h);
        address_window(&mut self.interface, Rect::new(px, py, 1, 1))?;
        let bytes = raw.to_le_bytes();
        self.send_data(&bytes[..self.format.bytes_per_pixel()])
    }

    fn fill_rect(&mut self, rect: Rect, raw: u32) -> PanelResult<I> {
        if rect.is_empty() {
            return Ok(());
        }
        debug_assert!(self.in_bounds(rect), "{rect:?} outside panel");
        let (w, h) = self.logical();
        let r = transform_rect(self.rotation, rect, w, h);
        let bpp = self.format.bytes_per_pixel();
        let row = &mut self.line[..r.w as usize * bpp];
        let pixel = raw.to_le_bytes();
        for chunk in row.chunks_exact_mut(bpp) {
            chunk.copy_from_slice(&pixel[..bpp]);
        }
        address_window(&mut self.interface, r)?;
        for _ in 0..r.h {
            self.interface.send_data(row).map_err(PanelError::Interface)?;
        }
        Ok(())
    }

    fn write_image(&mut self, rect: Rect, copy: &mut PixelCopy<'_>) -> PanelResult<I> {
        if rect.is_empty() {
            return Ok(());
        }
        debug_assert!(self.in_bounds(rect), "{rect:?} outside panel");
        let (w, h) = self.logical();
        let saved = copy.walk;
        let (r, walk) = rotate_walk(self.rotation, rect, w, h, saved);
        let bpp = self.format.bytes_per_pixel();
        let len = r.w as usize;
        let mut result = Ok(());
        'rows: for row in 0..r.h {
            copy.walk = Walk {
                x32: walk.x32 + row * walk.next_x,
                y32: walk.y32 + row * walk.next_y,
                ..walk
            };
            // alpha blends against black
            let line = &mut self.line[..len * bpp];
            line.fill(0);
            let mut pos = 0;
            while pos < len {
                let start = pos;
                pos = copy.copy_run(line, pos, len);
                if pos > start {
                    let run = Rect::new(r.x + start as i32, r.y + row, (pos - start) as i32, 1);
                    let sent = send_run(&mut self.interface, run, &line[start * bpp..pos * bpp]);
                    if sent.is_err() {
                        result = sent;
                        break 'rows;
                    }
                }
                if pos < len {
                    pos = copy.skip_run(pos, len);
                }
            }
        }
        copy.walk = saved;
        result
    }
}
