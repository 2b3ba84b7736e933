//! MIPI-DCS command definitions
//!
//! This module defines the subset of the MIPI Display Command Set used by
//! [`Panel`](crate::panel::Panel) to bring up a TFT controller and stream
//! pixels into its frame memory. Commands are sent with the DC pin low,
//! their parameters with the DC pin high.
//!
//! ## Window Writes
//!
//! Pixel data is streamed into a rectangle:
//! 1. `CASET` with the first and last column (big-endian u16 pair)
//! 2. `RASET` with the first and last row
//! 3. `RAMWR` followed by the pixel bytes, row by row
//!
//! ## Example
//!
//! ```rust,no_run
//! use surfblit::{command, DisplayInterface, Interface};
//! # use core::convert::Infallible;
//! # use embedded_hal::digital::OutputPin;
//! # use embedded_hal::spi::{Operation, SpiDevice};
//! # struct MockSpi;
//! # impl embedded_hal::spi::ErrorType for MockSpi { type Error = Infallible; }
//! # impl SpiDevice for MockSpi {
//! #     fn transaction(
//! #         &mut self,
//! #         _operations: &mut [Operation<'_, u8>],
//! #     ) -> Result<(), Self::Error> {
//! #         Ok(())
//! #     }
//! # }
//! # struct MockPin;
//! # impl embedded_hal::digital::ErrorType for MockPin { type Error = Infallible; }
//! # impl OutputPin for MockPin {
//! #     fn set_low(&mut self) -> Result<(), Self::Error> { Ok(()) }
//! #     fn set_high(&mut self) -> Result<(), Self::Error> { Ok(()) }
//! # }
//! # let mut interface = Interface::new(MockSpi, MockPin, MockPin);
//! # let pixel_data = [0xF8u8, 0x00];
//! // Single pixel window at (10, 20)
//! let _ = interface.send_command(command::CASET);
//! let _ = interface.send_data(&[0, 10, 0, 10]);
//! let _ = interface.send_command(command::RASET);
//! let _ = interface.send_data(&[0, 20, 0, 20]);
//! let _ = interface.send_command(command::RAMWR);
//! let _ = interface.send_data(&pixel_data);
//! ```

// System control commands

/// Software reset (0x01)
///
/// Resets registers to their defaults. Wait 120ms before the next command.
pub const SWRESET: u8 = 0x01;

/// Sleep out (0x11)
///
/// Turns the DC/DC converter and oscillator on. Wait 120ms afterwards.
pub const SLPOUT: u8 = 0x11;

/// Sleep in (0x10)
pub const SLPIN: u8 = 0x10;

/// Display on (0x29)
pub const DISPON: u8 = 0x29;

/// Display off (0x28)
pub const DISPOFF: u8 = 0x28;

/// Display inversion on (0x21)
pub const INVON: u8 = 0x21;

/// Display inversion off (0x20)
pub const INVOFF: u8 = 0x20;

// Frame memory commands

/// Column address set (0x2A)
///
/// Requires 4 bytes: [start_MSB, start_LSB, end_MSB, end_LSB]
pub const CASET: u8 = 0x2A;

/// Row address set (0x2B)
///
/// Requires 4 bytes: [start_MSB, start_LSB, end_MSB, end_LSB]
pub const RASET: u8 = 0x2B;

/// Memory write (0x2C)
///
/// Followed by pixel data filling the current window row by row.
pub const RAMWR: u8 = 0x2C;

/// Memory access control (0x36)
///
/// Requires 1 byte. Rotation is applied in software, so the
/// [`MADCTL_RGB`]/[`MADCTL_BGR`] order bit is the only one set by this crate.
pub const MADCTL: u8 = 0x36;

/// MADCTL: red first
pub const MADCTL_RGB: u8 = 0x00;

/// MADCTL: blue first
pub const MADCTL_BGR: u8 = 0x08;

/// Interface pixel format (0x3A)
///
/// Requires 1 byte, see [`COLMOD_16BIT`] and [`COLMOD_18BIT`].
pub const COLMOD: u8 = 0x3A;

/// COLMOD: 16 bits per pixel (RGB565)
pub const COLMOD_16BIT: u8 = 0x55;

/// COLMOD: 18 bits per pixel (RGB666 in three bytes)
pub const COLMOD_18BIT: u8 = 0x66;
