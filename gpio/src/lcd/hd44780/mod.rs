//! HD44780 LCD module.
//!
//! Drives HD44780-compatible character displays (like the common 1602A modules) by bit-banging the
//! parallel interface over plain GPIO lines. Both the 4-bit and the 8-bit interface are supported.
//!
//! See [driver::HD44780Driver] for the instruction set and [driver::GpioHD44780Driver] for the
//! GPIO implementation, including the power-up sequence and the higher-level text operations.
//!
//! # Sources
//!
//! - Hitachi, [“HD44780U (LCD-II) Dot Matrix Liquid Crystal Display Controller/Driver,”](https://www.sparkfun.com/datasheets/LCD/HD44780.pdf)
//!   figures 23 and 24 (pages 45–46) for the initialization sequences.

pub mod driver;
mod error;

pub use error::*;
