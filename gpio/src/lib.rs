pub mod gpiod;
pub mod lcd;
pub mod mock;

use std::fmt::Debug;
use thiserror::Error;

#[derive(Debug, Error, Eq, PartialEq, Clone)]
pub enum GpioError {
    #[error("line already in use")]
    AlreadyInUse,
    #[error("invalid argument")]
    InvalidArgument,
    #[error("line `{0}` not found")]
    NotFound(String),
    #[error("line is not configured as output")]
    NotOutput,
    #[error("line already closed")]
    Closed,
    #[error("IO error: {0}")]
    Io(std::io::ErrorKind),
    #[error("error: {0}")]
    Other(String),
}

impl From<std::io::Error> for GpioError {
    fn from(err: std::io::Error) -> Self {
        GpioError::Io(err.kind())
    }
}

pub type GpioResult<T> = Result<T, GpioError>;

/// A source of GPIO lines, e.g. a single GPIO chip.
pub trait GpioDriver: Debug {
    /// Opens the line with the given platform identifier.
    ///
    /// The identifier is either the line's label (like `BCM21`) or its numeric offset on the chip.
    ///
    /// # Errors
    /// - `GpioError::NotFound` if no line matches the identifier.
    /// - `GpioError::AlreadyInUse` if the line is already held by another handle.
    fn open_line(&self, name: &str) -> GpioResult<Box<dyn GpioLine + '_>>;
}

/// An open GPIO line.
///
/// The line is released when the handle is closed or dropped, whichever happens first.
pub trait GpioLine: Debug {
    /// Gets the identifier this line was opened with.
    fn name(&self) -> &str;

    /// Sets the line function to output, driving it to `initial_level` right away.
    fn set_output(&mut self, initial_level: bool) -> GpioResult<()>;

    /// Writes the level of the line.
    ///
    /// # Errors
    /// - `GpioError::NotOutput` if the line has not been configured as output.
    /// - `GpioError::Closed` if the line has already been released.
    fn write(&self, value: bool) -> GpioResult<()>;

    /// Reads the current level of the line.
    fn read(&self) -> GpioResult<bool>;

    /// Gets whether the line is still held by this handle.
    fn is_open(&self) -> bool;

    /// Releases the line.
    ///
    /// Closing an already closed line is a no-op.
    fn close(&mut self) -> GpioResult<()>;
}

/// Splits `value` into levels, LSb first: bit `i` ends up at index `i`.
pub fn bits_lsb_first<const N: usize>(value: u8) -> [bool; N] {
    let mut values = [false; N];
    for (i, level) in values.iter_mut().enumerate() {
        *level = (value >> i) & 1 != 0;
    }
    values
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bits_are_lsb_first() {
        assert_eq!(bits_lsb_first::<4>(0b1010), [false, true, false, true]);
        assert_eq!(
            bits_lsb_first::<8>(0xA5),
            [true, false, true, false, false, true, false, true]
        );
    }

    #[test]
    fn nibble_ignores_upper_bits() {
        assert_eq!(bits_lsb_first::<4>(0xF1), [true, false, false, false]);
    }

    #[test]
    fn io_error_keeps_kind() {
        let err: GpioError = std::io::Error::from(std::io::ErrorKind::PermissionDenied).into();
        assert_eq!(err, GpioError::Io(std::io::ErrorKind::PermissionDenied));
    }
}
