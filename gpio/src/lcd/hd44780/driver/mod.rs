//! HD44780 driver module.
//!
//! See [HD44780Driver] trait for the instruction set, and [GpioHD44780Driver] for the
//! implementation of the driver using GPIO lines.

mod delay;
mod gpio;
mod pins;
mod state;

pub use delay::*;
pub use gpio::*;
pub use pins::*;
pub use state::*;

use crate::lcd::hd44780::{LcdError, LcdResult};
use std::fmt::Debug;

// Instructions
pub const CLEAR_DISPLAY: u8 = 0b00000001;
pub const RETURN_HOME: u8 = 0b00000010;
pub const ENTRY_MODE_SET: u8 = 0b00000100;
pub const DISPLAY_CONTROL: u8 = 0b00001000;
pub const CURSOR_SHIFT: u8 = 0b00010000;
pub const FUNCTION_SET: u8 = 0b00100000;
pub const SET_CGRAM_ADDRESS: u8 = 0b01000000;
pub const SET_DDRAM_ADDRESS: u8 = 0b10000000;

// Entry mode flags
pub const ENTRY_LEFT: u8 = 0b00000010;
pub const ENTRY_SHIFT_INCREMENT: u8 = 0b00000001;

// Display control flags
pub const DISPLAY_ON: u8 = 0b00000100;
pub const CURSOR_ON: u8 = 0b00000010;
pub const BLINK_ON: u8 = 0b00000001;

// Cursor shift flags
pub const DISPLAY_MOVE: u8 = 0b00001000;
pub const MOVE_RIGHT: u8 = 0b00000100;

// Function set flags
pub const EIGHT_BIT_MODE: u8 = 0b00010000;
pub const TWO_LINES: u8 = 0b00001000;
pub const FONT_5X10: u8 = 0b00000100;

/// DDRAM address of the first column of each row.
pub const ROW_OFFSETS: [u8; 4] = [0x00, 0x40, 0x14, 0x54];

/// The most rows the controller can address, see [ROW_OFFSETS].
pub const MAX_LINES: u8 = ROW_OFFSETS.len() as u8;

/// The amount of custom characters the CGRAM can hold.
pub const CGRAM_SLOTS: u8 = 8;

/// The `HD44780Driver` trait defines a low-level interface for HD44780 LCD controller drivers.
///
/// Every instruction is a single byte sent with RS low. The provided methods build the
/// instruction bytes, the implementation only has to know how to move a byte to the controller.
pub trait HD44780Driver: Debug {
    /// Clears the display and sets the cursor to the home position.
    ///
    /// Command: `00000001`.
    /// Slow: the controller needs up to 1.52 ms to process it.
    fn clear_display(&mut self) -> LcdResult<()> {
        self.send_command(CLEAR_DISPLAY)
    }

    /// Sets the cursor to the home position and undoes any display shift.
    ///
    /// Command: `0000001?`.
    /// Slow: the controller needs up to 1.52 ms to process it.
    fn return_home(&mut self) -> LcdResult<()> {
        self.send_command(RETURN_HOME)
    }

    /// Sets the entry mode for the display, which controls how the cursor moves and whether the
    /// display is shifted after each write.
    ///
    /// Command: `000001IS`.
    /// `I` is `1` for right cursor direction, `0` for left cursor direction.
    /// `S` is `1` for display shift, `0` for no display shift.
    fn set_entry_mode(&mut self, cursor_direction: CursorDirection, shift: bool) -> LcdResult<()> {
        let mut command = ENTRY_MODE_SET;
        if cursor_direction == CursorDirection::Right {
            command |= ENTRY_LEFT;
        }
        if shift {
            command |= ENTRY_SHIFT_INCREMENT;
        }
        self.send_command(command)
    }

    /// Sets the display on/off, cursor on/off, and blinking on/off.
    ///
    /// Command: `00001DCB`.
    fn set_display_control(
        &mut self,
        display_on: bool,
        cursor_on: bool,
        blink_on: bool,
    ) -> LcdResult<()> {
        let mut command = DISPLAY_CONTROL;
        if display_on {
            command |= DISPLAY_ON;
        }
        if cursor_on {
            command |= CURSOR_ON;
        }
        if blink_on {
            command |= BLINK_ON;
        }
        self.send_command(command)
    }

    /// Moves the cursor or shifts the display, without touching the DDRAM contents.
    ///
    /// Command: `0001SR??`.
    /// `S` is `1` for display shift, `0` for cursor move.
    /// `R` is `1` for right, `0` for left.
    fn cursor_shift(&mut self, display_shift: bool, direction: CursorDirection) -> LcdResult<()> {
        let mut command = CURSOR_SHIFT;
        if display_shift {
            command |= DISPLAY_MOVE;
        }
        if direction == CursorDirection::Right {
            command |= MOVE_RIGHT;
        }
        self.send_command(command)
    }

    /// Sets the interface width, the number of lines and the font.
    ///
    /// Command: `001DNF??`.
    /// `D` is `1` for the 8-bit interface, `0` for the 4-bit one.
    /// `N` is `1` for 2 lines, `0` for 1 line.
    /// `F` is `1` for the 5x10 font, `0` for the 5x8 font.
    fn function_set(
        &mut self,
        data_length: bool,
        two_lines: bool,
        font: CharacterFont,
    ) -> LcdResult<()> {
        let mut command = FUNCTION_SET;
        if data_length {
            command |= EIGHT_BIT_MODE;
        }
        if two_lines {
            command |= TWO_LINES;
        }
        if font == CharacterFont::Dots5x10 {
            command |= FONT_5X10;
        }
        self.send_command(command)
    }

    /// Sets the CGRAM address. Data written afterwards goes to the custom character patterns.
    ///
    /// Command: `01AAAAAA`.
    fn set_cgram_address(&mut self, address: u8) -> LcdResult<()> {
        if address > 0b00111111 {
            return Err(LcdError::InvalidArgument("CGRAM address out of range"));
        }
        self.send_command(SET_CGRAM_ADDRESS | address)
    }

    /// Sets the DDRAM address. Data written afterwards goes to the display.
    ///
    /// Command: `1AAAAAAA`.
    fn set_ddram_address(&mut self, address: u8) -> LcdResult<()> {
        if address > 0b01111111 {
            return Err(LcdError::InvalidArgument("DDRAM address out of range"));
        }
        self.send_command(SET_DDRAM_ADDRESS | address)
    }

    // Low-level commands
    // These raw commands are used by the high-level functions above.

    /// Sends a command to the HD44780 controller.
    /// Sets the RS pin to 0 (command).
    fn send_command(&mut self, command: u8) -> LcdResult<()>;

    /// Sends data to the HD44780 controller.
    /// Sets the RS pin to 1 (data).
    fn send_data(&mut self, data: u8) -> LcdResult<()>;
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CursorDirection {
    /// Moves the cursor to the left after writing data.
    Left,
    /// Moves the cursor to the right after writing data.
    Right,
}

/// Character font of the display.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub enum CharacterFont {
    /// 5x8 dots, supported by every display.
    #[default]
    Dots5x8,
    /// 5x10 dots, only available on single-line displays.
    Dots5x10,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct Recorder {
        commands: Vec<u8>,
    }

    impl HD44780Driver for Recorder {
        fn send_command(&mut self, command: u8) -> LcdResult<()> {
            self.commands.push(command);
            Ok(())
        }

        fn send_data(&mut self, _data: u8) -> LcdResult<()> {
            unreachable!()
        }
    }

    #[test]
    fn builds_instruction_bytes() {
        let mut lcd = Recorder::default();
        lcd.clear_display().unwrap();
        lcd.return_home().unwrap();
        lcd.set_entry_mode(CursorDirection::Right, false).unwrap();
        lcd.set_display_control(true, false, true).unwrap();
        lcd.cursor_shift(true, CursorDirection::Left).unwrap();
        lcd.function_set(false, true, CharacterFont::Dots5x8).unwrap();
        lcd.function_set(true, false, CharacterFont::Dots5x10).unwrap();
        lcd.set_cgram_address(0x08).unwrap();
        lcd.set_ddram_address(0x40).unwrap();

        assert_eq!(
            lcd.commands,
            vec![0x01, 0x02, 0x06, 0x0D, 0x18, 0x28, 0x34, 0x48, 0xC0]
        );
    }

    #[test]
    fn rejects_addresses_out_of_range() {
        let mut lcd = Recorder::default();
        assert!(matches!(
            lcd.set_cgram_address(0x40),
            Err(LcdError::InvalidArgument(_))
        ));
        assert!(matches!(
            lcd.set_ddram_address(0x80),
            Err(LcdError::InvalidArgument(_))
        ));
        assert!(lcd.commands.is_empty());
    }
}
