use crate::lcd::hd44780::driver::{
    BLINK_ON, CURSOR_ON, CharacterFont, DISPLAY_ON, EIGHT_BIT_MODE, ENTRY_LEFT,
    ENTRY_SHIFT_INCREMENT, FONT_5X10, TWO_LINES,
};

/// Controller settings tracked by the driver.
///
/// The HD44780 can't be asked for its settings without a R/W line, so the driver remembers what
/// it last sent. Every change goes to the controller right away, as a whole flag set.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct DriverState {
    /// Function set flags: interface width, line count and font.
    pub display_function: u8,
    /// Display control flags: display, cursor and blink.
    pub display_control: u8,
    /// Entry mode flags: text direction and autoscroll.
    pub display_mode: u8,
    /// Number of rows, 1 to 4.
    pub lines: u8,
    /// Number of columns, as given to `begin`.
    pub columns: u8,
}

impl DriverState {
    /// State right after construction, before `begin`, matching the controller's power-on reset.
    pub fn new(eight_bit: bool) -> Self {
        DriverState {
            display_function: if eight_bit { EIGHT_BIT_MODE } else { 0 },
            display_control: 0,
            display_mode: ENTRY_LEFT,
            lines: 1,
            columns: 0,
        }
    }

    /// Recomputes the function set flags from scratch, keeping only the interface width.
    pub(crate) fn set_geometry(&mut self, columns: u8, lines: u8, font: CharacterFont) {
        let mut function = self.display_function & EIGHT_BIT_MODE;
        if lines > 1 {
            function |= TWO_LINES;
        }
        // The 10 dots font only fits a single line
        if font == CharacterFont::Dots5x10 && lines == 1 {
            function |= FONT_5X10;
        }
        self.display_function = function;
        self.lines = lines;
        self.columns = columns;
    }

    pub(crate) fn set_control(&mut self, flag: u8, on: bool) {
        if on {
            self.display_control |= flag;
        } else {
            self.display_control &= !flag;
        }
    }

    pub(crate) fn set_mode(&mut self, flag: u8, on: bool) {
        if on {
            self.display_mode |= flag;
        } else {
            self.display_mode &= !flag;
        }
    }

    pub fn is_8bit(&self) -> bool {
        self.display_function & EIGHT_BIT_MODE != 0
    }

    pub fn is_two_lines(&self) -> bool {
        self.display_function & TWO_LINES != 0
    }

    pub fn font(&self) -> CharacterFont {
        if self.display_function & FONT_5X10 != 0 {
            CharacterFont::Dots5x10
        } else {
            CharacterFont::Dots5x8
        }
    }

    pub fn is_display_on(&self) -> bool {
        self.display_control & DISPLAY_ON != 0
    }

    pub fn is_cursor_on(&self) -> bool {
        self.display_control & CURSOR_ON != 0
    }

    pub fn is_blink_on(&self) -> bool {
        self.display_control & BLINK_ON != 0
    }

    pub fn is_left_to_right(&self) -> bool {
        self.display_mode & ENTRY_LEFT != 0
    }

    pub fn is_autoscroll(&self) -> bool {
        self.display_mode & ENTRY_SHIFT_INCREMENT != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geometry_is_recomputed_not_accumulated() {
        let mut state = DriverState::new(false);
        state.set_geometry(16, 2, CharacterFont::Dots5x8);
        assert!(state.is_two_lines());

        state.set_geometry(16, 1, CharacterFont::Dots5x10);
        assert!(!state.is_two_lines());
        assert_eq!(state.font(), CharacterFont::Dots5x10);
        assert!(!state.is_8bit());
    }

    #[test]
    fn tall_font_needs_single_line() {
        let mut state = DriverState::new(true);
        state.set_geometry(20, 2, CharacterFont::Dots5x10);
        assert_eq!(state.font(), CharacterFont::Dots5x8);
        assert_eq!(state.display_function, EIGHT_BIT_MODE | TWO_LINES);
    }

    #[test]
    fn control_flags_are_independent() {
        let mut state = DriverState::new(false);
        state.set_control(CURSOR_ON, true);
        state.set_control(DISPLAY_ON, true);
        state.set_control(DISPLAY_ON, false);
        assert!(!state.is_display_on());
        assert!(state.is_cursor_on());
        assert!(!state.is_blink_on());
    }
}
