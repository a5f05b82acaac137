use crate::lcd::hd44780::driver::pins::LineSet;
use crate::{GpioDriver, GpioResult};
use crate::lcd::hd44780::driver::{
    BLINK_ON, CGRAM_SLOTS, CURSOR_ON, CharacterFont, CursorDirection, DISPLAY_ON, Delay,
    DriverState, ENTRY_LEFT, ENTRY_SHIFT_INCREMENT, HD44780Driver, MAX_LINES, PinAssignment,
    ROW_OFFSETS, StdDelay,
};
use crate::lcd::hd44780::{LcdError, LcdResult};
use log::{debug, trace, warn};
use std::fmt;
use std::time::Duration;

/// Wait after power-up before talking to the controller. The datasheet asks for at least 40 ms.
pub const POWER_UP_DELAY: Duration = Duration::from_millis(50);
/// Wait after the first two synchronization writes. The datasheet asks for at least 4.1 ms.
pub const SYNC_DELAY_LONG: Duration = Duration::from_micros(4500);
/// Wait after the third synchronization write. The datasheet asks for at least 100 µs.
pub const SYNC_DELAY_SHORT: Duration = Duration::from_micros(150);
/// Bus settle time before raising E.
pub const ENABLE_SETUP: Duration = Duration::from_micros(1);
/// How long E stays high. The datasheet asks for at least 450 ns.
pub const ENABLE_PULSE: Duration = Duration::from_micros(1);
/// Execution time of a regular instruction. The datasheet asks for at least 37 µs.
pub const COMMAND_DELAY: Duration = Duration::from_micros(100);
/// Execution time of clear display and return home. The datasheet asks for at least 1.52 ms.
pub const SLOW_COMMAND_DELAY: Duration = Duration::from_millis(2);

/// Columns assumed by the width-specific constructors, which run `begin` right away.
pub const DEFAULT_COLUMNS: u8 = 16;

/// GpioHD44780Driver for HD44780 LCD controllers (like the 1602A modules) using GPIO lines.
///
/// The driver owns its lines for its whole lifetime. They are released by [Self::close], or when
/// the driver is dropped.
///
/// The controller is never read from, even if a R/W line is provided; R/W is held low so the
/// display stays in write mode. Each byte is followed by a fixed wait long enough for any
/// regular instruction, instead of polling the busy flag.
#[derive(Debug)]
pub struct GpioHD44780Driver<'a, D: Delay = StdDelay> {
    lines: LineSet<'a>,
    state: DriverState,
    delay: D,
    closed: bool,
}

/// The usual name of the 16x2 displays driven by this.
pub type Lcd1602<'a, D = StdDelay> = GpioHD44780Driver<'a, D>;

impl<'a> GpioHD44780Driver<'a, StdDelay> {
    /// Opens and configures all lines of the assignment, without initializing the display.
    /// Call [Self::begin] before anything else.
    pub fn open(gpio: &'a dyn GpioDriver, pins: &PinAssignment) -> LcdResult<Self> {
        Self::open_with_delay(gpio, pins, StdDelay)
    }

    /// Creates a new driver using a 4-bit data bus, and initializes a single-line display.
    ///
    /// # Parameters
    ///
    /// - `rs`: Register select line.
    /// - `rw`: Optional read/write line. If not provided, the R/W pin of the display must be
    ///   connected to GND, signifying write mode.
    /// - `enable`: Enable line.
    /// - `data`: Lines connected to D4–D7 of the display.
    pub fn new_4bit(
        gpio: &'a dyn GpioDriver,
        rs: &str,
        rw: Option<&str>,
        enable: &str,
        data: [&str; 4],
    ) -> LcdResult<Self> {
        let mut driver = Self::open(gpio, &PinAssignment::new_4bit(rs, rw, enable, data))?;
        driver.begin(DEFAULT_COLUMNS, 1, CharacterFont::default())?;
        Ok(driver)
    }

    /// Creates a new driver using an 8-bit data bus, and initializes a single-line display.
    ///
    /// See [Self::new_4bit] for the parameters; `data` are the lines connected to D0–D7.
    pub fn new_8bit(
        gpio: &'a dyn GpioDriver,
        rs: &str,
        rw: Option<&str>,
        enable: &str,
        data: [&str; 8],
    ) -> LcdResult<Self> {
        let mut driver = Self::open(gpio, &PinAssignment::new_8bit(rs, rw, enable, data))?;
        driver.begin(DEFAULT_COLUMNS, 1, CharacterFont::default())?;
        Ok(driver)
    }
}

impl<'a, D: Delay> GpioHD44780Driver<'a, D> {
    /// Same as [GpioHD44780Driver::open], waiting with the given [Delay].
    pub fn open_with_delay(
        gpio: &'a dyn GpioDriver,
        pins: &PinAssignment,
        delay: D,
    ) -> LcdResult<Self> {
        let lines = LineSet::acquire(gpio, pins)?;
        debug!("Acquired LCD lines {:?}", pins);
        Ok(GpioHD44780Driver {
            state: DriverState::new(lines.data.is_8bit()),
            lines,
            delay,
            closed: false,
        })
    }

    pub fn state(&self) -> &DriverState {
        &self.state
    }

    pub fn lines(&self) -> u8 {
        self.state.lines
    }

    pub fn columns(&self) -> u8 {
        self.state.columns
    }

    pub fn is_8bit(&self) -> bool {
        self.lines.data.is_8bit()
    }

    pub fn is_open(&self) -> bool {
        !self.closed
    }

    /// Initializes the display, following the datasheet's "initializing by instruction" sequence.
    ///
    /// The display may have been left in any state by a previous run, so the power-on reset
    /// can't be relied upon. First the interface is synchronized: the `0011` nibble is sent three
    /// times, which puts the controller in 8-bit mode no matter what it was in, and then `0010` is
    /// sent to switch to 4-bit mode if needed. Then:
    /// - sets the interface width, line count and font with the function set command,
    /// - turns the display on, without cursor or blinking,
    /// - clears the display,
    /// - sets left-to-right text without autoscroll.
    ///
    /// More than 4 rows can't be addressed, so `rows` is clamped to 1–4. The 5x10 font is only
    /// used on single-line displays.
    ///
    /// If a line write fails along the way the display is left half-initialized; call this again.
    pub fn begin(&mut self, columns: u8, rows: u8, font: CharacterFont) -> LcdResult<()> {
        self.ensure_open()?;

        let lines = rows.clamp(1, MAX_LINES);
        if lines != rows {
            warn!("Unsupported row count {}, using {}", rows, lines);
        }
        self.state.set_geometry(columns, lines, font);
        debug!("Initializing {}x{} LCD, {:?}", columns, lines, self.state);

        self.delay.delay(POWER_UP_DELAY);

        // Pull RS, E and R/W low to begin commands
        let pull_low = |set: &LineSet| -> GpioResult<()> {
            set.rs.write(false)?;
            set.enable.write(false)?;
            if let Some(rw) = &set.rw {
                rw.write(false)?;
            }
            Ok(())
        };
        pull_low(&self.lines).map_err(|source| LcdError::Command {
            value: 0,
            data: false,
            source,
        })?;

        if self.lines.data.is_8bit() {
            self.sync_function()?;
            self.delay.delay(SYNC_DELAY_LONG);
            self.sync_function()?;
            self.delay.delay(SYNC_DELAY_LONG);
            self.sync_function()?;
            self.delay.delay(SYNC_DELAY_SHORT);
        } else {
            // The controller starts listening in 8-bit mode, so only a single nibble is sent
            self.write_bits(0b0011, false)?;
            self.delay.delay(SYNC_DELAY_LONG);
            self.write_bits(0b0011, false)?;
            self.delay.delay(SYNC_DELAY_LONG);
            self.write_bits(0b0011, false)?;
            self.delay.delay(SYNC_DELAY_SHORT);
            self.write_bits(0b0010, false)?;
        }

        self.sync_function()?;

        self.state.display_control = DISPLAY_ON;
        self.sync_control()?;

        self.clear()?;

        self.state.display_mode = ENTRY_LEFT;
        self.sync_mode()?;

        debug!("LCD initialized");
        Ok(())
    }

    /// Clears the display and moves the cursor to the top left corner.
    pub fn clear(&mut self) -> LcdResult<()> {
        self.clear_display()?;
        self.delay.delay(SLOW_COMMAND_DELAY);
        Ok(())
    }

    /// Moves the cursor to the top left corner and undoes scrolling.
    pub fn home(&mut self) -> LcdResult<()> {
        self.return_home()?;
        self.delay.delay(SLOW_COMMAND_DELAY);
        Ok(())
    }

    /// Moves the cursor to the given column and row, both counted from 0.
    ///
    /// Rows past the last one end up on the last one.
    pub fn set_cursor(&mut self, col: u8, row: u8) -> LcdResult<()> {
        let row = row.min(self.state.lines.saturating_sub(1)) as usize;
        let address = col.wrapping_add(ROW_OFFSETS[row]);
        self.set_ddram_address(address & 0b01111111)
    }

    pub fn no_display(&mut self) -> LcdResult<()> {
        self.update_control(DISPLAY_ON, false)
    }

    pub fn display(&mut self) -> LcdResult<()> {
        self.update_control(DISPLAY_ON, true)
    }

    /// Hides the underline cursor.
    pub fn no_cursor(&mut self) -> LcdResult<()> {
        self.update_control(CURSOR_ON, false)
    }

    /// Shows the underline cursor.
    pub fn cursor(&mut self) -> LcdResult<()> {
        self.update_control(CURSOR_ON, true)
    }

    pub fn no_blink(&mut self) -> LcdResult<()> {
        self.update_control(BLINK_ON, false)
    }

    pub fn blink(&mut self) -> LcdResult<()> {
        self.update_control(BLINK_ON, true)
    }

    /// Shifts the whole display one column to the left, without changing the DDRAM.
    pub fn scroll_display_left(&mut self) -> LcdResult<()> {
        self.cursor_shift(true, CursorDirection::Left)
    }

    /// Shifts the whole display one column to the right, without changing the DDRAM.
    pub fn scroll_display_right(&mut self) -> LcdResult<()> {
        self.cursor_shift(true, CursorDirection::Right)
    }

    /// Text flows from left to right.
    pub fn left_to_right(&mut self) -> LcdResult<()> {
        self.update_mode(ENTRY_LEFT, true)
    }

    /// Text flows from right to left.
    pub fn right_to_left(&mut self) -> LcdResult<()> {
        self.update_mode(ENTRY_LEFT, false)
    }

    /// Shifts the display on every write, right-justifying text from the cursor.
    pub fn autoscroll(&mut self) -> LcdResult<()> {
        self.update_mode(ENTRY_SHIFT_INCREMENT, true)
    }

    /// Keeps the display in place on writes, left-justifying text from the cursor.
    pub fn no_autoscroll(&mut self) -> LcdResult<()> {
        self.update_mode(ENTRY_SHIFT_INCREMENT, false)
    }

    /// Stores a custom 5x8 character in one of the 8 CGRAM slots. Slot numbers wrap around.
    ///
    /// Each entry of `charmap` is a row, top first, with the low 5 bits being the dots. The
    /// character is then shown by writing the slot number, e.g. `write(slot)`.
    ///
    /// This leaves the address counter in the CGRAM, so move the cursor before printing.
    pub fn create_char(&mut self, slot: u8, charmap: &[u8; 8]) -> LcdResult<()> {
        let slot = slot & (CGRAM_SLOTS - 1);
        self.set_cgram_address(slot << 3)?;
        for &row in charmap {
            self.send_data(row)?;
        }
        Ok(())
    }

    /// Sends a raw instruction.
    pub fn command(&mut self, value: u8) -> LcdResult<()> {
        self.send_command(value)
    }

    /// Writes a raw character code at the cursor, e.g. a CGRAM slot or a character from the ROM.
    pub fn write(&mut self, value: u8) -> LcdResult<()> {
        self.send_data(value)
    }

    /// Writes the text at the cursor, one character at a time.
    ///
    /// Only ASCII maps to the character ROM reliably, anything else is shown as `?`. Stops at
    /// the first character that fails to send.
    pub fn print(&mut self, text: &str) -> LcdResult<()> {
        for c in text.chars() {
            if c.is_ascii() {
                self.send_data(c as u8)?;
            } else {
                warn!("Non-ASCII character: {}", c);
                self.send_data(b'?')?;
            }
        }
        Ok(())
    }

    /// Releases all lines. Calling it again does nothing.
    ///
    /// Every line gets a release attempt even if some fail; the failures are returned together.
    /// The driver can't be used afterwards.
    pub fn close(&mut self) -> LcdResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        debug!("Releasing LCD lines");
        self.lines.release()
    }

    fn ensure_open(&self) -> LcdResult<()> {
        if self.closed || !self.lines.is_open() {
            return Err(LcdError::Closed);
        }
        Ok(())
    }

    fn update_control(&mut self, flag: u8, on: bool) -> LcdResult<()> {
        self.state.set_control(flag, on);
        self.sync_control()
    }

    fn update_mode(&mut self, flag: u8, on: bool) -> LcdResult<()> {
        self.state.set_mode(flag, on);
        self.sync_mode()
    }

    fn sync_function(&mut self) -> LcdResult<()> {
        let state = self.state;
        self.function_set(state.is_8bit(), state.is_two_lines(), state.font())
    }

    fn sync_control(&mut self) -> LcdResult<()> {
        let state = self.state;
        self.set_display_control(
            state.is_display_on(),
            state.is_cursor_on(),
            state.is_blink_on(),
        )
    }

    fn sync_mode(&mut self) -> LcdResult<()> {
        let state = self.state;
        let direction = if state.is_left_to_right() {
            CursorDirection::Right
        } else {
            CursorDirection::Left
        };
        self.set_entry_mode(direction, state.is_autoscroll())
    }

    /// Latches whatever is on the bus: E low, settle, E high for at least 450 ns, E low, then
    /// waits for the controller to execute the instruction.
    fn pulse_enable(&mut self) -> GpioResult<()> {
        let pin = &self.lines.enable;
        pin.write(false)?;
        self.delay.delay(ENABLE_SETUP);
        pin.write(true)?;
        self.delay.delay(ENABLE_PULSE);
        pin.write(false)?;
        self.delay.delay(COMMAND_DELAY);
        Ok(())
    }

    /// Puts a nibble (4-bit bus) or a byte (8-bit bus) on the data lines and pulses E.
    fn write_bits(&mut self, value: u8, rs: bool) -> LcdResult<()> {
        let result = self
            .lines
            .data
            .write(value)
            .and_then(|()| self.pulse_enable());
        result.map_err(|source| LcdError::Command {
            value,
            data: rs,
            source,
        })
    }

    fn send(&mut self, data: u8, rs: bool) -> LcdResult<()> {
        self.ensure_open()?;
        trace!("Sending data: {:08b}, RS: {}", data, rs);

        let control = |lines: &LineSet| -> GpioResult<()> {
            // Set RS pin
            lines.rs.write(rs)?;
            // Set RW pin to write
            if let Some(rw) = &lines.rw {
                rw.write(false)?;
            }
            Ok(())
        };
        control(&self.lines).map_err(|source| LcdError::Command {
            value: data,
            data: rs,
            source,
        })?;

        if self.lines.data.is_8bit() {
            self.write_bits(data, rs)?;
        } else {
            let high_nibble = (data >> 4) & 0x0F;
            let low_nibble = data & 0x0F;
            trace!("Writing HN: {:04b}", high_nibble);
            self.write_bits(high_nibble, rs)?;
            trace!("Writing LN: {:04b}", low_nibble);
            self.write_bits(low_nibble, rs)?;
        }

        Ok(())
    }
}

impl<D: Delay> HD44780Driver for GpioHD44780Driver<'_, D> {
    fn send_command(&mut self, command: u8) -> LcdResult<()> {
        self.send(command, false)
    }

    fn send_data(&mut self, data: u8) -> LcdResult<()> {
        self.send(data, true)
    }
}

impl<D: Delay> fmt::Write for GpioHD44780Driver<'_, D> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.print(s).map_err(|_| fmt::Error)
    }
}

impl<D: Delay> Drop for GpioHD44780Driver<'_, D> {
    fn drop(&mut self) {
        // Failures are already logged by `close`
        let _ = self.close();
    }
}
