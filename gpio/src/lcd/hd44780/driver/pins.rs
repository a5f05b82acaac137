use crate::lcd::hd44780::{LcdError, LcdResult};
use crate::{GpioDriver, GpioLine, GpioResult, bits_lsb_first};
use log::{debug, warn};

/// Data line identifiers, D0 first. In 4-bit wiring these are the lines connected to D4–D7 of
/// the display.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum DataPins {
    Four([String; 4]),
    Eight([String; 8]),
}

/// Which platform line plays which role on the display.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct PinAssignment {
    /// Register select: low for commands, high for data.
    pub rs: String,
    /// Read/write. If not provided, the R/W pin of the display must be tied to GND (write mode).
    pub rw: Option<String>,
    /// Enable, the display latches the bus on its falling edge.
    pub enable: String,
    pub data: DataPins,
}

impl PinAssignment {
    pub fn new_4bit(rs: &str, rw: Option<&str>, enable: &str, data: [&str; 4]) -> Self {
        PinAssignment {
            rs: rs.to_string(),
            rw: rw.map(str::to_string),
            enable: enable.to_string(),
            data: DataPins::Four(data.map(str::to_string)),
        }
    }

    pub fn new_8bit(rs: &str, rw: Option<&str>, enable: &str, data: [&str; 8]) -> Self {
        PinAssignment {
            rs: rs.to_string(),
            rw: rw.map(str::to_string),
            enable: enable.to_string(),
            data: DataPins::Eight(data.map(str::to_string)),
        }
    }

    pub fn is_8bit(&self) -> bool {
        matches!(self.data, DataPins::Eight(_))
    }

    /// Gets all line identifiers in acquisition order: RS, E, R/W, then the data lines.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        let data: &[String] = match &self.data {
            DataPins::Four(pins) => pins,
            DataPins::Eight(pins) => pins,
        };
        [&self.rs, &self.enable]
            .into_iter()
            .chain(self.rw.as_ref())
            .chain(data)
            .map(String::as_str)
    }
}

pub(crate) type Line<'a> = Box<dyn GpioLine + 'a>;

#[derive(Debug)]
pub(crate) enum DataBus<'a> {
    Bus4Bit([Line<'a>; 4]),
    Bus8Bit([Line<'a>; 8]),
}

impl DataBus<'_> {
    pub fn is_8bit(&self) -> bool {
        matches!(self, DataBus::Bus8Bit(_))
    }

    /// Puts the value on the bus, LSb first. In 4-bit mode only the low nibble is used.
    pub fn write(&self, value: u8) -> GpioResult<()> {
        match self {
            DataBus::Bus4Bit(lines) => write_lines(lines, bits_lsb_first(value)),
            DataBus::Bus8Bit(lines) => write_lines(lines, bits_lsb_first(value)),
        }
    }
}

fn write_lines<const N: usize>(lines: &[Line<'_>; N], values: [bool; N]) -> GpioResult<()> {
    for (line, value) in lines.iter().zip(values) {
        line.write(value)?;
    }
    Ok(())
}

/// All lines held by a driver. They are acquired together and released together.
#[derive(Debug)]
pub(crate) struct LineSet<'a> {
    pub rs: Line<'a>,
    pub enable: Line<'a>,
    pub rw: Option<Line<'a>>,
    pub data: DataBus<'a>,
}

impl<'a> LineSet<'a> {
    /// Opens every line of the assignment and configures it as output, initially low.
    ///
    /// If any line fails, the ones opened so far are released before the error is returned.
    pub fn acquire(gpio: &'a dyn GpioDriver, pins: &PinAssignment) -> LcdResult<Self> {
        let mut opened: Vec<Line<'a>> = Vec::new();

        for name in pins.names() {
            match open_output(gpio, name) {
                Ok(line) => opened.push(line),
                Err(err) => {
                    // Failures are logged by `release`, the open error is the one that matters
                    let _ = release(opened.iter_mut());
                    return Err(err);
                }
            }
        }

        let data = opened.split_off(if pins.rw.is_some() { 3 } else { 2 });
        let mut control = opened.into_iter();
        let (Some(rs), Some(enable)) = (control.next(), control.next()) else {
            return Err(LcdError::InvalidArgument("missing control lines"));
        };
        let rw = control.next();

        let data = if pins.is_8bit() {
            DataBus::Bus8Bit(
                data.try_into()
                    .map_err(|_| LcdError::InvalidArgument("expected 8 data lines"))?,
            )
        } else {
            DataBus::Bus4Bit(
                data.try_into()
                    .map_err(|_| LcdError::InvalidArgument("expected 4 data lines"))?,
            )
        };

        Ok(LineSet {
            rs,
            enable,
            rw,
            data,
        })
    }

    pub fn lines_mut(&mut self) -> impl Iterator<Item = &mut Line<'a>> {
        let data: &mut [Line<'a>] = match &mut self.data {
            DataBus::Bus4Bit(lines) => lines,
            DataBus::Bus8Bit(lines) => lines,
        };
        [&mut self.rs, &mut self.enable]
            .into_iter()
            .chain(self.rw.as_mut())
            .chain(data.iter_mut())
    }

    pub fn is_open(&self) -> bool {
        self.rs.is_open()
    }

    /// Releases every line still open. See [release].
    pub fn release(&mut self) -> LcdResult<()> {
        release(self.lines_mut())
    }
}

fn open_output<'a>(gpio: &'a dyn GpioDriver, name: &str) -> LcdResult<Line<'a>> {
    let resource = |source| LcdError::Resource {
        line: name.to_string(),
        source,
    };

    let mut line = gpio.open_line(name).map_err(resource)?;
    if let Err(err) = line.set_output(false) {
        if let Err(close_err) = line.close() {
            warn!("Failed to release line {}: {}", name, close_err);
        }
        return Err(resource(err));
    }
    debug!("Acquired {:?} as output", line);
    Ok(line)
}

/// Closes every open line, even if closing some of them fails. Lines already closed are skipped.
///
/// All failures are logged and returned together.
pub(crate) fn release<'l, 'a: 'l>(
    lines: impl IntoIterator<Item = &'l mut Line<'a>>,
) -> LcdResult<()> {
    let mut failures = Vec::new();

    for line in lines {
        if !line.is_open() {
            continue;
        }
        if let Err(err) = line.close() {
            warn!("Failed to release line {}: {}", line.name(), err);
            failures.push((line.name().to_string(), err));
        }
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err(LcdError::Release(failures))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GpioError;
    use crate::mock::{MockEvent, MockGpioDriver};

    fn pins_4bit() -> PinAssignment {
        PinAssignment::new_4bit("rs", Some("rw"), "e", ["d4", "d5", "d6", "d7"])
    }

    #[test]
    fn names_in_acquisition_order() {
        let pins = pins_4bit();
        let names: Vec<_> = pins.names().collect();
        assert_eq!(names, ["rs", "e", "rw", "d4", "d5", "d6", "d7"]);

        let data = ["0", "1", "2", "3", "4", "5", "6", "7"];
        let pins = PinAssignment::new_8bit("rs", None, "e", data);
        assert_eq!(pins.names().count(), 10);
        assert!(pins.is_8bit());
    }

    #[test]
    fn acquires_all_lines_low() {
        let gpio = MockGpioDriver::new();
        let lines = LineSet::acquire(&gpio, &pins_4bit()).unwrap();

        assert!(lines.rw.is_some());
        assert!(!lines.data.is_8bit());
        for name in pins_4bit().names() {
            assert!(gpio.is_open(name));
            assert!(gpio
                .events_of(name)
                .contains(&MockEvent::SetOutput(name.to_string(), false)));
        }
    }

    #[test]
    fn failed_open_releases_earlier_lines() {
        let gpio = MockGpioDriver::new();
        gpio.fail_open_of("d5");

        let err = LineSet::acquire(&gpio, &pins_4bit()).unwrap_err();
        assert_eq!(
            err,
            LcdError::Resource {
                line: "d5".into(),
                source: GpioError::AlreadyInUse
            }
        );
        for name in ["rs", "e", "rw", "d4"] {
            assert!(!gpio.is_open(name));
            assert_eq!(gpio.closes_of(name), 1);
        }
        assert!(gpio.events_of("d6").is_empty());
    }

    #[test]
    fn failed_configure_releases_the_line_itself() {
        let gpio = MockGpioDriver::new();
        gpio.fail_configure_of("e");

        let err = LineSet::acquire(&gpio, &pins_4bit()).unwrap_err();
        assert!(matches!(err, LcdError::Resource { ref line, .. } if line == "e"));
        assert!(!gpio.is_open("e"));
        assert!(!gpio.is_open("rs"));
    }

    #[test]
    fn release_attempts_every_line_and_aggregates() {
        let gpio = MockGpioDriver::new();
        gpio.fail_close_of("rs");
        gpio.fail_close_of("d6");
        let mut lines = LineSet::acquire(&gpio, &pins_4bit()).unwrap();

        let err = lines.release().unwrap_err();
        let LcdError::Release(failures) = err else {
            panic!("unexpected error {err:?}");
        };
        let failed: Vec<_> = failures.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(failed, ["rs", "d6"]);
        for name in pins_4bit().names() {
            assert_eq!(gpio.closes_of(name), 1);
        }

        // Everything is released now, nothing left to fail
        assert!(lines.release().is_ok());
        assert_eq!(gpio.closes_of("rs"), 1);
    }

    #[test]
    fn bus_writes_lsb_first() {
        let gpio = MockGpioDriver::new();
        let lines = LineSet::acquire(&gpio, &pins_4bit()).unwrap();
        gpio.clear_events();

        lines.data.write(0b0110).unwrap();
        assert_eq!(
            gpio.events(),
            vec![
                MockEvent::Write("d4".into(), false),
                MockEvent::Write("d5".into(), true),
                MockEvent::Write("d6".into(), true),
                MockEvent::Write("d7".into(), false),
            ]
        );
    }
}
