//! In-memory GPIO driver that records everything done to its lines.
//!
//! Useful for testing code built on top of [GpioDriver] without any hardware attached. Faults can
//! be injected on open, configure, write and close, to check how the caller copes with them.
use crate::{GpioDriver, GpioError, GpioLine, GpioResult};
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::fmt::{Debug, Formatter};

/// A single operation performed on a mock line.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum MockEvent {
    Open(String),
    SetOutput(String, bool),
    Write(String, bool),
    Close(String),
}

impl MockEvent {
    /// Gets the name of the line the event happened on.
    pub fn line(&self) -> &str {
        match self {
            MockEvent::Open(name)
            | MockEvent::SetOutput(name, _)
            | MockEvent::Write(name, _)
            | MockEvent::Close(name) => name,
        }
    }
}

/// A value latched by the falling edge of the enable line.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct MockPulse {
    /// Level of the register select line at the falling edge.
    pub rs: bool,
    /// Data lines read LSb first.
    pub value: u8,
}

#[derive(Default)]
pub struct MockGpioDriver {
    events: RefCell<Vec<MockEvent>>,
    open_lines: RefCell<HashSet<String>>,
    fail_open: RefCell<HashSet<String>>,
    fail_configure: RefCell<HashSet<String>>,
    fail_close: RefCell<HashSet<String>>,
    fail_write_in: Cell<Option<usize>>,
}

impl MockGpioDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes opening the named line fail with [GpioError::AlreadyInUse].
    pub fn fail_open_of(&self, name: &str) {
        self.fail_open.borrow_mut().insert(name.to_string());
    }

    /// Makes configuring the named line as output fail.
    pub fn fail_configure_of(&self, name: &str) {
        self.fail_configure.borrow_mut().insert(name.to_string());
    }

    /// Makes closing the named line fail. The line is released anyway.
    pub fn fail_close_of(&self, name: &str) {
        self.fail_close.borrow_mut().insert(name.to_string());
    }

    /// Makes the write after `writes` successful ones fail, on any line.
    pub fn fail_write_after(&self, writes: usize) {
        self.fail_write_in.set(Some(writes));
    }

    pub fn events(&self) -> Vec<MockEvent> {
        self.events.borrow().clone()
    }

    pub fn clear_events(&self) {
        self.events.borrow_mut().clear();
    }

    /// Gets whether the named line is currently held by a handle.
    pub fn is_open(&self, name: &str) -> bool {
        self.open_lines.borrow().contains(name)
    }

    /// Gets all events that happened on the named line.
    pub fn events_of(&self, name: &str) -> Vec<MockEvent> {
        self.events
            .borrow()
            .iter()
            .filter(|event| event.line() == name)
            .cloned()
            .collect()
    }

    /// Counts how many times the named line was closed.
    pub fn closes_of(&self, name: &str) -> usize {
        self.events
            .borrow()
            .iter()
            .filter(|event| matches!(event, MockEvent::Close(n) if n == name))
            .count()
    }

    /// Replays the recorded events and collects the values latched on every falling edge of
    /// `enable`, reading `data` LSb first.
    pub fn pulses(&self, rs: &str, enable: &str, data: &[&str]) -> Vec<MockPulse> {
        let mut levels: HashMap<&str, bool> = HashMap::new();
        let mut pulses = Vec::new();

        for event in self.events.borrow().iter() {
            let (name, value) = match event {
                MockEvent::SetOutput(name, value) | MockEvent::Write(name, value) => {
                    (name.as_str(), *value)
                }
                _ => continue,
            };

            if name == enable && !value && levels.get(enable).copied().unwrap_or(false) {
                let value = data
                    .iter()
                    .enumerate()
                    .filter(|(_, line)| levels.get(**line).copied().unwrap_or(false))
                    .fold(0u8, |acc, (i, _)| acc | (1 << i));
                pulses.push(MockPulse {
                    rs: levels.get(rs).copied().unwrap_or(false),
                    value,
                });
            }

            if let Some(key) = std::iter::once(rs)
                .chain(std::iter::once(enable))
                .chain(data.iter().copied())
                .find(|line| *line == name)
            {
                levels.insert(key, value);
            }
        }

        pulses
    }

    fn record(&self, event: MockEvent) {
        self.events.borrow_mut().push(event);
    }

    fn record_write(&self, name: &str, value: bool) -> GpioResult<()> {
        if let Some(remaining) = self.fail_write_in.get() {
            if remaining == 0 {
                self.fail_write_in.set(None);
                return Err(GpioError::Io(std::io::ErrorKind::BrokenPipe));
            }
            self.fail_write_in.set(Some(remaining - 1));
        }
        self.record(MockEvent::Write(name.to_string(), value));
        Ok(())
    }
}

impl Debug for MockGpioDriver {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "MockGpioDriver({} events)", self.events.borrow().len())
    }
}

impl GpioDriver for MockGpioDriver {
    fn open_line(&self, name: &str) -> GpioResult<Box<dyn GpioLine + '_>> {
        if self.fail_open.borrow().contains(name) || self.is_open(name) {
            return Err(GpioError::AlreadyInUse);
        }
        self.open_lines.borrow_mut().insert(name.to_string());
        self.record(MockEvent::Open(name.to_string()));
        Ok(Box::new(MockLine {
            driver: self,
            name: name.to_string(),
            level: Cell::new(false),
            output: false,
            open: true,
        }))
    }
}

struct MockLine<'a> {
    driver: &'a MockGpioDriver,
    name: String,
    level: Cell<bool>,
    output: bool,
    open: bool,
}

impl Debug for MockLine<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "MockLine({})", self.name)
    }
}

impl GpioLine for MockLine<'_> {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_output(&mut self, initial_level: bool) -> GpioResult<()> {
        if !self.open {
            return Err(GpioError::Closed);
        }
        if self.driver.fail_configure.borrow().contains(&self.name) {
            return Err(GpioError::InvalidArgument);
        }
        self.output = true;
        self.level.set(initial_level);
        self.driver
            .record(MockEvent::SetOutput(self.name.clone(), initial_level));
        Ok(())
    }

    fn write(&self, value: bool) -> GpioResult<()> {
        if !self.open {
            return Err(GpioError::Closed);
        }
        if !self.output {
            return Err(GpioError::NotOutput);
        }
        self.driver.record_write(&self.name, value)?;
        self.level.set(value);
        Ok(())
    }

    fn read(&self) -> GpioResult<bool> {
        if !self.open {
            return Err(GpioError::Closed);
        }
        Ok(self.level.get())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn close(&mut self) -> GpioResult<()> {
        if !self.open {
            return Ok(());
        }
        self.open = false;
        self.driver.open_lines.borrow_mut().remove(&self.name);
        self.driver.record(MockEvent::Close(self.name.clone()));
        if self.driver.fail_close.borrow().contains(&self.name) {
            return Err(GpioError::Io(std::io::ErrorKind::Other));
        }
        Ok(())
    }
}

impl Drop for MockLine<'_> {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_line_lifecycle() {
        let gpio = MockGpioDriver::new();
        let mut line = gpio.open_line("BCM4").unwrap();
        line.set_output(false).unwrap();
        line.write(true).unwrap();
        line.close().unwrap();
        line.close().unwrap();

        assert_eq!(
            gpio.events(),
            vec![
                MockEvent::Open("BCM4".into()),
                MockEvent::SetOutput("BCM4".into(), false),
                MockEvent::Write("BCM4".into(), true),
                MockEvent::Close("BCM4".into()),
            ]
        );
        assert!(!gpio.is_open("BCM4"));
    }

    #[test]
    fn refuses_second_handle_for_same_line() {
        let gpio = MockGpioDriver::new();
        let _line = gpio.open_line("BCM4").unwrap();
        assert_eq!(gpio.open_line("BCM4").unwrap_err(), GpioError::AlreadyInUse);
    }

    #[test]
    fn write_requires_output_and_open_line() {
        let gpio = MockGpioDriver::new();
        let mut line = gpio.open_line("BCM4").unwrap();
        assert_eq!(line.write(true).unwrap_err(), GpioError::NotOutput);
        line.set_output(false).unwrap();
        line.close().unwrap();
        assert_eq!(line.write(true).unwrap_err(), GpioError::Closed);
    }

    #[test]
    fn injected_write_failure_hits_once() {
        let gpio = MockGpioDriver::new();
        let mut line = gpio.open_line("BCM4").unwrap();
        line.set_output(false).unwrap();
        gpio.fail_write_after(1);
        assert!(line.write(true).is_ok());
        assert!(line.write(false).is_err());
        assert!(line.write(false).is_ok());
    }

    #[test]
    fn drop_releases_line() {
        let gpio = MockGpioDriver::new();
        {
            let _line = gpio.open_line("BCM4").unwrap();
            assert!(gpio.is_open("BCM4"));
        }
        assert!(!gpio.is_open("BCM4"));
        assert_eq!(gpio.closes_of("BCM4"), 1);
    }

    #[test]
    fn pulses_latch_on_falling_edge() {
        let gpio = MockGpioDriver::new();
        let mut rs = gpio.open_line("rs").unwrap();
        let mut e = gpio.open_line("e").unwrap();
        let mut d0 = gpio.open_line("d0").unwrap();
        let mut d1 = gpio.open_line("d1").unwrap();
        for line in [&mut rs, &mut e, &mut d0, &mut d1] {
            line.set_output(false).unwrap();
        }

        rs.write(true).unwrap();
        d1.write(true).unwrap();
        e.write(true).unwrap();
        e.write(false).unwrap();
        // No rising edge in between, nothing latched
        e.write(false).unwrap();

        assert_eq!(
            gpio.pulses("rs", "e", &["d0", "d1"]),
            vec![MockPulse { rs: true, value: 0b10 }]
        );
    }
}
