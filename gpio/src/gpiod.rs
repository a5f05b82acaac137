//! GpiodDriver implementation for managing GPIO lines using the gpiod library.
//!
//! Talks to the Linux GPIO character device (`/dev/gpiochipN`), so it works on any board with
//! a recent kernel, without the need for raw register access.
use crate::{GpioDriver, GpioError, GpioLine, GpioResult};
use bitvec::vec::BitVec;
use log::debug;
use std::fmt::{Debug, Formatter};
use std::path::Path;
use std::sync::atomic::AtomicU8;

/// GpiodDriver is a GPIO driver that uses the gpiod library to manage GPIO lines.
pub struct GpiodDriver {
    chip: gpiod::Chip,
    used_lines: BitVec<AtomicU8>,
}

impl GpiodDriver {
    pub fn new(chip: gpiod::Chip) -> Self {
        let n = chip.num_lines() as usize;
        let bits = BitVec::repeat(false, n);
        Self {
            chip,
            used_lines: bits,
        }
    }

    /// Opens the GPIO chip at the given path, e.g. `/dev/gpiochip0`.
    pub fn open(path: impl AsRef<Path>) -> GpioResult<Self> {
        Ok(Self::new(gpiod::Chip::new(path.as_ref())?))
    }

    /// Gets the amount of GPIO lines available.
    pub fn count(&self) -> usize {
        self.chip.num_lines() as usize
    }

    /// Resolves a line identifier to its offset on the chip.
    ///
    /// Line labels take precedence, so a line labelled `17` wins over offset 17.
    fn resolve(&self, name: &str) -> GpioResult<u32> {
        for offset in 0..self.chip.num_lines() {
            let info = self.chip.line_info(offset)?;
            if info.name == name {
                return Ok(offset);
            }
        }

        match name.parse::<u32>() {
            Ok(offset) if (offset as usize) < self.count() => Ok(offset),
            Ok(_) => Err(GpioError::InvalidArgument),
            Err(_) => Err(GpioError::NotFound(name.to_string())),
        }
    }
}

impl Debug for GpiodDriver {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "GpiodDriver({})", self.chip.name())
    }
}

impl GpioDriver for GpiodDriver {
    fn open_line(&self, name: &str) -> GpioResult<Box<dyn GpioLine + '_>> {
        let offset = self.resolve(name)?;
        let index = offset as usize;

        if self.used_lines[index] {
            return Err(GpioError::AlreadyInUse);
        }

        self.used_lines.set_aliased(index, true);
        debug!("Opened line {} at offset {} of {:?}", name, offset, self);

        Ok(Box::new(GpiodLine {
            driver: self,
            name: name.to_string(),
            offset,
            output: None,
            open: true,
        }))
    }
}

struct GpiodLine<'a> {
    driver: &'a GpiodDriver,
    name: String,
    offset: u32,
    output: Option<gpiod::Lines<gpiod::Output>>,
    open: bool,
}

impl Debug for GpiodLine<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}[{}:{}]", self.driver, self.name, self.offset)
    }
}

impl GpioLine for GpiodLine<'_> {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_output(&mut self, initial_level: bool) -> GpioResult<()> {
        if !self.open {
            return Err(GpioError::Closed);
        }

        // Drop the previous request first, the kernel refuses a second one for the same line
        self.output = None;
        let lines = self.driver.chip.request_lines(
            gpiod::Options::output([self.offset])
                .values([initial_level])
                .consumer(env!("CARGO_PKG_NAME")),
        )?;
        self.output = Some(lines);
        Ok(())
    }

    fn write(&self, value: bool) -> GpioResult<()> {
        if !self.open {
            return Err(GpioError::Closed);
        }
        let lines = self.output.as_ref().ok_or(GpioError::NotOutput)?;
        lines.set_values([value])?;
        Ok(())
    }

    fn read(&self) -> GpioResult<bool> {
        if !self.open {
            return Err(GpioError::Closed);
        }
        let values = match &self.output {
            Some(lines) => lines.get_values([false])?,
            None => {
                let lines = self.driver.chip.request_lines(
                    gpiod::Options::input([self.offset]).consumer(env!("CARGO_PKG_NAME")),
                )?;
                lines.get_values([false])?
            }
        };
        Ok(values[0])
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn close(&mut self) -> GpioResult<()> {
        if !self.open {
            return Ok(());
        }
        self.output = None;
        self.open = false;
        self.driver
            .used_lines
            .set_aliased(self.offset as usize, false);
        debug!("Released line {} at offset {}", self.name, self.offset);
        Ok(())
    }
}

impl Drop for GpiodLine<'_> {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
