use std::fmt::Debug;
use std::thread::sleep;
use std::time::Duration;

/// Blocking delay used to honor the controller timings.
///
/// Implementations may wait longer than asked, but never shorter.
pub trait Delay: Debug {
    fn delay(&mut self, duration: Duration);
}

/// [Delay] backed by [std::thread::sleep].
///
/// The OS scheduler makes the actual wait somewhat longer than requested, especially for
/// microsecond delays, but it is never shorter.
#[derive(Debug, Default, Copy, Clone)]
pub struct StdDelay;

impl Delay for StdDelay {
    fn delay(&mut self, duration: Duration) {
        sleep(duration);
    }
}
