//! Raw line control. No protocol knowledge lives here.

/// GPIO primitives of the pin bank carrying the bus.
///
/// All masks are 32-bit, one bit per GPIO number. Implementations only need
/// to be safe for sequential use from a single task.
pub trait Gpio {
    /// Current level of every GPIO, high = 1.
    fn get_all(&mut self) -> u32;
    /// Set the output latch of the GPIOs in `mask` to the bits of `value`.
    fn put_masked(&mut self, mask: u32, value: u32);
    /// Set the direction of the GPIOs in `mask`; a set bit in `value` means output.
    fn set_dir_masked(&mut self, mask: u32, value: u32);
    /// Enable or disable the pull-up on the GPIOs in `mask`.
    fn set_pulls(&mut self, mask: u32, pull_up: bool);
    /// Route the GPIOs in `mask` to software control.
    fn init_pins(&mut self, _mask: u32) {}
}

/// Millisecond time source and blocking delays.
pub trait Clock {
    /// Monotonic milliseconds, allowed to wrap.
    fn millis(&self) -> u32;
    fn delay_ms(&mut self, ms: u32);
    fn delay_us(&mut self, us: u32);
}

/// How a set of lines is configured.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BusMode {
    /// Input with pull-up, listening to whoever drives the line.
    InputPullup,
    /// Driven high, the unasserted level.
    OutputHigh,
    /// Driven low, the asserted level.
    OutputLow,
}

#[derive(Debug)]
pub struct Bus<G> {
    gpio: G,
}

impl<G: Gpio> Bus<G> {
    pub fn new(gpio: G) -> Self {
        Self { gpio }
    }

    /// Raw levels of the lines in `mask`.
    pub fn get(&mut self, mask: u32) -> u32 {
        self.gpio.get_all() & mask
    }

    /// Write raw output levels of the lines in `mask`.
    pub fn put(&mut self, mask: u32, value: u32) {
        self.gpio.put_masked(mask, value)
    }

    pub fn set_mode(&mut self, mask: u32, mode: BusMode) {
        match mode {
            BusMode::InputPullup => self.gpio.set_dir_masked(mask, 0),
            BusMode::OutputHigh => {
                // latch first so the line never glitches low
                self.gpio.put_masked(mask, mask);
                self.gpio.set_dir_masked(mask, mask);
            }
            BusMode::OutputLow => {
                self.gpio.put_masked(mask, 0);
                self.gpio.set_dir_masked(mask, mask);
            }
        }
    }

    /// Hand the lines in `mask` to software control with pull-ups enabled.
    pub fn init_lines(&mut self, mask: u32) {
        self.gpio.init_pins(mask);
        self.gpio.set_pulls(mask, true);
    }

    pub fn gpio(&self) -> &G {
        &self.gpio
    }

    pub fn gpio_mut(&mut self) -> &mut G {
        &mut self.gpio
    }

    pub fn release(self) -> G {
        self.gpio
    }
}
