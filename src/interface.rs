//! Byte and signal level operations on top of [`Bus`].
//!
//! GPIB is active low on every line, data included: an asserted signal and a
//! `1` data bit both read as a physically low pin.

use crate::bus::{Bus, BusMode, Gpio};
use crate::pinmap::{Masks, PinMap, Signal};

#[derive(Debug)]
pub struct IoInterface<G> {
    pins: PinMap,
    bus: Bus<G>,
}

impl<G: Gpio> IoInterface<G> {
    pub fn new(pins: PinMap, gpio: G) -> Self {
        Self {
            pins,
            bus: Bus::new(gpio),
        }
    }

    pub fn pins(&self) -> &PinMap {
        &self.pins
    }

    pub fn masks(&self) -> &Masks {
        self.pins.masks()
    }

    /// Single-bit mask of `signal`.
    pub fn bit(&self, signal: Signal) -> u32 {
        self.pins.mask(signal)
    }

    pub fn bus(&mut self) -> &mut Bus<G> {
        &mut self.bus
    }

    pub(crate) fn into_gpio(self) -> G {
        self.bus.release()
    }

    /// Sample DIO1-8 into a byte, DIO1 being bit 0.
    pub fn load_data_byte(&mut self) -> u8 {
        let low = !self.bus.get(self.pins.masks().dio);
        Signal::DATA
            .iter()
            .enumerate()
            .filter(|(_, s)| low & self.pins.mask(**s) != 0)
            .fold(0u8, |byte, (i, _)| byte | (1 << i))
    }

    /// Drive `byte` onto DIO1-8.
    pub fn push_data_byte(&mut self, byte: u8) {
        let dio = self.pins.masks().dio;
        let high = Signal::DATA
            .iter()
            .enumerate()
            .filter(|(i, _)| byte & (1u8 << *i) == 0)
            .fold(0, |levels, (_, s)| levels | self.pins.mask(*s));
        self.bus.put(dio, high);
        self.bus.gpio_mut().set_dir_masked(dio, dio);
    }

    /// Release the data lines so another talker can drive them.
    pub fn ready_data_bus(&mut self) {
        let dio = self.pins.masks().dio;
        self.reset_bus(dio);
    }

    /// Release the lines in `mask` to listen mode.
    pub fn reset_bus(&mut self, mask: u32) {
        self.bus.set_mode(mask, BusMode::InputPullup);
    }

    pub fn assert_signal(&mut self, mask: u32) {
        self.bus.set_mode(mask, BusMode::OutputLow);
    }

    pub fn clear_signal(&mut self, mask: u32) {
        self.bus.set_mode(mask, BusMode::OutputHigh);
    }

    pub fn set_mode(&mut self, mask: u32, mode: BusMode) {
        self.bus.set_mode(mask, mode);
    }

    /// True if the queried line reads low.
    pub fn is_asserted(&mut self, mask: u32) -> bool {
        self.bus.get(mask) == 0
    }
}
