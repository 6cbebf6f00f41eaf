//! Logical GPIB signal to GPIO number mapping.

use core::ops::Index;

use snafu::ensure;

use crate::{DuplicatePinSnafu, Error, InvalidPinSnafu};

/// The 16 GPIB lines, in pin table order.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Signal {
    Dio1,
    Dio2,
    Dio3,
    Dio4,
    Dio5,
    Dio6,
    Dio7,
    Dio8,
    /// Remote Enable
    Ren,
    /// End or Identify
    Eoi,
    /// Interface Clear
    Ifc,
    /// Service Request
    Srq,
    /// Attention
    Atn,
    /// Data Valid
    Dav,
    /// Not Ready For Data
    Nrfd,
    /// Not Data Accepted
    Ndac,
}

impl Signal {
    pub const ALL: [Signal; 16] = [
        Signal::Dio1,
        Signal::Dio2,
        Signal::Dio3,
        Signal::Dio4,
        Signal::Dio5,
        Signal::Dio6,
        Signal::Dio7,
        Signal::Dio8,
        Signal::Ren,
        Signal::Eoi,
        Signal::Ifc,
        Signal::Srq,
        Signal::Atn,
        Signal::Dav,
        Signal::Nrfd,
        Signal::Ndac,
    ];

    pub const DATA: [Signal; 8] = [
        Signal::Dio1,
        Signal::Dio2,
        Signal::Dio3,
        Signal::Dio4,
        Signal::Dio5,
        Signal::Dio6,
        Signal::Dio7,
        Signal::Dio8,
    ];

    pub const CONTROL: [Signal; 5] = [
        Signal::Ren,
        Signal::Eoi,
        Signal::Ifc,
        Signal::Srq,
        Signal::Atn,
    ];

    pub const HANDSHAKE: [Signal; 3] = [Signal::Dav, Signal::Nrfd, Signal::Ndac];
}

/// Per-signal single bit masks plus the group masks derived from them.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Masks {
    bits: [u32; 16],
    pub dio: u32,
    pub ctrl: u32,
    pub hand: u32,
    pub all: u32,
}

impl Index<Signal> for Masks {
    type Output = u32;

    fn index(&self, signal: Signal) -> &Self::Output {
        &self.bits[signal as usize]
    }
}

impl Masks {
    /// Fold a set of signals into one bitmask.
    pub fn of(&self, signals: &[Signal]) -> u32 {
        signals.iter().fold(0, |mask, s| mask | self[*s])
    }
}

/// Immutable signal to GPIO table.
///
/// Entries follow [`Signal::ALL`]: DIO1-8, REN, EOI, IFC, SRQ, ATN, DAV,
/// NRFD, NDAC. Every GPIO number must be below 32 and used only once.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PinMap {
    pins: [u8; 16],
    masks: Masks,
}

/// Create a new [`PinMap`], panics if the table is invalid.
///
/// Used in a `const` item the check happens at compile time:
/// ```
/// use gpib_node::{pinmap, PinMap};
/// const PINS: PinMap = pinmap([0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15]);
/// ```
pub const fn pinmap(pins: [u8; 16]) -> PinMap {
    let mut i = 0;
    while i < 16 {
        if pins[i] >= 32 {
            panic!("GPIO number out of range.");
        }
        let mut j = i + 1;
        while j < 16 {
            if pins[i] == pins[j] {
                panic!("GPIO assigned twice.");
            }
            j += 1;
        }
        i += 1;
    }
    PinMap {
        pins,
        masks: masks(&pins),
    }
}

const fn masks(pins: &[u8; 16]) -> Masks {
    let mut bits = [0u32; 16];
    let mut i = 0;
    while i < 16 {
        bits[i] = 1 << pins[i];
        i += 1;
    }
    Masks {
        bits,
        dio: group(&bits, &Signal::DATA),
        ctrl: group(&bits, &Signal::CONTROL),
        hand: group(&bits, &Signal::HANDSHAKE),
        all: group(&bits, &Signal::ALL),
    }
}

const fn group(bits: &[u32; 16], signals: &[Signal]) -> u32 {
    let mut mask = 0;
    let mut i = 0;
    while i < signals.len() {
        mask |= bits[signals[i] as usize];
        i += 1;
    }
    mask
}

impl PinMap {
    /// Create a new pin map from a GPIO table.
    /// # Errors
    /// Returns [`Error::InvalidPin`] for a GPIO number >= 32, and
    /// [`Error::DuplicatePin`] if two signals share a GPIO.
    pub fn new(pins: [u8; 16]) -> Result<Self, Error> {
        for (i, &pin) in pins.iter().enumerate() {
            ensure!(pin < 32, InvalidPinSnafu { pin });
            ensure!(!pins[i + 1..].contains(&pin), DuplicatePinSnafu { pin });
        }
        Ok(Self {
            pins,
            masks: masks(&pins),
        })
    }

    /// GPIO number of `signal`.
    pub fn pin(&self, signal: Signal) -> u8 {
        self.pins[signal as usize]
    }

    pub fn pins(&self) -> &[u8; 16] {
        &self.pins
    }

    pub fn masks(&self) -> &Masks {
        &self.masks
    }

    pub fn mask(&self, signal: Signal) -> u32 {
        self.masks[signal]
    }
}

/// Fold a set of signals into a bitmask for `pins`.
pub fn mask_of(pins: &PinMap, signals: &[Signal]) -> u32 {
    pins.masks.of(signals)
}
