//! IEEE-488 (GPIB) protocol engine for a microcontroller driving the bus
//! through plain GPIO lines.
//!
//! The crate implements the three-wire byte handshake, the controller
//! addressing sequence and the line-termination rules for framed messages.
//! Hardware access goes through the [`Gpio`] and [`Clock`] traits, so the
//! engine runs unchanged on a real pin bank or on a simulated bus.
//!
//! ```no_run
//! use gpib_node::{addr, pinmap, Config, Data, Node, PinMap};
//! # use gpib_node::{Clock, Gpio};
//! # struct Pins; struct Ticks;
//! # impl Gpio for Pins {
//! #     fn get_all(&mut self) -> u32 { 0 }
//! #     fn put_masked(&mut self, _: u32, _: u32) {}
//! #     fn set_dir_masked(&mut self, _: u32, _: u32) {}
//! #     fn set_pulls(&mut self, _: u32, _: bool) {}
//! # }
//! # impl Clock for Ticks {
//! #     fn millis(&self) -> u32 { 0 }
//! #     fn delay_ms(&mut self, _: u32) {}
//! #     fn delay_us(&mut self, _: u32) {}
//! # }
//! const PINS: PinMap = pinmap([6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21]);
//!
//! # fn main() -> Result<(), gpib_node::Error> {
//! let config = Config { paddr: addr(5), ..Config::default() };
//! let mut node = Node::controller(PINS, config, Pins, Ticks);
//! node.init()?;
//! node.send_data(b"*IDN?")?;
//!
//! let mut reply = Data::new();
//! node.receive_data(&mut reply, false, None)?;
//! # Ok(()) }
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

use snafu::Snafu;

mod bus;
pub mod commands;
mod controller;
mod data;
mod device;
mod interface;
mod node;
mod nom_parser;
mod pinmap;
mod types;

pub use crate::bus::{Bus, BusMode, Clock, Gpio};
pub use crate::data::{Data, DATA_SIZE};
pub use crate::interface::IoInterface;
pub use crate::node::{ByteRead, HandshakeState, Node, NodeState, Role, TransmitMode};
pub use crate::pinmap::{mask_of, pinmap, Masks, PinMap, Signal};
pub use crate::types::{addr, Address, Config, Eor, Eos, IdnMode};

/// Error type for the GPIB engine.
///
/// None of these are raised by unwinding; every operation hands them back
/// through `Result` and leaves any data already received in place.
#[derive(Debug, Snafu, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// A byte handshake did not reach `Complete` within `Config::rtmo`.
    #[snafu(display("Handshake timed out in state {:?}", state))]
    HandshakeTimeout { state: HandshakeState },
    /// IFC or ATN changed under a device-role transfer.
    #[snafu(display("Transfer aborted by the bus ({:?})", state))]
    ProtocolAbort { state: HandshakeState },
    /// Sending an addressing or bus command byte failed.
    #[snafu(display("Failed to send command byte {:#04x}", command))]
    AddressingFailure { command: u8 },
    /// The receive buffer has no room left.
    #[snafu(display("Receive buffer full"))]
    BufferFull,
    /// The operation is not available for this node's role.
    #[snafu(display("Operation not supported by this node role"))]
    UnsupportedRole,
    /// The value isn't a valid GPIB primary address.
    #[snafu(display("Invalid address"))]
    InvalidAddress,
    /// A pin number doesn't fit in the 32-bit GPIO bank.
    #[snafu(display("Invalid GPIO number {}", pin))]
    InvalidPin { pin: u8 },
    /// A GPIO number is assigned to more than one signal.
    #[snafu(display("GPIO {} assigned twice", pin))]
    DuplicatePin { pin: u8 },
    /// A settings string could not be parsed.
    #[snafu(display("Invalid setting at offset {}", position))]
    InvalidSetting { position: usize },
}

impl Error {
    /// Map a failed handshake onto the matching error variant.
    pub(crate) fn from_handshake(state: HandshakeState) -> Self {
        match state {
            HandshakeState::IfcAsserted | HandshakeState::AtnAsserted => {
                Error::ProtocolAbort { state }
            }
            _ => Error::HandshakeTimeout { state },
        }
    }
}
