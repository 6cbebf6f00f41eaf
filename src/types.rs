//! This module defines range-checked GPIB addresses and the immutable node
//! configuration shared by every bus operation.

use snafu::{ensure, OptionExt};

use arrayvec::ArrayString;
use core::convert::{TryFrom, TryInto};
use core::fmt::Write;
use core::ops::Deref;

use crate::{Error, InvalidAddressSnafu};

/// Highest primary address; 31 is reserved for the UNL/UNT commands.
const MAX_ADDRESS: u8 = 30;

/// Address is a range-checked [0, 30] integer, representing a GPIB primary address.
///
/// ## Example
/// ```
/// use gpib_node::Address;
/// use std::convert::TryInto;
/// let paddr = Address::new(5).unwrap();
/// let paddr: Address = 5usize.try_into().unwrap();
/// ```
#[derive(PartialEq, Eq, PartialOrd, Ord, Debug, Copy, Clone, Hash, Default)]
#[repr(transparent)]
pub struct Address(u8);

/// Create a new [`Address`], panics if it is out of range.
pub const fn addr(a: u8) -> Address {
    if a <= MAX_ADDRESS {
        return Address(a);
    }
    panic!("Invalid address.")
}

impl Address {
    /// Create a new address, checking that the address is in \[0, 30\].
    /// # Errors
    /// Returns [`Error::InvalidAddress`] if `address` is out of range.
    pub fn new(address: impl TryInto<u8>) -> Result<Self, Error> {
        let address = address.try_into().ok().context(InvalidAddressSnafu)?;
        ensure!(address <= MAX_ADDRESS, InvalidAddressSnafu);
        Ok(Self(address))
    }
}

impl Deref for Address {
    type Target = u8;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl PartialEq<usize> for Address {
    fn eq(&self, other: &usize) -> bool {
        self.0 as usize == *other
    }
}

impl TryFrom<usize> for Address {
    type Error = Error;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// End-of-send characters appended to outgoing messages.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Eos {
    Crlf,
    Cr,
    Lf,
    None,
}

impl Eos {
    /// The terminator bytes written after the payload.
    pub fn terminator(self) -> &'static [u8] {
        match self {
            Eos::Crlf => b"\r\n",
            Eos::Cr => b"\r",
            Eos::Lf => b"\n",
            Eos::None => b"",
        }
    }
}

/// End-of-receive sequence that terminates an incoming message.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Eor {
    Crlf,
    Cr,
    Lf,
    None,
    LfCr,
    Etx,
    CrlfEtx,
    /// Terminate on EOI; the byte pattern falls back to CRLF.
    Space,
}

/// What to answer when asked for identification.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum IdnMode {
    Disable,
    Name,
    NameSerial,
}

/// Node configuration.
///
/// Built once at startup and moved into the [`Node`](crate::Node), which only
/// hands out shared references to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Assert EOI on the last byte written.
    pub eoi: bool,
    /// Address of this interface.
    pub caddr: Address,
    /// Primary address used when addressing the instrument.
    pub paddr: Address,
    /// Secondary address. Stored, not used for addressing.
    pub saddr: u8,
    pub eos: Eos,
    pub eor: Eor,
    /// Status byte.
    pub stat: u8,
    /// Handshake timeout in milliseconds.
    pub rtmo: u32,
    pub idn: IdnMode,
    /// Short interface name.
    pub sname: ArrayString<16>,
    pub serial: u32,
}

impl Default for Config {
    fn default() -> Self {
        let mut sname = ArrayString::new();
        sname.push_str("picoGPIB");
        Self {
            eoi: false,
            caddr: Address(0),
            paddr: Address(0),
            saddr: 0,
            eos: Eos::Crlf,
            eor: Eor::Crlf,
            stat: 0,
            rtmo: 2000,
            idn: IdnMode::Name,
            sname,
            serial: 1337,
        }
    }
}

impl Config {
    /// The identification string selected by [`IdnMode`], `None` if disabled.
    pub fn identity(&self) -> Option<ArrayString<32>> {
        let mut id = ArrayString::new();
        match self.idn {
            IdnMode::Disable => return None,
            IdnMode::Name => id.push_str(&self.sname),
            // 16 bytes of name + '-' + 10 digits always fit
            IdnMode::NameSerial => write!(id, "{}-{}", self.sname, self.serial).ok()?,
        }
        Some(id)
    }
}
