use arrayvec::ArrayVec;
use core::fmt;

use crate::commands::{CR, ETX, LF};
use crate::types::Eor;

/// Payload capacity of a [`Data`] buffer.
pub const DATA_SIZE: usize = 256;

/// Bounded receive buffer for one message exchange.
///
/// `take`/`give` implement a single-owner guard. It is a plain flag, so
/// access from several tasks still has to be serialized by the caller.
#[derive(Debug, Default, Clone)]
pub struct Data {
    data: ArrayVec<u8, DATA_SIZE>,
    taken: bool,
}

impl Data {
    pub fn new() -> Data {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.data.is_full()
    }

    /// Append a byte. Returns false, leaving the buffer untouched, when full.
    #[must_use]
    pub fn push(&mut self, byte: u8) -> bool {
        self.data.try_push(byte).is_ok()
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// The received text, or `None` if it isn't valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        core::str::from_utf8(&self.data).ok()
    }

    /// Check whether the buffer ends with the `eor` sequence.
    pub fn has_terminator(&self, eor: Eor) -> bool {
        let pattern: &[u8] = match eor {
            Eor::None => return false,
            Eor::Cr => &[CR],
            Eor::Lf => &[LF],
            Eor::LfCr => &[LF, CR],
            Eor::Etx => &[ETX],
            Eor::CrlfEtx => &[CR, LF, ETX],
            Eor::Crlf | Eor::Space => &[CR, LF],
        };
        self.data.ends_with(pattern)
    }

    #[must_use]
    pub fn take(&mut self) -> bool {
        if self.taken {
            return false;
        }
        self.taken = true;
        true
    }

    #[must_use]
    pub fn give(&mut self) -> bool {
        if !self.taken {
            return false;
        }
        self.taken = false;
        true
    }
}

impl AsRef<[u8]> for Data {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

impl fmt::Display for Data {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &byte in self.data.iter() {
            write!(f, "{}", byte as char)?;
        }
        Ok(())
    }
}
