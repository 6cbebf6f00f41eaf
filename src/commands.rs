//! IEEE-488 multiline command bytes, sent with ATN asserted, plus the ASCII
//! bytes used for message framing.

/// Go To Local
pub const GTL: u8 = 0x01;
/// Selected Device Clear
pub const SDC: u8 = 0x04;
/// Group Execute Trigger
pub const GET: u8 = 0x08;
/// Local Lockout
pub const LLO: u8 = 0x11;
/// Device Clear
pub const DCL: u8 = 0x14;
/// Serial Poll Enable
pub const SPE: u8 = 0x18;
/// Serial Poll Disable
pub const SPD: u8 = 0x19;
/// Listen address group base, add the primary address.
pub const LAD: u8 = 0x20;
/// Unlisten
pub const UNL: u8 = 0x3F;
/// Talk address group base, add the primary address.
pub const TAD: u8 = 0x40;
/// Untalk
pub const UNT: u8 = 0x5F;

pub const ETX: u8 = 0x03;
pub const LF: u8 = b'\n';
pub const CR: u8 = b'\r';
