//! Parser for `key=value` settings strings, e.g.
//! `"paddr=5, eos=lf; eor=crlf+etx eoi=1 rtmo=500"`.

use arrayvec::ArrayString;
use core::str::FromStr;

use nom::branch::alt;
use nom::bytes::complete::{tag, tag_no_case, take_while, take_while1};
use nom::character::complete::{char, space0, u32 as dec_u32, u8 as dec_u8};
use nom::combinator::{all_consuming, map, map_opt, map_res, peek, value};
use nom::sequence::{delimited, preceded, terminated};
use nom::IResult;

use crate::types::{Address, Config, Eor, Eos, IdnMode};
use crate::{Error, InvalidSettingSnafu};

#[derive(Debug, Clone, PartialEq)]
enum Setting {
    Eoi(bool),
    Caddr(Address),
    Paddr(Address),
    Saddr(u8),
    Eos(Eos),
    Eor(Eor),
    Stat(u8),
    Rtmo(u32),
    Idn(IdnMode),
    Sname(ArrayString<16>),
    Serial(u32),
}

impl Setting {
    fn apply(self, config: &mut Config) {
        match self {
            Setting::Eoi(v) => config.eoi = v,
            Setting::Caddr(v) => config.caddr = v,
            Setting::Paddr(v) => config.paddr = v,
            Setting::Saddr(v) => config.saddr = v,
            Setting::Eos(v) => config.eos = v,
            Setting::Eor(v) => config.eor = v,
            Setting::Stat(v) => config.stat = v,
            Setting::Rtmo(v) => config.rtmo = v,
            Setting::Idn(v) => config.idn = v,
            Setting::Sname(v) => config.sname = v,
            Setting::Serial(v) => config.serial = v,
        }
    }
}

impl Config {
    /// Parse a settings string on top of the defaults.
    ///
    /// ```
    /// use gpib_node::{Config, Eos};
    /// let config = Config::from_settings("paddr=5, eos=lf eoi=1").unwrap();
    /// assert_eq!(*config.paddr, 5);
    /// assert_eq!(config.eos, Eos::Lf);
    /// assert!(config.eoi);
    /// ```
    /// # Errors
    /// Returns [`Error::InvalidSetting`] with the byte offset of the first
    /// setting that could not be parsed.
    pub fn from_settings(settings: &str) -> Result<Self, Error> {
        let mut config = Config::default();
        let mut rest = settings;
        loop {
            rest = skip_separators(rest);
            if rest.is_empty() {
                return Ok(config);
            }
            match terminated(setting, peek(separator_or_end))(rest) {
                Ok((remaining, s)) => {
                    s.apply(&mut config);
                    rest = remaining;
                }
                Err(_) => {
                    return InvalidSettingSnafu {
                        position: settings.len() - rest.len(),
                    }
                    .fail()
                }
            }
        }
    }
}

impl FromStr for Config {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Config::from_settings(s)
    }
}

fn is_separator(c: char) -> bool {
    c == ',' || c == ';' || c.is_whitespace()
}

fn skip_separators(input: &str) -> &str {
    let parsed: IResult<&str, &str> = take_while(is_separator)(input);
    parsed.map_or(input, |(rest, _)| rest)
}

fn separator_or_end(input: &str) -> IResult<&str, ()> {
    alt((
        value((), all_consuming(tag(""))),
        value((), take_while1(is_separator)),
    ))(input)
}

fn setting(input: &str) -> IResult<&str, Setting> {
    alt((
        map(preceded(key("eoi"), boolean), Setting::Eoi),
        map(preceded(key("caddr"), address), Setting::Caddr),
        map(preceded(key("paddr"), address), Setting::Paddr),
        map(preceded(key("saddr"), dec_u8), Setting::Saddr),
        map(preceded(key("eos"), eos), Setting::Eos),
        map(preceded(key("eor"), eor), Setting::Eor),
        map(preceded(key("stat"), dec_u8), Setting::Stat),
        map(preceded(key("rtmo"), dec_u32), Setting::Rtmo),
        map(preceded(key("idn"), idn), Setting::Idn),
        map(preceded(key("sname"), name), Setting::Sname),
        map(preceded(key("serial"), dec_u32), Setting::Serial),
    ))(input)
}

fn key<'a>(name: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    terminated(tag_no_case(name), delimited(space0, char('='), space0))
}

fn boolean(input: &str) -> IResult<&str, bool> {
    alt((
        value(true, alt((tag("1"), tag_no_case("true"), tag_no_case("on")))),
        value(false, alt((tag("0"), tag_no_case("false"), tag_no_case("off")))),
    ))(input)
}

fn address(input: &str) -> IResult<&str, Address> {
    map_res(dec_u8, Address::new)(input)
}

fn eos(input: &str) -> IResult<&str, Eos> {
    alt((
        value(Eos::Crlf, tag_no_case("crlf")),
        value(Eos::Cr, tag_no_case("cr")),
        value(Eos::Lf, tag_no_case("lf")),
        value(Eos::None, tag_no_case("none")),
        map_opt(dec_u8, |n| match n {
            0 => Some(Eos::Crlf),
            1 => Some(Eos::Cr),
            2 => Some(Eos::Lf),
            3 => Some(Eos::None),
            _ => None,
        }),
    ))(input)
}

fn eor(input: &str) -> IResult<&str, Eor> {
    alt((
        value(Eor::CrlfEtx, tag_no_case("crlf+etx")),
        value(Eor::Crlf, tag_no_case("crlf")),
        value(Eor::Cr, tag_no_case("cr")),
        value(Eor::LfCr, tag_no_case("lfcr")),
        value(Eor::Lf, tag_no_case("lf")),
        value(Eor::None, tag_no_case("none")),
        value(Eor::Etx, tag_no_case("etx")),
        value(Eor::Space, tag_no_case("space")),
        map_opt(dec_u8, |n| match n {
            0 => Some(Eor::Crlf),
            1 => Some(Eor::Cr),
            2 => Some(Eor::Lf),
            3 => Some(Eor::None),
            4 => Some(Eor::LfCr),
            5 => Some(Eor::Etx),
            6 => Some(Eor::CrlfEtx),
            7 => Some(Eor::Space),
            _ => None,
        }),
    ))(input)
}

fn idn(input: &str) -> IResult<&str, IdnMode> {
    alt((
        value(IdnMode::NameSerial, tag_no_case("name_serial")),
        value(IdnMode::Name, tag_no_case("name")),
        value(IdnMode::Disable, tag_no_case("disable")),
        map_opt(dec_u8, |n| match n {
            0 => Some(IdnMode::Disable),
            1 => Some(IdnMode::Name),
            2 => Some(IdnMode::NameSerial),
            _ => None,
        }),
    ))(input)
}

fn name(input: &str) -> IResult<&str, ArrayString<16>> {
    map_res(
        take_while1(|c: char| c.is_ascii_alphanumeric() || "-_.".contains(c)),
        ArrayString::from,
    )(input)
}
