//! Numeric replies the client reacts to.
//!
//! Servers send hundreds of numerics; everything not listed here is still
//! delivered to callers as a plain `u16` code.
//!
//! # Reference
//! - RFC 2812 Section 5
//! - <https://modern.ircdocs.horse/>

#![allow(non_camel_case_types)]

use std::fmt;

use crate::error::ProtocolError;

/// Numeric reply codes with special meaning to the client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u16)]
#[non_exhaustive]
pub enum Response {
    /// 001 - Welcome to the IRC network
    RPL_WELCOME = 1,
    /// 005 - Server supported features (ISUPPORT)
    RPL_ISUPPORT = 5,
    /// 251 - Users on the network
    RPL_LUSERCLIENT = 251,
    /// 353 - Channel member list
    RPL_NAMREPLY = 353,
    /// 366 - End of member list
    RPL_ENDOFNAMES = 366,
    /// 376 - End of MOTD
    RPL_ENDOFMOTD = 376,
    /// 422 - MOTD file missing
    ERR_NOMOTD = 422,
    /// 432 - Erroneous nickname
    ERR_ERRONEUSNICKNAME = 432,
    /// 433 - Nickname already in use
    ERR_NICKNAMEINUSE = 433,
}

impl Response {
    /// Numeric value.
    #[inline]
    pub fn code(self) -> u16 {
        self as u16
    }

    /// Look up a known code.
    pub fn from_code(code: u16) -> Option<Self> {
        Some(match code {
            1 => Response::RPL_WELCOME,
            5 => Response::RPL_ISUPPORT,
            251 => Response::RPL_LUSERCLIENT,
            353 => Response::RPL_NAMREPLY,
            366 => Response::RPL_ENDOFNAMES,
            376 => Response::RPL_ENDOFMOTD,
            422 => Response::ERR_NOMOTD,
            432 => Response::ERR_ERRONEUSNICKNAME,
            433 => Response::ERR_NICKNAMEINUSE,
            _ => return None,
        })
    }

    /// Whether this is an error reply (4xx/5xx).
    pub fn is_error(self) -> bool {
        (400..600).contains(&self.code())
    }
}

impl PartialEq<u16> for Response {
    fn eq(&self, other: &u16) -> bool {
        self.code() == *other
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:03}", self.code())
    }
}

impl std::str::FromStr for Response {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u16>()
            .ok()
            .and_then(Response::from_code)
            .ok_or_else(|| ProtocolError::InvalidNumeric(s.to_owned()))
    }
}
