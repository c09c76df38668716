//! Network scalar types: transport ports and subnets
//!
//! Addresses use [`std::net::IpAddr`] directly.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use thiserror::Error;

/// Errors produced when parsing network literals.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("invalid port '{0}'")]
    Port(String),

    #[error("unknown transport protocol '{0}'")]
    Proto(String),

    #[error("invalid subnet '{0}'")]
    Subnet(String),

    #[error("prefix length {len} exceeds {max} bits")]
    PrefixLength { len: u8, max: u8 },
}

/// Transport protocol of a [`Port`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Proto {
    Tcp,
    Udp,
    Icmp,
    Unknown,
}

impl Proto {
    pub fn as_str(self) -> &'static str {
        match self {
            Proto::Tcp => "tcp",
            Proto::Udp => "udp",
            Proto::Icmp => "icmp",
            Proto::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Proto {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Proto {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tcp" => Ok(Proto::Tcp),
            "udp" => Ok(Proto::Udp),
            "icmp" => Ok(Proto::Icmp),
            "unknown" => Ok(Proto::Unknown),
            other => Err(ParseError::Proto(other.to_string())),
        }
    }
}

/// Port number qualified by transport protocol, written `80/tcp`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Port {
    pub number: u16,
    pub proto: Proto,
}

impl Port {
    pub const fn new(number: u16, proto: Proto) -> Self {
        Self { number, proto }
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.number, self.proto)
    }
}

impl FromStr for Port {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (number, proto) = s
            .split_once('/')
            .ok_or_else(|| ParseError::Port(s.to_string()))?;
        let number = number
            .parse::<u16>()
            .map_err(|_| ParseError::Port(s.to_string()))?;
        Ok(Port::new(number, proto.parse()?))
    }
}

/// Network prefix. Host bits below the prefix are always zero.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Subnet {
    network: IpAddr,
    prefix: u8,
}

impl Subnet {
    pub fn new(addr: IpAddr, prefix: u8) -> Result<Self, ParseError> {
        let max = max_prefix(&addr);
        if prefix > max {
            return Err(ParseError::PrefixLength { len: prefix, max });
        }
        Ok(Self {
            network: mask(addr, prefix),
            prefix,
        })
    }

    pub fn network(&self) -> IpAddr {
        self.network
    }

    pub fn prefix(&self) -> u8 {
        self.prefix
    }

    pub fn contains(&self, addr: &IpAddr) -> bool {
        addr.is_ipv4() == self.network.is_ipv4() && mask(*addr, self.prefix) == self.network
    }
}

fn max_prefix(addr: &IpAddr) -> u8 {
    match addr {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    }
}

fn mask(addr: IpAddr, prefix: u8) -> IpAddr {
    match addr {
        IpAddr::V4(v4) => {
            let bits = u32::from(v4);
            let keep = u32::MAX.checked_shl(32 - prefix as u32).unwrap_or(0);
            IpAddr::V4((bits & keep).into())
        }
        IpAddr::V6(v6) => {
            let bits = u128::from(v6);
            let keep = u128::MAX.checked_shl(128 - prefix as u32).unwrap_or(0);
            IpAddr::V6((bits & keep).into())
        }
    }
}

impl fmt::Display for Subnet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix)
    }
}

impl FromStr for Subnet {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr, prefix) = s
            .split_once('/')
            .ok_or_else(|| ParseError::Subnet(s.to_string()))?;
        let addr = addr
            .parse::<IpAddr>()
            .map_err(|_| ParseError::Subnet(s.to_string()))?;
        let prefix = prefix
            .parse::<u8>()
            .map_err(|_| ParseError::Subnet(s.to_string()))?;
        Subnet::new(addr, prefix)
    }
}
