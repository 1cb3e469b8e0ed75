//! IP address family of an attached rule group.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Address family a group is published under.
///
/// A group's rules are only meaningful to the hardware once the family is
/// known, since v4 and v6 groups are distinct hardware tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressFamily {
    V4,
    V6,
}

impl AddressFamily {
    pub const fn is_v6(&self) -> bool {
        matches!(self, AddressFamily::V6)
    }

    /// Short label used in op-mode dumps.
    pub const fn label(&self) -> &'static str {
        match self {
            AddressFamily::V4 => "v4",
            AddressFamily::V6 => "v6",
        }
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for AddressFamily {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "v4" | "ipv4" | "inet" => Ok(AddressFamily::V4),
            "v6" | "ipv6" | "inet6" => Ok(AddressFamily::V6),
            _ => Err(ParseError::InvalidAddressFamily(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_family_parse() {
        assert_eq!("ipv4".parse::<AddressFamily>(), Ok(AddressFamily::V4));
        assert_eq!("V6".parse::<AddressFamily>(), Ok(AddressFamily::V6));
        assert_eq!("inet6".parse::<AddressFamily>(), Ok(AddressFamily::V6));
        assert!("ipx".parse::<AddressFamily>().is_err());
    }

    #[test]
    fn test_family_serde() {
        let json = serde_json::to_string(&AddressFamily::V6).unwrap();
        assert_eq!(json, "\"v6\"");
        let af: AddressFamily = serde_json::from_str("\"v4\"").unwrap();
        assert_eq!(af, AddressFamily::V4);
        assert!(!af.is_v6());
    }
}
