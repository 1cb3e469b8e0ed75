//! Interface index.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Dataplane interface index. Zero is never a valid index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct IfIndex(u32);

impl IfIndex {
    /// Creates an index, rejecting zero.
    pub const fn new(index: u32) -> Option<Self> {
        if index == 0 {
            None
        } else {
            Some(IfIndex(index))
        }
    }

    pub const fn as_u32(&self) -> u32 {
        self.0
    }
}

impl TryFrom<u32> for IfIndex {
    type Error = ParseError;

    fn try_from(index: u32) -> Result<Self, Self::Error> {
        IfIndex::new(index).ok_or_else(|| ParseError::InvalidIfIndex(index.to_string()))
    }
}

impl From<IfIndex> for u32 {
    fn from(index: IfIndex) -> u32 {
        index.0
    }
}

impl fmt::Display for IfIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for IfIndex {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u32>()
            .ok()
            .and_then(IfIndex::new)
            .ok_or_else(|| ParseError::InvalidIfIndex(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ifindex() {
        assert!(IfIndex::new(0).is_none());
        assert_eq!(IfIndex::new(7).map(|i| i.as_u32()), Some(7));
        assert_eq!("12".parse::<IfIndex>().map(|i| i.as_u32()), Ok(12));
        assert!("0".parse::<IfIndex>().is_err());
        assert!("eth0".parse::<IfIndex>().is_err());
    }

    #[test]
    fn test_ifindex_serde_rejects_zero() {
        let idx: IfIndex = serde_json::from_str("9").unwrap();
        assert_eq!(u32::from(idx), 9);
        assert_eq!(serde_json::to_string(&idx).unwrap(), "9");
        assert!(serde_json::from_str::<IfIndex>("0").is_err());
    }
}
