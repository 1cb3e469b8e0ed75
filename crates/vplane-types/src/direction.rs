//! Attachment direction of a ruleset.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Direction a ruleset is attached in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Applied to packets received on the interface.
    In,
    /// Applied to packets transmitted on the interface.
    Out,
}

impl Direction {
    pub const ALL: [Direction; 2] = [Direction::In, Direction::Out];

    pub const fn is_ingress(&self) -> bool {
        matches!(self, Direction::In)
    }

    /// Fixed-width label used in log and dump lines (" In" / "Out").
    pub const fn padded(&self) -> &'static str {
        match self {
            Direction::In => " In",
            Direction::Out => "Out",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::In => f.write_str("in"),
            Direction::Out => f.write_str("out"),
        }
    }
}

impl FromStr for Direction {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "in" | "ingress" => Ok(Direction::In),
            "out" | "egress" => Ok(Direction::Out),
            _ => Err(ParseError::InvalidDirection(s.to_string())),
        }
    }
}
