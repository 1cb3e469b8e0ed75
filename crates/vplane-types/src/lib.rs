//! Common vPlane types for rule-group attachment.
//!
//! This crate provides the small value types shared by the FAL bindings,
//! the NPF configuration contracts and the attachment engine:
//!
//! - [`AddressFamily`]: IPv4 or IPv6, as declared by a group attribute rule
//! - [`Direction`]: ingress or egress side of an interface
//! - [`IfIndex`]: kernel/dataplane interface index

mod direction;
mod family;
mod ifindex;

pub use direction::Direction;
pub use family::AddressFamily;
pub use ifindex::IfIndex;

/// Common error type for parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid address family: {0}")]
    InvalidAddressFamily(String),

    #[error("invalid direction: {0}")]
    InvalidDirection(String),

    #[error("invalid interface index: {0}")]
    InvalidIfIndex(String),
}
