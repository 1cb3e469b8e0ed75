//! Safe Rust bindings for the FAL (Forwarding Abstraction Layer).
//!
//! This crate covers the slice of the FAL used by attached rule groups:
//! classifier groups, their rules and their counters. It prevents mixing
//! handles of different object kinds and turns FAL status codes into
//! Rust `Result`s.
//!
//! - [`types`]: type-safe FAL object IDs
//! - [`error`]: status codes and the error type
//! - [`api`]: the [`FalApi`] trait and its request structs
//! - [`soft`]: [`SoftFal`], an in-memory FAL that journals every call
//!
//! # Example
//!
//! ```
//! use vplane_fal::{FalApi, GroupCreate, SoftFal};
//! use vplane_types::{AddressFamily, Direction};
//!
//! let fal = SoftFal::new();
//! let group = fal
//!     .group_create(&GroupCreate {
//!         ifname: "dp0p1s1".to_string(),
//!         direction: Direction::In,
//!         name: "acl-a".to_string(),
//!         family: AddressFamily::V4,
//!         summary: 0,
//!     })
//!     .unwrap();
//! assert!(group.is_valid());
//! ```

pub mod api;
pub mod error;
pub mod soft;
pub mod types;

pub use api::{CounterCreate, CounterValues, FalApi, GroupCreate, RuleCreate};
pub use error::{FalError, FalResult, FalStatus};
pub use soft::{FalCall, FalOp, SoftFal};
pub use types::{
    CounterKind, FalCounterOid, FalGroupOid, FalObjectId, FalObjectKind, FalRuleOid, GroupKind,
    RawFalObjectId, RuleKind,
};
