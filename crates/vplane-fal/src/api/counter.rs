//! Counter requests and values.

use crate::types::FalGroupOid;

/// Parameters for creating a counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterCreate {
    /// Owning group, when the group itself reached the hardware.
    pub group: Option<FalGroupOid>,
    pub name: String,
    pub count_packets: bool,
    pub count_bytes: bool,
}

/// Values read back from a hardware counter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterValues {
    pub packets: u64,
    pub bytes: u64,
}

impl CounterValues {
    pub const fn new(packets: u64, bytes: u64) -> Self {
        Self { packets, bytes }
    }
}
