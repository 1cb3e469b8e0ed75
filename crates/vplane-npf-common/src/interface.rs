//! Interface lookup contract.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use log::debug;
use vplane_types::IfIndex;

use crate::error::ConfigError;

/// A live interface handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceRef {
    pub name: String,
    pub ifindex: IfIndex,
}

/// What the engine consumes from the interface subsystem.
pub trait InterfaceLookup: Send + Sync {
    /// Returns the live interface with this name, if it exists.
    fn lookup(&self, ifname: &str) -> Option<InterfaceRef>;

    /// True once the interface exists at the hardware layer.
    fn is_created(&self, ifname: &str) -> bool;
}

#[derive(Debug, Clone)]
struct InterfaceEntry {
    ifindex: IfIndex,
    created: bool,
}

/// In-memory interface table.
#[derive(Debug, Default)]
pub struct InterfaceTable {
    entries: Mutex<BTreeMap<String, InterfaceEntry>>,
}

impl InterfaceTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, InterfaceEntry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Adds (or re-indexes) an interface. A new interface starts out not
    /// created at the hardware layer.
    pub fn add(&self, ifname: &str, ifindex: IfIndex) {
        debug!("interface {} added with index {}", ifname, ifindex);
        self.lock()
            .entry(ifname.to_string())
            .and_modify(|e| e.ifindex = ifindex)
            .or_insert(InterfaceEntry {
                ifindex,
                created: false,
            });
    }

    pub fn remove(&self, ifname: &str) -> Option<IfIndex> {
        self.lock().remove(ifname).map(|e| e.ifindex)
    }

    /// Marks an interface as created at the hardware layer.
    pub fn set_created(&self, ifname: &str) -> Result<(), ConfigError> {
        match self.lock().get_mut(ifname) {
            Some(entry) => {
                entry.created = true;
                Ok(())
            }
            None => Err(ConfigError::UnknownInterface(ifname.to_string())),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl InterfaceLookup for InterfaceTable {
    fn lookup(&self, ifname: &str) -> Option<InterfaceRef> {
        self.lock().get(ifname).map(|e| InterfaceRef {
            name: ifname.to_string(),
            ifindex: e.ifindex,
        })
    }

    fn is_created(&self, ifname: &str) -> bool {
        self.lock().get(ifname).is_some_and(|e| e.created)
    }
}
