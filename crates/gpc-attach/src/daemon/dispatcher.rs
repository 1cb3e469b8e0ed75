//! Event dispatcher.
//!
//! Keeps the in-memory collaborators (rule-group store, interface table)
//! current and hands each event to the engine. One event is handled to
//! completion before the next is taken off the queue.

use std::sync::Arc;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use vplane_npf_common::{
    DataplaneEvent, EventHandler, InterfaceEvent, InterfaceTable, RuleGroupStore,
};

/// Configuration for the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Depth of the event queue feeding the dispatcher task.
    pub queue_depth: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self { queue_depth: 1024 }
    }
}

/// Counts of what the dispatcher did with its events.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchStats {
    pub received: u64,
    pub forwarded: u64,
    pub refused: u64,
}

pub struct EventDispatcher<H: EventHandler> {
    config: DispatcherConfig,
    handler: H,
    store: Arc<RuleGroupStore>,
    interfaces: Arc<InterfaceTable>,
    stats: DispatchStats,
}

impl<H: EventHandler> std::fmt::Debug for EventDispatcher<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("handler", &self.handler.name())
            .field("config", &self.config)
            .field("stats", &self.stats)
            .finish()
    }
}

impl<H: EventHandler> EventDispatcher<H> {
    pub fn new(
        config: DispatcherConfig,
        handler: H,
        store: Arc<RuleGroupStore>,
        interfaces: Arc<InterfaceTable>,
    ) -> Self {
        Self {
            config,
            handler,
            store,
            interfaces,
            stats: DispatchStats::default(),
        }
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn stats(&self) -> &DispatchStats {
        &self.stats
    }

    pub fn into_handler(self) -> H {
        self.handler
    }

    /// Applies one event to the collaborators, then to the handler.
    pub fn dispatch(&mut self, event: &DataplaneEvent) {
        self.stats.received += 1;

        match event {
            DataplaneEvent::RuleGroup(ev) => {
                if let Err(e) = self.store.apply(ev) {
                    warn!("{}: config change refused: {}", self.handler.name(), e);
                    self.stats.refused += 1;
                    return;
                }
                // Only groups someone attached are of interest.
                if !self.store.has_listeners(&ev.group) {
                    debug!("{}: no listener for {}", self.handler.name(), ev.group);
                    return;
                }
            }
            DataplaneEvent::Interface(ev) => match ev {
                InterfaceEvent::Added { ifname, ifindex } => self.interfaces.add(ifname, *ifindex),
                InterfaceEvent::Created { ifname } => {
                    if let Err(e) = self.interfaces.set_created(ifname) {
                        warn!("{}: {}", self.handler.name(), e);
                        self.stats.refused += 1;
                        return;
                    }
                }
                InterfaceEvent::Removed { ifname } => {
                    self.interfaces.remove(ifname);
                }
            },
            DataplaneEvent::AttachPoint(_) | DataplaneEvent::Commit => {}
        }

        self.handler.handle_event(event);
        self.stats.forwarded += 1;
    }
}

impl<H: EventHandler + 'static> EventDispatcher<H> {
    /// Moves the dispatcher onto its own task. The task drains the queue
    /// until every sender is dropped, then hands the dispatcher back.
    pub fn spawn(self) -> (mpsc::Sender<DataplaneEvent>, JoinHandle<Self>) {
        let (tx, mut rx) = mpsc::channel(self.config.queue_depth.max(1));
        let mut dispatcher = self;
        let handle = tokio::spawn(async move {
            info!("{}: dispatcher started", dispatcher.handler.name());
            while let Some(event) = rx.recv().await {
                dispatcher.dispatch(&event);
            }
            info!(
                "{}: dispatcher stopped after {} events",
                dispatcher.handler.name(),
                dispatcher.stats.received
            );
            dispatcher
        });
        (tx, handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use vplane_npf_common::{
        InterfaceLookup, PmfRule, RuleChange, RuleGroupConfig, RuleGroupEvent, RuleGroupKey,
    };
    use vplane_types::IfIndex;

    #[derive(Default)]
    struct Recorder {
        events: Vec<DataplaneEvent>,
    }

    impl EventHandler for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }

        fn handle_event(&mut self, event: &DataplaneEvent) {
            self.events.push(event.clone());
        }
    }

    fn dispatcher() -> EventDispatcher<Recorder> {
        EventDispatcher::new(
            DispatcherConfig::default(),
            Recorder::default(),
            Arc::new(RuleGroupStore::new()),
            Arc::new(InterfaceTable::new()),
        )
    }

    fn add_rule(group: &str, index: u32) -> DataplaneEvent {
        DataplaneEvent::RuleGroup(RuleGroupEvent {
            group: RuleGroupKey::acl(group),
            change: RuleChange::Add {
                index,
                rule: PmfRule::pass(),
            },
        })
    }

    #[test]
    fn test_rule_group_forwarded_only_with_listener() {
        let mut d = dispatcher();
        d.dispatch(&add_rule("web", 1));
        assert!(d.handler().events.is_empty());
        assert_eq!(d.store.rule_count(&RuleGroupKey::acl("web")), 1);

        d.store
            .register_listener(&RuleGroupKey::acl("web"), " In/dp0p1")
            .unwrap();
        d.dispatch(&add_rule("web", 2));
        assert_eq!(d.handler().events.len(), 1);
    }

    #[test]
    fn test_refused_change_not_forwarded() {
        let mut d = dispatcher();
        d.store
            .register_listener(&RuleGroupKey::acl("web"), " In/dp0p1")
            .unwrap();
        d.dispatch(&add_rule("web", 1));
        d.dispatch(&add_rule("web", 1));
        assert_eq!(d.handler().events.len(), 1);
        assert_eq!(d.stats().refused, 1);
    }

    #[test]
    fn test_interface_table_updated_before_forward() {
        let mut d = dispatcher();
        let ifindex = IfIndex::new(5).unwrap();
        d.dispatch(&DataplaneEvent::Interface(InterfaceEvent::Created {
            ifname: "dp0p1".to_string(),
        }));
        assert_eq!(d.stats().refused, 1);

        d.dispatch(&DataplaneEvent::Interface(InterfaceEvent::Added {
            ifname: "dp0p1".to_string(),
            ifindex,
        }));
        d.dispatch(&DataplaneEvent::Interface(InterfaceEvent::Created {
            ifname: "dp0p1".to_string(),
        }));
        assert!(d.interfaces.is_created("dp0p1"));
        assert_eq!(d.handler().events.len(), 2);
    }

    #[tokio::test]
    async fn test_spawned_dispatcher_drains_queue() {
        let (tx, handle) = dispatcher().spawn();
        tx.send(DataplaneEvent::Commit).await.unwrap();
        tx.send(DataplaneEvent::Commit).await.unwrap();
        drop(tx);

        let d = handle.await.unwrap();
        assert_eq!(d.stats().forwarded, 2);
        assert_eq!(d.into_handler().events, vec![DataplaneEvent::Commit; 2]);
    }
}
