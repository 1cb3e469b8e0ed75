//! Event handler trait driven by the dispatcher.

use crate::event::DataplaneEvent;

/// A subsystem that reacts to dataplane events.
///
/// The dispatcher runs one `handle_event` to completion before delivering
/// the next event, so implementations need no internal locking.
pub trait EventHandler: Send {
    /// Returns the name of this handler (for logging and debugging).
    fn name(&self) -> &str;

    /// Processes one event.
    fn handle_event(&mut self, event: &DataplaneEvent);

    /// Returns true if this handler has work waiting for a commit.
    fn has_pending_work(&self) -> bool {
        false
    }

    /// Dumps pending work for debugging.
    fn dump_pending(&self) -> Vec<String> {
        vec![]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingHandler {
        seen: usize,
    }

    impl EventHandler for CountingHandler {
        fn name(&self) -> &str {
            "counting"
        }

        fn handle_event(&mut self, _event: &DataplaneEvent) {
            self.seen += 1;
        }
    }

    #[test]
    fn test_handler_defaults() {
        let mut handler = CountingHandler { seen: 0 };
        handler.handle_event(&DataplaneEvent::Commit);
        assert_eq!(handler.name(), "counting");
        assert_eq!(handler.seen, 1);
        assert!(!handler.has_pending_work());
        assert!(handler.dump_pending().is_empty());
    }
}
