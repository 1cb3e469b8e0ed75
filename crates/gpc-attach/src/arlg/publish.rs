//! Group publication state machine.
//!
//! A group is visible to the hardware only while it has an attribute rule
//! carrying an address family. [`transition`] decides what a new (or
//! withdrawn) attribute rule means for the group; [`Group::reconcile_attr`]
//! carries the outcome out.

use log::debug;
use vplane_npf_common::PmfRule;
use vplane_types::AddressFamily;

use crate::gpc::{Group, HwScope};

/// Outcome of an attribute rule change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Publication {
    /// Nothing changes.
    NoOp,
    /// First attribute rule, but it has no family yet.
    AcquireAttr,
    /// Withdraw the group from the hardware and arm a deferred republish.
    Unpublish,
    /// Publish under this family.
    Publish(AddressFamily),
    /// Family changed: withdraw, then publish under the new family.
    Republish(AddressFamily),
}

/// Decides the publication outcome.
///
/// `had_attr` is whether the group holds an attribute rule, `current` the
/// family it was last published (or publishable) under, and `attr` the
/// new attribute rule, `None` when it is withdrawn.
pub fn transition(
    had_attr: bool,
    current: Option<AddressFamily>,
    attr: Option<&PmfRule>,
) -> Publication {
    let Some(attr) = attr else {
        return if had_attr {
            Publication::Unpublish
        } else {
            Publication::NoOp
        };
    };

    if !had_attr {
        return match attr.family {
            Some(af) => Publication::Publish(af),
            None => Publication::AcquireAttr,
        };
    }

    match (current, attr.family) {
        // Losing the family acts like a group removal.
        (Some(_), None) => Publication::Unpublish,
        (None, None) => Publication::NoOp,
        (None, Some(af)) => Publication::Publish(af),
        (Some(old), Some(new)) if old == new => Publication::NoOp,
        (Some(_), Some(new)) => Publication::Republish(new),
    }
}

impl Group {
    /// Applies an attribute rule change to the group's publication state.
    pub fn reconcile_attr(&mut self, scope: &mut HwScope<'_>, attr: Option<&PmfRule>) -> Publication {
        let outcome = transition(self.attr_flag, self.family, attr);
        debug!(
            "{}: attribute reconcile {:?}",
            scope.binding.context(&self.name),
            outcome
        );

        match outcome {
            Publication::NoOp => {}
            Publication::AcquireAttr => self.attr_flag = true,
            Publication::Unpublish => {
                if self.published {
                    self.teardown(scope);
                    self.deferred = true;
                    scope.defer();
                }
                self.attr_flag = false;
                self.family = None;
            }
            Publication::Publish(af) => {
                self.attr_flag = true;
                self.family = Some(af);
                self.publish(scope);
            }
            Publication::Republish(af) => {
                if self.published {
                    self.teardown(scope);
                }
                self.family = Some(af);
                self.publish(scope);
            }
        }
        outcome
    }
}
