//! Scoped listener registry shared between a host event loop and mounted
//! effects.
//!
//! The host owns one [`EventHub`] per surface and forwards platform events
//! through it. A mounted effect attaches one [`Subscription`] per event kind
//! it cares about; detaching happens either explicitly during unmount or via
//! `Drop`, so a leaked instance can never leave a listener behind. The hub
//! tracks attachment counts, which is what the lifecycle tests observe.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

/// Event categories an effect instance can subscribe to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum EventKind {
    /// Surface dimensions changed.
    Resize,
    /// Pointer moved inside the surface bounds.
    PointerMove,
}

#[derive(Default)]
struct HubState {
    next_id: u64,
    attached: BTreeMap<u64, EventKind>,
}

/// Host-side registry of active event subscriptions.
///
/// Everything runs on the UI thread (rendering here is cooperative and
/// frame-driven), so the shared state is a plain `Rc<RefCell<…>>`.
#[derive(Clone, Default)]
pub struct EventHub {
    inner: Rc<RefCell<HubState>>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers interest in `kind` and returns the owning handle.
    pub fn attach(&self, kind: EventKind) -> Subscription {
        let mut state = self.inner.borrow_mut();
        let id = state.next_id;
        state.next_id += 1;
        state.attached.insert(id, kind);
        tracing::trace!(?kind, id, "attached surface listener");
        Subscription {
            hub: Rc::downgrade(&self.inner),
            id,
            kind,
        }
    }

    /// Number of currently attached subscriptions across all kinds.
    pub fn attached_count(&self) -> usize {
        self.inner.borrow().attached.len()
    }

    /// Number of currently attached subscriptions of one kind.
    pub fn attached_count_of(&self, kind: EventKind) -> usize {
        self.inner
            .borrow()
            .attached
            .values()
            .filter(|attached| **attached == kind)
            .count()
    }
}

/// Handle for one registered listener; detaches on drop.
pub struct Subscription {
    hub: Weak<RefCell<HubState>>,
    id: u64,
    kind: EventKind,
}

impl Subscription {
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Whether the subscription is still registered with its hub.
    pub fn is_attached(&self) -> bool {
        self.hub
            .upgrade()
            .map(|hub| hub.borrow().attached.contains_key(&self.id))
            .unwrap_or(false)
    }

    /// Removes the subscription from the hub. Safe to call more than once.
    pub fn detach(&mut self) {
        if let Some(hub) = self.hub.upgrade() {
            if hub.borrow_mut().attached.remove(&self.id).is_some() {
                tracing::trace!(kind = ?self.kind, id = self.id, "detached surface listener");
            }
        }
        self.hub = Weak::new();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.detach();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attach_and_detach_update_counts() {
        let hub = EventHub::new();
        let mut resize = hub.attach(EventKind::Resize);
        let pointer = hub.attach(EventKind::PointerMove);
        assert_eq!(hub.attached_count(), 2);
        assert_eq!(hub.attached_count_of(EventKind::Resize), 1);
        assert!(resize.is_attached());

        resize.detach();
        assert!(!resize.is_attached());
        assert_eq!(hub.attached_count(), 1);

        drop(pointer);
        assert_eq!(hub.attached_count(), 0);
    }

    #[test]
    fn detach_is_idempotent() {
        let hub = EventHub::new();
        let mut sub = hub.attach(EventKind::Resize);
        sub.detach();
        sub.detach();
        assert_eq!(hub.attached_count(), 0);
    }

    #[test]
    fn subscription_outliving_hub_reports_detached() {
        let hub = EventHub::new();
        let sub = hub.attach(EventKind::PointerMove);
        drop(hub);
        assert!(!sub.is_attached());
    }
}
