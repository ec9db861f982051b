//! Mount/unmount state machine for effect surfaces.
//!
//! The machine guards one resource (the GPU context in production, a stub in
//! tests) together with the frame gate and the listener subscriptions, and
//! enforces the teardown order a surface must observe: cancel the frame gate
//! first so no further draw can start, then detach listeners so no callback
//! can touch the resource, and only then release the resource itself.

use crate::events::{EventKind, Subscription};

/// Lifecycle phases of a mounted surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Unmounted,
    Mounting,
    Active,
    Unmounting,
}

/// State machine owning a guarded resource and its listeners.
pub struct Lifecycle<R> {
    phase: Phase,
    frame_gate: bool,
    listeners: Vec<Subscription>,
    resource: Option<R>,
}

impl<R> Lifecycle<R> {
    pub fn new() -> Self {
        Self {
            phase: Phase::Unmounted,
            frame_gate: false,
            listeners: Vec::new(),
            resource: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Enters `Mounting`. Only legal from `Unmounted`.
    pub fn begin_mount(&mut self) {
        debug_assert_eq!(self.phase, Phase::Unmounted, "mount from non-unmounted phase");
        self.phase = Phase::Mounting;
    }

    /// Completes the mount with a live resource and its listeners.
    pub fn activate(&mut self, resource: R, listeners: Vec<Subscription>) {
        debug_assert_eq!(self.phase, Phase::Mounting, "activate outside Mounting");
        self.resource = Some(resource);
        self.listeners = listeners;
        self.frame_gate = true;
        self.phase = Phase::Active;
    }

    /// Abandons the mount without a resource (unsupported environment).
    ///
    /// The machine returns to `Unmounted`; the instance stays inert.
    pub fn abandon_mount(&mut self) {
        debug_assert_eq!(self.phase, Phase::Mounting, "abandon outside Mounting");
        self.phase = Phase::Unmounted;
    }

    pub fn is_active(&self) -> bool {
        self.phase == Phase::Active
    }

    /// Whether a frame may be rendered right now.
    pub fn frame_allowed(&self) -> bool {
        self.phase == Phase::Active && self.frame_gate
    }

    /// Whether the listener for `kind` is still attached.
    pub fn listener_attached(&self, kind: EventKind) -> bool {
        self.listeners
            .iter()
            .any(|sub| sub.kind() == kind && sub.is_attached())
    }

    pub fn resource(&self) -> Option<&R> {
        self.resource.as_ref()
    }

    pub fn resource_mut(&mut self) -> Option<&mut R> {
        self.resource.as_mut()
    }

    /// Tears the surface down: frame gate, listeners, resource, in that
    /// order. Idempotent: calling on a non-active machine does nothing.
    pub fn unmount(&mut self, release: impl FnOnce(R)) {
        if self.phase != Phase::Active {
            return;
        }
        self.phase = Phase::Unmounting;

        self.frame_gate = false;
        for sub in &mut self.listeners {
            sub.detach();
        }
        self.listeners.clear();
        if let Some(resource) = self.resource.take() {
            release(resource);
        }

        self.phase = Phase::Unmounted;
    }
}

impl<R> Default for Lifecycle<R> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventHub;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct StubContext;

    fn mounted(hub: &EventHub) -> Lifecycle<StubContext> {
        let mut lifecycle = Lifecycle::new();
        lifecycle.begin_mount();
        lifecycle.activate(
            StubContext,
            vec![
                hub.attach(EventKind::Resize),
                hub.attach(EventKind::PointerMove),
            ],
        );
        lifecycle
    }

    #[test]
    fn mount_then_unmount_walks_the_phases() {
        let hub = EventHub::new();
        let mut lifecycle = mounted(&hub);
        assert_eq!(lifecycle.phase(), Phase::Active);
        assert!(lifecycle.frame_allowed());
        assert!(lifecycle.listener_attached(EventKind::Resize));

        lifecycle.unmount(drop);
        assert_eq!(lifecycle.phase(), Phase::Unmounted);
        assert!(!lifecycle.frame_allowed());
        assert_eq!(hub.attached_count(), 0);
        assert!(lifecycle.resource().is_none());
    }

    #[test]
    fn teardown_releases_resource_after_gate_and_listeners() {
        let hub = EventHub::new();
        let mut lifecycle = mounted(&hub);

        let observed = Rc::new(RefCell::new(None));
        let probe = observed.clone();
        let hub_probe = hub.clone();
        lifecycle.unmount(move |_resource| {
            // The release hook runs last: the hub must already be empty.
            *probe.borrow_mut() = Some(hub_probe.attached_count());
        });
        assert_eq!(*observed.borrow(), Some(0));
    }

    #[test]
    fn double_unmount_releases_exactly_once() {
        let hub = EventHub::new();
        let mut lifecycle = mounted(&hub);
        let releases = Rc::new(RefCell::new(0));

        for _ in 0..2 {
            let counter = releases.clone();
            lifecycle.unmount(move |_resource| {
                *counter.borrow_mut() += 1;
            });
        }
        assert_eq!(*releases.borrow(), 1);
    }

    #[test]
    fn abandoned_mount_stays_inert() {
        let mut lifecycle: Lifecycle<StubContext> = Lifecycle::new();
        lifecycle.begin_mount();
        lifecycle.abandon_mount();
        assert_eq!(lifecycle.phase(), Phase::Unmounted);
        assert!(!lifecycle.frame_allowed());

        // Unmount on an inert machine is a no-op.
        lifecycle.unmount(|_| panic!("nothing to release"));
    }
}
