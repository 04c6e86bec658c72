use std::cell::RefCell;
use std::rc::Rc;

use log::debug;

/// Anchor point for the floating toolbar, in viewport coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AffordancePosition {
    pub x: f64,
    pub y: f64,
}

/// The host's drawing surface for the toolbar.
pub trait OverlaySurface {
    fn inject_style(&mut self);

    fn create_affordance(&mut self);

    fn show_affordance(&mut self, position: AffordancePosition);

    fn hide_affordance(&mut self);

    fn remove_affordance(&mut self);

    fn remove_style(&mut self);
}

struct RegistryState {
    leases: usize,
    created: bool,
    next_lease: u64,
    /// Lease whose selection the affordance currently sits on
    shown_by: Option<u64>,
}

/// Process-wide selection affordance shared by every mounted reader.
///
/// The floating toolbar and its style sheet exist once per host process. Each
/// mounted view holds an [`OverlayLease`]; the first lease creates the
/// elements and the last one released removes them. Cloning shares the
/// registry.
#[derive(Clone)]
pub struct OverlayRegistry {
    surface: Rc<RefCell<dyn OverlaySurface>>,
    state: Rc<RefCell<RegistryState>>,
}

impl OverlayRegistry {
    pub fn new(surface: Rc<RefCell<dyn OverlaySurface>>) -> Self {
        Self {
            surface,
            state: Rc::new(RefCell::new(RegistryState {
                leases: 0,
                created: false,
                next_lease: 0,
                shown_by: None,
            })),
        }
    }

    pub fn acquire(&self) -> OverlayLease {
        let mut state = self.state.borrow_mut();
        state.leases += 1;
        let id = state.next_lease;
        state.next_lease += 1;
        if !state.created {
            let mut surface = self.surface.borrow_mut();
            surface.inject_style();
            surface.create_affordance();
            state.created = true;
            debug!("Selection toolbar created");
        }
        OverlayLease {
            id,
            registry: self.clone(),
            released: false,
        }
    }

    pub fn active_leases(&self) -> usize {
        self.state.borrow().leases
    }

    pub fn is_created(&self) -> bool {
        self.state.borrow().created
    }

    fn release(&self) {
        let mut state = self.state.borrow_mut();
        state.leases = state.leases.saturating_sub(1);
        if state.leases == 0 && state.created {
            state.shown_by = None;
            let mut surface = self.surface.borrow_mut();
            surface.hide_affordance();
            surface.remove_affordance();
            surface.remove_style();
            state.created = false;
            debug!("Selection toolbar removed by last reader");
        }
    }
}

/// One view's share of the overlay.
pub struct OverlayLease {
    id: u64,
    registry: OverlayRegistry,
    released: bool,
}

impl OverlayLease {
    /// Move the affordance to this lease's selection.
    pub fn show(&self, position: AffordancePosition) {
        self.registry.state.borrow_mut().shown_by = Some(self.id);
        self.registry.surface.borrow_mut().show_affordance(position);
    }

    /// Hide the affordance, unless another lease has taken it over since.
    pub fn hide(&self) {
        {
            let mut state = self.registry.state.borrow_mut();
            if state.shown_by != Some(self.id) {
                debug!("Affordance belongs to another reader, not hiding");
                return;
            }
            state.shown_by = None;
        }
        self.registry.surface.borrow_mut().hide_affordance();
    }

    pub fn release(mut self) {
        self.release_once();
    }

    fn release_once(&mut self) {
        if !self.released {
            self.released = true;
            self.registry.release();
        }
    }
}

impl Drop for OverlayLease {
    fn drop(&mut self) {
        self.release_once();
    }
}
