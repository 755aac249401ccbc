//! Pointer input.
//!
//! [`PointerTracker`] turns window mouse and touch events into attraction
//! points. The left mouse button drives slot 0, and each touch takes the
//! lowest free slot for as long as it stays down. While no pointer is down
//! the registry holds the default ring; the first pointer down clears it and
//! the last pointer up restores it.
//!
//! Window coordinates have y pointing down. Attraction points live in
//! simulation coordinates (origin bottom-left, y up), so every position is
//! flipped on the way in.

use glam::Vec2;
use winit::event::{ElementState, MouseButton, Touch, TouchPhase, WindowEvent};

use crate::attraction::{AttractionRegistry, MAX_ATTRACTION_POINTS};

/// Identity of a pointer that holds an attraction slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointerId {
    Mouse,
    Touch(u64),
}

/// Maps pointer events onto an [`AttractionRegistry`].
#[derive(Debug)]
pub struct PointerTracker {
    registry: AttractionRegistry,
    owners: [Option<PointerId>; MAX_ATTRACTION_POINTS],
    cursor: Option<Vec2>,
    width: u32,
    height: u32,
    default_points: usize,
}

impl PointerTracker {
    pub fn new(registry: AttractionRegistry, default_points: usize) -> Self {
        Self {
            registry,
            owners: [None; MAX_ATTRACTION_POINTS],
            cursor: None,
            width: 0,
            height: 0,
            default_points,
        }
    }

    /// Number of pointers currently down.
    pub fn active_pointers(&self) -> usize {
        self.owners.iter().filter(|owner| owner.is_some()).count()
    }

    /// Slot held by `id`, if it is down.
    pub fn slot_of(&self, id: PointerId) -> Option<usize> {
        self.owners.iter().position(|owner| *owner == Some(id))
    }

    /// Track a new surface size. Re-lays the default ring when idle.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        if self.active_pointers() == 0 {
            self.restore_default();
        }
    }

    /// Change how many points the default ring has. Re-lays it when idle.
    pub fn set_default_points(&mut self, count: usize) {
        self.default_points = count;
        if self.active_pointers() == 0 {
            self.restore_default();
        }
    }

    /// Put the default ring back, dropping every pointer.
    pub fn restore_default(&mut self) {
        self.owners = [None; MAX_ATTRACTION_POINTS];
        self.registry
            .reset_to_default(self.width, self.height, self.default_points);
    }

    /// Window position (y down) to simulation position (y up).
    pub fn to_simulation(&self, window: Vec2) -> Vec2 {
        Vec2::new(window.x, self.height as f32 - window.y)
    }

    /// Feed a window event. Returns true if it touched the attraction points.
    pub fn handle_event(&mut self, event: &WindowEvent) -> bool {
        match event {
            WindowEvent::CursorMoved { position, .. } => {
                let at = Vec2::new(position.x as f32, position.y as f32);
                self.cursor = Some(at);
                self.pointer_moved(PointerId::Mouse, at)
            }
            WindowEvent::CursorLeft { .. } => {
                self.cursor = None;
                false
            }
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => match (state, self.cursor) {
                (ElementState::Pressed, Some(at)) => self.pointer_down(PointerId::Mouse, at),
                (ElementState::Released, _) => self.pointer_up(PointerId::Mouse),
                _ => false,
            },
            WindowEvent::Touch(Touch {
                id, phase, location, ..
            }) => {
                let pointer = PointerId::Touch(*id);
                let at = Vec2::new(location.x as f32, location.y as f32);
                match phase {
                    TouchPhase::Started => self.pointer_down(pointer, at),
                    TouchPhase::Moved => self.pointer_moved(pointer, at),
                    TouchPhase::Ended | TouchPhase::Cancelled => self.pointer_up(pointer),
                }
            }
            _ => false,
        }
    }

    /// A pointer went down at `window` coordinates.
    ///
    /// Returns false when every slot is taken.
    pub fn pointer_down(&mut self, id: PointerId, window: Vec2) -> bool {
        if let Some(slot) = self.slot_of(id) {
            self.registry.set(slot, Some(self.to_simulation(window)));
            return true;
        }

        let slot = match id {
            PointerId::Mouse => Some(0).filter(|&s| self.owners[s].is_none()),
            PointerId::Touch(_) => self.owners.iter().position(Option::is_none),
        };
        let Some(slot) = slot else {
            log::debug!("No free attraction slot for {:?}", id);
            return false;
        };

        if self.active_pointers() == 0 {
            self.registry.clear();
        }
        self.owners[slot] = Some(id);
        self.registry.set(slot, Some(self.to_simulation(window)));
        true
    }

    /// A pointer moved. Ignored unless it is down.
    pub fn pointer_moved(&mut self, id: PointerId, window: Vec2) -> bool {
        match self.slot_of(id) {
            Some(slot) => {
                self.registry.set(slot, Some(self.to_simulation(window)));
                true
            }
            None => false,
        }
    }

    /// A pointer lifted. The last one up restores the default ring.
    pub fn pointer_up(&mut self, id: PointerId) -> bool {
        let Some(slot) = self.slot_of(id) else {
            return false;
        };
        self.owners[slot] = None;
        self.registry.set(slot, None);
        if self.active_pointers() == 0 {
            self.restore_default();
        }
        true
    }
}
