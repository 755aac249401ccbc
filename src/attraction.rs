//! Attraction points.
//!
//! Up to [`MAX_ATTRACTION_POINTS`] points pull on every particle. Points are
//! written by the pointer-input path and read once per frame by the compute
//! dispatch, so the registry is a shared handle around a small locked array.
//! Readers always get a copy, never a reference into the live slots.
//!
//! Positions are in simulation coordinates: surface pixels, origin at the
//! bottom-left corner, y up.

use std::f32::consts::TAU;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use glam::Vec2;

/// Number of attraction slots.
pub const MAX_ATTRACTION_POINTS: usize = 16;

/// An active attraction point as seen by the physics kernel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActivePoint {
    /// Registry slot the point came from. Used as the point's hash salt.
    pub index: u32,
    /// Position in simulation coordinates.
    pub position: Vec2,
}

type Slots = [Option<Vec2>; MAX_ATTRACTION_POINTS];

/// Shared registry of attraction points.
///
/// Cloning is cheap and every clone refers to the same slots.
#[derive(Debug, Clone, Default)]
pub struct AttractionRegistry {
    slots: Arc<Mutex<Slots>>,
}

impl AttractionRegistry {
    /// Create a registry with every slot inactive.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Slots> {
        // Slots are plain data; a panic mid-write cannot leave them inconsistent.
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Activate slot `index` at `position`, or deactivate it with `None`.
    ///
    /// Indices outside `0..16` are ignored.
    pub fn set(&self, index: usize, position: Option<Vec2>) {
        if index >= MAX_ATTRACTION_POINTS {
            return;
        }
        self.lock()[index] = position;
    }

    /// Deactivate every slot.
    pub fn clear(&self) {
        *self.lock() = [None; MAX_ATTRACTION_POINTS];
    }

    /// Copy of all slots.
    pub fn snapshot(&self) -> [Option<Vec2>; MAX_ATTRACTION_POINTS] {
        *self.lock()
    }

    /// Active points in slot order, lowest index first.
    pub fn active_list(&self) -> Vec<ActivePoint> {
        self.snapshot()
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| {
                slot.map(|position| ActivePoint {
                    index: index as u32,
                    position,
                })
            })
            .collect()
    }

    /// Number of active slots.
    pub fn active_count(&self) -> usize {
        self.lock().iter().filter(|slot| slot.is_some()).count()
    }

    /// Replace every slot with the default ring layout.
    ///
    /// With one point it sits at the center. With more, point 0 sits
    /// `min(width, height) / 3` below the center (simulation y points up) and
    /// the others follow it around a circle of that radius at angle
    /// `2π·i/count`, `(sin θ, -cos θ)`. Slots at or past `count` are
    /// deactivated.
    pub fn reset_to_default(&self, width: u32, height: u32, count: usize) {
        let layout = default_layout(width, height, count);
        let mut slots = self.lock();
        *slots = [None; MAX_ATTRACTION_POINTS];
        for (slot, position) in slots.iter_mut().zip(layout) {
            *slot = Some(position);
        }
    }
}

/// Positions of the default ring layout.
pub fn default_layout(width: u32, height: u32, count: usize) -> Vec<Vec2> {
    let count = count.min(MAX_ATTRACTION_POINTS);
    if count == 0 || width == 0 || height == 0 {
        return Vec::new();
    }

    let center = Vec2::new(width as f32, height as f32) / 2.0;
    let radius = width.min(height) as f32 / 3.0;

    let mut points: Vec<Vec2> = Vec::with_capacity(count);
    if count == 1 {
        return vec![center];
    }
    (0..count)
        .map(|i| {
            let angle = TAU * i as f32 / count as f32;
            center + radius * Vec2::new(angle.sin(), -angle.cos())
        })
        .collect()
}
