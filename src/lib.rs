//! # particle-flow
//!
//! Millions of particles pulled around by a handful of attraction points,
//! simulated and drawn entirely on the GPU.
//!
//! ## Quick Start
//!
//! ```no_run
//! use particle_flow::prelude::*;
//!
//! fn main() -> Result<(), FlowError> {
//!     let mut settings = Settings::default();
//!     settings.num_particles = 500_000;
//!     settings.motion_blur = true;
//!
//!     ParticleFlow::new()
//!         .with_settings(SettingsStore::new(settings))
//!         .run()
//! }
//! ```
//!
//! ## How a frame works
//!
//! Every particle is two floats of position and two half floats of
//! velocity. Each frame:
//!
//! 1. The settings generation is checked and, if it moved, a new
//!    [`FrameConfig`](config::FrameConfig) is derived. A changed particle count
//!    reallocates and reseeds the buffers; a changed workgroup size selects
//!    another compute kernel.
//! 2. The active attraction points are copied out of the
//!    [`AttractionRegistry`](attraction::AttractionRegistry).
//! 3. The compute kernel integrates `v = (v + a)·drag; p += v`, where `a`
//!    sums `attraction / |d|² · d` over the points.
//! 4. The render stage draws the buffers the kernel just wrote, colored by
//!    speed through a two-color HSV ramp, as points, sprites, or motion-blur
//!    trails.
//!
//! With double buffering the kernel reads one buffer pair and writes the
//! other, swapping every frame; without it a single pair is updated in place.
//!
//! ## Input
//!
//! The left mouse button and each touch grab an attraction point while held.
//! With no pointer down the points sit on a ring around the center. `R`
//! reseeds the particles; `Escape` quits.

pub mod attraction;
pub mod color;
pub mod config;
pub mod error;
pub mod gpu;
pub mod input;
pub mod physics;
pub mod shader;
mod simulation;
pub mod time;
pub mod visuals;

pub use glam::Vec2;
pub use simulation::ParticleFlow;

/// Convenient re-exports for common usage.
///
/// ```
/// use particle_flow::prelude::*;
/// ```
pub mod prelude {
    pub use crate::attraction::{AttractionRegistry, MAX_ATTRACTION_POINTS};
    pub use crate::color::{Argb, HueDirection};
    pub use crate::config::{FrameConfig, Settings, SettingsStore};
    pub use crate::error::{ConfigError, FlowError, GpuError};
    pub use crate::simulation::ParticleFlow;
    pub use crate::time::{FpsSampler, FrameCounter, FrameReport};
    pub use crate::visuals::{BlendPolicy, RenderMode};
    pub use crate::Vec2;
}
