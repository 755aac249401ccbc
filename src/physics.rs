//! Particle physics: kernel parameters and the host-side mirror of the kernel.
//!
//! The compute kernel in [`crate::shader`] is the implementation that runs
//! every frame. The functions here compute exactly the same thing on the CPU
//! so the numeric behavior (seeding, singularity handling, drag) can be
//! checked without a GPU, and so both sides agree on the hash.

use std::f32::consts::TAU;

use bytemuck::{Pod, Zeroable};
use glam::Vec2;
use half::f16;

use crate::attraction::{ActivePoint, MAX_ATTRACTION_POINTS};

/// Squared distance below which a particle counts as sitting on a point.
pub const SINGULARITY_RADIUS_SQ: f32 = 0.1;

/// `1 / 2³²`: maps a 32-bit hash into `[0, 1]`.
pub const HASH_TO_UNIT: f32 = 1.0 / 4_294_967_296.0;

/// Frame delta assumed on the first frame or when the clock misbehaves.
pub const FALLBACK_DELTA: f32 = 1.0 / 120.0;

/// Upper bound of the constant-speed attraction multiplier.
pub const MAX_SPEED_COMPENSATION: f32 = 12.0;

/// Largest velocity component a half float holds. Velocities are clamped to
/// `±MAX_VELOCITY` every step so the stored value never becomes infinite.
pub const MAX_VELOCITY: f32 = 65504.0;

/// Two-round xorshift-multiply integer hash.
///
/// Identical to `hash` in the WGSL kernel. Wrapping arithmetic matches WGSL
/// `u32` semantics.
#[inline]
pub fn hash(x: u32) -> u32 {
    let mut x = x;
    x = ((x >> 16) ^ x).wrapping_mul(0x045d_9f3b);
    x = ((x >> 16) ^ x).wrapping_mul(0x045d_9f3b);
    (x >> 16) ^ x
}

/// Hash mapped into `[0, 1]`.
#[inline]
pub fn unit_float(h: u32) -> f32 {
    h as f32 * HASH_TO_UNIT
}

/// Attraction multiplier that keeps perceived speed independent of frame rate.
///
/// `delta` is the wall-clock time between frames in seconds. Non-positive or
/// non-finite deltas use [`FALLBACK_DELTA`]. When `enabled` is false the
/// multiplier is 1 and motion speed follows the device's frame rate.
pub fn speed_compensation(delta: f32, enabled: bool) -> f32 {
    if !enabled {
        return 1.0;
    }
    let delta = if delta.is_finite() && delta > 0.0 {
        delta
    } else {
        FALLBACK_DELTA
    };
    (delta * 120.0 * 1.1).clamp(0.0, MAX_SPEED_COMPENSATION)
}

/// Reseed position of particle `index`: uniform in the disk around `center`.
pub fn seed_position(index: u32, seed: u32, center: Vec2, radius: f32) -> Vec2 {
    let salt = hash(seed);
    let base = index.wrapping_mul(2).wrapping_add(salt);
    let r = radius * unit_float(hash(base)).sqrt();
    let theta = unit_float(hash(base.wrapping_add(1))) * TAU;
    center + r * Vec2::new(theta.cos(), theta.sin())
}

/// Reseed disk radius for a surface: half its diagonal.
pub fn seed_radius(width: u32, height: u32) -> f32 {
    let (w, h) = (width as f32, height as f32);
    (w * w + h * h).sqrt() / 2.0
}

/// Direction substituted when particle `index` sits on a point.
///
/// Always unit length; depends only on the particle index, the point's slot
/// and the number of active points.
pub fn jitter_direction(index: u32, salt: u32, point_count: u32) -> Vec2 {
    let theta = unit_float(hash(index.wrapping_add(hash(salt.wrapping_add(point_count))))) * TAU;
    Vec2::new(theta.cos(), theta.sin())
}

/// Acceleration on a particle at `position` from `points`.
pub fn acceleration(index: u32, position: Vec2, points: &[ActivePoint], attraction: f32) -> Vec2 {
    let count = points.len() as u32;
    points.iter().fold(Vec2::ZERO, |acc, point| {
        let mut diff = point.position - position;
        let mut d2 = diff.length_squared();
        if d2 < SINGULARITY_RADIUS_SQ {
            diff = jitter_direction(index, point.index, count);
            d2 = 1.0;
        }
        acc + (attraction / d2) * diff
    })
}

/// One integration step for one particle. Returns `(position, velocity)`.
pub fn advance(
    index: u32,
    position: Vec2,
    velocity: Vec2,
    points: &[ActivePoint],
    attraction: f32,
    drag: f32,
) -> (Vec2, Vec2) {
    let velocity = clamp_velocity((velocity + acceleration(index, position, points, attraction)) * drag);
    (position + velocity, velocity)
}

fn clamp_velocity(velocity: Vec2) -> Vec2 {
    velocity.clamp(Vec2::splat(-MAX_VELOCITY), Vec2::splat(MAX_VELOCITY))
}

/// A velocity as the velocity buffer stores it: two half floats, `x` in the
/// low 16 bits. Same layout as WGSL `pack2x16float`. Components beyond
/// [`MAX_VELOCITY`] saturate.
pub fn pack_velocity(velocity: Vec2) -> u32 {
    let velocity = clamp_velocity(velocity);
    let x = f16::from_f32(velocity.x).to_bits() as u32;
    let y = f16::from_f32(velocity.y).to_bits() as u32;
    x | (y << 16)
}

pub fn unpack_velocity(bits: u32) -> Vec2 {
    let x = f16::from_bits(bits as u16).to_f32();
    let y = f16::from_bits((bits >> 16) as u16).to_f32();
    Vec2::new(x, y)
}

/// [`advance`] over a stored (half-float) velocity, the way the kernel sees it.
pub fn advance_stored(
    index: u32,
    position: Vec2,
    velocity: u32,
    points: &[ActivePoint],
    attraction: f32,
    drag: f32,
) -> (Vec2, u32) {
    let (position, velocity) = advance(index, position, unpack_velocity(velocity), points, attraction, drag);
    (position, pack_velocity(velocity))
}

/// Uniform block of the compute kernel.
///
/// Layout matches `SimParams` in the WGSL kernel (304 bytes).
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct SimParams {
    /// Number of compute lanes (particle count / 2).
    pub pair_count: u32,
    /// Number of valid entries in `points`.
    pub point_count: u32,
    /// Non-zero to reseed instead of integrating.
    pub reset: u32,
    /// Reseed generation, mixed into the seeding hash.
    pub seed: u32,
    /// Attraction coefficient for this frame (speed compensation applied).
    pub attraction: f32,
    /// Per-step velocity multiplier.
    pub drag: f32,
    /// Reseed disk center.
    pub center: [f32; 2],
    /// Reseed disk radius.
    pub radius: f32,
    pub _pad: [f32; 3],
    /// `xy` = position, `z` = registry slot (hash salt).
    pub points: [[f32; 4]; MAX_ATTRACTION_POINTS],
}

impl SimParams {
    /// Parameters for an integration step.
    pub fn step(particle_count: u32, points: &[ActivePoint], attraction: f32, drag: f32) -> Self {
        let mut params = Self::zeroed();
        params.pair_count = particle_count / 2;
        params.attraction = attraction;
        params.drag = drag;
        params.point_count = points.len().min(MAX_ATTRACTION_POINTS) as u32;
        for (slot, point) in params.points.iter_mut().zip(points) {
            *slot = [point.position.x, point.position.y, point.index as f32, 0.0];
        }
        params
    }

    /// Parameters for a reseed dispatch over a `width × height` surface.
    pub fn reseed(particle_count: u32, seed: u32, width: u32, height: u32) -> Self {
        let mut params = Self::zeroed();
        params.pair_count = particle_count / 2;
        params.reset = 1;
        params.seed = seed;
        params.center = [width as f32 / 2.0, height as f32 / 2.0];
        params.radius = seed_radius(width, height);
        params
    }
}
