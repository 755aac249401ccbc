//! Particle state buffers.
//!
//! A particle is 8 bytes of position (`f32 × 2`) and 4 bytes of velocity
//! (`f16 × 2`), split across two buffers so the render stage can bind each
//! one directly as an instance-rate vertex buffer. With double buffering
//! there are two such pairs and the kernel reads one while writing the
//! other; without it the single pair is updated in place.
//!
//! Whether buffers need (re)allocating or reseeding is decided by
//! [`BufferPlanner`], which holds no GPU objects and can be tested alone.

use crate::error::GpuError;

use super::checked;

/// Bytes of position per particle.
pub const POSITION_STRIDE: u64 = 8;
/// Bytes of velocity per particle.
pub const VELOCITY_STRIDE: u64 = 4;

/// Which buffer pair is read and which is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferRotation {
    double: bool,
    read: usize,
}

impl BufferRotation {
    pub fn new(double: bool) -> Self {
        Self { double, read: 0 }
    }

    pub fn is_double(&self) -> bool {
        self.double
    }

    /// Index of the pair holding the latest state.
    pub fn read(&self) -> usize {
        self.read
    }

    /// Index of the pair the next step writes.
    pub fn write(&self) -> usize {
        if self.double {
            1 - self.read
        } else {
            self.read
        }
    }

    /// Swap roles after a step. Single-buffered rotation never moves.
    pub fn advance(&mut self) {
        if self.double {
            self.read = 1 - self.read;
        }
    }
}

/// What the particle buffers must hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferSpec {
    /// Even particle count.
    pub count: u32,
    pub double_buffer: bool,
}

impl BufferSpec {
    pub fn sets(&self) -> usize {
        if self.double_buffer {
            2
        } else {
            1
        }
    }

    pub fn position_bytes(&self) -> u64 {
        self.count as u64 * POSITION_STRIDE
    }

    pub fn velocity_bytes(&self) -> u64 {
        self.count as u64 * VELOCITY_STRIDE
    }
}

/// Outcome of [`BufferPlanner::plan`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plan {
    /// Current buffers already match.
    Keep,
    /// Buffers must be created for the spec.
    Allocate,
    /// This exact spec failed to allocate before; don't try again.
    Skip,
}

/// Allocation and reseed bookkeeping.
#[derive(Debug, Default)]
pub struct BufferPlanner {
    current: Option<BufferSpec>,
    failed: Option<BufferSpec>,
    generation: u64,
    reseed_pending: bool,
    seed: u32,
}

impl BufferPlanner {
    pub fn plan(&self, spec: BufferSpec) -> Plan {
        if self.current == Some(spec) {
            Plan::Keep
        } else if self.failed == Some(spec) {
            Plan::Skip
        } else {
            Plan::Allocate
        }
    }

    /// Record a successful allocation. Fresh buffers always get reseeded.
    pub fn allocated(&mut self, spec: BufferSpec) {
        self.current = Some(spec);
        self.failed = None;
        self.generation += 1;
        self.reseed_pending = true;
    }

    /// Record a failed allocation.
    pub fn failed(&mut self, spec: BufferSpec) {
        self.current = None;
        self.failed = Some(spec);
        self.reseed_pending = false;
    }

    /// Forget everything except the generation counter, e.g. on suspend.
    pub fn released(&mut self) {
        self.current = None;
        self.failed = None;
        self.reseed_pending = false;
    }

    /// Ask for a reseed of the current buffers.
    pub fn request_reseed(&mut self) {
        if self.current.is_some() {
            self.reseed_pending = true;
        }
    }

    /// The pending reseed, if any, with the seed to use.
    ///
    /// Stays pending, with the same seed, until [`reseeded`](Self::reseeded)
    /// confirms the dispatch was recorded.
    pub fn pending_reseed(&self) -> Option<u32> {
        self.reseed_pending.then(|| self.seed.wrapping_add(1))
    }

    /// Confirm the pending reseed was dispatched.
    pub fn reseeded(&mut self) {
        if self.reseed_pending {
            self.reseed_pending = false;
            self.seed = self.seed.wrapping_add(1);
        }
    }

    pub fn current(&self) -> Option<BufferSpec> {
        self.current
    }

    /// Increases on every allocation. Bind groups built for an older
    /// generation are stale.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// One position/velocity pair.
#[derive(Debug)]
pub struct ParticleSet {
    pub positions: wgpu::Buffer,
    pub velocities: wgpu::Buffer,
}

impl ParticleSet {
    fn new(device: &wgpu::Device, spec: BufferSpec, index: usize) -> Self {
        let usage = wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::VERTEX;
        let positions = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(format!("Particle Positions {}", index).as_str()),
            size: spec.position_bytes(),
            usage,
            mapped_at_creation: false,
        });
        let velocities = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(format!("Particle Velocities {}", index).as_str()),
            size: spec.velocity_bytes(),
            usage,
            mapped_at_creation: false,
        });
        Self {
            positions,
            velocities,
        }
    }
}

/// Live particle buffers.
#[derive(Debug)]
pub struct ParticleBuffers {
    pub spec: BufferSpec,
    pub sets: Vec<ParticleSet>,
    pub rotation: BufferRotation,
    pub generation: u64,
}

impl ParticleBuffers {
    /// The pair holding the latest state.
    pub fn read_set(&self) -> &ParticleSet {
        &self.sets[self.rotation.read()]
    }

    pub fn count(&self) -> u32 {
        self.spec.count
    }
}

/// Owns the particle buffers.
#[derive(Debug, Default)]
pub struct ParticleBufferManager {
    planner: BufferPlanner,
    buffers: Option<ParticleBuffers>,
}

impl ParticleBufferManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make sure buffers for `spec` exist.
    ///
    /// A no-op when they already do. A changed spec drops the old buffers,
    /// allocates new ones and schedules a reseed. Returns `None` when the
    /// allocation failed, now or for this same spec earlier.
    pub fn ensure(&mut self, device: &wgpu::Device, spec: BufferSpec) -> Option<&mut ParticleBuffers> {
        match self.planner.plan(spec) {
            Plan::Keep => {}
            Plan::Skip => return None,
            Plan::Allocate => {
                self.buffers = None;
                match Self::allocate(device, spec) {
                    Ok(sets) => {
                        self.planner.allocated(spec);
                        log::info!(
                            "Allocated {} particles ({})",
                            spec.count,
                            if spec.double_buffer { "double-buffered" } else { "in place" }
                        );
                        self.buffers = Some(ParticleBuffers {
                            spec,
                            sets,
                            rotation: BufferRotation::new(spec.double_buffer),
                            generation: self.planner.generation(),
                        });
                    }
                    Err(e) => {
                        log::error!("{}; not retrying {} particles", e, spec.count);
                        self.planner.failed(spec);
                        return None;
                    }
                }
            }
        }
        self.buffers.as_mut()
    }

    fn allocate(device: &wgpu::Device, spec: BufferSpec) -> Result<Vec<ParticleSet>, GpuError> {
        checked::allocated(device, "particle buffers", || {
            (0..spec.sets()).map(|i| ParticleSet::new(device, spec, i)).collect()
        })
    }

    pub fn buffers(&self) -> Option<&ParticleBuffers> {
        self.buffers.as_ref()
    }

    pub fn buffers_mut(&mut self) -> Option<&mut ParticleBuffers> {
        self.buffers.as_mut()
    }

    /// Reseed the current buffers on the next frame.
    pub fn request_reseed(&mut self) {
        self.planner.request_reseed();
    }

    /// See [`BufferPlanner::pending_reseed`].
    pub fn pending_reseed(&self) -> Option<u32> {
        self.planner.pending_reseed()
    }

    /// See [`BufferPlanner::reseeded`].
    pub fn reseeded(&mut self) {
        self.planner.reseeded();
    }

    /// Drop all buffers. The next [`ensure`](Self::ensure) reallocates.
    pub fn release(&mut self) {
        self.buffers = None;
        self.planner.released();
    }
}
