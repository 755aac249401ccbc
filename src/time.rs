//! Frame timing.
//!
//! [`FrameClock`] measures the wall-clock delta the constant-speed correction
//! needs. [`FrameCounter`] is the lock-free frame count a background task
//! drains to compute FPS, and [`FrameReport`] is what frame listeners receive
//! after each completed frame.
//!
//! # Example
//!
//! ```
//! use particle_flow::time::{FpsSampler, FrameCounter};
//!
//! let counter = FrameCounter::new();
//! let mut sampler = FpsSampler::new(counter.clone());
//!
//! // The frame task:
//! counter.increment();
//! counter.increment();
//!
//! // A background task, some time later:
//! let fps = sampler.sample();
//! assert!(fps >= 0.0);
//! assert_eq!(counter.drain(), 0);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::physics::FALLBACK_DELTA;

/// Measures time between frames.
#[derive(Debug, Default)]
pub struct FrameClock {
    last: Option<Instant>,
    delta: f32,
    frame: u64,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance to a new frame and return its delta in seconds.
    pub fn tick(&mut self) -> f32 {
        self.tick_at(Instant::now())
    }

    /// Advance to a frame starting at `now`.
    ///
    /// The first frame, and any frame whose measured delta is zero, reports
    /// [`FALLBACK_DELTA`].
    pub fn tick_at(&mut self, now: Instant) -> f32 {
        let measured = self
            .last
            .map(|last| now.saturating_duration_since(last).as_secs_f32())
            .unwrap_or(0.0);
        self.last = Some(now);
        self.frame += 1;
        self.delta = if measured > 0.0 { measured } else { FALLBACK_DELTA };
        self.delta
    }

    /// Delta of the current frame in seconds.
    pub fn delta(&self) -> f32 {
        self.delta
    }

    /// Number of frames ticked so far.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Forget the last frame time, so the next frame uses the fallback delta.
    ///
    /// Called on resume, where the gap since the last frame is not a frame
    /// delta at all.
    pub fn reset(&mut self) {
        self.last = None;
    }
}

/// Frame counter shared between the frame task and an FPS reader.
#[derive(Debug, Clone, Default)]
pub struct FrameCounter {
    frames: Arc<AtomicU64>,
}

impl FrameCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed frame.
    pub fn increment(&self) {
        self.frames.fetch_add(1, Ordering::Relaxed);
    }

    /// Frames recorded since the last drain. Resets the count to zero.
    pub fn drain(&self) -> u64 {
        self.frames.swap(0, Ordering::Relaxed)
    }
}

/// Turns periodic drains of a [`FrameCounter`] into frames per second.
#[derive(Debug)]
pub struct FpsSampler {
    counter: FrameCounter,
    last: Instant,
    fps: f32,
}

impl FpsSampler {
    pub fn new(counter: FrameCounter) -> Self {
        Self {
            counter,
            last: Instant::now(),
            fps: 0.0,
        }
    }

    /// Drain the counter and return the rate since the previous sample.
    pub fn sample(&mut self) -> f32 {
        self.sample_at(Instant::now())
    }

    pub fn sample_at(&mut self, now: Instant) -> f32 {
        let frames = self.counter.drain();
        let elapsed = now.saturating_duration_since(self.last).as_secs_f32();
        self.last = now;
        if elapsed > 0.0 {
            self.fps = frames as f32 / elapsed;
        }
        self.fps
    }

    /// The most recent sample.
    pub fn fps(&self) -> f32 {
        self.fps
    }
}

/// What a frame listener hears after each completed frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameReport {
    /// Frame number, starting at 1.
    pub frame: u64,
    /// Wall-clock delta used by this frame, in seconds.
    pub delta: f32,
    /// CPU time spent encoding the compute work.
    pub compute: Duration,
    /// CPU time spent encoding the draws.
    pub render: Duration,
    /// Particles simulated this frame. Zero when the step was skipped.
    pub particles: u32,
}
