//! Settings and the per-frame configuration derived from them.
//!
//! [`Settings`] is the raw key/value snapshot, using the same key names as
//! the settings file. [`SettingsStore`] shares it between the frame task and
//! whoever edits it (a file watcher, a settings UI), and bumps a generation
//! number on every change so the frame task only re-derives [`FrameConfig`]
//! when something actually moved.
//!
//! ```
//! use particle_flow::config::{Capabilities, FrameConfig, Settings};
//!
//! let mut settings = Settings::default();
//! settings.num_particles = 1001;
//! settings.drag = 250;
//!
//! let config = FrameConfig::from_settings(&settings, &Capabilities::default());
//! assert_eq!(config.particle_count, 1002);
//! assert_eq!(config.drag, 0.0);
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde::{Deserialize, Serialize};

use crate::attraction::MAX_ATTRACTION_POINTS;
use crate::color::{Argb, HueDirection};
use crate::error::ConfigError;
use crate::visuals::{BlendPolicy, RenderMode};

/// Workgroup sizes are multiples of this.
pub const WORKGROUP_GRANULARITY: u32 = 32;

/// Largest particle size in pixels.
pub const MAX_PARTICLE_SIZE: u32 = 64;

/// Raw settings, keyed the way the settings file stores them.
///
/// Missing keys take their defaults, unknown keys are ignored. No value is
/// validated here; see [`FrameConfig::from_settings`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    #[serde(rename = "NumParticles")]
    pub num_particles: i64,
    #[serde(rename = "ParticleSize")]
    pub particle_size: i64,
    #[serde(rename = "NumAttPoints")]
    pub num_attraction_points: i64,
    /// Attraction, 0-1000.
    #[serde(rename = "F01Attraction")]
    pub attraction: i64,
    /// Drag percentage, 0-100. The per-step multiplier is `1 - drag / 100`.
    #[serde(rename = "F01Drag")]
    pub drag: i64,
    #[serde(rename = "use_double_buffer")]
    pub double_buffer: bool,
    #[serde(rename = "WorkgroupSize")]
    pub workgroup_size: i64,
    /// ARGB, signed or unsigned 32-bit.
    #[serde(rename = "BGColor")]
    pub background_color: i64,
    #[serde(rename = "SlowColor")]
    pub slow_color: i64,
    #[serde(rename = "FastColor")]
    pub fast_color: i64,
    #[serde(rename = "HueDirection")]
    pub hue_direction: i64,
    pub constant_speed: bool,
    pub color_correction: bool,
    pub motion_blur: bool,
    pub alpha_blending: bool,
    pub glow_mode: bool,
    pub glow_intensity: f32,
    pub blur_strength: f32,
    /// Percent of the surface resolution, 10-100.
    #[serde(rename = "RenderScale")]
    pub render_scale: i64,
    pub show_fps: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            num_particles: 1_000_000,
            particle_size: 1,
            num_attraction_points: 5,
            attraction: 100,
            drag: 4,
            double_buffer: true,
            workgroup_size: 256,
            background_color: 0xFF00_0000,
            slow_color: 0xFF00_00FF,
            fast_color: 0xFFFF_0000,
            hue_direction: 0,
            constant_speed: false,
            color_correction: false,
            motion_blur: false,
            alpha_blending: false,
            glow_mode: false,
            glow_intensity: 1.0,
            blur_strength: 1.0,
            render_scale: 100,
            show_fps: false,
        }
    }
}

impl Settings {
    /// Parse settings from JSON text.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Read settings from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[derive(Debug, Default)]
struct StoreInner {
    settings: RwLock<Settings>,
    generation: AtomicU64,
}

/// Shared, change-counted settings.
///
/// Cloning is cheap and every clone refers to the same settings.
#[derive(Debug, Clone, Default)]
pub struct SettingsStore {
    inner: Arc<StoreInner>,
}

impl SettingsStore {
    pub fn new(settings: Settings) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                settings: RwLock::new(settings),
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// Create a store from a JSON settings file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Ok(Self::new(Settings::load(path)?))
    }

    /// Copy of the current settings.
    pub fn snapshot(&self) -> Settings {
        self.inner
            .settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Change counter. Increases on every write that changed a value.
    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::Acquire)
    }

    /// Replace all settings.
    pub fn replace(&self, settings: Settings) {
        self.update(|current| *current = settings);
    }

    /// Edit settings in place. The generation only moves if something changed.
    pub fn update(&self, edit: impl FnOnce(&mut Settings)) {
        let mut guard = self
            .inner
            .settings
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = guard.clone();
        edit(&mut guard);
        if *guard != before {
            self.inner.generation.fetch_add(1, Ordering::AcqRel);
        }
    }

    /// Re-read `path` into the store.
    pub fn reload(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let settings = Settings::load(path)?;
        self.replace(settings);
        Ok(())
    }

    /// Reload `path` whenever it changes on disk.
    ///
    /// Watches the parent directory so editors that replace the file instead
    /// of writing it in place are still seen. A file that fails to parse is
    /// logged and the previous settings stay in effect. Watching stops when
    /// the returned watcher is dropped.
    pub fn watch(&self, path: impl AsRef<Path>) -> Result<SettingsWatcher, ConfigError> {
        let path = path.as_ref().to_path_buf();
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let file_name = path.file_name().map(|name| name.to_os_string());

        let store = self.clone();
        let target = path.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            let event = match res {
                Ok(event) => event,
                Err(e) => {
                    log::warn!("Settings watcher error: {}", e);
                    return;
                }
            };
            if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                return;
            }
            let touches_target = event
                .paths
                .iter()
                .any(|p| p.file_name().map(|n| n.to_os_string()) == file_name);
            if !touches_target {
                return;
            }
            match store.reload(&target) {
                Ok(()) => log::debug!("Reloaded settings from {}", target.display()),
                Err(e) => log::warn!("Keeping previous settings: {}", e),
            }
        })?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;
        log::info!("Watching {} for settings changes", path.display());

        Ok(SettingsWatcher {
            _watcher: watcher,
            path,
        })
    }
}

/// Keeps a settings file watch alive.
pub struct SettingsWatcher {
    _watcher: RecommendedWatcher,
    path: PathBuf,
}

impl SettingsWatcher {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Debug for SettingsWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsWatcher").field("path", &self.path).finish()
    }
}

/// Device limits that bound the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Largest particle count the buffers and dispatch can hold. Always even.
    pub max_particles: u32,
    /// Largest compute workgroup size.
    pub max_workgroup_size: u32,
}

impl Default for Capabilities {
    /// Limits for when no device is known: wgpu's default compute limit and
    /// no particle ceiling beyond `u32`.
    fn default() -> Self {
        Self {
            max_particles: u32::MAX & !1,
            max_workgroup_size: 256,
        }
    }
}

impl Capabilities {
    /// Derive limits from a device.
    ///
    /// A particle needs 8 bytes of position, so the position buffer is the
    /// binding that runs out first. Each lane handles two particles and the
    /// dispatch spreads over two dimensions of
    /// `max_compute_workgroups_per_dimension` groups each.
    pub fn from_limits(limits: &wgpu::Limits) -> Self {
        let max_workgroup_size = limits
            .max_compute_invocations_per_workgroup
            .min(limits.max_compute_workgroup_size_x);
        let max_workgroup_size = (max_workgroup_size / WORKGROUP_GRANULARITY * WORKGROUP_GRANULARITY)
            .max(WORKGROUP_GRANULARITY);

        let binding = (limits.max_storage_buffer_binding_size as u64).min(limits.max_buffer_size);
        let by_memory = binding / 8;
        let groups = limits.max_compute_workgroups_per_dimension as u64;
        let by_dispatch = groups * groups * WORKGROUP_GRANULARITY as u64 * 2;
        let max_particles = by_memory.min(by_dispatch).min(u32::MAX as u64) as u32 & !1;

        Self {
            max_particles: max_particles.max(2),
            max_workgroup_size,
        }
    }
}

/// Validated per-frame configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameConfig {
    /// Even, at least 2.
    pub particle_count: u32,
    pub particle_size: u32,
    pub default_points: usize,
    pub attraction: f32,
    /// Per-step velocity multiplier in `[0, 1]`.
    pub drag: f32,
    pub double_buffer: bool,
    /// A positive multiple of [`WORKGROUP_GRANULARITY`].
    pub workgroup_size: u32,
    pub background: Argb,
    pub slow_color: Argb,
    pub fast_color: Argb,
    pub hue_direction: HueDirection,
    pub constant_speed: bool,
    pub color_correction: bool,
    pub motion_blur: bool,
    pub alpha_blending: bool,
    pub glow: bool,
    pub glow_intensity: f32,
    pub blur_strength: f32,
    /// Percent, 10-100.
    pub render_scale: u32,
    pub show_fps: bool,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self::from_settings(&Settings::default(), &Capabilities::default())
    }
}

impl FrameConfig {
    /// Clamp raw settings into a usable configuration.
    ///
    /// Out-of-range values are clamped with a warning rather than rejected.
    pub fn from_settings(settings: &Settings, caps: &Capabilities) -> Self {
        let max_particles = (caps.max_particles & !1).max(2) as i64;
        let requested = clamped("NumParticles", settings.num_particles, 2, max_particles);
        // Round odd counts up, staying under the ceiling.
        let particle_count = ((requested + 1) & !1).min(max_particles) as u32;

        let max_workgroup = caps.max_workgroup_size.max(WORKGROUP_GRANULARITY) as i64;
        let workgroup = clamped(
            "WorkgroupSize",
            settings.workgroup_size,
            WORKGROUP_GRANULARITY as i64,
            max_workgroup,
        ) as u32;
        let workgroup_size = (workgroup / WORKGROUP_GRANULARITY * WORKGROUP_GRANULARITY).max(WORKGROUP_GRANULARITY);
        if workgroup_size != workgroup {
            log::warn!("WorkgroupSize {} rounded down to {}", workgroup, workgroup_size);
        }

        Self {
            particle_count,
            particle_size: clamped("ParticleSize", settings.particle_size, 1, MAX_PARTICLE_SIZE as i64) as u32,
            default_points: clamped(
                "NumAttPoints",
                settings.num_attraction_points,
                0,
                MAX_ATTRACTION_POINTS as i64,
            ) as usize,
            attraction: clamped("F01Attraction", settings.attraction, 0, 1000) as f32,
            drag: 1.0 - clamped("F01Drag", settings.drag, 0, 100) as f32 / 100.0,
            double_buffer: settings.double_buffer,
            workgroup_size,
            background: Argb::from_int(settings.background_color),
            slow_color: Argb::from_int(settings.slow_color),
            fast_color: Argb::from_int(settings.fast_color),
            hue_direction: HueDirection::from_flag(settings.hue_direction),
            constant_speed: settings.constant_speed,
            color_correction: settings.color_correction,
            motion_blur: settings.motion_blur,
            alpha_blending: settings.alpha_blending,
            glow: settings.glow_mode,
            glow_intensity: clamped_float("glow_intensity", settings.glow_intensity, 0.0, 10.0, 1.0),
            blur_strength: clamped_float("blur_strength", settings.blur_strength, 0.0, 10.0, 1.0),
            render_scale: clamped("RenderScale", settings.render_scale, 10, 100) as u32,
            show_fps: settings.show_fps,
        }
    }

    pub fn render_mode(&self) -> RenderMode {
        RenderMode::select(self.motion_blur, self.particle_size)
    }

    pub fn blend_policy(&self) -> BlendPolicy {
        BlendPolicy::select(self.alpha_blending, self.glow, self.motion_blur)
    }

    /// Multiplier applied to the color intensity: the glow intensity when glow
    /// is on, 1 otherwise.
    pub fn color_scale(&self) -> f32 {
        if self.glow {
            self.glow_intensity
        } else {
            1.0
        }
    }

    /// What must be rebuilt to go from `previous` to `self`.
    pub fn changes_from(&self, previous: &FrameConfig) -> ConfigDelta {
        ConfigDelta {
            buffers: self.particle_count != previous.particle_count
                || self.double_buffer != previous.double_buffer,
            kernel: self.workgroup_size != previous.workgroup_size,
            gradient: self.slow_color != previous.slow_color
                || self.fast_color != previous.fast_color
                || self.hue_direction != previous.hue_direction,
            default_points: self.default_points != previous.default_points,
            render_scale: self.render_scale != previous.render_scale,
        }
    }
}

/// Work triggered by a configuration change. Scalars not listed here are
/// picked up every frame without any rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConfigDelta {
    /// Particle count or double-buffer mode changed: reallocate and reseed.
    pub buffers: bool,
    /// Workgroup size changed: select another kernel.
    pub kernel: bool,
    /// Ramp endpoints or direction changed: rebuild the ramp texture.
    pub gradient: bool,
    /// Default point count changed: re-lay the default ring.
    pub default_points: bool,
    /// Offscreen target size changed.
    pub render_scale: bool,
}

impl ConfigDelta {
    pub fn is_empty(&self) -> bool {
        *self == ConfigDelta::default()
    }
}

fn clamped(key: &str, value: i64, min: i64, max: i64) -> i64 {
    let result = value.clamp(min, max);
    if result != value {
        log::warn!("{} = {} out of range, clamped to {}", key, value, result);
    }
    result
}

fn clamped_float(key: &str, value: f32, min: f32, max: f32, fallback: f32) -> f32 {
    if !value.is_finite() {
        log::warn!("{} = {} is not a number, using {}", key, value, fallback);
        return fallback;
    }
    let result = value.clamp(min, max);
    if result != value {
        log::warn!("{} = {} out of range, clamped to {}", key, value, result);
    }
    result
}
