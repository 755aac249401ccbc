//! Window and event loop.
//!
//! [`ParticleFlow`] is the builder; `run()` opens a window and drives one
//! frame per redraw until the window closes.

use std::sync::Arc;

use winit::{
    application::ApplicationHandler,
    event::{ElementState, KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

use crate::attraction::AttractionRegistry;
use crate::config::{FrameConfig, SettingsStore};
use crate::error::FlowError;
use crate::gpu::{FrameInput, GpuState};
use crate::input::PointerTracker;
use crate::time::{FrameClock, FrameCounter, FrameReport};

type FrameListener = Box<dyn FnMut(&FrameReport) + Send>;

/// A particle flow builder.
///
/// ```no_run
/// use particle_flow::prelude::*;
///
/// let settings = SettingsStore::new(Settings::default());
/// let counter = FrameCounter::new();
///
/// ParticleFlow::new()
///     .with_settings(settings)
///     .with_frame_counter(counter)
///     .on_frame(|report| log::trace!("frame {} took {:?}", report.frame, report.compute))
///     .run()
///     .unwrap();
/// ```
pub struct ParticleFlow {
    settings: SettingsStore,
    registry: AttractionRegistry,
    counter: FrameCounter,
    listener: Option<FrameListener>,
    title: String,
    size: (u32, u32),
}

impl ParticleFlow {
    pub fn new() -> Self {
        Self {
            settings: SettingsStore::default(),
            registry: AttractionRegistry::new(),
            counter: FrameCounter::new(),
            listener: None,
            title: "Particle Flow".to_string(),
            size: (1280, 720),
        }
    }

    /// Read settings from `store`, following its changes every frame.
    pub fn with_settings(mut self, store: SettingsStore) -> Self {
        self.settings = store;
        self
    }

    /// Use a registry shared with another input source.
    pub fn with_registry(mut self, registry: AttractionRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Count completed frames into `counter`.
    pub fn with_frame_counter(mut self, counter: FrameCounter) -> Self {
        self.counter = counter;
        self
    }

    /// Call `listener` after every completed frame.
    pub fn on_frame<F>(mut self, listener: F) -> Self
    where
        F: FnMut(&FrameReport) + Send + 'static,
    {
        self.listener = Some(Box::new(listener));
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Initial window size in logical pixels.
    pub fn with_window_size(mut self, width: u32, height: u32) -> Self {
        self.size = (width, height);
        self
    }

    /// Open the window and run until it closes.
    pub fn run(self) -> Result<(), FlowError> {
        let event_loop = EventLoop::new()?;
        event_loop.set_control_flow(ControlFlow::Poll);

        let mut app = App::new(self);
        event_loop.run_app(&mut app)?;

        match app.error.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Default for ParticleFlow {
    fn default() -> Self {
        Self::new()
    }
}

struct App {
    window: Option<Arc<Window>>,
    gpu_state: Option<GpuState>,
    settings: SettingsStore,
    /// Settings generation `config` was built from.
    seen_generation: Option<u64>,
    config: FrameConfig,
    registry: AttractionRegistry,
    pointers: PointerTracker,
    clock: FrameClock,
    counter: FrameCounter,
    listener: Option<FrameListener>,
    title: String,
    size: (u32, u32),
    error: Option<FlowError>,
}

impl App {
    fn new(flow: ParticleFlow) -> Self {
        let config = FrameConfig::default();
        Self {
            window: None,
            gpu_state: None,
            settings: flow.settings,
            seen_generation: None,
            pointers: PointerTracker::new(flow.registry.clone(), config.default_points),
            config,
            registry: flow.registry,
            clock: FrameClock::new(),
            counter: flow.counter,
            listener: flow.listener,
            title: flow.title,
            size: flow.size,
            error: None,
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: FlowError) {
        log::error!("{}", error);
        self.error = Some(error);
        event_loop.exit();
    }

    /// Rebuild the frame config if the settings moved since the last frame.
    fn refresh_config(&mut self) {
        let generation = self.settings.generation();
        if self.seen_generation == Some(generation) {
            return;
        }
        let Some(gpu_state) = &self.gpu_state else {
            return;
        };

        let config = FrameConfig::from_settings(&self.settings.snapshot(), &gpu_state.capabilities());
        let delta = config.changes_from(&self.config);
        if delta.default_points {
            self.pointers.set_default_points(config.default_points);
        }
        if !delta.is_empty() {
            log::debug!("Settings changed: {:?}", delta);
        }
        self.config = config;
        self.seen_generation = Some(generation);
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        self.refresh_config();
        let delta = self.clock.tick();
        let points = self.registry.active_list();
        let input = FrameInput {
            config: &self.config,
            points: &points,
            delta,
            frame: self.clock.frame(),
        };

        let Some(gpu_state) = &mut self.gpu_state else {
            return;
        };
        match gpu_state.frame(&input) {
            Ok(Some(report)) => {
                self.counter.increment();
                if let Some(listener) = &mut self.listener {
                    listener(&report);
                }
            }
            Ok(None) => {}
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => gpu_state.reconfigure(),
            Err(wgpu::SurfaceError::OutOfMemory) => {
                log::error!("Out of GPU memory presenting frame");
                event_loop.exit();
            }
            Err(e) => log::warn!("Frame skipped: {}", e),
        }
    }

    fn handle_key(&mut self, event_loop: &ActiveEventLoop, event: &KeyEvent) {
        if event.state != ElementState::Pressed || event.repeat {
            return;
        }
        match event.physical_key {
            PhysicalKey::Code(KeyCode::KeyR) => {
                if let Some(gpu_state) = &mut self.gpu_state {
                    log::info!("Reseeding particles");
                    gpu_state.request_reseed();
                }
            }
            PhysicalKey::Code(KeyCode::Escape) => event_loop.exit(),
            _ => {}
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            let window_attrs = Window::default_attributes()
                .with_title(self.title.clone())
                .with_inner_size(winit::dpi::LogicalSize::new(self.size.0, self.size.1));

            let window = match event_loop.create_window(window_attrs) {
                Ok(window) => Arc::new(window),
                Err(e) => return self.fail(event_loop, e.into()),
            };
            self.window = Some(window.clone());

            match pollster::block_on(GpuState::new(window.clone())) {
                Ok(gpu_state) => self.gpu_state = Some(gpu_state),
                Err(e) => return self.fail(event_loop, e.into()),
            }
        }

        if let Some(gpu_state) = &self.gpu_state {
            let (width, height) = gpu_state.size();
            self.pointers.resize(width, height);
        }
        self.clock.reset();
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }

    fn suspended(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(gpu_state) = &mut self.gpu_state {
            gpu_state.release();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(physical_size) => {
                if let Some(gpu_state) = &mut self.gpu_state {
                    gpu_state.resize(physical_size);
                }
                if physical_size.width > 0 && physical_size.height > 0 {
                    self.pointers.resize(physical_size.width, physical_size.height);
                }
            }
            WindowEvent::KeyboardInput { event, .. } => {
                self.handle_key(event_loop, &event);
            }
            WindowEvent::RedrawRequested => {
                self.redraw(event_loop);
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
            other => {
                self.pointers.handle_event(&other);
            }
        }
    }
}
