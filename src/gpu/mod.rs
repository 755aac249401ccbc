//! GPU state and per-frame orchestration.
//!
//! [`GpuState`] owns the device, the surface and the stages. Each frame it
//! makes sure the particle buffers match the configuration, reseeds them if
//! asked, integrates one step, then draws the freshly written buffers. The
//! compute and render work share one command encoder; wgpu inserts the
//! barrier between the compute pass and the render pass that reads its
//! output.

mod checked;
pub mod compute;
pub mod gradient;
pub mod particles;
pub mod render;
pub mod upscale;

use std::sync::Arc;
use std::time::Instant;

use winit::window::Window;

use crate::attraction::ActivePoint;
use crate::config::{Capabilities, FrameConfig};
use crate::error::GpuError;
use crate::physics::speed_compensation;
use crate::time::FrameReport;

use compute::PhysicsStage;
use gradient::{GradientKey, GradientTexture};
use particles::{BufferSpec, ParticleBufferManager};
use render::RenderStage;
use upscale::{UpscaleTarget, Upscaler};

/// Inputs for one frame.
#[derive(Debug, Clone, Copy)]
pub struct FrameInput<'a> {
    pub config: &'a FrameConfig,
    /// Compacted attraction points, snapshotted for this frame.
    pub points: &'a [ActivePoint],
    /// Wall-clock delta in seconds.
    pub delta: f32,
    pub frame: u64,
}

pub struct GpuState {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    capabilities: Capabilities,
    minimized: bool,
    particles: ParticleBufferManager,
    physics: PhysicsStage,
    renderer: RenderStage,
    upscaler: Upscaler,
    gradient: Option<GradientTexture>,
    target: Option<UpscaleTarget>,
}

impl GpuState {
    pub async fn new(window: Arc<Window>) -> Result<Self, GpuError> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let surface = instance.create_surface(window)?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await?;
        let info = adapter.get_info();
        log::info!("Using {} ({:?})", info.name, info.backend);

        // Large particle counts need the adapter's real storage limits.
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Device"),
                required_features: wgpu::Features::empty(),
                required_limits: adapter.limits(),
                memory_hints: Default::default(),
                trace: Default::default(),
                experimental_features: Default::default(),
            })
            .await?;

        let capabilities = Capabilities::from_limits(&device.limits());
        log::info!(
            "Particle capacity {}, max workgroup size {}",
            capabilities.max_particles,
            capabilities.max_workgroup_size
        );

        // Ramp colors are written as raw bytes; an sRGB target would
        // re-encode them.
        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| !f.is_srgb())
            .copied()
            .unwrap_or(surface_caps.formats[0]);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let physics = PhysicsStage::new(&device);
        let renderer = RenderStage::new(&device, surface_format);
        let upscaler = Upscaler::new(&device, surface_format);

        Ok(Self {
            surface,
            device,
            queue,
            config,
            capabilities,
            minimized: size.width == 0 || size.height == 0,
            particles: ParticleBufferManager::new(),
            physics,
            renderer,
            upscaler,
            gradient: None,
            target: None,
        })
    }

    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        self.minimized = new_size.width == 0 || new_size.height == 0;
        if !self.minimized {
            self.config.width = new_size.width;
            self.config.height = new_size.height;
            self.surface.configure(&self.device, &self.config);
        }
    }

    /// Reconfigure the surface at its current size, after it was lost.
    pub fn reconfigure(&mut self) {
        self.surface.configure(&self.device, &self.config);
    }

    /// Surface size in pixels.
    pub fn size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Largest particle count this device can simulate.
    pub fn particle_capacity(&self) -> u32 {
        self.capabilities.max_particles
    }

    /// Reseed the particles on the next frame.
    pub fn request_reseed(&mut self) {
        self.particles.request_reseed();
    }

    /// Drop particle buffers, the ramp texture and the offscreen target.
    ///
    /// Everything is recreated on the next frame.
    pub fn release(&mut self) {
        self.particles.release();
        self.physics.release();
        self.renderer.invalidate();
        self.gradient = None;
        self.target = None;
        log::info!("Released GPU resources");
    }

    fn ensure_gradient(&mut self, config: &FrameConfig) {
        let key = GradientKey {
            slow: config.slow_color,
            fast: config.fast_color,
            direction: config.hue_direction,
        };
        match &mut self.gradient {
            Some(gradient) => {
                gradient.update(&self.queue, key);
            }
            None => {
                self.gradient = Some(GradientTexture::new(&self.device, &self.queue, key));
                self.renderer.invalidate();
            }
        }
    }

    fn ensure_target(&mut self, config: &FrameConfig) -> bool {
        if config.render_scale >= 100 || !self.upscaler.is_available() {
            self.target = None;
            return false;
        }
        let (width, height) = upscale::scaled_size(self.config.width, self.config.height, config.render_scale);
        let stale = self
            .target
            .as_ref()
            .map_or(true, |t| t.width != width || t.height != height);
        if stale {
            self.target = Some(self.upscaler.create_target(&self.device, width, height));
        }
        true
    }

    /// Simulate and draw one frame.
    ///
    /// Returns `Ok(None)` when the frame was skipped because the surface has
    /// no area. Surface errors are returned before any simulation state
    /// changes, so a failed frame can simply be retried.
    pub fn frame(&mut self, input: &FrameInput) -> Result<Option<FrameReport>, wgpu::SurfaceError> {
        if self.minimized {
            return Ok(None);
        }
        let output = self.surface.get_current_texture()?;
        let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());
        let config = input.config;
        let (width, height) = self.size();

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Frame Encoder"),
        });

        // Compute
        let compute_start = Instant::now();
        let compensation = speed_compensation(input.delta, config.constant_speed);
        let spec = BufferSpec {
            count: config.particle_count,
            double_buffer: config.double_buffer,
        };
        let mut simulated = 0;
        let mut seeded = false;
        if self.particles.ensure(&self.device, spec).is_some() {
            let pending = self.particles.pending_reseed();
            if let Some(buffers) = self.particles.buffers_mut() {
                seeded = match pending {
                    Some(seed) => self.physics.reseed(
                        &self.device,
                        &self.queue,
                        &mut encoder,
                        buffers,
                        config.workgroup_size,
                        seed,
                        (width, height),
                    ),
                    None => true,
                };
                // Unseeded buffers hold zeros; integrating them would stack
                // every particle on the origin.
                if seeded {
                    let stepped = self.physics.step(
                        &self.device,
                        &self.queue,
                        &mut encoder,
                        buffers,
                        input.points,
                        config.attraction * compensation,
                        config.drag,
                        config.workgroup_size,
                    );
                    if stepped {
                        simulated = buffers.count();
                    }
                }
            }
            if seeded && pending.is_some() {
                self.particles.reseeded();
            }
        }
        let compute = compute_start.elapsed();

        // Render
        let render_start = Instant::now();
        self.ensure_gradient(config);
        let scaled = self.ensure_target(config);
        let target = self.target.as_ref().filter(|_| scaled);
        let draw_view = target.map_or(&view, |t| &t.view);
        let params = render::render_params(config, width, height, compensation);

        let drawable = self.particles.buffers().filter(|_| seeded);
        match (drawable, &self.gradient) {
            (Some(buffers), Some(gradient)) => self.renderer.draw(
                &self.device,
                &self.queue,
                &mut encoder,
                draw_view,
                gradient,
                buffers.read_set(),
                buffers.count(),
                config,
                &params,
            ),
            _ => render::clear(&mut encoder, draw_view, config.background),
        }
        if let Some(target) = target {
            self.upscaler.blit(&mut encoder, target, &view);
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        let render = render_start.elapsed();

        Ok(Some(FrameReport {
            frame: input.frame,
            delta: input.delta,
            compute,
            render,
            particles: simulated,
        }))
    }
}
