//! Particle render stage.

use std::collections::HashMap;

use crate::color::Argb;
use crate::config::FrameConfig;
use crate::shader::{RenderParams, RENDER_SHADER};
use crate::visuals::{BlendPolicy, Primitive};

use super::checked;
use super::gradient::GradientTexture;
use super::particles::{ParticleSet, POSITION_STRIDE, VELOCITY_STRIDE};

/// Alpha of particle bodies when plain alpha blending is on.
pub const BLENDED_ALPHA: f32 = 0.5;

/// Uniforms for drawing a `width × height` surface.
///
/// `compensation` is the frame's constant-speed factor. With color correction
/// on it is divided back out of the speed so colors don't follow frame rate.
pub fn render_params(config: &FrameConfig, width: u32, height: u32, compensation: f32) -> RenderParams {
    let speed_norm = if config.constant_speed && config.color_correction && compensation > 0.0 {
        1.0 / (compensation * compensation)
    } else {
        1.0
    };
    let alpha = if config.alpha_blending && !config.glow {
        BLENDED_ALPHA
    } else {
        1.0
    };
    RenderParams {
        scale: [2.0 / width.max(1) as f32, 2.0 / height.max(1) as f32],
        offset: [-1.0, -1.0],
        point_size: config.particle_size as f32,
        blur: config.blur_strength,
        color_scale: config.color_scale(),
        speed_norm,
        alpha,
        _pad: [0.0; 3],
    }
}

/// Clear color for an ARGB background. Alpha is always opaque.
pub fn clear_color(background: Argb) -> wgpu::Color {
    wgpu::Color {
        r: background.red() as f64 / 255.0,
        g: background.green() as f64 / 255.0,
        b: background.blue() as f64 / 255.0,
        a: 1.0,
    }
}

/// Clear `target` to the background without drawing anything.
pub fn clear(encoder: &mut wgpu::CommandEncoder, target: &wgpu::TextureView, background: Argb) {
    encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some("Clear Pass"),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view: target,
            resolve_target: None,
            depth_slice: None,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Clear(clear_color(background)),
                store: wgpu::StoreOp::Store,
            },
        })],
        depth_stencil_attachment: None,
        timestamp_writes: None,
        occlusion_query_set: None,
    });
}

/// Draws particles from the position and velocity buffers.
pub struct RenderStage {
    bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    shader: Option<wgpu::ShaderModule>,
    /// `None` marks a combination that failed to build.
    pipelines: HashMap<(Primitive, BlendPolicy), Option<wgpu::RenderPipeline>>,
    params_buffer: wgpu::Buffer,
    bind_group: Option<wgpu::BindGroup>,
    format: wgpu::TextureFormat,
}

impl RenderStage {
    pub fn new(device: &wgpu::Device, format: wgpu::TextureFormat) -> Self {
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Render Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Render Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let shader = match checked::validated(device, "render shader", || {
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("Particle Render Shader"),
                source: wgpu::ShaderSource::Wgsl(RENDER_SHADER.into()),
            })
        }) {
            Ok(module) => Some(module),
            Err(e) => {
                log::error!("Particle rendering unavailable: {}", e);
                None
            }
        };

        let params_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Render Params"),
            size: std::mem::size_of::<RenderParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Self {
            bind_group_layout,
            pipeline_layout,
            shader,
            pipelines: HashMap::new(),
            params_buffer,
            bind_group: None,
            format,
        }
    }

    fn pipeline(&mut self, device: &wgpu::Device, primitive: Primitive, blend: BlendPolicy) -> Option<&wgpu::RenderPipeline> {
        let key = (primitive, blend);
        if !self.pipelines.contains_key(&key) {
            let pipeline = self.shader.as_ref().and_then(|shader| {
                let built = checked::validated(device, primitive.label(), || {
                    create_pipeline(device, &self.pipeline_layout, shader, self.format, primitive, blend)
                });
                match built {
                    Ok(pipeline) => {
                        log::debug!("Built {:?} pipeline ({:?})", primitive, blend);
                        Some(pipeline)
                    }
                    Err(e) => {
                        log::error!("{:?} pipeline ({:?}) unavailable: {}", primitive, blend, e);
                        None
                    }
                }
            });
            self.pipelines.insert(key, pipeline);
        }
        self.pipelines.get(&key).and_then(Option::as_ref)
    }

    /// Forget the bind group, e.g. after the gradient texture was recreated.
    pub fn invalidate(&mut self) {
        self.bind_group = None;
    }

    /// Clear `target` and draw `count` particles from `set`.
    ///
    /// Primitives whose pipeline is unavailable are skipped; the clear still
    /// happens.
    #[allow(clippy::too_many_arguments)]
    pub fn draw(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
        gradient: &GradientTexture,
        set: &ParticleSet,
        count: u32,
        config: &FrameConfig,
        params: &RenderParams,
    ) {
        queue.write_buffer(&self.params_buffer, 0, bytemuck::bytes_of(params));

        if self.bind_group.is_none() {
            self.bind_group = Some(device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Render Bind Group"),
                layout: &self.bind_group_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: self.params_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::TextureView(&gradient.view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: wgpu::BindingResource::Sampler(&gradient.sampler),
                    },
                ],
            }));
        }

        let blend = config.blend_policy();
        let passes = config.render_mode().passes(config.particle_size);
        for &primitive in passes {
            self.pipeline(device, primitive, blend);
        }

        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Particle Render Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                depth_slice: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(clear_color(config.background)),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        let Some(bind_group) = &self.bind_group else {
            return;
        };
        render_pass.set_bind_group(0, bind_group, &[]);
        render_pass.set_vertex_buffer(0, set.positions.slice(..));
        render_pass.set_vertex_buffer(1, set.velocities.slice(..));

        for &primitive in passes {
            let Some(pipeline) = self.pipelines.get(&(primitive, blend)).and_then(Option::as_ref) else {
                continue;
            };
            render_pass.set_pipeline(pipeline);
            render_pass.draw(0..primitive.vertices_per_particle(), 0..count);
        }
    }
}

fn create_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    format: wgpu::TextureFormat,
    primitive: Primitive,
    blend: BlendPolicy,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(primitive.label()),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some(primitive.entry_point()),
            buffers: &[
                wgpu::VertexBufferLayout {
                    array_stride: POSITION_STRIDE,
                    step_mode: wgpu::VertexStepMode::Instance,
                    attributes: &wgpu::vertex_attr_array![0 => Float32x2],
                },
                wgpu::VertexBufferLayout {
                    array_stride: VELOCITY_STRIDE,
                    step_mode: wgpu::VertexStepMode::Instance,
                    attributes: &wgpu::vertex_attr_array![1 => Float16x2],
                },
            ],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: blend.blend_state(),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: primitive.topology(),
            cull_mode: None,
            ..Default::default()
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}
