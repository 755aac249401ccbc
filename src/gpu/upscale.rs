//! Reduced-resolution rendering.
//!
//! Below 100% render scale particles are drawn into an offscreen texture of
//! the scaled size, which a fullscreen triangle then stretches over the
//! surface with linear filtering.

use crate::shader::BLIT_SHADER;

use super::checked;

/// Offscreen size for a surface at `percent` render scale. Never zero.
pub fn scaled_size(width: u32, height: u32, percent: u32) -> (u32, u32) {
    let scale = |v: u32| ((v as u64 * percent as u64) / 100).max(1) as u32;
    (scale(width), scale(height))
}

/// Offscreen target of one size.
pub struct UpscaleTarget {
    pub width: u32,
    pub height: u32,
    pub view: wgpu::TextureView,
    bind_group: wgpu::BindGroup,
}

/// Upscale pipeline, shared by every target.
pub struct Upscaler {
    layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    pipeline: Option<wgpu::RenderPipeline>,
    format: wgpu::TextureFormat,
}

impl Upscaler {
    pub fn new(device: &wgpu::Device, format: wgpu::TextureFormat) -> Self {
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Upscale Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Upscale Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let pipeline = match checked::validated(device, "upscale pipeline", || {
            Self::create_pipeline(device, &layout, format)
        }) {
            Ok(pipeline) => Some(pipeline),
            Err(e) => {
                log::error!("Render scale unavailable: {}", e);
                None
            }
        };

        Self {
            layout,
            sampler,
            pipeline,
            format,
        }
    }

    fn create_pipeline(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        format: wgpu::TextureFormat,
    ) -> wgpu::RenderPipeline {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Upscale Shader"),
            source: wgpu::ShaderSource::Wgsl(BLIT_SHADER.into()),
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Upscale Pipeline Layout"),
            bind_group_layouts: &[layout],
            push_constant_ranges: &[],
        });
        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Upscale Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        })
    }

    pub fn is_available(&self) -> bool {
        self.pipeline.is_some()
    }

    /// Create an offscreen target of `width × height`.
    pub fn create_target(&self, device: &wgpu::Device, width: u32, height: u32) -> UpscaleTarget {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Scaled Render Target"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: self.format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Upscale Bind Group"),
            layout: &self.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });
        log::debug!("Render target {}x{}", width, height);
        UpscaleTarget {
            width,
            height,
            view,
            bind_group,
        }
    }

    /// Stretch `target` over `output`.
    pub fn blit(&self, encoder: &mut wgpu::CommandEncoder, target: &UpscaleTarget, output: &wgpu::TextureView) {
        let Some(pipeline) = &self.pipeline else {
            return;
        };
        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Upscale Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: output,
                resolve_target: None,
                depth_slice: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        render_pass.set_pipeline(pipeline);
        render_pass.set_bind_group(0, &target.bind_group, &[]);
        render_pass.draw(0..3, 0..1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scaled_size() {
        assert_eq!(scaled_size(1920, 1080, 100), (1920, 1080));
        assert_eq!(scaled_size(1920, 1080, 50), (960, 540));
        assert_eq!(scaled_size(1920, 1080, 33), (633, 356));
        assert_eq!(scaled_size(5, 5, 10), (1, 1));
    }
}
