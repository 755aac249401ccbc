//! Color ramp texture.

use crate::color::{Argb, GradientRamp, HueDirection, RAMP_WIDTH};

/// Inputs a ramp was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GradientKey {
    pub slow: Argb,
    pub fast: Argb,
    pub direction: HueDirection,
}

/// A 256×1 `Rgba8Unorm` texture holding a [`GradientRamp`].
pub struct GradientTexture {
    pub key: GradientKey,
    texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
}

impl GradientTexture {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, key: GradientKey) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Gradient Ramp"),
            size: wgpu::Extent3d {
                width: RAMP_WIDTH as u32,
                height: 1,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Gradient Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let gradient = Self {
            key,
            texture,
            view,
            sampler,
        };
        gradient.upload(queue);
        gradient
    }

    /// Rebuild the ramp in place if `key` differs. Returns true if it did.
    pub fn update(&mut self, queue: &wgpu::Queue, key: GradientKey) -> bool {
        if self.key == key {
            return false;
        }
        self.key = key;
        self.upload(queue);
        true
    }

    fn upload(&self, queue: &wgpu::Queue) {
        let ramp = GradientRamp::build(self.key.slow, self.key.fast, self.key.direction);
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            ramp.as_bytes(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(RAMP_WIDTH as u32 * 4),
                rows_per_image: Some(1),
            },
            wgpu::Extent3d {
                width: RAMP_WIDTH as u32,
                height: 1,
                depth_or_array_layers: 1,
            },
        );
        log::debug!(
            "Gradient ramp {:08x} -> {:08x} ({:?})",
            self.key.slow.0,
            self.key.fast.0,
            self.key.direction
        );
    }
}
