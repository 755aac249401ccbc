//! Physics compute stage.

use std::collections::HashMap;

use crate::attraction::ActivePoint;
use crate::physics::SimParams;
use crate::shader;

use super::checked;
use super::particles::ParticleBuffers;

/// Identifies one compiled variant of the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KernelKey {
    pub workgroup_size: u32,
    pub in_place: bool,
}

/// Workgroup grid covering `lanes` invocations.
///
/// Spills into the y dimension when x would exceed `max_per_dimension`.
pub fn dispatch_size(lanes: u32, workgroup_size: u32, max_per_dimension: u32) -> (u32, u32) {
    let groups = lanes.div_ceil(workgroup_size.max(1));
    if groups == 0 {
        return (0, 0);
    }
    let x = groups.min(max_per_dimension.max(1));
    (x, groups.div_ceil(x))
}

/// Bind groups for one buffer generation.
struct BindGroups {
    generation: u64,
    /// Indexed by the read set.
    step: Vec<wgpu::BindGroup>,
    /// Indexed by the set being reseeded.
    reseed: Vec<wgpu::BindGroup>,
}

/// Dispatches the physics kernel over the particle buffers.
pub struct PhysicsStage {
    in_place_layout: wgpu::BindGroupLayout,
    ping_pong_layout: wgpu::BindGroupLayout,
    in_place_pipeline_layout: wgpu::PipelineLayout,
    ping_pong_pipeline_layout: wgpu::PipelineLayout,
    /// `None` marks a variant that failed to build.
    kernels: HashMap<KernelKey, Option<wgpu::ComputePipeline>>,
    step_params: wgpu::Buffer,
    reseed_params: wgpu::Buffer,
    bind_groups: Option<BindGroups>,
    max_groups_per_dimension: u32,
}

fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: wgpu::BufferSize::new(std::mem::size_of::<SimParams>() as u64),
        },
        count: None,
    }
}

impl PhysicsStage {
    pub fn new(device: &wgpu::Device) -> Self {
        let in_place_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Physics In-Place Bind Group Layout"),
            entries: &[storage_entry(0, false), storage_entry(1, false), uniform_entry(2)],
        });
        let ping_pong_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Physics Ping-Pong Bind Group Layout"),
            entries: &[
                storage_entry(0, false),
                storage_entry(1, false),
                uniform_entry(2),
                storage_entry(3, true),
                storage_entry(4, true),
            ],
        });

        let in_place_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Physics In-Place Pipeline Layout"),
            bind_group_layouts: &[&in_place_layout],
            push_constant_ranges: &[],
        });
        let ping_pong_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Physics Ping-Pong Pipeline Layout"),
            bind_group_layouts: &[&ping_pong_layout],
            push_constant_ranges: &[],
        });

        let params_size = std::mem::size_of::<SimParams>() as u64;
        let step_params = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Physics Step Params"),
            size: params_size,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let reseed_params = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Physics Reseed Params"),
            size: params_size,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Self {
            in_place_layout,
            ping_pong_layout,
            in_place_pipeline_layout,
            ping_pong_pipeline_layout,
            kernels: HashMap::new(),
            step_params,
            reseed_params,
            bind_groups: None,
            max_groups_per_dimension: device.limits().max_compute_workgroups_per_dimension,
        }
    }

    /// The kernel for `key`, building it on first use.
    ///
    /// A kernel that fails to build is logged once and stays unavailable.
    fn kernel(&mut self, device: &wgpu::Device, key: KernelKey) -> Option<&wgpu::ComputePipeline> {
        if !self.kernels.contains_key(&key) {
            let layout = if key.in_place {
                &self.in_place_pipeline_layout
            } else {
                &self.ping_pong_pipeline_layout
            };
            let built = checked::validated(device, "physics kernel", || {
                let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: Some("Physics Kernel"),
                    source: wgpu::ShaderSource::Wgsl(
                        shader::compute_shader(key.workgroup_size, key.in_place).into(),
                    ),
                });
                device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                    label: Some("Physics Pipeline"),
                    layout: Some(layout),
                    module: &module,
                    entry_point: Some("main"),
                    compilation_options: Default::default(),
                    cache: None,
                })
            });
            let pipeline = match built {
                Ok(pipeline) => {
                    log::debug!("Built physics kernel {:?}", key);
                    Some(pipeline)
                }
                Err(e) => {
                    log::error!("Physics kernel {:?} unavailable: {}", key, e);
                    None
                }
            };
            self.kernels.insert(key, pipeline);
        }
        self.kernels.get(&key).and_then(Option::as_ref)
    }

    fn refresh_bind_groups(&mut self, device: &wgpu::Device, buffers: &ParticleBuffers) {
        let stale = self
            .bind_groups
            .as_ref()
            .map_or(true, |groups| groups.generation != buffers.generation);
        if stale {
            self.bind_groups = Some(self.create_bind_groups(device, buffers));
        }
    }

    fn create_bind_groups(&self, device: &wgpu::Device, buffers: &ParticleBuffers) -> BindGroups {
        let sets = &buffers.sets;
        let in_place = |index: usize, params: &wgpu::Buffer, label: &str| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(label),
                layout: &self.in_place_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: sets[index].positions.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: sets[index].velocities.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: params.as_entire_binding(),
                    },
                ],
            })
        };

        let step = if buffers.rotation.is_double() {
            (0..2)
                .map(|read| {
                    let write = 1 - read;
                    device.create_bind_group(&wgpu::BindGroupDescriptor {
                        label: Some("Physics Ping-Pong Bind Group"),
                        layout: &self.ping_pong_layout,
                        entries: &[
                            wgpu::BindGroupEntry {
                                binding: 0,
                                resource: sets[write].positions.as_entire_binding(),
                            },
                            wgpu::BindGroupEntry {
                                binding: 1,
                                resource: sets[write].velocities.as_entire_binding(),
                            },
                            wgpu::BindGroupEntry {
                                binding: 2,
                                resource: self.step_params.as_entire_binding(),
                            },
                            wgpu::BindGroupEntry {
                                binding: 3,
                                resource: sets[read].positions.as_entire_binding(),
                            },
                            wgpu::BindGroupEntry {
                                binding: 4,
                                resource: sets[read].velocities.as_entire_binding(),
                            },
                        ],
                    })
                })
                .collect()
        } else {
            vec![in_place(0, &self.step_params, "Physics In-Place Bind Group")]
        };

        let reseed = (0..sets.len())
            .map(|index| in_place(index, &self.reseed_params, "Physics Reseed Bind Group"))
            .collect();

        BindGroups {
            generation: buffers.generation,
            step,
            reseed,
        }
    }

    fn dispatch(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        label: &str,
        pipeline: &wgpu::ComputePipeline,
        bind_group: &wgpu::BindGroup,
        lanes: u32,
        workgroup_size: u32,
    ) {
        let (x, y) = dispatch_size(lanes, workgroup_size, self.max_groups_per_dimension);
        if x == 0 {
            return;
        }
        let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some(label),
            timestamp_writes: None,
        });
        compute_pass.set_pipeline(pipeline);
        compute_pass.set_bind_group(0, bind_group, &[]);
        compute_pass.dispatch_workgroups(x, y, 1);
    }

    /// Overwrite the current read set with freshly seeded particles.
    ///
    /// Positions are spread uniformly over the disk of radius `√(w² + h²)/2`
    /// around the surface center; velocities are zero.
    #[allow(clippy::too_many_arguments)]
    pub fn reseed(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        buffers: &ParticleBuffers,
        workgroup_size: u32,
        seed: u32,
        size: (u32, u32),
    ) -> bool {
        let key = KernelKey {
            workgroup_size,
            in_place: true,
        };
        if self.kernel(device, key).is_none() {
            return false;
        }
        let params = SimParams::reseed(buffers.count(), seed, size.0, size.1);
        queue.write_buffer(&self.reseed_params, 0, bytemuck::bytes_of(&params));

        self.refresh_bind_groups(device, buffers);
        let pipeline = self.kernels.get(&key).and_then(Option::as_ref);
        let (Some(pipeline), Some(groups)) = (pipeline, self.bind_groups.as_ref()) else {
            return false;
        };
        let bind_group = &groups.reseed[buffers.rotation.read()];
        self.dispatch(encoder, "Reseed Pass", pipeline, bind_group, buffers.count() / 2, workgroup_size);
        log::debug!("Reseeded {} particles (seed {})", buffers.count(), seed);
        true
    }

    /// Integrate one step and rotate the buffers.
    ///
    /// Returns false, leaving the buffers untouched, when the kernel is
    /// unavailable.
    #[allow(clippy::too_many_arguments)]
    pub fn step(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        buffers: &mut ParticleBuffers,
        points: &[ActivePoint],
        attraction: f32,
        drag: f32,
        workgroup_size: u32,
    ) -> bool {
        let key = KernelKey {
            workgroup_size,
            in_place: !buffers.rotation.is_double(),
        };
        if self.kernel(device, key).is_none() {
            return false;
        }
        let params = SimParams::step(buffers.count(), points, attraction, drag);
        queue.write_buffer(&self.step_params, 0, bytemuck::bytes_of(&params));

        self.refresh_bind_groups(device, buffers);
        let pipeline = self.kernels.get(&key).and_then(Option::as_ref);
        let (Some(pipeline), Some(groups)) = (pipeline, self.bind_groups.as_ref()) else {
            return false;
        };
        let bind_group = if key.in_place {
            &groups.step[0]
        } else {
            &groups.step[buffers.rotation.read()]
        };
        self.dispatch(encoder, "Physics Pass", pipeline, bind_group, buffers.count() / 2, workgroup_size);
        buffers.rotation.advance();
        true
    }

    /// Drop bind groups that reference particle buffers.
    pub fn release(&mut self) {
        self.bind_groups = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_covers_all_lanes() {
        assert_eq!(dispatch_size(500_000, 256, 65_535), (1954, 1));
        assert_eq!(dispatch_size(256, 256, 65_535), (1, 1));
        assert_eq!(dispatch_size(257, 256, 65_535), (2, 1));
        assert_eq!(dispatch_size(0, 256, 65_535), (0, 0));
    }

    #[test]
    fn test_dispatch_spills_into_y() {
        let (x, y) = dispatch_size(10_000_000, 32, 65_535);
        assert_eq!(x, 65_535);
        assert!(x as u64 * y as u64 * 32 >= 10_000_000);
        assert!(((x as u64) * (y as u64 - 1)) * 32 < 10_000_000);
    }
}
