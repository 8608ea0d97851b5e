//! GPU compaction and indirect-args finalize passes.

use bytemuck::{Pod, Zeroable};

use sparsevox_shared::constants::workgroup_count;

use crate::culling::Frustum;
use crate::error::RenderResult;
use crate::gpu::{self, shaders, GpuContext};
use crate::instancing::{Counters, InstanceBuffer};
use crate::volume::VolumeStore;

// Fields are only read by the shader.
#[allow(dead_code)]
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct CompactParams {
    planes: [[f32; 4]; 6],
    dims: u32,
    mip: u32,
    voxel_size: f32,
    capacity: u32,
}

/// Builds the frustum-culled instance list from one mip of the volume.
pub struct Compactor {
    compact_pipeline: wgpu::ComputePipeline,
    compact_layout: wgpu::BindGroupLayout,
    finalize_pipeline: wgpu::ComputePipeline,
    finalize_layout: wgpu::BindGroupLayout,
    params: wgpu::Buffer,
}

impl Compactor {
    /// Builds both pipelines.
    ///
    /// # Errors
    ///
    /// Returns [`crate::RenderError::ResourceCreation`] if a pipeline is
    /// rejected.
    pub fn new(ctx: &GpuContext) -> RenderResult<Self> {
        ctx.create_scoped("compaction pipelines", |device| {
            let compute = wgpu::ShaderStages::COMPUTE;
            let compact_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Compact Layout"),
                entries: &[
                    gpu::uniform_entry(0, compute),
                    gpu::volume_texture_entry(1, compute),
                    gpu::storage_entry(2, compute, false),
                    gpu::storage_entry(3, compute, false),
                ],
            });
            let finalize_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Finalize Draw Layout"),
                entries: &[
                    gpu::uniform_entry(0, compute),
                    gpu::storage_entry(1, compute, true),
                    gpu::storage_entry(2, compute, false),
                ],
            });
            Self {
                compact_pipeline: gpu::compute_pipeline(device, "Compact", shaders::COMPACT, &compact_layout),
                finalize_pipeline: gpu::compute_pipeline(
                    device,
                    "Finalize Draw",
                    shaders::FINALIZE_DRAW,
                    &finalize_layout,
                ),
                compact_layout,
                finalize_layout,
                params: device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some("Compact Params"),
                    size: std::mem::size_of::<CompactParams>() as u64,
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                }),
            }
        })
    }

    /// Encodes counter reset, compaction of `mip` and the finalize pass.
    ///
    /// When `copy_counters` names a readback buffer the counters are also
    /// copied into it. That buffer must not be mapped.
    pub fn encode(
        &self,
        ctx: &GpuContext,
        encoder: &mut wgpu::CommandEncoder,
        store: &VolumeStore,
        instances: &InstanceBuffer,
        frustum: &Frustum,
        mip: u32,
        copy_counters: Option<&wgpu::Buffer>,
    ) {
        let grid = store.grid();
        let dims = grid.dims_at_mip(mip);
        ctx.queue().write_buffer(
            &self.params,
            0,
            bytemuck::bytes_of(&CompactParams {
                planes: frustum.as_arrays(),
                dims,
                mip,
                voxel_size: grid.voxel_size_at_mip(mip),
                capacity: instances.capacity(),
            }),
        );

        let device = ctx.device();
        let compact_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Compact"),
            layout: &self.compact_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.params.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(store.sampled_view()),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: instances.instances().as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: instances.counters().as_entire_binding(),
                },
            ],
        });
        let finalize_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Finalize Draw"),
            layout: &self.finalize_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.params.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: instances.counters().as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: instances.args().as_entire_binding(),
                },
            ],
        });

        encoder.clear_buffer(instances.counters(), 0, None);
        {
            let groups = workgroup_count(dims);
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Compact"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.compact_pipeline);
            pass.set_bind_group(0, &compact_group, &[]);
            pass.dispatch_workgroups(groups, groups, groups);
        }
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Finalize Draw"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.finalize_pipeline);
            pass.set_bind_group(0, &finalize_group, &[]);
            pass.dispatch_workgroups(1, 1, 1);
        }
        if let Some(readback) = copy_counters {
            encoder.copy_buffer_to_buffer(instances.counters(), 0, readback, 0, Counters::SIZE);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_layout_matches_wgsl() {
        assert_eq!(std::mem::size_of::<CompactParams>(), 112);
    }
}
