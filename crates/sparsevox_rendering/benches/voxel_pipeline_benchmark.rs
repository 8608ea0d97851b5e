//! Benchmark for the CPU reference stages.
//!
//! Run with: cargo bench --package sparsevox_rendering --bench voxel_pipeline_benchmark

// criterion_group! generates undocumented public functions
#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use glam::{Mat4, Vec3};
use sparsevox_rendering::compaction::software::compact;
use sparsevox_rendering::instancing::InstanceList;
use sparsevox_rendering::mesh::primitives;
use sparsevox_rendering::voxelizer::software::voxelize;
use sparsevox_rendering::{CpuVolume, LookAtCamera, Material, MeshGroup, VoxelGrid};

fn cube_field(count: u32) -> MeshGroup {
    let (vertices, indices) = primitives::unit_cube();
    let mut group = MeshGroup::new("field");
    for i in 0..count {
        let x = (i % 8) as f32 * 2.0 - 7.0;
        let z = (i / 8) as f32 * 2.0 - 7.0;
        let transform = Mat4::from_translation(Vec3::new(x, 0.0, z)) * Mat4::from_rotation_y(i as f32 * 0.3);
        group
            .push_submesh(&vertices, &indices, transform, Material::default())
            .unwrap();
    }
    group
}

fn benchmark_voxelize(c: &mut Criterion) {
    let groups = [cube_field(64)];
    let mut group = c.benchmark_group("voxelize");
    group.throughput(Throughput::Elements(64 * 12));

    for dims in [64u32, 128] {
        let grid = VoxelGrid::new(dims, 20.0 / dims as f32, 6);
        let mut volume = CpuVolume::new(grid);
        group.bench_function(format!("64_cubes_{dims}³"), |b| {
            b.iter(|| {
                volume.clear();
                black_box(voxelize(&volume, &groups));
                volume.generate_mipmaps();
            });
        });
    }
    group.finish();
}

fn benchmark_compact(c: &mut Criterion) {
    let grid = VoxelGrid::new(128, 20.0 / 128.0, 8);
    let mut volume = CpuVolume::new(grid);
    voxelize(&volume, &[cube_field(64)]);
    volume.generate_mipmaps();

    let camera = LookAtCamera::new(Vec3::new(0.0, 8.0, 14.0), Vec3::ZERO, 16.0 / 9.0);
    let frustum = sparsevox_rendering::Frustum::from_view_projection(&(camera.projection() * camera.view()));
    let mut list = InstanceList::new(1 << 20);

    let mut group = c.benchmark_group("compact");
    group.throughput(Throughput::Elements(grid.cell_count(0) as u64));
    for mip in [0u32, 2] {
        group.bench_function(format!("128³_mip_{mip}"), |b| {
            let mut frame = 0u64;
            b.iter(|| {
                frame += 1;
                black_box(compact(&volume, &frustum, mip, &mut list, frame))
            });
        });
    }
    group.finish();
}

criterion_group!(benches, benchmark_voxelize, benchmark_compact);
criterion_main!(benches);
