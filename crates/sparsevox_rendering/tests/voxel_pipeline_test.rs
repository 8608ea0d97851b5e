//! # Voxel Pipeline Properties
//!
//! Runs the pipeline on the software backend, which shares its stage
//! semantics with the GPU path.
//!
//! Run with: cargo test --package sparsevox_rendering --test voxel_pipeline_test

use glam::{Mat4, UVec3, Vec3};
use sparsevox_rendering::compaction::software::compact;
use sparsevox_rendering::instancing::InstanceList;
use sparsevox_rendering::mesh::primitives;
use sparsevox_rendering::volume::texel;
use sparsevox_rendering::voxelizer::software::voxelize;
use sparsevox_rendering::{
    CameraSnapshot, CpuVolume, DrawCall, Frustum, LookAtCamera, Material, MeshGroup, Plane, RecordingUi,
    Scene, SoftwareBackend, TracingProfiler, VoxelGrid, VoxelPipeline,
};
use sparsevox_shared::{Aabb, ControlEvent, VoxelSettings};

fn group_with(transforms: &[Mat4]) -> MeshGroup {
    let (vertices, indices) = primitives::unit_cube();
    let mut group = MeshGroup::new("cubes");
    for (i, transform) in transforms.iter().enumerate() {
        let shade = 0.2 + 0.2 * i as f32;
        group
            .push_submesh(&vertices, &indices, *transform, Material::with_albedo([shade, 0.5, 0.5, 1.0]))
            .unwrap();
    }
    group
}

fn scene_with(transforms: &[Mat4]) -> Scene {
    let mut scene = Scene::default();
    scene.add_group(group_with(transforms)).unwrap();
    scene
}

fn voxel_view_pipeline(grid: VoxelGrid, capacity: u32) -> (VoxelPipeline<SoftwareBackend>, RecordingUi) {
    let ui = RecordingUi::new();
    let settings = VoxelSettings {
        voxel_size: grid.voxel_size(),
        show_voxels: true,
        ..VoxelSettings::default()
    };
    let pipeline = VoxelPipeline::new(SoftwareBackend::new(grid, capacity), settings).with_ui(ui.clone());
    (pipeline, ui)
}

fn overview_camera() -> LookAtCamera {
    LookAtCamera::new(Vec3::new(6.0, 5.0, 7.0), Vec3::ZERO, 16.0 / 9.0)
}

/// Test: the unit cube in an 8³ grid of unit voxels is eight cells and
/// eight instances, end to end.
#[test]
fn test_unit_cube_end_to_end() {
    let (mut pipeline, ui) = voxel_view_pipeline(VoxelGrid::new(8, 1.0, 4), 1024);
    let scene = scene_with(&[Mat4::IDENTITY]);

    let report = pipeline.render_frame(&scene, &overview_camera()).unwrap();

    let volume = pipeline.backend().volume();
    let mut cells = volume.occupied_cells(0);
    cells.sort_by_key(|c| (c.x, c.y, c.z));
    let expected: Vec<UVec3> = (0..8)
        .map(|i| UVec3::new(3 + ((i >> 2) & 1), 3 + ((i >> 1) & 1), 3 + (i & 1)))
        .collect();
    assert_eq!(cells, expected);
    assert_eq!(report.drawn_instances(), Some(8));
    assert_eq!(pipeline.backend().instances().instances().len(), 8);
    assert!(ui.warnings().is_empty());
}

/// Test: running the stages twice on an unchanged scene gives the same
/// volume and the same instances.
#[test]
fn test_voxelization_is_idempotent() {
    let grid = VoxelGrid::new(32, 0.25, 6);
    let (mut pipeline, _) = voxel_view_pipeline(grid, 1 << 16);
    let scene = scene_with(&[
        Mat4::from_scale(Vec3::splat(2.0)),
        Mat4::from_translation(Vec3::new(1.5, 0.0, -1.0)),
    ]);
    pipeline.render_frame(&scene, &overview_camera()).unwrap();
    let first_volume = pipeline.backend().volume().level(0).to_vec();
    let first_instances = pipeline.backend().instances().instances().to_vec();

    pipeline.controls().send(ControlEvent::RegenerateVoxels);
    let report = pipeline.render_frame(&scene, &overview_camera()).unwrap();
    assert!(report.revoxelized);
    assert_eq!(pipeline.backend().volume().level(0), first_volume.as_slice());
    assert_eq!(pipeline.backend().instances().instances(), first_instances.as_slice());
    assert_eq!(pipeline.backend().stage_counts().voxelizations, 2);
}

/// Test: a static scene is voxelized exactly once no matter how the camera moves.
#[test]
fn test_static_scene_voxelized_once() {
    let (mut pipeline, _) = voxel_view_pipeline(VoxelGrid::new(16, 0.5, 5), 4096);
    let scene = scene_with(&[Mat4::IDENTITY]);
    let mut camera = overview_camera();
    for _ in 0..10 {
        pipeline.render_frame(&scene, &camera).unwrap();
        camera.orbit(0.3);
    }
    let counts = pipeline.backend().stage_counts();
    assert_eq!(counts.voxelizations, 1);
    assert_eq!(counts.clears, 1);
    assert_eq!(counts.compactions, 10);
}

/// Test: world -> cell -> center -> cell is the identity on every level.
#[test]
fn test_coordinate_round_trip() {
    let grid = VoxelGrid::new(16, 0.75, 5);
    for mip in 0..grid.mip_levels() {
        let dims = grid.dims_at_mip(mip);
        for z in 0..dims {
            for y in 0..dims {
                for x in 0..dims {
                    let cell = UVec3::new(x, y, z);
                    let center = grid.voxel_center(cell, mip);
                    assert_eq!(grid.world_to_voxel_at_mip(center, mip), Some(cell));
                    assert_eq!(grid.cell_at(grid.linear_index(cell, mip), mip), cell);
                }
            }
        }
    }
    assert_eq!(grid.world_to_voxel(Vec3::splat(grid.half_extent() + 0.01)), None);
}

/// Test: no cell with any corner inside the frustum is culled.
#[test]
fn test_frustum_test_is_conservative() {
    let grid = VoxelGrid::new(16, 1.0, 1);
    let camera = LookAtCamera::new(Vec3::new(2.0, 1.0, 12.0), Vec3::new(-1.0, 0.0, 0.0), 1.0);
    let frustum = Frustum::from_view_projection(&(camera.projection() * camera.view()));
    let half = Vec3::splat(0.5);

    let mut visible = 0;
    for index in 0..grid.cell_count(0) {
        let cell = grid.cell_at(index, 0);
        let aabb = grid.voxel_aabb(cell, 0);
        let any_corner_inside = (0..8).any(|corner| {
            let pick = |bit: usize, lo: f32, hi: f32| if (corner >> bit) & 1 == 1 { hi } else { lo };
            let point = Vec3::new(
                pick(0, aabb.min[0], aabb.max[0]),
                pick(1, aabb.min[1], aabb.max[1]),
                pick(2, aabb.min[2], aabb.max[2]),
            );
            frustum.contains_point(point)
        });
        let passes = frustum.test_box(grid.voxel_center(cell, 0), half);
        if any_corner_inside {
            assert!(passes, "visible cell {cell} was culled");
            visible += 1;
        }
    }
    assert!(visible > 0);
}

/// Largest signed distance of any box corner to `plane`. The box lies
/// entirely outside the half-space only when this is negative.
fn farthest_corner_distance(plane: &Plane, aabb: &Aabb) -> f32 {
    (0..8)
        .map(|corner: usize| {
            let pick = |bit: usize, lo: f32, hi: f32| if (corner >> bit) & 1 == 1 { hi } else { lo };
            let point = Vec3::new(
                pick(0, aabb.min[0], aabb.max[0]),
                pick(1, aabb.min[1], aabb.max[1]),
                pick(2, aabb.min[2], aabb.max[2]),
            );
            plane.distance_to_point(point)
        })
        .fold(f32::NEG_INFINITY, f32::max)
}

/// Test: the counter agrees with a corner-by-corner count of occupied cells
/// that are not entirely outside any plane. Cells within rounding distance
/// of a plane may go either way.
#[test]
fn test_counter_matches_corner_reference() {
    const EPS: f32 = 1.0e-4;
    let grid = VoxelGrid::new(32, 0.25, 6);
    let mut volume = CpuVolume::new(grid);
    let group = group_with(&[
        Mat4::from_scale(Vec3::splat(3.0)),
        Mat4::from_rotation_y(0.6) * Mat4::from_translation(Vec3::new(-2.0, 0.5, 1.0)),
    ]);
    voxelize(&volume, std::slice::from_ref(&group));
    volume.generate_mipmaps();

    let camera = LookAtCamera::new(Vec3::new(0.5, 1.0, 3.5), Vec3::new(-1.0, 0.0, 0.0), 1.0);
    let snapshot = CameraSnapshot::new(camera.view(), camera.projection());
    for mip in [0, 1, 3] {
        let mut list = InstanceList::new(1 << 20);
        let counters = compact(&volume, &snapshot.frustum, mip, &mut list, 7);

        let worst_plane = |cell: UVec3| {
            let aabb = grid.voxel_aabb(cell, mip);
            snapshot
                .frustum
                .planes
                .iter()
                .map(|plane| farthest_corner_distance(plane, &aabb))
                .fold(f32::INFINITY, f32::min)
        };
        let occupied = volume.occupied_cells(mip);
        let surely_in = occupied.iter().filter(|&&cell| worst_plane(cell) > EPS).count();
        let maybe_in = occupied.iter().filter(|&&cell| worst_plane(cell) >= -EPS).count();

        let count = counters.count as usize;
        assert!(surely_in > 0, "mip {mip}");
        assert!((surely_in..=maybe_in).contains(&count), "mip {mip}: {count} not in {surely_in}..={maybe_in}");
        assert!(list.instances().iter().all(|i| worst_plane(i.cell()) >= -EPS));
        assert_eq!(counters.dropped, 0);
        assert_eq!(counters.frame, 7);
        assert!(list.instances().iter().all(|i| texel::is_occupied(i.packed_color)));
    }
}

/// Test: against a box-shaped frustum, hand-placed cells inside or crossing
/// a plane are counted and cells entirely outside are not.
#[test]
fn test_cells_outside_frustum_are_excluded() {
    // 16^3 unit grid: cell c spans [c - 8, c - 7] on each axis.
    let grid = VoxelGrid::new(16, 1.0, 1);
    let mut volume = CpuVolume::new(grid);
    let frustum = Frustum {
        planes: [
            Plane::new(1.0, 0.0, 0.0, 2.5),
            Plane::new(-1.0, 0.0, 0.0, 2.5),
            Plane::new(0.0, 1.0, 0.0, 2.5),
            Plane::new(0.0, -1.0, 0.0, 2.5),
            Plane::new(0.0, 0.0, 1.0, 2.5),
            Plane::new(0.0, 0.0, -1.0, 2.5),
        ],
    };

    let inside = [UVec3::new(8, 8, 8), UVec3::new(7, 7, 7), UVec3::new(6, 8, 9)];
    let straddling = [UVec3::new(5, 8, 8), UVec3::new(10, 8, 8), UVec3::new(8, 10, 5)];
    let outside = [
        UVec3::new(4, 8, 8),
        UVec3::new(11, 8, 8),
        UVec3::new(8, 8, 12),
        UVec3::new(0, 0, 0),
        UVec3::new(15, 15, 15),
        UVec3::new(11, 11, 8),
    ];
    let color = texel::occupied_texel([0.8, 0.4, 0.2, 1.0]);
    for cell in inside.iter().chain(&straddling).chain(&outside) {
        volume.write(*cell, color);
    }
    volume.generate_mipmaps();
    assert_eq!(volume.occupied_count(0), inside.len() + straddling.len() + outside.len());

    let mut list = InstanceList::new(64);
    let counters = compact(&volume, &frustum, 0, &mut list, 0);
    let drawn: Vec<UVec3> = list.instances().iter().map(|i| i.cell()).collect();

    assert_eq!(counters.count as usize, inside.len() + straddling.len());
    for cell in inside.iter().chain(&straddling) {
        assert!(drawn.contains(cell), "cell {cell} should be drawn");
    }
    for cell in &outside {
        assert!(!drawn.contains(cell), "cell {cell} lies outside the frustum");
    }
}

/// Test: a full instance buffer drops the excess, never writes past
/// capacity, and the UI hears about it.
#[test]
fn test_overflow_is_bounded_and_reported() {
    let (mut pipeline, ui) = voxel_view_pipeline(VoxelGrid::new(16, 0.25, 5), 10);
    let scene = scene_with(&[Mat4::from_scale(Vec3::splat(2.0))]);
    let report = pipeline.render_frame(&scene, &overview_camera()).unwrap();

    let counters = report.counters.unwrap();
    assert!(counters.count > 10);
    assert_eq!(counters.stored(), 10);
    assert_eq!(counters.dropped, counters.count - 10);
    assert!(counters.overflowed());
    assert_eq!(pipeline.backend().instances().instances().len(), 10);
    assert_eq!(report.drawn_instances(), Some(10));
    assert_eq!(ui.dropped_total(), u64::from(counters.dropped));
    assert_eq!(ui.last_overflow(), Some(counters));
}

/// Test: every parent is occupied exactly when one of its children is.
#[test]
fn test_mip_chain_consistency() {
    let grid = VoxelGrid::new(32, 0.2, 6);
    let mut volume = CpuVolume::new(grid);
    let group = group_with(&[
        Mat4::from_scale(Vec3::new(2.5, 0.4, 1.0)),
        Mat4::from_translation(Vec3::new(1.0, 1.2, -0.7)) * Mat4::from_rotation_x(0.9),
    ]);
    voxelize(&volume, std::slice::from_ref(&group));
    volume.generate_mipmaps();

    for mip in 1..grid.mip_levels() {
        let dims = grid.dims_at_mip(mip);
        for index in 0..grid.cell_count(mip) {
            let parent = grid.cell_at(index, mip);
            let any_child = (0..8u32).any(|corner| {
                let child = parent * 2 + UVec3::new(corner & 1, (corner >> 1) & 1, (corner >> 2) & 1);
                texel::is_occupied(volume.texel(child, mip - 1))
            });
            assert_eq!(
                texel::is_occupied(volume.texel(parent, mip)),
                any_child,
                "mip {mip} cell {parent} of {dims}³"
            );
        }
    }
    assert!(volume.occupied_count(0) > 0);
}

/// Test: toggling the view between frames switches draws without
/// touching the volume.
#[test]
fn test_view_toggle_does_not_revoxelize() {
    let profiler = TracingProfiler::new();
    let settings = VoxelSettings {
        show_voxels: true,
        ..VoxelSettings::default()
    };
    let backend = SoftwareBackend::new(VoxelGrid::new(8, 1.0, 4), 64);
    let mut pipeline = VoxelPipeline::new(backend, settings).with_profiler(profiler.clone());
    let scene = scene_with(&[Mat4::IDENTITY]);

    let voxels = pipeline.render_frame(&scene, &overview_camera()).unwrap();
    pipeline.controls().send(ControlEvent::SetShowVoxels(false));
    pipeline.controls().send(ControlEvent::SetShowTexture(true));
    let shaded = pipeline.render_frame(&scene, &overview_camera()).unwrap();

    assert!(matches!(voxels.draw, DrawCall::Voxels { mip: 0, .. }));
    assert!(matches!(
        shaded.draw,
        DrawCall::Scene { submeshes: 1, show_texture: true, .. }
    ));
    assert!(!shaded.revoxelized);
    assert_eq!(profiler.timing("voxelize").map(|t| t.calls), Some(1));
    assert_eq!(profiler.timing("frame").map(|t| t.calls), Some(2));
}

/// Test: removing a group rebuilds the volume without it.
#[test]
fn test_removed_group_disappears() {
    let (mut pipeline, _) = voxel_view_pipeline(VoxelGrid::new(16, 0.5, 5), 4096);
    let mut scene = scene_with(&[Mat4::IDENTITY]);
    scene
        .add_group(group_with(&[Mat4::from_translation(Vec3::new(2.0, 0.0, 0.0))]))
        .unwrap();
    pipeline.render_frame(&scene, &overview_camera()).unwrap();
    let both = pipeline.backend().volume().occupied_count(0);

    scene.remove_group(1).unwrap();
    let report = pipeline.render_frame(&scene, &overview_camera()).unwrap();
    assert!(report.revoxelized);
    assert!(pipeline.backend().volume().occupied_count(0) < both);
}
