//! Built-in scene for headless runs: a floor with a ring of pillars and a
//! floating cube, built from one scene graph.

use glam::{Quat, Vec3};

use sparsevox_rendering::mesh::primitives;
use sparsevox_rendering::{Material, MeshGroup, Primitive, Scene, SceneNode};
use sparsevox_shared::Transform;

use crate::error::AppResult;

/// Number of pillars around the center.
pub const PILLAR_COUNT: usize = 6;

/// Light position of the demo scene.
pub const DEMO_LIGHT: Vec3 = Vec3::new(4.0, 12.0, 6.0);

fn cube(albedo: [f32; 4]) -> Primitive {
    let (vertices, indices) = primitives::unit_cube();
    Primitive::new(vertices, indices, Material::with_albedo(albedo))
}

/// Scene graph of the demo: `root -> { floor, pillars -> pillar*, crate }`.
#[must_use]
pub fn demo_graph(radius: f32) -> SceneNode {
    let (floor_vertices, floor_indices) = primitives::plane(radius * 1.5);
    let floor = SceneNode::new("floor", Transform::from_translation(Vec3::new(0.0, -1.0, 0.0)))
        .with_primitive(Primitive::new(
            floor_vertices,
            floor_indices,
            Material::with_albedo([0.6, 0.6, 0.55, 1.0]),
        ));

    let mut pillars = SceneNode::new("pillars", Transform::IDENTITY);
    for i in 0..PILLAR_COUNT {
        let angle = i as f32 / PILLAR_COUNT as f32 * std::f32::consts::TAU;
        let position = Vec3::new(angle.cos() * radius, 0.5, angle.sin() * radius);
        let hue = i as f32 / PILLAR_COUNT as f32;
        let pillar = SceneNode::new(
            format!("pillar_{i}"),
            Transform::from_translation(position).with_scale(Vec3::new(0.8, 3.0, 0.8)),
        )
        .with_primitive(cube([0.9, 0.3 + 0.6 * hue, 0.2, 1.0]));
        pillars = pillars.with_child(pillar);
    }

    let floating = SceneNode::new(
        "crate",
        Transform::from_translation(Vec3::new(0.0, 1.5, 0.0))
            .with_rotation(Quat::from_euler(glam::EulerRot::XYZ, 0.4, 0.7, 0.0))
            .with_scale(Vec3::splat(1.5)),
    )
    .with_primitive(cube([0.2, 0.4, 0.9, 1.0]));

    SceneNode::new("root", Transform::IDENTITY)
        .with_child(floor)
        .with_child(pillars)
        .with_child(floating)
}

/// Builds the demo scene sized to fit a grid of `extent` world units.
///
/// # Errors
///
/// Returns a render error if the scene graph produces an invalid group.
pub fn demo_scene(extent: f32) -> AppResult<Scene> {
    let radius = (extent * 0.3).max(1.0);
    let group = MeshGroup::from_scene_graph("demo", &[demo_graph(radius)])?;
    let mut scene = Scene::new(DEMO_LIGHT);
    scene.add_group(group)?;
    tracing::info!(
        submeshes = scene.submesh_count(),
        radius,
        "demo scene built"
    );
    Ok(scene)
}
