//! # Shipped Config Tests
//!
//! The config file in `config/` must always load.

use std::path::PathBuf;

use sparsevox_shared::{CountReadback, EngineConfig};

fn shipped_config() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("config/sparsevox.toml")
}

#[test]
fn test_shipped_config_loads() {
    let config = EngineConfig::load(shipped_config()).unwrap();
    assert_eq!(config.voxel_dims, 128);
    assert_eq!(config.instance_capacity, 1_000_000);
    assert_eq!(config.count_readback, CountReadback::Indirect);
    assert!((config.settings.voxel_size - 0.25).abs() < f32::EPSILON);
}

#[test]
fn test_demo_scene_fits_shipped_grid() {
    let config = EngineConfig::load(shipped_config()).unwrap();
    let extent = config.voxel_dims as f32 * config.settings.voxel_size;
    let scene = sparsevox::demo_scene::demo_scene(extent).unwrap();
    let bounds = scene.bounds();
    assert!(bounds.max.iter().all(|&v| v <= extent / 2.0));
    assert!(bounds.min.iter().all(|&v| v >= -extent / 2.0));
}
