//! # SPARSEVOX Headless
//!
//! Voxelizes the demo scene and renders it offscreen for a number of
//! frames, switching between the shaded and voxel views.
//!
//! ```bash
//! # Defaults, 120 frames
//! RUST_LOG=info sparsevox-headless
//!
//! # Config file and frame count
//! sparsevox-headless crates/sparsevox/config/sparsevox.toml 600
//! ```
//!
//! Uses the GPU when an adapter can run the pipeline, the software
//! backend otherwise.

use std::process::ExitCode;

use glam::Vec3;

use sparsevox::demo_scene::demo_scene;
use sparsevox::{AppResult, FrameLoop, FrameLoopConfig};
use sparsevox_rendering::{
    GpuBackend, GpuContext, LookAtCamera, SoftwareBackend, TracingProfiler, VoxelBackend, VoxelGrid,
    VoxelPipeline,
};
use sparsevox_shared::EngineConfig;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            log::error!("{error}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> AppResult<()> {
    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    let frames = args.next().and_then(|n| n.parse().ok()).unwrap_or(120);

    let grid = VoxelGrid::from_config(&config);
    let extent = grid.half_extent() * 2.0;
    let scene = demo_scene(extent)?;
    let camera = LookAtCamera::new(
        Vec3::new(extent * 0.45, extent * 0.3, extent * 0.45),
        Vec3::ZERO,
        config.render_width as f32 / config.render_height as f32,
    );
    let loop_config = FrameLoopConfig::showcase(frames, config.effective_mip_levels());

    match GpuContext::headless(config.power_preference) {
        Ok(ctx) => {
            let backend = GpuBackend::new(ctx, &config)?;
            drive(backend, &config, scene, camera, loop_config)
        }
        Err(error) => {
            log::warn!("GPU unavailable ({error}), using the software backend");
            drive(SoftwareBackend::from_config(&config), &config, scene, camera, loop_config)
        }
    }
}

fn drive<B: VoxelBackend>(
    backend: B,
    config: &EngineConfig,
    scene: sparsevox_rendering::Scene,
    camera: LookAtCamera,
    loop_config: FrameLoopConfig,
) -> AppResult<()> {
    let profiler = TracingProfiler::new();
    let pipeline = VoxelPipeline::new(backend, config.settings).with_profiler(profiler.clone());
    log::info!(
        "rendering {} frames on the {} backend ({}³ voxels)",
        loop_config.frames,
        pipeline.backend().name(),
        config.voxel_dims
    );

    let mut frame_loop = FrameLoop::new(pipeline, scene, camera, loop_config);
    frame_loop.run()?.log_summary();
    profiler.log_summary();
    Ok(())
}
