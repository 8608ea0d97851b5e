//! GPU device ownership.
//!
//! One `GpuContext` owns the adapter, device and queue. Stages borrow it;
//! nothing in the crate keeps GPU objects in statics.

use sparsevox_shared::GpuPowerPreference;

use crate::error::{RenderError, RenderResult};

/// Features used when present. Every one has a fallback path.
pub const OPTIONAL_FEATURES: wgpu::Features = wgpu::Features::MULTI_DRAW_INDIRECT
    .union(wgpu::Features::INDIRECT_FIRST_INSTANCE)
    .union(wgpu::Features::POLYGON_MODE_LINE);

/// Adapter, device and queue for one renderer.
pub struct GpuContext {
    adapter: wgpu::Adapter,
    device: wgpu::Device,
    queue: wgpu::Queue,
    features: wgpu::Features,
    limits: wgpu::Limits,
}

impl GpuContext {
    /// Creates a device without a surface.
    ///
    /// Backends come from `WGPU_BACKEND` when set, otherwise the primary
    /// native backends are tried.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::AdapterUnavailable`] when no adapter exists,
    /// [`RenderError::UnsupportedAdapter`] when it cannot run compute or
    /// fragment storage writes, and [`RenderError::DeviceRequest`] if device
    /// creation fails.
    pub fn headless(power: GpuPowerPreference) -> RenderResult<Self> {
        let backends = wgpu::util::backend_bits_from_env().unwrap_or(wgpu::Backends::PRIMARY);
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends,
            ..Default::default()
        });

        let power_preference = match power {
            GpuPowerPreference::LowPower => wgpu::PowerPreference::LowPower,
            GpuPowerPreference::HighPerformance => wgpu::PowerPreference::HighPerformance,
        };
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .ok_or(RenderError::AdapterUnavailable)?;

        Self::from_adapter(adapter)
    }

    /// Creates the device on a specific adapter.
    ///
    /// # Errors
    ///
    /// See [`GpuContext::headless`].
    pub fn from_adapter(adapter: wgpu::Adapter) -> RenderResult<Self> {
        let info = adapter.get_info();
        let downlevel = adapter.get_downlevel_capabilities();
        let required = wgpu::DownlevelFlags::COMPUTE_SHADERS
            | wgpu::DownlevelFlags::FRAGMENT_WRITABLE_STORAGE
            | wgpu::DownlevelFlags::VERTEX_STORAGE
            | wgpu::DownlevelFlags::INDIRECT_EXECUTION;
        if !downlevel.flags.contains(required) {
            return Err(RenderError::UnsupportedAdapter {
                adapter: info.name,
                reason: format!("missing {:?}", required - downlevel.flags),
            });
        }

        let features = adapter.features() & OPTIONAL_FEATURES;
        // Voxel volumes are large; ask for everything the adapter offers.
        let limits = adapter.limits();

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("SPARSEVOX"),
                required_features: features,
                required_limits: limits.clone(),
            },
            None,
        ))?;

        tracing::info!(
            adapter = %info.name,
            backend = ?info.backend,
            ?features,
            max_3d = limits.max_texture_dimension_3d,
            "GPU device created"
        );

        Ok(Self {
            adapter,
            device,
            queue,
            features,
            limits,
        })
    }

    /// The device.
    #[must_use]
    pub const fn device(&self) -> &wgpu::Device {
        &self.device
    }

    /// The queue.
    #[must_use]
    pub const fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Adapter description.
    #[must_use]
    pub fn adapter_info(&self) -> wgpu::AdapterInfo {
        self.adapter.get_info()
    }

    /// Device limits.
    #[must_use]
    pub const fn limits(&self) -> &wgpu::Limits {
        &self.limits
    }

    /// True if every feature in `features` was enabled.
    #[must_use]
    pub fn supports(&self, features: wgpu::Features) -> bool {
        self.features.contains(features)
    }

    /// Fails with [`RenderError::ExceedsDeviceLimit`] if `requested > limit`.
    ///
    /// # Errors
    ///
    /// See above.
    pub fn check_limit(what: &'static str, requested: u64, limit: u64) -> RenderResult<()> {
        if requested > limit {
            return Err(RenderError::ExceedsDeviceLimit {
                what,
                requested,
                limit,
            });
        }
        Ok(())
    }

    /// Runs resource creation inside validation and out-of-memory error
    /// scopes and turns a captured error into [`RenderError::ResourceCreation`].
    ///
    /// # Errors
    ///
    /// See above.
    pub fn create_scoped<T>(
        &self,
        what: &'static str,
        create: impl FnOnce(&wgpu::Device) -> T,
    ) -> RenderResult<T> {
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = create(&self.device);
        let validation = pollster::block_on(self.device.pop_error_scope());
        let out_of_memory = pollster::block_on(self.device.pop_error_scope());

        match validation.or(out_of_memory) {
            Some(error) => {
                tracing::error!(what, %error, "GPU resource creation failed");
                Err(RenderError::ResourceCreation {
                    what,
                    reason: error.to_string(),
                })
            }
            None => Ok(value),
        }
    }

    /// Blocks until all submitted work has finished.
    pub fn wait_idle(&self) {
        let _ = self.device.poll(wgpu::Maintain::Wait);
    }
}
