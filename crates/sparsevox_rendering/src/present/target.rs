//! Offscreen color and depth attachments.

use crate::error::RenderResult;
use crate::gpu::{GpuContext, MappedView};

/// Color format of the offscreen target.
pub const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;
/// Depth format shared by every pass.
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
/// Background color.
pub const CLEAR_COLOR: wgpu::Color = wgpu::Color {
    r: 0.02,
    g: 0.02,
    b: 0.03,
    a: 1.0,
};

/// Color + depth attachments the presentation stages draw into.
pub struct RenderTarget {
    color: wgpu::Texture,
    color_view: wgpu::TextureView,
    depth_view: wgpu::TextureView,
    width: u32,
    height: u32,
}

impl RenderTarget {
    /// Allocates a `width × height` target.
    ///
    /// # Errors
    ///
    /// Returns [`crate::RenderError::ExceedsDeviceLimit`] or
    /// [`crate::RenderError::ResourceCreation`].
    pub fn new(ctx: &GpuContext, width: u32, height: u32) -> RenderResult<Self> {
        let max = u64::from(ctx.limits().max_texture_dimension_2d);
        GpuContext::check_limit("render target width", u64::from(width), max)?;
        GpuContext::check_limit("render target height", u64::from(height), max)?;
        ctx.create_scoped("render target", |device| {
            let size = wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            };
            let texture = |label: &str, format: wgpu::TextureFormat, usage: wgpu::TextureUsages| {
                device.create_texture(&wgpu::TextureDescriptor {
                    label: Some(label),
                    size,
                    mip_level_count: 1,
                    sample_count: 1,
                    dimension: wgpu::TextureDimension::D2,
                    format,
                    usage,
                    view_formats: &[],
                })
            };
            let color = texture(
                "Target Color",
                COLOR_FORMAT,
                wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            );
            let depth = texture("Target Depth", DEPTH_FORMAT, wgpu::TextureUsages::RENDER_ATTACHMENT);
            Self {
                color_view: color.create_view(&wgpu::TextureViewDescriptor::default()),
                depth_view: depth.create_view(&wgpu::TextureViewDescriptor::default()),
                color,
                width,
                height,
            }
        })
    }

    /// Color attachment view.
    #[must_use]
    pub const fn color_view(&self) -> &wgpu::TextureView {
        &self.color_view
    }

    /// Depth attachment view.
    #[must_use]
    pub const fn depth_view(&self) -> &wgpu::TextureView {
        &self.depth_view
    }

    /// Width / height.
    #[must_use]
    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }

    /// Target size in pixels.
    #[must_use]
    pub const fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Copies the color attachment back as tightly packed RGBA8 rows.
    /// Blocks until the GPU is idle.
    ///
    /// # Errors
    ///
    /// Returns [`crate::RenderError::BufferMap`] if mapping fails.
    pub fn read_color(&self, ctx: &GpuContext) -> RenderResult<Vec<u8>> {
        let row = self.width * 4;
        let padded = row.div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT) * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let staging = ctx.device().create_buffer(&wgpu::BufferDescriptor {
            label: Some("Target Readback"),
            size: u64::from(padded) * u64::from(self.height),
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let mut encoder = ctx.device().create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Target Readback"),
        });
        encoder.copy_texture_to_buffer(
            self.color.as_image_copy(),
            wgpu::ImageCopyBuffer {
                buffer: &staging,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded),
                    rows_per_image: Some(self.height),
                },
            },
            wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );
        ctx.queue().submit(Some(encoder.finish()));

        let mapped = MappedView::map_blocking(ctx.device(), &staging, "target readback")?;
        Ok(mapped
            .bytes()
            .chunks(padded as usize)
            .flat_map(|line| line[..row as usize].iter().copied())
            .collect())
    }
}
